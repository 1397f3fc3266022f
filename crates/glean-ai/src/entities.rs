//! Named-entity tagging.
//!
//! [`RuleTagger`] works in two passes over the text:
//!
//! 1. Patterns claim numeric and temporal spans (MONEY, PERCENT, DATE, TIME,
//!    CARDINAL), earliest pattern first.
//! 2. Runs of capitalised words outside the claimed spans become candidate
//!    names. A candidate is labelled from the gazetteer, an organisation or
//!    location head/suffix word, a personal title, or its shape; candidates
//!    with no evidence are dropped.
//!
//! Entities come back in document order and never overlap. With the `onnx`
//! feature a token-classification model can stand in for the rules
//! (`OnnxTagger`); the rule tagger is the no-model fallback.

use glean_core::text::{Token, sentences, words};
use glean_core::types::Entity;
use regex::Regex;

use crate::gazetteer::Gazetteer;

/// Turns text into `(text, label)` entities.
pub trait EntityTagger: Send + Sync {
    fn name(&self) -> &str;

    fn tag(&self, text: &str) -> anyhow::Result<Vec<Entity>>;
}

/// An entity located in the source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedSpan {
    pub start: usize,
    pub end: usize,
    pub label: String,
}

const MONTHS: &str =
    "January|February|March|April|May|June|July|August|September|October|November|December";
const MONTH_ABBREVIATIONS: &str = "Jan|Feb|Mar|Apr|Jun|Jul|Aug|Sep|Sept|Oct|Nov|Dec";

const TITLES: &[&str] = &[
    "Mr", "Mrs", "Ms", "Miss", "Mx", "Dr", "Prof", "Professor", "Sir", "Dame", "Lord", "Lady",
    "President", "Senator", "Sen", "Rep", "Representative", "Governor", "Gov", "Mayor",
    "Judge", "Justice", "General", "Gen", "Colonel", "Col", "Captain", "Capt", "Lieutenant",
    "Lt", "Sergeant", "Sgt", "Rev", "Reverend", "Father", "King", "Queen", "Prince",
    "Princess", "Pope", "Chancellor", "Minister", "Secretary", "Chairman", "Chairwoman", "CEO",
];

const ORG_SUFFIXES: &[&str] = &[
    "Inc", "Corp", "Corporation", "Ltd", "LLC", "LLP", "Plc", "PLC", "GmbH", "AG", "SA", "Co",
    "Company", "Group", "Holdings", "Partners", "Bank", "University", "College", "Institute",
    "Foundation", "Association", "Agency", "Authority", "Bureau", "Council", "Committee",
    "Commission", "Party", "Ministry", "Department", "Airlines", "Airways", "Motors",
    "Technologies", "Systems", "Labs", "Laboratories", "Pharmaceuticals", "Industries",
    "Enterprises", "Media", "Times", "News", "Post", "Journal", "Club", "FC", "Union",
    "Federation", "Organization", "Organisation", "Court", "Army", "Navy", "Police",
    "Hospital", "School", "Museum", "Fund", "Trust", "Network", "Services", "Solutions",
];

const ORG_HEADS: &[&str] = &[
    "University", "Bank", "Department", "Ministry", "Institute", "Museum", "Board", "Office",
    "Bureau", "House", "Church", "Academy", "Federal", "National", "Royal",
];

const LOC_HEADS: &[&str] = &["Mount", "Mt", "Lake", "Cape", "Gulf", "Isle", "Port"];

const LOC_SUFFIXES: &[&str] = &[
    "River", "Mountain", "Mountains", "Ocean", "Sea", "Lake", "Valley", "Desert", "Island",
    "Islands", "Bay", "Gulf", "Peninsula", "Forest", "Canyon", "Coast", "Strait", "Falls",
];

/// Lowercase words between capitalised words that keep a name together.
const CONNECTORS: &[&str] = &[
    "of", "de", "du", "da", "van", "von", "der", "den", "del", "la", "le",
];

/// Capitalised words stripped from the front of a candidate (compared lowercased).
const LEADING_FUNCTION_WORDS: &[&str] = &[
    "the", "a", "an", "this", "that", "these", "those", "in", "on", "at", "for", "from", "to",
    "by", "with", "but", "and", "or", "if", "when", "while", "after", "before", "as", "so",
    "however", "meanwhile", "yesterday", "today", "tomorrow", "last", "next", "our", "their",
    "his", "her", "its", "my", "your", "we", "they", "he", "she", "it", "i", "there", "here",
    "according", "during", "since", "then", "also", "all", "some", "many", "most", "every",
];

/// Uppercase words that are not organisations.
const COMMON_ACRONYMS: &[&str] = &[
    "CEO", "CFO", "CTO", "COO", "AI", "OK", "PDF", "TV", "PM", "AM", "FAQ", "API", "URL",
    "HTML", "USB", "GDP", "DNA", "ID", "PS", "NB", "FYI", "ASAP", "II", "III", "IV",
];

/// Spelled-out numbers; "Chapter One" or "Phase Two" is not a name.
const NUMBER_WORDS: &[&str] = &[
    "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten", "eleven",
    "twelve", "twenty", "hundred", "thousand", "first", "second", "third",
];

/// Words before a lone capitalised word that mark it as a place.
const PLACE_PREPOSITIONS: &[&str] = &["in", "at", "from", "near"];

/// Words after a lone capitalised word that mark it as a person.
const SPEECH_VERBS: &[&str] = &[
    "said", "says", "told", "wrote", "added", "argued", "explained", "noted", "asked",
];

struct Pattern {
    label: &'static str,
    regex: Regex,
}

/// Pattern- and gazetteer-based entity tagger.
pub struct RuleTagger {
    patterns: Vec<Pattern>,
    gazetteer: Gazetteer,
}

impl RuleTagger {
    pub fn new(gazetteer: Gazetteer) -> anyhow::Result<Self> {
        let amount = r"\d[\d,]*(?:\.\d+)?";
        let scale = r"(?i:million|billion|trillion|thousand)";
        let patterns = vec![
            (
                "MONEY",
                format!(
                    r"[$€£¥]\s?{amount}(?:\s{scale})?\b|\b{amount}(?:\s{scale})?\s(?i:dollars|euros|pounds|yen)\b|\b(?:USD|EUR|GBP)\s?{amount}\b"
                ),
            ),
            (
                "PERCENT",
                r"\b\d+(?:\.\d+)?(?:\s?%|\s?(?i:percent|per\s+cent)\b)".to_string(),
            ),
            (
                "DATE",
                format!(
                    r"\b(?:{MONTHS}|{MONTH_ABBREVIATIONS})\.?\s+\d{{1,2}}(?:st|nd|rd|th)?(?:,?\s+\d{{4}})?\b|\b\d{{1,2}}(?:st|nd|rd|th)?\s+(?:of\s+)?(?:{MONTHS})(?:,?\s+\d{{4}})?\b|\b(?:{MONTHS})\s+\d{{4}}\b|\b\d{{4}}-\d{{2}}-\d{{2}}\b|\b\d{{1,2}}/\d{{1,2}}/\d{{2,4}}\b|\b(?:Monday|Tuesday|Wednesday|Thursday|Friday|Saturday|Sunday)\b|\b(?:18|19|20)\d0s\b|\b(?:January|February|March|April|June|July|August|September|October|November|December)\b"
                ),
            ),
            // A bare year needs a temporal word in front; "2000 shares" stays CARDINAL.
            (
                "DATE",
                r"(?i:\b(?:in|since|until|till|before|after|during|through|circa|year|fiscal|early|late|mid)\s+)(?P<span>(?:18|19|20)\d{2})\b".to_string(),
            ),
            (
                "TIME",
                r"\b\d{1,2}:\d{2}\b(?:\s?(?i:a\.m\.|p\.m\.|am\b|pm\b))?|\b\d{1,2}\s?(?i:a\.m\.|p\.m\.|am\b|pm\b)".to_string(),
            ),
            ("CARDINAL", format!(r"\b{amount}\b")),
        ];

        let patterns = patterns
            .into_iter()
            .map(|(label, source)| {
                Regex::new(&source)
                    .map(|regex| Pattern { label, regex })
                    .map_err(|e| anyhow::anyhow!("compile {label} pattern: {e}"))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(Self {
            patterns,
            gazetteer,
        })
    }

    pub fn gazetteer(&self) -> &Gazetteer {
        &self.gazetteer
    }

    /// Tag the text, returning byte ranges and labels in document order.
    pub fn tag_spans(&self, text: &str) -> Vec<TaggedSpan> {
        let mut tagged: Vec<TaggedSpan> = Vec::new();

        for pattern in &self.patterns {
            for caps in pattern.regex.captures_iter(text) {
                // `span` narrows a match that includes context words.
                let Some(m) = caps.name("span").or_else(|| caps.get(0)) else {
                    continue;
                };
                if !overlaps(&tagged, m.start(), m.end()) {
                    tagged.push(TaggedSpan {
                        start: m.start(),
                        end: m.end(),
                        label: pattern.label.to_string(),
                    });
                }
            }
        }

        let tokens = words(text);
        let sentence_starts = sentence_start_flags(text, &tokens);
        let free: Vec<bool> = tokens
            .iter()
            .map(|t| !overlaps(&tagged, t.start, t.end))
            .collect();

        let mut names = Vec::new();
        let mut i = 0;
        while i < tokens.len() {
            if !free[i] || !tokens[i].is_capitalized() {
                i += 1;
                continue;
            }

            let mut j = i;
            while j + 1 < tokens.len() {
                let next = j + 1;
                if free[next]
                    && tokens[next].is_capitalized()
                    && gap_joins(text, &tokens[j], &tokens[next])
                {
                    j = next;
                } else if next + 1 < tokens.len()
                    && free[next]
                    && free[next + 1]
                    && CONNECTORS.contains(&tokens[next].text)
                    && tokens[next + 1].is_capitalized()
                    && gap_joins(text, &tokens[j], &tokens[next])
                    && gap_joins(text, &tokens[next], &tokens[next + 1])
                {
                    j = next + 1;
                } else {
                    break;
                }
            }

            if let Some(span) = self.classify(text, &tokens, i, j, &sentence_starts) {
                names.push(span);
            }
            i = j + 1;
        }

        tagged.extend(names);
        tagged.sort_by_key(|s| s.start);
        tagged
    }

    /// Label the candidate `tokens[first..=last]`, or drop it.
    fn classify(
        &self,
        text: &str,
        tokens: &[Token<'_>],
        first: usize,
        last: usize,
        sentence_starts: &[bool],
    ) -> Option<TaggedSpan> {
        let mut start = first;
        while start <= last
            && (LEADING_FUNCTION_WORDS.contains(&tokens[start].text.to_lowercase().as_str())
                || CONNECTORS.contains(&tokens[start].text))
        {
            start += 1;
        }
        if start > last {
            return None;
        }

        if start < last && TITLES.contains(&tokens[start].text) {
            // "President of France" names the office; label what follows "of" on its own.
            if CONNECTORS.contains(&tokens[start + 1].text) {
                return self.classify(text, tokens, start + 2, last, sentence_starts);
            }
            return Some(span_of(text, tokens, start + 1, last, "PERSON"));
        }

        if tokens[start..=last]
            .iter()
            .any(|t| NUMBER_WORDS.contains(&t.text.to_lowercase().as_str()))
        {
            return None;
        }

        let candidate = span_of(text, tokens, start, last, "");
        let phrase = &text[candidate.start..candidate.end];
        let head = tokens[start].text;
        let tail = tokens[last].text;
        let len = last - start + 1;

        let label = if let Some(label) = self.gazetteer.lookup(phrase) {
            label
        } else if len > 1 && ORG_SUFFIXES.contains(&tail) {
            "ORG"
        } else if len > 1 && (LOC_HEADS.contains(&head) || LOC_SUFFIXES.contains(&tail)) {
            "LOC"
        } else if len > 1 && ORG_HEADS.contains(&head) {
            "ORG"
        } else if len == 1 {
            self.classify_single(tokens, start, sentence_starts[start])?
        } else if tokens[start..=last]
            .iter()
            .any(|t| CONNECTORS.contains(&t.text))
            || gap_has_ampersand(text, tokens, start, last)
        {
            "ORG"
        } else if len <= 3
            && tokens[start..=last]
                .iter()
                .all(|t| t.text.chars().all(char::is_alphabetic) && !t.is_acronym())
        {
            "PERSON"
        } else {
            "ORG"
        };

        Some(TaggedSpan {
            label: label.to_string(),
            ..candidate
        })
    }

    fn classify_single(
        &self,
        tokens: &[Token<'_>],
        index: usize,
        sentence_initial: bool,
    ) -> Option<&'static str> {
        let token = &tokens[index];
        if token.text.chars().count() < 2 {
            return None;
        }
        if token.is_acronym() {
            return (!COMMON_ACRONYMS.contains(&token.text)).then_some("ORG");
        }
        if sentence_initial {
            return None;
        }
        if token.text == "May" {
            return Some("DATE");
        }

        let prev = index
            .checked_sub(1)
            .map(|p| tokens[p].text.to_lowercase());
        if prev.is_some_and(|p| PLACE_PREPOSITIONS.contains(&p.as_str())) {
            return Some("GPE");
        }
        let next = tokens.get(index + 1).map(|t| t.text.to_lowercase());
        if next.is_some_and(|n| SPEECH_VERBS.contains(&n.as_str())) {
            return Some("PERSON");
        }
        None
    }
}

impl EntityTagger for RuleTagger {
    fn name(&self) -> &str {
        "rules"
    }

    fn tag(&self, text: &str) -> anyhow::Result<Vec<Entity>> {
        Ok(self
            .tag_spans(text)
            .into_iter()
            .map(|span| Entity::new(&text[span.start..span.end], span.label))
            .collect())
    }
}

fn overlaps(spans: &[TaggedSpan], start: usize, end: usize) -> bool {
    spans.iter().any(|s| start < s.end && s.start < end)
}

/// Span over `tokens[first..=last]`, minus a trailing possessive.
fn span_of(text: &str, tokens: &[Token<'_>], first: usize, last: usize, label: &str) -> TaggedSpan {
    let start = tokens[first].start;
    let mut end = tokens[last].end;
    for possessive in ["'s", "\u{2019}s"] {
        if text[start..end].ends_with(possessive) && end - possessive.len() > start {
            end -= possessive.len();
            break;
        }
    }
    TaggedSpan {
        start,
        end,
        label: label.to_string(),
    }
}

/// Whether two adjacent capitalised tokens belong to the same name.
fn gap_joins(text: &str, left: &Token<'_>, right: &Token<'_>) -> bool {
    let gap = &text[left.end..right.start];
    if gap.is_empty() {
        return false;
    }
    if gap.chars().all(|c| c == ' ' || c == '\t') {
        return true;
    }
    let inner = gap.trim_matches(|c| c == ' ' || c == '\t');
    match inner {
        "&" => true,
        // "Dr. Smith", "J. Smith"
        "." => {
            gap.starts_with('.')
                && gap.len() > 1
                && (TITLES.contains(&left.text)
                    || (left.text.chars().count() == 1 && left.is_capitalized()))
        }
        _ => false,
    }
}

fn gap_has_ampersand(text: &str, tokens: &[Token<'_>], first: usize, last: usize) -> bool {
    (first..last).any(|i| text[tokens[i].end..tokens[i + 1].start].contains('&'))
}

/// `flags[i]` is true when `tokens[i]` is the first word of a sentence.
fn sentence_start_flags(text: &str, tokens: &[Token<'_>]) -> Vec<bool> {
    let mut flags = vec![false; tokens.len()];
    let mut t = 0;
    for sentence in sentences(text) {
        while t < tokens.len() && tokens[t].start < sentence.start {
            t += 1;
        }
        if t < tokens.len() && tokens[t].start < sentence.end {
            flags[t] = true;
        }
    }
    flags
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tagger() -> RuleTagger {
        RuleTagger::new(Gazetteer::builtin()).unwrap()
    }

    fn pairs(text: &str) -> Vec<(String, String)> {
        tagger()
            .tag(text)
            .unwrap()
            .into_iter()
            .map(|e| (e.text, e.label))
            .collect()
    }

    fn has(text: &str, entity: &str, label: &str) -> bool {
        pairs(text)
            .iter()
            .any(|(t, l)| t == entity && l == label)
    }

    #[test]
    fn mixed_sentence() {
        let text = "Dr. Jane Smith joined Acme Corp in London on March 3, 2021 for $5 million.";
        assert_eq!(
            pairs(text),
            vec![
                ("Jane Smith".to_string(), "PERSON".to_string()),
                ("Acme Corp".to_string(), "ORG".to_string()),
                ("London".to_string(), "GPE".to_string()),
                ("March 3, 2021".to_string(), "DATE".to_string()),
                ("$5 million".to_string(), "MONEY".to_string()),
            ]
        );
    }

    #[test]
    fn numeric_patterns() {
        let text = "Sales grew 12.5% to 1,200 units by 10:30 a.m. on 2023-04-01.";
        assert!(has(text, "12.5%", "PERCENT"));
        assert!(has(text, "1,200", "CARDINAL"));
        assert!(has(text, "10:30 a.m.", "TIME"));
        assert!(has(text, "2023-04-01", "DATE"));
    }

    #[test]
    fn bare_years_need_temporal_context() {
        assert_eq!(
            pairs("I bought 2000 shares."),
            vec![("2000".to_string(), "CARDINAL".to_string())]
        );
        assert!(has("The plant opened in 1998 after delays.", "1998", "DATE"));
        assert!(has("Prices peaked in the 1990s.", "1990s", "DATE"));
        assert!(has("Sales grew during fiscal 2022.", "2022", "DATE"));
    }

    #[test]
    fn title_of_place_is_not_a_person() {
        assert_eq!(
            pairs("The President of France visited Berlin."),
            vec![
                ("France".to_string(), "GPE".to_string()),
                ("Berlin".to_string(), "GPE".to_string()),
            ]
        );
        assert!(has("Yesterday President Lincoln spoke.", "Lincoln", "PERSON"));
    }

    #[test]
    fn numbered_headings_are_not_names() {
        assert!(pairs("Chapter One begins here. It was cold.").is_empty());
    }

    #[test]
    fn money_forms() {
        assert!(has("It cost 40 dollars.", "40 dollars", "MONEY"));
        assert!(has("A budget of €3.2 billion was set.", "€3.2 billion", "MONEY"));
    }

    #[test]
    fn leading_determiner_stripped() {
        assert!(has("The United Nations met today.", "United Nations", "ORG"));
    }

    #[test]
    fn org_heads_and_connectors() {
        assert!(has(
            "She studied at the University of Oxford last year.",
            "University of Oxford",
            "ORG"
        ));
        assert!(has(
            "Analysts expect Johnson & Johnson to report.",
            "Johnson & Johnson",
            "ORG"
        ));
    }

    #[test]
    fn locations_by_suffix() {
        assert!(has("They sailed down the Colorado River.", "Colorado River", "LOC"));
        assert!(has("We hiked Mount Rainier.", "Mount Rainier", "LOC"));
    }

    #[test]
    fn single_words_need_context() {
        assert!(has("The office in Springfield closed.", "Springfield", "GPE"));
        assert!(has("Yesterday Harris said the plan works.", "Harris", "PERSON"));
        assert!(pairs("Nothing here is Interesting at all.").is_empty());
    }

    #[test]
    fn acronyms() {
        assert!(has("The deal was approved by the SEC on Friday.", "SEC", "ORG"));
        assert!(!has("Our CEO spoke.", "CEO", "ORG"));
    }

    #[test]
    fn possessive_trimmed() {
        assert!(has("We met Mr. Brown's lawyer.", "Brown", "PERSON"));
    }

    #[test]
    fn gazetteer_nationalities() {
        assert!(has("Several French companies bid.", "French", "NORP"));
    }

    #[test]
    fn entities_do_not_overlap() {
        let spans = tagger().tag_spans("In May 2020 Apple Inc paid $2 billion to Paris SA.");
        for pair in spans.windows(2) {
            assert!(pair[0].end <= pair[1].start, "{pair:?}");
        }
    }

    #[test]
    fn empty_text() {
        assert!(tagger().tag("").unwrap().is_empty());
        assert!(tagger().tag("   ").unwrap().is_empty());
    }

    #[test]
    fn custom_gazetteer_label() {
        let mut gazetteer = Gazetteer::builtin();
        gazetteer.insert("Widget Pro", "PRODUCT");
        let tagger = RuleTagger::new(gazetteer).unwrap();
        let entities = tagger.tag("We shipped the Widget Pro to customers.").unwrap();
        assert_eq!(entities, vec![Entity::new("Widget Pro", "PRODUCT")]);
    }
}
