//! Text utilities shared by the models: word tokens, sentence spans, and
//! word-budget truncation.
//!
//! All positions are byte offsets into the original string, so callers can
//! slice the input without copying.
//!
//! # Word rules
//!
//! - A word is a run of alphanumeric characters.
//! - `'`, `’` and `-` stay inside a word when followed by an alphanumeric
//!   ("don't", "state-of-the-art").
//! - `.` and `,` stay inside a word only between two digits ("3.5", "1,200").
//!
//! # Sentence rules
//!
//! A sentence ends at `.`, `!` or `?` (plus any closing quotes or brackets)
//! followed by whitespace and an uppercase letter, a digit, or an opening
//! quote. A blank line always ends a sentence. A `.` after a known
//! abbreviation ("Dr.", "e.g.") or a single-letter initial does not.

/// A word and its byte range in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub text: &'a str,
    pub start: usize,
    pub end: usize,
}

impl Token<'_> {
    /// First character is uppercase.
    pub fn is_capitalized(&self) -> bool {
        self.text.chars().next().is_some_and(char::is_uppercase)
    }

    /// Every letter is uppercase and there are at least two of them ("NASA").
    pub fn is_acronym(&self) -> bool {
        let letters = self.text.chars().filter(|c| c.is_alphabetic()).count();
        letters >= 2
            && self
                .text
                .chars()
                .all(|c| !c.is_alphabetic() || c.is_uppercase())
    }

    /// Digits only, allowing inner `.` and `,`.
    pub fn is_numeric(&self) -> bool {
        self.text.chars().next().is_some_and(|c| c.is_ascii_digit())
            && self
                .text
                .chars()
                .all(|c| c.is_ascii_digit() || c == '.' || c == ',')
    }
}

/// A byte range in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn slice<'a>(&self, text: &'a str) -> &'a str {
        &text[self.start..self.end]
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

/// Abbreviations whose trailing `.` does not end a sentence (lowercased, without the final dot).
const ABBREVIATIONS: &[&str] = &[
    "mr", "mrs", "ms", "dr", "prof", "sr", "jr", "st", "mt", "rev", "gen", "gov", "sen", "rep",
    "col", "lt", "sgt", "capt", "vs", "no", "fig", "approx", "e.g", "i.e", "u.s", "u.k", "jan",
    "feb", "mar", "apr", "jun", "jul", "aug", "sep", "sept", "oct", "nov", "dec",
];

/// True for empty or whitespace-only text.
pub fn is_blank(text: &str) -> bool {
    text.trim().is_empty()
}

/// Collapse every run of whitespace into a single space and trim the ends.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split text into word tokens.
pub fn words(text: &str) -> Vec<Token<'_>> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        if !chars[i].1.is_alphanumeric() {
            i += 1;
            continue;
        }

        let start = chars[i].0;
        let mut j = i + 1;
        while j < chars.len() {
            let c = chars[j].1;
            if c.is_alphanumeric() {
                j += 1;
                continue;
            }
            let prev = chars[j - 1].1;
            let next = chars.get(j + 1).map(|&(_, n)| n);
            let joins = match c {
                '\'' | '\u{2019}' | '-' => next.is_some_and(char::is_alphanumeric),
                '.' | ',' => prev.is_ascii_digit() && next.is_some_and(|n| n.is_ascii_digit()),
                _ => false,
            };
            if !joins {
                break;
            }
            // Skip the joiner and the alphanumeric after it.
            j += 2;
        }

        let end = chars.get(j).map_or(text.len(), |&(b, _)| b);
        tokens.push(Token {
            text: &text[start..end],
            start,
            end,
        });
        i = j;
    }

    tokens
}

/// Split text into trimmed, non-empty sentence spans.
pub fn sentences(text: &str) -> Vec<Span> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let mut spans = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < chars.len() {
        let (pos, c) = chars[i];

        if c == '\n' {
            let gap_end = skip_whitespace(&chars, i);
            if count_newlines(&chars[i..gap_end]) >= 2 {
                push_trimmed(text, start, pos, &mut spans);
                start = byte_at(&chars, gap_end, text.len());
                i = gap_end;
            } else {
                i += 1;
            }
            continue;
        }

        if !is_terminal(c) {
            i += 1;
            continue;
        }

        // Swallow "?!", "...", and closing quotes or brackets.
        let mut j = i + 1;
        while j < chars.len() && (is_terminal(chars[j].1) || is_closing(chars[j].1)) {
            j += 1;
        }
        let end = byte_at(&chars, j, text.len());

        if j < chars.len() && !chars[j].1.is_whitespace() {
            i = j;
            continue;
        }

        let k = skip_whitespace(&chars, j);
        let boundary = match chars.get(k) {
            None => true,
            Some(_) if count_newlines(&chars[j..k]) >= 2 => true,
            Some(&(_, next)) => {
                let opens = next.is_uppercase() || next.is_ascii_digit() || is_opening(next);
                opens && !(c == '.' && ends_with_abbreviation(&text[start..pos]))
            }
        };

        if boundary {
            push_trimmed(text, start, end, &mut spans);
            start = byte_at(&chars, k, text.len());
        }
        i = k;
    }

    push_trimmed(text, start, text.len(), &mut spans);
    spans
}

/// The prefix of `text` that ends with its `max_words`-th word.
///
/// Text with `max_words` words or fewer is returned unchanged.
pub fn truncate_words(text: &str, max_words: usize) -> &str {
    if max_words == 0 {
        return "";
    }
    let tokens = words(text);
    if tokens.len() <= max_words {
        return text;
    }
    &text[..tokens[max_words - 1].end]
}

fn is_terminal(c: char) -> bool {
    matches!(c, '.' | '!' | '?')
}

fn is_closing(c: char) -> bool {
    matches!(c, '"' | '\'' | ')' | ']' | '\u{201D}' | '\u{2019}')
}

fn is_opening(c: char) -> bool {
    matches!(c, '"' | '\'' | '(' | '[' | '\u{201C}' | '\u{2018}')
}

fn skip_whitespace(chars: &[(usize, char)], mut i: usize) -> usize {
    while i < chars.len() && chars[i].1.is_whitespace() {
        i += 1;
    }
    i
}

fn count_newlines(chars: &[(usize, char)]) -> usize {
    chars.iter().filter(|&&(_, c)| c == '\n').count()
}

fn byte_at(chars: &[(usize, char)], i: usize, len: usize) -> usize {
    chars.get(i).map_or(len, |&(b, _)| b)
}

fn push_trimmed(text: &str, start: usize, end: usize, spans: &mut Vec<Span>) {
    if start >= end {
        return;
    }
    let slice = &text[start..end];
    let lead = slice.len() - slice.trim_start().len();
    let trail = slice.len() - slice.trim_end().len();
    let span = Span {
        start: start + lead,
        end: end - trail,
    };
    if !span.is_empty() {
        spans.push(span);
    }
}

/// Whether the text before a `.` ends in an abbreviation or an initial.
fn ends_with_abbreviation(before_dot: &str) -> bool {
    let word_start = before_dot
        .char_indices()
        .rev()
        .find(|&(_, c)| !(c.is_alphanumeric() || c == '.'))
        .map_or(0, |(b, c)| b + c.len_utf8());
    let word = &before_dot[word_start..];
    let mut letters = word.chars();
    match (letters.next(), letters.next()) {
        (None, _) => false,
        (Some(c), None) => c.is_alphabetic(),
        _ => ABBREVIATIONS.contains(&word.to_lowercase().as_str()),
    }
}
