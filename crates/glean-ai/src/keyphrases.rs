//! Embedding-based keyphrase extraction.
//!
//! Candidates are stopword-free n-grams taken within sentence boundaries.
//! Each candidate is embedded with the shared [`TextEncoder`] and scored by
//! cosine similarity to the document embedding; the final set is chosen by
//! MMR (or plain top-n) and returned best first.

use std::sync::Arc;

use glean_core::config::KeyphraseConfig;
use glean_core::text::{Token, is_blank, sentences, words};
use rustc_hash::FxHashSet;
use tracing::debug;

use crate::encoder::{TextEncoder, cosine};
use crate::mmr;
use crate::stopwords::StopwordFilter;

/// Candidates embedded per `encode_batch` call.
const ENCODE_CHUNK: usize = 256;

#[derive(Debug, Clone, PartialEq)]
pub struct Keyphrase {
    pub phrase: String,
    /// Cosine similarity to the document.
    pub score: f32,
}

pub struct KeyphraseExtractor {
    encoder: Arc<dyn TextEncoder>,
    stopwords: StopwordFilter,
    config: KeyphraseConfig,
}

impl KeyphraseExtractor {
    pub fn new(encoder: Arc<dyn TextEncoder>, config: KeyphraseConfig) -> Self {
        Self {
            encoder,
            stopwords: StopwordFilter::english(),
            config,
        }
    }

    pub fn with_stopwords(mut self, stopwords: StopwordFilter) -> Self {
        self.stopwords = stopwords;
        self
    }

    pub fn config(&self) -> &KeyphraseConfig {
        &self.config
    }

    /// Lowercased candidate phrases in first-seen order.
    pub fn candidates(&self, text: &str) -> Vec<String> {
        let min = self.config.ngram_min.max(1);
        let max = self.config.ngram_max.max(min);

        let mut seen = FxHashSet::default();
        let mut out = Vec::new();
        for sentence in sentences(text) {
            let slice = sentence.slice(text);
            let tokens = words(slice);
            for n in min..=max {
                for window in tokens.windows(n) {
                    if !self.is_candidate(slice, window) {
                        continue;
                    }
                    let phrase = window
                        .iter()
                        .map(|t| t.text.to_lowercase())
                        .collect::<Vec<_>>()
                        .join(" ");
                    if seen.insert(phrase.clone()) {
                        out.push(phrase);
                    }
                }
            }
        }
        out
    }

    fn is_candidate(&self, text: &str, window: &[Token<'_>]) -> bool {
        let tokens_ok = window.iter().all(|t| {
            t.text.chars().count() >= 2 && !t.is_numeric() && !self.stopwords.is_stopword(t.text)
        });
        // Single spaces only, so the joined phrase is a substring of the input.
        tokens_ok
            && window
                .windows(2)
                .all(|pair| &text[pair[0].end..pair[1].start] == " ")
    }

    /// Extract keyphrases, embedding the document first.
    pub fn extract(&self, text: &str) -> anyhow::Result<Vec<Keyphrase>> {
        if is_blank(text) {
            return Ok(Vec::new());
        }
        let document = self.encoder.encode(text)?;
        self.extract_with_document(text, &document)
    }

    /// Extract keyphrases against an existing document embedding.
    pub fn extract_with_document(
        &self,
        text: &str,
        document: &[f32],
    ) -> anyhow::Result<Vec<Keyphrase>> {
        let candidates = self.candidates(text);
        if candidates.is_empty() || self.config.top_n == 0 {
            return Ok(Vec::new());
        }

        let mut embeddings = Vec::with_capacity(candidates.len());
        for chunk in candidates.chunks(ENCODE_CHUNK) {
            let refs: Vec<&str> = chunk.iter().map(String::as_str).collect();
            embeddings.extend(self.encoder.encode_batch(&refs)?);
        }
        anyhow::ensure!(
            embeddings.len() == candidates.len(),
            "{} returned {} vectors for {} candidates",
            self.encoder.name(),
            embeddings.len(),
            candidates.len()
        );

        let relevance: Vec<f32> = embeddings.iter().map(|e| cosine(document, e)).collect();
        let selected = if self.config.use_mmr {
            mmr::select(
                &relevance,
                &embeddings,
                self.config.top_n,
                1.0 - self.config.diversity,
            )
        } else {
            mmr::top_k(&relevance, self.config.top_n)
        };

        let mut phrases: Vec<Keyphrase> = selected
            .into_iter()
            .map(|i| Keyphrase {
                phrase: candidates[i].clone(),
                score: relevance[i],
            })
            .collect();
        phrases.sort_by(|a, b| b.score.total_cmp(&a.score));

        debug!(
            candidates = candidates.len(),
            selected = phrases.len(),
            "extracted keyphrases"
        );
        Ok(phrases)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::HashingEncoder;

    const TEXT: &str = "Rust ownership rules let the compiler catch memory bugs. \
        The borrow checker enforces ownership at compile time. \
        Ownership and borrowing make Rust programs memory safe without a garbage collector.";

    fn extractor(config: KeyphraseConfig) -> KeyphraseExtractor {
        KeyphraseExtractor::new(Arc::new(HashingEncoder::default()), config)
    }

    #[test]
    fn candidates_skip_stopwords_numbers_and_punctuation() {
        let kx = extractor(KeyphraseConfig::default());
        let candidates = kx.candidates("The 3 borrow checkers, compilers.");
        assert!(candidates.contains(&"borrow".to_string()));
        assert!(candidates.contains(&"borrow checkers".to_string()));
        assert!(!candidates.contains(&"the".to_string()));
        assert!(!candidates.contains(&"3".to_string()));
        assert!(!candidates.contains(&"checkers compilers".to_string()));
    }

    #[test]
    fn candidates_stay_within_sentences() {
        let kx = extractor(KeyphraseConfig::default());
        let candidates = kx.candidates("Memory safety matters. Compilers help.");
        assert!(candidates.contains(&"memory safety".to_string()));
        assert!(!candidates.iter().any(|c| c.contains("matters compilers")));
    }

    #[test]
    fn phrases_are_substrings_despite_irregular_whitespace() {
        let text = "Compiler engineers study memory\nsafety.  Borrow  checkers enforce memory\tsafety rules.";
        let kx = extractor(KeyphraseConfig::default());
        let lowered = text.to_lowercase();

        let candidates = kx.candidates(text);
        assert!(candidates.contains(&"study memory".to_string()));
        assert!(!candidates.contains(&"memory safety".to_string()));
        for candidate in &candidates {
            assert!(lowered.contains(candidate.as_str()), "{candidate} not in text");
        }
        for k in kx.extract(text).unwrap() {
            assert!(lowered.contains(&k.phrase), "{} not in text", k.phrase);
        }
    }

    #[test]
    fn ngram_range_is_respected() {
        let kx = extractor(KeyphraseConfig {
            ngram_min: 1,
            ngram_max: 1,
            ..KeyphraseConfig::default()
        });
        assert!(kx.candidates(TEXT).iter().all(|c| !c.contains(' ')));
    }

    #[test]
    fn candidates_are_deduplicated() {
        let kx = extractor(KeyphraseConfig::default());
        let candidates = kx.candidates("Ownership matters. Ownership matters.");
        let count = candidates.iter().filter(|c| *c == "ownership").count();
        assert_eq!(count, 1);
    }

    #[test]
    fn extracts_ranked_phrases_from_the_text() {
        let kx = extractor(KeyphraseConfig::default());
        let phrases = kx.extract(TEXT).unwrap();

        assert!(!phrases.is_empty());
        assert!(phrases.len() <= 10);
        let lowered = TEXT.to_lowercase();
        for k in &phrases {
            assert!(lowered.contains(&k.phrase), "{} not in text", k.phrase);
        }
        for pair in phrases.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
        assert!(phrases.iter().any(|k| k.phrase.contains("ownership")));
    }

    #[test]
    fn top_n_limits_output() {
        let kx = extractor(KeyphraseConfig {
            top_n: 3,
            use_mmr: false,
            ..KeyphraseConfig::default()
        });
        assert_eq!(kx.extract(TEXT).unwrap().len(), 3);
    }

    #[test]
    fn blank_text_has_no_keyphrases() {
        let kx = extractor(KeyphraseConfig::default());
        assert!(kx.extract("").unwrap().is_empty());
        assert!(kx.extract("  \n ").unwrap().is_empty());
        assert!(kx.extract("the and of").unwrap().is_empty());
    }
}
