//! English stopword filtering for keyphrase candidates.
//!
//! Uses the `stop-words` crate list plus a few web-boilerplate words that
//! make poor keyphrases.

use rustc_hash::FxHashSet;
use stop_words::{LANGUAGE, get};

const EXTRA_STOPWORDS: &[&str] = &[
    "also", "may", "might", "must", "would", "could", "should", "will", "can", "said", "says",
    "one", "two", "new", "like", "just", "get", "got", "use", "used", "using", "many", "much",
    "click", "read", "share", "via",
];

/// Case-insensitive stopword set.
#[derive(Debug, Clone)]
pub struct StopwordFilter {
    stopwords: FxHashSet<String>,
}

impl Default for StopwordFilter {
    fn default() -> Self {
        Self::english()
    }
}

impl StopwordFilter {
    /// English stopwords.
    pub fn english() -> Self {
        let mut stopwords: FxHashSet<String> = get(LANGUAGE::English)
            .iter()
            .map(|s| s.to_lowercase())
            .collect();
        stopwords.extend(EXTRA_STOPWORDS.iter().map(|s| s.to_string()));
        Self { stopwords }
    }

    /// A filter from a custom list.
    pub fn from_list(words: &[&str]) -> Self {
        Self {
            stopwords: words.iter().map(|w| w.to_lowercase()).collect(),
        }
    }

    pub fn is_stopword(&self, word: &str) -> bool {
        if self.stopwords.contains(word) {
            return true;
        }
        word.chars().any(char::is_uppercase) && self.stopwords.contains(&word.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.stopwords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stopwords.is_empty()
    }
}
