//! Phrase → label lookup for the entity tagger.
//!
//! Ships a small built-in list of places, nationalities, and well-known
//! organisations. Deployments extend it with a JSON file of the form
//! `{"LABEL": ["phrase", ...]}`.

use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use rustc_hash::FxHashMap;
use tracing::info;

const GPE: &[&str] = &[
    "Afghanistan", "Argentina", "Australia", "Austria", "Bangladesh", "Belgium", "Brazil",
    "Canada", "Chile", "China", "Colombia", "Denmark", "Egypt", "England", "Ethiopia",
    "Finland", "France", "Germany", "Greece", "India", "Indonesia", "Iran", "Iraq", "Ireland",
    "Israel", "Italy", "Japan", "Kenya", "Mexico", "Netherlands", "New Zealand", "Nigeria",
    "Norway", "Pakistan", "Peru", "Philippines", "Poland", "Portugal", "Russia",
    "Saudi Arabia", "Scotland", "Singapore", "South Africa", "South Korea", "Spain", "Sweden",
    "Switzerland", "Taiwan", "Thailand", "Turkey", "Ukraine", "United Kingdom",
    "United States", "United States of America", "Vietnam", "Wales", "UK", "US", "USA",
    "Amsterdam", "Athens", "Bangkok", "Beijing", "Berlin", "Boston", "Brussels", "Cairo",
    "Chicago", "Delhi", "Dublin", "Geneva", "Hong Kong", "Istanbul", "Jakarta", "Lagos",
    "Lisbon", "London", "Los Angeles", "Madrid", "Manchester", "Melbourne", "Mexico City",
    "Moscow", "Mumbai", "Nairobi", "New York", "New York City", "Oslo", "Paris", "Rome",
    "San Francisco", "Seattle", "Seoul", "Shanghai", "Stockholm", "Sydney", "Tokyo",
    "Toronto", "Vienna", "Warsaw", "Washington", "Zurich", "California", "Texas", "Florida",
];

const LOC: &[&str] = &[
    "Africa", "Antarctica", "Asia", "Europe", "North America", "South America",
    "Latin America", "Middle East", "Southeast Asia", "Arctic", "Atlantic", "Pacific",
    "Mediterranean", "Sahara", "Alps", "Himalayas", "Amazon Basin",
];

const NORP: &[&str] = &[
    "American", "Americans", "British", "Canadian", "Chinese", "Dutch", "English", "European",
    "Europeans", "French", "German", "Germans", "Indian", "Irish", "Italian", "Japanese",
    "Korean", "Mexican", "Russian", "Russians", "Spanish", "Swedish", "Ukrainian", "African",
    "Asian", "Christian", "Christians", "Muslim", "Muslims", "Jewish", "Hindu", "Buddhist",
    "Catholic", "Democrat", "Democrats", "Republican", "Republicans",
];

const ORG: &[&str] = &[
    "United Nations", "European Union", "World Health Organization", "NATO", "UN", "EU",
    "WHO", "IMF", "World Bank", "Federal Reserve", "FBI", "CIA", "NASA", "Congress",
    "Parliament", "Senate", "Google", "Microsoft", "Apple", "Amazon", "Meta", "Facebook",
    "Tesla", "Netflix", "IBM", "Intel", "Nvidia", "OpenAI", "Reuters", "BBC", "CNN",
];

/// Exact-match phrase lookup. Case-sensitive, so "Apple" and "apple" differ.
#[derive(Debug, Clone, Default)]
pub struct Gazetteer {
    phrases: FxHashMap<String, String>,
}

impl Gazetteer {
    /// An empty gazetteer.
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in phrase lists.
    pub fn builtin() -> Self {
        let mut gazetteer = Self::new();
        for (label, phrases) in [("GPE", GPE), ("LOC", LOC), ("NORP", NORP), ("ORG", ORG)] {
            for phrase in phrases {
                gazetteer.insert(phrase, label);
            }
        }
        gazetteer
    }

    /// Add phrases from a JSON file, overriding built-in labels on conflict.
    pub fn extend_from_file(&mut self, path: &Path) -> anyhow::Result<usize> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading gazetteer {}", path.display()))?;
        let entries: HashMap<String, Vec<String>> = serde_json::from_str(&raw)
            .with_context(|| format!("parsing gazetteer {}", path.display()))?;

        let mut added = 0;
        for (label, phrases) in &entries {
            for phrase in phrases {
                self.insert(phrase, label);
                added += 1;
            }
        }
        info!(path = %path.display(), added, "loaded gazetteer");
        Ok(added)
    }

    pub fn insert(&mut self, phrase: &str, label: &str) {
        let phrase = glean_core::normalize_whitespace(phrase);
        if phrase.is_empty() {
            return;
        }
        self.phrases.insert(phrase, label.to_uppercase());
    }

    /// Label of an exact phrase, with inner whitespace collapsed.
    pub fn lookup(&self, phrase: &str) -> Option<&str> {
        self.phrases
            .get(&glean_core::normalize_whitespace(phrase))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.phrases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phrases.is_empty()
    }
}
