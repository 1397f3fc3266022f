//! Extractive summaries: pick representative, non-redundant sentences.

use std::sync::Arc;

use glean_core::config::SummaryConfig;
use glean_core::text::{Span, is_blank, normalize_whitespace, sentences, truncate_words, words};
use tracing::debug;

use crate::encoder::{TextEncoder, cosine};
use crate::mmr;

pub struct Summarizer {
    encoder: Arc<dyn TextEncoder>,
    config: SummaryConfig,
    /// Word budget; text past it is ignored.
    max_words: usize,
}

impl Summarizer {
    pub fn new(encoder: Arc<dyn TextEncoder>, config: SummaryConfig, max_words: usize) -> Self {
        Self {
            encoder,
            config,
            max_words,
        }
    }

    pub fn summarize(&self, text: &str) -> anyhow::Result<String> {
        let text = truncate_words(text, self.max_words);
        if is_blank(text) {
            return Ok(String::new());
        }

        let spans = sentences(text);
        if spans.len() <= self.config.sentences {
            return Ok(normalize_whitespace(text));
        }

        let mut pool: Vec<Span> = spans
            .iter()
            .copied()
            .filter(|s| words(s.slice(text)).len() >= self.config.min_sentence_words)
            .collect();
        if pool.len() < self.config.sentences {
            pool = spans;
        }

        let mut inputs: Vec<&str> = Vec::with_capacity(pool.len() + 1);
        inputs.push(text);
        inputs.extend(pool.iter().map(|s| s.slice(text)));
        let mut vectors = self.encoder.encode_batch(&inputs)?;
        anyhow::ensure!(
            vectors.len() == inputs.len(),
            "{} returned {} vectors for {} inputs",
            self.encoder.name(),
            vectors.len(),
            inputs.len()
        );
        let document = vectors.remove(0);

        let relevance: Vec<f32> = vectors.iter().map(|v| cosine(&document, v)).collect();
        let mut chosen = mmr::select(&relevance, &vectors, self.config.sentences, self.config.lambda);
        chosen.sort_unstable();

        debug!(sentences = pool.len(), chosen = chosen.len(), "summarized");
        Ok(chosen
            .into_iter()
            .map(|i| normalize_whitespace(pool[i].slice(text)))
            .collect::<Vec<_>>()
            .join(" "))
    }
}
