//! Text encoders: map text to L2-normalized vectors.
//!
//! [`HashingEncoder`] needs no model files and is the default. The ONNX
//! sentence-transformers encoder lives in `onnx.rs` behind the `onnx` feature.

use std::hash::Hasher;

use glean_core::text::words;
use rustc_hash::{FxHashMap, FxHasher};

/// Produces fixed-length, unit-norm embeddings.
pub trait TextEncoder: Send + Sync {
    /// Model name reported in logs.
    fn name(&self) -> &str;

    /// Embedding dimensionality.
    fn dim(&self) -> usize;

    /// Embed a batch of texts, one vector per input.
    fn encode_batch(&self, texts: &[&str]) -> anyhow::Result<Vec<Vec<f32>>>;

    /// Embed a single text.
    fn encode(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.encode_batch(&[text])?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("{} returned no vector", self.name()))
    }
}

/// Weight of a bigram feature relative to a unigram.
const BIGRAM_WEIGHT: f32 = 0.5;

/// Signed feature-hashing encoder over lowercased unigrams and bigrams.
///
/// Each feature is hashed into one of `dim` buckets; a second hash bit picks
/// the sign so collisions cancel out on average. Term frequencies are damped
/// with `1 + ln(tf)`.
#[derive(Debug, Clone)]
pub struct HashingEncoder {
    dim: usize,
}

impl Default for HashingEncoder {
    fn default() -> Self {
        Self::new(384)
    }
}

impl HashingEncoder {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1) }
    }

    fn encode_one(&self, text: &str) -> Vec<f32> {
        let tokens: Vec<String> = words(text).iter().map(|t| t.text.to_lowercase()).collect();

        let mut counts: FxHashMap<(bool, &str, &str), f32> = FxHashMap::default();
        for token in &tokens {
            *counts.entry((false, token.as_str(), "")).or_default() += 1.0;
        }
        for pair in tokens.windows(2) {
            *counts
                .entry((true, pair[0].as_str(), pair[1].as_str()))
                .or_default() += 1.0;
        }

        let mut vector = vec![0.0f32; self.dim];
        for ((is_bigram, first, second), tf) in counts {
            let hash = feature_hash(is_bigram, first, second);
            let bucket = (hash % self.dim as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            let weight = if is_bigram { BIGRAM_WEIGHT } else { 1.0 };
            vector[bucket] += sign * weight * (1.0 + tf.ln());
        }

        normalize(&mut vector);
        vector
    }
}

impl TextEncoder for HashingEncoder {
    fn name(&self) -> &str {
        "hashing"
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn encode_batch(&self, texts: &[&str]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.encode_one(text)).collect())
    }
}

fn feature_hash(is_bigram: bool, first: &str, second: &str) -> u64 {
    let mut hasher = FxHasher::default();
    hasher.write_u8(is_bigram as u8);
    hasher.write(first.as_bytes());
    hasher.write_u8(0xff);
    hasher.write(second.as_bytes());
    // Sign and bucket must come from independent bits.
    let h = hasher.finish();
    (h ^ (h >> 29)).wrapping_mul(0xbf58_476d_1ce4_e5b9) ^ (h >> 32)
}

/// L2-normalize a vector in place.
pub fn normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Cosine similarity of two unit vectors.
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
