//! Maximal Marginal Relevance selection.
//!
//! Picks items that are relevant to a query (usually the whole document)
//! while penalising redundancy with what has already been picked:
//!
//! `score(i) = λ * relevance(i) - (1 - λ) * max_{j ∈ selected} sim(i, j)`

use crate::encoder::cosine;

/// Select up to `k` indices by MMR, in selection order.
///
/// `relevance[i]` is the similarity of item `i` to the query and
/// `embeddings[i]` its unit vector. `lambda` is clamped to `0.0..=1.0`.
pub fn select(relevance: &[f32], embeddings: &[Vec<f32>], k: usize, lambda: f32) -> Vec<usize> {
    let n = relevance.len().min(embeddings.len());
    let k = k.min(n);
    if k == 0 {
        return Vec::new();
    }
    let lambda = lambda.clamp(0.0, 1.0);

    let mut selected = Vec::with_capacity(k);
    let mut remaining: Vec<usize> = (0..n).collect();
    // Highest similarity of each item to anything selected so far.
    let mut redundancy = vec![f32::NEG_INFINITY; n];

    while selected.len() < k {
        let mut best: Option<(usize, f32)> = None;
        for (pos, &i) in remaining.iter().enumerate() {
            let penalty = if selected.is_empty() { 0.0 } else { redundancy[i] };
            let score = lambda * relevance[i] - (1.0 - lambda) * penalty;
            if best.is_none_or(|(_, s)| score > s) {
                best = Some((pos, score));
            }
        }
        let Some((pos, _)) = best else { break };
        let chosen = remaining.swap_remove(pos);
        selected.push(chosen);

        for &i in &remaining {
            let sim = cosine(&embeddings[i], &embeddings[chosen]);
            if sim > redundancy[i] {
                redundancy[i] = sim;
            }
        }
    }

    selected
}

/// Indices of the `k` most relevant items, best first. Ties keep input order.
pub fn top_k(relevance: &[f32], k: usize) -> Vec<usize> {
    let mut indexed: Vec<usize> = (0..relevance.len()).collect();
    indexed.sort_by(|&a, &b| relevance[b].total_cmp(&relevance[a]));
    indexed.truncate(k);
    indexed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(x: f32, y: f32) -> Vec<f32> {
        let n = (x * x + y * y).sqrt();
        vec![x / n, y / n]
    }

    #[test]
    fn relevance_only_matches_top_k() {
        let relevance = [0.2, 0.9, 0.5];
        let embeddings = vec![unit(1.0, 0.0), unit(1.0, 0.1), unit(1.0, 0.2)];
        assert_eq!(select(&relevance, &embeddings, 3, 1.0), vec![1, 2, 0]);
        assert_eq!(top_k(&relevance, 3), vec![1, 2, 0]);
    }

    #[test]
    fn diversity_skips_near_duplicates() {
        // Items 0 and 1 point the same way; item 2 is orthogonal.
        let relevance = [0.9, 0.89, 0.6];
        let embeddings = vec![unit(1.0, 0.0), unit(1.0, 0.01), unit(0.0, 1.0)];
        assert_eq!(select(&relevance, &embeddings, 2, 0.5), vec![0, 2]);
        assert_eq!(top_k(&relevance, 2), vec![0, 1]);
    }

    #[test]
    fn k_larger_than_items() {
        let relevance = [0.1, 0.2];
        let embeddings = vec![unit(1.0, 0.0), unit(0.0, 1.0)];
        assert_eq!(select(&relevance, &embeddings, 10, 0.5).len(), 2);
        assert_eq!(top_k(&relevance, 10).len(), 2);
    }

    #[test]
    fn empty_input() {
        assert!(select(&[], &[], 3, 0.5).is_empty());
        assert!(top_k(&[], 3).is_empty());
    }
}
