//! Similarity scoring and neighbour voting.

use serde::{Deserialize, Serialize};

use super::{Confidences, Example, Label};

/// How the `k` nearest neighbours contribute to their label's score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Weighting {
    /// Each neighbour counts once.
    #[default]
    Uniform,
    /// Each neighbour counts its (non-negative) cosine similarity.
    Similarity,
}

/// Stored example ranked against a query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbour {
    pub index: usize,
    pub label: Label,
    pub similarity: f32,
}

/// Cosine similarity of two equal-length vectors; zero when either has no norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    let mut dot = 0.0_f32;
    let mut norm_a = 0.0_f32;
    let mut norm_b = 0.0_f32;
    for (&x, &y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let denom = (norm_a * norm_b).sqrt();
    if !denom.is_finite() || denom <= 0.0 {
        return 0.0;
    }
    (dot / denom).clamp(-1.0, 1.0)
}

/// Rank every example against the query and keep the `k` most similar.
///
/// Equal similarities keep insertion order so repeated queries are stable.
pub(crate) fn nearest(query: &[f32], examples: &[Example], k: usize) -> Vec<Neighbour> {
    let mut ranked: Vec<Neighbour> = examples
        .iter()
        .enumerate()
        .map(|(index, example)| Neighbour {
            index,
            label: example.label,
            similarity: cosine_similarity(query, example.embedding.as_slice()),
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.similarity
            .total_cmp(&a.similarity)
            .then_with(|| a.index.cmp(&b.index))
    });
    ranked.truncate(k.max(1).min(examples.len()));
    ranked
}

impl Weighting {
    fn weight(self, neighbour: &Neighbour) -> f32 {
        match self {
            Weighting::Uniform => 1.0,
            Weighting::Similarity => neighbour.similarity.max(0.0),
        }
    }

    /// Aggregate neighbour votes into per-label confidences.
    pub(crate) fn vote(self, neighbours: &[Neighbour]) -> Confidences {
        let mut weights = [0.0_f32; 2];
        for neighbour in neighbours {
            weights[neighbour.label.index()] += self.weight(neighbour);
        }
        if self == Weighting::Similarity && weights[0] + weights[1] <= 0.0 {
            return Weighting::Uniform.vote(neighbours);
        }
        Confidences::from_weights(weights)
    }
}
