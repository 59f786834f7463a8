//! Few-shot nearest-neighbour classification over frame embeddings.
//!
//! Examples are grouped under one of two fixed labels. Prediction scores a
//! query against every stored example by cosine similarity, lets the `k`
//! closest examples vote, and turns the per-label vote weight into confidences
//! that sum to one.

use std::fmt;

mod knn;
mod store;

pub use knn::{Neighbour, Weighting, cosine_similarity};
pub use store::{ClassifierOptions, DEFAULT_K, ExampleStore};

/// The two classes the monitor learns to tell apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Label {
    /// Hand away from the face.
    NotTouched,
    /// Hand touching the face.
    Touched,
}

impl Label {
    /// Every label, in tie-breaking order.
    pub const ALL: [Label; 2] = [Label::NotTouched, Label::Touched];

    /// Stable identifier used in logs and commands.
    pub fn as_str(self) -> &'static str {
        match self {
            Label::NotTouched => "not_touch",
            Label::Touched => "touched",
        }
    }

    fn index(self) -> usize {
        match self {
            Label::NotTouched => 0,
            Label::Touched => 1,
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed-length feature vector produced from one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding(Vec<f32>);

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn dimension(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<f32> {
        self.0
    }
}

impl From<Vec<f32>> for Embedding {
    fn from(values: Vec<f32>) -> Self {
        Self(values)
    }
}

/// A labelled embedding owned by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Example {
    pub embedding: Embedding,
    pub label: Label,
}

/// Confidence assigned to each label, always summing to one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Confidences([f32; 2]);

impl Confidences {
    pub(crate) fn from_weights(weights: [f32; 2]) -> Self {
        let total = weights[0] + weights[1];
        if !total.is_finite() || total <= 0.0 {
            return Self([0.5, 0.5]);
        }
        Self([weights[0] / total, weights[1] / total])
    }

    /// Confidence for one label, in `[0, 1]`.
    pub fn get(&self, label: Label) -> f32 {
        self.0[label.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (Label, f32)> + '_ {
        Label::ALL.into_iter().map(|label| (label, self.get(label)))
    }

    /// Highest-confidence label; ties resolve to the earlier label in [`Label::ALL`].
    pub(crate) fn argmax(&self) -> Label {
        let mut best = Label::NotTouched;
        for label in Label::ALL {
            if self.get(label) > self.get(best) {
                best = label;
            }
        }
        best
    }
}

/// Outcome of one prediction.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationResult {
    pub label: Label,
    pub confidences: Confidences,
}

impl ClassificationResult {
    pub(crate) fn from_confidences(confidences: Confidences) -> Self {
        Self {
            label: confidences.argmax(),
            confidences,
        }
    }

    /// Confidence of the predicted label.
    pub fn confidence(&self) -> f32 {
        self.confidences.get(self.label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidences_normalize_weights() {
        let confidences = Confidences::from_weights([1.0, 3.0]);
        assert!((confidences.get(Label::NotTouched) - 0.25).abs() < 1e-6);
        assert!((confidences.get(Label::Touched) - 0.75).abs() < 1e-6);
    }

    #[test]
    fn argmax_prefers_not_touched_on_tie() {
        let result = ClassificationResult::from_confidences(Confidences::from_weights([2.0, 2.0]));
        assert_eq!(result.label, Label::NotTouched);
        assert!((result.confidence() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn zero_weights_split_evenly() {
        let confidences = Confidences::from_weights([0.0, 0.0]);
        let sum: f32 = confidences.iter().map(|(_, value)| value).sum();
        assert!((sum - 1.0).abs() < 1e-6);
    }

    #[test]
    fn label_names_match_command_identifiers() {
        assert_eq!(Label::NotTouched.to_string(), "not_touch");
        assert_eq!(Label::Touched.as_str(), "touched");
    }
}
