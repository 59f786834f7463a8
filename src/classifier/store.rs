use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::knn::{Weighting, nearest};
use super::{ClassificationResult, Embedding, Example, Label};
use crate::error::SessionError;

/// Neighbour count used by the upstream kNN classifier.
pub const DEFAULT_K: usize = 3;

/// Tuning for the nearest-neighbour vote.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassifierOptions {
    #[serde(default = "default_k")]
    pub k: usize,
    #[serde(default)]
    pub weighting: Weighting,
}

impl Default for ClassifierOptions {
    fn default() -> Self {
        Self {
            k: DEFAULT_K,
            weighting: Weighting::Uniform,
        }
    }
}

fn default_k() -> usize {
    DEFAULT_K
}

#[derive(Debug, Default)]
struct StoreState {
    dimension: Option<usize>,
    examples: Vec<Example>,
    counts: [usize; 2],
}

/// Append-only collection of labelled embeddings that doubles as the classifier.
///
/// Reads and appends may come from different threads; a `predict` sees every
/// example appended before it took the read lock.
#[derive(Debug, Default)]
pub struct ExampleStore {
    options: ClassifierOptions,
    state: RwLock<StoreState>,
}

impl ExampleStore {
    pub fn new(options: ClassifierOptions) -> Self {
        Self {
            options,
            state: RwLock::new(StoreState::default()),
        }
    }

    pub fn options(&self) -> ClassifierOptions {
        self.options
    }

    /// Append a labelled embedding.
    pub fn add_example(&self, embedding: Embedding, label: Label) -> Result<(), SessionError> {
        let actual = embedding.dimension();
        let mut state = self.write();
        let expected = state.dimension.unwrap_or(actual);
        if actual == 0 || actual != expected {
            return Err(SessionError::DimensionMismatch {
                expected: expected.max(1),
                actual,
            });
        }
        state.dimension = Some(expected);
        state.examples.push(Example { embedding, label });
        state.counts[label.index()] += 1;
        debug!(
            label = %label,
            total = state.examples.len(),
            "Stored training example"
        );
        Ok(())
    }

    /// Classify a query embedding against the stored examples.
    ///
    /// Requires at least one example of every label.
    pub fn predict(&self, embedding: &Embedding) -> Result<ClassificationResult, SessionError> {
        let state = self.read();
        if let Some(missing) = Label::ALL
            .into_iter()
            .find(|label| state.counts[label.index()] == 0)
        {
            return Err(SessionError::EmptyStore { missing });
        }
        let expected = state.dimension.unwrap_or_default();
        if embedding.dimension() != expected {
            return Err(SessionError::DimensionMismatch {
                expected,
                actual: embedding.dimension(),
            });
        }
        let neighbours = nearest(embedding.as_slice(), &state.examples, self.options.k);
        let confidences = self.options.weighting.vote(&neighbours);
        Ok(ClassificationResult::from_confidences(confidences))
    }

    pub fn len(&self) -> usize {
        self.read().examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of stored examples for one label.
    pub fn count(&self, label: Label) -> usize {
        self.read().counts[label.index()]
    }

    /// Dimension fixed by the first stored example.
    pub fn dimension(&self) -> Option<usize> {
        self.read().dimension
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(|err| err.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(|err| err.into_inner())
    }
}
