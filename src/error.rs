//! Error taxonomy shared by the training and inference paths.

use thiserror::Error;

use crate::classifier::Label;
use crate::config::ConfigError;

/// Errors surfaced by the monitoring session and its collaborators.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The embedding model was used before its load completed.
    #[error("Embedding model is not loaded yet")]
    NotInitialized,
    /// An embedding did not match the dimensionality of the stored examples.
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension already established by the store.
        expected: usize,
        /// Dimension of the rejected embedding.
        actual: usize,
    },
    /// Prediction was attempted before both labels had examples.
    #[error("No training examples for label {missing}")]
    EmptyStore {
        /// First label (in canonical order) without any examples.
        missing: Label,
    },
    /// The frame source could not deliver a frame.
    #[error("Frame capture failed: {0}")]
    CaptureError(String),
    /// Camera access was refused.
    #[error("Camera access denied: {0}")]
    PermissionDenied(String),
    /// The audio cue could not be played.
    #[error("Audio cue failed: {0}")]
    Audio(String),
    /// A background worker thread could not be started.
    #[error("Background thread failed to start: {0}")]
    Thread(String),
    /// Startup configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl SessionError {
    /// True for the expected "not trained yet" steady state.
    pub fn is_empty_store(&self) -> bool {
        matches!(self, SessionError::EmptyStore { .. })
    }
}
