//! Frame embedding behind a one-time model load.

use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use tracing::{info, warn};

use crate::camera::Frame;
use crate::classifier::Embedding;
use crate::error::SessionError;

mod thumbnail;

pub use thumbnail::{DEFAULT_GRID, MAX_GRID, ThumbnailExtractor};

/// Pretrained model that turns a frame into a fixed-length vector.
pub trait FeatureExtractor: Send + Sync {
    /// Length of every vector returned by [`FeatureExtractor::extract`].
    fn dimension(&self) -> usize;

    /// One-time preparation run before the extractor is exposed to callers.
    fn warmup(&self) -> Result<(), SessionError> {
        Ok(())
    }

    fn extract(&self, frame: &Frame) -> Result<Vec<f32>, SessionError>;
}

/// Boxed loader run on the model-load thread.
pub type ModelLoader = Box<dyn FnOnce() -> Result<Box<dyn FeatureExtractor>, SessionError> + Send>;

/// Shared handle to the embedding model; clones observe the same load.
#[derive(Clone, Default)]
pub struct EmbeddingProvider {
    model: Arc<OnceLock<Arc<dyn FeatureExtractor>>>,
}

impl EmbeddingProvider {
    /// Create a provider with no model loaded.
    pub fn new() -> Self {
        Self::default()
    }

    /// Warm up and install an extractor. Later loads are ignored.
    pub fn load(&self, extractor: Box<dyn FeatureExtractor>) -> Result<usize, SessionError> {
        let started = Instant::now();
        extractor.warmup()?;
        let dimension = extractor.dimension();
        if self.model.set(Arc::from(extractor)).is_err() {
            warn!("Embedding model already loaded; ignoring reload");
            return Ok(self.dimension().unwrap_or(dimension));
        }
        info!(
            dimension,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Embedding model loaded"
        );
        Ok(dimension)
    }

    /// Run `loader` and install its extractor on a background thread.
    pub fn spawn_load(&self, loader: ModelLoader) -> ModelLoad {
        let provider = self.clone();
        // The loader is handed over only once the thread exists, so a failed
        // spawn can still run it inline.
        let (loader_tx, loader_rx) = std::sync::mpsc::channel::<ModelLoader>();
        let spawned = thread::Builder::new()
            .name("embedding-load".to_string())
            .spawn(move || {
                let loader = loader_rx
                    .recv()
                    .map_err(|_| SessionError::NotInitialized)?;
                provider.load(loader()?)
            });
        match spawned {
            Ok(handle) => {
                let _ = loader_tx.send(loader);
                ModelLoad {
                    inner: LoadState::Running(handle),
                }
            }
            Err(err) => {
                warn!("Embedding load thread failed to start ({err}); loading inline");
                let result = loader().and_then(|extractor| self.load(extractor));
                ModelLoad {
                    inner: LoadState::Done(result),
                }
            }
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.model.get().is_some()
    }

    pub fn dimension(&self) -> Option<usize> {
        self.model.get().map(|model| model.dimension())
    }

    /// Embed one frame.
    pub fn embed(&self, frame: &Frame) -> Result<Embedding, SessionError> {
        let model = self.model.get().ok_or(SessionError::NotInitialized)?;
        let values = model.extract(frame)?;
        if values.len() != model.dimension() {
            return Err(SessionError::DimensionMismatch {
                expected: model.dimension(),
                actual: values.len(),
            });
        }
        Ok(Embedding::new(values))
    }
}

/// Pending background model load.
pub struct ModelLoad {
    inner: LoadState,
}

enum LoadState {
    Running(JoinHandle<Result<usize, SessionError>>),
    Done(Result<usize, SessionError>),
}

impl ModelLoad {
    /// Block until the load finishes, returning the embedding dimension.
    pub fn wait(self) -> Result<usize, SessionError> {
        match self.inner {
            LoadState::Done(result) => result,
            LoadState::Running(handle) => handle
                .join()
                .unwrap_or(Err(SessionError::NotInitialized)),
        }
    }
}
