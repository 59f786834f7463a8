//! Paced capture→embed→store cycles that teach the store one label.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::camera::FrameSource;
use crate::classifier::{ExampleStore, Label};
use crate::embedding::EmbeddingProvider;
use crate::error::SessionError;

/// Examples captured per training run.
pub const DEFAULT_REPETITIONS: usize = 50;
/// Pause between training captures.
pub const DEFAULT_TRAINING_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrainingOptions {
    pub repetitions: usize,
    pub interval: Duration,
}

impl Default for TrainingOptions {
    fn default() -> Self {
        Self {
            repetitions: DEFAULT_REPETITIONS,
            interval: DEFAULT_TRAINING_INTERVAL,
        }
    }
}

/// Progress after one stored example.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrainingProgress {
    pub label: Label,
    pub completed: usize,
    pub total: usize,
}

impl TrainingProgress {
    /// Completion as a rounded percentage.
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        ((self.completed as f64 / self.total as f64) * 100.0).round() as u8
    }
}

/// How a training run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrainingReport {
    pub label: Label,
    pub added: usize,
    pub cancelled: bool,
}

/// Cooperative cancellation shared between a running job and its owner.
///
/// Cancelling also wakes a job that is waiting out its pacing interval.
#[derive(Debug, Clone)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
    wake: Sender<()>,
}

/// Waiting side of a [`CancelToken`].
#[derive(Debug)]
pub struct CancelWait {
    cancelled: Arc<AtomicBool>,
    wake: Receiver<()>,
}

impl CancelToken {
    pub fn pair() -> (Self, CancelWait) {
        let cancelled = Arc::new(AtomicBool::new(false));
        let (wake_tx, wake_rx) = mpsc::channel();
        (
            Self {
                cancelled: Arc::clone(&cancelled),
                wake: wake_tx,
            },
            CancelWait {
                cancelled,
                wake: wake_rx,
            },
        )
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        let _ = self.wake.send(());
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl CancelWait {
    /// Token that can never be cancelled.
    pub fn never() -> Self {
        let (_token, wait) = CancelToken::pair();
        wait
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Sleep for `interval`; returns `false` when cancelled first.
    pub fn sleep(&self, interval: Duration) -> bool {
        if self.is_cancelled() {
            return false;
        }
        if interval.is_zero() {
            return true;
        }
        match self.wake.recv_timeout(interval) {
            Ok(()) => !self.is_cancelled(),
            Err(RecvTimeoutError::Timeout) => !self.is_cancelled(),
            Err(RecvTimeoutError::Disconnected) => {
                thread::sleep(interval);
                !self.is_cancelled()
            }
        }
    }
}

/// Capture `options.repetitions` examples for `label`.
///
/// Examples stored before a failure stay in the store.
pub fn train(
    label: Label,
    frames: &dyn FrameSource,
    provider: &EmbeddingProvider,
    store: &ExampleStore,
    options: TrainingOptions,
    cancel: &CancelWait,
    mut on_progress: impl FnMut(TrainingProgress),
) -> Result<TrainingReport, SessionError> {
    info!(
        label = %label,
        repetitions = options.repetitions,
        "Training started"
    );
    let mut report = TrainingReport {
        label,
        added: 0,
        cancelled: false,
    };
    for iteration in 0..options.repetitions {
        if iteration > 0 && !cancel.sleep(options.interval) {
            report.cancelled = true;
            break;
        }
        if cancel.is_cancelled() {
            report.cancelled = true;
            break;
        }
        let frame = frames.current_frame()?;
        let embedding = provider.embed(&frame)?;
        store.add_example(embedding, label)?;
        report.added += 1;
        let progress = TrainingProgress {
            label,
            completed: iteration + 1,
            total: options.repetitions,
        };
        debug!(label = %label, "Training {}%", progress.percent());
        on_progress(progress);
    }
    if report.cancelled {
        info!(label = %label, added = report.added, "Training cancelled");
    } else {
        info!(label = %label, added = report.added, "Training finished");
    }
    Ok(report)
}

/// Updates sent from a background training job.
#[derive(Debug)]
pub enum TrainingMessage {
    Progress(TrainingProgress),
    Finished(Result<TrainingReport, SessionError>),
}

/// Training run executing on its own thread.
pub struct TrainingJob {
    label: Label,
    cancel: CancelToken,
    handle: Option<JoinHandle<()>>,
}

impl TrainingJob {
    /// Start training `label` in the background, reporting on `updates`.
    pub fn spawn(
        label: Label,
        frames: Arc<dyn FrameSource>,
        provider: EmbeddingProvider,
        store: Arc<ExampleStore>,
        options: TrainingOptions,
        updates: Sender<TrainingMessage>,
    ) -> Result<Self, SessionError> {
        if !provider.is_loaded() {
            return Err(SessionError::NotInitialized);
        }
        let (cancel, wait) = CancelToken::pair();
        let handle = thread::Builder::new()
            .name(format!("train-{label}"))
            .spawn(move || {
                let progress_tx = updates.clone();
                let result = train(
                    label,
                    frames.as_ref(),
                    &provider,
                    &store,
                    options,
                    &wait,
                    |progress| {
                        let _ = progress_tx.send(TrainingMessage::Progress(progress));
                    },
                );
                if let Err(err) = &result {
                    warn!(label = %label, "Training stopped: {err}");
                }
                let _ = updates.send(TrainingMessage::Finished(result));
            })
            .map_err(|err| SessionError::Thread(err.to_string()))?;
        Ok(Self {
            label,
            cancel,
            handle: Some(handle),
        })
    }

    pub fn label(&self) -> Label {
        self.label
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(|handle| handle.is_finished())
    }

    /// Request cancellation and wait for the thread to exit.
    pub fn cancel(mut self) {
        self.cancel.cancel();
        self.join();
    }

    /// Wait for the run to end on its own.
    pub fn wait(mut self) {
        self.join();
    }

    fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for TrainingJob {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.cancel.cancel();
            self.join();
        }
    }
}
