//! Continuously classify the live feed and feed touch decisions to the gate.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::classifier::{ClassificationResult, Label};
use crate::error::SessionError;
use crate::session::SessionContext;

/// Pause between the end of one tick and the start of the next.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(200);
/// `touched` confidence that must be exceeded to count as a touch.
pub const DEFAULT_TOUCH_THRESHOLD: f32 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InferenceOptions {
    pub interval: Duration,
    pub touch_threshold: f32,
}

impl Default for InferenceOptions {
    fn default() -> Self {
        Self {
            interval: DEFAULT_TICK_INTERVAL,
            touch_threshold: DEFAULT_TOUCH_THRESHOLD,
        }
    }
}

/// Presentation flag mirroring the latest touch decision.
#[derive(Debug, Clone, Default)]
pub struct TouchFlag(Arc<AtomicBool>);

impl TouchFlag {
    pub fn get(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub(crate) fn set(&self, touched: bool) {
        self.0.store(touched, Ordering::Release);
    }
}

/// What one tick decided.
#[derive(Debug, Clone, PartialEq)]
pub struct TickOutcome {
    /// `None` while either label is still untrained.
    pub result: Option<ClassificationResult>,
    pub touched: bool,
    /// Whether this tick moved the gate into cooldown.
    pub alerted: bool,
}

/// Decide whether a classification counts as a face touch.
pub fn is_touch(result: &ClassificationResult, threshold: f32) -> bool {
    result.label == Label::Touched && result.confidences.get(Label::Touched) > threshold
}

/// Run one capture→embed→predict→decide→notify cycle.
pub fn run_tick(ctx: &SessionContext, threshold: f32) -> Result<TickOutcome, SessionError> {
    let frame = ctx.frames.current_frame()?;
    let embedding = ctx.provider.embed(&frame)?;
    let result = match ctx.store.predict(&embedding) {
        Ok(result) => Some(result),
        Err(err) if err.is_empty_store() => {
            debug!("Classifier not trained yet: {err}");
            None
        }
        Err(err) => return Err(err),
    };
    let touched = result
        .as_ref()
        .is_some_and(|result| is_touch(result, threshold));
    let alerted = ctx.gate.report(touched);
    ctx.touch.set(touched);
    Ok(TickOutcome {
        result,
        touched,
        alerted: alerted?,
    })
}

/// Counters collected by a stopped loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopSummary {
    pub ticks: usize,
    pub touches: usize,
    pub alerts: usize,
    pub failures: usize,
}

/// Stop handle for a running inference loop.
///
/// Dropping the handle stops the loop as well.
pub struct LoopHandle {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<LoopSummary>>,
}

impl LoopHandle {
    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Let the in-flight tick finish, cancel the pending wait and join the loop.
    pub fn stop(mut self) -> LoopSummary {
        self.shutdown()
    }

    fn shutdown(&mut self) -> LoopSummary {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        let summary = self
            .handle
            .take()
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();
        info!(
            ticks = summary.ticks,
            alerts = summary.alerts,
            failures = summary.failures,
            "Inference loop stopped"
        );
        summary
    }
}

impl Drop for LoopHandle {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.shutdown();
        }
    }
}

/// Start ticking on a background thread until the returned handle is stopped.
///
/// `on_tick` sees every successful tick.
pub fn spawn_loop(
    ctx: SessionContext,
    options: InferenceOptions,
    mut on_tick: impl FnMut(&TickOutcome) + Send + 'static,
) -> Result<LoopHandle, SessionError> {
    if !ctx.provider.is_loaded() {
        return Err(SessionError::NotInitialized);
    }
    let (stop_tx, stop_rx) = mpsc::channel::<()>();
    let handle = thread::Builder::new()
        .name("inference-loop".to_string())
        .spawn(move || {
            info!(
                interval_ms = options.interval.as_millis() as u64,
                threshold = options.touch_threshold,
                "Inference loop started"
            );
            let mut summary = LoopSummary::default();
            loop {
                summary.ticks += 1;
                match run_tick(&ctx, options.touch_threshold) {
                    Ok(outcome) => {
                        summary.touches += usize::from(outcome.touched);
                        summary.alerts += usize::from(outcome.alerted);
                        on_tick(&outcome);
                    }
                    Err(err) => {
                        summary.failures += 1;
                        warn!("Inference tick skipped: {err}");
                    }
                }
                match stop_rx.recv_timeout(options.interval) {
                    Err(RecvTimeoutError::Timeout) => continue,
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            summary
        })
        .map_err(|err| SessionError::Thread(err.to_string()))?;
    Ok(LoopHandle {
        stop: Some(stop_tx),
        handle: Some(handle),
    })
}
