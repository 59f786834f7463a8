//! Alert gate deciding when a detected touch may sound the cue again.
//!
//! The gate leaves `CoolingDown` only when the cue reports that playback has
//! ended. Notification rate limiting is a separate window owned by
//! [`CooldownNotifier`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use tracing::{debug, info, warn};

use crate::error::SessionError;

mod cue;
mod notify;

pub use cue::{AudioCue, CueSettings, FinishedListener, RodioCue, SilentCue};
pub use notify::{
    CooldownNotifier, DEFAULT_NOTIFICATION_COOLDOWN, LogNotifier, Notifier, TOUCH_BODY,
    TOUCH_TITLE,
};

const ELIGIBLE: u8 = 0;
const COOLING_DOWN: u8 = 1;

/// Whether the next detected touch may trigger the cue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Eligible,
    CoolingDown,
}

/// Playback-bounded single-flight gate in front of the cue and notifier.
pub struct AlertGate {
    state: Arc<AtomicU8>,
    cue: Arc<dyn AudioCue>,
    notifier: Arc<dyn Notifier>,
}

impl AlertGate {
    /// Build a gate and subscribe it to the cue's finished event.
    pub fn new(cue: Arc<dyn AudioCue>, notifier: Arc<dyn Notifier>) -> Self {
        let state = Arc::new(AtomicU8::new(ELIGIBLE));
        let listener_state = Arc::clone(&state);
        cue.on_finished(Arc::new(move || {
            if listener_state.swap(ELIGIBLE, Ordering::AcqRel) == COOLING_DOWN {
                debug!("Alert cue finished; gate eligible again");
            }
        }));
        Self {
            state,
            cue,
            notifier,
        }
    }

    pub fn state(&self) -> GateState {
        match self.state.load(Ordering::Acquire) {
            COOLING_DOWN => GateState::CoolingDown,
            _ => GateState::Eligible,
        }
    }

    /// Feed one touch decision; returns whether a new alert was issued.
    pub fn report(&self, touched: bool) -> Result<bool, SessionError> {
        if !touched {
            return Ok(false);
        }
        if self
            .state
            .compare_exchange(ELIGIBLE, COOLING_DOWN, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(false);
        }
        info!("Touch detected; sounding alert");
        let played = self.cue.play();
        self.notifier.notify(TOUCH_TITLE, TOUCH_BODY);
        if let Err(err) = played {
            // No finished event follows a failed play.
            self.state.store(ELIGIBLE, Ordering::Release);
            warn!("Alert cue failed: {err}");
            return Err(err);
        }
        Ok(true)
    }
}
