use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

/// Notification window used when none is configured.
pub const DEFAULT_NOTIFICATION_COOLDOWN: Duration = Duration::from_millis(3000);
pub const TOUCH_TITLE: &str = "Don't";
pub const TOUCH_BODY: &str = "Don't touch your face";

/// User-facing notification channel.
pub trait Notifier: Send + Sync {
    /// Emit a notification; returns whether it was delivered.
    fn notify(&self, title: &str, body: &str) -> bool;
}

/// Notifier that writes to the log and the terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, title: &str, body: &str) -> bool {
        warn!(title, "{body}");
        println!("\u{7}[{title}] {body}");
        true
    }
}

/// Drops notifications issued within `cooldown` of the last delivered one.
pub struct CooldownNotifier<N> {
    inner: N,
    cooldown: Duration,
    last_sent: Mutex<Option<Instant>>,
}

impl<N: Notifier> CooldownNotifier<N> {
    pub fn new(inner: N, cooldown: Duration) -> Self {
        Self {
            inner,
            cooldown,
            last_sent: Mutex::new(None),
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    fn admit(&self, now: Instant) -> bool {
        let mut last = self.last_sent.lock().unwrap_or_else(|err| err.into_inner());
        if let Some(previous) = *last {
            if now.saturating_duration_since(previous) < self.cooldown {
                return false;
            }
        }
        *last = Some(now);
        true
    }
}

impl<N: Notifier> Notifier for CooldownNotifier<N> {
    fn notify(&self, title: &str, body: &str) -> bool {
        if !self.admit(Instant::now()) {
            debug!("Notification suppressed by cooldown");
            return false;
        }
        self.inner.notify(title, body)
    }
}
