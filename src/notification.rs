//! Notification surface (core -> notification sink), spec §6. The sink is an
//! external collaborator that localizes opaque identifier strings; the core
//! only knows the identifier, a message, and a severity.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::utils::clock::Clock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
}

/// Identifiers the core emits by name (spec §6).
pub mod ids {
    pub const WINDOW_NOT_FOUND: &str = "WINDOW_NOT_FOUND";
    pub const ADJUST_FAILED: &str = "ADJUST_FAILED";
    pub const RESET_SUCCESS: &str = "RESET_SUCCESS";
    pub const RESET_FAILED: &str = "RESET_FAILED";
    pub const FEATURE_NOT_SUPPORTED: &str = "FEATURE_NOT_SUPPORTED";
    pub const FEATURE_CONFLICT: &str = "FEATURE_CONFLICT";
    pub const CAPTURE_SUCCESS: &str = "CAPTURE_SUCCESS";
}

pub trait NotificationSink: Send + Sync {
    fn notify(&self, title: &str, message: &str, kind: NotificationKind);
}

/// Wraps a `NotificationSink` and suppresses an identical
/// `(title, message, kind)` triple repeated within `window` — the original's
/// `notification_manager.cpp` does this to avoid toast spam when a command
/// (e.g. rapid `ToggleOverlay`) is repeated quickly.
pub struct ThrottlingSink<S: NotificationSink> {
    inner: S,
    clock: Arc<dyn Clock>,
    window: Duration,
    last: Mutex<Option<(Notification, std::time::Instant)>>,
}

impl<S: NotificationSink> ThrottlingSink<S> {
    pub fn new(inner: S, clock: Arc<dyn Clock>, window: Duration) -> Self {
        Self {
            inner,
            clock,
            window,
            last: Mutex::new(None),
        }
    }
}

impl<S: NotificationSink> NotificationSink for ThrottlingSink<S> {
    fn notify(&self, title: &str, message: &str, kind: NotificationKind) {
        let candidate = Notification {
            title: title.to_string(),
            message: message.to_string(),
            kind,
        };
        let now = self.clock.now();
        {
            let mut last = self.last.lock();
            if let Some((prev, at)) = last.as_ref() {
                if *prev == candidate && now.duration_since(*at) < self.window {
                    return;
                }
            }
            *last = Some((candidate, now));
        }
        self.inner.notify(title, message, kind);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::clock::TestClock;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSink(AtomicUsize);

    impl NotificationSink for Arc<CountingSink> {
        fn notify(&self, _title: &str, _message: &str, _kind: NotificationKind) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn suppresses_identical_notification_within_window() {
        let clock = Arc::new(TestClock::new());
        let counter = Arc::new(CountingSink(AtomicUsize::new(0)));
        let sink = ThrottlingSink::new(counter.clone(), clock.clone(), Duration::from_millis(500));

        sink.notify("t", "m", NotificationKind::Info);
        sink.notify("t", "m", NotificationKind::Info);
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);

        clock.advance(Duration::from_millis(600));
        sink.notify("t", "m", NotificationKind::Info);
        assert_eq!(counter.0.load(Ordering::SeqCst), 2);
    }
}
