//! Export progress as observed by the UI.
//!
//! `idle → preparing → processing → success | error`. Success falls back to idle on its own
//! after a display delay; an error stays until dismissed. A pre-flight failure may jump
//! straight from idle to error.

use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportState {
    #[default]
    Idle,
    Preparing,
    Processing,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ExportStatus {
    pub state: ExportState,
    /// 0 to 100.
    pub progress: u8,
    pub message: Option<String>,
    pub error: Option<String>,
}

const HISTORY_LIMIT: usize = 64;

#[derive(Debug, Default)]
struct Inner {
    status: ExportStatus,
    succeeded_at: Option<Instant>,
    history: Vec<ExportState>,
}

impl Inner {
    fn decay(&mut self, success_display: Duration) {
        if self.status.state != ExportState::Success {
            return;
        }
        if let Some(at) = self.succeeded_at {
            if at.elapsed() >= success_display {
                self.set(ExportState::Idle, 0, None, None);
            }
        }
    }

    fn set(&mut self, state: ExportState, progress: u8, message: Option<String>, error: Option<String>) {
        self.status = ExportStatus {
            state,
            progress: progress.min(100),
            message,
            error,
        };
        self.succeeded_at = (state == ExportState::Success).then(Instant::now);
        if self.history.len() == HISTORY_LIMIT {
            self.history.remove(0);
        }
        self.history.push(state);
    }
}

/// Shared handle; clones observe the same status.
#[derive(Debug, Clone)]
pub struct StatusTracker {
    inner: Arc<Mutex<Inner>>,
    success_display: Duration,
}

impl Default for StatusTracker {
    fn default() -> Self {
        Self::new(Duration::from_secs(3))
    }
}

impl StatusTracker {
    pub fn new(success_display: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            success_display,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        let mut inner = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        inner.decay(self.success_display);
        inner
    }

    pub fn status(&self) -> ExportStatus {
        self.lock().status.clone()
    }

    pub fn state(&self) -> ExportState {
        self.lock().status.state
    }

    /// States entered so far, oldest first (bounded).
    pub fn history(&self) -> Vec<ExportState> {
        self.lock().history.clone()
    }

    pub fn is_busy(&self) -> bool {
        matches!(self.state(), ExportState::Preparing | ExportState::Processing)
    }

    /// Enters `preparing`. Ignored while another export is being reported.
    pub fn begin(&self, message: &str) -> bool {
        let mut inner = self.lock();
        match inner.status.state {
            ExportState::Idle | ExportState::Success | ExportState::Error => {
                inner.set(ExportState::Preparing, 0, Some(message.to_string()), None);
                true
            }
            state => {
                tracing::warn!(?state, "ignoring begin while an export is in progress");
                false
            }
        }
    }

    pub fn processing(&self, progress: u8, message: &str) {
        let mut inner = self.lock();
        match inner.status.state {
            ExportState::Preparing | ExportState::Processing => {
                inner.set(ExportState::Processing, progress, Some(message.to_string()), None);
            }
            state => tracing::warn!(?state, "ignoring progress outside an export"),
        }
    }

    pub fn succeed(&self, message: &str) {
        let mut inner = self.lock();
        match inner.status.state {
            ExportState::Processing => {
                inner.set(ExportState::Success, 100, Some(message.to_string()), None);
            }
            state => tracing::warn!(?state, "ignoring success outside processing"),
        }
    }

    /// Enters `error` from any state.
    pub fn fail(&self, error: &str) {
        let mut inner = self.lock();
        let progress = inner.status.progress;
        inner.set(ExportState::Error, progress, None, Some(error.to_string()));
    }

    /// Clears an error back to idle.
    pub fn dismiss(&self) {
        let mut inner = self.lock();
        if inner.status.state == ExportState::Error {
            inner.set(ExportState::Idle, 0, None, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn success_decays_to_idle() {
        let tracker = StatusTracker::new(Duration::from_secs(3));
        assert!(tracker.begin("Preparing"));
        tracker.processing(50, "Rendering");
        tracker.succeed("Done");
        assert_eq!(tracker.status().progress, 100);

        tokio::time::advance(Duration::from_millis(2_999)).await;
        assert_eq!(tracker.state(), ExportState::Success);
        tokio::time::advance(Duration::from_millis(1)).await;
        assert_eq!(tracker.state(), ExportState::Idle);
        assert_eq!(
            tracker.history(),
            vec![
                ExportState::Preparing,
                ExportState::Processing,
                ExportState::Success,
                ExportState::Idle
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn error_persists_until_dismissed() {
        let tracker = StatusTracker::default();
        tracker.fail("export failed: no element with id `x`");
        tokio::time::advance(Duration::from_secs(60)).await;
        let status = tracker.status();
        assert_eq!(status.state, ExportState::Error);
        assert!(status.error.unwrap().contains("no element"));
        tracker.dismiss();
        assert_eq!(tracker.state(), ExportState::Idle);
    }

    #[test]
    fn invalid_transitions_are_ignored() {
        let tracker = StatusTracker::default();
        tracker.succeed("too early");
        tracker.processing(10, "no export");
        assert_eq!(tracker.state(), ExportState::Idle);

        assert!(tracker.begin("first"));
        assert!(!tracker.begin("second"));
        assert!(tracker.is_busy());
    }
}
