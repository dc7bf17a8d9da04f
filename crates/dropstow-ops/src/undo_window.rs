//! One-click undo window for just-completed moves.
//!
//! Every registration restarts the window. When it expires the pending
//! actions are dropped without running.

use std::future::Future;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use dropstow_core::Result;

use crate::BoxFuture;

/// Broadcast buffer for undo events.
const EVENT_CHANNEL_SIZE: usize = 16;

/// A deferred undo step.
pub type UndoAction = Box<dyn FnOnce() -> BoxFuture<'static, Result<()>> + Send>;

/// Wrap an async closure as an [`UndoAction`].
pub fn undo_action<F, Fut>(f: F) -> UndoAction
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Box::new(move || Box::pin(f()))
}

/// Undo became available (or was extended).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndoAvailable {
    /// Aggregate description of what can be undone.
    pub description: String,
    /// Seconds until the window closes.
    pub expiration_seconds: u64,
    /// Number of pending actions.
    pub total_count: usize,
}

/// Outcome of running the pending actions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UndoReport {
    /// Whether every action succeeded.
    pub success: bool,
    /// Aggregate description of what was undone.
    pub description: String,
    /// Actions that succeeded.
    pub undone_count: usize,
    /// Actions that failed.
    pub failed_count: usize,
    /// Last failure message, if any.
    pub error_message: Option<String>,
}

/// Notification from the undo window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UndoEvent {
    /// Undo is available.
    Available(UndoAvailable),
    /// Pending actions were run.
    Executed(UndoReport),
}

#[derive(Default)]
struct WindowState {
    pending: Vec<(String, UndoAction)>,
    timer: Option<AbortHandle>,
    deadline: Option<Instant>,
    generation: u64,
}

impl WindowState {
    fn description(&self) -> String {
        aggregate_description(self.pending.iter().map(|(d, _)| d.as_str()))
    }

    fn stop_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        self.deadline = None;
        self.generation += 1;
    }
}

/// Collects undo actions for a short window and runs them on request.
pub struct UndoCoordinator {
    state: Arc<Mutex<WindowState>>,
    events: broadcast::Sender<UndoEvent>,
}

impl std::fmt::Debug for UndoCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UndoCoordinator")
            .field("pending", &self.pending_count())
            .finish()
    }
}

impl Default for UndoCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl UndoCoordinator {
    /// Create a coordinator with an empty window.
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        Self {
            state: Arc::new(Mutex::new(WindowState::default())),
            events,
        }
    }

    /// Subscribe to undo events.
    pub fn subscribe(&self) -> broadcast::Receiver<UndoEvent> {
        self.events.subscribe()
    }

    /// Number of pending actions.
    pub fn pending_count(&self) -> usize {
        self.lock().pending.len()
    }

    /// Time left before the pending actions expire, or `None` if nothing is
    /// pending.
    pub fn remaining(&self) -> Option<Duration> {
        let state = self.lock();
        if state.pending.is_empty() {
            return None;
        }
        state
            .deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Add an action and restart the window with `expiration`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn register(
        &self,
        description: impl Into<String>,
        action: UndoAction,
        expiration: Duration,
    ) {
        let available = {
            let mut state = self.lock();
            state.pending.push((description.into(), action));
            state.stop_timer();

            let generation = state.generation;
            let weak = Arc::downgrade(&self.state);
            let timer = tokio::spawn(expire_after(weak, generation, expiration));
            state.timer = Some(timer.abort_handle());
            state.deadline = Some(Instant::now() + expiration);

            UndoAvailable {
                description: state.description(),
                expiration_seconds: expiration.as_secs(),
                total_count: state.pending.len(),
            }
        };

        debug!(pending = available.total_count, "undo registered");
        let _ = self.events.send(UndoEvent::Available(available));
    }

    /// Run every pending action, newest first, and clear the window.
    ///
    /// A failing action does not stop the others. With nothing pending the
    /// report is unsuccessful and no event is sent.
    pub async fn execute_undo(&self) -> UndoReport {
        let (description, pending) = {
            let mut state = self.lock();
            state.stop_timer();
            let description = state.description();
            (description, std::mem::take(&mut state.pending))
        };

        if pending.is_empty() {
            return UndoReport {
                error_message: Some("Nothing to undo".to_string()),
                ..Default::default()
            };
        }

        let mut report = UndoReport {
            description,
            ..Default::default()
        };

        for (label, action) in pending.into_iter().rev() {
            // Spawned so a panicking action counts as a failure.
            match tokio::spawn(action()).await {
                Ok(Ok(())) => report.undone_count += 1,
                Ok(Err(e)) => {
                    warn!(action = %label, error = %e, "undo action failed");
                    report.failed_count += 1;
                    report.error_message = Some(e.to_string());
                }
                Err(e) => {
                    warn!(action = %label, error = %e, "undo action panicked");
                    report.failed_count += 1;
                    report.error_message = Some(format!("Undo task failed: {e}"));
                }
            }
        }

        report.success = report.failed_count == 0;
        info!(
            undone = report.undone_count,
            failed = report.failed_count,
            "undo window executed"
        );
        let _ = self.events.send(UndoEvent::Executed(report.clone()));
        report
    }

    /// Drop every pending action without running it.
    pub fn clear_undo(&self) {
        let mut state = self.lock();
        state.stop_timer();
        state.pending.clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, WindowState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for UndoCoordinator {
    fn drop(&mut self) {
        self.lock().stop_timer();
    }
}

async fn expire_after(state: Weak<Mutex<WindowState>>, generation: u64, expiration: Duration) {
    tokio::time::sleep(expiration).await;

    let Some(shared) = state.upgrade() else {
        return;
    };
    let mut state = shared.lock().unwrap_or_else(|e| e.into_inner());
    if state.generation == generation {
        debug!(dropped = state.pending.len(), "undo window expired");
        state.pending.clear();
        state.timer = None;
        state.deadline = None;
    }
}

/// "a" for one action, "c and 2 more" for several.
fn aggregate_description<'a, I>(descriptions: I) -> String
where
    I: IntoIterator<Item = &'a str>,
    I::IntoIter: DoubleEndedIterator + ExactSizeIterator,
{
    let mut descriptions = descriptions.into_iter();
    let count = descriptions.len();
    match descriptions.next_back() {
        None => String::new(),
        Some(last) if count == 1 => last.to_string(),
        Some(last) => format!("{last} and {} more", count - 1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregate_description() {
        assert_eq!(aggregate_description(Vec::<&str>::new()), "");
        assert_eq!(aggregate_description(["Move 'a'"]), "Move 'a'");
        assert_eq!(
            aggregate_description(["Move 'a'", "Move 'b'", "Move 'c'"]),
            "Move 'c' and 2 more"
        );
    }

    #[tokio::test]
    async fn test_empty_execute_reports_nothing() {
        let coordinator = UndoCoordinator::new();
        let report = coordinator.execute_undo().await;
        assert!(!report.success);
        assert_eq!(report.undone_count, 0);
        assert_eq!(report.failed_count, 0);
    }
}
