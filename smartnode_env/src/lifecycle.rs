//! Session lifecycle: the single cancellation source of a node.
//!
//! A session owns a [`LifecycleController`]; everything else holds a
//! [`Lifecycle`] handle. Ending the lifecycle (normally or by cancellation)
//! cancels the shared [`CancellationToken`], which every role loop derives
//! its own token from.
//!
//! ```text
//! LifecycleController ──complete()/cancel()──► watch<Option<SessionEnd>>
//!          │                                          │
//!          └──────────── token.cancel() ──────┐       │
//!                                             ▼       ▼
//!                                  Lifecycle::token()  Lifecycle::ended()
//! ```

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// How a session lifecycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionEnd {
    /// Graceful shutdown
    Completed,

    /// The session was cancelled (or its owner went away)
    Cancelled,
}

/// Owner side of a session lifecycle.
///
/// Cloning shares the same lifecycle; the first call to
/// [`complete`](Self::complete) or [`cancel`](Self::cancel) decides the
/// outcome, later calls are no-ops.
#[derive(Debug, Clone)]
pub struct LifecycleController {
    token: CancellationToken,
    end: Arc<watch::Sender<Option<SessionEnd>>>,
}

impl LifecycleController {
    /// Creates a running lifecycle.
    pub fn new() -> Self {
        let (end, _) = watch::channel(None);
        Self {
            token: CancellationToken::new(),
            end: Arc::new(end),
        }
    }

    /// Returns an observer handle.
    pub fn handle(&self) -> Lifecycle {
        Lifecycle {
            token: self.token.clone(),
            end: self.end.subscribe(),
        }
    }

    /// Ends the lifecycle gracefully. Returns false if it had already ended.
    pub fn complete(&self) -> bool {
        self.finish(SessionEnd::Completed)
    }

    /// Ends the lifecycle by cancellation. Returns false if it had already ended.
    pub fn cancel(&self) -> bool {
        self.finish(SessionEnd::Cancelled)
    }

    /// Returns true once the lifecycle has ended.
    pub fn is_ended(&self) -> bool {
        self.end.borrow().is_some()
    }

    fn finish(&self, outcome: SessionEnd) -> bool {
        let first = self.end.send_if_modified(|slot| {
            if slot.is_none() {
                *slot = Some(outcome);
                true
            } else {
                false
            }
        });
        self.token.cancel();
        first
    }
}

impl Default for LifecycleController {
    fn default() -> Self {
        Self::new()
    }
}

/// Observer side of a session lifecycle.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    token: CancellationToken,
    end: watch::Receiver<Option<SessionEnd>>,
}

impl Lifecycle {
    /// The token cancelled when the lifecycle ends.
    ///
    /// Role scopes should use `token().child_token()` so that cancelling a
    /// scope never ends the session itself.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Returns the outcome if the lifecycle has ended.
    pub fn end(&self) -> Option<SessionEnd> {
        *self.end.borrow()
    }

    /// Returns true once the lifecycle has ended.
    pub fn is_ended(&self) -> bool {
        self.end().is_some()
    }

    /// Waits for the lifecycle to end.
    ///
    /// If every controller is dropped without an explicit outcome the
    /// lifecycle counts as cancelled.
    pub async fn ended(&self) -> SessionEnd {
        let mut rx = self.end.clone();
        // Err only means every sender is gone; the slot still holds the answer.
        let _ = rx.wait_for(Option::is_some).await;
        let outcome = *rx.borrow();
        outcome.unwrap_or(SessionEnd::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_complete_is_observed() {
        let controller = LifecycleController::new();
        let lifecycle = controller.handle();

        assert!(!lifecycle.is_ended());
        assert!(!lifecycle.token().is_cancelled());

        assert!(controller.complete());

        assert_eq!(lifecycle.ended().await, SessionEnd::Completed);
        assert!(lifecycle.token().is_cancelled());
    }

    #[tokio::test]
    async fn test_first_outcome_wins() {
        let controller = LifecycleController::new();
        let lifecycle = controller.handle();

        assert!(controller.cancel());
        assert!(!controller.complete());

        assert_eq!(lifecycle.end(), Some(SessionEnd::Cancelled));
    }

    #[tokio::test]
    async fn test_dropped_controller_counts_as_cancelled() {
        let controller = LifecycleController::new();
        let lifecycle = controller.handle();
        drop(controller);

        assert_eq!(lifecycle.ended().await, SessionEnd::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ended_wakes_waiter() {
        let controller = LifecycleController::new();
        let lifecycle = controller.handle();

        let waiter = tokio::spawn(async move { lifecycle.ended().await });

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(!waiter.is_finished());

        controller.complete();
        assert_eq!(waiter.await.unwrap(), SessionEnd::Completed);
    }

    #[test]
    fn test_child_scope_does_not_end_session() {
        let controller = LifecycleController::new();
        let lifecycle = controller.handle();

        let scope = lifecycle.token().child_token();
        scope.cancel();

        assert!(!controller.is_ended());
        assert!(!lifecycle.token().is_cancelled());
    }
}
