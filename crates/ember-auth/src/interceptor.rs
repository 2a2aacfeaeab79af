//! Refresh coalescing for authorization failures.

use crate::error::{AuthError, AuthOperation, AuthResult};
use crate::session::SessionCoordinator;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tracing::debug;

/// Outcome fan-out channel for one in-flight refresh. Capacity 1: exactly
/// one message is ever sent per attempt.
type OutcomeSender = broadcast::Sender<AuthResult<String>>;

/// Sits between authenticated requests and the transport layer. When a
/// request fails with an authorization error, the transport calls
/// [`on_unauthorized`](Self::on_unauthorized); at most one refresh is
/// outstanding at a time, and concurrent callers attach to it instead of
/// starting their own.
pub struct RefreshInterceptor {
    session: Arc<SessionCoordinator>,
    in_flight: Mutex<Option<OutcomeSender>>,
}

impl RefreshInterceptor {
    pub fn new(session: Arc<SessionCoordinator>) -> Self {
        Self {
            session,
            in_flight: Mutex::new(None),
        }
    }

    /// Refresh the session, coalescing concurrent callers.
    ///
    /// The first caller runs the coordinator's refresh; everyone else awaits
    /// the same outcome. On success every waiter receives the new access
    /// token and may replay its original request once. On failure every
    /// waiter receives the same terminal error, and the session has already
    /// been logged out by the coordinator's refresh-failure rule, so no
    /// further retries are meaningful.
    pub async fn on_unauthorized(&self) -> AuthResult<String> {
        let mut guard = self.in_flight.lock().await;
        if let Some(sender) = guard.as_ref() {
            debug!("Refresh already in flight; attaching");
            let mut receiver = sender.subscribe();
            drop(guard);
            return match receiver.recv().await {
                Ok(outcome) => outcome,
                // The leader dropped without sending; treat as a failed refresh.
                Err(_) => Err(AuthError::Network {
                    operation: AuthOperation::Refresh,
                    message: "refresh outcome channel closed".to_string(),
                }),
            };
        }

        let (sender, _) = broadcast::channel(1);
        *guard = Some(sender);
        drop(guard);
        self.run_refresh().await
    }

    /// Leader path: run the single refresh and fan the outcome out to every
    /// attached waiter. The in-flight slot is cleared before sending so a
    /// later authorization failure starts a fresh attempt.
    async fn run_refresh(&self) -> AuthResult<String> {
        let outcome = self.session.refresh_token().await;

        let sender = {
            let mut guard = self.in_flight.lock().await;
            guard.take()
        };
        if let Some(sender) = sender {
            let _ = sender.send(outcome.clone());
        }
        outcome
    }
}
