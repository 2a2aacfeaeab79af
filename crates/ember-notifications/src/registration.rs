//! Device registration coordinator.

use crate::transport::NotificationTransport;
use async_trait::async_trait;
use ember_auth::{DeviceRegistrar, SessionState};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Cached token and registration flag. Guarded by a std mutex that is
/// never held across an await; the transport call itself is serialized by
/// the in-progress guard instead.
#[derive(Default)]
struct TokenState {
    /// Most recent platform-issued push token. Survives logout/login
    /// cycles: the platform does not re-issue it on re-authentication.
    pending_token: Option<String>,
    /// Whether the cached token is currently registered backend-side.
    registered: bool,
}

/// Keeps backend device-token registration in sync with authentication
/// state.
///
/// Wiring: construct with the transport, then
/// [`observe`](Self::observe) the session coordinator's state stream and
/// bind the coordinator as the session's [`DeviceRegistrar`]. Neither side
/// holds a construction-time reference to the other.
pub struct DeviceRegistrationCoordinator {
    transport: Arc<dyn NotificationTransport>,
    token_state: Mutex<TokenState>,
    /// Last observed authentication state.
    authenticated: AtomicBool,
    /// Single-writer lock over the registration attempt: a second attempt
    /// started while one is outstanding is a no-op.
    registration_in_progress: AtomicBool,
}

impl DeviceRegistrationCoordinator {
    pub fn new(transport: Arc<dyn NotificationTransport>) -> Self {
        Self {
            transport,
            token_state: Mutex::new(TokenState::default()),
            authenticated: AtomicBool::new(false),
            registration_in_progress: AtomicBool::new(false),
        }
    }

    /// Whether the cached token is currently registered backend-side.
    pub fn is_registered(&self) -> bool {
        self.token_state.lock().expect("lock poisoned").registered
    }

    /// The cached pending token, if any.
    pub fn pending_token(&self) -> Option<String> {
        self.token_state
            .lock()
            .expect("lock poisoned")
            .pending_token
            .clone()
    }

    /// Handle a token freshly issued by the platform: cache it, and if
    /// already authenticated attempt registration immediately. A token
    /// received before authentication stays cached until the session
    /// transitions to authenticated.
    pub async fn handle_device_token(&self, token: impl Into<String>) {
        let token = token.into();
        {
            let mut state = self.token_state.lock().expect("lock poisoned");
            if state.pending_token.as_deref() != Some(token.as_str()) {
                // A new token invalidates any registration of the old one.
                state.registered = false;
            }
            state.pending_token = Some(token);
        }
        if self.authenticated.load(Ordering::SeqCst) {
            self.try_register().await;
        } else {
            debug!("Device token cached until authentication");
        }
    }

    /// Spawn a task consuming session state transitions.
    ///
    /// Authenticated publishes attempt registration of the cached token
    /// (also the retry trigger after a failed attempt); unauthenticated
    /// publishes reset the registered flag but keep the token.
    pub fn observe(
        self: &Arc<Self>,
        mut receiver: broadcast::Receiver<SessionState>,
    ) -> tokio::task::JoinHandle<()> {
        let coordinator = self.clone();
        tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(state) => coordinator.handle_auth_state(state.is_authenticated).await,
                    // Skipped snapshots are fine: the next one carries the
                    // current authentication state.
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    /// React to an authentication-state publish.
    pub async fn handle_auth_state(&self, is_authenticated: bool) {
        self.authenticated.store(is_authenticated, Ordering::SeqCst);
        if is_authenticated {
            self.try_register().await;
        } else {
            let mut state = self.token_state.lock().expect("lock poisoned");
            if state.registered {
                debug!("Session ended; device token registration reset");
            }
            state.registered = false;
        }
    }

    /// Explicit retry trigger for a previously failed registration.
    pub async fn retry_registration(&self) {
        if self.authenticated.load(Ordering::SeqCst) {
            self.try_register().await;
        }
    }

    /// Unregister with the backend, best-effort: the local flag and cache
    /// are cleared even if the backend call fails, because a user-initiated
    /// logout must not be blocked by a notification subsystem error.
    pub async fn unregister_device_token(&self) {
        if let Err(e) = self.transport.unregister_device_token().await {
            warn!(error = %e, "Device token unregistration failed; clearing local state anyway");
        }
        let mut state = self.token_state.lock().expect("lock poisoned");
        state.registered = false;
        state.pending_token = None;
    }

    /// Attempt registration of the cached token. No-op when no token is
    /// cached, the token is already registered, or another attempt is
    /// outstanding. A failure keeps the token cached and the registered
    /// flag false for the next trigger; it is never escalated to the user.
    async fn try_register(&self) {
        let token = {
            let state = self.token_state.lock().expect("lock poisoned");
            if state.registered {
                return;
            }
            match &state.pending_token {
                Some(token) => token.clone(),
                None => return,
            }
        };

        if self
            .registration_in_progress
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Device token registration already in progress");
            return;
        }

        match self.transport.register_device_token(&token).await {
            Ok(()) => {
                let mut state = self.token_state.lock().expect("lock poisoned");
                // Only mark registered if the token we sent is still the
                // current one; a fresher token needs its own attempt.
                if state.pending_token.as_deref() == Some(token.as_str()) {
                    state.registered = true;
                }
            }
            Err(e) => {
                warn!(error = %e, "Device token registration failed; will retry on next trigger");
            }
        }

        self.registration_in_progress.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl DeviceRegistrar for DeviceRegistrationCoordinator {
    async fn unregister_device_token(&self) {
        DeviceRegistrationCoordinator::unregister_device_token(self).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::NotificationError;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;
    use tokio::time::{sleep, Duration};

    /// Transport that records calls, can fail a configurable number of
    /// times, and can hold registrations open behind a gate.
    #[derive(Default)]
    struct ScriptedTransport {
        register_calls: AtomicUsize,
        unregister_calls: AtomicUsize,
        registered_tokens: Mutex<Vec<String>>,
        failures_remaining: AtomicUsize,
        fail_unregister: AtomicBool,
        register_gate: Mutex<Option<Arc<Notify>>>,
    }

    impl ScriptedTransport {
        fn fail_next_registers(&self, count: usize) {
            self.failures_remaining.store(count, Ordering::SeqCst);
        }

        fn gate_register(&self) -> Arc<Notify> {
            let gate = Arc::new(Notify::new());
            *self.register_gate.lock().unwrap() = Some(gate.clone());
            gate
        }
    }

    #[async_trait]
    impl NotificationTransport for ScriptedTransport {
        async fn register_device_token(&self, token: &str) -> Result<(), NotificationError> {
            self.register_calls.fetch_add(1, Ordering::SeqCst);
            self.registered_tokens.lock().unwrap().push(token.to_string());

            let gate = self.register_gate.lock().unwrap().clone();
            if let Some(gate) = gate {
                gate.notified().await;
            }

            let remaining = self.failures_remaining.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures_remaining.store(remaining - 1, Ordering::SeqCst);
                return Err(NotificationError::Transport("connection reset".into()));
            }
            Ok(())
        }

        async fn unregister_device_token(&self) -> Result<(), NotificationError> {
            self.unregister_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_unregister.load(Ordering::SeqCst) {
                return Err(NotificationError::Http {
                    status: 500,
                    message: "server error".into(),
                });
            }
            Ok(())
        }
    }

    fn make_coordinator() -> (Arc<DeviceRegistrationCoordinator>, Arc<ScriptedTransport>) {
        let transport = Arc::new(ScriptedTransport::default());
        let coordinator = Arc::new(DeviceRegistrationCoordinator::new(transport.clone()));
        (coordinator, transport)
    }

    #[tokio::test]
    async fn token_before_authentication_is_cached_not_registered() {
        let (coordinator, transport) = make_coordinator();

        coordinator.handle_device_token("dev-123").await;

        assert_eq!(transport.register_calls.load(Ordering::SeqCst), 0);
        assert!(!coordinator.is_registered());
        assert_eq!(coordinator.pending_token(), Some("dev-123".to_string()));
    }

    #[tokio::test]
    async fn authentication_registers_cached_token() {
        let (coordinator, transport) = make_coordinator();

        coordinator.handle_device_token("dev-123").await;
        coordinator.handle_auth_state(true).await;

        assert_eq!(transport.register_calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            *transport.registered_tokens.lock().unwrap(),
            vec!["dev-123".to_string()]
        );
        assert!(coordinator.is_registered());
    }

    #[tokio::test]
    async fn token_while_authenticated_registers_immediately() {
        let (coordinator, transport) = make_coordinator();

        coordinator.handle_auth_state(true).await;
        coordinator.handle_device_token("dev-123").await;

        assert_eq!(transport.register_calls.load(Ordering::SeqCst), 1);
        assert!(coordinator.is_registered());
    }

    #[tokio::test]
    async fn repeated_auth_publishes_do_not_reregister() {
        let (coordinator, transport) = make_coordinator();

        coordinator.handle_device_token("dev-123").await;
        coordinator.handle_auth_state(true).await;
        coordinator.handle_auth_state(true).await;

        assert_eq!(transport.register_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_triggers_collapse_to_one_registration() {
        let (coordinator, transport) = make_coordinator();
        let gate = transport.gate_register();

        coordinator.handle_device_token("dev-123").await;
        coordinator.authenticated.store(true, Ordering::SeqCst);

        let first = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.retry_registration().await })
        };
        // Let the first attempt reach the gated transport call.
        sleep(Duration::from_millis(50)).await;

        // Second trigger while the first is outstanding: must be a no-op.
        coordinator.retry_registration().await;

        gate.notify_one();
        first.await.unwrap();

        assert_eq!(transport.register_calls.load(Ordering::SeqCst), 1);
        assert!(coordinator.is_registered());
    }

    #[tokio::test]
    async fn failed_registration_is_retried_with_same_token_on_next_publish() {
        let (coordinator, transport) = make_coordinator();
        transport.fail_next_registers(1);

        coordinator.handle_device_token("dev-123").await;
        coordinator.handle_auth_state(true).await;
        assert!(!coordinator.is_registered());
        assert_eq!(coordinator.pending_token(), Some("dev-123".to_string()));

        // Next authenticated publish (e.g. after a successful refresh)
        // retries with the cached token.
        coordinator.handle_auth_state(true).await;

        assert_eq!(transport.register_calls.load(Ordering::SeqCst), 2);
        assert_eq!(
            *transport.registered_tokens.lock().unwrap(),
            vec!["dev-123".to_string(), "dev-123".to_string()]
        );
        assert!(coordinator.is_registered());
    }

    #[tokio::test]
    async fn logout_publish_resets_flag_but_keeps_token() {
        let (coordinator, transport) = make_coordinator();

        coordinator.handle_device_token("dev-123").await;
        coordinator.handle_auth_state(true).await;
        assert!(coordinator.is_registered());

        coordinator.handle_auth_state(false).await;
        assert!(!coordinator.is_registered());
        assert_eq!(coordinator.pending_token(), Some("dev-123".to_string()));

        // Re-authentication registers again without a fresh platform token.
        coordinator.handle_auth_state(true).await;
        assert_eq!(transport.register_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn unregister_clears_local_state_even_on_backend_failure() {
        let (coordinator, transport) = make_coordinator();

        coordinator.handle_device_token("dev-123").await;
        coordinator.handle_auth_state(true).await;

        transport.fail_unregister.store(true, Ordering::SeqCst);
        coordinator.unregister_device_token().await;

        assert_eq!(transport.unregister_calls.load(Ordering::SeqCst), 1);
        assert!(!coordinator.is_registered());
        assert_eq!(coordinator.pending_token(), None);
    }

    #[tokio::test]
    async fn new_token_replaces_old_registration() {
        let (coordinator, transport) = make_coordinator();

        coordinator.handle_auth_state(true).await;
        coordinator.handle_device_token("dev-1").await;
        assert!(coordinator.is_registered());

        coordinator.handle_device_token("dev-2").await;

        assert_eq!(transport.register_calls.load(Ordering::SeqCst), 2);
        assert_eq!(
            *transport.registered_tokens.lock().unwrap(),
            vec!["dev-1".to_string(), "dev-2".to_string()]
        );
        assert!(coordinator.is_registered());
    }
}
