//! Session coordinator: the single owner of in-memory session state.

use crate::error::{AuthError, AuthOperation, AuthResult};
use crate::gateway::{AuthGateway, NewUserProfile, SessionPayload, User};
use async_trait::async_trait;
use ember_storage::CredentialStore;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, error, info, warn};

/// Capacity of the state broadcast channel. Consumers that lag only miss
/// intermediate snapshots; the latest state is always re-readable via
/// [`SessionCoordinator::state`].
const STATE_CHANNEL_CAPACITY: usize = 16;

/// In-memory session state, published on every transition.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    /// Whether a user is currently authenticated
    pub is_authenticated: bool,
    /// Profile of the authenticated user, if known
    pub current_user: Option<User>,
    /// True while a session operation is in flight
    pub is_loading: bool,
    /// The most recent operation failure, until cleared
    pub last_error: Option<AuthError>,
}

/// Capability for unregistering the push device token before the session is
/// torn down.
///
/// Declared here (not in the notifications crate) so the session
/// coordinator and the device registration coordinator can reach each other
/// without a construction-time reference cycle: the notifications side
/// implements this trait and is bound after construction via
/// [`SessionCoordinator::set_device_registrar`].
#[async_trait]
pub trait DeviceRegistrar: Send + Sync {
    /// Best-effort: implementations clear their local registration state
    /// even if the backend call fails.
    async fn unregister_device_token(&self);
}

/// Coordinates the auth gateway and credential store to implement the
/// session lifecycle: register, login, logout, delete, refresh, validate.
///
/// Constructed once at process start and shared via `Arc`. State writes for
/// an operation always hit storage before the in-memory publish on success
/// paths; on failure no partial in-memory state is published.
pub struct SessionCoordinator {
    /// Backend auth endpoints.
    gateway: Arc<dyn AuthGateway>,
    /// Persisted credential triad.
    store: Arc<CredentialStore>,
    /// Current session state; mutated only by operation handlers.
    state: RwLock<SessionState>,
    /// Fan-out of state snapshots to observers (device registration, UI).
    events: broadcast::Sender<SessionState>,
    /// Deferred-bound capability for device-token unregistration.
    registrar: std::sync::RwLock<Option<Arc<dyn DeviceRegistrar>>>,
}

impl SessionCoordinator {
    /// Create the coordinator, deriving the initial state from storage:
    /// authenticated iff an access token is present.
    pub fn new(gateway: Arc<dyn AuthGateway>, store: Arc<CredentialStore>) -> Self {
        let is_authenticated = match store.has_access_token() {
            Ok(present) => present,
            Err(e) => {
                warn!(error = %e, "Failed to probe stored credentials; starting unauthenticated");
                false
            }
        };
        let (events, _) = broadcast::channel(STATE_CHANNEL_CAPACITY);
        Self {
            gateway,
            store,
            state: RwLock::new(SessionState {
                is_authenticated,
                ..SessionState::default()
            }),
            events,
            registrar: std::sync::RwLock::new(None),
        }
    }

    /// Bind the device-registration capability. Called once during app
    /// wiring, after both coordinators exist.
    pub fn set_device_registrar(&self, registrar: Arc<dyn DeviceRegistrar>) {
        let mut guard = self.registrar.write().expect("lock poisoned");
        *guard = Some(registrar);
    }

    /// Snapshot of the current session state.
    pub async fn state(&self) -> SessionState {
        self.state.read().await.clone()
    }

    /// Whether a user is currently authenticated.
    pub async fn is_authenticated(&self) -> bool {
        self.state.read().await.is_authenticated
    }

    /// Subscribe to session state transitions. Every mutation publishes a
    /// full snapshot.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionState> {
        self.events.subscribe()
    }

    // ==========================================
    // Operations
    // ==========================================

    /// Register a new account and establish a session.
    pub async fn register(&self, profile: &NewUserProfile) -> AuthResult<()> {
        self.begin_operation().await;
        match self.gateway.register(profile).await {
            Ok(payload) => {
                self.finish_authentication(AuthOperation::Register, payload)
                    .await
            }
            Err(e) => {
                let err = AuthError::network(AuthOperation::Register, e);
                self.fail_operation(err.clone()).await;
                Err(err)
            }
        }
    }

    /// Log in with email and password.
    pub async fn login(&self, email: &str, password: &str) -> AuthResult<()> {
        self.begin_operation().await;
        match self.gateway.login(email, password).await {
            Ok(payload) => {
                self.finish_authentication(AuthOperation::Login, payload)
                    .await
            }
            Err(e) => {
                let err = AuthError::network(AuthOperation::Login, e);
                self.fail_operation(err.clone()).await;
                Err(err)
            }
        }
    }

    /// Tear down the session. Always succeeds locally: the gateway call and
    /// credential cleanup are best-effort, and the in-memory state is reset
    /// unconditionally.
    pub async fn logout(&self) {
        self.begin_operation().await;

        // Unregister the device token first, while the backend can still be
        // reached with a valid access token.
        self.unregister_device().await;

        match self.store.get_access_token() {
            Ok(Some(token)) => {
                if let Err(e) = self.gateway.logout(&token).await {
                    warn!(error = %e, "Server-side logout failed; clearing local session anyway");
                }
            }
            Ok(None) => debug!("No access token stored; skipping server-side logout"),
            Err(e) => warn!(error = %e, "Failed to read access token for logout"),
        }

        if let Err(e) = self.store.delete_all() {
            warn!(error = %e, "Failed to clear credentials during logout");
        }

        self.set_state(|state| {
            *state = SessionState::default();
        })
        .await;
        info!("Logged out");
    }

    /// Delete the account server-side, then clear all local state.
    ///
    /// Rejected while another operation is in flight: deletion must not
    /// race a concurrent mutating call. On gateway failure local state is
    /// left untouched so the caller can retry deletion.
    pub async fn delete_account(&self) -> AuthResult<()> {
        {
            let mut guard = self.state.write().await;
            if guard.is_loading {
                return Err(AuthError::OperationInProgress);
            }
            guard.is_loading = true;
            guard.last_error = None;
            let snapshot = guard.clone();
            drop(guard);
            let _ = self.events.send(snapshot);
        }

        self.unregister_device().await;

        let token = match self.store.get_access_token() {
            Ok(Some(token)) => token,
            Ok(None) => {
                let err = AuthError::AccountDeletionFailed("no access token stored".to_string());
                self.fail_operation(err.clone()).await;
                return Err(err);
            }
            Err(e) => {
                let err = AuthError::storage(AuthOperation::Delete, e);
                self.fail_operation(err.clone()).await;
                return Err(err);
            }
        };

        match self.gateway.delete_account(&token).await {
            Ok(()) => {
                if let Err(e) = self.store.delete_all() {
                    warn!(error = %e, "Failed to clear credentials after account deletion");
                }
                self.set_state(|state| {
                    *state = SessionState::default();
                })
                .await;
                info!("Account deleted");
                Ok(())
            }
            Err(e) => {
                let err = AuthError::AccountDeletionFailed(e.to_string());
                self.fail_operation(err.clone()).await;
                Err(err)
            }
        }
    }

    /// Refresh the session using the stored refresh token.
    ///
    /// Returns the new access token. Any failure forces a logout before the
    /// original error is re-raised: a session that cannot be refreshed
    /// cannot be trusted.
    pub async fn refresh_token(&self) -> AuthResult<String> {
        self.begin_operation().await;
        match self.try_refresh().await {
            Ok(token) => Ok(token),
            Err(err) => {
                warn!(error = %err, "Token refresh failed; logging out");
                self.logout().await;
                self.set_state(|state| {
                    state.last_error = Some(err.clone());
                })
                .await;
                Err(err)
            }
        }
    }

    /// Refresh if currently authenticated; no-op otherwise.
    pub async fn validate_session(&self) -> AuthResult<()> {
        if !self.is_authenticated().await {
            debug!("Session validation skipped (unauthenticated)");
            return Ok(());
        }
        self.refresh_token().await.map(|_| ())
    }

    /// Clear the last error without affecting other state.
    pub async fn clear_error(&self) {
        self.set_state(|state| {
            state.last_error = None;
        })
        .await;
    }

    // ==========================================
    // Internals
    // ==========================================

    async fn try_refresh(&self) -> AuthResult<String> {
        let refresh_token = self
            .store
            .get_refresh_token()
            .map_err(|e| AuthError::storage(AuthOperation::Refresh, e))?
            .ok_or(AuthError::NoRefreshToken)?;

        let payload = self
            .gateway
            .refresh(&refresh_token)
            .await
            .map_err(|e| AuthError::network(AuthOperation::Refresh, e))?;

        self.save_credentials(AuthOperation::Refresh, &payload)?;

        let access_token = payload.access_token.clone();
        self.set_state(|state| {
            state.is_authenticated = true;
            state.current_user = Some(payload.user.clone());
            state.is_loading = false;
            state.last_error = None;
        })
        .await;
        debug!("Session refreshed");
        Ok(access_token)
    }

    /// Persist the payload's credentials, then publish the authenticated
    /// state. Storage precedes the in-memory publish so the lifecycle
    /// ordering invariant holds: the session never reports authenticated
    /// without credentials present.
    async fn finish_authentication(
        &self,
        operation: AuthOperation,
        payload: SessionPayload,
    ) -> AuthResult<()> {
        if let Err(err) = self.save_credentials(operation, &payload) {
            self.fail_operation(err.clone()).await;
            return Err(err);
        }
        let user = payload.user;
        self.set_state(|state| {
            state.is_authenticated = true;
            state.current_user = Some(user);
            state.is_loading = false;
            state.last_error = None;
        })
        .await;
        info!(operation = %operation, "Authenticated");
        Ok(())
    }

    /// Atomic credential save: snapshot the previous triad, write the three
    /// keys in sequence, and on any write failure replay the snapshot to
    /// undo partial progress. The original write error is always the one
    /// propagated; a restore failure is logged and the session stays on the
    /// previous credentials as far as storage allows.
    fn save_credentials(
        &self,
        operation: AuthOperation,
        payload: &SessionPayload,
    ) -> AuthResult<()> {
        let snapshot = self
            .store
            .snapshot()
            .map_err(|e| AuthError::storage(operation, e))?;

        let write_result = self
            .store
            .set_access_token(&payload.access_token)
            .and_then(|_| self.store.set_refresh_token(&payload.refresh_token))
            .and_then(|_| self.store.set_user_id(&payload.user.id));

        if let Err(write_err) = write_result {
            if let Err(restore_err) = self.store.restore(&snapshot) {
                error!(
                    write_error = %write_err,
                    restore_error = %restore_err,
                    "Credential rollback failed; stored credentials may be inconsistent"
                );
            } else {
                warn!(error = %write_err, "Credential write failed; previous credentials restored");
            }
            return Err(AuthError::storage(operation, write_err));
        }
        Ok(())
    }

    /// Mark an operation as in flight and clear any stale error.
    async fn begin_operation(&self) {
        self.set_state(|state| {
            state.is_loading = true;
            state.last_error = None;
        })
        .await;
    }

    /// Mark an operation as failed without touching authentication state.
    async fn fail_operation(&self, err: AuthError) {
        self.set_state(|state| {
            state.is_loading = false;
            state.last_error = Some(err);
        })
        .await;
    }

    /// Mutate state under the write lock and publish the new snapshot.
    async fn set_state<F: FnOnce(&mut SessionState)>(&self, mutate: F) {
        let snapshot = {
            let mut guard = self.state.write().await;
            mutate(&mut guard);
            guard.clone()
        };
        let _ = self.events.send(snapshot);
    }

    /// Best-effort device-token unregistration through the bound capability.
    async fn unregister_device(&self) {
        let registrar = {
            let guard = self.registrar.read().expect("lock poisoned");
            guard.clone()
        };
        match registrar {
            Some(registrar) => registrar.unregister_device_token().await,
            None => debug!("No device registrar bound; skipping token unregistration"),
        }
    }
}
