//! Shared test doubles for session and interceptor tests.

use crate::gateway::{AuthGateway, GatewayError, NewUserProfile, SessionPayload, User};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// Build a session payload for tests.
pub(crate) fn payload(
    access_token: &str,
    refresh_token: &str,
    user_id: &str,
    full_name: &str,
) -> SessionPayload {
    SessionPayload {
        access_token: access_token.to_string(),
        refresh_token: refresh_token.to_string(),
        expires_in: Some(3600),
        user: User {
            id: user_id.to_string(),
            email: "a@b.com".to_string(),
            full_name: full_name.to_string(),
            date_of_birth: None,
            sex: None,
        },
    }
}

/// Programmable auth gateway with per-operation call counters.
///
/// Unscripted operations fail with a transport error. An optional gate on
/// `refresh` lets coalescing tests hold the first refresh open while more
/// callers pile up behind it.
#[derive(Default)]
pub(crate) struct MockGateway {
    login_response: Mutex<Option<Result<SessionPayload, GatewayError>>>,
    register_response: Mutex<Option<Result<SessionPayload, GatewayError>>>,
    refresh_response: Mutex<Option<Result<SessionPayload, GatewayError>>>,
    logout_error: Mutex<Option<GatewayError>>,
    delete_error: Mutex<Option<GatewayError>>,
    refresh_gate: Mutex<Option<Arc<Notify>>>,
    refresh_count: AtomicUsize,
    logout_count: AtomicUsize,
    delete_count: AtomicUsize,
}

impl MockGateway {
    pub(crate) fn set_login_response(&self, response: Result<SessionPayload, GatewayError>) {
        *self.login_response.lock().unwrap() = Some(response);
    }

    pub(crate) fn set_register_response(&self, response: Result<SessionPayload, GatewayError>) {
        *self.register_response.lock().unwrap() = Some(response);
    }

    pub(crate) fn set_refresh_response(&self, response: Result<SessionPayload, GatewayError>) {
        *self.refresh_response.lock().unwrap() = Some(response);
    }

    pub(crate) fn set_logout_error(&self, error: Option<GatewayError>) {
        *self.logout_error.lock().unwrap() = error;
    }

    pub(crate) fn set_delete_error(&self, error: Option<GatewayError>) {
        *self.delete_error.lock().unwrap() = error;
    }

    /// Hold each refresh call open until the returned notify fires.
    pub(crate) fn gate_refresh(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.refresh_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub(crate) fn refresh_calls(&self) -> usize {
        self.refresh_count.load(Ordering::SeqCst)
    }

    pub(crate) fn logout_calls(&self) -> usize {
        self.logout_count.load(Ordering::SeqCst)
    }

    pub(crate) fn delete_calls(&self) -> usize {
        self.delete_count.load(Ordering::SeqCst)
    }

    fn scripted(
        slot: &Mutex<Option<Result<SessionPayload, GatewayError>>>,
        operation: &str,
    ) -> Result<SessionPayload, GatewayError> {
        slot.lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| Err(GatewayError::Transport(format!("no scripted {}", operation))))
    }
}

#[async_trait]
impl AuthGateway for MockGateway {
    async fn register(&self, _profile: &NewUserProfile) -> Result<SessionPayload, GatewayError> {
        Self::scripted(&self.register_response, "register")
    }

    async fn login(&self, _email: &str, _password: &str) -> Result<SessionPayload, GatewayError> {
        Self::scripted(&self.login_response, "login")
    }

    async fn refresh(&self, _refresh_token: &str) -> Result<SessionPayload, GatewayError> {
        self.refresh_count.fetch_add(1, Ordering::SeqCst);
        let gate = self.refresh_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        Self::scripted(&self.refresh_response, "refresh")
    }

    async fn logout(&self, _access_token: &str) -> Result<(), GatewayError> {
        self.logout_count.fetch_add(1, Ordering::SeqCst);
        match self.logout_error.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn delete_account(&self, _access_token: &str) -> Result<(), GatewayError> {
        self.delete_count.fetch_add(1, Ordering::SeqCst);
        match self.delete_error.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
