//! End-to-end wiring of the session coordinator and device registration:
//! login registers the cached push token, logout unregisters it first and
//! resets the local flag, and the cached token survives the cycle.

use async_trait::async_trait;
use ember_auth::{
    AuthGateway, GatewayError, NewUserProfile, SessionCoordinator, SessionPayload,
};
use ember_notifications::{DeviceRegistrationCoordinator, NotificationError, NotificationTransport};
use ember_storage::{CredentialStore, MemoryStorage};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::time::{sleep, Duration};

struct StaticGateway;

fn payload() -> SessionPayload {
    serde_json::from_value(serde_json::json!({
        "access_token": "T1",
        "refresh_token": "R1",
        "expires_in": 3600,
        "user": {"id": "42", "email": "a@b.com", "full_name": "A B"}
    }))
    .unwrap()
}

#[async_trait]
impl AuthGateway for StaticGateway {
    async fn register(&self, _profile: &NewUserProfile) -> Result<SessionPayload, GatewayError> {
        Ok(payload())
    }

    async fn login(&self, _email: &str, _password: &str) -> Result<SessionPayload, GatewayError> {
        Ok(payload())
    }

    async fn refresh(&self, _refresh_token: &str) -> Result<SessionPayload, GatewayError> {
        Ok(payload())
    }

    async fn logout(&self, _access_token: &str) -> Result<(), GatewayError> {
        Ok(())
    }

    async fn delete_account(&self, _access_token: &str) -> Result<(), GatewayError> {
        Ok(())
    }
}

#[derive(Default)]
struct CountingTransport {
    register_calls: AtomicUsize,
    unregister_calls: AtomicUsize,
    tokens: Mutex<Vec<String>>,
}

#[async_trait]
impl NotificationTransport for CountingTransport {
    async fn register_device_token(&self, token: &str) -> Result<(), NotificationError> {
        self.register_calls.fetch_add(1, Ordering::SeqCst);
        self.tokens.lock().unwrap().push(token.to_string());
        Ok(())
    }

    async fn unregister_device_token(&self) -> Result<(), NotificationError> {
        self.unregister_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Poll until the condition holds or a generous deadline passes.
async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..100 {
        if condition() {
            return;
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached within deadline");
}

#[tokio::test]
async fn login_logout_cycle_keeps_registration_in_sync() {
    let store = Arc::new(CredentialStore::new(Box::new(MemoryStorage::new())));
    let session = Arc::new(SessionCoordinator::new(Arc::new(StaticGateway), store.clone()));

    let transport = Arc::new(CountingTransport::default());
    let registration = Arc::new(DeviceRegistrationCoordinator::new(transport.clone()));

    // Deferred two-way binding: observer stream one way, capability trait
    // the other. Neither constructor saw the other component.
    registration.observe(session.subscribe());
    session.set_device_registrar(registration.clone());

    // Token arrives before authentication: cached only.
    registration.handle_device_token("dev-123").await;
    assert_eq!(transport.register_calls.load(Ordering::SeqCst), 0);

    session.login("a@b.com", "pw").await.unwrap();

    {
        let registration = registration.clone();
        wait_until(move || registration.is_registered()).await;
    }
    assert_eq!(transport.register_calls.load(Ordering::SeqCst), 1);
    assert_eq!(*transport.tokens.lock().unwrap(), vec!["dev-123".to_string()]);

    session.logout().await;

    // Unregistration ran as part of logout, before local teardown.
    assert_eq!(transport.unregister_calls.load(Ordering::SeqCst), 1);
    assert!(!registration.is_registered());
    assert!(!session.is_authenticated().await);
    assert_eq!(store.get_access_token().unwrap(), None);
}
