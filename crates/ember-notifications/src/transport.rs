//! Notification transport contract and REST implementation.

use async_trait::async_trait;
use ember_storage::CredentialStore;
use std::sync::Arc;
use thiserror::Error;

/// Errors from device-token transport calls.
#[derive(Error, Debug, Clone)]
pub enum NotificationError {
    /// Backend returned a non-success status
    #[error("Backend returned {status}: {message}")]
    Http { status: u16, message: String },

    /// Request never produced a response
    #[error("Transport error: {0}")]
    Transport(String),

    /// No access token available for the call
    #[error("Not authenticated")]
    NotAuthenticated,
}

impl From<reqwest::Error> for NotificationError {
    fn from(err: reqwest::Error) -> Self {
        NotificationError::Transport(err.to_string())
    }
}

/// Contract for backend device-token registration.
#[async_trait]
pub trait NotificationTransport: Send + Sync {
    /// Register the push token for this install.
    async fn register_device_token(&self, token: &str) -> Result<(), NotificationError>;

    /// Remove this install's push token registration.
    async fn unregister_device_token(&self) -> Result<(), NotificationError>;
}

/// Device-token transport backed by the Ember backend's REST API.
///
/// Reads the current access token from the shared credential store at call
/// time: registration can be triggered from the session observer task while
/// a foreground operation also holds the store.
pub struct RestNotificationTransport {
    http_client: reqwest::Client,
    api_url: String,
    api_key: String,
    store: Arc<CredentialStore>,
}

impl RestNotificationTransport {
    /// Create a new transport.
    pub fn new(
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        store: Arc<CredentialStore>,
    ) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            api_url: api_url.into(),
            api_key: api_key.into(),
            store,
        }
    }

    fn devices_url(&self) -> String {
        format!("{}/notifications/v1/devices", self.api_url)
    }

    fn access_token(&self) -> Result<String, NotificationError> {
        self.store
            .get_access_token()
            .map_err(|e| NotificationError::Transport(e.to_string()))?
            .ok_or(NotificationError::NotAuthenticated)
    }
}

#[async_trait]
impl NotificationTransport for RestNotificationTransport {
    async fn register_device_token(&self, token: &str) -> Result<(), NotificationError> {
        let access_token = self.access_token()?;
        let body = serde_json::json!({
            "token": token,
            "registered_at": chrono::Utc::now().to_rfc3339(),
        });

        tracing::debug!("Registering device token with backend");
        let response = self
            .http_client
            .post(self.devices_url())
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", access_token))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            tracing::warn!(status = status, "Device token registration failed");
            return Err(NotificationError::Http { status, message });
        }
        tracing::info!("Device token registered");
        Ok(())
    }

    async fn unregister_device_token(&self) -> Result<(), NotificationError> {
        let access_token = self.access_token()?;

        tracing::debug!("Unregistering device token with backend");
        let response = self
            .http_client
            .delete(self.devices_url())
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", access_token))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            tracing::warn!(status = status, "Device token unregistration failed");
            return Err(NotificationError::Http { status, message });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_storage::MemoryStorage;

    fn make_transport(store: Arc<CredentialStore>) -> RestNotificationTransport {
        RestNotificationTransport::new("https://api.test.ember.app", "test-key", store)
    }

    #[test]
    fn devices_url_shape() {
        let store = Arc::new(CredentialStore::new(Box::new(MemoryStorage::new())));
        let transport = make_transport(store);
        assert_eq!(
            transport.devices_url(),
            "https://api.test.ember.app/notifications/v1/devices"
        );
    }

    #[tokio::test]
    async fn register_without_token_reports_not_authenticated() {
        let store = Arc::new(CredentialStore::new(Box::new(MemoryStorage::new())));
        let transport = make_transport(store);

        let err = transport.register_device_token("dev-123").await.unwrap_err();
        assert!(matches!(err, NotificationError::NotAuthenticated));
    }
}
