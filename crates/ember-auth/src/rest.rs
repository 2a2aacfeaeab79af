//! REST implementation of the auth gateway.

use crate::gateway::{AuthGateway, GatewayError, NewUserProfile, SessionPayload};
use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Summarize a response body for logging without leaking tokens.
fn summarize_response_body(body: &str) -> String {
    let mut hasher = DefaultHasher::new();
    body.hash(&mut hasher);
    format!("len={},digest={:016x}", body.len(), hasher.finish())
}

/// Auth gateway backed by the Ember backend's REST API.
#[derive(Clone)]
pub struct RestAuthGateway {
    http_client: reqwest::Client,
    api_url: String,
    api_key: String,
}

impl RestAuthGateway {
    /// Create a new gateway.
    ///
    /// # Arguments
    /// * `api_url` - The backend API URL (e.g., `https://api.ember.app`)
    /// * `api_key` - The public API key sent with every request
    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            api_url: api_url.into(),
            api_key: api_key.into(),
        }
    }

    /// Build the URL for an auth endpoint.
    fn auth_url(&self, endpoint: &str) -> String {
        format!("{}/auth/v1/{}", self.api_url, endpoint)
    }

    /// Decode a session payload from a response, converting non-success
    /// statuses into a typed error.
    async fn session_from_response(
        response: reqwest::Response,
        endpoint: &str,
    ) -> Result<SessionPayload, GatewayError> {
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            let body_summary = summarize_response_body(&body);
            tracing::error!(status = status, body_summary = %body_summary, endpoint = %endpoint, "Auth request failed");
            return Err(GatewayError::Http {
                status,
                message: format!("{} failed ({})", endpoint, body_summary),
            });
        }
        let payload: SessionPayload = response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;
        Ok(payload)
    }

    /// Check a bodiless response for success.
    async fn ack_response(response: reqwest::Response, endpoint: &str) -> Result<(), GatewayError> {
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            let body_summary = summarize_response_body(&body);
            tracing::error!(status = status, body_summary = %body_summary, endpoint = %endpoint, "Auth request failed");
            return Err(GatewayError::Http {
                status,
                message: format!("{} failed ({})", endpoint, body_summary),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl AuthGateway for RestAuthGateway {
    async fn register(&self, profile: &NewUserProfile) -> Result<SessionPayload, GatewayError> {
        tracing::debug!("Registering new account");
        let response = self
            .http_client
            .post(self.auth_url("register"))
            .header("apikey", &self.api_key)
            .header("Content-Type", "application/json")
            .json(profile)
            .send()
            .await?;
        Self::session_from_response(response, "register").await
    }

    async fn login(&self, email: &str, password: &str) -> Result<SessionPayload, GatewayError> {
        tracing::debug!("Logging in");
        let body = serde_json::json!({
            "email": email,
            "password": password,
        });
        let response = self
            .http_client
            .post(self.auth_url("login"))
            .header("apikey", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;
        Self::session_from_response(response, "login").await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<SessionPayload, GatewayError> {
        tracing::debug!("Refreshing session");
        let body = serde_json::json!({
            "refresh_token": refresh_token,
        });
        let response = self
            .http_client
            .post(self.auth_url("refresh"))
            .header("apikey", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;
        Self::session_from_response(response, "refresh").await
    }

    async fn logout(&self, access_token: &str) -> Result<(), GatewayError> {
        tracing::debug!("Logging out server-side");
        let response = self
            .http_client
            .post(self.auth_url("logout"))
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", access_token))
            .send()
            .await?;
        Self::ack_response(response, "logout").await
    }

    async fn delete_account(&self, access_token: &str) -> Result<(), GatewayError> {
        tracing::debug!("Deleting account server-side");
        let response = self
            .http_client
            .delete(self.auth_url("account"))
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", access_token))
            .send()
            .await?;
        Self::ack_response(response, "account").await
    }
}
