//! Backend auth gateway contract.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// User profile returned by the backend.
///
/// An immutable value: it is replaced wholesale on each successful auth
/// operation and never partially mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Backend user UUID
    pub id: String,
    /// Contact email
    pub email: String,
    /// Display name
    pub full_name: String,
    /// Date of birth (ISO date), if provided during registration
    #[serde(default)]
    pub date_of_birth: Option<String>,
    /// Self-reported sex, if provided during registration
    #[serde(default)]
    pub sex: Option<String>,
}

/// Registration input for a new account.
#[derive(Debug, Clone, Serialize)]
pub struct NewUserProfile {
    pub email: String,
    pub password: String,
    pub full_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sex: Option<String>,
}

/// Session payload returned by register/login/refresh.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionPayload {
    /// Access token for authenticated requests
    pub access_token: String,
    /// Refresh token for minting new access tokens
    pub refresh_token: String,
    /// Access token lifetime in seconds, if the backend reports one
    #[serde(default)]
    pub expires_in: Option<i64>,
    /// Profile of the authenticated user
    pub user: User,
}

/// Errors from gateway calls.
#[derive(Error, Debug, Clone)]
pub enum GatewayError {
    /// Backend returned a non-success status
    #[error("Backend returned {status}: {message}")]
    Http { status: u16, message: String },

    /// Request never produced a response
    #[error("Transport error: {0}")]
    Transport(String),

    /// Response body could not be decoded
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            GatewayError::InvalidResponse(err.to_string())
        } else {
            GatewayError::Transport(err.to_string())
        }
    }
}

/// Contract for the backend auth endpoints.
///
/// The session coordinator is the only caller; it owns tagging failures
/// with the provoking operation and all storage side effects.
#[async_trait]
pub trait AuthGateway: Send + Sync {
    /// Create an account and return the initial session.
    async fn register(&self, profile: &NewUserProfile) -> Result<SessionPayload, GatewayError>;

    /// Exchange email/password for a session.
    async fn login(&self, email: &str, password: &str) -> Result<SessionPayload, GatewayError>;

    /// Exchange a refresh token for a fresh session.
    async fn refresh(&self, refresh_token: &str) -> Result<SessionPayload, GatewayError>;

    /// Invalidate the session server-side.
    async fn logout(&self, access_token: &str) -> Result<(), GatewayError>;

    /// Delete the account server-side.
    async fn delete_account(&self, access_token: &str) -> Result<(), GatewayError>;
}
