//! Auth error taxonomy.

use thiserror::Error;

/// The session operation an error originated from. Carried on every
/// [`AuthError`] so the presentation layer can surface an
/// operation-specific message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOperation {
    Register,
    Login,
    Refresh,
    Logout,
    Delete,
}

impl std::fmt::Display for AuthOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self {
            AuthOperation::Register => "register",
            AuthOperation::Login => "login",
            AuthOperation::Refresh => "refresh",
            AuthOperation::Logout => "logout",
            AuthOperation::Delete => "delete",
        };
        f.write_str(tag)
    }
}

/// Errors surfaced by session lifecycle operations.
///
/// Clone is required: the refresh interceptor fans the same terminal error
/// out to every coalesced waiter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Gateway call failed
    #[error("Network failure during {operation}: {message}")]
    Network {
        operation: AuthOperation,
        message: String,
    },

    /// Credential storage failed
    #[error("Storage failure during {operation}: {message}")]
    Storage {
        operation: AuthOperation,
        message: String,
    },

    /// Refresh attempted with no refresh token stored
    #[error("No refresh token stored")]
    NoRefreshToken,

    /// A mutating operation is already in flight
    #[error("Another operation is in progress")]
    OperationInProgress,

    /// Remote account deletion failed; local state was left untouched
    #[error("Account deletion failed: {0}")]
    AccountDeletionFailed(String),
}

impl AuthError {
    /// Tag a gateway failure with the operation that provoked it.
    pub fn network(operation: AuthOperation, err: impl std::fmt::Display) -> Self {
        AuthError::Network {
            operation,
            message: err.to_string(),
        }
    }

    /// Tag a storage failure with the operation that provoked it.
    pub fn storage(operation: AuthOperation, err: impl std::fmt::Display) -> Self {
        AuthError::Storage {
            operation,
            message: err.to_string(),
        }
    }

    /// The operation this error is tagged with, if any.
    pub fn operation(&self) -> Option<AuthOperation> {
        match self {
            AuthError::Network { operation, .. } | AuthError::Storage { operation, .. } => {
                Some(*operation)
            }
            AuthError::NoRefreshToken => Some(AuthOperation::Refresh),
            AuthError::AccountDeletionFailed(_) => Some(AuthOperation::Delete),
            AuthError::OperationInProgress => None,
        }
    }
}

/// Result type for auth operations.
pub type AuthResult<T> = Result<T, AuthError>;
