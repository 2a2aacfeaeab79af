//! Secure credential storage for the Ember app.
//!
//! This crate provides:
//! - The [`SecureStorage`] trait, the boundary to platform-secure key/value
//!   storage (keychain, keystore). Backends persist across process restarts.
//! - [`MemoryStorage`], an in-memory backend for tests and development.
//! - [`CredentialStore`], the typed facade over the credential triad
//!   (access token, refresh token, user id) used by the session coordinator.

mod credentials;
mod keys;
mod memory;
mod traits;

pub use credentials::{CredentialSnapshot, CredentialStore};
pub use keys::CredentialKeys;
pub use memory::MemoryStorage;
pub use traits::SecureStorage;

use thiserror::Error;

/// Error type for storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Platform-specific storage error
    #[error("Platform storage error: {0}")]
    Platform(String),

    /// Encoding/decoding error
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
