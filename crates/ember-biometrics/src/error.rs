//! Biometric error taxonomy and platform code mapping.

use thiserror::Error;

/// Raw failure reported by the platform authentication API.
#[derive(Debug, Clone)]
pub struct PromptFailure {
    /// Platform-specific error code
    pub code: i32,
    /// Platform-provided description
    pub message: String,
}

/// Closed set of biometric authentication failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BiometricError {
    /// No biometric hardware, or it cannot be used right now
    #[error("Biometric authentication is not available")]
    NotAvailable,

    /// Hardware present but no biometrics enrolled
    #[error("No biometrics are enrolled")]
    NotEnrolled,

    /// Too many failed attempts; biometry is locked until passcode entry
    #[error("Biometric authentication is locked out")]
    LockedOut,

    /// The user dismissed the prompt
    #[error("Authentication was cancelled")]
    UserCancelled,

    /// The user chose the fallback action instead of biometrics
    #[error("User chose the fallback method")]
    UserChoseFallback,

    /// The system dismissed the prompt (app backgrounded, another prompt)
    #[error("Authentication was cancelled by the system")]
    SystemCancelled,

    /// The biometric reading did not match
    #[error("Biometric authentication failed")]
    AuthenticationFailed,

    /// Unmapped platform error, original message preserved
    #[error("Biometric error: {0}")]
    Unknown(String),
}

// Platform local-authentication error codes.
const CODE_AUTHENTICATION_FAILED: i32 = -1;
const CODE_USER_CANCEL: i32 = -2;
const CODE_USER_FALLBACK: i32 = -3;
const CODE_SYSTEM_CANCEL: i32 = -4;
const CODE_PASSCODE_NOT_SET: i32 = -5;
const CODE_BIOMETRY_NOT_AVAILABLE: i32 = -6;
const CODE_BIOMETRY_NOT_ENROLLED: i32 = -7;
const CODE_BIOMETRY_LOCKOUT: i32 = -8;
const CODE_APP_CANCEL: i32 = -9;

/// Map a raw platform failure into the closed taxonomy.
///
/// Unmapped codes become [`BiometricError::Unknown`] carrying the original
/// message; they are never coerced into a misleading category. In
/// particular an invalid-context error must not surface as
/// `AuthenticationFailed`.
pub fn map_platform_code(failure: &PromptFailure) -> BiometricError {
    match failure.code {
        CODE_AUTHENTICATION_FAILED => BiometricError::AuthenticationFailed,
        CODE_USER_CANCEL => BiometricError::UserCancelled,
        CODE_USER_FALLBACK => BiometricError::UserChoseFallback,
        CODE_SYSTEM_CANCEL | CODE_APP_CANCEL => BiometricError::SystemCancelled,
        CODE_PASSCODE_NOT_SET | CODE_BIOMETRY_NOT_AVAILABLE => BiometricError::NotAvailable,
        CODE_BIOMETRY_NOT_ENROLLED => BiometricError::NotEnrolled,
        CODE_BIOMETRY_LOCKOUT => BiometricError::LockedOut,
        _ => BiometricError::Unknown(failure.message.clone()),
    }
}
