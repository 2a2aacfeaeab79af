//! Biometric re-authentication for the Ember app.
//!
//! Wraps platform biometric/passcode prompts behind [`BiometricGate`],
//! normalizing heterogeneous platform error codes into the closed
//! [`BiometricError`] taxonomy.

mod error;
mod gate;

pub use error::{map_platform_code, BiometricError, PromptFailure};
pub use gate::{BiometricGate, BiometricKind, BiometricProbe, BiometricProvider};
