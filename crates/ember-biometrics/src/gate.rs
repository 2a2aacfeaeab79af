//! Biometric gate over the platform authentication provider.

use crate::error::{map_platform_code, BiometricError, PromptFailure};
use async_trait::async_trait;
use std::sync::RwLock;
use tracing::{debug, warn};

/// Kind of biometric hardware available on this device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BiometricKind {
    Face,
    Fingerprint,
    None,
}

/// Result of probing biometric availability.
#[derive(Debug, Clone, Copy)]
pub struct BiometricProbe {
    /// Whether a biometric prompt can be presented right now
    pub available: bool,
    /// The biometric modality the hardware offers
    pub kind: BiometricKind,
}

impl BiometricProbe {
    /// Probe result for devices without biometric hardware.
    pub fn unavailable() -> Self {
        Self {
            available: false,
            kind: BiometricKind::None,
        }
    }
}

/// Platform biometric API boundary.
///
/// Implementations report raw platform codes through [`PromptFailure`];
/// mapping into the closed taxonomy happens in [`BiometricGate`], never in
/// the provider.
#[async_trait]
pub trait BiometricProvider: Send + Sync {
    /// Probe current availability and modality.
    fn probe(&self) -> BiometricProbe;

    /// Present the platform prompt. With `allow_passcode_fallback`, device
    /// passcode entry also counts as success.
    async fn prompt(
        &self,
        reason: &str,
        allow_passcode_fallback: bool,
    ) -> Result<(), PromptFailure>;
}

/// Normalizing wrapper around the platform biometric provider.
///
/// Caches the availability probe; call [`refresh_status`](Self::refresh_status)
/// after returning to the foreground, since enrollment and lockout state can
/// change while the app is backgrounded.
pub struct BiometricGate {
    provider: Box<dyn BiometricProvider>,
    status: RwLock<BiometricProbe>,
}

impl BiometricGate {
    /// Create a gate, probing availability once up front.
    pub fn new(provider: Box<dyn BiometricProvider>) -> Self {
        let status = provider.probe();
        debug!(
            available = status.available,
            kind = ?status.kind,
            "Biometric availability probed"
        );
        Self {
            provider,
            status: RwLock::new(status),
        }
    }

    /// Whether a biometric prompt can currently be presented.
    pub fn is_available(&self) -> bool {
        self.status.read().expect("lock poisoned").available
    }

    /// The biometric modality offered by this device.
    pub fn kind(&self) -> BiometricKind {
        self.status.read().expect("lock poisoned").kind
    }

    /// Re-probe availability.
    pub fn refresh_status(&self) {
        let probe = self.provider.probe();
        let mut guard = self.status.write().expect("lock poisoned");
        if guard.available != probe.available || guard.kind != probe.kind {
            debug!(
                available = probe.available,
                kind = ?probe.kind,
                "Biometric availability changed"
            );
        }
        *guard = probe;
    }

    /// Authenticate with biometrics only.
    pub async fn authenticate(&self, reason: &str) -> Result<(), BiometricError> {
        self.run_prompt(reason, false).await
    }

    /// Authenticate with biometrics, accepting the device passcode as a
    /// successful fallback outcome.
    pub async fn authenticate_with_fallback(&self, reason: &str) -> Result<(), BiometricError> {
        self.run_prompt(reason, true).await
    }

    async fn run_prompt(
        &self,
        reason: &str,
        allow_passcode_fallback: bool,
    ) -> Result<(), BiometricError> {
        if !self.is_available() {
            return Err(BiometricError::NotAvailable);
        }
        match self.provider.prompt(reason, allow_passcode_fallback).await {
            Ok(()) => Ok(()),
            Err(failure) => {
                let err = map_platform_code(&failure);
                warn!(code = failure.code, error = %err, "Biometric prompt failed");
                Err(err)
            }
        }
    }
}
