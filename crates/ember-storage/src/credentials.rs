//! Typed facade over the persisted credential triad.

use crate::{CredentialKeys, SecureStorage, StorageResult};

/// Point-in-time copy of the credential triad, taken before a multi-key
/// write so a partially-failed write can be rolled back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialSnapshot {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub user_id: Option<String>,
}

/// Scoped store for the access token / refresh token / user id triad.
///
/// Holds no business logic: callers own the ordering and rollback protocol.
/// Failures are always reported, never swallowed.
pub struct CredentialStore {
    storage: Box<dyn SecureStorage>,
}

impl CredentialStore {
    /// Create a new credential store with the given storage backend
    pub fn new(storage: Box<dyn SecureStorage>) -> Self {
        Self { storage }
    }

    /// Store the access token
    pub fn set_access_token(&self, token: &str) -> StorageResult<()> {
        self.storage.set(CredentialKeys::ACCESS_TOKEN, token)
    }

    /// Retrieve the access token
    pub fn get_access_token(&self) -> StorageResult<Option<String>> {
        self.storage.get(CredentialKeys::ACCESS_TOKEN)
    }

    /// Check if an access token is present
    pub fn has_access_token(&self) -> StorageResult<bool> {
        self.storage.has(CredentialKeys::ACCESS_TOKEN)
    }

    /// Store the refresh token
    pub fn set_refresh_token(&self, token: &str) -> StorageResult<()> {
        self.storage.set(CredentialKeys::REFRESH_TOKEN, token)
    }

    /// Retrieve the refresh token
    pub fn get_refresh_token(&self) -> StorageResult<Option<String>> {
        self.storage.get(CredentialKeys::REFRESH_TOKEN)
    }

    /// Store the user id
    pub fn set_user_id(&self, user_id: &str) -> StorageResult<()> {
        self.storage.set(CredentialKeys::USER_ID, user_id)
    }

    /// Retrieve the user id
    pub fn get_user_id(&self) -> StorageResult<Option<String>> {
        self.storage.get(CredentialKeys::USER_ID)
    }

    /// Read all three credential keys.
    ///
    /// Taken by the session coordinator before a triad write; the snapshot
    /// is replayed through [`restore`](Self::restore) if any write fails.
    pub fn snapshot(&self) -> StorageResult<CredentialSnapshot> {
        Ok(CredentialSnapshot {
            access_token: self.storage.get(CredentialKeys::ACCESS_TOKEN)?,
            refresh_token: self.storage.get(CredentialKeys::REFRESH_TOKEN)?,
            user_id: self.storage.get(CredentialKeys::USER_ID)?,
        })
    }

    /// Replay a snapshot: re-save keys that were present, delete keys that
    /// were absent. Undoes partial progress of a failed triad write.
    pub fn restore(&self, snapshot: &CredentialSnapshot) -> StorageResult<()> {
        let entries = [
            (CredentialKeys::ACCESS_TOKEN, &snapshot.access_token),
            (CredentialKeys::REFRESH_TOKEN, &snapshot.refresh_token),
            (CredentialKeys::USER_ID, &snapshot.user_id),
        ];
        for (key, previous) in entries {
            match previous {
                Some(value) => self.storage.set(key, value)?,
                None => {
                    self.storage.delete(key)?;
                }
            }
        }
        Ok(())
    }

    /// Delete all credential keys. Each delete is attempted even if an
    /// earlier one fails; the first error is reported.
    pub fn delete_all(&self) -> StorageResult<()> {
        let mut first_error = None;
        for key in CredentialKeys::ALL {
            if let Err(e) = self.storage.delete(key) {
                tracing::warn!(key = %key, error = %e, "Failed to delete credential key");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
