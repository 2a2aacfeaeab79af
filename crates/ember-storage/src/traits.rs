//! Storage trait definitions.

use crate::StorageResult;

/// Trait for secure storage backends.
///
/// Backends must be safe under concurrent access from multiple tasks; the
/// credential store may be reached from background refresh paths while a
/// foreground operation is in flight.
pub trait SecureStorage: Send + Sync {
    /// Store a value securely
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Retrieve a value
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Delete a value. Returns true if the key was present.
    fn delete(&self, key: &str) -> StorageResult<bool>;

    /// Check if a key exists
    fn has(&self, key: &str) -> StorageResult<bool> {
        Ok(self.get(key)?.is_some())
    }
}
