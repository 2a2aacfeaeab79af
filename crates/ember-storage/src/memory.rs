//! In-memory storage backend.

use crate::{SecureStorage, StorageResult};
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory storage for tests and development builds without a platform
/// keychain. Reads take a shared lock, writes an exclusive one.
pub struct MemoryStorage {
    data: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl SecureStorage for MemoryStorage {
    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let mut data = self.data.write().expect("lock poisoned");
        data.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let data = self.data.read().expect("lock poisoned");
        Ok(data.get(key).cloned())
    }

    fn delete(&self, key: &str) -> StorageResult<bool> {
        let mut data = self.data.write().expect("lock poisoned");
        Ok(data.remove(key).is_some())
    }
}
