//! In-memory storage backend.

use std::sync::{Mutex, MutexGuard};

use icring_types::{IcringError, Result};

use crate::storage::{KeyringStorage, StorageData, StorageUpdate};

/// Mutex-guarded in-process storage. Contents are lost on drop.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    data: Mutex<Option<StorageData>>,
}

impl MemoryStorage {
    /// Creates an empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a storage pre-populated with `data`.
    pub fn with_data(data: StorageData) -> Self {
        Self {
            data: Mutex::new(Some(data)),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Option<StorageData>>> {
        self.data.lock().map_err(|_| IcringError::StorageError {
            reason: "memory storage mutex poisoned".into(),
        })
    }
}

impl KeyringStorage for MemoryStorage {
    fn get(&self) -> Result<Option<StorageData>> {
        Ok(self.lock()?.clone())
    }

    fn set(&self, update: StorageUpdate) -> Result<()> {
        let mut guard = self.lock()?;
        update.apply_to(guard.get_or_insert_with(StorageData::default));
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.lock()? = None;
        Ok(())
    }
}
