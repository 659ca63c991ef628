//! Sled-backed storage engine.
//!
//! The [`SledStorage`] owns a sled database and a single `keyring`
//! tree. Each [`StorageData`] field lives under its own key as a JSON
//! value; a [`StorageUpdate`] is written as one sled batch so a
//! partially applied update is never observable.

use std::path::Path;

use icring_types::{IcringError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::storage::{KeyringStorage, StorageData, StorageUpdate};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Name of the tree holding the keyring fields.
const TREE_NAME: &str = "keyring";

const KEY_VAULT: &[u8] = b"vault";
const KEY_IS_INITIALIZED: &[u8] = b"isInitialized";
const KEY_IS_UNLOCKED: &[u8] = b"isUnlocked";
const KEY_CURRENT_WALLET_ID: &[u8] = b"currentWalletId";
const KEY_VERSION: &[u8] = b"version";
const KEY_NETWORK_MODULE: &[u8] = b"networkModule";

// ---------------------------------------------------------------------------
// SledStorage
// ---------------------------------------------------------------------------

/// Persistent storage backed by sled.
pub struct SledStorage {
    db: sled::Db,
    tree: sled::Tree,
}

impl SledStorage {
    /// Opens (or creates) the database at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`IcringError::StorageError`] if the database or its
    /// tree cannot be opened.
    pub fn open(path: &Path) -> Result<Self> {
        let db = sled::open(path).map_err(|e| IcringError::StorageError {
            reason: format!("failed to open sled database at {}: {e}", path.display()),
        })?;
        Self::from_db(db)
    }

    /// Opens a throwaway database that is deleted on drop.
    ///
    /// # Errors
    ///
    /// Returns [`IcringError::StorageError`] if sled cannot create it.
    pub fn temporary() -> Result<Self> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(|e| IcringError::StorageError {
                reason: format!("failed to open temporary sled database: {e}"),
            })?;
        Self::from_db(db)
    }

    fn from_db(db: sled::Db) -> Result<Self> {
        let tree = db.open_tree(TREE_NAME).map_err(|e| IcringError::StorageError {
            reason: format!("failed to open tree '{TREE_NAME}': {e}"),
        })?;
        Ok(Self { db, tree })
    }

    /// Flushes all pending writes to disk.
    ///
    /// # Errors
    ///
    /// Returns [`IcringError::StorageError`] if the flush fails.
    pub fn flush(&self) -> Result<()> {
        self.db.flush().map_err(|e| IcringError::StorageError {
            reason: format!("failed to flush database: {e}"),
        })?;
        Ok(())
    }

    fn read<T: DeserializeOwned>(&self, key: &[u8]) -> Result<Option<T>> {
        let raw = self.tree.get(key).map_err(|e| IcringError::StorageError {
            reason: format!("failed to read '{}': {e}", String::from_utf8_lossy(key)),
        })?;
        match raw {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}

fn put<T: Serialize>(batch: &mut sled::Batch, key: &[u8], value: Option<&T>) -> Result<()> {
    if let Some(value) = value {
        batch.insert(key, serde_json::to_vec(value)?);
    }
    Ok(())
}

impl KeyringStorage for SledStorage {
    fn get(&self) -> Result<Option<StorageData>> {
        if self.tree.is_empty() {
            return Ok(None);
        }
        Ok(Some(StorageData {
            vault: self.read(KEY_VAULT)?,
            is_initialized: self.read(KEY_IS_INITIALIZED)?.unwrap_or(false),
            is_unlocked: self.read(KEY_IS_UNLOCKED)?.unwrap_or(false),
            current_wallet_id: self.read(KEY_CURRENT_WALLET_ID)?,
            version: self.read(KEY_VERSION)?,
            network_module: self.read(KEY_NETWORK_MODULE)?,
        }))
    }

    fn set(&self, update: StorageUpdate) -> Result<()> {
        if update.is_empty() {
            return Ok(());
        }

        let mut batch = sled::Batch::default();
        put(&mut batch, KEY_VAULT, update.vault.as_ref())?;
        put(&mut batch, KEY_IS_INITIALIZED, update.is_initialized.as_ref())?;
        put(&mut batch, KEY_IS_UNLOCKED, update.is_unlocked.as_ref())?;
        put(&mut batch, KEY_CURRENT_WALLET_ID, update.current_wallet_id.as_ref())?;
        put(&mut batch, KEY_VERSION, update.version.as_ref())?;
        put(&mut batch, KEY_NETWORK_MODULE, update.network_module.as_ref())?;

        self.tree.apply_batch(batch).map_err(|e| IcringError::StorageError {
            reason: format!("failed to apply storage update: {e}"),
        })
    }

    fn clear(&self) -> Result<()> {
        self.tree.clear().map_err(|e| IcringError::StorageError {
            reason: format!("failed to clear tree '{TREE_NAME}': {e}"),
        })?;
        tracing::debug!(tree = TREE_NAME, "keyring storage cleared");
        Ok(())
    }
}
