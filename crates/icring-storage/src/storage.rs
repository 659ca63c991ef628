//! The storage contract consumed by the keyring.

use icring_types::{Result, SchemaVersion};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// StorageData / StorageUpdate
// ---------------------------------------------------------------------------

/// Everything the keyring keeps in its storage medium.
///
/// Only `vault` holds secrets, and it is opaque ciphertext.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageData {
    /// Encrypted vault blob produced by the keyring cipher.
    pub vault: Option<String>,
    /// Whether a root account was ever created in this storage.
    pub is_initialized: bool,
    /// Whether the vault was open when last persisted.
    pub is_unlocked: bool,
    /// Identifier of the currently selected account.
    pub current_wallet_id: Option<String>,
    /// Schema version of the persisted state.
    pub version: Option<SchemaVersion>,
    /// Serialized network module (networks and registered assets).
    pub network_module: Option<serde_json::Value>,
}

/// Partial update of [`StorageData`]: only the `Some` fields are written.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StorageUpdate {
    pub vault: Option<String>,
    pub is_initialized: Option<bool>,
    pub is_unlocked: Option<bool>,
    pub current_wallet_id: Option<String>,
    pub version: Option<SchemaVersion>,
    pub network_module: Option<serde_json::Value>,
}

impl StorageUpdate {
    /// Returns `true` if the update writes no field.
    pub fn is_empty(&self) -> bool {
        self.vault.is_none()
            && self.is_initialized.is_none()
            && self.is_unlocked.is_none()
            && self.current_wallet_id.is_none()
            && self.version.is_none()
            && self.network_module.is_none()
    }

    /// Applies the present fields onto `data`.
    pub fn apply_to(self, data: &mut StorageData) {
        if let Some(vault) = self.vault {
            data.vault = Some(vault);
        }
        if let Some(flag) = self.is_initialized {
            data.is_initialized = flag;
        }
        if let Some(flag) = self.is_unlocked {
            data.is_unlocked = flag;
        }
        if let Some(id) = self.current_wallet_id {
            data.current_wallet_id = Some(id);
        }
        if let Some(version) = self.version {
            data.version = Some(version);
        }
        if let Some(module) = self.network_module {
            data.network_module = Some(module);
        }
    }
}

// ---------------------------------------------------------------------------
// KeyringStorage
// ---------------------------------------------------------------------------

/// Key/value storage medium of the keyring.
///
/// Writes are whole-field replacements. Implementations must make a
/// single [`set`](Self::set) call visible atomically to later reads.
pub trait KeyringStorage: Send + Sync {
    /// Reads all persisted fields, or `None` if nothing was ever stored.
    ///
    /// # Errors
    ///
    /// Returns [`IcringError::StorageError`](icring_types::IcringError::StorageError)
    /// or a serialization error if the medium cannot be read.
    fn get(&self) -> Result<Option<StorageData>>;

    /// Overwrites the fields present in `update`.
    fn set(&self, update: StorageUpdate) -> Result<()>;

    /// Removes every persisted field.
    fn clear(&self) -> Result<()>;
}
