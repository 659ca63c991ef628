//! The encrypted vault.
//!
//! The vault plaintext is the JSON form of a [`VaultPayload`]: every
//! account record with its key material, the seed phrase, the seed
//! account counter, the password and the current account id. It is
//! encrypted as a whole by the keyring [`Cipher`] and written to the
//! storage `vault` field; every save replaces the whole blob.
//!
//! JSON numbers are kept as exact integers by `serde_json`, so counters
//! and order numbers beyond 2^53 survive a round trip.

use std::collections::BTreeMap;
use std::sync::Arc;

use icring_crypto::cipher::Cipher;
use icring_storage::{KeyringStorage, StorageData, StorageUpdate};
use icring_types::{IcringError, Result, SchemaVersion};
use icring_wallet::AccountRecord;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, Zeroizing};

// ---------------------------------------------------------------------------
// VaultPayload
// ---------------------------------------------------------------------------

/// Plaintext content of the vault.
///
/// `mnemonic` and `password` are zeroized when the payload is dropped.
#[derive(Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultPayload {
    #[serde(default)]
    pub wallets: BTreeMap<String, AccountRecord>,
    #[serde(default)]
    pub mnemonic: String,
    #[serde(default)]
    pub mnemonic_wallet_count: u64,
    #[serde(default)]
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_wallet_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<SchemaVersion>,
}

impl Drop for VaultPayload {
    fn drop(&mut self) {
        self.mnemonic.zeroize();
        self.password.zeroize();
    }
}

/// Just the seed phrase of a vault.
#[derive(Deserialize)]
struct MnemonicOnly {
    #[serde(default)]
    mnemonic: String,
}

impl Drop for MnemonicOnly {
    fn drop(&mut self) {
        self.mnemonic.zeroize();
    }
}

// ---------------------------------------------------------------------------
// Vault
// ---------------------------------------------------------------------------

/// Reads and writes the keyring's persisted state through a storage
/// collaborator, encrypting the vault field with a cipher collaborator.
#[derive(Clone)]
pub struct Vault {
    storage: Arc<dyn KeyringStorage>,
    cipher: Arc<dyn Cipher>,
}

impl Vault {
    pub fn new(storage: Arc<dyn KeyringStorage>, cipher: Arc<dyn Cipher>) -> Self {
        Self { storage, cipher }
    }

    /// Reads every persisted field; absent storage reads as empty.
    pub fn load(&self) -> Result<StorageData> {
        Ok(self.storage.get()?.unwrap_or_default())
    }

    /// Writes the present fields of `update`.
    pub fn set(&self, update: StorageUpdate) -> Result<()> {
        self.storage.set(update)
    }

    /// Removes every persisted field.
    pub fn clear(&self) -> Result<()> {
        self.storage.clear()
    }

    /// Decrypts a vault blob into its loosely shaped JSON value.
    ///
    /// The value may predate the current schema; it is parsed into a
    /// [`VaultPayload`] only after migration.
    ///
    /// # Errors
    ///
    /// - [`IcringError::CryptoError`] on a wrong password or corrupt blob.
    /// - [`IcringError::SerializationError`] if the plaintext is not JSON.
    pub fn decrypt(&self, blob: &str, password: &str) -> Result<serde_json::Value> {
        let plaintext = self.cipher.decrypt(blob, password)?;
        Ok(serde_json::from_str(&plaintext)?)
    }

    /// Serializes and encrypts `payload` under `password`.
    pub fn seal(&self, payload: &VaultPayload, password: &str) -> Result<String> {
        let plaintext = Zeroizing::new(serde_json::to_string(payload)?);
        self.cipher.encrypt(&plaintext, password)
    }

    /// Encrypts `payload` and writes it together with `update`.
    pub fn save(&self, payload: &VaultPayload, password: &str, update: StorageUpdate) -> Result<()> {
        let blob = self.seal(payload, password)?;
        self.storage.set(StorageUpdate {
            vault: Some(blob),
            ..update
        })
    }

    /// Decrypts the stored vault and returns only its seed phrase.
    ///
    /// # Errors
    ///
    /// - [`IcringError::NotInitialized`] if no vault is stored.
    /// - Any error of [`decrypt`](Self::decrypt).
    pub fn read_mnemonic(&self, password: &str) -> Result<Zeroizing<String>> {
        let data = self.load()?;
        let blob = data.vault.ok_or(IcringError::NotInitialized)?;
        let plaintext = self.cipher.decrypt(&blob, password)?;
        let mut parsed: MnemonicOnly = serde_json::from_str(&plaintext)?;
        Ok(Zeroizing::new(std::mem::take(&mut parsed.mnemonic)))
    }
}
