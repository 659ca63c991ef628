//! Vault key derivation.
//!
//! The vault key is Argon2id(password, salt) with the costs of
//! [`KeyringConfig`]. Every sealed blob carries its own 16-byte salt,
//! so the same password yields a different key per blob.

use icring_types::config::KeyringConfig;
use icring_types::{IcringError, Result};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Salt length of a sealed vault blob.
pub const SALT_LEN: usize = 16;

/// Argon2id costs.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Argon2Params {
    /// Memory in KiB.
    pub m_cost: u32,
    /// Passes.
    pub t_cost: u32,
    /// Lanes.
    pub p_cost: u32,
}

impl Default for Argon2Params {
    fn default() -> Self {
        Self::from_config(&KeyringConfig::default())
    }
}

impl Argon2Params {
    pub fn from_config(config: &KeyringConfig) -> Self {
        Self {
            m_cost: config.kdf_memory_kib,
            t_cost: config.kdf_iterations,
            p_cost: config.kdf_parallelism,
        }
    }

    fn to_argon2(self) -> Result<argon2::Argon2<'static>> {
        let params = argon2::Params::new(self.m_cost, self.t_cost, self.p_cost, Some(VaultKey::LEN))
            .map_err(|e| IcringError::ConfigError {
                reason: format!("invalid vault KDF costs: {e}"),
            })?;
        Ok(argon2::Argon2::new(
            argon2::Algorithm::Argon2id,
            argon2::Version::V0x13,
            params,
        ))
    }
}

/// Symmetric key of one sealed vault blob. Never cloned or printed.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct VaultKey([u8; 32]);

impl VaultKey {
    pub const LEN: usize = 32;

    /// Derives the key of the blob salted with `salt`.
    ///
    /// # Errors
    ///
    /// - [`IcringError::ConfigError`] for costs Argon2 rejects.
    /// - [`IcringError::CryptoError`] if hashing fails.
    pub fn derive(password: &str, salt: &[u8; SALT_LEN], params: Argon2Params) -> Result<Self> {
        let mut key = Self([0u8; Self::LEN]);
        params
            .to_argon2()?
            .hash_password_into(password.as_bytes(), salt, &mut key.0)
            .map_err(|e| IcringError::CryptoError {
                reason: format!("vault key derivation failed: {e}"),
            })?;
        Ok(key)
    }

    pub(crate) fn as_bytes(&self) -> &[u8; Self::LEN] {
        &self.0
    }
}
