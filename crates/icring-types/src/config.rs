//! Keyring configuration with sensible defaults.
//!
//! All operational parameters of the keyring live here. Every value
//! has a documented default; a configuration can also be read from a
//! JSON file with [`KeyringConfig::load`].

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{IcringError, Result};

/// BIP39 phrase lengths accepted for new seed phrases.
pub const SUPPORTED_WORD_COUNTS: [usize; 5] = [12, 15, 18, 21, 24];

/// Global keyring configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyringConfig {
    // ----- Vault cipher ---------------------------------------------------

    /// Argon2id memory cost in KiB used to derive the vault key.
    pub kdf_memory_kib: u32,

    /// Argon2id number of passes.
    pub kdf_iterations: u32,

    /// Argon2id degree of parallelism.
    pub kdf_parallelism: u32,

    // ----- Accounts -------------------------------------------------------

    /// Number of words in freshly generated seed phrases.
    pub mnemonic_word_count: usize,

    /// Display name given to accounts created without one.
    pub default_account_name: String,

    // ----- Networks -------------------------------------------------------

    /// Endpoint of the built-in public network.
    pub mainnet_host: String,
}

impl Default for KeyringConfig {
    fn default() -> Self {
        Self {
            kdf_memory_kib: 65_536,
            kdf_iterations: 3,
            kdf_parallelism: 1,
            mnemonic_word_count: 12,
            default_account_name: "Account 1".into(),
            mainnet_host: "https://icp-api.io".into(),
        }
    }
}

impl KeyringConfig {
    /// Reads and validates a configuration from a JSON file.
    ///
    /// Missing fields fall back to their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`IcringError::ConfigError`] if the file cannot be read,
    /// is not valid JSON, or fails [`validate`](Self::validate).
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path).map_err(|e| IcringError::ConfigError {
            reason: format!("failed to read config file {}: {e}", path.display()),
        })?;
        let config: Self = serde_json::from_str(&data).map_err(|e| IcringError::ConfigError {
            reason: format!("failed to parse config file {}: {e}", path.display()),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validates all configuration values.
    ///
    /// Returns an error if any value is outside its acceptable range.
    pub fn validate(&self) -> Result<()> {
        if self.kdf_memory_kib == 0 {
            return Err(IcringError::ConfigError {
                reason: "kdf_memory_kib must be greater than 0".into(),
            });
        }

        if self.kdf_iterations == 0 {
            return Err(IcringError::ConfigError {
                reason: "kdf_iterations must be greater than 0".into(),
            });
        }

        if self.kdf_parallelism == 0 {
            return Err(IcringError::ConfigError {
                reason: "kdf_parallelism must be greater than 0".into(),
            });
        }

        if !SUPPORTED_WORD_COUNTS.contains(&self.mnemonic_word_count) {
            return Err(IcringError::ConfigError {
                reason: format!(
                    "mnemonic_word_count must be one of {SUPPORTED_WORD_COUNTS:?}, got {}",
                    self.mnemonic_word_count
                ),
            });
        }

        if self.default_account_name.trim().is_empty() {
            return Err(IcringError::ConfigError {
                reason: "default_account_name must not be empty".into(),
            });
        }

        if self.mainnet_host.trim().is_empty() {
            return Err(IcringError::ConfigError {
                reason: "mainnet_host must not be empty".into(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = KeyringConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn default_values() {
        let config = KeyringConfig::default();
        assert_eq!(config.kdf_memory_kib, 65_536);
        assert_eq!(config.kdf_iterations, 3);
        assert_eq!(config.kdf_parallelism, 1);
        assert_eq!(config.mnemonic_word_count, 12);
        assert_eq!(config.default_account_name, "Account 1");
    }

    #[test]
    fn zero_kdf_costs_rejected() {
        for config in [
            KeyringConfig {
                kdf_memory_kib: 0,
                ..KeyringConfig::default()
            },
            KeyringConfig {
                kdf_iterations: 0,
                ..KeyringConfig::default()
            },
            KeyringConfig {
                kdf_parallelism: 0,
                ..KeyringConfig::default()
            },
        ] {
            assert!(config.validate().is_err());
        }
    }

    #[test]
    fn unsupported_word_count_rejected() {
        let config = KeyringConfig {
            mnemonic_word_count: 13,
            ..KeyringConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn blank_account_name_rejected() {
        let config = KeyringConfig {
            default_account_name: "   ".into(),
            ..KeyringConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_json_uses_defaults() -> std::result::Result<(), IcringError> {
        let config: KeyringConfig = serde_json::from_str(r#"{"kdf_iterations": 1}"#)?;
        assert_eq!(config.kdf_iterations, 1);
        assert_eq!(config.kdf_memory_kib, 65_536);
        assert!(config.validate().is_ok());
        Ok(())
    }

    #[test]
    fn load_missing_file_is_config_error() {
        let path = std::env::temp_dir().join("icring_config_does_not_exist.json");
        assert!(matches!(
            KeyringConfig::load(&path),
            Err(IcringError::ConfigError { .. })
        ));
    }
}
