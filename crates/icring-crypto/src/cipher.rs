//! Password cipher for the encrypted vault.
//!
//! The keyring only needs `encrypt(text, password) -> blob` and
//! `decrypt(blob, password) -> text`. [`PasswordCipher`] implements
//! that contract with Argon2id + XChaCha20-Poly1305; the envelope is
//! base64 of
//!
//! ```text
//! version (1) ‖ salt (16) ‖ nonce (24) ‖ ciphertext+tag
//! ```
//!
//! A fresh salt and nonce are drawn for every call to `encrypt`.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use icring_types::config::KeyringConfig;
use icring_types::{IcringError, Result};
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroizing;

use crate::aead::{fresh_nonce, open, seal, NONCE_LEN};
use crate::kdf::{Argon2Params, VaultKey, SALT_LEN};

/// Envelope format version.
const ENVELOPE_VERSION: u8 = 1;

/// Header length: version byte, salt and nonce.
const HEADER_LEN: usize = 1 + SALT_LEN + NONCE_LEN;

// ---------------------------------------------------------------------------
// Cipher
// ---------------------------------------------------------------------------

/// Password-based symmetric cipher used by the vault.
pub trait Cipher: Send + Sync {
    /// Encrypts UTF-8 `plaintext` under `password`.
    fn encrypt(&self, plaintext: &str, password: &str) -> Result<String>;

    /// Decrypts a blob produced by [`encrypt`](Self::encrypt).
    ///
    /// Fails on a wrong password or a corrupt blob.
    fn decrypt(&self, blob: &str, password: &str) -> Result<Zeroizing<String>>;
}

// ---------------------------------------------------------------------------
// PasswordCipher
// ---------------------------------------------------------------------------

/// Argon2id + XChaCha20-Poly1305 implementation of [`Cipher`].
#[derive(Clone, Copy, Debug, Default)]
pub struct PasswordCipher {
    params: Argon2Params,
}

impl PasswordCipher {
    /// Creates a cipher with explicit Argon2id parameters.
    pub fn new(params: Argon2Params) -> Self {
        Self { params }
    }

    /// Creates a cipher with the KDF costs of `config`.
    pub fn from_config(config: &KeyringConfig) -> Self {
        Self::new(Argon2Params::from_config(config))
    }
}

impl Cipher for PasswordCipher {
    fn encrypt(&self, plaintext: &str, password: &str) -> Result<String> {
        let mut salt = [0u8; SALT_LEN];
        OsRng.fill_bytes(&mut salt);
        let nonce = fresh_nonce();

        let key = VaultKey::derive(password, &salt, self.params)?;
        let ciphertext = seal(&key, &nonce, plaintext.as_bytes())?;

        let mut envelope = Vec::with_capacity(HEADER_LEN + ciphertext.len());
        envelope.push(ENVELOPE_VERSION);
        envelope.extend_from_slice(&salt);
        envelope.extend_from_slice(&nonce);
        envelope.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(envelope))
    }

    fn decrypt(&self, blob: &str, password: &str) -> Result<Zeroizing<String>> {
        let envelope = STANDARD.decode(blob.trim()).map_err(|e| IcringError::CryptoError {
            reason: format!("vault blob is not valid base64: {e}"),
        })?;

        if envelope.len() < HEADER_LEN {
            return Err(IcringError::CryptoError {
                reason: format!(
                    "vault blob too short: {} bytes, need at least {HEADER_LEN}",
                    envelope.len()
                ),
            });
        }

        let (header, ciphertext) = envelope.split_at(HEADER_LEN);
        if header[0] != ENVELOPE_VERSION {
            return Err(IcringError::CryptoError {
                reason: format!("unsupported vault envelope version {}", header[0]),
            });
        }
        let mut salt = [0u8; SALT_LEN];
        salt.copy_from_slice(&header[1..1 + SALT_LEN]);
        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(&header[1 + SALT_LEN..]);

        let key = VaultKey::derive(password, &salt, self.params)?;
        let plaintext = Zeroizing::new(open(&key, &nonce, ciphertext)?);

        let text = std::str::from_utf8(&plaintext).map_err(|_| IcringError::CryptoError {
            reason: "decrypted vault is not valid UTF-8".into(),
        })?;
        Ok(Zeroizing::new(text.to_owned()))
    }
}
