//! XChaCha20-Poly1305 sealing of vault plaintext.
//!
//! Nonces are 24 random bytes per blob; with a fresh salt (and so a
//! fresh key) per blob as well, reuse is not a practical concern.

use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use icring_types::{IcringError, Result};
use rand::rngs::OsRng;
use rand::RngCore;

use crate::kdf::VaultKey;

pub const NONCE_LEN: usize = 24;

/// Poly1305 tag length appended to every ciphertext.
pub const TAG_LEN: usize = 16;

/// Binds ciphertexts to the vault format.
const VAULT_AAD: &[u8] = b"icring-vault-v1";

pub fn fresh_nonce() -> [u8; NONCE_LEN] {
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

fn cipher(key: &VaultKey) -> XChaCha20Poly1305 {
    XChaCha20Poly1305::new(Key::from_slice(key.as_bytes()))
}

/// Encrypts `plaintext`; the tag is appended.
///
/// # Errors
///
/// [`IcringError::CryptoError`] if the cipher rejects the input.
pub fn seal(key: &VaultKey, nonce: &[u8; NONCE_LEN], plaintext: &[u8]) -> Result<Vec<u8>> {
    let payload = Payload {
        msg: plaintext,
        aad: VAULT_AAD,
    };
    cipher(key)
        .encrypt(XNonce::from_slice(nonce), payload)
        .map_err(|e| IcringError::CryptoError {
            reason: format!("vault sealing failed: {e}"),
        })
}

/// Decrypts and authenticates a sealed ciphertext.
///
/// # Errors
///
/// [`IcringError::CryptoError`] for a wrong key or a tampered blob.
pub fn open(key: &VaultKey, nonce: &[u8; NONCE_LEN], sealed: &[u8]) -> Result<Vec<u8>> {
    let payload = Payload {
        msg: sealed,
        aad: VAULT_AAD,
    };
    cipher(key)
        .decrypt(XNonce::from_slice(nonce), payload)
        .map_err(|_| IcringError::CryptoError {
            reason: "vault authentication failed".into(),
        })
}
