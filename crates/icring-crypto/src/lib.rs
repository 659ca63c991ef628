//! Cryptographic primitives for the icring keyring.
//!
//! This crate is the **sole** location for cryptographic operations in
//! the workspace. Other crates consume identities, principals and the
//! vault cipher through the types exported here.
//!
//! # Modules
//!
//! - [`mnemonic`] — BIP39 seed phrase generation, validation and seeds
//! - [`hd_derive`] — BIP32 secp256k1 derivation of per-account keys
//! - [`identity`] — Ed25519 / secp256k1 signing identities
//! - [`key_file`] — PEM key file import and export
//! - [`hash`] — SHA-224 principal and account identifier derivation
//! - [`kdf`] — Argon2id password key derivation
//! - [`aead`] — XChaCha20-Poly1305 authenticated encryption
//! - [`cipher`] — password cipher used by the encrypted vault

pub mod aead;
pub mod cipher;
pub mod hash;
pub mod hd_derive;
pub mod identity;
pub mod kdf;
pub mod key_file;
pub mod mnemonic;
