//! BIP39 seed phrase generation, validation, and seed derivation.
//!
//! Wraps the `bip39` crate (English wordlist). Phrases of 12, 15, 18,
//! 21 or 24 words are accepted; input is normalized to lowercase words
//! separated by single spaces before it is parsed.
//!
//! Reference: <https://github.com/bitcoin/bips/blob/master/bip-0039.mediawiki>

use bip39::Language;
use icring_types::config::SUPPORTED_WORD_COUNTS;
use icring_types::{IcringError, Result};
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

// ---------------------------------------------------------------------------
// Mnemonic
// ---------------------------------------------------------------------------

/// A validated BIP39 seed phrase.
///
/// The inner string is zeroized on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Mnemonic(String);

impl Mnemonic {
    /// Parses and validates a seed phrase.
    ///
    /// # Errors
    ///
    /// Returns [`IcringError::CryptoError`] if the word count, any
    /// word, or the checksum is invalid.
    pub fn parse(phrase: &str) -> Result<Self> {
        let mut normalized = phrase
            .split_whitespace()
            .map(str::to_lowercase)
            .collect::<Vec<_>>()
            .join(" ");

        let parsed = bip39::Mnemonic::parse_in_normalized(Language::English, &normalized);
        match parsed {
            Ok(_) => Ok(Self(normalized)),
            Err(e) => {
                normalized.zeroize();
                Err(IcringError::CryptoError {
                    reason: format!("invalid seed phrase: {e}"),
                })
            }
        }
    }

    /// Returns the seed phrase as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the number of words in the phrase.
    pub fn word_count(&self) -> usize {
        self.0.split(' ').count()
    }

    /// Derives the 64-byte BIP39 seed (PBKDF2-HMAC-SHA512, 2048 rounds).
    ///
    /// # Errors
    ///
    /// Returns [`IcringError::CryptoError`] if the stored phrase no
    /// longer parses (never the case for a value built by [`parse`](Self::parse)).
    pub fn to_seed(&self, passphrase: &str) -> Result<Seed> {
        let parsed = bip39::Mnemonic::parse_in_normalized(Language::English, &self.0)
            .map_err(|e| IcringError::CryptoError {
                reason: format!("invalid seed phrase: {e}"),
            })?;
        Ok(Seed(parsed.to_seed_normalized(passphrase)))
    }
}

// Mnemonic intentionally does not implement Debug or Display.

// ---------------------------------------------------------------------------
// Seed
// ---------------------------------------------------------------------------

/// A 64-byte BIP39 seed, zeroized on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Seed([u8; 64]);

impl Seed {
    /// Fixed byte length of a BIP39 seed.
    pub const LEN: usize = 64;

    /// Returns the raw 64-byte seed.
    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

/// Generates a new random seed phrase of `word_count` words.
///
/// # Errors
///
/// Returns [`IcringError::ConfigError`] for an unsupported word count.
pub fn generate_mnemonic(word_count: usize) -> Result<Mnemonic> {
    if !SUPPORTED_WORD_COUNTS.contains(&word_count) {
        return Err(IcringError::ConfigError {
            reason: format!("unsupported seed phrase length: {word_count} words"),
        });
    }

    let mut entropy = vec![0u8; word_count / 3 * 4];
    OsRng.fill_bytes(&mut entropy);
    let result = entropy_to_mnemonic(&entropy);
    entropy.zeroize();
    result
}

/// Converts raw entropy (16 to 32 bytes, multiple of 4) into a seed phrase.
///
/// Deterministic; exposed for known-vector tests.
///
/// # Errors
///
/// Returns [`IcringError::CryptoError`] if the entropy length is invalid.
pub fn entropy_to_mnemonic(entropy: &[u8]) -> Result<Mnemonic> {
    let mnemonic = bip39::Mnemonic::from_entropy_in(Language::English, entropy).map_err(|e| {
        IcringError::CryptoError {
            reason: format!("invalid entropy: {e}"),
        }
    })?;
    Ok(Mnemonic(mnemonic.to_string()))
}
