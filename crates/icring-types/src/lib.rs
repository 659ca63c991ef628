//! Core shared types for the icring multi-account keyring.
//!
//! This crate defines the types every other crate in the workspace
//! agrees on: principals and account identifiers, the persisted schema
//! version, the central error enum and the keyring configuration.

pub mod config;

use std::fmt;
use std::str::FromStr;

use base32::Alphabet;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Base32 alphabet used by the textual principal encoding.
const PRINCIPAL_ALPHABET: Alphabet = Alphabet::RFC4648 { padding: false };

/// Length of the CRC32 prefix in textual principals and account identifiers.
const CRC_LEN: usize = 4;

// ---------------------------------------------------------------------------
// Principal
// ---------------------------------------------------------------------------

/// Opaque identifier of an identity or canister.
///
/// Principals are at most 29 bytes. Identities use the
/// self-authenticating form (`SHA-224(DER public key) ‖ 0x02`), while
/// canisters use short opaque ids. The textual form is
/// `base32(crc32_be(bytes) ‖ bytes)`, lowercased and grouped by five
/// characters with `-`.
#[derive(Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct Principal(Vec<u8>);

impl Principal {
    /// Maximum byte length of a principal.
    pub const MAX_LEN: usize = 29;

    /// Trailing tag byte of a self-authenticating principal.
    pub const SELF_AUTHENTICATING_TAG: u8 = 0x02;

    /// Creates a principal from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns [`IcringError::InvalidPrincipal`] if `bytes` is longer
    /// than [`Principal::MAX_LEN`].
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        if bytes.len() > Self::MAX_LEN {
            return Err(IcringError::InvalidPrincipal {
                reason: format!(
                    "principal must be at most {} bytes, got {}",
                    Self::MAX_LEN,
                    bytes.len()
                ),
            });
        }
        Ok(Self(bytes.to_vec()))
    }

    /// Returns the raw principal bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    /// Returns `true` if this is a self-authenticating principal.
    pub fn is_self_authenticating(&self) -> bool {
        self.0.len() == Self::MAX_LEN && self.0.last() == Some(&Self::SELF_AUTHENTICATING_TAG)
    }

    /// Encodes the principal in its canonical textual form.
    pub fn to_text(&self) -> String {
        let mut buf = Vec::with_capacity(CRC_LEN + self.0.len());
        buf.extend_from_slice(&crc32fast::hash(&self.0).to_be_bytes());
        buf.extend_from_slice(&self.0);

        let encoded = base32::encode(PRINCIPAL_ALPHABET, &buf).to_ascii_lowercase();
        let mut text = String::with_capacity(encoded.len() + encoded.len() / 5);
        for (i, c) in encoded.chars().enumerate() {
            if i > 0 && i % 5 == 0 {
                text.push('-');
            }
            text.push(c);
        }
        text
    }

    /// Parses a principal from its textual form.
    ///
    /// The checksum must match and the input must already be in
    /// canonical form (lowercase, correctly grouped).
    ///
    /// # Errors
    ///
    /// Returns [`IcringError::InvalidPrincipal`] on any encoding,
    /// length or checksum mismatch.
    pub fn from_text(text: &str) -> Result<Self> {
        let compact: String = text
            .chars()
            .filter(|c| *c != '-')
            .collect::<String>()
            .to_ascii_uppercase();

        let decoded =
            base32::decode(PRINCIPAL_ALPHABET, &compact).ok_or_else(|| {
                IcringError::InvalidPrincipal {
                    reason: format!("'{text}' is not valid base32"),
                }
            })?;

        if decoded.len() < CRC_LEN {
            return Err(IcringError::InvalidPrincipal {
                reason: format!("'{text}' is too short"),
            });
        }

        let (crc, bytes) = decoded.split_at(CRC_LEN);
        let principal = Self::from_slice(bytes)?;

        if crc != crc32fast::hash(bytes).to_be_bytes() {
            return Err(IcringError::InvalidPrincipal {
                reason: format!("checksum mismatch in '{text}'"),
            });
        }

        if principal.to_text() != text {
            return Err(IcringError::InvalidPrincipal {
                reason: format!("'{text}' is not in canonical form"),
            });
        }

        Ok(principal)
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

impl fmt::Debug for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Principal({})", self.to_text())
    }
}

impl FromStr for Principal {
    type Err = IcringError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::from_text(s)
    }
}

impl AsRef<[u8]> for Principal {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Serialize for Principal {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_text())
    }
}

impl<'de> Deserialize<'de> for Principal {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::from_text(&text).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Subaccount / AccountIdentifier
// ---------------------------------------------------------------------------

/// 32-byte ledger subaccount. The default subaccount is all zeroes.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub struct Subaccount(pub [u8; 32]);

/// Ledger account identifier: `crc32_be(hash) ‖ hash` (32 bytes),
/// where `hash` is the 28-byte SHA-224 of the domain-separated
/// principal and subaccount.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct AccountIdentifier([u8; 32]);

impl AccountIdentifier {
    /// The fixed byte length of an account identifier.
    pub const LEN: usize = 32;

    /// Builds an identifier from a 28-byte hash, prepending its checksum.
    pub fn from_hash(hash: [u8; 28]) -> Self {
        let mut bytes = [0u8; 32];
        bytes[..CRC_LEN].copy_from_slice(&crc32fast::hash(&hash).to_be_bytes());
        bytes[CRC_LEN..].copy_from_slice(&hash);
        Self(bytes)
    }

    /// Returns the underlying bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Returns the lowercase hex encoding.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for AccountIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for AccountIdentifier {
    type Err = IcringError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|_| IcringError::InvalidPrincipal {
            reason: "invalid hex encoding for account identifier".into(),
        })?;
        if bytes.len() != Self::LEN {
            return Err(IcringError::InvalidPrincipal {
                reason: format!(
                    "expected {} bytes for account identifier, got {}",
                    Self::LEN,
                    bytes.len()
                ),
            });
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        if arr[..CRC_LEN] != crc32fast::hash(&arr[CRC_LEN..]).to_be_bytes() {
            return Err(IcringError::InvalidPrincipal {
                reason: "account identifier checksum mismatch".into(),
            });
        }
        Ok(Self(arr))
    }
}

// ---------------------------------------------------------------------------
// SchemaVersion
// ---------------------------------------------------------------------------

/// `major.minor.patch` version tag of the persisted keyring schema.
///
/// Ordering is numeric per component, so `0.9.0 < 0.14.5`.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct SchemaVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl SchemaVersion {
    /// Creates a version from its components.
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for SchemaVersion {
    type Err = IcringError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let trimmed = s.trim().trim_start_matches('v');
        let mut parts = trimmed.split('.');
        let mut next = |name: &str| -> Result<u32> {
            parts
                .next()
                .ok_or_else(|| IcringError::MigrationError {
                    reason: format!("version '{s}' is missing its {name} component"),
                })?
                .parse::<u32>()
                .map_err(|e| IcringError::MigrationError {
                    reason: format!("invalid {name} component in version '{s}': {e}"),
                })
        };
        let version = Self::new(next("major")?, next("minor")?, next("patch")?);
        if parts.next().is_some() {
            return Err(IcringError::MigrationError {
                reason: format!("version '{s}' has too many components"),
            });
        }
        Ok(version)
    }
}

impl Serialize for SchemaVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SchemaVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// IcringError
// ---------------------------------------------------------------------------

/// Central error type for the icring workspace.
///
/// Every fallible operation in the workspace returns this error
/// through [`Result`].
#[derive(Debug, Error)]
pub enum IcringError {
    /// The keyring has never been set up in this storage.
    #[error("keyring is not initialized")]
    NotInitialized,

    /// The keyring is initialized but its vault is not open.
    #[error("keyring is locked")]
    StateLocked,

    /// A non-empty password is required to create the keyring.
    #[error("a password is required")]
    PasswordRequired,

    /// No account matches the requested identifier.
    #[error("invalid account reference: {account_id}")]
    InvalidAccountReference { account_id: String },

    /// Index-based account lookup was out of range.
    #[error("account index {index} is out of range")]
    IndexOutOfRange { index: i64 },

    /// Seed-derived accounts cannot be deleted.
    #[error("account {account_id} is derived from the seed phrase and cannot be deleted")]
    CannotDeleteSeedAccount { account_id: String },

    /// An imported identity already exists in the directory.
    #[error("an account with principal {principal} already exists")]
    DuplicateAccount { principal: String },

    /// A canister reference failed structural validation.
    #[error("invalid canister reference: {canister_id}")]
    InvalidCanisterReference { canister_id: String },

    /// A fungible token was expected but the canister reports otherwise.
    #[error("canister {canister_id} is not a fungible token")]
    NonFungibleTokenUnsupported { canister_id: String },

    /// The collectible collection is already registered on this network.
    #[error("collectible {canister_id} is already registered")]
    CollectibleAlreadyRegistered { canister_id: String },

    /// The canister did not answer the expected interface.
    #[error("canister interface error: {reason}")]
    CanisterInterfaceError { reason: String },

    /// A key file or secret key could not be decoded.
    #[error("malformed key material: {reason}")]
    MalformedKeyMaterial { reason: String },

    /// A principal or account identifier could not be decoded.
    #[error("invalid principal: {reason}")]
    InvalidPrincipal { reason: String },

    /// The built-in network cannot be edited or removed.
    #[error("network {network_id} is built in and cannot be modified")]
    NetworkImmutable { network_id: String },

    /// No network matches the requested identifier.
    #[error("unknown network: {network_id}")]
    UnknownNetwork { network_id: String },

    /// The token is not known to the active network.
    #[error("token {canister_id} is not registered on this network")]
    TokenNotRegistered { canister_id: String },

    /// The agent collaborator failed.
    #[error("agent error: {reason}")]
    AgentError { reason: String },

    /// Cryptographic operation failed.
    #[error("crypto error: {reason}")]
    CryptoError { reason: String },

    /// Storage backend failure.
    #[error("storage error: {reason}")]
    StorageError { reason: String },

    /// Encoding or decoding of persisted state failed.
    #[error("serialization error: {reason}")]
    SerializationError { reason: String },

    /// Persisted state could not be brought to the running schema.
    #[error("migration error: {reason}")]
    MigrationError { reason: String },

    /// Configuration error.
    #[error("config error: {reason}")]
    ConfigError { reason: String },
}

impl From<serde_json::Error> for IcringError {
    fn from(e: serde_json::Error) -> Self {
        Self::SerializationError {
            reason: e.to_string(),
        }
    }
}

/// Convenience result type using [`IcringError`].
pub type Result<T> = std::result::Result<T, IcringError>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    /// The ICP ledger canister.
    const LEDGER: &str = "ryjl3-tyaaa-aaaaa-aaaba-cai";

    #[test]
    fn principal_text_roundtrip() -> std::result::Result<(), IcringError> {
        let principal = Principal::from_text(LEDGER)?;
        assert_eq!(principal.as_slice(), &[0, 0, 0, 0, 0, 0, 0, 2, 1, 1]);
        assert_eq!(principal.to_text(), LEDGER);
        Ok(())
    }

    #[test]
    fn anonymous_principal_text() -> std::result::Result<(), IcringError> {
        let anonymous = Principal::from_slice(&[0x04])?;
        assert_eq!(anonymous.to_text(), "2vxsx-fae");
        Ok(())
    }

    #[test]
    fn management_canister_text() -> std::result::Result<(), IcringError> {
        let management = Principal::from_slice(&[])?;
        assert_eq!(management.to_text(), "aaaaa-aa");
        assert_eq!(Principal::from_text("aaaaa-aa")?, management);
        Ok(())
    }

    #[test]
    fn principal_rejects_bad_checksum() {
        assert!(Principal::from_text("ryjl3-tyaaa-aaaaa-aaaba-caa").is_err());
    }

    #[test]
    fn principal_rejects_non_canonical_text() {
        assert!(Principal::from_text("RYJL3-TYAAA-AAAAA-AAABA-CAI").is_err());
        assert!(Principal::from_text("ryjl3tyaaaaaaaaaaabacai").is_err());
    }

    #[test]
    fn principal_rejects_garbage() {
        assert!(Principal::from_text("").is_err());
        assert!(Principal::from_text("not a principal!").is_err());
    }

    #[test]
    fn principal_rejects_oversized_bytes() {
        assert!(Principal::from_slice(&[1u8; 30]).is_err());
    }

    #[test]
    fn principal_serde_as_text() -> std::result::Result<(), IcringError> {
        let principal = Principal::from_text(LEDGER)?;
        let json = serde_json::to_string(&principal)?;
        assert_eq!(json, format!("\"{LEDGER}\""));
        let back: Principal = serde_json::from_str(&json)?;
        assert_eq!(back, principal);
        Ok(())
    }

    #[test]
    fn account_identifier_checksum_verified() -> std::result::Result<(), IcringError> {
        let id = AccountIdentifier::from_hash([7u8; 28]);
        let parsed: AccountIdentifier = id.to_hex().parse()?;
        assert_eq!(parsed, id);

        let mut tampered = id.to_hex();
        tampered.replace_range(0..2, if tampered.starts_with("00") { "11" } else { "00" });
        assert!(tampered.parse::<AccountIdentifier>().is_err());
        Ok(())
    }

    #[test]
    fn schema_versions_order_numerically() -> std::result::Result<(), IcringError> {
        let old: SchemaVersion = "0.9.0".parse()?;
        let mid: SchemaVersion = "0.14.5".parse()?;
        let new: SchemaVersion = "v0.17.0".parse()?;
        assert!(old < mid);
        assert!(mid < new);
        assert_eq!(new.to_string(), "0.17.0");
        Ok(())
    }

    #[test]
    fn schema_version_rejects_malformed() {
        assert!("0.14".parse::<SchemaVersion>().is_err());
        assert!("0.14.x".parse::<SchemaVersion>().is_err());
        assert!("0.14.5.1".parse::<SchemaVersion>().is_err());
    }
}
