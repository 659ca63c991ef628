//! SHA-2 hashing, principal and account identifier derivation.
//!
//! - Self-authenticating principal: `SHA-224(DER public key) ‖ 0x02`.
//! - Account identifier: `SHA-224("\x0Aaccount-id" ‖ principal ‖ subaccount)`
//!   with a CRC32 prefix (see [`AccountIdentifier::from_hash`]).

use icring_types::{AccountIdentifier, Principal, Result, Subaccount};
use sha2::{Digest, Sha224, Sha256};

/// Domain separator prepended to account identifier preimages.
const ACCOUNT_DOMAIN_SEPARATOR: &[u8] = b"\x0Aaccount-id";

/// Computes the SHA-224 hash of arbitrary data.
pub fn sha224(data: &[u8]) -> [u8; 28] {
    let mut out = [0u8; 28];
    out.copy_from_slice(&Sha224::digest(data));
    out
}

/// Computes the SHA-256 hash of arbitrary data.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// Derives the self-authenticating principal of a DER-encoded public key.
///
/// # Errors
///
/// Never fails in practice; the 29-byte result is always within
/// [`Principal::MAX_LEN`].
pub fn self_authenticating_principal(public_key_der: &[u8]) -> Result<Principal> {
    let mut bytes = Vec::with_capacity(Principal::MAX_LEN);
    bytes.extend_from_slice(&sha224(public_key_der));
    bytes.push(Principal::SELF_AUTHENTICATING_TAG);
    Principal::from_slice(&bytes)
}

/// Derives the ledger account identifier of `principal` for a subaccount
/// (the default, all-zero subaccount when `None`).
pub fn account_identifier(principal: &Principal, subaccount: Option<&Subaccount>) -> AccountIdentifier {
    let subaccount = subaccount.copied().unwrap_or_default();

    let mut hasher = Sha224::new();
    hasher.update(ACCOUNT_DOMAIN_SEPARATOR);
    hasher.update(principal.as_slice());
    hasher.update(subaccount.0);

    let mut hash = [0u8; 28];
    hash.copy_from_slice(&hasher.finalize());
    AccountIdentifier::from_hash(hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// FIPS 180-4 SHA-224 of "abc".
    #[test]
    fn sha224_abc() {
        assert_eq!(
            hex::encode(sha224(b"abc")),
            "23097d223405d8228642a477bda255b32aadbce4bda0b3f7e36c9da7"
        );
    }

    /// FIPS 180-4 SHA-256 of "abc".
    #[test]
    fn sha256_abc() {
        assert_eq!(
            hex::encode(sha256(b"abc")),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn self_authenticating_principal_shape() -> std::result::Result<(), icring_types::IcringError> {
        let principal = self_authenticating_principal(b"not really a der key")?;
        assert!(principal.is_self_authenticating());
        assert_eq!(principal.as_slice().len(), 29);
        assert_eq!(Principal::from_text(&principal.to_text())?, principal);
        Ok(())
    }

    #[test]
    fn account_identifier_depends_on_subaccount() -> std::result::Result<(), icring_types::IcringError> {
        let principal = self_authenticating_principal(b"key")?;
        let default = account_identifier(&principal, None);
        let explicit_default = account_identifier(&principal, Some(&Subaccount::default()));
        let other = account_identifier(&principal, Some(&Subaccount([1u8; 32])));
        assert_eq!(default, explicit_default);
        assert_ne!(default, other);
        Ok(())
    }

    #[test]
    fn account_identifier_parses_back() -> std::result::Result<(), icring_types::IcringError> {
        let anonymous = Principal::from_slice(&[0x04])?;
        let id = account_identifier(&anonymous, None);
        assert_eq!(id.to_hex().len(), 64);
        assert_eq!(id.to_hex().parse::<AccountIdentifier>()?, id);
        Ok(())
    }
}
