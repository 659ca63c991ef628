//! Signing identities: Ed25519 and secp256k1 key pairs.
//!
//! An [`Identity`] owns one private key and caches its DER-encoded
//! public key and self-authenticating [`Principal`]. Identities are
//! reconstructed after unlock from a [`KeyDescriptor`] (curve tag plus
//! hex secret key), the key-export form stored inside the vault.
//!
//! Seed-derived accounts are always secp256k1; imported key files may
//! carry either curve.

use std::fmt;

use ed25519_dalek::{Signer as _, Verifier as _};
use icring_types::{AccountIdentifier, IcringError, Principal, Result};
use k256::ecdsa::signature::{Signer as _, Verifier as _};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::hash::{account_identifier, self_authenticating_principal};
use crate::hd_derive::derive_secp256k1_secret;
use crate::mnemonic::Mnemonic;

/// SubjectPublicKeyInfo prefix for a raw 32-byte Ed25519 key (RFC 8410).
const ED25519_DER_PREFIX: [u8; 12] = [
    0x30, 0x2a, 0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x70, 0x03, 0x21, 0x00,
];

/// SubjectPublicKeyInfo prefix for an uncompressed 65-byte secp256k1 point.
const SECP256K1_DER_PREFIX: [u8; 23] = [
    0x30, 0x56, 0x30, 0x10, 0x06, 0x07, 0x2a, 0x86, 0x48, 0xce, 0x3d, 0x02, 0x01, 0x06, 0x05,
    0x2b, 0x81, 0x04, 0x00, 0x0a, 0x03, 0x42, 0x00,
];

// ---------------------------------------------------------------------------
// Curve / KeyDescriptor
// ---------------------------------------------------------------------------

/// Elliptic curve of an identity.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Curve {
    Ed25519,
    Secp256k1,
}

impl fmt::Display for Curve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ed25519 => write!(f, "ed25519"),
            Self::Secp256k1 => write!(f, "secp256k1"),
        }
    }
}

/// Serializable key material sufficient to rebuild an [`Identity`].
///
/// Only ever persisted inside the encrypted vault. The hex secret is
/// zeroized on drop and redacted from `Debug` output.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(rename_all = "camelCase")]
pub struct KeyDescriptor {
    #[zeroize(skip)]
    pub curve: Curve,
    /// Lowercase hex of the 32-byte private scalar / seed.
    pub secret_key: String,
}

impl fmt::Debug for KeyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyDescriptor")
            .field("curve", &self.curve)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Private key of an identity. Both variants zeroize on drop.
pub(crate) enum KeyPair {
    Ed25519(ed25519_dalek::SigningKey),
    Secp256k1(k256::ecdsa::SigningKey),
}

/// A signing identity with its cached public key and principal.
pub struct Identity {
    key: KeyPair,
    public_key_der: Vec<u8>,
    principal: Principal,
}

// Identity intentionally does not implement Clone or Debug to prevent
// accidental copies of the private key.

impl Identity {
    fn from_key(key: KeyPair) -> Result<Self> {
        let public_key_der = match &key {
            KeyPair::Ed25519(sk) => {
                let mut der = ED25519_DER_PREFIX.to_vec();
                der.extend_from_slice(sk.verifying_key().as_bytes());
                der
            }
            KeyPair::Secp256k1(sk) => {
                let mut der = SECP256K1_DER_PREFIX.to_vec();
                der.extend_from_slice(sk.verifying_key().to_encoded_point(false).as_bytes());
                der
            }
        };
        let principal = self_authenticating_principal(&public_key_der)?;
        Ok(Self {
            key,
            public_key_der,
            principal,
        })
    }

    // -- Constructors -----------------------------------------------------

    /// Generates a fresh random identity on `curve`.
    pub fn generate(curve: Curve) -> Result<Self> {
        let key = match curve {
            Curve::Ed25519 => KeyPair::Ed25519(ed25519_dalek::SigningKey::generate(&mut OsRng)),
            Curve::Secp256k1 => KeyPair::Secp256k1(k256::ecdsa::SigningKey::random(&mut OsRng)),
        };
        Self::from_key(key)
    }

    /// Builds an Ed25519 identity from its 32-byte seed.
    pub fn from_ed25519_secret(secret: &[u8; 32]) -> Result<Self> {
        Self::from_key(KeyPair::Ed25519(ed25519_dalek::SigningKey::from_bytes(secret)))
    }

    /// Builds a secp256k1 identity from a 32-byte secret scalar.
    ///
    /// # Errors
    ///
    /// Returns [`IcringError::MalformedKeyMaterial`] if the slice is not
    /// 32 bytes or the scalar is zero / out of range.
    pub fn from_secp256k1_secret(secret: &[u8]) -> Result<Self> {
        if secret.len() != 32 {
            return Err(IcringError::MalformedKeyMaterial {
                reason: format!("secp256k1 secret key must be 32 bytes, got {}", secret.len()),
            });
        }
        let sk = k256::ecdsa::SigningKey::from_slice(secret).map_err(|e| {
            IcringError::MalformedKeyMaterial {
                reason: format!("invalid secp256k1 secret key: {e}"),
            }
        })?;
        Self::from_key(KeyPair::Secp256k1(sk))
    }

    /// Builds a secp256k1 identity from a hex-encoded secret key.
    ///
    /// # Errors
    ///
    /// Returns [`IcringError::MalformedKeyMaterial`] for invalid hex or key bytes.
    pub fn from_secret_key_hex(secret_hex: &str) -> Result<Self> {
        let bytes = Zeroizing::new(hex::decode(secret_hex.trim()).map_err(|e| {
            IcringError::MalformedKeyMaterial {
                reason: format!("secret key is not valid hex: {e}"),
            }
        })?);
        Self::from_secp256k1_secret(&bytes)
    }

    /// Derives the seed-phrase identity at `index` (`m/44'/223'/0'/0/{index}`).
    ///
    /// # Errors
    ///
    /// Returns [`IcringError::CryptoError`] if derivation fails.
    pub fn from_mnemonic(mnemonic: &Mnemonic, index: u32) -> Result<Self> {
        let seed = mnemonic.to_seed("")?;
        let secret = derive_secp256k1_secret(&seed, index)?;
        Self::from_secp256k1_secret(secret.as_slice())
    }

    /// Rebuilds an identity from its key descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`IcringError::MalformedKeyMaterial`] if the descriptor
    /// does not hold a valid key for its curve.
    pub fn from_descriptor(descriptor: &KeyDescriptor) -> Result<Self> {
        match descriptor.curve {
            Curve::Secp256k1 => Self::from_secret_key_hex(&descriptor.secret_key),
            Curve::Ed25519 => {
                let bytes = Zeroizing::new(hex::decode(&descriptor.secret_key).map_err(|e| {
                    IcringError::MalformedKeyMaterial {
                        reason: format!("ed25519 secret key is not valid hex: {e}"),
                    }
                })?);
                let secret: Zeroizing<[u8; 32]> =
                    Zeroizing::new(bytes.as_slice().try_into().map_err(|_| {
                        IcringError::MalformedKeyMaterial {
                            reason: format!(
                                "ed25519 secret key must be 32 bytes, got {}",
                                bytes.len()
                            ),
                        }
                    })?);
                Self::from_ed25519_secret(&secret)
            }
        }
    }

    // -- Accessors --------------------------------------------------------

    /// Returns the curve of this identity.
    pub fn curve(&self) -> Curve {
        match self.key {
            KeyPair::Ed25519(_) => Curve::Ed25519,
            KeyPair::Secp256k1(_) => Curve::Secp256k1,
        }
    }

    /// Returns the self-authenticating principal.
    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    /// Returns the default-subaccount ledger account identifier.
    pub fn account_identifier(&self) -> AccountIdentifier {
        account_identifier(&self.principal, None)
    }

    /// Returns the DER SubjectPublicKeyInfo encoding of the public key.
    pub fn public_key_der(&self) -> &[u8] {
        &self.public_key_der
    }

    /// Returns the raw public key (32-byte Ed25519 point or 65-byte
    /// uncompressed secp256k1 point).
    pub fn raw_public_key(&self) -> &[u8] {
        match self.key {
            KeyPair::Ed25519(_) => &self.public_key_der[ED25519_DER_PREFIX.len()..],
            KeyPair::Secp256k1(_) => &self.public_key_der[SECP256K1_DER_PREFIX.len()..],
        }
    }

    pub(crate) fn key(&self) -> &KeyPair {
        &self.key
    }

    /// Exports the key descriptor used to persist this identity.
    pub fn descriptor(&self) -> KeyDescriptor {
        let secret_key = match &self.key {
            KeyPair::Ed25519(sk) => hex::encode(sk.to_bytes()),
            KeyPair::Secp256k1(sk) => hex::encode(sk.to_bytes()),
        };
        KeyDescriptor {
            curve: self.curve(),
            secret_key,
        }
    }

    // -- Signing ----------------------------------------------------------

    /// Signs `message`, returning a 64-byte signature.
    ///
    /// Ed25519 follows RFC 8032; secp256k1 is ECDSA over SHA-256 in
    /// compact `r ‖ s` form.
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        match &self.key {
            KeyPair::Ed25519(sk) => sk.sign(message).to_bytes().to_vec(),
            KeyPair::Secp256k1(sk) => {
                let signature: k256::ecdsa::Signature = sk.sign(message);
                signature.to_bytes().to_vec()
            }
        }
    }

    /// Verifies a signature produced by [`sign`](Self::sign).
    ///
    /// # Errors
    ///
    /// Returns [`IcringError::CryptoError`] if the signature is malformed
    /// or does not verify.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> Result<()> {
        let verified = match &self.key {
            KeyPair::Ed25519(sk) => ed25519_dalek::Signature::from_slice(signature)
                .and_then(|sig| sk.verifying_key().verify(message, &sig))
                .map_err(|e| e.to_string()),
            KeyPair::Secp256k1(sk) => k256::ecdsa::Signature::from_slice(signature)
                .and_then(|sig| sk.verifying_key().verify(message, &sig))
                .map_err(|e| e.to_string()),
        };
        verified.map_err(|reason| IcringError::CryptoError {
            reason: format!("signature verification failed: {reason}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn der_lengths_match_curve() -> std::result::Result<(), IcringError> {
        let ed = Identity::generate(Curve::Ed25519)?;
        assert_eq!(ed.public_key_der().len(), 44);
        assert_eq!(ed.raw_public_key().len(), 32);

        let secp = Identity::generate(Curve::Secp256k1)?;
        assert_eq!(secp.public_key_der().len(), 88);
        assert_eq!(secp.raw_public_key().len(), 65);
        assert_eq!(secp.raw_public_key()[0], 0x04);
        Ok(())
    }

    #[test]
    fn descriptor_roundtrip_preserves_principal() -> std::result::Result<(), IcringError> {
        for curve in [Curve::Ed25519, Curve::Secp256k1] {
            let identity = Identity::generate(curve)?;
            let rebuilt = Identity::from_descriptor(&identity.descriptor())?;
            assert_eq!(rebuilt.principal(), identity.principal());
            assert_eq!(rebuilt.curve(), curve);
        }
        Ok(())
    }

    #[test]
    fn sign_and_verify_both_curves() -> std::result::Result<(), IcringError> {
        for curve in [Curve::Ed25519, Curve::Secp256k1] {
            let identity = Identity::generate(curve)?;
            let signature = identity.sign(b"payload");
            assert_eq!(signature.len(), 64);
            identity.verify(b"payload", &signature)?;
            assert!(identity.verify(b"other payload", &signature).is_err());
        }
        Ok(())
    }

    #[test]
    fn secret_key_hex_rejects_bad_input() {
        assert!(matches!(
            Identity::from_secret_key_hex("zz"),
            Err(IcringError::MalformedKeyMaterial { .. })
        ));
        assert!(matches!(
            Identity::from_secret_key_hex("abcd"),
            Err(IcringError::MalformedKeyMaterial { .. })
        ));
        assert!(matches!(
            Identity::from_secret_key_hex(&"00".repeat(32)),
            Err(IcringError::MalformedKeyMaterial { .. })
        ));
    }

    #[test]
    fn descriptor_debug_is_redacted() -> std::result::Result<(), IcringError> {
        let descriptor = Identity::generate(Curve::Secp256k1)?.descriptor();
        let debug = format!("{descriptor:?}");
        assert!(!debug.contains(&descriptor.secret_key));
        assert!(debug.contains("redacted"));
        Ok(())
    }
}
