//! PEM key file import and export.
//!
//! Accepted inputs:
//!
//! | PEM label         | Encoding | Curve      |
//! |-------------------|----------|------------|
//! | `PRIVATE KEY`     | PKCS#8   | Ed25519    |
//! | `PRIVATE KEY`     | PKCS#8   | secp256k1  |
//! | `EC PRIVATE KEY`  | SEC1     | secp256k1  |
//!
//! Exports use PKCS#8 for Ed25519 and SEC1 for secp256k1, the formats
//! produced by common Internet Computer tooling.

use ed25519_dalek::pkcs8::{DecodePrivateKey as _, EncodePrivateKey as _};
use icring_types::{IcringError, Result};
use k256::pkcs8::DecodePrivateKey as _;
use zeroize::Zeroizing;

use crate::identity::{Identity, KeyPair};

/// PEM label for PKCS#8 private keys.
const PKCS8_LABEL: &str = "PRIVATE KEY";

/// PEM label for SEC1 elliptic-curve private keys.
const SEC1_LABEL: &str = "EC PRIVATE KEY";

/// Parses a PEM key file into an identity.
///
/// # Errors
///
/// Returns [`IcringError::MalformedKeyMaterial`] if the text is not
/// PEM, the label is unknown, or the key is not Ed25519 / secp256k1.
pub fn identity_from_pem(pem_text: &str) -> Result<Identity> {
    let parsed = pem::parse(pem_text.trim()).map_err(|e| IcringError::MalformedKeyMaterial {
        reason: format!("not a PEM document: {e}"),
    })?;
    let der = Zeroizing::new(parsed.contents().to_vec());

    match parsed.tag() {
        PKCS8_LABEL => {
            if let Ok(sk) = ed25519_dalek::SigningKey::from_pkcs8_der(&der) {
                return Identity::from_ed25519_secret(&sk.to_bytes());
            }
            let secret = k256::SecretKey::from_pkcs8_der(&der).map_err(|e| {
                IcringError::MalformedKeyMaterial {
                    reason: format!("PKCS#8 key is neither Ed25519 nor secp256k1: {e}"),
                }
            })?;
            Identity::from_secp256k1_secret(secret.to_bytes().as_slice())
        }
        SEC1_LABEL => {
            let secret = k256::SecretKey::from_sec1_der(&der).map_err(|e| {
                IcringError::MalformedKeyMaterial {
                    reason: format!("SEC1 key is not a secp256k1 key: {e}"),
                }
            })?;
            Identity::from_secp256k1_secret(secret.to_bytes().as_slice())
        }
        other => Err(IcringError::MalformedKeyMaterial {
            reason: format!("unsupported PEM label '{other}'"),
        }),
    }
}

/// Encodes the identity's private key as a PEM key file.
///
/// # Errors
///
/// Returns [`IcringError::CryptoError`] if DER encoding fails.
pub fn identity_to_pem(identity: &Identity) -> Result<Zeroizing<String>> {
    let (label, der) = match identity.key() {
        KeyPair::Ed25519(sk) => {
            let document = sk.to_pkcs8_der().map_err(|e| IcringError::CryptoError {
                reason: format!("PKCS#8 encoding failed: {e}"),
            })?;
            (PKCS8_LABEL, document.as_bytes().to_vec())
        }
        KeyPair::Secp256k1(sk) => {
            let secret = k256::SecretKey::from_bytes(&sk.to_bytes()).map_err(|e| {
                IcringError::CryptoError {
                    reason: format!("invalid secp256k1 scalar: {e}"),
                }
            })?;
            let der = secret.to_sec1_der().map_err(|e| IcringError::CryptoError {
                reason: format!("SEC1 encoding failed: {e}"),
            })?;
            (SEC1_LABEL, der.to_vec())
        }
    };
    Ok(Zeroizing::new(pem::encode(&pem::Pem::new(label, der))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Curve;

    #[test]
    fn pem_roundtrip_both_curves() -> std::result::Result<(), IcringError> {
        for (curve, label) in [(Curve::Ed25519, PKCS8_LABEL), (Curve::Secp256k1, SEC1_LABEL)] {
            let identity = Identity::generate(curve)?;
            let pem_text = identity_to_pem(&identity)?;
            assert!(pem_text.contains(&format!("-----BEGIN {label}-----")));

            let imported = identity_from_pem(&pem_text)?;
            assert_eq!(imported.curve(), curve);
            assert_eq!(imported.principal(), identity.principal());
        }
        Ok(())
    }

    #[test]
    fn rejects_non_pem_text() {
        assert!(matches!(
            identity_from_pem("definitely not a key"),
            Err(IcringError::MalformedKeyMaterial { .. })
        ));
    }

    #[test]
    fn rejects_unknown_label() {
        let doc = pem::encode(&pem::Pem::new("CERTIFICATE", vec![1, 2, 3]));
        assert!(matches!(
            identity_from_pem(&doc),
            Err(IcringError::MalformedKeyMaterial { .. })
        ));
    }

    #[test]
    fn rejects_garbage_der() {
        for label in [PKCS8_LABEL, SEC1_LABEL] {
            let doc = pem::encode(&pem::Pem::new(label, vec![0x30, 0x03, 0x02, 0x01, 0x00]));
            assert!(matches!(
                identity_from_pem(&doc),
                Err(IcringError::MalformedKeyMaterial { .. })
            ));
        }
    }
}
