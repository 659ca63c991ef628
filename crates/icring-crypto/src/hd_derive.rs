//! BIP32 secp256k1 hierarchical deterministic key derivation.
//!
//! Every seed-derived account uses the BIP-44 path
//!
//! ```text
//! m/44'/223'/0'/0/{index}
//! ```
//!
//! where `223` is the registered coin type of the Internet Computer and
//! `index` is the account's derivation index. The same seed and index
//! always yield the same secret key.

use icring_types::{IcringError, Result};
use tiny_hderive::bip32::ExtendedPrivKey;
use zeroize::Zeroizing;

use crate::mnemonic::Seed;

/// BIP-44 coin type registered for the Internet Computer.
pub const COIN_TYPE: u32 = 223;

/// Returns the derivation path for the account at `index`.
pub fn derivation_path(index: u32) -> String {
    format!("m/44'/{COIN_TYPE}'/0'/0/{index}")
}

/// Derives the 32-byte secp256k1 secret key for account `index`.
///
/// # Errors
///
/// Returns [`IcringError::CryptoError`] if BIP32 derivation fails
/// (invalid child key, negligible probability).
pub fn derive_secp256k1_secret(seed: &Seed, index: u32) -> Result<Zeroizing<[u8; 32]>> {
    let path = derivation_path(index);
    let ext_key = ExtendedPrivKey::derive(seed.as_bytes(), path.as_str()).map_err(|e| {
        IcringError::CryptoError {
            reason: format!("BIP32 derivation at {path} failed: {e:?}"),
        }
    })?;
    Ok(Zeroizing::new(ext_key.secret()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mnemonic::Mnemonic;

    const PHRASE: &str = "abandon abandon abandon abandon abandon abandon \
                          abandon abandon abandon abandon abandon about";

    #[test]
    fn path_uses_ic_coin_type() {
        assert_eq!(derivation_path(0), "m/44'/223'/0'/0/0");
        assert_eq!(derivation_path(7), "m/44'/223'/0'/0/7");
    }

    #[test]
    fn derivation_is_deterministic() -> std::result::Result<(), IcringError> {
        let seed = Mnemonic::parse(PHRASE)?.to_seed("")?;
        let a = derive_secp256k1_secret(&seed, 0)?;
        let b = derive_secp256k1_secret(&seed, 0)?;
        assert_eq!(*a, *b);
        Ok(())
    }

    #[test]
    fn distinct_indices_give_distinct_keys() -> std::result::Result<(), IcringError> {
        let seed = Mnemonic::parse(PHRASE)?.to_seed("")?;
        let a = derive_secp256k1_secret(&seed, 0)?;
        let b = derive_secp256k1_secret(&seed, 1)?;
        assert_ne!(*a, *b);
        Ok(())
    }
}
