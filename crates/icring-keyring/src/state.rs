//! Lifecycle state of the keyring.
//!
//! The keyring moves through three states:
//!
//! - `Uninitialized` — no root account was ever created in the storage.
//! - `Locked` — a vault exists but nothing secret is in memory.
//! - `Unlocked` — the accounts are decrypted and their keys are live.
//!
//! Locking replaces the unlocked state wholesale; dropping the
//! [`UnlockedKeyRing`] zeroizes the password and every account key.
//! The seed phrase is never part of the state: it is read from the
//! vault when a derivation or a save needs it and dropped right after.

use icring_types::{IcringError, Result};
use icring_wallet::AccountView;
use serde::Serialize;
use zeroize::Zeroizing;

use crate::directory::AccountDirectory;
use crate::dispatch::AccountTarget;

// ---------------------------------------------------------------------------
// KeyRingState
// ---------------------------------------------------------------------------

/// Lifecycle state of a [`KeyRing`](crate::KeyRing).
pub enum KeyRingState {
    Uninitialized,
    Locked,
    Unlocked(Box<UnlockedKeyRing>),
}

impl KeyRingState {
    pub fn is_initialized(&self) -> bool {
        !matches!(self, Self::Uninitialized)
    }

    pub fn is_unlocked(&self) -> bool {
        matches!(self, Self::Unlocked(_))
    }

    /// # Errors
    ///
    /// [`IcringError::NotInitialized`] or [`IcringError::StateLocked`].
    pub fn unlocked(&self) -> Result<&UnlockedKeyRing> {
        match self {
            Self::Uninitialized => Err(IcringError::NotInitialized),
            Self::Locked => Err(IcringError::StateLocked),
            Self::Unlocked(unlocked) => Ok(unlocked),
        }
    }

    /// # Errors
    ///
    /// [`IcringError::NotInitialized`] or [`IcringError::StateLocked`].
    pub fn unlocked_mut(&mut self) -> Result<&mut UnlockedKeyRing> {
        match self {
            Self::Uninitialized => Err(IcringError::NotInitialized),
            Self::Locked => Err(IcringError::StateLocked),
            Self::Unlocked(unlocked) => Ok(unlocked),
        }
    }
}

// ---------------------------------------------------------------------------
// UnlockedKeyRing
// ---------------------------------------------------------------------------

/// Decrypted keyring content, held only while unlocked.
pub struct UnlockedKeyRing {
    pub(crate) password: Zeroizing<String>,
    pub(crate) accounts: AccountDirectory,
    /// Next seed derivation index.
    pub(crate) mnemonic_account_count: u64,
    pub(crate) current_account_id: String,
}

impl UnlockedKeyRing {
    pub fn accounts(&self) -> &AccountDirectory {
        &self.accounts
    }

    pub fn current_account_id(&self) -> &str {
        &self.current_account_id
    }

    pub fn mnemonic_account_count(&self) -> u64 {
        self.mnemonic_account_count
    }

    /// Resolves `target` to the id of an existing account.
    ///
    /// # Errors
    ///
    /// Returns [`IcringError::InvalidAccountReference`] if the target
    /// names no account.
    pub fn resolve(&self, target: &AccountTarget) -> Result<String> {
        let id = match target {
            AccountTarget::Current => Some(self.current_account_id.as_str()),
            AccountTarget::Id(id) => Some(id.as_str()),
            AccountTarget::Root => self.accounts.root().map(|a| a.id()),
        };
        match id {
            Some(id) if self.accounts.contains(id) => Ok(id.to_owned()),
            other => Err(IcringError::InvalidAccountReference {
                account_id: other.unwrap_or("root").to_owned(),
            }),
        }
    }

    pub(crate) fn snapshot(&self, current_network_id: &str) -> KeyRingSnapshot {
        KeyRingSnapshot {
            wallets: self.accounts.ordered().into_iter().map(AccountView::from).collect(),
            current_wallet_id: self.current_account_id.clone(),
            mnemonic_wallet_count: self.mnemonic_account_count,
            current_network_id: current_network_id.to_owned(),
        }
    }
}

// ---------------------------------------------------------------------------
// Public answers
// ---------------------------------------------------------------------------

/// Secret-free view of an unlocked keyring.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyRingSnapshot {
    /// Accounts in creation order.
    pub wallets: Vec<AccountView>,
    pub current_wallet_id: String,
    pub mnemonic_wallet_count: u64,
    pub current_network_id: String,
}

/// Why a key file would not be accepted.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PemErrorKind {
    AlreadyRegistered,
    MalformedKeyMaterial,
}

/// Answer of a key file pre-flight check.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PemValidation {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<PemErrorKind>,
}

impl PemValidation {
    pub(crate) fn valid() -> Self {
        Self {
            valid: true,
            error_kind: None,
        }
    }

    pub(crate) fn invalid(kind: PemErrorKind) -> Self {
        Self {
            valid: false,
            error_kind: Some(kind),
        }
    }
}
