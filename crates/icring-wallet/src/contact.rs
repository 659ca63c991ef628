//! The per-account address book.

use std::str::FromStr;

use icring_types::{AccountIdentifier, IcringError, Principal, Result};
use serde::{Deserialize, Serialize};

/// Where a contact receives transfers.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum ContactAddress {
    PrincipalId(Principal),
    /// Hex account identifier.
    AccountId(String),
    /// A name registered with the naming service.
    Icns(String),
}

impl ContactAddress {
    /// Checks the address is well formed.
    ///
    /// # Errors
    ///
    /// Returns [`IcringError::InvalidPrincipal`] for a malformed account
    /// identifier or an empty name.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::PrincipalId(_) => Ok(()),
            Self::AccountId(hex) => AccountIdentifier::from_str(hex).map(|_| ()),
            Self::Icns(name) if name.trim().is_empty() => Err(IcringError::InvalidPrincipal {
                reason: "empty name".into(),
            }),
            Self::Icns(_) => Ok(()),
        }
    }
}

/// One entry of an account's address book. Names are unique per account.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub name: String,
    pub value: ContactAddress,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emoji: Option<String>,
}
