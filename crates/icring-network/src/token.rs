//! Token, collectible and balance types.
//!
//! All types serialize in the camelCase JSON shape stored in the
//! network module and returned to callers.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Standard tags understood by the default token table.
pub mod standards {
    pub const ICP: &str = "ICP";
    pub const DIP20: &str = "DIP20";
    pub const EXT: &str = "EXT";
    pub const XTC: &str = "XTC";
    pub const WICP: &str = "WICP";
}

// ---------------------------------------------------------------------------
// Fungible tokens
// ---------------------------------------------------------------------------

/// Canonical metadata of a fungible token.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StandardToken {
    pub name: String,
    pub symbol: String,
    /// Canister reference; the unique key of a token on a network.
    pub canister_id: String,
    pub standard: String,
    pub decimals: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
}

/// A network-level token entry shared by the accounts in `registered_by`.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredToken {
    #[serde(flatten)]
    pub token: StandardToken,
    #[serde(default)]
    pub registered_by: BTreeSet<String>,
}

impl RegisteredToken {
    /// Wraps freshly resolved metadata with an empty `registered_by` set.
    pub fn new(token: StandardToken) -> Self {
        Self {
            token,
            registered_by: BTreeSet::new(),
        }
    }

    /// Returns `true` if `account_id` registered this token.
    pub fn is_registered_by(&self, account_id: &str) -> bool {
        self.registered_by.contains(account_id)
    }
}

/// Metadata answer of a token canister.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TokenMetadata {
    Fungible(FungibleMetadata),
    /// The canister describes a non-fungible asset.
    NonFungible { name: String },
}

/// Fungible part of a token canister's metadata.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FungibleMetadata {
    pub name: String,
    pub symbol: String,
    pub decimals: u32,
    pub fee: Option<u64>,
}

/// Result of a registration: either the untouched default list (the
/// canister was a default asset) or the network's registered list.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TokenList {
    Defaults(Vec<StandardToken>),
    Registered(Vec<RegisteredToken>),
}

impl TokenList {
    /// Finds the token with `canister_id` in either list.
    pub fn find(&self, canister_id: &str) -> Option<&StandardToken> {
        match self {
            Self::Defaults(tokens) => tokens.iter().find(|t| t.canister_id == canister_id),
            Self::Registered(tokens) => tokens
                .iter()
                .map(|t| &t.token)
                .find(|t| t.canister_id == canister_id),
        }
    }

    /// Number of entries in the list.
    pub fn len(&self) -> usize {
        match self {
            Self::Defaults(tokens) => tokens.len(),
            Self::Registered(tokens) => tokens.len(),
        }
    }

    /// Returns `true` if the list is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ---------------------------------------------------------------------------
// Collectibles
// ---------------------------------------------------------------------------

/// Metadata of a collectible (NFT) collection.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectibleCollection {
    pub name: String,
    pub canister_id: String,
    pub standard: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

/// A network-level collection entry shared by the accounts in `registered_by`.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredCollectible {
    #[serde(flatten)]
    pub collection: CollectibleCollection,
    #[serde(default)]
    pub registered_by: BTreeSet<String>,
}

// ---------------------------------------------------------------------------
// Balances / transfers
// ---------------------------------------------------------------------------

/// Balance of one token for one account.
///
/// `amount` is the decimal text of the raw on-chain amount. When the
/// balance query failed, `amount` is `"Error"` and `error` says why.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenBalance {
    pub amount: String,
    pub token: StandardToken,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TokenBalance {
    /// Marker amount of a failed balance query.
    pub const ERROR_AMOUNT: &'static str = "Error";

    /// Builds the entry of a failed balance query.
    pub fn failed(token: StandardToken, error: String) -> Self {
        Self {
            amount: Self::ERROR_AMOUNT.into(),
            token,
            error: Some(error),
        }
    }
}

/// Receipt of a token transfer.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SendReceipt {
    /// Ledger block height (ICP-style ledgers).
    Height(u64),
    /// Transaction id (DIP20 / XTC style canisters).
    TransactionId(String),
}
