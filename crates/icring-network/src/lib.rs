//! Network registry for the icring keyring.
//!
//! Tracks, per network, the default assets plus the fungible tokens
//! and collectible collections that accounts registered. Catalog
//! entries are shared by every account on the network; only their
//! `registered_by` sets differ.
//!
//! # Architecture
//!
//! - [`token`] — token, collectible and balance types
//! - [`agent`] — the [`CanisterAgent`] collaborator the registry queries
//! - [`defaults`] — built-in network constants and default tokens
//! - [`network`] — one [`Network`] with its registration logic
//! - [`module`] — the [`NetworkModule`] owning all networks

pub mod agent;
pub mod defaults;
pub mod module;
pub mod network;
pub mod token;

pub use agent::{AgentContext, CanisterAgent, IcnsData};
pub use module::{NetworkModule, NetworkModuleRecord};
pub use network::{ChangeHook, EditNetworkParams, Network, NetworkKind, NetworkParams, NetworkRecord};
pub use token::{
    CollectibleCollection, FungibleMetadata, RegisteredCollectible, RegisteredToken, SendReceipt,
    StandardToken, TokenBalance, TokenList, TokenMetadata,
};
