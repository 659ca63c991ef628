//! The canister agent collaborator.
//!
//! The registry never talks to a chain itself. Metadata resolution,
//! balances, transfers and name lookups go through a
//! [`CanisterAgent`], bound per call to a network host and a signing
//! identity via [`AgentContext`].

use async_trait::async_trait;
use icring_crypto::identity::Identity;
use icring_types::Result;
use serde::{Deserialize, Serialize};

use crate::token::{CollectibleCollection, SendReceipt, StandardToken, TokenMetadata};

/// Host and identity an agent call is made with.
#[derive(Clone, Copy)]
pub struct AgentContext<'a> {
    /// Endpoint of the network the call goes to.
    pub host: &'a str,
    /// `true` on the built-in network, whose boundary nodes wrap calls.
    pub wrapped: bool,
    /// Identity signing the call.
    pub identity: &'a Identity,
}

/// Names resolved for an account by the naming service.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IcnsData {
    #[serde(default)]
    pub names: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reverse_resolved_name: Option<String>,
}

/// Chain access needed by the registry and the per-account operations.
///
/// Implementations own transport, candid encoding and retries; the
/// keyring imposes no timeout of its own.
#[async_trait]
pub trait CanisterAgent: Send + Sync {
    /// Queries a token canister's metadata.
    async fn resolve_fungible(
        &self,
        ctx: AgentContext<'_>,
        canister_id: &str,
        standard: &str,
    ) -> Result<TokenMetadata>;

    /// Queries a collectible collection's metadata.
    async fn resolve_collectible(
        &self,
        ctx: AgentContext<'_>,
        canister_id: &str,
        standard: &str,
    ) -> Result<CollectibleCollection>;

    /// Returns the raw balance of the context identity, as decimal text.
    async fn get_balance(&self, ctx: AgentContext<'_>, token: &StandardToken) -> Result<String>;

    /// Transfers `amount` raw units of `token` to `to`.
    async fn send(
        &self,
        ctx: AgentContext<'_>,
        token: &StandardToken,
        to: &str,
        amount: u64,
    ) -> Result<SendReceipt>;

    /// Looks up the names owned by the context identity.
    async fn resolve_names(&self, ctx: AgentContext<'_>) -> Result<IcnsData>;

    /// Sets the reverse-resolved name of the context identity.
    async fn set_reverse_resolved_name(&self, ctx: AgentContext<'_>, name: &str) -> Result<String>;
}
