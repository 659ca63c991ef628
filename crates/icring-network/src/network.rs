//! A single network and its token / collectible registry.
//!
//! Registered entries are unique per canister reference. Registering an
//! already-known token only adds the account to the entry's
//! `registered_by` set; registering a default asset changes nothing.
//! Collectibles are stricter: a second registration of the same
//! collection fails with [`IcringError::CollectibleAlreadyRegistered`].
//!
//! Every successful mutation fires the network's [`ChangeHook`] so the
//! owner knows the module must be persisted.
//!
//! Concurrent registrations of the same canister on the same network
//! are not ordered; the first entry merged wins its shared fields.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use icring_crypto::identity::Identity;
use icring_types::{IcringError, Principal, Result};
use serde::{Deserialize, Serialize};

use crate::agent::{AgentContext, CanisterAgent};
use crate::defaults::{icp_token, mainnet_tokens, CANISTER_ID_TEXT_LEN, MAINNET_ID, MAINNET_NAME};
use crate::token::{
    RegisteredCollectible, RegisteredToken, StandardToken, TokenList, TokenMetadata,
};

// ---------------------------------------------------------------------------
// ChangeHook
// ---------------------------------------------------------------------------

/// Shared dirty flag raised by registry mutations.
#[derive(Clone, Debug, Default)]
pub struct ChangeHook(Arc<AtomicBool>);

impl ChangeHook {
    /// Creates a lowered flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises the flag.
    pub fn notify(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns whether the flag is raised.
    pub fn is_dirty(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Lowers the flag, returning whether it was raised.
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Parameters / records
// ---------------------------------------------------------------------------

/// Whether a network is the built-in public network or user-defined.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NetworkKind {
    BuiltIn,
    Custom,
}

/// Parameters of a new custom network.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkParams {
    pub name: String,
    pub host: String,
    #[serde(default)]
    pub ledger_canister_id: Option<String>,
}

/// Edit of a custom network; empty or absent fields are left unchanged.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditNetworkParams {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub ledger_canister_id: Option<String>,
}

/// Persisted form of a [`Network`].
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkRecord {
    pub id: String,
    pub name: String,
    pub host: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ledger_canister_id: Option<String>,
    #[serde(default)]
    pub registered_tokens: Vec<RegisteredToken>,
    #[serde(default)]
    pub registered_collectibles: Vec<RegisteredCollectible>,
}

/// Checks that `canister_id` is a well-formed canister reference.
///
/// # Errors
///
/// Returns [`IcringError::InvalidCanisterReference`] if the text is not
/// a canonical principal with a valid checksum, or not canister-sized.
pub fn validate_canister_id(canister_id: &str) -> Result<()> {
    let invalid = || IcringError::InvalidCanisterReference {
        canister_id: canister_id.to_owned(),
    };
    if canister_id.len() != CANISTER_ID_TEXT_LEN {
        return Err(invalid());
    }
    Principal::from_text(canister_id).map_err(|_| invalid())?;
    Ok(())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

// ---------------------------------------------------------------------------
// Network
// ---------------------------------------------------------------------------

/// One network: endpoint, default assets and registered catalog.
#[derive(Clone, Debug)]
pub struct Network {
    id: String,
    name: String,
    host: String,
    ledger_canister_id: Option<String>,
    kind: NetworkKind,
    default_tokens: Vec<StandardToken>,
    registered_tokens: Vec<RegisteredToken>,
    registered_collectibles: Vec<RegisteredCollectible>,
    on_change: ChangeHook,
}

impl Network {
    /// The built-in public network at `host`.
    pub fn mainnet(host: &str, on_change: ChangeHook) -> Self {
        Self {
            id: MAINNET_ID.into(),
            name: MAINNET_NAME.into(),
            host: host.into(),
            ledger_canister_id: Some(crate::defaults::ICP_LEDGER_CANISTER_ID.into()),
            kind: NetworkKind::BuiltIn,
            default_tokens: mainnet_tokens(),
            registered_tokens: Vec::new(),
            registered_collectibles: Vec::new(),
            on_change,
        }
    }

    /// A new custom network with a generated id.
    pub fn custom(params: NetworkParams, on_change: ChangeHook) -> Self {
        let ledger_canister_id = non_empty(params.ledger_canister_id);
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: params.name,
            host: params.host,
            default_tokens: ledger_canister_id.iter().map(|l| icp_token(l)).collect(),
            ledger_canister_id,
            kind: NetworkKind::Custom,
            registered_tokens: Vec::new(),
            registered_collectibles: Vec::new(),
            on_change,
        }
    }

    /// Rebuilds a network from its persisted record.
    ///
    /// The record with id [`MAINNET_ID`] becomes the built-in network.
    pub fn from_record(record: NetworkRecord, on_change: ChangeHook) -> Self {
        let mut network = if record.id == MAINNET_ID {
            Self::mainnet(&record.host, on_change)
        } else {
            let mut custom = Self::custom(
                NetworkParams {
                    name: record.name,
                    host: record.host,
                    ledger_canister_id: record.ledger_canister_id,
                },
                on_change,
            );
            custom.id = record.id;
            custom
        };
        let registered_tokens: Vec<RegisteredToken> = record
            .registered_tokens
            .into_iter()
            .filter(|t| !network.is_default_token(&t.token.canister_id))
            .collect();
        network.registered_tokens = dedup_by_canister(registered_tokens, |t| &t.token.canister_id);
        network.registered_collectibles =
            dedup_by_canister(record.registered_collectibles, |c| &c.collection.canister_id);
        network
    }

    /// Returns the persisted record of this network.
    pub fn to_record(&self) -> NetworkRecord {
        NetworkRecord {
            id: self.id.clone(),
            name: self.name.clone(),
            host: self.host.clone(),
            ledger_canister_id: self.ledger_canister_id.clone(),
            registered_tokens: self.registered_tokens.clone(),
            registered_collectibles: self.registered_collectibles.clone(),
        }
    }

    // -- Accessors --------------------------------------------------------

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn ledger_canister_id(&self) -> Option<&str> {
        self.ledger_canister_id.as_deref()
    }

    pub fn kind(&self) -> NetworkKind {
        self.kind
    }

    pub fn is_custom(&self) -> bool {
        self.kind == NetworkKind::Custom
    }

    pub fn default_tokens(&self) -> &[StandardToken] {
        &self.default_tokens
    }

    pub fn registered_tokens(&self) -> &[RegisteredToken] {
        &self.registered_tokens
    }

    pub fn registered_collectibles(&self) -> &[RegisteredCollectible] {
        &self.registered_collectibles
    }

    /// Default assets followed by every registered token.
    pub fn tokens(&self) -> Vec<StandardToken> {
        self.default_tokens
            .iter()
            .cloned()
            .chain(self.registered_tokens.iter().map(|t| t.token.clone()))
            .collect()
    }

    /// Finds a default or registered token by canister reference.
    pub fn token_by_canister_id(&self, canister_id: &str) -> Option<StandardToken> {
        self.default_tokens
            .iter()
            .chain(self.registered_tokens.iter().map(|t| &t.token))
            .find(|t| t.canister_id == canister_id)
            .cloned()
    }

    /// Default assets plus the tokens registered by `account_id`.
    pub fn tokens_for(&self, account_id: &str) -> Vec<StandardToken> {
        self.default_tokens
            .iter()
            .cloned()
            .chain(
                self.registered_tokens
                    .iter()
                    .filter(|t| t.is_registered_by(account_id))
                    .map(|t| t.token.clone()),
            )
            .collect()
    }

    /// Returns `true` if `canister_id` is one of the default assets.
    pub fn is_default_token(&self, canister_id: &str) -> bool {
        self.default_tokens.iter().any(|t| t.canister_id == canister_id)
    }

    /// Binds an agent call to this network's host.
    pub fn agent_context<'a>(&'a self, identity: &'a Identity) -> AgentContext<'a> {
        AgentContext {
            host: &self.host,
            wrapped: !self.is_custom(),
            identity,
        }
    }

    // -- Editing ----------------------------------------------------------

    /// Applies `edit` to a custom network.
    ///
    /// # Errors
    ///
    /// Returns [`IcringError::NetworkImmutable`] for the built-in network.
    pub fn edit(&mut self, edit: EditNetworkParams) -> Result<()> {
        if self.kind == NetworkKind::BuiltIn {
            return Err(IcringError::NetworkImmutable {
                network_id: self.id.clone(),
            });
        }
        if let Some(name) = non_empty(edit.name) {
            self.name = name;
        }
        if let Some(host) = non_empty(edit.host) {
            self.host = host;
        }
        if let Some(ledger) = non_empty(edit.ledger_canister_id) {
            self.default_tokens = vec![icp_token(&ledger)];
            self.ledger_canister_id = Some(ledger);
        }
        self.on_change.notify();
        Ok(())
    }

    // -- Tokens -----------------------------------------------------------

    async fn fetch_token(
        &self,
        agent: &dyn CanisterAgent,
        canister_id: &str,
        standard: &str,
        identity: &Identity,
    ) -> Result<RegisteredToken> {
        validate_canister_id(canister_id)?;
        let metadata = agent
            .resolve_fungible(self.agent_context(identity), canister_id, standard)
            .await?;
        match metadata {
            TokenMetadata::Fungible(fungible) => Ok(RegisteredToken::new(StandardToken {
                name: fungible.name,
                symbol: fungible.symbol,
                canister_id: canister_id.to_owned(),
                standard: standard.to_owned(),
                decimals: fungible.decimals,
                fee: fungible.fee,
                logo: None,
            })),
            TokenMetadata::NonFungible { .. } => Err(IcringError::NonFungibleTokenUnsupported {
                canister_id: canister_id.to_owned(),
            }),
        }
    }

    fn merge_resolved(&mut self, token: RegisteredToken) -> RegisteredToken {
        let canister_id = &token.token.canister_id;
        if self.is_default_token(canister_id) {
            return token;
        }
        if let Some(existing) = self
            .registered_tokens
            .iter()
            .find(|t| &t.token.canister_id == canister_id)
        {
            return existing.clone();
        }
        self.registered_tokens.push(token.clone());
        token
    }

    /// Resolves a token's metadata and merges it into the catalog.
    ///
    /// An entry already present keeps its fields and is returned as is.
    /// Default assets are resolved but never enter the catalog.
    ///
    /// # Errors
    ///
    /// - [`IcringError::InvalidCanisterReference`] before any agent call.
    /// - [`IcringError::NonFungibleTokenUnsupported`] for non-fungible canisters.
    /// - Any agent error, with the catalog unchanged.
    pub async fn resolve_token(
        &mut self,
        agent: &dyn CanisterAgent,
        canister_id: &str,
        standard: &str,
        identity: &Identity,
    ) -> Result<RegisteredToken> {
        let token = self.fetch_token(agent, canister_id, standard, identity).await?;
        Ok(self.merge_resolved(token))
    }

    /// Resolves several tokens concurrently, then merges the successes
    /// in request order.
    pub async fn resolve_tokens(
        &mut self,
        agent: &dyn CanisterAgent,
        requests: &[(&str, &str)],
        identity: &Identity,
    ) -> Vec<Result<RegisteredToken>> {
        let fetched = {
            let this = &*self;
            join_all(
                requests
                    .iter()
                    .map(|(canister_id, standard)| this.fetch_token(agent, canister_id, standard, identity)),
            )
            .await
        };
        fetched
            .into_iter()
            .map(|result| result.map(|token| self.merge_resolved(token)))
            .collect()
    }

    /// Registers a token for `account_id`.
    ///
    /// Default assets are never added to the catalog; the default list
    /// is returned unchanged. Unknown tokens are resolved first.
    ///
    /// # Errors
    ///
    /// Any error of [`resolve_token`](Self::resolve_token).
    pub async fn register_token(
        &mut self,
        agent: &dyn CanisterAgent,
        canister_id: &str,
        standard: &str,
        account_id: &str,
        identity: &Identity,
        logo: Option<String>,
    ) -> Result<TokenList> {
        if self.is_default_token(canister_id) {
            return Ok(TokenList::Defaults(self.default_tokens.clone()));
        }

        let known = self
            .registered_tokens
            .iter()
            .any(|t| t.token.canister_id == canister_id);
        if !known {
            self.resolve_token(agent, canister_id, standard, identity).await?;
        }

        if let Some(entry) = self
            .registered_tokens
            .iter_mut()
            .find(|t| t.token.canister_id == canister_id)
        {
            if logo.is_some() {
                entry.token.logo = logo;
            }
            entry.registered_by.insert(account_id.to_owned());
        }
        self.on_change.notify();

        tracing::info!(network = %self.id, canister_id, account_id, "token registered");
        Ok(TokenList::Registered(self.registered_tokens.clone()))
    }

    /// Removes a token from the network for every account.
    ///
    /// The change hook fires even when no entry matched.
    pub fn remove_token(&mut self, canister_id: &str) -> Vec<RegisteredToken> {
        let before = self.registered_tokens.len();
        self.registered_tokens.retain(|t| t.token.canister_id != canister_id);
        if self.registered_tokens.len() != before {
            tracing::info!(network = %self.id, canister_id, "token removed");
        }
        self.on_change.notify();
        self.registered_tokens.clone()
    }

    /// Replaces the registries with those of `record`, a snapshot of
    /// this network taken by [`to_record`](Self::to_record).
    pub fn restore(&mut self, record: NetworkRecord) {
        self.registered_tokens = record.registered_tokens;
        self.registered_collectibles = record.registered_collectibles;
    }

    // -- Collectibles -----------------------------------------------------

    /// Resolves a collection's metadata without registering it.
    ///
    /// # Errors
    ///
    /// - [`IcringError::InvalidCanisterReference`] before any agent call.
    /// - [`IcringError::CanisterInterfaceError`] on any resolution fault.
    pub async fn collectible_info(
        &self,
        agent: &dyn CanisterAgent,
        canister_id: &str,
        standard: &str,
        identity: &Identity,
    ) -> Result<RegisteredCollectible> {
        validate_canister_id(canister_id)?;
        let mut collection = agent
            .resolve_collectible(self.agent_context(identity), canister_id, standard)
            .await
            .map_err(|e| IcringError::CanisterInterfaceError {
                reason: format!("collection {canister_id}: {e}"),
            })?;
        collection.canister_id = canister_id.to_owned();
        Ok(RegisteredCollectible {
            collection,
            registered_by: Default::default(),
        })
    }

    /// Registers a collection for `account_id`.
    ///
    /// # Errors
    ///
    /// - [`IcringError::CollectibleAlreadyRegistered`] if the collection
    ///   is already in the catalog.
    /// - Any error of [`collectible_info`](Self::collectible_info).
    pub async fn register_collectible(
        &mut self,
        agent: &dyn CanisterAgent,
        canister_id: &str,
        standard: &str,
        account_id: &str,
        identity: &Identity,
    ) -> Result<Vec<RegisteredCollectible>> {
        if self
            .registered_collectibles
            .iter()
            .any(|c| c.collection.canister_id == canister_id)
        {
            return Err(IcringError::CollectibleAlreadyRegistered {
                canister_id: canister_id.to_owned(),
            });
        }

        let mut entry = self.collectible_info(agent, canister_id, standard, identity).await?;
        entry.registered_by.insert(account_id.to_owned());
        self.registered_collectibles.push(entry);
        self.on_change.notify();

        tracing::info!(network = %self.id, canister_id, account_id, "collectible registered");
        Ok(self.registered_collectibles.clone())
    }
}

/// Keeps the first entry of every canister reference.
fn dedup_by_canister<T>(entries: Vec<T>, key: impl Fn(&T) -> &String) -> Vec<T> {
    let mut seen = std::collections::HashSet::new();
    entries
        .into_iter()
        .filter(|entry| seen.insert(key(entry).clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::{ICP_LEDGER_CANISTER_ID, XTC_CANISTER_ID};

    #[test]
    fn canister_validation() {
        assert!(validate_canister_id(ICP_LEDGER_CANISTER_ID).is_ok());
        assert!(validate_canister_id(XTC_CANISTER_ID).is_ok());
        for bad in ["", "aaaaa-aa", "ryjl3-tyaaa-aaaaa-aaaba-caa", "not a canister at all......"] {
            assert!(matches!(
                validate_canister_id(bad),
                Err(IcringError::InvalidCanisterReference { .. })
            ));
        }
    }

    #[test]
    fn removing_an_absent_token_still_notifies() {
        let hook = ChangeHook::new();
        let mut mainnet = Network::mainnet("https://icp-api.io", hook.clone());
        assert!(mainnet.remove_token("rrkah-fqaaa-aaaaa-aaaaq-cai").is_empty());
        assert!(hook.take());
    }

    #[test]
    fn mainnet_is_immutable() {
        let hook = ChangeHook::new();
        let mut mainnet = Network::mainnet("https://icp-api.io", hook.clone());
        let result = mainnet.edit(EditNetworkParams {
            name: Some("Renamed".into()),
            ..Default::default()
        });
        assert!(matches!(result, Err(IcringError::NetworkImmutable { .. })));
        assert_eq!(mainnet.name(), MAINNET_NAME);
        assert!(!hook.is_dirty());
    }

    #[test]
    fn custom_edit_keeps_absent_fields() -> std::result::Result<(), IcringError> {
        let hook = ChangeHook::new();
        let mut local = Network::custom(
            NetworkParams {
                name: "Local".into(),
                host: "http://127.0.0.1:4943".into(),
                ledger_canister_id: None,
            },
            hook.clone(),
        );
        assert!(local.is_custom());
        assert!(local.default_tokens().is_empty());

        local.edit(EditNetworkParams {
            host: Some("http://localhost:8000".into()),
            name: Some("  ".into()),
            ledger_canister_id: Some(ICP_LEDGER_CANISTER_ID.into()),
        })?;
        assert_eq!(local.name(), "Local");
        assert_eq!(local.host(), "http://localhost:8000");
        assert!(local.is_default_token(ICP_LEDGER_CANISTER_ID));
        assert!(hook.take());
        assert!(!hook.is_dirty());
        Ok(())
    }

    #[test]
    fn record_roundtrip_dedups_entries() {
        let mut mainnet = Network::mainnet("https://icp-api.io", ChangeHook::new()).to_record();
        let entry = RegisteredToken::new(StandardToken {
            name: "T".into(),
            symbol: "T".into(),
            canister_id: "x".into(),
            standard: "DIP20".into(),
            decimals: 8,
            fee: None,
            logo: None,
        });
        let mut second = entry.clone();
        second.token.name = "Shadow".into();
        mainnet.registered_tokens = vec![entry, second];

        let network = Network::from_record(mainnet, ChangeHook::new());
        assert_eq!(network.kind(), NetworkKind::BuiltIn);
        assert_eq!(network.registered_tokens().len(), 1);
        assert_eq!(network.registered_tokens()[0].token.name, "T");
        assert_eq!(network.tokens().len(), 4);
    }
}
