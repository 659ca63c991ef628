//! Network-bound operations of an [`Account`].
//!
//! Every operation takes the [`Network`] it runs on and the
//! [`CanisterAgent`] it talks through. Registry changes notify the
//! network's change hook; account-local changes (resolved names) are
//! persisted by whoever owns the account.

use std::str::FromStr;

use futures::future::join_all;
use icring_network::{
    CanisterAgent, IcnsData, Network, RegisteredCollectible, SendReceipt, StandardToken,
    TokenBalance,
};
use icring_types::{AccountIdentifier, IcringError, Principal, Result};

use crate::account::Account;

impl Account {
    // -- Tokens -----------------------------------------------------------

    /// Registers a fungible token for this account and returns its balance.
    ///
    /// Registering a default asset changes nothing but still answers
    /// with the asset's balance.
    ///
    /// # Errors
    ///
    /// - [`IcringError::InvalidCanisterReference`] for a malformed reference.
    /// - [`IcringError::NonFungibleTokenUnsupported`] for a collectible canister.
    /// - [`IcringError::AgentError`] if resolution or the balance query fails.
    pub async fn register_token(
        &self,
        network: &mut Network,
        agent: &dyn CanisterAgent,
        canister_id: &str,
        standard: &str,
        logo: Option<String>,
    ) -> Result<TokenBalance> {
        let list = network
            .register_token(agent, canister_id, standard, self.id(), self.identity(), logo)
            .await?;
        let token = list
            .find(canister_id)
            .cloned()
            .ok_or_else(|| IcringError::TokenNotRegistered {
                canister_id: canister_id.to_owned(),
            })?;
        let amount = agent
            .get_balance(network.agent_context(self.identity()), &token)
            .await?;
        Ok(TokenBalance {
            amount,
            token,
            error: None,
        })
    }

    /// Removes a token from the network.
    ///
    /// Default assets cannot be removed: the network's full token list
    /// is returned unchanged. Otherwise the remaining registered tokens
    /// are returned.
    pub fn remove_token(&self, network: &mut Network, canister_id: &str) -> Vec<StandardToken> {
        if network.is_default_token(canister_id) {
            return network.tokens();
        }
        network
            .remove_token(canister_id)
            .into_iter()
            .map(|t| t.token)
            .collect()
    }

    /// Resolves a token without registering it for this account, and
    /// queries this account's balance of it.
    ///
    /// # Errors
    ///
    /// Any resolution error of [`Network::resolve_token`]; a failing
    /// balance query is reported inside the returned entry.
    pub async fn token_info(
        &self,
        network: &mut Network,
        agent: &dyn CanisterAgent,
        canister_id: &str,
        standard: &str,
    ) -> Result<TokenBalance> {
        let token = match network.token_by_canister_id(canister_id) {
            Some(token) => token,
            None => {
                network
                    .resolve_token(agent, canister_id, standard, self.identity())
                    .await?
                    .token
            }
        };
        Ok(self.token_balance(network, agent, token).await)
    }

    /// Balance of one token. A failed query yields an error entry.
    pub async fn token_balance(
        &self,
        network: &Network,
        agent: &dyn CanisterAgent,
        token: StandardToken,
    ) -> TokenBalance {
        match agent
            .get_balance(network.agent_context(self.identity()), &token)
            .await
        {
            Ok(amount) => TokenBalance {
                amount,
                token,
                error: None,
            },
            Err(e) => {
                tracing::debug!(
                    account = %self.id(),
                    canister_id = %token.canister_id,
                    error = %e,
                    "balance query failed"
                );
                TokenBalance::failed(token, e.to_string())
            }
        }
    }

    /// Balances of every token visible to this account, queried
    /// concurrently. Per-token failures are captured in their entries.
    pub async fn balances(&self, network: &Network, agent: &dyn CanisterAgent) -> Vec<TokenBalance> {
        let queries = network
            .tokens_for(self.id())
            .into_iter()
            .map(|token| self.token_balance(network, agent, token));
        join_all(queries).await
    }

    /// Transfers `amount` raw units of the token `canister_id` to `to`.
    ///
    /// `to` is a principal or a hex account identifier.
    ///
    /// # Errors
    ///
    /// - [`IcringError::TokenNotRegistered`] if the network does not know
    ///   the token.
    /// - [`IcringError::InvalidPrincipal`] for a malformed recipient.
    /// - [`IcringError::AgentError`] if the transfer fails.
    pub async fn send(
        &self,
        network: &Network,
        agent: &dyn CanisterAgent,
        to: &str,
        amount: u64,
        canister_id: &str,
    ) -> Result<SendReceipt> {
        let token = network
            .token_by_canister_id(canister_id)
            .ok_or_else(|| IcringError::TokenNotRegistered {
                canister_id: canister_id.to_owned(),
            })?;
        validate_recipient(to)?;

        let receipt = agent
            .send(network.agent_context(self.identity()), &token, to, amount)
            .await?;
        tracing::info!(account = %self.id(), canister_id, amount, "transfer sent");
        Ok(receipt)
    }

    // -- Collectibles -----------------------------------------------------

    /// Registers a collectible collection for this account.
    ///
    /// # Errors
    ///
    /// Any error of [`Network::register_collectible`].
    pub async fn register_collectible(
        &self,
        network: &mut Network,
        agent: &dyn CanisterAgent,
        canister_id: &str,
        standard: &str,
    ) -> Result<RegisteredCollectible> {
        network
            .register_collectible(agent, canister_id, standard, self.id(), self.identity())
            .await?
            .into_iter()
            .find(|c| c.collection.canister_id == canister_id)
            .ok_or_else(|| IcringError::CanisterInterfaceError {
                reason: format!("collection {canister_id} missing after registration"),
            })
    }

    /// Resolves a collection's metadata without registering it.
    ///
    /// # Errors
    ///
    /// Any error of [`Network::collectible_info`].
    pub async fn collectible_info(
        &self,
        network: &Network,
        agent: &dyn CanisterAgent,
        canister_id: &str,
        standard: &str,
    ) -> Result<RegisteredCollectible> {
        network
            .collectible_info(agent, canister_id, standard, self.identity())
            .await
    }

    // -- Names ------------------------------------------------------------

    /// Refreshes and returns the names owned by this account.
    ///
    /// Custom networks have no naming service; they answer with empty
    /// data and leave the cached names untouched.
    ///
    /// # Errors
    ///
    /// Returns the agent's error if the lookup fails.
    pub async fn resolve_icns_data(
        &mut self,
        network: &Network,
        agent: &dyn CanisterAgent,
    ) -> Result<IcnsData> {
        if network.is_custom() {
            return Ok(IcnsData::default());
        }
        let data = agent
            .resolve_names(network.agent_context(self.identity()))
            .await?;
        self.icns_data = data.clone();
        Ok(data)
    }

    /// Sets the name this account's principal reverse-resolves to.
    ///
    /// # Errors
    ///
    /// Returns the agent's error if the update fails.
    pub async fn set_reverse_resolved_name(
        &mut self,
        network: &Network,
        agent: &dyn CanisterAgent,
        name: &str,
    ) -> Result<String> {
        let result = agent
            .set_reverse_resolved_name(network.agent_context(self.identity()), name)
            .await?;
        self.icns_data.reverse_resolved_name = Some(name.to_owned());
        Ok(result)
    }
}

fn validate_recipient(to: &str) -> Result<()> {
    if Principal::from_text(to).is_ok() {
        return Ok(());
    }
    AccountIdentifier::from_str(to)
        .map(|_| ())
        .map_err(|_| IcringError::InvalidPrincipal {
            reason: format!("recipient {to} is neither a principal nor an account identifier"),
        })
}
