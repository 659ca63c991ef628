//! Per-account operation dispatch.
//!
//! Every account-scoped operation is routed the same way: resolve the
//! target account, bind it to the current network and the agent, run
//! the operation, then persist the vault and the network module.
//! Async operations are [`AccountOperation`] values; synchronous ones
//! are closures passed to [`KeyRing::dispatch_sync`]. The
//! [`AccountOperations`] trait puts a named method over each.

use async_trait::async_trait;
use icring_network::{
    CanisterAgent, IcnsData, Network, NetworkRecord, RegisteredCollectible, SendReceipt, StandardToken,
    TokenBalance,
};
use icring_types::{IcringError, Result};
use icring_wallet::{Account, AccountView, Contact};
use zeroize::Zeroizing;

use crate::keyring::KeyRing;

/// Which account an operation runs on.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub enum AccountTarget {
    /// The current account.
    #[default]
    Current,
    /// The account with this id.
    Id(String),
    /// The order-0 seed account.
    Root,
}

impl From<&str> for AccountTarget {
    fn from(account_id: &str) -> Self {
        Self::Id(account_id.to_owned())
    }
}

/// An account bound to the current network and the agent.
pub struct AccountContext<'a> {
    pub account: &'a mut Account,
    pub network: &'a mut Network,
    pub agent: &'a dyn CanisterAgent,
}

/// An asynchronous operation on one account.
#[async_trait]
pub trait AccountOperation: Send {
    type Output: Send;

    async fn run(self, ctx: AccountContext<'_>) -> Result<Self::Output>;
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Registers a fungible token for the account and returns its balance.
pub struct RegisterToken {
    pub canister_id: String,
    pub standard: String,
    pub logo: Option<String>,
}

#[async_trait]
impl AccountOperation for RegisterToken {
    type Output = TokenBalance;

    async fn run(self, ctx: AccountContext<'_>) -> Result<TokenBalance> {
        ctx.account
            .register_token(ctx.network, ctx.agent, &self.canister_id, &self.standard, self.logo)
            .await
    }
}

/// Describes a token and the account's balance of it, without
/// registering it.
pub struct TokenInfo {
    pub canister_id: String,
    pub standard: String,
}

#[async_trait]
impl AccountOperation for TokenInfo {
    type Output = TokenBalance;

    async fn run(self, ctx: AccountContext<'_>) -> Result<TokenBalance> {
        ctx.account
            .token_info(ctx.network, ctx.agent, &self.canister_id, &self.standard)
            .await
    }
}

/// Balances of every token visible to the account.
pub struct Balances;

#[async_trait]
impl AccountOperation for Balances {
    type Output = Vec<TokenBalance>;

    async fn run(self, ctx: AccountContext<'_>) -> Result<Vec<TokenBalance>> {
        Ok(ctx.account.balances(ctx.network, ctx.agent).await)
    }
}

/// Token transfer from the account.
pub struct Transfer {
    pub to: String,
    pub amount: u64,
    pub canister_id: String,
}

#[async_trait]
impl AccountOperation for Transfer {
    type Output = SendReceipt;

    async fn run(self, ctx: AccountContext<'_>) -> Result<SendReceipt> {
        ctx.account
            .send(ctx.network, ctx.agent, &self.to, self.amount, &self.canister_id)
            .await
    }
}

pub struct RegisterCollectible {
    pub canister_id: String,
    pub standard: String,
}

#[async_trait]
impl AccountOperation for RegisterCollectible {
    type Output = RegisteredCollectible;

    async fn run(self, ctx: AccountContext<'_>) -> Result<RegisteredCollectible> {
        ctx.account
            .register_collectible(ctx.network, ctx.agent, &self.canister_id, &self.standard)
            .await
    }
}

pub struct CollectibleInfo {
    pub canister_id: String,
    pub standard: String,
}

#[async_trait]
impl AccountOperation for CollectibleInfo {
    type Output = RegisteredCollectible;

    async fn run(self, ctx: AccountContext<'_>) -> Result<RegisteredCollectible> {
        ctx.account
            .collectible_info(ctx.network, ctx.agent, &self.canister_id, &self.standard)
            .await
    }
}

/// Names of the account, from the naming service.
pub struct IcnsLookup;

#[async_trait]
impl AccountOperation for IcnsLookup {
    type Output = IcnsData;

    async fn run(self, ctx: AccountContext<'_>) -> Result<IcnsData> {
        ctx.account.resolve_icns_data(ctx.network, ctx.agent).await
    }
}

pub struct SetReverseName {
    pub name: String,
}

#[async_trait]
impl AccountOperation for SetReverseName {
    type Output = String;

    async fn run(self, ctx: AccountContext<'_>) -> Result<String> {
        ctx.account
            .set_reverse_resolved_name(ctx.network, ctx.agent, &self.name)
            .await
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

impl KeyRing {
    fn bind(&mut self, target: &AccountTarget) -> Result<AccountContext<'_>> {
        let unlocked = self.state.unlocked_mut()?;
        let account_id = unlocked.resolve(target)?;
        let account = unlocked
            .accounts
            .get_mut(&account_id)
            .ok_or(IcringError::InvalidAccountReference { account_id })?;
        Ok(AccountContext {
            account,
            network: self.network_module.current_network_mut(),
            agent: self.agent.as_ref(),
        })
    }

    fn commit(&self) -> Result<()> {
        self.save_vault(None)?;
        self.persist_network_module()
    }

    /// Runs `op` on the target account, then persists.
    ///
    /// # Errors
    ///
    /// - [`IcringError::NotInitialized`] / [`IcringError::StateLocked`].
    /// - [`IcringError::InvalidAccountReference`] if `target` names no account.
    /// - Any error of the operation; nothing is persisted then and the
    ///   current network's registries are restored.
    pub async fn dispatch<O: AccountOperation>(
        &mut self,
        target: &AccountTarget,
        op: O,
    ) -> Result<O::Output> {
        let snapshot = self.network_module.current_network().to_record();
        let ctx = self.bind(target)?;
        match op.run(ctx).await {
            Ok(output) => {
                self.commit()?;
                Ok(output)
            }
            Err(e) => Err(self.roll_back(snapshot, e)),
        }
    }

    /// Synchronous counterpart of [`dispatch`](Self::dispatch).
    pub fn dispatch_sync<T>(
        &mut self,
        target: &AccountTarget,
        op: impl FnOnce(AccountContext<'_>) -> Result<T>,
    ) -> Result<T> {
        let snapshot = self.network_module.current_network().to_record();
        let ctx = self.bind(target)?;
        match op(ctx) {
            Ok(output) => {
                self.commit()?;
                Ok(output)
            }
            Err(e) => Err(self.roll_back(snapshot, e)),
        }
    }

    fn roll_back(&mut self, snapshot: NetworkRecord, error: IcringError) -> IcringError {
        tracing::debug!(error = %error, "account operation failed, network catalog restored");
        self.network_module.current_network_mut().restore(snapshot);
        error
    }
}

// ---------------------------------------------------------------------------
// AccountOperations
// ---------------------------------------------------------------------------

/// Named per-account operations of the keyring.
#[async_trait]
pub trait AccountOperations {
    fn sign(&mut self, target: &AccountTarget, payload: &[u8]) -> Result<Vec<u8>>;

    /// DER-encoded public key.
    fn public_key(&mut self, target: &AccountTarget) -> Result<Vec<u8>>;

    fn pem_file(&mut self, target: &AccountTarget) -> Result<Zeroizing<String>>;

    fn edit_account(
        &mut self,
        target: &AccountTarget,
        name: Option<String>,
        icon: Option<String>,
    ) -> Result<AccountView>;

    async fn register_token(
        &mut self,
        target: &AccountTarget,
        canister_id: &str,
        standard: &str,
        logo: Option<String>,
    ) -> Result<TokenBalance>;

    /// Unregisters a token for everyone and returns the remaining list.
    fn remove_token(&mut self, target: &AccountTarget, canister_id: &str) -> Result<Vec<StandardToken>>;

    async fn token_info(
        &mut self,
        target: &AccountTarget,
        canister_id: &str,
        standard: &str,
    ) -> Result<TokenBalance>;

    async fn balances(&mut self, target: &AccountTarget) -> Result<Vec<TokenBalance>>;

    async fn send(
        &mut self,
        target: &AccountTarget,
        to: &str,
        amount: u64,
        canister_id: &str,
    ) -> Result<SendReceipt>;

    async fn register_collectible(
        &mut self,
        target: &AccountTarget,
        canister_id: &str,
        standard: &str,
    ) -> Result<RegisteredCollectible>;

    async fn collectible_info(
        &mut self,
        target: &AccountTarget,
        canister_id: &str,
        standard: &str,
    ) -> Result<RegisteredCollectible>;

    fn contacts(&mut self, target: &AccountTarget) -> Result<Vec<Contact>>;

    /// Returns `false` if a contact with the same name exists.
    fn add_contact(&mut self, target: &AccountTarget, contact: Contact) -> Result<bool>;

    fn delete_contact(&mut self, target: &AccountTarget, name: &str) -> Result<bool>;

    async fn icns_data(&mut self, target: &AccountTarget) -> Result<IcnsData>;

    async fn set_reverse_resolved_name(&mut self, target: &AccountTarget, name: &str) -> Result<String>;
}

#[async_trait]
impl AccountOperations for KeyRing {
    fn sign(&mut self, target: &AccountTarget, payload: &[u8]) -> Result<Vec<u8>> {
        self.dispatch_sync(target, |ctx| Ok(ctx.account.sign(payload)))
    }

    fn public_key(&mut self, target: &AccountTarget) -> Result<Vec<u8>> {
        self.dispatch_sync(target, |ctx| Ok(ctx.account.public_key()))
    }

    fn pem_file(&mut self, target: &AccountTarget) -> Result<Zeroizing<String>> {
        self.dispatch_sync(target, |ctx| ctx.account.pem_file())
    }

    fn edit_account(
        &mut self,
        target: &AccountTarget,
        name: Option<String>,
        icon: Option<String>,
    ) -> Result<AccountView> {
        self.dispatch_sync(target, |ctx| {
            ctx.account.edit(name, icon);
            Ok(ctx.account.view())
        })
    }

    async fn register_token(
        &mut self,
        target: &AccountTarget,
        canister_id: &str,
        standard: &str,
        logo: Option<String>,
    ) -> Result<TokenBalance> {
        let op = RegisterToken {
            canister_id: canister_id.to_owned(),
            standard: standard.to_owned(),
            logo,
        };
        self.dispatch(target, op).await
    }

    fn remove_token(&mut self, target: &AccountTarget, canister_id: &str) -> Result<Vec<StandardToken>> {
        self.dispatch_sync(target, |ctx| Ok(ctx.account.remove_token(ctx.network, canister_id)))
    }

    async fn token_info(
        &mut self,
        target: &AccountTarget,
        canister_id: &str,
        standard: &str,
    ) -> Result<TokenBalance> {
        let op = TokenInfo {
            canister_id: canister_id.to_owned(),
            standard: standard.to_owned(),
        };
        self.dispatch(target, op).await
    }

    async fn balances(&mut self, target: &AccountTarget) -> Result<Vec<TokenBalance>> {
        self.dispatch(target, Balances).await
    }

    async fn send(
        &mut self,
        target: &AccountTarget,
        to: &str,
        amount: u64,
        canister_id: &str,
    ) -> Result<SendReceipt> {
        let op = Transfer {
            to: to.to_owned(),
            amount,
            canister_id: canister_id.to_owned(),
        };
        self.dispatch(target, op).await
    }

    async fn register_collectible(
        &mut self,
        target: &AccountTarget,
        canister_id: &str,
        standard: &str,
    ) -> Result<RegisteredCollectible> {
        let op = RegisterCollectible {
            canister_id: canister_id.to_owned(),
            standard: standard.to_owned(),
        };
        self.dispatch(target, op).await
    }

    async fn collectible_info(
        &mut self,
        target: &AccountTarget,
        canister_id: &str,
        standard: &str,
    ) -> Result<RegisteredCollectible> {
        let op = CollectibleInfo {
            canister_id: canister_id.to_owned(),
            standard: standard.to_owned(),
        };
        self.dispatch(target, op).await
    }

    fn contacts(&mut self, target: &AccountTarget) -> Result<Vec<Contact>> {
        self.dispatch_sync(target, |ctx| Ok(ctx.account.contacts().to_vec()))
    }

    fn add_contact(&mut self, target: &AccountTarget, contact: Contact) -> Result<bool> {
        self.dispatch_sync(target, |ctx| ctx.account.add_contact(contact))
    }

    fn delete_contact(&mut self, target: &AccountTarget, name: &str) -> Result<bool> {
        self.dispatch_sync(target, |ctx| Ok(ctx.account.delete_contact(name)))
    }

    async fn icns_data(&mut self, target: &AccountTarget) -> Result<IcnsData> {
        self.dispatch(target, IcnsLookup).await
    }

    async fn set_reverse_resolved_name(&mut self, target: &AccountTarget, name: &str) -> Result<String> {
        let op = SetReverseName {
            name: name.to_owned(),
        };
        self.dispatch(target, op).await
    }
}
