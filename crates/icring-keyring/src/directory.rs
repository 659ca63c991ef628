//! The account directory: accounts by id, in creation order.
//!
//! The directory enforces the structural invariants of the account set:
//! the order-0 account is the seed-derived root, seed-derived accounts
//! are never deleted, and imported accounts never duplicate an existing
//! principal. Re-deriving a seed account at an index already in use is
//! allowed; only imports are checked for duplicates.

use std::collections::BTreeMap;

use icring_crypto::identity::Identity;
use icring_crypto::mnemonic::Mnemonic;
use icring_types::{IcringError, Principal, Result};
use icring_wallet::{Account, AccountKind, AccountRecord};

/// Accounts of an unlocked keyring.
#[derive(Default)]
pub struct AccountDirectory {
    accounts: BTreeMap<String, Account>,
}

impl AccountDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds every account from its vault record.
    ///
    /// # Errors
    ///
    /// Returns [`IcringError::MalformedKeyMaterial`] if any record holds
    /// an unusable key.
    pub fn from_records(records: BTreeMap<String, AccountRecord>) -> Result<Self> {
        let mut accounts = BTreeMap::new();
        for (key, record) in records {
            let account = Account::from_record(record)?;
            if account.id() != key {
                tracing::warn!(key = %key, account = %account.id(), "vault key differs from account id");
            }
            accounts.insert(account.id().to_owned(), account);
        }
        Ok(Self { accounts })
    }

    /// Returns the vault records of every account, keyed by id.
    pub fn to_records(&self) -> BTreeMap<String, AccountRecord> {
        self.accounts
            .iter()
            .map(|(id, account)| (id.clone(), account.to_record()))
            .collect()
    }

    // -- Queries ----------------------------------------------------------

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    pub fn contains(&self, account_id: &str) -> bool {
        self.accounts.contains_key(account_id)
    }

    pub fn get(&self, account_id: &str) -> Option<&Account> {
        self.accounts.get(account_id)
    }

    pub fn get_mut(&mut self, account_id: &str) -> Option<&mut Account> {
        self.accounts.get_mut(account_id)
    }

    /// Accounts sorted by creation order.
    pub fn ordered(&self) -> Vec<&Account> {
        let mut accounts: Vec<&Account> = self.accounts.values().collect();
        accounts.sort_by(|a, b| a.order().cmp(&b.order()).then_with(|| a.id().cmp(b.id())));
        accounts
    }

    /// The order-0 account.
    pub fn root(&self) -> Option<&Account> {
        self.accounts.values().find(|a| a.is_root())
    }

    /// The account at position `index` in creation order.
    ///
    /// # Errors
    ///
    /// Returns [`IcringError::IndexOutOfRange`] for a negative index or
    /// one past the last account.
    pub fn by_index(&self, index: i64) -> Result<&Account> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.ordered().get(i).copied())
            .ok_or(IcringError::IndexOutOfRange { index })
    }

    /// The account whose identity has `principal`, if any.
    pub fn find_by_principal(&self, principal: &Principal) -> Option<&Account> {
        self.accounts.values().find(|a| a.principal() == principal)
    }

    /// Order number for the next account: one past the highest in use.
    pub fn next_order(&self) -> u64 {
        self.accounts
            .values()
            .map(|a| a.order().saturating_add(1))
            .max()
            .unwrap_or(0)
    }

    // -- Mutations --------------------------------------------------------

    /// Inserts a seed-derived account without a duplicate check.
    pub fn insert_derived(&mut self, account: Account) {
        tracing::info!(
            account = %account.id(),
            order = account.order(),
            index = ?account.derivation_index(),
            "seed account added"
        );
        self.accounts.insert(account.id().to_owned(), account);
    }

    /// Inserts an imported account.
    ///
    /// # Errors
    ///
    /// Returns [`IcringError::DuplicateAccount`] if an account with the
    /// same principal exists; the directory is left unchanged.
    pub fn insert_imported(&mut self, account: Account) -> Result<()> {
        if self.find_by_principal(account.principal()).is_some() {
            return Err(IcringError::DuplicateAccount {
                principal: account.principal().to_text(),
            });
        }
        tracing::info!(account = %account.id(), kind = ?account.kind(), "account imported");
        self.accounts.insert(account.id().to_owned(), account);
        Ok(())
    }

    /// Removes an imported account and returns it.
    ///
    /// # Errors
    ///
    /// - [`IcringError::InvalidAccountReference`] if no account has `account_id`.
    /// - [`IcringError::CannotDeleteSeedAccount`] for seed-derived accounts,
    ///   the root included.
    pub fn remove_imported(&mut self, account_id: &str) -> Result<Account> {
        let account = self
            .accounts
            .get(account_id)
            .ok_or_else(|| IcringError::InvalidAccountReference {
                account_id: account_id.to_owned(),
            })?;
        if !account.kind().is_imported() || account.is_root() {
            return Err(IcringError::CannotDeleteSeedAccount {
                account_id: account_id.to_owned(),
            });
        }
        let removed = self
            .accounts
            .remove(account_id)
            .ok_or_else(|| IcringError::InvalidAccountReference {
                account_id: account_id.to_owned(),
            })?;
        tracing::info!(account = %account_id, "account deleted");
        Ok(removed)
    }
}

/// Derives the seed account at `index`.
///
/// # Errors
///
/// - [`IcringError::IndexOutOfRange`] if `index` exceeds the derivation range.
/// - [`IcringError::CryptoError`] if derivation fails.
pub fn derive_seed_account(
    mnemonic: &Mnemonic,
    index: u64,
    id: String,
    name: String,
    order: u64,
) -> Result<Account> {
    let child = u32::try_from(index).map_err(|_| IcringError::IndexOutOfRange {
        index: i64::try_from(index).unwrap_or(i64::MAX),
    })?;
    let identity = Identity::from_mnemonic(mnemonic, child)?;
    Ok(Account::new(id, name, order, AccountKind::SeedDerived, identity).with_derivation_index(index))
}
