//! Accounts of the icring keyring.
//!
//! An [`Account`] owns one signing identity plus the account-local
//! data the keyring keeps for it: display metadata, resolved names and
//! contacts. Everything that touches a network (token registration,
//! balances, transfers, name lookups) is an operation on the account
//! parameterised by the [`Network`](icring_network::Network) it runs on
//! and the [`CanisterAgent`](icring_network::CanisterAgent) it talks
//! through.
//!
//! - [`account`] — the in-memory account and its key-export record
//! - [`contact`] — the account's address book
//! - [`operations`] — network-bound per-account operations

pub mod account;
pub mod contact;
pub mod operations;

pub use account::{Account, AccountKind, AccountRecord, AccountView};
pub use contact::{Contact, ContactAddress};
