//! The icring keyring.
//!
//! [`KeyRing`] ties the lower crates together: seed-derived and
//! imported accounts held in an [`AccountDirectory`], sealed into one
//! password-encrypted [`Vault`], migrated forward from older schemas on
//! unlock, and operated on per account through [`AccountOperations`].
//!
//! - [`directory`] — account set and its structural rules
//! - [`vault`] — encrypted persistence of the decrypted payload
//! - [`migration`] — ordered schema migrations of the vault
//! - [`state`] — lifecycle state and public snapshots
//! - [`keyring`] — the facade
//! - [`dispatch`] — routing of per-account operations
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use icring_keyring::{AccountOperations, AccountTarget, KeyRing};
//! # use icring_storage::MemoryStorage;
//! # async fn demo(agent: Arc<dyn icring_network::CanisterAgent>) -> icring_types::Result<()> {
//! let storage = Arc::new(MemoryStorage::new());
//! let mut keyring = KeyRing::open(Default::default(), storage, agent)?;
//! let (_phrase, root) = keyring.create("correct horse", None, None)?;
//! let balances = keyring.balances(&AccountTarget::Id(root.wallet_id)).await?;
//! # let _ = balances;
//! # Ok(())
//! # }
//! ```

pub mod directory;
pub mod dispatch;
pub mod keyring;
pub mod migration;
pub mod state;
pub mod vault;

pub use directory::AccountDirectory;
pub use dispatch::{AccountContext, AccountOperation, AccountOperations, AccountTarget};
pub use keyring::KeyRing;
pub use migration::CURRENT_VERSION;
pub use state::{KeyRingSnapshot, KeyRingState, PemErrorKind, PemValidation, UnlockedKeyRing};
pub use vault::{Vault, VaultPayload};
