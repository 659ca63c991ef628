//! Storage collaborator for the icring keyring.
//!
//! The keyring persists a handful of fields: the encrypted vault blob,
//! the initialized and unlocked flags, the current account id, the
//! schema version and the (unencrypted) network module. Backends
//! implement [`KeyringStorage`]; two are provided:
//!
//! - [`MemoryStorage`] — mutex-guarded, for tests and embedding
//! - [`SledStorage`] — one sled tree, one key per field

pub mod engine;
pub mod memory;
pub mod storage;

pub use engine::SledStorage;
pub use memory::MemoryStorage;
pub use storage::{KeyringStorage, StorageData, StorageUpdate};
