//! Integration tests for the storage backends.
//!
//! Both backends are driven through the same [`KeyringStorage`] checks.

use icring_storage::{KeyringStorage, MemoryStorage, SledStorage, StorageUpdate};
use icring_types::{IcringError, SchemaVersion};

// ---------------------------------------------------------------------------
// Shared checks
// ---------------------------------------------------------------------------

fn check_partial_updates(storage: &dyn KeyringStorage) -> std::result::Result<(), IcringError> {
    assert!(storage.get()?.is_none());

    storage.set(StorageUpdate {
        vault: Some("ciphertext".into()),
        is_initialized: Some(true),
        current_wallet_id: Some("wallet-0".into()),
        version: Some(SchemaVersion::new(0, 17, 0)),
        ..Default::default()
    })?;
    storage.set(StorageUpdate {
        is_unlocked: Some(true),
        ..Default::default()
    })?;

    let data = storage.get()?.ok_or(IcringError::NotInitialized)?;
    assert_eq!(data.vault.as_deref(), Some("ciphertext"));
    assert!(data.is_initialized);
    assert!(data.is_unlocked);
    assert_eq!(data.current_wallet_id.as_deref(), Some("wallet-0"));
    assert_eq!(data.version, Some(SchemaVersion::new(0, 17, 0)));
    assert!(data.network_module.is_none());
    Ok(())
}

fn check_network_module_is_exact(storage: &dyn KeyringStorage) -> std::result::Result<(), IcringError> {
    let module = serde_json::json!({
        "currentNetworkId": "mainnet",
        "counter": 18_446_744_073_709_551_615u64,
    });
    storage.set(StorageUpdate {
        network_module: Some(module.clone()),
        ..Default::default()
    })?;
    let data = storage.get()?.ok_or(IcringError::NotInitialized)?;
    assert_eq!(data.network_module, Some(module));
    Ok(())
}

fn check_clear(storage: &dyn KeyringStorage) -> std::result::Result<(), IcringError> {
    storage.set(StorageUpdate {
        is_initialized: Some(true),
        ..Default::default()
    })?;
    storage.clear()?;
    assert!(storage.get()?.is_none());
    Ok(())
}

// ---------------------------------------------------------------------------
// MemoryStorage
// ---------------------------------------------------------------------------

#[test]
fn memory_partial_updates() -> std::result::Result<(), IcringError> {
    check_partial_updates(&MemoryStorage::new())
}

#[test]
fn memory_network_module_is_exact() -> std::result::Result<(), IcringError> {
    check_network_module_is_exact(&MemoryStorage::new())
}

#[test]
fn memory_clear() -> std::result::Result<(), IcringError> {
    check_clear(&MemoryStorage::new())
}

// ---------------------------------------------------------------------------
// SledStorage
// ---------------------------------------------------------------------------

#[test]
fn sled_partial_updates() -> std::result::Result<(), IcringError> {
    check_partial_updates(&SledStorage::temporary()?)
}

#[test]
fn sled_network_module_is_exact() -> std::result::Result<(), IcringError> {
    check_network_module_is_exact(&SledStorage::temporary()?)
}

#[test]
fn sled_clear() -> std::result::Result<(), IcringError> {
    check_clear(&SledStorage::temporary()?)
}

#[test]
fn sled_survives_reopen() -> std::result::Result<(), IcringError> {
    let dir = std::env::temp_dir().join(format!(
        "icring-storage-test-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0),
    ));

    {
        let storage = SledStorage::open(&dir)?;
        storage.set(StorageUpdate {
            vault: Some("persisted".into()),
            is_initialized: Some(true),
            ..Default::default()
        })?;
        storage.flush()?;
    }

    let reopened = SledStorage::open(&dir)?;
    let data = reopened.get()?.ok_or(IcringError::NotInitialized)?;
    assert_eq!(data.vault.as_deref(), Some("persisted"));
    assert!(data.is_initialized);
    drop(reopened);

    let _ = std::fs::remove_dir_all(&dir);
    Ok(())
}
