//! End-to-end tests of the keyring facade over in-memory storage.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use icring_crypto::cipher::{Cipher, PasswordCipher};
use icring_crypto::identity::{Curve, Identity};
use icring_crypto::key_file::identity_to_pem;
use icring_network::{
    AgentContext, CanisterAgent, CollectibleCollection, FungibleMetadata, IcnsData, NetworkParams,
    SendReceipt, StandardToken, TokenMetadata,
};
use icring_storage::{KeyringStorage, MemoryStorage, StorageUpdate};
use icring_types::config::KeyringConfig;
use icring_types::{IcringError, Principal, SchemaVersion};
use icring_keyring::{
    AccountOperations, AccountTarget, KeyRing, PemErrorKind, CURRENT_VERSION,
};
use icring_wallet::{AccountKind, Contact, ContactAddress};
use serde_json::json;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const PHRASE: &str = "abandon abandon abandon abandon abandon abandon \
                      abandon abandon abandon abandon abandon about";
const PASSWORD: &str = "p@ss";

type TestResult = std::result::Result<(), IcringError>;

fn config() -> KeyringConfig {
    KeyringConfig {
        kdf_memory_kib: 256,
        kdf_iterations: 1,
        kdf_parallelism: 1,
        ..Default::default()
    }
}

fn canister(n: u8) -> String {
    Principal::from_slice(&[0, 0, 0, 0, 0, 0x10, 0, n, 1, 1])
        .map(|p| p.to_text())
        .unwrap_or_default()
}

/// Answers every fungible canister with the same metadata and balance.
#[derive(Default)]
struct StubAgent {
    balances: HashMap<String, String>,
    balance_fails: bool,
}

#[async_trait]
impl CanisterAgent for StubAgent {
    async fn resolve_fungible(
        &self,
        _ctx: AgentContext<'_>,
        _canister_id: &str,
        _standard: &str,
    ) -> icring_types::Result<TokenMetadata> {
        Ok(TokenMetadata::Fungible(FungibleMetadata {
            name: "Test token".into(),
            symbol: "TT".into(),
            decimals: 8,
            fee: None,
        }))
    }

    async fn resolve_collectible(
        &self,
        _ctx: AgentContext<'_>,
        canister_id: &str,
        standard: &str,
    ) -> icring_types::Result<CollectibleCollection> {
        Ok(CollectibleCollection {
            name: "Punks".into(),
            canister_id: canister_id.to_owned(),
            standard: standard.to_owned(),
            description: None,
            icon: None,
        })
    }

    async fn get_balance(
        &self,
        _ctx: AgentContext<'_>,
        token: &StandardToken,
    ) -> icring_types::Result<String> {
        if self.balance_fails {
            return Err(IcringError::AgentError {
                reason: "replica unreachable".into(),
            });
        }
        Ok(self
            .balances
            .get(&token.canister_id)
            .cloned()
            .unwrap_or_else(|| "0".into()))
    }

    async fn send(
        &self,
        _ctx: AgentContext<'_>,
        _token: &StandardToken,
        _to: &str,
        _amount: u64,
    ) -> icring_types::Result<SendReceipt> {
        Ok(SendReceipt::Height(7))
    }

    async fn resolve_names(&self, _ctx: AgentContext<'_>) -> icring_types::Result<IcnsData> {
        Ok(IcnsData {
            names: vec!["alice.icp".into()],
            reverse_resolved_name: Some("alice.icp".into()),
        })
    }

    async fn set_reverse_resolved_name(
        &self,
        _ctx: AgentContext<'_>,
        name: &str,
    ) -> icring_types::Result<String> {
        Ok(name.to_owned())
    }
}

fn open(storage: &Arc<MemoryStorage>) -> std::result::Result<KeyRing, IcringError> {
    KeyRing::open(config(), storage.clone(), Arc::new(StubAgent::default()))
}

fn seeded() -> std::result::Result<(Arc<MemoryStorage>, KeyRing), IcringError> {
    let storage = Arc::new(MemoryStorage::new());
    let mut keyring = open(&storage)?;
    keyring.import_mnemonic(PHRASE, PASSWORD, None, None)?;
    Ok((storage, keyring))
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[test]
fn fresh_keyring_is_uninitialized() -> TestResult {
    let storage = Arc::new(MemoryStorage::new());
    let mut keyring = open(&storage)?;
    assert!(!keyring.is_initialized());
    assert!(!keyring.unlock(PASSWORD)?);
    assert!(matches!(keyring.lock(), Err(IcringError::NotInitialized)));
    assert!(matches!(keyring.get_state(), Err(IcringError::NotInitialized)));
    assert!(matches!(
        keyring.import_mnemonic(PHRASE, "", None, None),
        Err(IcringError::PasswordRequired)
    ));
    Ok(())
}

#[test]
fn create_returns_a_usable_phrase() -> TestResult {
    let storage = Arc::new(MemoryStorage::new());
    let mut keyring = open(&storage)?;
    let (phrase, root) = keyring.create(PASSWORD, None, None)?;
    assert_eq!(phrase.split_whitespace().count(), 12);
    assert_eq!(root.name, "Account 1");
    assert_eq!(root.order_number, 0);
    assert_eq!(keyring.get_mnemonic(PASSWORD)?.as_str(), phrase.as_str());
    Ok(())
}

#[test]
fn lock_then_unlock() -> TestResult {
    let (_storage, mut keyring) = seeded()?;
    assert!(keyring.is_unlocked());

    keyring.lock()?;
    assert!(keyring.is_initialized());
    assert!(matches!(keyring.get_state(), Err(IcringError::StateLocked)));

    assert!(!keyring.unlock("wrong")?);
    assert!(!keyring.is_unlocked());

    assert!(keyring.unlock(PASSWORD)?);
    assert_eq!(keyring.get_state()?.wallets.len(), 1);
    Ok(())
}

#[test]
fn check_password_needs_no_unlock() -> TestResult {
    let (_storage, mut keyring) = seeded()?;
    keyring.lock()?;
    assert!(keyring.check_password(PASSWORD)?);
    assert!(!keyring.check_password("nope")?);
    assert!(!keyring.is_unlocked());
    Ok(())
}

#[test]
fn reopening_the_storage_restores_accounts() -> TestResult {
    let (storage, mut keyring) = seeded()?;
    let second = keyring.derive_next_account(Some("Savings".into()), None)?;
    keyring.set_current_account(&second.wallet_id)?;
    let before = keyring.get_state()?;
    drop(keyring);

    let mut reopened = open(&storage)?;
    assert!(reopened.is_initialized());
    assert!(!reopened.is_unlocked());
    assert!(reopened.unlock(PASSWORD)?);
    assert_eq!(reopened.get_state()?, before);
    assert_eq!(reopened.current_account_id()?, second.wallet_id);
    Ok(())
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

#[test]
fn seed_accounts_are_deterministic() -> TestResult {
    let (_storage, mut keyring) = seeded()?;
    let second = keyring.derive_next_account(None, None)?;
    let third = keyring.derive_next_account(None, Some("🐢".into()))?;

    let state = keyring.get_state()?;
    let orders: Vec<u64> = state.wallets.iter().map(|w| w.order_number).collect();
    assert_eq!(orders, vec![0, 1, 2]);
    assert_eq!(state.mnemonic_wallet_count, 3);
    assert_eq!(second.name, "Account 2");
    assert_eq!(third.icon.as_deref(), Some("🐢"));
    assert_ne!(state.wallets[0].principal, second.principal);
    assert_ne!(second.principal, third.principal);

    // Same phrase, same principals.
    let (_other_storage, mut other) = seeded()?;
    let again = other.derive_next_account(None, None)?;
    assert_eq!(again.principal, second.principal);
    assert_eq!(other.get_state()?.wallets[0].principal, state.wallets[0].principal);
    Ok(())
}

#[test]
fn index_lookup_follows_creation_order() -> TestResult {
    let (_storage, mut keyring) = seeded()?;
    let second = keyring.derive_next_account(None, None)?;
    assert_eq!(keyring.account_id_from_index(1)?, second.wallet_id);
    assert!(matches!(
        keyring.account_id_from_index(2),
        Err(IcringError::IndexOutOfRange { index: 2 })
    ));
    assert!(matches!(
        keyring.account_id_from_index(-1),
        Err(IcringError::IndexOutOfRange { .. })
    ));
    Ok(())
}

#[test]
fn imports_and_deletion_rules() -> TestResult {
    let (_storage, mut keyring) = seeded()?;
    let root_id = keyring.current_account_id()?;
    let secret = hex::encode([7u8; 32]);

    let imported = keyring.import_from_secret_key(&secret, Some("Cold".into()), None)?;
    assert_eq!(imported.kind, AccountKind::ImportedFromKey);
    assert_eq!(imported.order_number, 1);
    assert!(matches!(
        keyring.import_from_secret_key(&secret, None, None),
        Err(IcringError::DuplicateAccount { .. })
    ));

    assert!(matches!(
        keyring.delete_imported_account(&root_id),
        Err(IcringError::CannotDeleteSeedAccount { .. })
    ));

    keyring.set_current_account(&imported.wallet_id)?;
    keyring.delete_imported_account(&imported.wallet_id)?;
    assert_eq!(keyring.current_account_id()?, root_id);
    assert_eq!(keyring.get_state()?.wallets.len(), 1);
    assert!(matches!(
        keyring.set_current_account(&imported.wallet_id),
        Err(IcringError::InvalidAccountReference { .. })
    ));
    Ok(())
}

#[test]
fn pem_files_are_validated_and_imported() -> TestResult {
    let (_storage, mut keyring) = seeded()?;
    let identity = Identity::generate(Curve::Ed25519)?;
    let pem = identity_to_pem(&identity)?;

    let answer = keyring.validate_pem(&pem)?;
    assert!(answer.valid);
    assert_eq!(keyring.principal_from_pem(&pem)?, identity.principal().to_text());

    let view = keyring.import_from_pem(&pem, None, None)?;
    assert_eq!(view.kind, AccountKind::ImportedFromFile);
    assert_eq!(view.principal, identity.principal().to_text());

    let again = keyring.validate_pem(&pem)?;
    assert_eq!(again.error_kind, Some(PemErrorKind::AlreadyRegistered));
    let garbage = keyring.validate_pem("not a key file")?;
    assert_eq!(garbage.error_kind, Some(PemErrorKind::MalformedKeyMaterial));

    keyring.lock()?;
    assert!(matches!(keyring.validate_pem(&pem), Err(IcringError::StateLocked)));
    Ok(())
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

#[tokio::test]
async fn tokens_are_shared_across_accounts() -> TestResult {
    let (storage, mut keyring) = seeded()?;
    let second = keyring.derive_next_account(None, None)?;
    let t1 = canister(1);
    let first = AccountTarget::Root;
    let other = AccountTarget::Id(second.wallet_id.clone());

    let balance = keyring.register_token(&first, &t1, "DIP20", None).await?;
    assert_eq!(balance.token.canister_id, t1);
    keyring.register_token(&other, &t1, "DIP20", None).await?;

    let network = keyring.network_module().current_network();
    assert_eq!(network.registered_tokens().len(), 1);
    assert_eq!(network.registered_tokens()[0].registered_by.len(), 2);

    let persisted = storage.get()?.and_then(|d| d.network_module).unwrap_or_default();
    let owners = &persisted["networks"]["mainnet"]["registeredTokens"][0]["registeredBy"];
    assert_eq!(owners.as_array().map(Vec::len), Some(2));

    let remaining = keyring.remove_token(&first, &t1)?;
    assert!(remaining.is_empty());
    let balances = keyring.balances(&other).await?;
    assert!(balances.iter().all(|b| b.token.canister_id != t1));
    Ok(())
}

#[tokio::test]
async fn failed_registration_leaves_no_entry_behind() -> TestResult {
    let storage = Arc::new(MemoryStorage::new());
    let agent = StubAgent {
        balance_fails: true,
        ..Default::default()
    };
    let mut keyring = KeyRing::open(config(), storage.clone(), Arc::new(agent))?;
    keyring.import_mnemonic(PHRASE, PASSWORD, None, None)?;
    let root = keyring.account_id_from_index(0)?;
    let t1 = canister(1);

    assert!(matches!(
        keyring.register_token(&AccountTarget::Root, &t1, "DIP20", None).await,
        Err(IcringError::AgentError { .. })
    ));
    let network = keyring.network_module().current_network();
    assert!(network.registered_tokens().is_empty());
    assert!(network.tokens_for(&root).iter().all(|t| t.canister_id != t1));

    // A later successful operation must not persist the failed entry.
    keyring.sign(&AccountTarget::Root, b"payload")?;
    let persisted = storage.get()?.and_then(|d| d.network_module).unwrap_or_default();
    let registered = &persisted["networks"]["mainnet"]["registeredTokens"];
    assert!(registered.as_array().map_or(true, Vec::is_empty));
    Ok(())
}

#[tokio::test]
async fn account_operations_need_an_unlocked_keyring() -> TestResult {
    let (_storage, mut keyring) = seeded()?;
    assert!(matches!(
        keyring.balances(&AccountTarget::Id("missing".into())).await,
        Err(IcringError::InvalidAccountReference { .. })
    ));
    keyring.lock()?;
    assert!(matches!(
        keyring.balances(&AccountTarget::Current).await,
        Err(IcringError::StateLocked)
    ));
    assert!(matches!(
        keyring.sign(&AccountTarget::Current, b"payload"),
        Err(IcringError::StateLocked)
    ));
    Ok(())
}

#[tokio::test]
async fn names_and_contacts_persist() -> TestResult {
    let (storage, mut keyring) = seeded()?;
    let target = AccountTarget::Current;

    let names = keyring.icns_data(&target).await?;
    assert_eq!(names.names, vec!["alice.icp".to_owned()]);
    let contact = Contact {
        name: "Bob".into(),
        value: ContactAddress::Icns("bob.icp".into()),
        description: None,
        emoji: None,
    };
    assert!(keyring.add_contact(&target, contact.clone())?);
    assert!(!keyring.add_contact(&target, contact)?);
    let edited = keyring.edit_account(&target, Some("Main".into()), None)?;
    assert_eq!(edited.name, "Main");
    drop(keyring);

    let mut reopened = open(&storage)?;
    assert!(reopened.unlock(PASSWORD)?);
    assert_eq!(reopened.contacts(&target)?.len(), 1);
    assert!(reopened.delete_contact(&target, "Bob")?);
    assert!(reopened.contacts(&target)?.is_empty());
    assert_eq!(reopened.get_state()?.wallets[0].name, "Main");
    Ok(())
}

#[tokio::test]
async fn send_reaches_the_agent() -> TestResult {
    let (_storage, mut keyring) = seeded()?;
    let to = canister(9);
    let receipt = keyring
        .send(&AccountTarget::Current, &to, 5, icring_network::defaults::ICP_LEDGER_CANISTER_ID)
        .await?;
    assert_eq!(receipt, SendReceipt::Height(7));
    Ok(())
}

#[test]
fn signatures_verify_against_the_account_key() -> TestResult {
    let (_storage, mut keyring) = seeded()?;
    let target = AccountTarget::Current;
    let signature = keyring.sign(&target, b"hello")?;
    let public_key = keyring.public_key(&target)?;
    assert!(!signature.is_empty());
    assert!(!public_key.is_empty());
    assert!(keyring.pem_file(&target)?.contains("PRIVATE KEY"));
    Ok(())
}

// ---------------------------------------------------------------------------
// Networks
// ---------------------------------------------------------------------------

#[test]
fn custom_networks_persist() -> TestResult {
    let (storage, mut keyring) = seeded()?;
    let id = keyring.add_network(NetworkParams {
        name: "Local".into(),
        host: "http://127.0.0.1:4943".into(),
        ledger_canister_id: None,
    })?;
    keyring.set_current_network(&id)?;
    assert!(matches!(
        keyring.remove_network("mainnet"),
        Err(IcringError::NetworkImmutable { .. })
    ));
    assert_eq!(keyring.get_state()?.current_network_id, id);

    let reopened = open(&storage)?;
    assert_eq!(reopened.network_module().current_network_id(), id);
    Ok(())
}

// ---------------------------------------------------------------------------
// Migration
// ---------------------------------------------------------------------------

/// Seals a vault in the 0.14 layout and stores it.
fn legacy_storage(version: Option<SchemaVersion>) -> std::result::Result<Arc<MemoryStorage>, IcringError> {
    let identity = Identity::from_secp256k1_secret(&[9u8; 32])?;
    legacy_storage_with(version, &identity, serde_json::to_value(identity.descriptor())?)
}

fn legacy_storage_with(
    version: Option<SchemaVersion>,
    identity: &Identity,
    key_pair: serde_json::Value,
) -> std::result::Result<Arc<MemoryStorage>, IcringError> {
    let t1 = canister(1);
    let legacy = json!({
        "wallets": [{
            "walletId": "w-0",
            "name": "Main",
            "orderNumber": 0,
            "walletNumber": 0,
            "principal": identity.principal().to_text(),
            "keyPair": key_pair,
            "registeredTokens": [{
                "canisterId": t1,
                "name": "Test token",
                "symbol": "TT",
                "standard": "dip20",
                "decimals": 6,
            }],
            "assets": [{ "canisterId": t1, "symbol": "TT", "name": "Test token", "amount": "12" }],
        }],
        "mnemonic": PHRASE,
        "mnemonicWalletCount": 9_007_199_254_740_993u64,
        "password": PASSWORD,
        "currentWalletId": "w-0",
    });

    let cipher = PasswordCipher::from_config(&config());
    let blob = cipher.encrypt(&legacy.to_string(), PASSWORD)?;
    let storage = Arc::new(MemoryStorage::new());
    storage.set(StorageUpdate {
        vault: Some(blob),
        is_initialized: Some(true),
        is_unlocked: Some(true),
        current_wallet_id: Some("w-0".into()),
        version,
        ..Default::default()
    })?;
    Ok(storage)
}

#[test]
fn string_encoded_key_pair_is_refused() -> TestResult {
    let identity = Identity::from_secp256k1_secret(&[9u8; 32])?;
    let encoded = serde_json::to_string(&identity.descriptor())?;
    let storage = legacy_storage_with(
        Some(SchemaVersion::new(0, 14, 0)),
        &identity,
        serde_json::Value::String(encoded),
    )?;
    let mut keyring = open(&storage)?;
    assert!(matches!(
        keyring.unlock(PASSWORD),
        Err(IcringError::SerializationError { .. })
    ));
    assert!(!keyring.is_unlocked());
    Ok(())
}

#[test]
fn legacy_vault_is_migrated_on_unlock() -> TestResult {
    let storage = legacy_storage(Some(SchemaVersion::new(0, 14, 0)))?;
    let mut keyring = open(&storage)?;
    assert!(!keyring.is_unlocked());
    assert!(keyring.unlock(PASSWORD)?);

    let state = keyring.get_state()?;
    assert_eq!(state.wallets.len(), 1);
    assert_eq!(state.wallets[0].kind, AccountKind::SeedDerived);
    assert_eq!(state.mnemonic_wallet_count, 9_007_199_254_740_993);

    let network = keyring.network_module().current_network();
    let token = network
        .token_by_canister_id(&canister(1))
        .ok_or(IcringError::TokenNotRegistered {
            canister_id: canister(1),
        })?;
    assert_eq!(token.standard, "DIP20");
    assert_eq!(token.decimals, 6);
    assert!(network.tokens_for("w-0").iter().any(|t| t.canister_id == canister(1)));

    let data = storage.get()?.unwrap_or_default();
    assert_eq!(data.version, Some(CURRENT_VERSION));

    // Second unlock reads the migrated vault as is.
    keyring.lock()?;
    let mut reopened = open(&storage)?;
    assert!(reopened.unlock(PASSWORD)?);
    assert_eq!(reopened.get_state()?, state);
    Ok(())
}

#[test]
fn unversioned_vault_runs_the_whole_chain() -> TestResult {
    let storage = legacy_storage(None)?;
    let mut keyring = open(&storage)?;
    assert!(keyring.unlock(PASSWORD)?);
    assert_eq!(keyring.get_mnemonic(PASSWORD)?.as_str(), PHRASE);
    Ok(())
}

#[test]
fn newer_schema_is_refused() -> TestResult {
    let storage = legacy_storage(Some(SchemaVersion::new(9, 0, 0)))?;
    let mut keyring = open(&storage)?;
    assert!(matches!(
        keyring.unlock(PASSWORD),
        Err(IcringError::MigrationError { .. })
    ));
    assert!(!keyring.is_unlocked());
    Ok(())
}
