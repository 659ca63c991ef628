//! The keyring facade.
//!
//! A [`KeyRing`] owns its lifecycle state, the network module, and the
//! collaborators it persists and resolves through: a storage medium
//! wrapped in the encrypted [`Vault`], and a [`CanisterAgent`].
//!
//! Every mutating operation ends by rewriting the whole vault; there
//! is no deferred persistence. A keyring instance expects one mutating
//! call at a time (all mutators take `&mut self`).

use std::sync::Arc;

use icring_crypto::cipher::{Cipher, PasswordCipher};
use icring_crypto::identity::Identity;
use icring_crypto::key_file::identity_from_pem;
use icring_crypto::mnemonic::{generate_mnemonic, Mnemonic};
use icring_network::{CanisterAgent, EditNetworkParams, NetworkModule, NetworkParams, NetworkRecord};
use icring_storage::{KeyringStorage, StorageUpdate};
use icring_types::config::KeyringConfig;
use icring_types::{IcringError, Result};
use icring_wallet::{Account, AccountKind, AccountView};
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::directory::{derive_seed_account, AccountDirectory};
use crate::migration::{self, MigrationContext, CURRENT_VERSION, NETWORK_MODULE_KEY};
use crate::state::{
    KeyRingSnapshot, KeyRingState, PemErrorKind, PemValidation, UnlockedKeyRing,
};
use crate::vault::{Vault, VaultPayload};

// ---------------------------------------------------------------------------
// KeyRing
// ---------------------------------------------------------------------------

/// Multi-account keyring.
pub struct KeyRing {
    pub(crate) config: KeyringConfig,
    pub(crate) vault: Vault,
    pub(crate) agent: Arc<dyn CanisterAgent>,
    pub(crate) state: KeyRingState,
    pub(crate) network_module: NetworkModule,
}

impl KeyRing {
    /// Creates a keyring with the default password cipher.
    ///
    /// The keyring starts uninitialized; call [`init`](Self::init) to
    /// pick up persisted state, or use [`open`](Self::open).
    ///
    /// # Errors
    ///
    /// Returns [`IcringError::ConfigError`] if `config` is invalid.
    pub fn new(
        config: KeyringConfig,
        storage: Arc<dyn KeyringStorage>,
        agent: Arc<dyn CanisterAgent>,
    ) -> Result<Self> {
        let cipher = Arc::new(PasswordCipher::from_config(&config));
        Self::with_cipher(config, storage, cipher, agent)
    }

    /// Creates a keyring with an explicit cipher.
    ///
    /// # Errors
    ///
    /// Returns [`IcringError::ConfigError`] if `config` is invalid.
    pub fn with_cipher(
        config: KeyringConfig,
        storage: Arc<dyn KeyringStorage>,
        cipher: Arc<dyn Cipher>,
        agent: Arc<dyn CanisterAgent>,
    ) -> Result<Self> {
        config.validate()?;
        let network_module = NetworkModule::new(&config.mainnet_host);
        Ok(Self {
            config,
            vault: Vault::new(storage, cipher),
            agent,
            state: KeyRingState::Uninitialized,
            network_module,
        })
    }

    /// [`new`](Self::new) followed by [`init`](Self::init).
    pub fn open(
        config: KeyringConfig,
        storage: Arc<dyn KeyringStorage>,
        agent: Arc<dyn CanisterAgent>,
    ) -> Result<Self> {
        let mut keyring = Self::new(config, storage, agent)?;
        keyring.init()?;
        Ok(keyring)
    }

    /// Loads the persisted flags and network module.
    ///
    /// An initialized keyring comes up locked, whatever unlocked flag
    /// was persisted: no secret survives a restart.
    pub fn init(&mut self) -> Result<()> {
        let data = self.vault.load()?;
        self.network_module = match data.network_module {
            Some(value) if data.version == Some(CURRENT_VERSION) => {
                NetworkModule::from_value(value, &self.config.mainnet_host)?
            }
            _ => NetworkModule::new(&self.config.mainnet_host),
        };
        self.state = if data.is_initialized {
            KeyRingState::Locked
        } else {
            KeyRingState::Uninitialized
        };
        tracing::debug!(initialized = data.is_initialized, "keyring loaded");
        Ok(())
    }

    // -- Flags ------------------------------------------------------------

    pub fn is_initialized(&self) -> bool {
        self.state.is_initialized()
    }

    pub fn is_unlocked(&self) -> bool {
        self.state.is_unlocked()
    }

    pub fn state(&self) -> &KeyRingState {
        &self.state
    }

    pub fn config(&self) -> &KeyringConfig {
        &self.config
    }

    // -- Creation ---------------------------------------------------------

    /// Initializes the keyring with a fresh seed phrase and returns it
    /// with the root account.
    ///
    /// # Errors
    ///
    /// Any error of [`create_root_account`](Self::create_root_account).
    pub fn create(
        &mut self,
        password: &str,
        name: Option<String>,
        icon: Option<String>,
    ) -> Result<(Zeroizing<String>, AccountView)> {
        if password.is_empty() {
            return Err(IcringError::PasswordRequired);
        }
        let mnemonic = generate_mnemonic(self.config.mnemonic_word_count)?;
        let root = self.create_root_account(&mnemonic, password, name, icon)?;
        Ok((Zeroizing::new(mnemonic.as_str().to_owned()), root))
    }

    /// Initializes the keyring from an existing seed phrase.
    ///
    /// # Errors
    ///
    /// - [`IcringError::CryptoError`] for an invalid phrase.
    /// - Any error of [`create_root_account`](Self::create_root_account).
    pub fn import_mnemonic(
        &mut self,
        phrase: &str,
        password: &str,
        name: Option<String>,
        icon: Option<String>,
    ) -> Result<AccountView> {
        if password.is_empty() {
            return Err(IcringError::PasswordRequired);
        }
        let mnemonic = Mnemonic::parse(phrase)?;
        self.create_root_account(&mnemonic, password, name, icon)
    }

    /// Wipes the storage and initializes the keyring with the root
    /// account (index 0, order 0) of `mnemonic`, leaving it unlocked.
    ///
    /// # Errors
    ///
    /// - [`IcringError::PasswordRequired`] for an empty password.
    /// - Crypto or storage errors; the keyring is then uninitialized.
    pub fn create_root_account(
        &mut self,
        mnemonic: &Mnemonic,
        password: &str,
        name: Option<String>,
        icon: Option<String>,
    ) -> Result<AccountView> {
        if password.is_empty() {
            return Err(IcringError::PasswordRequired);
        }
        let id = Uuid::new_v4().to_string();
        let name = non_blank(name).unwrap_or_else(|| self.config.default_account_name.clone());
        let root = derive_seed_account(mnemonic, 0, id.clone(), name, 0)?.with_icon(icon);
        let view = root.view();
        let mut accounts = AccountDirectory::new();
        accounts.insert_derived(root);

        let unlocked = UnlockedKeyRing {
            password: Zeroizing::new(password.to_owned()),
            accounts,
            mnemonic_account_count: 1,
            current_account_id: id.clone(),
        };
        let network_module = NetworkModule::new(&self.config.mainnet_host);

        self.state = KeyRingState::Uninitialized;
        self.vault.clear()?;
        self.vault.save(
            &vault_payload(&unlocked, mnemonic.as_str()),
            password,
            StorageUpdate {
                is_initialized: Some(true),
                is_unlocked: Some(true),
                current_wallet_id: Some(id),
                version: Some(CURRENT_VERSION),
                network_module: Some(network_module.to_value()?),
                ..Default::default()
            },
        )?;

        self.network_module = network_module;
        self.state = KeyRingState::Unlocked(Box::new(unlocked));
        tracing::info!(account = %view.wallet_id, "keyring initialized");
        Ok(view)
    }

    // -- Lock / unlock ----------------------------------------------------

    /// Opens the vault with `password`.
    ///
    /// Returns `Ok(false)` when the keyring is not set up, the password
    /// does not decrypt the vault, or it differs from the stored one.
    /// Older vaults are migrated, then saved again under the same
    /// password.
    ///
    /// # Errors
    ///
    /// - [`IcringError::MigrationError`] if the vault cannot be migrated;
    ///   nothing is loaded.
    /// - Serialization, key or storage errors of a decrypted vault.
    pub fn unlock(&mut self, password: &str) -> Result<bool> {
        let data = self.vault.load()?;
        let blob = match (&data.vault, data.is_initialized) {
            (Some(blob), true) => blob,
            _ => return Ok(false),
        };

        let mut value = match self.vault.decrypt(blob, password) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, "unlock failed");
                self.state = KeyRingState::Locked;
                self.vault.set(StorageUpdate {
                    is_unlocked: Some(false),
                    ..Default::default()
                })?;
                return Ok(false);
            }
        };

        let migrated = data.version != Some(CURRENT_VERSION);
        let mut module_value = data.network_module.clone();
        if migrated {
            if let (Some(root), Some(stored)) = (value.as_object_mut(), module_value.take()) {
                root.entry(NETWORK_MODULE_KEY).or_insert(stored);
            }
            migration::migrate(
                &mut value,
                data.version,
                CURRENT_VERSION,
                &MigrationContext {
                    mainnet_host: &self.config.mainnet_host,
                },
            )?;
            module_value = value
                .as_object_mut()
                .and_then(|root| root.remove(NETWORK_MODULE_KEY));
        }

        let mut payload: VaultPayload = serde_json::from_value(value)?;
        let accounts = AccountDirectory::from_records(std::mem::take(&mut payload.wallets))?;
        let network_module = match module_value {
            Some(value) => NetworkModule::from_value(value, &self.config.mainnet_host)?,
            None => NetworkModule::new(&self.config.mainnet_host),
        };

        if payload.password != password {
            tracing::warn!("unlock failed: stored password mismatch");
            self.state = KeyRingState::Locked;
            self.vault.set(StorageUpdate {
                is_unlocked: Some(false),
                ..Default::default()
            })?;
            return Ok(false);
        }

        let current_account_id = [payload.current_wallet_id.take(), data.current_wallet_id.clone()]
            .into_iter()
            .flatten()
            .find(|id| accounts.contains(id))
            .or_else(|| accounts.root().map(|a| a.id().to_owned()))
            .ok_or_else(|| IcringError::InvalidAccountReference {
                account_id: "root".into(),
            })?;

        self.network_module = network_module;
        self.state = KeyRingState::Unlocked(Box::new(UnlockedKeyRing {
            password: Zeroizing::new(password.to_owned()),
            accounts,
            mnemonic_account_count: payload.mnemonic_wallet_count,
            current_account_id: current_account_id.clone(),
        }));

        if migrated {
            self.save_vault(Some(payload.mnemonic.as_str()))?;
            self.vault.set(StorageUpdate {
                version: Some(CURRENT_VERSION),
                current_wallet_id: Some(current_account_id),
                network_module: Some(self.network_module.to_value()?),
                ..Default::default()
            })?;
            tracing::info!(
                from = %data.version.unwrap_or_default(),
                to = %CURRENT_VERSION,
                "vault migrated"
            );
        }
        self.vault.set(StorageUpdate {
            is_unlocked: Some(true),
            ..Default::default()
        })?;
        self.network_module.change_hook().take();
        tracing::info!("keyring unlocked");
        Ok(true)
    }

    /// Drops every secret from memory and marks the keyring locked.
    ///
    /// # Errors
    ///
    /// - [`IcringError::NotInitialized`] if the keyring was never set up.
    /// - Storage errors.
    pub fn lock(&mut self) -> Result<()> {
        if !self.state.is_initialized() {
            return Err(IcringError::NotInitialized);
        }
        self.state = KeyRingState::Locked;
        self.vault.set(StorageUpdate {
            is_unlocked: Some(false),
            ..Default::default()
        })?;
        tracing::info!("keyring locked");
        Ok(())
    }

    /// Returns `true` if `password` opens the vault.
    ///
    /// # Errors
    ///
    /// - [`IcringError::NotInitialized`] if the keyring was never set up.
    /// - Storage errors.
    pub fn check_password(&self, password: &str) -> Result<bool> {
        if !self.state.is_initialized() {
            return Err(IcringError::NotInitialized);
        }
        let data = self.vault.load()?;
        let Some(blob) = data.vault.as_deref().filter(|_| data.is_initialized) else {
            return Ok(false);
        };
        Ok(match self.vault.decrypt(blob, password) {
            Ok(value) => value.get("password").and_then(|p| p.as_str()) == Some(password),
            Err(_) => false,
        })
    }

    /// Returns the seed phrase.
    ///
    /// # Errors
    ///
    /// - [`IcringError::NotInitialized`] / [`IcringError::StateLocked`].
    /// - [`IcringError::CryptoError`] if `password` does not open the vault.
    pub fn get_mnemonic(&self, password: &str) -> Result<Zeroizing<String>> {
        self.state.unlocked()?;
        self.vault.read_mnemonic(password)
    }

    /// Secret-free view of the unlocked keyring.
    pub fn get_state(&self) -> Result<KeyRingSnapshot> {
        let unlocked = self.state.unlocked()?;
        Ok(unlocked.snapshot(self.network_module.current_network_id()))
    }

    // -- Accounts ---------------------------------------------------------

    /// Derives the next seed account.
    ///
    /// # Errors
    ///
    /// - [`IcringError::NotInitialized`] / [`IcringError::StateLocked`].
    /// - [`IcringError::IndexOutOfRange`] once the derivation range is used up.
    pub fn derive_next_account(
        &mut self,
        name: Option<String>,
        icon: Option<String>,
    ) -> Result<AccountView> {
        let password = self.state.unlocked()?.password.clone();
        let mnemonic = Mnemonic::parse(&self.vault.read_mnemonic(&password)?)?;

        let unlocked = self.state.unlocked_mut()?;
        let index = unlocked.mnemonic_account_count;
        let order = unlocked.accounts.next_order();
        let name = non_blank(name).unwrap_or_else(|| default_name(order));
        let account = derive_seed_account(&mnemonic, index, Uuid::new_v4().to_string(), name, order)?
            .with_icon(icon);
        let view = account.view();
        unlocked.accounts.insert_derived(account);
        unlocked.mnemonic_account_count = index.saturating_add(1);

        self.save_vault(Some(mnemonic.as_str()))?;
        Ok(view)
    }

    /// Imports an account from a PEM key file.
    ///
    /// # Errors
    ///
    /// - [`IcringError::NotInitialized`] / [`IcringError::StateLocked`].
    /// - [`IcringError::MalformedKeyMaterial`] for an unusable key file.
    /// - [`IcringError::DuplicateAccount`] if the key is already present.
    pub fn import_from_pem(
        &mut self,
        pem: &str,
        name: Option<String>,
        icon: Option<String>,
    ) -> Result<AccountView> {
        self.state.unlocked()?;
        let identity = identity_from_pem(pem)?;
        self.import_account(identity, AccountKind::ImportedFromFile, name, icon)
    }

    /// Imports an account from a hex secp256k1 secret key.
    ///
    /// # Errors
    ///
    /// As [`import_from_pem`](Self::import_from_pem).
    pub fn import_from_secret_key(
        &mut self,
        secret_hex: &str,
        name: Option<String>,
        icon: Option<String>,
    ) -> Result<AccountView> {
        self.state.unlocked()?;
        let identity = Identity::from_secret_key_hex(secret_hex)?;
        self.import_account(identity, AccountKind::ImportedFromKey, name, icon)
    }

    fn import_account(
        &mut self,
        identity: Identity,
        kind: AccountKind,
        name: Option<String>,
        icon: Option<String>,
    ) -> Result<AccountView> {
        let unlocked = self.state.unlocked_mut()?;
        let order = unlocked.accounts.next_order();
        let name = non_blank(name).unwrap_or_else(|| default_name(order));
        let account =
            Account::new(Uuid::new_v4().to_string(), name, order, kind, identity).with_icon(icon);
        let view = account.view();
        unlocked.accounts.insert_imported(account)?;

        self.save_vault(None)?;
        Ok(view)
    }

    /// Principal of the key in a PEM file, without importing it.
    pub fn principal_from_pem(&self, pem: &str) -> Result<String> {
        Ok(identity_from_pem(pem)?.principal().to_text())
    }

    /// Checks whether a key file could be imported.
    ///
    /// # Errors
    ///
    /// [`IcringError::NotInitialized`] / [`IcringError::StateLocked`];
    /// a bad key file is reported in the answer.
    pub fn validate_pem(&self, pem: &str) -> Result<PemValidation> {
        let unlocked = self.state.unlocked()?;
        Ok(match identity_from_pem(pem) {
            Err(_) => PemValidation::invalid(PemErrorKind::MalformedKeyMaterial),
            Ok(identity) if unlocked.accounts.find_by_principal(identity.principal()).is_some() => {
                PemValidation::invalid(PemErrorKind::AlreadyRegistered)
            }
            Ok(_) => PemValidation::valid(),
        })
    }

    /// Deletes an imported account. If it was current, the root account
    /// becomes current.
    ///
    /// # Errors
    ///
    /// - [`IcringError::NotInitialized`] / [`IcringError::StateLocked`].
    /// - [`IcringError::InvalidAccountReference`] for an unknown id.
    /// - [`IcringError::CannotDeleteSeedAccount`] for seed accounts.
    pub fn delete_imported_account(&mut self, account_id: &str) -> Result<()> {
        let unlocked = self.state.unlocked_mut()?;
        unlocked.accounts.remove_imported(account_id)?;
        if unlocked.current_account_id == account_id {
            if let Some(root) = unlocked.accounts.root().map(|a| a.id().to_owned()) {
                unlocked.current_account_id = root;
            }
        }
        self.save_vault(None)
    }

    /// Selects the current account.
    ///
    /// # Errors
    ///
    /// - [`IcringError::NotInitialized`] / [`IcringError::StateLocked`].
    /// - [`IcringError::InvalidAccountReference`] for an unknown id.
    pub fn set_current_account(&mut self, account_id: &str) -> Result<()> {
        let unlocked = self.state.unlocked_mut()?;
        if !unlocked.accounts.contains(account_id) {
            return Err(IcringError::InvalidAccountReference {
                account_id: account_id.to_owned(),
            });
        }
        unlocked.current_account_id = account_id.to_owned();
        self.save_vault(None)
    }

    pub fn current_account_id(&self) -> Result<String> {
        Ok(self.state.unlocked()?.current_account_id.clone())
    }

    /// Id of the account at `index` in creation order.
    ///
    /// # Errors
    ///
    /// - [`IcringError::NotInitialized`] / [`IcringError::StateLocked`].
    /// - [`IcringError::IndexOutOfRange`] for a negative or too large index.
    pub fn account_id_from_index(&self, index: i64) -> Result<String> {
        let unlocked = self.state.unlocked()?;
        Ok(unlocked.accounts.by_index(index)?.id().to_owned())
    }

    // -- Networks ---------------------------------------------------------

    pub fn network_module(&self) -> &NetworkModule {
        &self.network_module
    }

    /// Adds a custom network and returns its id.
    pub fn add_network(&mut self, params: NetworkParams) -> Result<String> {
        let id = self.network_module.add_network(params)?;
        self.persist_network_module()?;
        Ok(id)
    }

    /// Edits a custom network.
    pub fn edit_network(&mut self, network_id: &str, edit: EditNetworkParams) -> Result<NetworkRecord> {
        let record = self.network_module.edit_network(network_id, edit)?.to_record();
        self.persist_network_module()?;
        Ok(record)
    }

    /// Removes a custom network.
    pub fn remove_network(&mut self, network_id: &str) -> Result<()> {
        self.network_module.remove_network(network_id)?;
        self.persist_network_module()
    }

    /// Selects the network account operations run on.
    pub fn set_current_network(&mut self, network_id: &str) -> Result<NetworkRecord> {
        let record = self.network_module.set_current_network(network_id)?.to_record();
        self.persist_network_module()?;
        Ok(record)
    }

    // -- Persistence ------------------------------------------------------

    /// Rewrites the vault from the unlocked state.
    ///
    /// Without `mnemonic`, the seed phrase is read back from the stored
    /// vault.
    pub(crate) fn save_vault(&self, mnemonic: Option<&str>) -> Result<()> {
        let unlocked = self.state.unlocked()?;
        let mnemonic = match mnemonic {
            Some(phrase) => Zeroizing::new(phrase.to_owned()),
            None => self.vault.read_mnemonic(&unlocked.password)?,
        };
        self.vault.save(
            &vault_payload(unlocked, &mnemonic),
            &unlocked.password,
            StorageUpdate {
                current_wallet_id: Some(unlocked.current_account_id.clone()),
                ..Default::default()
            },
        )
    }

    /// Writes the network module if anything in it changed.
    pub(crate) fn persist_network_module(&self) -> Result<()> {
        if self.network_module.change_hook().take() {
            self.vault.set(StorageUpdate {
                network_module: Some(self.network_module.to_value()?),
                ..Default::default()
            })?;
        }
        Ok(())
    }
}

fn vault_payload(unlocked: &UnlockedKeyRing, mnemonic: &str) -> VaultPayload {
    VaultPayload {
        wallets: unlocked.accounts.to_records(),
        mnemonic: mnemonic.to_owned(),
        mnemonic_wallet_count: unlocked.mnemonic_account_count,
        password: unlocked.password.as_str().to_owned(),
        current_wallet_id: Some(unlocked.current_account_id.clone()),
        version: Some(CURRENT_VERSION),
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn default_name(order: u64) -> String {
    format!("Account {}", order.saturating_add(1))
}
