//! The in-memory account and its persisted key-export form.
//!
//! An [`Account`] exclusively owns its [`Identity`]. It never derives
//! `Clone` or `Debug`: the private key stays in exactly one place
//! until the account is dropped, at which point the key zeroizes.
//!
//! Inside the vault an account is stored as an [`AccountRecord`], the
//! camelCase JSON form carrying a [`KeyDescriptor`]. Callers that need
//! to display an account get an [`AccountView`], which has no secret.

use icring_crypto::identity::{Identity, KeyDescriptor};
use icring_crypto::key_file::identity_to_pem;
use icring_network::IcnsData;
use icring_types::{AccountIdentifier, Principal, Result};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::contact::Contact;

// ---------------------------------------------------------------------------
// AccountKind
// ---------------------------------------------------------------------------

/// How an account's key came into the keyring.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum AccountKind {
    /// Derived from the keyring's seed phrase.
    #[default]
    #[serde(rename = "MNEMONIC")]
    SeedDerived,
    /// Imported from a raw secret key.
    #[serde(rename = "PRIVATE_KEY")]
    ImportedFromKey,
    /// Imported from a PEM key file.
    #[serde(rename = "PEM_FILE")]
    ImportedFromFile,
}

impl AccountKind {
    /// Returns `true` for accounts that did not come from the seed phrase.
    pub fn is_imported(self) -> bool {
        self != Self::SeedDerived
    }
}

// ---------------------------------------------------------------------------
// AccountRecord
// ---------------------------------------------------------------------------

/// Persisted form of an [`Account`], stored only inside the vault.
///
/// `principal` and `account_id` are informational: they are recomputed
/// from `key_pair` whenever the record is loaded.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountRecord {
    pub wallet_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    pub order_number: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wallet_number: Option<u64>,
    #[serde(default)]
    pub principal: String,
    #[serde(default)]
    pub account_id: String,
    #[serde(rename = "type", default)]
    pub kind: AccountKind,
    #[serde(default)]
    pub icns_data: IcnsData,
    #[serde(default)]
    pub contacts: Vec<Contact>,
    pub key_pair: KeyDescriptor,
}

// ---------------------------------------------------------------------------
// AccountView
// ---------------------------------------------------------------------------

/// Public snapshot of an account.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountView {
    pub wallet_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    pub order_number: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wallet_number: Option<u64>,
    pub principal: String,
    pub account_id: String,
    #[serde(rename = "type")]
    pub kind: AccountKind,
    pub icns_data: IcnsData,
    pub contacts: Vec<Contact>,
}

// ---------------------------------------------------------------------------
// Account
// ---------------------------------------------------------------------------

/// One account of the keyring.
pub struct Account {
    id: String,
    name: String,
    icon: Option<String>,
    order: u64,
    derivation_index: Option<u64>,
    kind: AccountKind,
    identity: Identity,
    pub(crate) icns_data: IcnsData,
    pub(crate) contacts: Vec<Contact>,
}

impl Account {
    /// Creates an account around `identity`.
    ///
    /// Seed-derived accounts should also get their index with
    /// [`with_derivation_index`](Self::with_derivation_index).
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        order: u64,
        kind: AccountKind,
        identity: Identity,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            icon: None,
            order,
            derivation_index: None,
            kind,
            identity,
            icns_data: IcnsData::default(),
            contacts: Vec::new(),
        }
    }

    pub fn with_icon(mut self, icon: Option<String>) -> Self {
        self.icon = icon;
        self
    }

    pub fn with_derivation_index(mut self, index: u64) -> Self {
        self.derivation_index = Some(index);
        self
    }

    /// Rebuilds an account from its vault record.
    ///
    /// # Errors
    ///
    /// Returns [`icring_types::IcringError::MalformedKeyMaterial`] if the key pair does
    /// not describe a valid key.
    pub fn from_record(record: AccountRecord) -> Result<Self> {
        let identity = Identity::from_descriptor(&record.key_pair)?;
        if !record.principal.is_empty() && record.principal != identity.principal().to_text() {
            tracing::warn!(
                account = %record.wallet_id,
                "stored principal does not match key pair; using the key pair"
            );
        }
        let AccountRecord {
            wallet_id,
            name,
            icon,
            order_number,
            wallet_number,
            kind,
            icns_data,
            contacts,
            ..
        } = record;
        Ok(Self {
            id: wallet_id,
            name,
            icon,
            order: order_number,
            derivation_index: wallet_number,
            kind,
            identity,
            icns_data,
            contacts,
        })
    }

    /// Returns the vault record of this account, including its key.
    pub fn to_record(&self) -> AccountRecord {
        AccountRecord {
            wallet_id: self.id.clone(),
            name: self.name.clone(),
            icon: self.icon.clone(),
            order_number: self.order,
            wallet_number: self.derivation_index,
            principal: self.principal().to_text(),
            account_id: self.account_identifier().to_hex(),
            kind: self.kind,
            icns_data: self.icns_data.clone(),
            contacts: self.contacts.clone(),
            key_pair: self.identity.descriptor(),
        }
    }

    /// Returns the secret-free snapshot of this account.
    pub fn view(&self) -> AccountView {
        AccountView {
            wallet_id: self.id.clone(),
            name: self.name.clone(),
            icon: self.icon.clone(),
            order_number: self.order,
            wallet_number: self.derivation_index,
            principal: self.principal().to_text(),
            account_id: self.account_identifier().to_hex(),
            kind: self.kind,
            icns_data: self.icns_data.clone(),
            contacts: self.contacts.clone(),
        }
    }

    // -- Accessors --------------------------------------------------------

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn icon(&self) -> Option<&str> {
        self.icon.as_deref()
    }

    /// Creation order; the root account has order 0.
    pub fn order(&self) -> u64 {
        self.order
    }

    /// Seed derivation index, `None` for imported accounts.
    pub fn derivation_index(&self) -> Option<u64> {
        self.derivation_index
    }

    pub fn kind(&self) -> AccountKind {
        self.kind
    }

    pub fn is_root(&self) -> bool {
        self.order == 0
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn principal(&self) -> &Principal {
        self.identity.principal()
    }

    pub fn account_identifier(&self) -> AccountIdentifier {
        self.identity.account_identifier()
    }

    pub fn icns_data(&self) -> &IcnsData {
        &self.icns_data
    }

    // -- Editing ----------------------------------------------------------

    /// Updates the display metadata. `None` keeps the current value.
    pub fn edit(&mut self, name: Option<String>, icon: Option<String>) {
        if let Some(name) = name.filter(|n| !n.trim().is_empty()) {
            self.name = name;
        }
        if icon.is_some() {
            self.icon = icon;
        }
    }

    // -- Key operations ---------------------------------------------------

    /// Signs `payload` with the account's identity.
    pub fn sign(&self, payload: &[u8]) -> Vec<u8> {
        self.identity.sign(payload)
    }

    /// DER SubjectPublicKeyInfo of the account's public key.
    pub fn public_key(&self) -> Vec<u8> {
        self.identity.public_key_der().to_vec()
    }

    /// Exports the account's key as a PEM file.
    ///
    /// # Errors
    ///
    /// Returns [`icring_types::IcringError::CryptoError`] if the key cannot be encoded.
    pub fn pem_file(&self) -> Result<Zeroizing<String>> {
        identity_to_pem(&self.identity)
    }

    // -- Contacts ---------------------------------------------------------

    pub fn contacts(&self) -> &[Contact] {
        &self.contacts
    }

    /// Adds a contact. Returns `false` if one with the same name exists.
    ///
    /// # Errors
    ///
    /// Returns [`icring_types::IcringError::InvalidPrincipal`] if the contact's address
    /// is malformed.
    pub fn add_contact(&mut self, contact: Contact) -> Result<bool> {
        contact.value.validate()?;
        if self.contacts.iter().any(|c| c.name == contact.name) {
            return Ok(false);
        }
        self.contacts.push(contact);
        Ok(true)
    }

    /// Removes the contact called `name`. Returns `false` if absent.
    pub fn delete_contact(&mut self, name: &str) -> bool {
        let before = self.contacts.len();
        self.contacts.retain(|c| c.name != name);
        self.contacts.len() != before
    }
}

impl From<&Account> for AccountView {
    fn from(account: &Account) -> Self {
        account.view()
    }
}

#[cfg(test)]
mod tests {
    use icring_crypto::identity::Curve;
    use icring_types::{IcringError, Principal};

    use super::*;
    use crate::contact::ContactAddress;

    fn account() -> std::result::Result<Account, IcringError> {
        Ok(Account::new(
            "w-1",
            "Main",
            0,
            AccountKind::SeedDerived,
            Identity::generate(Curve::Secp256k1)?,
        )
        .with_derivation_index(0))
    }

    #[test]
    fn kind_uses_the_stored_tags() -> std::result::Result<(), IcringError> {
        assert_eq!(serde_json::to_value(AccountKind::SeedDerived)?, "MNEMONIC");
        assert_eq!(serde_json::to_value(AccountKind::ImportedFromKey)?, "PRIVATE_KEY");
        assert_eq!(serde_json::to_value(AccountKind::ImportedFromFile)?, "PEM_FILE");
        assert!(!AccountKind::SeedDerived.is_imported());
        Ok(())
    }

    #[test]
    fn record_roundtrip_keeps_identity() -> std::result::Result<(), IcringError> {
        let mut original = account()?;
        original.add_contact(Contact {
            name: "bob".into(),
            value: ContactAddress::PrincipalId(Principal::from_slice(&[4])?),
            description: None,
            emoji: None,
        })?;

        let json = serde_json::to_string(&original.to_record())?;
        let restored = Account::from_record(serde_json::from_str(&json)?)?;

        assert_eq!(restored.principal(), original.principal());
        assert_eq!(restored.order(), 0);
        assert_eq!(restored.derivation_index(), Some(0));
        assert_eq!(restored.contacts(), original.contacts());
        assert_eq!(restored.view(), original.view());
        Ok(())
    }

    #[test]
    fn record_defaults_fill_missing_fields() -> std::result::Result<(), IcringError> {
        let descriptor = account()?.identity().descriptor();
        let value = serde_json::json!({
            "walletId": "w-9",
            "name": "Old",
            "orderNumber": 18_446_744_073_709_551_615u64,
            "keyPair": descriptor,
        });
        let record: AccountRecord = serde_json::from_value(value)?;
        assert_eq!(record.kind, AccountKind::SeedDerived);
        assert!(record.contacts.is_empty());
        assert_eq!(record.order_number, u64::MAX);

        let reencoded = serde_json::to_value(&record)?;
        assert_eq!(reencoded["orderNumber"], serde_json::json!(u64::MAX));
        Ok(())
    }

    #[test]
    fn view_has_no_key_material() -> std::result::Result<(), IcringError> {
        let value = serde_json::to_value(account()?.view())?;
        assert!(value.get("keyPair").is_none());
        assert_eq!(value["type"], "MNEMONIC");
        Ok(())
    }

    #[test]
    fn contacts_are_unique_by_name() -> std::result::Result<(), IcringError> {
        let mut account = account()?;
        let contact = Contact {
            name: "carol".into(),
            value: ContactAddress::Icns("carol.icp".into()),
            description: None,
            emoji: None,
        };
        assert!(account.add_contact(contact.clone())?);
        assert!(!account.add_contact(contact)?);
        assert!(account.delete_contact("carol"));
        assert!(!account.delete_contact("carol"));
        Ok(())
    }

    #[test]
    fn sign_verifies_and_edit_keeps_blank_fields() -> std::result::Result<(), IcringError> {
        let mut account = account()?;
        let signature = account.sign(b"payload");
        account.identity().verify(b"payload", &signature)?;
        assert!(!account.public_key().is_empty());

        account.edit(Some("  ".into()), Some("🐢".into()));
        assert_eq!(account.name(), "Main");
        assert_eq!(account.icon(), Some("🐢"));
        Ok(())
    }
}
