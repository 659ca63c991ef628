//! The network module: the built-in network, custom networks and the
//! current selection.
//!
//! The module is persisted next to the vault, unencrypted, as a
//! [`NetworkModuleRecord`]. Every network shares the module's
//! [`ChangeHook`], so a registry change anywhere marks the whole module
//! dirty.

use std::collections::BTreeMap;

use icring_types::{IcringError, Result};
use serde::{Deserialize, Serialize};

use crate::defaults::MAINNET_ID;
use crate::network::{
    validate_canister_id, ChangeHook, EditNetworkParams, Network, NetworkParams, NetworkRecord,
};

/// Persisted form of a [`NetworkModule`].
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkModuleRecord {
    #[serde(default)]
    pub networks: BTreeMap<String, NetworkRecord>,
    #[serde(default)]
    pub current_network_id: Option<String>,
}

/// All networks known to the keyring.
#[derive(Clone, Debug)]
pub struct NetworkModule {
    mainnet: Network,
    custom: BTreeMap<String, Network>,
    current_network_id: String,
    on_change: ChangeHook,
}

impl NetworkModule {
    /// A module holding only the built-in network at `mainnet_host`.
    pub fn new(mainnet_host: &str) -> Self {
        let on_change = ChangeHook::new();
        Self {
            mainnet: Network::mainnet(mainnet_host, on_change.clone()),
            custom: BTreeMap::new(),
            current_network_id: MAINNET_ID.into(),
            on_change,
        }
    }

    /// Rebuilds the module from its record.
    ///
    /// A missing built-in network is recreated at `mainnet_host`; an
    /// unknown current id falls back to the built-in network.
    pub fn from_record(mut record: NetworkModuleRecord, mainnet_host: &str) -> Self {
        let on_change = ChangeHook::new();
        let mainnet = match record.networks.remove(MAINNET_ID) {
            Some(stored) => Network::from_record(stored, on_change.clone()),
            None => Network::mainnet(mainnet_host, on_change.clone()),
        };
        let custom: BTreeMap<String, Network> = record
            .networks
            .into_values()
            .map(|r| Network::from_record(r, on_change.clone()))
            .map(|n| (n.id().to_owned(), n))
            .collect();

        let current_network_id = record
            .current_network_id
            .filter(|id| custom.contains_key(id))
            .unwrap_or_else(|| MAINNET_ID.into());

        Self {
            mainnet,
            custom,
            current_network_id,
            on_change,
        }
    }

    /// Parses a persisted module value.
    ///
    /// # Errors
    ///
    /// Returns [`IcringError::SerializationError`] if the value does not
    /// have the module shape.
    pub fn from_value(value: serde_json::Value, mainnet_host: &str) -> Result<Self> {
        let record: NetworkModuleRecord = serde_json::from_value(value)?;
        Ok(Self::from_record(record, mainnet_host))
    }

    /// Returns the persisted record of the module.
    pub fn to_record(&self) -> NetworkModuleRecord {
        NetworkModuleRecord {
            networks: self
                .networks()
                .map(|n| (n.id().to_owned(), n.to_record()))
                .collect(),
            current_network_id: Some(self.current_network_id.clone()),
        }
    }

    /// Serializes the module for storage.
    pub fn to_value(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self.to_record())?)
    }

    /// Flag raised whenever the module or any network changed.
    pub fn change_hook(&self) -> &ChangeHook {
        &self.on_change
    }

    // -- Queries ----------------------------------------------------------

    /// The built-in network followed by custom networks in id order.
    pub fn networks(&self) -> impl Iterator<Item = &Network> {
        std::iter::once(&self.mainnet).chain(self.custom.values())
    }

    pub fn network(&self, network_id: &str) -> Option<&Network> {
        if network_id == MAINNET_ID {
            Some(&self.mainnet)
        } else {
            self.custom.get(network_id)
        }
    }

    pub fn current_network_id(&self) -> &str {
        &self.current_network_id
    }

    pub fn current_network(&self) -> &Network {
        self.custom
            .get(&self.current_network_id)
            .unwrap_or(&self.mainnet)
    }

    pub fn current_network_mut(&mut self) -> &mut Network {
        match self.custom.get_mut(&self.current_network_id) {
            Some(network) => network,
            None => &mut self.mainnet,
        }
    }

    // -- Mutations --------------------------------------------------------

    /// Adds a custom network and returns its id.
    ///
    /// # Errors
    ///
    /// - [`IcringError::ConfigError`] for an empty name or host.
    /// - [`IcringError::InvalidCanisterReference`] for a bad ledger reference.
    pub fn add_network(&mut self, params: NetworkParams) -> Result<String> {
        if params.name.trim().is_empty() || params.host.trim().is_empty() {
            return Err(IcringError::ConfigError {
                reason: "a network needs a name and a host".into(),
            });
        }
        if let Some(ledger) = params.ledger_canister_id.as_deref().filter(|l| !l.is_empty()) {
            validate_canister_id(ledger)?;
        }

        let network = Network::custom(params, self.on_change.clone());
        let id = network.id().to_owned();
        tracing::info!(network = %id, host = network.host(), "network added");
        self.custom.insert(id.clone(), network);
        self.on_change.notify();
        Ok(id)
    }

    /// Edits a custom network.
    ///
    /// # Errors
    ///
    /// - [`IcringError::NetworkImmutable`] for the built-in network.
    /// - [`IcringError::UnknownNetwork`] if no network has `network_id`.
    pub fn edit_network(&mut self, network_id: &str, edit: EditNetworkParams) -> Result<&Network> {
        if let Some(ledger) = edit.ledger_canister_id.as_deref().filter(|l| !l.is_empty()) {
            validate_canister_id(ledger)?;
        }
        let network = if network_id == MAINNET_ID {
            &mut self.mainnet
        } else {
            self.custom
                .get_mut(network_id)
                .ok_or_else(|| IcringError::UnknownNetwork {
                    network_id: network_id.to_owned(),
                })?
        };
        network.edit(edit)?;
        Ok(&*network)
    }

    /// Removes a custom network. Removing the current network selects
    /// the built-in one.
    ///
    /// # Errors
    ///
    /// - [`IcringError::NetworkImmutable`] for the built-in network.
    /// - [`IcringError::UnknownNetwork`] if no network has `network_id`.
    pub fn remove_network(&mut self, network_id: &str) -> Result<()> {
        if network_id == MAINNET_ID {
            return Err(IcringError::NetworkImmutable {
                network_id: network_id.to_owned(),
            });
        }
        if self.custom.remove(network_id).is_none() {
            return Err(IcringError::UnknownNetwork {
                network_id: network_id.to_owned(),
            });
        }
        if self.current_network_id == network_id {
            self.current_network_id = MAINNET_ID.into();
        }
        self.on_change.notify();
        tracing::info!(network = network_id, "network removed");
        Ok(())
    }

    /// Selects the current network.
    ///
    /// # Errors
    ///
    /// Returns [`IcringError::UnknownNetwork`] if no network has `network_id`.
    pub fn set_current_network(&mut self, network_id: &str) -> Result<&Network> {
        if self.network(network_id).is_none() {
            return Err(IcringError::UnknownNetwork {
                network_id: network_id.to_owned(),
            });
        }
        self.current_network_id = network_id.to_owned();
        self.on_change.notify();
        Ok(self.current_network())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::ICP_LEDGER_CANISTER_ID;

    const HOST: &str = "https://icp-api.io";

    fn local() -> NetworkParams {
        NetworkParams {
            name: "Local".into(),
            host: "http://127.0.0.1:4943".into(),
            ledger_canister_id: Some(ICP_LEDGER_CANISTER_ID.into()),
        }
    }

    #[test]
    fn starts_on_mainnet() {
        let module = NetworkModule::new(HOST);
        assert_eq!(module.current_network_id(), MAINNET_ID);
        assert_eq!(module.current_network().host(), HOST);
        assert_eq!(module.networks().count(), 1);
        assert!(!module.change_hook().is_dirty());
    }

    #[test]
    fn add_select_remove_falls_back_to_mainnet() -> std::result::Result<(), IcringError> {
        let mut module = NetworkModule::new(HOST);
        let id = module.add_network(local())?;
        module.set_current_network(&id)?;
        assert_eq!(module.current_network().name(), "Local");
        assert!(module.current_network().is_custom());

        module.remove_network(&id)?;
        assert_eq!(module.current_network_id(), MAINNET_ID);
        assert!(module.change_hook().take());
        Ok(())
    }

    #[test]
    fn builtin_network_cannot_be_edited_or_removed() {
        let mut module = NetworkModule::new(HOST);
        assert!(matches!(
            module.edit_network(MAINNET_ID, EditNetworkParams::default()),
            Err(IcringError::NetworkImmutable { .. })
        ));
        assert!(matches!(
            module.remove_network(MAINNET_ID),
            Err(IcringError::NetworkImmutable { .. })
        ));
    }

    #[test]
    fn unknown_networks_are_rejected() {
        let mut module = NetworkModule::new(HOST);
        assert!(matches!(
            module.set_current_network("nope"),
            Err(IcringError::UnknownNetwork { .. })
        ));
        assert!(matches!(
            module.remove_network("nope"),
            Err(IcringError::UnknownNetwork { .. })
        ));
        assert!(matches!(
            module.edit_network("nope", EditNetworkParams::default()),
            Err(IcringError::UnknownNetwork { .. })
        ));
    }

    #[test]
    fn invalid_new_networks_are_rejected() {
        let mut module = NetworkModule::new(HOST);
        assert!(matches!(
            module.add_network(NetworkParams {
                name: " ".into(),
                ..local()
            }),
            Err(IcringError::ConfigError { .. })
        ));
        assert!(matches!(
            module.add_network(NetworkParams {
                ledger_canister_id: Some("bogus".into()),
                ..local()
            }),
            Err(IcringError::InvalidCanisterReference { .. })
        ));
    }

    #[test]
    fn value_roundtrip_keeps_selection() -> std::result::Result<(), IcringError> {
        let mut module = NetworkModule::new(HOST);
        let id = module.add_network(local())?;
        module.set_current_network(&id)?;

        let restored = NetworkModule::from_value(module.to_value()?, HOST)?;
        assert_eq!(restored.current_network_id(), id);
        assert_eq!(restored.networks().count(), 2);
        assert!(restored.current_network().is_default_token(ICP_LEDGER_CANISTER_ID));
        Ok(())
    }

    #[test]
    fn empty_record_yields_mainnet() -> std::result::Result<(), IcringError> {
        let module = NetworkModule::from_value(serde_json::json!({}), HOST)?;
        assert_eq!(module.current_network_id(), MAINNET_ID);
        Ok(())
    }
}
