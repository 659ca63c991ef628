//! Schema migrations of the decrypted vault.
//!
//! Migrations run on the loosely shaped JSON value of the vault, before
//! it is parsed into a [`VaultPayload`](crate::vault::VaultPayload).
//! The chain is ordered by version; every step whose version lies in
//! `(persisted, running]` is applied in turn. An absent persisted
//! version means `0.0.0`.
//!
//! The network module lives outside the vault but is migrated together
//! with it: the caller places the stored module under the
//! [`NETWORK_MODULE_KEY`] key of the value before migrating and takes
//! it back out afterwards.
//!
//! Every step only reshapes data. None drops an account or a secret,
//! and each is a no-op on data already in its target shape.
//!
//! Account `keyPair` entries are expected in the `{curve, secretKey}`
//! object form at every version. No step converts a key pair stored as
//! a JSON-encoded string; such a vault fails to parse after migration
//! and unlock reports a serialization error.

use std::collections::BTreeSet;

use icring_network::defaults::{mainnet_token, mainnet_tokens, MAINNET_ID, MAINNET_NAME};
use icring_network::token::standards;
use icring_types::{IcringError, Result, SchemaVersion};
use serde_json::{json, Map, Value};

/// Schema version written by this build.
pub const CURRENT_VERSION: SchemaVersion = SchemaVersion::new(0, 17, 0);

/// Key of the network module inside a value being migrated.
pub const NETWORK_MODULE_KEY: &str = "networkModule";

/// Decimals assumed for a historical token nothing else describes.
const FALLBACK_DECIMALS: u64 = 8;

/// Environment a migration step may need.
#[derive(Clone, Copy, Debug)]
pub struct MigrationContext<'a> {
    /// Host of the built-in network, for modules created by a migration.
    pub mainnet_host: &'a str,
}

type Transform = fn(&mut Value, &MigrationContext<'_>) -> Result<()>;

struct Migration {
    version: SchemaVersion,
    apply: Transform,
}

const MIGRATIONS: [Migration; 3] = [
    Migration {
        version: SchemaVersion::new(0, 14, 5),
        apply: assets_by_canister,
    },
    Migration {
        version: SchemaVersion::new(0, 16, 0),
        apply: tokens_to_network_module,
    },
    Migration {
        version: SchemaVersion::new(0, 17, 0),
        apply: account_defaults,
    },
];

/// Applies every migration in `(from, to]` to `value`, in version order,
/// and returns the versions applied.
///
/// # Errors
///
/// Returns [`IcringError::MigrationError`] if `from` is newer than `to`
/// or a step meets data it cannot reshape. `value` must then be
/// discarded.
pub fn migrate(
    value: &mut Value,
    from: Option<SchemaVersion>,
    to: SchemaVersion,
    ctx: &MigrationContext<'_>,
) -> Result<Vec<SchemaVersion>> {
    let from = from.unwrap_or_default();
    if from > to {
        return Err(IcringError::MigrationError {
            reason: format!("persisted schema {from} is newer than {to}"),
        });
    }
    if !value.is_object() {
        return Err(IcringError::MigrationError {
            reason: "vault content is not a JSON object".into(),
        });
    }

    let mut applied = Vec::new();
    for migration in MIGRATIONS.iter().filter(|m| from < m.version && m.version <= to) {
        (migration.apply)(value, ctx)?;
        tracing::info!(from = %from, step = %migration.version, "vault migration applied");
        applied.push(migration.version);
    }
    Ok(applied)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn root_mut(value: &mut Value) -> Result<&mut Map<String, Value>> {
    value.as_object_mut().ok_or_else(|| IcringError::MigrationError {
        reason: "vault content is not a JSON object".into(),
    })
}

/// The wallet objects of the vault, whether stored as a list or a map.
fn wallets_mut(value: &mut Value) -> Vec<&mut Map<String, Value>> {
    match value.get_mut("wallets") {
        Some(Value::Array(list)) => list.iter_mut().filter_map(Value::as_object_mut).collect(),
        Some(Value::Object(map)) => map.values_mut().filter_map(Value::as_object_mut).collect(),
        _ => Vec::new(),
    }
}

/// Entries of a wallet's `registeredTokens`, whether a list or a map.
fn registered_entries(wallet: &Map<String, Value>) -> Vec<(String, &Map<String, Value>)> {
    match wallet.get("registeredTokens") {
        Some(Value::Object(map)) => map
            .iter()
            .filter_map(|(key, v)| {
                let entry = v.as_object()?;
                let canister_id = entry
                    .get("canisterId")
                    .and_then(Value::as_str)
                    .unwrap_or(key)
                    .to_owned();
                Some((canister_id, entry))
            })
            .collect(),
        Some(Value::Array(list)) => list
            .iter()
            .filter_map(|v| {
                let entry = v.as_object()?;
                let canister_id = entry.get("canisterId")?.as_str()?.to_owned();
                Some((canister_id, entry))
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn str_field<'a>(entry: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    entry.get(key).and_then(Value::as_str)
}

// ---------------------------------------------------------------------------
// 0.14.5: wallets and assets keyed by id
// ---------------------------------------------------------------------------

fn assets_by_canister(value: &mut Value, _ctx: &MigrationContext<'_>) -> Result<()> {
    for wallet in wallets_mut(value) {
        let Some(Value::Array(assets)) = wallet.get("assets") else {
            continue;
        };
        let registered = registered_entries(wallet);
        let mut by_canister = Map::new();
        for asset in assets.iter().filter_map(Value::as_object) {
            let Some(canister_id) = str_field(asset, "canisterId") else {
                continue;
            };
            let symbol = str_field(asset, "symbol").unwrap_or_default();
            let known = registered
                .iter()
                .find(|(id, _)| id == canister_id)
                .map(|(_, entry)| *entry);
            let default = mainnet_tokens().into_iter().find(|t| t.symbol == symbol);

            let standard = known
                .and_then(|e| str_field(e, "standard"))
                .map(str::to_uppercase)
                .or_else(|| default.as_ref().map(|t| t.standard.clone()))
                .unwrap_or_else(|| standards::DIP20.to_owned());
            let decimals = known
                .and_then(|e| e.get("decimals"))
                .and_then(Value::as_u64)
                .or_else(|| default.as_ref().map(|t| u64::from(t.decimals)))
                .unwrap_or(FALLBACK_DECIMALS);

            let mut token = json!({
                "name": asset.get("name").cloned().unwrap_or(Value::Null),
                "symbol": symbol,
                "canisterId": canister_id,
                "standard": standard,
                "decimals": decimals,
            });
            if let Some(color) = known.and_then(|e| e.get("color")) {
                token["color"] = color.clone();
            }
            by_canister.insert(
                canister_id.to_owned(),
                json!({ "amount": "0", "token": token }),
            );
        }
        wallet.insert("assets".into(), Value::Object(by_canister));
    }

    let root = root_mut(value)?;
    if let Some(Value::Array(list)) = root.get("wallets") {
        let mut by_id = Map::new();
        for wallet in list {
            let id = wallet
                .get("walletId")
                .and_then(Value::as_str)
                .ok_or_else(|| IcringError::MigrationError {
                    reason: "a wallet has no walletId".into(),
                })?;
            by_id.insert(id.to_owned(), wallet.clone());
        }
        root.insert("wallets".into(), Value::Object(by_id));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// 0.16.0: registered tokens move to the network module
// ---------------------------------------------------------------------------

fn tokens_to_network_module(value: &mut Value, ctx: &MigrationContext<'_>) -> Result<()> {
    // Collect first, in wallet order, so the first registration wins.
    let mut collected: Vec<(String, Map<String, Value>, BTreeSet<String>)> = Vec::new();
    for wallet in wallets_mut(value) {
        let wallet_id = str_field(wallet, "walletId").unwrap_or_default().to_owned();
        for (canister_id, entry) in registered_entries(wallet) {
            if mainnet_token(&canister_id).is_some() {
                continue;
            }
            match collected.iter_mut().find(|(id, _, _)| *id == canister_id) {
                Some((_, _, owners)) => {
                    owners.insert(wallet_id.clone());
                }
                None => collected.push((
                    canister_id,
                    entry.clone(),
                    BTreeSet::from([wallet_id.clone()]),
                )),
            }
        }
        wallet.remove("registeredTokens");
        wallet.remove("assets");
    }

    let root = root_mut(value)?;
    let module = root
        .entry(NETWORK_MODULE_KEY)
        .or_insert_with(|| json!({}));
    if !module.is_object() {
        *module = json!({});
    }
    let networks = module
        .as_object_mut()
        .map(|m| m.entry("networks").or_insert_with(|| json!({})))
        .ok_or_else(|| IcringError::MigrationError {
            reason: "network module is not an object".into(),
        })?;
    if !networks.is_object() {
        *networks = json!({});
    }
    let mainnet = networks
        .as_object_mut()
        .map(|n| {
            n.entry(MAINNET_ID).or_insert_with(|| {
                json!({
                    "id": MAINNET_ID,
                    "name": MAINNET_NAME,
                    "host": ctx.mainnet_host,
                })
            })
        })
        .and_then(Value::as_object_mut)
        .ok_or_else(|| IcringError::MigrationError {
            reason: "built-in network record is not an object".into(),
        })?;
    let tokens = mainnet
        .entry("registeredTokens")
        .or_insert_with(|| json!([]));
    let Value::Array(tokens) = tokens else {
        return Err(IcringError::MigrationError {
            reason: "registeredTokens of the built-in network is not a list".into(),
        });
    };

    for (canister_id, entry, owners) in collected {
        let existing = tokens.iter_mut().find(|t| {
            t.get("canisterId").and_then(Value::as_str) == Some(canister_id.as_str())
        });
        if let Some(existing) = existing {
            merge_owners(existing, &owners);
            continue;
        }
        tokens.push(network_token(&canister_id, &entry, &owners));
    }
    Ok(())
}

fn network_token(canister_id: &str, entry: &Map<String, Value>, owners: &BTreeSet<String>) -> Value {
    let mut token = json!({
        "name": str_field(entry, "name").unwrap_or(canister_id),
        "symbol": str_field(entry, "symbol").unwrap_or_default(),
        "canisterId": canister_id,
        "standard": str_field(entry, "standard")
            .map(str::to_uppercase)
            .unwrap_or_else(|| standards::DIP20.to_owned()),
        "decimals": entry.get("decimals").and_then(Value::as_u64).unwrap_or(FALLBACK_DECIMALS),
        "registeredBy": owners,
    });
    if let Some(fee) = entry.get("fee").and_then(Value::as_u64) {
        token["fee"] = json!(fee);
    }
    if let Some(logo) = str_field(entry, "logo") {
        token["logo"] = json!(logo);
    }
    token
}

fn merge_owners(token: &mut Value, owners: &BTreeSet<String>) {
    let mut merged: BTreeSet<String> = token
        .get("registeredBy")
        .and_then(Value::as_array)
        .map(|list| list.iter().filter_map(Value::as_str).map(str::to_owned).collect())
        .unwrap_or_default();
    merged.extend(owners.iter().cloned());
    token["registeredBy"] = json!(merged);
}

// ---------------------------------------------------------------------------
// 0.17.0: account kind, names and contacts
// ---------------------------------------------------------------------------

fn account_defaults(value: &mut Value, _ctx: &MigrationContext<'_>) -> Result<()> {
    for wallet in wallets_mut(value) {
        wallet.entry("type").or_insert_with(|| json!("MNEMONIC"));
        wallet.entry("icnsData").or_insert_with(|| json!({}));
        wallet.entry("contacts").or_insert_with(|| json!([]));
    }
    Ok(())
}
