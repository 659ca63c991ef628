//! Built-in network constants and default tokens.

use crate::token::{standards, StandardToken};

/// Identifier of the built-in public network.
pub const MAINNET_ID: &str = "mainnet";

/// Display name of the built-in public network.
pub const MAINNET_NAME: &str = "Mainnet";

/// ICP ledger canister.
pub const ICP_LEDGER_CANISTER_ID: &str = "ryjl3-tyaaa-aaaaa-aaaba-cai";

/// Cycles token canister.
pub const XTC_CANISTER_ID: &str = "aanaa-xaaaa-aaaah-aaeiq-cai";

/// Wrapped ICP canister.
pub const WICP_CANISTER_ID: &str = "utozz-siaaa-aaaam-qaaxq-cai";

/// Text length of a canister reference (10-byte opaque principal).
pub const CANISTER_ID_TEXT_LEN: usize = 27;

/// The ledger token of a network.
pub fn icp_token(ledger_canister_id: &str) -> StandardToken {
    StandardToken {
        name: "ICP".into(),
        symbol: "ICP".into(),
        canister_id: ledger_canister_id.into(),
        standard: standards::ICP.into(),
        decimals: 8,
        fee: None,
        logo: None,
    }
}

/// Default assets of the built-in network.
pub fn mainnet_tokens() -> Vec<StandardToken> {
    vec![
        icp_token(ICP_LEDGER_CANISTER_ID),
        StandardToken {
            name: "Cycles".into(),
            symbol: "XTC".into(),
            canister_id: XTC_CANISTER_ID.into(),
            standard: standards::DIP20.into(),
            decimals: 12,
            fee: None,
            logo: None,
        },
        StandardToken {
            name: "Wrapped ICP".into(),
            symbol: "WICP".into(),
            canister_id: WICP_CANISTER_ID.into(),
            standard: standards::DIP20.into(),
            decimals: 8,
            fee: None,
            logo: None,
        },
    ]
}

/// Looks up a built-in token by canister reference.
pub fn mainnet_token(canister_id: &str) -> Option<StandardToken> {
    mainnet_tokens().into_iter().find(|t| t.canister_id == canister_id)
}
