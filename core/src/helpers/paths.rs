// Copyright (c) 2022-2023 The MobileCoin Foundation

//! BIP-32 path helpers

use crate::{coin::CoinInfo, msg::InputScriptType};

/// Hardened derivation flag
pub const HARDENED: u32 = 0x8000_0000;

/// Number of trailing path levels below the account (chain / index)
pub const BIP32_WALLET_DEPTH: usize = 2;

/// Highest chain index accepted for change (0: receive, 1: change)
pub const BIP32_CHANGE_CHAIN: u32 = 1;

/// Highest address index accepted for change
pub const BIP32_MAX_LAST_ELEMENT: u32 = 1_000_000;

/// Maximum accepted path depth
pub const MAX_PATH_DEPTH: usize = 8;

/// Harden a path element
pub const fn h(i: u32) -> u32 {
    i | HARDENED
}

/// Check whether a path follows the standard account layout
/// (`purpose' / coin_type' / account' / chain / index`) for its script type.
///
/// Paths that fail this check are not rejected, only flagged for an
/// explicit foreign path confirmation.
pub fn validate_path_against_script_type(
    coin: &CoinInfo,
    script_type: InputScriptType,
    multisig: bool,
    path: &[u32],
) -> bool {
    let purpose = match path.first() {
        Some(p) => *p,
        None => return false,
    };

    let purpose_ok = match script_type {
        InputScriptType::SpendAddress if !multisig => purpose == h(44),
        InputScriptType::SpendAddress | InputScriptType::SpendMultisig => {
            purpose == h(48) || purpose == h(45)
        }
        InputScriptType::SpendP2shWitness => purpose == h(49) || (multisig && purpose == h(48)),
        InputScriptType::SpendWitness => purpose == h(84) || (multisig && purpose == h(48)),
        InputScriptType::SpendTaproot => purpose == h(86),
        InputScriptType::External => false,
    };

    // BIP-45 paths carry no coin or account levels
    if purpose == h(45) {
        return purpose_ok && path.len() == 3;
    }

    let depth_ok = if purpose == h(48) {
        path.len() == 6
    } else {
        path.len() == 5
    };

    purpose_ok
        && depth_ok
        && path[1] == h(coin.slip44)
        && path[2] & HARDENED != 0
        && path[path.len() - 2] <= BIP32_CHANGE_CHAIN
        && path[path.len() - 1] <= BIP32_MAX_LAST_ELEMENT
}
