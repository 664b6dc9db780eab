// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Coin parameter table
//!
//! [CoinInfo] carries the fixed, caller-supplied policy for a signing
//! session: fee caps, supported script families, hashing mode and address
//! encodings.

use bitflags::bitflags;

bitflags! {
    /// Per-coin feature flags
    #[cfg_attr(feature = "serde", derive(serde::Serialize))]
    pub struct CoinFlags: u16 {
        /// Segregated witness inputs / outputs supported
        const SEGWIT = 1 << 0;
        /// Taproot (witness v1) supported
        const TAPROOT = 1 << 1;
        /// Negative fees permitted (reward transactions)
        const NEGATIVE_FEE = 1 << 2;
        /// Transaction and signature hashes use double SHA-256
        const SIGN_HASH_DOUBLE = 1 << 3;
        /// Non-segwit inputs are signed with the BIP-143 digest
        const FORCE_BIP143 = 1 << 4;
    }
}

/// Coin parameters
#[derive(Copy, Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct CoinInfo {
    /// Coin name, matched against [SignTx::coin_name][crate::msg::SignTx]
    pub name: &'static str,
    /// Ticker
    pub shortcut: &'static str,
    /// Display decimals
    pub decimals: u8,
    /// Base58 version for P2PKH addresses
    pub address_type: u32,
    /// Base58 version for P2SH addresses
    pub address_type_p2sh: u32,
    /// Bech32 human readable part for segwit addresses
    pub bech32_prefix: Option<&'static str>,
    /// Maximum fee in satoshi per 1000 virtual bytes before prompting
    pub maxfee_kb: u64,
    /// Replay protection fork id
    pub fork_id: Option<u32>,
    /// SLIP-0044 coin type
    pub slip44: u32,
    /// Feature flags
    pub flags: CoinFlags,
}

impl CoinInfo {
    pub fn segwit(&self) -> bool {
        self.flags.contains(CoinFlags::SEGWIT)
    }

    pub fn taproot(&self) -> bool {
        self.flags.contains(CoinFlags::TAPROOT)
    }

    pub fn negative_fee(&self) -> bool {
        self.flags.contains(CoinFlags::NEGATIVE_FEE)
    }

    pub fn sign_hash_double(&self) -> bool {
        self.flags.contains(CoinFlags::SIGN_HASH_DOUBLE)
    }

    pub fn force_bip143(&self) -> bool {
        self.flags.contains(CoinFlags::FORCE_BIP143)
    }
}

/// Bitcoin mainnet
pub const BITCOIN: CoinInfo = CoinInfo {
    name: "Bitcoin",
    shortcut: "BTC",
    decimals: 8,
    address_type: 0x00,
    address_type_p2sh: 0x05,
    bech32_prefix: Some("bc"),
    maxfee_kb: 2_000_000,
    fork_id: None,
    slip44: 0,
    flags: CoinFlags::from_bits_truncate(
        CoinFlags::SEGWIT.bits() | CoinFlags::TAPROOT.bits() | CoinFlags::SIGN_HASH_DOUBLE.bits(),
    ),
};

/// Bitcoin testnet
pub const TESTNET: CoinInfo = CoinInfo {
    name: "Testnet",
    shortcut: "TEST",
    address_type: 0x6f,
    address_type_p2sh: 0xc4,
    bech32_prefix: Some("tb"),
    maxfee_kb: 10_000_000,
    slip44: 1,
    ..BITCOIN
};

/// Bitcoin regtest
pub const REGTEST: CoinInfo = CoinInfo {
    name: "Regtest",
    shortcut: "REGTEST",
    bech32_prefix: Some("bcrt"),
    ..TESTNET
};

/// Bitcoin Cash, replay protected via fork id
pub const BCASH: CoinInfo = CoinInfo {
    name: "Bcash",
    shortcut: "BCH",
    decimals: 8,
    address_type: 0x00,
    address_type_p2sh: 0x05,
    bech32_prefix: None,
    maxfee_kb: 500_000,
    fork_id: Some(0),
    slip44: 145,
    flags: CoinFlags::from_bits_truncate(
        CoinFlags::SIGN_HASH_DOUBLE.bits() | CoinFlags::FORCE_BIP143.bits(),
    ),
};

const COINS: &[CoinInfo] = &[BITCOIN, TESTNET, REGTEST, BCASH];

/// Look up built-in coin parameters by name
pub fn by_name(name: &str) -> Option<&'static CoinInfo> {
    COINS.iter().find(|c| c.name == name)
}
