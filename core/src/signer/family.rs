// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Coin family strategies
//!
//! A [CoinFamily] supplies the per-coin serialization and sighash
//! composition, selected once when a session is constructed.

use crate::{
    helpers::{
        scripts::SIGHASH_ALL_TAPROOT,
        writers::{write_u32, write_u8, TxWriter},
    },
    msg::{InputScriptType, PrevOutput, TxInput},
    Error,
};

use super::sig_hasher::{BitcoinSigHasher, SigHasher};

/// Sign all inputs and outputs
pub const SIGHASH_ALL: u32 = 0x01;

/// Replay protection flag for fork id coins
pub const SIGHASH_FORKID: u32 = 0x40;

/// Segwit serialization marker and flag
const SEGWIT_MARKER: u8 = 0x00;
const SEGWIT_FLAG: u8 = 0x01;

/// [`CoinFamily`] trait provides coin specific serialization and hashing
pub trait CoinFamily {
    /// Witness / taproot signature hasher
    type Hasher: SigHasher;

    /// Create a signature hasher for a new session
    fn create_sig_hasher(&self) -> Self::Hasher;

    /// Write the transaction header, with segwit marker when `witness` is set
    fn write_tx_header<W: TxWriter + ?Sized>(
        &self,
        w: &mut W,
        version: u32,
        witness: bool,
    ) -> Result<(), Error> {
        write_u32(w, version)?;
        if witness {
            write_u8(w, SEGWIT_MARKER)?;
            write_u8(w, SEGWIT_FLAG)?;
        }
        Ok(())
    }

    /// Write the transaction footer
    fn write_tx_footer<W: TxWriter + ?Sized>(&self, w: &mut W, lock_time: u32) -> Result<(), Error> {
        write_u32(w, lock_time)
    }

    /// Write the footer of a previous transaction, extra data follows
    fn write_prev_tx_footer<W: TxWriter + ?Sized>(
        &self,
        w: &mut W,
        lock_time: u32,
    ) -> Result<(), Error> {
        self.write_tx_footer(w, lock_time)
    }

    /// Sighash type for an input
    fn sighash_type(&self, txi: &TxInput) -> u32;

    /// Non-segwit inputs are signed with the BIP-143 digest
    fn force_bip143(&self) -> bool {
        false
    }

    /// Hook called when a negative fee is permitted by the coin
    fn on_negative_fee(&self) -> Result<(), Error> {
        Ok(())
    }

    /// Hook to check outputs of previous transactions
    fn check_prevtx_output(&self, _txo: &PrevOutput) -> Result<(), Error> {
        Ok(())
    }
}

/// Bitcoin and its direct derivatives
#[derive(Copy, Clone, PartialEq, Debug, Default)]
pub struct Bitcoin;

impl CoinFamily for Bitcoin {
    type Hasher = BitcoinSigHasher;

    fn create_sig_hasher(&self) -> Self::Hasher {
        BitcoinSigHasher::new()
    }

    fn sighash_type(&self, txi: &TxInput) -> u32 {
        match txi.script_type {
            InputScriptType::SpendTaproot => SIGHASH_ALL_TAPROOT as u32,
            _ => SIGHASH_ALL,
        }
    }
}

/// Replay protected forks, folding the fork id into the sighash type and
/// signing every input with the BIP-143 digest
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct ForkId {
    pub fork_id: u32,
    pub force_bip143: bool,
}

impl CoinFamily for ForkId {
    type Hasher = BitcoinSigHasher;

    fn create_sig_hasher(&self) -> Self::Hasher {
        BitcoinSigHasher::new()
    }

    fn sighash_type(&self, _txi: &TxInput) -> u32 {
        SIGHASH_ALL | (self.fork_id << 8) | SIGHASH_FORKID
    }

    fn force_bip143(&self) -> bool {
        self.force_bip143
    }
}

#[cfg(test)]
mod test {
    use alloc::vec::Vec;

    use super::*;

    #[test]
    fn sighash_types() {
        let txi = TxInput::default();
        let tr = TxInput {
            script_type: InputScriptType::SpendTaproot,
            ..Default::default()
        };

        assert_eq!(Bitcoin.sighash_type(&txi), 0x01);
        assert_eq!(Bitcoin.sighash_type(&tr), 0x00);

        let bch = ForkId {
            fork_id: 0,
            force_bip143: true,
        };
        assert_eq!(bch.sighash_type(&txi), 0x41);

        let btg = ForkId {
            fork_id: 79,
            force_bip143: true,
        };
        assert_eq!(btg.sighash_type(&txi), 0x4f41);
    }

    #[test]
    fn headers() {
        let mut w = Vec::new();
        Bitcoin.write_tx_header(&mut w, 2, true).unwrap();
        assert_eq!(w, [2, 0, 0, 0, 0, 1]);

        let mut w = Vec::new();
        Bitcoin.write_tx_header(&mut w, 1, false).unwrap();
        Bitcoin.write_tx_footer(&mut w, 0x11).unwrap();
        assert_eq!(w, [1, 0, 0, 0, 0x11, 0, 0, 0]);
    }
}
