// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Signature digests
//!
//! Witness (BIP-143) and taproot (BIP-341) digests are computed from
//! accumulators populated while inputs and outputs are first streamed, so no
//! re-streaming is required to sign. Legacy digests are instead computed by
//! re-serializing the transaction, see [LegacyHasher].

use crate::{
    coin::CoinInfo,
    helpers::{
        writers::{
            write_bytes_prefixed, write_bytes_reversed, write_tx_input, write_tx_output, write_u32,
            write_u64, write_u8, TxWriter,
        },
        HashWriter,
    },
    msg::{SignTx, TxInput},
    Error,
};

/// Taproot key-path spends without annex
const TAPROOT_SPEND_TYPE: u8 = 0;

/// Signature hash epoch
const TAPROOT_EPOCH: u8 = 0;

/// [`SigHasher`] accumulates per-transaction state for witness style digests
pub trait SigHasher {
    /// Add an input with its locking script
    fn add_input(&mut self, txi: &TxInput, script_pubkey: &[u8]) -> Result<(), Error>;

    /// Add a serialized output
    fn add_output(&mut self, amount: u64, script_pubkey: &[u8]) -> Result<(), Error>;

    /// Compute the BIP-143 digest for an input
    fn hash143(
        &self,
        txi: &TxInput,
        script_code: &[u8],
        tx: &SignTx,
        coin: &CoinInfo,
        hash_type: u32,
    ) -> Result<[u8; 32], Error>;

    /// Compute the BIP-341 key-path digest for an input
    fn hash341(&self, index: u32, tx: &SignTx, hash_type: u8) -> Result<[u8; 32], Error>;
}

/// Bitcoin BIP-143 / BIP-341 signature hasher
#[derive(Clone, Default)]
pub struct BitcoinSigHasher {
    prevouts: HashWriter,
    amounts: HashWriter,
    scriptpubkeys: HashWriter,
    sequences: HashWriter,
    outputs: HashWriter,
}

impl BitcoinSigHasher {
    /// Create a new (empty) hasher
    pub fn new() -> Self {
        Self::default()
    }
}

impl SigHasher for BitcoinSigHasher {
    fn add_input(&mut self, txi: &TxInput, script_pubkey: &[u8]) -> Result<(), Error> {
        write_bytes_reversed(&mut self.prevouts, &txi.prev_hash)?;
        write_u32(&mut self.prevouts, txi.prev_index)?;
        write_u64(&mut self.amounts, txi.amount)?;
        write_bytes_prefixed(&mut self.scriptpubkeys, script_pubkey)?;
        write_u32(&mut self.sequences, txi.sequence)
    }

    fn add_output(&mut self, amount: u64, script_pubkey: &[u8]) -> Result<(), Error> {
        write_tx_output(&mut self.outputs, amount, script_pubkey)
    }

    fn hash143(
        &self,
        txi: &TxInput,
        script_code: &[u8],
        tx: &SignTx,
        coin: &CoinInfo,
        hash_type: u32,
    ) -> Result<[u8; 32], Error> {
        let mut h: HashWriter = HashWriter::new();

        write_u32(&mut h, tx.version)?;
        h.update(&self.prevouts.tx_hash(true, false));
        h.update(&self.sequences.tx_hash(true, false));

        write_bytes_reversed(&mut h, &txi.prev_hash)?;
        write_u32(&mut h, txi.prev_index)?;
        write_bytes_prefixed(&mut h, script_code)?;
        write_u64(&mut h, txi.amount)?;
        write_u32(&mut h, txi.sequence)?;

        h.update(&self.outputs.tx_hash(true, false));
        write_u32(&mut h, tx.lock_time)?;
        write_u32(&mut h, hash_type)?;

        Ok(h.tx_hash(coin.sign_hash_double(), false))
    }

    fn hash341(&self, index: u32, tx: &SignTx, hash_type: u8) -> Result<[u8; 32], Error> {
        let mut h = HashWriter::tagged(b"TapSighash");

        write_u8(&mut h, TAPROOT_EPOCH)?;
        write_u8(&mut h, hash_type)?;
        write_u32(&mut h, tx.version)?;
        write_u32(&mut h, tx.lock_time)?;

        h.update(&self.prevouts.digest());
        h.update(&self.amounts.digest());
        h.update(&self.scriptpubkeys.digest());
        h.update(&self.sequences.digest());
        h.update(&self.outputs.digest());

        write_u8(&mut h, TAPROOT_SPEND_TYPE)?;
        write_u32(&mut h, index)?;

        Ok(h.digest())
    }
}

/// Legacy digest over a full re-serialization of the transaction, with the
/// script code substituted for the input being signed and empty scripts for
/// all others
#[derive(Clone, Default)]
pub struct LegacyHasher {
    h: HashWriter,
}

impl LegacyHasher {
    /// Create a new (empty) legacy hasher
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an input, substituting `script_code` only for the signing input
    pub fn add_input(
        &mut self,
        txi: &TxInput,
        script_code: Option<&[u8]>,
    ) -> Result<(), Error> {
        write_tx_input(
            &mut self.h,
            &txi.prev_hash,
            txi.prev_index,
            script_code.unwrap_or(&[]),
            txi.sequence,
        )
    }

    /// Finalise the digest, appending the hash type
    pub fn finalize(mut self, coin: &CoinInfo, hash_type: u32) -> Result<[u8; 32], Error> {
        write_u32(&mut self.h, hash_type)?;
        Ok(self.h.tx_hash(coin.sign_hash_double(), false))
    }
}

impl TxWriter for LegacyHasher {
    fn write_bytes(&mut self, b: &[u8]) -> Result<(), Error> {
        self.h.write_bytes(b)
    }
}
