// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Per-transaction running state
//!
//! [TxInfo] tracks the transaction being signed, [OriginalTxInfo] each
//! previously signed transaction it replaces.

use sha2::Sha512_256;

use crate::{
    helpers::{
        writers::{write_compact_size, write_tx_input, write_tx_input_check, write_tx_output},
        HashWriter,
    },
    msg::{PrevTx, SignTx, TxInput},
    Error,
};

use super::{family::CoinFamily, matchcheck::ChangeDetector, sig_hasher::SigHasher};

/// Sequence value disabling lock time and replacement
pub const SEQUENCE_FINAL: u32 = 0xffff_ffff;

/// Running consistency digest, covering every signing-relevant field
/// streamed for a transaction
pub type CheckDigest = HashWriter<Sha512_256>;

/// State for the transaction being signed
pub struct TxInfo<H: SigHasher> {
    /// Consistency digest over inputs, then outputs
    h_tx_check: CheckDigest,
    /// Witness and taproot signature hasher
    pub sig_hasher: H,
    /// Change output detection
    pub change_detector: ChangeDetector,
    /// Minimum sequence across all inputs
    min_sequence: u32,
}

impl<H: SigHasher> TxInfo<H> {
    /// Create transaction state with the provided signature hasher
    pub fn new(sig_hasher: H) -> Self {
        Self {
            h_tx_check: CheckDigest::new(),
            sig_hasher,
            change_detector: ChangeDetector::new(),
            min_sequence: SEQUENCE_FINAL,
        }
    }

    /// Add an input with its locking script
    pub fn add_input(&mut self, txi: &TxInput, script_pubkey: &[u8]) -> Result<(), Error> {
        write_tx_input_check(&mut self.h_tx_check, txi)?;

        self.min_sequence = self.min_sequence.min(txi.sequence);

        if txi.script_type.is_internal() {
            self.change_detector.add_input(txi)?;
        }

        self.sig_hasher.add_input(txi, script_pubkey)
    }

    /// Check a re-streamed input against the folded attributes
    pub fn check_input(&self, txi: &TxInput) -> Result<(), Error> {
        match txi.script_type.is_internal() {
            true => self.change_detector.check_input(txi),
            false => Ok(()),
        }
    }

    /// Add an output with its locking script
    pub fn add_output(&mut self, amount: u64, script_pubkey: &[u8]) -> Result<(), Error> {
        write_tx_output(&mut self.h_tx_check, amount, script_pubkey)?;
        self.sig_hasher.add_output(amount, script_pubkey)
    }

    /// Fetch the consistency digest of everything added so far
    pub fn tx_check_digest(&self) -> [u8; 32] {
        self.h_tx_check.digest()
    }

    /// Lock time is disabled when every input sequence is final
    pub fn lock_time_disabled(&self) -> bool {
        self.min_sequence == SEQUENCE_FINAL
    }

    /// Lock time as enforced by consensus
    pub fn effective_lock_time(&self, lock_time: u32) -> u32 {
        match self.lock_time_disabled() {
            true => 0,
            false => lock_time,
        }
    }
}

/// State for an original transaction being replaced
pub struct OriginalTxInfo<H: SigHasher> {
    /// Claimed transaction id
    pub orig_hash: [u8; 32],
    /// Original transaction header
    pub meta: PrevTx,
    /// Next expected input (then output) index
    pub index: u32,
    /// Witness and taproot signature hasher over the original transaction
    pub sig_hasher: H,
    /// First input of ours with its index, for verifying the original
    /// was signed by this wallet
    pub verification_input: Option<(u32, TxInput)>,
    /// Legacy serialization, for recomputing the transaction id
    h_tx: HashWriter,
    /// Consistency digest over inputs, then outputs
    h_tx_check: CheckDigest,
    min_sequence: u32,
}

impl<H: SigHasher> OriginalTxInfo<H> {
    /// Start tracking an original transaction
    pub fn new<F: CoinFamily<Hasher = H>>(
        family: &F,
        orig_hash: [u8; 32],
        meta: PrevTx,
    ) -> Result<Self, Error> {
        let mut h_tx: HashWriter = HashWriter::new();
        family.write_tx_header(&mut h_tx, meta.version, false)?;

        Ok(Self {
            orig_hash,
            meta,
            index: 0,
            sig_hasher: family.create_sig_hasher(),
            verification_input: None,
            h_tx,
            h_tx_check: CheckDigest::new(),
            min_sequence: SEQUENCE_FINAL,
        })
    }

    /// Add the next original input with its locking script
    pub fn add_input(&mut self, txi: &TxInput, script_pubkey: &[u8]) -> Result<(), Error> {
        if self.index == 0 {
            write_compact_size(&mut self.h_tx, self.meta.inputs_count as usize)?;
        }

        write_tx_input(
            &mut self.h_tx,
            &txi.prev_hash,
            txi.prev_index,
            txi.script_sig.as_deref().unwrap_or(&[]),
            txi.sequence,
        )?;
        write_tx_input_check(&mut self.h_tx_check, txi)?;
        self.sig_hasher.add_input(txi, script_pubkey)?;

        if self.verification_input.is_none() && txi.script_type.is_internal() {
            self.verification_input = Some((self.index, txi.clone()));
        }

        self.min_sequence = self.min_sequence.min(txi.sequence);
        self.index += 1;

        Ok(())
    }

    /// Check every original input was streamed, then reset for outputs
    pub fn finish_inputs(&mut self) -> Result<(), Error> {
        if self.index != self.meta.inputs_count {
            #[cfg(feature = "log")]
            log::error!("original inputs removed ({} of {})", self.index, self.meta.inputs_count);

            return Err(Error::OrigRearranged);
        }

        self.index = 0;
        Ok(())
    }

    /// Add the next original output
    pub fn add_output(&mut self, amount: u64, script_pubkey: &[u8]) -> Result<(), Error> {
        if self.index == 0 {
            write_compact_size(&mut self.h_tx, self.meta.outputs_count as usize)?;
        }

        write_tx_output(&mut self.h_tx, amount, script_pubkey)?;
        write_tx_output(&mut self.h_tx_check, amount, script_pubkey)?;
        self.sig_hasher.add_output(amount, script_pubkey)?;
        self.index += 1;

        Ok(())
    }

    /// Fetch the consistency digest of everything added so far
    pub fn tx_check_digest(&self) -> [u8; 32] {
        self.h_tx_check.digest()
    }

    /// Header fields committed to by signatures over the original
    pub fn header(&self) -> SignTx {
        SignTx {
            version: self.meta.version,
            lock_time: self.meta.lock_time,
            inputs_count: self.meta.inputs_count,
            outputs_count: self.meta.outputs_count,
            ..Default::default()
        }
    }

    /// Lock time as enforced by consensus
    pub fn effective_lock_time(&self) -> u32 {
        match self.min_sequence == SEQUENCE_FINAL {
            true => 0,
            false => self.meta.lock_time,
        }
    }

    /// Recompute the transaction id and check it matches the claimed hash
    pub fn finalize_tx_hash<F: CoinFamily>(&mut self, family: &F, double: bool) -> Result<(), Error> {
        if self.index != self.meta.outputs_count {
            return Err(Error::OrigRearranged);
        }

        family.write_tx_footer(&mut self.h_tx, self.meta.lock_time)?;

        if self.h_tx.tx_hash(double, true) != self.orig_hash {
            #[cfg(feature = "log")]
            log::error!("original transaction id mismatch");

            return Err(Error::InvalidOrigHash);
        }

        Ok(())
    }
}
