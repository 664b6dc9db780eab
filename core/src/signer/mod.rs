// Copyright (c) 2022-2023 The MobileCoin Foundation

//! The [Signer] streams a transaction from the host and signs it.
//!
//! Signing runs as a sequence of passes over host-supplied data, with only
//! running digests and counters retained between requests:
//!
//! 1. [State::ProcessInputs] fetches each input, verifying its previous
//!    transaction and any original transaction it is carried over from
//! 2. [State::ConfirmOutputs] fetches each output, detecting change and
//!    raising confirmations through the [Approver]
//! 3. [State::ConfirmTotals] has the [Approver] approve the totals
//! 4. [State::VerifyInputs] re-streams inputs, verifying the signatures of
//!    presigned external inputs and of each original transaction
//! 5. [State::SerializeInputs] re-streams inputs, emitting the serialized
//!    transaction and signing legacy inputs
//! 6. [State::SerializeOutputs] re-streams outputs
//! 7. [State::SignWitnessInputs] re-streams inputs, signing segwit and
//!    taproot inputs and emitting witnesses
//! 8. [State::Finish] emits the footer
//!
//! Data re-streamed in later passes is checked against digests computed in
//! the first two, failing with [Error::TxChanged] on any difference.

use alloc::vec::Vec;

use heapless::Vec as HVec;
use secp256k1::{All, Secp256k1};
use static_assertions::const_assert;
use strum::{Display, EnumIter, EnumString, EnumVariantNames};

use crate::{
    authorization::CoinJoinAuthorization,
    coin::CoinInfo,
    config::SignerConfig,
    helpers::{
        address, hash160, multisig, scripts, sha256,
        writers::{
            write_compact_size, write_tx_input, write_tx_input_check, write_tx_output, write_u8,
            TxWriter,
        },
        HashWriter,
    },
    keychain::{Keychain, SigningKey},
    msg::{
        InputScriptType, MultisigRedeemScript, OutputScriptType, SignTx, TxInput, TxOutput,
        SERIALIZED_CHUNK_SIZE,
    },
    ui::Ui,
    Error,
};

pub mod approvers;
use approvers::{Approver, BasicApprover, CoinJoinApprover};

pub mod family;
use family::{Bitcoin, CoinFamily, ForkId};

pub mod matchcheck;

pub mod payment_request;

mod port;
pub use port::{Chunk, HostPort, TxPort};

pub mod sanitize;
use sanitize::{sanitize_prev_tx, sanitize_sign_tx, sanitize_tx_input, sanitize_tx_output};

pub mod sig_hasher;
use sig_hasher::{LegacyHasher, SigHasher};

pub mod tx_info;
use tx_info::{CheckDigest, OriginalTxInfo, TxInfo};

pub mod tx_weight;

pub mod verifier;
use verifier::{SignatureVerifier, SpendKind};

/// Maximum number of original transactions replaced by one transaction
pub const MAX_ORIG_TXS: usize = 4;

/// Maximum extra data requested per chunk
pub const MAX_EXTRA_DATA_CHUNK: u32 = 1024;

const_assert!(MAX_EXTRA_DATA_CHUNK as usize <= SERIALIZED_CHUNK_SIZE);

/// Signer state enumeration
#[derive(Copy, Clone, PartialEq, Debug, EnumString, Display, EnumVariantNames, EnumIter)]
pub enum State {
    /// Session created, nothing requested
    Init,
    /// Fetching and verifying inputs
    ProcessInputs,
    /// Fetching and confirming outputs
    ConfirmOutputs,
    /// Approving totals
    ConfirmTotals,
    /// Verifying existing signatures
    VerifyInputs,
    /// Serializing inputs, signing legacy inputs
    SerializeInputs,
    /// Serializing outputs
    SerializeOutputs,
    /// Signing segwit and taproot inputs
    SignWitnessInputs,
    /// Writing the footer
    Finish,
    /// Signing complete
    Complete,
    /// Signing failed
    Error,
}

impl State {
    /// Fetch the state following this one, if any
    pub fn next(&self) -> Option<State> {
        let s = match self {
            State::Init => State::ProcessInputs,
            State::ProcessInputs => State::ConfirmOutputs,
            State::ConfirmOutputs => State::ConfirmTotals,
            State::ConfirmTotals => State::VerifyInputs,
            State::VerifyInputs => State::SerializeInputs,
            State::SerializeInputs => State::SerializeOutputs,
            State::SerializeOutputs => State::SignWitnessInputs,
            State::SignWitnessInputs => State::Finish,
            State::Finish => State::Complete,
            State::Complete | State::Error => return None,
        };
        Some(s)
    }
}

/// Sign a transaction, streaming data from the host via `port`.
///
/// The coin family is selected from the coin parameters, and approval is
/// automated under `authorization` when provided.
pub fn sign_tx<K: Keychain, U: Ui, P: TxPort>(
    tx: SignTx,
    coin: &CoinInfo,
    config: &SignerConfig,
    keychain: K,
    ui: U,
    port: P,
    authorization: Option<&mut CoinJoinAuthorization>,
) -> Result<(), Error> {
    sanitize_sign_tx(&tx, coin)?;

    #[cfg(feature = "log")]
    log::info!(
        "signing {} transaction ({} inputs, {} outputs)",
        coin.name,
        tx.inputs_count,
        tx.outputs_count
    );

    let p = Parts {
        tx,
        coin,
        config,
        keychain,
        ui,
        port,
    };

    match coin.fork_id {
        Some(fork_id) => {
            let family = ForkId {
                fork_id,
                force_bip143: coin.force_bip143(),
            };
            run(p, family, authorization)
        }
        None => run(p, Bitcoin, authorization),
    }
}

/// Session collaborators, prior to approver selection
struct Parts<'a, K, U, P> {
    tx: SignTx,
    coin: &'a CoinInfo,
    config: &'a SignerConfig,
    keychain: K,
    ui: U,
    port: P,
}

fn run<F: CoinFamily, K: Keychain, U: Ui, P: TxPort>(
    p: Parts<'_, K, U, P>,
    family: F,
    authorization: Option<&mut CoinJoinAuthorization>,
) -> Result<(), Error> {
    match authorization {
        Some(a) => {
            let approver = CoinJoinApprover::new(&p.tx, p.coin, a)?;
            Signer::new(p, family, approver).sign()
        }
        None => {
            let approver = BasicApprover::new(&p.tx, p.coin, p.config.safety_checks);
            Signer::new(p, family, approver).sign()
        }
    }
}

/// Streaming transaction signer
pub struct Signer<'a, F: CoinFamily, A: Approver, K: Keychain, U: Ui, P: TxPort> {
    state: State,

    tx: SignTx,
    coin: &'a CoinInfo,
    config: &'a SignerConfig,

    family: F,
    approver: A,
    keychain: K,
    ui: U,
    port: HostPort<P>,

    secp: Secp256k1<All>,

    tx_info: TxInfo<F::Hasher>,
    orig_txs: HVec<OriginalTxInfo<F::Hasher>, MAX_ORIG_TXS>,

    /// Check digest after inputs, from the first pass
    h_inputs: [u8; 32],
    /// Check digest after outputs, from the first pass
    h_tx: [u8; 32],
    /// Running check digest of the current pass
    h_check: CheckDigest,

    /// Any input carries witness data
    has_segwit: bool,
}

impl<'a, F: CoinFamily, A: Approver, K: Keychain, U: Ui, P: TxPort> Signer<'a, F, A, K, U, P> {
    fn new(p: Parts<'a, K, U, P>, family: F, approver: A) -> Self {
        let sig_hasher = family.create_sig_hasher();

        Self {
            state: State::Init,
            tx: p.tx,
            coin: p.coin,
            config: p.config,
            family,
            approver,
            keychain: p.keychain,
            ui: p.ui,
            port: HostPort::new(p.port),
            secp: Secp256k1::new(),
            tx_info: TxInfo::new(sig_hasher),
            orig_txs: HVec::new(),
            h_inputs: [0u8; 32],
            h_tx: [0u8; 32],
            h_check: CheckDigest::new(),
            has_segwit: false,
        }
    }

    /// Fetch the current signer state
    pub fn state(&self) -> State {
        self.state
    }

    /// Run every pass to completion
    pub fn sign(mut self) -> Result<(), Error> {
        while self.state != State::Complete {
            self.step()?;
        }
        Ok(())
    }

    /// Run the current pass, advancing to the next state
    pub fn step(&mut self) -> Result<State, Error> {
        let r = match self.state {
            State::Init => Ok(()),
            State::ProcessInputs => self.process_inputs(),
            State::ConfirmOutputs => self.confirm_outputs(),
            State::ConfirmTotals => self.confirm_totals(),
            State::VerifyInputs => self.verify_inputs(),
            State::SerializeInputs => self.serialize_inputs(),
            State::SerializeOutputs => self.serialize_outputs(),
            State::SignWitnessInputs => self.sign_witness_inputs(),
            State::Finish => self.finish(),
            State::Complete | State::Error => Err(Error::InvalidState),
        };

        let r = r.and_then(|_| match self.state.next() {
            Some(s) => self.transition(s),
            None => Err(Error::InvalidState),
        });

        match r {
            Ok(()) => Ok(self.state),
            Err(e) => {
                #[cfg(feature = "log")]
                log::error!("signing failed in state {}: {:?}", self.state, e);

                self.state = State::Error;
                Err(e)
            }
        }
    }

    /// Move to the provided state, only the next state in sequence is valid
    fn transition(&mut self, to: State) -> Result<(), Error> {
        if self.state.next() != Some(to) {
            #[cfg(feature = "log")]
            log::error!("invalid transition {} -> {}", self.state, to);

            return Err(Error::InvalidState);
        }

        #[cfg(feature = "log")]
        log::debug!("state {} -> {}", self.state, to);

        self.state = to;
        Ok(())
    }

    /// First pass over inputs
    fn process_inputs(&mut self) -> Result<(), Error> {
        for i in 0..self.tx.inputs_count {
            let txi = self.port.tx_input(i)?;
            sanitize_tx_input(&txi, self.coin)?;

            let script_pubkey = self.input_script_pubkey(&txi)?;

            if txi.script_type.is_segwit() || txi.witness.is_some() {
                self.has_segwit = true;
            }

            self.tx_info.add_input(&txi, &script_pubkey)?;

            match txi.script_type.is_internal() {
                true => self.approver.add_internal_input(&mut self.ui, &txi)?,
                false => self.approver.add_external_input(&mut self.ui, &txi)?,
            }

            self.verify_prev_tx(&txi, &script_pubkey)?;

            if let Some(orig_hash) = txi.orig_hash {
                self.process_original_input(&txi, orig_hash, &script_pubkey)?;
            }
        }

        self.h_inputs = self.tx_info.tx_check_digest();

        for o in self.orig_txs.iter_mut() {
            o.finish_inputs()?;
        }

        self.approver.approve_orig_txids(&mut self.ui, &self.orig_txs)
    }

    /// Stream a previous transaction, checking it hashes to the claimed id
    /// and that the spent output matches the input
    fn verify_prev_tx(&mut self, txi: &TxInput, script_pubkey: &[u8]) -> Result<(), Error> {
        let prev_hash = txi.prev_hash;

        let meta = self.port.tx_meta(&prev_hash)?;
        sanitize_prev_tx(&meta)?;

        if txi.prev_index >= meta.outputs_count {
            #[cfg(feature = "log")]
            log::error!("prev_index {} out of range", txi.prev_index);

            return Err(Error::InvalidPrevIndex);
        }

        let mut h: HashWriter = HashWriter::new();
        self.family.write_tx_header(&mut h, meta.version, false)?;

        write_compact_size(&mut h, meta.inputs_count as usize)?;
        for i in 0..meta.inputs_count {
            let pi = self.port.prev_input(&prev_hash, i)?;
            write_tx_input(&mut h, &pi.prev_hash, pi.prev_index, &pi.script_sig, pi.sequence)?;
        }

        write_compact_size(&mut h, meta.outputs_count as usize)?;
        for i in 0..meta.outputs_count {
            let po = self.port.prev_output(&prev_hash, i)?;
            write_tx_output(&mut h, po.amount, &po.script_pubkey)?;

            if i != txi.prev_index {
                continue;
            }

            self.family.check_prevtx_output(&po)?;

            if po.amount != txi.amount {
                #[cfg(feature = "log")]
                log::error!("input {} amount mismatch", txi.prev_index);

                return Err(Error::InvalidAmount);
            }

            if po.script_pubkey != script_pubkey {
                return Err(Error::InvalidPrevScript);
            }
        }

        self.family.write_prev_tx_footer(&mut h, meta.lock_time)?;

        let mut offset = 0;
        while offset < meta.extra_data_len {
            let len = (meta.extra_data_len - offset).min(MAX_EXTRA_DATA_CHUNK);
            let d = self.port.extra_data(&prev_hash, offset, len)?;
            h.update(&d);
            offset += len;
        }

        if h.tx_hash(self.coin.sign_hash_double(), true) != prev_hash {
            #[cfg(feature = "log")]
            log::error!("previous transaction hash mismatch");

            return Err(Error::InvalidPrevHash);
        }

        Ok(())
    }

    /// Match an input against the original transaction it is carried over from
    fn process_original_input(
        &mut self,
        txi: &TxInput,
        orig_hash: [u8; 32],
        script_pubkey: &[u8],
    ) -> Result<(), Error> {
        let pos = match self.orig_txs.iter().position(|o| o.orig_hash == orig_hash) {
            Some(p) => p,
            None => {
                let meta = self.port.tx_meta(&orig_hash)?;
                sanitize_prev_tx(&meta)?;

                let o = OriginalTxInfo::new(&self.family, orig_hash, meta)?;
                self.orig_txs.push(o).map_err(|_| Error::TooManyOrigTxs)?;
                self.orig_txs.len() - 1
            }
        };

        // Original inputs are carried over in order
        let index = self.orig_txs[pos].index;
        if txi.orig_index != Some(index) {
            #[cfg(feature = "log")]
            log::error!("original input {:?} out of order, expected {}", txi.orig_index, index);

            return Err(Error::OrigRearranged);
        }

        let orig_txi = self.port.orig_input(&orig_hash, index)?;

        if orig_txi.prev_hash != txi.prev_hash
            || orig_txi.prev_index != txi.prev_index
            || orig_txi.amount != txi.amount
            || orig_txi.script_type != txi.script_type
            || orig_txi.address_n != txi.address_n
            || orig_txi.multisig != txi.multisig
            || orig_txi.script_pubkey != txi.script_pubkey
        {
            #[cfg(feature = "log")]
            log::error!("original input does not match current input");

            return Err(Error::InvalidReplacement);
        }

        self.orig_txs[pos].add_input(&orig_txi, script_pubkey)
    }

    /// First pass over outputs
    fn confirm_outputs(&mut self) -> Result<(), Error> {
        let mut payment_req_index = None;
        let mut payment_req_next = 0;

        for i in 0..self.tx.outputs_count {
            let txo = self.port.tx_output(i)?;
            sanitize_tx_output(&txo, self.coin)?;

            let script_pubkey = self.output_script_pubkey(&txo)?;

            // Payment requests cover contiguous runs of outputs
            if txo.payment_req_index != payment_req_index {
                if payment_req_index.is_some() {
                    self.approver.finish_payment_request(&self.secp)?;
                }

                if let Some(n) = txo.payment_req_index {
                    if n != payment_req_next {
                        return Err(Error::InvalidPaymentRequest);
                    }

                    let req = self.port.payment_request(n)?;
                    let key = self.config.payment_request_key.as_deref();
                    self.approver.add_payment_request(&mut self.ui, &req, key)?;

                    payment_req_next += 1;
                }

                payment_req_index = txo.payment_req_index;
            }

            let orig_txo = match (txo.orig_hash, txo.orig_index) {
                (Some(h), Some(n)) => Some(self.process_original_output(h, n, &script_pubkey)?),
                _ => None,
            };

            let is_change = txo.payment_req_index.is_none()
                && self.tx_info.change_detector.is_change_output(&txo)?;

            // Change may only replace change
            if let Some(o) = &orig_txo {
                if is_change && !self.tx_info.change_detector.is_change_output(o)? {
                    #[cfg(feature = "log")]
                    log::error!("change output replaces an original external output");

                    return Err(Error::InvalidReplacement);
                }
            }

            match is_change {
                true => self.approver.add_change_output(&txo, &script_pubkey)?,
                false => self.approver.add_external_output(
                    &mut self.ui,
                    &txo,
                    &script_pubkey,
                    orig_txo.as_ref(),
                )?,
            }

            self.tx_info.add_output(txo.amount, &script_pubkey)?;
        }

        if payment_req_index.is_some() {
            self.approver.finish_payment_request(&self.secp)?;
        }

        // Remaining original outputs were removed
        for pos in 0..self.orig_txs.len() {
            let outputs_count = self.orig_txs[pos].meta.outputs_count;
            self.skip_original_outputs(pos, outputs_count)?;

            let double = self.coin.sign_hash_double();
            self.orig_txs[pos].finalize_tx_hash(&self.family, double)?;
        }

        self.h_tx = self.tx_info.tx_check_digest();

        Ok(())
    }

    /// Match an output against the original output it amends, returning the
    /// original output
    fn process_original_output(
        &mut self,
        orig_hash: [u8; 32],
        orig_index: u32,
        script_pubkey: &[u8],
    ) -> Result<TxOutput, Error> {
        let pos = match self.orig_txs.iter().position(|o| o.orig_hash == orig_hash) {
            Some(p) => p,
            None => {
                #[cfg(feature = "log")]
                log::error!("output references unknown original transaction");

                return Err(Error::InvalidReplacement);
            }
        };

        self.skip_original_outputs(pos, orig_index)?;

        if self.orig_txs[pos].index != orig_index {
            return Err(Error::OrigRearranged);
        }

        let (orig_txo, orig_script) = self.fetch_original_output(&orig_hash, orig_index)?;
        if orig_script != script_pubkey {
            #[cfg(feature = "log")]
            log::error!("output script does not match original output");

            return Err(Error::InvalidReplacement);
        }

        self.add_original_output(pos, &orig_txo, &orig_script)?;

        Ok(orig_txo)
    }

    /// Consume original outputs up to `until`, each must be change
    fn skip_original_outputs(&mut self, pos: usize, until: u32) -> Result<(), Error> {
        while self.orig_txs[pos].index < until {
            let orig_hash = self.orig_txs[pos].orig_hash;
            let index = self.orig_txs[pos].index;

            let (orig_txo, orig_script) = self.fetch_original_output(&orig_hash, index)?;

            if !self.tx_info.change_detector.is_change_output(&orig_txo)? {
                #[cfg(feature = "log")]
                log::error!("original external output {} removed", index);

                return Err(Error::OrigRearranged);
            }

            self.add_original_output(pos, &orig_txo, &orig_script)?;
        }

        Ok(())
    }

    fn fetch_original_output(
        &mut self,
        orig_hash: &[u8; 32],
        index: u32,
    ) -> Result<(TxOutput, Vec<u8>), Error> {
        let txo = self.port.orig_output(orig_hash, index)?;
        sanitize_tx_output(&txo, self.coin)?;

        let script_pubkey = self.output_script_pubkey(&txo)?;

        Ok((txo, script_pubkey))
    }

    fn add_original_output(
        &mut self,
        pos: usize,
        orig_txo: &TxOutput,
        orig_script: &[u8],
    ) -> Result<(), Error> {
        match self.tx_info.change_detector.is_change_output(orig_txo)? {
            true => self.approver.add_orig_change_output(orig_txo)?,
            false => self.approver.add_orig_external_output(orig_txo)?,
        }

        self.orig_txs[pos].add_output(orig_txo.amount, orig_script)
    }

    /// Check funds and approve the transaction
    fn confirm_totals(&mut self) -> Result<(), Error> {
        let fee = self.approver.base().totals.fee()?;

        if fee < 0 {
            if !self.coin.negative_fee() {
                #[cfg(feature = "log")]
                log::error!("outputs exceed inputs by {}", fee.unsigned_abs());

                return Err(Error::NotEnoughFunds);
            }
            self.family.on_negative_fee()?;
        }

        self.approver
            .approve_tx(&mut self.ui, &self.tx_info, &self.orig_txs)
    }

    /// Second pass over inputs, verifying existing signatures before any
    /// are produced
    fn verify_inputs(&mut self) -> Result<(), Error> {
        self.h_check = CheckDigest::new();

        for i in 0..self.tx.inputs_count {
            let txi = self.port.tx_input(i)?;
            sanitize_tx_input(&txi, self.coin)?;

            write_tx_input_check(&mut self.h_check, &txi)?;
            self.tx_info.check_input(&txi)?;

            if txi.script_type == InputScriptType::External && txi.is_presigned() {
                self.verify_external_input(i, &txi)?;
            }
        }

        if self.h_check.digest() != self.h_inputs {
            #[cfg(feature = "log")]
            log::error!("inputs changed between passes");

            return Err(Error::TxChanged);
        }

        self.verify_original_txs()
    }

    /// Verify the signature supplied with an external input
    fn verify_external_input(&mut self, index: u32, txi: &TxInput) -> Result<(), Error> {
        let script_pubkey = self.input_script_pubkey(txi)?;
        let hash_type = self.family.sighash_type(txi);

        let verifier = SignatureVerifier::new(
            &script_pubkey,
            txi.script_sig.as_deref(),
            txi.witness.as_deref(),
        )
        .map_err(|e| invalid_external_input(index, e))?;
        verifier
            .ensure_hash_type(hash_type as u8)
            .map_err(|e| invalid_external_input(index, e))?;

        let digest = self.input_digest(index, txi, &verifier, hash_type)?;

        verifier
            .verify(&self.secp, &digest)
            .map_err(|e| invalid_external_input(index, e))
    }

    /// Digest signed by an input of the current transaction
    fn input_digest(
        &mut self,
        index: u32,
        txi: &TxInput,
        verifier: &SignatureVerifier,
        hash_type: u32,
    ) -> Result<[u8; 32], Error> {
        match verifier.kind() {
            SpendKind::Taproot => {
                self.tx_info
                    .sig_hasher
                    .hash341(index, &self.tx, verifier.hash_type())
            }
            SpendKind::Legacy if !self.family.force_bip143() => {
                self.legacy_digest(index, txi, verifier.script_code(), hash_type)
            }
            _ => self.tx_info.sig_hasher.hash143(
                txi,
                verifier.script_code(),
                &self.tx,
                self.coin,
                hash_type,
            ),
        }
    }

    /// Check each original transaction was signed by this wallet, so only
    /// our own transactions may be replaced
    fn verify_original_txs(&mut self) -> Result<(), Error> {
        for pos in 0..self.orig_txs.len() {
            let (index, txi) = match self.orig_txs[pos].verification_input.clone() {
                Some(v) => v,
                None => {
                    #[cfg(feature = "log")]
                    log::error!("original transaction has no input of ours");

                    return Err(Error::UnverifiedOrigTx);
                }
            };

            let script_pubkey = self.input_script_pubkey(&txi)?;
            let hash_type = self.family.sighash_type(&txi);

            let verifier = SignatureVerifier::new(
                &script_pubkey,
                txi.script_sig.as_deref(),
                txi.witness.as_deref(),
            )?;
            verifier.ensure_hash_type(hash_type as u8)?;

            let digest = self.original_digest(pos, index, &txi, &verifier, hash_type)?;
            verifier.verify(&self.secp, &digest)?;

            #[cfg(feature = "log")]
            log::debug!("original transaction input {} verified", index);
        }

        Ok(())
    }

    /// Digest signed by an input of an original transaction
    fn original_digest(
        &mut self,
        pos: usize,
        index: u32,
        txi: &TxInput,
        verifier: &SignatureVerifier,
        hash_type: u32,
    ) -> Result<[u8; 32], Error> {
        let header = self.orig_txs[pos].header();

        match verifier.kind() {
            SpendKind::Taproot => {
                self.orig_txs[pos]
                    .sig_hasher
                    .hash341(index, &header, verifier.hash_type())
            }
            SpendKind::Legacy if !self.family.force_bip143() => {
                self.original_legacy_digest(pos, index, txi, verifier.script_code(), hash_type)
            }
            _ => self.orig_txs[pos].sig_hasher.hash143(
                txi,
                verifier.script_code(),
                &header,
                self.coin,
                hash_type,
            ),
        }
    }

    /// Compute the legacy digest for an original input by re-streaming the
    /// original transaction, checked against the first pass
    fn original_legacy_digest(
        &mut self,
        pos: usize,
        index: u32,
        txi_sign: &TxInput,
        script_code: &[u8],
        hash_type: u32,
    ) -> Result<[u8; 32], Error> {
        let orig_hash = self.orig_txs[pos].orig_hash;
        let meta = self.orig_txs[pos].meta.clone();

        let mut h = LegacyHasher::new();
        let mut h_check = CheckDigest::new();

        self.family.write_tx_header(&mut h, meta.version, false)?;

        write_compact_size(&mut h, meta.inputs_count as usize)?;
        for i in 0..meta.inputs_count {
            // Signed original inputs carry scripts, so are only compared
            let txi = self.port.orig_input(&orig_hash, i)?;
            write_tx_input_check(&mut h_check, &txi)?;

            match i == index {
                true if txi != *txi_sign => return Err(Error::TxChanged),
                true => h.add_input(&txi, Some(script_code))?,
                false => h.add_input(&txi, None)?,
            }
        }

        write_compact_size(&mut h, meta.outputs_count as usize)?;
        for i in 0..meta.outputs_count {
            let (txo, script_pubkey) = self.fetch_original_output(&orig_hash, i)?;
            write_tx_output(&mut h_check, txo.amount, &script_pubkey)?;
            write_tx_output(&mut h, txo.amount, &script_pubkey)?;
        }

        if h_check.digest() != self.orig_txs[pos].tx_check_digest() {
            #[cfg(feature = "log")]
            log::error!("original transaction changed between passes");

            return Err(Error::TxChanged);
        }

        self.family.write_tx_footer(&mut h, meta.lock_time)?;

        h.finalize(self.coin, hash_type)
    }

    /// Third pass over inputs, emitting the serialized inputs
    fn serialize_inputs(&mut self) -> Result<(), Error> {
        self.family
            .write_tx_header(&mut self.port.chunk, self.tx.version, self.has_segwit)?;
        write_compact_size(&mut self.port.chunk, self.tx.inputs_count as usize)?;

        self.h_check = CheckDigest::new();

        for i in 0..self.tx.inputs_count {
            let txi = self.port.tx_input(i)?;
            sanitize_tx_input(&txi, self.coin)?;

            write_tx_input_check(&mut self.h_check, &txi)?;
            self.tx_info.check_input(&txi)?;

            let script_sig = match txi.script_type {
                InputScriptType::External => txi.script_sig.clone().unwrap_or_default(),
                InputScriptType::SpendP2shWitness => self.nested_segwit_script_sig(&txi)?,
                t if t.is_segwit() => Vec::new(),
                _ => self.sign_nonsegwit_input(i, &txi)?,
            };

            write_tx_input(
                &mut self.port.chunk,
                &txi.prev_hash,
                txi.prev_index,
                &script_sig,
                txi.sequence,
            )?;
        }

        if self.h_check.digest() != self.h_inputs {
            #[cfg(feature = "log")]
            log::error!("inputs changed between passes");

            return Err(Error::TxChanged);
        }

        Ok(())
    }

    /// Second pass over outputs, emitting the serialized outputs
    fn serialize_outputs(&mut self) -> Result<(), Error> {
        write_compact_size(&mut self.port.chunk, self.tx.outputs_count as usize)?;

        for i in 0..self.tx.outputs_count {
            let txo = self.port.tx_output(i)?;
            sanitize_tx_output(&txo, self.coin)?;

            let script_pubkey = self.output_script_pubkey(&txo)?;

            write_tx_output(&mut self.h_check, txo.amount, &script_pubkey)?;
            write_tx_output(&mut self.port.chunk, txo.amount, &script_pubkey)?;
        }

        if self.h_check.digest() != self.h_tx {
            #[cfg(feature = "log")]
            log::error!("outputs changed between passes");

            return Err(Error::TxChanged);
        }

        Ok(())
    }

    /// Final pass over inputs, emitting witnesses
    fn sign_witness_inputs(&mut self) -> Result<(), Error> {
        if !self.has_segwit {
            return Ok(());
        }

        let mut h_check = CheckDigest::new();

        for i in 0..self.tx.inputs_count {
            let txi = self.port.tx_input(i)?;
            sanitize_tx_input(&txi, self.coin)?;

            write_tx_input_check(&mut h_check, &txi)?;
            self.tx_info.check_input(&txi)?;

            match txi.script_type {
                InputScriptType::External => match &txi.witness {
                    Some(w) => self.port.chunk.write_bytes(w)?,
                    None => write_u8(&mut self.port.chunk, 0)?,
                },
                t if t.is_segwit() => self.sign_segwit_input(i, &txi)?,
                // Empty witness stack
                _ => write_u8(&mut self.port.chunk, 0)?,
            }
        }

        if h_check.digest() != self.h_inputs {
            #[cfg(feature = "log")]
            log::error!("inputs changed between passes");

            return Err(Error::TxChanged);
        }

        Ok(())
    }

    /// Emit the footer and complete the session
    fn finish(&mut self) -> Result<(), Error> {
        self.family
            .write_tx_footer(&mut self.port.chunk, self.tx.lock_time)?;

        self.port.finish()?;

        // Only a transaction delivered to the host is accounted
        self.approver.on_complete()?;

        #[cfg(feature = "log")]
        log::info!("transaction signed");

        Ok(())
    }

    /// Sign a non-segwit input, returning its script_sig
    fn sign_nonsegwit_input(&mut self, index: u32, txi: &TxInput) -> Result<Vec<u8>, Error> {
        let key = SigningKey::derive(&self.secp, &self.keychain, &txi.address_n)?;
        let hash_type = self.family.sighash_type(txi);
        let script_code = self.script_code(txi, &key)?;

        let digest = match self.family.force_bip143() {
            true => self.tx_info.sig_hasher.hash143(
                txi,
                &script_code,
                &self.tx,
                self.coin,
                hash_type,
            )?,
            false => self.legacy_digest(index, txi, &script_code, hash_type)?,
        };

        let signature = key.sign_ecdsa(&self.secp, &digest)?;
        self.port.chunk.set_signature(index, &signature)?;

        match &txi.multisig {
            Some(m) => {
                let n = multisig::pubkey_index(m, &key.public_key())?;
                scripts::input_script_multisig(m, &signature, n, hash_type as u8)
            }
            None => scripts::input_script_p2pkh(&key.public_key(), &signature, hash_type as u8),
        }
    }

    /// Compute the legacy digest for an input by re-streaming the whole
    /// transaction, checked against the current pass up to the signing
    /// input and against the first pass digests
    fn legacy_digest(
        &mut self,
        index: u32,
        txi_sign: &TxInput,
        script_code: &[u8],
        hash_type: u32,
    ) -> Result<[u8; 32], Error> {
        let mut h = LegacyHasher::new();
        let mut h_check = CheckDigest::new();

        self.family.write_tx_header(&mut h, self.tx.version, false)?;

        write_compact_size(&mut h, self.tx.inputs_count as usize)?;
        for i in 0..self.tx.inputs_count {
            let txi = self.port.tx_input(i)?;
            sanitize_tx_input(&txi, self.coin)?;
            write_tx_input_check(&mut h_check, &txi)?;

            match i == index {
                true if txi != *txi_sign => return Err(Error::TxChanged),
                true => h.add_input(&txi, Some(script_code))?,
                false => h.add_input(&txi, None)?,
            }

            if i == index && h_check.digest() != self.h_check.digest() {
                #[cfg(feature = "log")]
                log::error!("inputs before {} changed between passes", index);

                return Err(Error::TxChanged);
            }
        }

        if h_check.digest() != self.h_inputs {
            return Err(Error::TxChanged);
        }

        write_compact_size(&mut h, self.tx.outputs_count as usize)?;
        for i in 0..self.tx.outputs_count {
            let txo = self.port.tx_output(i)?;
            sanitize_tx_output(&txo, self.coin)?;

            let script_pubkey = self.output_script_pubkey(&txo)?;
            write_tx_output(&mut h_check, txo.amount, &script_pubkey)?;
            write_tx_output(&mut h, txo.amount, &script_pubkey)?;
        }

        if h_check.digest() != self.h_tx {
            return Err(Error::TxChanged);
        }

        self.family.write_tx_footer(&mut h, self.tx.lock_time)?;

        h.finalize(self.coin, hash_type)
    }

    /// Sign a segwit or taproot input, emitting its witness
    fn sign_segwit_input(&mut self, index: u32, txi: &TxInput) -> Result<(), Error> {
        let key = SigningKey::derive(&self.secp, &self.keychain, &txi.address_n)?;
        let hash_type = self.family.sighash_type(txi);

        if txi.script_type == InputScriptType::SpendTaproot {
            let digest = self
                .tx_info
                .sig_hasher
                .hash341(index, &self.tx, hash_type as u8)?;
            let signature = key.sign_taproot(&self.secp, &digest)?;

            scripts::witness_p2tr(&mut self.port.chunk, &signature, hash_type as u8)?;
            return self.port.chunk.set_signature(index, &signature);
        }

        let script_code = self.script_code(txi, &key)?;
        let digest =
            self.tx_info
                .sig_hasher
                .hash143(txi, &script_code, &self.tx, self.coin, hash_type)?;
        let signature = key.sign_ecdsa(&self.secp, &digest)?;

        match &txi.multisig {
            Some(m) => {
                let n = multisig::pubkey_index(m, &key.public_key())?;
                scripts::witness_multisig(&mut self.port.chunk, m, &signature, n, hash_type as u8)?;
            }
            None => scripts::witness_p2wpkh(
                &mut self.port.chunk,
                &key.public_key(),
                &signature,
                hash_type as u8,
            )?,
        }

        self.port.chunk.set_signature(index, &signature)
    }

    /// script_sig for segwit inputs nested in P2SH
    fn nested_segwit_script_sig(&self, txi: &TxInput) -> Result<Vec<u8>, Error> {
        match &txi.multisig {
            Some(m) => {
                let redeem = multisig::redeem_script(m)?;
                Ok(scripts::input_script_p2wsh_in_p2sh(&sha256(&redeem)))
            }
            None => {
                let key = SigningKey::derive(&self.secp, &self.keychain, &txi.address_n)?;
                Ok(scripts::input_script_p2wpkh_in_p2sh(&key.pubkey_hash()))
            }
        }
    }

    /// Script code committed to by legacy and BIP-143 signatures
    fn script_code(&self, txi: &TxInput, key: &SigningKey) -> Result<Vec<u8>, Error> {
        match &txi.multisig {
            Some(m) => multisig::redeem_script(m),
            None => Ok(scripts::output_script_p2pkh(&key.pubkey_hash())),
        }
    }

    /// Locking script spent by an input
    fn input_script_pubkey(&self, txi: &TxInput) -> Result<Vec<u8>, Error> {
        match txi.script_type {
            InputScriptType::External => txi.script_pubkey.clone().ok_or(Error::MissingField),
            t => self.derive_script_pubkey(t, &txi.address_n, txi.multisig.as_ref()),
        }
    }

    /// Locking script for an output
    fn output_script_pubkey(&self, txo: &TxOutput) -> Result<Vec<u8>, Error> {
        if txo.script_type == OutputScriptType::PayToOpReturn {
            let data = txo.op_return_data.as_deref().ok_or(Error::InvalidOpReturn)?;
            return scripts::output_script_op_return(data);
        }

        if !txo.address_n.is_empty() {
            let t = txo
                .script_type
                .change_input_type()
                .ok_or(Error::InvalidScriptType)?;
            return self.derive_script_pubkey(t, &txo.address_n, txo.multisig.as_ref());
        }

        match &txo.address {
            Some(a) => address::output_script(a, self.coin),
            None => Err(Error::MissingField),
        }
    }

    /// Derive the locking script for a wallet path
    fn derive_script_pubkey(
        &self,
        script_type: InputScriptType,
        path: &[u32],
        multisig: Option<&MultisigRedeemScript>,
    ) -> Result<Vec<u8>, Error> {
        let key = SigningKey::derive(&self.secp, &self.keychain, path)?;

        if let Some(m) = multisig {
            // Our key must be one of the cosigners
            multisig::pubkey_index(m, &key.public_key())?;
            let redeem = multisig::redeem_script(m)?;

            return match script_type {
                InputScriptType::SpendAddress | InputScriptType::SpendMultisig => {
                    Ok(scripts::output_script_p2sh(&hash160(&redeem)))
                }
                InputScriptType::SpendWitness => {
                    Ok(scripts::output_script_native_segwit(0, &sha256(&redeem)))
                }
                InputScriptType::SpendP2shWitness => {
                    let witness_script = scripts::output_script_native_segwit(0, &sha256(&redeem));
                    Ok(scripts::output_script_p2sh(&hash160(&witness_script)))
                }
                _ => Err(Error::InvalidScriptType),
            };
        }

        match script_type {
            InputScriptType::SpendAddress => Ok(scripts::output_script_p2pkh(&key.pubkey_hash())),
            InputScriptType::SpendWitness => {
                Ok(scripts::output_script_native_segwit(0, &key.pubkey_hash()))
            }
            InputScriptType::SpendP2shWitness => {
                let witness_script = scripts::output_script_native_segwit(0, &key.pubkey_hash());
                Ok(scripts::output_script_p2sh(&hash160(&witness_script)))
            }
            InputScriptType::SpendTaproot => {
                let output_key = key.taproot_output_key(&self.secp)?;
                Ok(scripts::output_script_native_segwit(1, &output_key))
            }
            InputScriptType::SpendMultisig | InputScriptType::External => {
                Err(Error::InvalidScriptType)
            }
        }
    }
}

/// Map a failed external input verification to [Error::InvalidExternalInput]
fn invalid_external_input(index: u32, e: Error) -> Error {
    #[cfg(feature = "log")]
    log::error!("external input {} not verified: {:?}", index, e);

    let _ = (index, e);
    Error::InvalidExternalInput
}
