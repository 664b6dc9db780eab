// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Incremental transaction weight estimation
//!
//! Weight is accumulated per input and output as they are streamed, using
//! fixed worst-case sizes for signatures so the estimate never falls below
//! the size of the signed transaction.

use crate::{
    helpers::writers::{compact_size_len, op_push_len},
    msg::{InputScriptType, TxInput},
};

const TXSIZE_HEADER: u64 = 4;
const TXSIZE_FOOTER: u64 = 4;
const TXSIZE_SEGWIT_OVERHEAD: u64 = 2;
const TXSIZE_INPUT: u64 = 40;
const TXSIZE_OUTPUT: u64 = 8;
const TXSIZE_PUBKEY: usize = 33;
const TXSIZE_DER_SIGNATURE: usize = 72;
const TXSIZE_SCHNORR_SIGNATURE: usize = 64;
const TXSIZE_MULTISIGSCRIPT: usize = 3;
const TXSIZE_WITNESSPKHASH: u64 = 22;
const TXSIZE_WITNESSSCRIPT: u64 = 34;

const OP_0: u8 = 0x00;
const OP_1: u8 = 0x51;
const OP_HASH160: u8 = 0xa9;

/// Weight units per byte of non-witness data
const WITNESS_SCALE_FACTOR: u64 = 4;

/// Running transaction weight
#[derive(Clone, PartialEq, Debug, Default)]
pub struct TxWeightCalculator {
    inputs_count: usize,
    outputs_count: usize,
    segwit_inputs_count: usize,
    counter: u64,
}

impl TxWeightCalculator {
    /// Create a new (empty) weight calculator
    pub const fn new() -> Self {
        Self {
            inputs_count: 0,
            outputs_count: 0,
            segwit_inputs_count: 0,
            counter: 0,
        }
    }

    /// Size of the signature-carrying script (or witness) for an input
    fn input_script_size(script_type: InputScriptType, txi: &TxInput) -> usize {
        if script_type == InputScriptType::SpendTaproot {
            return compact_size_len(TXSIZE_SCHNORR_SIGNATURE) + TXSIZE_SCHNORR_SIGNATURE;
        }

        match &txi.multisig {
            Some(multisig) => {
                let n = multisig.pubkeys.len();
                let mut script_size = TXSIZE_MULTISIGSCRIPT + n * (1 + TXSIZE_PUBKEY);
                script_size += match script_type.is_segwit() {
                    true => compact_size_len(script_size),
                    false => op_push_len(script_size),
                };

                1 + multisig.m as usize * (1 + TXSIZE_DER_SIGNATURE) + script_size
            }
            None => 1 + TXSIZE_DER_SIGNATURE + 1 + TXSIZE_PUBKEY,
        }
    }

    /// Guess the spend type of an external input from its locking script.
    ///
    /// This is a heuristic, the first opcode of the locking script is the
    /// only information available for unsigned external inputs.
    fn guess_script_type(script_pubkey: &[u8]) -> InputScriptType {
        match script_pubkey.first() {
            Some(&OP_0) => InputScriptType::SpendWitness,
            Some(&OP_1) => InputScriptType::SpendTaproot,
            Some(&OP_HASH160) => InputScriptType::SpendP2shWitness,
            _ => InputScriptType::SpendAddress,
        }
    }

    /// Add an input to the running weight
    pub fn add_input(&mut self, txi: &TxInput) {
        self.inputs_count += 1;

        let script_type = match txi.script_type {
            InputScriptType::External if txi.is_presigned() => {
                self.add_presigned_input(txi);
                return;
            }
            InputScriptType::External => {
                Self::guess_script_type(txi.script_pubkey.as_deref().unwrap_or(&[]))
            }
            t => t,
        };

        let script_size = Self::input_script_size(script_type, txi);

        if script_type.is_nonsegwit() {
            let n = script_size + compact_size_len(script_size);
            self.counter += WITNESS_SCALE_FACTOR * (TXSIZE_INPUT + n as u64);
            return;
        }

        self.segwit_inputs_count += 1;

        if script_type == InputScriptType::SpendP2shWitness {
            let redeem = match txi.multisig.is_some() {
                true => TXSIZE_WITNESSSCRIPT,
                false => TXSIZE_WITNESSPKHASH,
            };
            self.counter += WITNESS_SCALE_FACTOR * (TXSIZE_INPUT + 1 + 1 + redeem);
        } else {
            self.counter += WITNESS_SCALE_FACTOR * (TXSIZE_INPUT + 1);
        }

        // Witness stack item count plus items
        self.counter += 1 + script_size as u64;
    }

    /// Presigned external inputs use their exact sizes
    fn add_presigned_input(&mut self, txi: &TxInput) {
        let script_sig = txi.script_sig.as_deref().unwrap_or(&[]);
        let n = script_sig.len() + compact_size_len(script_sig.len());
        self.counter += WITNESS_SCALE_FACTOR * (TXSIZE_INPUT + n as u64);

        if let Some(w) = &txi.witness {
            self.segwit_inputs_count += 1;
            self.counter += w.len() as u64;
        }
    }

    /// Add an output to the running weight
    pub fn add_output(&mut self, script_pubkey: &[u8]) {
        self.outputs_count += 1;

        let n = script_pubkey.len() + compact_size_len(script_pubkey.len());
        self.counter += WITNESS_SCALE_FACTOR * (TXSIZE_OUTPUT + n as u64);
    }

    /// Fetch the total transaction weight
    pub fn get_weight(&self) -> u64 {
        let mut total = self.counter;

        total += WITNESS_SCALE_FACTOR
            * (TXSIZE_HEADER
                + TXSIZE_FOOTER
                + compact_size_len(self.inputs_count) as u64
                + compact_size_len(self.outputs_count) as u64);

        if self.segwit_inputs_count > 0 {
            total += TXSIZE_SEGWIT_OVERHEAD;
            // Empty witness stack for each non-segwit input
            total += (self.inputs_count - self.segwit_inputs_count) as u64;
        }

        total
    }

    /// Fetch the weight of the fixed header and footer fields
    pub fn get_base_weight() -> u64 {
        WITNESS_SCALE_FACTOR * (TXSIZE_HEADER + TXSIZE_FOOTER)
    }

    /// Fetch the virtual size (vbytes) of the transaction
    pub fn get_virtual_size(&self) -> u64 {
        virtual_size(self.get_weight())
    }

    /// Number of inputs added
    pub fn inputs_count(&self) -> usize {
        self.inputs_count
    }
}

/// Convert weight to virtual size, rounding up
pub const fn virtual_size(weight: u64) -> u64 {
    (weight + WITNESS_SCALE_FACTOR - 1) / WITNESS_SCALE_FACTOR
}
