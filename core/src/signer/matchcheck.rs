// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Single-pass attribute agreement and change detection
//!
//! Inputs are streamed exactly once before any output is seen, so each
//! [MatchChecker] folds one attribute over the internal inputs and is then
//! frozen when outputs are first tested against it.

use heapless::Vec;

use crate::{
    helpers::{
        multisig,
        paths::{BIP32_CHANGE_CHAIN, BIP32_MAX_LAST_ELEMENT, BIP32_WALLET_DEPTH, MAX_PATH_DEPTH},
    },
    msg::{InputScriptType, MultisigRedeemScript, TxInput, TxOutput},
    Error,
};

/// Attribute agreement state
#[derive(Clone, PartialEq, Debug)]
pub enum MatchState<T> {
    /// No input seen yet
    Undefined,
    /// All inputs seen so far share this value
    Agreed(T),
    /// Inputs disagree (or a value was unavailable), never recovers
    Mismatched,
}

/// Folds one attribute across inputs
#[derive(Clone, PartialEq, Debug)]
pub struct MatchChecker<T> {
    state: MatchState<T>,
    read_only: bool,
}

impl<T: Clone + PartialEq> MatchChecker<T> {
    /// Create a new (undefined) checker
    pub const fn new() -> Self {
        Self {
            state: MatchState::Undefined,
            read_only: false,
        }
    }

    /// Fetch the current agreement state
    pub fn state(&self) -> &MatchState<T> {
        &self.state
    }

    pub fn is_mismatched(&self) -> bool {
        self.state == MatchState::Mismatched
    }

    /// Fold an input attribute, `None` where the attribute is unavailable
    pub fn add_input(&mut self, value: Option<T>) -> Result<(), Error> {
        // Folding after outputs have been tested would allow order dependent results
        if self.read_only {
            return Err(Error::InvalidState);
        }

        self.state = match (&self.state, value) {
            (MatchState::Mismatched, _) | (_, None) => MatchState::Mismatched,
            (MatchState::Undefined, Some(v)) => MatchState::Agreed(v),
            (MatchState::Agreed(a), Some(v)) if *a == v => MatchState::Agreed(v),
            (MatchState::Agreed(_), Some(_)) => MatchState::Mismatched,
        };

        Ok(())
    }

    /// Check a re-streamed input attribute is consistent with the agreed value
    pub fn check_input(&self, value: Option<&T>) -> Result<(), Error> {
        match &self.state {
            MatchState::Agreed(a) if Some(a) != value => {
                #[cfg(feature = "log")]
                log::error!("input attribute changed between passes");

                Err(Error::TxChanged)
            }
            _ => Ok(()),
        }
    }

    /// Test an output attribute against the agreed value, freezing the checker
    pub fn output_matches(&mut self, value: Option<&T>) -> bool {
        self.read_only = true;

        match &self.state {
            MatchState::Agreed(a) => Some(a) == value,
            _ => false,
        }
    }
}

impl<T: Clone + PartialEq> Default for MatchChecker<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Account path, the derivation path without the final chain and index levels
pub type WalletPath = Vec<u32, MAX_PATH_DEPTH>;

/// Fetch the account path for a derivation path
pub fn wallet_path(address_n: &[u32]) -> Option<WalletPath> {
    if address_n.len() <= BIP32_WALLET_DEPTH {
        return None;
    }

    Vec::from_slice(&address_n[..address_n.len() - BIP32_WALLET_DEPTH]).ok()
}

/// Fetch the fingerprint of an optional multisig descriptor
fn multisig_fingerprint(
    multisig: &Option<MultisigRedeemScript>,
) -> Result<Option<[u8; 32]>, Error> {
    multisig.as_ref().map(multisig::fingerprint).transpose()
}

/// Check a change path has sane chain and index values
fn is_change_path(address_n: &[u32]) -> bool {
    let n = address_n.len();

    n >= BIP32_WALLET_DEPTH
        && address_n[n - 2] <= BIP32_CHANGE_CHAIN
        && address_n[n - 1] <= BIP32_MAX_LAST_ELEMENT
}

/// Decides whether outputs may be treated as change
#[derive(Clone, PartialEq, Debug, Default)]
pub struct ChangeDetector {
    wallet_path: MatchChecker<WalletPath>,
    script_type: MatchChecker<InputScriptType>,
    multisig: MatchChecker<Option<[u8; 32]>>,
}

impl ChangeDetector {
    /// Create a new change detector
    pub const fn new() -> Self {
        Self {
            wallet_path: MatchChecker::new(),
            script_type: MatchChecker::new(),
            multisig: MatchChecker::new(),
        }
    }

    /// Fold an internal input
    pub fn add_input(&mut self, txi: &TxInput) -> Result<(), Error> {
        self.wallet_path.add_input(wallet_path(&txi.address_n))?;
        self.script_type.add_input(Some(txi.script_type))?;
        self.multisig
            .add_input(Some(multisig_fingerprint(&txi.multisig)?))?;

        Ok(())
    }

    /// Check a re-streamed internal input against the folded attributes
    pub fn check_input(&self, txi: &TxInput) -> Result<(), Error> {
        self.wallet_path
            .check_input(wallet_path(&txi.address_n).as_ref())?;
        self.script_type.check_input(Some(&txi.script_type))?;
        self.multisig
            .check_input(Some(&multisig_fingerprint(&txi.multisig)?))?;

        Ok(())
    }

    /// Test whether an output agrees with every folded attribute
    pub fn output_matches(&mut self, txo: &TxOutput) -> Result<bool, Error> {
        // Evaluate every matcher so all are frozen
        let p = self
            .wallet_path
            .output_matches(wallet_path(&txo.address_n).as_ref());
        let s = self
            .script_type
            .output_matches(txo.script_type.change_input_type().as_ref());
        let m = self
            .multisig
            .output_matches(Some(&multisig_fingerprint(&txo.multisig)?));

        Ok(p && s && m)
    }

    /// Decide whether an output is change and may skip confirmation
    pub fn is_change_output(&mut self, txo: &TxOutput) -> Result<bool, Error> {
        if txo.address_n.is_empty() {
            return Ok(false);
        }

        let matches = self.output_matches(txo)?;

        Ok(matches && is_change_path(&txo.address_n) && txo.amount > 0)
    }

    /// Internal inputs were spent from more than one account
    pub fn multiple_accounts(&self) -> bool {
        self.wallet_path.is_mismatched()
    }
}
