// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Confirmation gate collaborator
//!
//! The signer never renders anything itself, each decision requiring the
//! user is raised as a one-shot [Prompt] via the [Ui] trait.

use strum::{Display, EnumDiscriminants, EnumIter};

use crate::{
    coin::CoinInfo,
    msg::{AmountUnit, PaymentRequest, TxOutput},
    Error,
};

/// Confirmation prompts
#[derive(Clone, PartialEq, Debug, EnumDiscriminants)]
#[strum_discriminants(name(PromptKind), derive(Display, EnumIter))]
pub enum Prompt<'a> {
    /// Confirm an external output
    Output {
        output: &'a TxOutput,
        script_pubkey: &'a [u8],
        chunkify: bool,
    },

    /// Confirm a payment request covering a run of outputs
    PaymentRequest { request: &'a PaymentRequest },

    /// Confirm replacement of a previously signed transaction
    Replacement { orig_hash: &'a [u8; 32] },

    /// Confirm decreasing an original external output
    ModifyOutput {
        output: &'a TxOutput,
        orig: &'a TxOutput,
    },

    /// Confirm the fee change of a replacement
    ModifyFee {
        user_fee_change: i64,
        total_fee: i64,
        vsize: u64,
    },

    /// Confirm the amount spent and fee
    Total { spending: u64, fee: i64, vsize: u64 },

    /// Confirm a transaction with external inputs
    JointTotal { spending: u64, total: u64 },

    /// Confirm a fee above the coin threshold
    FeeOverThreshold { fee: i64 },

    /// Confirm an unusually high number of change outputs
    ChangeCountOverThreshold { change_count: usize },

    /// Confirm spending from a non-standard path
    ForeignAddress { path: &'a [u32] },

    /// Confirm a non-zero lock time
    NonDefaultLocktime { lock_time: u32, disabled: bool },

    /// Confirm an external input that could not be verified
    UnverifiedExternalInput,

    /// Confirm spending from more than one account
    MultipleAccounts,
}

/// [`Ui`] trait provides the platform confirmation gate
pub trait Ui {
    /// Show a prompt, returning true if the user accepted
    fn confirm(&mut self, coin: &CoinInfo, unit: AmountUnit, prompt: &Prompt<'_>) -> bool;
}

impl<T: Ui> Ui for &mut T {
    fn confirm(&mut self, coin: &CoinInfo, unit: AmountUnit, prompt: &Prompt<'_>) -> bool {
        T::confirm(self, coin, unit, prompt)
    }
}

/// Show a prompt, failing with [Error::ActionCancelled] if declined
pub fn require<U: Ui>(
    ui: &mut U,
    coin: &CoinInfo,
    unit: AmountUnit,
    prompt: Prompt<'_>,
) -> Result<(), Error> {
    if ui.confirm(coin, unit, &prompt) {
        return Ok(());
    }

    #[cfg(feature = "log")]
    log::warn!("prompt declined: {}", PromptKind::from(&prompt));

    Err(Error::ActionCancelled)
}
