// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Transaction approval policy
//!
//! [BasicApprover] asks the user to confirm everything not covered by change
//! detection or a payment request. [CoinJoinApprover] replaces interactive
//! confirmation with the limits of a pre-granted [CoinJoinAuthorization].

use secp256k1::{All, Secp256k1};

use crate::{
    authorization::{CoinJoinAuthorization, FEE_RATE_DECIMALS},
    coin::CoinInfo,
    config::SafetyCheckLevel,
    helpers::paths::validate_path_against_script_type,
    msg::{AmountUnit, CoinJoinRequest, PaymentRequest, SignTx, TxInput, TxOutput, COINJOIN_FLAGS_NO_FEE},
    ui::{require, Prompt, Ui},
    Error,
};

use super::{
    payment_request::PaymentRequestVerifier,
    sig_hasher::SigHasher,
    tx_info::{OriginalTxInfo, TxInfo},
    tx_weight::TxWeightCalculator,
};

/// Change outputs above this count require confirmation
pub const MAX_SILENT_CHANGE_COUNT: usize = 2;

/// Fees above this multiple of the coin threshold are refused under strict
/// safety checks
pub const FEE_THRESHOLD_HARD_MULTIPLIER: u64 = 10;

/// Fixed part of the coinjoin fee margin, covering the smallest output
const COINJOIN_MIN_OUTPUT_MARGIN: u64 = 5000;

/// Weight of a taproot output plus input, covering the cost of spending
/// the margin output later
const COINJOIN_MARGIN_WEIGHT: u64 = 172;

/// Running amounts, for the transaction being signed and the originals it
/// replaces
#[derive(Clone, PartialEq, Debug, Default)]
pub struct Totals {
    pub total_in: u64,
    pub external_in: u64,
    pub total_out: u64,
    pub change_out: u64,
    pub change_count: usize,

    pub orig_total_in: u64,
    pub orig_external_in: u64,
    pub orig_total_out: u64,
    pub orig_change_out: u64,
}

impl Totals {
    /// Mining fee, negative where outputs exceed inputs
    pub fn fee(&self) -> Result<i64, Error> {
        signed_amount(self.total_in as i128 - self.total_out as i128)
    }

    /// Amount leaving the wallet (including fee)
    pub fn spending(&self) -> Result<i64, Error> {
        signed_amount(
            self.total_in as i128 - self.external_in as i128 - self.change_out as i128,
        )
    }

    pub fn orig_fee(&self) -> Result<i64, Error> {
        signed_amount(self.orig_total_in as i128 - self.orig_total_out as i128)
    }

    pub fn orig_spending(&self) -> Result<i64, Error> {
        signed_amount(
            self.orig_total_in as i128
                - self.orig_external_in as i128
                - self.orig_change_out as i128,
        )
    }

    /// Replacement adding external inputs
    pub fn is_payjoin(&self) -> bool {
        self.external_in > self.orig_external_in
    }
}

fn checked_add(a: u64, b: u64) -> Result<u64, Error> {
    a.checked_add(b).ok_or(Error::InvalidAmount)
}

fn signed_amount(v: i128) -> Result<i64, Error> {
    i64::try_from(v).map_err(|_| {
        #[cfg(feature = "log")]
        log::error!("amount {} out of range", v);

        Error::InvalidAmount
    })
}

/// State shared by all approvers
pub struct ApproverBase {
    pub coin: CoinInfo,
    pub amount_unit: AmountUnit,
    pub lock_time: u32,
    pub chunkify: bool,
    pub weight: TxWeightCalculator,
    pub totals: Totals,
    /// Some input is carried over from an original transaction
    pub is_replacement: bool,
    payment_req: Option<PaymentRequestVerifier>,
}

impl ApproverBase {
    pub fn new(tx: &SignTx, coin: &CoinInfo) -> Self {
        Self {
            coin: *coin,
            amount_unit: tx.amount_unit,
            lock_time: tx.lock_time,
            chunkify: tx.chunkify,
            weight: TxWeightCalculator::new(),
            totals: Totals::default(),
            is_replacement: false,
            payment_req: None,
        }
    }

    fn add_internal_input(&mut self, txi: &TxInput) -> Result<(), Error> {
        self.weight.add_input(txi);
        self.totals.total_in = checked_add(self.totals.total_in, txi.amount)?;
        if txi.orig_hash.is_some() {
            self.totals.orig_total_in = checked_add(self.totals.orig_total_in, txi.amount)?;
            self.is_replacement = true;
        }
        Ok(())
    }

    fn add_external_input(&mut self, txi: &TxInput) -> Result<(), Error> {
        self.add_internal_input(txi)?;
        self.totals.external_in = checked_add(self.totals.external_in, txi.amount)?;
        if txi.orig_hash.is_some() {
            self.totals.orig_external_in = checked_add(self.totals.orig_external_in, txi.amount)?;
        }
        Ok(())
    }

    fn add_change_output(&mut self, txo: &TxOutput, script_pubkey: &[u8]) -> Result<(), Error> {
        self.weight.add_output(script_pubkey);
        self.totals.total_out = checked_add(self.totals.total_out, txo.amount)?;
        self.totals.change_out = checked_add(self.totals.change_out, txo.amount)?;
        self.totals.change_count += 1;
        Ok(())
    }

    /// Add an external output, returning true if covered by the active
    /// payment request
    fn add_external_output(&mut self, txo: &TxOutput, script_pubkey: &[u8]) -> Result<bool, Error> {
        self.weight.add_output(script_pubkey);
        self.totals.total_out = checked_add(self.totals.total_out, txo.amount)?;

        if txo.payment_req_index.is_none() {
            return Ok(false);
        }

        match self.payment_req.as_mut() {
            Some(v) => v.add_output(txo.amount, script_pubkey)?,
            None => return Err(Error::InvalidPaymentRequest),
        }

        Ok(true)
    }

    fn start_payment_request(&mut self, req: &PaymentRequest, key: Option<&[u8]>) -> Result<(), Error> {
        if self.payment_req.is_some() {
            return Err(Error::InvalidPaymentRequest);
        }
        self.payment_req = Some(PaymentRequestVerifier::new(req, self.coin.slip44, key)?);
        Ok(())
    }

    /// Prompt through the provided UI
    fn require<U: Ui>(&self, ui: &mut U, prompt: Prompt<'_>) -> Result<(), Error> {
        require(ui, &self.coin, self.amount_unit, prompt)
    }
}

/// [`Approver`] trait provides the policy applied to a signing session
pub trait Approver {
    fn base(&self) -> &ApproverBase;

    fn base_mut(&mut self) -> &mut ApproverBase;

    /// Add an input owned by this wallet
    fn add_internal_input<U: Ui>(&mut self, ui: &mut U, txi: &TxInput) -> Result<(), Error>;

    /// Add an input owned by another party
    fn add_external_input<U: Ui>(&mut self, ui: &mut U, txi: &TxInput) -> Result<(), Error>;

    /// Add an output detected as change
    fn add_change_output(&mut self, txo: &TxOutput, script_pubkey: &[u8]) -> Result<(), Error>;

    /// Add an output paying another party, with the original output it
    /// amends (for replacements)
    fn add_external_output<U: Ui>(
        &mut self,
        ui: &mut U,
        txo: &TxOutput,
        script_pubkey: &[u8],
        orig_txo: Option<&TxOutput>,
    ) -> Result<(), Error>;

    /// Add a change output of an original transaction
    fn add_orig_change_output(&mut self, txo: &TxOutput) -> Result<(), Error> {
        let t = &mut self.base_mut().totals;
        t.orig_total_out = checked_add(t.orig_total_out, txo.amount)?;
        t.orig_change_out = checked_add(t.orig_change_out, txo.amount)?;
        Ok(())
    }

    /// Add an external output of an original transaction
    fn add_orig_external_output(&mut self, txo: &TxOutput) -> Result<(), Error> {
        let t = &mut self.base_mut().totals;
        t.orig_total_out = checked_add(t.orig_total_out, txo.amount)?;
        Ok(())
    }

    /// Start a payment request covering the following outputs
    fn add_payment_request<U: Ui>(
        &mut self,
        ui: &mut U,
        req: &PaymentRequest,
        key: Option<&[u8]>,
    ) -> Result<(), Error>;

    /// Verify the active payment request once its outputs are complete
    fn finish_payment_request(&mut self, secp: &Secp256k1<All>) -> Result<(), Error> {
        match self.base_mut().payment_req.take() {
            Some(v) => v.verify(secp),
            None => Ok(()),
        }
    }

    /// Approve replacement of each original transaction
    fn approve_orig_txids<U: Ui, H: SigHasher>(
        &mut self,
        ui: &mut U,
        orig_txs: &[OriginalTxInfo<H>],
    ) -> Result<(), Error>;

    /// Approve the complete transaction, the final gate before signing
    fn approve_tx<U: Ui, H: SigHasher>(
        &mut self,
        ui: &mut U,
        tx_info: &TxInfo<H>,
        orig_txs: &[OriginalTxInfo<H>],
    ) -> Result<(), Error>;

    /// Called once the transaction is fully signed
    fn on_complete(&mut self) -> Result<(), Error> {
        Ok(())
    }
}

/// Interactive approval
pub struct BasicApprover {
    base: ApproverBase,
    safety_checks: SafetyCheckLevel,
    foreign_address_confirmed: bool,
}

impl BasicApprover {
    pub fn new(tx: &SignTx, coin: &CoinInfo, safety_checks: SafetyCheckLevel) -> Self {
        Self {
            base: ApproverBase::new(tx, coin),
            safety_checks,
            foreign_address_confirmed: false,
        }
    }

    /// Fee above which the user must confirm
    fn fee_threshold(&self) -> u64 {
        self.base.coin.maxfee_kb.saturating_mul(self.base.weight.get_weight()) / 4000
    }
}

impl Approver for BasicApprover {
    fn base(&self) -> &ApproverBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ApproverBase {
        &mut self.base
    }

    fn add_internal_input<U: Ui>(&mut self, ui: &mut U, txi: &TxInput) -> Result<(), Error> {
        let standard = validate_path_against_script_type(
            &self.base.coin,
            txi.script_type,
            txi.multisig.is_some(),
            &txi.address_n,
        );

        if !standard && !self.foreign_address_confirmed {
            self.base
                .require(ui, Prompt::ForeignAddress { path: &txi.address_n })?;
            self.foreign_address_confirmed = true;
        }

        self.base.add_internal_input(txi)
    }

    fn add_external_input<U: Ui>(&mut self, ui: &mut U, txi: &TxInput) -> Result<(), Error> {
        if !txi.is_presigned() {
            if self.safety_checks.is_strict() {
                #[cfg(feature = "log")]
                log::error!("unverified external input");

                return Err(Error::UnverifiedExternalInput);
            }
            self.base.require(ui, Prompt::UnverifiedExternalInput)?;
        }

        self.base.add_external_input(txi)
    }

    fn add_change_output(&mut self, txo: &TxOutput, script_pubkey: &[u8]) -> Result<(), Error> {
        self.base.add_change_output(txo, script_pubkey)
    }

    fn add_external_output<U: Ui>(
        &mut self,
        ui: &mut U,
        txo: &TxOutput,
        script_pubkey: &[u8],
        orig_txo: Option<&TxOutput>,
    ) -> Result<(), Error> {
        let covered = self.base.add_external_output(txo, script_pubkey)?;
        let payjoin = self.base.totals.is_payjoin();

        match orig_txo {
            // Amended original output
            Some(orig) if txo.amount < orig.amount => {
                if payjoin {
                    #[cfg(feature = "log")]
                    log::error!("reducing original outputs is not supported in payjoin");

                    return Err(Error::InvalidReplacement);
                }
                self.base.require(ui, Prompt::ModifyOutput { output: txo, orig })
            }
            Some(orig) if txo.amount > orig.amount && !payjoin => {
                #[cfg(feature = "log")]
                log::error!("increasing original outputs is not supported");

                Err(Error::InvalidReplacement)
            }
            Some(_) => Ok(()),

            // New output in a replacement
            None if self.base.is_replacement && !payjoin => {
                #[cfg(feature = "log")]
                log::error!("new external outputs require payjoin");

                Err(Error::InvalidReplacement)
            }
            None if covered => Ok(()),
            None => self.base.require(
                ui,
                Prompt::Output {
                    output: txo,
                    script_pubkey,
                    chunkify: self.base.chunkify,
                },
            ),
        }
    }

    fn add_payment_request<U: Ui>(
        &mut self,
        ui: &mut U,
        req: &PaymentRequest,
        key: Option<&[u8]>,
    ) -> Result<(), Error> {
        self.base.start_payment_request(req, key)?;
        self.base.require(ui, Prompt::PaymentRequest { request: req })
    }

    fn approve_orig_txids<U: Ui, H: SigHasher>(
        &mut self,
        ui: &mut U,
        orig_txs: &[OriginalTxInfo<H>],
    ) -> Result<(), Error> {
        for o in orig_txs {
            self.base.require(
                ui,
                Prompt::Replacement {
                    orig_hash: &o.orig_hash,
                },
            )?;
        }
        Ok(())
    }

    fn approve_tx<U: Ui, H: SigHasher>(
        &mut self,
        ui: &mut U,
        tx_info: &TxInfo<H>,
        orig_txs: &[OriginalTxInfo<H>],
    ) -> Result<(), Error> {
        let t = self.base.totals.clone();
        let fee = t.fee()?;
        let vsize = self.base.weight.get_virtual_size();

        // Fee threshold checks
        let threshold = self.fee_threshold();
        if fee > 0 && fee as u64 > threshold {
            if fee as u64 > threshold.saturating_mul(FEE_THRESHOLD_HARD_MULTIPLIER)
                && self.safety_checks.is_strict()
            {
                #[cfg(feature = "log")]
                log::error!("fee {} over hard threshold {}", fee, threshold);

                return Err(Error::FeeOverThreshold);
            }
            self.base.require(ui, Prompt::FeeOverThreshold { fee })?;
        }

        if t.change_count > MAX_SILENT_CHANGE_COUNT {
            self.base.require(
                ui,
                Prompt::ChangeCountOverThreshold {
                    change_count: t.change_count,
                },
            )?;
        }

        if tx_info.change_detector.multiple_accounts() {
            self.base.require(ui, Prompt::MultipleAccounts)?;
        }

        if !orig_txs.is_empty() {
            return self.approve_replacement(ui, tx_info, orig_txs, vsize);
        }

        if self.base.lock_time > 0 {
            self.base.require(
                ui,
                Prompt::NonDefaultLocktime {
                    lock_time: self.base.lock_time,
                    disabled: tx_info.lock_time_disabled(),
                },
            )?;
        }

        let spending = t.spending()?.max(0) as u64;

        match t.external_in > 0 {
            true => self.base.require(
                ui,
                Prompt::JointTotal {
                    spending,
                    total: t.total_in,
                },
            ),
            false => self.base.require(ui, Prompt::Total { spending, fee, vsize }),
        }
    }
}

impl BasicApprover {
    fn approve_replacement<U: Ui, H: SigHasher>(
        &mut self,
        ui: &mut U,
        tx_info: &TxInfo<H>,
        orig_txs: &[OriginalTxInfo<H>],
        vsize: u64,
    ) -> Result<(), Error> {
        let t = &self.base.totals;
        let fee_delta = t.fee()?.checked_sub(t.orig_fee()?).ok_or(Error::InvalidAmount)?;
        let spending_delta = t
            .spending()?
            .checked_sub(t.orig_spending()?)
            .ok_or(Error::InvalidAmount)?;

        // Additional funds may only go towards the fee
        if spending_delta > fee_delta {
            #[cfg(feature = "log")]
            log::error!(
                "replacement spending increase {} exceeds fee increase {}",
                spending_delta,
                fee_delta
            );

            return Err(Error::InvalidReplacement);
        }

        let lock_time = tx_info.effective_lock_time(self.base.lock_time);
        if orig_txs.iter().any(|o| o.effective_lock_time() != lock_time) {
            #[cfg(feature = "log")]
            log::error!("replacement changes effective lock time");

            return Err(Error::InvalidReplacement);
        }

        // In payjoin the fee change is not paid entirely by the user
        let user_fee_change = match t.is_payjoin() {
            true => spending_delta,
            false => fee_delta,
        };

        let total_fee = t.fee()?;
        self.base.require(
            ui,
            Prompt::ModifyFee {
                user_fee_change,
                total_fee,
                vsize,
            },
        )
    }
}

/// Automated approval under a [CoinJoinAuthorization]
pub struct CoinJoinApprover<'a> {
    base: ApproverBase,
    authorization: &'a mut CoinJoinAuthorization,
    request: CoinJoinRequest,
    /// Weight of our own inputs and outputs
    our_weight: TxWeightCalculator,
    /// Sum of inputs charged a coordination fee
    coordination_fee_base: u64,
    /// Fees charged to the user, committed on completion
    fees_charged: Option<u64>,
}

impl<'a> CoinJoinApprover<'a> {
    /// Create a coinjoin approver, checking the request is authorized
    pub fn new(
        tx: &SignTx,
        coin: &CoinInfo,
        authorization: &'a mut CoinJoinAuthorization,
    ) -> Result<Self, Error> {
        authorization.approve_sign_tx(tx, coin)?;

        let request = tx
            .coinjoin_request
            .clone()
            .ok_or(Error::InvalidCoinJoinRequest)?;

        Ok(Self {
            base: ApproverBase::new(tx, coin),
            authorization,
            request,
            our_weight: TxWeightCalculator::new(),
            coordination_fee_base: 0,
            fees_charged: None,
        })
    }

    fn coordination_fee(&self) -> u64 {
        let f = self.coordination_fee_base as u128 * self.request.fee_rate as u128;
        (f / FEE_RATE_DECIMALS as u128) as u64
    }
}

impl<'a> Approver for CoinJoinApprover<'a> {
    fn base(&self) -> &ApproverBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ApproverBase {
        &mut self.base
    }

    fn add_internal_input<U: Ui>(&mut self, _ui: &mut U, txi: &TxInput) -> Result<(), Error> {
        if !self.authorization.check_internal_input(txi) {
            #[cfg(feature = "log")]
            log::error!("input path not covered by coinjoin authorization");

            return Err(Error::Unauthorized);
        }

        if txi.amount > self.request.no_fee_threshold
            && txi.coinjoin_flags & COINJOIN_FLAGS_NO_FEE == 0
        {
            self.coordination_fee_base = checked_add(self.coordination_fee_base, txi.amount)?;
        }

        self.our_weight.add_input(txi);
        self.base.add_internal_input(txi)
    }

    fn add_external_input<U: Ui>(&mut self, _ui: &mut U, txi: &TxInput) -> Result<(), Error> {
        // Other participants' inputs, registered with the coordinator
        self.base.add_external_input(txi)
    }

    fn add_change_output(&mut self, txo: &TxOutput, script_pubkey: &[u8]) -> Result<(), Error> {
        if !self.authorization.check_internal_output(txo) {
            return Err(Error::Unauthorized);
        }

        self.our_weight.add_output(script_pubkey);
        self.base.add_change_output(txo, script_pubkey)
    }

    fn add_external_output<U: Ui>(
        &mut self,
        _ui: &mut U,
        txo: &TxOutput,
        script_pubkey: &[u8],
        orig_txo: Option<&TxOutput>,
    ) -> Result<(), Error> {
        if orig_txo.is_some() || txo.payment_req_index.is_some() {
            return Err(Error::Unauthorized);
        }

        self.base.add_external_output(txo, script_pubkey).map(|_| ())
    }

    fn add_payment_request<U: Ui>(
        &mut self,
        _ui: &mut U,
        _req: &PaymentRequest,
        _key: Option<&[u8]>,
    ) -> Result<(), Error> {
        Err(Error::Unauthorized)
    }

    fn approve_orig_txids<U: Ui, H: SigHasher>(
        &mut self,
        _ui: &mut U,
        orig_txs: &[OriginalTxInfo<H>],
    ) -> Result<(), Error> {
        match orig_txs.is_empty() {
            true => Ok(()),
            false => {
                #[cfg(feature = "log")]
                log::error!("replacement not allowed in coinjoin");

                Err(Error::InvalidReplacement)
            }
        }
    }

    fn approve_tx<U: Ui, H: SigHasher>(
        &mut self,
        _ui: &mut U,
        _tx_info: &TxInfo<H>,
        orig_txs: &[OriginalTxInfo<H>],
    ) -> Result<(), Error> {
        if !orig_txs.is_empty() {
            return Err(Error::InvalidReplacement);
        }

        let t = &self.base.totals;
        let max_fee_per_kvbyte = self.authorization.max_fee_per_kvbyte as u64;

        // Mining fee for our own share of the transaction
        let max_mining_fee = max_fee_per_kvbyte * self.our_weight.get_virtual_size() / 1000;

        // Allow for a minimal output (and its spend) to go to fees
        let margin = COINJOIN_MIN_OUTPUT_MARGIN + max_fee_per_kvbyte * COINJOIN_MARGIN_WEIGHT / 4000;

        let our_fees = t.spending()?.max(0) as u64;
        let max_fees = self.coordination_fee() + max_mining_fee + margin;

        if our_fees > max_fees {
            #[cfg(feature = "log")]
            log::error!("coinjoin fees {} exceed limit {}", our_fees, max_fees);

            return Err(Error::FeeOverThreshold);
        }

        if our_fees > self.authorization.remaining_fee {
            #[cfg(feature = "log")]
            log::error!("coinjoin fees {} exceed remaining budget", our_fees);

            return Err(Error::FeeOverThreshold);
        }

        self.fees_charged = Some(our_fees);

        Ok(())
    }

    fn on_complete(&mut self) -> Result<(), Error> {
        match self.fees_charged {
            Some(f) => self.authorization.commit(f),
            None => Err(Error::InvalidState),
        }
    }
}

#[cfg(test)]
mod test {
    use alloc::{string::ToString, vec, vec::Vec};

    use super::*;
    use crate::{
        coin::BITCOIN,
        helpers::paths::h,
        msg::{AuthorizeCoinJoin, InputScriptType, OutputScriptType, PrevTx},
        signer::{family::Bitcoin, sig_hasher::BitcoinSigHasher},
        ui::PromptKind,
    };

    /// UI accepting everything, recording prompt kinds
    #[derive(Default)]
    struct Recorder(Vec<PromptKind>);

    impl Ui for Recorder {
        fn confirm(&mut self, _coin: &CoinInfo, _unit: AmountUnit, prompt: &Prompt<'_>) -> bool {
            self.0.push(PromptKind::from(prompt));
            true
        }
    }

    fn sign_tx() -> SignTx {
        SignTx {
            coin_name: "Bitcoin".to_string(),
            inputs_count: 1,
            outputs_count: 1,
            version: 2,
            ..Default::default()
        }
    }

    fn input(amount: u64) -> TxInput {
        TxInput {
            address_n: vec![h(84), h(0), h(0), 0, 0],
            script_type: InputScriptType::SpendWitness,
            amount,
            ..Default::default()
        }
    }

    fn output(amount: u64) -> TxOutput {
        TxOutput {
            address: Some("bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4".to_string()),
            amount,
            script_type: OutputScriptType::PayToWitness,
            ..Default::default()
        }
    }

    const P2WPKH: [u8; 22] = [0; 22];

    #[test]
    fn basic_totals() {
        let mut ui = Recorder::default();
        let mut a = BasicApprover::new(&sign_tx(), &BITCOIN, SafetyCheckLevel::Strict);
        let info = TxInfo::new(BitcoinSigHasher::new());

        a.add_internal_input(&mut ui, &input(100_000)).unwrap();
        a.add_external_output(&mut ui, &output(90_000), &P2WPKH, None)
            .unwrap();
        a.approve_tx(&mut ui, &info, &[]).unwrap();

        assert_eq!(a.base().totals.fee(), Ok(10_000));
        assert_eq!(ui.0, vec![PromptKind::Output, PromptKind::Total]);
    }

    #[test]
    fn fee_over_threshold() {
        let mut ui = Recorder::default();
        let coin = CoinInfo {
            maxfee_kb: 10_000,
            ..BITCOIN
        };
        let info = TxInfo::new(BitcoinSigHasher::new());

        // Over the soft threshold (~1095 sat), prompts
        let mut a = BasicApprover::new(&sign_tx(), &coin, SafetyCheckLevel::Strict);
        a.add_internal_input(&mut ui, &input(100_000)).unwrap();
        a.add_external_output(&mut ui, &output(95_000), &P2WPKH, None)
            .unwrap();
        a.approve_tx(&mut ui, &info, &[]).unwrap();
        assert!(ui.0.contains(&PromptKind::FeeOverThreshold));

        // Over the hard threshold, refused under strict checks
        let mut a = BasicApprover::new(&sign_tx(), &coin, SafetyCheckLevel::Strict);
        a.add_internal_input(&mut ui, &input(100_000)).unwrap();
        a.add_external_output(&mut ui, &output(80_000), &P2WPKH, None)
            .unwrap();
        assert_eq!(
            a.approve_tx(&mut ui, &info, &[]),
            Err(Error::FeeOverThreshold)
        );

        // And prompted otherwise
        let mut a = BasicApprover::new(&sign_tx(), &coin, SafetyCheckLevel::PromptAlways);
        a.add_internal_input(&mut ui, &input(100_000)).unwrap();
        a.add_external_output(&mut ui, &output(80_000), &P2WPKH, None)
            .unwrap();
        a.approve_tx(&mut ui, &info, &[]).unwrap();
    }

    #[test]
    fn unverified_external_inputs() {
        let mut ui = Recorder::default();
        let ext = TxInput {
            address_n: vec![],
            script_type: InputScriptType::External,
            script_pubkey: Some(P2WPKH.to_vec()),
            ..input(1000)
        };

        let mut a = BasicApprover::new(&sign_tx(), &BITCOIN, SafetyCheckLevel::Strict);
        assert_eq!(
            a.add_external_input(&mut ui, &ext),
            Err(Error::UnverifiedExternalInput)
        );

        let mut a = BasicApprover::new(&sign_tx(), &BITCOIN, SafetyCheckLevel::PromptTemporarily);
        a.add_external_input(&mut ui, &ext).unwrap();
        assert_eq!(ui.0, vec![PromptKind::UnverifiedExternalInput]);
        assert_eq!(a.base().totals.external_in, 1000);
    }

    /// Replacement funds beyond the fee increase are refused
    #[test]
    fn replacement_spending_bound() {
        let info = TxInfo::new(BitcoinSigHasher::new());
        let meta = PrevTx {
            version: 2,
            inputs_count: 1,
            outputs_count: 1,
            ..Default::default()
        };
        let orig = OriginalTxInfo::new(&Bitcoin, [0x42; 32], meta.clone()).unwrap();

        let orig_totals = Totals {
            orig_total_in: 50_000,
            orig_total_out: 49_000,
            ..Default::default()
        };

        // Fee +500, spending unchanged
        let mut ui = Recorder::default();
        let mut a = BasicApprover::new(&sign_tx(), &BITCOIN, SafetyCheckLevel::Strict);
        a.base.is_replacement = true;
        a.base.totals = Totals {
            total_in: 50_000,
            total_out: 48_500,
            ..orig_totals.clone()
        };
        a.approve_replacement(&mut ui, &info, &[orig], 110).unwrap();
        assert_eq!(ui.0, vec![PromptKind::ModifyFee]);

        // Fee +500, spending +600
        let orig = OriginalTxInfo::new(&Bitcoin, [0x42; 32], meta).unwrap();
        let mut a = BasicApprover::new(&sign_tx(), &BITCOIN, SafetyCheckLevel::Strict);
        a.base.is_replacement = true;
        a.base.totals = Totals {
            total_in: 50_600,
            total_out: 49_100,
            ..orig_totals
        };
        assert_eq!(a.base.totals.fee(), Ok(1_500));
        assert_eq!(a.base.totals.spending(), Ok(50_600));
        assert_eq!(
            a.approve_replacement(&mut Recorder::default(), &info, &[orig], 110),
            Err(Error::InvalidReplacement)
        );
    }

    #[test]
    fn totals_out_of_range() {
        let t = Totals {
            total_in: 1_000,
            total_out: 1_500,
            ..Default::default()
        };
        assert_eq!(t.fee(), Ok(-500));

        let t = Totals {
            total_in: u64::MAX,
            ..Default::default()
        };
        assert_eq!(t.fee(), Err(Error::InvalidAmount));
        assert_eq!(t.spending(), Err(Error::InvalidAmount));

        let t = Totals {
            orig_total_out: u64::MAX,
            ..Default::default()
        };
        assert_eq!(t.orig_fee(), Err(Error::InvalidAmount));
    }

    #[test]
    fn foreign_path_confirmed_once() {
        let mut ui = Recorder::default();
        let mut a = BasicApprover::new(&sign_tx(), &BITCOIN, SafetyCheckLevel::Strict);

        let foreign = TxInput {
            address_n: vec![h(84), h(0), h(0), 5, 0],
            ..input(1000)
        };
        a.add_internal_input(&mut ui, &foreign).unwrap();
        a.add_internal_input(&mut ui, &foreign).unwrap();
        a.add_internal_input(&mut ui, &input(1000)).unwrap();

        assert_eq!(ui.0, vec![PromptKind::ForeignAddress]);
    }

    #[test]
    fn declined_prompt_cancels() {
        struct Decline;
        impl Ui for Decline {
            fn confirm(&mut self, _: &CoinInfo, _: AmountUnit, _: &Prompt<'_>) -> bool {
                false
            }
        }

        let mut a = BasicApprover::new(&sign_tx(), &BITCOIN, SafetyCheckLevel::Strict);
        assert_eq!(
            a.add_external_output(&mut Decline, &output(1000), &P2WPKH, None),
            Err(Error::ActionCancelled)
        );
    }

    fn authorization() -> CoinJoinAuthorization {
        CoinJoinAuthorization::new(AuthorizeCoinJoin {
            coordinator: "www.example.com".to_string(),
            max_rounds: 3,
            max_coordinator_fee_rate: 300_000,
            max_fee_per_kvbyte: 7_000,
            max_total_fee: 100_000,
            address_n: vec![h(10025), h(0), h(0), h(1)],
            coin_name: "Bitcoin".to_string(),
            script_type: InputScriptType::SpendTaproot,
            ..Default::default()
        })
        .unwrap()
    }

    fn coinjoin_tx() -> SignTx {
        SignTx {
            coinjoin_request: Some(CoinJoinRequest {
                fee_rate: 300_000,
                no_fee_threshold: 1_000_000,
                min_registrable_amount: 5_000,
                round_id: [0; 32],
            }),
            ..sign_tx()
        }
    }

    fn coinjoin_input(amount: u64) -> TxInput {
        TxInput {
            address_n: vec![h(10025), h(0), h(0), h(1), 0, 1],
            script_type: InputScriptType::SpendTaproot,
            amount,
            ..Default::default()
        }
    }

    fn coinjoin_change(amount: u64) -> TxOutput {
        TxOutput {
            address_n: vec![h(10025), h(0), h(0), h(1), 1, 1],
            script_type: OutputScriptType::PayToTaproot,
            amount,
            ..Default::default()
        }
    }

    #[test]
    fn coinjoin_fee_limits() {
        let mut ui = Recorder::default();
        let mut auth = authorization();
        let info = TxInfo::new(BitcoinSigHasher::new());

        {
            let mut a = CoinJoinApprover::new(&coinjoin_tx(), &BITCOIN, &mut auth).unwrap();
            a.add_internal_input(&mut ui, &coinjoin_input(10_000_000)).unwrap();
            a.add_change_output(&coinjoin_change(9_970_000), &[0x51; 34])
                .unwrap();

            // coordination 30000, mining 7 * 111 = 777, margin 5301
            a.approve_tx(&mut ui, &info, &[]).unwrap();
            a.on_complete().unwrap();
        }
        assert_eq!(auth.max_rounds, 2);
        assert_eq!(auth.remaining_fee, 70_000);
        assert!(ui.0.is_empty());

        let mut a = CoinJoinApprover::new(&coinjoin_tx(), &BITCOIN, &mut auth).unwrap();
        a.add_internal_input(&mut ui, &coinjoin_input(10_000_000)).unwrap();
        a.add_change_output(&coinjoin_change(9_940_000), &[0x51; 34])
            .unwrap();
        assert_eq!(
            a.approve_tx(&mut ui, &info, &[]),
            Err(Error::FeeOverThreshold)
        );
    }

    #[test]
    fn coinjoin_paths_authorized() {
        let mut ui = Recorder::default();
        let mut auth = authorization();
        let mut a = CoinJoinApprover::new(&coinjoin_tx(), &BITCOIN, &mut auth).unwrap();

        assert_eq!(
            a.add_internal_input(&mut ui, &input(1000)),
            Err(Error::Unauthorized)
        );

        let other = TxOutput {
            address_n: vec![h(10025), h(0), h(1), h(1), 1, 1],
            ..coinjoin_change(1000)
        };
        assert_eq!(
            a.add_change_output(&other, &[0x51; 34]),
            Err(Error::Unauthorized)
        );
    }
}
