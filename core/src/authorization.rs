// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Automated coinjoin authorization
//!
//! A [CoinJoinAuthorization] is created by a separate authorization step
//! (see [AuthorizeCoinJoin]) and persisted by the platform across signing
//! sessions. Each successfully completed session consumes one round and the
//! fees charged to the user.

use alloc::{string::String, vec::Vec};

use crate::{
    coin::CoinInfo,
    helpers::paths::{BIP32_WALLET_DEPTH, MAX_PATH_DEPTH},
    msg::{AuthorizeCoinJoin, InputScriptType, SignTx, TxInput, TxOutput},
    Error,
};

/// Round identifier length
pub const ROUND_ID_LEN: usize = 32;

/// Lifetime of a round binding in seconds
pub const ROUND_BINDING_TTL: u64 = 600;

/// Maximum coordinator identifier length
pub const MAX_COORDINATOR_LEN: usize = 36;

/// Coordination fee rate denominator (fee rates are in units of 10^-8)
pub const FEE_RATE_DECIMALS: u64 = 100_000_000;

/// Round a [CoinJoinAuthorization] is currently bound to
#[derive(Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RoundBinding {
    pub round_id: [u8; ROUND_ID_LEN],
    /// Expiry, seconds since the platform epoch
    pub expiry: u64,
}

/// Pre-granted automated signing authorization
#[derive(Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CoinJoinAuthorization {
    pub coordinator: String,
    pub max_rounds: u32,
    pub max_coordinator_fee_rate: u32,
    pub max_fee_per_kvbyte: u32,
    pub remaining_fee: u64,
    pub address_n: Vec<u32>,
    pub coin_name: String,
    pub script_type: InputScriptType,
    binding: Option<RoundBinding>,
}

impl CoinJoinAuthorization {
    /// Create an authorization from a (user confirmed) request
    pub fn new(req: AuthorizeCoinJoin) -> Result<Self, Error> {
        if req.coordinator.is_empty()
            || req.coordinator.len() > MAX_COORDINATOR_LEN
            || !req.coordinator.is_ascii()
        {
            #[cfg(feature = "log")]
            log::error!("invalid coordinator name");

            return Err(Error::InvalidCoinJoinRequest);
        }

        if req.max_rounds < 1 {
            return Err(Error::InvalidCoinJoinRequest);
        }

        if req.address_n.is_empty() || req.address_n.len() + BIP32_WALLET_DEPTH > MAX_PATH_DEPTH {
            return Err(Error::InvalidPath);
        }

        if !req.script_type.is_internal() {
            return Err(Error::InvalidScriptType);
        }

        Ok(Self {
            coordinator: req.coordinator,
            max_rounds: req.max_rounds,
            max_coordinator_fee_rate: req.max_coordinator_fee_rate,
            max_fee_per_kvbyte: req.max_fee_per_kvbyte,
            remaining_fee: req.max_total_fee,
            address_n: req.address_n,
            coin_name: req.coin_name,
            script_type: req.script_type,
            binding: None,
        })
    }

    /// Fetch the current round binding
    pub fn binding(&self) -> Option<&RoundBinding> {
        self.binding.as_ref()
    }

    /// Check a path and script type are covered by the authorization
    fn check_path(&self, path: &[u32], script_type: Option<InputScriptType>) -> bool {
        path.len() == self.address_n.len() + BIP32_WALLET_DEPTH
            && path[..self.address_n.len()] == self.address_n[..]
            && script_type == Some(self.script_type)
    }

    /// Check an internal input is covered by the authorization
    pub fn check_internal_input(&self, txi: &TxInput) -> bool {
        self.check_path(&txi.address_n, Some(txi.script_type))
    }

    /// Check an internal (change) output is covered by the authorization
    pub fn check_internal_output(&self, txo: &TxOutput) -> bool {
        self.check_path(&txo.address_n, txo.script_type.change_input_type())
    }

    /// Check an ownership proof request, binding the authorization to the
    /// committed round.
    ///
    /// Commitment data is `len(coordinator) || coordinator || round_id`.
    /// A new round may only be bound once the previous binding has expired.
    pub fn check_ownership_proof(&mut self, commitment_data: &[u8], now: u64) -> Result<(), Error> {
        let n = match commitment_data.first() {
            Some(n) => *n as usize,
            None => return Err(Error::InvalidCoinJoinRequest),
        };

        if commitment_data.len() != 1 + n + ROUND_ID_LEN
            || &commitment_data[1..1 + n] != self.coordinator.as_bytes()
        {
            #[cfg(feature = "log")]
            log::error!("ownership proof commitment does not match coordinator");

            return Err(Error::InvalidCoinJoinRequest);
        }

        let mut round_id = [0u8; ROUND_ID_LEN];
        round_id.copy_from_slice(&commitment_data[1 + n..]);

        match &self.binding {
            Some(b) if b.round_id == round_id => return Ok(()),
            Some(b) if now < b.expiry => {
                #[cfg(feature = "log")]
                log::error!("authorization bound to an unexpired round");

                return Err(Error::RoundMismatch);
            }
            _ => (),
        }

        #[cfg(feature = "log")]
        log::debug!("binding authorization to new round");

        self.binding = Some(RoundBinding {
            round_id,
            expiry: now.saturating_add(ROUND_BINDING_TTL),
        });

        Ok(())
    }

    /// Check a signing request is covered by the authorization
    pub fn approve_sign_tx(&self, tx: &SignTx, coin: &CoinInfo) -> Result<(), Error> {
        if self.coin_name != coin.name || tx.coin_name != coin.name {
            return Err(Error::UnknownCoin);
        }

        if self.max_rounds < 1 {
            #[cfg(feature = "log")]
            log::error!("coinjoin rounds exhausted");

            return Err(Error::RoundsExhausted);
        }

        let req = tx
            .coinjoin_request
            .as_ref()
            .ok_or(Error::InvalidCoinJoinRequest)?;

        if req.fee_rate > self.max_coordinator_fee_rate {
            return Err(Error::CoordinatorFeeTooHigh);
        }

        if let Some(b) = &self.binding {
            if b.round_id != req.round_id {
                #[cfg(feature = "log")]
                log::error!("coinjoin request round does not match binding");

                return Err(Error::RoundMismatch);
            }
        }

        Ok(())
    }

    /// Consume a round and the fees charged to the user on completion
    pub fn commit(&mut self, fee: u64) -> Result<(), Error> {
        if self.max_rounds < 1 {
            return Err(Error::RoundsExhausted);
        }
        if fee > self.remaining_fee {
            return Err(Error::FeeOverThreshold);
        }

        self.max_rounds -= 1;
        self.remaining_fee -= fee;

        #[cfg(feature = "log")]
        log::debug!(
            "coinjoin round complete ({} rounds, {} fee remaining)",
            self.max_rounds,
            self.remaining_fee
        );

        Ok(())
    }
}
