// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Bitcoin hardware wallet core
//!
//! This provides a streaming transaction [Signer][signer::Signer] for
//! execution on hardware wallets, where neither the transaction nor its
//! previous transactions fit in memory.
//!
//! Interactions with the signer are performed via [TxRequest][msg::TxRequest]s
//! issued through a [TxPort][signer::TxPort], each answered by the host with a
//! [TxAck][msg::TxAck] carrying the requested item. Key derivation and user
//! confirmation are supplied by the platform via the [Keychain][keychain::Keychain]
//! and [Ui][ui::Ui] traits.
//!
//! ## Operations
//!
//! ### Signing a transaction
//!
//! Call [`sign_tx`][signer::sign_tx] with a [`SignTx`][msg::SignTx] header, the
//! [`CoinInfo`][coin::CoinInfo] parameters for the coin and a
//! [`SignerConfig`][config::SignerConfig]. The signer then:
//!
//! 1. Requests each input, streaming the previous transaction it spends to
//!    check the claimed amount and locking script
//! 2. Requests each output, raising confirmations for outputs that are not
//!    change, then the totals and fee
//! 3. Re-requests inputs and outputs, emitting the serialized transaction
//!    and signatures in [`Serialized`][msg::Serialized] chunks attached to
//!    subsequent requests
//! 4. Issues [`TxFinished`][msg::RequestType::TxFinished] with the final chunk
//!
//! Any difference between passes aborts signing with
//! [`Error::TxChanged`].
//!
//! ### Replacing a transaction
//!
//! Inputs and outputs may reference an original transaction via `orig_hash`
//! and `orig_index`, in which case the original is streamed alongside and
//! the replacement is checked to only change the fee (or the amounts paid
//! by a payjoin counterparty).
//!
//! ### Automated coinjoin
//!
//! A [`CoinJoinAuthorization`][authorization::CoinJoinAuthorization] created
//! from a confirmed [`AuthorizeCoinJoin`][msg::AuthorizeCoinJoin] request
//! may be passed to [`sign_tx`][signer::sign_tx] to sign coinjoin rounds
//! without confirmation, within the authorized fee and round limits.
//!

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod authorization;

pub mod coin;

pub mod config;

mod error;
pub use error::{Error, ErrorKind};

pub mod helpers;

pub mod keychain;

pub mod msg;

pub mod signer;
pub use signer::sign_tx;

pub mod ui;
