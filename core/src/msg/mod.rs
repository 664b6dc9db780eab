// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Messages exchanged between the host and the [Signer][crate::signer::Signer]
//!
//! The host supplies a [SignTx] to start a session, then answers each
//! [TxRequest] with a [TxAck] carrying the requested item.

mod tx;
pub use tx::*;

mod request;
pub use request::*;
