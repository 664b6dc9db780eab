// Copyright (c) 2022-2023 The MobileCoin Foundation

use alloc::vec::Vec;

use heapless::Vec as HVec;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use strum::Display;

use super::{PaymentRequest, PrevInput, PrevOutput, PrevTx, TxInput, TxOutput};

/// Maximum serialized transaction bytes carried by a single request
pub const SERIALIZED_CHUNK_SIZE: usize = 2048;

/// Maximum signature length (DER encoded ECDSA)
pub const MAX_SIGNATURE_LEN: usize = 72;

/// Kind of data requested from the host
#[derive(Copy, Clone, PartialEq, Eq, Debug, Display, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum RequestType {
    /// Input of the current transaction, or of a previous transaction when
    /// `tx_hash` is set
    TxInput = 0,
    /// Output of the current transaction, or of a previous transaction when
    /// `tx_hash` is set
    TxOutput = 1,
    /// Header of a previous or original transaction
    TxMeta = 2,
    /// Signing complete, flushes the final chunk
    TxFinished = 3,
    /// Extra data chunk of a previous transaction
    TxExtraData = 4,
    /// Input of an original (replaced) transaction
    TxOrigInput = 5,
    /// Output of an original (replaced) transaction
    TxOrigOutput = 6,
    /// Payment request covering a run of outputs
    TxPaymentReq = 7,
}

/// Request details, echoed by the host in the matching [TxAck]
#[derive(Clone, PartialEq, Debug, Default)]
pub struct RequestDetails {
    pub request_index: Option<u32>,
    pub tx_hash: Option<[u8; 32]>,
    pub extra_data_len: Option<u32>,
    pub extra_data_offset: Option<u32>,
}

/// Serialized data attached to a request
#[derive(Clone, PartialEq, Debug, Default)]
pub struct Serialized {
    /// Input index of `signature`
    pub signature_index: Option<u32>,
    /// Signature without hash type
    pub signature: Option<HVec<u8, MAX_SIGNATURE_LEN>>,
    /// Next chunk of the serialized transaction
    pub serialized_tx: HVec<u8, SERIALIZED_CHUNK_SIZE>,
}

/// Request issued by the signer, one per suspension point
#[derive(Clone, PartialEq, Debug)]
pub struct TxRequest {
    pub request_type: RequestType,
    pub details: RequestDetails,
    pub serialized: Serialized,
}

/// Host response payload
#[derive(Clone, PartialEq, Debug)]
pub enum AckData {
    Input(TxInput),
    Output(TxOutput),
    Meta(PrevTx),
    PrevInput(PrevInput),
    PrevOutput(PrevOutput),
    ExtraData(Vec<u8>),
    PaymentRequest(PaymentRequest),
}

/// Host response to a [TxRequest]
#[derive(Clone, PartialEq, Debug)]
pub struct TxAck {
    /// Details of the request being answered
    pub details: RequestDetails,
    pub data: AckData,
}

impl TxAck {
    /// Build a response for the provided request
    pub fn new(req: &TxRequest, data: AckData) -> Self {
        Self {
            details: req.details.clone(),
            data,
        }
    }
}
