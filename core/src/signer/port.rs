// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Host data port
//!
//! Each suspension point of the [Signer][super::Signer] issues exactly one
//! [TxRequest] through a [TxPort], carrying any serialized output produced
//! since the previous request, and resumes with the matching [TxAck].

use alloc::vec::Vec;

use heapless::Vec as HVec;

use crate::{
    helpers::writers::TxWriter,
    msg::{
        AckData, PaymentRequest, PrevInput, PrevOutput, PrevTx, RequestDetails, RequestType,
        Serialized, TxAck, TxInput, TxOutput, TxRequest, MAX_SIGNATURE_LEN,
        SERIALIZED_CHUNK_SIZE,
    },
    Error,
};

/// [`TxPort`] trait provides the request / response channel to the host
pub trait TxPort {
    /// Issue a request, returning the host response
    fn exchange(&mut self, req: TxRequest) -> Result<TxAck, Error>;

    /// Issue the final request, flushing the last serialized chunk
    fn finish(&mut self, req: TxRequest) -> Result<(), Error>;
}

impl<T: TxPort> TxPort for &mut T {
    fn exchange(&mut self, req: TxRequest) -> Result<TxAck, Error> {
        T::exchange(self, req)
    }

    fn finish(&mut self, req: TxRequest) -> Result<(), Error> {
        T::finish(self, req)
    }
}

/// Serialized output pending delivery with the next request
#[derive(Clone, PartialEq, Debug, Default)]
pub struct Chunk {
    serialized_tx: HVec<u8, SERIALIZED_CHUNK_SIZE>,
    signature: Option<(u32, HVec<u8, MAX_SIGNATURE_LEN>)>,
}

impl Chunk {
    /// Attach a signature for delivery with the next request
    pub fn set_signature(&mut self, index: u32, signature: &[u8]) -> Result<(), Error> {
        let s = HVec::from_slice(signature).map_err(|_| Error::SignError)?;
        self.signature = Some((index, s));
        Ok(())
    }

    /// Take pending output, leaving the chunk empty
    fn take(&mut self) -> Serialized {
        let (signature_index, signature) = match self.signature.take() {
            Some((i, s)) => (Some(i), Some(s)),
            None => (None, None),
        };

        Serialized {
            signature_index,
            signature,
            serialized_tx: core::mem::take(&mut self.serialized_tx),
        }
    }
}

impl TxWriter for Chunk {
    fn write_bytes(&mut self, b: &[u8]) -> Result<(), Error> {
        self.serialized_tx.write_bytes(b)
    }
}

/// Typed requests over a [TxPort]
pub struct HostPort<P: TxPort> {
    port: P,
    /// Output to deliver with the next request
    pub chunk: Chunk,
}

impl<P: TxPort> HostPort<P> {
    /// Wrap a data port
    pub fn new(port: P) -> Self {
        Self {
            port,
            chunk: Chunk::default(),
        }
    }

    fn exchange(&mut self, request_type: RequestType, details: RequestDetails) -> Result<AckData, Error> {
        let req = TxRequest {
            request_type,
            details,
            serialized: self.chunk.take(),
        };

        #[cfg(feature = "log")]
        log::debug!("request: {} {:?}", req.request_type, req.details);

        let expected = req.details.clone();
        let ack = self.port.exchange(req)?;

        // Responses must answer the outstanding request
        if ack.details != expected {
            #[cfg(feature = "log")]
            log::error!("response details mismatch: {:?}", ack.details);

            return Err(Error::UnexpectedAck);
        }

        Ok(ack.data)
    }

    fn details(index: u32, tx_hash: Option<[u8; 32]>) -> RequestDetails {
        RequestDetails {
            request_index: Some(index),
            tx_hash,
            ..Default::default()
        }
    }

    /// Request input `index` of the transaction being signed
    pub fn tx_input(&mut self, index: u32) -> Result<TxInput, Error> {
        match self.exchange(RequestType::TxInput, Self::details(index, None))? {
            AckData::Input(txi) => Ok(txi),
            _ => Err(Error::UnexpectedAck),
        }
    }

    /// Request output `index` of the transaction being signed
    pub fn tx_output(&mut self, index: u32) -> Result<TxOutput, Error> {
        match self.exchange(RequestType::TxOutput, Self::details(index, None))? {
            AckData::Output(txo) => Ok(txo),
            _ => Err(Error::UnexpectedAck),
        }
    }

    /// Request the header of a previous or original transaction
    pub fn tx_meta(&mut self, tx_hash: &[u8; 32]) -> Result<PrevTx, Error> {
        let details = RequestDetails {
            tx_hash: Some(*tx_hash),
            ..Default::default()
        };

        match self.exchange(RequestType::TxMeta, details)? {
            AckData::Meta(tx) => Ok(tx),
            _ => Err(Error::UnexpectedAck),
        }
    }

    /// Request input `index` of a previous transaction
    pub fn prev_input(&mut self, tx_hash: &[u8; 32], index: u32) -> Result<PrevInput, Error> {
        match self.exchange(RequestType::TxInput, Self::details(index, Some(*tx_hash)))? {
            AckData::PrevInput(txi) => Ok(txi),
            _ => Err(Error::UnexpectedAck),
        }
    }

    /// Request output `index` of a previous transaction
    pub fn prev_output(&mut self, tx_hash: &[u8; 32], index: u32) -> Result<PrevOutput, Error> {
        match self.exchange(RequestType::TxOutput, Self::details(index, Some(*tx_hash)))? {
            AckData::PrevOutput(txo) => Ok(txo),
            _ => Err(Error::UnexpectedAck),
        }
    }

    /// Request a chunk of previous transaction extra data
    pub fn extra_data(&mut self, tx_hash: &[u8; 32], offset: u32, len: u32) -> Result<Vec<u8>, Error> {
        let details = RequestDetails {
            tx_hash: Some(*tx_hash),
            extra_data_offset: Some(offset),
            extra_data_len: Some(len),
            ..Default::default()
        };

        match self.exchange(RequestType::TxExtraData, details)? {
            AckData::ExtraData(d) if d.len() == len as usize => Ok(d),
            _ => Err(Error::UnexpectedAck),
        }
    }

    /// Request input `index` of an original transaction
    pub fn orig_input(&mut self, tx_hash: &[u8; 32], index: u32) -> Result<TxInput, Error> {
        match self.exchange(RequestType::TxOrigInput, Self::details(index, Some(*tx_hash)))? {
            AckData::Input(txi) => Ok(txi),
            _ => Err(Error::UnexpectedAck),
        }
    }

    /// Request output `index` of an original transaction
    pub fn orig_output(&mut self, tx_hash: &[u8; 32], index: u32) -> Result<TxOutput, Error> {
        match self.exchange(RequestType::TxOrigOutput, Self::details(index, Some(*tx_hash)))? {
            AckData::Output(txo) => Ok(txo),
            _ => Err(Error::UnexpectedAck),
        }
    }

    /// Request payment request `index`
    pub fn payment_request(&mut self, index: u32) -> Result<PaymentRequest, Error> {
        match self.exchange(RequestType::TxPaymentReq, Self::details(index, None))? {
            AckData::PaymentRequest(r) => Ok(r),
            _ => Err(Error::UnexpectedAck),
        }
    }

    /// Signal completion, flushing the final chunk
    pub fn finish(&mut self) -> Result<(), Error> {
        let req = TxRequest {
            request_type: RequestType::TxFinished,
            details: RequestDetails::default(),
            serialized: self.chunk.take(),
        };

        #[cfg(feature = "log")]
        log::debug!("request: {}", req.request_type);

        self.port.finish(req)
    }
}
