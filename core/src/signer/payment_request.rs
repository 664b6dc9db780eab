// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Signed payment request verification (SLIP-0024)

use secp256k1::{ecdsa::Signature, All, Message, PublicKey, Secp256k1};

use crate::{
    helpers::{
        writers::{write_bytes_prefixed, write_compact_size, write_tx_output, write_u32},
        HashWriter,
    },
    msg::PaymentRequest,
    Error,
};

/// Payment request digest prefix
const SLIP24_MAGIC: &[u8] = b"SL\x00\x24";

/// Verifies a payment request against the outputs it covers
pub struct PaymentRequestVerifier {
    h_msg: HashWriter,
    h_outputs: HashWriter,
    amount: u64,
    expected_amount: Option<u64>,
    signature: Signature,
    key: PublicKey,
}

impl PaymentRequestVerifier {
    /// Start verifying a payment request using the trusted signing key
    pub fn new(req: &PaymentRequest, slip44: u32, key: Option<&[u8]>) -> Result<Self, Error> {
        let key = match key.map(PublicKey::from_slice) {
            Some(Ok(k)) => k,
            _ => {
                #[cfg(feature = "log")]
                log::error!("no trusted payment request key");

                return Err(Error::InvalidPaymentRequest);
            }
        };

        let signature =
            Signature::from_compact(&req.signature).map_err(|_| Error::InvalidPaymentRequest)?;

        let mut h_msg: HashWriter = HashWriter::new();
        h_msg.update(SLIP24_MAGIC);
        write_bytes_prefixed(&mut h_msg, req.nonce.as_deref().unwrap_or(&[]))?;
        write_bytes_prefixed(&mut h_msg, req.recipient_name.as_bytes())?;
        // Memos are not supported
        write_compact_size(&mut h_msg, 0)?;
        write_u32(&mut h_msg, slip44)?;

        Ok(Self {
            h_msg,
            h_outputs: HashWriter::new(),
            amount: 0,
            expected_amount: req.amount,
            signature,
            key,
        })
    }

    /// Add a covered output
    pub fn add_output(&mut self, amount: u64, script_pubkey: &[u8]) -> Result<(), Error> {
        write_tx_output(&mut self.h_outputs, amount, script_pubkey)?;
        self.amount = self
            .amount
            .checked_add(amount)
            .ok_or(Error::InvalidPaymentRequest)?;
        Ok(())
    }

    /// Check the amount and signature once every covered output was added
    pub fn verify(mut self, secp: &Secp256k1<All>) -> Result<(), Error> {
        if let Some(a) = self.expected_amount {
            if a != self.amount {
                #[cfg(feature = "log")]
                log::error!("payment request amount mismatch");

                return Err(Error::InvalidPaymentRequest);
            }
        }

        self.h_msg.update(&self.h_outputs.digest());

        let msg = Message::from_digest(self.h_msg.digest());
        secp.verify_ecdsa(&msg, &self.signature, &self.key)
            .map_err(|_| Error::InvalidPaymentRequest)
    }

    /// Digest signed by the payment request issuer, for issuers and tests
    pub fn digest(&self) -> [u8; 32] {
        let mut h = self.h_msg.clone();
        h.update(&self.h_outputs.digest());
        h.digest()
    }
}
