// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Hashing, serialization and script helpers shared by the signer

use ripemd::Ripemd160;
use sha2::{
    digest::{consts::U32, OutputSizeUser},
    Digest, Sha256,
};

use crate::Error;

pub mod address;
pub mod fmt;
pub mod multisig;
pub mod paths;
pub mod readers;
pub mod scripts;
pub mod writers;

use writers::TxWriter;

/// Streaming hash writer, used for transaction ids, signature digests and
/// the running consistency digests
#[derive(Clone)]
pub struct HashWriter<D = Sha256>(D);

impl<D: Digest + Clone + OutputSizeUser<OutputSize = U32>> HashWriter<D> {
    /// Create a new (empty) hash writer
    pub fn new() -> Self {
        Self(D::new())
    }

    /// Append raw bytes
    pub fn update(&mut self, b: &[u8]) {
        Digest::update(&mut self.0, b);
    }

    /// Fetch the digest of the data written so far, without consuming the writer
    pub fn digest(&self) -> [u8; 32] {
        self.0.clone().finalize().into()
    }
}

impl HashWriter<Sha256> {
    /// Create a BIP-340 tagged hash writer
    pub fn tagged(tag: &[u8]) -> Self {
        let t = sha256(tag);

        let mut h = Self::new();
        h.update(&t);
        h.update(&t);
        h
    }

    /// Fetch the transaction hash of the data written so far, optionally
    /// double hashed and reversed to display order
    pub fn tx_hash(&self, double: bool, reverse: bool) -> [u8; 32] {
        let mut d = self.digest();
        if double {
            d = sha256(&d);
        }
        if reverse {
            d.reverse();
        }
        d
    }
}

impl<D: Digest + Clone + OutputSizeUser<OutputSize = U32>> Default for HashWriter<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Digest + Clone + OutputSizeUser<OutputSize = U32>> TxWriter for HashWriter<D> {
    fn write_bytes(&mut self, b: &[u8]) -> Result<(), Error> {
        self.update(b);
        Ok(())
    }
}

/// SHA-256
pub fn sha256(b: &[u8]) -> [u8; 32] {
    Sha256::digest(b).into()
}

/// Double SHA-256
pub fn sha256d(b: &[u8]) -> [u8; 32] {
    sha256(&sha256(b))
}

/// RIPEMD-160 of SHA-256
pub fn hash160(b: &[u8]) -> [u8; 20] {
    Ripemd160::digest(sha256(b)).into()
}

/// BIP-340 tagged hash
pub fn tagged_hash(tag: &[u8], msg: &[u8]) -> [u8; 32] {
    let mut h = HashWriter::tagged(tag);
    h.update(msg);
    h.digest()
}
