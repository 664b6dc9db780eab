// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Verification of signatures supplied by the host
//!
//! Presigned external inputs and the inputs of replaced transactions carry
//! existing signatures. A [SignatureVerifier] parses these from the
//! script_sig and witness, checks they belong to the spent locking script,
//! and verifies them against the digest the signer recomputes.

use alloc::{vec, vec::Vec};

use secp256k1::{ecdsa, schnorr, Message, PublicKey, Secp256k1, Verification, XOnlyPublicKey};

use crate::{
    helpers::{hash160, multisig::parse_redeem_script, scripts, sha256},
    Error,
};

/// Digest committed to by an input signature
#[derive(Copy, Clone, PartialEq, Debug)]
pub enum SpendKind {
    /// Legacy digest, or BIP-143 where the coin forces it
    Legacy,
    /// BIP-143 digest
    Witness,
    /// BIP-341 key-path digest
    Taproot,
}

/// Keys and signatures parsed from an input
#[derive(Clone, PartialEq, Debug)]
pub struct SignatureVerifier {
    kind: SpendKind,
    /// Public keys in script order, x-only for taproot
    public_keys: Vec<Vec<u8>>,
    /// Signatures with their hash types, in script order
    signatures: Vec<(Vec<u8>, u8)>,
    threshold: usize,
    /// Script committed to by ECDSA digests
    script_code: Vec<u8>,
}

impl SignatureVerifier {
    /// Parse the signatures of an input spending `script_pubkey`
    pub fn new(
        script_pubkey: &[u8],
        script_sig: Option<&[u8]>,
        witness: Option<&[u8]>,
    ) -> Result<Self, Error> {
        let script_sig = script_sig.filter(|s| !s.is_empty());
        // A single zero byte is an empty witness stack
        let witness = witness.filter(|w| !w.is_empty() && *w != [0u8]);

        let v = match (script_sig, witness) {
            (None, Some(w)) => Self::native_segwit(script_pubkey, w)?,
            (Some(s), Some(w)) => Self::nested_segwit(script_pubkey, s, w)?,
            (Some(s), None) => Self::legacy(script_pubkey, s)?,
            (None, None) => {
                #[cfg(feature = "log")]
                log::error!("no signature data provided");

                return Err(Error::InvalidSignature);
            }
        };

        if v.signatures.len() != v.threshold {
            #[cfg(feature = "log")]
            log::error!("{} of {} signatures provided", v.signatures.len(), v.threshold);

            return Err(Error::InvalidSignature);
        }

        Ok(v)
    }

    fn single(kind: SpendKind, pubkey: &[u8], signature: &[u8], hash_type: u8) -> Self {
        Self {
            kind,
            public_keys: vec![pubkey.to_vec()],
            signatures: vec![(signature.to_vec(), hash_type)],
            threshold: 1,
            script_code: scripts::output_script_p2pkh(&hash160(pubkey)),
        }
    }

    fn multisig(kind: SpendKind, redeem: &[u8], signatures: Vec<(&[u8], u8)>) -> Result<Self, Error> {
        let (keys, threshold) = parse_redeem_script(redeem)?;

        Ok(Self {
            kind,
            public_keys: keys.iter().map(|k| k.to_vec()).collect(),
            signatures: signatures.iter().map(|(s, h)| (s.to_vec(), *h)).collect(),
            threshold,
            script_code: redeem.to_vec(),
        })
    }

    fn native_segwit(script_pubkey: &[u8], witness: &[u8]) -> Result<Self, Error> {
        match script_pubkey {
            [0x00, 0x14, program @ ..] if program.len() == 20 => {
                let (pubkey, signature, hash_type) = scripts::parse_witness_p2wpkh(witness)?;
                if hash160(pubkey)[..] != *program {
                    return Err(Error::InvalidSignature);
                }
                Ok(Self::single(SpendKind::Witness, pubkey, signature, hash_type))
            }
            [0x00, 0x20, program @ ..] if program.len() == 32 => {
                let (redeem, signatures) = scripts::parse_witness_multisig(witness)?;
                if sha256(redeem)[..] != *program {
                    return Err(Error::InvalidSignature);
                }
                Self::multisig(SpendKind::Witness, redeem, signatures)
            }
            [0x51, 0x20, output_key @ ..] if output_key.len() == 32 => {
                let (signature, hash_type) = scripts::parse_witness_p2tr(witness)?;
                Ok(Self {
                    kind: SpendKind::Taproot,
                    public_keys: vec![output_key.to_vec()],
                    signatures: vec![(signature.to_vec(), hash_type)],
                    threshold: 1,
                    script_code: Vec::new(),
                })
            }
            _ => {
                #[cfg(feature = "log")]
                log::error!("unsupported witness program");

                Err(Error::InvalidScriptType)
            }
        }
    }

    fn nested_segwit(script_pubkey: &[u8], script_sig: &[u8], witness: &[u8]) -> Result<Self, Error> {
        // script_sig pushes the witness program
        let program = match script_sig {
            [n, p @ ..] if *n as usize == p.len() => p,
            _ => return Err(Error::InvalidScript),
        };

        if scripts::output_script_p2sh(&hash160(program)) != script_pubkey {
            return Err(Error::InvalidSignature);
        }

        let v = Self::native_segwit(program, witness)?;
        match v.kind {
            SpendKind::Witness => Ok(v),
            _ => Err(Error::InvalidScriptType),
        }
    }

    fn legacy(script_pubkey: &[u8], script_sig: &[u8]) -> Result<Self, Error> {
        match script_pubkey {
            [0x76, 0xa9, 0x14, ..] if script_pubkey.len() == 25 => {
                let (pubkey, signature, hash_type) = scripts::parse_input_script_p2pkh(script_sig)?;
                if scripts::output_script_p2pkh(&hash160(pubkey)) != script_pubkey {
                    return Err(Error::InvalidSignature);
                }
                Ok(Self::single(SpendKind::Legacy, pubkey, signature, hash_type))
            }
            [0xa9, 0x14, ..] if script_pubkey.len() == 23 => {
                let (redeem, signatures) = scripts::parse_input_script_multisig(script_sig)?;
                if scripts::output_script_p2sh(&hash160(redeem)) != script_pubkey {
                    return Err(Error::InvalidSignature);
                }
                Self::multisig(SpendKind::Legacy, redeem, signatures)
            }
            _ => {
                #[cfg(feature = "log")]
                log::error!("unsupported legacy script");

                Err(Error::InvalidScriptType)
            }
        }
    }

    /// Digest the signatures commit to
    pub fn kind(&self) -> SpendKind {
        self.kind
    }

    /// Script code for ECDSA digests
    pub fn script_code(&self) -> &[u8] {
        &self.script_code
    }

    /// Hash type of the first signature
    pub fn hash_type(&self) -> u8 {
        self.signatures.first().map(|(_, h)| *h).unwrap_or_default()
    }

    /// Check every signature uses `hash_type`, taproot signatures may also
    /// use the default hash type
    pub fn ensure_hash_type(&self, hash_type: u8) -> Result<(), Error> {
        let ok = self.signatures.iter().all(|(_, h)| match self.kind {
            SpendKind::Taproot => *h == scripts::SIGHASH_ALL_TAPROOT || *h == hash_type,
            _ => *h == hash_type,
        });

        match ok {
            true => Ok(()),
            false => {
                #[cfg(feature = "log")]
                log::error!("unsupported sighash type");

                Err(Error::InvalidSignature)
            }
        }
    }

    /// Verify the signatures over `digest`
    pub fn verify<C: Verification>(&self, secp: &Secp256k1<C>, digest: &[u8; 32]) -> Result<(), Error> {
        let msg = Message::from_digest(*digest);

        if self.kind == SpendKind::Taproot {
            let (signature, key) = match (self.signatures.first(), self.public_keys.first()) {
                (Some((s, _)), Some(k)) => (s, k),
                _ => return Err(Error::InvalidSignature),
            };

            let sig = schnorr::Signature::from_slice(signature).map_err(|_| Error::InvalidSignature)?;
            let key = XOnlyPublicKey::from_slice(key).map_err(|_| Error::InvalidSignature)?;

            return secp
                .verify_schnorr(&sig, &msg, &key)
                .map_err(|_| Error::InvalidSignature);
        }

        // Each signature matches a later key than the last, as OP_CHECKMULTISIG
        let mut keys = self.public_keys.iter();
        for (der, _) in &self.signatures {
            let mut sig = ecdsa::Signature::from_der(der).map_err(|_| Error::InvalidSignature)?;
            sig.normalize_s();

            loop {
                let k = keys.next().ok_or(Error::InvalidSignature)?;
                let pk = PublicKey::from_slice(k).map_err(|_| Error::InvalidSignature)?;

                if secp.verify_ecdsa(&msg, &sig, &pk).is_ok() {
                    break;
                }
            }
        }

        Ok(())
    }
}
