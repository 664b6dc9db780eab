// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Standard script templates
//!
//! Locking scripts for each output type, plus the signature-carrying
//! scripts and witness stacks written for each signed input.

use alloc::vec::Vec;

use crate::{msg::MultisigRedeemScript, Error};

use super::{
    multisig,
    readers::{read_bytes_prefixed, read_compact_size, read_op_push, BufferReader},
    writers::{write_bytes_prefixed, write_compact_size, write_op_push, write_u8, TxWriter},
};

const OP_0: u8 = 0x00;
const OP_1: u8 = 0x51;
const OP_RETURN: u8 = 0x6a;
const OP_DUP: u8 = 0x76;
const OP_EQUAL: u8 = 0x87;
const OP_EQUALVERIFY: u8 = 0x88;
const OP_HASH160: u8 = 0xa9;
const OP_CHECKSIG: u8 = 0xac;

/// Taproot signatures using the default sighash omit the hash type byte
pub const SIGHASH_ALL_TAPROOT: u8 = 0x00;

/// `OP_DUP OP_HASH160 <20> OP_EQUALVERIFY OP_CHECKSIG`
pub fn output_script_p2pkh(pubkeyhash: &[u8; 20]) -> Vec<u8> {
    let mut s = Vec::with_capacity(25);
    s.extend_from_slice(&[OP_DUP, OP_HASH160, 20]);
    s.extend_from_slice(pubkeyhash);
    s.extend_from_slice(&[OP_EQUALVERIFY, OP_CHECKSIG]);
    s
}

/// `OP_HASH160 <20> OP_EQUAL`
pub fn output_script_p2sh(scripthash: &[u8; 20]) -> Vec<u8> {
    let mut s = Vec::with_capacity(23);
    s.extend_from_slice(&[OP_HASH160, 20]);
    s.extend_from_slice(scripthash);
    s.push(OP_EQUAL);
    s
}

/// `<version> <program>` for native segwit outputs
pub fn output_script_native_segwit(witver: u8, program: &[u8]) -> Vec<u8> {
    let mut s = Vec::with_capacity(2 + program.len());
    s.push(match witver {
        0 => OP_0,
        v => OP_1 + v - 1,
    });
    s.push(program.len() as u8);
    s.extend_from_slice(program);
    s
}

/// `OP_RETURN <data>`
pub fn output_script_op_return(data: &[u8]) -> Result<Vec<u8>, Error> {
    let mut s = Vec::with_capacity(2 + data.len());
    write_u8(&mut s, OP_RETURN)?;
    write_op_push(&mut s, data.len())?;
    s.write_bytes(data)?;
    Ok(s)
}

/// Push of a signature with its hash type byte appended
fn write_signature_push<W: TxWriter + ?Sized>(
    w: &mut W,
    signature: &[u8],
    hash_type: u8,
) -> Result<(), Error> {
    write_op_push(w, signature.len() + 1)?;
    w.write_bytes(signature)?;
    write_u8(w, hash_type)
}

/// `<sig> <pubkey>` script_sig for P2PKH inputs
pub fn input_script_p2pkh(pubkey: &[u8], signature: &[u8], hash_type: u8) -> Result<Vec<u8>, Error> {
    let mut s = Vec::with_capacity(signature.len() + pubkey.len() + 3);
    write_signature_push(&mut s, signature, hash_type)?;
    write_op_push(&mut s, pubkey.len())?;
    s.write_bytes(pubkey)?;
    Ok(s)
}

/// script_sig pushing a P2WPKH redeem script, for P2SH nested inputs
pub fn input_script_p2wpkh_in_p2sh(pubkeyhash: &[u8; 20]) -> Vec<u8> {
    let mut s = Vec::with_capacity(23);
    s.extend_from_slice(&[0x16, OP_0, 20]);
    s.extend_from_slice(pubkeyhash);
    s
}

/// script_sig pushing a P2WSH redeem script, for P2SH nested inputs
pub fn input_script_p2wsh_in_p2sh(scripthash: &[u8; 32]) -> Vec<u8> {
    let mut s = Vec::with_capacity(35);
    s.extend_from_slice(&[0x22, OP_0, 32]);
    s.extend_from_slice(scripthash);
    s
}

/// Merge our signature into the cosigner signature set
fn multisig_signatures(
    multisig: &MultisigRedeemScript,
    signature: &[u8],
    signature_index: usize,
) -> Vec<Vec<u8>> {
    let n = multisig.pubkeys.len();
    let mut sigs: Vec<Vec<u8>> = (0..n)
        .map(|i| multisig.signatures.get(i).cloned().unwrap_or_default())
        .collect();
    if let Some(s) = sigs.get_mut(signature_index) {
        *s = signature.to_vec();
    }
    sigs
}

/// `OP_0 <sigs...> <redeem script>` script_sig for P2SH multisig inputs
pub fn input_script_multisig(
    multisig: &MultisigRedeemScript,
    signature: &[u8],
    signature_index: usize,
    hash_type: u8,
) -> Result<Vec<u8>, Error> {
    let redeem = multisig::redeem_script(multisig)?;

    let mut s = Vec::new();
    // Extra item consumed by OP_CHECKMULTISIG
    write_u8(&mut s, OP_0)?;
    for sig in multisig_signatures(multisig, signature, signature_index) {
        if !sig.is_empty() {
            write_signature_push(&mut s, &sig, hash_type)?;
        }
    }
    write_op_push(&mut s, redeem.len())?;
    s.write_bytes(&redeem)?;
    Ok(s)
}

/// Witness stack for P2WPKH inputs
pub fn witness_p2wpkh<W: TxWriter + ?Sized>(
    w: &mut W,
    pubkey: &[u8],
    signature: &[u8],
    hash_type: u8,
) -> Result<(), Error> {
    write_compact_size(w, 2)?;
    write_compact_size(w, signature.len() + 1)?;
    w.write_bytes(signature)?;
    write_u8(w, hash_type)?;
    write_bytes_prefixed(w, pubkey)
}

/// Witness stack for P2WSH multisig inputs
pub fn witness_multisig<W: TxWriter + ?Sized>(
    w: &mut W,
    multisig: &MultisigRedeemScript,
    signature: &[u8],
    signature_index: usize,
    hash_type: u8,
) -> Result<(), Error> {
    let redeem = multisig::redeem_script(multisig)?;
    let sigs: Vec<Vec<u8>> = multisig_signatures(multisig, signature, signature_index)
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect();

    // Empty item, signatures, redeem script
    write_compact_size(w, sigs.len() + 2)?;
    write_u8(w, 0)?;
    for sig in &sigs {
        write_compact_size(w, sig.len() + 1)?;
        w.write_bytes(sig)?;
        write_u8(w, hash_type)?;
    }
    write_bytes_prefixed(w, &redeem)
}

/// Witness stack for taproot key-path inputs
pub fn witness_p2tr<W: TxWriter + ?Sized>(
    w: &mut W,
    signature: &[u8],
    hash_type: u8,
) -> Result<(), Error> {
    write_compact_size(w, 1)?;
    if hash_type == SIGHASH_ALL_TAPROOT {
        write_bytes_prefixed(w, signature)
    } else {
        write_compact_size(w, signature.len() + 1)?;
        w.write_bytes(signature)?;
        write_u8(w, hash_type)
    }
}

/// Read a signature pushed with its trailing hash type byte
fn read_signature<'a>(r: &mut BufferReader<'a>, n: usize) -> Result<(&'a [u8], u8), Error> {
    let n = n.checked_sub(1).ok_or(Error::InvalidScript)?;
    let signature = r.read(n)?;
    let hash_type = r.get()?;
    Ok((signature, hash_type))
}

/// Parse a P2PKH script_sig, returning the public key, signature and hash type
pub fn parse_input_script_p2pkh(script_sig: &[u8]) -> Result<(&[u8], &[u8], u8), Error> {
    let mut r = BufferReader::new(script_sig);

    let n = read_op_push(&mut r)?;
    let (signature, hash_type) = read_signature(&mut r, n)?;

    let n = read_op_push(&mut r)?;
    let pubkey = r.read(n)?;
    r.finish()?;

    Ok((pubkey, signature, hash_type))
}

/// Parse a P2SH multisig script_sig, returning the redeem script and the
/// signatures with their hash types
pub fn parse_input_script_multisig(script_sig: &[u8]) -> Result<(&[u8], Vec<(&[u8], u8)>), Error> {
    let mut r = BufferReader::new(script_sig);

    if r.get()? != OP_0 {
        return Err(Error::InvalidScript);
    }

    let mut signatures = Vec::new();
    let mut n = read_op_push(&mut r)?;
    while r.remaining() > n {
        signatures.push(read_signature(&mut r, n)?);
        n = read_op_push(&mut r)?;
    }

    let script = r.read(n)?;
    r.finish()?;

    Ok((script, signatures))
}

/// Parse a P2WPKH witness stack, returning the public key, signature and
/// hash type
pub fn parse_witness_p2wpkh(witness: &[u8]) -> Result<(&[u8], &[u8], u8), Error> {
    let mut r = BufferReader::new(witness);

    if read_compact_size(&mut r)? != 2 {
        return Err(Error::InvalidScript);
    }

    let n = read_compact_size(&mut r)?;
    let (signature, hash_type) = read_signature(&mut r, n)?;

    let pubkey = read_bytes_prefixed(&mut r)?;
    r.finish()?;

    Ok((pubkey, signature, hash_type))
}

/// Parse a P2WSH multisig witness stack, returning the redeem script and the
/// signatures with their hash types
pub fn parse_witness_multisig(witness: &[u8]) -> Result<(&[u8], Vec<(&[u8], u8)>), Error> {
    let mut r = BufferReader::new(witness);

    let items = read_compact_size(&mut r)?;
    if items < 2 || r.get()? != 0 {
        return Err(Error::InvalidScript);
    }

    let mut signatures = Vec::new();
    for _ in 0..items - 2 {
        let n = read_compact_size(&mut r)?;
        signatures.push(read_signature(&mut r, n)?);
    }

    let script = read_bytes_prefixed(&mut r)?;
    r.finish()?;

    Ok((script, signatures))
}

/// Parse a taproot key-path witness stack, returning the signature and hash
/// type
pub fn parse_witness_p2tr(witness: &[u8]) -> Result<(&[u8], u8), Error> {
    let mut r = BufferReader::new(witness);

    if read_compact_size(&mut r)? != 1 {
        return Err(Error::InvalidScript);
    }

    let item = read_bytes_prefixed(&mut r)?;
    r.finish()?;

    match item.len() {
        64 => Ok((item, SIGHASH_ALL_TAPROOT)),
        // An explicit default hash type is not valid
        65 if item[64] != SIGHASH_ALL_TAPROOT => Ok((&item[..64], item[64])),
        _ => Err(Error::InvalidScript),
    }
}

#[cfg(test)]
mod test {
    use alloc::vec;

    use super::*;

    #[test]
    fn output_templates() {
        let h = [0x11u8; 20];

        let s = output_script_p2pkh(&h);
        assert_eq!(s.len(), 25);
        assert_eq!(&s[..3], &[0x76, 0xa9, 0x14]);
        assert_eq!(&s[23..], &[0x88, 0xac]);

        let s = output_script_p2sh(&h);
        assert_eq!(s.len(), 23);
        assert_eq!(s[22], 0x87);

        let s = output_script_native_segwit(0, &h);
        assert_eq!(&s[..2], &[0x00, 0x14]);

        let s = output_script_native_segwit(1, &[0x22; 32]);
        assert_eq!(&s[..2], &[0x51, 0x20]);

        let s = output_script_op_return(b"hello").unwrap();
        assert_eq!(s, vec![0x6a, 0x05, b'h', b'e', b'l', b'l', b'o']);
    }

    #[test]
    fn p2pkh_script_sig() {
        let sig = [0x30u8; 70];
        let pk = [0x02u8; 33];

        let s = input_script_p2pkh(&pk, &sig, 0x01).unwrap();
        assert_eq!(s.len(), 1 + 71 + 1 + 33);
        assert_eq!(s[0], 71);
        assert_eq!(s[71], 0x01);
        assert_eq!(s[72], 33);
    }

    #[test]
    fn p2tr_witness() {
        let sig = [0x5au8; 64];

        let mut w = Vec::new();
        witness_p2tr(&mut w, &sig, SIGHASH_ALL_TAPROOT).unwrap();
        assert_eq!(w.len(), 66);
        assert_eq!(&w[..2], &[0x01, 0x40]);

        let mut w = Vec::new();
        witness_p2tr(&mut w, &sig, 0x01).unwrap();
        assert_eq!(w.len(), 67);
        assert_eq!(w[66], 0x01);
    }

    #[test]
    fn multisig_witness_keeps_cosigner_signatures() {
        let mut k1 = [0x03u8; 33];
        k1[1] = 1;
        let mut k2 = [0x03u8; 33];
        k2[1] = 2;

        let ms = MultisigRedeemScript {
            pubkeys: vec![k1, k2],
            signatures: vec![vec![0x30; 70], vec![]],
            m: 2,
            ..Default::default()
        };

        let mut w = Vec::new();
        witness_multisig(&mut w, &ms, &[0x31; 71], 1, 0x01).unwrap();

        // 4 items: empty, two signatures, redeem script
        assert_eq!(w[0], 4);
        assert_eq!(w[1], 0);
        assert_eq!(w[2], 71);
        assert_eq!(w[2 + 71 + 1], 72);
    }

    #[test]
    fn parse_signed_scripts() {
        let sig = [0x30u8; 70];
        let pk = [0x02u8; 33];

        let s = input_script_p2pkh(&pk, &sig, 0x01).unwrap();
        assert_eq!(parse_input_script_p2pkh(&s), Ok((&pk[..], &sig[..], 0x01)));

        let mut w = Vec::new();
        witness_p2wpkh(&mut w, &pk, &sig, 0x41).unwrap();
        assert_eq!(parse_witness_p2wpkh(&w), Ok((&pk[..], &sig[..], 0x41)));

        // Trailing data is rejected
        w.push(0);
        assert_eq!(parse_witness_p2wpkh(&w), Err(Error::InvalidScript));

        let tr = [0x5au8; 64];
        let mut w = Vec::new();
        witness_p2tr(&mut w, &tr, SIGHASH_ALL_TAPROOT).unwrap();
        assert_eq!(parse_witness_p2tr(&w), Ok((&tr[..], SIGHASH_ALL_TAPROOT)));

        let mut w = Vec::new();
        witness_p2tr(&mut w, &tr, 0x01).unwrap();
        assert_eq!(parse_witness_p2tr(&w), Ok((&tr[..], 0x01)));
    }

    #[test]
    fn parse_signed_multisig() {
        let mut k1 = [0x03u8; 33];
        k1[1] = 1;
        let mut k2 = [0x03u8; 33];
        k2[1] = 2;

        let ms = MultisigRedeemScript {
            pubkeys: vec![k1, k2],
            m: 1,
            ..Default::default()
        };
        let redeem = multisig::redeem_script(&ms).unwrap();
        let sig = [0x30u8; 71];

        let s = input_script_multisig(&ms, &sig, 1, 0x01).unwrap();
        let (script, sigs) = parse_input_script_multisig(&s).unwrap();
        assert_eq!(script, &redeem[..]);
        assert_eq!(sigs, vec![(&sig[..], 0x01)]);

        let mut w = Vec::new();
        witness_multisig(&mut w, &ms, &sig, 0, 0x01).unwrap();
        let (script, sigs) = parse_witness_multisig(&w).unwrap();
        assert_eq!(script, &redeem[..]);
        assert_eq!(sigs, vec![(&sig[..], 0x01)]);
    }
}
