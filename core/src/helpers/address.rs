// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Address decoding to locking scripts

use alloc::vec::Vec;

use bech32::{FromBase32, Variant};

use crate::{coin::CoinInfo, Error};

use super::{scripts, sha256d};

/// Encoded length of a (possibly multi-byte) base58 version prefix
fn address_type_len(address_type: u32) -> usize {
    match address_type {
        0..=0xff => 1,
        0x100..=0xffff => 2,
        0x1_0000..=0xff_ffff => 3,
        _ => 4,
    }
}

/// Check whether `raw` starts with the provided version prefix
fn check_address_type(address_type: u32, raw: &[u8]) -> bool {
    let n = address_type_len(address_type);
    if raw.len() < n {
        return false;
    }

    let prefix = address_type.to_be_bytes();
    raw[..n] == prefix[4 - n..]
}

/// Decode a base58check string, returning the payload without checksum
pub fn decode_base58check(address: &str) -> Result<Vec<u8>, Error> {
    let mut raw = bs58::decode(address)
        .into_vec()
        .map_err(|_| Error::InvalidAddress)?;

    if raw.len() < 5 {
        return Err(Error::InvalidAddress);
    }

    let (data, checksum) = raw.split_at(raw.len() - 4);
    if sha256d(data)[..4] != *checksum {
        #[cfg(feature = "log")]
        log::error!("invalid base58 checksum for {}", address);

        return Err(Error::InvalidAddress);
    }

    raw.truncate(raw.len() - 4);
    Ok(raw)
}

/// Decode a segwit address for the provided human readable part,
/// returning the witness version and program
pub fn decode_segwit(hrp: &str, address: &str) -> Result<(u8, Vec<u8>), Error> {
    let (decoded_hrp, data, variant) = bech32::decode(address).map_err(|_| Error::InvalidAddress)?;

    if decoded_hrp != hrp || data.is_empty() {
        return Err(Error::InvalidAddress);
    }

    let witver = data[0].to_u8();
    let program = Vec::<u8>::from_base32(&data[1..]).map_err(|_| Error::InvalidAddress)?;

    let valid = match (witver, variant) {
        (0, Variant::Bech32) => program.len() == 20 || program.len() == 32,
        (1, Variant::Bech32m) => program.len() == 32,
        (2..=16, Variant::Bech32m) => (2..=40).contains(&program.len()),
        _ => false,
    };

    if !valid {
        #[cfg(feature = "log")]
        log::error!("invalid segwit program (version {}, {} bytes)", witver, program.len());

        return Err(Error::InvalidAddress);
    }

    Ok((witver, program))
}

/// Derive the locking script for an address on the provided coin
pub fn output_script(address: &str, coin: &CoinInfo) -> Result<Vec<u8>, Error> {
    // Segwit addresses are matched by human readable part
    if let Some(hrp) = coin.bech32_prefix {
        let lower = address.to_ascii_lowercase();
        if lower.starts_with(hrp) && lower.as_bytes().get(hrp.len()) == Some(&b'1') {
            let (witver, program) = decode_segwit(hrp, address)?;
            return Ok(scripts::output_script_native_segwit(witver, &program));
        }
    }

    let raw = decode_base58check(address)?;

    if check_address_type(coin.address_type, &raw) {
        let n = address_type_len(coin.address_type);
        let h: [u8; 20] = raw[n..].try_into().map_err(|_| Error::InvalidAddress)?;
        return Ok(scripts::output_script_p2pkh(&h));
    }

    if check_address_type(coin.address_type_p2sh, &raw) {
        let n = address_type_len(coin.address_type_p2sh);
        let h: [u8; 20] = raw[n..].try_into().map_err(|_| Error::InvalidAddress)?;
        return Ok(scripts::output_script_p2sh(&h));
    }

    #[cfg(feature = "log")]
    log::error!("unrecognised address version for {}", coin.name);

    Err(Error::InvalidAddress)
}
