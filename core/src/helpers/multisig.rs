// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Multisig descriptor helpers

use alloc::vec::Vec;

use crate::{
    msg::{MultisigRedeemScript, PubkeysOrder},
    Error,
};

use super::{
    readers::{read_op_push, BufferReader},
    writers::{write_op_push, write_u32, write_u8, TxWriter},
    HashWriter,
};

/// Maximum number of cosigners in a bare multisig script
pub const MAX_PUBKEYS: usize = 15;

/// OP_CHECKMULTISIG
const OP_CHECKMULTISIG: u8 = 0xae;

/// Check threshold and key count bounds
pub fn validate(multisig: &MultisigRedeemScript) -> Result<(), Error> {
    let n = multisig.pubkeys.len();
    let m = multisig.m as usize;

    if n < 1 || n > MAX_PUBKEYS || m < 1 || m > n {
        #[cfg(feature = "log")]
        log::error!("invalid multisig parameters (m: {}, n: {})", m, n);

        return Err(Error::InvalidMultisig);
    }

    if !multisig.signatures.is_empty() && multisig.signatures.len() != n {
        return Err(Error::InvalidMultisig);
    }

    Ok(())
}

/// Compute the multisig fingerprint, a digest over the threshold and the
/// sorted cosigner keys, independent of key order
pub fn fingerprint(multisig: &MultisigRedeemScript) -> Result<[u8; 32], Error> {
    validate(multisig)?;

    let mut keys: Vec<&[u8; 33]> = multisig.pubkeys.iter().collect();
    keys.sort();

    let mut h = HashWriter::<sha2::Sha256>::new();
    write_u32(&mut h, multisig.m)?;
    write_u32(&mut h, keys.len() as u32)?;
    for k in keys {
        h.update(k);
    }

    Ok(h.digest())
}

/// Fetch cosigner keys in script order
pub fn pubkeys(multisig: &MultisigRedeemScript) -> Vec<[u8; 33]> {
    let mut keys = multisig.pubkeys.clone();
    if multisig.pubkeys_order == PubkeysOrder::Lexicographic {
        keys.sort();
    }
    keys
}

/// Locate our key in the cosigner set, returning its script position
pub fn pubkey_index(multisig: &MultisigRedeemScript, pubkey: &[u8; 33]) -> Result<usize, Error> {
    match pubkeys(multisig).iter().position(|k| k == pubkey) {
        Some(i) => Ok(i),
        None => {
            #[cfg(feature = "log")]
            log::error!("pubkey not found in multisig script");

            Err(Error::InvalidMultisig)
        }
    }
}

/// Build the `m <keys> n OP_CHECKMULTISIG` redeem script
pub fn redeem_script(multisig: &MultisigRedeemScript) -> Result<Vec<u8>, Error> {
    validate(multisig)?;

    let keys = pubkeys(multisig);

    let mut s = Vec::with_capacity(3 + keys.len() * 34);
    write_u8(&mut s, 0x50 + multisig.m as u8)?;
    for k in &keys {
        write_op_push(&mut s, k.len())?;
        s.write_bytes(k)?;
    }
    write_u8(&mut s, 0x50 + keys.len() as u8)?;
    write_u8(&mut s, OP_CHECKMULTISIG)?;

    Ok(s)
}

/// Parse an `m <keys> n OP_CHECKMULTISIG` redeem script, returning the keys
/// in script order and the threshold
pub fn parse_redeem_script(script: &[u8]) -> Result<(Vec<&[u8]>, usize), Error> {
    let mut r = BufferReader::new(script);

    let m = r.get()?.wrapping_sub(0x50) as usize;
    let n = match script.len().checked_sub(2).and_then(|i| script.get(i)) {
        Some(b) => b.wrapping_sub(0x50) as usize,
        None => return Err(Error::InvalidScript),
    };

    if n < 1 || n > MAX_PUBKEYS || m < 1 || m > n {
        return Err(Error::InvalidMultisig);
    }

    let mut keys = Vec::with_capacity(n);
    for _ in 0..n {
        if read_op_push(&mut r)? != 33 {
            return Err(Error::InvalidScript);
        }
        keys.push(r.read(33)?);
    }

    // Key count, checked above
    r.get()?;
    if r.get()? != OP_CHECKMULTISIG {
        return Err(Error::InvalidScript);
    }
    r.finish()?;

    Ok((keys, m))
}

#[cfg(test)]
mod test {
    use alloc::vec;

    use super::*;

    fn key(b: u8) -> [u8; 33] {
        let mut k = [b; 33];
        k[0] = 0x02;
        k
    }

    #[test]
    fn fingerprint_ignores_order() {
        let a = MultisigRedeemScript {
            pubkeys: vec![key(1), key(2), key(3)],
            m: 2,
            ..Default::default()
        };
        let b = MultisigRedeemScript {
            pubkeys: vec![key(3), key(1), key(2)],
            ..a.clone()
        };
        let c = MultisigRedeemScript { m: 3, ..a.clone() };

        assert_eq!(fingerprint(&a), fingerprint(&b));
        assert_ne!(fingerprint(&a), fingerprint(&c));
    }

    #[test]
    fn bounds() {
        let tests = &[(0, 1, false), (1, 1, true), (2, 1, false), (2, 3, true), (1, 16, false)];

        for (m, n, ok) in tests {
            let ms = MultisigRedeemScript {
                pubkeys: (0..*n).map(|i| key(i as u8)).collect(),
                m: *m,
                ..Default::default()
            };
            assert_eq!(validate(&ms).is_ok(), *ok, "m: {m} n: {n}");
        }
    }

    #[test]
    fn redeem_script_layout() {
        let ms = MultisigRedeemScript {
            pubkeys: vec![key(9), key(4)],
            m: 1,
            pubkeys_order: PubkeysOrder::Lexicographic,
            ..Default::default()
        };

        let s = redeem_script(&ms).unwrap();
        assert_eq!(s.len(), 3 + 2 * 34);
        assert_eq!(s[0], 0x51);
        assert_eq!(&s[2..35], &key(4));
        assert_eq!(s[s.len() - 2], 0x52);
        assert_eq!(s[s.len() - 1], 0xae);

        assert_eq!(pubkey_index(&ms, &key(9)), Ok(1));
        assert_eq!(pubkey_index(&ms, &key(7)), Err(Error::InvalidMultisig));
    }

    #[test]
    fn parse_redeem_scripts() {
        let ms = MultisigRedeemScript {
            pubkeys: vec![key(1), key(2), key(3)],
            m: 2,
            ..Default::default()
        };
        let s = redeem_script(&ms).unwrap();

        let (keys, m) = parse_redeem_script(&s).unwrap();
        assert_eq!(m, 2);
        assert_eq!(keys, vec![&key(1)[..], &key(2)[..], &key(3)[..]]);

        // Threshold above the key count
        let mut bad = s.clone();
        bad[0] = 0x54;
        assert_eq!(parse_redeem_script(&bad), Err(Error::InvalidMultisig));

        // Not a multisig script
        let mut bad = s;
        let last = bad.len() - 1;
        bad[last] = 0xac;
        assert_eq!(parse_redeem_script(&bad), Err(Error::InvalidScript));
    }
}
