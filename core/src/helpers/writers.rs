// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Bitcoin wire serialization primitives

use byteorder::{ByteOrder, LittleEndian};
use heapless::Vec;

use crate::{msg::TxInput, Error};

use super::multisig;

/// Sink for serialized transaction data
pub trait TxWriter {
    /// Write raw bytes
    fn write_bytes(&mut self, b: &[u8]) -> Result<(), Error>;
}

impl<const N: usize> TxWriter for Vec<u8, N> {
    fn write_bytes(&mut self, b: &[u8]) -> Result<(), Error> {
        self.extend_from_slice(b).map_err(|_| Error::ChunkOverflow)
    }
}

impl TxWriter for alloc::vec::Vec<u8> {
    fn write_bytes(&mut self, b: &[u8]) -> Result<(), Error> {
        self.extend_from_slice(b);
        Ok(())
    }
}

pub fn write_u8<W: TxWriter + ?Sized>(w: &mut W, v: u8) -> Result<(), Error> {
    w.write_bytes(&[v])
}

pub fn write_u16<W: TxWriter + ?Sized>(w: &mut W, v: u16) -> Result<(), Error> {
    let mut b = [0u8; 2];
    LittleEndian::write_u16(&mut b, v);
    w.write_bytes(&b)
}

pub fn write_u32<W: TxWriter + ?Sized>(w: &mut W, v: u32) -> Result<(), Error> {
    let mut b = [0u8; 4];
    LittleEndian::write_u32(&mut b, v);
    w.write_bytes(&b)
}

pub fn write_u64<W: TxWriter + ?Sized>(w: &mut W, v: u64) -> Result<(), Error> {
    let mut b = [0u8; 8];
    LittleEndian::write_u64(&mut b, v);
    w.write_bytes(&b)
}

/// Write a CompactSize length
pub fn write_compact_size<W: TxWriter + ?Sized>(w: &mut W, n: usize) -> Result<(), Error> {
    match n {
        0..=0xfc => write_u8(w, n as u8),
        0xfd..=0xffff => {
            write_u8(w, 0xfd)?;
            write_u16(w, n as u16)
        }
        0x1_0000..=0xffff_ffff => {
            write_u8(w, 0xfe)?;
            write_u32(w, n as u32)
        }
        _ => {
            write_u8(w, 0xff)?;
            write_u64(w, n as u64)
        }
    }
}

/// Encoded length of a CompactSize value
pub const fn compact_size_len(n: usize) -> usize {
    if n < 0xfd {
        1
    } else if n <= 0xffff {
        3
    } else if n <= 0xffff_ffff {
        5
    } else {
        9
    }
}

/// Write a script push opcode for `n` bytes of data
pub fn write_op_push<W: TxWriter + ?Sized>(w: &mut W, n: usize) -> Result<(), Error> {
    match n {
        0..=0x4b => write_u8(w, n as u8),
        0x4c..=0xff => {
            write_u8(w, 0x4c)?;
            write_u8(w, n as u8)
        }
        0x100..=0xffff => {
            write_u8(w, 0x4d)?;
            write_u16(w, n as u16)
        }
        _ => {
            write_u8(w, 0x4e)?;
            write_u32(w, n as u32)
        }
    }
}

/// Encoded length of a script push opcode for `n` bytes of data
pub const fn op_push_len(n: usize) -> usize {
    if n < 0x4c {
        1
    } else if n < 0x100 {
        2
    } else if n < 0x10000 {
        3
    } else {
        5
    }
}

/// Write CompactSize length prefixed bytes
pub fn write_bytes_prefixed<W: TxWriter + ?Sized>(w: &mut W, b: &[u8]) -> Result<(), Error> {
    write_compact_size(w, b.len())?;
    w.write_bytes(b)
}

/// Write a hash in reversed (wire) byte order
pub fn write_bytes_reversed<W: TxWriter + ?Sized>(w: &mut W, b: &[u8; 32]) -> Result<(), Error> {
    let mut r = *b;
    r.reverse();
    w.write_bytes(&r)
}

/// Write a serialized transaction input
pub fn write_tx_input<W: TxWriter + ?Sized>(
    w: &mut W,
    prev_hash: &[u8; 32],
    prev_index: u32,
    script: &[u8],
    sequence: u32,
) -> Result<(), Error> {
    write_bytes_reversed(w, prev_hash)?;
    write_u32(w, prev_index)?;
    write_bytes_prefixed(w, script)?;
    write_u32(w, sequence)
}

/// Write a serialized transaction output
pub fn write_tx_output<W: TxWriter + ?Sized>(
    w: &mut W,
    amount: u64,
    script_pubkey: &[u8],
) -> Result<(), Error> {
    write_u64(w, amount)?;
    write_bytes_prefixed(w, script_pubkey)
}

/// Write every signing-relevant field of an input, for the consistency
/// digests compared between passes
pub fn write_tx_input_check<W: TxWriter + ?Sized>(w: &mut W, txi: &TxInput) -> Result<(), Error> {
    write_bytes_reversed(w, &txi.prev_hash)?;
    write_u32(w, txi.prev_index)?;
    write_u8(w, txi.script_type.into())?;

    write_compact_size(w, txi.address_n.len())?;
    for n in &txi.address_n {
        write_u32(w, *n)?;
    }

    match &txi.multisig {
        Some(m) => w.write_bytes(&multisig::fingerprint(m)?)?,
        None => write_u8(w, 0)?,
    }

    write_u32(w, txi.sequence)?;
    write_u64(w, txi.amount)?;
    write_bytes_prefixed(w, txi.script_pubkey.as_deref().unwrap_or(&[]))?;
    write_bytes_prefixed(w, txi.script_sig.as_deref().unwrap_or(&[]))?;
    write_bytes_prefixed(w, txi.witness.as_deref().unwrap_or(&[]))?;

    match (&txi.orig_hash, txi.orig_index) {
        (Some(h), Some(i)) => {
            w.write_bytes(h)?;
            write_u32(w, i)?;
        }
        _ => write_u8(w, 0)?,
    }

    write_u8(w, txi.coinjoin_flags)
}

#[cfg(test)]
mod test {
    use alloc::vec::Vec;

    use super::*;

    #[test]
    fn compact_size() {
        let tests: &[(usize, &[u8])] = &[
            (0, &[0x00]),
            (0xfc, &[0xfc]),
            (0xfd, &[0xfd, 0xfd, 0x00]),
            (0xffff, &[0xfd, 0xff, 0xff]),
            (0x1_0000, &[0xfe, 0x00, 0x00, 0x01, 0x00]),
        ];

        for (n, e) in tests {
            let mut b = Vec::new();
            write_compact_size(&mut b, *n).unwrap();
            assert_eq!(&b, e, "encoding mismatch for {n}");
            assert_eq!(compact_size_len(*n), e.len());
        }
    }

    #[test]
    fn op_push() {
        let tests: &[(usize, &[u8])] = &[
            (0x20, &[0x20]),
            (0x4b, &[0x4b]),
            (0x4c, &[0x4c, 0x4c]),
            (0xff, &[0x4c, 0xff]),
            (0x100, &[0x4d, 0x00, 0x01]),
        ];

        for (n, e) in tests {
            let mut b = Vec::new();
            write_op_push(&mut b, *n).unwrap();
            assert_eq!(&b, e, "encoding mismatch for {n}");
            assert_eq!(op_push_len(*n), e.len());
        }
    }

    #[test]
    fn chunk_overflow() {
        let mut b = heapless::Vec::<u8, 4>::new();
        write_u32(&mut b, 7).unwrap();
        assert_eq!(write_u8(&mut b, 1), Err(Error::ChunkOverflow));
    }

    #[test]
    fn input_check_covers_amount() {
        let a = TxInput {
            address_n: alloc::vec![0x8000_0054, 0x8000_0000, 0x8000_0000, 0, 1],
            amount: 1000,
            ..Default::default()
        };
        let b = TxInput {
            amount: 1001,
            ..a.clone()
        };

        let (mut wa, mut wb) = (Vec::new(), Vec::new());
        write_tx_input_check(&mut wa, &a).unwrap();
        write_tx_input_check(&mut wb, &b).unwrap();

        assert_ne!(wa, wb);
    }
}
