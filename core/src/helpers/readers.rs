// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Bitcoin wire parsing primitives, the inverse of [super::writers]

use byteorder::{ByteOrder, LittleEndian};

use crate::Error;

/// Cursor over a borrowed buffer, failing with [Error::InvalidScript] on
/// any read past the end
pub struct BufferReader<'a> {
    buff: &'a [u8],
    offset: usize,
}

impl<'a> BufferReader<'a> {
    /// Create a reader at the start of the provided buffer
    pub fn new(buff: &'a [u8]) -> Self {
        Self { buff, offset: 0 }
    }

    /// Number of bytes not yet read
    pub fn remaining(&self) -> usize {
        self.buff.len() - self.offset
    }

    /// Read a single byte
    pub fn get(&mut self) -> Result<u8, Error> {
        let b = *self.buff.get(self.offset).ok_or(Error::InvalidScript)?;
        self.offset += 1;
        Ok(b)
    }

    /// Read `n` bytes
    pub fn read(&mut self, n: usize) -> Result<&'a [u8], Error> {
        let end = match self.offset.checked_add(n) {
            Some(e) if e <= self.buff.len() => e,
            _ => return Err(Error::InvalidScript),
        };

        let b = &self.buff[self.offset..end];
        self.offset = end;
        Ok(b)
    }

    /// Check the whole buffer was consumed
    pub fn finish(&self) -> Result<(), Error> {
        match self.remaining() {
            0 => Ok(()),
            _ => Err(Error::InvalidScript),
        }
    }
}

/// Read a CompactSize length
pub fn read_compact_size(r: &mut BufferReader<'_>) -> Result<usize, Error> {
    let n = match r.get()? {
        n @ 0..=0xfc => n as u64,
        0xfd => LittleEndian::read_u16(r.read(2)?) as u64,
        0xfe => LittleEndian::read_u32(r.read(4)?) as u64,
        _ => LittleEndian::read_u64(r.read(8)?),
    };

    usize::try_from(n).map_err(|_| Error::InvalidScript)
}

/// Read CompactSize length prefixed bytes
pub fn read_bytes_prefixed<'a>(r: &mut BufferReader<'a>) -> Result<&'a [u8], Error> {
    let n = read_compact_size(r)?;
    r.read(n)
}

/// Read a script push opcode, returning the length of the pushed data
pub fn read_op_push(r: &mut BufferReader<'_>) -> Result<usize, Error> {
    match r.get()? {
        n @ 0..=0x4b => Ok(n as usize),
        0x4c => Ok(r.get()? as usize),
        0x4d => Ok(LittleEndian::read_u16(r.read(2)?) as usize),
        0x4e => Ok(LittleEndian::read_u32(r.read(4)?) as usize),
        _ => Err(Error::InvalidScript),
    }
}

#[cfg(test)]
mod test {
    use alloc::vec::Vec;

    use super::*;
    use crate::helpers::writers::{write_bytes_prefixed, write_compact_size, write_op_push};

    #[test]
    fn compact_size() {
        let mut b = Vec::new();
        write_compact_size(&mut b, 0xfc).unwrap();
        write_compact_size(&mut b, 0x1234).unwrap();
        write_compact_size(&mut b, 0x0012_3456).unwrap();

        let mut r = BufferReader::new(&b);
        assert_eq!(read_compact_size(&mut r), Ok(0xfc));
        assert_eq!(read_compact_size(&mut r), Ok(0x1234));
        assert_eq!(read_compact_size(&mut r), Ok(0x0012_3456));
        assert_eq!(r.finish(), Ok(()));
    }

    #[test]
    fn pushes() {
        let data = [0xabu8; 80];

        let mut b = Vec::new();
        write_op_push(&mut b, 20).unwrap();
        b.extend_from_slice(&data[..20]);
        write_op_push(&mut b, data.len()).unwrap();
        b.extend_from_slice(&data);

        let mut r = BufferReader::new(&b);
        assert_eq!(read_op_push(&mut r), Ok(20));
        assert_eq!(r.read(20), Ok(&data[..20]));
        // OP_PUSHDATA1
        assert_eq!(read_op_push(&mut r), Ok(80));
        assert_eq!(r.read(80), Ok(&data[..]));
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn truncated() {
        let mut b = Vec::new();
        write_bytes_prefixed(&mut b, &[1, 2, 3]).unwrap();
        b.pop();

        let mut r = BufferReader::new(&b);
        assert_eq!(read_bytes_prefixed(&mut r), Err(Error::InvalidScript));

        let mut r = BufferReader::new(&[0x00, 0x01]);
        assert_eq!(r.get(), Ok(0));
        assert_eq!(r.finish(), Err(Error::InvalidScript));
        assert_eq!(r.read(2), Err(Error::InvalidScript));
    }
}
