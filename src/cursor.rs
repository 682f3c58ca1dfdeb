//! Forward-only reader over a CBFS region.
//!
//! [`ByteCursor`] is the only way the scanner touches region bytes.  It keeps
//! the number of bytes consumed since the start of the region, which is what
//! every record offset and the name-length arithmetic are computed from.
//! All multi-byte integers in CBFS are big-endian.

use byteorder::{BigEndian, ByteOrder};

use crate::error::{CbfsError, Result};

/// Outcome of [`ByteCursor::align_to`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    /// Cursor sits on a boundary with at least one byte left.
    Ready,
    /// The region ends on or before the next boundary.
    EndOfDirectory,
}

#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    pos:  usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Bytes consumed since the start of the region.
    #[inline]
    pub fn position(&self) -> u64 {
        self.pos as u64
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Consume the next `n` bytes.
    ///
    /// Fails with [`CbfsError::Truncated`] without moving the cursor when
    /// fewer than `n` bytes are left.
    pub fn read(&mut self, n: usize) -> Result<&'a [u8]> {
        let available = self.remaining();
        if n > available {
            return Err(CbfsError::Truncated {
                offset: self.position(),
                wanted: n,
                available,
            });
        }
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(BigEndian::read_u32(self.read(4)?))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(BigEndian::read_u64(self.read(8)?))
    }

    /// Skip forward to the next multiple of `quantum`.
    ///
    /// Padding that would run past the end of the region, or landing exactly
    /// on the end, is reported as [`Alignment::EndOfDirectory`].
    pub fn align_to(&mut self, quantum: usize) -> Alignment {
        debug_assert!(quantum > 0);
        let misalign = self.pos % quantum;
        if misalign != 0 {
            let pad = quantum - misalign;
            if pad > self.remaining() {
                self.pos = self.data.len();
                return Alignment::EndOfDirectory;
            }
            self.pos += pad;
        }
        if self.remaining() == 0 {
            Alignment::EndOfDirectory
        } else {
            Alignment::Ready
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_tracks_position() {
        let data = [1u8, 2, 3, 4, 5, 6, 7, 8];
        let mut c = ByteCursor::new(&data);
        assert_eq!(c.read(3).unwrap(), &[1, 2, 3]);
        assert_eq!(c.position(), 3);
        assert_eq!(c.remaining(), 5);
    }

    #[test]
    fn short_read_is_truncated_and_does_not_advance() {
        let data = [0u8; 6];
        let mut c = ByteCursor::new(&data);
        c.read(4).unwrap();
        match c.read(4) {
            Err(CbfsError::Truncated { offset, wanted, available }) => {
                assert_eq!((offset, wanted, available), (4, 4, 2));
            }
            other => panic!("expected Truncated, got {other:?}"),
        }
        assert_eq!(c.position(), 4);
    }

    #[test]
    fn integers_are_big_endian() {
        let data = [0x4f, 0x52, 0x42, 0x43, 0, 0, 0, 0, 0, 0, 0x10, 0];
        let mut c = ByteCursor::new(&data);
        assert_eq!(c.read_u32().unwrap(), 0x4F52_4243);
        assert_eq!(c.read_u64().unwrap(), 0x1000);
    }

    #[test]
    fn align_is_noop_on_boundary() {
        let data = [0u8; 128];
        let mut c = ByteCursor::new(&data);
        assert_eq!(c.align_to(64), Alignment::Ready);
        assert_eq!(c.position(), 0);
    }

    #[test]
    fn align_skips_to_next_boundary() {
        let data = [0u8; 128];
        let mut c = ByteCursor::new(&data);
        c.read(8).unwrap();
        assert_eq!(c.align_to(64), Alignment::Ready);
        assert_eq!(c.position(), 64);
    }

    #[test]
    fn align_past_end_is_end_of_directory() {
        let data = [0u8; 100];
        let mut c = ByteCursor::new(&data);
        c.read(72).unwrap();
        assert_eq!(c.align_to(64), Alignment::EndOfDirectory);
    }

    #[test]
    fn align_onto_exact_end_is_end_of_directory() {
        let data = [0u8; 64];
        let mut c = ByteCursor::new(&data);
        c.read(8).unwrap();
        assert_eq!(c.align_to(64), Alignment::EndOfDirectory);

        let mut empty = ByteCursor::new(&[]);
        assert_eq!(empty.align_to(64), Alignment::EndOfDirectory);
    }
}
