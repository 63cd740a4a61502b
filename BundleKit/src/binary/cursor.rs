//! Bounds-checked cursor over a borrowed byte slice
//!
//! Every layer of a bundle is read through a [`ByteCursor`]. Reads never panic:
//! a read past the end returns [`Error::TruncatedInput`] carrying the offset,
//! the requested length and what was left. The byte order is a runtime
//! property because serialized files switch order after their header.

#![allow(clippy::cast_possible_truncation)]

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use serde::Serialize;

use crate::error::{Error, Result};

/// Byte order of multi-byte values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Endianness {
    Little,
    Big,
}

impl Endianness {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Endianness::Little => "little",
            Endianness::Big => "big",
        }
    }
}

macro_rules! read_number {
    ($(#[$doc:meta])* $name:ident, $ty:ty, $size:expr, $read:ident) => {
        $(#[$doc])*
        pub fn $name(&mut self) -> Result<$ty> {
            let bytes = self.read_bytes($size)?;
            Ok(match self.endian {
                Endianness::Little => LittleEndian::$read(bytes),
                Endianness::Big => BigEndian::$read(bytes),
            })
        }
    };
}

/// Seekable reader over `&[u8]` with a switchable byte order.
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    pos: usize,
    endian: Endianness,
}

impl<'a> ByteCursor<'a> {
    #[must_use]
    pub fn new(data: &'a [u8], endian: Endianness) -> Self {
        Self { data, pos: 0, endian }
    }

    #[must_use]
    pub fn big_endian(data: &'a [u8]) -> Self {
        Self::new(data, Endianness::Big)
    }

    #[must_use]
    pub fn little_endian(data: &'a [u8]) -> Self {
        Self::new(data, Endianness::Little)
    }

    #[must_use]
    pub fn endianness(&self) -> Endianness {
        self.endian
    }

    pub fn set_endianness(&mut self, endian: Endianness) {
        self.endian = endian;
    }

    /// The same cursor, position kept, reading in `endian` order.
    #[must_use]
    pub fn with_byte_order(mut self, endian: Endianness) -> Self {
        self.endian = endian;
        self
    }

    #[must_use]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Move to an absolute position. Positions past the end are allowed; the
    /// next read fails.
    pub fn set_position(&mut self, pos: usize) {
        self.pos = pos;
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    #[must_use]
    pub fn is_at_end(&self) -> bool {
        self.remaining() == 0
    }

    /// The whole underlying slice.
    #[must_use]
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Advance to the next multiple of `alignment`. Pure position arithmetic.
    pub fn align(&mut self, alignment: usize) {
        let rem = self.pos % alignment;
        if rem != 0 {
            self.pos += alignment - rem;
        }
    }

    fn truncated(&self, needed: usize) -> Error {
        Error::TruncatedInput {
            offset: self.pos as u64,
            needed: needed as u64,
            available: self.remaining() as u64,
        }
    }

    /// Borrow the next `len` bytes.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        if len > self.remaining() {
            return Err(self.truncated(len));
        }
        let bytes = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    pub fn skip(&mut self, len: usize) -> Result<()> {
        self.read_bytes(len).map(|_| ())
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_u8()? as i8)
    }

    /// A one-byte boolean; any non-zero value is `true`.
    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    read_number!(read_u16, u16, 2, read_u16);
    read_number!(read_i16, i16, 2, read_i16);
    read_number!(read_u32, u32, 4, read_u32);
    read_number!(read_i32, i32, 4, read_i32);
    read_number!(read_u64, u64, 8, read_u64);
    read_number!(read_i64, i64, 8, read_i64);
    read_number!(read_f32, f32, 4, read_f32);
    read_number!(read_f64, f64, 8, read_f64);

    /// Read a NUL-terminated string. The terminator is consumed.
    pub fn read_cstring(&mut self) -> Result<String> {
        let rest = &self.data[self.pos.min(self.data.len())..];
        let Some(end) = rest.iter().position(|&b| b == 0) else {
            return Err(self.truncated(rest.len() + 1));
        };
        let text = String::from_utf8_lossy(&rest[..end]).into_owned();
        self.pos += end + 1;
        Ok(text)
    }

    /// Read an `i32` element count, rejecting negative values and counts that
    /// cannot fit in the remaining bytes at `min_element_size` bytes each.
    pub fn read_count(&mut self, min_element_size: usize) -> Result<usize> {
        let start = self.pos;
        let count = self.read_i32()?;
        let Ok(count) = usize::try_from(count) else {
            return Err(Error::StructuralInconsistency {
                message: format!("negative element count {count} at offset {start}"),
            });
        };
        let needed = count.saturating_mul(min_element_size);
        if needed > self.remaining() {
            return Err(self.truncated(needed));
        }
        Ok(count)
    }

    /// Length-prefixed byte array (`i32` length, no alignment).
    pub fn read_byte_array(&mut self) -> Result<&'a [u8]> {
        let len = self.read_count(1)?;
        self.read_bytes(len)
    }

    /// Length-prefixed byte array followed by 4-byte alignment.
    pub fn read_aligned_byte_array(&mut self) -> Result<&'a [u8]> {
        let bytes = self.read_byte_array()?;
        self.align(4);
        Ok(bytes)
    }

    /// Length-prefixed UTF-8 string followed by 4-byte alignment.
    pub fn read_aligned_string(&mut self) -> Result<String> {
        let bytes = self.read_aligned_byte_array()?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    /// `count` values read with `read`, where `count` is an `i32` prefix.
    pub fn read_vec<T>(
        &mut self,
        min_element_size: usize,
        mut read: impl FnMut(&mut Self) -> Result<T>,
    ) -> Result<Vec<T>> {
        let count = self.read_count(min_element_size)?;
        let mut items = Vec::with_capacity(count);
        for _ in 0..count {
            items.push(read(self)?);
        }
        Ok(items)
    }

    pub fn read_f32_array<const N: usize>(&mut self) -> Result<[f32; N]> {
        let mut out = [0.0f32; N];
        for value in &mut out {
            *value = self.read_f32()?;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_both_byte_orders() {
        let data = [0x00, 0x00, 0x00, 0x16, 0x16, 0x00, 0x00, 0x00];
        let mut big = ByteCursor::big_endian(&data);
        assert_eq!(big.read_u32().unwrap(), 22);
        assert_eq!(big.read_u32().unwrap(), 369098752);

        let mut little = ByteCursor::little_endian(&data);
        assert_eq!(little.read_u32().unwrap(), 369098752);
        assert_eq!(little.read_u32().unwrap(), 22);
    }

    #[test]
    fn test_with_byte_order_keeps_position() {
        let data = [0xFF, 0x01, 0x00];
        let mut cursor = ByteCursor::big_endian(&data);
        cursor.read_u8().unwrap();
        let mut cursor = cursor.with_byte_order(Endianness::Little);
        assert_eq!(cursor.position(), 1);
        assert_eq!(cursor.read_u16().unwrap(), 1);
    }

    #[test]
    fn test_truncated_read_reports_offset() {
        let data = [1, 2, 3];
        let mut cursor = ByteCursor::little_endian(&data);
        cursor.read_u8().unwrap();
        match cursor.read_u32() {
            Err(Error::TruncatedInput { offset, needed, available }) => {
                assert_eq!((offset, needed, available), (1, 4, 2));
            }
            other => panic!("expected TruncatedInput, got {other:?}"),
        }
        // A failed read does not move the cursor.
        assert_eq!(cursor.position(), 1);
    }

    #[test]
    fn test_aligned_string_advances_to_boundary() {
        // len=5 "hello" + 3 pad bytes, then a marker u32
        let mut data = vec![5, 0, 0, 0];
        data.extend_from_slice(b"hello");
        data.extend_from_slice(&[0, 0, 0]);
        data.extend_from_slice(&7u32.to_le_bytes());

        let mut cursor = ByteCursor::little_endian(&data);
        assert_eq!(cursor.read_aligned_string().unwrap(), "hello");
        assert_eq!(cursor.position(), 12);
        assert_eq!(cursor.read_u32().unwrap(), 7);
    }

    #[test]
    fn test_align_is_noop_on_boundary() {
        let data = [0u8; 16];
        let mut cursor = ByteCursor::little_endian(&data);
        cursor.align(4);
        assert_eq!(cursor.position(), 0);
        cursor.set_position(5);
        cursor.align(16);
        assert_eq!(cursor.position(), 16);
        assert!(cursor.is_at_end());
    }

    #[test]
    fn test_cstring() {
        let data = b"UnityFS\0rest";
        let mut cursor = ByteCursor::big_endian(data);
        assert_eq!(cursor.read_cstring().unwrap(), "UnityFS");
        assert_eq!(cursor.position(), 8);
        assert!(cursor.read_cstring().is_err());
    }

    #[test]
    fn test_negative_count_rejected() {
        let data = (-1i32).to_le_bytes();
        let mut cursor = ByteCursor::little_endian(&data);
        assert!(matches!(
            cursor.read_count(1),
            Err(Error::StructuralInconsistency { .. })
        ));
    }

    #[test]
    fn test_oversized_count_rejected_before_allocation() {
        let data = 1_000_000i32.to_le_bytes();
        let mut cursor = ByteCursor::little_endian(&data);
        assert!(matches!(
            cursor.read_vec(4, ByteCursor::read_u32),
            Err(Error::TruncatedInput { .. })
        ));
    }
}
