//! Bit-packed vectors used by compressed meshes
//!
//! Items are `bit_size` bits wide, stored back to back and read least
//! significant bit first. Float items are quantized over `start..start + range`.

use crate::binary::ByteCursor;
use crate::error::{Error, Result};

/// Quantized floats (`PackedBitVector` with range and start).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PackedFloatVector<'a> {
    pub num_items: u32,
    pub range: f32,
    pub start: f32,
    pub data: &'a [u8],
    pub bit_size: u8,
}

/// Packed unsigned integers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PackedIntVector<'a> {
    pub num_items: u32,
    pub data: &'a [u8],
    pub bit_size: u8,
}

impl<'a> PackedFloatVector<'a> {
    pub(crate) fn read(cursor: &mut ByteCursor<'a>) -> Result<Self> {
        let num_items = cursor.read_u32()?;
        let range = cursor.read_f32()?;
        let start = cursor.read_f32()?;
        let data = cursor.read_aligned_byte_array()?;
        let bit_size = cursor.read_u8()?;
        cursor.align(4);
        Ok(Self {
            num_items,
            range,
            start,
            data,
            bit_size,
        })
    }

    /// Every item.
    pub fn unpack(&self) -> Result<Vec<f32>> {
        unpack_floats(self, 1, 4, 0, self.num_items as usize)
    }
}

impl<'a> PackedIntVector<'a> {
    pub(crate) fn read(cursor: &mut ByteCursor<'a>) -> Result<Self> {
        let num_items = cursor.read_u32()?;
        let data = cursor.read_aligned_byte_array()?;
        let bit_size = cursor.read_u8()?;
        cursor.align(4);
        Ok(Self {
            num_items,
            data,
            bit_size,
        })
    }

    pub fn unpack(&self) -> Result<Vec<u32>> {
        unpack_ints(self)
    }
}

/// Reads `width`-bit items LSB-first from a byte slice.
struct BitReader<'a> {
    data: &'a [u8],
    bit: usize,
}

impl BitReader<'_> {
    fn next(&mut self, width: u8) -> Result<u32> {
        let mut value = 0u32;
        for i in 0..u32::from(width) {
            let byte = self.data.get(self.bit / 8).ok_or(Error::TruncatedInput {
                offset: (self.bit / 8) as u64,
                needed: 1,
                available: 0,
            })?;
            value |= u32::from((byte >> (self.bit % 8)) & 1) << i;
            self.bit += 1;
        }
        Ok(value)
    }
}

/// Zero-width vectors carry no data to bound their length.
const MAX_ZERO_WIDTH_ITEMS: usize = 1 << 24;

fn check_width(bit_size: u8) -> Result<()> {
    if bit_size > 32 {
        return Err(Error::StructuralInconsistency {
            message: format!("packed vector bit size {bit_size} exceeds 32"),
        });
    }
    Ok(())
}

/// Check that items `..end` exist and are backed by `data` before anything
/// is allocated for them.
fn check_extent(num_items: u32, bit_size: u8, data: &[u8], end: usize) -> Result<()> {
    if end > num_items as usize {
        return Err(Error::StructuralInconsistency {
            message: format!("packed vector read of {end} items exceeds its {num_items} items"),
        });
    }
    if bit_size == 0 {
        if end > MAX_ZERO_WIDTH_ITEMS {
            return Err(Error::StructuralInconsistency {
                message: format!("zero-width packed vector of {end} items"),
            });
        }
        return Ok(());
    }
    let needed = (end as u64 * u64::from(bit_size)).div_ceil(8);
    if needed > data.len() as u64 {
        return Err(Error::TruncatedInput {
            offset: 0,
            needed,
            available: data.len() as u64,
        });
    }
    Ok(())
}

/// Unpack `num_chunks * item_count_in_chunk` floats starting at item `start`.
///
/// `chunk_stride` is the byte stride of one output chunk and only has to be a
/// multiple of four; the output is always densely packed.
pub fn unpack_floats(
    vector: &PackedFloatVector<'_>,
    item_count_in_chunk: usize,
    chunk_stride: usize,
    start: usize,
    num_chunks: usize,
) -> Result<Vec<f32>> {
    check_width(vector.bit_size)?;
    if item_count_in_chunk
        .checked_mul(4)
        .is_none_or(|chunk_bytes| chunk_stride < chunk_bytes)
    {
        return Err(Error::StructuralInconsistency {
            message: format!(
                "chunk stride {chunk_stride} cannot hold {item_count_in_chunk} floats"
            ),
        });
    }

    let end = item_count_in_chunk
        .checked_mul(num_chunks)
        .and_then(|count| count.checked_add(start));
    let Some(end) = end else {
        return Err(Error::StructuralInconsistency {
            message: format!("packed vector read of {num_chunks} chunks overflows"),
        });
    };
    check_extent(vector.num_items, vector.bit_size, vector.data, end)?;

    let count = end - start;
    if vector.bit_size == 0 {
        return Ok(vec![vector.start; count]);
    }

    let max = ((1u64 << vector.bit_size) - 1) as f64;
    let range = f64::from(vector.range);
    let mut reader = BitReader {
        data: vector.data,
        bit: start * usize::from(vector.bit_size),
    };
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        let x = reader.next(vector.bit_size)?;
        out.push((f64::from(x) * range / max + f64::from(vector.start)) as f32);
    }
    Ok(out)
}

/// Unpack every item of an integer vector.
pub fn unpack_ints(vector: &PackedIntVector<'_>) -> Result<Vec<u32>> {
    check_width(vector.bit_size)?;
    check_extent(vector.num_items, vector.bit_size, vector.data, vector.num_items as usize)?;
    let mut reader = BitReader {
        data: vector.data,
        bit: 0,
    };
    (0..vector.num_items)
        .map(|_| reader.next(vector.bit_size))
        .collect()
}
