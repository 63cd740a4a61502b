//! Block and blocks-info decompression
//!
//! UnityFS stores the compression selector in the low six bits of the archive
//! flags (for the blocks info) and of each storage block's flags. Every
//! algorithm decodes into a buffer whose length must match the declared
//! uncompressed size exactly.

use crate::error::{Error, Result};

pub mod lz4;
pub mod lzma;

/// Mask selecting the compression algorithm from archive or block flags.
pub const COMPRESSION_MASK: u32 = 0x3F;

/// Upper bound on LZ4 block expansion: one extension byte adds at most 255
/// bytes of match length.
const MAX_LZ4_RATIO: usize = 255;

/// Compression algorithm of the blocks info or of one storage block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    None,
    Lzma,
    Lz4,
    Lz4Hc,
}

impl CompressionMethod {
    /// Parse the compression method from archive or block flags
    ///
    /// # Errors
    /// Returns [`Error::UnsupportedCompression`] for selectors other than 0-3.
    pub fn from_flags(flags: u32) -> Result<Self> {
        match flags & COMPRESSION_MASK {
            0 => Ok(CompressionMethod::None),
            1 => Ok(CompressionMethod::Lzma),
            2 => Ok(CompressionMethod::Lz4),
            3 => Ok(CompressionMethod::Lz4Hc),
            method => Err(Error::UnsupportedCompression { method }),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            CompressionMethod::None => "none",
            CompressionMethod::Lzma => "lzma",
            CompressionMethod::Lz4 => "lz4",
            CompressionMethod::Lz4Hc => "lz4hc",
        }
    }
}

/// Decompress `data` and check the result is exactly `expected_size` bytes.
///
/// `context` names the payload in errors ("blocks info", "storage block 3").
///
/// # Errors
/// Returns a decompression error from the codec, or
/// [`Error::DecompressionSizeMismatch`] when the output length differs.
pub fn decompress(
    method: CompressionMethod,
    data: &[u8],
    expected_size: usize,
    context: &str,
) -> Result<Vec<u8>> {
    let size_mismatch = |actual: usize| Error::DecompressionSizeMismatch {
        context: context.to_string(),
        expected: expected_size as u64,
        actual: actual as u64,
    };

    match method {
        CompressionMethod::None if data.len() != expected_size => {
            return Err(size_mismatch(data.len()));
        }
        CompressionMethod::Lz4 | CompressionMethod::Lz4Hc
            if expected_size > data.len().saturating_mul(MAX_LZ4_RATIO).saturating_add(16) =>
        {
            return Err(Error::Lz4DecompressionFailed {
                message: format!(
                    "{context}: {} compressed bytes cannot expand to {expected_size}",
                    data.len()
                ),
            });
        }
        _ => {}
    }

    let output = match method {
        CompressionMethod::None => data.to_vec(),
        CompressionMethod::Lzma => lzma::decompress(data, expected_size)?,
        // LZ4HC only differs on the compression side
        CompressionMethod::Lz4 | CompressionMethod::Lz4Hc => lz4::decompress(data, expected_size)?,
    };

    if output.len() != expected_size {
        return Err(size_mismatch(output.len()));
    }
    Ok(output)
}
