//! LZ4 / LZ4HC raw block decoding

use crate::error::{Error, Result};

/// Decompress an LZ4 block (no frame, no size prefix).
///
/// # Errors
/// Returns [`Error::Lz4DecompressionFailed`] on corrupt input or when the
/// output would exceed `expected_size`.
pub fn decompress(data: &[u8], expected_size: usize) -> Result<Vec<u8>> {
    lz4_flex::block::decompress(data, expected_size).map_err(|e| Error::Lz4DecompressionFailed {
        message: e.to_string(),
    })
}
