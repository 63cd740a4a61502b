//! LZMA1 decoding for bundle blocks
//!
//! Bundles store a bare LZMA1 stream: five property bytes followed by the
//! compressed payload, with no size field. liblzma's `.lzma` ("alone") decoder
//! expects an 8-byte little-endian uncompressed size after the properties, so
//! the header is rebuilt from the size the bundle declares.

use std::io::Read;

use xz2::read::XzDecoder;
use xz2::stream::Stream;

use crate::error::{Error, Result};

/// Length of the LZMA properties header (lc/lp/pb byte + dictionary size).
pub const PROPERTIES_SIZE: usize = 5;

/// Rebuild a `.lzma` stream header from bundle LZMA data.
///
/// # Errors
/// Returns [`Error::LzmaDecompressionFailed`] if `data` is shorter than the
/// properties header.
pub fn alone_stream(data: &[u8], uncompressed_size: usize) -> Result<Vec<u8>> {
    if data.len() < PROPERTIES_SIZE {
        return Err(Error::LzmaDecompressionFailed {
            message: format!("stream of {} bytes has no properties header", data.len()),
        });
    }
    let mut stream = Vec::with_capacity(data.len() + 8);
    stream.extend_from_slice(&data[..PROPERTIES_SIZE]);
    stream.extend_from_slice(&(uncompressed_size as u64).to_le_bytes());
    stream.extend_from_slice(&data[PROPERTIES_SIZE..]);
    Ok(stream)
}

/// Decompress bundle LZMA data of known uncompressed size.
///
/// # Errors
/// Returns [`Error::LzmaDecompressionFailed`] on corrupt input.
pub fn decompress(data: &[u8], expected_size: usize) -> Result<Vec<u8>> {
    let stream = alone_stream(data, expected_size)?;
    let decoder = Stream::new_lzma_decoder(u64::MAX).map_err(|e| Error::LzmaDecompressionFailed {
        message: e.to_string(),
    })?;

    // the declared size is untrusted until the stream produces it
    let mut output = Vec::with_capacity(expected_size.min(data.len().saturating_mul(4)));
    XzDecoder::new_stream(stream.as_slice(), decoder)
        .take(expected_size as u64 + 1)
        .read_to_end(&mut output)
        .map_err(|e| Error::LzmaDecompressionFailed {
            message: e.to_string(),
        })?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alone_header_inserts_size() {
        let data = [0x5D, 0x00, 0x00, 0x01, 0x00, 0xAA, 0xBB];
        let stream = alone_stream(&data, 0x0102).unwrap();
        assert_eq!(&stream[..5], &data[..5]);
        assert_eq!(&stream[5..13], &[0x02, 0x01, 0, 0, 0, 0, 0, 0]);
        assert_eq!(&stream[13..], &[0xAA, 0xBB]);
    }

    #[test]
    fn test_short_stream_rejected() {
        assert!(matches!(
            decompress(&[0x5D, 0x00], 10),
            Err(Error::LzmaDecompressionFailed { .. })
        ));
    }
}
