//! Serialized file header and byte order detection
//!
//! The header is read in its own byte order, found by trying both orders on
//! the version field and keeping the one that yields a supported version.
//! The endianness byte at offset 16 then selects the order of everything
//! after the header, which may differ.

use serde::Serialize;
use tracing::debug;

use super::{MAX_VERSION, MIN_VERSION};
use crate::binary::{ByteCursor, Endianness};
use crate::error::{Error, Result};

/// First version with the 64-bit extended header.
pub const EXTENDED_HEADER_VERSION: u32 = 22;

/// Size of the base header including the endianness byte and padding.
pub const BASE_HEADER_SIZE: usize = 20;
/// Size of the header for versions with the extended fields.
pub const EXTENDED_HEADER_SIZE: usize = 48;

const VERSION_OFFSET: usize = 8;
const ENDIANNESS_OFFSET: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SerializedHeader {
    pub metadata_size: u64,
    pub file_size: u64,
    pub version: u32,
    pub data_offset: u64,
    /// Byte order of the header fields themselves
    pub header_endianness: Endianness,
    /// Byte order of the metadata and object data
    pub endianness: Endianness,
    pub reserved: [u8; 3],
    /// Size of the header in bytes; metadata starts here
    pub size: usize,
}

fn supported(version: u32) -> bool {
    (MIN_VERSION..=MAX_VERSION).contains(&version)
}

/// Pick the byte order whose version field is in range, big-endian first.
pub(crate) fn detect_header_endianness(bytes: &[u8]) -> Result<Endianness> {
    let mut cursor = ByteCursor::big_endian(bytes);
    cursor.set_position(VERSION_OFFSET);
    let big = cursor.read_u32()?;
    if supported(big) {
        return Ok(Endianness::Big);
    }
    let little = big.swap_bytes();
    if supported(little) {
        debug!(
            "serialized header version {big} out of range as big-endian, using little-endian ({little})"
        );
        return Ok(Endianness::Little);
    }
    Err(Error::UnsupportedVersion {
        format: "SerializedFile",
        version: u64::from(big),
    })
}

pub(crate) fn read_header(bytes: &[u8]) -> Result<SerializedHeader> {
    let header_endianness = detect_header_endianness(bytes)?;
    let mut cursor = ByteCursor::new(bytes, header_endianness);

    let mut metadata_size = u64::from(cursor.read_u32()?);
    let mut file_size = u64::from(cursor.read_u32()?);
    let version = cursor.read_u32()?;
    let mut data_offset = u64::from(cursor.read_u32()?);

    debug_assert_eq!(cursor.position(), ENDIANNESS_OFFSET);
    let endianness = if cursor.read_u8()? == 0 { Endianness::Little } else { Endianness::Big };
    let reserved = cursor.read_array::<3>()?;

    if version >= EXTENDED_HEADER_VERSION {
        metadata_size = u64::from(cursor.read_u32()?);
        file_size = cursor.read_u64()?;
        data_offset = cursor.read_u64()?;
        cursor.skip(8)?;
    }

    debug!(
        "serialized file v{version}: header {}, body {}, metadata {metadata_size} bytes, data at {data_offset}",
        header_endianness.as_str(),
        endianness.as_str()
    );
    Ok(SerializedHeader {
        metadata_size,
        file_size,
        version,
        data_offset,
        header_endianness,
        endianness,
        reserved,
        size: cursor.position(),
    })
}
