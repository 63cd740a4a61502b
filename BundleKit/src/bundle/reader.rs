//! UnityFS header, blocks info and data region reading

use tracing::{debug, trace};

use super::types::{ArchiveFlags, BundleHeader, Node, StorageBlock};
use super::{MAX_VERSION, MIN_VERSION, SIGNATURE};
use crate::binary::ByteCursor;
use crate::compression;
use crate::error::{Error, Result};

/// Longest signature accepted before giving up on finding its terminator.
const MAX_SIGNATURE_LEN: usize = 16;

/// Where the blocks info and the first storage block live in the file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Layout {
    pub blocks_info_offset: usize,
    pub data_offset: usize,
}

/// Decompressed blocks info contents
#[derive(Debug, Clone)]
pub(crate) struct BlocksInfo {
    pub hash: [u8; 16],
    pub blocks: Vec<StorageBlock>,
    pub nodes: Vec<Node>,
}

fn malformed(err: Error) -> Error {
    match err {
        Error::TruncatedInput { offset, needed, available } => Error::HeaderMalformed {
            message: format!(
                "header truncated at offset {offset} (need {needed} bytes, {available} available)"
            ),
        },
        other => other,
    }
}

/// Read the fixed header. Leaves the cursor right after the flags field.
pub(crate) fn read_header(cursor: &mut ByteCursor<'_>) -> Result<BundleHeader> {
    let window = &cursor.data()[..cursor.len().min(MAX_SIGNATURE_LEN)];
    let Some(end) = window.iter().position(|&b| b == 0) else {
        return Err(Error::InvalidSignature {
            found: String::from_utf8_lossy(window).into_owned(),
        });
    };
    let signature = String::from_utf8_lossy(&window[..end]).into_owned();
    if signature != SIGNATURE {
        return Err(Error::InvalidSignature { found: signature });
    }
    cursor.set_position(end + 1);

    let version = cursor.read_u32().map_err(malformed)?;
    if !(MIN_VERSION..=MAX_VERSION).contains(&version) {
        return Err(Error::UnsupportedVersion {
            format: "UnityFS",
            version: u64::from(version),
        });
    }

    let unity_version = cursor.read_cstring().map_err(malformed)?;
    let unity_revision = cursor.read_cstring().map_err(malformed)?;
    let size = cursor.read_i64().map_err(malformed)?;
    let compressed_blocks_info_size = cursor.read_u32().map_err(malformed)?;
    let uncompressed_blocks_info_size = cursor.read_u32().map_err(malformed)?;
    let flags = ArchiveFlags(cursor.read_u32().map_err(malformed)?);

    Ok(BundleHeader {
        signature,
        version,
        unity_version,
        unity_revision,
        size,
        compressed_blocks_info_size,
        uncompressed_blocks_info_size,
        flags,
    })
}

/// Compute where the blocks info and the data region start.
///
/// `header_end` is the position right after the flags field.
pub(crate) fn layout(header: &BundleHeader, header_end: usize, file_len: usize) -> Result<Layout> {
    let alignment = if header.version >= 7 && header.flags.needs_padding() { 16 } else { 4 };
    let aligned = header_end.next_multiple_of(alignment);
    let compressed = header.compressed_blocks_info_size as usize;

    let (blocks_info_offset, mut data_offset) = if header.flags.blocks_info_at_end() {
        let Some(offset) = file_len.checked_sub(compressed) else {
            return Err(Error::HeaderMalformed {
                message: format!(
                    "blocks info of {compressed} bytes does not fit in a {file_len}-byte file"
                ),
            });
        };
        (offset, aligned)
    } else {
        (aligned, aligned + compressed)
    };

    if header.flags.needs_padding() {
        data_offset = data_offset.next_multiple_of(16);
    }

    debug!(
        "UnityFS v{}: header ends at {header_end}, blocks info at {blocks_info_offset}, data at {data_offset}",
        header.version
    );
    Ok(Layout { blocks_info_offset, data_offset })
}

/// Slice and decompress the blocks info blob.
pub(crate) fn decompress_blocks_info(
    bytes: &[u8],
    header: &BundleHeader,
    layout: &Layout,
) -> Result<Vec<u8>> {
    let compressed_size = header.compressed_blocks_info_size as usize;
    let mut cursor = ByteCursor::big_endian(bytes);
    cursor.set_position(layout.blocks_info_offset);
    let compressed = cursor.read_bytes(compressed_size)?;

    let method = header.flags.compression()?;
    debug!("blocks info: {compressed_size} bytes, {}", method.as_str());
    compression::decompress(
        method,
        compressed,
        header.uncompressed_blocks_info_size as usize,
        "blocks info",
    )
}

/// Parse the decompressed blocks info: hash, storage block table, node table.
///
/// The node table follows the block table directly. Bundles written by the
/// engine do not pad between the two tables, so no 4-byte alignment is
/// applied there.
pub(crate) fn read_blocks_info(data: &[u8]) -> Result<BlocksInfo> {
    let mut cursor = ByteCursor::big_endian(data);
    let hash = cursor.read_array::<16>()?;

    let blocks = cursor.read_vec(10, |c| {
        Ok(StorageBlock {
            uncompressed_size: c.read_u32()?,
            compressed_size: c.read_u32()?,
            flags: c.read_u16()?,
        })
    })?;

    let nodes = cursor.read_vec(21, |c| {
        Ok(Node {
            offset: c.read_i64()?,
            size: c.read_i64()?,
            flags: c.read_u32()?,
            path: c.read_cstring()?,
        })
    })?;

    trace!("blocks info: {} blocks, {} nodes", blocks.len(), nodes.len());
    Ok(BlocksInfo { hash, blocks, nodes })
}

/// Decompress every storage block in order and concatenate the results.
pub(crate) fn read_data_region(
    bytes: &[u8],
    data_offset: usize,
    blocks: &[StorageBlock],
) -> Result<Vec<u8>> {
    // declared sizes are only trusted once each block has decompressed
    let mut region = Vec::new();

    let mut cursor = ByteCursor::big_endian(bytes);
    cursor.set_position(data_offset);
    for (index, block) in blocks.iter().enumerate() {
        let compressed = cursor.read_bytes(block.compressed_size as usize)?;
        let method = block.compression()?;
        let decompressed = compression::decompress(
            method,
            compressed,
            block.uncompressed_size as usize,
            &format!("storage block {index}"),
        )?;
        trace!(
            "block {index}: {} -> {} bytes ({})",
            block.compressed_size,
            block.uncompressed_size,
            method.as_str()
        );
        region.extend_from_slice(&decompressed);
    }
    Ok(region)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(version: u32, flags: u32, compressed: u32) -> BundleHeader {
        BundleHeader {
            signature: SIGNATURE.to_string(),
            version,
            unity_version: "5.x.x".to_string(),
            unity_revision: "2019.4.31f1".to_string(),
            size: 0,
            compressed_blocks_info_size: compressed,
            uncompressed_blocks_info_size: compressed,
            flags: ArchiveFlags(flags),
        }
    }

    #[test]
    fn test_layout_embedded_aligns_to_four() {
        let layout = layout(&header(6, 0x40, 30), 50, 1000).unwrap();
        assert_eq!(layout.blocks_info_offset, 52);
        assert_eq!(layout.data_offset, 82);
    }

    #[test]
    fn test_layout_padding_flag_aligns_to_sixteen() {
        let layout = layout(&header(7, 0x240, 30), 50, 1000).unwrap();
        assert_eq!(layout.blocks_info_offset, 64);
        assert_eq!(layout.data_offset, 96);
    }

    #[test]
    fn test_layout_padding_flag_ignored_before_v7_for_header() {
        let layout = layout(&header(6, 0x200, 30), 50, 1000).unwrap();
        assert_eq!(layout.blocks_info_offset, 52);
        // data start is still padded
        assert_eq!(layout.data_offset, 96);
    }

    #[test]
    fn test_layout_blocks_info_at_end() {
        let layout = layout(&header(6, 0xC0, 30), 50, 1000).unwrap();
        assert_eq!(layout.blocks_info_offset, 970);
        assert_eq!(layout.data_offset, 52);

        assert!(matches!(
            super::layout(&header(6, 0x80, 2000), 50, 1000),
            Err(Error::HeaderMalformed { .. })
        ));
    }
}
