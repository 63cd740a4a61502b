//! Types for UnityFS bundle handling

use serde::Serialize;

use crate::compression::CompressionMethod;
use crate::error::{Error, Result};

/// Archive flags from the bundle header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct ArchiveFlags(pub u32);

impl ArchiveFlags {
    pub const COMPRESSION_MASK: u32 = 0x3F;
    pub const BLOCKS_AND_DIRECTORY_COMBINED: u32 = 0x40;
    pub const BLOCKS_INFO_AT_END: u32 = 0x80;
    pub const OLD_WEB_PLUGIN_COMPATIBILITY: u32 = 0x100;
    pub const BLOCK_INFO_NEEDS_PADDING: u32 = 0x200;

    #[must_use]
    pub fn bits(self) -> u32 {
        self.0
    }

    /// Compression of the blocks info blob.
    pub fn compression(self) -> Result<CompressionMethod> {
        CompressionMethod::from_flags(self.0)
    }

    #[must_use]
    pub fn blocks_and_directory_combined(self) -> bool {
        self.0 & Self::BLOCKS_AND_DIRECTORY_COMBINED != 0
    }

    #[must_use]
    pub fn blocks_info_at_end(self) -> bool {
        self.0 & Self::BLOCKS_INFO_AT_END != 0
    }

    #[must_use]
    pub fn needs_padding(self) -> bool {
        self.0 & Self::BLOCK_INFO_NEEDS_PADDING != 0
    }
}

/// UnityFS bundle header. All fields are stored big-endian.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BundleHeader {
    /// Always `UnityFS`
    pub signature: String,
    /// Archive format version (6-8)
    pub version: u32,
    /// Player version string, usually `5.x.x`
    pub unity_version: String,
    /// Engine revision that built the bundle, e.g. `2019.4.31f1`
    pub unity_revision: String,
    /// Declared total file size
    pub size: i64,
    pub compressed_blocks_info_size: u32,
    pub uncompressed_blocks_info_size: u32,
    pub flags: ArchiveFlags,
}

/// One independently compressed chunk of the logical data region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StorageBlock {
    pub uncompressed_size: u32,
    pub compressed_size: u32,
    pub flags: u16,
}

impl StorageBlock {
    /// Hint that the block was written for streaming; has no effect on decoding.
    pub const STREAMED: u16 = 0x40;

    pub fn compression(&self) -> Result<CompressionMethod> {
        CompressionMethod::from_flags(u32::from(self.flags))
    }

    #[must_use]
    pub fn is_streamed(&self) -> bool {
        self.flags & Self::STREAMED != 0
    }
}

/// A virtual file inside the bundle, addressing the logical data region
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Node {
    pub offset: i64,
    pub size: i64,
    pub flags: u32,
    pub path: String,
}

impl Node {
    /// Node flag marking a serialized file.
    pub const SERIALIZED_FILE: u32 = 0x04;

    /// Exclusive end of the node's range.
    #[must_use]
    pub fn end(&self) -> i64 {
        self.offset.saturating_add(self.size)
    }

    /// Last path component (`CAB-abc.resS` for `archive:/CAB-abc/CAB-abc.resS`).
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    #[must_use]
    pub fn is_serialized_file(&self) -> bool {
        self.flags & Self::SERIALIZED_FILE != 0
    }

    /// True for auxiliary payload nodes (`.resS` streamed data, `.resource` audio).
    #[must_use]
    pub fn is_resource(&self) -> bool {
        let name = self.file_name();
        name.ends_with(".resS") || name.ends_with(".resource")
    }

    /// Byte range as `usize`, or `None` for negative values.
    pub(crate) fn range(&self) -> Option<std::ops::Range<usize>> {
        let start = usize::try_from(self.offset).ok()?;
        let size = usize::try_from(self.size).ok()?;
        Some(start..start.checked_add(size)?)
    }
}

/// A fully parsed bundle: header, directory and the materialized data region
#[derive(Debug, Clone)]
pub struct Container {
    pub header: BundleHeader,
    /// Opaque 16-byte hash stored at the start of the blocks info
    pub hash: [u8; 16],
    pub blocks: Vec<StorageBlock>,
    pub nodes: Vec<Node>,
    /// Absolute file offset where the first storage block starts
    pub data_offset: u64,
    pub(crate) data: Vec<u8>,
}

impl Container {
    /// The concatenated, decompressed storage blocks.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    #[must_use]
    pub fn hash(&self) -> &[u8; 16] {
        &self.hash
    }

    /// Sum of all storage blocks' uncompressed sizes.
    #[must_use]
    pub fn total_span(&self) -> u64 {
        total_span(&self.blocks)
    }

    /// Slice a node's bytes out of the data region.
    ///
    /// # Errors
    /// Returns [`Error::RegionOutOfBounds`] if the node's range lies past the
    /// materialized data region.
    pub fn extract(&self, node: &Node) -> Result<&[u8]> {
        let out_of_bounds = || Error::RegionOutOfBounds {
            offset: node.offset.max(0) as u64,
            size: node.size.max(0) as u64,
            available: self.data.len() as u64,
        };
        let range = node.range().ok_or_else(out_of_bounds)?;
        self.data.get(range).ok_or_else(out_of_bounds)
    }

    /// Find a node by its full path.
    #[must_use]
    pub fn node(&self, path: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.path == path)
    }

    /// Find a node by the last component of its path.
    #[must_use]
    pub fn node_by_name(&self, file_name: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.file_name() == file_name)
    }

    /// The serialized files in the bundle, in directory order.
    ///
    /// Falls back to every non-resource node when no node carries the
    /// serialized-file flag.
    #[must_use]
    pub fn serialized_files(&self) -> Vec<&Node> {
        let flagged: Vec<&Node> = self.nodes.iter().filter(|n| n.is_serialized_file()).collect();
        if !flagged.is_empty() {
            return flagged;
        }
        self.nodes.iter().filter(|n| !n.is_resource()).collect()
    }
}

pub(crate) fn total_span(blocks: &[StorageBlock]) -> u64 {
    blocks.iter().map(|b| u64::from(b.uncompressed_size)).sum()
}
