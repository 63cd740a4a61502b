//! UnityFS bundle container
//!
//! A bundle is a big-endian header, a (usually compressed) blocks info blob
//! holding the storage block table and the node directory, and a sequence of
//! independently compressed storage blocks. Decompressed and concatenated, the
//! blocks form the logical data region that node offsets address.
//!
//! # Example
//!
//! ```no_run
//! use bundlekit::bundle;
//!
//! let bytes = std::fs::read("character.bundle")?;
//! let container = bundle::parse(&bytes)?;
//! for node in &container.nodes {
//!     println!("{} ({} bytes)", node.path, container.extract(node)?.len());
//! }
//! # Ok::<(), bundlekit::Error>(())
//! ```

mod reader;
mod resolver;
mod types;
mod validation;

use std::path::Path;

use tracing::{debug, warn};

use crate::binary::{to_hex, ByteCursor};
use crate::diagnostics::ParseReport;
use crate::error::{Error, Result};

pub use resolver::{resource_name, ResourceResolver};
pub use types::{ArchiveFlags, BundleHeader, Container, Node, StorageBlock};
pub use validation::OverlapPolicy;

/// Bundle signature
pub const SIGNATURE: &str = "UnityFS";
/// Oldest supported archive version
pub const MIN_VERSION: u32 = 6;
/// Newest supported archive version
pub const MAX_VERSION: u32 = 8;

/// Options for bundle parsing
#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    /// Expected blocks info hash. The stored hash is only compared when set.
    pub reference_hash: Option<[u8; 16]>,
    /// How overlapping nodes are reported
    pub overlap_policy: OverlapPolicy,
}

impl ParseOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject overlapping nodes instead of warning about them.
    #[must_use]
    pub fn strict() -> Self {
        Self {
            reference_hash: None,
            overlap_policy: OverlapPolicy::Error,
        }
    }

    #[must_use]
    pub fn with_reference_hash(mut self, hash: [u8; 16]) -> Self {
        self.reference_hash = Some(hash);
        self
    }

    #[must_use]
    pub fn with_overlap_policy(mut self, policy: OverlapPolicy) -> Self {
        self.overlap_policy = policy;
        self
    }
}

/// Parse a bundle, stopping at the first error.
///
/// # Errors
/// Returns the first structural or validation error encountered.
pub fn parse(bytes: &[u8]) -> Result<Container> {
    parse_with_options(bytes, &ParseOptions::default())
}

/// Parse a bundle with explicit options, stopping at the first error.
///
/// # Errors
/// Returns the first structural or validation error encountered.
pub fn parse_with_options(bytes: &[u8], options: &ParseOptions) -> Result<Container> {
    run(bytes, options, true).into_result()
}

/// Parse a bundle, collecting every problem instead of stopping at the first.
///
/// Structural failures (signature, header, blocks info) still end the parse,
/// but node validation, hash verification and data region reconstruction are
/// all attempted and reported independently.
#[must_use]
pub fn try_parse(bytes: &[u8], options: &ParseOptions) -> ParseReport<Container> {
    run(bytes, options, false)
}

/// Read and parse a bundle file.
///
/// # Errors
/// Returns an error if the file cannot be read or parsing fails.
pub fn open<P: AsRef<Path>>(path: P) -> Result<Container> {
    let bytes = std::fs::read(path.as_ref())?;
    parse(&bytes)
}

fn run(bytes: &[u8], options: &ParseOptions, fail_fast: bool) -> ParseReport<Container> {
    let mut cursor = ByteCursor::big_endian(bytes);
    let header = match reader::read_header(&mut cursor) {
        Ok(header) => header,
        Err(e) => return ParseReport::failed(e),
    };
    let header_end = cursor.position();

    let info = reader::layout(&header, header_end, bytes.len()).and_then(|layout| {
        let raw = reader::decompress_blocks_info(bytes, &header, &layout)?;
        Ok((layout, reader::read_blocks_info(&raw)?))
    });
    let (layout, info) = match info {
        Ok(parsed) => parsed,
        Err(e) => return ParseReport::failed(e),
    };

    let mut report = ParseReport::new();

    if let Some(expected) = options.reference_hash.filter(|h| *h != info.hash) {
        warn!("blocks info hash mismatch");
        report.errors.push(Error::HashMismatch {
            expected: to_hex(&expected),
            actual: to_hex(&info.hash),
        });
        if fail_fast {
            return report;
        }
    }

    let span = types::total_span(&info.blocks);
    let node_errors =
        validation::validate_nodes(&info.nodes, span, options.overlap_policy, &mut report.warnings);
    report.errors.extend(node_errors);
    if fail_fast && !report.errors.is_empty() {
        return report;
    }

    match reader::read_data_region(bytes, layout.data_offset, &info.blocks) {
        Ok(data) if report.errors.is_empty() => {
            debug!(
                "bundle parsed: {} blocks, {} nodes, {} bytes of data",
                info.blocks.len(),
                info.nodes.len(),
                data.len()
            );
            report.result = Some(Container {
                header,
                hash: info.hash,
                blocks: info.blocks,
                nodes: info.nodes,
                data_offset: layout.data_offset as u64,
                data,
            });
        }
        Ok(_) => {}
        Err(e) => report.errors.push(e),
    }

    report
}
