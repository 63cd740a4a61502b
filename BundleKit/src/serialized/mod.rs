//! Serialized file (asset metadata) parsing
//!
//! A serialized file is stored as the first node of a bundle. It starts with
//! a header whose byte order is detected from its version field, followed by
//! metadata in the byte order the header declares: the type table (with type
//! trees), the object directory, script types, and external references. The
//! object data itself follows at the header's data offset.
//!
//! # Example
//!
//! ```no_run
//! use bundlekit::{bundle, serialized};
//!
//! let bytes = std::fs::read("character.bundle")?;
//! let container = bundle::parse(&bytes)?;
//! let node_zero = container.extract(&container.nodes[0])?;
//! let directory = serialized::parse(node_zero)?;
//! for object in &directory.objects {
//!     println!("{} class {} ({} bytes)", object.path_id, object.class_id, object.byte_size);
//! }
//! # Ok::<(), bundlekit::Error>(())
//! ```

pub mod class_id;
pub mod common_strings;
mod header;
mod reader;
pub mod type_tree;
mod types;
mod values;

use std::sync::Arc;

use tracing::warn;

use crate::binary::{ByteCursor, Endianness};
use crate::diagnostics::{ParseReport, Warning};
use crate::error::{Error, Result};

pub use header::{SerializedHeader, EXTENDED_HEADER_VERSION};
pub use type_tree::{TypeTree, TypeTreeNode};
pub use types::{ExternalReference, ObjectEntry, ScriptTypeRef, SerializedType};
pub use values::TreeValue;

/// Oldest supported serialized file version
pub const MIN_VERSION: u32 = 9;
/// Newest supported serialized file version
pub const MAX_VERSION: u32 = 30;

/// Parsed metadata of one serialized file, borrowing its bytes
#[derive(Debug, Clone)]
pub struct MetadataDirectory<'a> {
    pub header: SerializedHeader,
    pub unity_version: String,
    pub target_platform: i32,
    pub type_tree_enabled: bool,
    pub types: Vec<SerializedType>,
    pub objects: Vec<ObjectEntry>,
    pub script_types: Vec<ScriptTypeRef>,
    pub externals: Vec<ExternalReference>,
    pub ref_types: Vec<SerializedType>,
    pub user_information: String,
    /// Recoverable problems found while parsing
    pub warnings: Vec<Warning>,
    bytes: &'a [u8],
}

impl<'a> MetadataDirectory<'a> {
    /// Byte order of the metadata and object data.
    #[must_use]
    pub fn endianness(&self) -> Endianness {
        self.header.endianness
    }

    #[must_use]
    pub fn version(&self) -> u32 {
        self.header.version
    }

    /// The serialized file bytes this directory was parsed from.
    #[must_use]
    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Raw bytes of one object.
    ///
    /// # Errors
    /// Returns [`Error::StructuralInconsistency`] if the entry's range lies
    /// outside the serialized file.
    pub fn read_object_bytes(&self, entry: &ObjectEntry) -> Result<&'a [u8]> {
        object_range(self.bytes.len(), entry)
            .and_then(|range| self.bytes.get(range))
            .ok_or_else(|| out_of_range(self.bytes.len(), entry))
    }

    /// Objects of the given class, in directory order.
    pub fn objects_of_class(&self, class_id: i32) -> impl Iterator<Item = &ObjectEntry> {
        self.objects.iter().filter(move |o| o.class_id == class_id)
    }

    #[must_use]
    pub fn object(&self, path_id: i64) -> Option<&ObjectEntry> {
        self.objects.iter().find(|o| o.path_id == path_id)
    }

    /// Type table entry of an object, when the file has a type table.
    #[must_use]
    pub fn object_type(&self, entry: &ObjectEntry) -> Option<&SerializedType> {
        usize::try_from(entry.type_id).ok().and_then(|i| self.types.get(i))
    }

    /// The shared type tree of an object's type.
    #[must_use]
    pub fn type_tree(&self, entry: &ObjectEntry) -> Option<Arc<TypeTree>> {
        self.object_type(entry).and_then(|t| t.type_tree.clone())
    }

    /// Type name for display: type tree root type, else the class name.
    #[must_use]
    pub fn type_name(&self, entry: &ObjectEntry) -> String {
        self.object_type(entry).map_or_else(
            || {
                class_id::class_name(entry.class_id)
                    .map_or_else(|| format!("Class{}", entry.class_id), str::to_string)
            },
            SerializedType::name,
        )
    }

    /// Decode an object against its type tree.
    ///
    /// # Errors
    /// Returns [`Error::MissingTypeTree`] when the file carries no type tree
    /// for the object's type, or a decoding error.
    pub fn read_object_tree(&self, entry: &ObjectEntry) -> Result<TreeValue> {
        let tree = self.type_tree(entry).ok_or(Error::MissingTypeTree {
            class_id: entry.class_id,
        })?;
        let bytes = self.read_object_bytes(entry)?;
        let mut cursor = ByteCursor::new(bytes, self.endianness());
        tree.read_value(&mut cursor)
    }
}

fn object_range(len: usize, entry: &ObjectEntry) -> Option<std::ops::Range<usize>> {
    let start = usize::try_from(entry.byte_start).ok()?;
    let end = start.checked_add(entry.byte_size as usize)?;
    (end <= len).then_some(start..end)
}

fn out_of_range(len: usize, entry: &ObjectEntry) -> Error {
    Error::StructuralInconsistency {
        message: format!(
            "object {} spans {}..{} but the serialized file has {len} bytes",
            entry.path_id,
            entry.byte_start,
            entry.byte_end()
        ),
    }
}

/// Parse serialized file metadata, failing on the first error.
///
/// # Errors
/// Returns the first error encountered.
pub fn parse(bytes: &[u8]) -> Result<MetadataDirectory<'_>> {
    run(bytes, true).into_result()
}

/// Parse serialized file metadata, collecting every error.
#[must_use]
pub fn try_parse(bytes: &[u8]) -> ParseReport<MetadataDirectory<'_>> {
    run(bytes, false)
}

fn run(bytes: &[u8], fail_fast: bool) -> ParseReport<MetadataDirectory<'_>> {
    let header = match header::read_header(bytes) {
        Ok(header) => header,
        Err(e) => return ParseReport::failed(e),
    };

    let mut report = ParseReport::new();
    let meta = match reader::MetadataReader::new(bytes, &header, &mut report.warnings).read() {
        Ok(meta) => meta,
        Err(e) => {
            report.errors.push(e);
            return report;
        }
    };

    for entry in &meta.objects {
        if object_range(bytes.len(), entry).is_none() {
            warn!("object {} lies outside the serialized file", entry.path_id);
            report.errors.push(out_of_range(bytes.len(), entry));
            if fail_fast {
                return report;
            }
        }
    }

    if report.errors.is_empty() {
        report.result = Some(MetadataDirectory {
            header,
            unity_version: meta.unity_version,
            target_platform: meta.target_platform,
            type_tree_enabled: meta.type_tree_enabled,
            types: meta.types,
            objects: meta.objects,
            script_types: meta.script_types,
            externals: meta.externals,
            ref_types: meta.ref_types,
            user_information: meta.user_information,
            warnings: report.warnings.clone(),
            bytes,
        });
    }
    report
}
