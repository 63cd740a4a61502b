//! # BundleKit
//!
//! A pure-Rust library for reading Unity asset bundles.
//!
//! ## Layers
//!
//! - **Container** ([`bundle`]) - `UnityFS` header, blocks info, LZ4/LZMA
//!   storage blocks and the node table
//! - **Serialized files** ([`serialized`]) - header, type trees, object table
//!   and external references, plus generic type-tree value decoding
//! - **Meshes** ([`mesh`]) - version-gated `Mesh` decoding into positions,
//!   normals, UVs, skinning and triangle lists
//!
//! ## Quick Start
//!
//! ```no_run
//! use bundlekit::asset::AssetBundle;
//!
//! let bundle = AssetBundle::open("character.bundle")?;
//! for entry in bundle.decode_meshes()? {
//!     match entry.result {
//!         Ok(mesh) => println!("{}: {} vertices", mesh.name, mesh.vertex_count),
//!         Err(e) => eprintln!("{} #{}: {e}", entry.file, entry.path_id),
//!     }
//! }
//! # Ok::<(), bundlekit::Error>(())
//! ```
//!
//! ### Non-failing parses
//!
//! ```no_run
//! use bundlekit::bundle::{self, ParseOptions};
//!
//! let bytes = std::fs::read("broken.bundle")?;
//! let report = bundle::try_parse(&bytes, &ParseOptions::default());
//! for error in &report.errors {
//!     eprintln!("error: {error}");
//! }
//! # Ok::<(), bundlekit::Error>(())
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` - Enables the `bundlekit` command-line binary

pub mod asset;
pub mod batch;
pub mod binary;
pub mod bundle;
pub mod compression;
pub mod diagnostics;
pub mod error;
pub mod mesh;
pub mod report;
pub mod serialized;

// Re-exports for convenience
pub use diagnostics::{Outcome, ParseReport, Warning};
pub use error::{Error, Result};

/// Prelude module for common imports
pub mod prelude {
    pub use crate::asset::{AssetBundle, MeshEntry, OpenOptions, SerializedFile};
    pub use crate::binary::{ByteCursor, Endianness};
    pub use crate::bundle::{Container, Node, OverlapPolicy, ParseOptions, ResourceResolver};
    pub use crate::diagnostics::{Outcome, ParseReport, Warning};
    pub use crate::error::{Error, Result};
    pub use crate::mesh::{DecodeOptions, GeometryRecord, UnityVersion};
    pub use crate::serialized::{MetadataDirectory, ObjectEntry, TreeValue};

    pub use crate::batch::{find_bundle_files, validate_bundles, BatchValidationResult};
}

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// CLI module (feature-gated)
#[cfg(feature = "cli")]
pub mod cli;
