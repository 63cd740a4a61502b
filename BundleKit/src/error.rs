//! Error types for `BundleKit`

use thiserror::Error;

/// The error type for `BundleKit` operations.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum Error {
    // ==================== IO Errors ====================
    /// IO error from file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A read ran past the end of the available bytes.
    #[error("truncated input: need {needed} bytes at offset {offset}, only {available} available")]
    TruncatedInput {
        /// Absolute offset of the failed read.
        offset: u64,
        /// Number of bytes the read required.
        needed: u64,
        /// Number of bytes left at that offset.
        available: u64,
    },

    // ==================== Container (UnityFS) Errors ====================
    /// The file does not start with the `UnityFS` signature.
    #[error("invalid bundle signature: expected UnityFS, found {found:?}")]
    InvalidSignature {
        /// The signature string that was read.
        found: String,
    },

    /// A container or serialized file version outside the supported range.
    #[error("unsupported {format} version: {version}")]
    UnsupportedVersion {
        /// Which layer rejected the version (`UnityFS`, `SerializedFile`).
        format: &'static str,
        /// The version number found in the file.
        version: u64,
    },

    /// The bundle header could not be read completely.
    #[error("malformed bundle header: {message}")]
    HeaderMalformed {
        /// Description of what is missing or invalid.
        message: String,
    },

    /// The computed 16-byte hash of the blocks info does not match the expected one.
    #[error("blocks info hash mismatch: expected {expected}, found {actual}")]
    HashMismatch {
        /// Caller-supplied hash, hex encoded.
        expected: String,
        /// Hash stored in the bundle, hex encoded.
        actual: String,
    },

    /// Two nodes share the same path.
    #[error("duplicate node path: {path}")]
    DuplicateNodePath {
        /// The repeated path.
        path: String,
    },

    /// A node addresses bytes outside the logical data region.
    #[error("node {path} out of bounds: offset {offset} + size {size} exceeds span {span}")]
    NodeOutOfBounds {
        /// Path of the offending node.
        path: String,
        /// Node offset.
        offset: i64,
        /// Node size.
        size: i64,
        /// Total uncompressed span of all storage blocks.
        span: u64,
    },

    /// Two node ranges overlap (only an error under a strict overlap policy).
    #[error("nodes {first} and {second} overlap")]
    OverlappingNodes {
        /// Path of the earlier node.
        first: String,
        /// Path of the later node.
        second: String,
    },

    /// A requested slice lies past the materialized data region.
    #[error("range {offset}+{size} is outside the data region ({available} bytes)")]
    RegionOutOfBounds {
        /// Requested offset.
        offset: u64,
        /// Requested size.
        size: u64,
        /// Size of the data region.
        available: u64,
    },

    // ==================== Compression Errors ====================
    /// Unsupported compression method.
    #[error("unsupported compression method: {method}")]
    UnsupportedCompression {
        /// The compression selector (`flags & 0x3F`).
        method: u32,
    },

    /// Decompression produced a different number of bytes than declared.
    #[error("{context}: decompressed {actual} bytes, expected {expected}")]
    DecompressionSizeMismatch {
        /// What was being decompressed (blocks info, storage block N).
        context: String,
        /// Declared uncompressed size.
        expected: u64,
        /// Actual decompressed size.
        actual: u64,
    },

    /// LZ4 decompression failed.
    #[error("LZ4 decompression failed: {message}")]
    Lz4DecompressionFailed {
        /// The error message.
        message: String,
    },

    /// LZMA decompression failed.
    #[error("LZMA decompression failed: {message}")]
    LzmaDecompressionFailed {
        /// The error message.
        message: String,
    },

    // ==================== Serialized File Errors ====================
    /// An object's type id does not index into the type table.
    #[error("object {path_id} references type {type_id}, but only {type_count} types exist")]
    InvalidObjectTypeReference {
        /// The object's path id.
        path_id: i64,
        /// The out-of-range type id.
        type_id: i32,
        /// Number of entries in the type table.
        type_count: usize,
    },

    /// Declared sizes, counts or offsets contradict each other.
    #[error("structural inconsistency: {message}")]
    StructuralInconsistency {
        /// Description of the inconsistency.
        message: String,
    },

    /// An object has no type tree to decode it against.
    #[error("no type tree available for class {class_id}")]
    MissingTypeTree {
        /// Class id of the object.
        class_id: i32,
    },

    // ==================== Mesh Errors ====================
    /// Vertex data lives in an external resource that could not be resolved.
    #[error("unresolved external resource {path} (offset {offset}, size {size}): {reason}")]
    UnresolvedExternalResource {
        /// Resource path as stored in the stream info.
        path: String,
        /// Offset inside the resource.
        offset: u64,
        /// Number of bytes requested.
        size: u64,
        /// Why resolution failed.
        reason: String,
    },

    /// The requested object is not a mesh.
    #[error("object {path_id} has class {class_id}, not Mesh")]
    NotAMesh {
        /// The object's path id.
        path_id: i64,
        /// The object's class id.
        class_id: i32,
    },

    /// A version string could not be parsed.
    #[error("invalid Unity version string: {0:?}")]
    InvalidUnityVersion(String),

    // ==================== Parsing Errors ====================
    /// JSON parsing or serialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// A specialized Result type for `BundleKit` operations.
pub type Result<T> = std::result::Result<T, Error>;
