//! Mesh object decoding
//!
//! [`decode`] turns the bytes of one `Mesh` object into a [`GeometryRecord`]:
//! flat position, normal, tangent, color and UV arrays, the widened index
//! buffer and per-submesh triangle lists. Fields are read by walking
//! [`plan::MESH_READ_PLAN`] against the file's engine version.
//!
//! Vertex data that was moved out of the object into a `.resS` node is fetched
//! through a [`ResourceResolver`]; a [`Container`](crate::bundle::Container)
//! is one.
//!
//! ```no_run
//! use bundlekit::{bundle, mesh, serialized};
//!
//! # fn main() -> bundlekit::Result<()> {
//! let container = bundle::open("characters.bundle")?;
//! let nodes = container.serialized_files();
//! let directory = serialized::parse(container.extract(nodes[0])?)?;
//! let version = directory.unity_version.parse()?;
//! for entry in directory.objects_of_class(serialized::class_id::MESH) {
//!     let bytes = directory.read_object_bytes(entry)?;
//!     let geometry = mesh::decode(bytes, &version, directory.endianness(), Some(&container))?;
//!     println!("{}: {} vertices", geometry.name, geometry.vertex_count);
//! }
//! # Ok(())
//! # }
//! ```

mod compressed;
pub mod packed;
pub mod plan;
mod triangles;
mod types;
mod version;
pub mod vertex_data;

pub use packed::{unpack_floats, unpack_ints, PackedFloatVector, PackedIntVector};
pub use triangles::{destripify, split_quads};
pub use types::{
    Aabb, BlendShape, BlendShapeChannel, BlendShapeData, BlendShapeVertex, BoneWeights4,
    GeometryRecord, IndexFormat, MeshFlags, MinMaxAabb, StreamingInfo, SubMesh, Topology, UvSet,
    VertexLayout,
};
pub use version::UnityVersion;

use tracing::debug;

use crate::binary::{ByteCursor, Endianness};
use crate::bundle::ResourceResolver;
use crate::diagnostics::Warning;
use crate::error::{Error, Result};

use plan::MeshReader;
use vertex_data::extract_attributes;

/// Options for [`decode_with_options`].
#[derive(Debug, Clone, Copy)]
pub struct DecodeOptions {
    /// Build per-submesh triangle lists. Default `true`.
    pub triangles: bool,
    /// The object always stores `m_CompressedMesh`, even when uncompressed.
    /// Set from the object's type tree. Default `false`.
    pub compressed_mesh_always_serialized: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            triangles: true,
            compressed_mesh_always_serialized: false,
        }
    }
}

impl DecodeOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_triangles(mut self, triangles: bool) -> Self {
        self.triangles = triangles;
        self
    }

    #[must_use]
    pub fn with_compressed_mesh_always_serialized(mut self, always: bool) -> Self {
        self.compressed_mesh_always_serialized = always;
        self
    }
}

/// Decode a Mesh object with default options.
///
/// # Errors
/// [`Error::TruncatedInput`] when the object is shorter than its layout,
/// [`Error::UnresolvedExternalResource`] when streamed vertex data cannot be
/// fetched.
pub fn decode(
    bytes: &[u8],
    version: &UnityVersion,
    endian: Endianness,
    resolver: Option<&dyn ResourceResolver>,
) -> Result<GeometryRecord> {
    decode_with_options(bytes, version, endian, resolver, &DecodeOptions::default())
}

/// Decode a Mesh object.
///
/// # Errors
/// See [`decode`].
pub fn decode_with_options(
    bytes: &[u8],
    version: &UnityVersion,
    endian: Endianness,
    resolver: Option<&dyn ResourceResolver>,
    options: &DecodeOptions,
) -> Result<GeometryRecord> {
    let mut reader = MeshReader::new(ByteCursor::new(bytes, endian), version.clone());
    reader.compressed_mesh_always_serialized = options.compressed_mesh_always_serialized;
    let (raw, cursor) = reader.read()?;

    let mut warnings = Vec::new();
    if cursor.position() < bytes.len() {
        debug!("mesh {:?}: {} trailing bytes", raw.name, bytes.len() - cursor.position());
        warnings.push(Warning::TrailingBytes {
            consumed: cursor.position() as u64,
            size: bytes.len() as u64,
        });
    }

    let stream = raw.stream_data.as_ref().filter(|s| s.has_stream());
    let vertex_bytes = match stream {
        Some(info) if raw.vertex_data.data.is_empty() => {
            let resolver = resolver.ok_or_else(|| Error::UnresolvedExternalResource {
                path: info.path.clone(),
                offset: info.offset,
                size: u64::from(info.size),
                reason: "no resource resolver supplied".to_string(),
            })?;
            debug!("mesh {:?}: vertex data from {} @ {}", raw.name, info.path, info.offset);
            resolver.resolve(&info.path, info.offset, u64::from(info.size))?
        }
        _ => raw.vertex_data.data,
    };

    let vertex_data = &raw.vertex_data;
    let mut vertex_count = vertex_data.vertex_count as usize;
    let attributes = extract_attributes(
        &vertex_data.channels,
        &vertex_data.streams,
        vertex_bytes,
        vertex_count,
        endian,
        version,
        &mut warnings,
    );

    let mut skin = attributes.skin(vertex_count);
    if skin.is_none() && !raw.skin.is_empty() {
        skin = Some(raw.skin.clone());
    }

    let index_format = match (raw.index_format, raw.use_16bit_indices) {
        (Some(1), _) | (None, Some(false)) => IndexFormat::UInt32,
        _ => IndexFormat::UInt16,
    };
    let mut indices = triangles::decode_index_buffer(raw.index_buffer, index_format, endian)?;

    let mut record = GeometryRecord {
        name: raw.name.clone(),
        positions: attributes.positions,
        normals: attributes.normals,
        tangents: attributes.tangents,
        colors: attributes.colors,
        uv_sets: attributes.uv_sets,
        bind_poses: raw.bind_pose.clone(),
        ..GeometryRecord::default()
    };

    if let Some(compressed) = &raw.compressed_mesh {
        let unpacked = compressed.decompress()?;
        vertex_count = unpacked.positions.len() / 3;
        record.positions = unpacked.positions;
        if !unpacked.uv_sets.is_empty() {
            record.uv_sets = unpacked.uv_sets;
        }
        if !unpacked.bind_poses.is_empty() {
            record.bind_poses = unpacked.bind_poses;
        }
        record.normals = unpacked.normals.or(record.normals);
        record.tangents = unpacked.tangents.or(record.tangents);
        record.colors = unpacked.colors.or(record.colors);
        skin = unpacked.skin.or(skin);
        if let Some(triangles) = unpacked.triangles {
            indices = triangles;
        }
    }

    let mut submeshes = raw.submeshes.clone();
    if options.triangles {
        triangles::assign_triangles(
            &mut submeshes,
            &indices,
            index_format.size(),
            version.before(4, 0),
            &mut warnings,
        );
    }

    let bounds = if raw.local_aabb == Aabb::default() {
        Aabb::from_positions(&record.positions)
    } else {
        raw.local_aabb
    };

    debug!(
        "mesh {:?}: {} vertices, {} indices, {} submeshes, {} warnings",
        raw.name,
        vertex_count,
        indices.len(),
        submeshes.len(),
        warnings.len()
    );

    Ok(GeometryRecord {
        vertex_count,
        skin,
        bone_name_hashes: raw.bone_name_hashes,
        root_bone_name_hash: raw.root_bone_name_hash,
        bones_aabb: raw.bones_aabb,
        variable_bone_count_weights: raw.variable_bone_count_weights,
        blend_shapes: raw.shapes,
        index_format,
        indices,
        submeshes,
        bounds,
        mesh_compression: raw.mesh_compression,
        layout: VertexLayout {
            current_channels: vertex_data.current_channels,
            vertex_count: vertex_data.vertex_count,
            channels: vertex_data.channels.clone(),
            streams: vertex_data.streams.clone(),
            data_size: vertex_data.data.len(),
        },
        index_buffer_size: raw.index_buffer.len(),
        index_format_field: raw.index_format,
        use_16bit_indices: raw.use_16bit_indices,
        flags: MeshFlags {
            stream_compression: raw.stream_compression,
            is_readable: raw.is_readable,
            keep_vertices: raw.keep_vertices,
            keep_indices: raw.keep_indices,
            usage_flags: raw.usage_flags,
            cooking_options: raw.cooking_options,
        },
        mesh_metrics: raw.mesh_metrics,
        stream_data: raw.stream_data.clone(),
        warnings,
        ..record
    })
}
