//! Mesh object structures and the decoded [`GeometryRecord`]

use glam::Vec3;
use serde::Serialize;

use crate::bundle::resource_name;
use crate::diagnostics::Warning;

use super::vertex_data::{ChannelInfo, StreamInfo};

/// Axis-aligned box stored as center and half extent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Aabb {
    pub center: [f32; 3],
    pub extent: [f32; 3],
}

impl Aabb {
    #[must_use]
    pub fn min(&self) -> Vec3 {
        Vec3::from(self.center) - Vec3::from(self.extent)
    }

    #[must_use]
    pub fn max(&self) -> Vec3 {
        Vec3::from(self.center) + Vec3::from(self.extent)
    }

    /// Box enclosing `positions` (xyz triples). Empty input gives a zero box.
    #[must_use]
    pub fn from_positions(positions: &[f32]) -> Self {
        let mut points = positions.chunks_exact(3).map(Vec3::from_slice);
        let Some(first) = points.next() else {
            return Self::default();
        };
        let (min, max) = points.fold((first, first), |(lo, hi), p| (lo.min(p), hi.max(p)));
        Self {
            center: ((min + max) * 0.5).to_array(),
            extent: ((max - min) * 0.5).to_array(),
        }
    }
}

/// Box stored as explicit corners (`m_BonesAABB`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MinMaxAabb {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

/// Primitive topology of a submesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Topology {
    Triangles,
    TriangleStrip,
    Quads,
    Lines,
    LineStrip,
    Points,
    Unknown(i32),
}

impl From<i32> for Topology {
    fn from(value: i32) -> Self {
        match value {
            0 => Topology::Triangles,
            1 => Topology::TriangleStrip,
            2 => Topology::Quads,
            3 => Topology::Lines,
            4 => Topology::LineStrip,
            5 => Topology::Points,
            other => Topology::Unknown(other),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SubMesh {
    pub first_byte: u32,
    pub index_count: u32,
    /// Raw topology code, see [`Topology`].
    pub topology: i32,
    /// Only serialized before 4.0.
    pub triangle_count: Option<u32>,
    pub base_vertex: u32,
    pub first_vertex: u32,
    pub vertex_count: u32,
    pub local_aabb: Aabb,
    /// Resolved triangle list (`base_vertex` applied), filled during decode.
    pub triangles: Vec<u32>,
}

impl SubMesh {
    #[must_use]
    pub fn topology(&self) -> Topology {
        Topology::from(self.topology)
    }
}

/// Per-vertex skinning: up to four bone influences.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct BoneWeights4 {
    pub weights: [f32; 4],
    pub bone_indices: [u32; 4],
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BlendShapeVertex {
    pub vertex: [f32; 3],
    pub normal: [f32; 3],
    pub tangent: [f32; 3],
    pub index: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BlendShape {
    /// Only serialized before 4.3.
    pub name: Option<String>,
    pub first_vertex: u32,
    pub vertex_count: u32,
    pub has_normals: bool,
    pub has_tangents: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BlendShapeChannel {
    pub name: String,
    pub name_hash: u32,
    pub frame_index: i32,
    pub frame_count: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BlendShapeData {
    pub vertices: Vec<BlendShapeVertex>,
    pub shapes: Vec<BlendShape>,
    pub channels: Vec<BlendShapeChannel>,
    pub full_weights: Vec<f32>,
}

/// Where out-of-object vertex data lives (`m_StreamData`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StreamingInfo {
    pub offset: u64,
    pub size: u32,
    pub path: String,
}

impl StreamingInfo {
    /// `true` when the vertex data must be fetched from a resource node.
    #[must_use]
    pub fn has_stream(&self) -> bool {
        !self.path.is_empty() && self.size > 0
    }

    /// The resource file name without any `archive:/CAB-xxx/` prefix.
    #[must_use]
    pub fn resource_name(&self) -> &str {
        resource_name(&self.path)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum IndexFormat {
    #[default]
    UInt16,
    UInt32,
}

impl IndexFormat {
    #[must_use]
    pub fn size(self) -> usize {
        match self {
            IndexFormat::UInt16 => 2,
            IndexFormat::UInt32 => 4,
        }
    }
}

/// One decoded texture coordinate set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UvSet {
    /// Texture coordinate slot (`uv0` is 0).
    pub set: u8,
    /// Components per vertex (2 for ordinary UVs).
    pub dimension: u8,
    pub data: Vec<f32>,
}

/// Vertex layout as stored in the object, kept for diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VertexLayout {
    /// Only serialized before 2018.
    pub current_channels: Option<u32>,
    pub vertex_count: u32,
    pub channels: Vec<ChannelInfo>,
    pub streams: Vec<StreamInfo>,
    /// Length of the inline vertex data (0 when streamed).
    pub data_size: usize,
}

/// Flags and options stored next to the geometry, each present only in the
/// versions that serialize it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MeshFlags {
    pub stream_compression: Option<u8>,
    pub is_readable: Option<bool>,
    pub keep_vertices: Option<bool>,
    pub keep_indices: Option<bool>,
    pub usage_flags: Option<i32>,
    pub cooking_options: Option<i32>,
}

/// Flat, render-ready geometry decoded from a Mesh object.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GeometryRecord {
    pub name: String,
    pub vertex_count: usize,
    /// xyz triples.
    pub positions: Vec<f32>,
    pub normals: Option<Vec<f32>>,
    /// xyzw quadruples.
    pub tangents: Option<Vec<f32>>,
    /// rgba quadruples in `0.0..=1.0`.
    pub colors: Option<Vec<f32>>,
    pub uv_sets: Vec<UvSet>,
    pub skin: Option<Vec<BoneWeights4>>,
    pub bind_poses: Vec<[f32; 16]>,
    pub bone_name_hashes: Vec<u32>,
    pub root_bone_name_hash: Option<u32>,
    pub bones_aabb: Vec<MinMaxAabb>,
    pub variable_bone_count_weights: Vec<u32>,
    pub blend_shapes: Option<BlendShapeData>,
    pub index_format: IndexFormat,
    /// The whole index buffer widened to `u32`.
    pub indices: Vec<u32>,
    pub submeshes: Vec<SubMesh>,
    pub bounds: Aabb,
    pub mesh_compression: u8,
    pub layout: VertexLayout,
    /// Byte length of `m_IndexBuffer` as stored.
    pub index_buffer_size: usize,
    /// Raw `m_IndexFormat`, when serialized.
    pub index_format_field: Option<i32>,
    /// Raw `m_Use16BitIndices`, when serialized.
    pub use_16bit_indices: Option<bool>,
    pub flags: MeshFlags,
    pub mesh_metrics: Option<[f32; 2]>,
    pub stream_data: Option<StreamingInfo>,
    pub warnings: Vec<Warning>,
}

impl GeometryRecord {
    #[must_use]
    pub fn uv(&self, set: u8) -> Option<&UvSet> {
        self.uv_sets.iter().find(|uv| uv.set == set)
    }

    #[must_use]
    pub fn has_normals(&self) -> bool {
        self.normals.as_ref().is_some_and(|n| !n.is_empty())
    }

    /// Every submesh triangle list concatenated.
    #[must_use]
    pub fn triangles(&self) -> Vec<u32> {
        self.submeshes.iter().flat_map(|s| s.triangles.iter().copied()).collect()
    }

    /// Positions plus at least one triangle.
    #[must_use]
    pub fn is_renderable(&self) -> bool {
        !self.positions.is_empty() && self.submeshes.iter().any(|s| !s.triangles.is_empty())
    }
}
