//! Version-gated field layout of a Mesh object
//!
//! The serialized layout of `Mesh` changed in many engine releases. Rather
//! than one type per layout, the fields are listed once in
//! [`MESH_READ_PLAN`], each with the [`Gate`] deciding whether it is present.
//! The decoder walks the plan in order.

use super::compressed::CompressedMesh;
use super::types::{
    Aabb, BlendShape, BlendShapeChannel, BlendShapeData, BlendShapeVertex, BoneWeights4,
    MinMaxAabb, StreamingInfo, SubMesh,
};
use super::vertex_data::VertexData;
use super::version::UnityVersion;
use crate::binary::ByteCursor;
use crate::error::Result;

/// Condition for a field to be serialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    Always,
    /// `version >= major.minor`
    Since(u32, u32),
    /// `version < major.minor`
    Before(u32, u32),
    /// `since <= version < before`
    Between((u32, u32), (u32, u32)),
    /// `m_IndexFormat`: 2017.4 on, or 2017.3 when uncompressed or a 2017.3.1 patch build.
    IndexFormat,
    /// `m_CompressedMesh`: only when `m_MeshCompression` is non-zero, unless
    /// the object's type information says the structure is always stored.
    CompressedMesh,
}

/// State the gates look at besides the version.
#[derive(Debug, Clone, Copy, Default)]
pub struct GateContext {
    pub mesh_compression: u8,
    pub compressed_mesh_always_serialized: bool,
}

impl Gate {
    #[must_use]
    pub fn applies(self, version: &UnityVersion, context: GateContext) -> bool {
        match self {
            Gate::Always => true,
            Gate::Since(major, minor) => version.at_least(major, minor),
            Gate::Before(major, minor) => version.before(major, minor),
            Gate::Between((a, b), (c, d)) => version.at_least(a, b) && version.before(c, d),
            Gate::IndexFormat => {
                version.at_least(2017, 4)
                    || (version.major == 2017
                        && version.minor == 3
                        && (context.mesh_compression == 0
                            || (version.patch >= 1 && version.is_patch_build())))
            }
            Gate::CompressedMesh => {
                context.mesh_compression != 0 || context.compressed_mesh_always_serialized
            }
        }
    }
}

type ReadFn = for<'r, 'a> fn(&'r mut MeshReader<'a>) -> Result<()>;

/// One entry of the read plan.
pub struct Step {
    pub field: &'static str,
    pub gate: Gate,
    read: ReadFn,
}

/// Every `Mesh` field in serialization order.
#[rustfmt::skip]
pub const MESH_READ_PLAN: &[Step] = &[
    Step { field: "m_Name", gate: Gate::Always, read: read_name },
    Step { field: "m_Use16BitIndices", gate: Gate::Before(3, 5), read: read_use_16bit_indices },
    Step { field: "m_SubMeshes", gate: Gate::Always, read: read_submeshes },
    Step { field: "m_Shapes", gate: Gate::Since(4, 1), read: read_shapes },
    Step { field: "m_BindPose", gate: Gate::Since(4, 3), read: read_bind_pose },
    Step { field: "m_BoneNameHashes", gate: Gate::Since(4, 3), read: read_bone_name_hashes },
    Step { field: "m_RootBoneNameHash", gate: Gate::Since(4, 3), read: read_root_bone_name_hash },
    Step { field: "m_BonesAABB", gate: Gate::Since(2019, 0), read: read_bones_aabb },
    Step {
        field: "m_VariableBoneCountWeights",
        gate: Gate::Since(2019, 0),
        read: read_variable_bone_count_weights,
    },
    Step { field: "m_MeshCompression", gate: Gate::Always, read: read_mesh_compression },
    Step { field: "m_StreamCompression", gate: Gate::Between((4, 0), (5, 0)), read: read_stream_compression },
    Step { field: "m_IsReadable", gate: Gate::Since(4, 0), read: read_readable_flags },
    Step { field: "align", gate: Gate::Always, read: align },
    Step { field: "m_IndexFormat", gate: Gate::IndexFormat, read: read_index_format },
    Step { field: "m_IndexBuffer", gate: Gate::Always, read: read_index_buffer },
    Step { field: "m_Skin", gate: Gate::Before(2018, 2), read: read_skin },
    // 4.0 - 4.2 store the bind poses after the skin instead
    Step { field: "m_BindPose", gate: Gate::Between((4, 0), (4, 3)), read: read_bind_pose },
    Step { field: "m_VertexData", gate: Gate::Always, read: read_vertex_data },
    Step { field: "m_CompressedMesh", gate: Gate::CompressedMesh, read: read_compressed_mesh },
    Step { field: "m_LocalAABB", gate: Gate::Always, read: read_local_aabb },
    Step { field: "m_MeshUsageFlags", gate: Gate::Since(5, 0), read: read_usage_flags },
    Step { field: "m_CookingOptions", gate: Gate::Since(2022, 1), read: read_cooking_options },
    Step { field: "m_BakedConvexCollisionMesh", gate: Gate::Since(5, 0), read: skip_byte_array },
    Step { field: "m_BakedTriangleCollisionMesh", gate: Gate::Since(5, 0), read: skip_byte_array },
    Step { field: "m_MeshMetrics", gate: Gate::Since(2018, 2), read: read_mesh_metrics },
    Step { field: "m_StreamData", gate: Gate::Since(2018, 3), read: read_stream_data },
];

/// Names of the fields read for `version`, in order.
#[must_use]
pub fn fields_for(version: &UnityVersion, context: GateContext) -> Vec<&'static str> {
    MESH_READ_PLAN
        .iter()
        .filter(|step| step.gate.applies(version, context))
        .map(|step| step.field)
        .collect()
}

/// Fields of a Mesh object as read, before attribute decoding.
#[derive(Debug, Default)]
pub(crate) struct RawMesh<'a> {
    pub name: String,
    pub use_16bit_indices: Option<bool>,
    pub submeshes: Vec<SubMesh>,
    pub shapes: Option<BlendShapeData>,
    pub bind_pose: Vec<[f32; 16]>,
    pub bone_name_hashes: Vec<u32>,
    pub root_bone_name_hash: Option<u32>,
    pub bones_aabb: Vec<MinMaxAabb>,
    pub variable_bone_count_weights: Vec<u32>,
    pub mesh_compression: u8,
    pub stream_compression: Option<u8>,
    pub is_readable: Option<bool>,
    pub keep_vertices: Option<bool>,
    pub keep_indices: Option<bool>,
    pub index_format: Option<i32>,
    pub index_buffer: &'a [u8],
    pub skin: Vec<BoneWeights4>,
    pub vertex_data: VertexData<'a>,
    pub compressed_mesh: Option<CompressedMesh<'a>>,
    pub local_aabb: Aabb,
    pub usage_flags: Option<i32>,
    pub cooking_options: Option<i32>,
    pub mesh_metrics: Option<[f32; 2]>,
    pub stream_data: Option<StreamingInfo>,
    /// Fields in the order they were read.
    pub fields_read: Vec<&'static str>,
}

pub(crate) struct MeshReader<'a> {
    pub cursor: ByteCursor<'a>,
    pub version: UnityVersion,
    pub compressed_mesh_always_serialized: bool,
    pub mesh: RawMesh<'a>,
}

impl<'a> MeshReader<'a> {
    pub(crate) fn new(cursor: ByteCursor<'a>, version: UnityVersion) -> Self {
        Self {
            cursor,
            version,
            compressed_mesh_always_serialized: false,
            mesh: RawMesh::default(),
        }
    }

    fn context(&self) -> GateContext {
        GateContext {
            mesh_compression: self.mesh.mesh_compression,
            compressed_mesh_always_serialized: self.compressed_mesh_always_serialized,
        }
    }

    /// Walk [`MESH_READ_PLAN`].
    pub(crate) fn read(mut self) -> Result<(RawMesh<'a>, ByteCursor<'a>)> {
        for step in MESH_READ_PLAN {
            if !step.gate.applies(&self.version, self.context()) {
                continue;
            }
            tracing::trace!("mesh field {} at {}", step.field, self.cursor.position());
            (step.read)(&mut self)?;
            self.mesh.fields_read.push(step.field);
        }
        Ok((self.mesh, self.cursor))
    }
}

fn read_matrix(cursor: &mut ByteCursor<'_>) -> Result<[f32; 16]> {
    cursor.read_f32_array::<16>()
}

fn read_aabb(cursor: &mut ByteCursor<'_>) -> Result<Aabb> {
    Ok(Aabb {
        center: cursor.read_f32_array()?,
        extent: cursor.read_f32_array()?,
    })
}

fn read_name(r: &mut MeshReader<'_>) -> Result<()> {
    r.mesh.name = r.cursor.read_aligned_string()?;
    Ok(())
}

fn read_use_16bit_indices(r: &mut MeshReader<'_>) -> Result<()> {
    r.mesh.use_16bit_indices = Some(r.cursor.read_i32()? > 0);
    Ok(())
}

fn read_submeshes(r: &mut MeshReader<'_>) -> Result<()> {
    let version = r.version.clone();
    r.mesh.submeshes = r.cursor.read_vec(12, |c| {
        let first_byte = c.read_u32()?;
        let index_count = c.read_u32()?;
        let topology = c.read_i32()?;
        let triangle_count = if version.before(4, 0) {
            Some(c.read_u32()?)
        } else {
            None
        };
        let base_vertex = if version.at_least(2017, 3) { c.read_u32()? } else { 0 };
        let (first_vertex, vertex_count, local_aabb) = if version.at_least(3, 0) {
            (c.read_u32()?, c.read_u32()?, read_aabb(c)?)
        } else {
            (0, 0, Aabb::default())
        };
        Ok(SubMesh {
            first_byte,
            index_count,
            topology,
            triangle_count,
            base_vertex,
            first_vertex,
            vertex_count,
            local_aabb,
            triangles: Vec::new(),
        })
    })?;
    Ok(())
}

fn read_shapes(r: &mut MeshReader<'_>) -> Result<()> {
    let version = r.version.clone();
    let c = &mut r.cursor;
    let read_vertex = |c: &mut ByteCursor<'_>| -> Result<BlendShapeVertex> {
        Ok(BlendShapeVertex {
            vertex: c.read_f32_array()?,
            normal: c.read_f32_array()?,
            tangent: c.read_f32_array()?,
            index: c.read_u32()?,
        })
    };
    let read_shape = |c: &mut ByteCursor<'_>| -> Result<BlendShape> {
        let legacy = version.before(4, 3);
        let name = if legacy {
            Some(c.read_aligned_string()?)
        } else {
            None
        };
        let first_vertex = c.read_u32()?;
        let vertex_count = c.read_u32()?;
        if legacy {
            // aabb min and max delta
            c.skip(24)?;
        }
        let has_normals = c.read_bool()?;
        let has_tangents = c.read_bool()?;
        if !legacy {
            c.align(4);
        }
        Ok(BlendShape {
            name,
            first_vertex,
            vertex_count,
            has_normals,
            has_tangents,
        })
    };

    let shapes = if version.at_least(4, 3) {
        let vertices = c.read_vec(40, read_vertex)?;
        let shapes = c.read_vec(12, read_shape)?;
        let channels = c.read_vec(16, |c| {
            Ok(BlendShapeChannel {
                name: c.read_aligned_string()?,
                name_hash: c.read_u32()?,
                frame_index: c.read_i32()?,
                frame_count: c.read_i32()?,
            })
        })?;
        let full_weights = c.read_vec(4, ByteCursor::read_f32)?;
        BlendShapeData {
            vertices,
            shapes,
            channels,
            full_weights,
        }
    } else {
        let shapes = c.read_vec(14, read_shape)?;
        c.align(4);
        let vertices = c.read_vec(40, read_vertex)?;
        BlendShapeData {
            vertices,
            shapes,
            ..BlendShapeData::default()
        }
    };
    r.mesh.shapes = Some(shapes);
    Ok(())
}

fn read_bind_pose(r: &mut MeshReader<'_>) -> Result<()> {
    r.mesh.bind_pose = r.cursor.read_vec(64, read_matrix)?;
    Ok(())
}

fn read_bone_name_hashes(r: &mut MeshReader<'_>) -> Result<()> {
    r.mesh.bone_name_hashes = r.cursor.read_vec(4, ByteCursor::read_u32)?;
    Ok(())
}

fn read_root_bone_name_hash(r: &mut MeshReader<'_>) -> Result<()> {
    r.mesh.root_bone_name_hash = Some(r.cursor.read_u32()?);
    Ok(())
}

fn read_bones_aabb(r: &mut MeshReader<'_>) -> Result<()> {
    r.mesh.bones_aabb = r.cursor.read_vec(24, |c| {
        Ok(MinMaxAabb {
            min: c.read_f32_array()?,
            max: c.read_f32_array()?,
        })
    })?;
    Ok(())
}

fn read_variable_bone_count_weights(r: &mut MeshReader<'_>) -> Result<()> {
    r.mesh.variable_bone_count_weights = r.cursor.read_vec(4, ByteCursor::read_u32)?;
    Ok(())
}

fn read_mesh_compression(r: &mut MeshReader<'_>) -> Result<()> {
    r.mesh.mesh_compression = r.cursor.read_u8()?;
    Ok(())
}

fn read_stream_compression(r: &mut MeshReader<'_>) -> Result<()> {
    r.mesh.stream_compression = Some(r.cursor.read_u8()?);
    Ok(())
}

fn read_readable_flags(r: &mut MeshReader<'_>) -> Result<()> {
    r.mesh.is_readable = Some(r.cursor.read_bool()?);
    r.mesh.keep_vertices = Some(r.cursor.read_bool()?);
    r.mesh.keep_indices = Some(r.cursor.read_bool()?);
    Ok(())
}

fn align(r: &mut MeshReader<'_>) -> Result<()> {
    r.cursor.align(4);
    Ok(())
}

fn read_index_format(r: &mut MeshReader<'_>) -> Result<()> {
    r.mesh.index_format = Some(r.cursor.read_i32()?);
    Ok(())
}

fn read_index_buffer(r: &mut MeshReader<'_>) -> Result<()> {
    r.mesh.index_buffer = r.cursor.read_aligned_byte_array()?;
    Ok(())
}

fn read_skin(r: &mut MeshReader<'_>) -> Result<()> {
    r.mesh.skin = r.cursor.read_vec(32, |c| {
        let weights = c.read_f32_array()?;
        let mut bone_indices = [0u32; 4];
        for index in &mut bone_indices {
            *index = c.read_i32()?.max(0) as u32;
        }
        Ok(BoneWeights4 {
            weights,
            bone_indices,
        })
    })?;
    r.cursor.align(4);
    Ok(())
}

fn read_vertex_data(r: &mut MeshReader<'_>) -> Result<()> {
    r.mesh.vertex_data = VertexData::read(&mut r.cursor, &r.version)?;
    Ok(())
}

/// Read the structure; keep it only when the mesh is compressed. When it is
/// stored for an uncompressed mesh it is stepped over without unpacking.
fn read_compressed_mesh(r: &mut MeshReader<'_>) -> Result<()> {
    let compressed = CompressedMesh::read(&mut r.cursor, &r.version)?;
    if r.mesh.mesh_compression != 0 {
        r.mesh.compressed_mesh = Some(compressed);
    }
    Ok(())
}

fn read_local_aabb(r: &mut MeshReader<'_>) -> Result<()> {
    r.mesh.local_aabb = read_aabb(&mut r.cursor)?;
    Ok(())
}

fn read_usage_flags(r: &mut MeshReader<'_>) -> Result<()> {
    r.mesh.usage_flags = Some(r.cursor.read_i32()?);
    Ok(())
}

fn read_cooking_options(r: &mut MeshReader<'_>) -> Result<()> {
    r.mesh.cooking_options = Some(r.cursor.read_i32()?);
    Ok(())
}

fn skip_byte_array(r: &mut MeshReader<'_>) -> Result<()> {
    r.cursor.read_aligned_byte_array()?;
    Ok(())
}

fn read_mesh_metrics(r: &mut MeshReader<'_>) -> Result<()> {
    r.mesh.mesh_metrics = Some(r.cursor.read_f32_array()?);
    Ok(())
}

fn read_stream_data(r: &mut MeshReader<'_>) -> Result<()> {
    let c = &mut r.cursor;
    c.align(4);
    let offset = if r.version.at_least(2020, 0) {
        c.read_u64()?
    } else {
        u64::from(c.read_u32()?)
    };
    let size = c.read_u32()?;
    let path = c.read_aligned_string()?;
    r.mesh.stream_data = Some(StreamingInfo { offset, size, path });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> UnityVersion {
        s.parse().unwrap()
    }

    #[test]
    fn test_version_3_never_reads_bind_poses() {
        let fields = fields_for(&v("3.4.2f1"), GateContext::default());
        assert!(fields.contains(&"m_Use16BitIndices"));
        assert!(!fields.contains(&"m_BindPose"));
        assert!(!fields.contains(&"m_Shapes"));
        assert!(!fields.contains(&"m_IndexFormat"));
        assert!(fields.contains(&"m_Skin"));
    }

    #[test]
    fn test_index_format_gate() {
        let uncompressed = GateContext::default();
        let compressed = GateContext {
            mesh_compression: 1,
            ..GateContext::default()
        };
        assert!(!Gate::IndexFormat.applies(&v("2017.2.0f3"), uncompressed));
        assert!(Gate::IndexFormat.applies(&v("2017.3.0f3"), uncompressed));
        assert!(!Gate::IndexFormat.applies(&v("2017.3.0f3"), compressed));
        assert!(Gate::IndexFormat.applies(&v("2017.3.1p1"), compressed));
        assert!(Gate::IndexFormat.applies(&v("2017.4.0f1"), compressed));
        assert!(Gate::IndexFormat.applies(&v("2019.4.31f1"), compressed));
    }

    #[test]
    fn test_compressed_mesh_gate() {
        let version = v("2019.4.31f1");
        assert!(!fields_for(&version, GateContext::default()).contains(&"m_CompressedMesh"));
        let compressed = GateContext {
            mesh_compression: 2,
            ..GateContext::default()
        };
        assert!(fields_for(&version, compressed).contains(&"m_CompressedMesh"));
        let always = GateContext {
            compressed_mesh_always_serialized: true,
            ..GateContext::default()
        };
        assert!(fields_for(&version, always).contains(&"m_CompressedMesh"));
    }

    #[test]
    fn test_modern_layout_order() {
        let fields = fields_for(&v("2022.3.10f1"), GateContext::default());
        assert_eq!(
            fields,
            vec![
                "m_Name",
                "m_SubMeshes",
                "m_Shapes",
                "m_BindPose",
                "m_BoneNameHashes",
                "m_RootBoneNameHash",
                "m_BonesAABB",
                "m_VariableBoneCountWeights",
                "m_MeshCompression",
                "m_IsReadable",
                "align",
                "m_IndexFormat",
                "m_IndexBuffer",
                "m_VertexData",
                "m_LocalAABB",
                "m_MeshUsageFlags",
                "m_CookingOptions",
                "m_BakedConvexCollisionMesh",
                "m_BakedTriangleCollisionMesh",
                "m_MeshMetrics",
                "m_StreamData",
            ]
        );
    }

    #[test]
    fn test_bind_pose_position_moves_in_4_3() {
        let position = |version: &str, field: &str| {
            fields_for(&v(version), GateContext::default())
                .iter()
                .position(|f| *f == field)
                .unwrap()
        };
        assert!(position("4.2.2f1", "m_BindPose") > position("4.2.2f1", "m_Skin"));
        assert!(position("4.3.0f4", "m_BindPose") < position("4.3.0f4", "m_Skin"));
        let fields = fields_for(&v("4.2.2f1"), GateContext::default());
        assert_eq!(fields.iter().filter(|f| **f == "m_BindPose").count(), 1);
    }

    #[test]
    fn test_stream_compression_only_in_4x() {
        assert!(fields_for(&v("4.7.2f1"), GateContext::default()).contains(&"m_StreamCompression"));
        let fields = fields_for(&v("5.0.0f4"), GateContext::default());
        assert!(!fields.contains(&"m_StreamCompression"));
    }
}
