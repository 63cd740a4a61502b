//! `m_CompressedMesh`: quantized vertex attributes and indices

use glam::{Vec2, Vec3};

use super::packed::{unpack_floats, PackedFloatVector, PackedIntVector};
use super::types::{BoneWeights4, UvSet};
use super::version::UnityVersion;
use crate::binary::ByteCursor;
use crate::error::Result;

const UV_INFO_BITS: u32 = 4;
const UV_DIMENSION_MASK: u32 = 3;
const UV_CHANNEL_EXISTS: u32 = 4;
const MAX_UV_CHANNELS: u32 = 8;
/// Skin weights are quantized so that a vertex's weights sum to this.
const WEIGHT_SUM: u32 = 31;

#[derive(Debug, Clone, Default)]
pub(crate) struct CompressedMesh<'a> {
    pub vertices: PackedFloatVector<'a>,
    pub uv: PackedFloatVector<'a>,
    pub bind_poses: Option<PackedFloatVector<'a>>,
    pub normals: PackedFloatVector<'a>,
    pub tangents: PackedFloatVector<'a>,
    pub weights: PackedIntVector<'a>,
    pub normal_signs: PackedIntVector<'a>,
    pub tangent_signs: PackedIntVector<'a>,
    pub float_colors: Option<PackedFloatVector<'a>>,
    pub bone_indices: PackedIntVector<'a>,
    pub triangles: PackedIntVector<'a>,
    pub colors: Option<PackedIntVector<'a>>,
    pub uv_info: Option<u32>,
}

/// Attributes recovered from a compressed mesh. Empty fields were not stored.
#[derive(Debug, Default)]
pub(crate) struct Decompressed {
    pub positions: Vec<f32>,
    pub uv_sets: Vec<UvSet>,
    pub bind_poses: Vec<[f32; 16]>,
    pub normals: Option<Vec<f32>>,
    pub tangents: Option<Vec<f32>>,
    pub colors: Option<Vec<f32>>,
    pub skin: Option<Vec<BoneWeights4>>,
    pub triangles: Option<Vec<u32>>,
}

impl<'a> CompressedMesh<'a> {
    pub(crate) fn read(cursor: &mut ByteCursor<'a>, version: &UnityVersion) -> Result<Self> {
        let vertices = PackedFloatVector::read(cursor)?;
        let uv = PackedFloatVector::read(cursor)?;
        let bind_poses = if version.before(5, 0) {
            Some(PackedFloatVector::read(cursor)?)
        } else {
            None
        };
        let normals = PackedFloatVector::read(cursor)?;
        let tangents = PackedFloatVector::read(cursor)?;
        let weights = PackedIntVector::read(cursor)?;
        let normal_signs = PackedIntVector::read(cursor)?;
        let tangent_signs = PackedIntVector::read(cursor)?;
        let float_colors = if version.at_least(5, 0) {
            Some(PackedFloatVector::read(cursor)?)
        } else {
            None
        };
        let bone_indices = PackedIntVector::read(cursor)?;
        let triangles = PackedIntVector::read(cursor)?;

        let (colors, uv_info) = if version.at_least(5, 0) {
            (None, Some(cursor.read_u32()?))
        } else if version.at_least(3, 5) {
            (Some(PackedIntVector::read(cursor)?), None)
        } else {
            (None, None)
        };

        Ok(Self {
            vertices,
            uv,
            bind_poses,
            normals,
            tangents,
            weights,
            normal_signs,
            tangent_signs,
            float_colors,
            bone_indices,
            triangles,
            colors,
            uv_info,
        })
    }

    pub(crate) fn decompress(&self) -> Result<Decompressed> {
        let mut out = Decompressed::default();
        let vertex_count = self.vertices.num_items as usize / 3;

        if self.vertices.num_items > 0 {
            out.positions = unpack_floats(&self.vertices, 3, 12, 0, vertex_count)?;
        }
        if self.uv.num_items > 0 {
            out.uv_sets = self.decompress_uvs(vertex_count)?;
        }
        if let Some(bind_poses) = self.bind_poses.as_ref().filter(|b| b.num_items > 0) {
            let values = unpack_floats(bind_poses, 16, 64, 0, bind_poses.num_items as usize / 16)?;
            out.bind_poses = values
                .chunks_exact(16)
                .map(|m| {
                    let mut matrix = [0.0; 16];
                    matrix.copy_from_slice(m);
                    matrix
                })
                .collect();
        }
        if self.normals.num_items > 0 {
            out.normals = Some(self.decompress_normals()?);
        }
        if self.tangents.num_items > 0 {
            out.tangents = Some(self.decompress_tangents()?);
        }
        if let Some(colors) = self.float_colors.as_ref().filter(|c| c.num_items > 0) {
            out.colors = Some(colors.unpack()?);
        }
        if self.weights.num_items > 0 {
            out.skin = Some(self.decompress_skin(vertex_count)?);
        }
        if self.triangles.num_items > 0 {
            out.triangles = Some(self.triangles.unpack()?);
        }
        if let Some(colors) = self.colors.as_ref().filter(|c| c.num_items > 0) {
            // one item per channel byte
            let expanded = PackedIntVector {
                num_items: colors.num_items.saturating_mul(4),
                data: colors.data,
                bit_size: colors.bit_size / 4,
            };
            out.colors = Some(expanded.unpack()?.into_iter().map(|c| c as f32 / 255.0).collect());
        }

        Ok(out)
    }

    fn decompress_uvs(&self, vertex_count: usize) -> Result<Vec<UvSet>> {
        let mut sets = Vec::new();
        match self.uv_info.filter(|info| *info != 0) {
            Some(info) => {
                let mut offset = 0;
                for set in 0..MAX_UV_CHANNELS {
                    let bits = (info >> (set * UV_INFO_BITS)) & ((1 << UV_INFO_BITS) - 1);
                    if bits & UV_CHANNEL_EXISTS == 0 {
                        continue;
                    }
                    let dimension = 1 + (bits & UV_DIMENSION_MASK) as usize;
                    let stride = dimension * 4;
                    let data = unpack_floats(&self.uv, dimension, stride, offset, vertex_count)?;
                    sets.push(UvSet {
                        set: set as u8,
                        dimension: dimension as u8,
                        data,
                    });
                    offset += dimension * vertex_count;
                }
            }
            None => {
                sets.push(UvSet {
                    set: 0,
                    dimension: 2,
                    data: unpack_floats(&self.uv, 2, 8, 0, vertex_count)?,
                });
                if self.uv.num_items as usize >= vertex_count * 4 {
                    sets.push(UvSet {
                        set: 1,
                        dimension: 2,
                        data: unpack_floats(&self.uv, 2, 8, vertex_count * 2, vertex_count)?,
                    });
                }
            }
        }
        Ok(sets)
    }

    fn decompress_normals(&self) -> Result<Vec<f32>> {
        let count = self.normals.num_items as usize / 2;
        let xy = unpack_floats(&self.normals, 2, 8, 0, count)?;
        let signs = self.normal_signs.unpack()?;

        let mut normals = Vec::with_capacity(count * 3);
        for (i, pair) in xy.chunks_exact(2).enumerate() {
            let flip = signs.get(i).copied().unwrap_or(1) == 0;
            let n = reconstruct_unit(Vec2::new(pair[0], pair[1]), flip);
            normals.extend_from_slice(&n.to_array());
        }
        Ok(normals)
    }

    fn decompress_tangents(&self) -> Result<Vec<f32>> {
        let count = self.tangents.num_items as usize / 2;
        let xy = unpack_floats(&self.tangents, 2, 8, 0, count)?;
        let signs = self.tangent_signs.unpack()?;

        let mut tangents = Vec::with_capacity(count * 4);
        for (i, pair) in xy.chunks_exact(2).enumerate() {
            let flip = signs.get(i * 2).copied().unwrap_or(1) == 0;
            let t = reconstruct_unit(Vec2::new(pair[0], pair[1]), flip);
            let w = if signs.get(i * 2 + 1).copied().unwrap_or(1) > 0 {
                1.0
            } else {
                -1.0
            };
            tangents.extend_from_slice(&t.extend(w).to_array());
        }
        Ok(tangents)
    }

    /// Weights are stored per influence and close a vertex once they reach
    /// [`WEIGHT_SUM`]; after three open influences the fourth is implied.
    fn decompress_skin(&self, vertex_count: usize) -> Result<Vec<BoneWeights4>> {
        let weights = self.weights.unpack()?;
        let bone_indices = self.bone_indices.unpack()?;
        let mut indices = bone_indices.iter().copied();
        // every vertex closes with at least one stored weight
        let mut skin = vec![BoneWeights4::default(); vertex_count.min(weights.len())];

        let mut vertex = 0;
        let mut slot = 0;
        let mut sum = 0;
        for weight in weights {
            let Some(entry) = skin.get_mut(vertex) else {
                break;
            };
            entry.weights[slot] = weight as f32 / WEIGHT_SUM as f32;
            entry.bone_indices[slot] = indices.next().unwrap_or(0);
            slot += 1;
            sum += weight;

            if sum >= WEIGHT_SUM {
                vertex += 1;
                slot = 0;
                sum = 0;
            } else if slot == 3 {
                entry.weights[3] = (WEIGHT_SUM - sum) as f32 / WEIGHT_SUM as f32;
                entry.bone_indices[3] = indices.next().unwrap_or(0);
                vertex += 1;
                slot = 0;
                sum = 0;
            }
        }
        Ok(skin)
    }
}

/// Rebuild a unit vector from its x and y components.
fn reconstruct_unit(xy: Vec2, negative_z: bool) -> Vec3 {
    let z_squared = 1.0 - xy.length_squared();
    let mut v = if z_squared >= 0.0 {
        xy.extend(z_squared.sqrt())
    } else {
        xy.extend(0.0).normalize_or_zero()
    };
    if negative_z {
        v.z = -v.z;
    }
    v
}
