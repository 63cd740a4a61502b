//! Index buffer decoding and per-submesh triangle lists

use super::types::{IndexFormat, SubMesh, Topology};
use crate::binary::{ByteCursor, Endianness};
use crate::diagnostics::Warning;
use crate::error::Result;

/// Reinterpret raw index bytes as `u16` or `u32` values.
pub(crate) fn decode_index_buffer(
    bytes: &[u8],
    format: IndexFormat,
    endian: Endianness,
) -> Result<Vec<u32>> {
    let mut cursor = ByteCursor::new(bytes, endian);
    let count = bytes.len() / format.size();
    let mut indices = Vec::with_capacity(count);
    for _ in 0..count {
        indices.push(match format {
            IndexFormat::UInt16 => u32::from(cursor.read_u16()?),
            IndexFormat::UInt32 => cursor.read_u32()?,
        });
    }
    Ok(indices)
}

/// Expand a triangle strip. Odd triangles have their winding flipped and
/// degenerate triangles are dropped.
#[must_use]
pub fn destripify(strip: &[u32]) -> Vec<u32> {
    let mut triangles = Vec::with_capacity(strip.len().saturating_sub(2) * 3);
    for (i, window) in strip.windows(3).enumerate() {
        let (a, b, c) = (window[0], window[1], window[2]);
        if a == b || a == c || b == c {
            continue;
        }
        if i % 2 == 1 {
            triangles.extend_from_slice(&[b, a, c]);
        } else {
            triangles.extend_from_slice(&[a, b, c]);
        }
    }
    triangles
}

/// Split each quad `a b c d` into `a b c` and `a c d`.
#[must_use]
pub fn split_quads(quads: &[u32]) -> Vec<u32> {
    quads
        .chunks_exact(4)
        .flat_map(|q| [q[0], q[1], q[2], q[0], q[2], q[3]])
        .collect()
}

/// Fill `submesh.triangles` for every submesh from the decoded index buffer.
///
/// `index_size` is the stored width of one index in bytes, used to turn
/// `first_byte` into an index position. Before 4.0 every submesh is a strip.
pub(crate) fn assign_triangles(
    submeshes: &mut [SubMesh],
    indices: &[u32],
    index_size: usize,
    strips_only: bool,
    warnings: &mut Vec<Warning>,
) {
    for (n, submesh) in submeshes.iter_mut().enumerate() {
        let first_index = submesh.first_byte as usize / index_size;
        let index_count = submesh.index_count as usize;
        let Some(range) = first_index
            .checked_add(index_count)
            .and_then(|end| indices.get(first_index..end))
        else {
            tracing::warn!(
                "submesh {n}: indices {first_index}+{index_count} exceed buffer of {}",
                indices.len()
            );
            warnings.push(Warning::SubmeshOutOfRange {
                submesh: n,
                first_index: first_index as u64,
                index_count: index_count as u64,
                available: indices.len(),
            });
            continue;
        };

        let topology = if strips_only {
            Topology::TriangleStrip
        } else {
            submesh.topology()
        };
        let primitive = match topology {
            Topology::Triangles => 3,
            Topology::Quads => 4,
            _ => 1,
        };
        let dropped = range.len() % primitive;
        if dropped != 0 {
            tracing::warn!("submesh {n}: {dropped} trailing indices do not form a primitive");
            warnings.push(Warning::TrailingIndices { submesh: n, dropped });
        }

        let mut triangles = match topology {
            Topology::Triangles => range[..range.len() - dropped].to_vec(),
            Topology::TriangleStrip => destripify(range),
            Topology::Quads => split_quads(range),
            Topology::Lines | Topology::LineStrip | Topology::Points | Topology::Unknown(_) => {
                tracing::warn!("submesh {n}: skipping topology {}", submesh.topology);
                warnings.push(Warning::UnsupportedTopology {
                    submesh: n,
                    topology: submesh.topology,
                });
                continue;
            }
        };

        if submesh.base_vertex != 0 {
            let base = submesh.base_vertex;
            let shifted: Option<Vec<u32>> = triangles.iter().map(|i| i.checked_add(base)).collect();
            let Some(shifted) = shifted else {
                tracing::warn!("submesh {n}: base vertex {base} overflows its indices");
                warnings.push(Warning::BaseVertexOverflow {
                    submesh: n,
                    base_vertex: base,
                });
                continue;
            };
            triangles = shifted;
        }
        submesh.triangles = triangles;
    }
}
