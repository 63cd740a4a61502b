//! Vertex channels, streams and attribute extraction
//!
//! A channel names one attribute (`stream`, byte `offset` inside a vertex of
//! that stream, `format`, component count). A stream is one interleaved
//! buffer with a stride and a mask of the channels it carries. Files from 5.0
//! on do not serialize streams; they are derived from the channels with every
//! stream starting on a 16-byte boundary.

use serde::Serialize;

use super::types::{BoneWeights4, UvSet};
use super::version::UnityVersion;
use crate::binary::{ByteCursor, Endianness};
use crate::diagnostics::Warning;
use crate::error::Result;

const STREAM_ALIGNMENT: u32 = 16;
const LEGACY_STREAM_COUNT: usize = 4;
const LEGACY_CHANNEL_COUNT: usize = 6;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChannelInfo {
    pub stream: u8,
    pub offset: u8,
    /// Version-dependent format code, see [`VertexFormat::from_code`].
    pub format: u8,
    pub dimension: u8,
}

impl ChannelInfo {
    fn read(cursor: &mut ByteCursor<'_>) -> Result<Self> {
        Ok(Self {
            stream: cursor.read_u8()?,
            offset: cursor.read_u8()?,
            format: cursor.read_u8()?,
            dimension: cursor.read_u8()? & 0x0F,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StreamInfo {
    pub channel_mask: u32,
    pub offset: u32,
    pub stride: u32,
    pub divider_op: u8,
    pub frequency: u16,
}

impl StreamInfo {
    fn carries(&self, channel: usize) -> bool {
        u32::try_from(channel)
            .ok()
            .and_then(|c| 1u32.checked_shl(c))
            .is_some_and(|bit| self.channel_mask & bit != 0)
    }
}

/// Component encoding of a vertex channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VertexFormat {
    Float,
    Float16,
    UNorm8,
    SNorm8,
    UNorm16,
    SNorm16,
    UInt8,
    SInt8,
    UInt16,
    SInt16,
    UInt32,
    SInt32,
}

impl VertexFormat {
    /// Map a serialized format code. The code table changed in 2017 and 2019.
    #[must_use]
    pub fn from_code(code: u8, version: &UnityVersion) -> Option<Self> {
        use VertexFormat::{
            Float, Float16, SInt16, SInt32, SInt8, SNorm16, SNorm8, UInt16, UInt32, UInt8, UNorm16,
            UNorm8,
        };

        if version.before(2017, 0) {
            // Float, Float16, Color, Byte, UInt32
            return [Float, Float16, UNorm8, UInt8, UInt32].get(usize::from(code)).copied();
        }
        if version.before(2019, 0) {
            // the 2017 table keeps the legacy Color code at 2
            return [
                Float, Float16, UNorm8, UNorm8, SNorm8, UNorm16, SNorm16, UInt8, SInt8, UInt16,
                SInt16, UInt32, SInt32,
            ]
            .get(usize::from(code))
            .copied();
        }
        [
            Float, Float16, UNorm8, SNorm8, UNorm16, SNorm16, UInt8, SInt8, UInt16, SInt16,
            UInt32, SInt32,
        ]
        .get(usize::from(code))
        .copied()
    }

    /// Bytes per component.
    #[must_use]
    pub fn size(self) -> usize {
        match self {
            VertexFormat::Float | VertexFormat::UInt32 | VertexFormat::SInt32 => 4,
            VertexFormat::Float16
            | VertexFormat::UNorm16
            | VertexFormat::SNorm16
            | VertexFormat::UInt16
            | VertexFormat::SInt16 => 2,
            VertexFormat::UNorm8
            | VertexFormat::SNorm8
            | VertexFormat::UInt8
            | VertexFormat::SInt8 => 1,
        }
    }

    /// Read one component as `f32`. Normalized formats map to `0..=1` or `-1..=1`.
    fn read(self, cursor: &mut ByteCursor<'_>) -> Result<f32> {
        Ok(match self {
            VertexFormat::Float => cursor.read_f32()?,
            VertexFormat::Float16 => half::f16::from_bits(cursor.read_u16()?).to_f32(),
            VertexFormat::UNorm8 => f32::from(cursor.read_u8()?) / 255.0,
            VertexFormat::SNorm8 => (f32::from(cursor.read_i8()?) / 127.0).max(-1.0),
            VertexFormat::UNorm16 => f32::from(cursor.read_u16()?) / 65535.0,
            VertexFormat::SNorm16 => (f32::from(cursor.read_i16()?) / 32767.0).max(-1.0),
            VertexFormat::UInt8 => f32::from(cursor.read_u8()?),
            VertexFormat::SInt8 => f32::from(cursor.read_i8()?),
            VertexFormat::UInt16 => f32::from(cursor.read_u16()?),
            VertexFormat::SInt16 => f32::from(cursor.read_i16()?),
            VertexFormat::UInt32 => cursor.read_u32()? as f32,
            VertexFormat::SInt32 => cursor.read_i32()? as f32,
        })
    }
}

/// What a channel index means for a given version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChannelSemantic {
    Position,
    Normal,
    Tangent,
    Color,
    TexCoord(u8),
    BlendWeight,
    BlendIndices,
}

impl ChannelSemantic {
    #[must_use]
    pub fn for_channel(index: usize, version: &UnityVersion) -> Option<Self> {
        use ChannelSemantic::{
            BlendIndices, BlendWeight, Color, Normal, Position, Tangent, TexCoord,
        };

        if version.at_least(2018, 0) {
            return match index {
                0 => Some(Position),
                1 => Some(Normal),
                2 => Some(Tangent),
                3 => Some(Color),
                4..=11 => Some(TexCoord((index - 4) as u8)),
                12 => Some(BlendWeight),
                13 => Some(BlendIndices),
                _ => None,
            };
        }
        if version.at_least(5, 0) {
            return match index {
                0 => Some(Position),
                1 => Some(Normal),
                2 => Some(Color),
                3..=6 => Some(TexCoord((index - 3) as u8)),
                7 => Some(Tangent),
                _ => None,
            };
        }
        match index {
            0 => Some(Position),
            1 => Some(Normal),
            2 => Some(Color),
            3 => Some(TexCoord(0)),
            4 => Some(TexCoord(1)),
            5 => Some(Tangent),
            _ => None,
        }
    }
}

/// `m_VertexData` as serialized.
#[derive(Debug, Clone, Default)]
pub(crate) struct VertexData<'a> {
    pub current_channels: Option<u32>,
    pub vertex_count: u32,
    pub channels: Vec<ChannelInfo>,
    pub streams: Vec<StreamInfo>,
    pub data: &'a [u8],
}

impl<'a> VertexData<'a> {
    pub(crate) fn read(cursor: &mut ByteCursor<'a>, version: &UnityVersion) -> Result<Self> {
        let current_channels = if version.before(2018, 0) {
            Some(cursor.read_u32()?)
        } else {
            None
        };
        let vertex_count = cursor.read_u32()?;

        let mut channels = if version.at_least(4, 0) {
            cursor.read_vec(4, ChannelInfo::read)?
        } else {
            Vec::new()
        };

        let streams = if version.at_least(5, 0) {
            derive_streams(&channels, vertex_count, version)
        } else if version.at_least(4, 0) {
            cursor.read_vec(12, |c| {
                Ok(StreamInfo {
                    channel_mask: c.read_u32()?,
                    offset: c.read_u32()?,
                    stride: u32::from(c.read_u8()?),
                    divider_op: c.read_u8()?,
                    frequency: c.read_u16()?,
                })
            })?
        } else {
            let mut streams = Vec::with_capacity(LEGACY_STREAM_COUNT);
            for _ in 0..LEGACY_STREAM_COUNT {
                let channel_mask = cursor.read_u32()?;
                let offset = cursor.read_u32()?;
                let stride = cursor.read_u32()?;
                let _align = cursor.read_u32()?;
                streams.push(StreamInfo {
                    channel_mask,
                    offset,
                    stride,
                    ..StreamInfo::default()
                });
            }
            channels = synthesize_channels(&streams, version);
            streams
        };

        let data = cursor.read_aligned_byte_array()?;
        Ok(Self {
            current_channels,
            vertex_count,
            channels,
            streams,
            data,
        })
    }
}

/// Build stream descriptors from channels (5.0+ layout).
pub(crate) fn derive_streams(
    channels: &[ChannelInfo],
    vertex_count: u32,
    version: &UnityVersion,
) -> Vec<StreamInfo> {
    let stream_count = channels.iter().map(|c| usize::from(c.stream) + 1).max().unwrap_or(1);
    let mut streams = Vec::with_capacity(stream_count);
    let mut offset = 0u32;

    for s in 0..stream_count {
        let mut channel_mask = 0u32;
        let mut stride = 0u32;
        for (index, channel) in channels.iter().enumerate() {
            if usize::from(channel.stream) != s || channel.dimension == 0 {
                continue;
            }
            if let Some(bit) = u32::try_from(index).ok().and_then(|i| 1u32.checked_shl(i)) {
                channel_mask |= bit;
            }
            let size =
                VertexFormat::from_code(channel.format, version).map_or(0, VertexFormat::size);
            stride = stride.saturating_add(u32::from(channel.dimension) * size as u32);
        }
        streams.push(StreamInfo {
            channel_mask,
            offset,
            stride,
            ..StreamInfo::default()
        });
        offset = offset.saturating_add(vertex_count.saturating_mul(stride));
        offset = offset.saturating_add(STREAM_ALIGNMENT - 1) & !(STREAM_ALIGNMENT - 1);
    }
    streams
}

/// Fixed channel layout of 3.x files: position, normal, color, uv0, uv1, tangent.
fn synthesize_channels(streams: &[StreamInfo], version: &UnityVersion) -> Vec<ChannelInfo> {
    let mut channels = vec![ChannelInfo::default(); LEGACY_CHANNEL_COUNT];
    for (s, stream) in streams.iter().enumerate() {
        let mut offset = 0usize;
        for (index, channel) in channels.iter_mut().enumerate() {
            if !stream.carries(index) {
                continue;
            }
            let (format, dimension) = match index {
                0 | 1 => (0, 3),
                2 => (2, 4),
                3 | 4 => (0, 2),
                _ => (0, 4),
            };
            *channel = ChannelInfo {
                stream: s as u8,
                offset: offset as u8,
                format,
                dimension,
            };
            let size = VertexFormat::from_code(format, version).map_or(0, VertexFormat::size);
            offset += usize::from(dimension) * size;
        }
    }
    channels
}

/// Attributes pulled out of the vertex buffer.
#[derive(Debug, Default)]
pub(crate) struct Attributes {
    pub positions: Vec<f32>,
    pub normals: Option<Vec<f32>>,
    pub tangents: Option<Vec<f32>>,
    pub colors: Option<Vec<f32>>,
    pub uv_sets: Vec<UvSet>,
    pub blend_weights: Option<(Vec<f32>, usize)>,
    pub blend_indices: Option<(Vec<f32>, usize)>,
}

impl Attributes {
    /// Combine blend weight and index channels into per-vertex skin entries.
    pub(crate) fn skin(&self, vertex_count: usize) -> Option<Vec<BoneWeights4>> {
        let (indices, index_dim) = self.blend_indices.as_ref()?;
        let stored = indices.len() / (*index_dim).max(1);
        let mut skin = vec![BoneWeights4::default(); vertex_count.min(stored)];
        for (v, entry) in skin.iter_mut().enumerate() {
            for d in 0..(*index_dim).min(4) {
                let index = indices.get(v * index_dim + d).copied().unwrap_or(0.0);
                entry.bone_indices[d] = index as u32;
            }
            match &self.blend_weights {
                Some((weights, weight_dim)) => {
                    for d in 0..(*weight_dim).min(4) {
                        entry.weights[d] = weights.get(v * weight_dim + d).copied().unwrap_or(0.0);
                    }
                }
                // a single index channel without weights means full influence
                None => entry.weights[0] = 1.0,
            }
        }
        Some(skin)
    }
}

/// Keep the first `keep` of every `dimension` components.
fn truncate_components(values: Vec<f32>, dimension: usize, keep: usize) -> Vec<f32> {
    if dimension <= keep {
        return values;
    }
    values
        .chunks_exact(dimension)
        .flat_map(|chunk| chunk[..keep].iter().copied())
        .collect()
}

fn read_channel(
    data: &[u8],
    endian: Endianness,
    stream: &StreamInfo,
    channel: &ChannelInfo,
    format: VertexFormat,
    dimension: usize,
    vertex_count: usize,
) -> Option<Vec<f32>> {
    let mut cursor = ByteCursor::new(data, endian);
    let base = stream.offset as usize + usize::from(channel.offset);
    let stride = stream.stride as usize;
    let size = format.size();
    if vertex_count == 0 {
        return Some(Vec::new());
    }
    if stride == 0 {
        return None;
    }

    // last component of the last vertex
    let end = (vertex_count - 1)
        .checked_mul(stride)
        .and_then(|last| last.checked_add(base))
        .and_then(|last| last.checked_add(dimension * size))?;
    if end > data.len() {
        return None;
    }

    let mut values = Vec::with_capacity(vertex_count * dimension);
    for v in 0..vertex_count {
        for d in 0..dimension {
            cursor.set_position(base + v * stride + d * size);
            values.push(format.read(&mut cursor).ok()?);
        }
    }
    Some(values)
}

/// Decode every channel the streams carry. Unknown formats and channels that
/// run past `data` are skipped with a warning.
pub(crate) fn extract_attributes(
    channels: &[ChannelInfo],
    streams: &[StreamInfo],
    data: &[u8],
    vertex_count: usize,
    endian: Endianness,
    version: &UnityVersion,
    warnings: &mut Vec<Warning>,
) -> Attributes {
    let mut attributes = Attributes::default();

    for (index, channel) in channels.iter().enumerate() {
        if channel.dimension == 0 {
            continue;
        }
        let Some(stream) = streams.get(usize::from(channel.stream)) else {
            tracing::warn!("channel {index} references missing stream {}", channel.stream);
            warnings.push(Warning::ChannelOutOfRange { channel: index });
            continue;
        };
        if !stream.carries(index) {
            continue;
        }
        let Some(format) = VertexFormat::from_code(channel.format, version) else {
            tracing::warn!("channel {index} has unknown format code {}", channel.format);
            warnings.push(Warning::UnknownVertexFormat {
                channel: index,
                format: channel.format,
            });
            continue;
        };
        let Some(semantic) = ChannelSemantic::for_channel(index, version) else {
            continue;
        };

        let mut dimension = usize::from(channel.dimension);
        if version.before(2018, 0) && index == 2 && channel.format == 2 {
            // legacy Color format packs four bytes regardless of dimension
            dimension = 4;
        }

        let Some(values) =
            read_channel(data, endian, stream, channel, format, dimension, vertex_count)
        else {
            tracing::warn!("channel {index} runs past {} bytes of vertex data", data.len());
            warnings.push(Warning::ChannelOutOfRange { channel: index });
            continue;
        };

        match semantic {
            ChannelSemantic::Position => {
                attributes.positions = truncate_components(values, dimension, 3);
            }
            ChannelSemantic::Normal => {
                attributes.normals = Some(truncate_components(values, dimension, 3));
            }
            ChannelSemantic::Tangent => attributes.tangents = Some(values),
            ChannelSemantic::Color => attributes.colors = Some(values),
            ChannelSemantic::TexCoord(set) => attributes.uv_sets.push(UvSet {
                set,
                dimension: dimension as u8,
                data: values,
            }),
            ChannelSemantic::BlendWeight => attributes.blend_weights = Some((values, dimension)),
            ChannelSemantic::BlendIndices => attributes.blend_indices = Some((values, dimension)),
        }
    }

    attributes
}
