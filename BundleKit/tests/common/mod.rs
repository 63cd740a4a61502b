//! Synthetic bundle, serialized file and mesh writers shared by the
//! integration tests.

#![allow(dead_code)]

use byteorder::{BigEndian, LittleEndian, WriteBytesExt};

pub const REVISION: &str = "2019.4.31f1";
pub const MESH_CLASS: i32 = 43;
pub const TEXT_ASSET_CLASS: i32 = 49;

/// Node flag marking a serialized file.
pub const SERIALIZED_FILE_FLAG: u32 = 0x04;

/// Byte writer with a runtime byte order.
pub struct EndianWriter {
    pub out: Vec<u8>,
    big: bool,
}

impl EndianWriter {
    pub fn new(big: bool) -> Self {
        Self { out: Vec::new(), big }
    }

    pub fn set_big_endian(&mut self, big: bool) {
        self.big = big;
    }

    pub fn len(&self) -> usize {
        self.out.len()
    }

    pub fn u8(&mut self, v: u8) -> &mut Self {
        self.out.push(v);
        self
    }

    pub fn i16(&mut self, v: i16) -> &mut Self {
        if self.big {
            self.out.write_i16::<BigEndian>(v).unwrap();
        } else {
            self.out.write_i16::<LittleEndian>(v).unwrap();
        }
        self
    }

    pub fn u16(&mut self, v: u16) -> &mut Self {
        if self.big {
            self.out.write_u16::<BigEndian>(v).unwrap();
        } else {
            self.out.write_u16::<LittleEndian>(v).unwrap();
        }
        self
    }

    pub fn u32(&mut self, v: u32) -> &mut Self {
        if self.big {
            self.out.write_u32::<BigEndian>(v).unwrap();
        } else {
            self.out.write_u32::<LittleEndian>(v).unwrap();
        }
        self
    }

    pub fn i32(&mut self, v: i32) -> &mut Self {
        if self.big {
            self.out.write_i32::<BigEndian>(v).unwrap();
        } else {
            self.out.write_i32::<LittleEndian>(v).unwrap();
        }
        self
    }

    pub fn u64(&mut self, v: u64) -> &mut Self {
        if self.big {
            self.out.write_u64::<BigEndian>(v).unwrap();
        } else {
            self.out.write_u64::<LittleEndian>(v).unwrap();
        }
        self
    }

    pub fn i64(&mut self, v: i64) -> &mut Self {
        if self.big {
            self.out.write_i64::<BigEndian>(v).unwrap();
        } else {
            self.out.write_i64::<LittleEndian>(v).unwrap();
        }
        self
    }

    pub fn f32(&mut self, v: f32) -> &mut Self {
        if self.big {
            self.out.write_f32::<BigEndian>(v).unwrap();
        } else {
            self.out.write_f32::<LittleEndian>(v).unwrap();
        }
        self
    }

    pub fn raw(&mut self, b: &[u8]) -> &mut Self {
        self.out.extend_from_slice(b);
        self
    }

    pub fn cstring(&mut self, s: &str) -> &mut Self {
        self.out.extend_from_slice(s.as_bytes());
        self.out.push(0);
        self
    }

    pub fn align(&mut self, n: usize) -> &mut Self {
        while self.out.len() % n != 0 {
            self.out.push(0);
        }
        self
    }

    /// `i32` length, bytes, 4-byte alignment.
    pub fn aligned_bytes(&mut self, b: &[u8]) -> &mut Self {
        self.i32(b.len() as i32);
        self.raw(b);
        self.align(4)
    }
}

// ============================================================================
// UnityFS container
// ============================================================================

struct NodeSpec {
    offset: i64,
    size: i64,
    flags: u32,
    path: String,
}

/// Builds a UnityFS v6 bundle with embedded blocks info.
pub struct BundleBuilder {
    version: u32,
    revision: String,
    hash: [u8; 16],
    lz4_blocks: bool,
    lz4_blocks_info: bool,
    block_size: Option<usize>,
    block_table: Option<Vec<(u32, u32, u16)>>,
    data: Vec<u8>,
    nodes: Vec<NodeSpec>,
}

impl Default for BundleBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BundleBuilder {
    pub fn new() -> Self {
        Self {
            version: 6,
            revision: REVISION.to_string(),
            hash: [0u8; 16],
            lz4_blocks: false,
            lz4_blocks_info: false,
            block_size: None,
            block_table: None,
            data: Vec::new(),
            nodes: Vec::new(),
        }
    }

    pub fn version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn revision(mut self, revision: &str) -> Self {
        self.revision = revision.to_string();
        self
    }

    pub fn hash(mut self, hash: [u8; 16]) -> Self {
        self.hash = hash;
        self
    }

    /// LZ4-compress storage blocks and the blocks info.
    pub fn lz4(mut self) -> Self {
        self.lz4_blocks = true;
        self.lz4_blocks_info = true;
        self
    }

    /// Split the data region into blocks of at most `size` bytes.
    pub fn block_size(mut self, size: usize) -> Self {
        self.block_size = Some(size);
        self
    }

    /// Write these `(uncompressed, compressed, flags)` entries as the block
    /// table instead of describing the data region; the data is stored raw.
    pub fn block_table(mut self, table: Vec<(u32, u32, u16)>) -> Self {
        self.block_table = Some(table);
        self
    }

    /// Append `bytes` to the data region and add a node covering them.
    pub fn file(mut self, path: &str, bytes: &[u8], flags: u32) -> Self {
        self.nodes.push(NodeSpec {
            offset: self.data.len() as i64,
            size: bytes.len() as i64,
            flags,
            path: path.to_string(),
        });
        self.data.extend_from_slice(bytes);
        self
    }

    /// Append raw bytes to the data region without a node.
    pub fn data(mut self, bytes: &[u8]) -> Self {
        self.data.extend_from_slice(bytes);
        self
    }

    /// Add a node with an explicit range.
    pub fn node(mut self, path: &str, offset: i64, size: i64, flags: u32) -> Self {
        self.nodes.push(NodeSpec {
            offset,
            size,
            flags,
            path: path.to_string(),
        });
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let chunks: Vec<&[u8]> = match self.block_size {
            Some(size) if !self.data.is_empty() => self.data.chunks(size).collect(),
            _ => vec![&self.data[..]],
        };

        let mut block_bytes = Vec::new();
        let mut info = EndianWriter::new(true);
        info.raw(&self.hash);
        if let Some(table) = &self.block_table {
            info.i32(table.len() as i32);
            for &(uncompressed, compressed, flags) in table {
                info.u32(uncompressed).u32(compressed).u16(flags);
            }
            block_bytes.extend_from_slice(&self.data);
        } else {
            info.i32(chunks.len() as i32);
            for chunk in &chunks {
                let stored = if self.lz4_blocks {
                    lz4_flex::block::compress(chunk)
                } else {
                    chunk.to_vec()
                };
                info.u32(chunk.len() as u32)
                    .u32(stored.len() as u32)
                    .u16(if self.lz4_blocks { 2 } else { 0 });
                block_bytes.extend_from_slice(&stored);
            }
        }
        info.i32(self.nodes.len() as i32);
        for node in &self.nodes {
            info.i64(node.offset).i64(node.size).u32(node.flags).cstring(&node.path);
        }

        let uncompressed_info = info.out;
        let stored_info = if self.lz4_blocks_info {
            lz4_flex::block::compress(&uncompressed_info)
        } else {
            uncompressed_info.clone()
        };
        let flags = 0x40 | if self.lz4_blocks_info { 2 } else { 0 };

        let mut header = EndianWriter::new(true);
        header.cstring("UnityFS").u32(self.version).cstring("5.x.x").cstring(&self.revision);
        let header_len = header.len() + 8 + 12;
        let info_offset = header_len.next_multiple_of(4);
        let total = info_offset + stored_info.len() + block_bytes.len();

        header
            .i64(total as i64)
            .u32(stored_info.len() as u32)
            .u32(uncompressed_info.len() as u32)
            .u32(flags)
            .align(4);
        header.raw(&stored_info).raw(&block_bytes);
        header.out
    }
}

// ============================================================================
// Serialized files
// ============================================================================

/// One type tree node: level, type name, field name, byte size, meta flag.
pub type TreeNodeSpec = (u8, &'static str, &'static str, i32, i32);

pub const ALIGN_FLAG: i32 = 0x4000;

pub struct TypeSpec {
    pub class_id: i32,
    pub tree: Vec<TreeNodeSpec>,
}

pub struct ObjectSpec {
    pub path_id: i64,
    pub type_id: i32,
    pub bytes: Vec<u8>,
}

/// Builds a serialized file of format 17 or 22.
pub struct SerializedBuilder {
    pub version: u32,
    /// Byte order of the header fields
    pub header_big_endian: bool,
    /// Byte order of metadata and objects
    pub big_endian: bool,
    pub unity_version: String,
    pub type_tree_enabled: bool,
    pub types: Vec<TypeSpec>,
    pub objects: Vec<ObjectSpec>,
}

impl SerializedBuilder {
    pub fn new(version: u32) -> Self {
        Self {
            version,
            header_big_endian: true,
            big_endian: false,
            unity_version: REVISION.to_string(),
            type_tree_enabled: true,
            types: Vec::new(),
            objects: Vec::new(),
        }
    }

    pub fn header_little_endian(mut self) -> Self {
        self.header_big_endian = false;
        self
    }

    pub fn big_endian(mut self) -> Self {
        self.big_endian = true;
        self
    }

    pub fn without_type_trees(mut self) -> Self {
        self.type_tree_enabled = false;
        self
    }

    pub fn with_type(mut self, class_id: i32, tree: Vec<TreeNodeSpec>) -> Self {
        self.types.push(TypeSpec { class_id, tree });
        self
    }

    pub fn with_object(mut self, path_id: i64, type_id: i32, bytes: Vec<u8>) -> Self {
        self.objects.push(ObjectSpec { path_id, type_id, bytes });
        self
    }

    fn header_size(&self) -> usize {
        if self.version >= 22 { 48 } else { 20 }
    }

    fn write_tree(&self, w: &mut EndianWriter, tree: &[TreeNodeSpec]) {
        let mut strings = Vec::new();
        let mut offset_of = |s: &str| {
            let offset = strings.len() as u32;
            strings.extend_from_slice(s.as_bytes());
            strings.push(0);
            offset
        };
        let offsets: Vec<(u32, u32)> =
            tree.iter().map(|(_, ty, name, _, _)| (offset_of(ty), offset_of(name))).collect();

        w.i32(tree.len() as i32).i32(strings.len() as i32);
        for (index, ((level, ty, _, size, meta), (ty_off, name_off))) in
            tree.iter().zip(offsets).enumerate()
        {
            w.u16(1)
                .u8(*level)
                .u8(u8::from(*ty == "Array"))
                .u32(ty_off)
                .u32(name_off)
                .i32(*size)
                .i32(index as i32)
                .i32(*meta);
            if self.version >= 19 {
                w.u64(0);
            }
        }
        w.raw(&strings);
    }

    pub fn build(&self) -> Vec<u8> {
        let v = self.version;
        let mut w = EndianWriter::new(self.big_endian);
        w.raw(&vec![0u8; self.header_size()]);

        // metadata
        w.cstring(&self.unity_version).i32(19);
        if v >= 13 {
            w.u8(u8::from(self.type_tree_enabled));
        }
        w.i32(self.types.len() as i32);
        for ty in &self.types {
            w.i32(ty.class_id);
            if v >= 16 {
                w.u8(0);
            }
            if v >= 17 {
                w.i16(-1);
            }
            w.raw(&[0xAB; 16]);
            if self.type_tree_enabled {
                self.write_tree(&mut w, &ty.tree);
                if v >= 21 {
                    w.i32(0);
                }
            }
        }

        // object table; starts are patched once the data offset is known
        w.i32(self.objects.len() as i32);
        let mut start_fields = Vec::new();
        for object in &self.objects {
            w.align(4);
            w.i64(object.path_id);
            start_fields.push(w.len());
            if v >= 22 {
                w.i64(0);
            } else {
                w.u32(0);
            }
            w.u32(object.bytes.len() as u32).i32(object.type_id);
        }

        // script types, externals, reference types, user information
        w.i32(0);
        w.align(4);
        w.i32(0);
        if v >= 20 {
            w.i32(0);
        }
        w.cstring("");

        let metadata_size = w.len() - self.header_size();
        w.align(16);
        let data_offset = w.len();

        let mut starts = Vec::new();
        for object in &self.objects {
            w.align(8);
            starts.push(w.len() - data_offset);
            w.raw(&object.bytes);
        }
        let file_size = w.len();
        let mut out = w.out;

        for (field, start) in start_fields.into_iter().zip(starts) {
            let mut patch = EndianWriter::new(self.big_endian);
            if v >= 22 {
                patch.i64(start as i64);
            } else {
                patch.u32(start as u32);
            }
            out[field..field + patch.len()].copy_from_slice(&patch.out);
        }

        let mut header = EndianWriter::new(self.header_big_endian);
        if v >= 22 {
            header.u32(0).u32(0).u32(v).u32(0);
        } else {
            header.u32(metadata_size as u32).u32(file_size as u32).u32(v).u32(data_offset as u32);
        }
        header.u8(u8::from(self.big_endian)).raw(&[0, 0, 0]);
        if v >= 22 {
            header.u32(metadata_size as u32).u64(file_size as u64).u64(data_offset as u64).u64(0);
        }
        out[..header.len()].copy_from_slice(&header.out);
        out
    }
}

/// Type tree of a text asset: a name and a byte string.
pub fn text_asset_tree() -> Vec<TreeNodeSpec> {
    vec![
        (0, "TextAsset", "Base", -1, 0),
        (1, "string", "m_Name", -1, ALIGN_FLAG),
        (2, "Array", "Array", -1, ALIGN_FLAG),
        (3, "int", "size", 4, 0),
        (3, "char", "data", 1, 0),
        (1, "string", "m_Script", -1, ALIGN_FLAG),
        (2, "Array", "Array", -1, ALIGN_FLAG),
        (3, "int", "size", 4, 0),
        (3, "char", "data", 1, 0),
    ]
}

pub fn text_asset(big_endian: bool, name: &str, script: &str) -> Vec<u8> {
    let mut w = EndianWriter::new(big_endian);
    w.aligned_bytes(name.as_bytes()).aligned_bytes(script.as_bytes());
    w.out
}

/// Minimal Mesh type tree; only the name is described.
pub fn mesh_tree() -> Vec<TreeNodeSpec> {
    vec![
        (0, "Mesh", "Base", -1, 0),
        (1, "string", "m_Name", -1, ALIGN_FLAG),
        (2, "Array", "Array", -1, ALIGN_FLAG),
        (3, "int", "size", 4, 0),
        (3, "char", "data", 1, 0),
    ]
}

// ============================================================================
// Mesh objects
// ============================================================================

pub const QUAD: [f32; 12] = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0];

/// A 2019.4 Mesh with one float3 position channel and one submesh.
///
/// With `stream` set, the vertex data is left empty and the stream info
/// points at `(path, size)`.
pub fn mesh_2019(
    big_endian: bool,
    name: &str,
    positions: &[f32],
    indices: &[u16],
    topology: u32,
    stream: Option<(&str, u32)>,
) -> Vec<u8> {
    let vertex_count = (positions.len() / 3) as u32;
    let mut w = EndianWriter::new(big_endian);
    w.aligned_bytes(name.as_bytes());

    // one submesh
    w.i32(1).u32(0).u32(indices.len() as u32).u32(topology).u32(0);
    w.u32(0).u32(vertex_count);
    for _ in 0..6 {
        w.f32(0.0);
    }
    // blend shapes: vertices, shapes, channels, full weights
    w.i32(0).i32(0).i32(0).i32(0);
    // bind poses, bone name hashes, root bone hash, bones aabb, variable weights
    w.i32(0).i32(0).u32(0).i32(0).i32(0);
    // compression, readable flags
    w.u8(0).u8(1).u8(0).u8(0).align(4);
    // index format: u16
    w.i32(0);
    let mut index_bytes = EndianWriter::new(big_endian);
    for &i in indices {
        index_bytes.u16(i);
    }
    w.aligned_bytes(&index_bytes.out);

    // vertex data: one position channel
    w.u32(vertex_count);
    w.i32(1).u8(0).u8(0).u8(0).u8(3);
    let mut vertex_bytes = EndianWriter::new(big_endian);
    for &p in positions {
        vertex_bytes.f32(p);
    }
    if stream.is_some() {
        w.aligned_bytes(&[]);
    } else {
        w.aligned_bytes(&vertex_bytes.out);
    }

    // local aabb
    for v in [0.5, 0.5, 0.0, 0.5, 0.5, 0.0] {
        w.f32(v);
    }
    // usage flags, baked collision meshes, metrics
    w.i32(0).i32(0).i32(0).f32(1.0).f32(1.0);
    match stream {
        Some((path, size)) => {
            w.u32(0).u32(size).aligned_bytes(path.as_bytes());
        }
        None => {
            w.u32(0).u32(0).aligned_bytes(b"");
        }
    }
    w.out
}

/// Float bytes of `positions` in the given byte order, as a `.resS` payload.
pub fn vertex_payload(big_endian: bool, positions: &[f32]) -> Vec<u8> {
    let mut w = EndianWriter::new(big_endian);
    for &p in positions {
        w.f32(p);
    }
    w.out
}
