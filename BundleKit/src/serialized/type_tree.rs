//! Type trees: the per-type field schema of serialized objects
//!
//! A type tree is stored as a flat, depth-first list of nodes where `level`
//! gives the nesting depth. The list is kept flat; for each node the index
//! one past its last descendant is computed once on construction, so a
//! subtree can be skipped in O(1) and children are enumerated by hopping from
//! one sibling's subtree end to the next.

use std::fmt::Write;

use serde::Serialize;
use tracing::warn;

use super::common_strings::{common_string, COMMON_STRING_FLAG};
use crate::binary::ByteCursor;
use crate::error::{Error, Result};

/// `type_flags` bit marking an array node
pub const TYPE_FLAG_ARRAY: u32 = 0x01;
/// `meta_flag` bit requesting 4-byte alignment after the node's value
pub const META_FLAG_ALIGN: u32 = 0x4000;

/// One field descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeTreeNode {
    pub type_name: String,
    pub name: String,
    pub byte_size: i32,
    pub index: i32,
    pub type_flags: u32,
    pub version: u32,
    pub meta_flag: u32,
    pub level: u8,
    pub ref_type_hash: u64,
}

impl TypeTreeNode {
    #[must_use]
    pub fn is_array(&self) -> bool {
        self.type_flags & TYPE_FLAG_ARRAY != 0 || self.type_name == "Array"
    }

    #[must_use]
    pub fn is_aligned(&self) -> bool {
        self.meta_flag & META_FLAG_ALIGN != 0
    }
}

/// Immutable flat type tree with a precomputed subtree-end index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeTree {
    nodes: Vec<TypeTreeNode>,
    subtree_end: Vec<usize>,
}

impl TypeTree {
    /// Build a tree from depth-first ordered nodes.
    #[must_use]
    pub fn new(nodes: Vec<TypeTreeNode>) -> Self {
        let mut subtree_end = vec![nodes.len(); nodes.len()];
        let mut open: Vec<usize> = Vec::new();
        for (i, node) in nodes.iter().enumerate() {
            while let Some(&top) = open.last() {
                if nodes[top].level < node.level {
                    break;
                }
                subtree_end[top] = i;
                open.pop();
            }
            open.push(i);
        }
        Self { nodes, subtree_end }
    }

    #[must_use]
    pub fn nodes(&self) -> &[TypeTreeNode] {
        &self.nodes
    }

    #[must_use]
    pub fn node(&self, index: usize) -> &TypeTreeNode {
        &self.nodes[index]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Root node, if the tree has any nodes.
    #[must_use]
    pub fn root(&self) -> Option<&TypeTreeNode> {
        self.nodes.first()
    }

    /// Index one past the last descendant of `index`.
    #[must_use]
    pub fn subtree_end(&self, index: usize) -> usize {
        self.subtree_end[index]
    }

    /// Direct children of `index`, in order.
    pub fn children(&self, index: usize) -> Children<'_> {
        Children {
            tree: self,
            next: index + 1,
            end: self.subtree_end[index],
        }
    }

    /// Index of the `n`th direct child of `index`.
    #[must_use]
    pub fn child(&self, index: usize, n: usize) -> Option<usize> {
        self.children(index).nth(n)
    }

    /// Find a direct child of `index` by field name.
    #[must_use]
    pub fn child_by_name(&self, index: usize, name: &str) -> Option<usize> {
        self.children(index).find(|&c| self.nodes[c].name == name)
    }

    /// Indented `type name` listing, one node per line.
    #[must_use]
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for node in &self.nodes {
            let indent = usize::from(node.level) * 2;
            let _ = writeln!(
                out,
                "{:indent$}{} {} // size={} flags={:#x}",
                "",
                node.type_name,
                node.name,
                node.byte_size,
                node.meta_flag
            );
        }
        out
    }
}

/// Iterator over the direct children of a node
pub struct Children<'a> {
    tree: &'a TypeTree,
    next: usize,
    end: usize,
}

impl Iterator for Children<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.next >= self.end {
            return None;
        }
        let current = self.next;
        self.next = self.tree.subtree_end[current];
        Some(current)
    }
}

fn resolve_string(buffer: &[u8], offset: u32) -> String {
    if offset & COMMON_STRING_FLAG != 0 {
        let common = offset & !COMMON_STRING_FLAG;
        return common_string(common).map_or_else(
            || {
                warn!("unknown built-in type tree string offset {common}");
                common.to_string()
            },
            str::to_string,
        );
    }
    let start = offset as usize;
    let Some(rest) = buffer.get(start..) else {
        warn!("type tree string offset {offset} outside {}-byte buffer", buffer.len());
        return offset.to_string();
    };
    let end = rest.iter().position(|&b| b == 0).unwrap_or(rest.len());
    String::from_utf8_lossy(&rest[..end]).into_owned()
}

/// Node record as stored in the blob layout, before string resolution
struct RawNode {
    version: u16,
    level: u8,
    type_flags: u8,
    type_offset: u32,
    name_offset: u32,
    byte_size: i32,
    index: i32,
    meta_flag: i32,
    ref_type_hash: u64,
}

/// Read a type tree in the blob layout (format versions 10 and 12+).
pub(crate) fn read_blob(cursor: &mut ByteCursor<'_>, format_version: u32) -> Result<TypeTree> {
    let node_size = if format_version >= 19 { 32 } else { 24 };
    let node_count = cursor.read_count(node_size)?;
    let string_buffer_size = cursor.read_count(1)?;

    let mut raw = Vec::with_capacity(node_count);
    for _ in 0..node_count {
        raw.push(RawNode {
            version: cursor.read_u16()?,
            level: cursor.read_u8()?,
            type_flags: cursor.read_u8()?,
            type_offset: cursor.read_u32()?,
            name_offset: cursor.read_u32()?,
            byte_size: cursor.read_i32()?,
            index: cursor.read_i32()?,
            meta_flag: cursor.read_i32()?,
            ref_type_hash: if format_version >= 19 { cursor.read_u64()? } else { 0 },
        });
    }
    let strings = cursor.read_bytes(string_buffer_size)?;

    let nodes = raw
        .into_iter()
        .map(|r| TypeTreeNode {
            type_name: resolve_string(strings, r.type_offset),
            name: resolve_string(strings, r.name_offset),
            byte_size: r.byte_size,
            index: r.index,
            type_flags: u32::from(r.type_flags),
            version: u32::from(r.version),
            meta_flag: r.meta_flag as u32,
            level: r.level,
            ref_type_hash: r.ref_type_hash,
        })
        .collect();
    Ok(TypeTree::new(nodes))
}

/// Deepest nesting accepted in the legacy inline layout.
const MAX_LEGACY_DEPTH: u8 = 64;

/// Read a type tree in the legacy inline layout (format versions before 12,
/// except 10). Each node is followed by its children.
pub(crate) fn read_legacy(cursor: &mut ByteCursor<'_>) -> Result<TypeTree> {
    let mut nodes = Vec::new();
    read_legacy_node(cursor, 0, &mut nodes)?;
    Ok(TypeTree::new(nodes))
}

fn read_legacy_node(
    cursor: &mut ByteCursor<'_>,
    level: u8,
    nodes: &mut Vec<TypeTreeNode>,
) -> Result<()> {
    if level > MAX_LEGACY_DEPTH {
        return Err(Error::StructuralInconsistency {
            message: format!("legacy type tree nested deeper than {MAX_LEGACY_DEPTH} levels"),
        });
    }
    let type_name = cursor.read_cstring()?;
    let name = cursor.read_cstring()?;
    let byte_size = cursor.read_i32()?;
    let index = cursor.read_i32()?;
    let type_flags = cursor.read_i32()? as u32;
    let version = cursor.read_i32()? as u32;
    let meta_flag = cursor.read_i32()? as u32;
    nodes.push(TypeTreeNode {
        type_name,
        name,
        byte_size,
        index,
        type_flags,
        version,
        meta_flag,
        level,
        ref_type_hash: 0,
    });

    let children = cursor.read_count(24)?;
    for _ in 0..children {
        read_legacy_node(cursor, level + 1, nodes)?;
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn node(level: u8, type_name: &str, name: &str) -> TypeTreeNode {
        TypeTreeNode {
            type_name: type_name.to_string(),
            name: name.to_string(),
            byte_size: -1,
            index: 0,
            type_flags: u32::from(type_name == "Array"),
            version: 1,
            meta_flag: 0,
            level,
            ref_type_hash: 0,
        }
    }

    fn sample() -> TypeTree {
        TypeTree::new(vec![
            node(0, "Mesh", "Base"),              // 0
            node(1, "string", "m_Name"),          // 1
            node(2, "Array", "Array"),            // 2
            node(3, "int", "size"),               // 3
            node(3, "char", "data"),              // 4
            node(1, "vector", "m_SubMeshes"),     // 5
            node(2, "Array", "Array"),            // 6
            node(3, "int", "size"),               // 7
            node(3, "SubMesh", "data"),           // 8
            node(4, "unsigned int", "firstByte"), // 9
            node(4, "unsigned int", "indexCount"), // 10
            node(1, "UInt8", "m_MeshCompression"), // 11
        ])
    }

    #[test]
    fn test_subtree_end() {
        let tree = sample();
        assert_eq!(tree.subtree_end(0), 12);
        assert_eq!(tree.subtree_end(1), 5);
        assert_eq!(tree.subtree_end(2), 5);
        assert_eq!(tree.subtree_end(4), 5);
        assert_eq!(tree.subtree_end(5), 11);
        assert_eq!(tree.subtree_end(8), 11);
        assert_eq!(tree.subtree_end(9), 10);
        assert_eq!(tree.subtree_end(11), 12);
    }

    #[test]
    fn test_children_skip_subtrees() {
        let tree = sample();
        assert_eq!(tree.children(0).collect::<Vec<_>>(), vec![1, 5, 11]);
        assert_eq!(tree.children(8).collect::<Vec<_>>(), vec![9, 10]);
        assert_eq!(tree.children(11).count(), 0);
        assert_eq!(tree.child_by_name(0, "m_MeshCompression"), Some(11));
        assert_eq!(tree.child(6, 1), Some(8));
    }

    #[test]
    fn test_blob_with_common_and_local_strings() {
        let mut data = Vec::new();
        data.extend_from_slice(&2i32.to_le_bytes()); // node count
        data.extend_from_slice(&10i32.to_le_bytes()); // string buffer size
        // root: local type "MyClass", common name "Base" (offset 55)
        data.extend_from_slice(&1u16.to_le_bytes());
        data.push(0);
        data.push(0);
        data.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(&(COMMON_STRING_FLAG | 55).to_le_bytes());
        data.extend_from_slice(&(-1i32).to_le_bytes());
        data.extend_from_slice(&0i32.to_le_bytes());
        data.extend_from_slice(&0i32.to_le_bytes());
        // child: common type "Array" (49), local name "xs"
        data.extend_from_slice(&1u16.to_le_bytes());
        data.push(1);
        data.push(1);
        data.extend_from_slice(&(COMMON_STRING_FLAG | 49).to_le_bytes());
        data.extend_from_slice(&8u32.to_le_bytes());
        data.extend_from_slice(&(-1i32).to_le_bytes());
        data.extend_from_slice(&1i32.to_le_bytes());
        data.extend_from_slice(&0x4000i32.to_le_bytes());
        data.extend_from_slice(b"MyClass\0xs");

        let mut cursor = ByteCursor::little_endian(&data);
        let tree = read_blob(&mut cursor, 17).unwrap();
        assert!(cursor.is_at_end());
        assert_eq!(tree.len(), 2);
        assert_eq!(tree.node(0).type_name, "MyClass");
        assert_eq!(tree.node(0).name, "Base");
        assert_eq!(tree.node(1).type_name, "Array");
        assert_eq!(tree.node(1).name, "xs");
        assert!(tree.node(1).is_array());
        assert!(tree.node(1).is_aligned());
    }

    #[test]
    fn test_legacy_layout() {
        fn write_node(out: &mut Vec<u8>, ty: &str, name: &str, children: i32) {
            out.extend_from_slice(ty.as_bytes());
            out.push(0);
            out.extend_from_slice(name.as_bytes());
            out.push(0);
            for v in [4i32, 0, 0, 1, 0, children] {
                out.extend_from_slice(&v.to_le_bytes());
            }
        }
        let mut data = Vec::new();
        write_node(&mut data, "Base", "Base", 2);
        write_node(&mut data, "Vector2f", "m_Offset", 2);
        write_node(&mut data, "float", "x", 0);
        write_node(&mut data, "float", "y", 0);
        write_node(&mut data, "int", "m_Count", 0);

        let mut cursor = ByteCursor::little_endian(&data);
        let tree = read_legacy(&mut cursor).unwrap();
        assert_eq!(tree.len(), 5);
        assert_eq!(
            tree.nodes().iter().map(|n| n.level).collect::<Vec<_>>(),
            vec![0, 1, 2, 2, 1]
        );
        assert_eq!(tree.children(0).collect::<Vec<_>>(), vec![1, 4]);
    }
}
