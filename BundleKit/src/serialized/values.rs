//! Decoding object instances against their type tree
//!
//! Values are read depth-first following the schema. Array elements all
//! decode against the array's element template node, and the template's
//! children are reached through the tree's subtree-end index, so no part of
//! the schema is ever rescanned per element.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use indexmap::IndexMap;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use super::type_tree::TypeTree;
use crate::binary::ByteCursor;
use crate::error::{Error, Result};

/// Nesting depth at which decoding gives up on a malformed schema.
const MAX_DEPTH: usize = 128;

/// A decoded field value
#[derive(Debug, Clone, PartialEq)]
pub enum TreeValue {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    Array(Vec<TreeValue>),
    Struct(IndexMap<String, TreeValue>),
}

impl TreeValue {
    /// Field of a struct value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&TreeValue> {
        match self {
            TreeValue::Struct(fields) => fields.get(name),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            TreeValue::Int(v) => Some(v),
            TreeValue::UInt(v) => i64::try_from(v).ok(),
            TreeValue::Bool(v) => Some(i64::from(v)),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            TreeValue::Float(v) => Some(v),
            TreeValue::Int(v) => Some(v as f64),
            TreeValue::UInt(v) => Some(v as f64),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            TreeValue::String(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_array(&self) -> Option<&[TreeValue]> {
        match self {
            TreeValue::Array(items) => Some(items),
            _ => None,
        }
    }
}

impl Serialize for TreeValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            TreeValue::Bool(v) => serializer.serialize_bool(*v),
            TreeValue::Int(v) => serializer.serialize_i64(*v),
            TreeValue::UInt(v) => serializer.serialize_u64(*v),
            TreeValue::Float(v) => serializer.serialize_f64(*v),
            TreeValue::String(v) => serializer.serialize_str(v),
            TreeValue::Bytes(bytes) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("__bytes__", &BASE64.encode(bytes))?;
                map.end()
            }
            TreeValue::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            TreeValue::Struct(fields) => {
                let mut map = serializer.serialize_map(Some(fields.len()))?;
                for (name, value) in fields {
                    map.serialize_entry(name, value)?;
                }
                map.end()
            }
        }
    }
}

impl TypeTree {
    /// Decode one object starting at the cursor's position.
    ///
    /// # Errors
    /// Returns [`Error::TruncatedInput`] if the data ends early and
    /// [`Error::StructuralInconsistency`] for schemas that cannot be decoded.
    pub fn read_value(&self, cursor: &mut ByteCursor<'_>) -> Result<TreeValue> {
        if self.is_empty() {
            return Err(Error::StructuralInconsistency {
                message: "empty type tree".to_string(),
            });
        }
        ValueReader { tree: self }.read(cursor, 0, 0)
    }
}

struct ValueReader<'t> {
    tree: &'t TypeTree,
}

impl ValueReader<'_> {
    fn read(&self, c: &mut ByteCursor<'_>, index: usize, depth: usize) -> Result<TreeValue> {
        if depth > MAX_DEPTH {
            return Err(Error::StructuralInconsistency {
                message: format!("type tree nested deeper than {MAX_DEPTH} levels"),
            });
        }
        let tree = self.tree;
        let node = tree.node(index);
        let mut align = node.is_aligned();

        let value = match node.type_name.as_str() {
            "SInt8" => TreeValue::Int(i64::from(c.read_i8()?)),
            "UInt8" | "char" => TreeValue::UInt(u64::from(c.read_u8()?)),
            "SInt16" | "short" => TreeValue::Int(i64::from(c.read_i16()?)),
            "UInt16" | "unsigned short" => TreeValue::UInt(u64::from(c.read_u16()?)),
            "SInt32" | "int" => TreeValue::Int(i64::from(c.read_i32()?)),
            "UInt32" | "unsigned int" | "Type*" => TreeValue::UInt(u64::from(c.read_u32()?)),
            "SInt64" | "long long" => TreeValue::Int(c.read_i64()?),
            "UInt64" | "unsigned long long" | "FileSize" => TreeValue::UInt(c.read_u64()?),
            "float" => TreeValue::Float(f64::from(c.read_f32()?)),
            "double" => TreeValue::Float(c.read_f64()?),
            "bool" => TreeValue::Bool(c.read_bool()?),
            "string" => {
                let bytes = c.read_byte_array()?;
                if tree.child(index, 0).is_some_and(|a| tree.node(a).is_aligned()) {
                    align = true;
                }
                TreeValue::String(String::from_utf8_lossy(bytes).into_owned())
            }
            "TypelessData" => TreeValue::Bytes(c.read_byte_array()?.to_vec()),
            "map" => {
                let array = self.array_child(index)?;
                if tree.node(array).is_aligned() {
                    align = true;
                }
                let pair = self.template(array)?;
                let (Some(first), Some(second)) = (tree.child(pair, 0), tree.child(pair, 1)) else {
                    return Err(self.malformed(pair, "map pair without key and value"));
                };
                let size = c.read_count(0)?;
                let mut entries = Vec::with_capacity(size.min(c.remaining()));
                for _ in 0..size {
                    let key = self.read(c, first, depth + 1)?;
                    let value = self.read(c, second, depth + 1)?;
                    entries.push(TreeValue::Array(vec![key, value]));
                }
                TreeValue::Array(entries)
            }
            _ if node.is_array() => self.read_array(c, index, depth)?,
            _ => {
                let first = tree.child(index, 0);
                if first.is_some_and(|a| tree.node(a).is_array()) {
                    let array = self.array_child(index)?;
                    if tree.node(array).is_aligned() {
                        align = true;
                    }
                    self.read_array(c, array, depth)?
                } else {
                    let mut fields = IndexMap::new();
                    for child in tree.children(index) {
                        let value = self.read(c, child, depth + 1)?;
                        fields.insert(tree.node(child).name.clone(), value);
                    }
                    TreeValue::Struct(fields)
                }
            }
        };

        if align {
            c.align(4);
        }
        Ok(value)
    }

    /// Read `size` elements of an array node's template. Arrays of one-byte
    /// primitives come back as [`TreeValue::Bytes`].
    fn read_array(&self, c: &mut ByteCursor<'_>, array: usize, depth: usize) -> Result<TreeValue> {
        let template = self.template(array)?;
        if self.is_byte_element(template) {
            let size = c.read_count(1)?;
            return Ok(TreeValue::Bytes(c.read_bytes(size)?.to_vec()));
        }
        let size = c.read_count(0)?;
        let mut items = Vec::with_capacity(size.min(c.remaining()));
        for _ in 0..size {
            items.push(self.read(c, template, depth + 1)?);
        }
        Ok(TreeValue::Array(items))
    }

    fn is_byte_element(&self, index: usize) -> bool {
        let node = self.tree.node(index);
        matches!(node.type_name.as_str(), "UInt8" | "SInt8" | "char")
            && !node.is_aligned()
            && self.tree.child(index, 0).is_none()
    }

    fn array_child(&self, index: usize) -> Result<usize> {
        self.tree
            .child(index, 0)
            .ok_or_else(|| self.malformed(index, "container without Array child"))
    }

    /// Element template: the second child of an array node.
    fn template(&self, array: usize) -> Result<usize> {
        self.tree
            .child(array, 1)
            .ok_or_else(|| self.malformed(array, "array without element template"))
    }

    fn malformed(&self, index: usize, what: &str) -> Error {
        let node = self.tree.node(index);
        Error::StructuralInconsistency {
            message: format!("{what}: {} {}", node.type_name, node.name),
        }
    }
}
