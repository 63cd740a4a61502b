//! Types for serialized file metadata

use std::sync::Arc;

use serde::Serialize;

use super::type_tree::TypeTree;

/// Class id of `MonoBehaviour`, whose types carry a script id
pub const MONO_BEHAVIOUR_CLASS_ID: i32 = 114;

/// An entry of the type table
#[derive(Debug, Clone, Default, Serialize)]
pub struct SerializedType {
    pub class_id: i32,
    pub is_stripped: bool,
    pub script_type_index: i16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script_id: Option<[u8; 16]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_type_hash: Option<[u8; 16]>,
    #[serde(skip)]
    pub type_tree: Option<Arc<TypeTree>>,
    pub type_dependencies: Vec<i32>,
    /// Reference types only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assembly_name: Option<String>,
}

impl SerializedType {
    /// Name of the type: the type tree root's type, or the class id's name.
    #[must_use]
    pub fn name(&self) -> String {
        self.type_tree
            .as_ref()
            .and_then(|t| t.root())
            .map(|root| root.type_name.clone())
            .or_else(|| super::class_id::class_name(self.class_id).map(str::to_string))
            .unwrap_or_else(|| format!("Class{}", self.class_id))
    }
}

/// An object directory entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectEntry {
    pub path_id: i64,
    /// Absolute offset within the serialized file (data offset applied)
    pub byte_start: u64,
    pub byte_size: u32,
    pub type_id: i32,
    pub class_id: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_destroyed: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script_type_index: Option<i16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_stripped: Option<bool>,
}

impl ObjectEntry {
    #[must_use]
    pub fn byte_end(&self) -> u64 {
        self.byte_start.saturating_add(u64::from(self.byte_size))
    }
}

/// Script type reference (`MonoScript` identified by file and path id)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScriptTypeRef {
    pub file_index: i32,
    pub path_id: i64,
}

/// Reference to another serialized file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExternalReference {
    pub temp_empty: String,
    pub guid: [u8; 16],
    pub kind: i32,
    pub path: String,
}
