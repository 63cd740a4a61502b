//! Serialized file metadata reading
//!
//! Field presence by format version:
//!
//! | Field                         | Versions |
//! |-------------------------------|----------|
//! | unity version string          | 7+       |
//! | target platform               | 8+       |
//! | type tree enabled flag        | 13+      |
//! | type stripped flag            | 16+      |
//! | type script index             | 17+      |
//! | script id / old type hash     | 13+      |
//! | type dependencies             | 21+      |
//! | big id flag                   | 7-13     |
//! | per-object alignment          | 14+      |
//! | 64-bit object byte start      | 22+      |
//! | object class id (u16)         | < 16     |
//! | object destroyed flag         | < 11     |
//! | object script index           | 11-16    |
//! | object stripped flag          | 15-16    |
//! | script types                  | 11+      |
//! | reference types               | 20+      |
//! | user information              | 5+       |

#![allow(clippy::cast_sign_loss)]

use std::sync::Arc;

use tracing::{debug, warn};

use super::header::SerializedHeader;
use super::type_tree::{read_blob, read_legacy};
use super::types::{
    ExternalReference, ObjectEntry, ScriptTypeRef, SerializedType, MONO_BEHAVIOUR_CLASS_ID,
};
use crate::binary::ByteCursor;
use crate::diagnostics::Warning;
use crate::error::{Error, Result};

/// Everything read from the metadata section
#[derive(Debug, Clone, Default)]
pub(crate) struct Metadata {
    pub unity_version: String,
    pub target_platform: i32,
    pub type_tree_enabled: bool,
    pub types: Vec<SerializedType>,
    pub big_id_enabled: bool,
    pub objects: Vec<ObjectEntry>,
    pub script_types: Vec<ScriptTypeRef>,
    pub externals: Vec<ExternalReference>,
    pub ref_types: Vec<SerializedType>,
    pub user_information: String,
}

/// Smallest encoded object entry, used to bound the declared count.
const MIN_OBJECT_ENTRY_SIZE: usize = 16;

pub(crate) struct MetadataReader<'a, 'w> {
    cursor: ByteCursor<'a>,
    version: u32,
    header: &'w SerializedHeader,
    warnings: &'w mut Vec<Warning>,
}

impl<'a, 'w> MetadataReader<'a, 'w> {
    pub fn new(
        bytes: &'a [u8],
        header: &'w SerializedHeader,
        warnings: &'w mut Vec<Warning>,
    ) -> Self {
        let mut cursor = ByteCursor::new(bytes, header.endianness);
        cursor.set_position(header.size);
        Self {
            cursor,
            version: header.version,
            header,
            warnings,
        }
    }

    /// Read the type table and object table (fatal on error), then the
    /// optional trailing sections (warnings on error).
    pub fn read(mut self) -> Result<Metadata> {
        let mut meta = Metadata::default();
        let v = self.version;

        if v >= 7 {
            meta.unity_version = self.cursor.read_cstring()?;
        }
        if v >= 8 {
            meta.target_platform = self.cursor.read_i32()?;
        }
        meta.type_tree_enabled = if v >= 13 { self.cursor.read_bool()? } else { true };

        let type_count = self.cursor.read_count(4)?;
        meta.types = Vec::with_capacity(type_count);
        for _ in 0..type_count {
            let ty = self.read_type(false, meta.type_tree_enabled)?;
            meta.types.push(ty);
        }
        let trees = if meta.type_tree_enabled { "on" } else { "off" };
        debug!("{} types (type trees {trees})", meta.types.len());

        if (7..14).contains(&v) {
            meta.big_id_enabled = self.cursor.read_i32()? != 0;
        }

        let object_count = self.cursor.read_count(MIN_OBJECT_ENTRY_SIZE)?;
        meta.objects = Vec::with_capacity(object_count);
        for _ in 0..object_count {
            let entry = self.read_object(&meta.types, meta.big_id_enabled)?;
            meta.objects.push(entry);
        }
        debug!("{} objects", meta.objects.len());

        if v >= 11 {
            match self.read_script_types() {
                Ok(scripts) => meta.script_types = scripts,
                Err(e) => self.tail_warning("script types", &e),
            }
        }

        self.cursor.align(4);
        meta.externals = self.read_externals();

        if v >= 20 {
            match self.read_ref_types(meta.type_tree_enabled) {
                Ok(types) => meta.ref_types = types,
                Err(e) => self.tail_warning("reference types", &e),
            }
        }

        if v >= 5 {
            match self.cursor.read_cstring() {
                Ok(info) => meta.user_information = info,
                Err(_) if self.cursor.is_at_end() => {}
                Err(e) => self.tail_warning("user information", &e),
            }
        }

        Ok(meta)
    }

    fn tail_warning(&mut self, section: &'static str, err: &Error) {
        warn!("could not read {section}: {err}");
        self.warnings.push(Warning::TruncatedMetadata {
            section,
            message: err.to_string(),
        });
    }

    fn read_type(&mut self, is_ref_type: bool, type_tree_enabled: bool) -> Result<SerializedType> {
        let v = self.version;
        let c = &mut self.cursor;
        let mut ty = SerializedType {
            class_id: c.read_i32()?,
            script_type_index: -1,
            ..SerializedType::default()
        };
        if v >= 16 {
            ty.is_stripped = c.read_bool()?;
        }
        if v >= 17 {
            ty.script_type_index = c.read_i16()?;
        }
        if v >= 13 {
            let has_script_id = (is_ref_type && ty.script_type_index >= 0)
                || (v < 16 && ty.class_id < 0)
                || (v >= 16 && ty.class_id == MONO_BEHAVIOUR_CLASS_ID);
            if has_script_id {
                ty.script_id = Some(c.read_array::<16>()?);
            }
            ty.old_type_hash = Some(c.read_array::<16>()?);
        }

        if type_tree_enabled {
            let tree = if v >= 12 || v == 10 { read_blob(c, v)? } else { read_legacy(c)? };
            ty.type_tree = Some(Arc::new(tree));

            if v >= 21 {
                if is_ref_type {
                    ty.class_name = Some(c.read_cstring()?);
                    ty.namespace = Some(c.read_cstring()?);
                    ty.assembly_name = Some(c.read_cstring()?);
                } else {
                    ty.type_dependencies = c.read_vec(4, ByteCursor::read_i32)?;
                }
            }
        }
        Ok(ty)
    }

    fn read_object(
        &mut self,
        types: &[SerializedType],
        big_id_enabled: bool,
    ) -> Result<ObjectEntry> {
        let v = self.version;
        let c = &mut self.cursor;

        if v >= 14 {
            c.align(4);
        }
        let path_id = if big_id_enabled || v >= 14 {
            c.read_i64()?
        } else {
            i64::from(c.read_i32()?)
        };
        let relative_start = if v >= 22 {
            let start = c.read_i64()?;
            u64::try_from(start).map_err(|_| Error::StructuralInconsistency {
                message: format!("object {path_id} has negative byte start {start}"),
            })?
        } else {
            u64::from(c.read_u32()?)
        };
        let Some(byte_start) = relative_start.checked_add(self.header.data_offset) else {
            return Err(Error::StructuralInconsistency {
                message: format!(
                    "object {path_id} byte start {relative_start} overflows past data offset {}",
                    self.header.data_offset
                ),
            });
        };
        let byte_size = c.read_u32()?;
        let type_id = c.read_i32()?;

        let class_id = if v < 16 {
            i32::from(c.read_u16()?)
        } else {
            resolve_class_id(types, path_id, type_id)?
        };
        let is_destroyed = if v < 11 { Some(c.read_u16()?) } else { None };
        let script_type_index = if (11..17).contains(&v) { Some(c.read_i16()?) } else { None };
        let is_stripped = if v == 15 || v == 16 { Some(c.read_bool()?) } else { None };

        Ok(ObjectEntry {
            path_id,
            byte_start,
            byte_size,
            type_id,
            class_id,
            is_destroyed,
            script_type_index,
            is_stripped,
        })
    }

    fn read_script_types(&mut self) -> Result<Vec<ScriptTypeRef>> {
        let v = self.version;
        self.cursor.read_vec(8, |c| {
            let file_index = c.read_i32()?;
            let path_id = if v >= 14 {
                c.align(4);
                c.read_i64()?
            } else {
                i64::from(c.read_i32()?)
            };
            Ok(ScriptTypeRef { file_index, path_id })
        })
    }

    /// External references; a table cut short keeps the entries read so far.
    fn read_externals(&mut self) -> Vec<ExternalReference> {
        let declared = match self.cursor.read_count(1) {
            Ok(count) => count,
            Err(e) => {
                if !self.cursor.is_at_end() {
                    self.tail_warning("externals", &e);
                }
                return Vec::new();
            }
        };

        let mut externals = Vec::with_capacity(declared);
        for _ in 0..declared {
            match self.read_external() {
                Ok(external) => externals.push(external),
                Err(e) => {
                    let read = externals.len();
                    warn!("external table truncated after {read} of {declared} entries: {e}");
                    self.warnings.push(Warning::TruncatedExternals {
                        read: externals.len(),
                        declared,
                    });
                    break;
                }
            }
        }
        externals
    }

    fn read_external(&mut self) -> Result<ExternalReference> {
        let v = self.version;
        let c = &mut self.cursor;
        let temp_empty = if v >= 6 { c.read_cstring()? } else { String::new() };
        let (guid, kind) = if v >= 5 {
            (c.read_array::<16>()?, c.read_i32()?)
        } else {
            ([0u8; 16], 0)
        };
        let path = c.read_cstring()?;
        Ok(ExternalReference { temp_empty, guid, kind, path })
    }

    fn read_ref_types(&mut self, type_tree_enabled: bool) -> Result<Vec<SerializedType>> {
        let count = self.cursor.read_count(4)?;
        let mut types = Vec::with_capacity(count);
        for _ in 0..count {
            types.push(self.read_type(true, type_tree_enabled)?);
        }
        Ok(types)
    }
}

/// Resolve an object's class id through the type table.
///
/// With an empty type table the type id is the class id.
pub(crate) fn resolve_class_id(
    types: &[SerializedType],
    path_id: i64,
    type_id: i32,
) -> Result<i32> {
    if types.is_empty() {
        return Ok(type_id);
    }
    usize::try_from(type_id)
        .ok()
        .and_then(|i| types.get(i))
        .map(|t| t.class_id)
        .ok_or(Error::InvalidObjectTypeReference {
            path_id,
            type_id,
            type_count: types.len(),
        })
}
