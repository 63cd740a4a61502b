//! JSON reports for comparing decoder output against reference dumps
//!
//! Every report is a [`serde_json::Value`] whose object keys keep insertion
//! order, so serialized reports are stable and diffable.

use std::collections::BTreeSet;

use indexmap::IndexMap;
use serde_json::{json, Map, Value};

use crate::asset::AssetBundle;
use crate::bundle::Container;
use crate::error::Error;
use crate::mesh::GeometryRecord;
use crate::serialized::MetadataDirectory;

/// Header, storage blocks, nodes and data offset of a bundle.
#[must_use]
pub fn bundle_reference(container: &Container) -> Value {
    json!({
        "header": container.header,
        "storage_blocks": container.blocks,
        "nodes": container.nodes,
        "data_offset": container.data_offset,
    })
}

/// The object directory of a serialized file.
#[must_use]
pub fn object_table(directory: &MetadataDirectory<'_>) -> Value {
    let objects: Vec<Value> = directory
        .objects
        .iter()
        .map(|o| {
            json!({
                "pathId": o.path_id,
                "classId": o.class_id,
                "byteStart": o.byte_start,
                "byteSize": o.byte_size,
                "typeId": o.type_id,
            })
        })
        .collect();
    json!({
        "version": directory.version(),
        "unity_version": directory.unity_version,
        "target_platform": directory.target_platform,
        "objects": objects,
    })
}

/// Every object decoded against its type tree. Objects that fail to decode
/// carry `{"__error__": message}` as their tree.
#[must_use]
pub fn object_trees(source: &str, directory: &MetadataDirectory<'_>) -> Value {
    let objects: Vec<Value> = directory
        .objects
        .iter()
        .map(|entry| {
            let tree = directory
                .read_object_tree(entry)
                .and_then(|tree| serde_json::to_value(tree).map_err(Error::from))
                .unwrap_or_else(|e| json!({ "__error__": e.to_string() }));
            json!({
                "pathId": entry.path_id,
                "classId": entry.class_id,
                "type": directory.type_name(entry),
                "tree": tree,
            })
        })
        .collect();
    json!({
        "source": source,
        "unityVersion": directory.unity_version,
        "objectCount": objects.len(),
        "objects": objects,
    })
}

/// Structural facts about a decoded mesh.
#[must_use]
pub fn mesh_diagnostics(record: &GeometryRecord) -> Value {
    let stream = record.stream_data.as_ref().filter(|s| s.has_stream());
    let renderable_hint = record.layout.vertex_count > 0
        && record.index_buffer_size > 0
        && (record.layout.data_size > 0 || stream.is_some());
    json!({
        "vertexCount": record.layout.vertex_count,
        "indexBufferLength": record.index_buffer_size,
        "vertexDataLength": record.layout.data_size,
        "channelsCount": record.layout.channels.len(),
        "indexFormat": record.index_format_field,
        "use16BitIndices": record.use_16bit_indices,
        "streamData": {
            "hasStream": stream.is_some(),
            "path": stream.map(|s| s.path.as_str()),
            "offset": stream.map_or(0, |s| s.offset),
            "size": stream.map_or(0, |s| s.size),
        },
        "renderableHint": renderable_hint,
    })
}

/// Summary of a bundle: object type counts, meshes and decode failures.
#[must_use]
pub fn bundle_snapshot(file: &str, bundle: &AssetBundle) -> Value {
    let mut object_types: IndexMap<String, usize> = IndexMap::new();
    let mut errors = Vec::new();
    let mut total_objects = 0;

    match bundle.serialized_files() {
        Ok(files) => {
            for file in &files {
                total_objects += file.directory.objects.len();
                for entry in &file.directory.objects {
                    *object_types.entry(file.directory.type_name(entry)).or_default() += 1;
                }
            }
        }
        Err(e) => errors.push(json!({ "type": "General", "error": e.to_string() })),
    }

    let mut meshes = Vec::new();
    if let Ok(entries) = bundle.decode_meshes() {
        for entry in entries {
            match entry.result {
                Ok(record) => meshes.push(json!({
                    "name": record.name,
                    "vertex_count": record.vertex_count,
                    "index_count": record
                        .submeshes
                        .iter()
                        .map(|s| u64::from(s.index_count))
                        .sum::<u64>(),
                    "has_normals": record.has_normals(),
                    "has_uv0": record.uv(0).is_some_and(|uv| !uv.data.is_empty()),
                    "object_path": format!("Object {}", entry.path_id),
                })),
                Err(e) => errors.push(json!({
                    "type": "Mesh extraction",
                    "error": e.to_string(),
                })),
            }
        }
    }

    let container = bundle.container();
    let nodes: Vec<Value> = container
        .nodes
        .iter()
        .map(|node| {
            let kind = if node.is_serialized_file() {
                "SerializedFile"
            } else if node.is_resource() {
                "Resource"
            } else {
                "Other"
            };
            json!({ "path": node.path, "type": kind })
        })
        .collect();

    let summary = json!({
        "total_objects": total_objects,
        "total_nodes": nodes.len(),
        "total_meshes": meshes.len(),
        "total_extraction_errors": errors.len(),
    });
    json!({
        "file": file,
        "header": { "signature": container.header.signature },
        "object_types": object_types,
        "nodes": nodes,
        "meshes": meshes,
        "extraction_errors": errors,
        "summary": summary,
    })
}

/// Replace `{"__bytes__": x}` wrappers with `x` so byte payloads compare as strings.
#[must_use]
pub fn normalize_bytes(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            if let Some(bytes) = map.get("__bytes__").filter(|_| map.len() == 1) {
                return bytes.clone();
            }
            Value::Object(map.iter().map(|(k, v)| (k.clone(), normalize_bytes(v))).collect())
        }
        Value::Array(items) => Value::Array(items.iter().map(normalize_bytes).collect()),
        other => other.clone(),
    }
}

fn type_label(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn diff_into(a: &Value, b: &Value, path: &str, out: &mut Vec<String>, max: usize) {
    if out.len() >= max {
        return;
    }
    if type_label(a) != type_label(b) {
        out.push(format!("TYPE {path}: {} != {}", type_label(a), type_label(b)));
        return;
    }
    match (a, b) {
        (Value::Object(left), Value::Object(right)) => {
            let keys: BTreeSet<&String> = left.keys().chain(right.keys()).collect();
            for key in keys {
                match (left.get(key), right.get(key)) {
                    (Some(x), Some(y)) => diff_into(x, y, &format!("{path}.{key}"), out, max),
                    (None, _) => out.push(format!("MISSING {path}.{key}: only in right")),
                    (_, None) => out.push(format!("MISSING {path}.{key}: only in left")),
                }
                if out.len() >= max {
                    return;
                }
            }
        }
        (Value::Array(left), Value::Array(right)) => {
            if left.len() != right.len() {
                out.push(format!("LEN {path}: {} != {}", left.len(), right.len()));
                return;
            }
            for (i, (x, y)) in left.iter().zip(right).enumerate() {
                diff_into(x, y, &format!("{path}[{i}]"), out, max);
                if out.len() >= max {
                    return;
                }
            }
        }
        _ => {
            if a != b {
                out.push(format!("VAL {path}: {a} != {b}"));
            }
        }
    }
}

/// Differences between two JSON trees, at most `max` lines of the forms
/// `TYPE path: a != b`, `MISSING path.key: only in left|right`,
/// `LEN path: n != m` and `VAL path: a != b`.
#[must_use]
pub fn diff_trees(a: &Value, b: &Value, max: usize) -> Vec<String> {
    let mut out = Vec::new();
    diff_into(a, b, "", &mut out, max);
    out
}

/// Result of comparing two object tree dumps.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DumpComparison {
    pub left_objects: usize,
    pub right_objects: usize,
    pub only_left: Vec<i64>,
    pub only_right: Vec<i64>,
    pub diffs: Vec<String>,
}

fn objects_by_path_id(dump: &Value) -> Map<String, Value> {
    dump.get("objects")
        .and_then(Value::as_array)
        .map(|objects| {
            objects
                .iter()
                .filter_map(|o| Some((o.get("pathId")?.as_i64()?.to_string(), o.clone())))
                .collect()
        })
        .unwrap_or_default()
}

/// Compare two [`object_trees`] dumps object by object (matched on `pathId`).
#[must_use]
pub fn compare_object_dumps(left: &Value, right: &Value, max: usize) -> DumpComparison {
    let left = objects_by_path_id(&normalize_bytes(left));
    let right = objects_by_path_id(&normalize_bytes(right));

    let ids = |map: &Map<String, Value>| -> BTreeSet<i64> {
        map.keys().filter_map(|k| k.parse().ok()).collect()
    };
    let (left_ids, right_ids) = (ids(&left), ids(&right));

    let mut diffs = Vec::new();
    for id in left_ids.intersection(&right_ids) {
        let key = id.to_string();
        if let (Some(a), Some(b)) = (left.get(&key), right.get(&key)) {
            diff_into(a, b, &format!("object[{id}]"), &mut diffs, max);
        }
        if diffs.len() >= max {
            break;
        }
    }

    DumpComparison {
        left_objects: left.len(),
        right_objects: right.len(),
        only_left: left_ids.difference(&right_ids).copied().collect(),
        only_right: right_ids.difference(&left_ids).copied().collect(),
        diffs,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_diff_trees_reports_each_kind() {
        let a = json!({ "a": 1, "b": [1, 2], "c": "x", "d": 1.5, "only_a": true });
        let b = json!({ "a": 2, "b": [1], "c": 3, "d": 1.5, "only_b": null });
        assert_eq!(
            diff_trees(&a, &b, 10),
            vec![
                "VAL .a: 1 != 2".to_string(),
                "LEN .b: 2 != 1".to_string(),
                "TYPE .c: string != int".to_string(),
                "MISSING .only_a: only in left".to_string(),
                "MISSING .only_b: only in right".to_string(),
            ]
        );
    }

    #[test]
    fn test_diff_trees_respects_max() {
        let a = json!([1, 2, 3, 4]);
        let b = json!([5, 6, 7, 8]);
        assert_eq!(diff_trees(&a, &b, 2).len(), 2);
        assert!(diff_trees(&a, &a, 10).is_empty());
    }

    #[test]
    fn test_normalize_bytes() {
        let value = json!({
            "blob": { "__bytes__": "AAE=" },
            "keep": { "__bytes__": "x", "y": 1 },
        });
        assert_eq!(
            normalize_bytes(&value),
            json!({ "blob": "AAE=", "keep": { "__bytes__": "x", "y": 1 } })
        );
    }

    #[test]
    fn test_compare_object_dumps() {
        let left = json!({ "objects": [
            { "pathId": 1, "tree": { "m_Name": "a" } },
            { "pathId": 2, "tree": {} },
        ]});
        let right = json!({ "objects": [
            { "pathId": 1, "tree": { "m_Name": "b" } },
            { "pathId": 3, "tree": {} },
        ]});
        let comparison = compare_object_dumps(&left, &right, 10);
        assert_eq!(comparison.left_objects, 2);
        assert_eq!(comparison.only_left, vec![2]);
        assert_eq!(comparison.only_right, vec![3]);
        assert_eq!(comparison.diffs, vec![r#"VAL object[1].tree.m_Name: "a" != "b""#.to_string()]);
    }

    #[test]
    fn test_mesh_diagnostics_without_stream() {
        let record = GeometryRecord::default();
        let value = mesh_diagnostics(&record);
        assert_eq!(value["streamData"]["hasStream"], json!(false));
        assert_eq!(value["streamData"]["path"], Value::Null);
        assert_eq!(value["renderableHint"], json!(false));
        let keys: Vec<&String> = value.as_object().unwrap().keys().collect();
        assert_eq!(
            keys,
            vec![
                "vertexCount",
                "indexBufferLength",
                "vertexDataLength",
                "channelsCount",
                "indexFormat",
                "use16BitIndices",
                "streamData",
                "renderableHint",
            ]
        );
    }
}
