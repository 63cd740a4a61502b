mod common;

use bundlekit::binary::Endianness;
use bundlekit::prelude::*;
use bundlekit::serialized::{self, class_id};
use common::{text_asset, text_asset_tree, SerializedBuilder, TEXT_ASSET_CLASS};
use pretty_assertions::assert_eq;
use serde_json::json;

#[test]
fn test_format_17_little_endian_objects() {
    let bytes = SerializedBuilder::new(17)
        .with_type(TEXT_ASSET_CLASS, text_asset_tree())
        .with_object(1, 0, text_asset(false, "readme", "hello"))
        .with_object(2, 0, text_asset(false, "notes", "abc"))
        .build();

    let directory = serialized::parse(&bytes).unwrap();
    assert_eq!(directory.version(), 17);
    assert_eq!(directory.endianness(), Endianness::Little);
    assert_eq!(directory.unity_version, common::REVISION);
    assert_eq!(directory.target_platform, 19);
    assert!(directory.type_tree_enabled);
    assert_eq!(directory.types.len(), 1);
    assert_eq!(directory.objects.len(), 2);
    assert!(directory.warnings.is_empty());

    let entry = directory.object(2).unwrap();
    assert_eq!(entry.class_id, TEXT_ASSET_CLASS);
    assert_eq!(entry.byte_start % 8, 0);
    assert_eq!(directory.type_name(entry), "TextAsset");

    let tree = directory.read_object_tree(entry).unwrap();
    assert_eq!(
        serde_json::to_value(&tree).unwrap(),
        json!({ "m_Name": "notes", "m_Script": "abc" })
    );
}

#[test]
fn test_swapped_header_with_big_endian_body() {
    // Version 22 written little-endian reads as 369098752 big-endian
    let bytes = SerializedBuilder::new(22)
        .header_little_endian()
        .big_endian()
        .with_type(TEXT_ASSET_CLASS, text_asset_tree())
        .with_object(-5, 0, text_asset(true, "big", "endian"))
        .build();
    assert_eq!(&bytes[8..12], &22u32.to_le_bytes());

    let directory = serialized::parse(&bytes).unwrap();
    assert_eq!(directory.version(), 22);
    assert_eq!(directory.header.header_endianness, Endianness::Little);
    assert_eq!(directory.endianness(), Endianness::Big);
    assert_eq!(directory.header.size, 48);

    let entry = &directory.objects[0];
    assert_eq!(entry.path_id, -5);
    let tree = directory.read_object_tree(entry).unwrap();
    assert_eq!(tree.get("m_Script").and_then(TreeValue::as_str), Some("endian"));
}

#[test]
fn test_extended_header_offsets() {
    let bytes = SerializedBuilder::new(22)
        .with_type(TEXT_ASSET_CLASS, text_asset_tree())
        .with_object(1, 0, text_asset(false, "a", "b"))
        .build();

    let directory = serialized::parse(&bytes).unwrap();
    assert_eq!(directory.header.file_size, bytes.len() as u64);
    assert_eq!(directory.header.data_offset % 16, 0);
    assert!(directory.objects[0].byte_start >= directory.header.data_offset);
    assert_eq!(directory.objects[0].byte_end(), bytes.len() as u64);
}

#[test]
fn test_invalid_type_reference() {
    let bytes = SerializedBuilder::new(17)
        .with_type(TEXT_ASSET_CLASS, text_asset_tree())
        .with_object(9, 3, text_asset(false, "a", "b"))
        .build();

    match serialized::parse(&bytes) {
        Err(Error::InvalidObjectTypeReference { path_id, type_id, type_count }) => {
            assert_eq!((path_id, type_id, type_count), (9, 3, 1));
        }
        other => panic!("expected InvalidObjectTypeReference, got {other:?}"),
    }

    let report = serialized::try_parse(&bytes);
    assert_eq!(report.outcome(), Outcome::Failed);
    assert_eq!(report.errors.len(), 1);
}

#[test]
fn test_object_outside_file_is_rejected() {
    let mut bytes = SerializedBuilder::new(17)
        .with_type(TEXT_ASSET_CLASS, text_asset_tree())
        .with_object(1, 0, text_asset(false, "name", "contents"))
        .build();
    bytes.truncate(bytes.len() - 4);

    assert!(matches!(
        serialized::parse(&bytes),
        Err(Error::StructuralInconsistency { .. })
    ));
}

#[test]
fn test_negative_object_start_is_rejected() {
    let path_id: i64 = 0x0102_0304_0506_0708;
    let mut bytes = SerializedBuilder::new(22)
        .with_type(TEXT_ASSET_CLASS, text_asset_tree())
        .with_object(path_id, 0, text_asset(false, "name", "contents"))
        .build();
    let id_bytes = path_id.to_le_bytes();
    let field = bytes
        .windows(8)
        .position(|w| w == id_bytes)
        .map(|p| p + 8)
        .unwrap();
    bytes[field..field + 8].copy_from_slice(&(-1i64).to_le_bytes());

    assert!(matches!(
        serialized::parse(&bytes),
        Err(Error::StructuralInconsistency { message }) if message.contains("negative")
    ));
}

#[test]
fn test_without_type_trees() {
    let bytes = SerializedBuilder::new(17)
        .without_type_trees()
        .with_type(TEXT_ASSET_CLASS, Vec::new())
        .with_object(1, 0, text_asset(false, "a", "b"))
        .build();

    let directory = serialized::parse(&bytes).unwrap();
    assert!(!directory.type_tree_enabled);
    let entry = &directory.objects[0];
    assert!(directory.type_tree(entry).is_none());
    assert!(matches!(
        directory.read_object_tree(entry),
        Err(Error::MissingTypeTree { class_id: TEXT_ASSET_CLASS })
    ));
    assert_eq!(directory.type_name(entry), "TextAsset");
}

#[test]
fn test_unsupported_format_version() {
    let bytes = SerializedBuilder::new(17).build();
    let mut broken = bytes.clone();
    broken[8..12].copy_from_slice(&99u32.to_be_bytes());
    assert!(matches!(
        serialized::parse(&broken),
        Err(Error::UnsupportedVersion { format: "SerializedFile", .. })
    ));
    assert_eq!(class_id::class_name(TEXT_ASSET_CLASS), Some("TextAsset"));
}
