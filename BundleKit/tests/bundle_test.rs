mod common;

use bundlekit::bundle::{self, OverlapPolicy, ParseOptions};
use bundlekit::prelude::*;
use common::{BundleBuilder, SERIALIZED_FILE_FLAG};
use pretty_assertions::assert_eq;

fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 % 251) as u8).collect()
}

#[test]
fn test_minimal_container() {
    let bytes = BundleBuilder::new().file("CAB-a", &payload(64), SERIALIZED_FILE_FLAG).build();
    let container = bundle::parse(&bytes).unwrap();

    assert_eq!(container.header.signature, "UnityFS");
    assert_eq!(container.header.version, 6);
    assert_eq!(container.header.unity_version, "5.x.x");
    assert_eq!(container.header.unity_revision, common::REVISION);
    assert_eq!(container.header.size as usize, bytes.len());
    assert_eq!(container.blocks.len(), 1);
    assert_eq!(container.total_span(), 64);
    assert_eq!(container.nodes.len(), 1);
    assert_eq!(container.extract(&container.nodes[0]).unwrap(), &payload(64)[..]);
    assert_eq!(container.serialized_files().len(), 1);
}

#[test]
fn test_lz4_blocks_concatenate_in_order() {
    let data = payload(1000);
    let bytes = BundleBuilder::new()
        .lz4()
        .block_size(256)
        .file("CAB-a", &data[..600], SERIALIZED_FILE_FLAG)
        .file("CAB-a.resS", &data[600..], 0)
        .build();
    let container = bundle::parse(&bytes).unwrap();

    assert_eq!(container.blocks.len(), 4);
    assert!(container.blocks.iter().all(|b| b.flags == 2));
    assert_eq!(container.data(), &data[..]);
    let res = container.node_by_name("CAB-a.resS").unwrap();
    assert!(res.is_resource());
    assert_eq!(container.extract(res).unwrap(), &data[600..]);
}

#[test]
fn test_duplicate_path_collected_without_result() {
    let bytes = BundleBuilder::new()
        .data(&payload(64))
        .node("CAB-a", 0, 32, 0)
        .node("CAB-a", 32, 32, 0)
        .build();

    let report = bundle::try_parse(&bytes, &ParseOptions::default());
    assert!(report.result.is_none());
    assert_eq!(report.errors.len(), 1);
    assert!(matches!(&report.errors[0], Error::DuplicateNodePath { path } if path == "CAB-a"));
    assert_eq!(report.outcome(), Outcome::Failed);

    assert!(matches!(bundle::parse(&bytes), Err(Error::DuplicateNodePath { .. })));
}

#[test]
fn test_node_ending_at_span_accepted() {
    let bytes = BundleBuilder::new().data(&payload(64)).node("a", 0, 64, 0).build();
    assert!(bundle::parse(&bytes).is_ok());

    let bytes = BundleBuilder::new().data(&payload(64)).node("a", 1, 64, 0).build();
    match bundle::parse(&bytes) {
        Err(Error::NodeOutOfBounds { offset, size, span, .. }) => {
            assert_eq!((offset, size, span), (1, 64, 64));
        }
        other => panic!("expected NodeOutOfBounds, got {other:?}"),
    }
}

#[test]
fn test_every_node_error_is_reported() {
    let bytes = BundleBuilder::new()
        .data(&payload(64))
        .node("a", 0, 16, 0)
        .node("a", 16, 16, 0)
        .node("b", 60, 8, 0)
        .build();
    let report = bundle::try_parse(&bytes, &ParseOptions::default());
    assert_eq!(report.errors.len(), 2);
    assert!(report.result.is_none());
}

#[test]
fn test_overlap_policy() {
    let bytes = BundleBuilder::new()
        .data(&payload(64))
        .node("a", 0, 40, 0)
        .node("b", 32, 32, 0)
        .build();

    let report = bundle::try_parse(&bytes, &ParseOptions::default());
    assert!(report.result.is_some());
    assert_eq!(
        report.warnings,
        vec![Warning::OverlappingNodes {
            first: "a".to_string(),
            second: "b".to_string()
        }]
    );
    assert_eq!(report.outcome(), Outcome::SucceededWithWarnings);

    assert!(matches!(
        bundle::parse_with_options(&bytes, &ParseOptions::strict()),
        Err(Error::OverlappingNodes { .. })
    ));

    let ignore = ParseOptions::new().with_overlap_policy(OverlapPolicy::Ignore);
    let report = bundle::try_parse(&bytes, &ignore);
    assert_eq!(report.outcome(), Outcome::Succeeded);
}

#[test]
fn test_hash_only_checked_against_reference() {
    let stored = [7u8; 16];
    let bytes = BundleBuilder::new().hash(stored).file("a", &payload(8), 0).build();

    let container = bundle::parse(&bytes).unwrap();
    assert_eq!(container.hash, stored);

    let matching = ParseOptions::new().with_reference_hash(stored);
    assert!(bundle::parse_with_options(&bytes, &matching).is_ok());

    let other = ParseOptions::new().with_reference_hash([0u8; 16]);
    match bundle::parse_with_options(&bytes, &other) {
        Err(Error::HashMismatch { expected, actual }) => {
            assert_eq!(expected, "00".repeat(16));
            assert_eq!(actual, "07".repeat(16));
        }
        other => panic!("expected HashMismatch, got {other:?}"),
    }
}

#[test]
fn test_invalid_signature_and_version() {
    let mut bytes = BundleBuilder::new().file("a", &payload(8), 0).build();
    bytes[0] = b'X';
    assert!(matches!(bundle::parse(&bytes), Err(Error::InvalidSignature { .. })));

    let bytes = BundleBuilder::new().version(9).file("a", &payload(8), 0).build();
    assert!(matches!(
        bundle::parse(&bytes),
        Err(Error::UnsupportedVersion { format: "UnityFS", version: 9 })
    ));
}

#[test]
fn test_truncated_header() {
    let bytes = BundleBuilder::new().file("a", &payload(8), 0).build();
    assert!(matches!(bundle::parse(&bytes[..20]), Err(Error::HeaderMalformed { .. })));
}

#[test]
fn test_truncated_storage_block() {
    let bytes = BundleBuilder::new().file("a", &payload(64), 0).build();
    let report = bundle::try_parse(&bytes[..bytes.len() - 8], &ParseOptions::default());
    assert!(report.result.is_none());
    assert!(matches!(report.errors[0], Error::TruncatedInput { .. }));
}

#[test]
fn test_open_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("test.bundle");
    std::fs::write(&path, BundleBuilder::new().file("a", &payload(16), 0).build()).unwrap();

    let container = bundle::open(&path).unwrap();
    assert_eq!(container.nodes[0].path, "a");
    assert!(matches!(bundle::open(dir.path().join("missing")), Err(Error::Io(_))));
}

#[test]
fn test_oversized_block_sizes_fail_cleanly() {
    let stored = BundleBuilder::new()
        .data(&[0u8; 16])
        .block_table(vec![(u32::MAX, 4, 0); 4])
        .build();
    let report = bundle::try_parse(&stored, &ParseOptions::default());
    assert_eq!(report.outcome(), Outcome::Failed);
    assert!(matches!(
        report.errors.as_slice(),
        [Error::DecompressionSizeMismatch { actual: 4, .. }]
    ));

    let lz4 = BundleBuilder::new()
        .data(&[0u8; 16])
        .block_table(vec![(u32::MAX, 4, 2); 4])
        .build();
    let report = bundle::try_parse(&lz4, &ParseOptions::default());
    assert!(matches!(
        report.errors.as_slice(),
        [Error::Lz4DecompressionFailed { .. }]
    ));
}
