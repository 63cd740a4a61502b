//! Node directory validation

use std::collections::HashSet;

use tracing::warn;

use super::types::Node;
use crate::diagnostics::Warning;
use crate::error::Error;

/// How overlapping node ranges are reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverlapPolicy {
    /// Record a [`Warning::OverlappingNodes`] and keep going.
    #[default]
    Warn,
    /// Treat overlaps as [`Error::OverlappingNodes`].
    Error,
    /// Skip the overlap check.
    Ignore,
}

/// Check every node against the directory invariants.
///
/// Returns all errors found; overlap warnings are appended to `warnings`.
pub(crate) fn validate_nodes(
    nodes: &[Node],
    span: u64,
    policy: OverlapPolicy,
    warnings: &mut Vec<Warning>,
) -> Vec<Error> {
    let mut errors = Vec::new();
    let mut seen = HashSet::with_capacity(nodes.len());
    let mut in_bounds = Vec::with_capacity(nodes.len());

    for node in nodes {
        if !seen.insert(node.path.as_str()) {
            errors.push(Error::DuplicateNodePath { path: node.path.clone() });
        }

        let fits = node.offset >= 0
            && node.size >= 0
            && node.offset.checked_add(node.size).is_some_and(|end| end as u64 <= span);
        if fits {
            in_bounds.push(node);
        } else {
            errors.push(Error::NodeOutOfBounds {
                path: node.path.clone(),
                offset: node.offset,
                size: node.size,
                span,
            });
        }
    }

    if policy != OverlapPolicy::Ignore {
        for (first, second) in find_overlaps(&in_bounds) {
            if policy == OverlapPolicy::Error {
                errors.push(Error::OverlappingNodes { first, second });
            } else {
                warn!("nodes {first} and {second} overlap");
                warnings.push(Warning::OverlappingNodes { first, second });
            }
        }
    }

    errors
}

/// Pairs of overlapping nodes, each reported against the furthest-reaching
/// earlier node. Empty nodes never overlap anything.
fn find_overlaps(nodes: &[&Node]) -> Vec<(String, String)> {
    let mut sorted: Vec<&Node> = nodes.iter().copied().filter(|n| n.size > 0).collect();
    sorted.sort_by_key(|n| (n.offset, n.size));

    let mut overlaps = Vec::new();
    let mut reach: Option<&Node> = None;
    for node in sorted {
        if let Some(prev) = reach {
            if node.offset < prev.end() {
                overlaps.push((prev.path.clone(), node.path.clone()));
            }
            if node.end() > prev.end() {
                reach = Some(node);
            }
        } else {
            reach = Some(node);
        }
    }
    overlaps
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(path: &str, offset: i64, size: i64) -> Node {
        Node { offset, size, flags: 0, path: path.to_string() }
    }

    #[test]
    fn test_exact_span_accepted_one_past_rejected() {
        let mut warnings = Vec::new();
        let ok = validate_nodes(&[node("a", 0, 64)], 64, OverlapPolicy::Warn, &mut warnings);
        assert!(ok.is_empty());

        let past = validate_nodes(&[node("a", 1, 64)], 64, OverlapPolicy::Warn, &mut warnings);
        assert_eq!(past.len(), 1);
        assert!(matches!(
            past[0],
            Error::NodeOutOfBounds {
                offset: 1,
                size: 64,
                span: 64,
                ..
            }
        ));
    }

    #[test]
    fn test_negative_ranges_rejected() {
        let mut warnings = Vec::new();
        let errors = validate_nodes(
            &[node("a", -1, 4), node("b", 0, -4)],
            64,
            OverlapPolicy::Warn,
            &mut warnings,
        );
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_duplicate_path() {
        let mut warnings = Vec::new();
        let errors = validate_nodes(
            &[node("x", 0, 8), node("x", 8, 8)],
            16,
            OverlapPolicy::Warn,
            &mut warnings,
        );
        assert_eq!(errors.len(), 1);
        assert!(matches!(&errors[0], Error::DuplicateNodePath { path } if path == "x"));
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_overlap_policies() {
        let nodes = [node("a", 0, 10), node("b", 5, 10), node("c", 15, 0), node("d", 15, 5)];

        let mut warnings = Vec::new();
        let errors = validate_nodes(&nodes, 20, OverlapPolicy::Warn, &mut warnings);
        assert!(errors.is_empty());
        assert_eq!(
            warnings,
            vec![Warning::OverlappingNodes { first: "a".into(), second: "b".into() }]
        );

        let mut warnings = Vec::new();
        let errors = validate_nodes(&nodes, 20, OverlapPolicy::Error, &mut warnings);
        assert_eq!(errors.len(), 1);
        assert!(warnings.is_empty());

        let errors = validate_nodes(&nodes, 20, OverlapPolicy::Ignore, &mut warnings);
        assert!(errors.is_empty());
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_contained_node_overlaps_outer() {
        let nodes = [node("outer", 0, 100), node("inner", 10, 5), node("after", 50, 10)];
        let overlaps = find_overlaps(&nodes.iter().collect::<Vec<_>>());
        assert_eq!(overlaps.len(), 2);
        assert!(overlaps.iter().all(|(first, _)| first == "outer"));
    }
}
