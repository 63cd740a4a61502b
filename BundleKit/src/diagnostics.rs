//! Warnings and accumulated parse reports
//!
//! Recoverable irregularities never abort a parse. They are collected as
//! [`Warning`] values, either on the decoded value itself (mesh records) or on
//! a [`ParseReport`] returned by the `try_parse` entry points, which also
//! collects every fatal [`Error`] instead of stopping at the first.

use std::fmt;

use serde::Serialize;

use crate::error::Error;

/// A recoverable problem found while decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    /// Two node ranges overlap.
    OverlappingNodes { first: String, second: String },
    /// The external reference table ended early.
    TruncatedExternals { read: usize, declared: usize },
    /// A trailing metadata section could not be read.
    TruncatedMetadata { section: &'static str, message: String },
    /// A submesh addresses indices past the end of the index buffer.
    SubmeshOutOfRange {
        submesh: usize,
        first_index: u64,
        index_count: u64,
        available: usize,
    },
    /// A submesh's index count is not a multiple of its primitive size.
    TrailingIndices { submesh: usize, dropped: usize },
    /// Adding a submesh's base vertex to its indices overflows `u32`.
    BaseVertexOverflow { submesh: usize, base_vertex: u32 },
    /// A submesh uses a topology without triangles (lines, points).
    UnsupportedTopology { submesh: usize, topology: i32 },
    /// A vertex channel uses a format code with no known component layout.
    UnknownVertexFormat { channel: usize, format: u8 },
    /// A vertex channel runs past the end of the vertex data.
    ChannelOutOfRange { channel: usize },
    /// The object decoder stopped before the end of the object's bytes.
    TrailingBytes { consumed: u64, size: u64 },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::OverlappingNodes { first, second } => {
                write!(f, "nodes {first} and {second} overlap")
            }
            Warning::TruncatedExternals { read, declared } => {
                write!(f, "external table truncated: read {read} of {declared} entries")
            }
            Warning::TruncatedMetadata { section, message } => {
                write!(f, "metadata section {section} unreadable: {message}")
            }
            Warning::SubmeshOutOfRange { submesh, first_index, index_count, available } => write!(
                f,
                "submesh {submesh} indices {first_index}+{index_count} exceed index buffer ({available})"
            ),
            Warning::TrailingIndices { submesh, dropped } => {
                write!(f, "submesh {submesh} has {dropped} trailing indices")
            }
            Warning::BaseVertexOverflow { submesh, base_vertex } => {
                write!(f, "submesh {submesh} base vertex {base_vertex} overflows its indices")
            }
            Warning::UnsupportedTopology { submesh, topology } => {
                write!(f, "submesh {submesh} has non-triangle topology {topology}")
            }
            Warning::UnknownVertexFormat { channel, format } => {
                write!(f, "channel {channel} has unknown vertex format {format}")
            }
            Warning::ChannelOutOfRange { channel } => {
                write!(f, "channel {channel} runs past the vertex data")
            }
            Warning::TrailingBytes { consumed, size } => {
                write!(f, "decoder consumed {consumed} of {size} bytes")
            }
        }
    }
}

/// Overall result classification of a [`ParseReport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Succeeded,
    SucceededWithWarnings,
    Failed,
}

/// Result of a non-failing parse: the value when every fatal check passed,
/// plus every warning and error that was found.
#[derive(Debug)]
pub struct ParseReport<T> {
    /// The parsed value, `None` when any error was recorded.
    pub result: Option<T>,
    /// Recoverable problems.
    pub warnings: Vec<Warning>,
    /// Fatal problems.
    pub errors: Vec<Error>,
}

impl<T> ParseReport<T> {
    pub(crate) fn new() -> Self {
        Self {
            result: None,
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Build a failed report holding a single error.
    pub(crate) fn failed(error: Error) -> Self {
        Self {
            result: None,
            warnings: Vec::new(),
            errors: vec![error],
        }
    }

    #[must_use]
    pub fn outcome(&self) -> Outcome {
        if !self.errors.is_empty() || self.result.is_none() {
            Outcome::Failed
        } else if self.warnings.is_empty() {
            Outcome::Succeeded
        } else {
            Outcome::SucceededWithWarnings
        }
    }

    /// Convert into a plain `Result`, returning the first error if any.
    ///
    /// # Errors
    /// Returns the first recorded error.
    pub fn into_result(self) -> crate::Result<T> {
        let mut errors = self.errors.into_iter();
        if let Some(first) = errors.next() {
            return Err(first);
        }
        self.result.ok_or_else(|| Error::StructuralInconsistency {
            message: "parse produced no result".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_classification() {
        let mut report: ParseReport<u32> = ParseReport::new();
        assert_eq!(report.outcome(), Outcome::Failed);

        report.result = Some(1);
        assert_eq!(report.outcome(), Outcome::Succeeded);

        report.warnings.push(Warning::ChannelOutOfRange { channel: 3 });
        assert_eq!(report.outcome(), Outcome::SucceededWithWarnings);

        let failed: ParseReport<u32> = ParseReport::failed(Error::HeaderMalformed {
            message: "short".into(),
        });
        assert_eq!(failed.outcome(), Outcome::Failed);
        assert!(matches!(failed.into_result(), Err(Error::HeaderMalformed { .. })));
    }

    #[test]
    fn test_warning_display() {
        let warning = Warning::UnsupportedTopology { submesh: 2, topology: 3 };
        assert_eq!(warning.to_string(), "submesh 2 has non-triangle topology 3");
    }
}
