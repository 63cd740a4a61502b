//! Resolution of external resource paths to byte slices
//!
//! Streamed mesh data refers to a sibling node by a path such as
//! `archive:/CAB-0a1b/CAB-0a1b.resS`. Only the last path component is
//! significant for lookup.

use std::collections::HashMap;

use super::types::Container;
use crate::error::{Error, Result};

/// Maps an external resource path plus a byte range to bytes.
pub trait ResourceResolver: Sync {
    /// Return exactly `size` bytes starting at `offset` inside the resource.
    ///
    /// # Errors
    /// Returns [`Error::UnresolvedExternalResource`] when the resource is
    /// unknown or the range runs past its end.
    fn resolve(&self, path: &str, offset: u64, size: u64) -> Result<&[u8]>;
}

/// Last component of a resource path.
#[must_use]
pub fn resource_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn unresolved(path: &str, offset: u64, size: u64, reason: impl Into<String>) -> Error {
    Error::UnresolvedExternalResource {
        path: path.to_string(),
        offset,
        size,
        reason: reason.into(),
    }
}

/// Slice `offset..offset + size` out of `data`.
pub(crate) fn slice_resource<'a>(
    data: &'a [u8],
    path: &str,
    offset: u64,
    size: u64,
) -> Result<&'a [u8]> {
    let range = usize::try_from(offset)
        .ok()
        .zip(usize::try_from(size).ok())
        .and_then(|(start, len)| Some(start..start.checked_add(len)?));
    range
        .and_then(|r| data.get(r))
        .ok_or_else(|| {
            unresolved(
                path,
                offset,
                size,
                format!("range exceeds resource of {} bytes", data.len()),
            )
        })
}

impl ResourceResolver for Container {
    fn resolve(&self, path: &str, offset: u64, size: u64) -> Result<&[u8]> {
        let name = resource_name(path);
        let node = self
            .node_by_name(name)
            .ok_or_else(|| unresolved(path, offset, size, format!("no node named {name}")))?;
        let bytes = self
            .extract(node)
            .map_err(|e| unresolved(path, offset, size, e.to_string()))?;
        slice_resource(bytes, path, offset, size)
    }
}

/// Resources held in memory, keyed by file name (e.g. `.resS` files read from disk).
impl ResourceResolver for HashMap<String, Vec<u8>> {
    fn resolve(&self, path: &str, offset: u64, size: u64) -> Result<&[u8]> {
        let name = resource_name(path);
        let data = self
            .get(name)
            .ok_or_else(|| unresolved(path, offset, size, format!("no resource named {name}")))?;
        slice_resource(data, path, offset, size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_resolver() {
        let mut resources = HashMap::new();
        resources.insert("CAB-1.resS".to_string(), (0u8..32).collect::<Vec<_>>());

        let bytes = resources.resolve("archive:/CAB-1/CAB-1.resS", 4, 4).unwrap();
        assert_eq!(bytes, &[4, 5, 6, 7]);

        // exact end is fine, one past is not
        assert!(resources.resolve("CAB-1.resS", 28, 4).is_ok());
        assert!(matches!(
            resources.resolve("CAB-1.resS", 29, 4),
            Err(Error::UnresolvedExternalResource { .. })
        ));
        assert!(matches!(
            resources.resolve("archive:/CAB-2/CAB-2.resS", 0, 1),
            Err(Error::UnresolvedExternalResource { .. })
        ));
    }
}
