//! Batch bundle discovery and validation
//!
//! Bundles rarely share an extension (`.bundle`, `.unity3d`, `.hhh`, none at
//! all), so discovery sniffs the `UnityFS` signature instead.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use walkdir::WalkDir;

use crate::asset::{AssetBundle, OpenOptions};
use crate::bundle::{self, ParseOptions};
use crate::diagnostics::Outcome;

/// Progress of a batch operation
#[derive(Debug, Clone)]
pub struct BatchProgress {
    pub current: usize,
    pub total: usize,
    pub current_file: Option<String>,
}

/// Validation result for one bundle
#[derive(Debug, Clone)]
pub struct BundleValidation {
    pub path: PathBuf,
    pub outcome: Outcome,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    /// Number of meshes decoded successfully
    pub meshes: usize,
    /// Number of meshes that failed to decode
    pub mesh_failures: usize,
}

/// Summary of a batch validation
#[derive(Debug, Clone, Default)]
pub struct BatchValidationResult {
    pub success_count: usize,
    pub warning_count: usize,
    pub fail_count: usize,
    pub results: Vec<BundleValidation>,
}

/// `true` when the file starts with the `UnityFS` signature.
#[must_use]
pub fn is_bundle_file(path: &Path) -> bool {
    let mut magic = [0u8; 8];
    File::open(path)
        .and_then(|mut f| f.read_exact(&mut magic))
        .is_ok_and(|()| magic[..7] == *bundle::SIGNATURE.as_bytes() && magic[7] == 0)
}

/// Find all bundle files in a directory recursively, sorted.
pub fn find_bundle_files<P: AsRef<Path>>(dir: P) -> Vec<PathBuf> {
    let mut bundles: Vec<_> = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|e| e.path().is_file() && is_bundle_file(e.path()))
        .map(|e| e.path().to_path_buf())
        .collect();

    bundles.sort();
    bundles
}

/// Fully validate one bundle: container checks, then every serialized file
/// and mesh.
#[must_use]
pub fn validate_bundle(path: &Path, options: &ParseOptions) -> BundleValidation {
    let mut validation = BundleValidation {
        path: path.to_path_buf(),
        outcome: Outcome::Failed,
        warnings: Vec::new(),
        errors: Vec::new(),
        meshes: 0,
        mesh_failures: 0,
    };

    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            validation.errors.push(e.to_string());
            return validation;
        }
    };

    let report = bundle::try_parse(&bytes, options);
    validation.warnings.extend(report.warnings.iter().map(ToString::to_string));
    validation.errors.extend(report.errors.iter().map(ToString::to_string));
    let Some(container) = report.result else {
        return validation;
    };

    let open_options = OpenOptions::new().with_parse_options(options.clone());
    let asset = AssetBundle::from_container(container, open_options);
    match asset.serialized_files() {
        Ok(files) => {
            for file in &files {
                let path = &file.node.path;
                validation
                    .warnings
                    .extend(file.directory.warnings.iter().map(|w| format!("{path}: {w}")));
            }
        }
        Err(e) => validation.errors.push(e.to_string()),
    }

    if let Ok(entries) = asset.decode_meshes() {
        for entry in entries {
            match entry.result {
                Ok(record) => {
                    validation.meshes += 1;
                    validation.warnings.extend(
                        record
                            .warnings
                            .iter()
                            .map(|w| format!("mesh {} ({}): {w}", entry.path_id, record.name)),
                    );
                }
                Err(e) => {
                    validation.mesh_failures += 1;
                    validation.errors.push(format!("mesh {}: {e}", entry.path_id));
                }
            }
        }
    }

    validation.outcome = if !validation.errors.is_empty() {
        Outcome::Failed
    } else if validation.warnings.is_empty() {
        Outcome::Succeeded
    } else {
        Outcome::SucceededWithWarnings
    };
    validation
}

/// Validate bundles in parallel
///
/// # Arguments
/// * `bundles` - Bundle files to validate
/// * `options` - Container parse options applied to every bundle
/// * `progress` - Callback for progress updates
pub fn validate_bundles<F>(
    bundles: &[PathBuf],
    options: &ParseOptions,
    progress: F,
) -> BatchValidationResult
where
    F: Fn(&BatchProgress) + Send + Sync,
{
    let processed = AtomicUsize::new(0);
    let total = bundles.len();

    let results: Vec<BundleValidation> = bundles
        .par_iter()
        .map(|path| {
            let current = processed.fetch_add(1, Ordering::SeqCst) + 1;
            progress(&BatchProgress {
                current,
                total,
                current_file: Some(path.to_string_lossy().to_string()),
            });
            validate_bundle(path, options)
        })
        .collect();

    let count = |outcome: Outcome| results.iter().filter(|r| r.outcome == outcome).count();
    BatchValidationResult {
        success_count: count(Outcome::Succeeded),
        warning_count: count(Outcome::SucceededWithWarnings),
        fail_count: count(Outcome::Failed),
        results,
    }
}
