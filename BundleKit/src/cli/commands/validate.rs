//! CLI command for validating bundles

use std::path::Path;
use std::time::Instant;

use crate::batch::{find_bundle_files, validate_bundles};
use crate::bundle::{OverlapPolicy, ParseOptions};
use crate::cli::progress::{print_done, print_step, simple_bar, CHECK, LOOKING_GLASS};
use crate::diagnostics::Outcome;

pub fn execute(
    source: &Path,
    strict: bool,
    reference_hash: Option<&str>,
    quiet: bool,
) -> anyhow::Result<()> {
    let start = Instant::now();

    let mut options = ParseOptions::new();
    if strict {
        options = options.with_overlap_policy(OverlapPolicy::Error);
    }
    if let Some(hex) = reference_hash {
        options = options.with_reference_hash(parse_hash(hex)?);
    }

    print_step(1, 2, LOOKING_GLASS, &format!("Scanning {}...", source.display()));
    let bundles = if source.is_dir() {
        find_bundle_files(source)
    } else {
        vec![source.to_path_buf()]
    };
    if bundles.is_empty() {
        println!("No bundles found");
        return Ok(());
    }

    print_step(2, 2, CHECK, &format!("Validating {} bundles...", bundles.len()));
    let pb = simple_bar(bundles.len() as u64, "Validating", quiet);
    let result = validate_bundles(&bundles, &options, |_| pb.inc(1));
    pb.finish_and_clear();

    for validation in &result.results {
        let label = match validation.outcome {
            Outcome::Succeeded => "ok",
            Outcome::SucceededWithWarnings => "warn",
            Outcome::Failed => "FAIL",
        };
        println!(
            "{label:>4}  {}  ({} meshes, {} failed)",
            validation.path.display(),
            validation.meshes,
            validation.mesh_failures
        );
        for warning in &validation.warnings {
            println!("      warning: {warning}");
        }
        for error in &validation.errors {
            println!("      error: {error}");
        }
    }

    println!();
    println!(
        "{} ok, {} with warnings, {} failed",
        result.success_count, result.warning_count, result.fail_count
    );
    print_done(start.elapsed());

    if result.fail_count > 0 {
        anyhow::bail!("{} of {} bundles failed validation", result.fail_count, bundles.len());
    }
    Ok(())
}

fn parse_hash(hex: &str) -> anyhow::Result<[u8; 16]> {
    let hex = hex.trim();
    if hex.len() != 32 || !hex.is_ascii() {
        anyhow::bail!("reference hash must be 32 hex digits, got {hex:?}");
    }
    let mut hash = [0u8; 16];
    for (i, byte) in hash.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16)?;
    }
    Ok(hash)
}
