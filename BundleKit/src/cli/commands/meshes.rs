//! CLI command for decoding meshes

use std::path::Path;
use std::time::Instant;

use serde_json::{json, Value};

use crate::asset::{AssetBundle, OpenOptions};
use crate::cli::progress::{print_done, print_step, CUBE, LOOKING_GLASS};
use crate::mesh::{DecodeOptions, UnityVersion};
use crate::report;

pub fn execute(
    source: &Path,
    unity_version: Option<&str>,
    no_triangles: bool,
    as_json: bool,
) -> anyhow::Result<()> {
    let start = Instant::now();

    let mut options =
        OpenOptions::new().with_decode_options(DecodeOptions::new().with_triangles(!no_triangles));
    if let Some(version) = unity_version {
        options = options.with_unity_version(version.parse::<UnityVersion>()?);
    }

    if !as_json {
        print_step(1, 2, LOOKING_GLASS, &format!("Reading {}...", source.display()));
    }
    let bundle = AssetBundle::open_with_options(source, options)?;

    if !as_json {
        print_step(2, 2, CUBE, "Decoding meshes...");
    }
    let entries = bundle.decode_meshes_parallel()?;

    if as_json {
        let meshes: Vec<Value> = entries
            .iter()
            .map(|entry| match &entry.result {
                Ok(record) => json!({
                    "file": entry.file,
                    "pathId": entry.path_id,
                    "name": record.name,
                    "diagnostics": report::mesh_diagnostics(record),
                    "warnings": record.warnings.iter().map(ToString::to_string).collect::<Vec<_>>(),
                }),
                Err(e) => json!({
                    "file": entry.file,
                    "pathId": entry.path_id,
                    "error": e.to_string(),
                }),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&meshes)?);
        return Ok(());
    }

    let mut failures = 0;
    for entry in &entries {
        match &entry.result {
            Ok(record) => {
                let uvs: Vec<String> =
                    record.uv_sets.iter().map(|uv| format!("uv{}", uv.set)).collect();
                println!(
                    "  {:>20}  {:<32} {:>7} verts {:>8} tris  submeshes {}  {}{}",
                    entry.path_id,
                    record.name,
                    record.vertex_count,
                    record.triangles().len() / 3,
                    record.submeshes.len(),
                    if record.has_normals() { "normals " } else { "" },
                    uvs.join(" ")
                );
                for warning in &record.warnings {
                    println!("  {:>20}  warning: {warning}", "");
                }
            }
            Err(e) => {
                failures += 1;
                println!("  {:>20}  error: {e}", entry.path_id);
            }
        }
    }

    println!();
    println!("{} meshes, {failures} failed", entries.len());
    print_done(start.elapsed());

    Ok(())
}
