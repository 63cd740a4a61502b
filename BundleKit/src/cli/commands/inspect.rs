//! CLI commands for inspecting bundle structure

use std::path::Path;

use serde_json::{json, Value};

use crate::asset::AssetBundle;
use crate::binary::to_hex;
use crate::bundle;
use crate::report;

/// Show the header, storage blocks and data offset of a bundle
pub fn info(source: &Path, as_json: bool) -> anyhow::Result<()> {
    let container = bundle::open(source)?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report::bundle_reference(&container))?);
        return Ok(());
    }

    let header = &container.header;
    let compressed: u64 = container.blocks.iter().map(|b| u64::from(b.compressed_size)).sum();
    let uncompressed = container.total_span();

    println!("Bundle Information: {}", source.display());
    println!();
    println!("Signature: {} (format {})", header.signature, header.version);
    println!("Engine: {} ({})", header.unity_version, header.unity_revision);
    println!("File size: {} ({} bytes)", format_size(header.size as u64), header.size);
    println!(
        "Blocks info: {} compressed, {} uncompressed, {}",
        header.compressed_blocks_info_size,
        header.uncompressed_blocks_info_size,
        header.flags.compression().map_or("unknown", |m| m.as_str())
    );
    println!("Blocks info hash: {}", to_hex(&container.hash));
    println!("Data offset: {}", container.data_offset);
    println!();
    println!("Storage blocks: {}", container.blocks.len());
    println!("  compressed:   {}", format_size(compressed));
    println!("  uncompressed: {}", format_size(uncompressed));
    if compressed > 0 {
        let ratio = uncompressed as f64 / compressed as f64;
        println!("  ratio:        {ratio:.2}x");
    }
    println!();
    println!("Nodes: {}", container.nodes.len());
    println!("  serialized files: {}", container.serialized_files().len());

    Ok(())
}

/// List the nodes of a bundle
pub fn nodes(source: &Path) -> anyhow::Result<()> {
    let container = bundle::open(source)?;

    println!("{:>12}  {:>10}  {:>5}  Path", "Offset", "Size", "Flags");
    for node in &container.nodes {
        println!(
            "{:>12}  {:>10}  {:>5}  {}",
            node.offset,
            format_size(node.size as u64),
            node.flags,
            node.path
        );
    }
    println!();
    println!("{} nodes", container.nodes.len());

    Ok(())
}

/// List the objects of every serialized file
pub fn objects(source: &Path, class: Option<i32>, as_json: bool) -> anyhow::Result<()> {
    let bundle = AssetBundle::open(source)?;
    let files = bundle.serialized_files()?;

    if as_json {
        let tables: Vec<Value> = files
            .iter()
            .map(|f| json!({ "node": f.node.path, "table": report::object_table(&f.directory) }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&tables)?);
        return Ok(());
    }

    for file in &files {
        let directory = &file.directory;
        println!(
            "{} (format {}, engine {}, platform {})",
            file.node.path,
            directory.version(),
            file.unity_version,
            directory.target_platform
        );
        for warning in &directory.warnings {
            println!("  warning: {warning}");
        }

        let mut shown = 0;
        for entry in directory
            .objects
            .iter()
            .filter(|e| class.is_none_or(|c| e.class_id == c))
        {
            println!(
                "  {:>20}  {:<24} {:>10} @ {}",
                entry.path_id,
                directory.type_name(entry),
                format_size(u64::from(entry.byte_size)),
                entry.byte_start
            );
            shown += 1;
        }
        println!("  {shown} of {} objects", directory.objects.len());
        println!();
    }

    Ok(())
}

/// Dump objects decoded against their type trees
pub fn tree(source: &Path, path_id: Option<i64>, output: Option<&Path>) -> anyhow::Result<()> {
    let bundle = AssetBundle::open(source)?;
    let files = bundle.serialized_files()?;
    let source_name = source.to_string_lossy();

    let dump = if let Some(path_id) = path_id {
        let (file, entry) = files
            .iter()
            .find_map(|f| f.directory.object(path_id).map(|e| (f, e)))
            .ok_or_else(|| anyhow::anyhow!("no object with path id {path_id}"))?;
        let tree = file.directory.read_object_tree(entry)?;
        json!({
            "source": source_name,
            "node": file.node.path,
            "pathId": entry.path_id,
            "classId": entry.class_id,
            "type": file.directory.type_name(entry),
            "tree": tree,
        })
    } else {
        let dumps: Vec<Value> = files
            .iter()
            .map(|f| report::object_trees(&format!("{source_name}/{}", f.node.path), &f.directory))
            .collect();
        if dumps.len() == 1 {
            dumps.into_iter().next().unwrap_or(Value::Null)
        } else {
            Value::Array(dumps)
        }
    };

    write_json(&dump, output)
}

/// Write a snapshot summary of a bundle
pub fn snapshot(source: &Path, output: Option<&Path>) -> anyhow::Result<()> {
    let bundle = AssetBundle::open(source)?;
    let name = source
        .file_name()
        .map_or_else(|| source.to_string_lossy(), |n| n.to_string_lossy());
    write_json(&report::bundle_snapshot(&name, &bundle), output)
}

pub(super) fn write_json(value: &Value, output: Option<&Path>) -> anyhow::Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    match output {
        Some(path) => {
            std::fs::write(path, text)?;
            println!("Wrote {}", path.display());
        }
        None => println!("{text}"),
    }
    Ok(())
}

/// Format byte size for display
pub(super) fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * KB;
    const GB: u64 = 1024 * MB;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}
