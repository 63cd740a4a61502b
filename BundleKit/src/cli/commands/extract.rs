//! CLI command for extracting bundle nodes

use std::path::Path;
use std::time::Instant;

use crate::bundle;
use crate::cli::progress::{print_done, print_step, simple_bar, DISK, LOOKING_GLASS};

pub fn execute(
    source: &Path,
    destination: &Path,
    filter: Option<&str>,
    quiet: bool,
) -> anyhow::Result<()> {
    let start = Instant::now();

    print_step(1, 2, LOOKING_GLASS, &format!("Reading {}...", source.display()));
    let container = bundle::open(source)?;
    let nodes: Vec<_> = container
        .nodes
        .iter()
        .filter(|n| filter.is_none_or(|f| n.path.contains(f)))
        .collect();

    print_step(2, 2, DISK, &format!("Writing {} nodes...", nodes.len()));
    let pb = simple_bar(nodes.len() as u64, "Extracting", quiet);
    for node in &nodes {
        // Node paths use `/` and may carry an `archive:/` style prefix
        let relative = node.path.rsplit_once(":/").map_or(node.path.as_str(), |(_, rest)| rest);
        let target = destination.join(relative.trim_start_matches('/'));
        if !target.starts_with(destination) || relative.split('/').any(|c| c == "..") {
            anyhow::bail!("refusing to write node outside destination: {}", node.path);
        }
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&target, container.extract(node)?)?;
        pb.inc(1);
    }
    pb.finish_and_clear();

    println!("Extracted {} nodes to {}", nodes.len(), destination.display());
    print_done(start.elapsed());

    Ok(())
}
