//! Command execution implementations

use super::Commands;
use super::{compare, extract, inspect, meshes, validate};

impl Commands {
    /// Execute the selected command.
    ///
    /// # Errors
    /// Returns an error if the underlying command fails.
    pub fn execute(&self) -> anyhow::Result<()> {
        match self {
            Commands::Info { source, json } => inspect::info(source, *json),
            Commands::Nodes { source } => inspect::nodes(source),
            Commands::Objects { source, class, json } => inspect::objects(source, *class, *json),
            Commands::Tree {
                source,
                path_id,
                output,
            } => inspect::tree(source, *path_id, output.as_deref()),
            Commands::Meshes {
                source,
                unity_version,
                no_triangles,
                json,
            } => meshes::execute(source, unity_version.as_deref(), *no_triangles, *json),
            Commands::Extract {
                source,
                destination,
                filter,
                quiet,
            } => extract::execute(source, destination, filter.as_deref(), *quiet),
            Commands::Validate {
                source,
                strict,
                reference_hash,
                quiet,
            } => validate::execute(source, *strict, reference_hash.as_deref(), *quiet),
            Commands::Snapshot { source, output } => inspect::snapshot(source, output.as_deref()),
            Commands::Compare { left, right, max } => compare::execute(left, right, *max),
        }
    }
}
