use clap::Subcommand;
use std::path::PathBuf;

pub mod compare;
pub mod execute;
pub mod extract;
pub mod inspect;
pub mod meshes;
pub mod validate;

#[derive(Subcommand)]
pub enum Commands {
    /// Show the bundle header, storage blocks and data offset
    Info {
        /// Source bundle file
        source: PathBuf,

        /// Print the reference JSON instead of a summary
        #[arg(long)]
        json: bool,
    },

    /// List the nodes (virtual files) of a bundle
    Nodes {
        /// Source bundle file
        source: PathBuf,
    },

    /// List the objects of every serialized file in a bundle
    Objects {
        /// Source bundle file
        source: PathBuf,

        /// Only show objects of this class id
        #[arg(short, long)]
        class: Option<i32>,

        /// Print the object tables as JSON
        #[arg(long)]
        json: bool,
    },

    /// Dump objects decoded against their type trees as JSON
    Tree {
        /// Source bundle file
        source: PathBuf,

        /// Only dump this object
        #[arg(short, long)]
        path_id: Option<i64>,

        /// Write the JSON to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Decode every Mesh object and print a summary
    Meshes {
        /// Source bundle file
        source: PathBuf,

        /// Override the engine version (e.g. 2019.4.31f1)
        #[arg(long)]
        unity_version: Option<String>,

        /// Skip submesh triangulation
        #[arg(long)]
        no_triangles: bool,

        /// Print mesh diagnostics as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write every node of a bundle to a directory
    Extract {
        /// Source bundle file
        #[arg(short, long)]
        source: PathBuf,

        /// Output directory
        #[arg(short, long)]
        destination: PathBuf,

        /// Only extract nodes whose path contains this text
        #[arg(long)]
        filter: Option<String>,

        /// Suppress progress bar
        #[arg(short, long)]
        quiet: bool,
    },

    /// Validate a bundle, or every bundle under a directory
    Validate {
        /// Bundle file or directory to scan
        source: PathBuf,

        /// Treat overlapping nodes as errors
        #[arg(long)]
        strict: bool,

        /// Expected 16-byte blocks info hash, hex encoded
        #[arg(long)]
        reference_hash: Option<String>,

        /// Suppress progress bar
        #[arg(short, long)]
        quiet: bool,
    },

    /// Write a snapshot summary of a bundle as JSON
    Snapshot {
        /// Source bundle file
        source: PathBuf,

        /// Write the JSON to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Compare two object-tree JSON dumps
    Compare {
        /// Left dump
        left: PathBuf,

        /// Right dump
        right: PathBuf,

        /// Maximum number of differences to print per object
        #[arg(long, default_value_t = 50)]
        max: usize,
    },
}
