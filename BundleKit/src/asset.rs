//! High-level access to a whole bundle
//!
//! [`AssetBundle`] owns a parsed [`Container`] and hands out views of its
//! serialized files with the engine version already resolved, so callers can
//! go from a path on disk to decoded meshes in a couple of calls.

use std::path::Path;

use rayon::prelude::*;
use tracing::{debug, trace, warn};

use crate::bundle::{self, Container, Node, ParseOptions};
use crate::error::{Error, Result};
use crate::mesh::{self, DecodeOptions, GeometryRecord, UnityVersion};
use crate::serialized::{self, class_id, MetadataDirectory, ObjectEntry};

/// Options combining bundle parsing and mesh decoding.
#[derive(Debug, Clone, Default)]
pub struct OpenOptions {
    pub parse: ParseOptions,
    pub decode: DecodeOptions,
    /// Use this engine version instead of the one stored in the files.
    pub unity_version: Option<UnityVersion>,
}

impl OpenOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_parse_options(mut self, parse: ParseOptions) -> Self {
        self.parse = parse;
        self
    }

    #[must_use]
    pub fn with_decode_options(mut self, decode: DecodeOptions) -> Self {
        self.decode = decode;
        self
    }

    #[must_use]
    pub fn with_unity_version(mut self, version: UnityVersion) -> Self {
        self.unity_version = Some(version);
        self
    }
}

/// A serialized file inside a bundle with its resolved engine version.
#[derive(Debug)]
pub struct SerializedFile<'a> {
    pub node: &'a Node,
    pub directory: MetadataDirectory<'a>,
    pub unity_version: UnityVersion,
}

/// Outcome of decoding one mesh object.
#[derive(Debug)]
pub struct MeshEntry {
    /// Path of the serialized file node holding the object.
    pub file: String,
    pub path_id: i64,
    pub result: Result<GeometryRecord>,
}

/// A parsed bundle plus the options used to read it.
#[derive(Debug, Clone)]
pub struct AssetBundle {
    container: Container,
    options: OpenOptions,
}

impl AssetBundle {
    /// Open and parse a bundle file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_options(path, OpenOptions::default())
    }

    pub fn open_with_options<P: AsRef<Path>>(path: P, options: OpenOptions) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref())?;
        Self::from_bytes_with_options(&bytes, options)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_bytes_with_options(bytes, OpenOptions::default())
    }

    pub fn from_bytes_with_options(bytes: &[u8], options: OpenOptions) -> Result<Self> {
        let container = bundle::parse_with_options(bytes, &options.parse)?;
        Ok(Self::from_container(container, options))
    }

    #[must_use]
    pub fn from_container(container: Container, options: OpenOptions) -> Self {
        Self { container, options }
    }

    #[must_use]
    pub fn container(&self) -> &Container {
        &self.container
    }

    #[must_use]
    pub fn options(&self) -> &OpenOptions {
        &self.options
    }

    /// Engine version for a file: the override, the file's own version, or
    /// the bundle's revision when the file's version was stripped.
    fn resolve_version(&self, stored: &str) -> Result<UnityVersion> {
        if let Some(version) = &self.options.unity_version {
            return Ok(version.clone());
        }
        match stored.parse::<UnityVersion>() {
            Ok(version) if !version.is_stripped() => Ok(version),
            _ => {
                let revision = &self.container.header.unity_revision;
                debug!("version {stored:?} unusable, falling back to bundle revision {revision}");
                revision.parse()
            }
        }
    }

    /// Parse every serialized file node.
    pub fn serialized_files(&self) -> Result<Vec<SerializedFile<'_>>> {
        self.container
            .serialized_files()
            .into_iter()
            .map(|node| {
                let directory = serialized::parse(self.container.extract(node)?)?;
                let unity_version = self.resolve_version(&directory.unity_version)?;
                Ok(SerializedFile {
                    node,
                    directory,
                    unity_version,
                })
            })
            .collect()
    }

    /// Decode every mesh sequentially. Per-object failures are kept in the entries.
    pub fn decode_meshes(&self) -> Result<Vec<MeshEntry>> {
        let files = self.serialized_files()?;
        Ok(mesh_jobs(&files)
            .into_iter()
            .map(|(file, entry)| self.decode_entry(file, entry))
            .collect())
    }

    /// Decode every mesh on the rayon thread pool. Order matches [`Self::decode_meshes`].
    pub fn decode_meshes_parallel(&self) -> Result<Vec<MeshEntry>> {
        let files = self.serialized_files()?;
        Ok(mesh_jobs(&files)
            .into_par_iter()
            .map(|(file, entry)| self.decode_entry(file, entry))
            .collect())
    }

    fn decode_entry(&self, file: &SerializedFile<'_>, entry: &ObjectEntry) -> MeshEntry {
        trace!("decoding mesh {} in {}", entry.path_id, file.node.path);
        let result = file.decode_mesh(entry, &self.container, self.options.decode);
        if let Err(e) = &result {
            warn!("mesh {} in {}: {e}", entry.path_id, file.node.path);
        }
        MeshEntry {
            file: file.node.path.clone(),
            path_id: entry.path_id,
            result,
        }
    }
}

fn mesh_jobs<'f, 'a>(
    files: &'f [SerializedFile<'a>],
) -> Vec<(&'f SerializedFile<'a>, &'f ObjectEntry)> {
    files
        .iter()
        .flat_map(|file| {
            file.directory
                .objects_of_class(class_id::MESH)
                .map(move |entry| (file, entry))
        })
        .collect()
}

impl SerializedFile<'_> {
    /// `true` when the type tree of `entry` lists a `m_CompressedMesh` field.
    fn stores_compressed_mesh(&self, entry: &ObjectEntry) -> bool {
        self.directory.type_tree(entry).is_some_and(|tree| {
            !tree.is_empty() && tree.child_by_name(0, "m_CompressedMesh").is_some()
        })
    }

    /// Decode one Mesh object of this file.
    ///
    /// # Errors
    /// [`Error::NotAMesh`] for other classes, or any decoding error.
    pub fn decode_mesh(
        &self,
        entry: &ObjectEntry,
        resolver: &dyn bundle::ResourceResolver,
        options: DecodeOptions,
    ) -> Result<GeometryRecord> {
        if entry.class_id != class_id::MESH {
            return Err(Error::NotAMesh {
                path_id: entry.path_id,
                class_id: entry.class_id,
            });
        }
        let options = options.with_compressed_mesh_always_serialized(
            options.compressed_mesh_always_serialized || self.stores_compressed_mesh(entry),
        );
        let bytes = self.directory.read_object_bytes(entry)?;
        mesh::decode_with_options(
            bytes,
            &self.unity_version,
            self.directory.endianness(),
            Some(resolver),
            &options,
        )
    }
}
