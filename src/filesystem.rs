//! Template sources
//!
//! The merge engine does no file I/O of its own beyond following
//! `__include__` and `FileInclude` paths, and it does that through the
//! [`TemplateSource`] trait. [`DiskFS`] reads real files; [`MemoryFS`] keeps
//! template text in memory for tests and embedders.

use log::debug;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::tree::Tree;

/// Something that can load a template document by path.
pub trait TemplateSource {
    /// Load and parse the template at `path`.
    fn load(&self, path: &Path) -> Result<Tree>;
}

/// Loads templates from the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiskFS;

impl TemplateSource for DiskFS {
    fn load(&self, path: &Path) -> Result<Tree> {
        debug!("Loading template {}", path.display());
        let content = std::fs::read_to_string(path).map_err(|source| Error::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        Tree::from_yaml_str(&content)
    }
}

/// In-memory template store
#[derive(Debug, Clone, Default)]
pub struct MemoryFS {
    /// Files stored as path -> content mapping
    files: HashMap<PathBuf, String>,
}

impl MemoryFS {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or update a file with string content
    pub fn add_file_string<P: AsRef<Path>>(&mut self, path: P, content: &str) {
        self.files
            .insert(path.as_ref().to_path_buf(), content.to_string());
    }

    /// Builder-style variant of [`MemoryFS::add_file_string`]
    pub fn with_file<P: AsRef<Path>>(mut self, path: P, content: &str) -> Self {
        self.add_file_string(path, content);
        self
    }

}

impl TemplateSource for MemoryFS {
    fn load(&self, path: &Path) -> Result<Tree> {
        match self.files.get(path) {
            Some(content) => Tree::from_yaml_str(content),
            None => Err(Error::FileRead {
                path: path.to_path_buf(),
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "File not found in memory filesystem",
                ),
            }),
        }
    }
}
