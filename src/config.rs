//! # Merge Configuration
//!
//! This module defines the options that drive a merge, and the manifest file
//! that lets a deployment keep those options next to its templates instead of
//! on the command line.
//!
//! ## Key Components
//!
//! - **`MergeOptions`**: Everything [`crate::template::merge::merge`] needs
//!   besides the template list: role translation, the include directory,
//!   scaling rules and image-parameter indirection.
//!
//! - **`Manifest`**: The on-disk YAML form of a merge invocation:
//!
//! ```yaml
//! templates:
//!   - overcloud-source.yaml
//!   - swift-source.yaml
//! master_role: controller
//! slave_roles: [swift-storage]
//! included_template_dir: lib
//! scale:
//!   NovaCompute0: 3
//! change_image_params: true
//! ```
//!
//! Relative paths in a manifest are resolved against the directory holding
//! the manifest, so a manifest can be used from any working directory.

use crate::error::{Error, Result};
use crate::template::scaling::ScalingRules;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Options for a single merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOptions {
    /// Role that `slave_roles` are folded into. Without it no translation
    /// happens.
    pub master_role: Option<String>,
    pub slave_roles: Vec<String>,
    /// Directory that `FileInclude` paths are relative to. `__include__`
    /// paths follow the file holding the directive instead.
    pub included_template_dir: PathBuf,
    pub scaling: ScalingRules,
    /// Route server images through per-role `<Role>Image` parameters.
    pub change_image_params: bool,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            master_role: None,
            slave_roles: Vec::new(),
            included_template_dir: PathBuf::from("."),
            scaling: ScalingRules::new(),
            change_image_params: false,
        }
    }
}

impl MergeOptions {
    pub fn with_master_role(mut self, master: impl Into<String>, slaves: Vec<String>) -> Self {
        self.master_role = Some(master.into());
        self.slave_roles = slaves;
        self
    }

    pub fn with_included_template_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.included_template_dir = dir.into();
        self
    }

    pub fn with_scaling(mut self, scaling: ScalingRules) -> Self {
        self.scaling = scaling;
        self
    }

    pub fn with_change_image_params(mut self, enabled: bool) -> Self {
        self.change_image_params = enabled;
        self
    }
}

/// A merge invocation stored as YAML.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    /// Templates to merge, in order.
    #[serde(default)]
    pub templates: Vec<PathBuf>,
    #[serde(default)]
    pub master_role: Option<String>,
    #[serde(default)]
    pub slave_roles: Vec<String>,
    #[serde(default)]
    pub included_template_dir: Option<PathBuf>,
    /// Scaling counts keyed by resource prefix.
    #[serde(default)]
    pub scale: BTreeMap<String, usize>,
    #[serde(default)]
    pub change_image_params: bool,
}

impl Manifest {
    /// Build [`MergeOptions`] from this manifest.
    ///
    /// Fails if any `scale` entry is not a valid scaling rule.
    pub fn options(&self) -> Result<MergeOptions> {
        let mut options = MergeOptions::default()
            .with_scaling(ScalingRules::from_counts(&self.scale)?)
            .with_change_image_params(self.change_image_params);
        if let Some(master) = &self.master_role {
            options = options.with_master_role(master.clone(), self.slave_roles.clone());
        }
        if let Some(dir) = &self.included_template_dir {
            options = options.with_included_template_dir(dir.clone());
        }
        Ok(options)
    }

    fn resolve_paths(&mut self, base: &Path) {
        for template in &mut self.templates {
            if template.is_relative() {
                *template = base.join(&*template);
            }
        }
        if let Some(dir) = &mut self.included_template_dir {
            if dir.is_relative() {
                *dir = base.join(&*dir);
            }
        }
    }
}

/// Parse a manifest from a YAML string. Paths are left as written.
pub fn parse(yaml_content: &str) -> Result<Manifest> {
    serde_yaml::from_str(yaml_content).map_err(|err| {
        Error::config_with_hint(
            format!("invalid manifest: {}", err),
            "known fields are templates, master_role, slave_roles, included_template_dir, scale and change_image_params",
        )
    })
}

/// Read and parse a manifest file, resolving relative paths against the
/// manifest's directory.
pub fn from_file(path: &Path) -> Result<Manifest> {
    let content = std::fs::read_to_string(path).map_err(|source| Error::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    let mut manifest = parse(&content)?;
    if let Some(base) = path.parent() {
        manifest.resolve_paths(base);
    }
    Ok(manifest)
}
