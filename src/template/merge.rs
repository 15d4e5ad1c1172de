//! Template merging
//!
//! Combines an ordered list of templates into one document. Parameters and
//! Outputs are unioned by name. Resources are unioned too, except that
//! server-like resources are identified by their role: two templates that
//! each declare a server with `Metadata: {OpenStack::Role: Compute}` describe
//! the *same* server, so their metadata is merged into one resource.
//!
//! Definitions that collide with a different body are reported as
//! [`Conflict`]s; the first definition wins and the merge carries on. Only
//! malformed input aborts a merge.
//!
//! After every template is folded in, the document goes through scaling, the
//! `Merge::Map` macro and finally the rename log is replayed so that
//! references follow renamed resources.

use log::{debug, warn};
use std::io::Write;
use std::path::Path;
use thiserror::Error;

use super::include::resolve_includes;
use super::maps::apply_maps;
use super::params::resolve_params;
use super::refs::{apply_changes, ResourceChange};
use super::scaling::apply_scaling;
use super::{descend, parse_path, PathSegment, REF};
use crate::config::MergeOptions;
use crate::error::{Error, Result};
use crate::filesystem::TemplateSource;
use crate::tree::{Mapping, Scalar, Tree};

/// Format version written to every merged document.
pub const FORMAT_VERSION: &str = "2012-12-12";
/// Metadata key declaring a resource's role.
pub const ROLE_KEY: &str = "OpenStack::Role";
/// Metadata key whose lists are concatenated rather than compared.
pub const ELEMENTS_KEY: &str = "OpenStack::ImageBuilder::Elements";
/// Pseudo resource type that pulls a resource body from another file.
pub const FILE_INCLUDE: &str = "FileInclude";
/// Resource type whose merged metadata lands under `Properties.config`.
pub const STRUCTURED_CONFIG: &str = "OS::Heat::StructuredConfig";

const SECTIONS: &[&str] = &[
    "HeatTemplateFormatVersion",
    "Description",
    "Parameters",
    "Resources",
    "Outputs",
];

/// A resource type merged by role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeableType {
    pub name: &'static str,
    /// Property naming the boot image, if the type has one.
    pub image_property: Option<&'static str>,
}

/// Resource types merged by role rather than by key.
pub const MERGEABLE_TYPES: &[MergeableType] = &[
    MergeableType {
        name: "OS::Nova::Server",
        image_property: Some("image"),
    },
    MergeableType {
        name: "AWS::EC2::Instance",
        image_property: Some("ImageId"),
    },
    MergeableType {
        name: "AWS::AutoScaling::LaunchConfiguration",
        image_property: Some("ImageId"),
    },
    MergeableType {
        name: STRUCTURED_CONFIG,
        image_property: None,
    },
];

fn mergeable_type(type_name: &str) -> Option<&'static MergeableType> {
    MERGEABLE_TYPES.iter().find(|t| t.name == type_name)
}

/// A non-fatal merge conflict.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Conflict {
    #[error("Parameter {name} from {template} conflicts.")]
    Parameter { name: String, template: String },

    #[error("Output {name} from {template} conflicts.")]
    Output { name: String, template: String },

    #[error("Resource {name} from {template} conflicts.")]
    Resource { name: String, template: String },

    #[error("Role {role} metadata key {key} conflicts.")]
    RoleMetadata { role: String, key: String },
}

/// The result of a merge: the document plus everything worth reporting.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub document: Tree,
    /// Conflicts in the order they were found.
    pub conflicts: Vec<Conflict>,
    /// The rename log that was replayed over the document.
    pub changes: Vec<ResourceChange>,
}

impl MergeOutcome {
    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }

    /// Write one `ERROR: <conflict>` line per conflict.
    pub fn report_conflicts<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        for conflict in &self.conflicts {
            writeln!(out, "ERROR: {}", conflict)?;
        }
        Ok(())
    }
}

/// Map a role through the master/slave translation.
///
/// Roles listed in `slave_roles` become `master_role`; everything else is
/// kept. The role must be a string.
pub fn translate_role(
    role: &Tree,
    master_role: Option<&str>,
    slave_roles: &[String],
) -> Result<String> {
    let role = role.as_str().ok_or_else(|| {
        Error::config_with_hint(
            format!("invalid role translation: role is a {}", role.type_name()),
            format!("{} must be a string", ROLE_KEY),
        )
    })?;
    match master_role {
        Some(master) if slave_roles.iter().any(|slave| slave == role) => Ok(master.to_string()),
        _ => Ok(role.to_string()),
    }
}

/// Merge `templates`, in order, into one document.
///
/// # Errors
///
/// Fails on unreadable files, malformed include directives, invalid role
/// translations, malformed templates and impossible scaling. Conflicts are
/// not errors; they are returned in [`MergeOutcome::conflicts`].
///
/// # Examples
///
/// ```
/// use heat_merge::config::MergeOptions;
/// use heat_merge::filesystem::MemoryFS;
/// use heat_merge::template::merge::merge;
///
/// let fs = MemoryFS::new()
///     .with_file("a.yaml", "Parameters: {Flavor: {Type: String}}")
///     .with_file("b.yaml", "Parameters: {Image: {Type: String}}");
///
/// let outcome = merge(&["a.yaml", "b.yaml"], &MergeOptions::default(), &fs).unwrap();
/// let params = outcome.document.get("Parameters").unwrap();
/// assert!(params.get("Flavor").is_some() && params.get("Image").is_some());
/// assert!(!outcome.has_conflicts());
/// ```
pub fn merge<P: AsRef<Path>>(
    templates: &[P],
    options: &MergeOptions,
    source: &dyn TemplateSource,
) -> Result<MergeOutcome> {
    let mut merger = Merger::new(options, source);
    for template in templates {
        merger.add_template(template.as_ref())?;
    }
    merger.finish()
}

struct Merger<'a> {
    options: &'a MergeOptions,
    source: &'a dyn TemplateSource,
    descriptions: Vec<Tree>,
    parameters: Mapping,
    resources: Mapping,
    outputs: Mapping,
    conflicts: Vec<Conflict>,
    changes: Vec<ResourceChange>,
}

impl<'a> Merger<'a> {
    fn new(options: &'a MergeOptions, source: &'a dyn TemplateSource) -> Self {
        Self {
            options,
            source,
            descriptions: Vec::new(),
            parameters: Mapping::new(),
            resources: Mapping::new(),
            outputs: Mapping::new(),
            conflicts: Vec::new(),
            changes: Vec::new(),
        }
    }

    fn record(&mut self, conflict: Conflict) {
        debug!("Recorded conflict: {}", conflict);
        self.conflicts.push(conflict);
    }

    fn rename(&mut self, old: &str, new: &str) {
        debug!("Resource {} renamed to {}", old, new);
        self.changes.push(ResourceChange::new(old, new));
    }

    fn add_template(&mut self, path: &Path) -> Result<()> {
        let label = path.display().to_string();
        debug!("Merging template {}", label);

        let raw = self.source.load(path)?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new(""));
        let resolved = resolve_includes(&raw, &Mapping::new(), base_dir, self.source)?;
        let Tree::Mapping(template) = resolved else {
            return Err(Error::InvalidTemplate {
                path: label,
                message: format!("root must be a mapping, found {}", resolved.type_name()),
            });
        };

        for key in template.keys() {
            if !SECTIONS.contains(&key.as_str()) {
                warn!("Ignoring top-level key {} in {}", key, label);
            }
        }

        let description = match template.get("Description") {
            Some(Tree::Scalar(Scalar::String(text))) => text.clone(),
            Some(other) => {
                warn!("Description of {} is a {}; using the path", label, other.type_name());
                label.clone()
            }
            None => label.clone(),
        };
        self.descriptions.push(Tree::string(description));

        for (name, body) in section(&template, "Parameters", &label)? {
            match self.parameters.get(name) {
                Some(existing) if existing != body => self.record(Conflict::Parameter {
                    name: name.clone(),
                    template: label.clone(),
                }),
                Some(_) => {}
                None => {
                    self.parameters.insert(name.clone(), body.clone());
                }
            }
        }

        for (name, body) in section(&template, "Outputs", &label)? {
            match self.outputs.get(name) {
                Some(existing) if existing != body => self.record(Conflict::Output {
                    name: name.clone(),
                    template: label.clone(),
                }),
                Some(_) => {}
                None => {
                    self.outputs.insert(name.clone(), body.clone());
                }
            }
        }

        for (name, body) in section(&template, "Resources", &label)? {
            self.add_resource(name, body, &label)?;
        }

        Ok(())
    }

    fn add_resource(&mut self, name: &str, body: &Tree, label: &str) -> Result<()> {
        let invalid = |message: String| Error::InvalidTemplate {
            path: label.to_string(),
            message,
        };
        let fields = body
            .as_mapping()
            .ok_or_else(|| invalid(format!("resource {} must be a mapping", name)))?;
        let type_name = fields
            .get("Type")
            .and_then(Tree::as_str)
            .ok_or_else(|| invalid(format!("resource {} has no Type", name)))?;

        if type_name == FILE_INCLUDE {
            return self.add_file_include(name, fields, label);
        }
        if let Some(kind) = mergeable_type(type_name) {
            return self.add_mergeable(name, body.clone(), kind);
        }

        match self.resources.get(name) {
            Some(existing) if existing != body => self.record(Conflict::Resource {
                name: name.to_string(),
                template: label.to_string(),
            }),
            Some(_) => {}
            None => {
                self.resources.insert(name.to_string(), body.clone());
            }
        }
        Ok(())
    }

    fn add_mergeable(&mut self, name: &str, mut body: Tree, kind: &MergeableType) -> Result<()> {
        let declared = body
            .get("Metadata")
            .and_then(|metadata| metadata.get(ROLE_KEY))
            .cloned()
            .unwrap_or_else(|| Tree::string(name));
        let role = translate_role(
            &declared,
            self.options.master_role.as_deref(),
            &self.options.slave_roles,
        )?;
        if role != name {
            self.rename(name, &role);
        }

        if self.resources.contains_key(&role) {
            if let Some(metadata) = body.get("Metadata").and_then(Tree::as_mapping) {
                self.merge_metadata(&role, metadata);
            }
            return Ok(());
        }

        if self.options.change_image_params {
            if let Some(property) = kind.image_property {
                self.redirect_image(&role, &mut body, property);
            }
        }
        self.resources.insert(role, body);
        Ok(())
    }

    fn merge_metadata(&mut self, role: &str, metadata: &Mapping) {
        let Some(target) = self.resources.get_mut(role).and_then(metadata_target) else {
            warn!("Resource {} has no mapping to merge metadata into", role);
            return;
        };

        let mut conflicting = Vec::new();
        for (key, value) in metadata {
            if key == ROLE_KEY {
                continue;
            }
            match target.get_mut(key) {
                Some(Tree::Sequence(existing)) if key == ELEMENTS_KEY => {
                    if let Some(elements) = value.as_sequence() {
                        existing.extend(elements.iter().cloned());
                    } else {
                        conflicting.push(key.clone());
                    }
                }
                Some(existing) => {
                    if existing != value {
                        conflicting.push(key.clone());
                    }
                }
                None => {
                    target.insert(key.clone(), value.clone());
                }
            }
        }

        for key in conflicting {
            self.record(Conflict::RoleMetadata {
                role: role.to_string(),
                key,
            });
        }
    }

    /// Point the resource's image property at a per-role `<Role>Image`
    /// parameter, creating the parameter if needed.
    fn redirect_image(&mut self, role: &str, body: &mut Tree, property: &str) {
        let image_param = format!("{}Image", role);
        let Some(properties) = body
            .as_mapping_mut()
            .and_then(|fields| fields.get_mut("Properties"))
            .and_then(Tree::as_mapping_mut)
        else {
            return;
        };
        let Some(current) = properties.get(property) else {
            return;
        };

        if !self.parameters.contains_key(&image_param) {
            let referenced = current
                .get(REF)
                .and_then(Tree::as_str)
                .and_then(|name| self.parameters.get(name));
            let definition = match referenced {
                Some(existing) => existing.clone(),
                None => {
                    let mut definition = Mapping::new();
                    definition.insert("Type".to_string(), Tree::string("String"));
                    if current.get(REF).is_none() {
                        definition.insert("Default".to_string(), current.clone());
                    }
                    Tree::Mapping(definition)
                }
            };
            debug!("Adding image parameter {}", image_param);
            self.parameters.insert(image_param.clone(), definition);
        }
        properties.insert(property.to_string(), Tree::reference(image_param));
    }

    fn add_file_include(&mut self, name: &str, fields: &Mapping, label: &str) -> Result<()> {
        let path = fields.get("Path").and_then(Tree::as_str).ok_or_else(|| {
            Error::InvalidTemplate {
                path: label.to_string(),
                message: format!("{} resource {} needs a Path", FILE_INCLUDE, name),
            }
        })?;

        let segments = match fields.get("SubKey") {
            None => Vec::new(),
            Some(Tree::Scalar(Scalar::Int(idx))) => parse_path(&idx.to_string()),
            Some(subkey) => parse_path(subkey.as_str().ok_or_else(|| {
                Error::config(format!("SubKey of {} must be a string", name))
            })?),
        };

        let full_path = self.options.included_template_dir.join(path);
        debug!("Including {} from {}", name, full_path.display());
        let mut content = descend(self.source.load(&full_path)?, &segments)?;

        if let Some(params) = fields.get("Parameters") {
            let params = params.as_mapping().ok_or_else(|| {
                Error::config(format!("Parameters of {} must be a mapping", name))
            })?;
            for (param, value) in params {
                content = resolve_params(&content, param, value);
            }
        }

        if let Some(PathSegment::Key(original)) = segments.last() {
            if original != name {
                self.rename(original, name);
            }
        }

        match self.resources.get(name) {
            Some(existing) if *existing != content => self.record(Conflict::Resource {
                name: name.to_string(),
                template: label.to_string(),
            }),
            Some(_) => {}
            None => {
                self.resources.insert(name.to_string(), content);
            }
        }
        Ok(())
    }

    fn finish(self) -> Result<MergeOutcome> {
        let mut document = Mapping::new();
        document.insert(
            "HeatTemplateFormatVersion".to_string(),
            Tree::string(FORMAT_VERSION),
        );
        document.insert("Description".to_string(), Tree::Sequence(self.descriptions));
        document.insert("Parameters".to_string(), Tree::Mapping(self.parameters));
        document.insert("Resources".to_string(), Tree::Mapping(self.resources));
        document.insert("Outputs".to_string(), Tree::Mapping(self.outputs));

        let scaled = apply_scaling(&Tree::Mapping(document), &self.options.scaling)?;
        let mut document = apply_maps(&scaled)?;
        apply_changes(&mut document, &self.changes);

        if let Some(map) = document.as_mapping_mut() {
            let joined = match map.get("Description") {
                Some(Tree::Sequence(items)) => items
                    .iter()
                    .filter_map(Tree::as_str)
                    .collect::<Vec<_>>()
                    .join(","),
                _ => String::new(),
            };
            map.insert("Description".to_string(), Tree::string(joined));
        }

        Ok(MergeOutcome {
            document,
            conflicts: self.conflicts,
            changes: self.changes,
        })
    }
}

/// Entries of a top-level section, sorted by name. A missing or empty
/// section yields nothing.
fn section<'t>(
    template: &'t Mapping,
    name: &str,
    label: &str,
) -> Result<impl Iterator<Item = (&'t String, &'t Tree)>> {
    let entries = match template.get(name) {
        None | Some(Tree::Scalar(Scalar::Null)) => None,
        Some(Tree::Mapping(map)) => Some(map.iter()),
        Some(other) => {
            return Err(Error::InvalidTemplate {
                path: label.to_string(),
                message: format!("{} must be a mapping, found {}", name, other.type_name()),
            })
        }
    };
    Ok(entries.into_iter().flatten())
}

/// The mapping a merged resource's extra metadata goes into.
fn metadata_target(resource: &mut Tree) -> Option<&mut Mapping> {
    let fields = resource.as_mapping_mut()?;
    if fields.get("Type").and_then(Tree::as_str) == Some(STRUCTURED_CONFIG) {
        let properties = child_mapping(fields, "Properties")?;
        child_mapping(properties, "config")
    } else {
        child_mapping(fields, "Metadata")
    }
}

fn child_mapping<'m>(map: &'m mut Mapping, key: &str) -> Option<&'m mut Mapping> {
    let entry = map.entry(key.to_string()).or_insert_with(Tree::mapping);
    if matches!(entry, Tree::Scalar(Scalar::Null)) {
        *entry = Tree::mapping();
    }
    entry.as_mapping_mut()
}
