//! `__include__` directive expansion
//!
//! An include directive splices the content of another template file into the
//! mapping that contains it:
//!
//! ```yaml
//! Resources:
//!   __include__:
//!     path: compute.yaml
//!     params:
//!       ImageName: overcloud-compute
//!     subkey: Resources
//! ```
//!
//! `path` is required. A relative `path` is resolved against the directory of
//! the file holding the directive, so nested includes follow the file they
//! appear in. `params` are substituted into the loaded content before
//! it is spliced and flow down into includes nested inside it, but never to
//! sibling includes or to the enclosing document. `subkey` selects a single key
//! (or list index) of the loaded document.

use log::debug;
use std::path::{Path, PathBuf};

use super::params::resolve_params;
use super::INCLUDE;
use crate::error::{Error, Result};
use crate::filesystem::TemplateSource;
use crate::tree::{Mapping, Scalar, Tree};

/// Expand every `__include__` directive found in the mappings of `tree`.
///
/// `params` are the substitutions inherited from enclosing includes (empty at
/// the top level). Relative include paths are resolved against `base_dir`,
/// the directory of the file `tree` was loaded from.
/// Sequences are passed through untouched; includes are only recognised as
/// mapping keys.
///
/// Keys written next to an `__include__` take precedence over spliced keys of
/// the same name.
///
/// # Errors
///
/// Returns `Error::Config` for a malformed directive or for included content
/// that is not a mapping, and `Error::FileRead` when the file cannot be read.
pub fn resolve_includes(
    tree: &Tree,
    params: &Mapping,
    base_dir: &Path,
    source: &dyn TemplateSource,
) -> Result<Tree> {
    match tree {
        Tree::Mapping(map) => Ok(Tree::Mapping(resolve_mapping(
            map, params, base_dir, source,
        )?)),
        other => Ok(other.clone()),
    }
}

fn resolve_mapping(
    map: &Mapping,
    params: &Mapping,
    base_dir: &Path,
    source: &dyn TemplateSource,
) -> Result<Mapping> {
    let mut resolved = Mapping::new();

    if let Some(directive) = map.get(INCLUDE) {
        resolved.extend(expand_directive(directive, params, base_dir, source)?);
    }

    for (key, value) in map {
        if key == INCLUDE {
            continue;
        }
        let value = match value {
            Tree::Mapping(inner) => {
                Tree::Mapping(resolve_mapping(inner, params, base_dir, source)?)
            }
            other => other.clone(),
        };
        resolved.insert(key.clone(), value);
    }

    Ok(resolved)
}

fn expand_directive(
    directive: &Tree,
    params: &Mapping,
    base_dir: &Path,
    source: &dyn TemplateSource,
) -> Result<Mapping> {
    let directive = directive
        .as_mapping()
        .ok_or_else(|| Error::config("__include__ must be a mapping"))?;

    let path = match directive.get("path") {
        Some(path) => path
            .as_str()
            .ok_or_else(|| Error::config("__include__ path must be a string"))?,
        None => {
            return Err(Error::config_with_hint(
                "__include__ must have path",
                "add 'path: <file>' to the directive",
            ))
        }
    };

    let mut local_params = params.clone();
    if let Some(extra) = directive.get("params") {
        let extra = extra
            .as_mapping()
            .ok_or_else(|| Error::config("__include__ params must be a mapping"))?;
        local_params.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
    }

    let full_path = include_path(base_dir, path);
    debug!("Resolving include {}", full_path.display());
    let mut content = source.load(&full_path)?;

    if let Some(subkey) = directive.get("subkey") {
        content = select_subkey(content, subkey, path)?;
    }

    for (name, value) in &local_params {
        content = resolve_params(&content, name, value);
    }

    let nested_base = full_path.parent().unwrap_or_else(|| Path::new(""));
    match resolve_includes(&content, &local_params, nested_base, source)? {
        Tree::Mapping(map) => Ok(map),
        other => Err(Error::config(format!(
            "included content from {} must be a mapping, found {}",
            path,
            other.type_name()
        ))),
    }
}

fn select_subkey(content: Tree, subkey: &Tree, path: &str) -> Result<Tree> {
    match content {
        Tree::Sequence(mut items) => {
            let idx = subkey
                .as_i64()
                .ok_or_else(|| Error::config("subkey for list templates must be int"))?;
            let len = items.len();
            usize::try_from(idx)
                .ok()
                .filter(|idx| *idx < len)
                .map(|idx| items.swap_remove(idx))
                .ok_or_else(|| {
                    Error::config(format!(
                        "subkey {} out of range for {} ({} items)",
                        idx, path, len
                    ))
                })
        }
        Tree::Mapping(mut map) => {
            let key = match subkey {
                Tree::Scalar(Scalar::Int(i)) => i.to_string(),
                other => other
                    .as_str()
                    .ok_or_else(|| Error::config("subkey must be a string or int"))?
                    .to_string(),
            };
            map.remove(&key)
                .ok_or_else(|| Error::config(format!("subkey '{}' not found in {}", key, path)))
        }
        other => Err(Error::config(format!(
            "cannot apply subkey to {} content of {}",
            other.type_name(),
            path
        ))),
    }
}

fn include_path(base_dir: &Path, path: &str) -> PathBuf {
    let path = Path::new(path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filesystem::MemoryFS;

    fn yaml(text: &str) -> Tree {
        Tree::from_yaml_str(text).unwrap()
    }

    fn resolve(tree: &Tree, fs: &MemoryFS) -> Result<Tree> {
        resolve_includes(tree, &Mapping::new(), Path::new("t"), fs)
    }

    #[test]
    fn test_include_with_params_is_spliced() {
        let fs = MemoryFS::new().with_file("t/sub.yaml", "val: {Ref: X}");
        let base = yaml("__include__: {path: sub.yaml, params: {X: 5}}\nother: 1");

        let resolved = resolve(&base, &fs).unwrap();
        assert_eq!(resolved, yaml("val: 5\nother: 1"));
    }

    #[test]
    fn test_nested_mapping_include() {
        let fs = MemoryFS::new().with_file("t/params.yaml", "Flavor: {Type: String}");
        let base = yaml("Parameters:\n  __include__: {path: params.yaml}\n  Image: {Type: String}");

        let resolved = resolve(&base, &fs).unwrap();
        let params = resolved.get("Parameters").unwrap();
        assert!(params.get("Flavor").is_some());
        assert!(params.get("Image").is_some());
        assert!(params.get(INCLUDE).is_none());
    }

    #[test]
    fn test_params_flow_into_nested_includes() {
        let fs = MemoryFS::new()
            .with_file("t/outer.yaml", "inner:\n  __include__: {path: inner.yaml}")
            .with_file("t/inner.yaml", "value: {Ref: X}");
        let base = yaml("__include__: {path: outer.yaml, params: {X: deep}}");

        let resolved = resolve(&base, &fs).unwrap();
        assert_eq!(resolved, yaml("inner: {value: deep}"));
    }

    #[test]
    fn test_nested_include_is_relative_to_including_file() {
        let fs = MemoryFS::new()
            .with_file("t/sub/outer.yaml", "inner:\n  __include__: {path: inner.yaml}")
            .with_file("t/sub/inner.yaml", "value: found");
        let base = yaml("__include__: {path: sub/outer.yaml}");

        let resolved = resolve(&base, &fs).unwrap();
        assert_eq!(resolved, yaml("inner: {value: found}"));
    }

    #[test]
    fn test_params_do_not_leak_to_siblings() {
        let fs = MemoryFS::new()
            .with_file("t/a.yaml", "a: {Ref: X}")
            .with_file("t/b.yaml", "b: {Ref: X}");
        let base = yaml(
            "first:\n  __include__: {path: a.yaml, params: {X: 1}}\nsecond:\n  __include__: {path: b.yaml}",
        );

        let resolved = resolve(&base, &fs).unwrap();
        assert_eq!(resolved, yaml("first: {a: 1}\nsecond: {b: {Ref: X}}"));
    }

    #[test]
    fn test_subkey_on_mapping() {
        let fs = MemoryFS::new().with_file("t/full.yaml", "Resources: {A: {Type: T}}\nOutputs: {}");
        let base = yaml("__include__: {path: full.yaml, subkey: Resources}");

        let resolved = resolve(&base, &fs).unwrap();
        assert_eq!(resolved, yaml("A: {Type: T}"));
    }

    #[test]
    fn test_subkey_on_list() {
        let fs = MemoryFS::new().with_file("t/list.yaml", "- {a: 1}\n- {b: 2}");
        let base = yaml("__include__: {path: list.yaml, subkey: 1}");

        let resolved = resolve(&base, &fs).unwrap();
        assert_eq!(resolved, yaml("b: 2"));
    }

    #[test]
    fn test_string_subkey_on_list_fails() {
        let fs = MemoryFS::new().with_file("t/list.yaml", "- {a: 1}");
        let base = yaml("__include__: {path: list.yaml, subkey: first}");

        let err = resolve(&base, &fs).unwrap_err();
        assert!(err.to_string().contains("must be int"));
    }

    #[test]
    fn test_missing_path_fails() {
        let base = yaml("__include__: {params: {X: 1}}");
        let err = resolve(&base, &MemoryFS::new()).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
        assert!(err.to_string().contains("must have path"));
    }

    #[test]
    fn test_non_mapping_params_fails() {
        let base = yaml("__include__: {path: sub.yaml, params: [1, 2]}");
        let err = resolve(&base, &MemoryFS::new()).unwrap_err();
        assert!(err.to_string().contains("params must be a mapping"));
    }

    #[test]
    fn test_missing_file_fails() {
        let base = yaml("__include__: {path: nowhere.yaml}");
        let err = resolve(&base, &MemoryFS::new()).unwrap_err();
        assert!(matches!(err, Error::FileRead { .. }));
    }

    #[test]
    fn test_lists_are_not_searched() {
        let base = yaml("items:\n  - __include__: {path: never.yaml}");
        let resolved = resolve(&base, &MemoryFS::new()).unwrap();
        assert_eq!(resolved, base);
    }

    #[test]
    fn test_sibling_keys_override_spliced_keys() {
        let fs = MemoryFS::new().with_file("t/sub.yaml", "shared: included\nonly: sub");
        let base = yaml("__include__: {path: sub.yaml}\nshared: local");

        let resolved = resolve(&base, &fs).unwrap();
        assert_eq!(resolved, yaml("shared: local\nonly: sub"));
    }

    #[test]
    fn test_absolute_path_ignores_base_dir() {
        let fs = MemoryFS::new().with_file("/abs/sub.yaml", "k: v");
        let base = yaml("__include__: {path: /abs/sub.yaml}");
        assert_eq!(resolve(&base, &fs).unwrap(), yaml("k: v"));
    }
}
