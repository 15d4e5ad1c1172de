//! Template transformation passes
//!
//! Each submodule is one stage of the merge pipeline. Every stage is a plain
//! recursive function over [`Tree`]; none of them keeps state between calls.
//!
//! ## Stages
//!
//! - [`include`] - expands `__include__` directives
//! - [`params`] - replaces `{Ref: name}` markers with literal values
//! - [`merge`] - unions templates into one document
//! - [`scaling`] - clones prefixed names into numbered copies
//! - [`maps`] - expands the `Merge::Map` macro
//! - [`refs`] - rewrites references after a resource is renamed
//!
//! ## Common Types
//!
//! The `PathSegment` enum and [`parse_path`] describe dotted/indexed key paths
//! such as `Resources.Controller` or `items[0].name`, used by `FileInclude`
//! resources to pick a sub-document out of a file.

pub mod include;
pub mod maps;
pub mod merge;
pub mod params;
pub mod refs;
pub mod scaling;

use crate::error::{Error, Result};
use crate::tree::Tree;

/// Reference marker key: `{Ref: name}`.
pub const REF: &str = "Ref";
/// Dependency key of a resource.
pub const DEPENDS_ON: &str = "DependsOn";
/// Attribute lookup function: `{Fn::GetAtt: [name, attribute]}`.
pub const GET_ATT: &str = "Fn::GetAtt";
/// Resource allow-list key used by wait conditions and access policies.
pub const ALLOWED_RESOURCES: &str = "AllowedResources";
/// The map macro key.
pub const MERGE_MAP: &str = "Merge::Map";
/// The include directive key.
pub const INCLUDE: &str = "__include__";

/// Represents a segment in a path expression for navigating nested structures
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PathSegment {
    /// A named key for accessing mapping members
    Key(String),
    /// A numeric index for accessing sequence elements
    Index(usize),
}

/// Parse a `SubKey` path into segments
///
/// Supports:
/// - Dot notation: `Resources.Controller`
/// - Array indices: `items[1]` (a purely numeric dotted segment such as
///   `items.1` also indexes into sequences, see [`descend`])
/// - Quoted keys: `Metadata["OpenStack::Role"]`
///
/// # Examples
///
/// ```
/// use heat_merge::template::{parse_path, PathSegment};
///
/// let segments = parse_path("Resources.Servers[0]");
/// assert_eq!(segments.len(), 3);
/// assert_eq!(segments[2], PathSegment::Index(0));
/// ```
pub fn parse_path(path: &str) -> Vec<PathSegment> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = path.trim().chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '.' => {
                if !current.is_empty() {
                    segments.push(PathSegment::Key(std::mem::take(&mut current)));
                }
            }
            '[' => {
                if !current.is_empty() {
                    segments.push(PathSegment::Key(std::mem::take(&mut current)));
                }

                let mut inner = String::new();
                for next in chars.by_ref() {
                    if next == ']' {
                        break;
                    }
                    inner.push(next);
                }
                let inner = inner.trim();

                if let Ok(idx) = inner.parse::<usize>() {
                    segments.push(PathSegment::Index(idx));
                } else {
                    let unquoted = inner.trim_matches(|c| c == '"' || c == '\'');
                    if !unquoted.is_empty() {
                        segments.push(PathSegment::Key(unquoted.to_string()));
                    }
                }
            }
            _ => current.push(ch),
        }
    }

    if !current.is_empty() {
        segments.push(PathSegment::Key(current));
    }

    segments
}

/// Follow `path` into `tree`, returning the selected sub-document.
///
/// A key segment that parses as an integer also indexes a sequence, and an
/// index segment also looks up the matching string key of a mapping.
pub fn descend(tree: Tree, path: &[PathSegment]) -> Result<Tree> {
    let mut current = tree;
    for segment in path {
        current = match (segment, current) {
            (PathSegment::Key(key), Tree::Mapping(mut map)) => {
                map.remove(key).ok_or_else(|| {
                    Error::config(format!("SubKey segment '{}' not found", key))
                })?
            }
            (PathSegment::Index(idx), Tree::Mapping(mut map)) => {
                map.remove(&idx.to_string()).ok_or_else(|| {
                    Error::config(format!("SubKey segment '{}' not found", idx))
                })?
            }
            (PathSegment::Key(key), Tree::Sequence(items)) => match key.parse::<usize>() {
                Ok(idx) => take_index(items, idx)?,
                Err(_) => {
                    return Err(Error::config(format!(
                        "SubKey segment '{}' must be an integer to index a sequence",
                        key
                    )))
                }
            },
            (PathSegment::Index(idx), Tree::Sequence(items)) => take_index(items, *idx)?,
            (segment, other) => {
                return Err(Error::config(format!(
                    "cannot descend into {} with SubKey segment {:?}",
                    other.type_name(),
                    segment
                )))
            }
        };
    }
    Ok(current)
}

fn take_index(mut items: Vec<Tree>, idx: usize) -> Result<Tree> {
    if idx >= items.len() {
        return Err(Error::config(format!(
            "SubKey index {} out of range for sequence of length {}",
            idx,
            items.len()
        )));
    }
    Ok(items.swap_remove(idx))
}
