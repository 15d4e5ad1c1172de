//! Reference fixing after resource renames
//!
//! When the merger renames a resource (role aliasing, `FileInclude`
//! absorption) every structural reference to the old name has to follow.
//! Four reference shapes are recognised anywhere in the document:
//!
//! - `{Ref: old}`
//! - `{DependsOn: old}` (and each `old` in a list-form `DependsOn`)
//! - `{Fn::GetAtt: [old, attribute]}`
//! - `{AllowedResources: [.., old, ..]}`

use log::debug;

use super::{ALLOWED_RESOURCES, DEPENDS_ON, GET_ATT, REF};
use crate::tree::Tree;

/// One rename event produced during a merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceChange {
    pub old: String,
    pub new: String,
}

impl ResourceChange {
    pub fn new(old: impl Into<String>, new: impl Into<String>) -> Self {
        Self {
            old: old.into(),
            new: new.into(),
        }
    }
}

/// Rewrite every reference to `old` inside `tree` so it points at `new`.
///
/// The whole tree is walked, not just resource bodies, since references also
/// appear in Parameters and Outputs.
pub fn fix_ref(tree: &mut Tree, old: &str, new: &str) {
    match tree {
        Tree::Mapping(map) => {
            for (key, value) in map.iter_mut() {
                let fixed = match key.as_str() {
                    REF => replace_scalar(value, old, new),
                    DEPENDS_ON => replace_scalar(value, old, new) || replace_all(value, old, new),
                    GET_ATT => replace_first(value, old, new),
                    ALLOWED_RESOURCES => replace_all(value, old, new),
                    _ => false,
                };
                if !fixed {
                    fix_ref(value, old, new);
                }
            }
        }
        Tree::Sequence(items) => {
            for item in items.iter_mut() {
                fix_ref(item, old, new);
            }
        }
        Tree::Scalar(_) => {}
    }
}

/// Replay a rename log against `tree`, in order.
pub fn apply_changes(tree: &mut Tree, changes: &[ResourceChange]) {
    for change in changes {
        debug!("Fixing references {} -> {}", change.old, change.new);
        fix_ref(tree, &change.old, &change.new);
    }
}

fn replace_scalar(value: &mut Tree, old: &str, new: &str) -> bool {
    if value.as_str() == Some(old) {
        *value = Tree::string(new);
        return true;
    }
    false
}

fn replace_first(value: &mut Tree, old: &str, new: &str) -> bool {
    match value.as_sequence_mut().and_then(|items| items.first_mut()) {
        Some(first) => replace_scalar(first, old, new),
        None => false,
    }
}

fn replace_all(value: &mut Tree, old: &str, new: &str) -> bool {
    let Some(items) = value.as_sequence_mut() else {
        return false;
    };
    let mut fixed = false;
    for item in items.iter_mut() {
        fixed |= replace_scalar(item, old, new);
    }
    fixed
}
