//! Parameter substitution
//!
//! Replaces every `{Ref: name}` marker in a tree with a literal value. The
//! value may itself be a container, so a single parameter can expand into a
//! whole mapping or list.

use crate::tree::Tree;

/// Replace each mapping exactly equal to `{Ref: name}` with `value`.
///
/// Every other node is rebuilt with its children substituted independently.
/// There is no guard against `value` containing `{Ref: name}` itself; such a
/// value is inserted as-is and not substituted again.
///
/// # Examples
///
/// ```
/// use heat_merge::template::params::resolve_params;
/// use heat_merge::tree::Tree;
///
/// let tree = Tree::from_yaml_str("flavor: {Ref: Flavor}").unwrap();
/// let resolved = resolve_params(&tree, "Flavor", &Tree::from("m1.large"));
/// assert_eq!(resolved.get("flavor"), Some(&Tree::from("m1.large")));
/// ```
pub fn resolve_params(tree: &Tree, name: &str, value: &Tree) -> Tree {
    if tree.is_ref_to(name) {
        return value.clone();
    }
    match tree {
        Tree::Mapping(map) => Tree::Mapping(
            map.iter()
                .map(|(k, v)| (k.clone(), resolve_params(v, name, value)))
                .collect(),
        ),
        Tree::Sequence(items) => Tree::Sequence(
            items
                .iter()
                .map(|item| resolve_params(item, name, value))
                .collect(),
        ),
        Tree::Scalar(_) => tree.clone(),
    }
}
