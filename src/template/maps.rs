//! `Merge::Map` macro expansion
//!
//! ```yaml
//! Networks:
//!   Merge::Map:
//!     Compute0: {Ref: Compute0Port}
//!     Compute1: {Ref: Compute1Port}
//! ```
//!
//! becomes `Networks: [{Ref: Compute0Port}, {Ref: Compute1Port}]`. The values
//! are sorted so the output does not depend on mapping order.

use log::warn;

use super::MERGE_MAP;
use crate::error::{Error, Result};
use crate::tree::Tree;

/// Replace every mapping holding a `Merge::Map` key with the sorted list of
/// that macro's values, expanding nested macros first.
///
/// Applying this twice gives the same result as applying it once.
pub fn apply_maps(tree: &Tree) -> Result<Tree> {
    match tree {
        Tree::Mapping(map) => {
            if let Some(body) = map.get(MERGE_MAP) {
                if map.len() > 1 {
                    warn!(
                        "Ignoring {} key(s) next to {}",
                        map.len() - 1,
                        MERGE_MAP
                    );
                }
                let body = body.as_mapping().ok_or_else(|| {
                    Error::config(format!(
                        "{} body must be a mapping, found {}",
                        MERGE_MAP,
                        body.type_name()
                    ))
                })?;
                let mut values = body
                    .values()
                    .map(apply_maps)
                    .collect::<Result<Vec<_>>>()?;
                values.sort();
                return Ok(Tree::Sequence(values));
            }
            Ok(Tree::Mapping(
                map.iter()
                    .map(|(k, v)| -> Result<(String, Tree)> { Ok((k.clone(), apply_maps(v)?)) })
                    .collect::<Result<_>>()?,
            ))
        }
        Tree::Sequence(items) => Ok(Tree::Sequence(
            items.iter().map(apply_maps).collect::<Result<_>>()?,
        )),
        Tree::Scalar(_) => Ok(tree.clone()),
    }
}
