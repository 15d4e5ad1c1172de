//! Scale-out of prefixed resource families
//!
//! A scaling rule such as `Compute0=3` clones every mapping key that starts
//! with `Compute0` into three numbered copies (`Compute0Foo`, `Compute1Foo`,
//! `Compute2Foo`). The trailing `0` of the prefix is the digit that gets
//! replaced.
//!
//! Values beneath a copied key stay inside that copy: a `{Ref: Compute0Port}`
//! nested under `Compute1Server` becomes `{Ref: Compute1Port}` rather than being
//! multiplied again. Which copy we are inside is tracked by a [`CopyContext`]
//! passed down the recursion. Beneath a `Merge::Map` macro the context starts
//! over, so a macro body inside a copy can list every copy again.

use log::debug;
use std::collections::BTreeMap;
use std::str::FromStr;

use super::MERGE_MAP;
use crate::error::{Error, Result};
use crate::tree::{Mapping, Tree};

/// One prefix to clone and how many copies to make.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScaleRule {
    prefix: String,
    count: usize,
}

impl ScaleRule {
    /// Create a rule, checking the prefix ends in the digit `0` and the count
    /// is positive.
    pub fn new(prefix: impl Into<String>, count: usize) -> Result<Self> {
        let prefix = prefix.into();
        if !prefix.ends_with('0') {
            return Err(Error::config_with_hint(
                format!("scale prefix '{}' must end in 0", prefix),
                format!("use a prefix such as '{}0'", prefix),
            ));
        }
        if count == 0 {
            return Err(Error::config(format!(
                "scale count for '{}' must be at least 1",
                prefix
            )));
        }
        Ok(Self { prefix, count })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Name of copy `copy` for a value that carried `suffix` after the prefix.
    pub fn copy_name(&self, copy: usize, suffix: &str) -> String {
        let stem = &self.prefix[..self.prefix.len() - 1];
        format!("{}{}{}", stem, copy, suffix)
    }
}

impl FromStr for ScaleRule {
    type Err = Error;

    /// Parse `PREFIX=COUNT`, e.g. `Compute0=3`.
    fn from_str(s: &str) -> Result<Self> {
        let (prefix, count) = s.split_once('=').ok_or_else(|| {
            Error::config_with_hint(
                format!("invalid scale rule '{}'", s),
                "expected PREFIX=COUNT, e.g. Compute0=3",
            )
        })?;
        let count = count.trim().parse::<usize>().map_err(|_| {
            Error::config(format!("scale count '{}' is not a number", count.trim()))
        })?;
        ScaleRule::new(prefix.trim(), count)
    }
}

/// The set of scaling rules for one merge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScalingRules {
    rules: BTreeMap<String, ScaleRule>,
}

impl ScalingRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build rules from a prefix -> count mapping.
    pub fn from_counts(counts: &BTreeMap<String, usize>) -> Result<Self> {
        let mut rules = Self::new();
        for (prefix, count) in counts {
            rules.insert(ScaleRule::new(prefix.clone(), *count)?);
        }
        Ok(rules)
    }

    /// Add a rule, replacing any earlier rule for the same prefix.
    pub fn insert(&mut self, rule: ScaleRule) {
        self.rules.insert(rule.prefix.clone(), rule);
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScaleRule> {
        self.rules.values()
    }

    /// The rule whose prefix starts `value`; the longest prefix wins.
    fn matching(&self, value: &str) -> Option<&ScaleRule> {
        self.rules
            .values()
            .filter(|rule| value.starts_with(&rule.prefix))
            .max_by_key(|rule| rule.prefix.len())
    }
}

impl FromIterator<ScaleRule> for ScalingRules {
    fn from_iter<I: IntoIterator<Item = ScaleRule>>(iter: I) -> Self {
        let mut rules = Self::new();
        for rule in iter {
            rules.insert(rule);
        }
        rules
    }
}

/// Which copy of each prefix the current subtree belongs to.
///
/// Extending a context returns a new value; the parent's context is never
/// modified, so sibling branches cannot observe each other's copies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CopyContext {
    copies: BTreeMap<String, usize>,
}

impl CopyContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// A context that additionally records `prefix` as copy `copy`.
    pub fn with_copy(&self, prefix: &str, copy: usize) -> Self {
        let mut copies = self.copies.clone();
        copies.insert(prefix.to_string(), copy);
        Self { copies }
    }

    pub fn copy_of(&self, prefix: &str) -> Option<usize> {
        self.copies.get(prefix).copied()
    }
}

/// One result of scaling a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scaled {
    /// The matched prefix and copy number, if the value was rewritten.
    pub copy: Option<(String, usize)>,
    pub value: Tree,
}

/// Scale a single value.
///
/// Non-strings and strings without a registered prefix come back unchanged.
/// A string whose prefix is already fixed by `ctx` yields exactly one rewrite
/// for the established copy; otherwise one rewrite per configured copy.
pub fn scale_value(value: &Tree, rules: &ScalingRules, ctx: &CopyContext) -> Vec<Scaled> {
    match value.as_str() {
        Some(text) => scale_text(text, rules, ctx)
            .into_iter()
            .map(|(copy, text)| Scaled {
                copy,
                value: Tree::string(text),
            })
            .collect(),
        None => vec![Scaled {
            copy: None,
            value: value.clone(),
        }],
    }
}

fn scale_text(
    text: &str,
    rules: &ScalingRules,
    ctx: &CopyContext,
) -> Vec<(Option<(String, usize)>, String)> {
    let Some(rule) = rules.matching(text) else {
        return vec![(None, text.to_string())];
    };

    let suffix = &text[rule.prefix.len()..];
    let rewrite = |copy: usize| {
        (
            Some((rule.prefix.clone(), copy)),
            rule.copy_name(copy, suffix),
        )
    };

    match ctx.copy_of(&rule.prefix) {
        Some(copy) => vec![rewrite(copy)],
        None => (0..rule.count).map(rewrite).collect(),
    }
}

/// Clone every prefixed key of `tree` according to `rules`.
///
/// With no rules this returns the tree unchanged.
///
/// # Errors
///
/// Returns `Error::Scaling` when a scalar mapping value would be multiplied
/// outside of any copy, since a mapping entry has room for only one value.
pub fn apply_scaling(tree: &Tree, rules: &ScalingRules) -> Result<Tree> {
    if rules.is_empty() {
        return Ok(tree.clone());
    }
    for rule in rules.iter() {
        debug!("Scaling {} into {} copies", rule.prefix(), rule.count());
    }
    scale_tree(tree, rules, &CopyContext::new())
}

fn scale_tree(tree: &Tree, rules: &ScalingRules, ctx: &CopyContext) -> Result<Tree> {
    match tree {
        Tree::Mapping(map) => scale_mapping(map, rules, ctx),
        Tree::Sequence(items) => {
            let mut scaled = Vec::with_capacity(items.len());
            for item in items {
                if item.is_container() {
                    scaled.push(scale_tree(item, rules, ctx)?);
                } else {
                    scaled.extend(scale_value(item, rules, ctx).into_iter().map(|s| s.value));
                }
            }
            Ok(Tree::Sequence(scaled))
        }
        Tree::Scalar(_) => Ok(tree.clone()),
    }
}

fn scale_mapping(map: &Mapping, rules: &ScalingRules, ctx: &CopyContext) -> Result<Tree> {
    let fresh;
    let ctx = if map.contains_key(MERGE_MAP) {
        fresh = CopyContext::new();
        &fresh
    } else {
        ctx
    };

    let mut scaled = Mapping::new();
    for (key, value) in map {
        for (copy, new_key) in scale_text(key, rules, ctx) {
            let inner = match &copy {
                Some((prefix, n)) => ctx.with_copy(prefix, *n),
                None => ctx.clone(),
            };

            let new_value = if value.is_container() {
                scale_tree(value, rules, &inner)?
            } else {
                single_value(value, rules, &inner)?
            };
            scaled.insert(new_key, new_value);
        }
    }
    Ok(Tree::Mapping(scaled))
}

fn single_value(value: &Tree, rules: &ScalingRules, ctx: &CopyContext) -> Result<Tree> {
    let mut copies = scale_value(value, rules, ctx);
    if copies.len() != 1 {
        return Err(Error::Scaling {
            value: value.as_str().unwrap_or_default().to_string(),
            message: format!(
                "value would be copied {} times but a mapping entry holds one; \
                 place it under a key that carries the same prefix",
                copies.len()
            ),
        });
    }
    Ok(copies.remove(0).value)
}
