//! # Template Tree Model
//!
//! Every stage of the merge pipeline works over the same generic recursive
//! shape: a [`Tree`] is a scalar, an ordered sequence of trees, or a
//! string-keyed mapping of trees. No stage introduces its own document type.
//!
//! Mappings are `BTreeMap`s, so iteration and serialized output are always in
//! sorted-key order regardless of how the source file was written.
//!
//! Trees carry a total order (`Null < Bool < Number < String < Sequence <
//! Mapping`, numbers compared by value) so that the `Merge::Map` macro can sort
//! arbitrary values deterministically.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use log::debug;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_yaml::Value as YamlValue;

use crate::error::{Error, Result};

/// A string-keyed mapping node.
pub type Mapping = BTreeMap<String, Tree>;

/// A leaf value.
#[derive(Debug, Clone)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl Scalar {
    fn rank(&self) -> u8 {
        match self {
            Scalar::Null => 0,
            Scalar::Bool(_) => 1,
            Scalar::Int(_) | Scalar::Float(_) => 2,
            Scalar::String(_) => 3,
        }
    }
}

impl Ord for Scalar {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Scalar::Null, Scalar::Null) => Ordering::Equal,
            (Scalar::Bool(a), Scalar::Bool(b)) => a.cmp(b),
            (Scalar::Int(a), Scalar::Int(b)) => a.cmp(b),
            (Scalar::Float(a), Scalar::Float(b)) if a == b => Ordering::Equal,
            (Scalar::Float(a), Scalar::Float(b)) => a.total_cmp(b),
            (Scalar::Int(a), Scalar::Float(b)) => cmp_int_float(*a, *b),
            (Scalar::Float(a), Scalar::Int(b)) => cmp_int_float(*b, *a).reverse(),
            (Scalar::String(a), Scalar::String(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

/// Exact comparison of an integer with a float. Casting the integer to `f64`
/// would round values above 2^53 and break transitivity.
fn cmp_int_float(int: i64, float: f64) -> Ordering {
    // 2^63, the first float above i64::MAX
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;

    if float.is_nan() {
        return if float.is_sign_negative() {
            Ordering::Greater
        } else {
            Ordering::Less
        };
    }
    if float >= LIMIT {
        return Ordering::Less;
    }
    if float < -LIMIT {
        return Ordering::Greater;
    }

    let whole = float.trunc();
    match int.cmp(&(whole as i64)) {
        Ordering::Equal if float > whole => Ordering::Less,
        Ordering::Equal if float < whole => Ordering::Greater,
        other => other,
    }
}

impl PartialOrd for Scalar {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Scalar {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Scalar {}

/// A node of a template document.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Tree {
    Scalar(Scalar),
    Sequence(Vec<Tree>),
    Mapping(Mapping),
}

impl Tree {
    /// An empty mapping node.
    pub fn mapping() -> Self {
        Tree::Mapping(Mapping::new())
    }

    /// A string scalar.
    pub fn string(value: impl Into<String>) -> Self {
        Tree::Scalar(Scalar::String(value.into()))
    }

    /// The reference marker `{Ref: name}`.
    pub fn reference(name: impl Into<String>) -> Self {
        let mut map = Mapping::new();
        map.insert(crate::template::REF.to_string(), Tree::string(name));
        Tree::Mapping(map)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Tree::Scalar(Scalar::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Tree::Scalar(Scalar::Int(i)) => Some(*i),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            Tree::Mapping(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_mapping_mut(&mut self) -> Option<&mut Mapping> {
        match self {
            Tree::Mapping(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&Vec<Tree>> {
        match self {
            Tree::Sequence(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_sequence_mut(&mut self) -> Option<&mut Vec<Tree>> {
        match self {
            Tree::Sequence(items) => Some(items),
            _ => None,
        }
    }

    /// Look up `key` if this node is a mapping.
    pub fn get(&self, key: &str) -> Option<&Tree> {
        self.as_mapping().and_then(|map| map.get(key))
    }

    pub fn is_container(&self) -> bool {
        matches!(self, Tree::Sequence(_) | Tree::Mapping(_))
    }

    /// True when this node is exactly the one-entry marker `{Ref: name}`.
    pub fn is_ref_to(&self, name: &str) -> bool {
        match self {
            Tree::Mapping(map) if map.len() == 1 => {
                map.get(crate::template::REF).and_then(Tree::as_str) == Some(name)
            }
            _ => false,
        }
    }

    /// Human-readable kind of node, for messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Tree::Scalar(Scalar::Null) => "Null",
            Tree::Scalar(Scalar::Bool(_)) => "Bool",
            Tree::Scalar(Scalar::Int(_)) | Tree::Scalar(Scalar::Float(_)) => "Number",
            Tree::Scalar(Scalar::String(_)) => "String",
            Tree::Sequence(_) => "Sequence",
            Tree::Mapping(_) => "Mapping",
        }
    }

    /// Parse YAML (or JSON, which is a YAML subset) text into a tree.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let value: YamlValue = serde_yaml::from_str(content)?;
        Tree::try_from(value)
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn to_json_string(&self) -> Result<String> {
        let mut out = serde_json::to_string_pretty(self)?;
        out.push('\n');
        Ok(out)
    }
}

impl From<&str> for Tree {
    fn from(value: &str) -> Self {
        Tree::string(value)
    }
}

impl From<String> for Tree {
    fn from(value: String) -> Self {
        Tree::string(value)
    }
}

impl From<i64> for Tree {
    fn from(value: i64) -> Self {
        Tree::Scalar(Scalar::Int(value))
    }
}

impl From<bool> for Tree {
    fn from(value: bool) -> Self {
        Tree::Scalar(Scalar::Bool(value))
    }
}

impl From<Mapping> for Tree {
    fn from(value: Mapping) -> Self {
        Tree::Mapping(value)
    }
}

impl From<Vec<Tree>> for Tree {
    fn from(value: Vec<Tree>) -> Self {
        Tree::Sequence(value)
    }
}

impl TryFrom<YamlValue> for Tree {
    type Error = Error;

    fn try_from(value: YamlValue) -> Result<Self> {
        Ok(match value {
            YamlValue::Null => Tree::Scalar(Scalar::Null),
            YamlValue::Bool(b) => Tree::Scalar(Scalar::Bool(b)),
            YamlValue::Number(n) => Tree::Scalar(number_to_scalar(&n)),
            YamlValue::String(s) => Tree::Scalar(Scalar::String(s)),
            YamlValue::Sequence(items) => Tree::Sequence(
                items
                    .into_iter()
                    .map(Tree::try_from)
                    .collect::<Result<Vec<_>>>()?,
            ),
            YamlValue::Mapping(map) => {
                let mut out = Mapping::new();
                for (key, value) in map {
                    out.insert(key_to_string(key)?, Tree::try_from(value)?);
                }
                Tree::Mapping(out)
            }
            YamlValue::Tagged(tagged) => {
                let tagged = *tagged;
                debug!("Dropping YAML tag {}", tagged.tag);
                Tree::try_from(tagged.value)?
            }
        })
    }
}

fn number_to_scalar(n: &serde_yaml::Number) -> Scalar {
    match n.as_i64() {
        Some(i) => Scalar::Int(i),
        None => Scalar::Float(n.as_f64().unwrap_or(f64::NAN)),
    }
}

fn key_to_string(key: YamlValue) -> Result<String> {
    match key {
        YamlValue::String(s) => Ok(s),
        YamlValue::Number(n) => Ok(n.to_string()),
        YamlValue::Bool(b) => Ok(b.to_string()),
        YamlValue::Null => Ok("null".to_string()),
        other => Err(Error::config(format!(
            "mapping keys must be scalars, found {:?}",
            other
        ))),
    }
}

impl Serialize for Scalar {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Scalar::Null => serializer.serialize_unit(),
            Scalar::Bool(b) => serializer.serialize_bool(*b),
            Scalar::Int(i) => serializer.serialize_i64(*i),
            Scalar::Float(f) => serializer.serialize_f64(*f),
            Scalar::String(s) => serializer.serialize_str(s),
        }
    }
}

impl Serialize for Tree {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Tree::Scalar(scalar) => scalar.serialize(serializer),
            Tree::Sequence(items) => serializer.collect_seq(items),
            Tree::Mapping(map) => serializer.collect_map(map),
        }
    }
}

impl<'de> Deserialize<'de> for Tree {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = YamlValue::deserialize(deserializer)?;
        Tree::try_from(value).map_err(serde::de::Error::custom)
    }
}
