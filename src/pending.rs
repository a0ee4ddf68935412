//! Pending values - the resolver's input tree (v0.1)
//!
//! A `PendingValue` describes a value that will exist once resolution runs:
//!
//! | Variant      | Resolves to                                             |
//! |--------------|---------------------------------------------------------|
//! | `Literal`    | itself, immediately                                     |
//! | `NamedRef`   | whatever is registered under `(tag, name)`, suspending  |
//! | `Composite`  | the assembler's output once every child has resolved    |
//!
//! Trees are built by the staging layer, handed to the resolver by value and
//! consumed exactly once.
//!
//! In YAML each node is a single-key map (`literal:`, `ref:`, `composite:`),
//! read through `serde_yaml::with::singleton_map_recursive`.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};

use crate::error::{ReifyError, Result};
use crate::interner::intern;

static TAG_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_]*$").expect("tag pattern is valid"));

/// Name of a domain value type (`Person`, `Struct`, ...), interned
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeTag(Arc<str>);

impl TypeTag {
    /// Validate and intern a type tag
    pub fn new(tag: &str) -> Result<Self> {
        if tag.is_empty() {
            return Err(ReifyError::InvalidTypeTag {
                tag: tag.to_string(),
                reason: "cannot be empty".into(),
            });
        }
        if !TAG_PATTERN.is_match(tag) {
            return Err(ReifyError::InvalidTypeTag {
                tag: tag.to_string(),
                reason: "must start with a letter, then letters, digits, or underscores".into(),
            });
        }
        Ok(Self(intern(tag)))
    }

    /// Tag known at compile time; validity is only checked in debug builds
    pub fn from_static(tag: &'static str) -> Self {
        debug_assert!(TAG_PATTERN.is_match(tag), "invalid static type tag: {tag}");
        Self(intern(tag))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_arc(&self) -> &Arc<str> {
        &self.0
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeTag({})", self.0)
    }
}

impl Serialize for TypeTag {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for TypeTag {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        TypeTag::new(&raw).map_err(de::Error::custom)
    }
}

/// A value that will exist once the tree is resolved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingValue<V> {
    /// Already known
    Literal(V),
    /// Forward or cross reference, looked up in the registry by name
    #[serde(rename = "ref")]
    NamedRef {
        #[serde(rename = "type")]
        tag: TypeTag,
        name: String,
    },
    /// Aggregate whose children must resolve before it is assembled
    Composite(Composite<V>),
}

impl<V> PendingValue<V> {
    pub fn literal(value: V) -> Self {
        Self::Literal(value)
    }

    pub fn reference(tag: TypeTag, name: impl Into<String>) -> Self {
        Self::NamedRef {
            tag,
            name: name.into(),
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Self::Literal(_))
    }

    /// Total number of nodes in this subtree (including self)
    pub fn node_count(&self) -> usize {
        match self {
            Self::Literal(_) | Self::NamedRef { .. } => 1,
            Self::Composite(c) => 1 + c.children().map(PendingValue::node_count).sum::<usize>(),
        }
    }

    /// Visit every node of the subtree, parents before children
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a PendingValue<V>)) {
        visit(self);
        if let Self::Composite(c) = self {
            for child in c.children() {
                child.walk(visit);
            }
        }
    }
}

impl<V> PendingValue<V> {
    /// Convert every literal with `f`, keeping references and structure
    pub fn map_literals<U>(self, f: &mut impl FnMut(V) -> U) -> PendingValue<U> {
        match self {
            Self::Literal(value) => PendingValue::Literal(f(value)),
            Self::NamedRef { tag, name } => PendingValue::NamedRef { tag, name },
            Self::Composite(c) => PendingValue::Composite(c.map_literals(f)),
        }
    }
}

impl<V> From<Composite<V>> for PendingValue<V> {
    fn from(composite: Composite<V>) -> Self {
        Self::Composite(composite)
    }
}

/// A partially built aggregate: scalar fields plus ordered collections
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "V: Deserialize<'de>"))]
pub struct Composite<V> {
    #[serde(rename = "type")]
    pub tag: TypeTag,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, PendingValue<V>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub collections: BTreeMap<String, Vec<PendingValue<V>>>,
}

impl<V> Composite<V> {
    pub fn new(tag: TypeTag) -> Self {
        Self {
            tag,
            fields: BTreeMap::new(),
            collections: BTreeMap::new(),
        }
    }

    /// Structural merge: `other`'s scalar fields overwrite, collections concatenate.
    ///
    /// The receiver's tag is kept; `other` is applied on top of `self`.
    pub fn merge(mut self, other: Composite<V>) -> Self {
        self.fields.extend(other.fields);
        for (name, items) in other.collections {
            self.collections.entry(name).or_default().extend(items);
        }
        self
    }

    /// Fields first (by name), then collection elements (by name, then index)
    pub fn children(&self) -> impl Iterator<Item = &PendingValue<V>> {
        self.fields
            .values()
            .chain(self.collections.values().flatten())
    }

    pub fn child_count(&self) -> usize {
        self.fields.len() + self.collections.values().map(Vec::len).sum::<usize>()
    }

    pub fn map_literals<U>(self, f: &mut impl FnMut(V) -> U) -> Composite<U> {
        Composite {
            tag: self.tag,
            fields: self
                .fields
                .into_iter()
                .map(|(name, child)| (name, child.map_literals(f)))
                .collect(),
            collections: self
                .collections
                .into_iter()
                .map(|(name, items)| {
                    let items = items.into_iter().map(|child| child.map_literals(f)).collect();
                    (name, items)
                })
                .collect(),
        }
    }
}
