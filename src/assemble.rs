//! Assembler seam between the resolver and a domain
//!
//! A domain registers one assembler per type tag. The resolver hands it the
//! fully resolved children of a composite and gets back the finished value
//! plus, optionally, the name to register it under.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::error::{ReifyError, Result};
use crate::pending::TypeTag;

/// Bound on values the resolver can move between tasks
pub trait Materialize: Clone + Send + Sync + 'static {}

impl<T: Clone + Send + Sync + 'static> Materialize for T {}

/// Resolved children of one composite, consumed by its assembler
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedParts<V> {
    tag: TypeTag,
    fields: BTreeMap<String, V>,
    collections: BTreeMap<String, Vec<V>>,
}

impl<V> ResolvedParts<V> {
    pub fn new(
        tag: TypeTag,
        fields: BTreeMap<String, V>,
        collections: BTreeMap<String, Vec<V>>,
    ) -> Self {
        Self {
            tag,
            fields,
            collections,
        }
    }

    pub fn tag(&self) -> &TypeTag {
        &self.tag
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn field(&self, field: &str) -> Option<&V> {
        self.fields.get(field)
    }

    /// Take a required field, or fail with `MissingField`
    pub fn require(&mut self, field: &str) -> Result<V> {
        self.fields
            .remove(field)
            .ok_or_else(|| ReifyError::MissingField {
                type_name: self.tag.to_string(),
                field: field.to_string(),
            })
    }

    pub fn optional(&mut self, field: &str) -> Option<V> {
        self.fields.remove(field)
    }

    /// Take a collection; a collection that was never added to is empty
    pub fn collection(&mut self, name: &str) -> Vec<V> {
        self.collections.remove(name).unwrap_or_default()
    }

    /// Take a collection that must hold at least one element
    pub fn require_collection(&mut self, name: &str) -> Result<Vec<V>> {
        match self.collections.remove(name) {
            Some(items) if !items.is_empty() => Ok(items),
            _ => Err(ReifyError::MissingField {
                type_name: self.tag.to_string(),
                field: name.to_string(),
            }),
        }
    }

    /// Whatever was not taken yet
    pub fn into_parts(self) -> (BTreeMap<String, V>, BTreeMap<String, Vec<V>>) {
        (self.fields, self.collections)
    }
}

impl<V> ResolvedParts<V>
where
    V: fmt::Debug,
{
    /// Build a `TypeMismatch` for `field` with the offending value rendered
    pub fn mismatch(&self, field: &str, expected: &str, found: &V) -> ReifyError {
        ReifyError::TypeMismatch {
            type_name: self.tag.to_string(),
            field: field.to_string(),
            expected: expected.to_string(),
            found: format!("{found:?}"),
        }
    }
}

/// Output of an assembler
#[derive(Debug, Clone, PartialEq)]
pub struct Assembled<V> {
    pub value: V,
    /// Natural name; when set the value is registered under `(tag, name)`
    pub name: Option<String>,
}

impl<V> Assembled<V> {
    pub fn anonymous(value: V) -> Self {
        Self { value, name: None }
    }

    pub fn named(value: V, name: impl Into<String>) -> Self {
        Self {
            value,
            name: Some(name.into()),
        }
    }
}

/// Domain logic turning resolved children into a value
pub trait Assemble<V>: Send + Sync {
    fn assemble(&self, parts: ResolvedParts<V>) -> Result<Assembled<V>>;
}

impl<V, F> Assemble<V> for F
where
    F: Fn(ResolvedParts<V>) -> Result<Assembled<V>> + Send + Sync,
{
    fn assemble(&self, parts: ResolvedParts<V>) -> Result<Assembled<V>> {
        self(parts)
    }
}

/// Dispatch table: type tag -> assembler
pub struct AssemblerTable<V> {
    assemblers: FxHashMap<TypeTag, Arc<dyn Assemble<V>>>,
}

impl<V> AssemblerTable<V> {
    pub fn new() -> Self {
        Self {
            assemblers: FxHashMap::default(),
        }
    }

    /// Register (or replace) the assembler for `tag`
    pub fn register(&mut self, tag: TypeTag, assembler: impl Assemble<V> + 'static) -> &mut Self {
        self.assemblers.insert(tag, Arc::new(assembler));
        self
    }

    pub fn with(mut self, tag: TypeTag, assembler: impl Assemble<V> + 'static) -> Self {
        self.register(tag, assembler);
        self
    }

    pub fn get(&self, tag: &TypeTag) -> Result<&Arc<dyn Assemble<V>>> {
        self.assemblers
            .get(tag)
            .ok_or_else(|| ReifyError::UnknownType {
                tag: tag.to_string(),
            })
    }

    pub fn contains(&self, tag: &TypeTag) -> bool {
        self.assemblers.contains_key(tag)
    }

    /// Registered tags, sorted
    pub fn tags(&self) -> Vec<TypeTag> {
        let mut tags: Vec<TypeTag> = self.assemblers.keys().cloned().collect();
        tags.sort();
        tags
    }

    pub fn len(&self) -> usize {
        self.assemblers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assemblers.is_empty()
    }
}

impl<V> Default for AssemblerTable<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> fmt::Debug for AssemblerTable<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssemblerTable")
            .field("tags", &self.tags())
            .finish()
    }
}
