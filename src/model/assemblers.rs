//! Assemblers for the architecture domain
//!
//! One `ModelAssembler` serves every model tag and dispatches with a `match`
//! on the tag. Required fields are checked here, not in the resolver.

use std::sync::Arc;

use crate::assemble::{Assemble, Assembled, AssemblerTable, ResolvedParts};
use crate::error::{ReifyError, Result};

use super::entities::*;

#[derive(Debug, Clone, Copy, Default)]
pub struct ModelAssembler;

impl Assemble<ArchValue> for ModelAssembler {
    fn assemble(&self, mut parts: ResolvedParts<ArchValue>) -> Result<Assembled<ArchValue>> {
        let tag = parts.tag().clone();
        match tag.as_str() {
            PERSON => {
                let person = Person {
                    name: require_text(&mut parts, "name")?,
                    description: optional_text(&mut parts, "description")?,
                    tags: texts(&mut parts, "tags")?,
                };
                let name = person.name.clone();
                Ok(Assembled::named(ArchValue::Person(Arc::new(person)), name))
            }
            SOFTWARE_SYSTEM => {
                let system = SoftwareSystem {
                    name: require_text(&mut parts, "name")?,
                    description: optional_text(&mut parts, "description")?,
                    tags: texts(&mut parts, "tags")?,
                };
                let name = system.name.clone();
                Ok(Assembled::named(ArchValue::System(Arc::new(system)), name))
            }
            RELATIONSHIP => {
                let relationship = Relationship {
                    source: require_element(&mut parts, "source")?,
                    destination: require_element(&mut parts, "destination")?,
                    description: require_text(&mut parts, "description")?,
                    technology: optional_text(&mut parts, "technology")?,
                };
                if relationship.source == relationship.destination {
                    return Err(ReifyError::Assemble {
                        type_name: RELATIONSHIP.to_string(),
                        reason: format!("'{}' cannot relate to itself", relationship.source.name()),
                    });
                }
                Ok(Assembled::anonymous(ArchValue::Relationship(Arc::new(
                    relationship,
                ))))
            }
            WORKSPACE => {
                let name = require_text(&mut parts, "name")?;
                let mut people = Vec::new();
                for value in parts.collection("people") {
                    match value {
                        ArchValue::Person(p) => people.push(p),
                        other => return Err(parts.mismatch("people", PERSON, &other)),
                    }
                }
                let mut systems = Vec::new();
                for value in parts.collection("systems") {
                    match value {
                        ArchValue::System(s) => systems.push(s),
                        other => return Err(parts.mismatch("systems", SOFTWARE_SYSTEM, &other)),
                    }
                }
                let mut relationships = Vec::new();
                for value in parts.collection("relationships") {
                    match value {
                        ArchValue::Relationship(r) => relationships.push(r),
                        other => {
                            return Err(parts.mismatch("relationships", RELATIONSHIP, &other))
                        }
                    }
                }
                let workspace = Workspace {
                    name: name.clone(),
                    people,
                    systems,
                    relationships,
                };
                Ok(Assembled::named(ArchValue::Workspace(Arc::new(workspace)), name))
            }
            other => Err(ReifyError::UnknownType {
                tag: other.to_string(),
            }),
        }
    }
}

/// Assembler table covering every model tag
pub fn assemblers() -> AssemblerTable<ArchValue> {
    AssemblerTable::new()
        .with(person_tag(), ModelAssembler)
        .with(system_tag(), ModelAssembler)
        .with(relationship_tag(), ModelAssembler)
        .with(workspace_tag(), ModelAssembler)
}

fn require_text(parts: &mut ResolvedParts<ArchValue>, field: &str) -> Result<String> {
    match parts.require(field)? {
        ArchValue::Text(s) => Ok(s),
        other => Err(parts.mismatch(field, "text", &other)),
    }
}

fn optional_text(parts: &mut ResolvedParts<ArchValue>, field: &str) -> Result<Option<String>> {
    match parts.optional(field) {
        None => Ok(None),
        Some(ArchValue::Text(s)) => Ok(Some(s)),
        Some(other) => Err(parts.mismatch(field, "text", &other)),
    }
}

fn texts(parts: &mut ResolvedParts<ArchValue>, collection: &str) -> Result<Vec<String>> {
    parts
        .collection(collection)
        .into_iter()
        .map(|value| match value {
            ArchValue::Text(s) => Ok(s),
            other => Err(parts.mismatch(collection, "text", &other)),
        })
        .collect()
}

fn require_element(parts: &mut ResolvedParts<ArchValue>, field: &str) -> Result<Element> {
    match parts.require(field)? {
        ArchValue::Person(p) => Ok(Element::Person(p)),
        ArchValue::System(s) => Ok(Element::System(s)),
        other => Err(parts.mismatch(field, "Person or SoftwareSystem", &other)),
    }
}
