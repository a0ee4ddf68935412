//! Architecture entities and the `ArchValue` sum type

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::pending::TypeTag;

pub const PERSON: &str = "Person";
pub const SOFTWARE_SYSTEM: &str = "SoftwareSystem";
pub const RELATIONSHIP: &str = "Relationship";
pub const WORKSPACE: &str = "Workspace";

pub fn person_tag() -> TypeTag {
    TypeTag::from_static(PERSON)
}

pub fn system_tag() -> TypeTag {
    TypeTag::from_static(SOFTWARE_SYSTEM)
}

pub fn relationship_tag() -> TypeTag {
    TypeTag::from_static(RELATIONSHIP)
}

pub fn workspace_tag() -> TypeTag {
    TypeTag::from_static(WORKSPACE)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Person {
    pub name: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SoftwareSystem {
    pub name: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
}

/// Either end of a relationship
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "element", rename_all = "snake_case")]
pub enum Element {
    Person(Arc<Person>),
    System(Arc<SoftwareSystem>),
}

impl Element {
    pub fn name(&self) -> &str {
        match self {
            Self::Person(p) => &p.name,
            Self::System(s) => &s.name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Relationship {
    pub source: Element,
    pub destination: Element,
    pub description: String,
    pub technology: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Workspace {
    pub name: String,
    pub people: Vec<Arc<Person>>,
    pub systems: Vec<Arc<SoftwareSystem>>,
    pub relationships: Vec<Arc<Relationship>>,
}

impl Workspace {
    pub fn person(&self, name: &str) -> Option<&Arc<Person>> {
        self.people.iter().find(|p| p.name == name)
    }

    pub fn system(&self, name: &str) -> Option<&Arc<SoftwareSystem>> {
        self.systems.iter().find(|s| s.name == name)
    }
}

/// Every value the architecture domain moves through the resolver
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ArchValue {
    Text(String),
    Person(Arc<Person>),
    System(Arc<SoftwareSystem>),
    Relationship(Arc<Relationship>),
    Workspace(Arc<Workspace>),
}

impl ArchValue {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Person(_) => PERSON,
            Self::System(_) => SOFTWARE_SYSTEM,
            Self::Relationship(_) => RELATIONSHIP,
            Self::Workspace(_) => WORKSPACE,
        }
    }

    pub fn as_workspace(&self) -> Option<&Arc<Workspace>> {
        match self {
            Self::Workspace(w) => Some(w),
            _ => None,
        }
    }
}

impl fmt::Display for ArchValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => write!(f, "{s:?}"),
            Self::Person(p) => write!(f, "Person({})", p.name),
            Self::System(s) => write!(f, "SoftwareSystem({})", s.name),
            Self::Relationship(r) => write!(
                f,
                "Relationship({} -> {})",
                r.source.name(),
                r.destination.name()
            ),
            Self::Workspace(w) => write!(f, "Workspace({})", w.name),
        }
    }
}
