//! Error types with error codes and fix suggestions (v0.1)
//!
//! Error code ranges:
//! - REIFY-000-009: Document errors
//! - REIFY-010-019: Construction errors (raised while assembling a composite)
//! - REIFY-020-029: Registry errors
//! - REIFY-030-039: Propagation errors (child failures, depth, panics)

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ReifyError>;

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

/// One step from a composite down to one of its children
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum PathSegment {
    /// A scalar field: `owner`
    Field(Arc<str>),
    /// An element of a collection field: `members[2]`
    Element { collection: Arc<str>, index: usize },
}

impl PathSegment {
    pub fn field(name: impl Into<Arc<str>>) -> Self {
        Self::Field(name.into())
    }

    pub fn element(collection: impl Into<Arc<str>>, index: usize) -> Self {
        Self::Element {
            collection: collection.into(),
            index,
        }
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field(name) => write!(f, "{name}"),
            Self::Element { collection, index } => write!(f, "{collection}[{index}]"),
        }
    }
}

/// Path from the root of a pending tree to a failing node (outermost first)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolutionPath(Vec<PathSegment>);

impl ResolutionPath {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Prepend a segment (used while an error climbs towards the root)
    fn push_front(&mut self, segment: PathSegment) {
        self.0.insert(0, segment);
    }
}

impl From<PathSegment> for ResolutionPath {
    fn from(segment: PathSegment) -> Self {
        Self(vec![segment])
    }
}

impl FromIterator<PathSegment> for ResolutionPath {
    fn from_iter<I: IntoIterator<Item = PathSegment>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for ResolutionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "<root>");
        }
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

/// All error variants are part of the public API.
#[derive(Error, Debug)]
pub enum ReifyError {
    // ═══════════════════════════════════════════
    // DOCUMENT ERRORS (000-009)
    // ═══════════════════════════════════════════
    #[error("[REIFY-001] Invalid schema version: expected '{expected}', got '{actual}'")]
    InvalidSchema { expected: String, actual: String },

    #[error("[REIFY-002] Invalid document: {reason}")]
    InvalidDocument { reason: String },

    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ═══════════════════════════════════════════
    // CONSTRUCTION ERRORS (010-019)
    // ═══════════════════════════════════════════
    #[error("[REIFY-010] {type_name} is missing required field '{field}'")]
    MissingField { type_name: String, field: String },

    #[error("[REIFY-011] No assembler registered for type '{tag}'")]
    UnknownType { tag: String },

    #[error("[REIFY-012] Invalid type tag '{tag}': {reason}")]
    InvalidTypeTag { tag: String, reason: String },

    #[error("[REIFY-013] {type_name}.{field}: expected {expected}, found {found}")]
    TypeMismatch {
        type_name: String,
        field: String,
        expected: String,
        found: String,
    },

    #[error("[REIFY-014] Cannot assemble {type_name}: {reason}")]
    Assemble { type_name: String, reason: String },

    // ═══════════════════════════════════════════
    // REGISTRY ERRORS (020-029)
    // ═══════════════════════════════════════════
    #[error("[REIFY-020] Duplicate registration: {tag} '{name}' is already registered")]
    DuplicateKey { tag: String, name: String },

    #[error("[REIFY-021] Unresolved reference: {tag} '{name}' was never registered")]
    UnresolvedReference { tag: String, name: String },

    // ═══════════════════════════════════════════
    // PROPAGATION ERRORS (030-039)
    // ═══════════════════════════════════════════
    #[error("[REIFY-030] at {path}: {source}")]
    ChildResolution {
        path: ResolutionPath,
        #[source]
        source: Box<ReifyError>,
    },

    #[error("[REIFY-031] Nesting depth {depth} exceeds the limit of {max}")]
    DepthExceeded { depth: usize, max: usize },

    #[error("[REIFY-032] Resolution task panicked: {reason}")]
    TaskPanicked { reason: String },
}

impl ReifyError {
    /// Attach the segment leading to the failing child.
    ///
    /// Nested `ChildResolution` layers collapse into a single path.
    pub fn at(self, segment: PathSegment) -> Self {
        match self {
            Self::ChildResolution { mut path, source } => {
                path.push_front(segment);
                Self::ChildResolution { path, source }
            }
            other => Self::ChildResolution {
                path: ResolutionPath::from(segment),
                source: Box::new(other),
            },
        }
    }

    /// The innermost error, with every `ChildResolution` layer removed
    pub fn root_cause(&self) -> &ReifyError {
        match self {
            Self::ChildResolution { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Path to the failing node, if the error came from a nested child
    pub fn path(&self) -> Option<&ResolutionPath> {
        match self {
            Self::ChildResolution { path, .. } => Some(path),
            _ => None,
        }
    }

    /// Stable error code (`REIFY-0xx`), `None` for wrapped foreign errors
    pub fn code(&self) -> Option<&'static str> {
        let code = match self {
            Self::InvalidSchema { .. } => "REIFY-001",
            Self::InvalidDocument { .. } => "REIFY-002",
            Self::MissingField { .. } => "REIFY-010",
            Self::UnknownType { .. } => "REIFY-011",
            Self::InvalidTypeTag { .. } => "REIFY-012",
            Self::TypeMismatch { .. } => "REIFY-013",
            Self::Assemble { .. } => "REIFY-014",
            Self::DuplicateKey { .. } => "REIFY-020",
            Self::UnresolvedReference { .. } => "REIFY-021",
            Self::ChildResolution { .. } => "REIFY-030",
            Self::DepthExceeded { .. } => "REIFY-031",
            Self::TaskPanicked { .. } => "REIFY-032",
            Self::YamlParse(_) | Self::Json(_) | Self::Io(_) => return None,
        };
        Some(code)
    }

    pub fn is_missing_field(&self) -> bool {
        matches!(self.root_cause(), Self::MissingField { .. })
    }

    pub fn is_duplicate_key(&self) -> bool {
        matches!(self.root_cause(), Self::DuplicateKey { .. })
    }

    pub fn is_unresolved_reference(&self) -> bool {
        matches!(self.root_cause(), Self::UnresolvedReference { .. })
    }
}

impl FixSuggestion for ReifyError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            Self::InvalidSchema { .. } => Some("Set `schema: reify/document@0.1` at the top of the document"),
            Self::InvalidDocument { .. } => Some("Check the document against the documented layout"),
            Self::YamlParse(_) => Some("Check YAML syntax: indentation and quoting"),
            Self::Json(_) => Some("Check that literal values are valid JSON"),
            Self::Io(_) => Some("Check file path and permissions"),
            Self::MissingField { .. } => Some("Set the field before the composite is resolved"),
            Self::UnknownType { .. } => Some("Declare the type under `types:` or register an assembler for it"),
            Self::InvalidTypeTag { .. } => {
                Some("Type tags start with a letter and contain only letters, digits, underscores")
            }
            Self::TypeMismatch { .. } => Some("Check the literal or referenced value has the expected kind"),
            Self::Assemble { .. } => None,
            Self::DuplicateKey { .. } => Some("Give each entity of the same type a unique name"),
            Self::UnresolvedReference { .. } => Some(
                "Check the referenced name for typos; two entities referencing each other form a cycle",
            ),
            Self::ChildResolution { source, .. } => source.fix_suggestion(),
            Self::DepthExceeded { .. } => Some("Flatten the tree or raise max_depth"),
            Self::TaskPanicked { .. } => Some("An assembler panicked; return an error from it instead"),
        }
    }
}
