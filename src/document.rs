//! Document - a serialized pending tree plus its record types (v0.1)
//!
//! ```yaml
//! schema: reify/document@0.1
//! deadline_ms: 5000            # optional
//! types:
//!   Struct: { name_field: name, required: [name] }
//! root:
//!   composite:
//!     type: Struct
//!     fields:
//!       name: { literal: Order }
//!       parent: { ref: { type: Struct, name: Base } }
//! ```
//!
//! Nodes under `root` are single-key maps and go through
//! `serde_yaml::with::singleton_map_recursive` in both directions.
//!
//! `lint` runs before resolution and reports what will certainly fail or
//! very likely hang until the deadline.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ReifyError, Result};
use crate::options::ResolveOptions;
use crate::pending::PendingValue;
use crate::record::{record_assemblers, RecordSchema, RecordValue};
use crate::resolver::Resolver;

pub const SCHEMA_VERSION: &str = "reify/document@0.1";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Document {
    pub schema: String,

    /// Run deadline in milliseconds (defaults to `ResolveOptions::default()`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline_ms: Option<u64>,

    /// Maximum composite nesting depth
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<usize>,

    #[serde(default)]
    pub types: BTreeMap<String, RecordSchema>,

    #[serde(with = "serde_yaml::with::singleton_map_recursive")]
    pub root: PendingValue<Value>,
}

impl Document {
    /// Parse YAML (or JSON) and check the schema version
    pub fn parse(source: &str) -> Result<Self> {
        let document: Document = serde_yaml::from_str(source)?;
        if document.schema != SCHEMA_VERSION {
            return Err(ReifyError::InvalidSchema {
                expected: SCHEMA_VERSION.to_string(),
                actual: document.schema,
            });
        }
        Ok(document)
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let source = tokio::fs::read_to_string(path).await?;
        Self::parse(&source)
    }

    pub fn options(&self) -> ResolveOptions {
        let mut options = ResolveOptions::default();
        if let Some(ms) = self.deadline_ms {
            options = options.with_deadline(Duration::from_millis(ms));
        }
        if let Some(depth) = self.max_depth {
            options = options.with_max_depth(depth);
        }
        options
    }

    /// Write the document back as YAML that `parse` accepts
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn resolver(&self) -> Result<Resolver<RecordValue>> {
        Ok(Resolver::new(record_assemblers(&self.types)?).with_options(self.options()))
    }

    /// The root tree with its literals lifted into the record domain
    pub fn into_root(self) -> PendingValue<RecordValue> {
        self.root.map_literals(&mut RecordValue::Json)
    }

    /// Resolve the root, consuming the document
    pub async fn resolve(self) -> Result<RecordValue> {
        let resolver = self.resolver()?;
        resolver.resolve(self.into_root()).await
    }

    /// Static checks over the tree (no resolution)
    pub fn lint(&self) -> Vec<LintIssue> {
        let mut issues = Vec::new();
        let mut produced: BTreeMap<(String, String), usize> = BTreeMap::new();
        let mut referenced: BTreeSet<(String, String)> = BTreeSet::new();
        let mut unknown: BTreeSet<String> = BTreeSet::new();

        self.root.walk(&mut |node| match node {
            PendingValue::Composite(c) => {
                let tag = c.tag.to_string();
                let Some(schema) = self.types.get(&tag) else {
                    unknown.insert(tag);
                    return;
                };
                let literal_name = schema
                    .name_field
                    .as_ref()
                    .and_then(|field| c.fields.get(field));
                if let Some(PendingValue::Literal(Value::String(name))) = literal_name {
                    *produced.entry((tag, name.clone())).or_default() += 1;
                }
            }
            PendingValue::NamedRef { tag, name } => {
                referenced.insert((tag.to_string(), name.clone()));
            }
            PendingValue::Literal(_) => {}
        });

        for tag in unknown {
            issues.push(LintIssue::UnknownType { tag });
        }
        for ((tag, name), count) in &produced {
            if *count > 1 {
                issues.push(LintIssue::DuplicateName {
                    tag: tag.clone(),
                    name: name.clone(),
                    count: *count,
                });
            }
        }
        for (tag, name) in referenced {
            if !produced.contains_key(&(tag.clone(), name.clone())) {
                issues.push(LintIssue::DanglingReference { tag, name });
            }
        }
        issues
    }
}

/// Finding from `Document::lint`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LintIssue {
    /// Composite tag with no declared record type; resolution fails
    UnknownType { tag: String },
    /// Two composites with the same literal name; resolution fails
    DuplicateName { tag: String, name: String, count: usize },
    /// No composite produces this key with a literal name; likely waits until the deadline
    DanglingReference { tag: String, name: String },
}

impl LintIssue {
    /// Issues that make resolution fail for certain
    pub fn is_error(&self) -> bool {
        !matches!(self, Self::DanglingReference { .. })
    }
}

impl fmt::Display for LintIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownType { tag } => write!(f, "type '{tag}' is not declared under types:"),
            Self::DuplicateName { tag, name, count } => {
                write!(f, "{tag} '{name}' is declared {count} times")
            }
            Self::DanglingReference { tag, name } => {
                write!(f, "reference to {tag} '{name}' has no literal producer")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SCHEMA_DOC: &str = r#"
schema: reify/document@0.1
deadline_ms: 500
types:
  Schema: { name_field: name }
  Struct: { name_field: name, required: [name] }
root:
  composite:
    type: Schema
    fields:
      name: { literal: billing }
    collections:
      structs:
        - composite:
            type: Struct
            fields:
              name: { literal: Order }
              parent: { ref: { type: Struct, name: Base } }
        - composite:
            type: Struct
            fields:
              name: { literal: Base }
"#;

    #[test]
    fn parses_and_reads_options() {
        let doc = Document::parse(SCHEMA_DOC).unwrap();
        assert_eq!(doc.options().deadline, Duration::from_millis(500));
        assert_eq!(doc.types.len(), 2);
        assert!(doc.lint().is_empty());
    }

    #[test]
    fn wrong_schema_version_is_rejected() {
        let source = SCHEMA_DOC.replace("reify/document@0.1", "reify/document@9");
        assert!(matches!(
            Document::parse(&source),
            Err(ReifyError::InvalidSchema { .. })
        ));
    }

    #[test]
    fn yaml_written_by_to_yaml_parses_back() {
        let doc = Document::parse(SCHEMA_DOC).unwrap();
        let yaml = doc.to_yaml().unwrap();

        assert!(yaml.contains("composite:"));
        assert_eq!(Document::parse(&yaml).unwrap(), doc);
    }

    #[tokio::test]
    async fn resolves_forward_reference() {
        let resolved = Document::parse(SCHEMA_DOC).unwrap().resolve().await.unwrap();
        let value = resolved.to_json();

        assert_eq!(value["name"], "billing");
        assert_eq!(value["structs"][0]["parent"]["name"], "Base");
        assert_eq!(value["structs"][1], json!({"$type": "Struct", "name": "Base"}));
    }

    #[test]
    fn lint_reports_unknown_duplicate_and_dangling() {
        let source = r#"
schema: reify/document@0.1
types:
  Struct: { name_field: name }
root:
  composite:
    type: Module
    collections:
      items:
        - composite: { type: Struct, fields: { name: { literal: A } } }
        - composite: { type: Struct, fields: { name: { literal: A } } }
        - ref: { type: Struct, name: ghost }
"#;
        let issues = Document::parse(source).unwrap().lint();

        assert_eq!(
            issues,
            vec![
                LintIssue::UnknownType {
                    tag: "Module".into()
                },
                LintIssue::DuplicateName {
                    tag: "Struct".into(),
                    name: "A".into(),
                    count: 2
                },
                LintIssue::DanglingReference {
                    tag: "Struct".into(),
                    name: "ghost".into()
                },
            ]
        );
        assert!(issues[0].is_error());
        assert!(!issues[2].is_error());
    }
}
