//! Record domain - dynamic records described by a per-type schema
//!
//! Each declared type gets a `RecordAssembler` that checks required fields,
//! names the record from its `name_field`, and builds a `Record`. Assembled
//! records are shared through `Arc`: a reference to a record costs a pointer
//! copy, however large or deeply linked the record is. Serialized, a record
//! is a JSON object:
//!
//! ```json
//! { "$type": "Struct", "name": "Order", "fields": [ ... ] }
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::ser::{SerializeMap, SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::assemble::{Assemble, Assembled, AssemblerTable, ResolvedParts};
use crate::error::{ReifyError, Result};
use crate::pending::TypeTag;

/// Key under which the type tag is written into every record
pub const TYPE_KEY: &str = "$type";

/// Value moving through the resolver in the record domain
#[derive(Debug, Clone, PartialEq)]
pub enum RecordValue {
    /// Literal JSON taken from the document
    Json(Value),
    /// Assembled record, shared by every reference to it
    Record(Arc<Record>),
    /// Resolved collection
    List(Vec<RecordValue>),
}

impl RecordValue {
    pub fn as_record(&self) -> Option<&Arc<Record>> {
        match self {
            Self::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Json(Value::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Deep copy into plain JSON; shared records are expanded at every use
    pub fn to_json(&self) -> Value {
        match self {
            Self::Json(v) => v.clone(),
            Self::Record(r) => r.to_json(),
            Self::List(items) => Value::Array(items.iter().map(RecordValue::to_json).collect()),
        }
    }
}

impl From<Value> for RecordValue {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

impl Serialize for RecordValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Json(v) => v.serialize(serializer),
            Self::Record(r) => r.serialize(serializer),
            Self::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
        }
    }
}

/// One assembled record; collections are stored as `RecordValue::List`
#[derive(Debug, PartialEq)]
pub struct Record {
    pub tag: TypeTag,
    pub fields: BTreeMap<String, RecordValue>,
}

impl Record {
    pub fn get(&self, field: &str) -> Option<&RecordValue> {
        self.fields.get(field)
    }

    pub fn to_json(&self) -> Value {
        let mut object = Map::new();
        object.insert(TYPE_KEY.to_string(), Value::String(self.tag.to_string()));
        for (name, value) in &self.fields {
            object.insert(name.clone(), value.to_json());
        }
        Value::Object(object)
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len() + 1))?;
        map.serialize_entry(TYPE_KEY, self.tag.as_str())?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Shape of one record type
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecordSchema {
    /// Scalar fields that must be set
    #[serde(default)]
    pub required: Vec<String>,

    /// Collections that must hold at least one element
    #[serde(default)]
    pub required_collections: Vec<String>,

    /// String field holding the record's registration name
    #[serde(default)]
    pub name_field: Option<String>,
}

impl RecordSchema {
    pub fn named_by(field: impl Into<String>) -> Self {
        let field = field.into();
        Self {
            required: vec![field.clone()],
            required_collections: Vec::new(),
            name_field: Some(field),
        }
    }

    pub fn require(mut self, field: impl Into<String>) -> Self {
        self.required.push(field.into());
        self
    }

    pub fn require_collection(mut self, collection: impl Into<String>) -> Self {
        self.required_collections.push(collection.into());
        self
    }
}

/// Assembler for one record type
#[derive(Debug, Clone)]
pub struct RecordAssembler {
    schema: RecordSchema,
}

impl RecordAssembler {
    pub fn new(schema: RecordSchema) -> Self {
        Self { schema }
    }
}

impl Assemble<RecordValue> for RecordAssembler {
    fn assemble(&self, parts: ResolvedParts<RecordValue>) -> Result<Assembled<RecordValue>> {
        for field in &self.schema.required {
            if !parts.has_field(field) {
                return Err(ReifyError::MissingField {
                    type_name: parts.tag().to_string(),
                    field: field.clone(),
                });
            }
        }

        let name = match &self.schema.name_field {
            Some(field) => match parts.field(field) {
                Some(RecordValue::Json(Value::String(name))) => Some(name.clone()),
                Some(other) => return Err(parts.mismatch(field, "string", other)),
                None => None,
            },
            None => None,
        };

        let tag = parts.tag().clone();
        let (mut fields, collections) = parts.into_parts();

        for collection in &self.schema.required_collections {
            if collections.get(collection).map_or(true, Vec::is_empty) {
                return Err(ReifyError::MissingField {
                    type_name: tag.to_string(),
                    field: collection.clone(),
                });
            }
        }

        if fields.contains_key(TYPE_KEY) || collections.contains_key(TYPE_KEY) {
            return Err(ReifyError::Assemble {
                type_name: tag.to_string(),
                reason: format!("'{TYPE_KEY}' is reserved for the record type"),
            });
        }
        for (collection, items) in collections {
            if fields.contains_key(&collection) {
                return Err(ReifyError::Assemble {
                    type_name: tag.to_string(),
                    reason: format!("'{collection}' is both a field and a collection"),
                });
            }
            fields.insert(collection, RecordValue::List(items));
        }

        let value = RecordValue::Record(Arc::new(Record { tag, fields }));
        Ok(match name {
            Some(name) => Assembled::named(value, name),
            None => Assembled::anonymous(value),
        })
    }
}

/// Assembler table for a set of record types
pub fn record_assemblers(
    types: &BTreeMap<String, RecordSchema>,
) -> Result<AssemblerTable<RecordValue>> {
    let mut table = AssemblerTable::new();
    for (tag, schema) in types {
        table.register(TypeTag::new(tag)?, RecordAssembler::new(schema.clone()));
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parts(fields: Value, collections: Value) -> ResolvedParts<RecordValue> {
        let fields = fields
            .as_object()
            .map(|m| {
                m.clone()
                    .into_iter()
                    .map(|(k, v)| (k, RecordValue::Json(v)))
                    .collect()
            })
            .unwrap_or_default();
        let collections = collections
            .as_object()
            .map(|m| {
                m.clone()
                    .into_iter()
                    .map(|(k, v)| {
                        let items = v.as_array().cloned().unwrap_or_default();
                        (k, items.into_iter().map(RecordValue::Json).collect())
                    })
                    .collect()
            })
            .unwrap_or_default();
        ResolvedParts::new(TypeTag::new("Struct").unwrap(), fields, collections)
    }

    #[test]
    fn named_record_is_assembled_with_type_key() {
        let assembler = RecordAssembler::new(RecordSchema::named_by("name"));
        let out = assembler
            .assemble(parts(json!({"name": "Order"}), json!({"fields": ["id", "total"]})))
            .unwrap();

        assert_eq!(out.name.as_deref(), Some("Order"));
        assert_eq!(
            out.value.to_json(),
            json!({"$type": "Struct", "name": "Order", "fields": ["id", "total"]})
        );
        assert_eq!(
            serde_json::to_value(&out.value).unwrap(),
            out.value.to_json()
        );
    }

    #[test]
    fn missing_required_field() {
        let assembler = RecordAssembler::new(RecordSchema::named_by("name").require("doc"));
        let err = assembler
            .assemble(parts(json!({"name": "Order"}), json!({})))
            .unwrap_err();

        assert!(matches!(err, ReifyError::MissingField { ref field, .. } if field == "doc"));
    }

    #[test]
    fn empty_required_collection_is_missing() {
        let assembler =
            RecordAssembler::new(RecordSchema::default().require_collection("variants"));
        let err = assembler
            .assemble(parts(json!({}), json!({"variants": []})))
            .unwrap_err();

        assert!(matches!(err, ReifyError::MissingField { ref field, .. } if field == "variants"));
    }

    #[test]
    fn non_string_name_is_a_type_mismatch() {
        let assembler = RecordAssembler::new(RecordSchema::named_by("name"));
        let err = assembler
            .assemble(parts(json!({"name": 7}), json!({})))
            .unwrap_err();

        assert!(matches!(err, ReifyError::TypeMismatch { .. }));
    }

    #[test]
    fn schema_without_name_field_is_anonymous() {
        let assembler = RecordAssembler::new(RecordSchema::default());
        let out = assembler
            .assemble(parts(json!({"name": "ignored"}), json!({})))
            .unwrap();
        assert_eq!(out.name, None);
    }

    #[test]
    fn field_and_collection_with_same_name_are_rejected() {
        let assembler = RecordAssembler::new(RecordSchema::default());
        let err = assembler
            .assemble(parts(json!({"tags": "x"}), json!({"tags": ["y"]})))
            .unwrap_err();

        assert_eq!(err.code(), Some("REIFY-014"));
        assert!(err.to_string().contains("'tags' is both a field and a collection"));
    }

    #[test]
    fn type_key_is_reserved() {
        let assembler = RecordAssembler::new(RecordSchema::default());
        let err = assembler
            .assemble(parts(json!({"$type": "Other"}), json!({})))
            .unwrap_err();

        assert!(matches!(err, ReifyError::Assemble { .. }));
    }

    #[test]
    fn table_rejects_invalid_tags() {
        let types = BTreeMap::from([("bad tag".to_string(), RecordSchema::default())]);
        assert!(matches!(
            record_assemblers(&types),
            Err(ReifyError::InvalidTypeTag { .. })
        ));
    }
}
