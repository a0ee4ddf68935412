//! Staging layer - builder calls accumulated into a composite (v0.1)
//!
//! Staging runs before resolution and on one thread per composite:
//! a `Spec` records `set_field` / `add_to_collection` / `include` calls on a
//! `CompositeBuilder`, and the finished `Composite` is then handed to the
//! resolver by value.
//!
//! Context is an explicit parameter. A nested spec receives the same context
//! or a substituted one, chosen by the caller at the call site.

use crate::error::Result;
use crate::pending::{Composite, PendingValue, TypeTag};

/// Accumulates builder calls for one composite
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeBuilder<V> {
    composite: Composite<V>,
}

impl<V> CompositeBuilder<V> {
    pub fn new(tag: TypeTag) -> Self {
        Self {
            composite: Composite::new(tag),
        }
    }

    pub fn tag(&self) -> &TypeTag {
        &self.composite.tag
    }

    /// Set a scalar field; a later call for the same field wins
    pub fn set_field(&mut self, field: impl Into<String>, value: PendingValue<V>) -> &mut Self {
        self.composite.fields.insert(field.into(), value);
        self
    }

    pub fn set_literal(&mut self, field: impl Into<String>, value: V) -> &mut Self {
        self.set_field(field, PendingValue::Literal(value))
    }

    pub fn set_ref(
        &mut self,
        field: impl Into<String>,
        tag: TypeTag,
        name: impl Into<String>,
    ) -> &mut Self {
        self.set_field(field, PendingValue::reference(tag, name))
    }

    /// Append to a collection field, keeping call order
    pub fn add_to_collection(
        &mut self,
        collection: impl Into<String>,
        value: PendingValue<V>,
    ) -> &mut Self {
        self.composite
            .collections
            .entry(collection.into())
            .or_default()
            .push(value);
        self
    }

    pub fn extend_collection(
        &mut self,
        collection: impl Into<String>,
        values: impl IntoIterator<Item = PendingValue<V>>,
    ) -> &mut Self {
        self.composite
            .collections
            .entry(collection.into())
            .or_default()
            .extend(values);
        self
    }

    /// Make sure a collection exists even if nothing is added to it
    pub fn declare_collection(&mut self, collection: impl Into<String>) -> &mut Self {
        self.composite.collections.entry(collection.into()).or_default();
        self
    }

    /// Merge an already staged fragment into this composite
    pub fn include(&mut self, fragment: Composite<V>) -> &mut Self {
        let current = std::mem::replace(&mut self.composite, Composite::new(fragment.tag.clone()));
        self.composite = current.merge(fragment);
        self
    }

    /// Apply another spec's calls onto this builder under `ctx`.
    ///
    /// Pass the current context to share it, or a different one to substitute it.
    pub fn include_spec<C, S>(&mut self, ctx: &C, spec: &S) -> Result<&mut Self>
    where
        S: Spec<C, V> + ?Sized,
    {
        spec.stage(ctx, self)?;
        Ok(self)
    }

    /// Stage `spec` as a separate child composite, to be added with
    /// `set_field` or `add_to_collection`
    pub fn nested<C, S>(ctx: &C, spec: &S) -> Result<PendingValue<V>>
    where
        S: Spec<C, V> + ?Sized,
    {
        stage(ctx, spec).map(PendingValue::Composite)
    }

    pub fn build(self) -> Composite<V> {
        self.composite
    }

    pub fn into_pending(self) -> PendingValue<V> {
        PendingValue::Composite(self.composite)
    }
}

/// A user-authored description of one composite under context `C`
pub trait Spec<C, V> {
    /// Tag of the composite this spec produces when staged on its own
    fn tag(&self) -> TypeTag;

    fn stage(&self, ctx: &C, builder: &mut CompositeBuilder<V>) -> Result<()>;
}

/// Stage `spec` into a fresh composite
pub fn stage<C, V, S>(ctx: &C, spec: &S) -> Result<Composite<V>>
where
    S: Spec<C, V> + ?Sized,
{
    let mut builder = CompositeBuilder::new(spec.tag());
    spec.stage(ctx, &mut builder)?;
    Ok(builder.build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    struct Ctx {
        owner: &'static str,
    }

    struct Base;

    impl Spec<Ctx, Value> for Base {
        fn tag(&self) -> TypeTag {
            TypeTag::new("Struct").unwrap()
        }

        fn stage(&self, ctx: &Ctx, b: &mut CompositeBuilder<Value>) -> Result<()> {
            b.set_literal("name", json!("base"))
                .set_literal("owner", json!(ctx.owner))
                .add_to_collection("fields", PendingValue::literal(json!("id")));
            Ok(())
        }
    }

    struct Extended;

    impl Spec<Ctx, Value> for Extended {
        fn tag(&self) -> TypeTag {
            TypeTag::new("Struct").unwrap()
        }

        fn stage(&self, ctx: &Ctx, b: &mut CompositeBuilder<Value>) -> Result<()> {
            b.include_spec(ctx, &Base)?;
            b.set_literal("name", json!("extended"))
                .add_to_collection("fields", PendingValue::literal(json!("created_at")));
            // Substituted context for the nested child
            let audit = CompositeBuilder::nested(&Ctx { owner: "audit" }, &Base)?;
            b.set_field("audit", audit);
            Ok(())
        }
    }

    #[test]
    fn include_overwrites_scalars_and_appends_collections() {
        let c = stage(&Ctx { owner: "team-a" }, &Extended).unwrap();

        assert_eq!(c.fields["name"], PendingValue::literal(json!("extended")));
        assert_eq!(c.fields["owner"], PendingValue::literal(json!("team-a")));
        assert_eq!(
            c.collections["fields"],
            vec![
                PendingValue::literal(json!("id")),
                PendingValue::literal(json!("created_at")),
            ]
        );
    }

    #[test]
    fn nested_spec_sees_substituted_context() {
        let c = stage(&Ctx { owner: "team-a" }, &Extended).unwrap();

        let PendingValue::Composite(audit) = &c.fields["audit"] else {
            panic!("audit should be a composite");
        };
        assert_eq!(audit.fields["owner"], PendingValue::literal(json!("audit")));
    }

    #[test]
    fn staging_is_deterministic() {
        let ctx = Ctx { owner: "x" };
        assert_eq!(stage(&ctx, &Extended).unwrap(), stage(&ctx, &Extended).unwrap());
    }

    #[test]
    fn include_fragment_keeps_builder_tag() {
        let mut fragment = Composite::new(TypeTag::new("Mixin").unwrap());
        fragment
            .collections
            .insert("tags".into(), vec![PendingValue::literal(json!("a"))]);

        let mut b: CompositeBuilder<Value> = CompositeBuilder::new(TypeTag::new("Struct").unwrap());
        b.add_to_collection("tags", PendingValue::literal(json!("z")))
            .include(fragment);

        let c = b.build();
        assert_eq!(c.tag.as_str(), "Struct");
        assert_eq!(c.collections["tags"].len(), 2);
    }

    #[test]
    fn declared_collection_survives_empty() {
        let mut b: CompositeBuilder<Value> = CompositeBuilder::new(TypeTag::new("Union").unwrap());
        b.declare_collection("variants");
        assert!(b.build().collections["variants"].is_empty());
    }

    #[test]
    fn extend_collection_appends_in_order() {
        let mut b: CompositeBuilder<Value> = CompositeBuilder::new(TypeTag::new("Enum").unwrap());
        b.add_to_collection("variants", PendingValue::literal(json!("A")))
            .extend_collection(
                "variants",
                ["B", "C"].map(|v| PendingValue::literal(json!(v))),
            );

        let names: Vec<_> = b.build().collections["variants"]
            .iter()
            .map(|v| match v {
                PendingValue::Literal(v) => v.clone(),
                _ => Value::Null,
            })
            .collect();
        assert_eq!(names, vec![json!("A"), json!("B"), json!("C")]);
    }
}
