//! Staging specs for the architecture domain
//!
//! `ModelContext` is the reader-style environment threaded through staging:
//! its tags are stamped onto every person and system staged under it.
//! `WorkspaceSpec` stages external systems under a substituted context.

use crate::error::Result;
use crate::pending::{PendingValue, TypeTag};
use crate::staging::{CompositeBuilder, Spec};

use super::entities::*;

/// Tag added to systems staged through `WorkspaceSpec::external_system`
pub const EXTERNAL_TAG: &str = "External";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelContext {
    pub tags: Vec<String>,
}

impl ModelContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of this context with one more tag
    pub fn with_tag(&self, tag: impl Into<String>) -> Self {
        let mut tags = self.tags.clone();
        tags.push(tag.into());
        Self { tags }
    }

    fn stamp(&self, b: &mut CompositeBuilder<ArchValue>) {
        b.extend_collection(
            "tags",
            self.tags.iter().map(|t| PendingValue::literal(ArchValue::text(t))),
        );
    }
}

fn set_text(b: &mut CompositeBuilder<ArchValue>, field: &str, value: &Option<String>) {
    if let Some(value) = value {
        b.set_literal(field, ArchValue::text(value));
    }
}

#[derive(Debug, Clone, Default)]
pub struct PersonSpec {
    pub name: String,
    pub description: Option<String>,
}

impl PersonSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

impl Spec<ModelContext, ArchValue> for PersonSpec {
    fn tag(&self) -> TypeTag {
        person_tag()
    }

    fn stage(&self, ctx: &ModelContext, b: &mut CompositeBuilder<ArchValue>) -> Result<()> {
        b.set_literal("name", ArchValue::text(&self.name));
        set_text(b, "description", &self.description);
        ctx.stamp(b);
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct SystemSpec {
    pub name: String,
    pub description: Option<String>,
    /// Staged first; this spec's own fields then override it
    pub template: Option<Box<SystemSpec>>,
}

impl SystemSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn based_on(mut self, template: SystemSpec) -> Self {
        self.template = Some(Box::new(template));
        self
    }
}

impl Spec<ModelContext, ArchValue> for SystemSpec {
    fn tag(&self) -> TypeTag {
        system_tag()
    }

    fn stage(&self, ctx: &ModelContext, b: &mut CompositeBuilder<ArchValue>) -> Result<()> {
        if let Some(template) = &self.template {
            b.include_spec(ctx, template.as_ref())?;
        }
        b.set_literal("name", ArchValue::text(&self.name));
        set_text(b, "description", &self.description);
        if self.template.is_none() {
            ctx.stamp(b);
        }
        Ok(())
    }
}

/// Relationship endpoint, looked up by name at resolution time
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementRef {
    Person(String),
    System(String),
}

impl ElementRef {
    fn pending(&self) -> PendingValue<ArchValue> {
        match self {
            Self::Person(name) => PendingValue::reference(person_tag(), name),
            Self::System(name) => PendingValue::reference(system_tag(), name),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RelationshipSpec {
    pub source: ElementRef,
    pub destination: ElementRef,
    pub description: String,
    pub technology: Option<String>,
}

impl RelationshipSpec {
    pub fn new(source: ElementRef, destination: ElementRef, description: impl Into<String>) -> Self {
        Self {
            source,
            destination,
            description: description.into(),
            technology: None,
        }
    }

    pub fn technology(mut self, technology: impl Into<String>) -> Self {
        self.technology = Some(technology.into());
        self
    }
}

impl Spec<ModelContext, ArchValue> for RelationshipSpec {
    fn tag(&self) -> TypeTag {
        relationship_tag()
    }

    fn stage(&self, _ctx: &ModelContext, b: &mut CompositeBuilder<ArchValue>) -> Result<()> {
        b.set_field("source", self.source.pending())
            .set_field("destination", self.destination.pending())
            .set_literal("description", ArchValue::text(&self.description));
        set_text(b, "technology", &self.technology);
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct WorkspaceSpec {
    pub name: String,
    pub people: Vec<PersonSpec>,
    pub systems: Vec<SystemSpec>,
    pub external_systems: Vec<SystemSpec>,
    pub relationships: Vec<RelationshipSpec>,
}

impl WorkspaceSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn person(mut self, person: PersonSpec) -> Self {
        self.people.push(person);
        self
    }

    pub fn system(mut self, system: SystemSpec) -> Self {
        self.systems.push(system);
        self
    }

    pub fn external_system(mut self, system: SystemSpec) -> Self {
        self.external_systems.push(system);
        self
    }

    pub fn relationship(mut self, relationship: RelationshipSpec) -> Self {
        self.relationships.push(relationship);
        self
    }
}

impl Spec<ModelContext, ArchValue> for WorkspaceSpec {
    fn tag(&self) -> TypeTag {
        workspace_tag()
    }

    fn stage(&self, ctx: &ModelContext, b: &mut CompositeBuilder<ArchValue>) -> Result<()> {
        b.set_literal("name", ArchValue::text(&self.name));
        b.declare_collection("people")
            .declare_collection("systems")
            .declare_collection("relationships");

        for person in &self.people {
            b.add_to_collection("people", CompositeBuilder::nested(ctx, person)?);
        }
        for system in &self.systems {
            b.add_to_collection("systems", CompositeBuilder::nested(ctx, system)?);
        }
        let external = ctx.with_tag(EXTERNAL_TAG);
        for system in &self.external_systems {
            b.add_to_collection("systems", CompositeBuilder::nested(&external, system)?);
        }
        for relationship in &self.relationships {
            b.add_to_collection("relationships", CompositeBuilder::nested(ctx, relationship)?);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::staging::stage;

    fn literal_text(value: &PendingValue<ArchValue>) -> &str {
        match value {
            PendingValue::Literal(ArchValue::Text(s)) => s,
            other => panic!("expected text literal, got {other:?}"),
        }
    }

    #[test]
    fn context_tags_are_stamped_on_people() {
        let ctx = ModelContext::new().with_tag("Internal");
        let person = stage(&ctx, &PersonSpec::new("Alice")).unwrap();

        let tags: Vec<&str> = person.collections["tags"].iter().map(literal_text).collect();
        assert_eq!(tags, vec!["Internal"]);
    }

    #[test]
    fn template_fields_are_overridden() {
        let base = SystemSpec::new("Base").description("template");
        let spec = SystemSpec::new("Billing").based_on(base);

        let system = stage(&ModelContext::new(), &spec).unwrap();
        assert_eq!(literal_text(&system.fields["name"]), "Billing");
        assert_eq!(literal_text(&system.fields["description"]), "template");
    }

    #[test]
    fn external_systems_get_substituted_context() {
        let spec = WorkspaceSpec::new("Bank")
            .system(SystemSpec::new("Core"))
            .external_system(SystemSpec::new("Mainframe"));

        let ws = stage(&ModelContext::new(), &spec).unwrap();
        let systems = &ws.collections["systems"];
        assert_eq!(systems.len(), 2);

        let PendingValue::Composite(core) = &systems[0] else {
            panic!("system should be staged as a composite");
        };
        let PendingValue::Composite(mainframe) = &systems[1] else {
            panic!("system should be staged as a composite");
        };
        assert!(core.collections.get("tags").map_or(true, Vec::is_empty));
        assert_eq!(literal_text(&mainframe.collections["tags"][0]), EXTERNAL_TAG);
    }

    #[test]
    fn relationship_endpoints_are_references() {
        let rel = RelationshipSpec::new(
            ElementRef::Person("Alice".into()),
            ElementRef::System("Core".into()),
            "uses",
        );
        let staged = stage(&ModelContext::new(), &rel).unwrap();

        assert_eq!(
            staged.fields["source"],
            PendingValue::reference(person_tag(), "Alice")
        );
    }
}
