//! Architecture model - a typed domain on top of the engine
//!
//! People and software systems are registered under their names, so a
//! relationship can point at either end before it has been assembled.
//!
//! ```text
//! WorkspaceSpec --stage--> Composite<ArchValue> --resolve--> ArchValue::Workspace
//! ```

mod assemblers;
mod entities;
mod specs;

pub use assemblers::{assemblers, ModelAssembler};
pub use entities::{
    person_tag, relationship_tag, system_tag, workspace_tag, ArchValue, Element, Person,
    Relationship, SoftwareSystem, Workspace, PERSON, RELATIONSHIP, SOFTWARE_SYSTEM, WORKSPACE,
};
pub use specs::{
    ElementRef, ModelContext, PersonSpec, RelationshipSpec, SystemSpec, WorkspaceSpec,
    EXTERNAL_TAG,
};

use std::sync::Arc;

use crate::error::{ReifyError, Result};
use crate::resolver::Resolver;
use crate::staging::stage;

/// Stage `spec` under `ctx` and resolve it into a workspace
pub async fn build_workspace(
    resolver: &Resolver<ArchValue>,
    ctx: &ModelContext,
    spec: &WorkspaceSpec,
) -> Result<Arc<Workspace>> {
    let staged = stage(ctx, spec)?;
    match resolver.resolve(staged.into()).await? {
        ArchValue::Workspace(workspace) => Ok(workspace),
        other => Err(ReifyError::TypeMismatch {
            type_name: WORKSPACE.to_string(),
            field: "<root>".to_string(),
            expected: WORKSPACE.to_string(),
            found: other.kind().to_string(),
        }),
    }
}
