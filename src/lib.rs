//! Reify - concurrent materialization of named value graphs (v0.1)
//!
//! ## Module Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        DOMAIN LAYER                          │
//! │  record     Arc-shared records driven by per-type schemas    │
//! │  model/     Architecture model (Person, SoftwareSystem, ...) │
//! │  document   YAML document → PendingValue<Value> + lint       │
//! └──────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         ENGINE                               │
//! │  staging    CompositeBuilder, Spec, structural merge         │
//! │  pending    PendingValue, Composite, TypeTag                 │
//! │  resolver   Fan-out / fan-in resolution (JoinSet)            │
//! │  assemble   Assembler seam (tag → Assemble<V>)               │
//! │  registry   Run-scoped suspending name lookup (DashMap)      │
//! └──────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    INFRASTRUCTURE LAYER                      │
//! │  event_log  Resolution audit trail (EventLog, EventKind)     │
//! │  options    Deadline and depth presets                       │
//! │  interner   Shared Arc<str> for type tags                    │
//! │  error      Error types with codes and fix suggestions       │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Responsibilities
//!
//! | Module | Responsibility |
//! |--------|----------------|
//! | [`pending`] | `Literal` / `NamedRef` / `Composite` nodes |
//! | [`staging`] | Builder calls and includes, context as a parameter |
//! | [`resolver`] | Concurrent resolution, first failure aborts siblings |
//! | [`registry`] | Single-assignment cells, `get` suspends until `put` |
//! | [`assemble`] | Per-tag domain logic and required-field checks |
//! | [`record`] | Schema-driven assembler producing `Arc`-shared records |
//! | [`model`] | Typed architecture domain with staging specs |
//! | [`document`] | Document format used by the `reify` binary |
//! | [`event_log`] | Ordered, serializable resolution events |
//! | [`error`] | `ReifyError` with resolution paths |

// ═══════════════════════════════════════════════════════════════
// ENGINE - pending values, staging, resolution
// ═══════════════════════════════════════════════════════════════
pub mod assemble;
pub mod pending;
pub mod registry;
pub mod resolver;
pub mod staging;

// ═══════════════════════════════════════════════════════════════
// DOMAINS - record documents, architecture model
// ═══════════════════════════════════════════════════════════════
pub mod document;
pub mod model;
pub mod record;

// ═══════════════════════════════════════════════════════════════
// INFRASTRUCTURE - errors, events, options, interning
// ═══════════════════════════════════════════════════════════════
pub mod error;
pub mod event_log;
pub mod interner;
pub mod options;

// Engine
pub use assemble::{Assemble, Assembled, AssemblerTable, Materialize, ResolvedParts};
pub use pending::{Composite, PendingValue, TypeTag};
pub use registry::{Registry, RegistryKey, RegistryStats};
pub use resolver::{Resolution, Resolver};
pub use staging::{stage, CompositeBuilder, Spec};

// Domains
pub use document::{Document, LintIssue};
pub use record::{Record, RecordAssembler, RecordSchema, RecordValue};

// Infrastructure
pub use error::{FixSuggestion, PathSegment, ReifyError, ResolutionPath, Result};
pub use event_log::{Event, EventKind, EventLog};
pub use options::ResolveOptions;
