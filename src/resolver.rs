//! Resolver - concurrent materialization of a pending tree (v0.1)
//!
//! ```text
//! resolve(node):
//!   Literal(v)        -> v                        (inline, no task)
//!   NamedRef(t, n)    -> registry.get(t, n)       (may suspend)
//!   Composite(c)      -> fan-out: one task per non-literal child (JoinSet)
//!                        fan-in:  await every child
//!                        assemble(c.tag, resolved parts)
//!                        put(c.tag, name, value)  if the assembler named it
//! ```
//!
//! Invariants:
//! - the assembler never sees partially resolved input
//! - a composite is registered only after its whole subtree resolved
//! - the first failing child aborts its siblings (dropping the JoinSet)
//!
//! The run deadline cancels the registry's token: every waiting lookup then
//! fails with `UnresolvedReference`, and the tree unwinds with that error.
//!
//! A panicking assembler is caught where it runs and becomes `TaskPanicked`.
//! At the root it is returned as is; under a composite it carries the path
//! of the child that panicked, like any other child failure.

use std::any::Any;
use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::{BoxFuture, FutureExt};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::assemble::{Assembled, AssemblerTable, Materialize, ResolvedParts};
use crate::error::{PathSegment, ReifyError, Result};
use crate::event_log::{EventKind, EventLog};
use crate::options::ResolveOptions;
use crate::pending::{Composite, PendingValue};
use crate::registry::{Registry, RegistryKey, RegistryStats};

/// Everything a successful run produced
#[derive(Debug)]
pub struct Resolution<V> {
    pub value: V,
    /// Every named entity registered during the run, sorted by key
    pub registered: Vec<(RegistryKey, V)>,
    pub stats: RegistryStats,
    pub events: EventLog,
    pub elapsed: Duration,
}

/// Shared per-run state handed to every resolution task
struct RunContext<V> {
    registry: Registry<V>,
    assemblers: Arc<AssemblerTable<V>>,
    max_depth: usize,
}

impl<V> Clone for RunContext<V> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
            assemblers: Arc::clone(&self.assemblers),
            max_depth: self.max_depth,
        }
    }
}

/// Domain-agnostic resolver; one instance can drive many runs
pub struct Resolver<V> {
    assemblers: Arc<AssemblerTable<V>>,
    options: ResolveOptions,
}

impl<V> Clone for Resolver<V> {
    fn clone(&self) -> Self {
        Self {
            assemblers: Arc::clone(&self.assemblers),
            options: self.options.clone(),
        }
    }
}

impl<V: Materialize> Resolver<V> {
    pub fn new(assemblers: AssemblerTable<V>) -> Self {
        Self {
            assemblers: Arc::new(assemblers),
            options: ResolveOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ResolveOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &ResolveOptions {
        &self.options
    }

    pub fn assemblers(&self) -> &AssemblerTable<V> {
        &self.assemblers
    }

    /// Resolve `root` against a fresh registry
    pub async fn resolve(&self, root: PendingValue<V>) -> Result<V> {
        self.resolve_in(root, Registry::new())
            .await
            .map(|resolution| resolution.value)
    }

    /// Resolve `root`; cancelling `cancel` aborts the run like the deadline does
    pub async fn resolve_with_cancel(
        &self,
        root: PendingValue<V>,
        cancel: &CancellationToken,
    ) -> Result<V> {
        let registry = Registry::with_cancellation(cancel.child_token());
        self.resolve_in(root, registry)
            .await
            .map(|resolution| resolution.value)
    }

    /// Resolve `root` against a caller-supplied registry.
    ///
    /// The registry must be fresh: it is the run's only shared state, and
    /// its cancellation token is fired when the run ends.
    #[instrument(skip_all, fields(nodes = tracing::field::Empty, deadline_ms = self.options.deadline.as_millis() as u64))]
    pub async fn resolve_in(
        &self,
        root: PendingValue<V>,
        registry: Registry<V>,
    ) -> Result<Resolution<V>> {
        let start = Instant::now();
        let events = registry.events().clone();
        let node_count = root.node_count();
        tracing::Span::current().record("nodes", node_count);

        events.emit(EventKind::RunStarted {
            node_count,
            deadline_ms: self.options.deadline.as_millis() as u64,
        });
        info!(nodes = node_count, "resolution started");

        let ctx = RunContext {
            registry: registry.clone(),
            assemblers: Arc::clone(&self.assemblers),
            max_depth: self.options.max_depth,
        };

        let work = resolve_node(ctx, root, 0);
        tokio::pin!(work);
        let deadline = tokio::time::sleep(self.options.deadline);
        tokio::pin!(deadline);

        let outcome = tokio::select! {
            outcome = &mut work => outcome,
            _ = &mut deadline => {
                let pending: Vec<String> =
                    registry.pending_keys().iter().map(ToString::to_string).collect();
                warn!(?pending, "resolution deadline expired");
                events.emit(EventKind::DeadlineExpired { pending });
                registry.cancel();
                work.await
            }
        };

        // Wakes any straggling lookup; the run is over either way
        registry.cancel();

        match outcome {
            Ok(value) => {
                let registered = registry.snapshot();
                let elapsed = start.elapsed();
                events.emit(EventKind::RunCompleted {
                    registered: registered.len(),
                    total_duration_ms: elapsed.as_millis() as u64,
                });
                info!(
                    registered = registered.len(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "resolution completed"
                );
                Ok(Resolution {
                    value,
                    registered,
                    stats: registry.stats(),
                    events,
                    elapsed,
                })
            }
            Err(e) => {
                events.emit(EventKind::RunFailed {
                    error: e.to_string(),
                    path: e.path().map(ToString::to_string),
                });
                warn!(error = %e, "resolution failed");
                Err(e)
            }
        }
    }
}

fn resolve_node<V: Materialize>(
    ctx: RunContext<V>,
    node: PendingValue<V>,
    depth: usize,
) -> BoxFuture<'static, Result<V>> {
    async move {
        match node {
            PendingValue::Literal(value) => Ok(value),
            PendingValue::NamedRef { tag, name } => ctx.registry.get(&tag, &name).await,
            PendingValue::Composite(composite) => resolve_composite(ctx, composite, depth).await,
        }
    }
    .boxed()
}

async fn resolve_composite<V: Materialize>(
    ctx: RunContext<V>,
    composite: Composite<V>,
    depth: usize,
) -> Result<V> {
    if depth >= ctx.max_depth {
        return Err(ReifyError::DepthExceeded {
            depth,
            max: ctx.max_depth,
        });
    }

    let Composite {
        tag,
        fields,
        collections,
    } = composite;

    ctx.registry.events().emit(EventKind::CompositeStarted {
        tag: Arc::clone(tag.as_arc()),
        children: fields.len() + collections.values().map(Vec::len).sum::<usize>(),
    });

    // Collection names must survive even when a collection is empty
    let collection_names: Vec<String> = collections.keys().cloned().collect();

    let mut children: Vec<(PathSegment, PendingValue<V>)> = Vec::new();
    for (name, child) in fields {
        children.push((PathSegment::field(name), child));
    }
    for (name, items) in collections {
        let collection: Arc<str> = Arc::from(name);
        for (index, child) in items.into_iter().enumerate() {
            children.push((PathSegment::element(Arc::clone(&collection), index), child));
        }
    }

    // Slot i holds child i's value; slots keep the layout independent of completion order
    let mut segments: Vec<PathSegment> = Vec::with_capacity(children.len());
    let mut slots: Vec<Option<V>> = Vec::with_capacity(children.len());
    let mut join_set: JoinSet<(usize, Result<V>)> = JoinSet::new();

    for (segment, child) in children {
        let slot = slots.len();
        segments.push(segment);
        match child {
            PendingValue::Literal(value) => slots.push(Some(value)),
            pending => {
                slots.push(None);
                let ctx = ctx.clone();
                join_set.spawn(async move { (slot, resolve_node(ctx, pending, depth + 1).await) });
            }
        }
    }

    // Fan-in. Returning early drops the JoinSet, which aborts unfinished siblings.
    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok((slot, Ok(value))) => slots[slot] = Some(value),
            Ok((slot, Err(e))) => {
                debug!(tag = %tag, at = %segments[slot], error = %e, "child failed, aborting siblings");
                return Err(e.at(segments[slot].clone()));
            }
            Err(join_error) => {
                return Err(ReifyError::TaskPanicked {
                    reason: join_error.to_string(),
                });
            }
        }
    }

    let mut resolved_fields = BTreeMap::new();
    let mut resolved_collections: BTreeMap<String, Vec<V>> = collection_names
        .into_iter()
        .map(|name| (name, Vec::new()))
        .collect();

    for (segment, slot) in segments.into_iter().zip(slots) {
        let value = slot.ok_or_else(|| ReifyError::TaskPanicked {
            reason: format!("child {segment} finished without a value"),
        })?;
        match segment {
            PathSegment::Field(name) => {
                resolved_fields.insert(name.to_string(), value);
            }
            PathSegment::Element { collection, .. } => {
                resolved_collections
                    .entry(collection.to_string())
                    .or_default()
                    .push(value);
            }
        }
    }

    let assembler = ctx.assemblers.get(&tag)?;
    let parts = ResolvedParts::new(tag.clone(), resolved_fields, resolved_collections);
    let Assembled { value, name } = catch_unwind(AssertUnwindSafe(|| assembler.assemble(parts)))
        .map_err(|payload| ReifyError::TaskPanicked {
            reason: format!("assembler for '{tag}' panicked: {}", panic_message(payload.as_ref())),
        })??;

    ctx.registry.events().emit(EventKind::CompositeAssembled {
        tag: Arc::clone(tag.as_arc()),
        name: name.as_deref().map(Arc::from),
    });

    if let Some(name) = name {
        ctx.registry.put(&tag, &name, value.clone())?;
    }

    Ok(value)
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pending::TypeTag;

    fn tag(s: &str) -> TypeTag {
        TypeTag::new(s).unwrap()
    }

    /// `Sum` adds `base` and `terms`; named by the optional `label` literal
    fn sum_table() -> AssemblerTable<i64> {
        AssemblerTable::new().with(tag("Sum"), |mut p: ResolvedParts<i64>| -> Result<Assembled<i64>> {
            let base = p.optional("base").unwrap_or(0);
            let total = base + p.collection("terms").iter().sum::<i64>();
            Ok(match p.optional("label") {
                Some(label) => Assembled::named(total, format!("s{label}")),
                None => Assembled::anonymous(total),
            })
        })
    }

    fn sum(base: PendingValue<i64>, terms: Vec<PendingValue<i64>>) -> Composite<i64> {
        let mut c = Composite::new(tag("Sum"));
        c.fields.insert("base".into(), base);
        c.collections.insert("terms".into(), terms);
        c
    }

    #[tokio::test]
    async fn literal_resolves_to_itself() {
        let resolver = Resolver::new(sum_table());
        assert_eq!(resolver.resolve(PendingValue::literal(9)).await.unwrap(), 9);
    }

    #[tokio::test]
    async fn nested_composites_fold_bottom_up() {
        let inner = sum(PendingValue::literal(1), vec![PendingValue::literal(2)]);
        let outer = sum(
            PendingValue::literal(10),
            vec![inner.into(), PendingValue::literal(5)],
        );

        let resolver = Resolver::new(sum_table());
        assert_eq!(resolver.resolve(outer.into()).await.unwrap(), 18);
    }

    #[tokio::test]
    async fn empty_collection_is_passed_to_assembler() {
        let table = AssemblerTable::new().with(tag("Sum"), |p: ResolvedParts<i64>| -> Result<Assembled<i64>> {
            let (_, collections) = p.into_parts();
            Ok(Assembled::anonymous(collections.len() as i64))
        });

        let resolver = Resolver::new(table);
        let value = resolver
            .resolve(sum(PendingValue::literal(0), vec![]).into())
            .await
            .unwrap();
        assert_eq!(value, 1);
    }

    #[tokio::test]
    async fn unknown_tag_fails() {
        let resolver = Resolver::new(sum_table());
        let err = resolver
            .resolve(Composite::new(tag("Product")).into())
            .await
            .unwrap_err();
        assert!(matches!(err, ReifyError::UnknownType { .. }));
    }

    #[tokio::test]
    async fn depth_limit_is_enforced() {
        let mut node: Composite<i64> = sum(PendingValue::literal(1), vec![]);
        for _ in 0..5 {
            node = sum(node.into(), vec![]);
        }

        let resolver =
            Resolver::new(sum_table()).with_options(ResolveOptions::testing().with_max_depth(3));
        let err = resolver.resolve(node.into()).await.unwrap_err();
        assert!(matches!(err.root_cause(), ReifyError::DepthExceeded { max: 3, .. }));
        assert_eq!(err.path().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn resolution_reports_registered_entities() {
        let mut named = sum(PendingValue::literal(4), vec![]);
        named.fields.insert("label".into(), PendingValue::literal(1));
        let root = sum(
            PendingValue::literal(0),
            vec![named.into(), PendingValue::reference(tag("Sum"), "s1")],
        );

        let resolver = Resolver::new(sum_table());
        let resolution = resolver.resolve_in(root.into(), Registry::new()).await.unwrap();

        assert_eq!(resolution.value, 8);
        assert_eq!(resolution.registered.len(), 1);
        assert_eq!(&*resolution.registered[0].0.name, "s1");
        assert_eq!(resolution.stats.puts, 1);
    }

    fn panicking_table() -> AssemblerTable<i64> {
        sum_table().with(tag("Boom"), |_: ResolvedParts<i64>| -> Result<Assembled<i64>> {
            panic!("boom at assembly")
        })
    }

    #[tokio::test]
    async fn root_assembler_panic_becomes_an_error() {
        let resolver = Resolver::new(panicking_table());
        let err = resolver
            .resolve(Composite::new(tag("Boom")).into())
            .await
            .unwrap_err();

        assert!(matches!(&err, ReifyError::TaskPanicked { reason } if reason.contains("boom at assembly")));
        assert!(err.path().is_none());
    }

    #[tokio::test]
    async fn child_assembler_panic_carries_its_path() {
        let root = sum(Composite::new(tag("Boom")).into(), vec![PendingValue::literal(1)]);

        let resolver = Resolver::new(panicking_table());
        let err = resolver.resolve(root.into()).await.unwrap_err();

        assert!(matches!(err.root_cause(), ReifyError::TaskPanicked { .. }));
        assert_eq!(err.path().unwrap().to_string(), "base");
    }

    #[tokio::test]
    async fn external_cancellation_fails_waiting_reference() {
        let resolver = Resolver::new(sum_table()).with_options(ResolveOptions::default());
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            trigger.cancel();
        });

        let root = sum(PendingValue::reference(tag("Sum"), "never"), vec![]);
        let err = resolver
            .resolve_with_cancel(root.into(), &cancel)
            .await
            .unwrap_err();

        assert!(err.is_unresolved_reference());
        assert_eq!(err.path().unwrap().to_string(), "base");
    }
}
