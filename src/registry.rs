//! Registry - run-scoped name resolution (v0.1)
//!
//! Maps `(TypeTag, name)` to a resolved value. Every key owns a
//! single-assignment cell (a `watch` channel holding `Option<V>`):
//!
//! - `put` fills the cell, creating it if no reader asked yet
//! - `get` creates-or-awaits the same cell and suspends while it is empty
//!
//! A waiting `get` fails with `UnresolvedReference` once the run's
//! cancellation token fires, which is how cycles and typo'd names surface.
//! The registry is created per run and never shared between runs.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::assemble::Materialize;
use crate::error::{ReifyError, Result};
use crate::event_log::{EventKind, EventLog};
use crate::pending::TypeTag;

/// Registry key: interned type tag plus a name owned by this run
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegistryKey {
    pub tag: TypeTag,
    pub name: Arc<str>,
}

impl RegistryKey {
    pub fn new(tag: TypeTag, name: &str) -> Self {
        Self {
            tag,
            name: Arc::from(name),
        }
    }
}

impl std::fmt::Display for RegistryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.tag, self.name)
    }
}

/// Counters for one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    pub puts: usize,
    pub gets: usize,
    /// Gets that found their key empty and had to wait
    pub suspended: usize,
}

#[derive(Default)]
struct Counters {
    puts: AtomicUsize,
    gets: AtomicUsize,
    suspended: AtomicUsize,
}

struct RegistryInner<V> {
    cells: DashMap<RegistryKey, watch::Sender<Option<V>>>,
    cancel: CancellationToken,
    events: EventLog,
    counters: Counters,
}

/// Concurrent `(tag, name) -> value` store for one resolution run
pub struct Registry<V> {
    inner: Arc<RegistryInner<V>>,
}

impl<V> Clone for Registry<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V: Materialize> Registry<V> {
    pub fn new() -> Self {
        Self::with_cancellation(CancellationToken::new())
    }

    /// Registry whose waiting lookups fail when `cancel` fires
    pub fn with_cancellation(cancel: CancellationToken) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                cells: DashMap::new(),
                cancel,
                events: EventLog::new(),
                counters: Counters::default(),
            }),
        }
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.inner.cancel
    }

    /// Fail every waiting and future `get` on an empty key
    pub fn cancel(&self) {
        self.inner.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    /// Event log shared by everything resolving against this registry
    pub fn events(&self) -> &EventLog {
        &self.inner.events
    }

    /// Register a resolved value.
    ///
    /// Satisfies every outstanding and future `get` for the key. A key is
    /// written at most once per run; a second `put` is `DuplicateKey`.
    pub fn put(&self, tag: &TypeTag, name: &str, value: V) -> Result<()> {
        let key = RegistryKey::new(tag.clone(), name);
        let cell = self
            .inner
            .cells
            .entry(key.clone())
            .or_insert_with(|| watch::channel(None).0);

        // The shard lock is held until `cell` drops: check and fill are atomic
        if cell.borrow().is_some() {
            return Err(ReifyError::DuplicateKey {
                tag: tag.to_string(),
                name: name.to_string(),
            });
        }

        self.inner.events.emit(EventKind::Registered {
            tag: Arc::clone(key.tag.as_arc()),
            name: Arc::clone(&key.name),
        });
        cell.send_replace(Some(value));
        drop(cell);

        self.inner.counters.puts.fetch_add(1, Ordering::Relaxed);
        debug!(key = %key, "registered");
        Ok(())
    }

    /// Look up a value, suspending until it is registered or the run is cancelled
    pub async fn get(&self, tag: &TypeTag, name: &str) -> Result<V> {
        let key = RegistryKey::new(tag.clone(), name);
        self.inner.counters.gets.fetch_add(1, Ordering::Relaxed);

        let mut rx = self
            .inner
            .cells
            .entry(key.clone())
            .or_insert_with(|| watch::channel(None).0)
            .subscribe();

        if let Some(value) = rx.borrow_and_update().clone() {
            trace!(key = %key, "lookup hit");
            return Ok(value);
        }

        self.inner.counters.suspended.fetch_add(1, Ordering::Relaxed);
        self.inner.events.emit(EventKind::ReferenceAwaited {
            tag: Arc::clone(key.tag.as_arc()),
            name: Arc::clone(&key.name),
        });
        debug!(key = %key, "waiting for registration");

        let found = tokio::select! {
            biased;
            filled = rx.wait_for(Option::is_some) => filled.ok().and_then(|cell| cell.clone()),
            _ = self.inner.cancel.cancelled() => None,
        };

        match found {
            Some(value) => {
                self.inner.events.emit(EventKind::ReferenceSatisfied {
                    tag: Arc::clone(key.tag.as_arc()),
                    name: Arc::clone(&key.name),
                });
                Ok(value)
            }
            None => {
                debug!(key = %key, "lookup abandoned");
                Err(ReifyError::UnresolvedReference {
                    tag: tag.to_string(),
                    name: name.to_string(),
                })
            }
        }
    }

    /// Non-suspending lookup
    pub fn try_get(&self, tag: &TypeTag, name: &str) -> Option<V> {
        let key = RegistryKey::new(tag.clone(), name);
        let cell = self.inner.cells.get(&key)?;
        let value = cell.borrow().clone();
        value
    }

    pub fn contains(&self, tag: &TypeTag, name: &str) -> bool {
        self.try_get(tag, name).is_some()
    }

    /// Number of registered (filled) keys
    pub fn len(&self) -> usize {
        self.inner
            .cells
            .iter()
            .filter(|cell| cell.value().borrow().is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys someone asked for that nobody registered, sorted
    pub fn pending_keys(&self) -> Vec<RegistryKey> {
        let mut keys: Vec<RegistryKey> = self
            .inner
            .cells
            .iter()
            .filter(|cell| cell.value().borrow().is_none())
            .map(|cell| cell.key().clone())
            .collect();
        keys.sort();
        keys
    }

    /// Every registered entry, sorted by key
    pub fn snapshot(&self) -> Vec<(RegistryKey, V)> {
        let mut entries: Vec<(RegistryKey, V)> = self
            .inner
            .cells
            .iter()
            .filter_map(|cell| {
                let value = cell.value().borrow().clone()?;
                Some((cell.key().clone(), value))
            })
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    pub fn stats(&self) -> RegistryStats {
        let c = &self.inner.counters;
        RegistryStats {
            puts: c.puts.load(Ordering::Relaxed),
            gets: c.gets.load(Ordering::Relaxed),
            suspended: c.suspended.load(Ordering::Relaxed),
        }
    }
}

impl<V: Materialize> Default for Registry<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> std::fmt::Debug for Registry<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("keys", &self.inner.cells.len())
            .field("cancelled", &self.inner.cancel.is_cancelled())
            .finish()
    }
}
