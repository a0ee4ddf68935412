//! Resolution event log (v0.1)
//!
//! Append-only trace of one resolution run:
//! - Event: envelope with id + timestamp + kind
//! - EventKind: run-level and node-level variants
//! - EventLog: thread-safe, cheap to clone (shared by every resolution task)
//!
//! Event ids are assigned under the write lock, so id order is log order.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Single event in the resolution log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Monotonic sequence ID (for ordering)
    pub id: u64,
    /// Time since run start (ms)
    pub timestamp_ms: u64,
    /// Event type and data
    pub kind: EventKind,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    // ═══════════════════════════════════════════
    // RUN LEVEL
    // ═══════════════════════════════════════════
    RunStarted {
        node_count: usize,
        deadline_ms: u64,
    },
    RunCompleted {
        registered: usize,
        total_duration_ms: u64,
    },
    RunFailed {
        error: String,
        path: Option<String>,
    },
    DeadlineExpired {
        pending: Vec<String>,
    },

    // ═══════════════════════════════════════════
    // NODE LEVEL
    // ═══════════════════════════════════════════
    CompositeStarted {
        tag: Arc<str>,
        children: usize,
    },
    CompositeAssembled {
        tag: Arc<str>,
        name: Option<Arc<str>>,
    },
    /// A `get` found its key empty and suspended
    ReferenceAwaited {
        tag: Arc<str>,
        name: Arc<str>,
    },
    ReferenceSatisfied {
        tag: Arc<str>,
        name: Arc<str>,
    },
    Registered {
        tag: Arc<str>,
        name: Arc<str>,
    },
}

impl EventKind {
    /// Extract the `(tag, name)` registry key if the event is about one
    pub fn key(&self) -> Option<(&str, &str)> {
        match self {
            Self::ReferenceAwaited { tag, name }
            | Self::ReferenceSatisfied { tag, name }
            | Self::Registered { tag, name } => Some((&**tag, &**name)),
            Self::CompositeAssembled {
                tag,
                name: Some(name),
            } => Some((&**tag, &**name)),
            _ => None,
        }
    }

    pub fn is_run_event(&self) -> bool {
        matches!(
            self,
            Self::RunStarted { .. }
                | Self::RunCompleted { .. }
                | Self::RunFailed { .. }
                | Self::DeadlineExpired { .. }
        )
    }
}

/// Thread-safe, append-only event log
#[derive(Clone)]
pub struct EventLog {
    events: Arc<RwLock<Vec<Event>>>,
    start_time: Instant,
}

impl EventLog {
    pub fn new() -> Self {
        Self {
            events: Arc::new(RwLock::new(Vec::new())),
            start_time: Instant::now(),
        }
    }

    /// Emit an event (thread-safe, returns event ID)
    pub fn emit(&self, kind: EventKind) -> u64 {
        let timestamp_ms = self.start_time.elapsed().as_millis() as u64;
        let mut events = self.events.write();
        let id = events.len() as u64;
        events.push(Event {
            id,
            timestamp_ms,
            kind,
        });
        id
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.read().clone()
    }

    /// Events about one registry key, in log order
    pub fn filter_key(&self, tag: &str, name: &str) -> Vec<Event> {
        self.events
            .read()
            .iter()
            .filter(|e| e.kind.key() == Some((tag, name)))
            .cloned()
            .collect()
    }

    /// Id of the first event matching `predicate`
    pub fn position(&self, predicate: impl Fn(&EventKind) -> bool) -> Option<u64> {
        self.events
            .read()
            .iter()
            .find(|e| predicate(&e.kind))
            .map(|e| e.id)
    }

    pub fn run_events(&self) -> Vec<Event> {
        self.events
            .read()
            .iter()
            .filter(|e| e.kind.is_run_event())
            .cloned()
            .collect()
    }

    /// Serialize to JSON for `--trace` output
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self.events()).unwrap_or(Value::Null)
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLog")
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registered(tag: &str, name: &str) -> EventKind {
        EventKind::Registered {
            tag: tag.into(),
            name: name.into(),
        }
    }

    #[test]
    fn ids_follow_emission_order() {
        let log = EventLog::new();
        let a = log.emit(EventKind::RunStarted {
            node_count: 3,
            deadline_ms: 100,
        });
        let b = log.emit(registered("Person", "alice"));

        assert_eq!((a, b), (0, 1));
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn key_extraction() {
        assert_eq!(
            registered("Person", "alice").key(),
            Some(("Person", "alice"))
        );
        let anonymous = EventKind::CompositeAssembled {
            tag: "Person".into(),
            name: None,
        };
        assert_eq!(anonymous.key(), None);
        assert!(EventKind::RunFailed {
            error: "x".into(),
            path: None
        }
        .is_run_event());
    }

    #[test]
    fn filter_key_and_position() {
        let log = EventLog::new();
        log.emit(EventKind::ReferenceAwaited {
            tag: "Person".into(),
            name: "bob".into(),
        });
        log.emit(registered("Person", "alice"));
        log.emit(registered("Person", "bob"));

        assert_eq!(log.filter_key("Person", "bob").len(), 2);
        assert_eq!(
            log.position(|k| matches!(k, EventKind::Registered { name, .. } if &**name == "bob")),
            Some(2)
        );
    }

    #[test]
    fn serializes_with_type_tag() {
        let json = serde_json::to_value(registered("Struct", "Order")).unwrap();
        assert_eq!(json["type"], "registered");
        assert_eq!(json["tag"], "Struct");
        assert_eq!(json["name"], "Order");
    }

    #[test]
    fn concurrent_emit_is_safe() {
        use std::thread;

        let log = EventLog::new();
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let log = log.clone();
                thread::spawn(move || {
                    for j in 0..50 {
                        log.emit(registered("T", &format!("{i}_{j}")));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let events = log.events();
        assert_eq!(events.len(), 200);
        assert!(events.iter().enumerate().all(|(i, e)| e.id == i as u64));
    }
}
