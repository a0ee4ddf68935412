//! String interning for type tags
//!
//! Tags come from a small closed set and recur in every registry key and
//! every event, so each one is allocated once and shared as `Arc<str>`.
//! Entity names are unbounded and stay owned by their run's registry; the
//! global table never frees an entry.

use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::Lazy;

static INTERNER: Lazy<Interner> = Lazy::new(Interner::new);

/// Thread-safe string interner
#[derive(Default)]
pub struct Interner {
    strings: DashMap<Arc<str>, ()>,
}

impl Interner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the shared `Arc<str>` for `s`, allocating it on first sight
    pub fn intern(&self, s: &str) -> Arc<str> {
        if let Some(existing) = self.strings.get(s) {
            return Arc::clone(existing.key());
        }

        // entry() closes the race between two threads interning the same string
        let entry = self.strings.entry(Arc::from(s)).or_insert(());
        Arc::clone(entry.key())
    }

    pub fn contains(&self, s: &str) -> bool {
        self.strings.contains_key(s)
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

/// Intern a type tag using the global interner
#[inline]
pub fn intern(s: &str) -> Arc<str> {
    INTERNER.intern(s)
}

/// Whether the global interner already holds `s`
pub fn is_interned(s: &str) -> bool {
    INTERNER.contains(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_string_shares_one_allocation() {
        let interner = Interner::new();

        let a = interner.intern("Person");
        let b = interner.intern("Person");

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(interner.len(), 1);
        assert!(interner.contains("Person"));
        assert!(!interner.contains("person"));
    }

    #[test]
    fn distinct_strings_get_distinct_arcs() {
        let interner = Interner::new();

        let a = interner.intern("Person");
        let b = interner.intern("SoftwareSystem");

        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(interner.len(), 2);
    }

    #[test]
    fn global_intern_is_shared() {
        assert!(Arc::ptr_eq(&intern("Workspace"), &intern("Workspace")));
    }

    #[test]
    fn concurrent_interning_converges_on_one_arc() {
        use std::thread;

        let interner = Arc::new(Interner::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let interner = Arc::clone(&interner);
                thread::spawn(move || interner.intern("shared"))
            })
            .collect();

        let arcs: Vec<Arc<str>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(arcs.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert_eq!(interner.len(), 1);
    }
}
