//! Resolution limits
//!
//! A resolution run always carries a deadline: reference cycles and typo'd
//! names never satisfy their `get`, and the deadline is what turns that hang
//! into an `UnresolvedReference` error.

use std::time::Duration;

/// Limits applied to one resolution run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Wall-clock budget for the whole run; waiting lookups fail once it elapses
    pub deadline: Duration,

    /// Maximum composite nesting depth
    pub max_depth: usize,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            deadline: Duration::from_secs(30),
            max_depth: 256,
        }
    }
}

impl ResolveOptions {
    /// Short deadline for tests that expect a run to fail
    pub fn testing() -> Self {
        Self {
            deadline: Duration::from_secs(2),
            max_depth: 64,
        }
    }

    /// Effectively no limits (use with caution: cycles hang for a day)
    pub fn unlimited() -> Self {
        Self {
            deadline: Duration::from_secs(86_400),
            max_depth: usize::MAX,
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_order_by_strictness() {
        let testing = ResolveOptions::testing();
        let default = ResolveOptions::default();
        let unlimited = ResolveOptions::unlimited();

        assert!(testing.deadline < default.deadline);
        assert!(default.deadline < unlimited.deadline);
        assert!(testing.max_depth < default.max_depth);
    }

    #[test]
    fn builder_methods_override_fields() {
        let opts = ResolveOptions::default()
            .with_deadline(Duration::from_millis(150))
            .with_max_depth(3);

        assert_eq!(opts.deadline, Duration::from_millis(150));
        assert_eq!(opts.max_depth, 3);
    }
}
