//! Prefixed id constructors.
//!
//! All ids are UUID v7 (time-ordered) rendered without dashes and carrying
//! a short type prefix, so a bare id in a log line is self-describing.

use uuid::Uuid;

fn prefixed(prefix: &str) -> String {
    format!("{prefix}_{}", Uuid::now_v7().simple())
}

/// New session id (`sess_…`).
#[must_use]
pub fn new_session_id() -> String {
    prefixed("sess")
}

/// New memory record id (`mem_…`).
#[must_use]
pub fn new_memory_id() -> String {
    prefixed("mem")
}

/// New edit action id (`edit_…`).
#[must_use]
pub fn new_edit_id() -> String {
    prefixed("edit")
}

/// New local-instruction callback id (`cb_…`).
#[must_use]
pub fn new_callback_id() -> String {
    prefixed("cb")
}

/// New request trace id (`trace_…`).
#[must_use]
pub fn new_trace_id() -> String {
    prefixed("trace")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn ids_carry_prefix() {
        assert!(new_session_id().starts_with("sess_"));
        assert!(new_memory_id().starts_with("mem_"));
        assert!(new_edit_id().starts_with("edit_"));
        assert!(new_callback_id().starts_with("cb_"));
        assert!(new_trace_id().starts_with("trace_"));
    }

    #[test]
    fn ids_are_unique() {
        let ids: HashSet<String> = (0..1000).map(|_| new_session_id()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn session_ids_are_time_ordered() {
        // UUID v7 sorts by creation time; prefixes are equal so the full
        // string sorts the same way.
        let a = new_session_id();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = new_session_id();
        assert!(a < b);
    }
}
