//! The two-slot version history stored per primary key.

use chrono::{DateTime, Utc};
use ddb_expr::Entry;
use serde::{Deserialize, Serialize};

/// One historical version of an item: its body (empty for a tombstone save
/// of just the key attributes), whether it's a tombstone, and when it was
/// written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryWrapper {
    pub entry: Entry,
    pub tombstone: bool,
    pub created_at: DateTime<Utc>,
}

/// A fixed-size (≤ 2) ring of item versions, modeling eventual-vs-consistent
/// reads: `current()` is the latest write, `previous()` is the one before
/// it, synthesizing visible replication lag.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Tuple {
    entries: Vec<EntryWrapper>,
}

impl Tuple {
    /// Creates an empty tuple.
    #[must_use]
    pub const fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Appends a new version, dropping the oldest slot if already at
    /// capacity.
    pub fn push(&mut self, wrapper: EntryWrapper) {
        if self.entries.len() == 2 {
            self.entries.remove(0);
        }
        self.entries.push(wrapper);
    }

    /// The most recently written non-tombstone body.
    #[must_use]
    pub fn current(&self) -> Option<&Entry> {
        match self.entries.last() {
            Some(w) if !w.tombstone => Some(&w.entry),
            _ => None,
        }
    }

    /// The body one version behind `current`, if this tuple has two slots
    /// and the older one isn't a tombstone.
    #[must_use]
    pub fn previous(&self) -> Option<&Entry> {
        if self.entries.len() == 2 {
            let w = &self.entries[0];
            if !w.tombstone {
                return Some(&w.entry);
            }
        }
        None
    }

    /// Picks `current` or `previous` per the read's consistency mode.
    #[must_use]
    pub fn read(&self, consistent: bool) -> Option<&Entry> {
        if consistent {
            self.current()
        } else {
            self.previous()
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wrapper(tombstone: bool) -> EntryWrapper {
        EntryWrapper {
            entry: Entry::new(),
            tombstone,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn single_put_has_current_but_no_previous() {
        let mut t = Tuple::new();
        t.push(wrapper(false));
        assert!(t.current().is_some());
        assert!(t.previous().is_none());
    }

    #[test]
    fn second_put_shifts_current_to_previous() {
        let mut t = Tuple::new();
        t.push(wrapper(false));
        t.push(wrapper(false));
        assert_eq!(t.len(), 2);
        assert!(t.current().is_some());
        assert!(t.previous().is_some());
    }

    #[test]
    fn delete_after_put_has_no_current_but_keeps_previous() {
        let mut t = Tuple::new();
        t.push(wrapper(false));
        t.push(wrapper(true));
        assert!(t.current().is_none());
        assert!(t.previous().is_some());
    }

    #[test]
    fn never_exceeds_two_slots() {
        let mut t = Tuple::new();
        for _ in 0..10 {
            t.push(wrapper(false));
        }
        assert_eq!(t.len(), 2);
    }
}
