//! Object id lookup for records that are referenced later in the stream.

use crate::record::ClassShape;
use std::collections::HashMap;

/// What an id was registered as
#[derive(Debug, Clone, PartialEq)]
pub enum TableEntry {
    /// Class metadata, available to later class references
    Class(ClassShape),
    /// A string object's text
    String(String),
    /// A library name
    Library(String),
}

/// Append-only arena of `(id, entry)` pairs with an id index.
///
/// Lookups are first-match-wins: registering an id a second time appends
/// the entry but never replaces what the index already points at.
#[derive(Debug, Default)]
pub struct ReferenceTable {
    entries: Vec<(i32, TableEntry)>,
    index: HashMap<i32, usize>,
}

impl ReferenceTable {
    /// Creates an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry
    pub fn register(&mut self, id: i32, entry: TableEntry) {
        let slot = self.entries.len();
        self.entries.push((id, entry));
        self.index.entry(id).or_insert(slot);
    }

    /// First entry registered under `id`
    pub fn get(&self, id: i32) -> Option<&TableEntry> {
        self.index.get(&id).map(|&slot| &self.entries[slot].1)
    }

    /// Class metadata registered under `id`
    pub fn class_shape(&self, id: i32) -> Option<&ClassShape> {
        match self.get(id) {
            Some(TableEntry::Class(shape)) => Some(shape),
            _ => None,
        }
    }

    /// Library name registered under `id`
    pub fn library(&self, id: i32) -> Option<&str> {
        match self.get(id) {
            Some(TableEntry::Library(name)) => Some(name),
            _ => None,
        }
    }

    /// Number of registrations, duplicates included
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing was registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_registration_wins() {
        let mut table = ReferenceTable::new();
        table.register(7, TableEntry::Library("first".into()));
        table.register(7, TableEntry::Library("second".into()));
        assert_eq!(table.len(), 2);
        assert_eq!(table.library(7), Some("first"));
    }

    #[test]
    fn test_kind_mismatch_is_none() {
        let mut table = ReferenceTable::new();
        table.register(3, TableEntry::String("Sword".into()));
        assert!(table.get(3).is_some());
        assert!(table.class_shape(3).is_none());
        assert!(table.library(3).is_none());
        assert!(table.get(4).is_none());
    }
}
