//! In-memory entry store
//!
//! The store is the only state shared between sessions. It wraps its table in
//! a `parking_lot::RwLock`:
//!
//! - Every public operation acquires the lock exactly once, performs the
//!   in-memory step and returns owned data
//! - Callers format and write responses after the guard is dropped, so the
//!   lock is never held across socket I/O
//! - Ids come from a single counter under the write lock, so concurrent
//!   creates never observe the same id
//!
//! Entries are kept in a `BTreeMap` keyed by id. Ids are handed out in
//! increasing order and never reused, so iteration order equals creation
//! order and LIST / SEARCH enumerate deterministically.

mod entry;

pub use entry::{EntryFields, EntryId, EntryRecord, Field, FieldSet};

use std::collections::BTreeMap;

use parking_lot::RwLock;

use crate::error::{RegistryError, Result};

/// A stored entry together with its attached strings
#[derive(Debug, Clone)]
struct Entry {
    fields: EntryFields,
    strings: Vec<String>,
}

#[derive(Debug)]
struct StoreInner {
    entries: BTreeMap<EntryId, Entry>,
    next_id: EntryId,
}

impl StoreInner {
    fn entry(&self, id: EntryId) -> Result<&Entry> {
        self.entries.get(&id).ok_or(RegistryError::EntryNotFound { id })
    }

    fn entry_mut(&mut self, id: EntryId) -> Result<&mut Entry> {
        self.entries
            .get_mut(&id)
            .ok_or(RegistryError::EntryNotFound { id })
    }
}

/// Thread-safe registry table
#[derive(Debug)]
pub struct EntryStore {
    inner: RwLock<StoreInner>,
}

impl EntryStore {
    /// Create an empty store; the first id handed out is 1
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(StoreInner {
                entries: BTreeMap::new(),
                next_id: 1,
            }),
        }
    }

    fn read<R>(&self, f: impl FnOnce(&StoreInner) -> R) -> R {
        let guard = self.inner.read();
        f(&guard)
    }

    fn write<R>(&self, f: impl FnOnce(&mut StoreInner) -> R) -> R {
        let mut guard = self.inner.write();
        f(&mut guard)
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.read(|inner| inner.entries.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Create a new entry; every field must be present and non-default
    pub fn create(&self, fields: &FieldSet) -> Result<EntryId> {
        let fields = fields.to_fields();
        let missing = fields.missing_fields();
        if !missing.is_empty() {
            return Err(RegistryError::IncompleteData {
                message: format!("missing or invalid: {}", missing.join(", ")),
            });
        }

        let id = self.write(|inner| {
            let id = inner.next_id;
            inner.next_id += 1;
            inner.entries.insert(
                id,
                Entry {
                    fields,
                    strings: Vec::new(),
                },
            );
            id
        });
        tracing::debug!("Created entry {}", id);
        Ok(id)
    }

    /// Apply a partial update; rejected without mutation when the merged
    /// entry would be incomplete
    pub fn change(&self, id: EntryId, patch: &FieldSet) -> Result<EntryId> {
        self.write(|inner| {
            let entry = inner.entry_mut(id)?;
            let merged = patch.apply_to(&entry.fields);
            let missing = merged.missing_fields();
            if !missing.is_empty() {
                return Err(RegistryError::IncompleteData {
                    message: format!("missing or invalid: {}", missing.join(", ")),
                });
            }
            entry.fields = merged;
            Ok(id)
        })
    }

    /// Remove an entry and all of its strings
    pub fn delete(&self, id: EntryId) -> Result<EntryId> {
        self.write(|inner| {
            inner
                .entries
                .remove(&id)
                .map(|_| id)
                .ok_or(RegistryError::EntryNotFound { id })
        })
    }

    pub fn show(&self, id: EntryId) -> Result<EntryRecord> {
        self.read(|inner| {
            inner.entry(id).map(|entry| EntryRecord {
                id,
                fields: entry.fields.clone(),
            })
        })
    }

    /// All entries in id order
    pub fn list(&self) -> Vec<EntryRecord> {
        self.search(&FieldSet::default())
    }

    /// Entries matching every non-wildcard field of `predicate`, in id order
    pub fn search(&self, predicate: &FieldSet) -> Vec<EntryRecord> {
        self.read(|inner| {
            inner
                .entries
                .iter()
                .filter(|(_, entry)| predicate.matches(&entry.fields))
                .map(|(&id, entry)| EntryRecord {
                    id,
                    fields: entry.fields.clone(),
                })
                .collect()
        })
    }

    /// Delete every entry, returning how many were removed.
    /// The id counter is not reset.
    pub fn clean(&self) -> usize {
        let count = self.write(|inner| {
            let count = inner.entries.len();
            inner.entries.clear();
            count
        });
        tracing::debug!("Cleaned {} entries", count);
        count
    }

    /// Append a string to an entry, returning its 1-based position
    pub fn add_string(&self, id: EntryId, text: String) -> Result<usize> {
        self.write(|inner| {
            let entry = inner.entry_mut(id)?;
            entry.strings.push(text);
            Ok(entry.strings.len())
        })
    }

    pub fn get_string(&self, id: EntryId, pos: usize) -> Result<String> {
        self.read(|inner| {
            let entry = inner.entry(id)?;
            pos.checked_sub(1)
                .and_then(|index| entry.strings.get(index))
                .cloned()
                .ok_or(RegistryError::StringNotFound { id, pos })
        })
    }

    /// Remove the string at `pos`; later strings shift down by one position
    pub fn delete_string(&self, id: EntryId, pos: usize) -> Result<()> {
        self.write(|inner| {
            let entry = inner.entry_mut(id)?;
            if pos == 0 || pos > entry.strings.len() {
                return Err(RegistryError::StringNotFound { id, pos });
            }
            entry.strings.remove(pos - 1);
            Ok(())
        })
    }

    pub fn list_strings(&self, id: EntryId) -> Result<Vec<String>> {
        self.read(|inner| inner.entry(id).map(|entry| entry.strings.clone()))
    }

    pub fn count_strings(&self, id: EntryId) -> Result<usize> {
        self.read(|inner| inner.entry(id).map(|entry| entry.strings.len()))
    }
}

impl Default for EntryStore {
    fn default() -> Self {
        Self::new()
    }
}
