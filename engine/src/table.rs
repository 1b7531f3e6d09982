//! Per-type record table.
//!
//! Records are kept in insertion order and indexed by both identifiers.

use crate::identity::{IdentifierRef, LocalId, RemoteId};
use crate::record::Attributes;
use crate::Record;
use std::collections::{BTreeMap, HashMap};

/// An ordered collection of records of one type.
#[derive(Debug, Clone, Default)]
pub struct Table {
    records: BTreeMap<u64, Record>,
    by_local: HashMap<LocalId, u64>,
    by_remote: HashMap<RemoteId, u64>,
    next_seq: u64,
}

impl Table {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a record by local ID.
    pub fn get(&self, id: &LocalId) -> Option<&Record> {
        self.by_local.get(id).and_then(|seq| self.records.get(seq))
    }

    /// Get a record by remote ID.
    pub fn get_remote(&self, id: &RemoteId) -> Option<&Record> {
        self.by_remote.get(id).and_then(|seq| self.records.get(seq))
    }

    /// Resolve either identifier.
    pub fn resolve(&self, id: &IdentifierRef) -> Option<&Record> {
        match id {
            IdentifierRef::Local(local) => self.get(local),
            IdentifierRef::Remote(remote) => self.get_remote(remote),
        }
    }

    /// Resolve a local ID first, falling back to a remote ID.
    pub fn resolve_either(
        &self,
        local: Option<&LocalId>,
        remote: Option<&RemoteId>,
    ) -> Option<&Record> {
        local
            .and_then(|id| self.get(id))
            .or_else(|| remote.and_then(|id| self.get_remote(id)))
    }

    pub fn contains(&self, id: &LocalId) -> bool {
        self.by_local.contains_key(id)
    }

    pub fn contains_remote(&self, id: &RemoteId) -> bool {
        self.by_remote.contains_key(id)
    }

    /// Insert or overwrite a record, keeping its position if it already exists.
    pub fn upsert(&mut self, record: Record) {
        let seq = match self.by_local.get(&record.local_id) {
            Some(seq) => *seq,
            None => {
                let seq = self.next_seq;
                self.next_seq += 1;
                self.by_local.insert(record.local_id.clone(), seq);
                seq
            }
        };

        if let Some(previous) = self.records.get(&seq) {
            if let Some(old_remote) = &previous.remote_id {
                if record.remote_id.as_ref() != Some(old_remote) {
                    self.by_remote.remove(old_remote);
                }
            }
        }
        if let Some(remote) = &record.remote_id {
            self.by_remote.insert(remote.clone(), seq);
        }
        self.records.insert(seq, record);
    }

    /// Remove a record by local ID.
    pub fn remove(&mut self, id: &LocalId) -> Option<Record> {
        let seq = self.by_local.remove(id)?;
        let record = self.records.remove(&seq)?;
        if let Some(remote) = &record.remote_id {
            self.by_remote.remove(remote);
        }
        Some(record)
    }

    /// All records in insertion order.
    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.records.values()
    }

    /// Records whose attributes equal every given attribute.
    pub fn filter<'a>(&'a self, filter: &'a Attributes) -> impl Iterator<Item = &'a Record> + 'a {
        self.records.values().filter(move |r| r.matches(filter))
    }

    /// Count of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
