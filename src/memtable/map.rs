//! `BTreeMap`-backed memtable variant.

use std::collections::BTreeMap;

use super::{Memtable, Record};

/// The simplest variant: a sorted map keyed by raw bytes.
///
/// `BTreeMap` already orders `Vec<u8>` keys byte-wise, so every capability
/// falls out of the container.
pub struct MapMemtable {
    tree: BTreeMap<Vec<u8>, Record>,
    capacity: usize,
}

impl MapMemtable {
    /// Creates an empty table that is full at `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            tree: BTreeMap::new(),
            capacity,
        }
    }
}

impl Memtable for MapMemtable {
    fn insert(&mut self, record: Record) {
        self.tree.insert(record.key.clone(), record);
    }

    fn get(&self, key: &[u8]) -> Option<&Record> {
        self.tree.get(key)
    }

    fn len(&self) -> usize {
        self.tree.len()
    }

    fn is_full(&self) -> bool {
        self.tree.len() >= self.capacity
    }

    fn sorted_keys(&self) -> Vec<Vec<u8>> {
        self.tree.keys().cloned().collect()
    }
}
