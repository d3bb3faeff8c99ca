//! Mempool — a ring of memtables.
//!
//! Writes land in the active memtable; when it fills, the active index
//! advances to the next slot in the ring. When the advance lands on a full
//! table the whole ring is full, and that table — the one frozen longest —
//! is flushed through the SSTable writer and replaced with a fresh empty
//! memtable before accepting the next write. A flush produces exactly one
//! SSTable generation and is synchronous with the insert that triggered
//! it.
//!
//! Reads probe the ring newest-first: the active table, then its
//! predecessors in rotation order. A tombstone is a hit like any other
//! record — the caller interprets it.
//!
//! Every insert registers the WAL segment the entry started in against
//! the active slot; after a flush the slot's references are released so
//! fully-covered segments can be reclaimed.


use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use crate::config::Config;
use crate::memtable::{self, Memtable, Record};
use crate::sstable::{SsTableError, SstWriter};
use crate::wal::WalError;
use crate::wal::segments::SegmentManager;

/// Errors returned by mempool operations.
#[derive(Debug, Error)]
pub enum MempoolError {
    /// A flush through the SSTable writer failed.
    #[error("SSTable error: {0}")]
    SsTable(#[from] SsTableError),

    /// Segment accounting failed.
    #[error("WAL error: {0}")]
    Wal(#[from] WalError),

    /// Internal invariant violation.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Ring of memtables with one active writer slot.
pub struct Mempool {
    tables: Vec<Box<dyn Memtable>>,
    active: usize,
    writer: SstWriter,
    segments: Arc<SegmentManager>,
    config: Config,
}

impl Mempool {
    /// Builds a ring of `config.num_tables` empty memtables of the
    /// configured kind.
    pub fn new(config: &Config, writer: SstWriter, segments: Arc<SegmentManager>) -> Self {
        let tables = (0..config.num_tables)
            .map(|_| memtable::build(config))
            .collect();
        Self {
            tables,
            active: 0,
            writer,
            segments,
            config: config.clone(),
        }
    }

    /// Probes the ring newest-first; the first hit wins, tombstones
    /// included.
    pub fn get(&self, key: &[u8]) -> Option<&Record> {
        let n = self.tables.len();
        for i in 0..n {
            let idx = (self.active + n - i) % n;
            if let Some(record) = self.tables[idx].get(key) {
                return Some(record);
            }
        }
        None
    }

    /// Inserts `record`, rotating and flushing as the ring fills.
    ///
    /// `segment` is the WAL segment the record's log entry started in.
    /// Returns the generation number when this insert triggered a flush.
    pub fn put(&mut self, record: Record, segment: u64) -> Result<Option<u64>, MempoolError> {
        self.segments.register(segment, self.active)?;
        self.tables[self.active].insert(record);

        if !self.tables[self.active].is_full() {
            return Ok(None);
        }

        let n = self.tables.len();
        self.active = (self.active + 1) % n;
        debug!(active = self.active, "memtable rotated");

        if !self.tables[self.active].is_full() {
            return Ok(None);
        }

        // Whole ring full: the slot we just rotated onto is the one that
        // has been frozen longest. Flush it and start it fresh.
        let generation = self.writer.flush(self.tables[self.active].as_ref())?;
        self.tables[self.active] = memtable::build(&self.config);
        self.segments.table_flushed(self.active, segment)?;

        info!(
            generation,
            slot = self.active,
            "memtable flushed and recycled"
        );
        Ok(Some(generation))
    }

    /// Inserts a tombstone; otherwise identical to [`put`](Self::put).
    pub fn delete(&mut self, key: &[u8], segment: u64) -> Result<Option<u64>, MempoolError> {
        self.put(Record::tombstone(key.to_vec()), segment)
    }

    /// Index of the slot currently accepting writes.
    pub fn active_index(&self) -> usize {
        self.active
    }

    /// Entries resident across the whole ring.
    pub fn resident_entries(&self) -> usize {
        self.tables.iter().map(|t| t.len()).sum()
    }

    /// Number of full (frozen) tables in the ring.
    pub fn full_tables(&self) -> usize {
        self.tables.iter().filter(|t| t.is_full()).count()
    }
}
