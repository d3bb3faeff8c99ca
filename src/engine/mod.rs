//! The storage engine.
//!
//! A single-threaded cooperative actor orchestrating the write and read
//! paths:
//!
//! - **Writes** (`put`, `delete`): pass admission control, append to the
//!   WAL, then insert into the mempool's active memtable. A full ring
//!   flushes its oldest memtable to a fresh SSTable generation
//!   synchronously, after which fully-covered WAL segments are reclaimed.
//! - **Reads** (`get`): pass admission control, then cascade mempool →
//!   block cache → SSTable generations newest-first. The first record
//!   found wins; a tombstone anywhere ends the search as "not found".
//!   SSTable hits are promoted into the cache.
//! - **Recovery** (`restore`): replay the WAL into the mempool. Must run
//!   before accepting traffic after a crash; stops at the first corrupt
//!   entry, leaving everything before it applied.
//!
//! # Ordering guarantees
//!
//! The WAL append strictly precedes the memtable insert for every
//! operation; an insert is visible to the next `get` immediately; a flush
//! is durable (and its WAL segments reclaimable) only once the SSTable
//! files are fsynced into place.

#[cfg(test)]
mod tests;

use std::fs;
use std::sync::Arc;

use thiserror::Error;
use tracing::{error, info, trace};

use crate::cache::BlockCache;
use crate::config::{Config, ConfigError};
use crate::mempool::{Mempool, MempoolError};
use crate::memtable::Record;
use crate::sstable::{SsTableError, SstReader, SstWriter};
use crate::tokenbucket::{TokenBucket, TokenBucketError};
use crate::wal::segments::SegmentManager;
use crate::wal::{WalError, WalOp, WalWriter};

// ------------------------------------------------------------------------------------------------
// Error Types
// ------------------------------------------------------------------------------------------------

/// Errors surfaced by engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The configuration failed validation.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// Admission control rejected the operation; retry later.
    #[error("rate limited")]
    RateLimited,

    /// The caller passed an argument the engine refuses before any I/O.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Error originating in the write-ahead log.
    #[error("WAL error: {0}")]
    Wal(#[from] WalError),

    /// Error originating in the mempool or a flush it performed.
    #[error("mempool error: {0}")]
    Mempool(#[from] MempoolError),

    /// Error originating in the SSTable read path.
    #[error("SSTable error: {0}")]
    SsTable(#[from] SsTableError),

    /// Admission control internals failed.
    #[error("token bucket error: {0}")]
    TokenBucket(#[from] TokenBucketError),

    /// Underlying filesystem I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Snapshot of engine counters returned by [`Engine::stats`].
#[derive(Debug)]
pub struct EngineStats {
    /// Entries resident across the memtable ring.
    pub resident_entries: usize,

    /// Full (frozen) memtables awaiting flush.
    pub full_tables: usize,

    /// SSTable generations on disk.
    pub generations: usize,

    /// Records resident in the block cache.
    pub cached_records: usize,

    /// WAL segment range `[first, current]`.
    pub wal_segments: (u64, u64),
}

// ------------------------------------------------------------------------------------------------
// Engine
// ------------------------------------------------------------------------------------------------

/// The embeddable LSM storage engine.
pub struct Engine {
    bucket: TokenBucket,
    wal: WalWriter,
    mempool: Mempool,
    cache: BlockCache,
    reader: SstReader,
    segments: Arc<SegmentManager>,
}

impl Engine {
    /// Opens an engine with the given configuration, creating the WAL and
    /// SSTable directories as needed.
    ///
    /// After a crash, call [`restore`](Self::restore) before serving
    /// traffic.
    pub fn open(config: Config) -> Result<Self, EngineError> {
        config.validate()?;

        fs::create_dir_all(&config.wal_folder)?;
        fs::create_dir_all(&config.output_dir)?;

        let bucket = TokenBucket::new(
            config.token_bucket_size,
            config.token_bucket_rate,
            config.fill_interval,
        );
        let segments = Arc::new(SegmentManager::new(&config.wal_folder));
        let wal = WalWriter::open(&config.wal_folder, config.wal_segment_size)?;
        let writer = SstWriter::new(&config);
        let mempool = Mempool::new(&config, writer, Arc::clone(&segments));
        let cache = BlockCache::new(config.cache_size);
        let reader = SstReader::new(config.output_dir.clone());

        info!(
            wal_folder = %config.wal_folder.display(),
            output_dir = %config.output_dir.display(),
            num_tables = config.num_tables,
            memtable_size = config.memtable_size,
            "engine opened"
        );

        Ok(Self {
            bucket,
            wal,
            mempool,
            cache,
            reader,
            segments,
        })
    }

    fn admit(&self) -> Result<(), EngineError> {
        if self.bucket.try_acquire()? {
            Ok(())
        } else {
            Err(EngineError::RateLimited)
        }
    }

    /// Maps WAL-level argument rejection to the engine-level kind; real
    /// log failures pass through.
    fn map_wal(error: WalError) -> EngineError {
        match error {
            WalError::InvalidArgument(message) => EngineError::InvalidArgument(message),
            other => EngineError::Wal(other),
        }
    }

    /// Inserts or updates `key`.
    ///
    /// WAL-first: the mutation is durable in the log (buffer included)
    /// before the memtable sees it.
    pub fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), EngineError> {
        self.admit()?;

        let segment = self
            .wal
            .log(key, Some(value), WalOp::Put)
            .map_err(Self::map_wal)?;

        let record = Record::put(key.to_vec(), value.to_vec());
        self.cache.refresh(&record);
        self.mempool.put(record, segment)?;

        trace!(segment, "put applied");
        Ok(())
    }

    /// Logically deletes `key` by writing a tombstone.
    pub fn delete(&mut self, key: &[u8]) -> Result<(), EngineError> {
        self.admit()?;

        let segment = self
            .wal
            .log(key, None, WalOp::Delete)
            .map_err(Self::map_wal)?;

        let record = Record::tombstone(key.to_vec());
        self.cache.refresh(&record);
        self.mempool.put(record, segment)?;

        trace!(segment, "delete applied");
        Ok(())
    }

    /// Returns the live value for `key`, or `None` when absent or deleted.
    ///
    /// The cascade is mempool (newest memtable first), then block cache,
    /// then SSTable generations newest-first; the first record found is
    /// authoritative. SSTable hits are inserted into the cache.
    pub fn get(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>, EngineError> {
        self.admit()?;

        if key.is_empty() {
            return Err(EngineError::InvalidArgument("key is empty".into()));
        }

        if let Some(record) = self.mempool.get(key) {
            trace!("get served from mempool");
            return Ok(live_value(record));
        }

        if let Some(record) = self.cache.get(key) {
            trace!("get served from cache");
            return Ok(live_value(&record));
        }

        if let Some(record) = self.reader.get(key)? {
            trace!("get served from SSTable");
            self.cache.put(record.clone());
            return Ok(live_value(&record));
        }

        Ok(None)
    }

    /// Replays the WAL into the mempool; returns the entry count applied.
    ///
    /// Replay stops at the first corrupt or truncated entry: its position
    /// is logged, the error is surfaced, and everything replayed before it
    /// stays applied. The WAL itself is the authority — entries are not
    /// re-logged.
    pub fn restore(&mut self) -> Result<usize, EngineError> {
        let reader = self.wal.reader()?;
        let mut applied = 0usize;

        for item in reader {
            let recovered = match item {
                Ok(recovered) => recovered,
                Err(e) => {
                    error!(error = %e, applied, "WAL replay stopped");
                    return Err(e.into());
                }
            };

            let record = if recovered.entry.tombstone {
                Record::tombstone(recovered.entry.key)
            } else {
                Record::put(recovered.entry.key, recovered.entry.value)
            };
            self.mempool.put(record, recovered.segment)?;
            applied += 1;
        }

        info!(applied, "WAL replay complete");
        Ok(applied)
    }

    /// Forces every buffered WAL byte to disk.
    pub fn sync(&mut self) -> Result<(), EngineError> {
        self.wal.sync()?;
        Ok(())
    }

    /// Point-in-time counters for diagnostics.
    pub fn stats(&self) -> Result<EngineStats, EngineError> {
        Ok(EngineStats {
            resident_entries: self.mempool.resident_entries(),
            full_tables: self.mempool.full_tables(),
            generations: self.reader.generation_count()?,
            cached_records: self.cache.len(),
            wal_segments: (self.wal.first_segment(), self.wal.current_segment()),
        })
    }

    /// WAL segments still referenced by unflushed memtables.
    pub fn live_segments(&self) -> Result<Vec<u64>, EngineError> {
        Ok(self.segments.tracked_segments()?)
    }
}

/// `None` for tombstones, the value otherwise.
fn live_value(record: &Record) -> Option<Vec<u8>> {
    if record.tombstone {
        None
    } else {
        Some(record.value.clone())
    }
}
