//! WAL segment reclamation.
//!
//! A segment may only be deleted once every entry in it is durable
//! downstream, i.e. once every memtable holding one of its entries has
//! been flushed to an SSTable. [`SegmentManager`] tracks that relation as
//! a map from segment index to the set of memtable slots still referencing
//! it.
//!
//! The engine creates a single manager and shares one `Arc` with the
//! mempool; mutation is guarded by a short internal exclusive section, the
//! same discipline as the token bucket.

use std::{
    collections::{HashMap, HashSet},
    fs, io,
    path::{Path, PathBuf},
    sync::Mutex,
};

use tracing::{debug, info};

use super::{WalError, segment_path};

/// Tracks which WAL segments are still referenced by unflushed memtables
/// and deletes the ones that are not.
pub struct SegmentManager {
    wal_dir: PathBuf,
    dict: Mutex<HashMap<u64, HashSet<usize>>>,
}

impl SegmentManager {
    /// Creates a manager deleting segments under `wal_dir`.
    pub fn new(wal_dir: impl AsRef<Path>) -> Self {
        Self {
            wal_dir: wal_dir.as_ref().to_path_buf(),
            dict: Mutex::new(HashMap::new()),
        }
    }

    /// Records that memtable slot `table_idx` holds an entry starting in
    /// `segment`. Called on every mempool insert.
    pub fn register(&self, segment: u64, table_idx: usize) -> Result<(), WalError> {
        let mut dict = self
            .dict
            .lock()
            .map_err(|_| WalError::Internal("Mutex poisoned".into()))?;
        dict.entry(segment).or_default().insert(table_idx);
        Ok(())
    }

    /// Releases every reference held by memtable slot `table_idx` and
    /// deletes segments left unreferenced.
    ///
    /// Segments at or beyond `keep_from` are never deleted: the writer is
    /// still appending there (or will be, once pending bytes spill), and
    /// removing the live append target would silently drop entries logged
    /// after this flush.
    pub fn table_flushed(&self, table_idx: usize, keep_from: u64) -> Result<(), WalError> {
        let mut dict = self
            .dict
            .lock()
            .map_err(|_| WalError::Internal("Mutex poisoned".into()))?;

        let mut reclaimable = Vec::new();
        for (&segment, tables) in dict.iter_mut() {
            tables.remove(&table_idx);
            if tables.is_empty() && segment < keep_from {
                reclaimable.push(segment);
            }
        }

        for segment in reclaimable {
            dict.remove(&segment);
            let path = segment_path(&self.wal_dir, segment);
            match fs::remove_file(&path) {
                Ok(()) => info!(segment, "WAL segment reclaimed"),
                // Entries can start in a segment whose file only exists
                // once the writer's pending buffer spills.
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    debug!(segment, "WAL segment already absent")
                }
                Err(e) => return Err(WalError::Io(e)),
            }
        }

        Ok(())
    }

    /// Segment indexes currently holding at least one reference.
    pub fn tracked_segments(&self) -> Result<Vec<u64>, WalError> {
        let dict = self
            .dict
            .lock()
            .map_err(|_| WalError::Internal("Mutex poisoned".into()))?;
        let mut segments: Vec<u64> = dict
            .iter()
            .filter(|(_, tables)| !tables.is_empty())
            .map(|(&segment, _)| segment)
            .collect();
        segments.sort_unstable();
        Ok(segments)
    }
}
