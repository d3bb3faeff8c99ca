//! Engine configuration.
//!
//! [`Config`] collects every tunable the engine recognizes. It is a plain
//! struct: construct one (usually from [`Config::default`]), adjust fields,
//! and hand it to [`Engine::open`](crate::engine::Engine::open). Loading
//! configuration from files is left to the embedding application.


use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Raised by [`Config::validate`] for parameter combinations the engine
/// cannot run with.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A structural parameter was zero or otherwise degenerate.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Which ordered structure backs each memtable in the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemtableType {
    /// A sorted map (`BTreeMap`).
    Map,
    /// A randomized skip list, tower height capped by
    /// [`Config::skip_list_max_level`].
    SkipList,
    /// A B-tree of minimum degree [`Config::btree_min_degree`].
    BTree,
}

/// All engine tunables.
///
/// Field-by-field effects are documented inline; defaults are chosen for
/// small embedded workloads and test friendliness, not for production
/// sizing.
#[derive(Debug, Clone)]
pub struct Config {
    /// Capacity of a single WAL segment file in bytes.
    pub wal_segment_size: usize,

    /// Directory holding `wal_NNNNN.log` segments.
    pub wal_folder: PathBuf,

    /// Number of memtables in the mempool ring.
    pub num_tables: usize,

    /// Entries (tombstones included) a memtable holds before it is full.
    pub memtable_size: usize,

    /// Ordered structure backing each memtable.
    pub memtable_type: MemtableType,

    /// Maximum tower height for the skip-list variant.
    pub skip_list_max_level: usize,

    /// Minimum degree `t` for the B-tree variant.
    pub btree_min_degree: usize,

    /// Directory receiving SSTable generations.
    pub output_dir: PathBuf,

    /// Every `index_stride`-th data record gets an index entry.
    pub index_stride: usize,

    /// Every `summary_stride`-th index entry gets a summary entry.
    pub summary_stride: usize,

    /// Expected element count used to size each bloom filter.
    pub bf_expected_elements: usize,

    /// Target false-positive rate for each bloom filter.
    pub bf_false_positive_rate: f64,

    /// Token bucket capacity (burst size).
    pub token_bucket_size: u64,

    /// Tokens added per [`Config::fill_interval`]. Zero disables refill.
    pub token_bucket_rate: u64,

    /// Interval over which `token_bucket_rate` tokens accrue.
    pub fill_interval: Duration,

    /// Block cache capacity in records.
    pub cache_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            wal_segment_size: 1024 * 1024,
            wal_folder: PathBuf::from("data/wal"),
            num_tables: 4,
            memtable_size: 1024,
            memtable_type: MemtableType::Map,
            skip_list_max_level: 16,
            btree_min_degree: 16,
            output_dir: PathBuf::from("data/sstable"),
            index_stride: 1,
            summary_stride: 5,
            bf_expected_elements: 4096,
            bf_false_positive_rate: 0.01,
            token_bucket_size: 1000,
            token_bucket_rate: 1000,
            fill_interval: Duration::from_secs(1),
            cache_size: 1024,
        }
    }
}

impl Config {
    /// Rejects parameter values the engine cannot operate with.
    ///
    /// Called by [`Engine::open`](crate::engine::Engine::open) before any
    /// directory is touched.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.wal_segment_size == 0 {
            return Err(ConfigError::Invalid("wal_segment_size must be > 0".into()));
        }
        if self.num_tables == 0 {
            return Err(ConfigError::Invalid("num_tables must be > 0".into()));
        }
        if self.memtable_size == 0 {
            return Err(ConfigError::Invalid("memtable_size must be > 0".into()));
        }
        if self.memtable_type == MemtableType::SkipList && self.skip_list_max_level == 0 {
            return Err(ConfigError::Invalid(
                "skip_list_max_level must be > 0".into(),
            ));
        }
        if self.memtable_type == MemtableType::BTree && self.btree_min_degree < 2 {
            return Err(ConfigError::Invalid("btree_min_degree must be >= 2".into()));
        }
        if self.index_stride == 0 {
            return Err(ConfigError::Invalid("index_stride must be > 0".into()));
        }
        if self.summary_stride == 0 {
            return Err(ConfigError::Invalid("summary_stride must be > 0".into()));
        }
        if self.bf_expected_elements == 0 {
            return Err(ConfigError::Invalid(
                "bf_expected_elements must be > 0".into(),
            ));
        }
        if !(self.bf_false_positive_rate > 0.0 && self.bf_false_positive_rate < 1.0) {
            return Err(ConfigError::Invalid(
                "bf_false_positive_rate must be in (0, 1)".into(),
            ));
        }
        if self.cache_size == 0 {
            return Err(ConfigError::Invalid("cache_size must be > 0".into()));
        }
        Ok(())
    }
}
