use std::path::Path;
use std::time::Duration;

use crate::config::{Config, MemtableType};
use crate::engine::Engine;
use tracing_subscriber::EnvFilter;

/// Installs a tracing subscriber honoring `RUST_LOG`, once per process.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A small-engine config rooted at `dir` with admission disabled in
/// practice (huge bucket).
pub fn small_config(dir: &Path, num_tables: usize, memtable_size: usize) -> Config {
    Config {
        wal_folder: dir.join("wal"),
        output_dir: dir.join("sstable"),
        wal_segment_size: 256,
        num_tables,
        memtable_size,
        memtable_type: MemtableType::Map,
        index_stride: 1,
        summary_stride: 2,
        token_bucket_size: 1_000_000,
        token_bucket_rate: 0,
        fill_interval: Duration::from_secs(1),
        cache_size: 16,
        ..Config::default()
    }
}

/// Opens an engine over `small_config`.
pub fn small_engine(dir: &Path, num_tables: usize, memtable_size: usize) -> Engine {
    Engine::open(small_config(dir, num_tables, memtable_size)).unwrap()
}
