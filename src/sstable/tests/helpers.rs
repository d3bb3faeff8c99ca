use std::path::Path;

use crate::config::Config;
use crate::memtable::map::MapMemtable;
use crate::memtable::Memtable;
use crate::sstable::SstWriter;
use tracing_subscriber::EnvFilter;

/// Installs a tracing subscriber honoring `RUST_LOG`, once per process.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A config writing SSTables into `dir` with the given strides.
pub fn writer_config(dir: &Path, index_stride: usize, summary_stride: usize) -> Config {
    Config {
        output_dir: dir.to_path_buf(),
        index_stride,
        summary_stride,
        bf_expected_elements: 512,
        bf_false_positive_rate: 0.01,
        ..Config::default()
    }
}

/// Flushes `pairs` (sorted or not) as one generation; returns its number.
pub fn flush_pairs(dir: &Path, pairs: &[(&str, &str)], stride: usize) -> u64 {
    let mut table = MapMemtable::new(pairs.len().max(1));
    for (key, value) in pairs {
        table.put(key.as_bytes(), value.as_bytes());
    }
    SstWriter::new(&writer_config(dir, stride, 2))
        .flush(&table)
        .unwrap()
}
