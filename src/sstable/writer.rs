//! SSTable writer — materializes a frozen memtable as one generation.
//!
//! The writer walks the memtable's keys in order, serializing every record
//! into the Data image while feeding the bloom filter, and emitting an
//! Index entry every `index_stride` records and a Summary entry every
//! `summary_stride` index entries. The four images are then written to
//! `.tmp` paths, fsynced, and renamed into place — Data last, so that the
//! presence of a Data file guarantees a complete generation.

use std::{
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
};

use tracing::{debug, info};

use crate::config::Config;
use crate::filter::Filter;
use crate::memtable::Memtable;

use super::{SsTableError, TableFile, encode_record, encode_sparse_entry, next_generation, table_path};

/// Builds SSTable generations under a fixed output directory.
pub struct SstWriter {
    output_dir: PathBuf,
    index_stride: usize,
    summary_stride: usize,
    bf_expected_elements: usize,
    bf_false_positive_rate: f64,
}

impl SstWriter {
    /// Creates a writer from the engine configuration.
    pub fn new(config: &Config) -> Self {
        Self {
            output_dir: config.output_dir.clone(),
            index_stride: config.index_stride,
            summary_stride: config.summary_stride,
            bf_expected_elements: config.bf_expected_elements,
            bf_false_positive_rate: config.bf_false_positive_rate,
        }
    }

    /// Writes `table` out as a fresh generation and returns its number.
    pub fn flush(&self, table: &dyn Memtable) -> Result<u64, SsTableError> {
        let generation = next_generation(&self.output_dir)?;

        let mut filter = Filter::new(self.bf_expected_elements, self.bf_false_positive_rate)?;
        let mut data = Vec::new();
        let mut index = Vec::new();
        let mut summary = Vec::new();

        let keys = table.sorted_keys();
        for (i, key) in keys.iter().enumerate() {
            let record = table.get(key).ok_or_else(|| {
                SsTableError::Internal("memtable key vanished during flush".into())
            })?;

            filter.add(key);

            let data_offset = u32::try_from(data.len()).map_err(|_| {
                SsTableError::Internal("data image exceeds 4 GiB offset space".into())
            })?;
            data.extend_from_slice(&encode_record(record));

            if (i + 1) % self.index_stride == 0 {
                let index_offset = u32::try_from(index.len()).map_err(|_| {
                    SsTableError::Internal("index image exceeds 4 GiB offset space".into())
                })?;
                index.extend_from_slice(&encode_sparse_entry(key, data_offset));

                if (i + 1) % (self.index_stride * self.summary_stride) == 0 {
                    summary.extend_from_slice(&encode_sparse_entry(key, index_offset));
                }
            }
        }

        debug!(
            generation,
            records = keys.len(),
            data_bytes = data.len(),
            index_bytes = index.len(),
            summary_bytes = summary.len(),
            "SSTable images built"
        );

        // Data goes last: its rename publishes the generation.
        write_atomic(&table_path(&self.output_dir, generation, TableFile::Filter), &filter.to_bytes())?;
        write_atomic(&table_path(&self.output_dir, generation, TableFile::Summary), &summary)?;
        write_atomic(&table_path(&self.output_dir, generation, TableFile::Index), &index)?;
        write_atomic(&table_path(&self.output_dir, generation, TableFile::Data), &data)?;

        info!(generation, records = keys.len(), "SSTable generation flushed");
        Ok(generation)
    }
}

/// Writes `bytes` to `path` via a `.tmp` sibling, fsync, and rename.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), SsTableError> {
    let tmp = path.with_extension("tmp");
    {
        let mut file = File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}
