//! SSTable reader — point lookups across generations.
//!
//! Lookups walk generations newest-first. Within a generation the descent
//! is Filter → Summary → Index → Data: each layer either rules the
//! generation out or narrows the starting offset for the next. Summary and
//! Index files are small and read whole; the Data file is memory-mapped
//! for the final forward scan and unmapped before returning.
//!
//! When a key precedes the first summarized (or indexed) key, the next
//! layer is scanned from offset 0 instead of skipping the generation:
//! with a stride above one, the first records of the Data file have no
//! index entry, yet they are still present and must stay reachable.

use std::{fs, fs::File, path::PathBuf};

use memmap2::Mmap;
use tracing::{debug, trace};

use crate::filter::Filter;
use crate::memtable::Record;

use super::{SsTableError, TableFile, decode_record, decode_sparse_entry, discover_generations, table_path};

/// Point-lookup reader over every generation in an output directory.
pub struct SstReader {
    output_dir: PathBuf,
}

impl SstReader {
    /// Creates a reader over `output_dir`.
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Returns the newest on-disk record for `key`, tombstones included.
    ///
    /// A record from generation `G` shadows every generation older than
    /// `G`; the caller decides what a tombstone means.
    pub fn get(&self, key: &[u8]) -> Result<Option<Record>, SsTableError> {
        let mut generations = discover_generations(&self.output_dir)?;
        generations.sort_unstable_by(|a, b| b.cmp(a));

        for generation in generations {
            if let Some(record) = self.get_in_generation(generation, key)? {
                trace!(generation, "SSTable hit");
                return Ok(Some(record));
            }
        }
        Ok(None)
    }

    /// Number of generations currently on disk.
    pub fn generation_count(&self) -> Result<usize, SsTableError> {
        Ok(discover_generations(&self.output_dir)?.len())
    }

    fn get_in_generation(
        &self,
        generation: u64,
        key: &[u8],
    ) -> Result<Option<Record>, SsTableError> {
        // 1. Filter: a negative answer is authoritative.
        let filter_bytes = fs::read(table_path(&self.output_dir, generation, TableFile::Filter))?;
        let filter = Filter::from_bytes(&filter_bytes)?;
        if !filter.query(key) {
            trace!(generation, "filter negative");
            return Ok(None);
        }

        // 2. Summary: last entry with summary_key <= key points at the
        //    index region; none means "start the index from the top".
        let summary = fs::read(table_path(&self.output_dir, generation, TableFile::Summary))?;
        let mut index_start = 0usize;
        let mut pos = 0usize;
        while let Some((summary_key, offset, next)) = decode_sparse_entry(&summary, pos)? {
            if summary_key.as_slice() > key {
                break;
            }
            index_start = offset as usize;
            pos = next;
        }

        // 3. Index: last entry with index_key <= key points at the data
        //    scan start; an exact hit is already the final offset.
        let index = fs::read(table_path(&self.output_dir, generation, TableFile::Index))?;
        if index_start > index.len() {
            return Err(SsTableError::Corrupt(format!(
                "summary offset {index_start} past index end {}",
                index.len()
            )));
        }
        let mut data_start = 0usize;
        let mut pos = index_start;
        while let Some((index_key, offset, next)) = decode_sparse_entry(&index, pos)? {
            if index_key.as_slice() > key {
                break;
            }
            data_start = offset as usize;
            if index_key.as_slice() == key {
                break;
            }
            pos = next;
        }

        // 4. Data: forward scan until the key is found or passed.
        let data_file = File::open(table_path(&self.output_dir, generation, TableFile::Data))?;
        let mmap = unsafe { Mmap::map(&data_file)? };
        if data_start > mmap.len() {
            return Err(SsTableError::Corrupt(format!(
                "index offset {data_start} past data end {}",
                mmap.len()
            )));
        }

        let mut pos = data_start;
        while pos < mmap.len() {
            let (record, next) = decode_record(&mmap, pos)?;
            if record.key.as_slice() == key {
                debug!(generation, offset = pos, tombstone = record.tombstone, "data hit");
                return Ok(Some(record));
            }
            if record.key.as_slice() > key {
                break;
            }
            pos = next;
        }

        Ok(None)
    }
}
