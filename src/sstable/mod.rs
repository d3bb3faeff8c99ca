//! Sorted String Tables.
//!
//! An SSTable generation is one flush's worth of records, written once and
//! never modified. Each generation `G` is four files in the output
//! directory:
//!
//! ```text
//! usertable-GG-Data.txt     sorted records
//! usertable-GG-Index.txt    sparse index into Data
//! usertable-GG-Summary.txt  sparser index into Index
//! usertable-GG-Filter.txt   serialized bloom filter over the keys
//! ```
//!
//! # On-disk layouts (big-endian)
//!
//! Data record — the value fields are absent on tombstones:
//!
//! ```text
//! | Tombstone 1B | KeySize 4B | Key | ValueSize 4B | Value |
//! ```
//!
//! Index entry, one per `index_stride` records:
//!
//! ```text
//! | KeyLen 4B | Key | DataOffset 4B |
//! ```
//!
//! Summary entry, one per `summary_stride` index entries:
//!
//! ```text
//! | KeyLen 4B | Key | IndexOffset 4B |
//! ```
//!
//! # Lookup pyramid
//!
//! A point lookup consults Filter → Summary → Index → Data: the filter
//! rules the generation out entirely on a miss, the summary narrows to an
//! index region, the index narrows to a data offset, and the data scan
//! runs forward from there until it passes the key. Generations are
//! consulted newest-first and the first hit (tombstones included) wins.
//!
//! # Invariants
//!
//! - Data records are strictly ascending by key.
//! - Every Index offset lands on a Data record boundary; every Summary
//!   offset lands on an Index entry boundary.
//! - Every key present in Data answers positive in the Filter.
//! - All four files are written to temporary paths and renamed into place,
//!   Data last, so a crash can never expose a partial generation.

// ------------------------------------------------------------------------------------------------
// Unit tests
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests;

pub mod reader;
pub mod writer;

pub use reader::SstReader;
pub use writer::SstWriter;

// ------------------------------------------------------------------------------------------------
// Includes
// ------------------------------------------------------------------------------------------------

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use thiserror::Error;

use crate::filter::FilterError;
use crate::memtable::Record;

// ------------------------------------------------------------------------------------------------
// Constants
// ------------------------------------------------------------------------------------------------

const TOMBSTONE_SIZE: usize = 1;
const KEY_LEN_SIZE: usize = 4;
const VALUE_LEN_SIZE: usize = 4;
const OFFSET_SIZE: usize = 4;

const FILE_PREFIX: &str = "usertable-";
const DATA_SUFFIX: &str = "-Data.txt";
const INDEX_SUFFIX: &str = "-Index.txt";
const SUMMARY_SUFFIX: &str = "-Summary.txt";
const FILTER_SUFFIX: &str = "-Filter.txt";

// ------------------------------------------------------------------------------------------------
// Error Types
// ------------------------------------------------------------------------------------------------

/// Errors returned by SSTable operations.
#[derive(Debug, Error)]
pub enum SsTableError {
    /// Underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Bloom filter build or decode failure.
    #[error("filter error: {0}")]
    Filter(#[from] FilterError),

    /// An offset or length that does not land on a valid entry boundary.
    #[error("corrupt SSTable: {0}")]
    Corrupt(String),

    /// Internal invariant violation.
    #[error("internal error: {0}")]
    Internal(String),
}

// ------------------------------------------------------------------------------------------------
// File naming and generation discovery
// ------------------------------------------------------------------------------------------------

/// The four files of a generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TableFile {
    Data,
    Index,
    Summary,
    Filter,
}

impl TableFile {
    fn suffix(self) -> &'static str {
        match self {
            TableFile::Data => DATA_SUFFIX,
            TableFile::Index => INDEX_SUFFIX,
            TableFile::Summary => SUMMARY_SUFFIX,
            TableFile::Filter => FILTER_SUFFIX,
        }
    }
}

/// Path of one generation file, e.g. `usertable-03-Data.txt`.
pub(crate) fn table_path(dir: &Path, generation: u64, file: TableFile) -> PathBuf {
    dir.join(format!("{FILE_PREFIX}{generation:02}{}", file.suffix()))
}

/// Parses a generation number out of any of the four file names.
fn parse_generation(name: &str) -> Option<u64> {
    let rest = name.strip_prefix(FILE_PREFIX)?;
    for suffix in [DATA_SUFFIX, INDEX_SUFFIX, SUMMARY_SUFFIX, FILTER_SUFFIX] {
        if let Some(digits) = rest.strip_suffix(suffix) {
            if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
                return digits.parse().ok();
            }
            return None;
        }
    }
    None
}

/// All complete generations in `dir`, ascending.
///
/// A generation counts as present when its Data file exists — Data is
/// renamed into place last, so its presence implies the other three.
pub(crate) fn discover_generations(dir: &Path) -> Result<Vec<u64>, SsTableError> {
    let mut generations = Vec::new();

    for dir_entry in fs::read_dir(dir)? {
        let dir_entry = dir_entry?;
        if !dir_entry.file_type()?.is_file() {
            continue;
        }
        let name = dir_entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if !name.ends_with(DATA_SUFFIX) {
            continue;
        }
        if let Some(generation) = parse_generation(name) {
            generations.push(generation);
        }
    }

    generations.sort_unstable();
    Ok(generations)
}

/// The generation number a fresh flush should use: one past the highest
/// file present under any of the four suffixes.
pub(crate) fn next_generation(dir: &Path) -> Result<u64, SsTableError> {
    let mut highest = 0;

    for dir_entry in fs::read_dir(dir)? {
        let dir_entry = dir_entry?;
        let name = dir_entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if let Some(generation) = parse_generation(name) {
            highest = highest.max(generation);
        }
    }

    Ok(highest + 1)
}

// ------------------------------------------------------------------------------------------------
// Record codec
// ------------------------------------------------------------------------------------------------

/// Serializes one data record. Tombstones carry no value fields.
pub(crate) fn encode_record(record: &Record) -> Vec<u8> {
    let mut out = Vec::with_capacity(
        TOMBSTONE_SIZE + KEY_LEN_SIZE + record.key.len() + VALUE_LEN_SIZE + record.value.len(),
    );
    out.push(u8::from(record.tombstone));
    out.extend_from_slice(&(record.key.len() as u32).to_be_bytes());
    out.extend_from_slice(&record.key);
    if !record.tombstone {
        out.extend_from_slice(&(record.value.len() as u32).to_be_bytes());
        out.extend_from_slice(&record.value);
    }
    out
}

/// Decodes the record starting at `pos`, returning it and the offset of
/// the next record. Out-of-bounds lengths are corruption.
pub(crate) fn decode_record(buf: &[u8], pos: usize) -> Result<(Record, usize), SsTableError> {
    let read_u32 = |at: usize| -> Result<u32, SsTableError> {
        let end = at
            .checked_add(4)
            .filter(|&end| end <= buf.len())
            .ok_or_else(|| SsTableError::Corrupt(format!("length field at {at} out of bounds")))?;
        let bytes: [u8; 4] = buf[at..end]
            .try_into()
            .map_err(|_| SsTableError::Corrupt("length field".into()))?;
        Ok(u32::from_be_bytes(bytes))
    };

    if pos >= buf.len() {
        return Err(SsTableError::Corrupt(format!(
            "record offset {pos} past end of data"
        )));
    }
    let tombstone = match buf[pos] {
        0 => false,
        1 => true,
        other => {
            return Err(SsTableError::Corrupt(format!(
                "bad tombstone byte {other:#04x} at {pos}"
            )));
        }
    };

    let key_len = read_u32(pos + TOMBSTONE_SIZE)? as usize;
    let key_start = pos + TOMBSTONE_SIZE + KEY_LEN_SIZE;
    let key_end = key_start
        .checked_add(key_len)
        .filter(|&end| end <= buf.len())
        .ok_or_else(|| SsTableError::Corrupt(format!("key at {key_start} out of bounds")))?;
    let key = buf[key_start..key_end].to_vec();

    if tombstone {
        return Ok((Record::tombstone(key), key_end));
    }

    let value_len = read_u32(key_end)? as usize;
    let value_start = key_end + VALUE_LEN_SIZE;
    let value_end = value_start
        .checked_add(value_len)
        .filter(|&end| end <= buf.len())
        .ok_or_else(|| SsTableError::Corrupt(format!("value at {value_start} out of bounds")))?;
    let value = buf[value_start..value_end].to_vec();

    Ok((Record::put(key, value), value_end))
}

// ------------------------------------------------------------------------------------------------
// Sparse entry codec (Index and Summary share the shape)
// ------------------------------------------------------------------------------------------------

/// Serializes a `| KeyLen | Key | Offset |` entry.
pub(crate) fn encode_sparse_entry(key: &[u8], offset: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity(KEY_LEN_SIZE + key.len() + OFFSET_SIZE);
    out.extend_from_slice(&(key.len() as u32).to_be_bytes());
    out.extend_from_slice(key);
    out.extend_from_slice(&offset.to_be_bytes());
    out
}

/// Decodes the sparse entry starting at `pos`.
///
/// Returns `Ok(None)` at the exact end of the buffer; a partial entry is
/// corruption.
pub(crate) fn decode_sparse_entry(
    buf: &[u8],
    pos: usize,
) -> Result<Option<(Vec<u8>, u32, usize)>, SsTableError> {
    if pos == buf.len() {
        return Ok(None);
    }
    if pos > buf.len() {
        return Err(SsTableError::Corrupt(format!(
            "entry offset {pos} past end of file"
        )));
    }

    let key_len_end = pos + KEY_LEN_SIZE;
    if key_len_end > buf.len() {
        return Err(SsTableError::Corrupt("truncated key length".into()));
    }
    let key_len = u32::from_be_bytes(
        buf[pos..key_len_end]
            .try_into()
            .map_err(|_| SsTableError::Corrupt("key length".into()))?,
    ) as usize;

    let key_end = key_len_end
        .checked_add(key_len)
        .filter(|&end| end <= buf.len())
        .ok_or_else(|| SsTableError::Corrupt("truncated key".into()))?;
    let key = buf[key_len_end..key_end].to_vec();

    let offset_end = key_end + OFFSET_SIZE;
    if offset_end > buf.len() {
        return Err(SsTableError::Corrupt("truncated offset".into()));
    }
    let offset = u32::from_be_bytes(
        buf[key_end..offset_end]
            .try_into()
            .map_err(|_| SsTableError::Corrupt("offset".into()))?,
    );

    Ok(Some((key, offset, offset_end)))
}
