//! Segmented write-ahead log.
//!
//! Every mutation is recorded here before it touches a memtable, so a
//! crash can always be replayed back to the last bytes that reached disk.
//! The log is a sequence of fixed-capacity segment files; logical entries
//! are a plain byte stream across them and may straddle any number of
//! segment boundaries — there is no per-segment framing.
//!
//! # On-disk entry layout (big-endian)
//!
//! ```text
//! +-----------+----------------+---------------+--------------+----------------+-...-+--...--+
//! | CRC32 (4B)| Timestamp (8B) | Tombstone (1B)| Key Size (8B)| Value Size (8B)| Key | Value |
//! +-----------+----------------+---------------+--------------+----------------+-...-+--...--+
//! ```
//!
//! - **CRC32** — computed over everything after the CRC field.
//! - **Timestamp** — seconds since the Unix epoch.
//! - **Tombstone** — 1 for a delete; deletes carry `Value Size = 0` and no
//!   value bytes.
//!
//! The header is exactly [`HEADER_SIZE`] bytes; it is the only framing a
//! reader needs to know how far the entry extends.
//!
//! # Segments
//!
//! Segment files are named `wal_NNNNN.log` (5-digit, zero-padded) and form
//! a contiguous index range `[first..=index]`; `index` is the current
//! append target, everything before it is full. Appends are buffered in
//! memory and spill to disk when at least one segment's worth is pending;
//! [`WalWriter::sync`] drains the buffer early for callers that want
//! per-operation durability.
//!
//! # Recovery
//!
//! [`WalReader`] walks the segments from `first`, reassembling headers,
//! keys, and values across boundaries, re-checking each CRC, and yielding
//! entries together with the segment they started in (the segment manager
//! needs that origin for reclamation accounting). Replay stops cleanly at
//! the end of the last segment; a truncated or corrupt tail surfaces as an
//! error after all preceding entries were yielded.

// ------------------------------------------------------------------------------------------------
// Unit tests
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests;

pub mod segments;

// ------------------------------------------------------------------------------------------------
// Includes
// ------------------------------------------------------------------------------------------------

use std::{
    fs::{self, File, OpenOptions},
    io::{self, Read, Write},
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use crc32fast::Hasher as Crc32;
use thiserror::Error;
use tracing::{debug, info, trace, warn};

// ------------------------------------------------------------------------------------------------
// Constants
// ------------------------------------------------------------------------------------------------

const CRC_SIZE: usize = 4;
const TIMESTAMP_SIZE: usize = 8;
const TOMBSTONE_SIZE: usize = 1;
const KEY_SIZE_SIZE: usize = 8;
const VALUE_SIZE_SIZE: usize = 8;

/// Fixed entry header length: CRC + timestamp + tombstone + key size +
/// value size.
pub const HEADER_SIZE: usize =
    CRC_SIZE + TIMESTAMP_SIZE + TOMBSTONE_SIZE + KEY_SIZE_SIZE + VALUE_SIZE_SIZE;

/// Upper bound on a single key or value read back during replay. A size
/// field beyond this is treated as corruption rather than attempted as an
/// allocation.
pub const MAX_FIELD_LEN: u64 = 256 * 1024 * 1024;

const SEGMENT_PREFIX: &str = "wal_";
const SEGMENT_SUFFIX: &str = ".log";
const SEGMENT_DIGITS: usize = 5;

// ------------------------------------------------------------------------------------------------
// Error Types
// ------------------------------------------------------------------------------------------------

/// Errors returned by WAL operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WalError {
    /// Underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Rejected before any I/O: empty key, PUT without a value, etc.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Data integrity failure during replay.
    #[error("checksum mismatch in segment {segment}")]
    ChecksumMismatch {
        /// Segment the corrupt entry started in.
        segment: u64,
    },

    /// The log ended mid-entry.
    #[error("unexpected end of log in segment {segment}")]
    UnexpectedEof {
        /// Segment the truncated entry started in.
        segment: u64,
    },

    /// A replayed size field exceeds [`MAX_FIELD_LEN`].
    #[error("entry field of {0} bytes exceeds limit")]
    EntryTooLarge(u64),

    /// Internal consistency error.
    #[error("internal error: {0}")]
    Internal(String),
}

// ------------------------------------------------------------------------------------------------
// Entry
// ------------------------------------------------------------------------------------------------

/// The two mutations the log records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalOp {
    /// Insert or update a key.
    Put,
    /// Logically delete a key.
    Delete,
}

/// One logical log entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalEntry {
    /// The key, non-empty.
    pub key: Vec<u8>,

    /// The value; empty for deletes.
    pub value: Vec<u8>,

    /// Seconds since the Unix epoch at entry creation.
    pub timestamp: u64,

    /// Whether this entry is a delete.
    pub tombstone: bool,
}

impl WalEntry {
    /// Builds and validates an entry for `op`.
    ///
    /// Fails fast — before any I/O — on an empty key or a PUT without a
    /// value.
    pub fn new(key: &[u8], value: Option<&[u8]>, op: WalOp) -> Result<Self, WalError> {
        if key.is_empty() {
            return Err(WalError::InvalidArgument("key is empty".into()));
        }
        let value = value.unwrap_or_default();
        match op {
            WalOp::Put if value.is_empty() => {
                return Err(WalError::InvalidArgument(
                    "put requires a non-empty value".into(),
                ));
            }
            WalOp::Delete if !value.is_empty() => {
                return Err(WalError::InvalidArgument(
                    "delete carries no value".into(),
                ));
            }
            _ => {}
        }

        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|_| WalError::Internal("system clock before UNIX epoch".into()))?
            .as_secs();

        Ok(Self {
            key: key.to_vec(),
            value: value.to_vec(),
            timestamp,
            tombstone: op == WalOp::Delete,
        })
    }

    /// Total serialized length, header included.
    pub fn encoded_len(&self) -> usize {
        HEADER_SIZE + self.key.len() + self.value.len()
    }

    /// Serializes to the on-disk layout documented at the
    /// [module level](self).
    pub fn serialize(&self) -> Vec<u8> {
        let mut body =
            Vec::with_capacity(self.encoded_len() - CRC_SIZE);
        body.extend_from_slice(&self.timestamp.to_be_bytes());
        body.push(u8::from(self.tombstone));
        body.extend_from_slice(&(self.key.len() as u64).to_be_bytes());
        body.extend_from_slice(&(self.value.len() as u64).to_be_bytes());
        body.extend_from_slice(&self.key);
        body.extend_from_slice(&self.value);

        let mut hasher = Crc32::new();
        hasher.update(&body);
        let crc = hasher.finalize();

        let mut out = Vec::with_capacity(self.encoded_len());
        out.extend_from_slice(&crc.to_be_bytes());
        out.extend_from_slice(&body);
        out
    }
}

// ------------------------------------------------------------------------------------------------
// Directory helpers
// ------------------------------------------------------------------------------------------------

/// File name of segment `index`: `wal_00042.log`.
fn segment_file_name(index: u64) -> String {
    format!("wal_{index:05}.log")
}

fn segment_path(dir: &Path, index: u64) -> PathBuf {
    dir.join(segment_file_name(index))
}

/// Parses a segment index out of a `wal_NNNNN.log` file name.
fn parse_segment_index(name: &str) -> Option<u64> {
    let digits = name
        .strip_prefix(SEGMENT_PREFIX)?
        .strip_suffix(SEGMENT_SUFFIX)?;
    if digits.len() != SEGMENT_DIGITS || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Scans `dir` for segment files; returns `(first, last)` indexes, or
/// `(0, 0)` for an empty directory.
fn scan_wal_dir(dir: &Path) -> Result<(u64, u64), WalError> {
    let mut first: Option<u64> = None;
    let mut last: Option<u64> = None;

    for dir_entry in fs::read_dir(dir)? {
        let dir_entry = dir_entry?;
        if !dir_entry.file_type()?.is_file() {
            continue;
        }
        let name = dir_entry.file_name();
        let Some(name) = name.to_str() else { continue };
        let Some(index) = parse_segment_index(name) else {
            continue;
        };
        first = Some(first.map_or(index, |f| f.min(index)));
        last = Some(last.map_or(index, |l| l.max(index)));
    }

    Ok((first.unwrap_or(0), last.unwrap_or(0)))
}

// ------------------------------------------------------------------------------------------------
// Writer
// ------------------------------------------------------------------------------------------------

/// Appender over a directory of WAL segments.
///
/// Serialized entries accumulate in an in-memory pending buffer; whenever
/// the buffer holds at least one full segment's worth, complete segments
/// are written out, fsynced, and closed, and a fresh segment becomes the
/// append target. Trailing partial bytes stay pending until the next
/// crossing or an explicit [`sync`](Self::sync).
pub struct WalWriter {
    dir: PathBuf,

    /// Capacity of one segment file in bytes.
    segment_size: usize,

    /// Index of the current append target; `[first..=index]` exist.
    index: u64,

    /// Oldest surviving segment index.
    first: u64,

    /// Open handle on segment `index`.
    current: File,

    /// Unwritten capacity of segment `index`.
    bytes_remaining: usize,

    /// Serialized entries not yet written to any file.
    pending: Vec<u8>,
}

impl WalWriter {
    /// Opens (or creates) the log in `dir`.
    ///
    /// Discovers the existing segment range, reopens a not-yet-full last
    /// segment for append, and rolls to a fresh segment when the last one
    /// is already at capacity.
    pub fn open(dir: impl AsRef<Path>, segment_size: usize) -> Result<Self, WalError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let (first, mut index) = scan_wal_dir(&dir)?;

        let path = segment_path(&dir, index);
        let (current, bytes_remaining) = match fs::metadata(&path) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                (File::create(&path)?, segment_size)
            }
            Err(e) => return Err(WalError::Io(e)),
            Ok(meta) if (meta.len() as usize) < segment_size => {
                let file = OpenOptions::new().append(true).open(&path)?;
                (file, segment_size - meta.len() as usize)
            }
            Ok(_) => {
                // Last segment already full; start the next one.
                index += 1;
                (File::create(segment_path(&dir, index))?, segment_size)
            }
        };

        info!(
            dir = %dir.display(),
            first,
            index,
            segment_size,
            "WAL opened"
        );

        Ok(Self {
            dir,
            segment_size,
            index,
            first,
            current,
            bytes_remaining,
            pending: Vec::new(),
        })
    }

    /// Appends one mutation; returns the segment index the entry starts in.
    ///
    /// Validation happens before anything is buffered. The entry may end
    /// up spanning several segments; the returned index identifies where
    /// its first byte lands, which is what segment reclamation accounts
    /// against.
    pub fn log(&mut self, key: &[u8], value: Option<&[u8]>, op: WalOp) -> Result<u64, WalError> {
        let entry = WalEntry::new(key, value, op)?;

        let written_in_current = self.segment_size - self.bytes_remaining;
        let offset = written_in_current + self.pending.len();
        let start_segment = self.index + (offset / self.segment_size) as u64;

        self.pending.extend_from_slice(&entry.serialize());

        trace!(
            segment = start_segment,
            len = entry.encoded_len(),
            tombstone = entry.tombstone,
            "WAL entry buffered"
        );

        if self.pending.len() >= self.segment_size {
            self.drain_full_segments()?;
        }

        Ok(start_segment)
    }

    /// Flushes every pending byte to disk and fsyncs the current segment.
    ///
    /// After a successful `sync`, a crash loses nothing that was logged.
    pub fn sync(&mut self) -> Result<(), WalError> {
        self.drain_full_segments()?;

        if !self.pending.is_empty() {
            let tail: Vec<u8> = self.pending.drain(..).collect();
            self.current.write_all(&tail)?;
            self.bytes_remaining -= tail.len();
        }
        self.current.sync_all()?;

        debug!(index = self.index, "WAL synced");
        Ok(())
    }

    /// Writes out complete segments while the pending buffer can fill the
    /// current one, rolling the append target forward each time.
    fn drain_full_segments(&mut self) -> Result<(), WalError> {
        while self.pending.len() >= self.bytes_remaining {
            let take = self.bytes_remaining;
            let chunk: Vec<u8> = self.pending.drain(..take).collect();
            self.current.write_all(&chunk)?;
            self.current.sync_all()?;

            self.index += 1;
            self.current = File::create(segment_path(&self.dir, self.index))?;
            self.bytes_remaining = self.segment_size;

            debug!(index = self.index, "WAL segment rolled");
        }
        Ok(())
    }

    /// Index of the current append target segment.
    pub fn current_segment(&self) -> u64 {
        self.index
    }

    /// Index of the oldest segment present at open time.
    pub fn first_segment(&self) -> u64 {
        self.first
    }

    /// Bytes buffered but not yet on disk.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// A reader positioned over everything this writer has persisted.
    pub fn reader(&self) -> Result<WalReader, WalError> {
        WalReader::open(&self.dir, self.first, self.index)
    }
}

impl Drop for WalWriter {
    fn drop(&mut self) {
        if let Err(e) = self.sync() {
            warn!(dir = %self.dir.display(), error = %e, "WAL sync failed on drop");
        }
    }
}

// ------------------------------------------------------------------------------------------------
// Reader
// ------------------------------------------------------------------------------------------------

/// A replayed entry together with the segment its first byte occupies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveredEntry {
    /// The decoded entry.
    pub entry: WalEntry,

    /// Segment index the entry started in.
    pub segment: u64,
}

/// Sequential reader over segments `[first..=last]`.
///
/// Implements `Iterator`, yielding entries in append order. Reads
/// reassemble every field across segment boundaries; a field larger than a
/// whole segment consumes intermediate segments in full. Segments that
/// have already been reclaimed are skipped.
pub struct WalReader {
    dir: PathBuf,
    cursor: u64,
    last: u64,
    current: Option<File>,
    bytes_remaining: usize,
    failed: bool,
}

impl WalReader {
    /// Opens a reader over `[first..=last]` under `dir`.
    pub fn open(dir: impl AsRef<Path>, first: u64, last: u64) -> Result<Self, WalError> {
        let dir = dir.as_ref().to_path_buf();
        let mut reader = Self {
            dir,
            cursor: first,
            last,
            current: None,
            bytes_remaining: 0,
            failed: false,
        };
        reader.open_segment(first)?;
        Ok(reader)
    }

    fn open_segment(&mut self, index: u64) -> Result<(), WalError> {
        let path = segment_path(&self.dir, index);
        match File::open(&path) {
            Ok(file) => {
                self.bytes_remaining = file.metadata()?.len() as usize;
                self.current = Some(file);
                self.cursor = index;
                trace!(segment = index, size = self.bytes_remaining, "WAL segment opened");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                // Reclaimed segment; treat as empty.
                self.bytes_remaining = 0;
                self.current = None;
                self.cursor = index;
                Ok(())
            }
            Err(e) => Err(WalError::Io(e)),
        }
    }

    /// Moves the cursor to the next segment; `Err` when past `last`.
    fn advance_segment(&mut self, origin: u64) -> Result<(), WalError> {
        if self.cursor >= self.last {
            return Err(WalError::UnexpectedEof { segment: origin });
        }
        let next = self.cursor + 1;
        self.open_segment(next)
    }

    /// Reads exactly `size` bytes, spanning segments as needed.
    fn fill(&mut self, size: usize, origin: u64) -> Result<Vec<u8>, WalError> {
        let mut out = Vec::with_capacity(size);
        let mut needed = size;

        while needed > 0 {
            if self.bytes_remaining == 0 {
                self.advance_segment(origin)?;
                continue;
            }
            let take = needed.min(self.bytes_remaining);
            let mut buf = vec![0u8; take];
            let file = self
                .current
                .as_mut()
                .ok_or_else(|| WalError::Internal("no open segment".into()))?;
            file.read_exact(&mut buf)?;
            self.bytes_remaining -= take;
            needed -= take;
            out.extend_from_slice(&buf);
        }

        Ok(out)
    }

    /// True once the cursor sits at the very end of the last segment.
    fn at_clean_end(&mut self) -> Result<bool, WalError> {
        while self.bytes_remaining == 0 {
            if self.cursor >= self.last {
                return Ok(true);
            }
            self.advance_segment(self.cursor)?;
        }
        Ok(false)
    }

    fn read_entry(&mut self) -> Result<Option<RecoveredEntry>, WalError> {
        if self.at_clean_end()? {
            return Ok(None);
        }
        let origin = self.cursor;

        let header = self.fill(HEADER_SIZE, origin)?;

        let stored_crc = u32::from_be_bytes([header[0], header[1], header[2], header[3]]);
        let timestamp = u64::from_be_bytes(
            header[CRC_SIZE..CRC_SIZE + TIMESTAMP_SIZE]
                .try_into()
                .map_err(|_| WalError::Internal("header slice".into()))?,
        );
        let tombstone_byte = header[CRC_SIZE + TIMESTAMP_SIZE];
        let key_size = u64::from_be_bytes(
            header[CRC_SIZE + TIMESTAMP_SIZE + TOMBSTONE_SIZE
                ..CRC_SIZE + TIMESTAMP_SIZE + TOMBSTONE_SIZE + KEY_SIZE_SIZE]
                .try_into()
                .map_err(|_| WalError::Internal("header slice".into()))?,
        );
        let value_size = u64::from_be_bytes(
            header[HEADER_SIZE - VALUE_SIZE_SIZE..HEADER_SIZE]
                .try_into()
                .map_err(|_| WalError::Internal("header slice".into()))?,
        );

        if tombstone_byte > 1 || key_size == 0 {
            warn!(segment = origin, "WAL header failed sanity checks");
            return Err(WalError::ChecksumMismatch { segment: origin });
        }
        if key_size > MAX_FIELD_LEN {
            return Err(WalError::EntryTooLarge(key_size));
        }
        if value_size > MAX_FIELD_LEN {
            return Err(WalError::EntryTooLarge(value_size));
        }

        let key = self.fill(key_size as usize, origin)?;
        let value = self.fill(value_size as usize, origin)?;

        let mut hasher = Crc32::new();
        hasher.update(&header[CRC_SIZE..]);
        hasher.update(&key);
        hasher.update(&value);
        if hasher.finalize() != stored_crc {
            warn!(segment = origin, key_size, value_size, "WAL checksum mismatch");
            return Err(WalError::ChecksumMismatch { segment: origin });
        }

        Ok(Some(RecoveredEntry {
            entry: WalEntry {
                key,
                value,
                timestamp,
                tombstone: tombstone_byte == 1,
            },
            segment: origin,
        }))
    }

    /// Collects every entry up to the first failure.
    ///
    /// On a clean log this is the complete history `[first..=last]`; on a
    /// corrupt or truncated log the error carries the position and the
    /// prefix read so far is discarded by the caller or not, as it sees
    /// fit.
    pub fn recover(self) -> Result<Vec<RecoveredEntry>, WalError> {
        let mut entries = Vec::new();
        for item in self {
            entries.push(item?);
        }
        Ok(entries)
    }
}

impl Iterator for WalReader {
    type Item = Result<RecoveredEntry, WalError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.read_entry() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => None,
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}
