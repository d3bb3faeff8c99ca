//! # CoralKV
//!
//! An embeddable, persistent key-value storage engine built on a
//! **Log-Structured Merge Tree (LSM-tree)** architecture. Designed for
//! fast writes and crash-safe operation.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                        Engine                            │
//! │                                                          │
//! │  put/delete ─► TokenBucket ─► WAL ─► Mempool             │
//! │                                        │ ring full       │
//! │                                        ▼                 │
//! │                                  SSTable writer          │
//! │                                        │                 │
//! │  get ─► TokenBucket ─► Mempool ─► BlockCache ─► SSTables │
//! │         (newest memtable first)   (newest generation     │
//! │                                    first: Filter→Summary │
//! │                                    →Index→Data)          │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`engine`] | Core storage engine — open, put, get, delete, restore |
//! | [`mempool`] | Ring of in-memory write buffers with rotation and flush |
//! | [`memtable`] | Ordered in-memory tables (map, skip list, B-tree) |
//! | [`wal`] | Segmented, CRC-protected write-ahead log for crash recovery |
//! | [`sstable`] | Immutable, sorted, on-disk tables with sparse indices |
//! | [`filter`] | Per-SSTable bloom filters for fast negative lookups |
//! | [`cache`] | LRU cache of recently read records |
//! | [`tokenbucket`] | Admission control for all external operations |
//! | [`config`] | Engine tunables and defaults |
//!
//! ## Key Features
//!
//! - **Write-ahead logging** — every mutation is persisted to a segmented
//!   WAL before being applied in memory, guaranteeing crash recovery.
//! - **Pluggable memtables** — the in-memory table is an ordered map, a
//!   skip list, or a B-tree, selected at configuration time.
//! - **Sparse lookup pyramid** — each SSTable carries a summary pointing
//!   into a sparse index pointing into sorted data, gated by a bloom
//!   filter for fast negative answers.
//! - **Tombstone shadowing** — deletes are logical; a tombstone in any
//!   newer layer shadows older values until compaction reclaims them.
//! - **Admission control** — a token bucket rate-limits the external
//!   surface without blocking.
//! - **Segment reclamation** — WAL segments are deleted as soon as every
//!   memtable they cover has been flushed to a durable SSTable.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use coralkv::config::Config;
//! use coralkv::engine::Engine;
//!
//! let mut config = Config::default();
//! config.wal_folder = "/tmp/coralkv/wal".into();
//! config.output_dir = "/tmp/coralkv/sstable".into();
//!
//! let mut engine = Engine::open(config).unwrap();
//!
//! // Replay the WAL from a previous run before accepting traffic.
//! engine.restore().unwrap();
//!
//! // Write
//! engine.put(b"hello", b"world").unwrap();
//!
//! // Read
//! assert_eq!(engine.get(b"hello").unwrap(), Some(b"world".to_vec()));
//!
//! // Delete
//! engine.delete(b"hello").unwrap();
//! assert_eq!(engine.get(b"hello").unwrap(), None);
//!
//! // Force pending WAL bytes to disk before shutdown.
//! engine.sync().unwrap();
//! ```

pub mod cache;
pub mod config;
pub mod engine;
pub mod filter;
pub mod memtable;
pub mod mempool;
pub mod sstable;
pub mod tokenbucket;
pub mod wal;
