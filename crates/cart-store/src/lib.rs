//! Cart Store - Local persistent cache for cartridge downloads.
//!
//! Two logical spaces back the fetch pipeline:
//! - `files`: full reconstructed blobs keyed by `(content_id, sha256)`
//! - `chunks`: per-chunk bytes keyed by `(content_id, chunk_index)`
//!
//! The cache is opportunistic: every fetch verifies the reconstruction
//! against the ledger-declared hash, so corruption or loss here never
//! breaks correctness.

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod cache;

pub use cache::{CacheStats, ChunkCache};

use thiserror::Error;

/// Errors from cache operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// RocksDB error
    #[error("Database error: {0}")]
    Database(String),

    /// Stored bytes are malformed
    #[error("Invalid data: {0}")]
    InvalidData(String),
}
