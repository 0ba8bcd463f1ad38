//! Chunk cache implementation.
//!
//! Keys are raw byte concatenations: `content_id ‖ chunk_index LE` in the
//! chunks column family, `content_id ‖ sha256` in the files column family.
//! There is no eviction; external tools may purge the directory.

use std::path::Path;
use std::sync::Arc;

use cart_core::ContentId;
use parking_lot::RwLock;
use rocksdb::{IteratorMode, Options, WriteBatch, DB};
use tracing::{debug, warn};

use crate::StoreError;

/// Column family for full reconstructed blobs.
const FILES_CF: &str = "files";
/// Column family for per-chunk bytes.
const CHUNKS_CF: &str = "chunks";
/// Column family for cache bookkeeping.
const META_CF: &str = "meta";

/// Meta key holding the on-disk schema version.
const SCHEMA_VERSION_KEY: &[u8] = b"schema_version";

/// Bumped on any key or value layout change; older data is invalidated.
const SCHEMA_VERSION: u32 = 1;

/// Cache statistics.
#[derive(Debug, Default, Clone)]
pub struct CacheStats {
    /// Chunk lookups that hit
    pub hits: u64,
    /// Chunk lookups that missed
    pub misses: u64,
    /// Chunks written
    pub chunks_stored: u64,
}

/// Persistent chunk/file cache backed by RocksDB.
pub struct ChunkCache {
    db: Arc<DB>,
    stats: RwLock<CacheStats>,
}

impl ChunkCache {
    /// Opens or creates a cache at the given path.
    ///
    /// A schema version mismatch drops and recreates the data column
    /// families; the cache is a hint, never a source of truth.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let mut db = DB::open_cf(&opts, path, [FILES_CF, CHUNKS_CF, META_CF])
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let stored_version = {
            let meta = db
                .cf_handle(META_CF)
                .ok_or_else(|| StoreError::Database("Missing meta column family".to_string()))?;
            db.get_cf(&meta, SCHEMA_VERSION_KEY)
                .map_err(|e| StoreError::Database(e.to_string()))?
                .and_then(|bytes| bytes.try_into().ok().map(u32::from_le_bytes))
        };

        if stored_version != Some(SCHEMA_VERSION) {
            if let Some(old) = stored_version {
                warn!(old, new = SCHEMA_VERSION, "Cache schema changed, invalidating");
                for cf in [FILES_CF, CHUNKS_CF] {
                    db.drop_cf(cf)
                        .map_err(|e| StoreError::Database(e.to_string()))?;
                    db.create_cf(cf, &Options::default())
                        .map_err(|e| StoreError::Database(e.to_string()))?;
                }
            }
            let meta = db
                .cf_handle(META_CF)
                .ok_or_else(|| StoreError::Database("Missing meta column family".to_string()))?;
            db.put_cf(&meta, SCHEMA_VERSION_KEY, SCHEMA_VERSION.to_le_bytes())
                .map_err(|e| StoreError::Database(e.to_string()))?;
        }

        Ok(Self {
            db: Arc::new(db),
            stats: RwLock::new(CacheStats::default()),
        })
    }

    fn chunk_key(content_id: &ContentId, chunk_index: u32) -> [u8; 36] {
        let mut key = [0u8; 36];
        key[..32].copy_from_slice(content_id.as_bytes());
        key[32..].copy_from_slice(&chunk_index.to_le_bytes());
        key
    }

    fn file_key(content_id: &ContentId, sha256: &[u8; 32]) -> [u8; 64] {
        let mut key = [0u8; 64];
        key[..32].copy_from_slice(content_id.as_bytes());
        key[32..].copy_from_slice(sha256);
        key
    }

    /// Retrieves one cached chunk.
    pub fn get_chunk(
        &self,
        content_id: &ContentId,
        chunk_index: u32,
    ) -> Result<Option<Vec<u8>>, StoreError> {
        let cf = self
            .db
            .cf_handle(CHUNKS_CF)
            .ok_or_else(|| StoreError::Database("Missing chunks column family".to_string()))?;

        let result = self
            .db
            .get_cf(&cf, Self::chunk_key(content_id, chunk_index))
            .map_err(|e| StoreError::Database(e.to_string()))?;

        match result {
            Some(bytes) => {
                self.stats.write().hits += 1;
                Ok(Some(bytes))
            }
            None => {
                self.stats.write().misses += 1;
                Ok(None)
            }
        }
    }

    /// Stores one chunk. Idempotent.
    pub fn put_chunk(
        &self,
        content_id: &ContentId,
        chunk_index: u32,
        bytes: &[u8],
    ) -> Result<(), StoreError> {
        let cf = self
            .db
            .cf_handle(CHUNKS_CF)
            .ok_or_else(|| StoreError::Database("Missing chunks column family".to_string()))?;

        self.db
            .put_cf(&cf, Self::chunk_key(content_id, chunk_index), bytes)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        self.stats.write().chunks_stored += 1;
        debug!(content_id = %content_id, chunk_index, len = bytes.len(), "Cached chunk");
        Ok(())
    }

    /// Stores a batch of chunks atomically.
    pub fn put_chunks(
        &self,
        content_id: &ContentId,
        chunks: &[(u32, Vec<u8>)],
    ) -> Result<(), StoreError> {
        let cf = self
            .db
            .cf_handle(CHUNKS_CF)
            .ok_or_else(|| StoreError::Database("Missing chunks column family".to_string()))?;

        let mut batch = WriteBatch::default();
        for (chunk_index, bytes) in chunks {
            batch.put_cf(&cf, Self::chunk_key(content_id, *chunk_index), bytes);
        }
        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        self.stats.write().chunks_stored += chunks.len() as u64;
        debug!(content_id = %content_id, count = chunks.len(), "Cached chunk batch");
        Ok(())
    }

    /// Returns every cached chunk for a content id as `(index, bytes)`.
    pub fn get_all_chunks(
        &self,
        content_id: &ContentId,
    ) -> Result<Vec<(u32, Vec<u8>)>, StoreError> {
        let cf = self
            .db
            .cf_handle(CHUNKS_CF)
            .ok_or_else(|| StoreError::Database("Missing chunks column family".to_string()))?;

        let prefix = content_id.as_bytes();
        let mut chunks = Vec::new();

        let iter = self.db.prefix_iterator_cf(&cf, prefix);
        for item in iter {
            let (key, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            if key.len() == 36 && key.starts_with(prefix) {
                let index_bytes: [u8; 4] = key[32..36]
                    .try_into()
                    .map_err(|_| StoreError::InvalidData("Bad chunk key".to_string()))?;
                chunks.push((u32::from_le_bytes(index_bytes), value.to_vec()));
            } else if !key.starts_with(prefix) {
                break;
            }
        }

        chunks.sort_by_key(|(index, _)| *index);
        Ok(chunks)
    }

    /// Removes every cached chunk for a content id. Best-effort.
    pub fn clear_chunks(&self, content_id: &ContentId) -> Result<(), StoreError> {
        let cf = self
            .db
            .cf_handle(CHUNKS_CF)
            .ok_or_else(|| StoreError::Database("Missing chunks column family".to_string()))?;

        let chunks = self.get_all_chunks(content_id)?;
        for (index, _) in &chunks {
            self.db
                .delete_cf(&cf, Self::chunk_key(content_id, *index))
                .map_err(|e| StoreError::Database(e.to_string()))?;
        }

        debug!(content_id = %content_id, removed = chunks.len(), "Cleared cached chunks");
        Ok(())
    }

    /// Retrieves a cached full blob.
    pub fn get_file(
        &self,
        content_id: &ContentId,
        sha256: &[u8; 32],
    ) -> Result<Option<Vec<u8>>, StoreError> {
        let cf = self
            .db
            .cf_handle(FILES_CF)
            .ok_or_else(|| StoreError::Database("Missing files column family".to_string()))?;

        self.db
            .get_cf(&cf, Self::file_key(content_id, sha256))
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    /// Stores a full blob. Idempotent.
    pub fn put_file(
        &self,
        content_id: &ContentId,
        sha256: &[u8; 32],
        bytes: &[u8],
    ) -> Result<(), StoreError> {
        let cf = self
            .db
            .cf_handle(FILES_CF)
            .ok_or_else(|| StoreError::Database("Missing files column family".to_string()))?;

        self.db
            .put_cf(&cf, Self::file_key(content_id, sha256), bytes)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        debug!(content_id = %content_id, len = bytes.len(), "Cached file");
        Ok(())
    }

    /// Removes a cached full blob. Best-effort.
    pub fn clear_file(&self, content_id: &ContentId, sha256: &[u8; 32]) -> Result<(), StoreError> {
        let cf = self
            .db
            .cf_handle(FILES_CF)
            .ok_or_else(|| StoreError::Database("Missing files column family".to_string()))?;

        self.db
            .delete_cf(&cf, Self::file_key(content_id, sha256))
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    /// Returns cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.stats.read().clone()
    }
}
