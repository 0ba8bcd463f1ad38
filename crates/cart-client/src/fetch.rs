//! The fetch pipeline.
//!
//! Manifest read, cache probe, batched multi-account chunk reads under
//! bounded concurrency, reassembly by index, SHA-256 verification, and a
//! background cache write-back. The cache is only ever a hint; the
//! ledger-declared hash is the source of truth.

use std::time::Duration;

use cart_core::{sha256, ContentId};
use cart_proto::seeds::chunk_address;
use cart_proto::{CartridgeChunk, CartridgeManifest};
use futures::future::join_all;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::client::CartridgeClient;
use crate::progress::{report, FetchProgress, ProgressFn};
use crate::ClientError;

/// Maximum addresses per multi-account read.
const MAX_BATCH: usize = 100;

/// Batches submitted in parallel per wave.
const CONCURRENT_BATCHES: usize = 3;

/// Pause between waves.
const WAVE_PAUSE: Duration = Duration::from_millis(100);

/// Options for a fetch call.
#[derive(Clone)]
pub struct FetchOptions {
    /// Skip the final hash verification when false
    pub verify: bool,
    /// Progress callback
    pub progress: Option<ProgressFn<FetchProgress>>,
    /// Cancellation token
    pub cancel: CancelToken,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            verify: true,
            progress: None,
            cancel: CancelToken::new(),
        }
    }
}

/// A fetched and reassembled cartridge.
#[derive(Debug, Clone)]
pub struct FetchedCartridge {
    /// The content id
    pub content_id: ContentId,
    /// The decoded manifest
    pub manifest: CartridgeManifest,
    /// The reconstructed blob
    pub bytes: Vec<u8>,
}

impl CartridgeClient {
    /// Fetches a cartridge by content id; `None` when no manifest exists.
    pub async fn fetch(
        &self,
        content_id: &ContentId,
        options: FetchOptions,
    ) -> Result<Option<FetchedCartridge>, ClientError> {
        let Some((_, manifest)) = self.manifest(content_id).await? else {
            return Ok(None);
        };
        report(&options.progress, FetchProgress::Manifest);

        // A cached full blob short-circuits everything.
        if let Some(bytes) = self.cached_file(content_id, &manifest, &options) {
            report(&options.progress, FetchProgress::Complete);
            return Ok(Some(FetchedCartridge {
                content_id: *content_id,
                manifest,
                bytes,
            }));
        }

        let total = manifest.chunk_count;
        let total_bytes = manifest.blob_size;
        let mut slots: Vec<Option<Vec<u8>>> = vec![None; total as usize];

        // Cache probe; errors degrade to misses.
        if let Some(cache) = &self.cache {
            for index in 0..total {
                match cache.get_chunk(content_id, index) {
                    Ok(Some(bytes)) => slots[index as usize] = Some(bytes),
                    Ok(None) => {}
                    Err(err) => warn!(%err, index, "Cache read failed; treating as miss"),
                }
            }
        }

        let mut loaded = slots.iter().filter(|slot| slot.is_some()).count() as u32;
        let mut bytes_loaded: u64 = slots
            .iter()
            .flatten()
            .map(|bytes| bytes.len() as u64)
            .sum();
        report(
            &options.progress,
            FetchProgress::Chunks {
                loaded,
                total,
                bytes: bytes_loaded,
                total_bytes,
            },
        );

        // Batched ledger reads for the misses.
        let missing: Vec<u32> = (0..total)
            .filter(|index| slots[*index as usize].is_none())
            .collect();
        let mut fetched: Vec<(u32, Vec<u8>)> = Vec::new();

        let batches: Vec<&[u32]> = missing.chunks(MAX_BATCH).collect();
        let mut waves = batches.chunks(CONCURRENT_BATCHES).peekable();
        while let Some(wave) = waves.next() {
            if options.cancel.is_cancelled() {
                return Err(ClientError::Cancelled);
            }

            let reads = wave
                .iter()
                .map(|batch| self.read_chunk_batch(content_id, batch));
            for result in join_all(reads).await {
                for (index, payload) in result? {
                    loaded += 1;
                    bytes_loaded += payload.len() as u64;
                    slots[index as usize] = Some(payload.clone());
                    fetched.push((index, payload));
                }
            }
            report(
                &options.progress,
                FetchProgress::Chunks {
                    loaded,
                    total,
                    bytes: bytes_loaded,
                    total_bytes,
                },
            );

            if waves.peek().is_some() {
                sleep(WAVE_PAUSE).await;
            }
        }

        let absent: Vec<u32> = (0..total)
            .filter(|index| slots[*index as usize].is_none())
            .collect();
        if !absent.is_empty() {
            return Err(ClientError::Missing {
                content_id: *content_id,
                indices: absent,
            });
        }

        let mut bytes = Vec::with_capacity(total_bytes as usize);
        for slot in slots.into_iter().flatten() {
            bytes.extend_from_slice(&slot);
        }

        if options.verify {
            report(&options.progress, FetchProgress::Verifying);
            if sha256(&bytes) != manifest.sha256 {
                self.invalidate_cache(content_id, &manifest);
                return Err(ClientError::Integrity {
                    content_id: *content_id,
                });
            }
        }

        self.persist_in_background(content_id, &manifest, fetched, &bytes);

        info!(content_id = %content_id, bytes = bytes.len(), "Fetched cartridge");
        report(&options.progress, FetchProgress::Complete);
        Ok(Some(FetchedCartridge {
            content_id: *content_id,
            manifest,
            bytes,
        }))
    }

    fn cached_file(
        &self,
        content_id: &ContentId,
        manifest: &CartridgeManifest,
        options: &FetchOptions,
    ) -> Option<Vec<u8>> {
        let cache = self.cache.as_ref()?;
        let bytes = match cache.get_file(content_id, &manifest.sha256) {
            Ok(hit) => hit?,
            Err(err) => {
                warn!(%err, "File cache read failed; falling back to chunks");
                return None;
            }
        };
        if options.verify && sha256(&bytes) != manifest.sha256 {
            warn!(content_id = %content_id, "Cached file failed verification; discarding");
            if let Err(err) = cache.clear_file(content_id, &manifest.sha256) {
                warn!(%err, "Failed to drop corrupt cached file");
            }
            return None;
        }
        debug!(content_id = %content_id, "Serving cartridge from file cache");
        Some(bytes)
    }

    async fn read_chunk_batch(
        &self,
        content_id: &ContentId,
        indices: &[u32],
    ) -> Result<Vec<(u32, Vec<u8>)>, ClientError> {
        let mut addresses = Vec::with_capacity(indices.len());
        for &index in indices {
            let (address, _) = chunk_address(&self.program_id, content_id, index)
                .map_err(|e| ClientError::Input(e.to_string()))?;
            addresses.push(address);
        }

        let accounts = self.ledger.get_accounts(&addresses).await?;
        let mut out = Vec::with_capacity(indices.len());
        for (offset, account) in accounts.into_iter().enumerate() {
            let Some(data) = account else { continue };
            let address = addresses[offset];
            let chunk =
                CartridgeChunk::decode(&data).map_err(|e| ClientError::layout(address, e))?;
            if chunk.written {
                out.push((indices[offset], chunk.payload().to_vec()));
            }
        }
        Ok(out)
    }

    fn invalidate_cache(&self, content_id: &ContentId, manifest: &CartridgeManifest) {
        let Some(cache) = &self.cache else { return };
        if let Err(err) = cache.clear_chunks(content_id) {
            warn!(%err, "Failed to invalidate cached chunks");
        }
        if let Err(err) = cache.clear_file(content_id, &manifest.sha256) {
            warn!(%err, "Failed to invalidate cached file");
        }
    }

    /// Persists newly fetched chunks and the verified blob off the hot path.
    fn persist_in_background(
        &self,
        content_id: &ContentId,
        manifest: &CartridgeManifest,
        fetched: Vec<(u32, Vec<u8>)>,
        bytes: &[u8],
    ) {
        let Some(cache) = self.cache.clone() else {
            return;
        };
        let content_id = *content_id;
        let sha256 = manifest.sha256;
        let bytes = bytes.to_vec();
        tokio::spawn(async move {
            if !fetched.is_empty() {
                if let Err(err) = cache.put_chunks(&content_id, &fetched) {
                    warn!(%err, "Background chunk cache write failed");
                }
            }
            if let Err(err) = cache.put_file(&content_id, &sha256, &bytes) {
                warn!(%err, "Background file cache write failed");
            }
        });
    }
}
