//! The publish pipeline.
//!
//! Split, reserve, upload under bounded concurrency, finalize. A publish
//! interrupted at any point resumes cleanly: the manifest probe detects the
//! open state and already-written chunks are skipped, never rewritten.

use std::time::Duration;

use cart_core::{Address, ContentId, Keypair, TxId};
use cart_proto::seeds::{chunk_address, manifest_address};
use cart_proto::{
    chunk_count, CartridgeChunk, Instruction, MAX_BLOB_SIZE, MAX_CHUNK_SIZE, MAX_METADATA_LEN,
};
use futures::future::join_all;
use tokio::time::sleep;
use tracing::{debug, info};

use crate::cancel::CancelToken;
use crate::client::CartridgeClient;
use crate::progress::{report, ProgressFn, PublishProgress};
use crate::ClientError;

/// Default chunk-write concurrency.
pub const DEFAULT_CONCURRENCY: usize = 3;

/// Pause between submission waves.
const WAVE_PAUSE: Duration = Duration::from_millis(200);

/// Reads used when probing already-written chunks.
const PROBE_BATCH: usize = 100;

/// Options for a publish call.
#[derive(Clone)]
pub struct PublishOptions {
    /// Chunk size for a fresh manifest; an open manifest's declared size
    /// wins on resume
    pub chunk_size: u32,
    /// Opaque manifest metadata, at most 256 bytes
    pub metadata: Vec<u8>,
    /// Concurrent chunk submissions per wave
    pub concurrency: usize,
    /// Treat an already-finalized cartridge as success instead of conflict
    pub skip_if_exists: bool,
    /// Progress callback
    pub progress: Option<ProgressFn<PublishProgress>>,
    /// Cancellation token
    pub cancel: CancelToken,
}

impl Default for PublishOptions {
    fn default() -> Self {
        Self {
            chunk_size: MAX_CHUNK_SIZE,
            metadata: Vec::new(),
            concurrency: DEFAULT_CONCURRENCY,
            skip_if_exists: true,
            progress: None,
            cancel: CancelToken::new(),
        }
    }
}

/// How a publish concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The cartridge was uploaded and finalized by this call
    Published,
    /// An identical cartridge was already finalized
    AlreadyExists,
}

/// Result of a successful publish.
#[derive(Debug, Clone)]
pub struct PublishReceipt {
    /// The content id
    pub content_id: ContentId,
    /// The manifest account address
    pub manifest_address: Address,
    /// Transactions submitted by this call, in order
    pub transactions: Vec<TxId>,
    /// Outcome
    pub outcome: PublishOutcome,
}

impl CartridgeClient {
    /// Publishes a blob and lists it in the catalog.
    pub async fn publish(
        &self,
        keypair: &Keypair,
        blob: &[u8],
        options: PublishOptions,
    ) -> Result<PublishReceipt, ClientError> {
        let content_id = ContentId::from_blob(blob);
        report(
            &options.progress,
            PublishProgress::Preparing { content_id },
        );

        if self.deny_list.contains(&content_id) {
            return Err(ClientError::Refused { content_id });
        }
        if blob.is_empty() {
            return Err(ClientError::Input("blob is empty".to_string()));
        }
        if blob.len() as u64 > MAX_BLOB_SIZE {
            return Err(ClientError::Input(format!(
                "blob is {} bytes, maximum is {MAX_BLOB_SIZE}",
                blob.len()
            )));
        }
        if options.chunk_size == 0 || options.chunk_size > MAX_CHUNK_SIZE {
            return Err(ClientError::Input(format!(
                "chunk size {} out of range (1..={MAX_CHUNK_SIZE})",
                options.chunk_size
            )));
        }
        if options.metadata.len() > MAX_METADATA_LEN {
            return Err(ClientError::Input(format!(
                "metadata is {} bytes, maximum is {MAX_METADATA_LEN}",
                options.metadata.len()
            )));
        }

        let (manifest_addr, _) = manifest_address(&self.program_id, &content_id)
            .map_err(|e| ClientError::Input(e.to_string()))?;

        let mut transactions = Vec::new();

        // Probe the manifest: absent, open (resume), or finalized.
        let chunk_size = match self.manifest(&content_id).await? {
            Some((_, manifest)) if manifest.finalized => {
                return if options.skip_if_exists {
                    info!(content_id = %content_id, "Cartridge already published");
                    Ok(PublishReceipt {
                        content_id,
                        manifest_address: manifest_addr,
                        transactions,
                        outcome: PublishOutcome::AlreadyExists,
                    })
                } else {
                    Err(ClientError::Conflict(format!(
                        "cartridge {content_id} is already finalized"
                    )))
                };
            }
            Some((_, manifest)) => {
                if manifest.blob_size != blob.len() as u64 {
                    return Err(ClientError::Conflict(format!(
                        "open manifest for {content_id} declares {} bytes, blob is {}",
                        manifest.blob_size,
                        blob.len()
                    )));
                }
                debug!(content_id = %content_id, "Resuming open manifest");
                manifest.chunk_size
            }
            None => {
                report(&options.progress, PublishProgress::Manifest);
                let tx = self
                    .submit_with_retry(
                        keypair,
                        Instruction::CreateManifest {
                            content_id,
                            blob_size: blob.len() as u64,
                            chunk_size: options.chunk_size,
                            sha256: content_id.0,
                            metadata: options.metadata.clone(),
                        },
                        &options.cancel,
                    )
                    .await?;
                transactions.push(tx);
                options.chunk_size
            }
        };

        let total = chunk_count(blob.len() as u64, chunk_size);
        let chunks: Vec<&[u8]> = blob.chunks(chunk_size as usize).collect();

        // Skip chunks the ledger already has.
        let already_written = self.probe_written_chunks(&content_id, total).await?;
        let missing: Vec<u32> = (0..total).filter(|i| !already_written[*i as usize]).collect();
        let mut written = total - missing.len() as u32;
        report(
            &options.progress,
            PublishProgress::Chunks {
                written,
                total,
                last_tx: None,
            },
        );

        let concurrency = options.concurrency.max(1);
        let mut waves = missing.chunks(concurrency).peekable();
        while let Some(wave) = waves.next() {
            if options.cancel.is_cancelled() {
                return Err(ClientError::Cancelled);
            }

            let submissions = wave.iter().map(|&index| {
                let instruction = Instruction::WriteChunk {
                    content_id,
                    chunk_index: index,
                    data: chunks[index as usize].to_vec(),
                };
                self.submit_with_retry(keypair, instruction, &options.cancel)
            });

            let mut last_tx = None;
            for result in join_all(submissions).await {
                let tx = result?;
                transactions.push(tx);
                last_tx = Some(tx);
                written += 1;
            }
            report(
                &options.progress,
                PublishProgress::Chunks {
                    written,
                    total,
                    last_tx,
                },
            );

            if waves.peek().is_some() {
                sleep(WAVE_PAUSE).await;
            }
        }

        // Finalize against the current page.
        let root = self
            .catalog_root()
            .await?
            .ok_or_else(|| ClientError::Conflict("catalog not initialized".to_string()))?;
        let page_index = root.latest_page_index;
        let page = self
            .catalog_page(page_index)
            .await?
            .ok_or_else(|| ClientError::Conflict(format!("catalog page {page_index} missing")))?;
        if page.is_full() {
            return Err(ClientError::PageFull { page_index });
        }

        if options.cancel.is_cancelled() {
            return Err(ClientError::Cancelled);
        }
        report(&options.progress, PublishProgress::Finalizing);
        let tx = self
            .submit_with_retry(
                keypair,
                Instruction::FinalizeCartridge {
                    content_id,
                    page_index,
                },
                &options.cancel,
            )
            .await?;
        transactions.push(tx);

        info!(content_id = %content_id, chunks = total, "Published cartridge");
        report(&options.progress, PublishProgress::Complete { content_id });

        Ok(PublishReceipt {
            content_id,
            manifest_address: manifest_addr,
            transactions,
            outcome: PublishOutcome::Published,
        })
    }

    /// Returns, per chunk index, whether the ledger already has a written
    /// chunk account.
    async fn probe_written_chunks(
        &self,
        content_id: &ContentId,
        total: u32,
    ) -> Result<Vec<bool>, ClientError> {
        let mut addresses = Vec::with_capacity(total as usize);
        for index in 0..total {
            let (address, _) = chunk_address(&self.program_id, content_id, index)
                .map_err(|e| ClientError::Input(e.to_string()))?;
            addresses.push(address);
        }

        let mut written = Vec::with_capacity(total as usize);
        for batch in addresses.chunks(PROBE_BATCH) {
            for (offset, account) in self.ledger.get_accounts(batch).await?.iter().enumerate() {
                let is_written = match account {
                    Some(data) => {
                        let address = batch[offset];
                        CartridgeChunk::decode(data)
                            .map_err(|e| ClientError::layout(address, e))?
                            .written
                    }
                    None => false,
                };
                written.push(is_written);
            }
        }
        Ok(written)
    }
}
