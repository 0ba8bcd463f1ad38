//! Progress reporting.
//!
//! Pull-style callbacks invoked at phase boundaries, in the order the
//! pipelines define. Implementations may forward into channels or UIs.

use std::sync::Arc;

use cart_core::{ContentId, TxId};

/// Shared progress callback.
pub type ProgressFn<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Publish phases, emitted in order.
#[derive(Debug, Clone)]
pub enum PublishProgress {
    /// Hashing and validating the blob
    Preparing {
        /// Computed content id
        content_id: ContentId,
    },
    /// Creating (or observing) the manifest
    Manifest,
    /// Chunk upload progress
    Chunks {
        /// Chunks confirmed written
        written: u32,
        /// Total chunks
        total: u32,
        /// Most recent transaction, if any was submitted this wave
        last_tx: Option<TxId>,
    },
    /// Finalizing into the catalog
    Finalizing,
    /// Publish finished
    Complete {
        /// The published content id
        content_id: ContentId,
    },
}

/// Fetch phases, emitted in order.
#[derive(Debug, Clone)]
pub enum FetchProgress {
    /// Manifest read
    Manifest,
    /// Chunk download progress
    Chunks {
        /// Chunks available so far
        loaded: u32,
        /// Total chunks
        total: u32,
        /// Payload bytes gathered so far
        bytes: u64,
        /// Total payload bytes
        total_bytes: u64,
    },
    /// Verifying the reconstruction hash
    Verifying,
    /// Fetch finished
    Complete,
}

/// Invokes a callback when present.
pub fn report<T>(progress: &Option<ProgressFn<T>>, event: T) {
    if let Some(callback) = progress {
        callback(&event);
    }
}
