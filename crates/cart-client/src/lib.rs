//! Cart Client - Publish and fetch pipelines.
//!
//! Publishing splits a blob into chunks, reserves a manifest, uploads the
//! chunks under bounded concurrency with retry, and finalizes into the
//! catalog. Fetching reads the manifest, gathers chunks from the local
//! cache and the ledger in bounded-concurrency batches, reassembles, and
//! verifies the SHA-256 commitment.

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod cancel;
pub mod client;
pub mod fetch;
pub mod local;
pub mod progress;
pub mod publish;
pub mod reads;

pub use cancel::CancelToken;
pub use client::CartridgeClient;
pub use fetch::{FetchOptions, FetchedCartridge};
pub use local::LocalLedger;
pub use progress::{FetchProgress, ProgressFn, PublishProgress};
pub use publish::{PublishOptions, PublishOutcome, PublishReceipt};

use std::time::Duration;

use cart_core::{Address, ContentId};
use cart_net::TransportError;
use cart_proto::LayoutError;
use thiserror::Error;

/// User-facing error taxonomy.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Invalid arguments; not retried
    #[error("Invalid input: {0}")]
    Input(String),

    /// Resource exists in an incompatible state
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The latest catalog page has no free entry
    #[error("Catalog page {page_index} is full; the admin must create a new page")]
    PageFull {
        /// Index of the full page
        page_index: u32,
    },

    /// Decoded account bytes violate the schema
    #[error("Layout error at {address}: {source}")]
    Layout {
        /// Address of the offending account
        address: Address,
        /// Underlying layout violation
        source: LayoutError,
    },

    /// Expected accounts are absent
    #[error("Missing chunks for {content_id}: {indices:?}")]
    Missing {
        /// Content being fetched
        content_id: ContentId,
        /// Chunk indices that could not be read
        indices: Vec<u32>,
    },

    /// SHA-256 mismatch after full reconstruction
    #[error("Integrity failure for {content_id}: reconstruction does not match commitment")]
    Integrity {
        /// Content whose reconstruction failed verification
        content_id: ContentId,
    },

    /// Network failure after retries were exhausted
    #[error("Transport error: {0}")]
    Transport(TransportError),

    /// Rate limiting exceeded the configured waits
    #[error("Rate limited; retry after {retry_after:?}")]
    RateLimited {
        /// Interval the endpoint asked us to wait
        retry_after: Duration,
    },

    /// Content id is on the deny list
    #[error("Content {content_id} is refused")]
    Refused {
        /// The denied content id
        content_id: ContentId,
    },

    /// The caller requested an abort
    #[error("Operation cancelled")]
    Cancelled,
}

impl ClientError {
    /// Wraps a layout error with the offending address.
    pub fn layout(address: Address, source: LayoutError) -> Self {
        Self::Layout { address, source }
    }
}

impl From<TransportError> for ClientError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::RateLimited { retry_after } => Self::RateLimited { retry_after },
            TransportError::Rpc { message, .. } => Self::Conflict(message),
            other => Self::Transport(other),
        }
    }
}
