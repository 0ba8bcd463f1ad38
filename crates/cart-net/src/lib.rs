//! Cart Net - Ledger RPC transport.
//!
//! A connection pool over multiple JSON-RPC endpoints with round-robin
//! failover, a sliding-window rate limiter for public endpoints, and
//! adaptive 429 back-off honouring Retry-After signals.

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod endpoint;
pub mod limiter;
pub mod pool;
pub mod retry_after;

pub use endpoint::{Endpoint, EndpointKind, Network};
pub use limiter::{RateGate, RateLimitConfig};
pub use pool::RpcPool;
pub use retry_after::retry_after_from;

use std::time::Duration;

use async_trait::async_trait;
use cart_core::{Address, TxId};
use cart_proto::Transaction;
use thiserror::Error;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// HTTP-level failure (connect, timeout, TLS)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The endpoint answered with a JSON-RPC error
    #[error("RPC error {code}: {message}")]
    Rpc {
        /// JSON-RPC error code
        code: i64,
        /// Error message, including any program log
        message: String,
    },

    /// Rate limit exhausted after honouring back-off
    #[error("Rate limited; retry after {retry_after:?}")]
    RateLimited {
        /// Interval the endpoint asked us to wait
        retry_after: Duration,
    },

    /// The response body did not match the expected shape
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Every endpoint failed within the retry budget
    #[error("All endpoints failed after {attempts} attempts")]
    AllEndpointsFailed {
        /// Number of attempts made
        attempts: usize,
    },
}

/// Typed view of the ledger used by the pipelines.
///
/// Implemented by [`RpcPool`] against real endpoints and by the test
/// harness against an in-memory ledger.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Reads one account's data.
    async fn get_account(&self, address: &Address) -> Result<Option<Vec<u8>>, TransportError>;

    /// Reads several accounts in one round trip, position for position.
    async fn get_accounts(
        &self,
        addresses: &[Address],
    ) -> Result<Vec<Option<Vec<u8>>>, TransportError>;

    /// Returns the current slot.
    async fn get_slot(&self) -> Result<u64, TransportError>;

    /// Submits a signed transaction.
    async fn send_transaction(&self, tx: &Transaction) -> Result<TxId, TransportError>;
}
