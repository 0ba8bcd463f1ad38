//! Cart Program - The on-ledger state machine.
//!
//! Six operations connect four account families:
//!
//! - `initialize_catalog` creates the CatalogRoot singleton
//! - `create_catalog_page` appends an empty page
//! - `create_manifest` reserves a content id and its chunk geometry
//! - `write_chunk` fills one chunk account
//! - `finalize_cartridge` locks the blob and lists it in the catalog
//! - `update_admin` rotates the admin key
//!
//! Each operation validates everything before its first write, so a failed
//! operation leaves the account set untouched.

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod accounts;
pub mod ledger;
pub mod processor;

pub use accounts::Accounts;
pub use ledger::{InMemoryLedger, LedgerError};
pub use processor::Processor;

use cart_core::{Address, DeriveError};
use cart_proto::LayoutError;
use thiserror::Error;

/// Errors raised by the storage program.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProgramError {
    /// Signer is not authorized for this operation
    #[error("Unauthorized action")]
    Unauthorized,

    /// Blob size is zero
    #[error("Invalid cartridge size")]
    InvalidSize,

    /// Blob exceeds the 6 MiB ceiling
    #[error("Cartridge size exceeds maximum")]
    CartridgeTooLarge,

    /// Chunk size out of range, or payload length wrong for its index
    #[error("Invalid chunk size")]
    InvalidChunkSize,

    /// Chunk index beyond the manifest's chunk count
    #[error("Invalid chunk index")]
    InvalidChunkIndex,

    /// Chunk has already been written
    #[error("Chunk {0} has already been written")]
    ChunkAlreadyWritten(u32),

    /// Manifest is finalized and immutable
    #[error("Cartridge has already been finalized")]
    CartridgeFinalized,

    /// Page index does not match the expected value
    #[error("Invalid page index")]
    InvalidPageIndex,

    /// The target catalog page has no free entry
    #[error("Catalog page is full")]
    PageFull,

    /// Metadata exceeds the fixed buffer
    #[error("Metadata too large")]
    MetadataTooLarge,

    /// Declared hash does not match the content id, or reconstruction failed
    #[error("SHA-256 hash mismatch")]
    HashMismatch,

    /// A chunk account is absent or unwritten at finalization
    #[error("Chunk {0} is missing or unwritten")]
    MissingChunk(u32),

    /// Account already exists where an allocation was requested
    #[error("Account already exists: {0}")]
    AccountExists(Address),

    /// A referenced account does not exist
    #[error("Account missing: {0}")]
    AccountMissing(Address),

    /// Referenced account bytes violate the expected layout
    #[error("Layout error: {0}")]
    Layout(#[from] LayoutError),

    /// Address derivation failed
    #[error("Derivation error: {0}")]
    Derive(#[from] DeriveError),
}
