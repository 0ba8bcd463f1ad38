//! Cart Proto - Byte-exact account layouts and instruction encoding.
//!
//! Four account families share the program's address space:
//! - `CatalogRoot` - singleton catalog metadata
//! - `CatalogPage` - fixed-capacity pages of catalog entries
//! - `CartridgeManifest` - per-blob metadata and hash commitment
//! - `CartridgeChunk` - raw chunk bytes
//!
//! Every account starts with an 8-byte discriminator; all integers are
//! little-endian. The layouts here are the interoperability contract: the
//! program and every client decoder must agree on every offset.

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod catalog;
pub mod chunk;
pub mod instruction;
pub mod manifest;
pub mod seeds;

pub use catalog::{CatalogEntry, CatalogPage, CatalogRoot, FLAG_RETIRED};
pub use chunk::CartridgeChunk;
pub use instruction::{Instruction, Transaction};
pub use manifest::CartridgeManifest;

use cart_core::hash::sha256_parts;
use cart_core::{DecodeError, ProgramId};
use thiserror::Error;

/// Maximum size of a cartridge blob (6 MiB).
pub const MAX_BLOB_SIZE: u64 = 6 * 1024 * 1024;

/// Maximum (and default) chunk size (128 KiB).
pub const MAX_CHUNK_SIZE: u32 = 128 * 1024;

/// Entries per catalog page.
pub const PAGE_CAP: usize = 16;

/// Maximum manifest metadata length.
pub const MAX_METADATA_LEN: usize = 256;

/// Seed for the catalog root singleton.
pub const CATALOG_ROOT_SEED: &[u8] = b"catalog_root";
/// Seed prefix for catalog pages.
pub const CATALOG_PAGE_SEED: &[u8] = b"catalog_page";
/// Seed prefix for manifests.
pub const MANIFEST_SEED: &[u8] = b"manifest";
/// Seed prefix for chunks.
pub const CHUNK_SEED: &[u8] = b"chunk";

/// The baked-in program identifier.
///
/// Deployments that override this must synchronise the program, the client
/// library, and any in-process decoder.
pub const PROGRAM_ID: ProgramId = ProgramId::new([
    0xc4, 0x97, 0x1d, 0x0e, 0x52, 0xb1, 0x6a, 0x88, 0x3f, 0xd5, 0x09, 0x7e, 0xaa, 0x33, 0x61, 0x4b,
    0x90, 0x2f, 0xe8, 0x47, 0x5c, 0x16, 0xb3, 0x2a, 0x71, 0xcd, 0x44, 0x9f, 0x08, 0xe6, 0x5d, 0x3c,
]);

/// Computes the 8-byte discriminator for an account record name.
pub fn account_discriminator(name: &str) -> [u8; 8] {
    let hash = sha256_parts(&[b"account:", name.as_bytes()]);
    let mut out = [0u8; 8];
    out.copy_from_slice(&hash[..8]);
    out
}

/// Computes the 8-byte discriminator for an instruction method name.
pub fn method_discriminator(name: &str) -> [u8; 8] {
    let hash = sha256_parts(&[b"global:", name.as_bytes()]);
    let mut out = [0u8; 8];
    out.copy_from_slice(&hash[..8]);
    out
}

/// Number of chunks needed for a blob: `ceil(blob_size / chunk_size)`.
pub fn chunk_count(blob_size: u64, chunk_size: u32) -> u32 {
    ((blob_size + chunk_size as u64 - 1) / chunk_size as u64) as u32
}

/// Expected payload length of a chunk.
///
/// Full `chunk_size` for every chunk except the last, which carries the
/// exact remainder in `(0, chunk_size]`.
pub fn expected_chunk_len(blob_size: u64, chunk_size: u32, chunk_index: u32) -> u32 {
    let count = chunk_count(blob_size, chunk_size);
    if chunk_index + 1 < count {
        chunk_size
    } else {
        let remainder = (blob_size % chunk_size as u64) as u32;
        if remainder == 0 {
            chunk_size
        } else {
            remainder
        }
    }
}

/// Errors from account decoding.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LayoutError {
    /// Account shorter than the minimum layout length
    #[error("Account too short for {record}: expected at least {expected}, got {actual}")]
    TooShort {
        /// Record name
        record: &'static str,
        /// Minimum layout length
        expected: usize,
        /// Actual account length
        actual: usize,
    },

    /// Discriminator does not match the expected record type
    #[error("Discriminator mismatch: expected {expected}")]
    Discriminator {
        /// Expected record name
        expected: &'static str,
    },

    /// Declared metadata length exceeds the fixed buffer
    #[error("Metadata length {0} exceeds {MAX_METADATA_LEN}")]
    MetadataTooLong(u16),

    /// Declared data length exceeds the chunk's data region
    #[error("Chunk data length {data_len} exceeds capacity {capacity}")]
    DataLenTooLarge {
        /// Declared payload length
        data_len: u32,
        /// Size of the fixed data region
        capacity: u32,
    },

    /// Entry count exceeds the page capacity implied by the account length
    #[error("Page entry count {entry_count} exceeds capacity {capacity}")]
    EntryCountTooLarge {
        /// Declared entry count
        entry_count: u32,
        /// Capacity implied by the account length
        capacity: u32,
    },

    /// Field-level decode failure
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discriminators_are_distinct() {
        let names = ["CatalogRoot", "CatalogPage", "CartridgeManifest", "CartridgeChunk"];
        for (i, a) in names.iter().enumerate() {
            for b in names.iter().skip(i + 1) {
                assert_ne!(account_discriminator(a), account_discriminator(b));
            }
        }
    }

    #[test]
    fn test_account_and_method_namespaces_differ() {
        assert_ne!(
            account_discriminator("write_chunk"),
            method_discriminator("write_chunk")
        );
    }

    #[test]
    fn test_chunk_count() {
        assert_eq!(chunk_count(5, 4), 2);
        assert_eq!(chunk_count(384, 128), 3);
        assert_eq!(chunk_count(1, 128 * 1024), 1);
        assert_eq!(chunk_count(128, 128), 1);
        assert_eq!(chunk_count(129, 128), 2);
    }

    #[test]
    fn test_expected_chunk_len() {
        // 5-byte blob in 4-byte chunks: "hell" + "o"
        assert_eq!(expected_chunk_len(5, 4, 0), 4);
        assert_eq!(expected_chunk_len(5, 4, 1), 1);

        // Boundary-aligned: every chunk full
        assert_eq!(expected_chunk_len(384, 128, 0), 128);
        assert_eq!(expected_chunk_len(384, 128, 1), 128);
        assert_eq!(expected_chunk_len(384, 128, 2), 128);
    }
}
