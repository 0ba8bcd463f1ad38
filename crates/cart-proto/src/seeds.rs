//! Typed address helpers for the four account families.
//!
//! Numeric seeds are appended as 4-byte little-endian values, matching the
//! on-ledger derivation byte for byte.

use cart_core::{derive_address, Address, ContentId, DeriveError, ProgramId};

use crate::{CATALOG_PAGE_SEED, CATALOG_ROOT_SEED, CHUNK_SEED, MANIFEST_SEED};

/// Derives the catalog root singleton address.
pub fn catalog_root_address(program_id: &ProgramId) -> Result<(Address, u8), DeriveError> {
    derive_address(&[CATALOG_ROOT_SEED], program_id)
}

/// Derives a catalog page address.
pub fn catalog_page_address(
    program_id: &ProgramId,
    page_index: u32,
) -> Result<(Address, u8), DeriveError> {
    derive_address(&[CATALOG_PAGE_SEED, &page_index.to_le_bytes()], program_id)
}

/// Derives the manifest address for a content id.
pub fn manifest_address(
    program_id: &ProgramId,
    content_id: &ContentId,
) -> Result<(Address, u8), DeriveError> {
    derive_address(&[MANIFEST_SEED, content_id.as_slice()], program_id)
}

/// Derives the chunk address for `(content_id, chunk_index)`.
pub fn chunk_address(
    program_id: &ProgramId,
    content_id: &ContentId,
    chunk_index: u32,
) -> Result<(Address, u8), DeriveError> {
    derive_address(
        &[CHUNK_SEED, content_id.as_slice(), &chunk_index.to_le_bytes()],
        program_id,
    )
}
