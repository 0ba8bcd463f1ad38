//! The cartridge manifest account.
//!
//! One manifest per content blob, at the address derived from
//! `("manifest", content_id)`. The manifest declares the chunk geometry and
//! the SHA-256 commitment every fetch verifies against.

use bytes::{BufMut, Bytes, BytesMut};

use cart_core::{Address, ContentId, Decode, Encode};

use crate::{account_discriminator, chunk_count, LayoutError, MAX_METADATA_LEN};

/// Cartridge manifest: per-blob metadata and hash commitment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartridgeManifest {
    /// SHA-256 of the blob, redundant with the address seed
    pub content_id: ContentId,
    /// Total blob size in bytes
    pub blob_size: u64,
    /// Declared chunk size in bytes
    pub chunk_size: u32,
    /// `ceil(blob_size / chunk_size)`
    pub chunk_count: u32,
    /// Declared commitment; equal to the content id by construction
    pub sha256: [u8; 32],
    /// False while chunks may still be written
    pub finalized: bool,
    /// Ledger slot at creation
    pub created_slot: u64,
    /// Public key that created the manifest
    pub publisher: Address,
    /// Derivation bump
    pub bump: u8,
    /// Opaque metadata, at most [`MAX_METADATA_LEN`] bytes
    pub metadata: Vec<u8>,
}

impl CartridgeManifest {
    /// Record name used for the discriminator.
    pub const RECORD: &'static str = "CartridgeManifest";

    /// Account length: header fields plus the fixed metadata buffer.
    pub const LEN: usize = 8 + 32 + 8 + 4 + 4 + 32 + 1 + 7 + 8 + 32 + 2 + 1 + 5 + MAX_METADATA_LEN;

    /// Returns the discriminator constant for this record.
    pub fn discriminator() -> [u8; 8] {
        account_discriminator(Self::RECORD)
    }

    /// Creates a fresh, unfinalized manifest.
    pub fn open(
        content_id: ContentId,
        blob_size: u64,
        chunk_size: u32,
        publisher: Address,
        created_slot: u64,
        metadata: Vec<u8>,
        bump: u8,
    ) -> Self {
        Self {
            content_id,
            blob_size,
            chunk_size,
            chunk_count: chunk_count(blob_size, chunk_size),
            sha256: content_id.0,
            finalized: false,
            created_slot,
            publisher,
            bump,
            metadata,
        }
    }

    /// Encodes to account bytes, zero-padding the metadata buffer.
    pub fn encode(&self) -> Vec<u8> {
        debug_assert!(self.metadata.len() <= MAX_METADATA_LEN);
        let mut buf = BytesMut::with_capacity(Self::LEN);
        Self::discriminator().encode(&mut buf);
        self.content_id.encode(&mut buf);
        self.blob_size.encode(&mut buf);
        self.chunk_size.encode(&mut buf);
        self.chunk_count.encode(&mut buf);
        self.sha256.encode(&mut buf);
        (self.finalized as u8).encode(&mut buf);
        buf.put_bytes(0, 7);
        self.created_slot.encode(&mut buf);
        self.publisher.encode(&mut buf);
        (self.metadata.len() as u16).encode(&mut buf);
        self.bump.encode(&mut buf);
        buf.put_bytes(0, 5);
        buf.put_slice(&self.metadata);
        buf.put_bytes(0, MAX_METADATA_LEN - self.metadata.len());
        buf.to_vec()
    }

    /// Decodes from account bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self, LayoutError> {
        if bytes.len() < Self::LEN {
            return Err(LayoutError::TooShort {
                record: Self::RECORD,
                expected: Self::LEN,
                actual: bytes.len(),
            });
        }
        let mut buf = Bytes::copy_from_slice(bytes);
        let discriminator = <[u8; 8]>::decode(&mut buf)?;
        if discriminator != Self::discriminator() {
            return Err(LayoutError::Discriminator {
                expected: Self::RECORD,
            });
        }
        let content_id = ContentId::decode(&mut buf)?;
        let blob_size = u64::decode(&mut buf)?;
        let chunk_size = u32::decode(&mut buf)?;
        let chunk_count = u32::decode(&mut buf)?;
        let sha256 = <[u8; 32]>::decode(&mut buf)?;
        let finalized = u8::decode(&mut buf)? != 0;
        let _padding = <[u8; 7]>::decode(&mut buf)?;
        let created_slot = u64::decode(&mut buf)?;
        let publisher = Address::decode(&mut buf)?;
        let metadata_len = u16::decode(&mut buf)?;
        let bump = u8::decode(&mut buf)?;
        let _padding = <[u8; 5]>::decode(&mut buf)?;

        if metadata_len as usize > MAX_METADATA_LEN {
            return Err(LayoutError::MetadataTooLong(metadata_len));
        }
        let metadata_buf = <[u8; MAX_METADATA_LEN]>::decode(&mut buf)?;
        let metadata = metadata_buf[..metadata_len as usize].to_vec();

        Ok(Self {
            content_id,
            blob_size,
            chunk_size,
            chunk_count,
            sha256,
            finalized,
            created_slot,
            publisher,
            bump,
            metadata,
        })
    }
}
