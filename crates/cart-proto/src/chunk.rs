//! The cartridge chunk account.
//!
//! One account per `(content_id, chunk_index)`, holding a fixed data region
//! sized by the manifest's `chunk_size`. The payload occupies the first
//! `data_len` bytes; the remainder stays zero.

use bytes::{BufMut, Bytes, BytesMut};

use cart_core::{ContentId, Decode, Encode};

use crate::{account_discriminator, LayoutError};

/// Cartridge chunk: header plus a fixed-size data region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartridgeChunk {
    /// Content id this chunk belongs to
    pub content_id: ContentId,
    /// Chunk index (0-based)
    pub chunk_index: u32,
    /// Payload bytes within the data region
    pub data_len: u32,
    /// True after a successful write
    pub written: bool,
    /// Derivation bump
    pub bump: u8,
    /// The full fixed data region (`chunk_size` bytes)
    pub data: Vec<u8>,
}

impl CartridgeChunk {
    /// Record name used for the discriminator.
    pub const RECORD: &'static str = "CartridgeChunk";

    /// Header length before the data region.
    pub const HEADER_LEN: usize = 8 + 32 + 4 + 4 + 1 + 1 + 6;

    /// Returns the discriminator constant for this record.
    pub fn discriminator() -> [u8; 8] {
        account_discriminator(Self::RECORD)
    }

    /// Account length for a chunk of the given data-region size.
    pub const fn len_for_chunk_size(chunk_size: u32) -> usize {
        Self::HEADER_LEN + chunk_size as usize
    }

    /// Creates a written chunk from a payload, zero-padding the data region
    /// to `chunk_size`.
    pub fn new_written(
        content_id: ContentId,
        chunk_index: u32,
        payload: &[u8],
        chunk_size: u32,
        bump: u8,
    ) -> Self {
        debug_assert!(payload.len() <= chunk_size as usize);
        let mut data = vec![0u8; chunk_size as usize];
        data[..payload.len()].copy_from_slice(payload);
        Self {
            content_id,
            chunk_index,
            data_len: payload.len() as u32,
            written: true,
            bump,
            data,
        }
    }

    /// Returns the payload portion of the data region.
    pub fn payload(&self) -> &[u8] {
        &self.data[..self.data_len as usize]
    }

    /// Encodes to account bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(Self::HEADER_LEN + self.data.len());
        Self::discriminator().encode(&mut buf);
        self.content_id.encode(&mut buf);
        self.chunk_index.encode(&mut buf);
        self.data_len.encode(&mut buf);
        (self.written as u8).encode(&mut buf);
        self.bump.encode(&mut buf);
        buf.put_bytes(0, 6);
        buf.put_slice(&self.data);
        buf.to_vec()
    }

    /// Decodes from account bytes.
    ///
    /// The data region is everything past the header; `data_len` must fit
    /// within it.
    pub fn decode(bytes: &[u8]) -> Result<Self, LayoutError> {
        if bytes.len() < Self::HEADER_LEN {
            return Err(LayoutError::TooShort {
                record: Self::RECORD,
                expected: Self::HEADER_LEN,
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
        let chunk_index = u32::decode(&mut buf)?;
        let data_len = u32::decode(&mut buf)?;
        let written = u8::decode(&mut buf)? != 0;
        let bump = u8::decode(&mut buf)?;
        let _padding = <[u8; 6]>::decode(&mut buf)?;

        let data = buf.to_vec();
        if data_len as usize > data.len() {
            return Err(LayoutError::DataLenTooLarge {
                data_len,
                capacity: data.len() as u32,
            });
        }

        Ok(Self {
            content_id,
            chunk_index,
            data_len,
            written,
            bump,
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_roundtrip() {
        let chunk = CartridgeChunk::new_written(ContentId::new([0x42; 32]), 3, b"hell", 4, 252);
        let bytes = chunk.encode();
        assert_eq!(bytes.len(), CartridgeChunk::len_for_chunk_size(4));
        assert_eq!(CartridgeChunk::decode(&bytes).unwrap(), chunk);
    }

    #[test]
    fn test_header_len() {
        assert_eq!(CartridgeChunk::HEADER_LEN, 56);
    }

    #[test]
    fn test_partial_last_chunk_zero_padded() {
        let chunk = CartridgeChunk::new_written(ContentId::new([0x42; 32]), 1, b"o", 4, 252);
        assert_eq!(chunk.payload(), b"o");
        assert_eq!(&chunk.data, &[b'o', 0, 0, 0]);

        let decoded = CartridgeChunk::decode(&chunk.encode()).unwrap();
        assert_eq!(decoded.payload(), b"o");
        assert_eq!(decoded.data.len(), 4);
    }

    #[test]
    fn test_rejects_data_len_beyond_region() {
        let chunk = CartridgeChunk::new_written(ContentId::new([0x42; 32]), 0, b"abcd", 4, 252);
        let mut bytes = chunk.encode();
        // data_len lives at offset 44.
        bytes[44..48].copy_from_slice(&9u32.to_le_bytes());
        let err = CartridgeChunk::decode(&bytes).unwrap_err();
        assert_eq!(
            err,
            LayoutError::DataLenTooLarge {
                data_len: 9,
                capacity: 4
            }
        );
    }

    #[test]
    fn test_rejects_short_buffer() {
        assert!(matches!(
            CartridgeChunk::decode(&[0u8; 20]).unwrap_err(),
            LayoutError::TooShort { .. }
        ));
    }

    #[test]
    fn test_rejects_wrong_discriminator() {
        let chunk = CartridgeChunk::new_written(ContentId::new([0x42; 32]), 0, b"abcd", 4, 252);
        let mut bytes = chunk.encode();
        bytes[..8].copy_from_slice(&crate::account_discriminator("CartridgeManifest"));
        assert!(matches!(
            CartridgeChunk::decode(&bytes).unwrap_err(),
            LayoutError::Discriminator { .. }
        ));
    }
}
