//! Little-endian canonical encoding for wire payloads.
//!
//! Instruction arguments and transactions use this encoding; account bytes
//! are laid out by `cart-proto` on top of the same primitives.
//!
//! # Encoding Rules
//!
//! - **Integers**: little-endian
//! - **Fixed arrays**: raw bytes, no length prefix
//! - **Variable byte sequences**: u32 length prefix followed by the bytes

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

/// Errors during decoding.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Not enough bytes to decode
    #[error("Insufficient bytes: expected {expected}, got {available}")]
    InsufficientBytes {
        /// Expected number of bytes
        expected: usize,
        /// Actually available bytes
        available: usize,
    },

    /// Invalid enum tag
    #[error("Invalid enum tag: {0}")]
    InvalidTag(u32),

    /// Trailing bytes after a complete value
    #[error("Trailing bytes: {0} left after decoding")]
    TrailingBytes(usize),
}

/// Trait for types that can be canonically encoded.
pub trait Encode {
    /// Encodes the value into the buffer.
    fn encode(&self, buf: &mut BytesMut);

    /// Returns the encoded byte representation as a Vec.
    fn to_vec(&self) -> Vec<u8> {
        let mut buf = BytesMut::new();
        self.encode(&mut buf);
        buf.to_vec()
    }
}

/// Trait for types that can be decoded from canonical encoding.
pub trait Decode: Sized {
    /// Decodes from the buffer, advancing it.
    fn decode(buf: &mut Bytes) -> Result<Self, DecodeError>;

    /// Decodes from a byte slice, rejecting trailing bytes.
    fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut buf = Bytes::copy_from_slice(bytes);
        let value = Self::decode(&mut buf)?;
        if buf.has_remaining() {
            return Err(DecodeError::TrailingBytes(buf.remaining()));
        }
        Ok(value)
    }
}

fn ensure(buf: &Bytes, needed: usize) -> Result<(), DecodeError> {
    if buf.remaining() < needed {
        return Err(DecodeError::InsufficientBytes {
            expected: needed,
            available: buf.remaining(),
        });
    }
    Ok(())
}

impl Encode for u8 {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(*self);
    }
}

impl Decode for u8 {
    fn decode(buf: &mut Bytes) -> Result<Self, DecodeError> {
        ensure(buf, 1)?;
        Ok(buf.get_u8())
    }
}

impl Encode for u16 {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u16_le(*self);
    }
}

impl Decode for u16 {
    fn decode(buf: &mut Bytes) -> Result<Self, DecodeError> {
        ensure(buf, 2)?;
        Ok(buf.get_u16_le())
    }
}

impl Encode for u32 {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32_le(*self);
    }
}

impl Decode for u32 {
    fn decode(buf: &mut Bytes) -> Result<Self, DecodeError> {
        ensure(buf, 4)?;
        Ok(buf.get_u32_le())
    }
}

impl Encode for u64 {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u64_le(*self);
    }
}

impl Decode for u64 {
    fn decode(buf: &mut Bytes) -> Result<Self, DecodeError> {
        ensure(buf, 8)?;
        Ok(buf.get_u64_le())
    }
}

impl<const N: usize> Encode for [u8; N] {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_slice(self);
    }
}

impl<const N: usize> Decode for [u8; N] {
    fn decode(buf: &mut Bytes) -> Result<Self, DecodeError> {
        ensure(buf, N)?;
        let mut arr = [0u8; N];
        buf.copy_to_slice(&mut arr);
        Ok(arr)
    }
}

impl Encode for Vec<u8> {
    fn encode(&self, buf: &mut BytesMut) {
        debug_assert!(self.len() <= u32::MAX as usize);
        (self.len() as u32).encode(buf);
        buf.put_slice(self);
    }
}

impl Decode for Vec<u8> {
    fn decode(buf: &mut Bytes) -> Result<Self, DecodeError> {
        let len = u32::decode(buf)? as usize;
        ensure(buf, len)?;
        Ok(buf.copy_to_bytes(len).to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_encoding_is_little_endian() {
        let value: u32 = 0x12345678;
        assert_eq!(value.to_vec(), vec![0x78, 0x56, 0x34, 0x12]);

        let value: u64 = 1;
        assert_eq!(value.to_vec(), vec![1, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_vec_length_prefix() {
        let vec: Vec<u8> = vec![0xaa, 0xbb, 0xcc];
        assert_eq!(vec.to_vec(), vec![0x03, 0x00, 0x00, 0x00, 0xaa, 0xbb, 0xcc]);
    }

    #[test]
    fn test_roundtrip() {
        let value: u64 = 0xdead_beef_cafe;
        let decoded = u64::from_bytes(&value.to_vec()).unwrap();
        assert_eq!(value, decoded);

        let arr = [7u8; 13];
        let decoded = <[u8; 13]>::from_bytes(&arr.to_vec()).unwrap();
        assert_eq!(arr, decoded);

        let vec = vec![1u8, 2, 3, 4, 5];
        let decoded = Vec::<u8>::from_bytes(&vec.to_vec()).unwrap();
        assert_eq!(vec, decoded);
    }

    #[test]
    fn test_short_buffer_rejected() {
        let err = u32::from_bytes(&[0x01, 0x02]).unwrap_err();
        assert_eq!(
            err,
            DecodeError::InsufficientBytes {
                expected: 4,
                available: 2
            }
        );
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let err = u8::from_bytes(&[0x01, 0x02]).unwrap_err();
        assert_eq!(err, DecodeError::TrailingBytes(1));
    }

    #[test]
    fn test_vec_truncated_payload_rejected() {
        // Declares 10 bytes, provides 2.
        let bytes = vec![0x0a, 0x00, 0x00, 0x00, 0x01, 0x02];
        assert!(Vec::<u8>::from_bytes(&bytes).is_err());
    }
}
