//! Identifier types shared by the program and every client decoder.
//!
//! All ledger-level identifiers are 32 bytes:
//! - `ContentId` - SHA-256 of a blob; doubles as the manifest seed
//! - `Address` - an account address (signer key or derived address)
//! - `ProgramId` - the address of the deployed program
//!
//! Transaction identifiers (`TxId`) are the 64-byte signature, printed hex.

use std::fmt;

use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::encoding::{Decode, DecodeError, Encode};
use crate::hash::sha256;

/// Macro to define a 32-byte identifier type with common implementations.
macro_rules! define_id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
        pub struct $name(pub [u8; 32]);

        impl $name {
            /// Creates a new identifier from a 32-byte array.
            pub const fn new(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }

            /// Creates a zero identifier.
            pub const fn zero() -> Self {
                Self([0u8; 32])
            }

            /// Returns the inner bytes.
            pub const fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }

            /// Returns the inner bytes as a slice.
            pub fn as_slice(&self) -> &[u8] {
                &self.0
            }

            /// Creates from a hex string.
            pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
                let bytes = hex::decode(s)?;
                if bytes.len() != 32 {
                    return Err(hex::FromHexError::InvalidStringLength);
                }
                let mut arr = [0u8; 32];
                arr.copy_from_slice(&bytes);
                Ok(Self(arr))
            }

            /// Returns as a hex string.
            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), &self.to_hex()[..16])
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.to_hex())
            }
        }

        impl From<[u8; 32]> for $name {
            fn from(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }
        }

        impl From<$name> for [u8; 32] {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl Encode for $name {
            fn encode(&self, buf: &mut BytesMut) {
                self.0.encode(buf);
            }
        }

        impl Decode for $name {
            fn decode(buf: &mut Bytes) -> Result<Self, DecodeError> {
                Ok(Self(<[u8; 32]>::decode(buf)?))
            }
        }
    };
}

define_id_type!(
    /// Content identifier: SHA-256 of the blob bytes.
    ///
    /// Uniquely identifies a cartridge and seeds its manifest address.
    ContentId
);

define_id_type!(
    /// An account address on the ledger.
    ///
    /// Either an Ed25519 public key (signers) or a derived address.
    Address
);

define_id_type!(
    /// The address of the deployed storage program.
    ProgramId
);

impl ContentId {
    /// Computes the content identifier of a blob.
    pub fn from_blob(blob: &[u8]) -> Self {
        Self(sha256(blob))
    }
}

/// Transaction identifier: the 64-byte Ed25519 signature of the transaction.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct TxId(pub [u8; 64]);

impl TxId {
    /// Creates a transaction identifier from signature bytes.
    pub const fn new(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    /// Returns the inner bytes.
    pub const fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    /// Returns as a hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxId({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}
