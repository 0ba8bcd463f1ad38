//! Cart Core - Core types and primitives for the cartridge storage ledger.
//!
//! This crate provides:
//! - 32-byte identifier types (content IDs, account addresses)
//! - SHA-256 hashing helpers
//! - Little-endian canonical encoding for wire payloads
//! - Derived-address computation (seed tuple -> address + bump)
//! - Ed25519 keypairs and transaction signatures

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod derive;
pub mod encoding;
pub mod hash;
pub mod identifiers;
pub mod keypair;

pub use derive::{derive_address, derive_address_with_bump, DeriveError};
pub use encoding::{Decode, DecodeError, Encode};
pub use hash::sha256;
pub use identifiers::{Address, ContentId, ProgramId, TxId};
pub use keypair::{verify_signature, Keypair, Signature, SignatureError};
