//! Instruction payloads and signed transactions.
//!
//! An instruction is an 8-byte method discriminator followed by its
//! arguments in canonical little-endian encoding. A transaction wraps one
//! instruction with the signer's address and an Ed25519 signature over the
//! instruction bytes; the signature doubles as the transaction identifier.

use bytes::{Bytes, BytesMut};

use cart_core::{
    verify_signature, Address, ContentId, Decode, Encode, Keypair, Signature, SignatureError, TxId,
};

use crate::{method_discriminator, LayoutError};

/// The six operations understood by the storage program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    /// Create the catalog root singleton; the signer becomes admin.
    InitializeCatalog,
    /// Create the next catalog page. Admin only.
    CreateCatalogPage {
        /// Must equal the root's current `page_count`
        page_index: u32,
    },
    /// Reserve a content id and declare the chunk geometry.
    CreateManifest {
        /// SHA-256 of the blob
        content_id: ContentId,
        /// Total blob size
        blob_size: u64,
        /// Declared chunk size
        chunk_size: u32,
        /// Declared commitment; must equal `content_id`
        sha256: [u8; 32],
        /// Opaque metadata
        metadata: Vec<u8>,
    },
    /// Write one chunk's payload.
    WriteChunk {
        /// Content id of the owning manifest
        content_id: ContentId,
        /// Chunk index (0-based)
        chunk_index: u32,
        /// Payload bytes
        data: Vec<u8>,
    },
    /// Lock the cartridge and append it to the catalog.
    FinalizeCartridge {
        /// Content id of the manifest
        content_id: ContentId,
        /// Must equal the root's `latest_page_index`
        page_index: u32,
    },
    /// Rotate the catalog admin key. Admin only.
    UpdateAdmin {
        /// The new admin key
        new_admin: Address,
    },
}

impl Instruction {
    /// Method name used for the discriminator.
    pub fn method_name(&self) -> &'static str {
        match self {
            Instruction::InitializeCatalog => "initialize_catalog",
            Instruction::CreateCatalogPage { .. } => "create_catalog_page",
            Instruction::CreateManifest { .. } => "create_manifest",
            Instruction::WriteChunk { .. } => "write_chunk",
            Instruction::FinalizeCartridge { .. } => "finalize_cartridge",
            Instruction::UpdateAdmin { .. } => "update_admin",
        }
    }

    /// Encodes to wire bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = BytesMut::new();
        method_discriminator(self.method_name()).encode(&mut buf);
        match self {
            Instruction::InitializeCatalog => {}
            Instruction::CreateCatalogPage { page_index } => {
                page_index.encode(&mut buf);
            }
            Instruction::CreateManifest {
                content_id,
                blob_size,
                chunk_size,
                sha256,
                metadata,
            } => {
                content_id.encode(&mut buf);
                blob_size.encode(&mut buf);
                chunk_size.encode(&mut buf);
                sha256.encode(&mut buf);
                metadata.encode(&mut buf);
            }
            Instruction::WriteChunk {
                content_id,
                chunk_index,
                data,
            } => {
                content_id.encode(&mut buf);
                chunk_index.encode(&mut buf);
                data.encode(&mut buf);
            }
            Instruction::FinalizeCartridge {
                content_id,
                page_index,
            } => {
                content_id.encode(&mut buf);
                page_index.encode(&mut buf);
            }
            Instruction::UpdateAdmin { new_admin } => {
                new_admin.encode(&mut buf);
            }
        }
        buf.to_vec()
    }

    /// Decodes from wire bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self, LayoutError> {
        let mut buf = Bytes::copy_from_slice(bytes);
        let discriminator = <[u8; 8]>::decode(&mut buf)?;

        let instruction = if discriminator == method_discriminator("initialize_catalog") {
            Instruction::InitializeCatalog
        } else if discriminator == method_discriminator("create_catalog_page") {
            Instruction::CreateCatalogPage {
                page_index: u32::decode(&mut buf)?,
            }
        } else if discriminator == method_discriminator("create_manifest") {
            Instruction::CreateManifest {
                content_id: ContentId::decode(&mut buf)?,
                blob_size: u64::decode(&mut buf)?,
                chunk_size: u32::decode(&mut buf)?,
                sha256: <[u8; 32]>::decode(&mut buf)?,
                metadata: Vec::<u8>::decode(&mut buf)?,
            }
        } else if discriminator == method_discriminator("write_chunk") {
            Instruction::WriteChunk {
                content_id: ContentId::decode(&mut buf)?,
                chunk_index: u32::decode(&mut buf)?,
                data: Vec::<u8>::decode(&mut buf)?,
            }
        } else if discriminator == method_discriminator("finalize_cartridge") {
            Instruction::FinalizeCartridge {
                content_id: ContentId::decode(&mut buf)?,
                page_index: u32::decode(&mut buf)?,
            }
        } else if discriminator == method_discriminator("update_admin") {
            Instruction::UpdateAdmin {
                new_admin: Address::decode(&mut buf)?,
            }
        } else {
            return Err(LayoutError::Discriminator {
                expected: "Instruction",
            });
        };

        if !buf.is_empty() {
            return Err(LayoutError::Decode(
                cart_core::DecodeError::TrailingBytes(buf.len()),
            ));
        }
        Ok(instruction)
    }
}

/// A signed transaction carrying one instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    /// The signer's address (public key)
    pub signer: Address,
    /// Encoded instruction bytes
    pub instruction: Vec<u8>,
    /// Ed25519 signature over the instruction bytes
    pub signature: Signature,
}

impl Transaction {
    /// Signs an instruction.
    pub fn sign(keypair: &Keypair, instruction: &Instruction) -> Self {
        let instruction = instruction.encode();
        let signature = keypair.sign(&instruction);
        Self {
            signer: keypair.address(),
            instruction,
            signature,
        }
    }

    /// Verifies the signature against the signer address.
    pub fn verify(&self) -> Result<(), SignatureError> {
        verify_signature(&self.signer, &self.instruction, &self.signature)
    }

    /// Decodes the carried instruction.
    pub fn decode_instruction(&self) -> Result<Instruction, LayoutError> {
        Instruction::decode(&self.instruction)
    }

    /// Returns the transaction identifier (the signature).
    pub fn tx_id(&self) -> TxId {
        TxId::new(self.signature)
    }

    /// Encodes to wire bytes (`signer ‖ instruction ‖ signature`).
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = BytesMut::new();
        self.signer.encode(&mut buf);
        self.instruction.encode(&mut buf);
        self.signature.encode(&mut buf);
        buf.to_vec()
    }

    /// Decodes from wire bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self, LayoutError> {
        let mut buf = Bytes::copy_from_slice(bytes);
        let signer = Address::decode(&mut buf)?;
        let instruction = Vec::<u8>::decode(&mut buf)?;
        let signature = <[u8; 64]>::decode(&mut buf)?;
        if !buf.is_empty() {
            return Err(LayoutError::Decode(
                cart_core::DecodeError::TrailingBytes(buf.len()),
            ));
        }
        Ok(Self {
            signer,
            instruction,
            signature,
        })
    }
}
