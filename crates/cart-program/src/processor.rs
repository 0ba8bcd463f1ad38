//! Instruction processing.
//!
//! Every referenced account is re-derived from the instruction arguments,
//! so an execution can never touch state outside its seed family. All
//! validation happens before the first write.

use cart_core::hash::sha256_parts;
use cart_core::{Address, ContentId, ProgramId};
use cart_proto::seeds::{
    catalog_page_address, catalog_root_address, chunk_address, manifest_address,
};
use cart_proto::{
    expected_chunk_len, CartridgeChunk, CartridgeManifest, CatalogEntry, CatalogPage, CatalogRoot,
    Instruction, MAX_BLOB_SIZE, MAX_CHUNK_SIZE, MAX_METADATA_LEN, PAGE_CAP,
};
use tracing::debug;

use crate::{Accounts, ProgramError};

/// Executes instructions against an account set.
#[derive(Debug, Clone)]
pub struct Processor {
    program_id: ProgramId,
}

impl Processor {
    /// Creates a processor for the given program identifier.
    pub fn new(program_id: ProgramId) -> Self {
        Self { program_id }
    }

    /// Returns the program identifier.
    pub fn program_id(&self) -> &ProgramId {
        &self.program_id
    }

    /// Executes one instruction atomically.
    pub fn execute(
        &self,
        accounts: &mut Accounts,
        signer: &Address,
        instruction: &Instruction,
        slot: u64,
    ) -> Result<(), ProgramError> {
        match instruction {
            Instruction::InitializeCatalog => self.initialize_catalog(accounts, signer),
            Instruction::CreateCatalogPage { page_index } => {
                self.create_catalog_page(accounts, signer, *page_index)
            }
            Instruction::CreateManifest {
                content_id,
                blob_size,
                chunk_size,
                sha256,
                metadata,
            } => self.create_manifest(
                accounts, signer, *content_id, *blob_size, *chunk_size, sha256, metadata, slot,
            ),
            Instruction::WriteChunk {
                content_id,
                chunk_index,
                data,
            } => self.write_chunk(accounts, signer, *content_id, *chunk_index, data),
            Instruction::FinalizeCartridge {
                content_id,
                page_index,
            } => self.finalize_cartridge(accounts, signer, *content_id, *page_index, slot),
            Instruction::UpdateAdmin { new_admin } => {
                self.update_admin(accounts, signer, *new_admin)
            }
        }
    }

    fn initialize_catalog(
        &self,
        accounts: &mut Accounts,
        signer: &Address,
    ) -> Result<(), ProgramError> {
        let (root_address, bump) = catalog_root_address(&self.program_id)?;
        let root = CatalogRoot::initial(*signer, bump);
        accounts.create(root_address, root.encode())?;

        debug!(admin = %signer, "Catalog initialized");
        Ok(())
    }

    fn create_catalog_page(
        &self,
        accounts: &mut Accounts,
        signer: &Address,
        page_index: u32,
    ) -> Result<(), ProgramError> {
        let (root_address, _) = catalog_root_address(&self.program_id)?;
        let root_data = accounts
            .data(&root_address)
            .ok_or(ProgramError::AccountMissing(root_address))?;
        let mut root = CatalogRoot::decode(root_data)?;

        if signer != &root.admin {
            return Err(ProgramError::Unauthorized);
        }
        if page_index != root.page_count {
            return Err(ProgramError::InvalidPageIndex);
        }

        let (page_address, bump) = catalog_page_address(&self.program_id, page_index)?;
        let page = CatalogPage::empty(page_index, PAGE_CAP as u32, bump);
        accounts.create(page_address, page.encode())?;

        root.page_count += 1;
        root.latest_page_index = page_index;
        accounts.write(root_address, root.encode());

        debug!(page_index, "Created catalog page");
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn create_manifest(
        &self,
        accounts: &mut Accounts,
        signer: &Address,
        content_id: ContentId,
        blob_size: u64,
        chunk_size: u32,
        sha256: &[u8; 32],
        metadata: &[u8],
        slot: u64,
    ) -> Result<(), ProgramError> {
        if blob_size == 0 {
            return Err(ProgramError::InvalidSize);
        }
        if blob_size > MAX_BLOB_SIZE {
            return Err(ProgramError::CartridgeTooLarge);
        }
        if chunk_size == 0 || chunk_size > MAX_CHUNK_SIZE {
            return Err(ProgramError::InvalidChunkSize);
        }
        if sha256 != content_id.as_bytes() {
            return Err(ProgramError::HashMismatch);
        }
        if metadata.len() > MAX_METADATA_LEN {
            return Err(ProgramError::MetadataTooLarge);
        }

        let (address, bump) = manifest_address(&self.program_id, &content_id)?;
        let manifest = CartridgeManifest::open(
            content_id,
            blob_size,
            chunk_size,
            *signer,
            slot,
            metadata.to_vec(),
            bump,
        );
        accounts.create(address, manifest.encode())?;

        debug!(
            content_id = %content_id,
            blob_size,
            chunks = manifest.chunk_count,
            "Created manifest"
        );
        Ok(())
    }

    fn write_chunk(
        &self,
        accounts: &mut Accounts,
        signer: &Address,
        content_id: ContentId,
        chunk_index: u32,
        data: &[u8],
    ) -> Result<(), ProgramError> {
        let (manifest_addr, _) = manifest_address(&self.program_id, &content_id)?;
        let manifest_data = accounts
            .data(&manifest_addr)
            .ok_or(ProgramError::AccountMissing(manifest_addr))?;
        let manifest = CartridgeManifest::decode(manifest_data)?;

        if signer != &manifest.publisher {
            return Err(ProgramError::Unauthorized);
        }
        if manifest.finalized {
            return Err(ProgramError::CartridgeFinalized);
        }
        if chunk_index >= manifest.chunk_count {
            return Err(ProgramError::InvalidChunkIndex);
        }

        let expected = expected_chunk_len(manifest.blob_size, manifest.chunk_size, chunk_index);
        if data.len() as u32 != expected {
            return Err(ProgramError::InvalidChunkSize);
        }

        let (chunk_addr, bump) = chunk_address(&self.program_id, &content_id, chunk_index)?;
        if let Some(existing) = accounts.data(&chunk_addr) {
            let existing = CartridgeChunk::decode(existing)?;
            if existing.written {
                return Err(ProgramError::ChunkAlreadyWritten(chunk_index));
            }
        }

        let chunk =
            CartridgeChunk::new_written(content_id, chunk_index, data, manifest.chunk_size, bump);
        accounts.write(chunk_addr, chunk.encode());

        debug!(content_id = %content_id, chunk_index, len = data.len(), "Wrote chunk");
        Ok(())
    }

    fn finalize_cartridge(
        &self,
        accounts: &mut Accounts,
        signer: &Address,
        content_id: ContentId,
        page_index: u32,
        slot: u64,
    ) -> Result<(), ProgramError> {
        let (manifest_addr, _) = manifest_address(&self.program_id, &content_id)?;
        let manifest_data = accounts
            .data(&manifest_addr)
            .ok_or(ProgramError::AccountMissing(manifest_addr))?;
        let mut manifest = CartridgeManifest::decode(manifest_data)?;

        if signer != &manifest.publisher {
            return Err(ProgramError::Unauthorized);
        }
        if manifest.finalized {
            return Err(ProgramError::CartridgeFinalized);
        }

        let (root_address, _) = catalog_root_address(&self.program_id)?;
        let root_data = accounts
            .data(&root_address)
            .ok_or(ProgramError::AccountMissing(root_address))?;
        let mut root = CatalogRoot::decode(root_data)?;

        if page_index != root.latest_page_index || root.page_count == 0 {
            return Err(ProgramError::InvalidPageIndex);
        }

        let (page_address, _) = catalog_page_address(&self.program_id, page_index)?;
        let page_data = accounts
            .data(&page_address)
            .ok_or(ProgramError::AccountMissing(page_address))?;
        let mut page = CatalogPage::decode(page_data)?;

        if page.is_full() {
            return Err(ProgramError::PageFull);
        }

        // Independently reconstruct the blob from the chunk accounts; every
        // chunk must exist, be written, and the concatenation must hash to
        // the content id.
        let mut payloads: Vec<Vec<u8>> = Vec::with_capacity(manifest.chunk_count as usize);
        for index in 0..manifest.chunk_count {
            let (chunk_addr, _) = chunk_address(&self.program_id, &content_id, index)?;
            let chunk_data = accounts
                .data(&chunk_addr)
                .ok_or(ProgramError::MissingChunk(index))?;
            let chunk = CartridgeChunk::decode(chunk_data)?;
            if !chunk.written {
                return Err(ProgramError::MissingChunk(index));
            }
            let expected = expected_chunk_len(manifest.blob_size, manifest.chunk_size, index);
            if chunk.data_len != expected {
                return Err(ProgramError::InvalidChunkSize);
            }
            payloads.push(chunk.payload().to_vec());
        }
        let parts: Vec<&[u8]> = payloads.iter().map(Vec::as_slice).collect();
        if sha256_parts(&parts) != *content_id.as_bytes() {
            return Err(ProgramError::HashMismatch);
        }

        manifest.finalized = true;
        page.entries.push(CatalogEntry {
            content_id,
            manifest_address: manifest_addr,
            blob_size: manifest.blob_size,
            sha256: manifest.sha256,
            created_slot: slot,
            flags: 0,
        });
        root.total_cartridges += 1;

        accounts.write(manifest_addr, manifest.encode());
        accounts.write(page_address, page.encode());
        accounts.write(root_address, root.encode());

        debug!(
            content_id = %content_id,
            page_index,
            total = root.total_cartridges,
            "Finalized cartridge"
        );
        Ok(())
    }

    fn update_admin(
        &self,
        accounts: &mut Accounts,
        signer: &Address,
        new_admin: Address,
    ) -> Result<(), ProgramError> {
        let (root_address, _) = catalog_root_address(&self.program_id)?;
        let root_data = accounts
            .data(&root_address)
            .ok_or(ProgramError::AccountMissing(root_address))?;
        let mut root = CatalogRoot::decode(root_data)?;

        if signer != &root.admin {
            return Err(ProgramError::Unauthorized);
        }

        root.admin = new_admin;
        accounts.write(root_address, root.encode());

        debug!(new_admin = %new_admin, "Admin updated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cart_proto::PROGRAM_ID;

    struct Fixture {
        processor: Processor,
        accounts: Accounts,
        admin: Address,
        publisher: Address,
    }

    impl Fixture {
        fn new() -> Self {
            let mut fixture = Self {
                processor: Processor::new(PROGRAM_ID),
                accounts: Accounts::new(),
                admin: Address::new([0xad; 32]),
                publisher: Address::new([0x99; 32]),
            };
            let admin = fixture.admin;
            fixture
                .processor
                .execute(
                    &mut fixture.accounts,
                    &admin,
                    &Instruction::InitializeCatalog,
                    1,
                )
                .unwrap();
            fixture
                .processor
                .execute(
                    &mut fixture.accounts,
                    &admin,
                    &Instruction::CreateCatalogPage { page_index: 0 },
                    2,
                )
                .unwrap();
            fixture
        }

        fn run(&mut self, signer: Address, instruction: Instruction) -> Result<(), ProgramError> {
            self.processor
                .execute(&mut self.accounts, &signer, &instruction, 10)
        }

        fn publish_blob(&mut self, blob: &[u8], chunk_size: u32) -> ContentId {
            let content_id = ContentId::from_blob(blob);
            self.run(
                self.publisher,
                Instruction::CreateManifest {
                    content_id,
                    blob_size: blob.len() as u64,
                    chunk_size,
                    sha256: content_id.0,
                    metadata: Vec::new(),
                },
            )
            .unwrap();
            for (index, part) in blob.chunks(chunk_size as usize).enumerate() {
                self.run(
                    self.publisher,
                    Instruction::WriteChunk {
                        content_id,
                        chunk_index: index as u32,
                        data: part.to_vec(),
                    },
                )
                .unwrap();
            }
            content_id
        }

        fn root(&self) -> CatalogRoot {
            let (address, _) = catalog_root_address(&PROGRAM_ID).unwrap();
            CatalogRoot::decode(self.accounts.data(&address).unwrap()).unwrap()
        }

        fn page(&self, index: u32) -> CatalogPage {
            let (address, _) = catalog_page_address(&PROGRAM_ID, index).unwrap();
            CatalogPage::decode(self.accounts.data(&address).unwrap()).unwrap()
        }

        fn manifest(&self, content_id: &ContentId) -> CartridgeManifest {
            let (address, _) = manifest_address(&PROGRAM_ID, content_id).unwrap();
            CartridgeManifest::decode(self.accounts.data(&address).unwrap()).unwrap()
        }
    }

    #[test]
    fn test_initialize_catalog_once() {
        let mut fixture = Fixture::new();
        let err = fixture
            .run(fixture.admin, Instruction::InitializeCatalog)
            .unwrap_err();
        assert!(matches!(err, ProgramError::AccountExists(_)));
    }

    #[test]
    fn test_create_page_requires_admin() {
        let mut fixture = Fixture::new();
        let intruder = Address::new([0x66; 32]);
        let err = fixture
            .run(intruder, Instruction::CreateCatalogPage { page_index: 1 })
            .unwrap_err();
        assert_eq!(err, ProgramError::Unauthorized);
    }

    #[test]
    fn test_create_page_requires_sequential_index() {
        let mut fixture = Fixture::new();
        let err = fixture
            .run(fixture.admin, Instruction::CreateCatalogPage { page_index: 5 })
            .unwrap_err();
        assert_eq!(err, ProgramError::InvalidPageIndex);
    }

    #[test]
    fn test_full_publish_flow() {
        let mut fixture = Fixture::new();
        let content_id = fixture.publish_blob(b"hello", 4);

        // S1: well-known content id for b"hello".
        assert_eq!(
            content_id.to_hex(),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );

        fixture
            .run(
                fixture.publisher,
                Instruction::FinalizeCartridge {
                    content_id,
                    page_index: 0,
                },
            )
            .unwrap();

        let manifest = fixture.manifest(&content_id);
        assert!(manifest.finalized);
        assert_eq!(manifest.chunk_count, 2);

        let root = fixture.root();
        assert_eq!(root.total_cartridges, 1);

        let page = fixture.page(0);
        assert_eq!(page.entry_count(), 1);
        assert_eq!(page.entries[0].content_id, content_id);
        assert_eq!(page.entries[0].blob_size, 5);
    }

    #[test]
    fn test_create_manifest_validations() {
        let mut fixture = Fixture::new();
        let content_id = ContentId::from_blob(b"x");

        let err = fixture
            .run(
                fixture.publisher,
                Instruction::CreateManifest {
                    content_id,
                    blob_size: 0,
                    chunk_size: 4,
                    sha256: content_id.0,
                    metadata: Vec::new(),
                },
            )
            .unwrap_err();
        assert_eq!(err, ProgramError::InvalidSize);

        let err = fixture
            .run(
                fixture.publisher,
                Instruction::CreateManifest {
                    content_id,
                    blob_size: MAX_BLOB_SIZE + 1,
                    chunk_size: 4,
                    sha256: content_id.0,
                    metadata: Vec::new(),
                },
            )
            .unwrap_err();
        assert_eq!(err, ProgramError::CartridgeTooLarge);

        let err = fixture
            .run(
                fixture.publisher,
                Instruction::CreateManifest {
                    content_id,
                    blob_size: 1,
                    chunk_size: 0,
                    sha256: content_id.0,
                    metadata: Vec::new(),
                },
            )
            .unwrap_err();
        assert_eq!(err, ProgramError::InvalidChunkSize);

        let err = fixture
            .run(
                fixture.publisher,
                Instruction::CreateManifest {
                    content_id,
                    blob_size: 1,
                    chunk_size: 4,
                    sha256: [0xff; 32],
                    metadata: Vec::new(),
                },
            )
            .unwrap_err();
        assert_eq!(err, ProgramError::HashMismatch);

        let err = fixture
            .run(
                fixture.publisher,
                Instruction::CreateManifest {
                    content_id,
                    blob_size: 1,
                    chunk_size: 4,
                    sha256: content_id.0,
                    metadata: vec![0; MAX_METADATA_LEN + 1],
                },
            )
            .unwrap_err();
        assert_eq!(err, ProgramError::MetadataTooLarge);
    }

    #[test]
    fn test_write_chunk_rejects_double_write() {
        let mut fixture = Fixture::new();
        let content_id = fixture.publish_blob(b"hello", 4);
        let err = fixture
            .run(
                fixture.publisher,
                Instruction::WriteChunk {
                    content_id,
                    chunk_index: 0,
                    data: b"hell".to_vec(),
                },
            )
            .unwrap_err();
        assert_eq!(err, ProgramError::ChunkAlreadyWritten(0));
    }

    #[test]
    fn test_write_chunk_out_of_order_is_allowed() {
        let mut fixture = Fixture::new();
        let blob = b"hello";
        let content_id = ContentId::from_blob(blob);
        fixture
            .run(
                fixture.publisher,
                Instruction::CreateManifest {
                    content_id,
                    blob_size: 5,
                    chunk_size: 4,
                    sha256: content_id.0,
                    metadata: Vec::new(),
                },
            )
            .unwrap();

        // Last chunk first.
        fixture
            .run(
                fixture.publisher,
                Instruction::WriteChunk {
                    content_id,
                    chunk_index: 1,
                    data: b"o".to_vec(),
                },
            )
            .unwrap();
        fixture
            .run(
                fixture.publisher,
                Instruction::WriteChunk {
                    content_id,
                    chunk_index: 0,
                    data: b"hell".to_vec(),
                },
            )
            .unwrap();
    }

    #[test]
    fn test_write_chunk_validates_length() {
        let mut fixture = Fixture::new();
        let content_id = ContentId::from_blob(b"hello");
        fixture
            .run(
                fixture.publisher,
                Instruction::CreateManifest {
                    content_id,
                    blob_size: 5,
                    chunk_size: 4,
                    sha256: content_id.0,
                    metadata: Vec::new(),
                },
            )
            .unwrap();

        // Chunk 0 must carry exactly 4 bytes.
        let err = fixture
            .run(
                fixture.publisher,
                Instruction::WriteChunk {
                    content_id,
                    chunk_index: 0,
                    data: b"he".to_vec(),
                },
            )
            .unwrap_err();
        assert_eq!(err, ProgramError::InvalidChunkSize);

        // Chunk 1 must carry exactly the 1-byte remainder.
        let err = fixture
            .run(
                fixture.publisher,
                Instruction::WriteChunk {
                    content_id,
                    chunk_index: 1,
                    data: b"oo".to_vec(),
                },
            )
            .unwrap_err();
        assert_eq!(err, ProgramError::InvalidChunkSize);

        let err = fixture
            .run(
                fixture.publisher,
                Instruction::WriteChunk {
                    content_id,
                    chunk_index: 2,
                    data: b"!".to_vec(),
                },
            )
            .unwrap_err();
        assert_eq!(err, ProgramError::InvalidChunkIndex);
    }

    #[test]
    fn test_write_chunk_requires_publisher() {
        let mut fixture = Fixture::new();
        let content_id = ContentId::from_blob(b"hello");
        fixture
            .run(
                fixture.publisher,
                Instruction::CreateManifest {
                    content_id,
                    blob_size: 5,
                    chunk_size: 4,
                    sha256: content_id.0,
                    metadata: Vec::new(),
                },
            )
            .unwrap();

        let intruder = Address::new([0x66; 32]);
        let err = fixture
            .run(
                intruder,
                Instruction::WriteChunk {
                    content_id,
                    chunk_index: 0,
                    data: b"hell".to_vec(),
                },
            )
            .unwrap_err();
        assert_eq!(err, ProgramError::Unauthorized);
    }

    #[test]
    fn test_finalize_requires_all_chunks() {
        let mut fixture = Fixture::new();
        let content_id = ContentId::from_blob(b"hello");
        fixture
            .run(
                fixture.publisher,
                Instruction::CreateManifest {
                    content_id,
                    blob_size: 5,
                    chunk_size: 4,
                    sha256: content_id.0,
                    metadata: Vec::new(),
                },
            )
            .unwrap();
        fixture
            .run(
                fixture.publisher,
                Instruction::WriteChunk {
                    content_id,
                    chunk_index: 0,
                    data: b"hell".to_vec(),
                },
            )
            .unwrap();

        let err = fixture
            .run(
                fixture.publisher,
                Instruction::FinalizeCartridge {
                    content_id,
                    page_index: 0,
                },
            )
            .unwrap_err();
        assert_eq!(err, ProgramError::MissingChunk(1));
    }

    #[test]
    fn test_finalize_is_terminal() {
        let mut fixture = Fixture::new();
        let content_id = fixture.publish_blob(b"hello", 4);
        fixture
            .run(
                fixture.publisher,
                Instruction::FinalizeCartridge {
                    content_id,
                    page_index: 0,
                },
            )
            .unwrap();

        let err = fixture
            .run(
                fixture.publisher,
                Instruction::FinalizeCartridge {
                    content_id,
                    page_index: 0,
                },
            )
            .unwrap_err();
        assert_eq!(err, ProgramError::CartridgeFinalized);

        // Chunks of a finalized cartridge cannot be rewritten either.
        let err = fixture
            .run(
                fixture.publisher,
                Instruction::WriteChunk {
                    content_id,
                    chunk_index: 0,
                    data: b"hell".to_vec(),
                },
            )
            .unwrap_err();
        assert_eq!(err, ProgramError::CartridgeFinalized);
    }

    #[test]
    fn test_page_rollover() {
        let mut fixture = Fixture::new();

        // Fill page 0 to capacity.
        for i in 0..PAGE_CAP {
            let blob = format!("cartridge number {i}");
            let content_id = fixture.publish_blob(blob.as_bytes(), 8);
            fixture
                .run(
                    fixture.publisher,
                    Instruction::FinalizeCartridge {
                        content_id,
                        page_index: 0,
                    },
                )
                .unwrap();
        }
        assert!(fixture.page(0).is_full());

        // The 17th finalize fails until the admin creates page 1.
        let content_id = fixture.publish_blob(b"one more cartridge", 8);
        let err = fixture
            .run(
                fixture.publisher,
                Instruction::FinalizeCartridge {
                    content_id,
                    page_index: 0,
                },
            )
            .unwrap_err();
        assert_eq!(err, ProgramError::PageFull);

        fixture
            .run(fixture.admin, Instruction::CreateCatalogPage { page_index: 1 })
            .unwrap();
        fixture
            .run(
                fixture.publisher,
                Instruction::FinalizeCartridge {
                    content_id,
                    page_index: 1,
                },
            )
            .unwrap();

        let page1 = fixture.page(1);
        assert_eq!(page1.entry_count(), 1);
        assert_eq!(page1.entries[0].content_id, content_id);

        let root = fixture.root();
        assert_eq!(root.total_cartridges as usize, PAGE_CAP + 1);
        assert_eq!(root.latest_page_index, 1);
    }

    #[test]
    fn test_finalize_against_stale_page_fails() {
        let mut fixture = Fixture::new();
        fixture
            .run(fixture.admin, Instruction::CreateCatalogPage { page_index: 1 })
            .unwrap();

        let content_id = fixture.publish_blob(b"hello", 4);
        let err = fixture
            .run(
                fixture.publisher,
                Instruction::FinalizeCartridge {
                    content_id,
                    page_index: 0,
                },
            )
            .unwrap_err();
        assert_eq!(err, ProgramError::InvalidPageIndex);
    }

    #[test]
    fn test_update_admin() {
        let mut fixture = Fixture::new();
        let new_admin = Address::new([0x01; 32]);

        let err = fixture
            .run(new_admin, Instruction::UpdateAdmin { new_admin })
            .unwrap_err();
        assert_eq!(err, ProgramError::Unauthorized);

        fixture
            .run(fixture.admin, Instruction::UpdateAdmin { new_admin })
            .unwrap();
        assert_eq!(fixture.root().admin, new_admin);

        // The old admin is locked out; the new one can add pages.
        let err = fixture
            .run(fixture.admin, Instruction::CreateCatalogPage { page_index: 1 })
            .unwrap_err();
        assert_eq!(err, ProgramError::Unauthorized);
        fixture
            .run(new_admin, Instruction::CreateCatalogPage { page_index: 1 })
            .unwrap();
    }

    #[test]
    fn test_catalog_consistency_invariant() {
        let mut fixture = Fixture::new();
        for i in 0..3 {
            let blob = format!("blob {i}");
            let content_id = fixture.publish_blob(blob.as_bytes(), 4);
            fixture
                .run(
                    fixture.publisher,
                    Instruction::FinalizeCartridge {
                        content_id,
                        page_index: 0,
                    },
                )
                .unwrap();
        }

        let root = fixture.root();
        let mut total = 0u64;
        for i in 0..root.page_count {
            total += fixture.page(i).entry_count() as u64;
        }
        assert_eq!(root.total_cartridges, total);
    }

    #[test]
    fn test_failed_operation_leaves_no_partial_state() {
        let mut fixture = Fixture::new();
        let before = fixture.root();

        let content_id = fixture.publish_blob(b"hello", 4);
        // Finalize against the wrong page: validated before any write.
        let _ = fixture.run(
            fixture.publisher,
            Instruction::FinalizeCartridge {
                content_id,
                page_index: 9,
            },
        );

        assert_eq!(fixture.root().total_cartridges, before.total_cartridges);
        assert!(!fixture.manifest(&content_id).finalized);
    }
}
