//! Typed catalog reads used by discovery commands and both pipelines.

use cart_core::{Address, ContentId, Keypair, TxId};
use cart_proto::seeds::{catalog_page_address, catalog_root_address, manifest_address};
use cart_proto::{CartridgeManifest, CatalogEntry, CatalogPage, CatalogRoot, Instruction};

use crate::cancel::CancelToken;
use crate::client::CartridgeClient;
use crate::ClientError;

impl CartridgeClient {
    /// Reads the catalog root, if the catalog has been initialized.
    pub async fn catalog_root(&self) -> Result<Option<CatalogRoot>, ClientError> {
        let (address, _) = catalog_root_address(&self.program_id)
            .map_err(|e| ClientError::Input(e.to_string()))?;
        match self.ledger.get_account(&address).await? {
            Some(data) => {
                let root =
                    CatalogRoot::decode(&data).map_err(|e| ClientError::layout(address, e))?;
                Ok(Some(root))
            }
            None => Ok(None),
        }
    }

    /// Reads one catalog page.
    pub async fn catalog_page(&self, page_index: u32) -> Result<Option<CatalogPage>, ClientError> {
        let (address, _) = catalog_page_address(&self.program_id, page_index)
            .map_err(|e| ClientError::Input(e.to_string()))?;
        match self.ledger.get_account(&address).await? {
            Some(data) => {
                let page =
                    CatalogPage::decode(&data).map_err(|e| ClientError::layout(address, e))?;
                Ok(Some(page))
            }
            None => Ok(None),
        }
    }

    /// Lists catalog entries from one page, or from every page.
    ///
    /// Retired entries are filtered out unless requested.
    pub async fn list_entries(
        &self,
        page: Option<u32>,
        include_retired: bool,
    ) -> Result<Vec<CatalogEntry>, ClientError> {
        let pages: Vec<u32> = match page {
            Some(index) => vec![index],
            None => {
                let root = self
                    .catalog_root()
                    .await?
                    .ok_or_else(|| ClientError::Conflict("catalog not initialized".to_string()))?;
                (0..root.page_count).collect()
            }
        };

        let mut entries = Vec::new();
        for index in pages {
            if let Some(page) = self.catalog_page(index).await? {
                entries.extend(
                    page.entries
                        .into_iter()
                        .filter(|entry| include_retired || !entry.is_retired()),
                );
            }
        }
        Ok(entries)
    }

    /// Reads a cartridge manifest. Returns the account address alongside.
    pub async fn manifest(
        &self,
        content_id: &ContentId,
    ) -> Result<Option<(Address, CartridgeManifest)>, ClientError> {
        let (address, _) = manifest_address(&self.program_id, content_id)
            .map_err(|e| ClientError::Input(e.to_string()))?;
        match self.ledger.get_account(&address).await? {
            Some(data) => {
                let manifest = CartridgeManifest::decode(&data)
                    .map_err(|e| ClientError::layout(address, e))?;
                Ok(Some((address, manifest)))
            }
            None => Ok(None),
        }
    }

    /// Creates the catalog root; the signer becomes admin.
    pub async fn initialize_catalog(&self, keypair: &Keypair) -> Result<TxId, ClientError> {
        self.submit_with_retry(keypair, Instruction::InitializeCatalog, &CancelToken::new())
            .await
    }

    /// Creates the next catalog page; returns its index. Admin only.
    pub async fn create_next_page(&self, keypair: &Keypair) -> Result<(u32, TxId), ClientError> {
        let root = self
            .catalog_root()
            .await?
            .ok_or_else(|| ClientError::Conflict("catalog not initialized".to_string()))?;
        let page_index = root.page_count;
        let tx_id = self
            .submit_with_retry(
                keypair,
                Instruction::CreateCatalogPage { page_index },
                &CancelToken::new(),
            )
            .await?;
        Ok((page_index, tx_id))
    }

    /// Rotates the catalog admin key. Admin only.
    pub async fn update_admin(
        &self,
        keypair: &Keypair,
        new_admin: Address,
    ) -> Result<TxId, ClientError> {
        self.submit_with_retry(
            keypair,
            Instruction::UpdateAdmin { new_admin },
            &CancelToken::new(),
        )
        .await
    }
}
