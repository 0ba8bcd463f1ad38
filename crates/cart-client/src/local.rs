//! In-process ledger adapter.
//!
//! Lets the pipelines run unchanged against [`InMemoryLedger`]; used by the
//! test harness and the CLI's dry-run path. Program rejections surface the
//! way a remote endpoint would report a failed transaction.

use std::sync::Arc;

use async_trait::async_trait;
use cart_core::{Address, ProgramId, TxId};
use cart_net::{Ledger, TransportError};
use cart_program::InMemoryLedger;
use cart_proto::Transaction;

/// JSON-RPC code for a transaction the ledger refused to execute.
const TX_FAILED_CODE: i64 = -32002;

/// A [`Ledger`] backed by an in-memory program execution.
#[derive(Clone)]
pub struct LocalLedger {
    inner: Arc<InMemoryLedger>,
}

impl LocalLedger {
    /// Creates a fresh local ledger for the given program id.
    pub fn new(program_id: ProgramId) -> Self {
        Self {
            inner: Arc::new(InMemoryLedger::new(program_id)),
        }
    }

    /// Wraps an existing in-memory ledger.
    pub fn from_inner(inner: Arc<InMemoryLedger>) -> Self {
        Self { inner }
    }

    /// Returns the underlying ledger.
    pub fn inner(&self) -> &InMemoryLedger {
        &self.inner
    }
}

#[async_trait]
impl Ledger for LocalLedger {
    async fn get_account(&self, address: &Address) -> Result<Option<Vec<u8>>, TransportError> {
        Ok(self.inner.account_data(address))
    }

    async fn get_accounts(
        &self,
        addresses: &[Address],
    ) -> Result<Vec<Option<Vec<u8>>>, TransportError> {
        Ok(self.inner.multiple_account_data(addresses))
    }

    async fn get_slot(&self) -> Result<u64, TransportError> {
        Ok(self.inner.slot())
    }

    async fn send_transaction(&self, tx: &Transaction) -> Result<TxId, TransportError> {
        self.inner
            .process_transaction(tx)
            .map_err(|err| TransportError::Rpc {
                code: TX_FAILED_CODE,
                message: err.to_string(),
            })
    }
}
