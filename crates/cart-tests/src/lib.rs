//! Test harness for end-to-end scenarios.
//!
//! Wires the client pipelines to an in-memory ledger with an initialized
//! catalog, plus a fault-injecting ledger wrapper for failover tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use cart_client::{CartridgeClient, LocalLedger};
use cart_core::{Address, Keypair, TxId};
use cart_net::{Ledger, TransportError};
use cart_proto::{Transaction, PROGRAM_ID};

/// A ready-to-use cluster: in-memory ledger, initialized catalog, one page.
pub struct TestCluster {
    /// The ledger behind the client
    pub ledger: LocalLedger,
    /// Client wired to the ledger, without a cache
    pub client: CartridgeClient,
    /// Catalog admin keypair
    pub admin: Keypair,
    /// Publisher keypair
    pub publisher: Keypair,
}

impl TestCluster {
    /// Boots a cluster with the catalog initialized and page 0 created.
    pub async fn start() -> anyhow::Result<Self> {
        let ledger = LocalLedger::new(PROGRAM_ID);
        let client = CartridgeClient::new(Arc::new(ledger.clone()));
        let admin = Keypair::random();
        let publisher = Keypair::random();

        client.initialize_catalog(&admin).await?;
        client.create_next_page(&admin).await?;

        Ok(Self {
            ledger,
            client,
            admin,
            publisher,
        })
    }

    /// Returns a second client over the same ledger, e.g. with a cache.
    pub fn another_client(&self) -> CartridgeClient {
        CartridgeClient::new(Arc::new(self.ledger.clone()))
    }

    /// Applies one signed instruction directly, bypassing the pipelines.
    ///
    /// Used to stage partial states (interrupted publishes) that the
    /// pipelines must then recover from.
    pub fn apply(
        &self,
        keypair: &Keypair,
        instruction: &cart_proto::Instruction,
    ) -> anyhow::Result<TxId> {
        let tx = Transaction::sign(keypair, instruction);
        Ok(self.ledger.inner().process_transaction(&tx)?)
    }
}

/// Ledger wrapper that fails the first `failures` submissions.
///
/// Reads always pass through; failures look like an exhausted endpoint
/// pool, which the pipelines must absorb via their retry budget.
pub struct FlakyLedger {
    inner: LocalLedger,
    remaining_failures: AtomicUsize,
}

impl FlakyLedger {
    /// Wraps a ledger, injecting the given number of submission failures.
    pub fn new(inner: LocalLedger, failures: usize) -> Self {
        Self {
            inner,
            remaining_failures: AtomicUsize::new(failures),
        }
    }
}

#[async_trait]
impl Ledger for FlakyLedger {
    async fn get_account(&self, address: &Address) -> Result<Option<Vec<u8>>, TransportError> {
        self.inner.get_account(address).await
    }

    async fn get_accounts(
        &self,
        addresses: &[Address],
    ) -> Result<Vec<Option<Vec<u8>>>, TransportError> {
        self.inner.get_accounts(addresses).await
    }

    async fn get_slot(&self) -> Result<u64, TransportError> {
        self.inner.get_slot().await
    }

    async fn send_transaction(&self, tx: &Transaction) -> Result<TxId, TransportError> {
        let remaining = self.remaining_failures.load(Ordering::Relaxed);
        if remaining > 0 {
            self.remaining_failures.store(remaining - 1, Ordering::Relaxed);
            return Err(TransportError::AllEndpointsFailed { attempts: 2 });
        }
        self.inner.send_transaction(tx).await
    }
}
