//! The client handle shared by both pipelines.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use cart_core::{ContentId, Keypair, ProgramId, TxId};
use cart_net::Ledger;
use cart_proto::{Instruction, Transaction, PROGRAM_ID};
use cart_store::ChunkCache;
use tokio::time::sleep;
use tracing::warn;

use crate::cancel::CancelToken;
use crate::ClientError;

/// Per-submission retry ceiling.
pub(crate) const MAX_SUBMIT_RETRIES: u32 = 5;

/// Initial back-off for submission retries; doubles per attempt.
pub(crate) const SUBMIT_RETRY_BASE: Duration = Duration::from_millis(1000);

/// Client over a ledger, with an optional local chunk cache.
#[derive(Clone)]
pub struct CartridgeClient {
    pub(crate) ledger: Arc<dyn Ledger>,
    pub(crate) cache: Option<Arc<ChunkCache>>,
    pub(crate) program_id: ProgramId,
    pub(crate) deny_list: HashSet<ContentId>,
}

impl CartridgeClient {
    /// Creates a client against the baked-in program id.
    pub fn new(ledger: Arc<dyn Ledger>) -> Self {
        Self {
            ledger,
            cache: None,
            program_id: PROGRAM_ID,
            deny_list: HashSet::new(),
        }
    }

    /// Overrides the program identifier.
    pub fn with_program_id(mut self, program_id: ProgramId) -> Self {
        self.program_id = program_id;
        self
    }

    /// Attaches a local chunk cache.
    pub fn with_cache(mut self, cache: Arc<ChunkCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Installs a deny list of content ids.
    pub fn with_deny_list(mut self, deny_list: HashSet<ContentId>) -> Self {
        self.deny_list = deny_list;
        self
    }

    /// Returns the program identifier in use.
    pub fn program_id(&self) -> &ProgramId {
        &self.program_id
    }

    /// Submits one signed instruction with exponential-back-off retries.
    ///
    /// Transport failures and rate-limit signals are retried; a ledger
    /// rejection is final.
    pub(crate) async fn submit_with_retry(
        &self,
        keypair: &Keypair,
        instruction: Instruction,
        cancel: &CancelToken,
    ) -> Result<TxId, ClientError> {
        let tx = Transaction::sign(keypair, &instruction);
        let mut delay = SUBMIT_RETRY_BASE;
        let mut attempt = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(ClientError::Cancelled);
            }
            match self.ledger.send_transaction(&tx).await {
                Ok(tx_id) => return Ok(tx_id),
                Err(err @ cart_net::TransportError::Rpc { .. }) => {
                    return Err(err.into());
                }
                Err(err) => {
                    attempt += 1;
                    if attempt >= MAX_SUBMIT_RETRIES {
                        return Err(err.into());
                    }
                    warn!(attempt, %err, "Submission failed, backing off");
                    sleep(delay).await;
                    delay *= 2;
                }
            }
        }
    }
}
