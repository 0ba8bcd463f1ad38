//! In-memory ledger.
//!
//! Applies signed transactions one at a time, the way the real ledger
//! serializes operations on the same accounts. Backs the test harness and
//! the client's dry-run path.

use cart_core::{Address, ProgramId, SignatureError, TxId};
use cart_proto::{LayoutError, Transaction};
use parking_lot::Mutex;
use thiserror::Error;

use crate::{Accounts, Processor, ProgramError};

/// Errors from applying a transaction.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Transaction signature does not verify
    #[error("Signature error: {0}")]
    Signature(#[from] SignatureError),

    /// Instruction bytes are malformed
    #[error("Instruction error: {0}")]
    Instruction(#[from] LayoutError),

    /// The program rejected the operation
    #[error("Program error: {0}")]
    Program(#[from] ProgramError),
}

struct Inner {
    accounts: Accounts,
    slot: u64,
}

/// A single-process ledger executing the storage program.
pub struct InMemoryLedger {
    processor: Processor,
    inner: Mutex<Inner>,
}

impl InMemoryLedger {
    /// Creates an empty ledger for the given program identifier.
    pub fn new(program_id: ProgramId) -> Self {
        Self {
            processor: Processor::new(program_id),
            inner: Mutex::new(Inner {
                accounts: Accounts::new(),
                slot: 0,
            }),
        }
    }

    /// Verifies and applies a transaction; advances the slot by one.
    pub fn process_transaction(&self, tx: &Transaction) -> Result<TxId, LedgerError> {
        tx.verify()?;
        let instruction = tx.decode_instruction()?;

        let mut inner = self.inner.lock();
        inner.slot += 1;
        let slot = inner.slot;
        self.processor
            .execute(&mut inner.accounts, &tx.signer, &instruction, slot)?;
        Ok(tx.tx_id())
    }

    /// Returns a copy of an account's data.
    pub fn account_data(&self, address: &Address) -> Option<Vec<u8>> {
        self.inner.lock().accounts.data(address).map(<[u8]>::to_vec)
    }

    /// Returns copies of several accounts' data, position for position.
    pub fn multiple_account_data(&self, addresses: &[Address]) -> Vec<Option<Vec<u8>>> {
        let inner = self.inner.lock();
        addresses
            .iter()
            .map(|address| inner.accounts.data(address).map(<[u8]>::to_vec))
            .collect()
    }

    /// Current slot.
    pub fn slot(&self) -> u64 {
        self.inner.lock().slot
    }

    /// Number of accounts in existence.
    pub fn account_count(&self) -> usize {
        self.inner.lock().accounts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cart_core::Keypair;
    use cart_proto::{Instruction, PROGRAM_ID};

    #[test]
    fn test_transaction_lifecycle() {
        let ledger = InMemoryLedger::new(PROGRAM_ID);
        let admin = Keypair::random();

        let tx = Transaction::sign(&admin, &Instruction::InitializeCatalog);
        let tx_id = ledger.process_transaction(&tx).unwrap();
        assert_eq!(tx_id.as_bytes(), &tx.signature);
        assert_eq!(ledger.slot(), 1);
        assert_eq!(ledger.account_count(), 1);
    }

    #[test]
    fn test_rejects_bad_signature() {
        let ledger = InMemoryLedger::new(PROGRAM_ID);
        let admin = Keypair::random();

        let mut tx = Transaction::sign(&admin, &Instruction::InitializeCatalog);
        tx.signature[0] ^= 0xff;
        assert!(matches!(
            ledger.process_transaction(&tx).unwrap_err(),
            LedgerError::Signature(_)
        ));
        // Nothing applied, slot untouched.
        assert_eq!(ledger.slot(), 0);
        assert_eq!(ledger.account_count(), 0);
    }

    #[test]
    fn test_program_failure_surfaces() {
        let ledger = InMemoryLedger::new(PROGRAM_ID);
        let admin = Keypair::random();

        let tx = Transaction::sign(&admin, &Instruction::CreateCatalogPage { page_index: 0 });
        assert!(matches!(
            ledger.process_transaction(&tx).unwrap_err(),
            LedgerError::Program(ProgramError::AccountMissing(_))
        ));
    }

    #[test]
    fn test_multiple_account_reads_preserve_positions() {
        let ledger = InMemoryLedger::new(PROGRAM_ID);
        let admin = Keypair::random();
        ledger
            .process_transaction(&Transaction::sign(&admin, &Instruction::InitializeCatalog))
            .unwrap();

        let (root, _) = cart_proto::seeds::catalog_root_address(&PROGRAM_ID).unwrap();
        let absent = Address::new([0xee; 32]);
        let results = ledger.multiple_account_data(&[absent, root]);
        assert!(results[0].is_none());
        assert!(results[1].is_some());
    }
}
