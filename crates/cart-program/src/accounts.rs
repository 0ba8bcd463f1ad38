//! The account set a program execution operates on.

use std::collections::HashMap;

use cart_core::Address;

use crate::ProgramError;

/// Account data keyed by address.
#[derive(Debug, Default, Clone)]
pub struct Accounts {
    map: HashMap<Address, Vec<u8>>,
}

impl Accounts {
    /// Creates an empty account set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the data of an account, if present.
    pub fn data(&self, address: &Address) -> Option<&[u8]> {
        self.map.get(address).map(Vec::as_slice)
    }

    /// Returns true when an account exists at the address.
    pub fn exists(&self, address: &Address) -> bool {
        self.map.contains_key(address)
    }

    /// Allocates a new account; fails if the address is taken.
    pub fn create(&mut self, address: Address, data: Vec<u8>) -> Result<(), ProgramError> {
        if self.map.contains_key(&address) {
            return Err(ProgramError::AccountExists(address));
        }
        self.map.insert(address, data);
        Ok(())
    }

    /// Overwrites an existing account's data.
    pub fn write(&mut self, address: Address, data: Vec<u8>) {
        self.map.insert(address, data);
    }

    /// Number of accounts.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns true when no accounts exist.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
