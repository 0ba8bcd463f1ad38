//! Derived account addresses.
//!
//! Every piece of on-ledger state lives at an address computed from a seed
//! tuple and the program identifier; there is no other index. The search
//! walks the bump byte downward from 255 and keeps the first candidate that
//! is not a valid Ed25519 curve point, so derived addresses can never carry
//! a signature.

use curve25519_dalek::edwards::CompressedEdwardsY;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::identifiers::{Address, ProgramId};

/// Domain separator appended to every derived-address preimage.
pub const DERIVED_ADDRESS_MARKER: &[u8] = b"ProgramDerivedAddress";

/// Errors from address derivation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeriveError {
    /// Every bump value produced a curve point.
    #[error("No viable bump for the given seeds")]
    NoViableBump,
}

/// Derives the canonical address for a seed tuple.
///
/// Returns the address together with the bump byte that produced it. Equal
/// inputs always yield equal outputs.
pub fn derive_address(
    seeds: &[&[u8]],
    program_id: &ProgramId,
) -> Result<(Address, u8), DeriveError> {
    for bump in (0..=255u8).rev() {
        if let Some(address) = derive_address_with_bump(seeds, bump, program_id) {
            return Ok((address, bump));
        }
    }
    Err(DeriveError::NoViableBump)
}

/// Computes the candidate address for an explicit bump.
///
/// Returns `None` when the candidate lands on the Ed25519 curve and is
/// therefore not usable as a derived address.
pub fn derive_address_with_bump(
    seeds: &[&[u8]],
    bump: u8,
    program_id: &ProgramId,
) -> Option<Address> {
    let mut hasher = Sha256::new();
    for seed in seeds {
        hasher.update(seed);
    }
    hasher.update([bump]);
    hasher.update(program_id.as_bytes());
    hasher.update(DERIVED_ADDRESS_MARKER);
    let candidate: [u8; 32] = hasher.finalize().into();

    if is_on_curve(&candidate) {
        None
    } else {
        Some(Address::new(candidate))
    }
}

fn is_on_curve(bytes: &[u8; 32]) -> bool {
    CompressedEdwardsY(*bytes).decompress().is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_program_id() -> ProgramId {
        ProgramId::new([0x11; 32])
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let program_id = test_program_id();
        let (a1, b1) = derive_address(&[b"manifest", &[0xaa; 32]], &program_id).unwrap();
        let (a2, b2) = derive_address(&[b"manifest", &[0xaa; 32]], &program_id).unwrap();
        assert_eq!(a1, a2);
        assert_eq!(b1, b2);
    }

    #[test]
    fn test_different_seeds_different_addresses() {
        let program_id = test_program_id();
        let (a, _) = derive_address(&[b"manifest", &[0xaa; 32]], &program_id).unwrap();
        let (b, _) = derive_address(&[b"manifest", &[0xab; 32]], &program_id).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_different_programs_different_addresses() {
        let (a, _) = derive_address(&[b"catalog_root"], &ProgramId::new([0x11; 32])).unwrap();
        let (b, _) = derive_address(&[b"catalog_root"], &ProgramId::new([0x22; 32])).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_bump_recomputes_to_same_address() {
        let program_id = test_program_id();
        let seeds: &[&[u8]] = &[b"chunk", &[0x42; 32], &7u32.to_le_bytes()];
        let (address, bump) = derive_address(seeds, &program_id).unwrap();
        let recomputed = derive_address_with_bump(seeds, bump, &program_id).unwrap();
        assert_eq!(address, recomputed);
    }

    #[test]
    fn test_derived_address_is_off_curve() {
        let program_id = test_program_id();
        let (address, _) = derive_address(&[b"catalog_root"], &program_id).unwrap();
        assert!(!is_on_curve(address.as_bytes()));
    }
}
