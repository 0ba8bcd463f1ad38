//! Ed25519 keypairs and transaction signatures.
//!
//! Signers (the catalog admin, publishers) are ordinary Ed25519 keys; the
//! ledger identifies them by the 32-byte public key, which is also their
//! account address.

use std::fmt;

use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use thiserror::Error;
use zeroize::Zeroize;

use crate::identifiers::Address;

/// A detached Ed25519 signature.
pub type Signature = [u8; 64];

/// Errors from signature operations.
#[derive(Debug, Error)]
pub enum SignatureError {
    /// The public key bytes are not a valid curve point
    #[error("Invalid public key")]
    InvalidPublicKey,

    /// Signature verification failed
    #[error("Signature verification failed")]
    Verification,

    /// Keypair bytes are malformed
    #[error("Invalid keypair bytes: {0}")]
    InvalidKeypair(String),
}

/// An Ed25519 keypair used to sign transactions.
#[derive(Clone)]
pub struct Keypair {
    secret: SigningKey,
}

impl Keypair {
    /// Generates a random keypair.
    pub fn random() -> Self {
        Self {
            secret: SigningKey::generate(&mut rand::rngs::OsRng),
        }
    }

    /// Creates a keypair from the 32-byte secret seed.
    pub fn from_secret(seed: [u8; 32]) -> Self {
        let mut seed = seed;
        let secret = SigningKey::from_bytes(&seed);
        seed.zeroize();
        Self { secret }
    }

    /// Creates a keypair from the 64-byte `secret ‖ public` form used by
    /// keypair files.
    pub fn from_bytes(bytes: &[u8; 64]) -> Result<Self, SignatureError> {
        let mut seed = [0u8; 32];
        seed.copy_from_slice(&bytes[..32]);
        let keypair = Self::from_secret(seed);
        if keypair.address().as_bytes() != &bytes[32..] {
            return Err(SignatureError::InvalidKeypair(
                "public half does not match secret".to_string(),
            ));
        }
        Ok(keypair)
    }

    /// Returns the 64-byte `secret ‖ public` form.
    pub fn to_bytes(&self) -> [u8; 64] {
        let mut out = [0u8; 64];
        out[..32].copy_from_slice(&self.secret.to_bytes());
        out[32..].copy_from_slice(self.secret.verifying_key().as_bytes());
        out
    }

    /// Returns the account address (the public key) of this keypair.
    pub fn address(&self) -> Address {
        Address::new(self.secret.verifying_key().to_bytes())
    }

    /// Signs a message.
    pub fn sign(&self, message: &[u8]) -> Signature {
        self.secret.sign(message).to_bytes()
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Keypair({})", self.address())
    }
}

/// Verifies a detached signature against an address.
pub fn verify_signature(
    address: &Address,
    message: &[u8],
    signature: &Signature,
) -> Result<(), SignatureError> {
    let key = VerifyingKey::from_bytes(address.as_bytes())
        .map_err(|_| SignatureError::InvalidPublicKey)?;
    let sig = ed25519_dalek::Signature::from_bytes(signature);
    key.verify(message, &sig)
        .map_err(|_| SignatureError::Verification)
}
