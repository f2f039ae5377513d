//! Credential hasher port.

use crate::error::BazaarError;

/// One-way, salted credential hashing. The plaintext is consumed here and
/// nowhere else; storage only ever sees the hash.
pub trait CredentialHasher: Send + Sync {
    fn hash(&self, plaintext: &str) -> Result<String, BazaarError>;

    fn verify(&self, plaintext: &str, hashed: &str) -> Result<bool, BazaarError>;
}
