//! Bcrypt credential hasher.

use crate::error::BazaarError;
use crate::ports::CredentialHasher;

// bcrypt's minimum cost; the crate keeps its `MIN_COST` constant private.
const MIN_COST: u32 = 4;

/// Salted bcrypt hashing. Cost 12 in production; `fast()` drops to the
/// minimum cost for tests and demos where timing matters more than
/// hardness.
pub struct BcryptHasher {
    cost: u32,
}

impl BcryptHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    pub fn fast() -> Self {
        Self {
            cost: MIN_COST,
        }
    }
}

impl Default for BcryptHasher {
    fn default() -> Self {
        Self {
            cost: bcrypt::DEFAULT_COST,
        }
    }
}

impl CredentialHasher for BcryptHasher {
    fn hash(&self, plaintext: &str) -> Result<String, BazaarError> {
        bcrypt::hash(plaintext, self.cost).map_err(|e| BazaarError::Hash(e.to_string()))
    }

    fn verify(&self, plaintext: &str, hashed: &str) -> Result<bool, BazaarError> {
        bcrypt::verify(plaintext, hashed).map_err(|e| BazaarError::Hash(e.to_string()))
    }
}
