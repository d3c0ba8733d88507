//! Password hashing for charge point credentials

use bcrypt::{hash, verify, DEFAULT_COST};

use crate::application::ports::{CredentialError, CredentialHasher};

/// bcrypt-backed credential hasher
#[derive(Debug, Clone, Copy)]
pub struct BcryptHasher {
    cost: u32,
}

impl BcryptHasher {
    pub fn new() -> Self {
        Self { cost: DEFAULT_COST }
    }

    /// Custom work factor; bcrypt accepts 4..=31
    pub fn with_cost(cost: u32) -> Self {
        Self {
            cost: cost.clamp(4, 31),
        }
    }
}

impl Default for BcryptHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialHasher for BcryptHasher {
    fn hash(&self, password: &str) -> Result<String, CredentialError> {
        if password.is_empty() {
            return Err(CredentialError::Empty);
        }
        hash(password, self.cost).map_err(|e| CredentialError::Hash(e.to_string()))
    }

    fn verify(&self, password: &str, hash: &str) -> Result<bool, CredentialError> {
        verify(password, hash).map_err(|e| CredentialError::Hash(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify() {
        let hasher = BcryptHasher::with_cost(4);
        let hashed = hasher.hash("s3cret").unwrap();

        assert_ne!(hashed, "s3cret");
        assert!(hasher.verify("s3cret", &hashed).unwrap());
        assert!(!hasher.verify("wrong", &hashed).unwrap());
    }

    #[test]
    fn empty_password_is_rejected() {
        assert!(matches!(
            BcryptHasher::with_cost(4).hash(""),
            Err(CredentialError::Empty)
        ));
    }
}
