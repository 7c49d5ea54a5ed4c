//! Payment secret hashing with Argon2id.
//!
//! Accounts may protect payments with a short secret. Only the PHC hash is
//! stored; verification happens before any settlement is attempted.

use argon2::{
    Argon2, PasswordHash,
    password_hash::{PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use thiserror::Error;

use crate::ledger::LedgerError;

/// Errors that can occur during pay key operations.
#[derive(Debug, Error)]
pub enum PayKeyError {
    /// Failed to hash the pay key.
    #[error("failed to hash pay key: {0}")]
    HashError(String),

    /// Stored hash is not a valid PHC string.
    #[error("invalid pay key hash format")]
    InvalidHash,
}

impl From<PayKeyError> for LedgerError {
    fn from(err: PayKeyError) -> Self {
        Self::Internal(err.to_string())
    }
}

/// Hashes a pay key using Argon2id.
///
/// # Errors
///
/// Returns `PayKeyError::HashError` if hashing fails.
pub fn hash_pay_key(pay_key: &str) -> Result<String, PayKeyError> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(pay_key.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PayKeyError::HashError(e.to_string()))
}

/// Checks a pay key against the account's stored hash.
///
/// Accounts without a stored hash accept any key.
///
/// # Errors
///
/// Returns `LedgerError::PayKeyIncorrect` on mismatch and
/// `LedgerError::Internal` if the stored hash is corrupt.
pub fn verify_pay_key(pay_key: &str, stored_hash: Option<&str>) -> Result<(), LedgerError> {
    let Some(stored_hash) = stored_hash.filter(|h| !h.is_empty()) else {
        return Ok(());
    };
    let parsed = PasswordHash::new(stored_hash).map_err(|_| PayKeyError::InvalidHash)?;

    match Argon2::default().verify_password(pay_key.as_bytes(), &parsed) {
        Ok(()) => Ok(()),
        Err(argon2::password_hash::Error::Password) => Err(LedgerError::PayKeyIncorrect),
        Err(e) => Err(LedgerError::Internal(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_phc() {
        let hash = hash_pay_key("123456").unwrap();
        assert!(hash.starts_with("$argon2id$"));
    }

    #[test]
    fn test_verify() {
        let hash = hash_pay_key("123456").unwrap();
        assert!(verify_pay_key("123456", Some(&hash)).is_ok());
        assert!(matches!(
            verify_pay_key("654321", Some(&hash)),
            Err(LedgerError::PayKeyIncorrect)
        ));
    }

    #[test]
    fn test_no_stored_key() {
        assert!(verify_pay_key("anything", None).is_ok());
        assert!(verify_pay_key("anything", Some("")).is_ok());
    }

    #[test]
    fn test_corrupt_hash() {
        assert!(matches!(
            verify_pay_key("123456", Some("not-a-hash")),
            Err(LedgerError::Internal(_))
        ));
    }
}
