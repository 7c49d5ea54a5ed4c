//! Opaque order tokens.
//!
//! A token hides the numeric order id from the payer. It is the order id
//! sealed with AES-256-GCM under a key derived from the merchant account's
//! signing key, with the random nonce prepended, encoded as URL-safe base64.
//! Authenticated encryption means a token opened with the wrong merchant key
//! fails outright instead of yielding a different id.

use ring::aead::{AES_256_GCM, Aad, LessSafeKey, NONCE_LEN, Nonce, UnboundKey};
use ring::rand::{SecureRandom, SystemRandom};
use sha2::{Digest, Sha256};

use crate::ledger::LedgerError;

/// Seals and opens order tokens for one merchant.
pub struct OrderTokenCipher {
    key: LessSafeKey,
}

impl std::fmt::Debug for OrderTokenCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderTokenCipher")
            .field("key", &"[hidden]")
            .finish()
    }
}

impl OrderTokenCipher {
    /// Derives the cipher from a merchant signing key.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Internal` if the key cannot be constructed.
    pub fn new(sign_key: &str) -> Result<Self, LedgerError> {
        let digest = Sha256::digest(sign_key.as_bytes());
        let unbound = UnboundKey::new(&AES_256_GCM, digest.as_slice())
            .map_err(|_| LedgerError::Internal("invalid order token key".to_string()))?;
        Ok(Self {
            key: LessSafeKey::new(unbound),
        })
    }

    /// Seals an order id into a token.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Internal` if randomness or sealing fails.
    pub fn seal(&self, order_id: i64) -> Result<String, LedgerError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        SystemRandom::new()
            .fill(&mut nonce_bytes)
            .map_err(|_| LedgerError::Internal("nonce generation failed".to_string()))?;

        let mut sealed = order_id.to_string().into_bytes();
        self.key
            .seal_in_place_append_tag(
                Nonce::assume_unique_for_key(nonce_bytes),
                Aad::empty(),
                &mut sealed,
            )
            .map_err(|_| LedgerError::Internal("order token sealing failed".to_string()))?;

        let mut token = Vec::with_capacity(NONCE_LEN + sealed.len());
        token.extend_from_slice(&nonce_bytes);
        token.extend_from_slice(&sealed);
        Ok(base64_url::encode(&token))
    }

    /// Opens a token and returns the order id.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::OrderNoFormatError` if the token is malformed,
    /// was sealed under another key, or does not contain an order id.
    pub fn open(&self, token: &str) -> Result<i64, LedgerError> {
        let raw = base64_url::decode(token).map_err(|_| LedgerError::OrderNoFormatError)?;
        if raw.len() <= NONCE_LEN {
            return Err(LedgerError::OrderNoFormatError);
        }

        let (nonce, sealed) = raw.split_at(NONCE_LEN);
        let nonce =
            Nonce::try_assume_unique_for_key(nonce).map_err(|_| LedgerError::OrderNoFormatError)?;
        let mut buffer = sealed.to_vec();
        let plain = self
            .key
            .open_in_place(nonce, Aad::empty(), &mut buffer)
            .map_err(|_| LedgerError::OrderNoFormatError)?;

        std::str::from_utf8(plain)
            .ok()
            .and_then(|text| text.parse::<i64>().ok())
            .ok_or(LedgerError::OrderNoFormatError)
    }
}
