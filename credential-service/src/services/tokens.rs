//! Token manager - issues, validates, and retires one-time tokens.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::Rng;

use crate::models::{Account, Token, TokenKind};
use crate::services::ServiceError;
use crate::store::IdentityStore;

#[derive(Clone)]
pub struct TokenManager {
    store: Arc<dyn IdentityStore>,
}

impl TokenManager {
    pub fn new(store: Arc<dyn IdentityStore>) -> Self {
        Self { store }
    }

    /// Issue a token of the given kind, replacing any existing unexpired
    /// token of the same kind on the account.
    pub async fn issue(
        &self,
        account: &Account,
        kind: TokenKind,
    ) -> Result<Token, ServiceError> {
        self.store
            .delete_tokens_by_kind(account.account_id, kind)
            .await?;

        let value = if kind.is_numeric_code() {
            generate_numeric_code()
        } else {
            generate_token_value()
        };

        let token = Token::new(value, kind, account.account_id);
        self.store.insert_token(&token).await?;

        tracing::debug!(
            account_id = %account.account_id,
            kind = %kind.as_str(),
            "Token issued"
        );

        Ok(token)
    }

    /// Validate a token value against an expected kind.
    ///
    /// Returns the owning account. Does not consume the token; consumption
    /// is the caller's responsibility once the dependent operation has
    /// succeeded.
    pub async fn validate(
        &self,
        kind: TokenKind,
        value: &str,
    ) -> Result<Account, ServiceError> {
        let token = self
            .store
            .find_token(value)
            .await?
            .ok_or(ServiceError::TokenInvalid)?;

        if token.kind() != Some(kind) {
            return Err(ServiceError::TokenInvalid);
        }

        if token.is_expired() {
            return Err(ServiceError::TokenExpired);
        }

        self.store
            .find_account_by_id(token.account_id)
            .await?
            .ok_or(ServiceError::TokenInvalid)
    }

    /// Look up a token of the given kind regardless of expiry.
    pub async fn find(
        &self,
        kind: TokenKind,
        value: &str,
    ) -> Result<Option<Token>, ServiceError> {
        Ok(self
            .store
            .find_token(value)
            .await?
            .filter(|t| t.kind() == Some(kind)))
    }

    /// Move a token's expiry, used for initial-password links which live
    /// longer than ordinary reset links.
    pub async fn extend_expiry(
        &self,
        token: &mut Token,
        expiry_utc: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        self.store
            .update_token_expiry(&token.token, expiry_utc)
            .await?;
        token.expiry_utc = expiry_utc;
        Ok(())
    }

    /// Delete a token record. Idempotent.
    pub async fn consume(&self, value: &str) -> Result<(), ServiceError> {
        self.store.delete_token(value).await?;
        Ok(())
    }
}

/// 128-bit random identifier from a cryptographically secure source,
/// rendered as hex.
fn generate_token_value() -> String {
    let mut rng = rand::thread_rng();
    let token_bytes: [u8; 16] = rng.gen();
    hex::encode(token_bytes)
}

/// 6-digit numeric code for SMS delivery.
fn generate_numeric_code() -> String {
    let mut rng = rand::thread_rng();
    format!("{:06}", rng.gen_range(0..1_000_000))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_values_are_opaque_hex() {
        let value = generate_token_value();
        assert_eq!(value.len(), 32);
        assert!(value.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn numeric_codes_are_six_digits() {
        for _ in 0..100 {
            let code = generate_numeric_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }
}
