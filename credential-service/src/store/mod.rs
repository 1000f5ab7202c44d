//! Identity store - keyed record store for accounts, tokens, contact
//! methods, and retry counters.
//!
//! The store is the only shared mutable resource in the service. Every
//! state transition is a single write against one account's rows so the
//! request path and the batch sweeps cannot lose each other's updates.

mod memory;
mod pg;

pub use memory::MemoryStore;
pub use pg::PgStore;

use chrono::{DateTime, Utc};
use service_core::async_trait::async_trait;
use service_core::error::AppError;
use uuid::Uuid;

use crate::models::{Account, ContactMethod, ContactType, RetryCount, Token, TokenKind};

#[async_trait]
pub trait IdentityStore: Send + Sync {
    // Accounts
    async fn find_account_by_id(&self, account_id: Uuid) -> Result<Option<Account>, AppError>;
    async fn find_account_by_username(&self, username: &str)
        -> Result<Option<Account>, AppError>;
    /// Case-insensitive lookup. Email is not unique across accounts, so
    /// this may return many rows.
    async fn find_accounts_by_email(&self, email: &str) -> Result<Vec<Account>, AppError>;
    /// Free-text match against email, username, first+last name, or
    /// last+first name. `query` is already normalized (lower-cased,
    /// single-space-joined tokens).
    async fn search_accounts(&self, query: &str) -> Result<Vec<Account>, AppError>;
    async fn insert_account(&self, account: &Account) -> Result<(), AppError>;
    async fn update_account(&self, account: &Account) -> Result<(), AppError>;
    async fn delete_account(&self, account_id: Uuid) -> Result<(), AppError>;

    /// Enabled, locally-authoritative accounts whose last login precedes
    /// the cutoff, oldest first, at most `limit` rows.
    async fn find_enabled_local_inactive_before(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Account>, AppError>;

    /// Disabled, locally-authoritative accounts whose last login precedes
    /// the cutoff, oldest first, at most `limit` rows.
    async fn find_disabled_local_inactive_before(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Account>, AppError>;

    // Tokens
    async fn insert_token(&self, token: &Token) -> Result<(), AppError>;
    async fn find_token(&self, value: &str) -> Result<Option<Token>, AppError>;
    async fn update_token_expiry(
        &self,
        value: &str,
        expiry_utc: DateTime<Utc>,
    ) -> Result<(), AppError>;
    async fn delete_token(&self, value: &str) -> Result<(), AppError>;
    async fn delete_tokens_by_kind(
        &self,
        account_id: Uuid,
        kind: TokenKind,
    ) -> Result<(), AppError>;
    async fn delete_tokens_for_account(&self, account_id: Uuid) -> Result<(), AppError>;

    // Contact methods
    async fn find_contact(
        &self,
        account_id: Uuid,
        contact_type: ContactType,
    ) -> Result<Option<ContactMethod>, AppError>;
    async fn upsert_contact(&self, contact: &ContactMethod) -> Result<(), AppError>;

    // Retry counters (weak, keyed by username)
    async fn get_retry_count(&self, username: &str) -> Result<Option<RetryCount>, AppError>;
    async fn increment_retry_count(&self, username: &str) -> Result<i32, AppError>;
    async fn clear_retry_count(&self, username: &str) -> Result<(), AppError>;
    async fn delete_retry_count(&self, username: &str) -> Result<(), AppError>;

    async fn health_check(&self) -> Result<(), AppError>;
}
