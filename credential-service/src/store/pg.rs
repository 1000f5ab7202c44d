//! PostgreSQL identity store.
//!
//! Uses sqlx with runtime-checked queries.

use chrono::{DateTime, Utc};
use service_core::async_trait::async_trait;
use service_core::error::AppError;
use sqlx::postgres::PgPool;
use uuid::Uuid;

use crate::models::{Account, ContactMethod, ContactType, RetryCount, Token, TokenKind};
use crate::store::IdentityStore;

/// PostgreSQL-backed store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a new store from a connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn db_err(e: sqlx::Error) -> AppError {
    AppError::DatabaseError(anyhow::anyhow!(e))
}

#[async_trait]
impl IdentityStore for PgStore {
    async fn find_account_by_id(&self, account_id: Uuid) -> Result<Option<Account>, AppError> {
        sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE account_id = $1")
            .bind(account_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)
    }

    async fn find_account_by_username(
        &self,
        username: &str,
    ) -> Result<Option<Account>, AppError> {
        sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)
    }

    async fn find_accounts_by_email(&self, email: &str) -> Result<Vec<Account>, AppError> {
        sqlx::query_as::<_, Account>(
            "SELECT * FROM accounts WHERE LOWER(email) = LOWER($1) ORDER BY username",
        )
        .bind(email)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)
    }

    async fn search_accounts(&self, query: &str) -> Result<Vec<Account>, AppError> {
        sqlx::query_as::<_, Account>(
            r#"
            SELECT * FROM accounts
            WHERE LOWER(COALESCE(email, '')) = $1
               OR LOWER(username) = $1
               OR LOWER(TRIM(CONCAT_WS(' ', first_name, last_name))) = $1
               OR LOWER(TRIM(CONCAT_WS(' ', last_name, first_name))) = $1
            ORDER BY username
            "#,
        )
        .bind(query)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)
    }

    async fn insert_account(&self, account: &Account) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO accounts (
                account_id, username, email, first_name, last_name, verified,
                locked, enabled, source_code, password_hash, password_expiry,
                last_login, mfa_preference_code, email_verify_token,
                email_verify_expiry, role_codes, group_codes, created_utc
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            "#,
        )
        .bind(account.account_id)
        .bind(&account.username)
        .bind(&account.email)
        .bind(&account.first_name)
        .bind(&account.last_name)
        .bind(account.verified)
        .bind(account.locked)
        .bind(account.enabled)
        .bind(&account.source_code)
        .bind(&account.password_hash)
        .bind(account.password_expiry)
        .bind(account.last_login)
        .bind(&account.mfa_preference_code)
        .bind(&account.email_verify_token)
        .bind(account.email_verify_expiry)
        .bind(&account.roles)
        .bind(&account.groups)
        .bind(account.created_utc)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn update_account(&self, account: &Account) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE accounts SET
                username = $2, email = $3, first_name = $4, last_name = $5,
                verified = $6, locked = $7, enabled = $8, source_code = $9,
                password_hash = $10, password_expiry = $11, last_login = $12,
                mfa_preference_code = $13, email_verify_token = $14,
                email_verify_expiry = $15, role_codes = $16, group_codes = $17
            WHERE account_id = $1
            "#,
        )
        .bind(account.account_id)
        .bind(&account.username)
        .bind(&account.email)
        .bind(&account.first_name)
        .bind(&account.last_name)
        .bind(account.verified)
        .bind(account.locked)
        .bind(account.enabled)
        .bind(&account.source_code)
        .bind(&account.password_hash)
        .bind(account.password_expiry)
        .bind(account.last_login)
        .bind(&account.mfa_preference_code)
        .bind(&account.email_verify_token)
        .bind(account.email_verify_expiry)
        .bind(&account.roles)
        .bind(&account.groups)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn delete_account(&self, account_id: Uuid) -> Result<(), AppError> {
        // Contact methods and tokens cascade with the account row.
        sqlx::query("DELETE FROM accounts WHERE account_id = $1")
            .bind(account_id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn find_enabled_local_inactive_before(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Account>, AppError> {
        sqlx::query_as::<_, Account>(
            r#"
            SELECT * FROM accounts
            WHERE enabled = TRUE AND source_code = 'local' AND last_login < $1
            ORDER BY last_login ASC
            LIMIT $2
            "#,
        )
        .bind(cutoff)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)
    }

    async fn find_disabled_local_inactive_before(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Account>, AppError> {
        sqlx::query_as::<_, Account>(
            r#"
            SELECT * FROM accounts
            WHERE enabled = FALSE AND source_code = 'local' AND last_login < $1
            ORDER BY last_login ASC
            LIMIT $2
            "#,
        )
        .bind(cutoff)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)
    }

    async fn insert_token(&self, token: &Token) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO tokens (token, kind_code, account_id, expiry_utc, created_utc)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&token.token)
        .bind(&token.kind_code)
        .bind(token.account_id)
        .bind(token.expiry_utc)
        .bind(token.created_utc)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn find_token(&self, value: &str) -> Result<Option<Token>, AppError> {
        sqlx::query_as::<_, Token>("SELECT * FROM tokens WHERE token = $1")
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)
    }

    async fn update_token_expiry(
        &self,
        value: &str,
        expiry_utc: DateTime<Utc>,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE tokens SET expiry_utc = $2 WHERE token = $1")
            .bind(value)
            .bind(expiry_utc)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn delete_token(&self, value: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM tokens WHERE token = $1")
            .bind(value)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn delete_tokens_by_kind(
        &self,
        account_id: Uuid,
        kind: TokenKind,
    ) -> Result<(), AppError> {
        sqlx::query("DELETE FROM tokens WHERE account_id = $1 AND kind_code = $2")
            .bind(account_id)
            .bind(kind.as_str())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn delete_tokens_for_account(&self, account_id: Uuid) -> Result<(), AppError> {
        sqlx::query("DELETE FROM tokens WHERE account_id = $1")
            .bind(account_id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn find_contact(
        &self,
        account_id: Uuid,
        contact_type: ContactType,
    ) -> Result<Option<ContactMethod>, AppError> {
        sqlx::query_as::<_, ContactMethod>(
            "SELECT * FROM contact_methods WHERE account_id = $1 AND type_code = $2",
        )
        .bind(account_id)
        .bind(contact_type.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)
    }

    async fn upsert_contact(&self, contact: &ContactMethod) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO contact_methods (contact_id, account_id, type_code, value, verified)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (account_id, type_code)
            DO UPDATE SET value = EXCLUDED.value, verified = EXCLUDED.verified
            "#,
        )
        .bind(contact.contact_id)
        .bind(contact.account_id)
        .bind(&contact.type_code)
        .bind(&contact.value)
        .bind(contact.verified)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn get_retry_count(&self, username: &str) -> Result<Option<RetryCount>, AppError> {
        sqlx::query_as::<_, RetryCount>("SELECT * FROM retry_counts WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)
    }

    async fn increment_retry_count(&self, username: &str) -> Result<i32, AppError> {
        let (count,): (i32,) = sqlx::query_as(
            r#"
            INSERT INTO retry_counts (username, count) VALUES ($1, 1)
            ON CONFLICT (username) DO UPDATE SET count = retry_counts.count + 1
            RETURNING count
            "#,
        )
        .bind(username)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(count)
    }

    async fn clear_retry_count(&self, username: &str) -> Result<(), AppError> {
        sqlx::query("UPDATE retry_counts SET count = 0 WHERE username = $1")
            .bind(username)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn delete_retry_count(&self, username: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM retry_counts WHERE username = $1")
            .bind(username)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Database health check failed: {}", e);
                AppError::DatabaseError(anyhow::anyhow!("Database health check failed: {}", e))
            })?;
        Ok(())
    }
}
