//! In-memory identity store used by tests.

use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use service_core::async_trait::async_trait;
use service_core::error::AppError;
use uuid::Uuid;

use crate::models::{Account, ContactMethod, ContactType, RetryCount, Token, TokenKind};
use crate::store::IdentityStore;

/// DashMap-backed store. Range queries scan and sort, which is fine at
/// test scale.
#[derive(Default)]
pub struct MemoryStore {
    accounts: DashMap<Uuid, Account>,
    tokens: DashMap<String, Token>,
    contacts: DashMap<(Uuid, String), ContactMethod>,
    retry_counts: DashMap<String, RetryCount>,
    fail_queries: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` range queries fail, for sweep fault-tolerance
    /// tests.
    pub fn inject_query_failures(&self, n: usize) {
        self.fail_queries.store(n, Ordering::SeqCst);
    }

    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }

    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }

    fn take_injected_failure(&self) -> Result<(), AppError> {
        let remaining = self.fail_queries.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_queries.store(remaining - 1, Ordering::SeqCst);
            return Err(AppError::DatabaseError(anyhow::anyhow!(
                "injected query failure"
            )));
        }
        Ok(())
    }

    fn sweep_candidates(
        &self,
        enabled: bool,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Vec<Account> {
        let mut matches: Vec<Account> = self
            .accounts
            .iter()
            .filter(|entry| {
                let a = entry.value();
                a.enabled == enabled
                    && a.source_code == "local"
                    && a.last_login.is_some_and(|t| t < cutoff)
            })
            .map(|entry| entry.value().clone())
            .collect();
        matches.sort_by_key(|a| a.last_login);
        matches.truncate(limit as usize);
        matches
    }
}

#[async_trait]
impl IdentityStore for MemoryStore {
    async fn find_account_by_id(&self, account_id: Uuid) -> Result<Option<Account>, AppError> {
        Ok(self.accounts.get(&account_id).map(|a| a.clone()))
    }

    async fn find_account_by_username(
        &self,
        username: &str,
    ) -> Result<Option<Account>, AppError> {
        Ok(self
            .accounts
            .iter()
            .find(|entry| entry.value().username == username)
            .map(|entry| entry.value().clone()))
    }

    async fn find_accounts_by_email(&self, email: &str) -> Result<Vec<Account>, AppError> {
        let needle = email.to_lowercase();
        let mut matches: Vec<Account> = self
            .accounts
            .iter()
            .filter(|entry| {
                entry
                    .value()
                    .email
                    .as_deref()
                    .is_some_and(|e| e.to_lowercase() == needle)
            })
            .map(|entry| entry.value().clone())
            .collect();
        matches.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(matches)
    }

    async fn search_accounts(&self, query: &str) -> Result<Vec<Account>, AppError> {
        let mut matches: Vec<Account> = self
            .accounts
            .iter()
            .filter(|entry| {
                let a = entry.value();
                let first = a.first_name.as_deref().unwrap_or("");
                let last = a.last_name.as_deref().unwrap_or("");
                let candidates = [
                    a.email.as_deref().unwrap_or("").to_lowercase(),
                    a.username.to_lowercase(),
                    format!("{} {}", first, last).trim().to_lowercase(),
                    format!("{} {}", last, first).trim().to_lowercase(),
                ];
                candidates.iter().any(|c| c == query)
            })
            .map(|entry| entry.value().clone())
            .collect();
        matches.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(matches)
    }

    async fn insert_account(&self, account: &Account) -> Result<(), AppError> {
        self.accounts.insert(account.account_id, account.clone());
        Ok(())
    }

    async fn update_account(&self, account: &Account) -> Result<(), AppError> {
        self.accounts.insert(account.account_id, account.clone());
        Ok(())
    }

    async fn delete_account(&self, account_id: Uuid) -> Result<(), AppError> {
        self.accounts.remove(&account_id);
        self.contacts
            .retain(|(owner, _), _| *owner != account_id);
        Ok(())
    }

    async fn find_enabled_local_inactive_before(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Account>, AppError> {
        self.take_injected_failure()?;
        Ok(self.sweep_candidates(true, cutoff, limit))
    }

    async fn find_disabled_local_inactive_before(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Account>, AppError> {
        self.take_injected_failure()?;
        Ok(self.sweep_candidates(false, cutoff, limit))
    }

    async fn insert_token(&self, token: &Token) -> Result<(), AppError> {
        self.tokens.insert(token.token.clone(), token.clone());
        Ok(())
    }

    async fn find_token(&self, value: &str) -> Result<Option<Token>, AppError> {
        Ok(self.tokens.get(value).map(|t| t.clone()))
    }

    async fn update_token_expiry(
        &self,
        value: &str,
        expiry_utc: DateTime<Utc>,
    ) -> Result<(), AppError> {
        if let Some(mut token) = self.tokens.get_mut(value) {
            token.expiry_utc = expiry_utc;
        }
        Ok(())
    }

    async fn delete_token(&self, value: &str) -> Result<(), AppError> {
        self.tokens.remove(value);
        Ok(())
    }

    async fn delete_tokens_by_kind(
        &self,
        account_id: Uuid,
        kind: TokenKind,
    ) -> Result<(), AppError> {
        self.tokens
            .retain(|_, t| !(t.account_id == account_id && t.kind_code == kind.as_str()));
        Ok(())
    }

    async fn delete_tokens_for_account(&self, account_id: Uuid) -> Result<(), AppError> {
        self.tokens.retain(|_, t| t.account_id != account_id);
        Ok(())
    }

    async fn find_contact(
        &self,
        account_id: Uuid,
        contact_type: ContactType,
    ) -> Result<Option<ContactMethod>, AppError> {
        Ok(self
            .contacts
            .get(&(account_id, contact_type.as_str().to_string()))
            .map(|c| c.clone()))
    }

    async fn upsert_contact(&self, contact: &ContactMethod) -> Result<(), AppError> {
        self.contacts.insert(
            (contact.account_id, contact.type_code.clone()),
            contact.clone(),
        );
        Ok(())
    }

    async fn get_retry_count(&self, username: &str) -> Result<Option<RetryCount>, AppError> {
        Ok(self.retry_counts.get(username).map(|c| c.clone()))
    }

    async fn increment_retry_count(&self, username: &str) -> Result<i32, AppError> {
        let mut entry = self
            .retry_counts
            .entry(username.to_string())
            .or_insert_with(|| RetryCount::new(username.to_string()));
        entry.count += 1;
        Ok(entry.count)
    }

    async fn clear_retry_count(&self, username: &str) -> Result<(), AppError> {
        if let Some(mut entry) = self.retry_counts.get_mut(username) {
            entry.count = 0;
        }
        Ok(())
    }

    async fn delete_retry_count(&self, username: &str) -> Result<(), AppError> {
        self.retry_counts.remove(username);
        Ok(())
    }

    async fn health_check(&self) -> Result<(), AppError> {
        Ok(())
    }
}
