//! Identity resolver.
//!
//! Identity truth lives wherever the account was created. Local rows tagged
//! with an external source are a cache; every reset decision re-checks the
//! authoritative predicate rather than trusting the shadow's stale flags.

use std::sync::Arc;

use crate::models::{Account, AuthSource};
use crate::providers::IdentityProvider;
use crate::services::ServiceError;
use crate::store::IdentityStore;

/// Uppercase, trimmed canonical username.
pub fn normalize_username(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// Lower-cased, trimmed canonical email, with the Unicode right single
/// quote folded to an ASCII apostrophe.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase().replace('\u{2019}', "'")
}

/// Flatten a free-text account query: comma/whitespace-separated tokens,
/// lower-cased, re-joined with single spaces.
pub fn normalize_search_query(raw: &str) -> String {
    raw.split([',', ' '])
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Outcome of a username resolution. When the match came from an external
/// directory and is not reset-eligible, `account` is the unsaved candidate
/// row (no shadow is materialized for ineligible accounts).
#[derive(Debug, Clone)]
pub struct Resolution {
    pub account: Account,
    pub eligible: bool,
}

/// Outcome of an email resolution. `ambiguous` means more than one match
/// exists and at least one of them is reset-eligible, so the caller must
/// go through a select-account step.
#[derive(Debug, Clone)]
pub struct EmailResolution {
    pub accounts: Vec<Account>,
    pub eligible: Vec<Account>,
    pub ambiguous: bool,
}

pub struct IdentityResolver {
    store: Arc<dyn IdentityStore>,
    providers: Vec<Arc<dyn IdentityProvider>>,
}

impl IdentityResolver {
    /// `providers` are consulted in order; the first hit wins.
    pub fn new(
        store: Arc<dyn IdentityStore>,
        providers: Vec<Arc<dyn IdentityProvider>>,
    ) -> Self {
        Self { store, providers }
    }

    pub async fn resolve_by_username(&self, raw: &str) -> Result<Resolution, ServiceError> {
        let username = normalize_username(raw);

        if let Some(account) = self.store.find_account_by_username(&username).await? {
            let eligible = self.password_reset_allowed(&account).await?;
            return Ok(Resolution { account, eligible });
        }

        for provider in &self.providers {
            let Some(external) = provider.find_by_username(&username).await? else {
                continue;
            };

            let eligible = external.reset_allowed();
            let mut shadow = Account::new_shadow(
                username.clone(),
                external.email.as_deref().map(normalize_email),
                provider.source(),
            );
            shadow.first_name = external.first_name.clone();
            shadow.last_name = external
                .name
                .as_deref()
                .and_then(|n| n.rsplit(' ').next())
                .map(str::to_string);

            if eligible {
                self.store.insert_account(&shadow).await?;
                tracing::info!(
                    username = %username,
                    source = %provider.source().as_str(),
                    "Materialized shadow account from external directory"
                );
            }

            return Ok(Resolution {
                account: shadow,
                eligible,
            });
        }

        Err(ServiceError::NotFound)
    }

    pub async fn resolve_by_email(&self, raw: &str) -> Result<EmailResolution, ServiceError> {
        let email = normalize_email(raw);
        let accounts = self.store.find_accounts_by_email(&email).await?;

        let mut eligible = Vec::new();
        for account in &accounts {
            if self.password_reset_allowed(account).await? {
                eligible.push(account.clone());
            }
        }

        let ambiguous = accounts.len() > 1 && !eligible.is_empty();
        Ok(EmailResolution {
            accounts,
            eligible,
            ambiguous,
        })
    }

    /// Free-text account lookup for support tooling. The query matches
    /// against email, username, and first/last name in either order.
    pub async fn search(&self, raw: &str) -> Result<Vec<Account>, ServiceError> {
        let query = normalize_search_query(raw);
        if query.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.store.search_accounts(&query).await?)
    }

    /// Authoritative reset-eligibility predicate for a resolved account.
    pub async fn password_reset_allowed(
        &self,
        account: &Account,
    ) -> Result<bool, ServiceError> {
        let source = account.source();
        if source == AuthSource::Local {
            return Ok(account.enabled);
        }

        match self.provider_for(source) {
            Some(provider) => Ok(provider.is_reset_eligible(&account.username).await?),
            None => {
                tracing::warn!(
                    username = %account.username,
                    source = %source.as_str(),
                    "No provider registered for account's authoritative source"
                );
                Ok(false)
            }
        }
    }

    fn provider_for(&self, source: AuthSource) -> Option<&Arc<dyn IdentityProvider>> {
        self.providers.iter().find(|p| p.source() == source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_is_uppercased_and_trimmed() {
        assert_eq!(normalize_username("  jsmith "), "JSMITH");
    }

    #[test]
    fn email_is_lowercased_with_ascii_apostrophe() {
        assert_eq!(normalize_email(" JOHN O\u{2019}brian "), "john o'brian");
    }

    #[test]
    fn search_query_tokens_are_normalized() {
        assert_eq!(normalize_search_query("Smith, Jo"), "smith jo");
        assert_eq!(normalize_search_query("  Jo   Smith "), "jo smith");
        assert_eq!(normalize_search_query(",, ,"), "");
    }
}
