//! Credential lifecycle service.
//!
//! Orchestrates password resets, password changes, and email/mobile
//! verification over the resolver, the token manager, and the store.
//! Resolution failures on the reset path degrade to silent no-ops or a
//! generic "unavailable" notification so callers cannot probe for account
//! existence; token-holder flows report precise reasons.

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{Duration, Utc};

use crate::config::NotifyTemplates;
use crate::models::{Account, ContactMethod, ContactType, TokenKind};
use crate::services::notify::{Notifier, Personalisation};
use crate::services::resolver::{normalize_email, normalize_username, IdentityResolver};
use crate::services::{ServiceError, TokenManager};
use crate::store::IdentityStore;
use crate::utils::{hash_password, is_valid_uk_mobile, strip_whitespace, Password};

/// How long an initial-password link stays live.
const INITIAL_PASSWORD_VALID_DAYS: i64 = 7;

/// Outcome of an email confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmEmailOutcome {
    Success,
    AlreadyVerified,
}

/// Outcome of a mobile confirmation. An expired code is replaced inline
/// with a fresh one so the user can retry without starting over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmMobileOutcome {
    Verified,
    Expired { verify_code: String },
}

pub struct CredentialService {
    store: Arc<dyn IdentityStore>,
    tokens: TokenManager,
    resolver: IdentityResolver,
    notifier: Arc<dyn Notifier>,
    templates: NotifyTemplates,
}

impl CredentialService {
    pub fn new(
        store: Arc<dyn IdentityStore>,
        tokens: TokenManager,
        resolver: IdentityResolver,
        notifier: Arc<dyn Notifier>,
        templates: NotifyTemplates,
    ) -> Self {
        Self {
            store,
            tokens,
            resolver,
            notifier,
            templates,
        }
    }

    /// Request a password reset by username or email address.
    ///
    /// Returns the reset link when one was issued. `Ok(None)` means the
    /// request was swallowed (unknown identity or ineligible account);
    /// the caller must not learn which.
    pub async fn request_reset(
        &self,
        username_or_email: &str,
        url_base: &str,
    ) -> Result<Option<String>, ServiceError> {
        if username_or_email.contains('@') {
            return self.request_reset_by_email(username_or_email, url_base).await;
        }

        let resolution = match self.resolver.resolve_by_username(username_or_email).await {
            Ok(r) => r,
            Err(ServiceError::NotFound) => {
                tracing::info!("Reset requested for unknown username");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        if !resolution.eligible {
            self.send_unavailable(&resolution.account).await?;
            return Ok(None);
        }

        let link = self
            .issue_reset_link(&resolution.account, url_base, "confirm")
            .await?;

        let mut params = Personalisation::new();
        params.insert(
            "firstName".to_string(),
            resolution.account.first_name_or_username().to_string(),
        );
        params.insert("resetLink".to_string(), link.clone());

        if let Some(email) = &resolution.account.email {
            self.email_with_retry(&self.templates.reset_confirm, email, &params)
                .await?;
        }

        Ok(Some(link))
    }

    async fn request_reset_by_email(
        &self,
        raw_email: &str,
        url_base: &str,
    ) -> Result<Option<String>, ServiceError> {
        let email = normalize_email(raw_email);
        let resolution = self.resolver.resolve_by_email(&email).await?;

        if resolution.accounts.is_empty() {
            // Tell the outside party, not the caller.
            let params = Personalisation::new();
            self.email_with_retry(&self.templates.reset_no_account, &email, &params)
                .await?;
            tracing::info!("Reset requested for email with no matching account");
            return Ok(None);
        }

        if resolution.eligible.is_empty() {
            for account in &resolution.accounts {
                self.send_unavailable(account).await?;
            }
            return Ok(None);
        }

        // Ambiguous-but-resettable goes through a select-account step; the
        // token starts on the first eligible match and is re-homed once
        // the caller picks.
        let target = &resolution.eligible[0];
        let step = if resolution.ambiguous { "select" } else { "confirm" };
        let link = self.issue_reset_link(target, url_base, step).await?;

        let template = if resolution.ambiguous {
            &self.templates.reset_select
        } else {
            &self.templates.reset_confirm
        };

        let mut params = Personalisation::new();
        params.insert(
            "firstName".to_string(),
            target.first_name_or_username().to_string(),
        );
        params.insert("resetLink".to_string(), link.clone());

        self.email_with_retry(template, &email, &params).await?;

        Ok(Some(link))
    }

    async fn issue_reset_link(
        &self,
        account: &Account,
        url_base: &str,
        step: &str,
    ) -> Result<String, ServiceError> {
        let token = self.tokens.issue(account, TokenKind::Reset).await?;
        Ok(format!("{}-{}?token={}", url_base, step, token.token))
    }

    /// Issue an initial-password link for a newly created account. These
    /// live 7 days instead of the 1-day reset default.
    pub async fn create_initial_password_link(
        &self,
        username: &str,
        url_base: &str,
    ) -> Result<String, ServiceError> {
        let resolution = self.resolver.resolve_by_username(username).await?;
        if !resolution.eligible {
            return Err(ServiceError::Locked);
        }

        let mut token = self
            .tokens
            .issue(&resolution.account, TokenKind::InitialPassword)
            .await?;
        self.tokens
            .extend_expiry(
                &mut token,
                Utc::now() + Duration::days(INITIAL_PASSWORD_VALID_DAYS),
            )
            .await?;

        let link = format!("{}-confirm?token={}", url_base, token.token);

        if let Some(email) = &resolution.account.email {
            let mut params = Personalisation::new();
            params.insert(
                "firstName".to_string(),
                resolution.account.first_name_or_username().to_string(),
            );
            params.insert("resetLink".to_string(), link.clone());
            self.email_with_retry(&self.templates.initial_password, email, &params)
                .await?;
        }

        Ok(link)
    }

    /// Set a new password using a reset (or initial-password) token.
    pub async fn set_password(
        &self,
        token_value: &str,
        new_password: &str,
    ) -> Result<(), ServiceError> {
        let token = self
            .store
            .find_token(token_value)
            .await?
            .ok_or(ServiceError::TokenInvalid)?;

        let kind = match token.kind() {
            Some(k @ (TokenKind::Reset | TokenKind::InitialPassword)) => k,
            _ => return Err(ServiceError::TokenInvalid),
        };
        if token.is_expired() {
            return Err(ServiceError::TokenExpired);
        }

        let account = self
            .store
            .find_account_by_id(token.account_id)
            .await?
            .ok_or(ServiceError::TokenInvalid)?;

        // Re-check the authoritative predicate; the shadow row's flags may
        // be stale.
        let resolution = self.resolver.resolve_by_username(&account.username).await?;
        if !resolution.eligible {
            return Err(ServiceError::Locked);
        }

        validate_password(&account, new_password)?;

        let hash = hash_password(&Password::new(new_password.to_string()))
            .map_err(ServiceError::Internal)?;

        let mut account = resolution.account;
        account.password_hash = Some(hash.into_string());
        account.password_expiry = None;
        account.locked = false;
        self.store.update_account(&account).await?;
        self.store.clear_retry_count(&account.username).await?;

        self.tokens.consume(token_value).await?;

        tracing::info!(
            account_id = %account.account_id,
            kind = %kind.as_str(),
            "Password set"
        );

        // The credential change already succeeded; a failed confirmation
        // email is logged, not surfaced.
        if let Some(email) = &account.email {
            let mut params = Personalisation::new();
            params.insert(
                "firstName".to_string(),
                account.first_name_or_username().to_string(),
            );
            if let Err(e) = self
                .email_with_retry(&self.templates.password_changed, email, &params)
                .await
            {
                tracing::warn!(error = %e, "Password-changed confirmation not delivered");
            }
        }

        Ok(())
    }

    /// Re-home a reset token issued against an ambiguous email match onto
    /// the account the caller selected.
    ///
    /// The target must share the originating account's email exactly, so a
    /// token cannot be hijacked across unrelated accounts. Returns the
    /// token value now in force.
    pub async fn move_token_to_account(
        &self,
        token_value: &str,
        target_username: &str,
    ) -> Result<String, ServiceError> {
        let token = self
            .store
            .find_token(token_value)
            .await?
            .ok_or(ServiceError::TokenInvalid)?;

        let kind = match token.kind() {
            Some(k @ (TokenKind::Reset | TokenKind::InitialPassword)) => k,
            _ => return Err(ServiceError::TokenInvalid),
        };

        let owner = self
            .store
            .find_account_by_id(token.account_id)
            .await?
            .ok_or(ServiceError::TokenInvalid)?;

        let target = self
            .store
            .find_account_by_username(&normalize_username(target_username))
            .await?
            .ok_or(ServiceError::NotFound)?;

        if target.account_id == owner.account_id {
            return Ok(token.token);
        }

        let emails_match = match (&owner.email, &target.email) {
            (Some(a), Some(b)) => normalize_email(a) == normalize_email(b),
            _ => false,
        };
        if !emails_match {
            return Err(ServiceError::EmailMismatch);
        }

        let fresh = self.tokens.issue(&target, kind).await?;
        self.tokens.consume(token_value).await?;

        tracing::info!(
            from = %owner.account_id,
            to = %target.account_id,
            "Reset token moved to selected account"
        );

        Ok(fresh.token)
    }

    /// Start email verification for an account.
    ///
    /// The confirmation link carries base64(`username-token`) so the
    /// confirm endpoint needs no separate username parameter; the live
    /// token value is kept on the account row for the username-keyed
    /// lookup.
    pub async fn request_email_verification(
        &self,
        username: &str,
        email: &str,
        url_base: &str,
    ) -> Result<String, ServiceError> {
        let mut account = self
            .store
            .find_account_by_username(&normalize_username(username))
            .await?
            .ok_or(ServiceError::NotFound)?;

        let email = normalize_email(email);
        if !validator::ValidateEmail::validate_email(&email.as_str()) {
            return Err(ServiceError::Validation(format!(
                "Not a valid email address: {}",
                email
            )));
        }

        let token = self.tokens.issue(&account, TokenKind::EmailVerify).await?;

        account.email = Some(email.clone());
        account.verified = false;
        account.email_verify_token = Some(token.token.clone());
        account.email_verify_expiry = Some(token.expiry_utc);
        self.store.update_account(&account).await?;

        let encoded = BASE64.encode(format!("{}-{}", account.username, token.token));
        let link = format!("{}?token={}", url_base, encoded);

        let mut params = Personalisation::new();
        params.insert(
            "firstName".to_string(),
            account.first_name_or_username().to_string(),
        );
        params.insert("verifyLink".to_string(), link.clone());
        self.email_with_retry(&self.templates.verify_email, &email, &params)
            .await?;

        Ok(link)
    }

    /// Confirm an email address from an encoded `username-token` value.
    pub async fn confirm_email(
        &self,
        encoded_token: &str,
    ) -> Result<ConfirmEmailOutcome, ServiceError> {
        let decoded = BASE64
            .decode(encoded_token)
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok())
            .ok_or(ServiceError::TokenInvalid)?;

        // Token values never contain '-', so split from the right in case
        // the username does.
        let (username, value) = decoded
            .rsplit_once('-')
            .ok_or(ServiceError::TokenInvalid)?;

        let mut account = self
            .store
            .find_account_by_username(username)
            .await?
            .ok_or(ServiceError::TokenInvalid)?;

        let Some(stored) = account.email_verify_token.clone() else {
            if account.verified {
                return Ok(ConfirmEmailOutcome::AlreadyVerified);
            }
            return Err(ServiceError::TokenInvalid);
        };

        if stored != value {
            return Err(ServiceError::TokenMismatch);
        }

        let expired = account
            .email_verify_expiry
            .map(|expiry| Utc::now() >= expiry)
            .unwrap_or(true);
        if expired {
            return Err(ServiceError::TokenExpired);
        }

        account.verified = true;
        account.email_verify_token = None;
        account.email_verify_expiry = None;
        self.store.update_account(&account).await?;
        self.tokens.consume(&stored).await?;

        if let Some(email) = &account.email {
            let mut contact = self
                .store
                .find_contact(account.account_id, ContactType::Email)
                .await?
                .unwrap_or_else(|| {
                    ContactMethod::new(account.account_id, ContactType::Email, email.clone())
                });
            contact.value = email.clone();
            contact.verified = true;
            self.store.upsert_contact(&contact).await?;
        }

        tracing::info!(account_id = %account.account_id, "Email verified");
        Ok(ConfirmEmailOutcome::Success)
    }

    /// Start mobile verification: store the (unverified) number and send a
    /// short code over SMS.
    pub async fn request_mobile_verification(
        &self,
        username: &str,
        mobile: &str,
    ) -> Result<String, ServiceError> {
        let account = self
            .store
            .find_account_by_username(&normalize_username(username))
            .await?
            .ok_or(ServiceError::NotFound)?;

        let mobile = strip_whitespace(mobile);
        if !is_valid_uk_mobile(&mobile) {
            return Err(ServiceError::Validation(format!(
                "Not a valid UK mobile number: {}",
                mobile
            )));
        }

        let token = self.tokens.issue(&account, TokenKind::MobileVerify).await?;

        let mut contact = self
            .store
            .find_contact(account.account_id, ContactType::Mobile)
            .await?
            .unwrap_or_else(|| {
                ContactMethod::new(account.account_id, ContactType::Mobile, mobile.clone())
            });
        contact.value = mobile.clone();
        contact.verified = false;
        self.store.upsert_contact(&contact).await?;

        let mut params = Personalisation::new();
        params.insert("verifyCode".to_string(), token.token.clone());
        self.sms_with_retry(&self.templates.verify_mobile, &mobile, &params)
            .await?;

        Ok(token.token)
    }

    /// Confirm a mobile number from its SMS code. An expired code is
    /// replaced with a fresh one returned to the caller; the number stays
    /// unverified until the fresh code is confirmed.
    pub async fn confirm_mobile(
        &self,
        code: &str,
    ) -> Result<ConfirmMobileOutcome, ServiceError> {
        let token = self
            .tokens
            .find(TokenKind::MobileVerify, code)
            .await?
            .ok_or(ServiceError::TokenInvalid)?;

        let account = self
            .store
            .find_account_by_id(token.account_id)
            .await?
            .ok_or(ServiceError::TokenInvalid)?;

        if token.is_expired() {
            let fresh = self.tokens.issue(&account, TokenKind::MobileVerify).await?;
            tracing::info!(account_id = %account.account_id, "Expired mobile code replaced");
            return Ok(ConfirmMobileOutcome::Expired {
                verify_code: fresh.token,
            });
        }

        if let Some(mut contact) = self
            .store
            .find_contact(account.account_id, ContactType::Mobile)
            .await?
        {
            contact.verified = true;
            self.store.upsert_contact(&contact).await?;
        }
        self.tokens.consume(code).await?;

        tracing::info!(account_id = %account.account_id, "Mobile verified");
        Ok(ConfirmMobileOutcome::Verified)
    }

    /// Free-text account search for support tooling: email, username, or
    /// name in either order.
    pub async fn search_accounts(&self, query: &str) -> Result<Vec<Account>, ServiceError> {
        self.resolver.search(query).await
    }

    async fn send_unavailable(&self, account: &Account) -> Result<(), ServiceError> {
        let Some(email) = &account.email else {
            tracing::info!(
                username = %account.username,
                "Reset unavailable and no email on record; swallowing"
            );
            return Ok(());
        };

        let mut params = Personalisation::new();
        params.insert(
            "firstName".to_string(),
            account.first_name_or_username().to_string(),
        );
        self.email_with_retry(&self.templates.reset_unavailable, email, &params)
            .await
    }

    /// Send an email, retrying exactly once on a retryable (5xx/timeout)
    /// failure.
    async fn email_with_retry(
        &self,
        template: &str,
        to: &str,
        params: &Personalisation,
    ) -> Result<(), ServiceError> {
        match self.notifier.send_email(template, to, params).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_retryable() => {
                tracing::warn!(error = %e, template_id = %template, "Email delivery failed; retrying once");
                self.notifier
                    .send_email(template, to, params)
                    .await
                    .map_err(ServiceError::Delivery)
            }
            Err(e) => Err(ServiceError::Delivery(e)),
        }
    }

    async fn sms_with_retry(
        &self,
        template: &str,
        to: &str,
        params: &Personalisation,
    ) -> Result<(), ServiceError> {
        match self.notifier.send_sms(template, to, params).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_retryable() => {
                tracing::warn!(error = %e, template_id = %template, "SMS delivery failed; retrying once");
                self.notifier
                    .send_sms(template, to, params)
                    .await
                    .map_err(ServiceError::Delivery)
            }
            Err(e) => Err(ServiceError::Delivery(e)),
        }
    }
}

fn validate_password(account: &Account, new_password: &str) -> Result<(), ServiceError> {
    if new_password.len() < 8 {
        return Err(ServiceError::Validation(
            "Password must be at least 8 characters".to_string(),
        ));
    }
    if new_password.eq_ignore_ascii_case(&account.username) {
        return Err(ServiceError::Validation(
            "Password must not be the username".to_string(),
        ));
    }
    Ok(())
}
