//! Account model - federated user accounts and their contact methods.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Authoritative source of an account.
///
/// Identity truth lives wherever the account was created; rows tagged with
/// an external source are shadow copies kept for local lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AuthSource {
    Local,
    Directory,
    Hr,
}

impl AuthSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthSource::Local => "local",
            AuthSource::Directory => "directory",
            AuthSource::Hr => "hr",
        }
    }

    pub fn from_code(code: &str) -> Self {
        match code {
            "directory" => AuthSource::Directory,
            "hr" => AuthSource::Hr,
            _ => AuthSource::Local,
        }
    }

    pub fn is_external(&self) -> bool {
        !matches!(self, AuthSource::Local)
    }
}

/// Second-factor preference codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MfaPreference {
    Unverified,
    Email,
    Text,
}

impl MfaPreference {
    pub fn as_str(&self) -> &'static str {
        match self {
            MfaPreference::Unverified => "unverified",
            MfaPreference::Email => "email",
            MfaPreference::Text => "text",
        }
    }
}

/// Account entity.
///
/// The email-verification token lives on the account row (not in the shared
/// token table) because confirmation is looked up by username, not by token
/// value.
#[derive(Debug, Clone, FromRow)]
pub struct Account {
    pub account_id: Uuid,
    pub username: String,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub verified: bool,
    pub locked: bool,
    pub enabled: bool,
    pub source_code: String,
    pub password_hash: Option<String>,
    pub password_expiry: Option<DateTime<Utc>>,
    pub last_login: Option<DateTime<Utc>>,
    pub mfa_preference_code: String,
    pub email_verify_token: Option<String>,
    pub email_verify_expiry: Option<DateTime<Utc>>,
    #[sqlx(rename = "role_codes")]
    pub roles: Vec<String>,
    #[sqlx(rename = "group_codes")]
    pub groups: Vec<String>,
    pub created_utc: DateTime<Utc>,
}

impl Account {
    /// Create a new locally-authoritative account.
    pub fn new_local(username: String, email: Option<String>) -> Self {
        Self::new(username, email, AuthSource::Local)
    }

    /// Create a shadow row for an account whose authority is external.
    pub fn new_shadow(username: String, email: Option<String>, source: AuthSource) -> Self {
        debug_assert!(source.is_external());
        let mut account = Self::new(username, email.clone(), source);
        // Directory-sourced email addresses arrive pre-verified.
        account.verified = email.is_some();
        account
    }

    fn new(username: String, email: Option<String>, source: AuthSource) -> Self {
        Self {
            account_id: Uuid::new_v4(),
            username,
            email,
            first_name: None,
            last_name: None,
            verified: false,
            locked: false,
            enabled: true,
            source_code: source.as_str().to_string(),
            password_hash: None,
            password_expiry: None,
            last_login: None,
            mfa_preference_code: MfaPreference::Unverified.as_str().to_string(),
            email_verify_token: None,
            email_verify_expiry: None,
            roles: Vec::new(),
            groups: Vec::new(),
            created_utc: Utc::now(),
        }
    }

    pub fn source(&self) -> AuthSource {
        AuthSource::from_code(&self.source_code)
    }

    /// Display name used in notification templates, best first name we have.
    pub fn first_name_or_username(&self) -> &str {
        self.first_name.as_deref().unwrap_or(&self.username)
    }
}

/// Contact method type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactType {
    Email,
    Mobile,
}

impl ContactType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContactType::Email => "email",
            ContactType::Mobile => "mobile",
        }
    }
}

/// A typed contact method owned by an account.
#[derive(Debug, Clone, FromRow)]
pub struct ContactMethod {
    pub contact_id: Uuid,
    pub account_id: Uuid,
    pub type_code: String,
    pub value: String,
    pub verified: bool,
}

impl ContactMethod {
    pub fn new(account_id: Uuid, contact_type: ContactType, value: String) -> Self {
        Self {
            contact_id: Uuid::new_v4(),
            account_id,
            type_code: contact_type.as_str().to_string(),
            value,
            verified: false,
        }
    }
}
