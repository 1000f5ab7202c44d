//! Read-only adapters to the external systems of record.
//!
//! Each directory exposes a find-by-username lookup and a reset-eligibility
//! predicate. Adapters never mutate the external system.

use std::time::Duration;

use service_core::async_trait::async_trait;
use service_core::error::AppError;

use crate::config::DirectoryConfig;
use crate::models::{AuthSource, ExternalAccount};

/// Capability interface over one system of record.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// The source tag written onto shadow accounts materialized from this
    /// provider.
    fn source(&self) -> AuthSource;

    async fn find_by_username(
        &self,
        username: &str,
    ) -> Result<Option<ExternalAccount>, AppError>;

    /// Authoritative reset-eligibility check. Absent accounts are not
    /// eligible.
    async fn is_reset_eligible(&self, username: &str) -> Result<bool, AppError> {
        Ok(self
            .find_by_username(username)
            .await?
            .is_some_and(|a| a.reset_allowed()))
    }
}

/// HTTP client for one external directory's read API.
#[derive(Clone)]
pub struct DirectoryClient {
    http: reqwest::Client,
    base_url: String,
    source: AuthSource,
}

impl DirectoryClient {
    pub fn new(source: AuthSource, config: &DirectoryConfig) -> Result<Self, AppError> {
        let mut headers = reqwest::header::HeaderMap::new();
        if let Some(api_key) = &config.api_key {
            let mut value = reqwest::header::HeaderValue::from_str(api_key)
                .map_err(|e| AppError::ConfigError(anyhow::anyhow!(e)))?;
            value.set_sensitive(true);
            headers.insert(reqwest::header::AUTHORIZATION, value);
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .default_headers(headers)
            .build()
            .map_err(|e| AppError::ConfigError(anyhow::anyhow!(e)))?;

        Ok(Self {
            http,
            base_url: config.endpoint.trim_end_matches('/').to_string(),
            source,
        })
    }
}

#[async_trait]
impl IdentityProvider for DirectoryClient {
    fn source(&self) -> AuthSource {
        self.source
    }

    async fn find_by_username(
        &self,
        username: &str,
    ) -> Result<Option<ExternalAccount>, AppError> {
        let url = format!("{}/users/{}", self.base_url, username);

        let response = self.http.get(&url).send().await.map_err(|e| {
            tracing::error!(error = %e, source = %self.source.as_str(), "Directory lookup failed");
            AppError::BadGateway(format!("{} directory unavailable: {}", self.source.as_str(), e))
        })?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let response = response.error_for_status().map_err(|e| {
            AppError::BadGateway(format!("{} directory error: {}", self.source.as_str(), e))
        })?;

        let account = response.json::<ExternalAccount>().await.map_err(|e| {
            AppError::BadGateway(format!(
                "{} directory returned malformed account: {}",
                self.source.as_str(),
                e
            ))
        })?;

        Ok(Some(account))
    }
}

/// In-memory directory used by tests.
pub struct MockDirectory {
    source: AuthSource,
    accounts: dashmap::DashMap<String, ExternalAccount>,
}

impl MockDirectory {
    pub fn new(source: AuthSource) -> Self {
        Self {
            source,
            accounts: dashmap::DashMap::new(),
        }
    }

    pub fn add(&self, account: ExternalAccount) {
        self.accounts.insert(account.username.clone(), account);
    }
}

#[async_trait]
impl IdentityProvider for MockDirectory {
    fn source(&self) -> AuthSource {
        self.source
    }

    async fn find_by_username(
        &self,
        username: &str,
    ) -> Result<Option<ExternalAccount>, AppError> {
        Ok(self.accounts.get(username).map(|a| a.clone()))
    }
}
