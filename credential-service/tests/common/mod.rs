//! Test helper module for credential-service integration tests.
//!
//! Builds the full service stack over in-memory collaborators so every
//! flow can run without PostgreSQL, the external directories, or the
//! notification provider.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Utc};
use credential_service::config::{
    CredentialConfig, DatabaseConfig, DirectoryConfig, Environment, LifecycleConfig,
    NotifyConfig, NotifyTemplates,
};
use credential_service::models::{Account, AuthSource, ExternalAccount};
use credential_service::providers::{IdentityProvider, MockDirectory};
use credential_service::services::{
    CredentialService, IdentityResolver, MockNotifier, TokenManager,
};
use credential_service::store::{IdentityStore, MemoryStore};
use credential_service::{build_router, AppState};

pub const RESET_URL_BASE: &str = "https://auth.example.gov.uk/reset";
pub const VERIFY_URL_BASE: &str = "https://auth.example.gov.uk/verify-email";

/// The assembled service with handles onto its test doubles.
pub struct TestApp {
    pub store: Arc<MemoryStore>,
    pub notifier: Arc<MockNotifier>,
    pub directory: Arc<MockDirectory>,
    pub hr: Arc<MockDirectory>,
    pub tokens: TokenManager,
    pub credentials: CredentialService,
}

impl TestApp {
    pub fn new() -> Self {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("debug")
            .try_init();

        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(MockNotifier::new());
        let directory = Arc::new(MockDirectory::new(AuthSource::Directory));
        let hr = Arc::new(MockDirectory::new(AuthSource::Hr));

        let store_dyn: Arc<dyn IdentityStore> = store.clone();
        let tokens = TokenManager::new(store_dyn.clone());
        let providers: Vec<Arc<dyn IdentityProvider>> =
            vec![directory.clone(), hr.clone()];
        let resolver = IdentityResolver::new(store_dyn.clone(), providers);
        let credentials = CredentialService::new(
            store_dyn,
            tokens.clone(),
            resolver,
            notifier.clone(),
            test_templates(),
        );

        Self {
            store,
            notifier,
            directory,
            hr,
            tokens,
            credentials,
        }
    }

    /// Insert a local account; usernames are stored in canonical
    /// (uppercase) form.
    pub async fn add_local_account(&self, username: &str, email: Option<&str>) -> Account {
        let mut account =
            Account::new_local(username.to_uppercase(), email.map(str::to_string));
        account.first_name = Some("Jo".to_string());
        account.last_name = Some("Smith".to_string());
        self.store
            .insert_account(&account)
            .await
            .expect("insert account");
        account
    }

    pub async fn add_local_account_with_login(
        &self,
        username: &str,
        enabled: bool,
        last_login: DateTime<Utc>,
    ) -> Account {
        let mut account = self.add_local_account(username, None).await;
        account.enabled = enabled;
        account.last_login = Some(last_login);
        self.store
            .update_account(&account)
            .await
            .expect("update account");
        account
    }
}

impl TestApp {
    /// Wrap the assembled service in the HTTP router for request-level
    /// tests.
    pub fn into_router(self) -> service_core::axum::Router {
        let state = AppState {
            config: test_config(),
            store: self.store.clone() as Arc<dyn IdentityStore>,
            credentials: Arc::new(self.credentials),
        };
        build_router(state)
    }
}

pub fn test_config() -> CredentialConfig {
    CredentialConfig {
        common: service_core::config::Config { port: 8080 },
        environment: Environment::Dev,
        service_name: "credential-service".to_string(),
        service_version: "test".to_string(),
        log_level: "debug".to_string(),
        otlp_endpoint: None,
        database: DatabaseConfig {
            url: "postgres://localhost/credential_test".to_string(),
            max_connections: 5,
        },
        notify: NotifyConfig {
            endpoint: "http://localhost:9090".to_string(),
            api_key: "test-key".to_string(),
            timeout_seconds: 1,
            templates: test_templates(),
        },
        directory: DirectoryConfig {
            endpoint: "http://localhost:9091".to_string(),
            api_key: None,
            timeout_seconds: 1,
        },
        hr: DirectoryConfig {
            endpoint: "http://localhost:9092".to_string(),
            api_key: None,
            timeout_seconds: 1,
        },
        lifecycle: LifecycleConfig {
            inactivity_threshold_days: 90,
            sweep_interval_seconds: 3600,
        },
        reset_url_base: RESET_URL_BASE.to_string(),
        verify_url_base: VERIFY_URL_BASE.to_string(),
    }
}

pub fn test_templates() -> NotifyTemplates {
    NotifyTemplates {
        reset_confirm: "reset-confirm".to_string(),
        reset_select: "reset-select".to_string(),
        reset_unavailable: "reset-unavailable".to_string(),
        reset_no_account: "reset-no-account".to_string(),
        initial_password: "initial-password".to_string(),
        password_changed: "password-changed".to_string(),
        verify_email: "verify-email".to_string(),
        verify_mobile: "verify-mobile".to_string(),
    }
}

/// An active, unlocked directory record.
pub fn directory_staff(username: &str, email: Option<&str>) -> ExternalAccount {
    ExternalAccount {
        username: username.to_uppercase(),
        active: true,
        locked: false,
        lock_reason: None,
        first_name: Some("Jo".to_string()),
        name: Some("Jo Smith".to_string()),
        email: email.map(str::to_string),
    }
}

/// Pull the token value out of a `...?token=<value>` link.
pub fn token_from_link(link: &str) -> &str {
    link.rsplit_once("token=").expect("link carries a token").1
}
