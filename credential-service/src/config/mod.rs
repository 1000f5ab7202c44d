use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone, Deserialize)]
pub struct CredentialConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub database: DatabaseConfig,
    pub notify: NotifyConfig,
    pub directory: DirectoryConfig,
    pub hr: DirectoryConfig,
    pub lifecycle: LifecycleConfig,
    pub reset_url_base: String,
    pub verify_url_base: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Prod,
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            other => Err(format!("Unknown environment: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Notification provider connection and template ids.
#[derive(Debug, Clone, Deserialize)]
pub struct NotifyConfig {
    pub endpoint: String,
    pub api_key: String,
    pub timeout_seconds: u64,
    pub templates: NotifyTemplates,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotifyTemplates {
    pub reset_confirm: String,
    pub reset_select: String,
    pub reset_unavailable: String,
    pub reset_no_account: String,
    pub initial_password: String,
    pub password_changed: String,
    pub verify_email: String,
    pub verify_mobile: String,
}

/// One external directory's read API.
#[derive(Debug, Clone, Deserialize)]
pub struct DirectoryConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LifecycleConfig {
    /// Days without a login before an enabled account is disabled.
    pub inactivity_threshold_days: i64,
    /// Seconds between sweep invocations.
    pub sweep_interval_seconds: u64,
}

impl CredentialConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;

        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;

        let config = CredentialConfig {
            common: common_config,
            environment,
            service_name: get_env("SERVICE_NAME", Some("credential-service"), is_prod)?,
            service_version: get_env("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")), is_prod)?,
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok(),
            database: DatabaseConfig {
                url: get_env("DATABASE_URL", None, is_prod)?,
                max_connections: parse_env("DATABASE_MAX_CONNECTIONS", "10", is_prod)?,
            },
            notify: NotifyConfig {
                endpoint: get_env("NOTIFY_ENDPOINT", None, is_prod)?,
                api_key: get_env("NOTIFY_API_KEY", None, is_prod)?,
                timeout_seconds: parse_env("NOTIFY_TIMEOUT_SECONDS", "10", is_prod)?,
                templates: NotifyTemplates {
                    reset_confirm: get_env(
                        "NOTIFY_TEMPLATE_RESET_CONFIRM",
                        Some("reset-confirm"),
                        is_prod,
                    )?,
                    reset_select: get_env(
                        "NOTIFY_TEMPLATE_RESET_SELECT",
                        Some("reset-select"),
                        is_prod,
                    )?,
                    reset_unavailable: get_env(
                        "NOTIFY_TEMPLATE_RESET_UNAVAILABLE",
                        Some("reset-unavailable"),
                        is_prod,
                    )?,
                    reset_no_account: get_env(
                        "NOTIFY_TEMPLATE_RESET_NO_ACCOUNT",
                        Some("reset-no-account"),
                        is_prod,
                    )?,
                    initial_password: get_env(
                        "NOTIFY_TEMPLATE_INITIAL_PASSWORD",
                        Some("initial-password"),
                        is_prod,
                    )?,
                    password_changed: get_env(
                        "NOTIFY_TEMPLATE_PASSWORD_CHANGED",
                        Some("password-changed"),
                        is_prod,
                    )?,
                    verify_email: get_env(
                        "NOTIFY_TEMPLATE_VERIFY_EMAIL",
                        Some("verify-email"),
                        is_prod,
                    )?,
                    verify_mobile: get_env(
                        "NOTIFY_TEMPLATE_VERIFY_MOBILE",
                        Some("verify-mobile"),
                        is_prod,
                    )?,
                },
            },
            directory: DirectoryConfig {
                endpoint: get_env("DIRECTORY_ENDPOINT", None, is_prod)?,
                api_key: env::var("DIRECTORY_API_KEY").ok(),
                timeout_seconds: parse_env("DIRECTORY_TIMEOUT_SECONDS", "5", is_prod)?,
            },
            hr: DirectoryConfig {
                endpoint: get_env("HR_ENDPOINT", None, is_prod)?,
                api_key: env::var("HR_API_KEY").ok(),
                timeout_seconds: parse_env("HR_TIMEOUT_SECONDS", "5", is_prod)?,
            },
            lifecycle: LifecycleConfig {
                inactivity_threshold_days: parse_env("INACTIVITY_THRESHOLD_DAYS", "90", is_prod)?,
                sweep_interval_seconds: parse_env("SWEEP_INTERVAL_SECONDS", "3600", is_prod)?,
            },
            reset_url_base: get_env("RESET_URL_BASE", None, is_prod)?,
            verify_url_base: get_env("VERIFY_URL_BASE", None, is_prod)?,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.common.port == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PORT must be greater than 0"
            )));
        }

        if self.lifecycle.inactivity_threshold_days <= 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "INACTIVITY_THRESHOLD_DAYS must be positive"
            )));
        }

        if self.lifecycle.sweep_interval_seconds == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "SWEEP_INTERVAL_SECONDS must be positive"
            )));
        }

        Ok(())
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required in production but not set",
                    key
                ))))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required but not set",
                    key
                ))))
            }
        }
    }
}

fn parse_env<T: FromStr>(key: &str, default: &str, is_prod: bool) -> Result<T, AppError>
where
    T::Err: std::fmt::Display,
{
    get_env(key, Some(default), is_prod)?
        .parse()
        .map_err(|e: T::Err| AppError::ConfigError(anyhow::anyhow!("{}: {}", key, e)))
}
