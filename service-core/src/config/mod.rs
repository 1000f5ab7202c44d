//! Base configuration shared by every service in the workspace.
//!
//! Services flatten [`Config`] into their own config struct and layer
//! service-specific environment variables on top. Values come from an
//! optional `configuration` file and `APP__`-prefixed environment
//! variables, the latter winning.

use crate::error::AppError;
use config::{Config as Cfg, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// TCP port the HTTP listener binds to.
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    8080
}

impl Config {
    /// Loads `.env` (if present), then the configuration file and
    /// `APP__*` environment overrides.
    pub fn load() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let config = Cfg::builder()
            .add_source(File::with_name("configuration").required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        Ok(config.try_deserialize()?)
    }
}
