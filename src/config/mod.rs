//! Application configuration module
//!
//! This module provides type-safe configuration loading from environment variables
//! using the `config` and `dotenvy` crates. Configuration is loaded with the
//! `COMANDA_NOTIFY` prefix and nested values use double underscores as separators.
//! An optional YAML/TOML file can be layered underneath the environment.
//!
//! # Example
//!
//! ```no_run
//! use comanda_notify::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Listening for {} events", config.client.role);
//! ```

mod client;
mod error;
mod logging;
mod realtime;
mod server;

pub use client::ClientConfig;
pub use error::{ConfigError, ValidationError};
pub use logging::LoggingConfig;
pub use realtime::RealtimeConfig;
pub use server::ServerConfig;

use serde::Deserialize;
use std::path::Path;

const ENV_PREFIX: &str = "COMANDA_NOTIFY";

/// Root application configuration
///
/// Every section has defaults, so an empty environment yields a client
/// for role `mesero` against `http://localhost:5000`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Client identity and timing
    #[serde(default)]
    pub client: ClientConfig,

    /// Backend location and session
    #[serde(default)]
    pub server: ServerConfig,

    /// Real-time channel settings
    #[serde(default)]
    pub realtime: RealtimeConfig,

    /// Log output
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `COMANDA_NOTIFY` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    /// 4. Deserializes into typed configuration structs
    ///
    /// # Environment Variable Format
    ///
    /// - `COMANDA_NOTIFY__CLIENT__ROLE=cocinero` -> `client.role = "cocinero"`
    /// - `COMANDA_NOTIFY__SERVER__BASE_URL=...` -> `server.base_url = ...`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if values cannot be parsed into expected types.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(environment())
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Load configuration from a file, with environment variables on top
    ///
    /// The format is inferred from the extension (`.yaml`, `.toml`, ...).
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(environment())
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.client.validate()?;
        self.server.validate()?;
        self.realtime.validate()?;
        Ok(())
    }
}

fn environment() -> config::Environment {
    config::Environment::default()
        .prefix(ENV_PREFIX)
        .separator("__")
}
