//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Role must not be empty")]
    EmptyRole,

    #[error("Username must not be empty")]
    EmptyUsername,

    #[error("Poll interval must be greater than zero")]
    InvalidPollInterval,

    #[error("Poll timeout must be greater than zero")]
    InvalidPollTimeout,

    #[error("Keep-alive interval must be greater than zero")]
    InvalidKeepaliveInterval,

    #[error("Invalid base URL: {0}")]
    InvalidBaseUrl(String),

    #[error("Base URL must use http or https, got '{0}'")]
    UnsupportedScheme(String),

    #[error("Reconnect delays must be positive and initial <= max")]
    InvalidReconnectDelays,
}
