//! Backend server configuration

use reqwest::Url;
use secrecy::Secret;
use serde::Deserialize;

use super::error::ValidationError;

/// Where the POS backend lives and how to authenticate against it.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Base URL of the backend (scheme, host, port)
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Session cookie sent with every request (`session=...`)
    #[serde(default)]
    pub session_cookie: Option<Secret<String>>,
}

impl ServerConfig {
    /// Parsed base URL.
    pub fn url(&self) -> Result<Url, ValidationError> {
        let url = Url::parse(&self.base_url)
            .map_err(|e| ValidationError::InvalidBaseUrl(e.to_string()))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(ValidationError::UnsupportedScheme(other.to_string())),
        }
    }

    /// Validate server configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.url().map(|_| ())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            session_cookie: None,
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:5000".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.base_url, "http://localhost:5000");
        assert!(config.session_cookie.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_non_http_scheme() {
        let config = ServerConfig {
            base_url: "ftp://pos.local".to_string(),
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ValidationError::UnsupportedScheme("ftp".to_string()))
        );
    }

    #[test]
    fn test_rejects_garbage_url() {
        let config = ServerConfig {
            base_url: "not a url".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidBaseUrl(_))
        ));
    }

    #[test]
    fn test_session_cookie_is_redacted_in_debug() {
        let config = ServerConfig {
            session_cookie: Some(Secret::new("session=abc123".to_string())),
            ..Default::default()
        };
        let debug = format!("{:?}", config);
        assert!(!debug.contains("abc123"));
    }
}
