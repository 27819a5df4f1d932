//! HTTP polling client - `PollTransport` over `reqwest`.
//!
//! Calls `GET {base}/api/notificaciones/polling/{role}` with the session
//! cookie and decodes `{ "eventos": [...] }`.
//!
//! # Configuration
//!
//! ```ignore
//! let transport = HttpPollTransport::new(base_url, Duration::from_secs(30))?
//!     .with_session_cookie(Secret::new("session=...".to_string()));
//! ```

use async_trait::async_trait;
use reqwest::header::{ACCEPT, COOKIE};
use reqwest::{Client, StatusCode, Url};
use secrecy::{ExposeSecret, Secret};
use std::time::Duration;

use crate::ports::{PollError, PollResponse, PollTransport};

/// Path segments of the polling endpoint, before the role.
const POLLING_PATH: [&str; 3] = ["api", "notificaciones", "polling"];

/// `reqwest` implementation of [`PollTransport`].
pub struct HttpPollTransport {
    client: Client,
    base_url: Url,
    session_cookie: Option<Secret<String>>,
}

impl HttpPollTransport {
    /// Creates a transport whose requests time out after `timeout`.
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self, PollError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PollError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            session_cookie: None,
        })
    }

    /// Sets the session cookie (`name=value`) sent with each poll.
    pub fn with_session_cookie(mut self, cookie: Secret<String>) -> Self {
        self.session_cookie = Some(cookie);
        self
    }

    /// Builds the polling URL for `role`. The role is percent-encoded.
    pub fn polling_url(&self, role: &str) -> Result<Url, PollError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| PollError::Network(format!("cannot use {} as base", self.base_url)))?
            .pop_if_empty()
            .extend(POLLING_PATH)
            .push(role);
        Ok(url)
    }
}

#[async_trait]
impl PollTransport for HttpPollTransport {
    async fn poll(&self, role: &str) -> Result<PollResponse, PollError> {
        let url = self.polling_url(role)?;
        tracing::trace!(%url, "Polling for notifications");

        let mut request = self.client.get(url).header(ACCEPT, "application/json");
        if let Some(cookie) = &self.session_cookie {
            request = request.header(COOKIE, cookie.expose_secret().as_str());
        }

        let response = request.send().await.map_err(map_request_error)?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(PollError::Unauthorized);
        }
        if !status.is_success() {
            return Err(PollError::Status(status.as_u16()));
        }

        response
            .json::<PollResponse>()
            .await
            .map_err(|e| PollError::Decode(e.to_string()))
    }
}

fn map_request_error(error: reqwest::Error) -> PollError {
    if error.is_timeout() {
        PollError::Timeout
    } else {
        PollError::Network(error.to_string())
    }
}
