//! Authentication strategies
//!
//! Each service role attaches credentials differently: the Arr services and
//! the request manager use a static `X-Api-Key` header, the media server a
//! `MediaBrowser` token header, and the torrent client a session cookie
//! obtained through a form-style login call and cached for the run.

use async_trait::async_trait;
use reqwest::RequestBuilder;
use reqwest::header::AUTHORIZATION;
use tracing::info;

use crate::{Result, TransportError};

/// Capability to attach credentials to an outgoing request, performing a
/// login handshake first where the service requires one
#[async_trait]
pub trait AuthStrategy: Send + Sync {
    /// Whether a login handshake must run before the first request
    fn requires_login(&self) -> bool {
        false
    }

    /// Perform the login handshake. Session state (cookies) lands in the
    /// shared HTTP client's store.
    async fn login(&self, _http: &reqwest::Client, _base_url: &str) -> Result<()> {
        Ok(())
    }

    /// Attach credentials to an outgoing request
    fn decorate(&self, req: RequestBuilder) -> RequestBuilder;
}

/// Static `X-Api-Key` header (Sonarr, Radarr, Prowlarr, Jellyseerr)
#[derive(Debug, Clone)]
pub struct ApiKeyAuth {
    key: String,
}

impl ApiKeyAuth {
    /// Create an API-key strategy
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

impl AuthStrategy for ApiKeyAuth {
    fn decorate(&self, req: RequestBuilder) -> RequestBuilder {
        req.header("X-Api-Key", &self.key)
    }
}

/// `Authorization: MediaBrowser Token="…"` header (Jellyfin)
#[derive(Debug, Clone)]
pub struct MediaBrowserAuth {
    token: String,
}

impl MediaBrowserAuth {
    /// Create a MediaBrowser token strategy
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl AuthStrategy for MediaBrowserAuth {
    fn decorate(&self, req: RequestBuilder) -> RequestBuilder {
        req.header(
            AUTHORIZATION,
            format!("MediaBrowser Token=\"{}\"", self.token),
        )
    }
}

/// Form-style login producing a session cookie (qBittorrent).
///
/// Authenticates via `POST /api/v2/auth/login`; the SID cookie is kept in the
/// client's cookie store and reused for the rest of the run.
#[derive(Debug, Clone)]
pub struct FormLoginAuth {
    username: String,
    password: String,
}

impl FormLoginAuth {
    /// Create a form-login strategy
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

#[async_trait]
impl AuthStrategy for FormLoginAuth {
    fn requires_login(&self) -> bool {
        true
    }

    async fn login(&self, http: &reqwest::Client, base_url: &str) -> Result<()> {
        let url = format!("{}/api/v2/auth/login", base_url);
        let response = http
            .post(&url)
            .form(&[
                ("username", self.username.as_str()),
                ("password", self.password.as_str()),
            ])
            .send()
            .await
            .map_err(crate::client::classify_reqwest)?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        // Failure statuses keep their usual classes so a transient 5xx
        // stays retryable; only a rejected handshake is an auth error
        if !status.is_success() {
            return Err(crate::client::classify_status(status, body));
        }
        // The endpoint answers 200 with a plain-text verdict
        if body.trim() != "Ok." {
            return Err(TransportError::Auth(format!("login rejected: {}", body)));
        }

        info!("session login succeeded for {}", base_url);
        Ok(())
    }

    fn decorate(&self, req: RequestBuilder) -> RequestBuilder {
        // The session cookie carries the credentials after login
        req
    }
}
