//! # Servarr Transport
//!
//! HTTP transport shared by all service reconcilers.
//!
//! Provides a [`ServiceClient`] wrapping a generic HTTP call with:
//! - per-service authentication strategies ([`auth::AuthStrategy`]),
//! - bounded retry with exponential backoff on server-side and
//!   connection-level failures,
//! - a dry-run gate that logs mutating calls instead of sending them.
//!
//! Reads (GET) are always executed, even under dry-run.

#![warn(missing_docs)]

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub mod auth;
mod client;

pub use auth::{ApiKeyAuth, AuthStrategy, FormLoginAuth, MediaBrowserAuth};
pub use client::{RetryPolicy, ServiceClient};

/// Transport error, the only error type this crate raises
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection-level failure (refused, DNS, broken transport)
    #[error("connection failed: {0}")]
    Connection(String),

    /// The request timed out
    #[error("request timed out: {0}")]
    Timeout(String),

    /// Server-side error response (5xx)
    #[error("server error {status}: {message}")]
    Server {
        /// HTTP status code
        status: u16,
        /// Last observed response body or status text
        message: String,
    },

    /// Client-side error response (4xx other than auth failures)
    #[error("client error {status}: {message}")]
    Client {
        /// HTTP status code
        status: u16,
        /// Last observed response body or status text
        message: String,
    },

    /// Authentication or authorization failure
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The response body could not be decoded
    #[error("invalid response body: {0}")]
    Body(String),
}

impl TransportError {
    /// The failure class of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            TransportError::Connection(_) => ErrorKind::Connection,
            TransportError::Timeout(_) => ErrorKind::Timeout,
            TransportError::Server { .. } => ErrorKind::Server,
            TransportError::Client { .. } | TransportError::Body(_) => ErrorKind::Client,
            TransportError::Auth(_) => ErrorKind::Auth,
        }
    }

    /// Whether another attempt could plausibly succeed.
    ///
    /// Server errors and connection-level failures are transient; client
    /// errors indicate a request or auth problem that will not self-resolve,
    /// with the exception of throttling (429).
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::Connection(_)
            | TransportError::Timeout(_)
            | TransportError::Server { .. } => true,
            TransportError::Client { status, .. } => *status == 429,
            TransportError::Auth(_) | TransportError::Body(_) => false,
        }
    }
}

/// Failure class of a [`TransportError`], kept as a structured diagnostic in
/// step results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Connection-level failure
    Connection,
    /// Timeout
    Timeout,
    /// Server-side error response
    Server,
    /// Client-side error response
    Client,
    /// Authentication failure
    Auth,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Connection => "Connection",
            ErrorKind::Timeout => "Timeout",
            ErrorKind::Server => "Server",
            ErrorKind::Client => "Client",
            ErrorKind::Auth => "Auth",
        };
        f.write_str(name)
    }
}

/// Result type for transport operations
pub type Result<T> = std::result::Result<T, TransportError>;
