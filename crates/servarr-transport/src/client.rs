//! Generic HTTP call with retry, backoff, and dry-run gating

use reqwest::{Method, Response, StatusCode};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::{AuthStrategy, Result, TransportError};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Retry budget for a single logical call
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on each further attempt
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after the given failed attempt (1-based)
    fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

/// HTTP client bound to one service instance.
///
/// Reads always hit the network; mutating verbs are short-circuited to a
/// synthetic success under dry-run. No retry state survives past a single
/// logical call.
pub struct ServiceClient {
    http: reqwest::Client,
    base_url: String,
    auth: Box<dyn AuthStrategy>,
    dry_run: bool,
    retry: RetryPolicy,
    logged_in: AtomicBool,
}

/// Request payload, kept borrowed so a request can be rebuilt per attempt
enum Payload<'a> {
    Empty,
    Json(&'a Value),
    Form(&'a [(&'a str, String)]),
    QueryJson {
        query: &'a [(&'a str, String)],
        body: &'a Value,
    },
}

impl ServiceClient {
    /// Create a client for the service at `base_url` using the given
    /// authentication strategy
    pub fn new(base_url: impl Into<String>, auth: Box<dyn AuthStrategy>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| TransportError::Connection(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth,
            dry_run: false,
            retry: RetryPolicy::default(),
            logged_in: AtomicBool::new(false),
        })
    }

    /// Enable or disable the dry-run gate
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Override the retry policy
    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The retry policy in effect
    pub fn retry(&self) -> RetryPolicy {
        self.retry
    }

    /// Whether the dry-run gate is active
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Perform the authentication handshake now, if the strategy needs one.
    /// A no-op for header-based strategies and for already-established
    /// sessions.
    pub async fn login(&self) -> Result<()> {
        self.ensure_login().await
    }

    /// GET a path and decode the response body
    pub async fn get(&self, path: &str) -> Result<Value> {
        self.ensure_login().await?;
        let response = self.send(Method::GET, path, &Payload::Empty).await?;
        decode_body(response).await
    }

    /// POST a JSON body. Returns `None` when gated by dry-run.
    pub async fn post_json(&self, path: &str, body: &Value) -> Result<Option<Value>> {
        self.mutate(Method::POST, path, Payload::Json(body)).await
    }

    /// PUT a JSON body. Returns `None` when gated by dry-run.
    pub async fn put_json(&self, path: &str, body: &Value) -> Result<Option<Value>> {
        self.mutate(Method::PUT, path, Payload::Json(body)).await
    }

    /// POST url-encoded form fields. Returns `None` when gated by dry-run.
    pub async fn post_form(&self, path: &str, form: &[(&str, String)]) -> Result<Option<Value>> {
        self.mutate(Method::POST, path, Payload::Form(form)).await
    }

    /// POST a JSON body with query parameters. Returns `None` when gated by
    /// dry-run.
    pub async fn post_query_json(
        &self,
        path: &str,
        query: &[(&str, String)],
        body: &Value,
    ) -> Result<Option<Value>> {
        self.mutate(Method::POST, path, Payload::QueryJson { query, body })
            .await
    }

    /// POST with an empty body. Returns `None` when gated by dry-run.
    pub async fn post_empty(&self, path: &str) -> Result<Option<Value>> {
        self.mutate(Method::POST, path, Payload::Empty).await
    }

    /// DELETE a path. Returns `None` when gated by dry-run.
    pub async fn delete(&self, path: &str) -> Result<Option<Value>> {
        self.mutate(Method::DELETE, path, Payload::Empty).await
    }

    async fn mutate(
        &self,
        method: Method,
        path: &str,
        payload: Payload<'_>,
    ) -> Result<Option<Value>> {
        if self.dry_run {
            info!("[DRY-RUN] would {} {}", method, self.url(path));
            return Ok(None);
        }
        self.ensure_login().await?;
        let response = self.send(method, path, &payload).await?;
        Ok(Some(decode_body(response).await?))
    }

    /// Run the login handshake under the same retry budget as a request;
    /// a transient failure here must not end the run any earlier than one
    /// on a regular call would
    async fn ensure_login(&self) -> Result<()> {
        if !self.auth.requires_login() || self.logged_in.load(Ordering::Acquire) {
            return Ok(());
        }

        let mut attempt = 1u32;
        loop {
            let error = match self.auth.login(&self.http, &self.base_url).await {
                Ok(()) => {
                    self.logged_in.store(true, Ordering::Release);
                    return Ok(());
                }
                Err(e) => e,
            };

            if !error.is_retryable() || attempt >= self.retry.max_attempts {
                return Err(error);
            }

            let delay = self.retry.delay_after(attempt);
            warn!(
                "login attempt {}/{} failed for {}: {} (retrying in {:?})",
                attempt, self.retry.max_attempts, self.base_url, error, delay
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Execute one logical call, retrying transient failures with doubling
    /// backoff up to the policy's attempt budget
    async fn send(&self, method: Method, path: &str, payload: &Payload<'_>) -> Result<Response> {
        let url = self.url(path);
        let mut attempt = 1u32;

        loop {
            let mut request = self.http.request(method.clone(), &url);
            request = self.auth.decorate(request);
            request = match payload {
                Payload::Empty => request,
                Payload::Json(body) => request.json(body),
                Payload::Form(fields) => request.form(fields),
                Payload::QueryJson { query, body } => request.query(query).json(body),
            };

            let error = match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        debug!("{} {} -> {}", method, url, status);
                        return Ok(response);
                    }
                    let message = response.text().await.unwrap_or_default();
                    classify_status(status, message)
                }
                Err(e) => classify_reqwest(e),
            };

            if !error.is_retryable() || attempt >= self.retry.max_attempts {
                return Err(error);
            }

            let delay = self.retry.delay_after(attempt);
            warn!(
                "attempt {}/{} failed for {} {}: {} (retrying in {:?})",
                attempt, self.retry.max_attempts, method, url, error, delay
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

async fn decode_body(response: Response) -> Result<Value> {
    let is_json = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"));

    let text = response
        .text()
        .await
        .map_err(|e| TransportError::Body(e.to_string()))?;

    if text.is_empty() {
        return Ok(Value::Null);
    }
    if is_json {
        serde_json::from_str(&text).map_err(|e| TransportError::Body(e.to_string()))
    } else {
        Ok(Value::String(text))
    }
}

pub(crate) fn classify_status(status: StatusCode, message: String) -> TransportError {
    let message = if message.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("unknown status")
            .to_string()
    } else {
        message
    };

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => TransportError::Auth(message),
        s if s.is_server_error() => TransportError::Server {
            status: s.as_u16(),
            message,
        },
        s => TransportError::Client {
            status: s.as_u16(),
            message,
        },
    }
}

pub(crate) fn classify_reqwest(error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout(error.to_string())
    } else {
        TransportError::Connection(error.to_string())
    }
}
