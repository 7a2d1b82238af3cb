//! Client error taxonomy

use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use thiserror::Error;

use crate::models::{flatten_messages, ProblemDetails};

/// What went wrong, as a tag on [`ApiError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiErrorKind {
    /// DNS, connect, TLS or other transport failure (status 0)
    Network,
    /// The per-attempt deadline elapsed (status 0)
    Timeout,
    /// The caller cancelled the call (status 0)
    Aborted,
    /// 400
    Validation,
    /// 401
    Unauthorized,
    /// 403
    Forbidden,
    /// 404
    NotFound,
    /// Any other 4xx
    Client,
    /// 5xx outside the retryable set
    Server,
    /// 5xx inside the retryable set
    RetryableServer,
    /// A success response whose body could not be read or parsed
    Decode,
    /// Any other non-2xx status
    Other,
}

impl ApiErrorKind {
    /// Classify an HTTP failure status.
    pub fn from_status(status: u16, retryable: &[u16]) -> Self {
        match status {
            400 => ApiErrorKind::Validation,
            401 => ApiErrorKind::Unauthorized,
            403 => ApiErrorKind::Forbidden,
            404 => ApiErrorKind::NotFound,
            402..=499 => ApiErrorKind::Client,
            s if s >= 500 && retryable.contains(&s) => ApiErrorKind::RetryableServer,
            s if s >= 500 => ApiErrorKind::Server,
            _ => ApiErrorKind::Other,
        }
    }
}

/// The single error type surfaced by [`ApiClient`](super::ApiClient).
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ApiError {
    kind: ApiErrorKind,
    message: String,
    status_code: u16,
    errors: Vec<String>,
    response: Option<Value>,
    timestamp: DateTime<Utc>,
    problem_details: Option<ProblemDetails>,
}

impl ApiError {
    fn build(kind: ApiErrorKind, status_code: u16, message: String, errors: Vec<String>) -> Self {
        Self {
            kind,
            message,
            status_code,
            errors,
            response: None,
            timestamp: Utc::now(),
            problem_details: None,
        }
    }

    /// Error for a completed non-2xx response.
    ///
    /// `body` is the parsed JSON body, if it parsed. The message is the first
    /// of `detail`, `title`, `message` that is present, else `HTTP <status> error`.
    pub fn from_response(status: u16, body: Option<Value>, retryable: &[u16]) -> Self {
        let kind = ApiErrorKind::from_status(status, retryable);
        let body = body.unwrap_or_else(|| Value::Object(Default::default()));

        let problem = ProblemDetails::from_value(&body);
        let text = |key: &str| {
            body.get(key)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        let message = text("detail")
            .or_else(|| text("title"))
            .or_else(|| text("message"))
            .unwrap_or_else(|| format!("HTTP {} error", status));

        let errors = body
            .get("errors")
            .and_then(flatten_messages)
            .or_else(|| body.get("validationErrors").and_then(flatten_messages))
            .unwrap_or_default();

        Self {
            response: Some(body),
            problem_details: problem,
            ..Self::build(kind, status, message, errors)
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        let message = message.into();
        let message = if message.is_empty() {
            "Network request failed".to_string()
        } else {
            message
        };
        Self::build(ApiErrorKind::Network, 0, message.clone(), vec![message])
    }

    pub fn timeout(after: Duration) -> Self {
        let message = format!("Request timed out after {} ms", after.as_millis());
        Self::build(ApiErrorKind::Timeout, 0, message.clone(), vec![message])
    }

    pub fn aborted(reason: impl Into<String>) -> Self {
        let message = reason.into();
        Self::build(ApiErrorKind::Aborted, 0, message.clone(), vec![message])
    }

    /// A 2xx response whose body could not be decoded.
    pub fn decode(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        Self::build(ApiErrorKind::Decode, status, message.clone(), vec![message])
    }

    pub fn kind(&self) -> ApiErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// HTTP status, or 0 when no response was received.
    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// The raw error body, when there was one.
    pub fn response(&self) -> Option<&Value> {
        self.response.as_ref()
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// ISO-8601 form of [`timestamp`](Self::timestamp).
    pub fn timestamp_iso(&self) -> String {
        self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    pub fn problem_details(&self) -> Option<&ProblemDetails> {
        self.problem_details.as_ref()
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code)
    }

    pub fn is_server_error(&self) -> bool {
        self.status_code >= 500
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status_code == 401
    }

    pub fn is_forbidden(&self) -> bool {
        self.status_code == 403
    }

    pub fn is_not_found(&self) -> bool {
        self.status_code == 404
    }

    pub fn is_bad_request(&self) -> bool {
        self.status_code == 400
    }

    /// Whether the caller cancelled the call.
    pub fn is_aborted(&self) -> bool {
        self.kind == ApiErrorKind::Aborted
    }

    /// Text suitable for showing to a user: `detail`, then `title`, then the message.
    pub fn user_friendly_message(&self) -> &str {
        let problem = self.problem_details.as_ref();
        problem
            .and_then(|p| p.detail.as_deref())
            .filter(|s| !s.is_empty())
            .or_else(|| {
                problem
                    .and_then(|p| p.title.as_deref())
                    .filter(|s| !s.is_empty())
            })
            .unwrap_or(&self.message)
    }

    /// The user-facing message followed by every field-level message.
    pub fn all_error_messages(&self) -> Vec<String> {
        std::iter::once(self.user_friendly_message().to_string())
            .chain(self.errors.iter().cloned())
            .collect()
    }
}
