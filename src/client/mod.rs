//! Typed HTTP client for the audit API
//!
//! Every call goes through [`ApiClient::invoke`], which resolves the URL,
//! attaches the bearer token, bounds each attempt with a timeout, retries
//! transport failures and retryable statuses with exponential backoff, turns
//! failures into [`ApiError`], fires the configured callbacks and records one
//! `http_request` tracing span per call.

mod audit;
mod config;
mod error;
mod response;
mod url;

pub use audit::AuditEndpoint;
pub use config::{
    ClientConfig, ClientConfigUpdate, ErrorCallback, RetryConfig, RetryConfigUpdate, StaticToken,
    TokenProvider,
};
pub use error::{ApiError, ApiErrorKind};
pub use response::{extract_data, ApiResponse, ResponseBody};
pub use url::{encode_query, resolve_url, API_PREFIX};

use std::error::Error as StdError;
use std::sync::{Arc, RwLock};

use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE},
    multipart, Method, Url,
};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, field::Empty, info_span, warn, Instrument, Span};

/// `service.name` attribute of client spans.
pub const SERVICE_NAME: &str = "audit-slice-client";

/// One part of a multipart form body.
#[derive(Debug, Clone)]
pub enum FormPart {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        file_name: String,
        mime: Option<String>,
        bytes: Vec<u8>,
    },
}

/// Request body variants.
#[derive(Debug, Clone)]
pub enum RequestBody {
    Json(Value),
    Text(String),
    /// Rebuilt for every attempt
    Multipart(Vec<FormPart>),
}

/// Per-call options: method, extra headers, body and cancellation signal.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Option<RequestBody>,
    pub signal: Option<CancellationToken>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(RequestBody::Json(body));
        self
    }

    pub fn text(mut self, body: impl Into<String>) -> Self {
        self.body = Some(RequestBody::Text(body.into()));
        self
    }

    pub fn multipart(mut self, parts: Vec<FormPart>) -> Self {
        self.body = Some(RequestBody::Multipart(parts));
        self
    }

    /// Cancel the call (including any pending retry) when `signal` fires.
    pub fn signal(mut self, signal: CancellationToken) -> Self {
        self.signal = Some(signal);
        self
    }
}

/// Client for the audit API.
///
/// Clones share configuration; [`configure`](Self::configure) and
/// [`set_token_provider`](Self::set_token_provider) affect every clone.
/// Each call works on a snapshot of the configuration taken when it starts.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    config: Arc<RwLock<Arc<ClientConfig>>>,
}

impl ApiClient {
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("audit-slice/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::network(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self::with_http_client(config, http))
    }

    /// Use an existing reqwest client (connection pool, proxies, TLS roots).
    pub fn with_http_client(config: ClientConfig, http: reqwest::Client) -> Self {
        Self {
            http,
            config: Arc::new(RwLock::new(Arc::new(config))),
        }
    }

    /// Client with default settings and the base URL from the environment.
    pub fn from_env() -> Result<Self, ApiError> {
        Self::new(ClientConfig::from_env())
    }

    /// Snapshot of the current configuration.
    pub fn config(&self) -> Arc<ClientConfig> {
        match self.config.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    pub fn base_url(&self) -> String {
        self.config().base_url.clone()
    }

    /// Merge `update` over the current configuration.
    pub fn configure(&self, update: ClientConfigUpdate) {
        self.replace_config(|current| current.merged(update));
    }

    /// Replace only the token provider.
    pub fn set_token_provider(&self, provider: impl TokenProvider + 'static) {
        let provider: Arc<dyn TokenProvider> = Arc::new(provider);
        self.replace_config(|current| {
            let mut next = current.clone();
            next.token_provider = Some(provider);
            next
        });
    }

    fn replace_config(&self, update: impl FnOnce(&ClientConfig) -> ClientConfig) {
        let mut guard = match self.config.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let next = update(&guard);
        *guard = Arc::new(next);
    }

    /// Typed access to `/audit`.
    pub fn audit(&self) -> AuditEndpoint {
        AuditEndpoint::new(self.clone())
    }

    /// `GET path` with default options.
    pub async fn get(&self, path: &str) -> Result<ApiResponse, ApiError> {
        self.invoke(path, RequestOptions::default()).await
    }

    /// Issue one logical call, retrying per the configured policy.
    ///
    /// Returns the first successful response, or the last error once the call
    /// cannot or may not be retried any further.
    pub async fn invoke(&self, path: &str, options: RequestOptions) -> Result<ApiResponse, ApiError> {
        let config = self.config();
        let method = options.method.clone();

        let span = info_span!(
            "http_request",
            otel.name = %format!("HTTP {}", method),
            otel.kind = "client",
            http.method = %method,
            http.url = Empty,
            http.scheme = Empty,
            http.host = Empty,
            http.target = Empty,
            service.name = SERVICE_NAME,
            http.status_code = Empty,
            http.response.size = Empty,
            otel.status_code = Empty,
            otel.status_message = Empty,
        );

        let result = self
            .execute(&config, path, options, &span)
            .instrument(span.clone())
            .await;

        match result {
            Ok(ref response) => {
                let size = response
                    .headers
                    .get(CONTENT_LENGTH)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("unknown");
                span.record("http.status_code", response.status);
                span.record("http.response.size", size);
                span.record("otel.status_code", "OK");
            }
            Err(ref err) => {
                span.record("otel.status_code", "ERROR");
                span.record("otel.status_message", err.message());
                span.in_scope(|| {
                    error!(
                        exception.message = %err,
                        exception.kind = ?err.kind(),
                        http.status_code = err.status_code(),
                        "HTTP request failed"
                    );
                });
            }
        }
        result
    }

    async fn execute(
        &self,
        config: &ClientConfig,
        path: &str,
        options: RequestOptions,
        span: &Span,
    ) -> Result<ApiResponse, ApiError> {
        let url = resolve_url(&config.base_url, &config.origin, path)
            .map_err(|e| notify(config, e))?;

        let target = match url.query() {
            Some(query) => format!("{}?{}", url.path(), query),
            None => url.path().to_string(),
        };
        span.record("http.url", url.as_str());
        span.record("http.scheme", url.scheme());
        span.record("http.host", url.host_str().unwrap_or_default());
        span.record("http.target", target.as_str());

        let retry = &config.retry;
        let mut attempt: u32 = 0;
        loop {
            if let Some(ref signal) = options.signal {
                if signal.is_cancelled() {
                    return Err(notify(config, ApiError::aborted("Request aborted by caller")));
                }
            }

            let err = match self.attempt(config, &url, &options).await {
                Ok(response) => return Ok(response),
                Err(err) => notify(config, err),
            };

            if attempt >= retry.max_retries || !should_retry(&err, retry) {
                return Err(err);
            }

            let delay = retry.delay_for(attempt);
            debug!(
                attempt = attempt + 1,
                status = err.status_code(),
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "Retrying request"
            );

            match options.signal {
                Some(ref signal) => {
                    tokio::select! {
                        _ = signal.cancelled() => {
                            return Err(notify(config, ApiError::aborted("Request aborted by caller")));
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                None => tokio::time::sleep(delay).await,
            }
            attempt += 1;
        }
    }

    /// One network attempt: token, send, read.
    async fn attempt(
        &self,
        config: &ClientConfig,
        url: &Url,
        options: &RequestOptions,
    ) -> Result<ApiResponse, ApiError> {
        let exchange = async {
            let mut headers = options.headers.clone();
            if matches!(
                options.body,
                Some(RequestBody::Json(_)) | Some(RequestBody::Text(_))
            ) && !headers.contains_key(CONTENT_TYPE)
            {
                headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            }

            if let Some(ref provider) = config.token_provider {
                match provider.token().await {
                    Ok(Some(token)) if !token.is_empty() => {
                        match HeaderValue::from_str(&format!("Bearer {}", token)) {
                            Ok(value) => {
                                headers.insert(AUTHORIZATION, value);
                            }
                            Err(e) => warn!(error = %e, "Auth token is not a valid header value"),
                        }
                    }
                    Ok(_) => {}
                    Err(e) => warn!(error = %e, "Failed to get auth token"),
                }
            }

            let mut request = self
                .http
                .request(options.method.clone(), url.clone())
                .headers(headers);
            request = match options.body {
                Some(RequestBody::Json(ref value)) => {
                    let bytes = serde_json::to_vec(value).map_err(|e| {
                        ApiError::network(format!("Failed to encode request body: {}", e))
                    })?;
                    request.body(bytes)
                }
                Some(RequestBody::Text(ref text)) => request.body(text.clone()),
                Some(RequestBody::Multipart(ref parts)) => request.multipart(build_form(parts)?),
                None => request,
            };

            let response = request.send().await.map_err(transport_error)?;
            read_response(response, &config.retry.retryable_status_codes).await
        };

        let bounded = async {
            tokio::time::timeout(config.timeout, exchange)
                .await
                .unwrap_or_else(|_| Err(ApiError::timeout(config.timeout)))
        };

        match options.signal {
            Some(ref signal) => {
                tokio::select! {
                    biased;
                    _ = signal.cancelled() => Err(ApiError::aborted("Request aborted by caller")),
                    result = bounded => result,
                }
            }
            None => bounded.await,
        }
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("config", &self.config())
            .finish()
    }
}

/// Fire the configured callbacks for `err` and hand it back.
fn notify(config: &ClientConfig, err: ApiError) -> ApiError {
    if err.is_unauthorized() {
        if let Some(ref on_unauthorized) = config.on_unauthorized {
            on_unauthorized(&err);
        }
    }
    if let Some(ref on_error) = config.on_error {
        on_error(&err);
    }
    err
}

fn should_retry(err: &ApiError, retry: &RetryConfig) -> bool {
    match err.kind() {
        ApiErrorKind::Network | ApiErrorKind::Timeout => true,
        ApiErrorKind::Aborted | ApiErrorKind::Decode => false,
        _ => retry.is_retryable(err.status_code()),
    }
}

fn transport_error(err: reqwest::Error) -> ApiError {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    ApiError::network(message)
}

fn build_form(parts: &[FormPart]) -> Result<multipart::Form, ApiError> {
    let mut form = multipart::Form::new();
    for part in parts {
        form = match part {
            FormPart::Text { name, value } => form.text(name.clone(), value.clone()),
            FormPart::File {
                name,
                file_name,
                mime,
                bytes,
            } => {
                let mut file = multipart::Part::bytes(bytes.clone()).file_name(file_name.clone());
                if let Some(mime) = mime {
                    file = file.mime_str(mime).map_err(|e| {
                        ApiError::network(format!("Invalid content type {}: {}", mime, e))
                    })?;
                }
                form.part(name.clone(), file)
            }
        };
    }
    Ok(form)
}

async fn read_response(response: reqwest::Response, retryable: &[u16]) -> Result<ApiResponse, ApiError> {
    let status = response.status();
    let code = status.as_u16();
    let headers = response.headers().clone();

    if !status.is_success() {
        let body = response
            .bytes()
            .await
            .ok()
            .and_then(|bytes| serde_json::from_slice::<Value>(&bytes).ok());
        return Err(ApiError::from_response(code, body, retryable));
    }

    if code == 204 {
        return Ok(ApiResponse {
            data: ResponseBody::Empty,
            status: code,
            headers,
        });
    }

    let is_json = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains("application/json"));

    let bytes = response.bytes().await.map_err(transport_error)?;
    let data = if is_json {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            ResponseBody::Empty
        } else {
            let value = serde_json::from_slice(&bytes).map_err(|e| {
                ApiError::decode(code, format!("Failed to parse response body: {}", e))
            })?;
            ResponseBody::Json(value)
        }
    } else {
        ResponseBody::Text(String::from_utf8_lossy(&bytes).into_owned())
    };

    Ok(ApiResponse {
        data,
        status: code,
        headers,
    })
}
