//! Client configuration, token providers and callbacks

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::error::ApiError;
use crate::config::{ClientSettings, RetrySettings};

/// Callback fired with every error the client constructs.
pub type ErrorCallback = Arc<dyn Fn(&ApiError) + Send + Sync>;

/// Source of the bearer credential attached to each attempt.
///
/// `Ok(None)` (or an empty string) sends the request without `Authorization`.
/// An `Err` is logged and the request also proceeds unauthenticated.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn token(&self) -> anyhow::Result<Option<String>>;
}

#[async_trait]
impl<F, Fut> TokenProvider for F
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Option<String>>> + Send,
{
    async fn token(&self) -> anyhow::Result<Option<String>> {
        (self)().await
    }
}

/// A fixed credential.
#[derive(Clone)]
pub struct StaticToken(pub String);

#[async_trait]
impl TokenProvider for StaticToken {
    async fn token(&self) -> anyhow::Result<Option<String>> {
        Ok(Some(self.0.clone()))
    }
}

impl fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StaticToken(***)")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Additional attempts after the first
    pub max_retries: u32,
    /// Delay before the first retry
    pub retry_delay: Duration,
    pub retry_delay_multiplier: f64,
    pub retryable_status_codes: Vec<u16>,
}

impl RetryConfig {
    /// Delay before retry `k` (0-based): `retry_delay * multiplier^k`.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
        let factor = self.retry_delay_multiplier.powi(exponent);
        let millis = self.retry_delay.as_secs_f64() * 1000.0 * factor;
        if millis.is_finite() && millis >= 0.0 {
            Duration::from_secs_f64(millis.min(u64::MAX as f64) / 1000.0)
        } else {
            Duration::MAX
        }
    }

    pub fn is_retryable(&self, status: u16) -> bool {
        self.retryable_status_codes.contains(&status)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig::from(&RetrySettings::default())
    }
}

impl From<&RetrySettings> for RetryConfig {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            retry_delay: Duration::from_millis(settings.retry_delay_ms),
            retry_delay_multiplier: settings.retry_delay_multiplier,
            retryable_status_codes: settings.retryable_status_codes.clone(),
        }
    }
}

/// Everything that determines how [`ApiClient`](super::ApiClient) issues a call.
#[derive(Clone)]
pub struct ClientConfig {
    /// API root; paths are appended to it
    pub base_url: String,
    /// Per-attempt timeout
    pub timeout: Duration,
    /// Origin used when `base_url` is relative
    pub origin: String,
    pub retry: RetryConfig,
    pub token_provider: Option<Arc<dyn TokenProvider>>,
    pub on_unauthorized: Option<ErrorCallback>,
    pub on_error: Option<ErrorCallback>,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Defaults with the base URL taken from `VITE_API_URL` / `AUDIT_API_URL`.
    pub fn from_env() -> Self {
        ClientConfig::from(&ClientSettings::from_env())
    }

    /// Apply `update` over this configuration. Unset fields keep their value;
    /// the retry block is merged field by field.
    pub fn merged(&self, update: ClientConfigUpdate) -> Self {
        let mut next = self.clone();
        if let Some(base_url) = update.base_url {
            next.base_url = base_url;
        }
        if let Some(timeout) = update.timeout {
            next.timeout = timeout;
        }
        if let Some(origin) = update.origin {
            next.origin = origin;
        }
        if let Some(retry) = update.retry {
            if let Some(max_retries) = retry.max_retries {
                next.retry.max_retries = max_retries;
            }
            if let Some(delay) = retry.retry_delay {
                next.retry.retry_delay = delay;
            }
            if let Some(multiplier) = retry.retry_delay_multiplier {
                next.retry.retry_delay_multiplier = multiplier;
            }
            if let Some(codes) = retry.retryable_status_codes {
                next.retry.retryable_status_codes = codes;
            }
        }
        if update.token_provider.is_some() {
            next.token_provider = update.token_provider;
        }
        if update.on_unauthorized.is_some() {
            next.on_unauthorized = update.on_unauthorized;
        }
        if update.on_error.is_some() {
            next.on_error = update.on_error;
        }
        next
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig::from(&ClientSettings::default())
    }
}

impl From<&ClientSettings> for ClientConfig {
    fn from(settings: &ClientSettings) -> Self {
        Self {
            base_url: settings.base_url.clone(),
            timeout: Duration::from_millis(settings.timeout_ms),
            origin: settings.origin.clone(),
            retry: RetryConfig::from(&settings.retry),
            token_provider: None,
            on_unauthorized: None,
            on_error: None,
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("origin", &self.origin)
            .field("retry", &self.retry)
            .field("token_provider", &self.token_provider.is_some())
            .field("on_unauthorized", &self.on_unauthorized.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

/// Partial retry settings for [`ClientConfigUpdate`].
#[derive(Debug, Clone, Default)]
pub struct RetryConfigUpdate {
    pub max_retries: Option<u32>,
    pub retry_delay: Option<Duration>,
    pub retry_delay_multiplier: Option<f64>,
    pub retryable_status_codes: Option<Vec<u16>>,
}

/// Partial configuration applied by [`ApiClient::configure`](super::ApiClient::configure).
#[derive(Clone, Default)]
pub struct ClientConfigUpdate {
    pub base_url: Option<String>,
    pub timeout: Option<Duration>,
    pub origin: Option<String>,
    pub retry: Option<RetryConfigUpdate>,
    pub token_provider: Option<Arc<dyn TokenProvider>>,
    pub on_unauthorized: Option<ErrorCallback>,
    pub on_error: Option<ErrorCallback>,
}

impl ClientConfigUpdate {
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.retry.get_or_insert_with(Default::default).max_retries = Some(max_retries);
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry.get_or_insert_with(Default::default).retry_delay = Some(delay);
        self
    }

    pub fn retry_delay_multiplier(mut self, multiplier: f64) -> Self {
        self.retry
            .get_or_insert_with(Default::default)
            .retry_delay_multiplier = Some(multiplier);
        self
    }

    pub fn retryable_status_codes(mut self, codes: Vec<u16>) -> Self {
        self.retry
            .get_or_insert_with(Default::default)
            .retryable_status_codes = Some(codes);
        self
    }

    pub fn token_provider(mut self, provider: impl TokenProvider + 'static) -> Self {
        self.token_provider = Some(Arc::new(provider));
        self
    }

    pub fn on_unauthorized(mut self, callback: impl Fn(&ApiError) + Send + Sync + 'static) -> Self {
        self.on_unauthorized = Some(Arc::new(callback));
        self
    }

    pub fn on_error(mut self, callback: impl Fn(&ApiError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(callback));
        self
    }
}
