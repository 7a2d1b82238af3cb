//! Configuration management
//!
//! This module provides YAML-based configuration management with support for:
//! - Environment variable overrides
//! - Multiple configuration file locations
//! - Default values for all settings
//! - Settings for the typed API client

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub seed: SeedConfig,
    /// Settings for the API client (`audit-client` and embedders)
    #[serde(default)]
    pub client: ClientSettings,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Path to static files directory (single-page UI build output)
    #[serde(default = "default_static_dir")]
    pub static_dir: Option<PathBuf>,
    /// Whether to serve the UI bundle (enables fallback to index.html)
    #[serde(default = "default_serve_frontend")]
    pub serve_frontend: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            static_dir: default_static_dir(),
            serve_frontend: default_serve_frontend(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_static_dir() -> Option<PathBuf> {
    let path = PathBuf::from("clientapp/dist");
    if path.exists() {
        Some(path)
    } else {
        None
    }
}

fn default_serve_frontend() -> bool {
    true
}

/// Bearer credential validation
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    /// When false the audit API is served without authentication
    #[serde(default = "default_auth_enabled")]
    pub enabled: bool,
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,
    /// Expected `iss` claim, if any
    #[serde(default)]
    pub issuer: Option<String>,
    /// Expected `aud` claim, if any
    #[serde(default)]
    pub audience: Option<String>,
    #[serde(default = "default_token_expiry")]
    pub token_expiry_hours: u64,
    /// Realm advertised in the `WWW-Authenticate` challenge
    #[serde(default = "default_realm")]
    pub realm: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: default_auth_enabled(),
            jwt_secret: default_jwt_secret(),
            issuer: None,
            audience: None,
            token_expiry_hours: default_token_expiry(),
            realm: default_realm(),
        }
    }
}

fn default_auth_enabled() -> bool {
    true
}

fn default_jwt_secret() -> String {
    "change-me-in-production-minimum-32-characters-long".to_string()
}

fn default_token_expiry() -> u64 {
    24
}

fn default_realm() -> String {
    "audit-slice".to_string()
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connect_timeout_secs: default_connect_timeout(),
            idle_timeout_secs: default_idle_timeout(),
        }
    }
}

fn default_database_url() -> String {
    "sqlite://./data/audit.db".to_string()
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_idle_timeout() -> u64 {
    600
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    /// Log output target (console or file)
    #[serde(default = "default_log_target")]
    pub target: LogTarget,
    /// Directory for log files (used when target is "file")
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// Log file name prefix (default: "audit-slice")
    #[serde(default = "default_log_prefix")]
    pub log_prefix: String,
    /// Enable daily log rotation
    #[serde(default = "default_log_rotation")]
    pub daily_rotation: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            target: default_log_target(),
            log_dir: default_log_dir(),
            log_prefix: default_log_prefix(),
            daily_rotation: default_log_rotation(),
        }
    }
}

/// Log output target
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogTarget {
    /// Log to console (stdout/stderr) - default for development
    #[default]
    Console,
    /// Log to file with optional rotation - recommended for production
    File,
    /// Log to both console and file
    Both,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> LogFormat {
    LogFormat::Pretty
}

fn default_log_target() -> LogTarget {
    LogTarget::Console
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("./logs")
}

fn default_log_prefix() -> String {
    "audit-slice".to_string()
}

fn default_log_rotation() -> bool {
    true
}

/// Startup seeding of the audit store
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SeedConfig {
    #[serde(default = "default_seed_enabled")]
    pub enabled: bool,
    /// Data set identifier; recorded in the logs only
    #[serde(default = "default_seed_dataset")]
    pub dataset: String,
    #[serde(default = "default_seed_count")]
    pub record_count: usize,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            enabled: default_seed_enabled(),
            dataset: default_seed_dataset(),
            record_count: default_seed_count(),
        }
    }
}

fn default_seed_enabled() -> bool {
    true
}

fn default_seed_dataset() -> String {
    "default".to_string()
}

fn default_seed_count() -> usize {
    500
}

/// Transport client settings as they appear in the configuration file
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ClientSettings {
    /// API root, e.g. `http://localhost:8080/api/v1` or `/api/v1`
    #[serde(default = "default_client_base_url")]
    pub base_url: String,
    /// Per-attempt timeout
    #[serde(default = "default_client_timeout_ms")]
    pub timeout_ms: u64,
    /// Origin used to resolve a relative `base_url`
    #[serde(default = "default_client_origin")]
    pub origin: String,
    #[serde(default)]
    pub retry: RetrySettings,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: default_client_base_url(),
            timeout_ms: default_client_timeout_ms(),
            origin: default_client_origin(),
            retry: RetrySettings::default(),
        }
    }
}

impl ClientSettings {
    /// Defaults with the base URL taken from `VITE_API_URL` or `AUDIT_API_URL`.
    pub fn from_env() -> Self {
        let mut settings = Self::default();
        if let Some(url) = env_base_url() {
            settings.base_url = url;
        }
        settings
    }
}

fn env_base_url() -> Option<String> {
    ["VITE_API_URL", "AUDIT_API_URL"]
        .iter()
        .filter_map(|key| std::env::var(key).ok())
        .find(|value| !value.trim().is_empty())
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct RetrySettings {
    /// Additional attempts after the first
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Delay before the first retry
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_retry_multiplier")]
    pub retry_delay_multiplier: f64,
    #[serde(default = "default_retryable_status_codes")]
    pub retryable_status_codes: Vec<u16>,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            retry_delay_multiplier: default_retry_multiplier(),
            retryable_status_codes: default_retryable_status_codes(),
        }
    }
}

fn default_client_base_url() -> String {
    "http://localhost:8080/api/v1".to_string()
}

fn default_client_timeout_ms() -> u64 {
    30_000
}

fn default_client_origin() -> String {
    "http://localhost".to_string()
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_retry_multiplier() -> f64 {
    2.0
}

pub(crate) fn default_retryable_status_codes() -> Vec<u16> {
    vec![408, 429, 500, 502, 503, 504]
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            auth: AuthConfig::default(),
            database: DatabaseConfig::default(),
            logging: LoggingConfig::default(),
            seed: SeedConfig::default(),
            client: ClientSettings::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values
    /// 2. Configuration file (YAML)
    /// 3. Environment variables
    pub fn load() -> Result<Self> {
        // Try to load .env file if it exists
        let _ = dotenvy::dotenv();

        let config_path = std::env::var("AUDIT_SLICE_CONFIG")
            .map(PathBuf::from)
            .ok()
            .or_else(Self::find_config_file);

        let mut config = match config_path {
            Some(ref path) if path.exists() => {
                eprintln!("[CONFIG] Loading configuration from: {:?}", path);
                Self::from_file(path)?
            }
            Some(ref path) => {
                eprintln!("[CONFIG] Config file not found: {:?}, using defaults", path);
                AppConfig::default()
            }
            None => {
                eprintln!("[CONFIG] No config file found, using defaults");
                AppConfig::default()
            }
        };

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Parse a YAML configuration file without applying overrides
    pub fn from_file(path: &PathBuf) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        serde_norway::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    /// Find the configuration file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let paths = [
            PathBuf::from("config.yaml"),
            PathBuf::from("config/config.yaml"),
            PathBuf::from("/etc/audit-slice/config.yaml"),
            dirs::config_dir()
                .map(|p| p.join("audit-slice/config.yaml"))
                .unwrap_or_default(),
        ];

        paths.into_iter().find(|p| p.exists())
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        // Server overrides
        if let Ok(host) = std::env::var("AUDIT_SLICE_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("AUDIT_SLICE_PORT") {
            if let Ok(p) = port.parse() {
                self.server.port = p;
            }
        }

        // Database overrides
        if let Ok(url) = std::env::var("DATABASE_URL") {
            self.database.url = url;
        }

        // Auth overrides
        if let Ok(secret) = std::env::var("JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }
        if let Ok(enabled) = std::env::var("AUDIT_SLICE_AUTH_ENABLED") {
            self.auth.enabled = parse_flag(&enabled).unwrap_or(self.auth.enabled);
        }

        // Logging overrides
        if let Ok(level) = std::env::var("RUST_LOG") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("AUDIT_SLICE_LOG_FORMAT") {
            self.logging.format = match format.to_lowercase().as_str() {
                "json" => LogFormat::Json,
                "compact" => LogFormat::Compact,
                _ => LogFormat::Pretty,
            };
        }

        // Seed overrides
        if let Ok(dataset) = std::env::var("SEED_DATA_SET") {
            self.seed.dataset = dataset;
        }
        if let Ok(count) = std::env::var("AUDIT_SLICE_SEED_COUNT") {
            if let Ok(n) = count.parse() {
                self.seed.record_count = n;
            }
        }

        // Client overrides
        if let Some(url) = env_base_url() {
            self.client.base_url = url;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.auth.enabled && self.auth.jwt_secret.len() < 32 {
            anyhow::bail!("JWT secret must be at least 32 characters long");
        }

        if self.server.port == 0 {
            anyhow::bail!("Server port cannot be 0");
        }

        if self.database.url.is_empty() {
            anyhow::bail!("Database URL cannot be empty");
        }

        if self.client.timeout_ms == 0 {
            anyhow::bail!("Client timeout must be greater than 0");
        }

        if self.client.retry.retry_delay_multiplier < 1.0 {
            anyhow::bail!(
                "Retry delay multiplier must be at least 1, got {}",
                self.client.retry.retry_delay_multiplier
            );
        }

        if let Some(ref static_dir) = self.server.static_dir {
            if !static_dir.exists() {
                tracing::warn!(
                    "Static directory does not exist: {:?}. UI will not be served.",
                    static_dir
                );
            }
        }

        Ok(())
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
