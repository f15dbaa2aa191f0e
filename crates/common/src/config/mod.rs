//! Configuration management for Quote Table services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default, config/{APP_ENV}, config/local)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Remote store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Session configuration
    #[serde(default)]
    pub session: SessionConfig,

    /// Password hashing configuration
    #[serde(default)]
    pub auth: AuthConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Shutdown timeout in seconds
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

/// Which [`TableStore`](crate::store::TableStore) backs the repositories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Rest,
    Memory,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_backend")]
    pub backend: StoreBackend,

    /// Base URL of the REST endpoint, e.g. https://xyz.supabase.co
    #[serde(default)]
    pub url: String,

    /// Sent as both `apikey` and bearer token
    #[serde(default)]
    pub api_key: String,

    /// Per-call timeout in seconds
    #[serde(default = "default_store_timeout")]
    pub timeout_secs: u64,

    /// Maximum in-flight enrichment fetches per list
    #[serde(default = "default_enrichment_concurrency")]
    pub enrichment_concurrency: usize,

    /// Number of quotes returned by the latest-quotes listing
    #[serde(default = "default_latest_limit")]
    pub latest_limit: usize,
}

impl StoreConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionBackend {
    Memory,
    Redis,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfig {
    #[serde(default = "default_session_backend")]
    pub backend: SessionBackend,

    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,

    /// Session lifetime in seconds
    #[serde(default = "default_session_lifetime")]
    pub lifetime_secs: u64,

    /// Mark the cookie `Secure`
    #[serde(default = "default_enabled")]
    pub secure_cookie: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    /// bcrypt cost factor
    #[serde(default = "default_bcrypt_cost")]
    pub bcrypt_cost: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Requests per second (global)
    #[serde(default = "default_rate_limit")]
    pub requests_per_second: u32,

    /// Burst capacity
    #[serde(default = "default_burst")]
    pub burst: u32,

    /// Enable rate limiting
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

/// Lowest bcrypt cost accepted from configuration
pub const MIN_BCRYPT_COST: u32 = 12;

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 4000 }
fn default_request_timeout() -> u64 { 30 }
fn default_shutdown_timeout() -> u64 { 30 }
fn default_store_backend() -> StoreBackend { StoreBackend::Rest }
fn default_store_timeout() -> u64 { 10 }
fn default_enrichment_concurrency() -> usize { 4 }
fn default_latest_limit() -> usize { 10 }
fn default_session_backend() -> SessionBackend { SessionBackend::Memory }
fn default_redis_url() -> String { "redis://localhost:6379".to_string() }
fn default_cookie_name() -> String { "session".to_string() }
fn default_session_lifetime() -> u64 { 12 * 60 * 60 }
fn default_bcrypt_cost() -> u32 { 12 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_service_name() -> String { "quotetable".to_string() }
fn default_rate_limit() -> u32 { 50 }
fn default_burst() -> u32 { 100 }
fn default_enabled() -> bool { true }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            url: String::new(),
            api_key: String::new(),
            timeout_secs: default_store_timeout(),
            enrichment_concurrency: default_enrichment_concurrency(),
            latest_limit: default_latest_limit(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            backend: default_session_backend(),
            redis_url: default_redis_url(),
            cookie_name: default_cookie_name(),
            lifetime_secs: default_session_lifetime(),
            secure_cookie: default_enabled(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self { bcrypt_cost: default_bcrypt_cost() }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            service_name: default_service_name(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_rate_limit(),
            burst: default_burst(),
            enabled: default_enabled(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with APP__ prefix
            // e.g., APP__STORE__URL=https://xyz.supabase.co
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )

            .build()?;

        config.try_deserialize()
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout_secs)
    }

    pub fn session_lifetime(&self) -> Duration {
        Duration::from_secs(self.session.lifetime_secs)
    }

    /// Configured bcrypt cost, never below [`MIN_BCRYPT_COST`]
    pub fn bcrypt_cost(&self) -> u32 {
        self.auth.bcrypt_cost.max(MIN_BCRYPT_COST)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            store: StoreConfig::default(),
            session: SessionConfig::default(),
            auth: AuthConfig::default(),
            observability: ObservabilityConfig::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 4000);
        assert_eq!(config.auth.bcrypt_cost, 12);
        assert_eq!(config.store.enrichment_concurrency, 4);
        assert_eq!(config.store.latest_limit, 10);
        assert_eq!(config.session_lifetime(), Duration::from_secs(43_200));
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(30));
        assert_eq!(config.store.timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_backends_parse_lowercase() {
        let backend: StoreBackend = serde_json::from_str("\"memory\"").unwrap();
        assert_eq!(backend, StoreBackend::Memory);
        let backend: SessionBackend = serde_json::from_str("\"redis\"").unwrap();
        assert_eq!(backend, SessionBackend::Redis);
    }

    #[test]
    fn test_sections_default_when_missing() {
        let config: AppConfig =
            serde_json::from_str(r#"{"store": {"backend": "memory"}}"#).unwrap();
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.store.latest_limit, 10);
        assert_eq!(config.session.cookie_name, "session");
    }

    #[test]
    fn test_bcrypt_cost_floor() {
        let mut config = AppConfig::default();
        config.auth.bcrypt_cost = 4;
        assert_eq!(config.bcrypt_cost(), MIN_BCRYPT_COST);
        config.auth.bcrypt_cost = 13;
        assert_eq!(config.bcrypt_cost(), 13);
    }
}
