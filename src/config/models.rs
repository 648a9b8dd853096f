//! Configuration data structures for the sitegate proxy.
//!
//! This module defines the schema for the application settings: the HTTP
//! server, the backend API connection, session cookie handling, logging and
//! the client-side cache policies.
//!
//! Author: kelexine (<https://github.com/kelexine>)

use crate::cache::Resource;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The root configuration object for the application.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// HTTP server settings (host, port, body limit).
    #[serde(default)]
    pub server: ServerConfig,

    /// Upstream backend API settings.
    #[serde(default)]
    pub backend: BackendConfig,

    /// Session credential settings.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Logging and observability settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Client-side query cache settings.
    #[serde(default)]
    pub cache: CacheConfig,
}

/// Settings for the built-in HTTP server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The IP address or hostname the server should bind to.
    /// Default: `127.0.0.1`
    #[serde(default = "default_host")]
    pub host: String,

    /// The port number the server should listen on.
    /// Default: `3000`
    #[serde(default = "default_port")]
    pub port: u16,

    /// Largest accepted request body in bytes.
    /// Default: `1048576` (1 MiB)
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

/// Settings for the upstream backend API connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL every logical backend path is appended to.
    /// Default: `http://127.0.0.1:4000/api`
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Upper bound for one backend call, body included, in seconds.
    /// Default: `15`
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Connection establishment timeout in seconds.
    /// Default: `5`
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,

    /// Maximum number of idle pooled connections per backend host.
    /// Default: `32`
    #[serde(default = "default_pool_size")]
    pub pool_max_idle_per_host: usize,

    /// Per-route call timeouts in seconds, keyed by route name
    /// (e.g. `website_data = 5`). Routes not listed use `timeout_seconds`.
    #[serde(default)]
    pub route_timeouts: HashMap<String, u64>,
}

/// Settings for reading the session credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Name of the cookie holding the bearer token.
    /// Default: `accessToken`
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
}

/// Settings for application logging and output format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Minimum log level (`trace`, `debug`, `info`, `warn`, `error`).
    /// Default: `info`
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format for logs (`pretty`, `json`).
    /// Default: `pretty`
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Whether to mask session tokens in logs.
    /// Default: `true`
    #[serde(default = "default_true")]
    pub sanitize_tokens: bool,
}

/// Per-resource overrides of the built-in cache policies.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CacheConfig {
    #[serde(default)]
    pub policies: HashMap<Resource, PolicyOverride>,
}

/// Any field left out keeps the built-in value.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct PolicyOverride {
    #[serde(default)]
    pub stale_time_seconds: Option<u64>,
    #[serde(default)]
    pub gc_time_seconds: Option<u64>,
    #[serde(default)]
    pub refetch_on_focus: Option<bool>,
    #[serde(default)]
    pub background_refresh: Option<bool>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_seconds: default_timeout(),
            connect_timeout_seconds: default_connect_timeout(),
            pool_max_idle_per_host: default_pool_size(),
            route_timeouts: HashMap::new(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            cookie_name: default_cookie_name(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            sanitize_tokens: true,
        }
    }
}

// Helper functions for serde defaults
fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_body_limit() -> usize {
    1024 * 1024
}

fn default_base_url() -> String {
    "http://127.0.0.1:4000/api".to_string()
}

fn default_timeout() -> u64 {
    15
}

fn default_connect_timeout() -> u64 {
    5
}

fn default_pool_size() -> usize {
    32
}

fn default_cookie_name() -> String {
    crate::auth::DEFAULT_COOKIE_NAME.to_string()
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}
