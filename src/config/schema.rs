//! Configuration schema definitions.
//!
//! Process settings for the gateway. These are distinct from the proxy
//! targets held in the config store: this file is read once at startup.

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway process.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, body limit, CORS).
    pub listener: ListenerConfig,

    /// Where proxy target definitions are persisted.
    pub store: StoreConfig,

    /// Outbound call settings.
    pub upstream: UpstreamConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3001").
    pub bind_address: String,

    /// Maximum inbound request body size in bytes.
    pub max_body_size: usize,

    /// Allow any origin, method and header.
    pub cors_permissive: bool,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3001".to_string(),
            max_body_size: 2 * 1024 * 1024, // 2MB
            cors_permissive: true,
        }
    }
}

/// Config store location.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Path of the JSON document holding all proxy targets.
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: "db.json".to_string(),
        }
    }
}

/// Outbound request settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Deadline for proxied calls in seconds.
    pub request_timeout_secs: u64,

    /// Deadline for connectivity tests in seconds.
    pub test_timeout_secs: u64,

    /// User-Agent sent upstream.
    pub user_agent: String,

    /// Honour HTTP(S)_PROXY environment variables for upstream calls.
    pub use_system_proxy: bool,

    /// Largest upstream response body read, in bytes.
    pub max_response_size: usize,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            test_timeout_secs: 10,
            user_agent: concat!("api-relay/", env!("CARGO_PKG_VERSION")).to_string(),
            use_system_proxy: true,
            max_response_size: 10 * 1024 * 1024, // 10MB
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// "pretty" for development, "json" for log shipping.
    pub log_format: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
