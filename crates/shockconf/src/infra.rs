//! Infrastructure configuration - things that cannot change at runtime.

use serde::{Deserialize, Serialize};

/// Game client OSC endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OscConfig {
    /// Host the game client listens on.
    /// Default: 127.0.0.1
    #[serde(default = "OscConfig::default_host")]
    pub host: String,

    /// Port the game client receives OSC on (we send here).
    /// Default: 9000
    #[serde(default = "OscConfig::default_send_port")]
    pub send_port: u16,

    /// Port we receive OSC on (the game sends here).
    /// Default: 9001
    #[serde(default = "OscConfig::default_receive_port")]
    pub receive_port: u16,

    /// OSCQuery HTTP root of the game client, used to fetch the full
    /// avatar parameter set after an avatar change. Empty disables it.
    #[serde(default)]
    pub oscquery_url: String,

    /// Send chatbox messages for local and remote actions.
    /// Default: true
    #[serde(default = "OscConfig::default_chatbox")]
    pub chatbox: bool,
}

impl OscConfig {
    fn default_host() -> String {
        "127.0.0.1".to_string()
    }

    fn default_send_port() -> u16 {
        9000
    }

    fn default_receive_port() -> u16 {
        9001
    }

    fn default_chatbox() -> bool {
        true
    }

    /// `host:port` of the game's OSC input.
    pub fn send_address(&self) -> String {
        format!("{}:{}", self.host, self.send_port)
    }
}

impl Default for OscConfig {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            send_port: Self::default_send_port(),
            receive_port: Self::default_receive_port(),
            oscquery_url: String::new(),
            chatbox: Self::default_chatbox(),
        }
    }
}

/// Remote control API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackendConfig {
    /// API base URL.
    /// Default: https://api.openshock.app
    #[serde(default = "BackendConfig::default_api_url")]
    pub api_url: String,

    /// API token sent with every control request.
    #[serde(default)]
    pub api_token: String,

    /// Display name attached to control requests.
    /// Default: ShockOsc
    #[serde(default = "BackendConfig::default_custom_name")]
    pub custom_name: String,

    /// Request timeout in milliseconds.
    /// Default: 10000
    #[serde(default = "BackendConfig::default_timeout_ms")]
    pub timeout_ms: u64,
}

impl BackendConfig {
    fn default_api_url() -> String {
        "https://api.openshock.app".to_string()
    }

    fn default_custom_name() -> String {
        "ShockOsc".to_string()
    }

    fn default_timeout_ms() -> u64 {
        10_000
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            api_url: Self::default_api_url(),
            api_token: String::new(),
            custom_name: Self::default_custom_name(),
            timeout_ms: Self::default_timeout_ms(),
        }
    }
}

/// Telemetry and observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TelemetryConfig {
    /// OTLP gRPC endpoint for OpenTelemetry. Empty means console only.
    #[serde(default)]
    pub otlp_endpoint: String,

    /// Log level (trace, debug, info, warn, error) or an EnvFilter directive.
    /// Default: info
    #[serde(default = "TelemetryConfig::default_log_level")]
    pub log_level: String,
}

impl TelemetryConfig {
    fn default_log_level() -> String {
        "info".to_string()
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            otlp_endpoint: String::new(),
            log_level: Self::default_log_level(),
        }
    }
}
