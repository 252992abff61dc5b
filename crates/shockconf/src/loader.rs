//! Config file discovery, loading, and environment variable overlay.

use crate::{ConfigError, ShockOscConfig};
use std::env;
use std::path::{Path, PathBuf};

/// Information about where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Config files that were loaded (in order)
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values
    pub env_overrides: Vec<String>,
}

/// Discover config files in standard locations.
pub fn discover_config_files() -> Vec<PathBuf> {
    discover_config_files_with_override(None)
}

/// Discover config files, optionally with a CLI override path.
///
/// If `cli_path` is provided and exists, it replaces the local override.
/// Returns paths in load order (system, user, local/cli).
pub fn discover_config_files_with_override(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let system = PathBuf::from("/etc/shockosc/config.toml");
    if system.exists() {
        files.push(system);
    }

    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("shockosc/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    if let Some(path) = cli_path {
        if path.exists() {
            files.push(path.to_path_buf());
            return files;
        }
    }

    let local = PathBuf::from("shockosc.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

/// Read a TOML file as a raw table.
pub fn load_table(path: &Path) -> Result<toml::Table, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    parse_table(&contents, path)
}

fn parse_table(contents: &str, path: &Path) -> Result<toml::Table, ConfigError> {
    contents.parse().map_err(|e: toml::de::Error| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Deep-merge `overlay` into `base`. Nested tables merge key by key,
/// everything else (including arrays) is replaced.
pub fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

/// Deserialize a merged table. `origin` only labels parse errors.
pub fn from_table(table: toml::Table, origin: Option<&PathBuf>) -> Result<ShockOscConfig, ConfigError> {
    toml::Value::Table(table).try_into().map_err(|e: toml::de::Error| ConfigError::Parse {
        path: origin.cloned().unwrap_or_else(|| PathBuf::from("<merged>")),
        message: e.to_string(),
    })
}

/// Apply environment variable overrides to config.
pub fn apply_env_overrides(config: &mut ShockOscConfig, sources: &mut ConfigSources) {
    if let Ok(v) = env::var("SHOCKOSC_API_URL") {
        config.backend.api_url = v;
        sources.env_overrides.push("SHOCKOSC_API_URL".to_string());
    }
    if let Ok(v) = env::var("SHOCKOSC_API_TOKEN") {
        config.backend.api_token = v;
        sources.env_overrides.push("SHOCKOSC_API_TOKEN".to_string());
    }

    if let Ok(v) = env::var("SHOCKOSC_OSC_HOST") {
        config.osc.host = v;
        sources.env_overrides.push("SHOCKOSC_OSC_HOST".to_string());
    }
    if let Ok(v) = env::var("SHOCKOSC_OSC_SEND_PORT") {
        if let Ok(port) = v.parse() {
            config.osc.send_port = port;
            sources.env_overrides.push("SHOCKOSC_OSC_SEND_PORT".to_string());
        }
    }
    if let Ok(v) = env::var("SHOCKOSC_OSC_RECEIVE_PORT") {
        if let Ok(port) = v.parse() {
            config.osc.receive_port = port;
            sources.env_overrides.push("SHOCKOSC_OSC_RECEIVE_PORT".to_string());
        }
    }

    if let Ok(v) = env::var("SHOCKOSC_OTLP_ENDPOINT") {
        config.telemetry.otlp_endpoint = v;
        sources.env_overrides.push("SHOCKOSC_OTLP_ENDPOINT".to_string());
    }
    if let Ok(v) = env::var("SHOCKOSC_LOG_LEVEL") {
        config.telemetry.log_level = v;
        sources.env_overrides.push("SHOCKOSC_LOG_LEVEL".to_string());
    }
    // Also support RUST_LOG
    if let Ok(v) = env::var("RUST_LOG") {
        config.telemetry.log_level = v;
        sources.env_overrides.push("RUST_LOG".to_string());
    }
}
