//! Configuration loading for ShockOsc.
//!
//! # Configuration Philosophy
//!
//! Configuration is split into two categories:
//!
//! - **Infrastructure** (`OscConfig`, `BackendConfig`, `TelemetryConfig`):
//!   endpoints and credentials that are fixed for the lifetime of the process.
//!
//! - **Behaviour** (`BehaviourConfig`, `ChatboxConfig`, groups): initial
//!   values that seed runtime state. Avatar-side `_Config` commands may
//!   change them while a session runs.
//!
//! # Config File Locations
//!
//! Files are loaded in order (later wins, merged table by table):
//! 1. `/etc/shockosc/config.toml` (system)
//! 2. `~/.config/shockosc/config.toml` (user)
//! 3. `./shockosc.toml` (local override, or the path given on the CLI)
//! 4. Environment variables (`SHOCKOSC_*`)
//!
//! # Example Config
//!
//! ```toml
//! [osc]
//! host = "127.0.0.1"
//! send_port = 9000
//! receive_port = 9001
//!
//! [backend]
//! api_token = "..."
//!
//! [behaviour]
//! cooldown_time = 5000
//! intensity_range = { min = 10, max = 40 }
//!
//! [groups.5f0e9c1e-7a43-4c35-9c8e-2b1d3f8a6e10]
//! name = "Leg"
//! shockers = ["0b6b1a9e-4a53-4e0b-8f6e-7a2a1f6c9d11"]
//! ```

pub mod behaviour;
pub mod infra;
pub mod loader;

pub use behaviour::{
    BehaviourConfig, BoneHeldAction, ChatboxConfig, ChatboxTemplate, ControlType, DurationRange,
    GroupConfig, GroupsConfig, IntensityRange, MAX_DURATION_MS, MAX_INTENSITY, MIN_DURATION_MS,
};
pub use infra::{BackendConfig, OscConfig, TelemetryConfig};
pub use loader::{discover_config_files_with_override, ConfigSources};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Complete ShockOsc configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ShockOscConfig {
    #[serde(default)]
    pub osc: OscConfig,

    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,

    #[serde(default)]
    pub behaviour: BehaviourConfig,

    #[serde(default)]
    pub chatbox: ChatboxConfig,

    /// Group id to device list.
    #[serde(default)]
    pub groups: GroupsConfig,
}

impl ShockOscConfig {
    /// Load configuration from all sources.
    pub fn load() -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(None)?;
        Ok(config)
    }

    /// Load configuration with `config_path` replacing the local override.
    pub fn load_from(config_path: Option<&std::path::Path>) -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(config_path)?;
        Ok(config)
    }

    /// Load configuration from optional path and return information about sources.
    pub fn load_with_sources_from(
        config_path: Option<&std::path::Path>,
    ) -> Result<(Self, ConfigSources), ConfigError> {
        let mut sources = ConfigSources::default();
        let mut merged = toml::Table::new();

        for path in loader::discover_config_files_with_override(config_path) {
            let table = loader::load_table(&path)?;
            loader::merge_tables(&mut merged, table);
            sources.files.push(path);
        }

        let mut config = loader::from_table(merged, sources.files.last())?;
        loader::apply_env_overrides(&mut config, &mut sources);
        config.validate()?;

        Ok((config, sources))
    }

    /// Check cross-field constraints the types cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let b = &self.behaviour;

        if b.intensity_range.min > b.intensity_range.max {
            return Err(ConfigError::Invalid(format!(
                "intensity_range.min ({}) is greater than intensity_range.max ({})",
                b.intensity_range.min, b.intensity_range.max
            )));
        }
        if b.intensity_range.max > MAX_INTENSITY {
            return Err(ConfigError::Invalid(format!(
                "intensity_range.max ({}) exceeds {}",
                b.intensity_range.max, MAX_INTENSITY
            )));
        }
        if b.fixed_intensity > MAX_INTENSITY {
            return Err(ConfigError::Invalid(format!(
                "fixed_intensity ({}) exceeds {}",
                b.fixed_intensity, MAX_INTENSITY
            )));
        }
        if b.duration_range.min > b.duration_range.max {
            return Err(ConfigError::Invalid(format!(
                "duration_range.min ({}) is greater than duration_range.max ({})",
                b.duration_range.min, b.duration_range.max
            )));
        }
        for (field, value) in [
            ("duration_range.min", b.duration_range.min),
            ("duration_range.max", b.duration_range.max),
            ("fixed_duration", b.fixed_duration),
        ] {
            if !(MIN_DURATION_MS..=MAX_DURATION_MS).contains(&value) {
                return Err(ConfigError::Invalid(format!(
                    "{field} ({value}) must be within {MIN_DURATION_MS}..={MAX_DURATION_MS} ms"
                )));
            }
        }
        if b.random_duration_step == 0 {
            return Err(ConfigError::Invalid(
                "random_duration_step must be greater than zero".to_string(),
            ));
        }

        let mut names = std::collections::HashSet::new();
        for (id, group) in &self.groups {
            if !names.insert(group.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "group name {:?} ({}) is used by more than one group",
                    group.name, id
                )));
            }
        }

        Ok(())
    }

    /// Serialize config to TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        let body = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::Invalid(format!("failed to serialize config: {e}")))?;
        Ok(format!("# ShockOsc Configuration\n\n{body}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_default_config() {
        let config = ShockOscConfig::default();
        assert_eq!(config.osc.send_port, 9000);
        assert!(config.groups.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_to_toml() {
        let mut config = ShockOscConfig::default();
        config.groups.insert(
            Uuid::nil(),
            GroupConfig {
                name: "Leg".to_string(),
                shockers: vec![Uuid::nil()],
            },
        );
        let toml = config.to_toml().unwrap();
        assert!(toml.contains("[osc]"));
        assert!(toml.contains("[behaviour]"));
        assert!(toml.contains("Leg"));
    }

    #[test]
    fn test_to_toml_parses_back() {
        let mut config = ShockOscConfig::default();
        config.behaviour.cooldown_time = 1234;
        let toml = config.to_toml().unwrap();
        let parsed: ShockOscConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.behaviour.cooldown_time, 1234);
    }

    #[test]
    fn test_validate_rejects_inverted_intensity() {
        let mut config = ShockOscConfig::default();
        config.behaviour.intensity_range = IntensityRange { min: 50, max: 10 };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_intensity_over_max() {
        let mut config = ShockOscConfig::default();
        config.behaviour.fixed_intensity = 101;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_step() {
        let mut config = ShockOscConfig::default();
        config.behaviour.random_duration_step = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_short_duration() {
        let mut config = ShockOscConfig::default();
        config.behaviour.fixed_duration = 100;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_duplicate_group_names() {
        let mut config = ShockOscConfig::default();
        for id in [1, 2] {
            config.groups.insert(
                Uuid::from_u128(id),
                GroupConfig {
                    name: "Leg".to_string(),
                    shockers: vec![],
                },
            );
        }
        assert!(config.validate().is_err());
    }
}
