//! Avatar-side configuration commands.
//!
//! Avatars can carry `ShockOsc/_Config/_All/<Setting>` parameters (menu
//! toggles and radials) that adjust behaviour at runtime. Floats arrive
//! normalized to `[0, 1]` and are scaled to the setting's range; the same
//! addresses are used to publish the current values back.

use crate::address::app_address;
use crate::policy::clamp01;
use crate::registry::ParamValue;
use rosc::{OscMessage, OscType};
use shockconf::{BehaviourConfig, MAX_DURATION_MS, MAX_INTENSITY, MIN_DURATION_MS};
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

const CONFIG_PREFIX: &str = "_Config/";
const ALL_TARGET: &str = "_All";

const HOLD_TIME_SCALE_MS: f32 = 1_000.0;
const COOLDOWN_TIME_SCALE_MS: f32 = 100_000.0;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigCommandError {
    #[error("malformed config command {0:?}")]
    Malformed(String),

    #[error("config target {0:?} is not supported, only _All is")]
    UnsupportedTarget(String),

    #[error("unknown config setting {0:?}")]
    UnknownSetting(String),

    #[error("config setting {setting} expects a {expected} value")]
    WrongType {
        setting: &'static str,
        expected: &'static str,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Setting {
    KillSwitch,
    ModeIntensity,
    ModeDuration,
    MinIntensity,
    MaxIntensity,
    Intensity,
    MinDuration,
    MaxDuration,
    Duration,
    HoldTime,
    CooldownTime,
}

impl Setting {
    pub const ALL: [Setting; 11] = [
        Setting::KillSwitch,
        Setting::ModeIntensity,
        Setting::ModeDuration,
        Setting::MinIntensity,
        Setting::MaxIntensity,
        Setting::Intensity,
        Setting::MinDuration,
        Setting::MaxDuration,
        Setting::Duration,
        Setting::HoldTime,
        Setting::CooldownTime,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.name() == name)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Setting::KillSwitch => "KillSwitch",
            Setting::ModeIntensity => "ModeIntensity",
            Setting::ModeDuration => "ModeDuration",
            Setting::MinIntensity => "MinIntensity",
            Setting::MaxIntensity => "MaxIntensity",
            Setting::Intensity => "Intensity",
            Setting::MinDuration => "MinDuration",
            Setting::MaxDuration => "MaxDuration",
            Setting::Duration => "Duration",
            Setting::HoldTime => "HoldTime",
            Setting::CooldownTime => "CooldownTime",
        }
    }

    pub fn is_bool(&self) -> bool {
        matches!(
            self,
            Setting::KillSwitch | Setting::ModeIntensity | Setting::ModeDuration
        )
    }

    pub fn address(&self) -> String {
        app_address(&format!("{CONFIG_PREFIX}{ALL_TARGET}/{}", self.name()))
    }
}

/// Runtime-adjustable settings. The kill switch lives here; everything
/// else is written into the shared behaviour config.
#[derive(Debug, Default)]
pub struct UnderscoreConfig {
    kill_switch: AtomicBool,
}

impl UnderscoreConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kill_switch(&self) -> bool {
        self.kill_switch.load(Ordering::Relaxed)
    }

    pub fn set_kill_switch(&self, active: bool) {
        self.kill_switch.store(active, Ordering::Relaxed);
    }

    /// Apply `_Config/<target>/<setting>` with `value`.
    pub fn handle(
        &self,
        path: &str,
        value: &ParamValue,
        behaviour: &mut BehaviourConfig,
    ) -> Result<Setting, ConfigCommandError> {
        let (target, name) = path
            .strip_prefix(CONFIG_PREFIX)
            .and_then(|rest| rest.split_once('/'))
            .ok_or_else(|| ConfigCommandError::Malformed(path.to_string()))?;

        if target != ALL_TARGET {
            return Err(ConfigCommandError::UnsupportedTarget(target.to_string()));
        }

        let setting = Setting::from_name(name)
            .ok_or_else(|| ConfigCommandError::UnknownSetting(name.to_string()))?;

        if setting.is_bool() {
            let flag = value.as_bool().ok_or(ConfigCommandError::WrongType {
                setting: setting.name(),
                expected: "bool",
            })?;
            match setting {
                Setting::KillSwitch => self.set_kill_switch(flag),
                Setting::ModeIntensity => behaviour.random_intensity = flag,
                Setting::ModeDuration => behaviour.random_duration = flag,
                _ => {}
            }
            return Ok(setting);
        }

        let fraction = clamp01(value.as_float().ok_or(ConfigCommandError::WrongType {
            setting: setting.name(),
            expected: "float",
        })?);

        match setting {
            // A bound moved past the other one drags it along.
            Setting::MinIntensity => {
                let range = &mut behaviour.intensity_range;
                range.min = to_intensity(fraction);
                range.max = range.max.max(range.min);
            }
            Setting::MaxIntensity => {
                let range = &mut behaviour.intensity_range;
                range.max = to_intensity(fraction);
                range.min = range.min.min(range.max);
            }
            Setting::Intensity => behaviour.fixed_intensity = to_intensity(fraction),
            Setting::MinDuration => {
                let range = &mut behaviour.duration_range;
                range.min = to_duration(fraction);
                range.max = range.max.max(range.min);
            }
            Setting::MaxDuration => {
                let range = &mut behaviour.duration_range;
                range.max = to_duration(fraction);
                range.min = range.min.min(range.max);
            }
            Setting::Duration => behaviour.fixed_duration = to_duration(fraction),
            Setting::HoldTime => behaviour.hold_time = (fraction * HOLD_TIME_SCALE_MS).round() as u32,
            Setting::CooldownTime => {
                behaviour.cooldown_time = (fraction * COOLDOWN_TIME_SCALE_MS).round() as u32
            }
            _ => {}
        }

        Ok(setting)
    }

    /// Current value of every setting, addressed the way the avatar reads it.
    pub fn announce_all(&self, behaviour: &BehaviourConfig) -> Vec<OscMessage> {
        Setting::ALL
            .into_iter()
            .map(|setting| OscMessage {
                addr: setting.address(),
                args: vec![self.current(setting, behaviour)],
            })
            .collect()
    }

    fn current(&self, setting: Setting, behaviour: &BehaviourConfig) -> OscType {
        let intensity = |v: u8| OscType::Float(f32::from(v) / f32::from(MAX_INTENSITY));
        let duration = |v: u32| OscType::Float(clamp01(v as f32 / MAX_DURATION_MS as f32));

        match setting {
            Setting::KillSwitch => OscType::Bool(self.kill_switch()),
            Setting::ModeIntensity => OscType::Bool(behaviour.random_intensity),
            Setting::ModeDuration => OscType::Bool(behaviour.random_duration),
            Setting::MinIntensity => intensity(behaviour.intensity_range.min),
            Setting::MaxIntensity => intensity(behaviour.intensity_range.max),
            Setting::Intensity => intensity(behaviour.fixed_intensity),
            Setting::MinDuration => duration(behaviour.duration_range.min),
            Setting::MaxDuration => duration(behaviour.duration_range.max),
            Setting::Duration => duration(behaviour.fixed_duration),
            Setting::HoldTime => {
                OscType::Float(clamp01(behaviour.hold_time as f32 / HOLD_TIME_SCALE_MS))
            }
            Setting::CooldownTime => {
                OscType::Float(clamp01(behaviour.cooldown_time as f32 / COOLDOWN_TIME_SCALE_MS))
            }
        }
    }
}

fn to_intensity(fraction: f32) -> u8 {
    (fraction * f32::from(MAX_INTENSITY)).round() as u8
}

/// Durations below the API minimum are raised to it.
fn to_duration(fraction: f32) -> u32 {
    ((fraction * MAX_DURATION_MS as f32).round() as u32).clamp(MIN_DURATION_MS, MAX_DURATION_MS)
}
