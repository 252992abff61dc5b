//! Behaviour configuration - seeds runtime state, then `_Config` commands
//! may adjust it while the session runs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Highest intensity the control API accepts.
pub const MAX_INTENSITY: u8 = 100;

/// Shortest and longest duration the control API accepts, in milliseconds.
pub const MIN_DURATION_MS: u32 = 300;
pub const MAX_DURATION_MS: u32 = 30_000;

/// Kind of control command sent to a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlType {
    #[serde(alias = "Stop")]
    Stop,
    #[serde(alias = "Shock")]
    Shock,
    #[serde(alias = "Vibrate")]
    Vibrate,
    #[serde(alias = "Sound")]
    Sound,
}

impl ControlType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControlType::Stop => "stop",
            ControlType::Shock => "shock",
            ControlType::Vibrate => "vibrate",
            ControlType::Sound => "sound",
        }
    }
}

impl std::fmt::Display for ControlType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What to do while a PhysBone is grabbed and not yet released.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoneHeldAction {
    #[default]
    None,
    Vibrate,
    Shock,
}

impl BoneHeldAction {
    /// Control type used for held pulses, `None` when disabled.
    pub fn control_type(&self) -> Option<ControlType> {
        match self {
            BoneHeldAction::None => None,
            BoneHeldAction::Vibrate => Some(ControlType::Vibrate),
            BoneHeldAction::Shock => Some(ControlType::Shock),
        }
    }
}

/// Inclusive-exclusive intensity bounds used for random intensity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntensityRange {
    pub min: u8,
    pub max: u8,
}

impl Default for IntensityRange {
    fn default() -> Self {
        Self { min: 1, max: 30 }
    }
}

/// Inclusive-exclusive duration bounds in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DurationRange {
    pub min: u32,
    pub max: u32,
}

impl Default for DurationRange {
    fn default() -> Self {
        Self {
            min: 1_000,
            max: 5_000,
        }
    }
}

/// Trigger policy: intensity, duration, debounce and gating.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BehaviourConfig {
    #[serde(default = "BehaviourConfig::default_true")]
    pub random_intensity: bool,

    #[serde(default)]
    pub intensity_range: IntensityRange,

    /// Used when `random_intensity` is off.
    #[serde(default = "BehaviourConfig::default_fixed_intensity")]
    pub fixed_intensity: u8,

    #[serde(default = "BehaviourConfig::default_true")]
    pub random_duration: bool,

    #[serde(default)]
    pub duration_range: DurationRange,

    /// Random durations are whole multiples of this step (ms).
    #[serde(default = "BehaviourConfig::default_random_duration_step")]
    pub random_duration_step: u32,

    /// Used when `random_duration` is off (ms).
    #[serde(default = "BehaviourConfig::default_fixed_duration")]
    pub fixed_duration: u32,

    /// How long a manual trigger must stay true before it fires (ms).
    #[serde(default = "BehaviourConfig::default_hold_time")]
    pub hold_time: u32,

    /// Quiet window after an execution ends (ms).
    #[serde(default = "BehaviourConfig::default_cooldown_time")]
    pub cooldown_time: u32,

    #[serde(default = "BehaviourConfig::default_true")]
    pub disable_while_afk: bool,

    /// Toggle the microphone back on when a shock lands while muted.
    #[serde(default)]
    pub force_unmute: bool,

    #[serde(default)]
    pub while_bone_held: BoneHeldAction,
}

impl BehaviourConfig {
    fn default_true() -> bool {
        true
    }

    fn default_fixed_intensity() -> u8 {
        50
    }

    fn default_random_duration_step() -> u32 {
        100
    }

    fn default_fixed_duration() -> u32 {
        2_000
    }

    fn default_hold_time() -> u32 {
        250
    }

    fn default_cooldown_time() -> u32 {
        5_000
    }
}

impl Default for BehaviourConfig {
    fn default() -> Self {
        Self {
            random_intensity: true,
            intensity_range: IntensityRange::default(),
            fixed_intensity: Self::default_fixed_intensity(),
            random_duration: true,
            duration_range: DurationRange::default(),
            random_duration_step: Self::default_random_duration_step(),
            fixed_duration: Self::default_fixed_duration(),
            hold_time: Self::default_hold_time(),
            cooldown_time: Self::default_cooldown_time(),
            disable_while_afk: true,
            force_unmute: false,
            while_bone_held: BoneHeldAction::None,
        }
    }
}

/// Chat message templates for one control type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatboxTemplate {
    #[serde(default = "ChatboxTemplate::default_enabled")]
    pub enabled: bool,
    /// Triggered by this client.
    #[serde(default)]
    pub local: String,
    /// Triggered remotely by a user without a custom name.
    #[serde(default)]
    pub remote: String,
    /// Triggered remotely by a user with a custom display name.
    #[serde(default)]
    pub remote_with_custom_name: String,
}

impl ChatboxTemplate {
    fn default_enabled() -> bool {
        true
    }

    fn with_symbol(symbol: &str, enabled: bool) -> Self {
        Self {
            enabled,
            local: format!("{symbol} {{{{ShockerName}}}} {{{{Intensity}}}}%:{{{{DurationSeconds}}}}s"),
            remote: format!(
                "{{{{Name}}}} {symbol} {{{{ShockerName}}}} {{{{Intensity}}}}%:{{{{DurationSeconds}}}}s"
            ),
            remote_with_custom_name: format!(
                "{{{{CustomName}}}} [{{{{Name}}}}] {symbol} {{{{ShockerName}}}} {{{{Intensity}}}}%:{{{{DurationSeconds}}}}s"
            ),
        }
    }

    /// Built-in templates for a control type.
    pub fn default_for(control: ControlType) -> Self {
        match control {
            ControlType::Shock => Self::with_symbol("⚡", true),
            ControlType::Vibrate => Self::with_symbol("〜", true),
            ControlType::Sound => Self::with_symbol("🔈", true),
            ControlType::Stop => Self::with_symbol("⏹", false),
        }
    }
}

/// Chatbox integration settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatboxConfig {
    /// Prepended to every message.
    #[serde(default = "ChatboxConfig::default_prefix")]
    pub prefix: String,

    /// Sent when the kill switch suppresses an action. Empty disables it.
    #[serde(default = "ChatboxConfig::default_ignored_kill_switch_active")]
    pub ignored_kill_switch_active: String,

    /// Sent when AFK suppresses an action. Empty disables it.
    #[serde(default = "ChatboxConfig::default_ignored_afk")]
    pub ignored_afk: String,

    #[serde(default = "ChatboxConfig::default_display_remote_control")]
    pub display_remote_control: bool,

    /// Per control type overrides of the built-in templates.
    #[serde(default)]
    pub types: BTreeMap<ControlType, ChatboxTemplate>,
}

impl ChatboxConfig {
    fn default_prefix() -> String {
        "[ShockOsc] ".to_string()
    }

    fn default_ignored_kill_switch_active() -> String {
        "Ignoring shock, kill switch is active".to_string()
    }

    fn default_ignored_afk() -> String {
        "Ignoring shock, user is AFK".to_string()
    }

    fn default_display_remote_control() -> bool {
        true
    }

    /// Configured template for `control`, falling back to the built-in one.
    pub fn template(&self, control: ControlType) -> ChatboxTemplate {
        self.types
            .get(&control)
            .cloned()
            .unwrap_or_else(|| ChatboxTemplate::default_for(control))
    }
}

impl Default for ChatboxConfig {
    fn default() -> Self {
        Self {
            prefix: Self::default_prefix(),
            ignored_kill_switch_active: Self::default_ignored_kill_switch_active(),
            ignored_afk: Self::default_ignored_afk(),
            display_remote_control: Self::default_display_remote_control(),
            types: BTreeMap::new(),
        }
    }
}

/// A named set of devices addressed as one unit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GroupConfig {
    pub name: String,
    #[serde(default)]
    pub shockers: Vec<Uuid>,
}

/// Group id to group definition.
pub type GroupsConfig = BTreeMap<Uuid, GroupConfig>;
