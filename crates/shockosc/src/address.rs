//! OSC address model
//!
//! Inbound addresses are classified into a [`Route`] by plain pattern
//! matching over their segments. Everything under the app namespace is
//! `<GroupName>[_<Action>]`, split on the last underscore.

/// Root of every avatar parameter address.
pub const AVATAR_PARAMETERS: &str = "/avatar/parameters/";

/// Our namespace below the avatar parameter root.
pub const APP_NAMESPACE: &str = "ShockOsc/";

/// Sent by the game when the wearer switches avatars.
pub const AVATAR_CHANGE: &str = "/avatar/change";

/// Game input toggling the microphone.
pub const VOICE_INPUT: &str = "/input/Voice";

/// Game input that shows text above the avatar.
pub const CHATBOX_INPUT: &str = "/chatbox/input";

/// Pseudo group carrying the aggregate feedback of all groups.
pub const AGGREGATE_GROUP: &str = "_Any";

const CONFIG_PREFIX: &str = "_Config/";

/// Full address of a parameter local to our namespace.
pub fn app_address(local: &str) -> String {
    format!("{AVATAR_PARAMETERS}{APP_NAMESPACE}{local}")
}

/// Per-group parameter suffixes we recognise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Bare group name, the manual trigger parameter.
    Trigger,
    Stretch,
    IsGrabbed,
    Cooldown,
    Active,
    Intensity,
    CooldownPercentage,
    /// Instant shock, fires without hold-time debounce.
    IShock,
}

impl Action {
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "" => Some(Action::Trigger),
            "Stretch" => Some(Action::Stretch),
            "IsGrabbed" => Some(Action::IsGrabbed),
            "Cooldown" => Some(Action::Cooldown),
            "Active" => Some(Action::Active),
            "Intensity" => Some(Action::Intensity),
            "CooldownPercentage" => Some(Action::CooldownPercentage),
            "IShock" => Some(Action::IShock),
            _ => None,
        }
    }

    pub fn suffix(&self) -> &'static str {
        match self {
            Action::Trigger => "",
            Action::Stretch => "Stretch",
            Action::IsGrabbed => "IsGrabbed",
            Action::Cooldown => "Cooldown",
            Action::Active => "Active",
            Action::Intensity => "Intensity",
            Action::CooldownPercentage => "CooldownPercentage",
            Action::IShock => "IShock",
        }
    }

    /// Output-only parameters we publish and never consume.
    pub fn is_feedback(&self) -> bool {
        matches!(
            self,
            Action::Cooldown | Action::Active | Action::Intensity | Action::CooldownPercentage
        )
    }
}

/// Where an inbound address goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route<'a> {
    AvatarChange,
    Afk,
    MuteSelf,
    /// Any other avatar parameter outside our namespace.
    AvatarParameter,
    /// `_Config/...` command, path relative to our namespace.
    Config(&'a str),
    Shocker {
        /// `<group>_<action>` as it appears below our namespace.
        key: &'a str,
        group: &'a str,
        /// `None` when the suffix is not one we recognise.
        action: Option<Action>,
    },
    Unrouted,
}

/// Parameter name below the avatar parameter root.
pub fn avatar_parameter_name(address: &str) -> Option<&str> {
    address.strip_prefix(AVATAR_PARAMETERS)
}

/// Parameter name below our namespace.
pub fn app_parameter_name(address: &str) -> Option<&str> {
    avatar_parameter_name(address)?.strip_prefix(APP_NAMESPACE)
}

pub fn classify(address: &str) -> Route<'_> {
    if address == AVATAR_CHANGE {
        return Route::AvatarChange;
    }

    let Some(name) = avatar_parameter_name(address) else {
        return Route::Unrouted;
    };

    match name {
        "AFK" => return Route::Afk,
        "MuteSelf" => return Route::MuteSelf,
        _ => {}
    }

    let Some(key) = name.strip_prefix(APP_NAMESPACE) else {
        return Route::AvatarParameter;
    };

    if key.starts_with(CONFIG_PREFIX) {
        return Route::Config(key);
    }

    let (group, suffix) = split_group_action(key);
    Route::Shocker {
        key,
        group,
        action: Action::from_suffix(suffix),
    }
}

/// Split on the last underscore. A leading underscore is part of the name,
/// so `_Any` stays whole while `_Any_Active` splits.
pub fn split_group_action(key: &str) -> (&str, &str) {
    match key.rfind('_') {
        Some(index) if index > 0 => (&key[..index], &key[index + 1..]),
        _ => (key, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_without_underscore_is_trigger() {
        assert_eq!(split_group_action("Leg"), ("Leg", ""));
    }

    #[test]
    fn split_uses_last_underscore() {
        assert_eq!(split_group_action("Left_Leg_IShock"), ("Left_Leg", "IShock"));
        assert_eq!(split_group_action("Leg_"), ("Leg", ""));
    }

    #[test]
    fn split_keeps_leading_underscore() {
        assert_eq!(split_group_action("_Any"), ("_Any", ""));
        assert_eq!(split_group_action("_Any_Active"), ("_Any", "Active"));
    }

    #[test]
    fn classify_global_flags() {
        assert_eq!(classify("/avatar/parameters/AFK"), Route::Afk);
        assert_eq!(classify("/avatar/parameters/MuteSelf"), Route::MuteSelf);
        assert_eq!(classify("/avatar/change"), Route::AvatarChange);
    }

    #[test]
    fn classify_foreign_parameters() {
        assert_eq!(classify("/avatar/parameters/VelocityX"), Route::AvatarParameter);
        assert_eq!(classify("/input/Jump"), Route::Unrouted);
    }

    #[test]
    fn classify_config_commands() {
        assert_eq!(
            classify("/avatar/parameters/ShockOsc/_Config/_All/KillSwitch"),
            Route::Config("_Config/_All/KillSwitch")
        );
    }

    #[test]
    fn classify_shocker_actions() {
        assert_eq!(
            classify("/avatar/parameters/ShockOsc/Leg_IShock"),
            Route::Shocker {
                key: "Leg_IShock",
                group: "Leg",
                action: Some(Action::IShock)
            }
        );
        assert_eq!(
            classify("/avatar/parameters/ShockOsc/Leg"),
            Route::Shocker {
                key: "Leg",
                group: "Leg",
                action: Some(Action::Trigger)
            }
        );
        assert_eq!(
            classify("/avatar/parameters/ShockOsc/Leg_Wiggle"),
            Route::Shocker {
                key: "Leg_Wiggle",
                group: "Leg",
                action: None
            }
        );
    }

    #[test]
    fn action_suffix_roundtrip() {
        for action in [
            Action::Trigger,
            Action::Stretch,
            Action::IsGrabbed,
            Action::Cooldown,
            Action::Active,
            Action::Intensity,
            Action::CooldownPercentage,
            Action::IShock,
        ] {
            assert_eq!(Action::from_suffix(action.suffix()), Some(action));
        }
        assert!(Action::Active.is_feedback());
        assert!(!Action::IShock.is_feedback());
    }

    #[test]
    fn app_address_formats() {
        assert_eq!(app_address("_Any_Active"), "/avatar/parameters/ShockOsc/_Any_Active");
        assert_eq!(app_parameter_name("/avatar/parameters/ShockOsc/Leg"), Some("Leg"));
    }
}
