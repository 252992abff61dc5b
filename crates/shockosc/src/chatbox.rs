//! Chatbox text.
//!
//! Templates are handlebars with escaping off, rendered against
//! [`ChatData`]. Every message gets the configured prefix.

use crate::check::Suppression;
use handlebars::{Handlebars, RenderError};
use serde::Serialize;
use shockconf::{ChatboxConfig, ControlType};

/// Template variables.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ChatData {
    pub shocker_name: String,
    pub intensity: u8,
    pub intensity_percentage: u8,
    /// Milliseconds.
    pub duration: u32,
    pub duration_seconds: String,
    pub name: Option<String>,
    pub custom_name: Option<String>,
}

impl ChatData {
    pub fn local(shocker_name: &str, intensity: u8, intensity_percentage: u8, duration: u32) -> Self {
        Self {
            shocker_name: shocker_name.to_string(),
            intensity,
            intensity_percentage,
            duration,
            duration_seconds: seconds(duration),
            ..Self::default()
        }
    }
}

/// Milliseconds as seconds with at most one decimal.
pub fn seconds(duration_ms: u32) -> String {
    let tenths = (f64::from(duration_ms) / 100.0).round();
    format!("{}", tenths / 10.0)
}

pub struct ChatFormatter {
    handlebars: Handlebars<'static>,
}

impl Default for ChatFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatFormatter {
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();
        handlebars.register_escape_fn(handlebars::no_escape);
        Self { handlebars }
    }

    pub fn render(&self, template: &str, data: &ChatData) -> Result<String, RenderError> {
        self.handlebars.render_template(template, data)
    }

    /// Message for an action this client triggered. `None` when the
    /// template for `control` is disabled.
    pub fn local(
        &self,
        chatbox: &ChatboxConfig,
        control: ControlType,
        data: &ChatData,
    ) -> Result<Option<String>, RenderError> {
        let template = chatbox.template(control);
        if !template.enabled {
            return Ok(None);
        }
        let body = self.render(&template.local, data)?;
        Ok(Some(format!("{}{}", chatbox.prefix, body)))
    }

    /// Message for an action another user triggered. Picks the custom name
    /// variant when the sender has one.
    pub fn remote(
        &self,
        chatbox: &ChatboxConfig,
        control: ControlType,
        data: &ChatData,
    ) -> Result<Option<String>, RenderError> {
        let template = chatbox.template(control);
        if !chatbox.display_remote_control || !template.enabled {
            return Ok(None);
        }
        let source = if data.custom_name.is_some() {
            &template.remote_with_custom_name
        } else {
            &template.remote
        };
        let body = self.render(source, data)?;
        Ok(Some(format!("{}{}", chatbox.prefix, body)))
    }
}

/// Notice for a suppressed action, `None` when its text is empty or the
/// reason has no notice.
pub fn suppression_message(chatbox: &ChatboxConfig, reason: Suppression) -> Option<String> {
    let text = match reason {
        Suppression::KillSwitch => &chatbox.ignored_kill_switch_active,
        Suppression::Afk => &chatbox.ignored_afk,
        Suppression::Cooldown => return None,
    };
    (!text.is_empty()).then(|| format!("{}{}", chatbox.prefix, text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use shockconf::ChatboxTemplate;

    #[test]
    fn seconds_rounds_to_one_decimal() {
        assert_eq!(seconds(2_000), "2");
        assert_eq!(seconds(1_500), "1.5");
        assert_eq!(seconds(1_234), "1.2");
        assert_eq!(seconds(300), "0.3");
    }

    #[test]
    fn local_default_template() {
        let formatter = ChatFormatter::new();
        let chatbox = ChatboxConfig::default();
        let data = ChatData::local("Leg", 25, 83, 1_500);

        let message = formatter
            .local(&chatbox, ControlType::Shock, &data)
            .unwrap()
            .unwrap();
        assert_eq!(message, "[ShockOsc] ⚡ Leg 25%:1.5s");
    }

    #[test]
    fn templates_are_not_html_escaped() {
        let formatter = ChatFormatter::new();
        let data = ChatData::local("<Tail & Ears>", 1, 1, 1_000);
        assert_eq!(
            formatter.render("{{ShockerName}}", &data).unwrap(),
            "<Tail & Ears>"
        );
    }

    #[test]
    fn disabled_template_yields_nothing() {
        let formatter = ChatFormatter::new();
        let chatbox = ChatboxConfig::default();
        let data = ChatData::local("Leg", 0, 0, 0);
        assert_eq!(formatter.local(&chatbox, ControlType::Stop, &data).unwrap(), None);
    }

    #[test]
    fn remote_picks_custom_name_variant() {
        let formatter = ChatFormatter::new();
        let chatbox = ChatboxConfig::default();
        let mut data = ChatData {
            name: Some("alice".to_string()),
            ..ChatData::local("Leg", 10, 33, 1_000)
        };

        let plain = formatter
            .remote(&chatbox, ControlType::Vibrate, &data)
            .unwrap()
            .unwrap();
        assert_eq!(plain, "[ShockOsc] alice 〜 Leg 10%:1s");

        data.custom_name = Some("Bot".to_string());
        let custom = formatter
            .remote(&chatbox, ControlType::Vibrate, &data)
            .unwrap()
            .unwrap();
        assert_eq!(custom, "[ShockOsc] Bot [alice] 〜 Leg 10%:1s");
    }

    #[test]
    fn remote_respects_display_flag() {
        let formatter = ChatFormatter::new();
        let chatbox = ChatboxConfig {
            display_remote_control: false,
            ..ChatboxConfig::default()
        };
        let data = ChatData::local("Leg", 10, 33, 1_000);
        assert_eq!(formatter.remote(&chatbox, ControlType::Shock, &data).unwrap(), None);
    }

    #[test]
    fn custom_template_variables() {
        let formatter = ChatFormatter::new();
        let mut chatbox = ChatboxConfig::default();
        chatbox.prefix = String::new();
        chatbox.types.insert(
            ControlType::Shock,
            ChatboxTemplate {
                enabled: true,
                local: "{{ShockerName}} {{IntensityPercentage}} {{Duration}}".to_string(),
                remote: String::new(),
                remote_with_custom_name: String::new(),
            },
        );
        let data = ChatData::local("Arm", 12, 40, 2_300);
        assert_eq!(
            formatter.local(&chatbox, ControlType::Shock, &data).unwrap(),
            Some("Arm 40 2300".to_string())
        );
    }

    #[test]
    fn suppression_notices() {
        let mut chatbox = ChatboxConfig::default();
        assert_eq!(
            suppression_message(&chatbox, Suppression::KillSwitch).as_deref(),
            Some("[ShockOsc] Ignoring shock, kill switch is active")
        );
        assert_eq!(suppression_message(&chatbox, Suppression::Cooldown), None);

        chatbox.ignored_afk.clear();
        assert_eq!(suppression_message(&chatbox, Suppression::Afk), None);
    }
}
