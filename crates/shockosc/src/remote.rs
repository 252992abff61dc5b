//! Control events triggered by other users.
//!
//! The live connection to the control service delivers these; applying one
//! mirrors locally what a dispatch would have recorded, so feedback reflects
//! remote activity too.

use crate::chatbox::{self, ChatData};
use crate::engine::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shockconf::{ControlType, MAX_INTENSITY};
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteControlEvent {
    pub sender_name: String,
    #[serde(default)]
    pub sender_custom_name: Option<String>,
    #[serde(rename = "type")]
    pub control_type: ControlType,
    pub device_id: Uuid,
    #[serde(default)]
    pub device_name: String,
    pub intensity: u8,
    /// Milliseconds.
    pub duration: u32,
    pub executed_at: DateTime<Utc>,
}

/// What applying an event changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemoteOutcome {
    pub matched_groups: usize,
    pub shocked: bool,
}

impl Engine {
    pub async fn apply_remote(&self, event: &RemoteControlEvent) -> RemoteOutcome {
        let seconds = chatbox::seconds(event.duration);
        match &event.sender_custom_name {
            None => info!(
                control = %event.control_type,
                device = %event.device_name,
                intensity = event.intensity,
                duration_s = %seconds,
                sender = %event.sender_name,
                "Received remote control"
            ),
            Some(custom) => info!(
                control = %event.control_type,
                device = %event.device_name,
                intensity = event.intensity,
                duration_s = %seconds,
                sender = %event.sender_name,
                sender_custom_name = %custom,
                "Received remote control"
            ),
        }

        let config = self.config();
        if config.osc.chatbox {
            let data = ChatData {
                shocker_name: event.device_name.clone(),
                intensity: event.intensity,
                intensity_percentage: event.intensity.min(MAX_INTENSITY),
                duration: event.duration,
                duration_seconds: seconds,
                name: Some(event.sender_name.clone()),
                custom_name: event.sender_custom_name.clone(),
            };
            match self.chat.remote(&config.chatbox, event.control_type, &data) {
                Ok(Some(text)) => self.send_chat(text).await,
                Ok(None) => {}
                Err(e) => warn!("Failed to render chat template: {}", e),
            }
        }

        let groups = self.groups.containing_device(event.device_id, &config.groups);
        let mut outcome = RemoteOutcome {
            matched_groups: groups.len(),
            shocked: false,
        };
        if groups.is_empty() {
            return outcome;
        }

        let mut stopped = false;
        for handle in &groups {
            let mut group = handle.lock().await;
            match event.control_type {
                ControlType::Shock => {
                    group.record_execution(
                        event.executed_at,
                        event.duration,
                        event.intensity.min(MAX_INTENSITY),
                    );
                    outcome.shocked = true;
                }
                ControlType::Vibrate => group.last_vibration = event.executed_at,
                ControlType::Stop => {
                    group.last_duration = 0;
                    stopped = true;
                }
                ControlType::Sound => {}
            }
        }

        if outcome.shocked {
            self.force_unmute_logged().await;
        }
        if outcome.shocked || stopped {
            self.publish_feedback().await;
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_parses_api_names() {
        let event: RemoteControlEvent = serde_json::from_value(serde_json::json!({
            "senderName": "alice",
            "type": "Shock",
            "deviceId": "00000000-0000-0000-0000-00000000000a",
            "deviceName": "Left",
            "intensity": 30,
            "duration": 1000,
            "executedAt": "2024-01-01T12:00:00Z"
        }))
        .unwrap();

        assert_eq!(event.control_type, ControlType::Shock);
        assert_eq!(event.sender_custom_name, None);
        assert_eq!(event.device_id, Uuid::from_u128(0xa));
    }

    #[test]
    fn event_parses_lowercase_type() {
        let event: RemoteControlEvent = serde_json::from_value(serde_json::json!({
            "senderName": "bob",
            "senderCustomName": "Bot",
            "type": "stop",
            "deviceId": "00000000-0000-0000-0000-00000000000a",
            "intensity": 0,
            "duration": 0,
            "executedAt": "2024-01-01T12:00:00Z"
        }))
        .unwrap();

        assert_eq!(event.control_type, ControlType::Stop);
        assert_eq!(event.sender_custom_name.as_deref(), Some("Bot"));
    }
}
