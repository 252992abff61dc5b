//! Command dispatch.
//!
//! [`Engine::instant_shock`] updates the group under its lock (execution
//! timestamps recorded, trigger cleared) and hands delivery to a supervised
//! task: force-unmute, immediate feedback publish, control submission to
//! every mapped device, then the local chat message.

use crate::backend::Control;
use crate::chatbox::{self, ChatData};
use crate::check::Suppression;
use crate::engine::Engine;
use crate::group::{GroupHandle, ProgramGroup};
use crate::policy::scaled_intensity;
use chrono::{DateTime, Utc};
use shockconf::{ControlType, ShockOscConfig};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

impl Engine {
    /// Fire `handle` now. Returns `false`, changing nothing, when the group
    /// has no device mapping in config.
    pub async fn instant_shock(self: &Arc<Self>, handle: &GroupHandle, duration: u32, intensity: u8) -> bool {
        let config = self.config();
        let mut group = handle.lock().await;
        self.fire_locked(&config, &mut group, duration, intensity, Utc::now())
    }

    pub(crate) fn fire_locked(
        self: &Arc<Self>,
        config: &Arc<ShockOscConfig>,
        group: &mut ProgramGroup,
        duration: u32,
        intensity: u8,
        now: DateTime<Utc>,
    ) -> bool {
        if !config.groups.contains_key(&group.id) {
            warn!(group = %group.name, id = %group.id, "No device mapping for group");
            return false;
        }

        group.record_execution(now, duration, intensity);
        group.disarm();

        let percentage =
            (scaled_intensity(intensity, config.behaviour.intensity_range.max) * 100.0).round() as u8;
        info!(
            group = %group.name,
            intensity,
            intensity_percentage = percentage,
            duration_s = %chatbox::seconds(duration),
            "Sending shock"
        );

        let engine = Arc::clone(self);
        let config = Arc::clone(config);
        let group_id = group.id;
        let chat = ChatData::local(&group.name, intensity, percentage, duration);
        self.spawn_supervised("shock delivery", async move {
            engine.force_unmute_logged().await;
            engine.publish_feedback().await;
            engine
                .control_group(group_id, duration, intensity, ControlType::Shock)
                .await?;
            engine.send_local_chat(&config, ControlType::Shock, &chat).await;
            Ok(())
        });

        true
    }

    /// Submit one command per device mapped to `group_id`. `Ok(false)` when
    /// the group is not configured.
    pub async fn control_group(
        &self,
        group_id: Uuid,
        duration: u32,
        intensity: u8,
        control_type: ControlType,
    ) -> anyhow::Result<bool> {
        let config = self.config();
        let Some(group) = config.groups.get(&group_id) else {
            return Ok(false);
        };

        let controls = group
            .shockers
            .iter()
            .map(|&device| Control {
                device,
                control_type,
                intensity,
                duration,
            })
            .collect();
        self.backend.control(controls).await?;
        Ok(true)
    }

    /// [`Engine::control_group`] in a supervised background task.
    pub(crate) fn spawn_control(
        self: &Arc<Self>,
        group_id: Uuid,
        duration: u32,
        intensity: u8,
        control_type: ControlType,
    ) {
        let engine = Arc::clone(self);
        self.spawn_supervised("control", async move {
            if !engine
                .control_group(group_id, duration, intensity, control_type)
                .await?
            {
                debug!(%group_id, "Control skipped, group not configured");
            }
            Ok(())
        });
    }

    /// Stop whatever the group's devices are doing.
    pub(crate) fn cancel_action(self: &Arc<Self>, group_id: Uuid) {
        debug!(%group_id, "Cancelling action");
        self.spawn_control(group_id, 0, 0, ControlType::Stop);
    }

    pub(crate) async fn send_local_chat(
        &self,
        config: &ShockOscConfig,
        control: ControlType,
        data: &ChatData,
    ) {
        if !config.osc.chatbox {
            return;
        }
        match self.chat.local(&config.chatbox, control, data) {
            Ok(Some(text)) => self.send_chat(text).await,
            Ok(None) => {}
            Err(e) => warn!("Failed to render chat template: {}", e),
        }
    }

    /// Log a dropped action and send its chat notice.
    pub(crate) async fn report_suppression(
        &self,
        config: &ShockOscConfig,
        group: &str,
        reason: Suppression,
    ) {
        match reason {
            Suppression::Cooldown => info!(group, "Ignoring shock, group is on cooldown"),
            Suppression::KillSwitch => info!(group, "Ignoring shock, kill switch is active"),
            Suppression::Afk => info!(group, "Ignoring shock, user is AFK"),
        }

        // Sent whenever the text is set, regardless of `osc.chatbox`.
        if let Some(text) = chatbox::suppression_message(&config.chatbox, reason) {
            self.send_chat(text).await;
        }
    }
}
