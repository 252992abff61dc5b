//! Inbound parameter routing.

use crate::address::{
    app_parameter_name, avatar_parameter_name, classify, split_group_action, Action, Route,
};
use crate::check::{self, CheckContext};
use crate::engine::{Engine, ParamsChanged};
use crate::group::{GroupHandle, TriggerMethod};
use crate::policy;
use crate::registry::{ParamValue, Upsert};
use chrono::Utc;
use rosc::OscMessage;
use shockconf::{BehaviourConfig, BoneHeldAction};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, trace, warn};

impl Engine {
    /// Classify one inbound message and apply it.
    pub async fn ingest(self: &Arc<Self>, message: &OscMessage) {
        let address = message.addr.as_str();
        let value = ParamValue::first(&message.args);
        trace!(address, "Received message");

        if let Some(name) = avatar_parameter_name(address) {
            if self.registry.set_avatar_parameter(name, value.clone()) == Upsert::Updated {
                self.notify(ParamsChanged::ValueOnly);
            }
        }

        match classify(address) {
            Route::AvatarChange => {
                let avatar_id = match &value {
                    ParamValue::String(id) => Some(id.clone()),
                    _ => None,
                };
                debug!(avatar = ?avatar_id, "Avatar changed");
                let engine = Arc::clone(self);
                self.spawn_supervised("avatar load", async move {
                    engine.load_avatar(avatar_id).await;
                    engine.announce_config().await;
                    Ok(())
                });
            }
            Route::Afk => {
                self.flags.set_afk(value.is_true());
                debug!(afk = self.flags.afk(), "AFK changed");
            }
            Route::MuteSelf => {
                self.flags.set_muted(value.is_true());
                debug!(muted = self.flags.muted(), "Mute changed");
            }
            Route::Config(path) => self.handle_config_command(path, &value).await,
            Route::Shocker { key, group, action } => {
                self.route_shocker(key, group, action, value).await
            }
            Route::AvatarParameter | Route::Unrouted => {}
        }
    }

    async fn route_shocker(
        self: &Arc<Self>,
        key: &str,
        group: &str,
        action: Option<Action>,
        value: ParamValue,
    ) {
        if self.registry.set_in_use(key, value.clone()) == Upsert::Updated {
            self.notify(ParamsChanged::Structural);
        }

        let Some(action) = action else {
            trace!(param = key, "Unrecognised shocker action");
            return;
        };

        let Some(handle) = self.groups.get(group) else {
            if !group.starts_with('_') {
                warn!(group, "Unknown shocker");
                debug!(param = key, "Unknown shocker parameter");
            }
            return;
        };

        match action {
            Action::IShock => {
                if value.is_true() {
                    self.instant_trigger(&handle).await;
                }
            }
            Action::Stretch => {
                if let Some(stretch) = value.as_float() {
                    handle.lock().await.last_stretch_value = stretch;
                }
            }
            Action::IsGrabbed => self.grab_changed(&handle, value.is_true()).await,
            Action::Trigger => {
                let mut group = handle.lock().await;
                if value.is_true() {
                    group.arm(TriggerMethod::Manual, Utc::now());
                } else {
                    group.disarm();
                }
            }
            Action::Cooldown | Action::Active | Action::Intensity | Action::CooldownPercentage => {}
        }
    }

    /// `IShock`: gate, then fire without debounce.
    async fn instant_trigger(self: &Arc<Self>, handle: &GroupHandle) {
        let config = self.config();
        let now = Utc::now();
        let ctx = CheckContext {
            behaviour: &config.behaviour,
            kill_switch: self.kill_switch(),
            afk: self.flags.afk(),
            now,
        };

        let mut group = handle.lock().await;
        if let Some(reason) = check::instant_gate(&mut group, &ctx) {
            drop(group);
            self.report_suppression(&config, &handle.name, reason).await;
            return;
        }

        let (intensity, duration) = roll(&config.behaviour);
        self.fire_locked(&config, &mut group, duration, intensity, now);
    }

    /// `IsGrabbed`: arm on release with stretch, or cancel a held pulse.
    async fn grab_changed(self: &Arc<Self>, handle: &GroupHandle, grabbed: bool) {
        let held_action = self.config().behaviour.while_bone_held;
        let mut group = handle.lock().await;

        if group.is_grabbed && !grabbed {
            if group.last_stretch_value != 0.0 {
                group.arm(TriggerMethod::PhysBoneRelease, Utc::now());
            } else if held_action != BoneHeldAction::None {
                self.cancel_action(group.id);
            }
        }

        group.is_grabbed = grabbed;
    }

    async fn handle_config_command(&self, path: &str, value: &ParamValue) {
        let mut result = None;
        self.update_config(|config| {
            result = Some(self.underscore.handle(path, value, &mut config.behaviour));
        });

        match result {
            Some(Ok(setting)) => {
                info!(setting = setting.name(), ?value, "Config updated from avatar");
                self.announce_config().await;
            }
            Some(Err(e)) => warn!(path, "Ignoring config command: {}", e),
            None => {}
        }
    }

    /// Reset for a new avatar: clear groups and registries, then seed them
    /// from the full parameter set.
    pub async fn load_avatar(&self, avatar_id: Option<String>) {
        self.registry.set_avatar_id(avatar_id);
        self.groups.reset_all().await;
        self.invalidate_feedback().await;
        self.registry.clear();

        match self.game.fetch_parameters().await {
            Ok(parameters) => self.seed_registry(&parameters),
            Err(e) => error!("Failed to receive avatar parameters: {:#}", e),
        }

        self.notify(ParamsChanged::Structural);
    }

    fn seed_registry(&self, parameters: &HashMap<String, ParamValue>) {
        let mut count = 0;

        for (address, value) in parameters {
            if let Some(name) = avatar_parameter_name(address) {
                self.registry.set_avatar_parameter(name, value.clone());
            }

            let Some(key) = app_parameter_name(address) else {
                continue;
            };

            let (group, suffix) = split_group_action(key);
            if Action::from_suffix(suffix).is_some() {
                count += 1;
                self.registry.set_in_use(key, value.clone());
            }

            if !self.groups.contains(group) && !group.starts_with('_') {
                warn!(group, "Unknown shocker on avatar");
                debug!(param = %address, "Unknown shocker parameter");
            }
        }

        info!(parameters = count, "Loaded avatar config");
    }
}

/// Random or fixed intensity and duration. Sync so the thread-local RNG
/// never crosses an await.
fn roll(behaviour: &BehaviourConfig) -> (u8, u32) {
    let mut rng = rand::thread_rng();
    (
        policy::intensity(behaviour, &mut rng),
        policy::duration(behaviour, &mut rng),
    )
}
