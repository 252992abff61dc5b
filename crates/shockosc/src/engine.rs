//! Shared state container.
//!
//! One [`Engine`] owns everything the receive, check and send loops touch:
//! group store, registry, session flags, runtime config, and the two
//! collaborators (game connection and control backend). Group state is only
//! mutated under that group's lock.
//!
//! Lock order: a group lock may be taken while holding the aggregate
//! feedback lock, never the reverse. The config lock is never held across
//! an await; readers take an `Arc` snapshot.

use crate::address::AGGREGATE_GROUP;
use crate::backend::ControlBackend;
use crate::chatbox::ChatFormatter;
use crate::check::{self, CheckContext, CheckOutcome};
use crate::feedback::{FeedbackParams, FeedbackValues};
use crate::group::GroupStore;
use crate::policy::HELD_PULSE_DURATION_MS;
use crate::registry::ParameterRegistry;
use crate::transport::{voice_message, GameConnection};
use crate::underscore::UnderscoreConfig;
use chrono::Utc;
use futures::FutureExt;
use rosc::OscMessage;
use shockconf::ShockOscConfig;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio_util::task::TaskTracker;
use tracing::{debug, error, warn};

/// Spacing of the force-unmute voice toggles.
pub const UNMUTE_STEP: Duration = Duration::from_millis(50);

const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// Parameters-changed notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamsChanged {
    /// New avatar or shocker parameter activity.
    Structural,
    /// A known avatar parameter changed value.
    ValueOnly,
}

/// Flags mirrored from the avatar.
#[derive(Debug, Default)]
pub struct SessionFlags {
    afk: AtomicBool,
    muted: AtomicBool,
}

impl SessionFlags {
    pub fn afk(&self) -> bool {
        self.afk.load(Ordering::Relaxed)
    }

    pub fn set_afk(&self, afk: bool) {
        self.afk.store(afk, Ordering::Relaxed);
    }

    pub fn muted(&self) -> bool {
        self.muted.load(Ordering::Relaxed)
    }

    pub fn set_muted(&self, muted: bool) {
        self.muted.store(muted, Ordering::Relaxed);
    }
}

pub struct Engine {
    config: RwLock<Arc<ShockOscConfig>>,
    pub(crate) groups: GroupStore,
    pub(crate) registry: ParameterRegistry,
    pub(crate) flags: SessionFlags,
    pub(crate) underscore: UnderscoreConfig,
    pub(crate) game: Arc<dyn GameConnection>,
    pub(crate) backend: Arc<dyn ControlBackend>,
    pub(crate) chat: ChatFormatter,
    changes: broadcast::Sender<ParamsChanged>,
    aggregate: Mutex<FeedbackParams>,
    tasks: TaskTracker,
}

impl Engine {
    pub fn new(
        config: ShockOscConfig,
        game: Arc<dyn GameConnection>,
        backend: Arc<dyn ControlBackend>,
    ) -> Arc<Self> {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Arc::new(Self {
            groups: GroupStore::from_config(&config.groups),
            config: RwLock::new(Arc::new(config)),
            registry: ParameterRegistry::new(),
            flags: SessionFlags::default(),
            underscore: UnderscoreConfig::new(),
            game,
            backend,
            chat: ChatFormatter::new(),
            changes,
            aggregate: Mutex::new(FeedbackParams::new(AGGREGATE_GROUP)),
            tasks: TaskTracker::new(),
        })
    }

    /// Current config snapshot.
    pub fn config(&self) -> Arc<ShockOscConfig> {
        let guard = self.config.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    /// Replace the config with an edited copy. New groups are registered.
    pub fn update_config(&self, edit: impl FnOnce(&mut ShockOscConfig)) {
        let updated = {
            let mut guard = self.config.write().unwrap_or_else(|e| e.into_inner());
            let mut next = ShockOscConfig::clone(&guard);
            edit(&mut next);
            *guard = Arc::new(next);
            Arc::clone(&guard)
        };
        self.groups.sync(&updated.groups);
    }

    pub fn groups(&self) -> &GroupStore {
        &self.groups
    }

    pub fn registry(&self) -> &ParameterRegistry {
        &self.registry
    }

    pub fn flags(&self) -> &SessionFlags {
        &self.flags
    }

    pub fn kill_switch(&self) -> bool {
        self.underscore.kill_switch()
    }

    pub fn set_kill_switch(&self, active: bool) {
        self.underscore.set_kill_switch(active);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ParamsChanged> {
        self.changes.subscribe()
    }

    pub(crate) fn notify(&self, change: ParamsChanged) {
        // No subscribers is fine.
        let _ = self.changes.send(change);
    }

    pub(crate) fn tasks(&self) -> &TaskTracker {
        &self.tasks
    }

    /// Run `task` in the background. Errors and panics are logged.
    pub fn spawn_supervised<F>(&self, name: &'static str, task: F)
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.tasks.spawn(async move {
            match AssertUnwindSafe(task).catch_unwind().await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(task = name, "Background task failed: {:#}", e),
                Err(_) => error!(task = name, "Background task panicked"),
            }
        });
    }

    /// Wait until every supervised task spawned so far has finished.
    pub async fn settle(&self) {
        self.tasks.close();
        self.tasks.wait().await;
        self.tasks.reopen();
    }

    /// Best-effort send to the game. Failures are logged.
    pub(crate) async fn send_game(&self, message: OscMessage) {
        let addr = message.addr.clone();
        if let Err(e) = self.game.send(message).await {
            warn!(%addr, "Failed to send OSC message: {:#}", e);
        }
    }

    pub(crate) async fn send_chat(&self, text: String) {
        debug!(%text, "Chatbox");
        self.send_game(crate::transport::chatbox_message(&text)).await;
    }

    /// Toggle the microphone off, on, off when configured and muted.
    pub(crate) async fn force_unmute(&self) -> anyhow::Result<()> {
        if !self.config().behaviour.force_unmute || !self.flags.muted() {
            return Ok(());
        }

        debug!("Force unmuting");
        self.game.send(voice_message(false)).await?;
        tokio::time::sleep(UNMUTE_STEP).await;
        self.game.send(voice_message(true)).await?;
        tokio::time::sleep(UNMUTE_STEP).await;
        self.game.send(voice_message(false)).await?;
        Ok(())
    }

    /// Same as [`Engine::force_unmute`], logging instead of returning errors.
    pub(crate) async fn force_unmute_logged(&self) {
        if let Err(e) = self.force_unmute().await {
            warn!("Force unmute failed: {:#}", e);
        }
    }

    /// One pass of the check loop over every group.
    pub async fn check_tick(self: &Arc<Self>) {
        let config = self.config();
        let kill_switch = self.kill_switch();
        let afk = self.flags.afk();

        for handle in self.groups.handles() {
            let now = Utc::now();
            let ctx = CheckContext {
                behaviour: &config.behaviour,
                kill_switch,
                afk,
                now,
            };

            let mut group = handle.lock().await;
            let outcome = {
                let mut rng = rand::thread_rng();
                check::evaluate(&mut group, &ctx, &mut rng)
            };

            match outcome {
                CheckOutcome::Idle | CheckOutcome::Debouncing => {}
                CheckOutcome::HeldPulse { intensity, control } => {
                    debug!(group = %handle.name, intensity, %control, "Held pulse");
                    self.spawn_control(group.id, HELD_PULSE_DURATION_MS, intensity, control);
                }
                CheckOutcome::Suppressed(reason) => {
                    drop(group);
                    self.report_suppression(&config, &handle.name, reason).await;
                }
                CheckOutcome::Fire { intensity, duration } => {
                    self.fire_locked(&config, &mut group, duration, intensity, now);
                }
            }
        }
    }

    /// Recompute every group's feedback and the aggregate, sending what
    /// changed. Returns the number of messages sent.
    pub async fn publish_feedback(&self) -> usize {
        let config = self.config();
        let cooldown = config.behaviour.cooldown_time;
        let intensity_max = config.behaviour.intensity_range.max;

        // Held for the whole pass so concurrent publishers cannot interleave.
        let mut aggregate = self.aggregate.lock().await;
        let now = Utc::now();
        let mut any = FeedbackValues::default();
        let mut outgoing = Vec::new();

        for handle in self.groups.handles() {
            let mut group = handle.lock().await;
            let values = group.feedback_values(cooldown, intensity_max, now);
            outgoing.extend(group.feedback.apply(&values));
            any.merge(&values);
        }
        outgoing.extend(aggregate.apply(&any));

        let sent = outgoing.len();
        for message in outgoing {
            self.send_game(message).await;
        }
        sent
    }

    /// Force the next publish to resend every value.
    pub(crate) async fn invalidate_feedback(&self) {
        let mut aggregate = self.aggregate.lock().await;
        aggregate.invalidate();
        for handle in self.groups.handles() {
            handle.lock().await.feedback.invalidate();
        }
    }

    /// Publish the current `_Config` values.
    pub async fn announce_config(&self) {
        let config = self.config();
        for message in self.underscore.announce_all(&config.behaviour) {
            self.send_game(message).await;
        }
    }
}
