//! Per-group trigger state and the store that owns it.

use crate::feedback::{FeedbackParams, FeedbackValues};
use crate::policy::{clamp01, scaled_intensity};
use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use shockconf::GroupsConfig;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use uuid::Uuid;

/// Why a group has an action pending.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TriggerMethod {
    #[default]
    None,
    Manual,
    PhysBoneRelease,
}

/// Mutable state of one configured device group.
#[derive(Debug, Clone)]
pub struct ProgramGroup {
    pub id: Uuid,
    pub name: String,
    pub is_grabbed: bool,
    pub last_stretch_value: f32,
    pub trigger_method: TriggerMethod,
    pub last_active: DateTime<Utc>,
    pub last_executed: DateTime<Utc>,
    /// Milliseconds.
    pub last_duration: u32,
    pub last_intensity: u8,
    pub last_vibration: DateTime<Utc>,
    pub feedback: FeedbackParams,
}

impl ProgramGroup {
    pub fn new(id: Uuid, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id,
            feedback: FeedbackParams::new(&name),
            name,
            is_grabbed: false,
            last_stretch_value: 0.0,
            trigger_method: TriggerMethod::None,
            last_active: DateTime::<Utc>::MIN_UTC,
            last_executed: DateTime::<Utc>::MIN_UTC,
            last_duration: 0,
            last_intensity: 0,
            last_vibration: DateTime::<Utc>::MIN_UTC,
        }
    }

    /// Clear transient interaction state. Execution history is kept.
    pub fn reset(&mut self) {
        self.is_grabbed = false;
        self.last_stretch_value = 0.0;
        self.trigger_method = TriggerMethod::None;
    }

    pub fn arm(&mut self, method: TriggerMethod, now: DateTime<Utc>) {
        self.trigger_method = method;
        self.last_active = now;
    }

    pub fn disarm(&mut self) {
        self.trigger_method = TriggerMethod::None;
    }

    pub fn is_armed(&self) -> bool {
        self.trigger_method != TriggerMethod::None
    }

    pub fn record_execution(&mut self, now: DateTime<Utc>, duration: u32, intensity: u8) {
        self.last_executed = now;
        self.last_duration = duration;
        self.last_intensity = intensity;
    }

    /// When the last execution stops being active.
    pub fn execution_end(&self) -> DateTime<Utc> {
        add_ms(self.last_executed, self.last_duration)
    }

    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        now < self.execution_end()
    }

    pub fn is_active_or_on_cooldown(&self, cooldown_ms: u32, now: DateTime<Utc>) -> bool {
        now < add_ms(self.execution_end(), cooldown_ms)
    }

    /// Compute this pass's feedback. Clears `last_intensity` once the
    /// cooldown has fully elapsed.
    pub fn feedback_values(
        &mut self,
        cooldown_ms: u32,
        intensity_max: u8,
        now: DateTime<Utc>,
    ) -> FeedbackValues {
        let active = self.is_active(now);
        let active_or_cooldown = self.is_active_or_on_cooldown(cooldown_ms, now);
        if !active_or_cooldown && self.last_intensity > 0 {
            self.last_intensity = 0;
        }

        let cooldown = active_or_cooldown && !active;
        let cooldown_percentage = if cooldown && cooldown_ms > 0 {
            let since_end = (now - self.execution_end()).num_milliseconds() as f32;
            clamp01(1.0 - since_end / cooldown_ms as f32)
        } else {
            0.0
        };

        FeedbackValues {
            active,
            cooldown,
            cooldown_percentage,
            intensity: scaled_intensity(self.last_intensity, intensity_max),
        }
    }
}

fn add_ms(at: DateTime<Utc>, ms: u32) -> DateTime<Utc> {
    at.checked_add_signed(TimeDelta::milliseconds(i64::from(ms)))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Shared handle to a group. Identity lives outside the lock.
#[derive(Debug)]
pub struct SharedGroup {
    pub id: Uuid,
    pub name: String,
    state: Mutex<ProgramGroup>,
}

impl SharedGroup {
    pub fn new(id: Uuid, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            state: Mutex::new(ProgramGroup::new(id, name)),
        }
    }

    pub async fn lock(&self) -> MutexGuard<'_, ProgramGroup> {
        self.state.lock().await
    }
}

pub type GroupHandle = Arc<SharedGroup>;

/// Group name to state. Entries are created from config and never removed.
#[derive(Debug, Default)]
pub struct GroupStore {
    groups: DashMap<String, GroupHandle>,
}

impl GroupStore {
    pub fn from_config(groups: &GroupsConfig) -> Self {
        let store = Self::default();
        store.sync(groups);
        store
    }

    /// Add groups that appeared in config. A name gets a fresh state record
    /// only when its registered id left the config; a live registration is
    /// kept, so duplicate names never reset each other's state.
    pub fn sync(&self, groups: &GroupsConfig) {
        for (id, group) in groups {
            let stale = self
                .groups
                .get(&group.name)
                .map(|existing| existing.id != *id && !groups.contains_key(&existing.id))
                .unwrap_or(true);
            if stale {
                tracing::debug!(group = %group.name, %id, "Registering group");
                self.groups
                    .insert(group.name.clone(), Arc::new(SharedGroup::new(*id, &group.name)));
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<GroupHandle> {
        self.groups.get(name).map(|g| Arc::clone(g.value()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.groups.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Snapshot of every handle. Iterate this rather than the map so no
    /// shard guard is held across an await.
    pub fn handles(&self) -> Vec<GroupHandle> {
        self.groups.iter().map(|g| Arc::clone(g.value())).collect()
    }

    /// Groups whose configured device list contains `device`.
    pub fn containing_device(&self, device: Uuid, config: &GroupsConfig) -> Vec<GroupHandle> {
        self.handles()
            .into_iter()
            .filter(|handle| {
                config
                    .get(&handle.id)
                    .map(|g| g.shockers.contains(&device))
                    .unwrap_or(false)
            })
            .collect()
    }

    pub async fn reset_all(&self) {
        for handle in self.handles() {
            let mut group = handle.lock().await;
            group.reset();
            group.feedback.invalidate();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shockconf::GroupConfig;

    fn at(ms: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp_millis(1_700_000_000_000 + ms).unwrap()
    }

    fn config() -> GroupsConfig {
        let mut groups = GroupsConfig::new();
        groups.insert(
            Uuid::from_u128(1),
            GroupConfig {
                name: "Leg".to_string(),
                shockers: vec![Uuid::from_u128(0xa), Uuid::from_u128(0xb)],
            },
        );
        groups.insert(
            Uuid::from_u128(2),
            GroupConfig {
                name: "Arm".to_string(),
                shockers: vec![Uuid::from_u128(0xb)],
            },
        );
        groups
    }

    #[test]
    fn new_group_is_idle_and_cold() {
        let group = ProgramGroup::new(Uuid::nil(), "Leg");
        assert!(!group.is_armed());
        assert!(!group.is_active(at(0)));
        assert!(!group.is_active_or_on_cooldown(5_000, at(0)));
    }

    #[test]
    fn active_then_cooldown_windows() {
        let mut group = ProgramGroup::new(Uuid::nil(), "Leg");
        group.record_execution(at(0), 1_000, 20);

        assert!(group.is_active(at(500)));
        assert!(!group.is_active(at(1_000)));
        assert!(group.is_active_or_on_cooldown(2_000, at(2_999)));
        assert!(!group.is_active_or_on_cooldown(2_000, at(3_000)));
    }

    #[test]
    fn feedback_cooldown_percentage_decays() {
        let mut group = ProgramGroup::new(Uuid::nil(), "Leg");
        group.record_execution(at(0), 1_000, 15);

        let active = group.feedback_values(2_000, 30, at(500));
        assert!(active.active);
        assert!(!active.cooldown);
        assert_eq!(active.cooldown_percentage, 0.0);
        assert_eq!(active.intensity, 0.5);

        let half = group.feedback_values(2_000, 30, at(2_000));
        assert!(!half.active);
        assert!(half.cooldown);
        assert!((half.cooldown_percentage - 0.5).abs() < 1e-6);

        let done = group.feedback_values(2_000, 30, at(3_000));
        assert!(!done.cooldown);
        assert_eq!(done.cooldown_percentage, 0.0);
        assert_eq!(done.intensity, 0.0);
        assert_eq!(group.last_intensity, 0);
    }

    #[test]
    fn cooldown_percentage_in_unit_range_across_window() {
        let mut group = ProgramGroup::new(Uuid::nil(), "Leg");
        group.record_execution(at(0), 700, 10);
        for t in (0..5_000).step_by(37) {
            let values = group.feedback_values(1_300, 30, at(t));
            assert!((0.0..=1.0).contains(&values.cooldown_percentage));
            if !group.is_active_or_on_cooldown(1_300, at(t)) {
                assert_eq!(values.cooldown_percentage, 0.0);
            }
        }
    }

    #[test]
    fn reset_keeps_history() {
        let mut group = ProgramGroup::new(Uuid::nil(), "Leg");
        group.record_execution(at(0), 1_000, 10);
        group.is_grabbed = true;
        group.last_stretch_value = 0.6;
        group.arm(TriggerMethod::Manual, at(0));

        group.reset();
        assert!(!group.is_grabbed);
        assert_eq!(group.last_stretch_value, 0.0);
        assert!(!group.is_armed());
        assert_eq!(group.last_duration, 1_000);
    }

    #[test]
    fn store_builds_from_config() {
        let store = GroupStore::from_config(&config());
        assert_eq!(store.len(), 2);
        assert!(store.contains("Leg"));
        assert_eq!(store.get("Arm").unwrap().id, Uuid::from_u128(2));
        assert!(store.get("Tail").is_none());
    }

    #[test]
    fn store_sync_keeps_existing_state() {
        let config = config();
        let store = GroupStore::from_config(&config);
        let before = store.get("Leg").unwrap();
        store.sync(&config);
        assert!(Arc::ptr_eq(&before, &store.get("Leg").unwrap()));
    }

    #[test]
    fn store_sync_with_duplicate_names_is_stable() {
        let mut config = config();
        config.insert(
            Uuid::from_u128(3),
            GroupConfig {
                name: "Leg".to_string(),
                shockers: vec![Uuid::from_u128(0xc)],
            },
        );
        let store = GroupStore::from_config(&config);
        let before = store.get("Leg").unwrap();

        store.sync(&config);
        store.sync(&config);
        assert!(Arc::ptr_eq(&before, &store.get("Leg").unwrap()));
    }

    #[test]
    fn store_sync_replaces_group_whose_id_left_config() {
        let mut config = config();
        let store = GroupStore::from_config(&config);

        config.remove(&Uuid::from_u128(1));
        config.insert(
            Uuid::from_u128(4),
            GroupConfig {
                name: "Leg".to_string(),
                shockers: vec![Uuid::from_u128(0xa)],
            },
        );
        store.sync(&config);
        assert_eq!(store.get("Leg").unwrap().id, Uuid::from_u128(4));
    }

    #[test]
    fn device_can_belong_to_several_groups() {
        let config = config();
        let store = GroupStore::from_config(&config);

        let mut names: Vec<_> = store
            .containing_device(Uuid::from_u128(0xb), &config)
            .iter()
            .map(|g| g.name.clone())
            .collect();
        names.sort();
        assert_eq!(names, vec!["Arm", "Leg"]);

        assert_eq!(store.containing_device(Uuid::from_u128(0xa), &config).len(), 1);
        assert!(store.containing_device(Uuid::from_u128(0xc), &config).is_empty());
    }

    #[tokio::test]
    async fn reset_all_clears_every_group() {
        let store = GroupStore::from_config(&config());
        {
            let leg = store.get("Leg").unwrap();
            let mut group = leg.lock().await;
            group.is_grabbed = true;
        }
        store.reset_all().await;
        assert!(!store.get("Leg").unwrap().lock().await.is_grabbed);
    }
}
