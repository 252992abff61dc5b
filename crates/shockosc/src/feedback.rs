//! Change-tracked output parameters.
//!
//! A [`ChangeTracked`] handle only yields a message when the value differs
//! from the last one it yielded, so a publish pass over unchanged state
//! produces no traffic.

use crate::address::app_address;
use rosc::{OscMessage, OscType};

/// Value types we publish.
pub trait FeedbackValue: Copy + PartialEq {
    fn to_osc(self) -> OscType;
}

impl FeedbackValue for bool {
    fn to_osc(self) -> OscType {
        OscType::Bool(self)
    }
}

impl FeedbackValue for f32 {
    fn to_osc(self) -> OscType {
        OscType::Float(self)
    }
}

#[derive(Debug, Clone)]
pub struct ChangeTracked<T> {
    address: String,
    last: Option<T>,
}

impl<T: FeedbackValue> ChangeTracked<T> {
    pub fn new(group: &str, suffix: &str) -> Self {
        Self {
            address: app_address(&format!("{group}_{suffix}")),
            last: None,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn last(&self) -> Option<T> {
        self.last
    }

    /// Record `value`, returning the message to send if it changed.
    pub fn update(&mut self, value: T) -> Option<OscMessage> {
        if self.last == Some(value) {
            return None;
        }
        self.last = Some(value);
        Some(OscMessage {
            addr: self.address.clone(),
            args: vec![value.to_osc()],
        })
    }

    /// Forget the last value so the next update always sends.
    pub fn invalidate(&mut self) {
        self.last = None;
    }
}

/// One publish pass worth of values for a group.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FeedbackValues {
    pub active: bool,
    pub cooldown: bool,
    pub cooldown_percentage: f32,
    pub intensity: f32,
}

impl FeedbackValues {
    /// Fold another group into an aggregate: OR for flags, max for levels.
    pub fn merge(&mut self, other: &FeedbackValues) {
        self.active |= other.active;
        self.cooldown |= other.cooldown;
        self.cooldown_percentage = self.cooldown_percentage.max(other.cooldown_percentage);
        self.intensity = self.intensity.max(other.intensity);
    }
}

/// The four handles every group (and the aggregate) publishes.
#[derive(Debug, Clone)]
pub struct FeedbackParams {
    active: ChangeTracked<bool>,
    cooldown: ChangeTracked<bool>,
    cooldown_percentage: ChangeTracked<f32>,
    intensity: ChangeTracked<f32>,
}

impl FeedbackParams {
    pub fn new(group: &str) -> Self {
        Self {
            active: ChangeTracked::new(group, "Active"),
            cooldown: ChangeTracked::new(group, "Cooldown"),
            cooldown_percentage: ChangeTracked::new(group, "CooldownPercentage"),
            intensity: ChangeTracked::new(group, "Intensity"),
        }
    }

    pub fn apply(&mut self, values: &FeedbackValues) -> Vec<OscMessage> {
        [
            self.active.update(values.active),
            self.cooldown.update(values.cooldown),
            self.cooldown_percentage.update(values.cooldown_percentage),
            self.intensity.update(values.intensity),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    pub fn invalidate(&mut self) {
        self.active.invalidate();
        self.cooldown.invalidate();
        self.cooldown_percentage.invalidate();
        self.intensity.invalidate();
    }
}
