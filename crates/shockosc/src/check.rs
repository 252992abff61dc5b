//! Trigger evaluation.
//!
//! [`evaluate`] is the per-group step of the 20 ms check loop. It works on a
//! locked [`ProgramGroup`] and returns what the loop should do; the loop
//! performs the side effects.

use crate::group::{ProgramGroup, TriggerMethod};
use crate::policy;
use chrono::{DateTime, TimeDelta, Utc};
use rand::Rng;
use shockconf::{BehaviourConfig, ControlType};

/// Minimum spacing between held pulses (ms).
pub const HELD_PULSE_INTERVAL_MS: i64 = 300;

/// Global state the gates read.
#[derive(Debug, Clone, Copy)]
pub struct CheckContext<'a> {
    pub behaviour: &'a BehaviourConfig,
    pub kill_switch: bool,
    pub afk: bool,
    pub now: DateTime<Utc>,
}

/// Why a pending action was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suppression {
    Cooldown,
    KillSwitch,
    Afk,
}

impl Suppression {
    pub fn as_str(&self) -> &'static str {
        match self {
            Suppression::Cooldown => "cooldown",
            Suppression::KillSwitch => "kill switch",
            Suppression::Afk => "afk",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CheckOutcome {
    /// Nothing pending.
    Idle,
    /// Manual trigger still inside its hold time.
    Debouncing,
    /// Bone is held, send a short pulse.
    HeldPulse { intensity: u8, control: ControlType },
    /// Pending action dropped, trigger cleared.
    Suppressed(Suppression),
    /// Dispatch now.
    Fire { intensity: u8, duration: u32 },
}

/// Kill switch first, then AFK.
pub fn safety_gate(ctx: &CheckContext<'_>) -> Option<Suppression> {
    if ctx.kill_switch {
        return Some(Suppression::KillSwitch);
    }
    if ctx.afk && ctx.behaviour.disable_while_afk {
        return Some(Suppression::Afk);
    }
    None
}

/// Gates for an instant shock: kill switch, AFK, then cooldown.
/// Clears the trigger when blocked.
pub fn instant_gate(group: &mut ProgramGroup, ctx: &CheckContext<'_>) -> Option<Suppression> {
    let blocked = safety_gate(ctx).or_else(|| {
        group
            .is_active_or_on_cooldown(ctx.behaviour.cooldown_time, ctx.now)
            .then_some(Suppression::Cooldown)
    });
    if blocked.is_some() {
        group.disarm();
    }
    blocked
}

pub fn evaluate<R: Rng + ?Sized>(
    group: &mut ProgramGroup,
    ctx: &CheckContext<'_>,
    rng: &mut R,
) -> CheckOutcome {
    let behaviour = ctx.behaviour;
    let now = ctx.now;
    let cooling = group.is_active_or_on_cooldown(behaviour.cooldown_time, now);

    if group.trigger_method == TriggerMethod::None {
        if let Some(control) = behaviour.while_bone_held.control_type() {
            let pulse_due = group.last_vibration < now - TimeDelta::milliseconds(HELD_PULSE_INTERVAL_MS);
            if !cooling && group.is_grabbed && pulse_due {
                group.last_vibration = now;
                return CheckOutcome::HeldPulse {
                    intensity: policy::held_pulse_intensity(group.last_stretch_value),
                    control,
                };
            }
        }
        return CheckOutcome::Idle;
    }

    if group.trigger_method == TriggerMethod::Manual
        && now < group.last_active + TimeDelta::milliseconds(i64::from(behaviour.hold_time))
    {
        return CheckOutcome::Debouncing;
    }

    if cooling {
        group.disarm();
        return CheckOutcome::Suppressed(Suppression::Cooldown);
    }

    if let Some(reason) = safety_gate(ctx) {
        group.disarm();
        return CheckOutcome::Suppressed(reason);
    }

    let intensity = if group.trigger_method == TriggerMethod::PhysBoneRelease {
        let intensity = policy::release_intensity(behaviour, group.last_stretch_value);
        group.last_stretch_value = 0.0;
        intensity
    } else {
        policy::intensity(behaviour, rng)
    };

    CheckOutcome::Fire {
        intensity,
        duration: policy::duration(behaviour, rng),
    }
}
