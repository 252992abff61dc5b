//! Intensity and duration policy.
//!
//! Pure functions over the behaviour config. Randomness comes in through
//! the caller's [`Rng`] so tests can seed it.

use rand::Rng;
use shockconf::{BehaviourConfig, MAX_INTENSITY};

/// Duration of a vibration pulse while a bone is held (ms).
pub const HELD_PULSE_DURATION_MS: u32 = 1_000;

/// Fixed intensity, or uniform in `[min, max)`. Never above the range
/// maximum, even when the bounds are inverted.
pub fn intensity<R: Rng + ?Sized>(behaviour: &BehaviourConfig, rng: &mut R) -> u8 {
    if !behaviour.random_intensity {
        return behaviour.fixed_intensity;
    }

    let range = behaviour.intensity_range;
    if range.max <= range.min {
        return range.min.min(range.max);
    }
    rng.gen_range(range.min..range.max)
}

/// Fixed duration, or a whole multiple of the step drawn from
/// `[min / step, max / step)`.
pub fn duration<R: Rng + ?Sized>(behaviour: &BehaviourConfig, rng: &mut R) -> u32 {
    if !behaviour.random_duration {
        return behaviour.fixed_duration;
    }

    let step = behaviour.random_duration_step.max(1);
    let low = behaviour.duration_range.min / step;
    let high = behaviour.duration_range.max / step;
    if high <= low {
        return low * step;
    }
    rng.gen_range(low..high) * step
}

/// Intensity for a PhysBone release at `stretch`, capped at the range
/// maximum.
pub fn release_intensity(behaviour: &BehaviourConfig, stretch: f32) -> u8 {
    let range = behaviour.intensity_range;
    lerp(range.min, range.max, stretch).min(range.max)
}

/// Linear interpolation, factor clamped to `[0, 1]`, truncated.
pub fn lerp(min: u8, max: u8, t: f32) -> u8 {
    let (min, max) = (f32::from(min), f32::from(max));
    (min + (max - min) * clamp01(t)) as u8
}

pub fn clamp01(value: f32) -> f32 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}

/// Intensity as a `[0, 1]` fraction of the configured range maximum.
pub fn scaled_intensity(intensity: u8, range_max: u8) -> f32 {
    if range_max == 0 {
        return 0.0;
    }
    clamp01(f32::from(intensity) / f32::from(range_max))
}

/// Held pulse intensity: stretch as a percentage, at least 1.
pub fn held_pulse_intensity(stretch: f32) -> u8 {
    (clamp01(stretch) * 100.0).clamp(1.0, f32::from(MAX_INTENSITY)) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use shockconf::{DurationRange, IntensityRange};

    fn behaviour() -> BehaviourConfig {
        BehaviourConfig {
            intensity_range: IntensityRange { min: 10, max: 20 },
            duration_range: DurationRange { min: 1_000, max: 5_000 },
            random_duration_step: 250,
            ..BehaviourConfig::default()
        }
    }

    #[test]
    fn random_intensity_stays_half_open() {
        let b = behaviour();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..2_000 {
            let i = intensity(&b, &mut rng);
            assert!((10..20).contains(&i), "intensity {i} out of range");
        }
    }

    #[test]
    fn fixed_intensity_is_exact() {
        let b = BehaviourConfig {
            random_intensity: false,
            fixed_intensity: 42,
            ..behaviour()
        };
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(intensity(&b, &mut rng), 42);
    }

    #[test]
    fn degenerate_intensity_range_yields_min() {
        let b = BehaviourConfig {
            intensity_range: IntensityRange { min: 15, max: 15 },
            ..behaviour()
        };
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(intensity(&b, &mut rng), 15);
    }

    #[test]
    fn inverted_intensity_range_never_exceeds_max() {
        let b = BehaviourConfig {
            intensity_range: IntensityRange { min: 80, max: 20 },
            ..behaviour()
        };
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(intensity(&b, &mut rng), 20);
        assert_eq!(release_intensity(&b, 0.0), 20);
        assert_eq!(release_intensity(&b, 0.5), 20);
        assert_eq!(release_intensity(&b, 1.0), 20);
    }

    #[test]
    fn random_duration_is_step_multiple() {
        let b = behaviour();
        let mut rng = StdRng::seed_from_u64(99);
        for _ in 0..2_000 {
            let d = duration(&b, &mut rng);
            assert_eq!(d % 250, 0, "duration {d} is not a multiple of the step");
            assert!((1_000..5_000).contains(&d), "duration {d} out of range");
        }
    }

    #[test]
    fn fixed_duration_is_exact() {
        let b = BehaviourConfig {
            random_duration: false,
            fixed_duration: 1_500,
            ..behaviour()
        };
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(duration(&b, &mut rng), 1_500);
    }

    #[test]
    fn zero_step_is_treated_as_one() {
        let b = BehaviourConfig {
            random_duration_step: 0,
            duration_range: DurationRange { min: 1_000, max: 1_002 },
            ..behaviour()
        };
        let mut rng = StdRng::seed_from_u64(3);
        let d = duration(&b, &mut rng);
        assert!(d == 1_000 || d == 1_001);
    }

    #[test]
    fn lerp_interpolates_and_clamps() {
        assert_eq!(lerp(10, 20, 0.4), 14);
        assert_eq!(lerp(10, 20, 0.0), 10);
        assert_eq!(lerp(10, 20, 1.0), 20);
        assert_eq!(lerp(10, 20, 3.0), 20);
        assert_eq!(lerp(10, 20, -1.0), 10);
    }

    #[test]
    fn scaled_intensity_is_unit_range() {
        assert_eq!(scaled_intensity(15, 30), 0.5);
        assert_eq!(scaled_intensity(60, 30), 1.0);
        assert_eq!(scaled_intensity(5, 0), 0.0);
    }

    #[test]
    fn held_pulse_has_floor_of_one() {
        assert_eq!(held_pulse_intensity(0.0), 1);
        assert_eq!(held_pulse_intensity(0.005), 1);
        assert_eq!(held_pulse_intensity(0.5), 50);
        assert_eq!(held_pulse_intensity(2.0), 100);
    }
}
