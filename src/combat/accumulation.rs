//! Damage accumulation ("bucket") model
//!
//! Per-unit attrition. Positive net damage kills immediately; negative net
//! damage fills a bucket whose whole points overflow into casualties on
//! later turns.

use serde::{Deserialize, Serialize};

/// Casualties per point of net damage
pub const CASUALTIES_PER_POINT: f32 = 5.0;

/// Floor on casualties from a positive net damage hit
pub const MIN_DIRECT_CASUALTIES: u32 = 2;

/// Bucket state carried on a unit between turns
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DamageAccumulation {
    pub accumulator: f32,
}

impl DamageAccumulation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one turn's net damage (attack - defense), returning casualties
    ///
    /// The bucket overflows once it holds strictly more than one point. A
    /// bucket holding exactly 1.0 does not overflow and carries into the
    /// next turn, so between turns it lies in [0, 1]; after an overflow it
    /// lies in [0, 1).
    pub fn apply(&mut self, net_damage: f32) -> u32 {
        if !net_damage.is_finite() {
            return 0;
        }

        if net_damage > 0.0 {
            self.accumulator = 0.0;
            let casualties = (net_damage * CASUALTIES_PER_POINT).round() as u32;
            return casualties.max(MIN_DIRECT_CASUALTIES);
        }

        self.accumulator += net_damage.abs();
        if self.accumulator > 1.0 {
            let whole = self.accumulator.floor();
            self.accumulator -= whole;
            return (whole * CASUALTIES_PER_POINT) as u32;
        }
        0
    }

    /// Casualties capped at the unit's remaining strength
    pub fn apply_capped(&mut self, net_damage: f32, current_strength: u32) -> u32 {
        self.apply(net_damage).min(current_strength)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positive_damage_direct_casualties() {
        let mut bucket = DamageAccumulation { accumulator: 0.6 };
        assert_eq!(bucket.apply(3.0), 15);
        assert_eq!(bucket.accumulator, 0.0);
    }

    #[test]
    fn test_small_positive_damage_has_floor() {
        let mut bucket = DamageAccumulation::new();
        assert_eq!(bucket.apply(0.1), 2);
    }

    #[test]
    fn test_integer_negative_damage_overflows_every_turn() {
        let mut bucket = DamageAccumulation::new();
        let mut total = 0;
        for _ in 0..3 {
            let casualties = bucket.apply(-2.0);
            assert_eq!(casualties, 10);
            assert_eq!(bucket.accumulator, 0.0);
            total += casualties;
        }
        assert_eq!(total, 30);
    }

    #[test]
    fn test_unit_negative_damage_overflows_every_other_turn() {
        let mut bucket = DamageAccumulation::new();
        let per_turn: Vec<u32> = (0..4).map(|_| bucket.apply(-1.0)).collect();
        assert_eq!(per_turn[0], 0);
        assert!(per_turn[1] > 0);
        assert_eq!(per_turn[2], 0);
        assert!(per_turn[3] > 0);
        assert_eq!(per_turn.iter().sum::<u32>(), 20);
    }

    #[test]
    fn test_exactly_one_point_carries_over() {
        let mut bucket = DamageAccumulation::new();
        assert_eq!(bucket.apply(-1.0), 0);
        assert_eq!(bucket.accumulator, 1.0);
        assert_eq!(bucket.apply(-0.5), 5);
        assert!((bucket.accumulator - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_fraction_persists_after_overflow() {
        let mut bucket = DamageAccumulation::new();
        assert_eq!(bucket.apply(-0.7), 0);
        assert_eq!(bucket.apply(-0.7), 5);
        assert!((bucket.accumulator - 0.4).abs() < 1e-5);
        assert!(bucket.accumulator >= 0.0 && bucket.accumulator < 1.0);
    }

    #[test]
    fn test_zero_damage_is_noop() {
        let mut bucket = DamageAccumulation { accumulator: 0.5 };
        assert_eq!(bucket.apply(0.0), 0);
        assert_eq!(bucket.accumulator, 0.5);
    }

    #[test]
    fn test_capped_at_strength() {
        let mut bucket = DamageAccumulation::new();
        assert_eq!(bucket.apply_capped(10.0, 7), 7);
    }
}
