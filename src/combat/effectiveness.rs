//! Attack / defense / mobility aggregation
//!
//! Per unit: (quality base + equipment + training + veteran bonus), scaled by
//! the fraction of the unit still standing. A force sums its units.

use serde::{Deserialize, Serialize};

use crate::battle::units::{QualityType, Unit};

/// Aggregated combat stats of one unit or force
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ForceStats {
    pub attack: f32,
    pub defense: f32,
    pub mobility: f32,
}

impl ForceStats {
    pub fn scaled(self, factor: f32) -> Self {
        Self {
            attack: self.attack * factor,
            defense: self.defense * factor,
            mobility: self.mobility * factor,
        }
    }
}

impl std::ops::Add for ForceStats {
    type Output = ForceStats;

    fn add(self, rhs: Self) -> Self {
        Self {
            attack: self.attack + rhs.attack,
            defense: self.defense + rhs.defense,
            mobility: self.mobility + rhs.mobility,
        }
    }
}

impl std::iter::Sum for ForceStats {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(ForceStats::default(), |acc, s| acc + s)
    }
}

/// Base (attack, defense, mobility) by quality tier
pub fn base_stats(quality: QualityType) -> ForceStats {
    let (attack, defense, mobility) = match quality {
        QualityType::Levy => (2.0, 2.0, 2.0),
        QualityType::Militia => (3.0, 3.0, 3.0),
        QualityType::Professional => (5.0, 5.0, 4.0),
        QualityType::VeteranMercenary => (6.0, 5.0, 4.0),
        QualityType::Elite => (7.0, 7.0, 5.0),
    };
    ForceStats {
        attack,
        defense,
        mobility,
    }
}

/// Step bonus from the experience counter
pub fn veteran_bonus(experience: u32) -> f32 {
    match experience {
        0 => -1.0,
        1..=2 => 0.0,
        3..=5 => 1.0,
        6..=10 => 2.0,
        _ => 3.0,
    }
}

/// Stats of one unit at full strength
pub fn unit_base_stats(unit: &Unit) -> ForceStats {
    let base = base_stats(unit.quality_type);
    let vet = veteran_bonus(unit.experience);
    let drill = unit.training.modifier();
    let mounted = if unit.is_mounted() { 2.0 } else { 0.0 };

    ForceStats {
        attack: base.attack + unit.weapon.class.attack_bonus() + vet + drill,
        defense: base.defense
            + unit.armor.defense_bonus()
            + unit.shield.defense_bonus()
            + vet
            + drill,
        mobility: base.mobility + mounted - unit.armor.mobility_penalty(),
    }
}

/// Stats of one unit scaled by its remaining strength
pub fn unit_stats(unit: &Unit) -> ForceStats {
    unit_base_stats(unit).scaled(unit.strength_ratio())
}

/// Summed stats of a group of units
pub fn aggregate_force<'a, I>(units: I) -> ForceStats
where
    I: IntoIterator<Item = &'a Unit>,
{
    units.into_iter().map(unit_stats).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::grid::GridCoord;
    use crate::battle::unit_type::UnitType;
    use crate::combat::weapons::{ArmorClass, ShieldType, WeaponClass, WeaponRef};

    fn unit(strength: u32) -> Unit {
        let mut u = Unit::new("u", UnitType::Infantry, GridCoord::new(0, 0).unwrap(), 100);
        u.current_strength = strength;
        u.experience = 1;
        u.weapon = WeaponRef::new("gladius", WeaponClass::Sword);
        u.armor = ArmorClass::Medium;
        u.shield = ShieldType::None;
        u
    }

    #[test]
    fn test_veteran_steps() {
        assert_eq!(veteran_bonus(0), -1.0);
        assert_eq!(veteran_bonus(2), 0.0);
        assert_eq!(veteran_bonus(3), 1.0);
        assert_eq!(veteran_bonus(5), 1.0);
        assert_eq!(veteran_bonus(10), 2.0);
        assert_eq!(veteran_bonus(11), 3.0);
    }

    #[test]
    fn test_quality_tiers_increase() {
        assert!(
            base_stats(QualityType::Levy).attack < base_stats(QualityType::Professional).attack
        );
        assert!(
            base_stats(QualityType::Professional).attack < base_stats(QualityType::Elite).attack
        );
    }

    #[test]
    fn test_unit_stats_scale_with_strength() {
        let full = unit_stats(&unit(100));
        let half = unit_stats(&unit(50));
        // professional 5 + sword 1 + vet 0 + drilled 0
        assert_eq!(full.attack, 6.0);
        // professional 5 + medium 2
        assert_eq!(full.defense, 7.0);
        assert!((half.attack - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_aggregate_sums_units() {
        let units = [unit(100), unit(100)];
        let force = aggregate_force(units.iter());
        assert_eq!(force.attack, 12.0);
    }
}
