//! Pre-battle rating adjustments
//!
//! These are static: applied once when a fighter enters the line and never
//! revisited. Per-hit bonuses live in `hit`.

use crate::battle::conditions::Conditions;
use crate::battle::fighter::Fighter;
use crate::core::config::CombatConfig;
use crate::core::types::Traits;

/// Adjust a fighter's ratings for the ground and the weather.
///
/// Applied in order: walls, heavy troops in swamp or at sea, wind, rain,
/// pirates on water.
pub fn rate_fighter(fighter: &mut Fighter, conditions: &Conditions, config: &CombatConfig) {
    if fighter.is_fortification() {
        fighter.defense = fighter.current_count + fighter.bonuses.fortify;
        return;
    }

    if conditions.hampers_heavy_troops()
        && fighter.traits.intersects(Traits::MOUNTED | Traits::ARMORED)
    {
        let penalty = config.terrain.heavy_penalty;
        fighter.attack = fighter.attack.saturating_sub(penalty);
        fighter.defense = fighter.defense.saturating_sub(penalty);
    }

    if conditions.wind {
        fighter.missile /= 2;
    }

    if conditions.rain && fighter.traits.contains(Traits::ARCHER) {
        fighter.missile = 0;
    }

    if conditions.naval && fighter.traits.contains(Traits::PIRATE) {
        let multiplier = config.modifiers.pirate_multiplier;
        fighter.attack = fighter.attack.saturating_mul(multiplier);
        fighter.defense = fighter.defense.saturating_mul(multiplier);
    }
}

/// Walls follow their remaining points as they are battered down
pub fn refresh_fortification(fighter: &mut Fighter) {
    if fighter.is_fortification() {
        fighter.defense = fighter.current_count + fighter.bonuses.fortify;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{ItemId, Ratings, UnitId};

    fn troop(ratings: Ratings, traits: Traits) -> Fighter {
        Fighter::troop(UnitId(1), ItemId(10), 10, ratings, traits)
    }

    #[test]
    fn test_wind_halves_missile_with_truncation() {
        let config = CombatConfig::default();
        let windy = Conditions {
            wind: true,
            ..Default::default()
        };
        for missile in [0, 1, 7, 30, 31, 99] {
            let mut archers = troop(Ratings::new(5, 5, missile), Traits::empty());
            rate_fighter(&mut archers, &windy, &config);
            assert_eq!(archers.missile, missile / 2);
            assert_eq!(archers.attack, 5);
        }
    }

    #[test]
    fn test_rain_grounds_archers_only() {
        let config = CombatConfig::default();
        let rain = Conditions {
            rain: true,
            ..Default::default()
        };
        let mut archers = troop(Ratings::new(5, 5, 30), Traits::ARCHER);
        let mut slingers = troop(Ratings::new(5, 5, 20), Traits::empty());
        rate_fighter(&mut archers, &rain, &config);
        rate_fighter(&mut slingers, &rain, &config);
        assert_eq!(archers.missile, 0);
        assert_eq!(slingers.missile, 20);
    }

    #[test]
    fn test_heavy_troops_in_swamp() {
        let config = CombatConfig::default();
        let swamp = Conditions {
            swamp: true,
            ..Default::default()
        };
        let mut knights = troop(Ratings::new(40, 15, 0), Traits::MOUNTED);
        rate_fighter(&mut knights, &swamp, &config);
        assert_eq!(knights.attack, 20);
        assert_eq!(knights.defense, 0);
    }

    #[test]
    fn test_pirates_triple_on_water() {
        let config = CombatConfig::default();
        let deck = Conditions {
            naval: true,
            ..Default::default()
        };
        let mut pirates = troop(Ratings::new(10, 8, 0), Traits::PIRATE);
        rate_fighter(&mut pirates, &deck, &config);
        assert_eq!(pirates.attack, 30);
        assert_eq!(pirates.defense, 24);

        let mut ashore = troop(Ratings::new(10, 8, 0), Traits::PIRATE);
        rate_fighter(&mut ashore, &Conditions::default(), &config);
        assert_eq!(ashore.attack, 10);
    }

    #[test]
    fn test_improved_fortification() {
        let mut walls = Fighter::fortification(UnitId(50), 60);
        walls.bonuses.fortify = 15;
        rate_fighter(&mut walls, &Conditions::default(), &CombatConfig::default());
        assert_eq!(walls.defense, 75);

        walls.current_count = 20;
        refresh_fortification(&mut walls);
        assert_eq!(walls.defense, 35);
    }
}
