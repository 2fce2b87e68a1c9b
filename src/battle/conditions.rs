//! Ground and weather of a battle
//!
//! Captured once when the battle lines are built and held immutable until
//! the battle ends.

use serde::{Deserialize, Serialize};

use crate::core::config::TerrainConfig;
use crate::world::{Location, Terrain};

/// Snapshot of the conditions a battle is fought in
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conditions {
    pub terrain: Terrain,
    pub rain: bool,
    pub wind: bool,
    pub fog: bool,
    pub swamp: bool,
    /// Fought on water or aboard a ship
    pub naval: bool,
    /// Open water: nowhere for the beaten to flee
    pub at_sea: bool,
}

impl Conditions {
    pub fn from_location(location: &Location) -> Self {
        let naval = location.ocean || location.ship || location.terrain == Terrain::Ocean;
        Self {
            terrain: location.terrain,
            rain: location.rain,
            wind: location.wind,
            fog: location.fog,
            swamp: location.terrain == Terrain::Swamp,
            naval,
            at_sea: location.ocean || location.terrain == Terrain::Ocean,
        }
    }

    /// Defense bonus (percent) for the side holding this ground
    pub fn terrain_defense_pct(&self, config: &TerrainConfig) -> u32 {
        match self.terrain {
            Terrain::Forest => config.forest_pct,
            Terrain::Mountain => config.mountain_pct,
            Terrain::City => config.city_pct,
            Terrain::Swamp => config.swamp_pct,
            Terrain::Plain | Terrain::Desert | Terrain::Ocean => 0,
        }
    }

    /// Mounted and armored troops flounder here
    pub fn hampers_heavy_troops(&self) -> bool {
        self.swamp || self.naval
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terrain_bonus() {
        let config = TerrainConfig::default();
        let forest = Conditions {
            terrain: Terrain::Forest,
            ..Default::default()
        };
        assert_eq!(forest.terrain_defense_pct(&config), 50);
        assert_eq!(Conditions::default().terrain_defense_pct(&config), 0);
    }

    #[test]
    fn test_ship_deck_is_naval_but_not_open_sea() {
        let deck = Location {
            name: "Sea Wolf".into(),
            ship: true,
            ..Default::default()
        };
        let conditions = Conditions::from_location(&deck);
        assert!(conditions.naval);
        assert!(!conditions.at_sea);
        assert!(conditions.hampers_heavy_troops());
    }
}
