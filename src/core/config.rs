//! Combat configuration with documented constants
//!
//! Every tunable number used by the engine lives here. Percentages are whole
//! percent values applied to the base rating of the fighter they modify.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::error::ConfigError;
use crate::core::types::ItemId;

/// Round loop and break thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoundConfig {
    /// Safety cap on rounds; a battle still undecided after this many rounds
    /// is declared a draw.
    ///
    /// Healing or raised soldiers can keep both sides above their thresholds
    /// indefinitely, so the loop needs an explicit bound.
    pub max_rounds: u32,

    /// Break point used when a lead character has none recorded (percent of
    /// the starting combat-sum)
    pub default_break_point: u32,

    /// Break point for garrisons. Zero means they fight until nobody is left.
    pub garrison_break_point: u32,
}

impl Default for RoundConfig {
    fn default() -> Self {
        Self {
            max_rounds: 100,
            default_break_point: 50,
            garrison_break_point: 0,
        }
    }
}

/// Command limits: how many troops a noble can bring into a fight
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandConfig {
    /// Men any noble commands without the "control men in battle" skill
    pub min_men: u32,
    /// Men per level of "control men in battle"
    pub men_per_level: u32,
    /// Beasts any noble commands without "control beasts in battle"
    pub min_beasts: u32,
    /// Beasts per level of "control beasts in battle"
    pub beasts_per_level: u32,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            min_men: 25,
            men_per_level: 25,
            min_beasts: 10,
            beasts_per_level: 10,
        }
    }
}

/// Terrain defense bonuses for the side occupying the ground
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainConfig {
    pub forest_pct: u32,
    pub mountain_pct: u32,
    pub city_pct: u32,
    pub swamp_pct: u32,
    /// Flat penalty to attack and defense of mounted or armored troops
    /// fighting in swamp or aboard ships
    pub heavy_penalty: u32,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            forest_pct: 50,
            mountain_pct: 100,
            city_pct: 50,
            swamp_pct: 25,
            heavy_penalty: 20,
        }
    }
}

/// Per-hit attack and defense modifiers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModifierConfig {
    /// Bonus for priests striking undead
    pub priest_vs_undead_pct: u32,
    /// Attack bonus per level of the lead's tactics skill
    pub tactics_pct_per_level: u32,
    /// Cap on the tactics bonus. 100 means attack at most doubles.
    pub tactics_cap_pct: u32,
    /// Defense bonus per level of the lead's defensive tactics skill
    pub defense_tactics_pct_per_level: u32,
    /// Defense bonus for followers of a blessed noble
    pub bless_followers_pct: u32,
    /// Defense bonus a moat grants against missile fire
    pub moat_pct: u32,
    /// Fortification coverage removed per enemy siege tower
    pub siege_tower_cover_pct: u32,
    /// Defense bonus for a side that foresaw the enemy's blows this round
    pub foresee_defense_pct: u32,
    /// Wound reduction per level of "avoid wounds" for an unaccompanied noble
    pub avoid_wounds_pct_per_level: u32,
    pub avoid_wounds_cap_pct: u32,
    /// Chance for a missile body led by an uncanny shot to aim at the
    /// enemy's own missile troops
    pub uncanny_chance_pct: u32,
    /// Attack and defense multiplier for pirates fighting on water
    pub pirate_multiplier: u32,
}

impl Default for ModifierConfig {
    fn default() -> Self {
        Self {
            priest_vs_undead_pct: 100,
            tactics_pct_per_level: 10,
            tactics_cap_pct: 100,
            defense_tactics_pct_per_level: 10,
            bless_followers_pct: 25,
            moat_pct: 50,
            siege_tower_cover_pct: 25,
            foresee_defense_pct: 50,
            avoid_wounds_pct_per_level: 10,
            avoid_wounds_cap_pct: 80,
            uncanny_chance_pct: 10,
            pirate_multiplier: 3,
        }
    }
}

/// Structural damage dealt per hit on a fortification
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiegeConfig {
    pub engine_damage_min: u32,
    pub engine_damage_max: u32,
}

impl Default for SiegeConfig {
    fn default() -> Self {
        Self {
            engine_damage_min: 5,
            engine_damage_max: 10,
        }
    }
}

/// Magnitudes of the special attacks
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpecialConfig {
    /// Attack rating of a lightning bolt per skill level
    pub lightning_power: u32,
    /// Attack rating of each fireball shot
    pub fireball_power: u32,
    pub fireball_shots_per_level: u32,
    /// Maximum aura drained per skill level
    pub drain_per_level: u32,
    /// Maximum soldiers raised per skill level
    pub raise_per_level: u32,
    pub raised_attack: u32,
    pub raised_defense: u32,
    /// Item id that labels raised soldiers in reports. They never persist.
    pub raised_item: ItemId,
}

impl Default for SpecialConfig {
    fn default() -> Self {
        Self {
            lightning_power: 150,
            fireball_power: 60,
            fireball_shots_per_level: 3,
            drain_per_level: 3,
            raise_per_level: 3,
            raised_attack: 20,
            raised_defense: 20,
            raised_item: ItemId(0),
        }
    }
}

/// Goods produced by the fallen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpoilsConfig {
    /// Item handed to the owner of slain beasts (hides, meat). None disables.
    pub animal_parts: Option<ItemId>,
    pub parts_per_animal: u32,
}

impl Default for SpoilsConfig {
    fn default() -> Self {
        Self {
            animal_parts: None,
            parts_per_animal: 1,
        }
    }
}

/// Prisoner-taking odds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrisonerConfig {
    /// Chance when both sides stand with equal troops
    pub base_pct: u32,
    pub min_pct: u32,
    pub max_pct: u32,
}

impl Default for PrisonerConfig {
    fn default() -> Self {
        Self {
            base_pct: 50,
            min_pct: 25,
            max_pct: 100,
        }
    }
}

/// Complete combat configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatConfig {
    pub rounds: RoundConfig,
    pub command: CommandConfig,
    pub terrain: TerrainConfig,
    pub modifiers: ModifierConfig,
    pub siege: SiegeConfig,
    pub specials: SpecialConfig,
    pub spoils: SpoilsConfig,
    pub prisoners: PrisonerConfig,
}

impl CombatConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a config from TOML text; missing sections keep their defaults
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: CombatConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rounds.max_rounds == 0 {
            return Err(ConfigError::Invalid("rounds.max_rounds must be positive".into()));
        }

        if self.rounds.default_break_point > 100 || self.rounds.garrison_break_point > 100 {
            return Err(ConfigError::Invalid("break points are percentages (0-100)".into()));
        }

        if self.siege.engine_damage_min > self.siege.engine_damage_max {
            return Err(ConfigError::Invalid(format!(
                "siege.engine_damage_min ({}) should be <= engine_damage_max ({})",
                self.siege.engine_damage_min, self.siege.engine_damage_max
            )));
        }

        if self.prisoners.min_pct > self.prisoners.max_pct || self.prisoners.max_pct > 100 {
            return Err(ConfigError::Invalid(format!(
                "prisoner odds must satisfy min_pct ({}) <= max_pct ({}) <= 100",
                self.prisoners.min_pct, self.prisoners.max_pct
            )));
        }

        if self.modifiers.avoid_wounds_cap_pct > 100 || self.modifiers.uncanny_chance_pct > 100 {
            return Err(ConfigError::Invalid(
                "avoid_wounds_cap_pct and uncanny_chance_pct are percentages".into(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(CombatConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = CombatConfig::from_toml_str(
            r#"
            [rounds]
            max_rounds = 12

            [spoils]
            animal_parts = 77
            "#,
        )
        .expect("partial config should parse");

        assert_eq!(config.rounds.max_rounds, 12);
        assert_eq!(config.rounds.default_break_point, 50);
        assert_eq!(config.spoils.animal_parts, Some(ItemId(77)));
        assert_eq!(config.siege.engine_damage_max, 10);
    }

    #[test]
    fn test_inverted_siege_damage_rejected() {
        let result = CombatConfig::from_toml_str(
            r#"
            [siege]
            engine_damage_min = 12
            engine_damage_max = 4
            "#,
        );
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_malformed_toml_is_parse_error() {
        let result = CombatConfig::from_toml_str("rounds = [");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }
}
