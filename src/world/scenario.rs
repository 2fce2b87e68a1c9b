//! Battle scenarios loaded from TOML
//!
//! A scenario describes a small world (items, places, units, diplomacy) plus
//! the attack to resolve in it. The runner binary and the integration tests
//! load these from `data/scenarios/{name}.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::battle::engine::AttackRequest;
use crate::core::error::ConfigError;
use crate::core::types::{ItemId, UnitId};
use crate::world::memory::{MemoryWorld, UnitRecord};
use crate::world::{Artifact, Character, EffectKind, ItemProfile, Location, Skill, Structure, UnitKind};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttackEntry {
    pub attacker: u32,
    pub target: u32,
    #[serde(default)]
    pub seize: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemEntry {
    pub id: u32,
    #[serde(flatten)]
    pub profile: ItemProfile,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationEntry {
    pub id: u32,
    #[serde(flatten)]
    pub location: Location,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructureEntry {
    pub id: u32,
    #[serde(flatten)]
    pub structure: Structure,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoldingEntry {
    pub item: u32,
    pub count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillEntry {
    pub skill: Skill,
    pub level: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectEntry {
    pub effect: EffectKind,
    #[serde(default = "default_magnitude")]
    pub magnitude: u32,
}

fn default_magnitude() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitEntry {
    pub id: u32,
    #[serde(default = "default_kind")]
    pub kind: UnitKind,
    pub location: u32,
    #[serde(default)]
    pub stacked_under: Option<u32>,
    #[serde(default)]
    pub character: Option<Character>,
    #[serde(default)]
    pub holdings: Vec<HoldingEntry>,
    #[serde(default)]
    pub skills: Vec<SkillEntry>,
    #[serde(default)]
    pub effects: Vec<EffectEntry>,
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
    #[serde(default)]
    pub guarding: bool,
    #[serde(default)]
    pub defeat_requirement: Option<u32>,
}

fn default_kind() -> UnitKind {
    UnitKind::Noble
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairEntry {
    pub a: u32,
    pub b: u32,
}

/// Complete scenario file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub seed: Option<u64>,
    pub attack: AttackEntry,
    #[serde(default)]
    pub items: Vec<ItemEntry>,
    #[serde(default)]
    pub locations: Vec<LocationEntry>,
    #[serde(default)]
    pub structures: Vec<StructureEntry>,
    #[serde(default)]
    pub units: Vec<UnitEntry>,
    /// Mutually hostile pairs
    #[serde(default)]
    pub hostile: Vec<PairEntry>,
    /// `a` will defend `b`
    #[serde(default)]
    pub defends: Vec<PairEntry>,
}

impl Scenario {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let scenario: Scenario = toml::from_str(content)?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Load a scenario from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let mut scenario = Self::from_toml_str(&content)?;
        if scenario.name.is_empty() {
            scenario.name = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
        }
        Ok(scenario)
    }

    /// Load `data/scenarios/{name}.toml`
    pub fn load_named(name: &str) -> Result<Self, ConfigError> {
        Self::load(scenario_path(name))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let known = |id: u32| self.units.iter().any(|u| u.id == id);

        if !known(self.attack.attacker) {
            return Err(ConfigError::Invalid(format!(
                "attacker {} is not a unit of the scenario",
                self.attack.attacker
            )));
        }

        for unit in &self.units {
            if unit.kind == UnitKind::Noble && unit.character.is_none() {
                return Err(ConfigError::Invalid(format!(
                    "noble {} has no character block",
                    unit.id
                )));
            }
            if let Some(parent) = unit.stacked_under {
                if !known(parent) {
                    return Err(ConfigError::Invalid(format!(
                        "unit {} is stacked under unknown unit {}",
                        unit.id, parent
                    )));
                }
            }
        }

        Ok(())
    }

    pub fn request(&self) -> AttackRequest {
        AttackRequest {
            attacker: UnitId(self.attack.attacker),
            target: UnitId(self.attack.target),
            seize_on_win: self.attack.seize,
        }
    }

    /// Build the in-memory world described by this scenario
    pub fn build_world(&self) -> MemoryWorld {
        let mut world = MemoryWorld::new();

        for entry in &self.items {
            world.add_item(ItemId(entry.id), entry.profile.clone());
        }
        for entry in &self.locations {
            world.add_location(UnitId(entry.id), entry.location.clone());
        }
        for entry in &self.structures {
            world.add_structure(UnitId(entry.id), entry.structure.clone());
        }

        for entry in &self.units {
            let location = UnitId(entry.location);
            let mut record = match (entry.kind, &entry.character) {
                (UnitKind::Noble, Some(character)) => UnitRecord::noble(character.clone(), location),
                (UnitKind::Noble, None) => {
                    UnitRecord::noble(Character::new(format!("unit {}", entry.id), 0, 0, 0), location)
                }
                (UnitKind::Garrison, _) => UnitRecord::garrison(location),
            };
            record.stacked_under = entry.stacked_under.map(UnitId);
            record.holdings = entry
                .holdings
                .iter()
                .map(|h| (ItemId(h.item), h.count))
                .collect();
            record.skills = entry.skills.iter().map(|s| (s.skill, s.level)).collect();
            record.effects = entry.effects.iter().map(|e| (e.effect, e.magnitude)).collect();
            record.artifacts = entry.artifacts.clone();
            record.guarding = entry.guarding;
            record.defeat_requirement = entry.defeat_requirement.map(ItemId);
            world.add_unit(UnitId(entry.id), record);
        }

        for pair in &self.hostile {
            world.declare_hostile(UnitId(pair.a), UnitId(pair.b));
        }
        for pair in &self.defends {
            world.pledge_defense(UnitId(pair.a), UnitId(pair.b));
        }

        world
    }
}

/// Get path to a named scenario file
fn scenario_path(name: &str) -> PathBuf {
    PathBuf::from("data/scenarios").join(format!("{}.toml", name))
}
