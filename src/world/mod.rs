//! The game world as seen from a battle
//!
//! Combat never owns game state. Everything it needs to know about stacks,
//! diplomacy, characters, items and places comes through these traits, and
//! the handful of mutations it performs happen only during reconciliation.

pub mod memory;
pub mod scenario;

use serde::{Deserialize, Serialize};

use crate::core::types::{ItemId, Ratings, Traits, UnitId};

pub use memory::MemoryWorld;
pub use scenario::Scenario;

/// What kind of combatant a unit is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    Noble,
    /// A standing garrison: no personal stats, fights through its men
    Garrison,
}

/// Personal combat profile of a noble
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Character {
    pub name: String,
    pub attack: u32,
    pub defense: u32,
    pub missile: u32,
    /// Ratings while mounted or wielding a weapon, replacing the base values
    #[serde(default)]
    pub mounted: Option<Ratings>,
    /// Current health, 0-100
    #[serde(default = "default_health")]
    pub health: u32,
    /// Rank this noble and its men take in battle; 0 is the front line
    #[serde(default)]
    pub behind: u8,
    /// Percent of starting strength at which a stack led by this noble breaks
    #[serde(default)]
    pub break_point: Option<u32>,
    /// Health at or below which a noble who fights to the death withdraws
    #[serde(default)]
    pub personal_break: u32,
    #[serde(default)]
    pub aura: u32,
    #[serde(default)]
    pub traits: Traits,
}

fn default_health() -> u32 {
    100
}

impl Character {
    pub fn new(name: impl Into<String>, attack: u32, defense: u32, missile: u32) -> Self {
        Self {
            name: name.into(),
            attack,
            defense,
            missile,
            mounted: None,
            health: 100,
            behind: 0,
            break_point: None,
            personal_break: 0,
            aura: 0,
            traits: Traits::empty(),
        }
    }

    /// Ratings used in combat; the mounted override wins when present
    pub fn ratings(&self) -> Ratings {
        self.mounted
            .unwrap_or(Ratings::new(self.attack, self.defense, self.missile))
    }
}

/// Static profile of an item kind
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemProfile {
    pub name: String,
    #[serde(default)]
    pub attack: u32,
    #[serde(default)]
    pub defense: u32,
    #[serde(default)]
    pub missile: u32,
    #[serde(default)]
    pub traits: Traits,
}

impl ItemProfile {
    pub fn new(name: impl Into<String>, attack: u32, defense: u32, missile: u32) -> Self {
        Self {
            name: name.into(),
            attack,
            defense,
            missile,
            traits: Traits::empty(),
        }
    }

    pub fn with_traits(mut self, traits: Traits) -> Self {
        self.traits = traits;
        self
    }

    /// Items that take a place in the battle line
    pub fn is_troop(&self) -> bool {
        self.attack > 0
            || self.defense > 0
            || self.missile > 0
            || self.traits.intersects(Traits::SIEGE_ENGINE | Traits::SIEGE_TOWER)
    }

    pub fn ratings(&self) -> Ratings {
        Ratings::new(self.attack, self.defense, self.missile)
    }
}

/// A castle, tower or other defensible building
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Structure {
    pub name: String,
    pub hit_points: u32,
    #[serde(default)]
    pub damage: u32,
    /// Defense bonus (percent) for fighters inside while undamaged
    pub coverage: u32,
    #[serde(default)]
    pub moat: bool,
    /// Magnitude of an "improve fortification" effect on the walls
    #[serde(default)]
    pub fortified: u32,
    /// Under a "bless fortification" effect
    #[serde(default)]
    pub blessed: bool,
    #[serde(default)]
    pub owner: Option<UnitId>,
    /// Province the structure stands in
    pub location: UnitId,
}

impl Structure {
    /// Points left before the structure stops protecting anyone
    pub fn remaining(&self) -> u32 {
        self.hit_points.saturating_sub(self.damage)
    }
}

/// Ground the battle is fought on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Terrain {
    #[default]
    Plain,
    Forest,
    Mountain,
    City,
    Swamp,
    Desert,
    Ocean,
}

/// A province, sea region or ship
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    #[serde(default)]
    pub terrain: Terrain,
    #[serde(default)]
    pub rain: bool,
    #[serde(default)]
    pub wind: bool,
    #[serde(default)]
    pub fog: bool,
    /// Open water
    #[serde(default)]
    pub ocean: bool,
    /// Deck of a ship
    #[serde(default)]
    pub ship: bool,
    /// Adjacent locations, nearest first
    #[serde(default)]
    pub neighbors: Vec<UnitId>,
    /// Ruling garrison defending the province
    #[serde(default)]
    pub garrison: Option<UnitId>,
    /// Fortification the garrison holds
    #[serde(default)]
    pub structure: Option<UnitId>,
}

/// Proficiencies that matter in battle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Skill {
    ControlMen,
    ControlBeasts,
    AvoidWounds,
    FightToTheDeath,
    Tactics,
    DefenseTactics,
    UncannyAccuracy,
    LightningBolt,
    Fireball,
    DrainMana,
    RaiseSoldiers,
    ForeseeDefense,
}

/// Timed effects that matter in battle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    /// On a structure: extra defense for its fortification
    ImproveFortification,
    /// On a structure: half of all hits against it are turned aside
    BlessFortification,
    /// On a noble: its men defend better
    BlessFollowers,
    /// On a lead noble: its side strikes harder
    ScryOffense,
    /// On a noble: command limits scale up by this percent
    CommandBonus,
    /// On a noble: a fatal wound is survived once
    SurviveFatalWound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// Flat attack bonus for its bearer
    Weapon,
    /// Percent attack bonus in melee for the bearer's fighters
    Melee,
    /// Percent attack bonus for missile fire
    Missile,
    /// Percent attack bonus for special attacks
    Special,
    /// Percent defense bonus
    Defense,
    /// Extra men commanded
    CommandMen,
    /// Extra beasts commanded
    CommandBeasts,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub kind: ArtifactKind,
    pub bonus: u32,
}

/// Who is stacked with whom
pub trait StackView {
    /// Top of the stack containing `unit`
    fn stack_leader(&self, unit: UnitId) -> UnitId;
    /// Unit directly above `unit` in its stack
    fn stacked_under(&self, unit: UnitId) -> Option<UnitId>;
    /// `leader` followed by every unit nested beneath it, depth first
    fn stack_members(&self, leader: UnitId) -> Vec<UnitId>;
    fn location_of(&self, unit: UnitId) -> Option<UnitId>;
    /// Stack leaders present at a location, in location order
    fn stack_leaders_at(&self, location: UnitId) -> Vec<UnitId>;
}

/// Hostility and permission predicates
pub trait Diplomacy {
    fn is_hostile(&self, a: UnitId, b: UnitId) -> bool;
    /// Will `defender` join a fight on behalf of `protege`
    fn will_defend(&self, defender: UnitId, protege: UnitId) -> bool;
    fn controls_structure(&self, unit: UnitId, structure: UnitId) -> bool;
}

/// Unit, item and place records
pub trait UnitRecords {
    fn unit_kind(&self, unit: UnitId) -> Option<UnitKind>;
    fn character(&self, unit: UnitId) -> Option<&Character>;
    /// Items carried, in inventory order
    fn holdings(&self, unit: UnitId) -> Vec<(ItemId, u32)>;
    fn item(&self, item: ItemId) -> Option<&ItemProfile>;
    /// Skill level; 0 when unknown
    fn skill_level(&self, unit: UnitId, skill: Skill) -> u32;
    /// Magnitude of an active effect on a unit or structure
    fn effect(&self, unit: UnitId, effect: EffectKind) -> Option<u32>;
    fn artifacts(&self, unit: UnitId) -> Vec<Artifact>;
    fn structure(&self, id: UnitId) -> Option<&Structure>;
    fn location(&self, id: UnitId) -> Option<&Location>;
    /// Item an attacker must hold to defeat this unit
    fn defeat_requirement(&self, unit: UnitId) -> Option<ItemId>;

    fn consume_items(&mut self, unit: UnitId, item: ItemId, qty: u32);
    fn grant_items(&mut self, unit: UnitId, item: ItemId, qty: u32);
    fn set_health(&mut self, unit: UnitId, health: u32);
    fn change_aura(&mut self, unit: UnitId, delta: i32);
    fn clear_effect(&mut self, unit: UnitId, effect: EffectKind);
    fn damage_structure(&mut self, structure: UnitId, points: u32);
    /// Stop in-progress movement and queued orders
    fn halt_orders(&mut self, unit: UnitId);
    fn clear_guard(&mut self, unit: UnitId);
    /// Move a unit (and everything stacked beneath it) to a new location
    fn relocate(&mut self, unit: UnitId, to: UnitId);
    fn take_prisoner(&mut self, captor: UnitId, prisoner: UnitId);
    /// The winner takes the loser's place in the location ordering
    fn seize_position(&mut self, winner: UnitId, loser: UnitId);
}

/// Body and soul handling for nobles who die in battle
pub trait DeathHook {
    fn noble_died(&mut self, noble: UnitId, killer: Option<UnitId>);
}

/// Everything a battle needs from the game
pub trait World: StackView + Diplomacy + UnitRecords + DeathHook {}

impl<T: StackView + Diplomacy + UnitRecords + DeathHook> World for T {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mounted_override_replaces_ratings() {
        let mut knight = Character::new("Osric", 60, 60, 0);
        assert_eq!(knight.ratings(), Ratings::new(60, 60, 0));

        knight.mounted = Some(Ratings::new(90, 80, 0));
        assert_eq!(knight.ratings(), Ratings::new(90, 80, 0));
    }

    #[test]
    fn test_gold_is_not_a_troop() {
        assert!(!ItemProfile::new("gold", 0, 0, 0).is_troop());
        assert!(ItemProfile::new("soldier", 5, 5, 0).is_troop());
        assert!(ItemProfile::new("siege tower", 0, 0, 0)
            .with_traits(Traits::SIEGE_TOWER)
            .is_troop());
    }

    #[test]
    fn test_structure_remaining_saturates() {
        let castle = Structure {
            name: "Castle".into(),
            hit_points: 100,
            damage: 130,
            coverage: 100,
            moat: false,
            fortified: 0,
            blessed: false,
            owner: None,
            location: UnitId(1),
        };
        assert_eq!(castle.remaining(), 0);
    }
}
