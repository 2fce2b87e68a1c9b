//! Core type definitions used throughout the codebase

use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Identifier for anything that lives in the game world: nobles, garrisons,
/// structures, provinces and ships share one namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitId(pub u32);

impl UnitId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.0)
    }
}

/// Identifier for an item kind (soldiers, horses, catapults, gold...)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId(pub u32);

impl ItemId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "item {}", self.0)
    }
}

/// The two sides of a battle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Attacker,
    Defender,
}

impl Side {
    pub fn index(self) -> usize {
        match self {
            Self::Attacker => 0,
            Self::Defender => 1,
        }
    }

    pub fn opponent(self) -> Self {
        match self {
            Self::Attacker => Self::Defender,
            Self::Defender => Self::Attacker,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Attacker => write!(f, "attacker"),
            Self::Defender => write!(f, "defender"),
        }
    }
}

bitflags! {
    /// Combat-relevant traits of a troop kind or a character
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct Traits: u32 {
        const MOUNTED = 1 << 0;
        const ARMORED = 1 << 1;
        const ARCHER = 1 << 2;
        const ANIMAL = 1 << 3;
        const SIEGE_ENGINE = 1 << 4;
        const SIEGE_TOWER = 1 << 5;
        const PANIC_PRONE = 1 << 6;
        const PIKEMAN = 1 << 7;
        const TOUGH = 1 << 8;
        const UNDEAD = 1 << 9;
        const PRIEST = 1 << 10;
        /// Magic-user hostile to clerics; refuses priestly blessings
        const MAGE = 1 << 11;
        const PIRATE = 1 << 12;
    }
}

/// Attack, defense and missile values of a combatant
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ratings {
    pub attack: u32,
    pub defense: u32,
    pub missile: u32,
}

impl Ratings {
    pub fn new(attack: u32, defense: u32, missile: u32) -> Self {
        Self {
            attack,
            defense,
            missile,
        }
    }
}
