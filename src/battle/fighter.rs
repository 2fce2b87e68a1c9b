//! Fighters: the combat slots a battle line is made of
//!
//! A fighter is a noble, a garrison's standard, a homogeneous group of one
//! troop kind, or the fortification the defenders stand behind. Fighters are
//! never reordered or removed during a battle; a fallen fighter stays in
//! place with a count of zero.

use serde::{Deserialize, Serialize};

use crate::battle::special::SpecialAttack;
use crate::core::types::{ItemId, Ratings, Traits, UnitId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FighterKind {
    /// Walls of the defended structure; count is its remaining points
    Fortification,
    Noble,
    /// A garrison's standard. No stats of its own.
    Garrison,
    Troop(ItemId),
}

/// Per-hit bonuses a fighter inherits from the noble it belongs to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FighterBonuses {
    /// Flat attack from a weapon artifact; only on the bearer's own slot
    pub weapon: u32,
    pub melee_pct: u32,
    pub missile_pct: u32,
    pub special_pct: u32,
    pub defense_pct: u32,
    pub blessed: bool,
    /// Owning noble is an uncanny shot
    pub uncanny: bool,
    /// Extra fortification defense (fortification slot only)
    pub fortify: u32,
}

/// Personal state of a noble during the battle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NobleState {
    /// Health as it will be once the battle is over
    pub health: u32,
    pub starting_health: u32,
    pub personal_break: u32,
    pub fights_to_death: bool,
    /// Level of "avoid wounds"
    pub avoid_wounds: u32,
    pub aura: u32,
    pub starting_aura: u32,
    /// Special attacks known, with skill level, in preference order
    pub specials: Vec<(SpecialAttack, u32)>,
    pub can_survive_fatal: bool,
    pub survived_fatal: bool,
}

impl NobleState {
    pub fn new(health: u32, aura: u32) -> Self {
        Self {
            health,
            starting_health: health,
            personal_break: 0,
            fights_to_death: false,
            avoid_wounds: 0,
            aura,
            starting_aura: aura,
            specials: Vec::new(),
            can_survive_fatal: false,
            survived_fatal: false,
        }
    }

    /// Killed outright, with no magic to save them
    pub fn is_dead(&self) -> bool {
        self.health == 0 && !self.survived_fatal
    }

    pub fn aura_delta(&self) -> i32 {
        self.aura as i32 - self.starting_aura as i32
    }
}

/// One combat slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fighter {
    /// Noble, garrison or structure the slot belongs to
    pub unit: UnitId,
    pub kind: FighterKind,
    pub traits: Traits,
    pub original_count: u32,
    pub current_count: u32,
    pub hits_this_phase: u32,
    pub hits_this_battle: u32,
    /// Bodies that ran rather than died
    pub fled: u32,
    pub noble: Option<NobleState>,
    pub attack: u32,
    pub defense: u32,
    pub missile: u32,
    /// 0 is the front line; higher ranks wait in reserve
    pub rank: u8,
    /// Index of the fighter this one shields
    pub protects: Option<usize>,
    /// Living fighters shielding this one
    pub protector_count: u32,
    pub is_ally: bool,
    pub inside: bool,
    pub prisoner: bool,
    pub seize_slot: bool,
    /// Raised during the battle; gone when it ends
    pub summoned: bool,
    pub bonuses: FighterBonuses,
}

impl Fighter {
    fn blank(unit: UnitId, kind: FighterKind, count: u32) -> Self {
        Self {
            unit,
            kind,
            traits: Traits::empty(),
            original_count: count,
            current_count: count,
            hits_this_phase: 0,
            hits_this_battle: 0,
            fled: 0,
            noble: None,
            attack: 0,
            defense: 0,
            missile: 0,
            rank: 0,
            protects: None,
            protector_count: 0,
            is_ally: false,
            inside: false,
            prisoner: false,
            seize_slot: false,
            summoned: false,
            bonuses: FighterBonuses::default(),
        }
    }

    pub fn fortification(structure: UnitId, remaining: u32) -> Self {
        let mut fighter = Self::blank(structure, FighterKind::Fortification, remaining);
        fighter.defense = remaining;
        fighter.inside = true;
        fighter
    }

    pub fn noble(unit: UnitId, ratings: Ratings, traits: Traits, state: NobleState) -> Self {
        let mut fighter = Self::blank(unit, FighterKind::Noble, 1);
        fighter.set_ratings(ratings);
        fighter.traits = traits;
        fighter.noble = Some(state);
        fighter
    }

    pub fn garrison(unit: UnitId) -> Self {
        Self::blank(unit, FighterKind::Garrison, 1)
    }

    pub fn troop(unit: UnitId, item: ItemId, count: u32, ratings: Ratings, traits: Traits) -> Self {
        let mut fighter = Self::blank(unit, FighterKind::Troop(item), count);
        fighter.set_ratings(ratings);
        fighter.traits = traits;
        fighter
    }

    pub fn set_ratings(&mut self, ratings: Ratings) {
        self.attack = ratings.attack;
        self.defense = ratings.defense;
        self.missile = ratings.missile;
    }

    pub fn ratings(&self) -> Ratings {
        Ratings::new(self.attack, self.defense, self.missile)
    }

    pub fn is_alive(&self) -> bool {
        self.current_count > 0
    }

    pub fn is_fortification(&self) -> bool {
        self.kind == FighterKind::Fortification
    }

    pub fn is_noble(&self) -> bool {
        self.kind == FighterKind::Noble
    }

    pub fn is_siege_engine(&self) -> bool {
        self.traits.contains(Traits::SIEGE_ENGINE)
    }

    pub fn item(&self) -> Option<ItemId> {
        match self.kind {
            FighterKind::Troop(item) => Some(item),
            _ => None,
        }
    }

    /// Bodies available to be struck or to strike. Walls weigh one.
    pub fn bodies(&self) -> u32 {
        match self.kind {
            FighterKind::Fortification => u32::from(self.is_alive()),
            _ => self.current_count,
        }
    }

    /// Front line and unshielded
    pub fn is_targetable(&self) -> bool {
        self.is_alive() && self.rank == 0 && self.protector_count == 0
    }

    /// Contribution to the side's combat-sum
    pub fn combat_value(&self, count: u32) -> u64 {
        if self.is_fortification() || self.is_siege_engine() {
            return 0;
        }
        (u64::from(self.attack.max(self.missile)) + u64::from(self.defense)) * u64::from(count)
    }

    /// Troops lost for good: fallen, not fled
    pub fn killed(&self) -> u32 {
        self.original_count
            .saturating_sub(self.current_count)
            .saturating_sub(self.fled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fortification_weighs_one_body() {
        let mut walls = Fighter::fortification(UnitId(50), 80);
        assert_eq!(walls.bodies(), 1);
        assert_eq!(walls.combat_value(walls.current_count), 0);
        walls.current_count = 0;
        assert_eq!(walls.bodies(), 0);
    }

    #[test]
    fn test_combat_value_uses_better_of_attack_and_missile() {
        let archers = Fighter::troop(
            UnitId(1),
            ItemId(10),
            10,
            Ratings::new(5, 10, 30),
            Traits::ARCHER,
        );
        assert_eq!(archers.combat_value(archers.current_count), 400);

        let catapult = Fighter::troop(
            UnitId(1),
            ItemId(11),
            2,
            Ratings::new(0, 50, 0),
            Traits::SIEGE_ENGINE,
        );
        assert_eq!(catapult.combat_value(2), 0);
    }

    #[test]
    fn test_killed_excludes_fled() {
        let mut peasants = Fighter::troop(
            UnitId(1),
            ItemId(12),
            20,
            Ratings::new(1, 1, 0),
            Traits::PANIC_PRONE,
        );
        peasants.current_count = 12;
        peasants.fled = 3;
        assert_eq!(peasants.killed(), 5);
    }

    #[test]
    fn test_noble_death_and_fatal_survival() {
        let mut state = NobleState::new(40, 10);
        state.health = 0;
        assert!(state.is_dead());
        state.survived_fatal = true;
        assert!(!state.is_dead());
        state.aura = 4;
        assert_eq!(state.aura_delta(), -6);
    }
}
