//! Battle lines: the ordered fighters of one side
//!
//! Protection is kept as plain indices into the line. A fighter's
//! `protector_count` is the number of living fighters whose `protects`
//! points at it, and is maintained incrementally as fighters join and fall.

use serde::{Deserialize, Serialize};

use crate::battle::fighter::Fighter;
use crate::core::error::{CombatError, Result};
use crate::core::types::{Side, Traits, UnitId};

/// Side-wide bonuses granted by the lead noble
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineBonuses {
    /// Already capped
    pub tactics_pct: u32,
    pub defense_tactics_pct: u32,
    pub scry_pct: u32,
}

/// Static description of the walls the defenders stand behind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FortCover {
    pub structure: UnitId,
    pub hit_points: u32,
    pub coverage: u32,
    pub moat: bool,
    /// Half of all hits on the walls are turned aside
    pub blessed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleLine {
    pub side: Side,
    pub fighters: Vec<Fighter>,
    /// Index of the lead noble or garrison standard
    pub lead: usize,
    pub bonuses: LineBonuses,
    pub cover: Option<FortCover>,
    /// Percent of the starting combat-sum at which the side breaks
    pub break_point: u32,
    pub threshold: u64,
}

impl BattleLine {
    pub fn new(side: Side) -> Self {
        Self {
            side,
            fighters: Vec::new(),
            lead: 0,
            bonuses: LineBonuses::default(),
            cover: None,
            break_point: 0,
            threshold: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.fighters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fighters.is_empty()
    }

    /// Add a fighter, registering it with the fighter it shields
    pub fn push(&mut self, fighter: Fighter) -> usize {
        if let Some(p) = fighter.protects {
            if fighter.is_alive() {
                if let Some(protected) = self.fighters.get_mut(p) {
                    protected.protector_count += 1;
                }
            }
        }
        self.fighters.push(fighter);
        self.fighters.len() - 1
    }

    /// Append another line's fighters (allies arriving), rebasing their
    /// protection indices. Returns how many joined.
    pub fn append(&mut self, other: BattleLine) -> usize {
        let offset = self.fighters.len();
        let joined = other.fighters.len();
        for mut fighter in other.fighters {
            fighter.protects = fighter.protects.map(|p| p + offset);
            self.fighters.push(fighter);
        }
        joined
    }

    pub fn lead_fighter(&self) -> Option<&Fighter> {
        self.fighters.get(self.lead)
    }

    pub fn lead_unit(&self) -> Option<UnitId> {
        self.lead_fighter().map(|f| f.unit)
    }

    pub fn lead_alive(&self) -> bool {
        self.lead_fighter().is_some_and(Fighter::is_alive)
    }

    pub fn fortification(&self) -> Option<&Fighter> {
        self.fighters.first().filter(|f| f.is_fortification())
    }

    /// Defense percent the walls give to those inside
    pub fn cover_pct(&self, enemy_towers: u32, pct_per_tower: u32) -> u32 {
        let (Some(cover), Some(walls)) = (self.cover, self.fortification()) else {
            return 0;
        };
        if cover.hit_points == 0 {
            return 0;
        }
        let scaled =
            u64::from(cover.coverage) * u64::from(walls.current_count) / u64::from(cover.hit_points);
        let scaled = u32::try_from(scaled).unwrap_or(u32::MAX);
        scaled.saturating_sub(enemy_towers.saturating_mul(pct_per_tower))
    }

    pub fn combat_sum(&self) -> u64 {
        self.fighters
            .iter()
            .map(|f| f.combat_value(f.current_count))
            .sum()
    }

    /// Combat-sum the side started with, counting everyone now in the line
    pub fn original_combat_sum(&self) -> u64 {
        self.fighters
            .iter()
            .map(|f| f.combat_value(f.original_count))
            .sum()
    }

    pub fn set_threshold(&mut self, sum: u64) {
        self.threshold = sum * u64::from(self.break_point) / 100;
    }

    pub fn is_broken(&self) -> bool {
        self.combat_sum() <= self.threshold
    }

    pub fn any_alive(&self) -> bool {
        self.fighters.iter().any(Fighter::is_alive)
    }

    pub fn bodies_where(&self, pred: impl Fn(&Fighter) -> bool) -> u32 {
        self.fighters
            .iter()
            .filter(|f| pred(f))
            .map(Fighter::bodies)
            .sum()
    }

    /// Bodies that can be struck in melee or by missiles
    pub fn front_bodies(&self) -> u32 {
        self.bodies_where(Fighter::is_targetable)
    }

    /// Living bodies in every rank
    pub fn alive_bodies(&self) -> u32 {
        self.bodies_where(Fighter::is_alive)
    }

    pub fn siege_towers(&self) -> u32 {
        self.fighters
            .iter()
            .filter(|f| f.is_alive() && f.traits.contains(Traits::SIEGE_TOWER))
            .map(|f| f.current_count)
            .sum()
    }

    /// Index of the fighter holding body `n` (1-based) among fighters
    /// matching `pred`, counted in line order
    pub fn nth_body(&self, n: u32, pred: impl Fn(&Fighter) -> bool) -> Option<usize> {
        let mut seen = 0;
        for (i, fighter) in self.fighters.iter().enumerate() {
            if !pred(fighter) {
                continue;
            }
            seen += fighter.bodies();
            if seen >= n {
                return Some(i);
            }
        }
        None
    }

    /// Bring the nearest reserve rank up to the front.
    ///
    /// Every fighter sharing the least nonzero rank among the living moves
    /// to rank 0 at once. Returns the rank that moved.
    pub fn advance_reserve(&mut self) -> Option<u8> {
        let rank = self
            .fighters
            .iter()
            .filter(|f| f.is_alive() && f.rank > 0)
            .map(|f| f.rank)
            .min()?;
        for fighter in self.fighters.iter_mut().filter(|f| f.rank == rank) {
            fighter.rank = 0;
        }
        Some(rank)
    }

    /// A fighter has just fallen to zero: it no longer shields anyone
    pub fn fell(&mut self, index: usize) {
        let protects = self.fighters.get(index).and_then(|f| f.protects);
        if let Some(protected) = protects.and_then(|p| self.fighters.get_mut(p)) {
            protected.protector_count = protected.protector_count.saturating_sub(1);
        }
    }

    /// Structural invariants that must hold after every phase
    pub fn check_invariants(&self) -> Result<()> {
        let mut inside_run = true;
        for (i, fighter) in self.fighters.iter().enumerate() {
            if fighter.is_fortification() && i != 0 {
                return Err(CombatError::InvariantViolation(format!(
                    "{} line has a fortification at index {}",
                    self.side, i
                )));
            }
            if fighter.current_count > fighter.original_count {
                return Err(CombatError::InvariantViolation(format!(
                    "fighter {} of {} holds {} of {}",
                    i, fighter.unit, fighter.current_count, fighter.original_count
                )));
            }
            if fighter.inside && !inside_run {
                return Err(CombatError::InvariantViolation(format!(
                    "{} line: fighter {} inside the walls after one outside",
                    self.side, i
                )));
            }
            inside_run &= fighter.inside;
            if let Some(p) = fighter.protects {
                if p >= self.fighters.len() || p == i {
                    return Err(CombatError::InvariantViolation(format!(
                        "{} line: fighter {} protects invalid slot {}",
                        self.side, i, p
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::fighter::NobleState;
    use crate::core::types::{ItemId, Ratings};

    fn noble(unit: u32, rank: u8) -> Fighter {
        let mut f = Fighter::noble(
            UnitId(unit),
            Ratings::new(50, 50, 0),
            Traits::empty(),
            NobleState::new(100, 0),
        );
        f.rank = rank;
        f
    }

    fn troop(unit: u32, count: u32, rank: u8, protects: usize) -> Fighter {
        let mut f = Fighter::troop(
            UnitId(unit),
            ItemId(10),
            count,
            Ratings::new(5, 5, 0),
            Traits::empty(),
        );
        f.rank = rank;
        f.protects = Some(protects);
        f
    }

    #[test]
    fn test_protection_counts() {
        let mut line = BattleLine::new(Side::Attacker);
        let lead = line.push(noble(1, 0));
        line.push(troop(1, 10, 0, lead));
        line.push(troop(1, 5, 1, lead));

        assert_eq!(line.fighters[lead].protector_count, 2);
        assert!(!line.fighters[lead].is_targetable());
        assert_eq!(line.front_bodies(), 10);

        line.fighters[1].current_count = 0;
        line.fell(1);
        assert_eq!(line.fighters[lead].protector_count, 1);
    }

    #[test]
    fn test_advance_reserve_moves_whole_rank_once() {
        let mut line = BattleLine::new(Side::Defender);
        let lead = line.push(noble(2, 1));
        line.push(troop(2, 4, 1, lead));
        line.push(troop(2, 6, 2, lead));

        assert_eq!(line.front_bodies(), 0);
        assert_eq!(line.advance_reserve(), Some(1));
        assert_eq!(line.fighters[0].rank, 0);
        assert_eq!(line.fighters[1].rank, 0);
        assert_eq!(line.fighters[2].rank, 2);
        assert_eq!(line.front_bodies(), 4);
    }

    #[test]
    fn test_append_rebases_protection() {
        let mut line = BattleLine::new(Side::Defender);
        line.push(noble(2, 0));

        let mut ally = BattleLine::new(Side::Defender);
        let ally_lead = ally.push(noble(7, 0));
        ally.push(troop(7, 3, 0, ally_lead));

        assert_eq!(line.append(ally), 2);
        assert_eq!(line.fighters[2].protects, Some(1));
        assert_eq!(line.fighters[1].protector_count, 1);
        assert!(line.check_invariants().is_ok());
    }

    #[test]
    fn test_cover_scales_with_remaining_walls() {
        let mut line = BattleLine::new(Side::Defender);
        line.push(Fighter::fortification(UnitId(50), 50));
        line.cover = Some(FortCover {
            structure: UnitId(50),
            hit_points: 100,
            coverage: 80,
            moat: false,
            blessed: false,
        });
        assert_eq!(line.cover_pct(0, 25), 40);
        assert_eq!(line.cover_pct(1, 25), 15);
        assert_eq!(line.cover_pct(3, 25), 0);

        line.fighters[0].current_count = 0;
        assert_eq!(line.cover_pct(0, 25), 0);
    }

    #[test]
    fn test_misplaced_fortification_is_a_fault() {
        let mut line = BattleLine::new(Side::Defender);
        line.push(noble(2, 0));
        line.push(Fighter::fortification(UnitId(50), 10));
        assert!(matches!(
            line.check_invariants(),
            Err(CombatError::InvariantViolation(_))
        ));
    }
}
