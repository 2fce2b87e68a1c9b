//! Hit resolution
//!
//! Ratings are scaled by 100 so percentage bonuses stay in integer
//! arithmetic. Every bonus is additive on the scaled base.

use crate::battle::fighter::Fighter;
use crate::battle::line::LineBonuses;
use crate::battle::targeting::Phase;
use crate::core::config::{CombatConfig, ModifierConfig};
use crate::core::rng::GameRng;
use crate::core::types::{Side, Traits};

/// Fixed-point scale of attack and defense values
pub const SCALE: u32 = 100;

fn pct_of(base: u32, pct: u32) -> u32 {
    u32::try_from(u64::from(base) * u64::from(pct) / 100).unwrap_or(u32::MAX)
}

/// Rating a fighter strikes with in a phase
pub fn phase_rating(striker: &Fighter, phase: Phase) -> u32 {
    match phase {
        Phase::Missile | Phase::Uncanny => striker.missile,
        Phase::Melee | Phase::Special => striker.attack,
    }
}

/// Scaled attack value of one blow
pub fn attack_value(
    rating: u32,
    striker: &Fighter,
    target: &Fighter,
    phase: Phase,
    line: &LineBonuses,
    config: &ModifierConfig,
) -> u32 {
    let base = rating.saturating_mul(SCALE);
    let mut total = base;

    if striker.traits.contains(Traits::PRIEST) && target.traits.contains(Traits::UNDEAD) {
        total = total.saturating_add(pct_of(base, config.priest_vs_undead_pct));
    }

    if phase != Phase::Special {
        total = total.saturating_add(striker.bonuses.weapon.saturating_mul(SCALE));
    }

    let artifact_pct = match phase {
        Phase::Melee => striker.bonuses.melee_pct,
        Phase::Missile | Phase::Uncanny => striker.bonuses.missile_pct,
        Phase::Special => striker.bonuses.special_pct,
    };
    total = total.saturating_add(pct_of(base, artifact_pct));
    total = total.saturating_add(pct_of(base, line.tactics_pct.min(config.tactics_cap_pct)));
    total.saturating_add(pct_of(base, line.scry_pct))
}

/// Everything about the struck side that a defense value depends on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DefenseSituation {
    pub side: Option<Side>,
    /// Current wall coverage for those inside
    pub cover_pct: u32,
    pub moat: bool,
    pub foreseen: bool,
    /// Bonus of the ground; only the side holding it benefits
    pub terrain_pct: u32,
    pub defense_tactics_pct: u32,
}

/// Scaled defense value against one blow
pub fn defense_value(
    target: &Fighter,
    striker: &Fighter,
    phase: Phase,
    situation: &DefenseSituation,
    config: &ModifierConfig,
) -> u32 {
    let base = target.defense.saturating_mul(SCALE);
    let mut total = base;

    if target.inside && !target.is_fortification() {
        total = total.saturating_add(pct_of(base, situation.cover_pct));

        let missile_fire = matches!(phase, Phase::Missile | Phase::Uncanny);
        if situation.moat && missile_fire && !striker.is_siege_engine() {
            total = total.saturating_add(pct_of(base, config.moat_pct));
        }
    }

    if target.bonuses.blessed && !target.traits.contains(Traits::MAGE) {
        total = total.saturating_add(pct_of(base, config.bless_followers_pct));
    }

    total = total.saturating_add(pct_of(
        base,
        target.bonuses.defense_pct + situation.defense_tactics_pct,
    ));

    if situation.foreseen {
        total = total.saturating_add(pct_of(base, config.foresee_defense_pct));
    }

    if situation.side == Some(Side::Defender) {
        total = total.saturating_add(pct_of(base, situation.terrain_pct));
    }

    if target.traits.contains(Traits::PIKEMAN) && striker.traits.contains(Traits::MOUNTED) {
        total = total.saturating_add(base);
    }

    total
}

/// Outcome of a contest for a given draw
pub fn is_hit(attack: u32, defense: u32, roll: u32) -> bool {
    attack > 0 && roll >= 1 && roll <= attack && roll <= attack.saturating_add(defense)
}

/// Draw `rnd(1, attack + defense)` and compare. A zero attack never hits
/// and draws nothing.
pub fn contest(rng: &mut GameRng, attack: u32, defense: u32) -> bool {
    if attack == 0 {
        return false;
    }
    let roll = rng.rnd(1, attack.saturating_add(defense));
    is_hit(attack, defense, roll)
}

/// Mark a successful blow on its target. Returns false when the blow was
/// turned aside or wasted.
pub fn record_hit(
    target: &mut Fighter,
    striker: &Fighter,
    walls_blessed: bool,
    config: &CombatConfig,
    rng: &mut GameRng,
) -> bool {
    if target.is_fortification() {
        if walls_blessed && rng.coin() {
            return false;
        }
        let damage = if striker.is_siege_engine() {
            rng.rnd(config.siege.engine_damage_min, config.siege.engine_damage_max)
        } else {
            1
        };
        target.hits_this_phase += damage;
        target.hits_this_battle += damage;
        return true;
    }

    if target.hits_this_phase > 0 && rng.rnd(1, target.current_count) <= target.hits_this_phase {
        return false;
    }

    if target.traits.contains(Traits::TOUGH) && rng.coin() {
        return false;
    }

    target.hits_this_phase += 1;
    target.hits_this_battle += 1;
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{ItemId, Ratings, UnitId};

    fn troop(ratings: Ratings, traits: Traits) -> Fighter {
        Fighter::troop(UnitId(1), ItemId(10), 10, ratings, traits)
    }

    #[test]
    fn test_is_hit_is_pure() {
        for roll in 1..=150 {
            assert_eq!(is_hit(100, 50, roll), is_hit(100, 50, roll));
            assert_eq!(is_hit(100, 50, roll), roll <= 100);
        }
        assert!(!is_hit(0, 50, 1));
    }

    #[test]
    fn test_contest_replays_with_same_seed() {
        let mut a = GameRng::new(9);
        let mut b = GameRng::new(9);
        for _ in 0..200 {
            assert_eq!(contest(&mut a, 500, 700), contest(&mut b, 500, 700));
        }
        assert_eq!(a.draws(), 200);
    }

    #[test]
    fn test_zero_attack_draws_nothing() {
        let mut rng = GameRng::new(1);
        assert!(!contest(&mut rng, 0, 100));
        assert_eq!(rng.draws(), 0);
    }

    #[test]
    fn test_attack_bonuses_add_up() {
        let config = ModifierConfig::default();
        let mut priest = troop(Ratings::new(10, 5, 0), Traits::PRIEST);
        priest.bonuses.melee_pct = 20;
        let zombie = troop(Ratings::new(5, 5, 0), Traits::UNDEAD);
        let line = LineBonuses {
            tactics_pct: 300,
            defense_tactics_pct: 0,
            scry_pct: 10,
        };
        // 1000 base + 1000 priest + 200 artifact + 1000 capped tactics + 100 scry
        let value = attack_value(10, &priest, &zombie, Phase::Melee, &line, &config);
        assert_eq!(value, 3300);
    }

    #[test]
    fn test_defense_bonuses() {
        let config = ModifierConfig::default();
        let archer = troop(Ratings::new(2, 2, 20), Traits::ARCHER);
        let mut pikes = troop(Ratings::new(5, 10, 0), Traits::PIKEMAN);
        pikes.inside = true;
        pikes.bonuses.blessed = true;

        let situation = DefenseSituation {
            side: Some(Side::Defender),
            cover_pct: 100,
            moat: true,
            foreseen: false,
            terrain_pct: 50,
            defense_tactics_pct: 0,
        };
        // 1000 + 1000 cover + 500 moat + 250 bless + 500 terrain
        assert_eq!(
            defense_value(&pikes, &archer, Phase::Missile, &situation, &config),
            3250
        );

        let knight = troop(Ratings::new(30, 10, 0), Traits::MOUNTED);
        // no moat in melee, pikes double against horse
        assert_eq!(
            defense_value(&pikes, &knight, Phase::Melee, &situation, &config),
            3750
        );
    }

    #[test]
    fn test_terrain_favors_defenders_only() {
        let config = ModifierConfig::default();
        let striker = troop(Ratings::new(5, 5, 0), Traits::empty());
        let target = troop(Ratings::new(5, 10, 0), Traits::empty());
        let mut situation = DefenseSituation {
            side: Some(Side::Attacker),
            terrain_pct: 100,
            ..Default::default()
        };
        assert_eq!(
            defense_value(&target, &striker, Phase::Melee, &situation, &config),
            1000
        );
        situation.side = Some(Side::Defender);
        assert_eq!(
            defense_value(&target, &striker, Phase::Melee, &situation, &config),
            2000
        );
    }

    #[test]
    fn test_mage_refuses_blessing() {
        let config = ModifierConfig::default();
        let striker = troop(Ratings::new(5, 5, 0), Traits::empty());
        let mut mage = troop(Ratings::new(5, 10, 0), Traits::MAGE);
        mage.bonuses.blessed = true;
        assert_eq!(
            defense_value(&mage, &striker, Phase::Melee, &DefenseSituation::default(), &config),
            1000
        );
    }

    #[test]
    fn test_siege_engine_batters_walls() {
        let config = CombatConfig::default();
        let mut rng = GameRng::new(5);
        let catapult = troop(Ratings::new(0, 10, 0), Traits::SIEGE_ENGINE);
        let mut walls = Fighter::fortification(UnitId(50), 100);

        assert!(record_hit(&mut walls, &catapult, false, &config, &mut rng));
        assert!((5..=10).contains(&walls.hits_this_phase));

        let soldier = troop(Ratings::new(5, 5, 0), Traits::empty());
        let before = walls.hits_this_phase;
        assert!(record_hit(&mut walls, &soldier, false, &config, &mut rng));
        assert_eq!(walls.hits_this_phase, before + 1);
    }

    #[test]
    fn test_blessed_walls_turn_aside_hits() {
        let config = CombatConfig::default();
        let mut rng = GameRng::new(12);
        let soldier = troop(Ratings::new(5, 5, 0), Traits::empty());
        let mut walls = Fighter::fortification(UnitId(50), 100);

        let landed = (0..40)
            .filter(|_| record_hit(&mut walls, &soldier, true, &config, &mut rng))
            .count() as u32;
        assert!(landed > 0 && landed < 40);
        assert_eq!(walls.hits_this_phase, landed);
        // one coin per blow, nothing else
        assert_eq!(rng.draws(), 40);

        let mut plain = Fighter::fortification(UnitId(51), 100);
        let mut quiet = GameRng::new(12);
        assert!(record_hit(&mut plain, &soldier, false, &config, &mut quiet));
        assert_eq!(quiet.draws(), 0);
    }

    #[test]
    fn test_second_hit_on_single_body_is_wasted() {
        let config = CombatConfig::default();
        let mut rng = GameRng::new(5);
        let striker = troop(Ratings::new(5, 5, 0), Traits::empty());
        let mut lone = Fighter::troop(UnitId(2), ItemId(10), 1, Ratings::new(5, 5, 0), Traits::empty());

        assert!(record_hit(&mut lone, &striker, false, &config, &mut rng));
        assert!(!record_hit(&mut lone, &striker, false, &config, &mut rng));
        assert_eq!(lone.hits_this_phase, 1);
    }
}
