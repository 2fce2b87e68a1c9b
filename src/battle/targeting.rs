//! Targeting and attack counting
//!
//! Who may strike in a phase, who may be struck, how many blows land, and
//! which bodies deliver them. Draw order here is part of the replay
//! contract: one shuffle of the attacking bodies when not all of them get
//! to strike, then for each blow an optional uncanny roll, a target pick,
//! the contest, and whatever `record_hit` draws.

use serde::{Deserialize, Serialize};

use crate::battle::fighter::Fighter;
use crate::battle::hit::{self, DefenseSituation};
use crate::battle::line::{BattleLine, LineBonuses};
use crate::battle::log::BattleEventType;
use crate::battle::rounds::BattleContext;
use crate::core::error::{CombatError, Result};
use crate::core::rng::GameRng;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    /// Spells: bypasses rank and protection
    Special,
    Missile,
    /// Reserve shooters picking off the enemy's reserve shooters
    Uncanny,
    Melee,
}

/// May this fighter deliver blows in the phase
pub fn is_attacker(fighter: &Fighter, phase: Phase) -> bool {
    if !fighter.is_alive() {
        return false;
    }
    match phase {
        Phase::Missile | Phase::Uncanny => fighter.rank > 0 && fighter.missile > 0,
        Phase::Melee => fighter.rank == 0 && fighter.attack > 0 && !fighter.is_fortification(),
        Phase::Special => fighter.is_noble(),
    }
}

/// May this fighter be struck in the phase
pub fn is_target(fighter: &Fighter, phase: Phase) -> bool {
    match phase {
        Phase::Special => fighter.is_alive(),
        Phase::Uncanny => fighter.is_alive() && fighter.rank > 0 && fighter.missile > 0,
        Phase::Missile | Phase::Melee => fighter.is_targetable(),
    }
}

pub fn count_targets(line: &BattleLine, phase: Phase) -> u32 {
    line.bodies_where(|f| is_target(f, phase))
}

pub fn attacking_bodies(line: &BattleLine, phase: Phase) -> u32 {
    line.bodies_where(|f| is_attacker(f, phase))
}

/// Count targets, forcing reserves forward while the front is empty.
///
/// Fails when fighters remain alive but none can ever be struck.
pub fn ensure_targets(ctx: &mut BattleContext<'_>, line: &mut BattleLine, phase: Phase) -> Result<u32> {
    let mut targets = count_targets(line, phase);
    while targets == 0 {
        let Some(rank) = line.advance_reserve() else {
            break;
        };
        ctx.log.push(
            ctx.round,
            BattleEventType::ReserveAdvanced {
                side: line.side,
                rank,
            },
            format!("The {} reserve in rank {} is forced to the front.", line.side, rank),
        );
        targets = count_targets(line, phase);
    }

    if targets == 0 && line.any_alive() {
        let msg = format!("{} line has living fighters but no {:?} targets", line.side, phase);
        tracing::error!("{}", msg);
        return Err(CombatError::InvariantViolation(msg));
    }
    Ok(targets)
}

/// How many blows a side may deliver against `enemy` this phase
pub fn attack_cap(own: &BattleLine, enemy: &BattleLine, phase: Phase) -> u32 {
    match phase {
        Phase::Missile | Phase::Uncanny => own.front_bodies(),
        Phase::Melee => {
            let mut front = enemy.front_bodies();
            let all = enemy.alive_bodies();
            if all > front.saturating_mul(2) {
                front = all / 2;
            }
            front.saturating_mul(4)
        }
        Phase::Special => u32::MAX,
    }
}

/// Body numbers (1-based) that strike, in striking order.
///
/// When fewer blows than bodies are allowed, the bodies are shuffled and
/// consumed front to back; otherwise every body strikes in order and
/// nothing is drawn.
pub fn attack_order(rng: &mut GameRng, bodies: u32, allowed: u32) -> Vec<u32> {
    let mut order: Vec<u32> = (1..=bodies).collect();
    if allowed < bodies {
        rng.shuffle(&mut order);
        order.truncate(allowed as usize);
    }
    order
}

/// Defense circumstances of `enemy` against blows from a side fielding
/// `striker_towers` siege towers
pub fn situation_against(ctx: &BattleContext<'_>, enemy: &BattleLine, striker_towers: u32) -> DefenseSituation {
    let modifiers = &ctx.config.modifiers;
    DefenseSituation {
        side: Some(enemy.side),
        cover_pct: enemy.cover_pct(striker_towers, modifiers.siege_tower_cover_pct),
        moat: enemy.cover.is_some_and(|c| c.moat),
        foreseen: ctx.foreseen[enemy.side.index()],
        terrain_pct: ctx.conditions.terrain_defense_pct(&ctx.config.terrain),
        defense_tactics_pct: enemy.bonuses.defense_tactics_pct,
    }
}

/// One blow from `striker` at `enemy.fighters[target]`. Returns whether a
/// hit was recorded.
#[allow(clippy::too_many_arguments)]
pub fn deliver_blow(
    ctx: &mut BattleContext<'_>,
    striker: &Fighter,
    striker_bonuses: &LineBonuses,
    rating: u32,
    enemy: &mut BattleLine,
    target: usize,
    phase: Phase,
    situation: &DefenseSituation,
) -> bool {
    let walls_blessed = enemy.cover.is_some_and(|c| c.blessed);
    let Some(victim) = enemy.fighters.get_mut(target) else {
        return false;
    };

    let config = ctx.config;
    let modifiers = &config.modifiers;
    let attack = hit::attack_value(rating, striker, victim, phase, striker_bonuses, modifiers);
    let defense = hit::defense_value(victim, striker, phase, situation, modifiers);
    if !hit::contest(ctx.rng, attack, defense) {
        return false;
    }
    hit::record_hit(victim, striker, walls_blessed, config, ctx.rng)
}

/// Every eligible body of `own` strikes at `enemy` in a missile or melee
/// phase. Hits accumulate on the targets; nothing dies until the phase is
/// resolved.
pub fn strike_phase(
    ctx: &mut BattleContext<'_>,
    own: &BattleLine,
    enemy: &mut BattleLine,
    phase: Phase,
) -> Result<u32> {
    let bodies = attacking_bodies(own, phase);
    if bodies == 0 && phase != Phase::Melee {
        return Ok(0);
    }

    let targets = ensure_targets(ctx, enemy, phase)?;
    if targets == 0 || bodies == 0 {
        return Ok(0);
    }

    let allowed = attack_cap(own, enemy, phase).min(bodies);
    let order = attack_order(ctx.rng, bodies, allowed);
    let situation = situation_against(ctx, enemy, own.siege_towers());
    let uncanny_chance = ctx.config.modifiers.uncanny_chance_pct;

    let mut hits = 0;
    for body in order {
        let Some(si) = own.nth_body(body, |f| is_attacker(f, phase)) else {
            return Err(CombatError::InvariantViolation(format!(
                "{} line has no attacking body {} of {}",
                own.side, body, bodies
            )));
        };
        let striker = &own.fighters[si];

        // An uncanny shot may switch this one body to the uncanny phase
        let mut body_phase = phase;
        if phase == Phase::Missile && striker.bonuses.uncanny && ctx.rng.percent(uncanny_chance) {
            body_phase = Phase::Uncanny;
        }
        let mut available = count_targets(enemy, body_phase);
        if available == 0 && body_phase == Phase::Uncanny {
            body_phase = phase;
            available = count_targets(enemy, body_phase);
        }
        if available == 0 {
            break;
        }

        let pick = ctx.rng.rnd(1, available);
        let Some(ti) = enemy.nth_body(pick, |f| is_target(f, body_phase)) else {
            return Err(CombatError::InvariantViolation(format!(
                "{} line has no target body {} of {}",
                enemy.side, pick, available
            )));
        };
        if body_phase != Phase::Uncanny && enemy.fighters[ti].protector_count > 0 {
            let msg = format!("protected fighter {} of the {} was targeted", ti, enemy.side);
            tracing::error!("{}", msg);
            return Err(CombatError::InvariantViolation(msg));
        }

        let rating = hit::phase_rating(striker, body_phase);
        if deliver_blow(ctx, striker, &own.bonuses, rating, enemy, ti, body_phase, &situation) {
            hits += 1;
        }
    }

    Ok(hits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::conditions::Conditions;
    use crate::battle::fighter::NobleState;
    use crate::core::config::CombatConfig;
    use crate::core::types::{ItemId, Ratings, Side, Traits, UnitId};

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

    fn troop(unit: u32, count: u32, ratings: Ratings, rank: u8, protects: usize) -> Fighter {
        let mut f = Fighter::troop(UnitId(unit), ItemId(10), count, ratings, Traits::empty());
        f.rank = rank;
        f.protects = Some(protects);
        f
    }

    fn infantry(unit: u32, count: u32) -> BattleLine {
        let mut line = BattleLine::new(Side::Attacker);
        let lead = line.push(noble(unit, 0));
        line.push(troop(unit, count, Ratings::new(10, 10, 0), 0, lead));
        line
    }

    #[test]
    fn test_reserve_advanced_exactly_once() {
        let config = CombatConfig::default();
        let mut rng = GameRng::new(3);
        let mut ctx = BattleContext::new(&config, &mut rng, Conditions::default());

        let mut defender = BattleLine::new(Side::Defender);
        let lead = defender.push(noble(2, 1));
        defender.push(troop(2, 6, Ratings::new(5, 5, 0), 1, lead));
        defender.push(troop(2, 4, Ratings::new(5, 5, 30), 2, lead));
        assert_eq!(count_targets(&defender, Phase::Melee), 0);

        let attacker = infantry(1, 10);
        strike_phase(&mut ctx, &attacker, &mut defender, Phase::Melee).expect("melee phase");

        let advances = ctx
            .log
            .of_type(|t| matches!(t, BattleEventType::ReserveAdvanced { .. }))
            .count();
        assert_eq!(advances, 1);
        assert_eq!(defender.fighters[1].rank, 0);
        assert_eq!(defender.fighters[2].rank, 2);
        assert_eq!(count_targets(&defender, Phase::Melee), 6);
    }

    #[test]
    fn test_melee_cap_uses_half_of_all_ranks() {
        let mut enemy = BattleLine::new(Side::Defender);
        let lead = enemy.push(noble(2, 0));
        enemy.push(troop(2, 2, Ratings::new(5, 5, 0), 0, lead));
        enemy.push(troop(2, 18, Ratings::new(5, 5, 0), 1, lead));

        let own = infantry(1, 100);
        // front of 2 would allow 8 blows, but 21 living bodies make it 10
        assert_eq!(attack_cap(&own, &enemy, Phase::Melee), 40);
    }

    #[test]
    fn test_missile_cap_is_own_front_even_behind_walls() {
        let mut own = BattleLine::new(Side::Defender);
        let lead = own.push(noble(2, 0));
        own.push(troop(2, 3, Ratings::new(5, 5, 0), 0, lead));
        own.push(troop(2, 20, Ratings::new(1, 1, 20), 1, lead));
        let enemy = infantry(1, 5);

        assert_eq!(attacking_bodies(&own, Phase::Missile), 20);
        assert_eq!(attack_cap(&own, &enemy, Phase::Missile), 3);

        let mut walled = BattleLine::new(Side::Defender);
        walled.push(Fighter::fortification(UnitId(50), 100));
        walled.append(own);
        // the walls count as one front body; the noble is shielded
        assert_eq!(walled.front_bodies(), 4);
        assert_eq!(attack_cap(&walled, &enemy, Phase::Missile), 4);
        assert_eq!(attack_cap(&walled, &enemy, Phase::Uncanny), 4);
    }

    #[test]
    fn test_attack_order_draws_only_when_sampling() {
        let mut rng = GameRng::new(8);
        assert_eq!(attack_order(&mut rng, 5, 5), vec![1, 2, 3, 4, 5]);
        assert_eq!(rng.draws(), 0);

        let picked = attack_order(&mut rng, 10, 3);
        assert_eq!(picked.len(), 3);
        assert_eq!(rng.draws(), 9);
        assert!(picked.iter().all(|b| (1..=10).contains(b)));
    }

    #[test]
    fn test_strike_phase_never_hits_protected() {
        let config = CombatConfig::default();
        let mut rng = GameRng::new(21);
        let mut ctx = BattleContext::new(&config, &mut rng, Conditions::default());

        let attacker = infantry(1, 40);
        let mut defender = infantry(2, 5);
        defender.side = Side::Defender;

        strike_phase(&mut ctx, &attacker, &mut defender, Phase::Melee).expect("melee phase");
        assert_eq!(defender.fighters[0].hits_this_phase, 0);
        assert!(defender.fighters[1].hits_this_phase <= 5);
    }

    fn sharpshooters() -> BattleLine {
        let mut own = infantry(1, 20);
        let mut archers = troop(1, 10, Ratings::new(1, 1, 90), 1, own.lead);
        archers.bonuses.uncanny = true;
        own.push(archers);
        own
    }

    #[test]
    fn test_uncanny_shots_pick_off_reserve_archers() {
        let mut config = CombatConfig::default();
        config.modifiers.uncanny_chance_pct = 100;
        let mut rng = GameRng::new(17);
        let mut ctx = BattleContext::new(&config, &mut rng, Conditions::default());

        let own = sharpshooters();
        let mut enemy = BattleLine::new(Side::Defender);
        let lead = enemy.push(noble(2, 0));
        enemy.push(troop(2, 10, Ratings::new(5, 5, 0), 0, lead));
        enemy.push(troop(2, 7, Ratings::new(1, 1, 25), 1, lead));

        let hits = strike_phase(&mut ctx, &own, &mut enemy, Phase::Missile).expect("missile phase");
        assert!(hits > 0);
        assert_eq!(enemy.fighters[0].hits_this_phase, 0);
        assert_eq!(enemy.fighters[1].hits_this_phase, 0);
        assert_eq!(enemy.fighters[2].hits_this_phase, hits);
    }

    #[test]
    fn test_uncanny_shots_fall_back_to_the_front() {
        let mut config = CombatConfig::default();
        config.modifiers.uncanny_chance_pct = 100;
        let mut rng = GameRng::new(17);
        let mut ctx = BattleContext::new(&config, &mut rng, Conditions::default());

        let own = sharpshooters();
        let mut enemy = BattleLine::new(Side::Defender);
        let lead = enemy.push(noble(2, 0));
        enemy.push(troop(2, 10, Ratings::new(1, 1, 0), 0, lead));

        let hits = strike_phase(&mut ctx, &own, &mut enemy, Phase::Missile).expect("missile phase");
        assert!(hits > 0);
        assert_eq!(enemy.fighters[0].hits_this_phase, 0);
        assert_eq!(enemy.fighters[1].hits_this_phase, hits);
    }

    #[test]
    fn test_uncanny_targets_ignore_protection() {
        let mut enemy = BattleLine::new(Side::Defender);
        let lead = enemy.push(noble(2, 0));
        enemy.push(troop(2, 10, Ratings::new(5, 5, 0), 0, lead));
        enemy.push(troop(2, 7, Ratings::new(1, 1, 25), 1, lead));

        assert_eq!(count_targets(&enemy, Phase::Uncanny), 7);
        assert_eq!(count_targets(&enemy, Phase::Missile), 10);
        assert_eq!(count_targets(&enemy, Phase::Special), 18);
    }
}
