//! Writing a finished battle back into the world
//!
//! Nothing in the world changes while a battle is fought. Once a verdict is
//! in, losses are applied for both sides, then (for a decisive result)
//! prisoners are taken, the attacker may seize the defender's position and
//! the beaten side is driven off.

use serde::{Deserialize, Serialize};

use crate::battle::construction::Battle;
use crate::battle::fighter::{Fighter, FighterKind};
use crate::battle::line::BattleLine;
use crate::battle::log::BattleEventType;
use crate::battle::rounds::{BattleContext, BattleOutcome};
use crate::core::types::{ItemId, Side, Traits, UnitId};
use crate::world::{EffectKind, Terrain, World};

/// Troops of one kind lost by one unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Casualty {
    pub unit: UnitId,
    pub item: ItemId,
    pub killed: u32,
    /// Ran from the field; still carried by the unit
    pub fled: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "fate", rename_all = "snake_case")]
pub enum Fate {
    Unhurt,
    Wounded { health: u32 },
    /// Struck down and saved by magic; left at 1 health
    SurvivedFatal,
    Killed,
    Captured,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NobleFate {
    pub unit: UnitId,
    pub side: Side,
    pub fate: Fate,
}

/// What reconciliation changed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reconciliation {
    pub casualties: Vec<Casualty>,
    pub noble_fates: Vec<NobleFate>,
    pub prisoners: Vec<UnitId>,
    /// (unit, destination) for every stack driven off
    pub routed_to: Vec<(UnitId, UnitId)>,
    pub structure_damage: u32,
    pub seized: bool,
}

fn line_mut(battle: &mut Battle, side: Side) -> &mut BattleLine {
    match side {
        Side::Attacker => &mut battle.attacker,
        Side::Defender => &mut battle.defender,
    }
}

fn line(battle: &Battle, side: Side) -> &BattleLine {
    match side {
        Side::Attacker => &battle.attacker,
        Side::Defender => &battle.defender,
    }
}

/// Surviving troop bodies that could take (or resist taking) prisoners
pub fn standing_troops(line: &BattleLine) -> u32 {
    line.fighters
        .iter()
        .filter(|f| matches!(f.kind, FighterKind::Troop(_)) && !f.is_siege_engine())
        .map(|f| f.current_count)
        .sum()
}

/// Chance (percent) that the winner captures each surviving loser noble
pub fn prisoner_chance(ctx: &BattleContext<'_>, winner: &BattleLine, loser: &BattleLine) -> u32 {
    if ctx.conditions.at_sea {
        return 100;
    }
    let prisoners = &ctx.config.prisoners;
    let w = u64::from(standing_troops(winner)) + 1;
    let l = u64::from(standing_troops(loser)) + 1;
    let chance = u64::from(prisoners.base_pct) * w / l;
    (chance.min(u64::from(u32::MAX)) as u32).clamp(prisoners.min_pct, prisoners.max_pct)
}

fn fate_of(fighter: &Fighter) -> Option<Fate> {
    let state = fighter.noble.as_ref()?;
    Some(if fighter.prisoner {
        Fate::Captured
    } else if state.is_dead() {
        Fate::Killed
    } else if state.survived_fatal {
        Fate::SurvivedFatal
    } else if state.health < state.starting_health {
        Fate::Wounded {
            health: state.health,
        }
    } else {
        Fate::Unhurt
    })
}

/// Apply one side's losses. `killer` is credited with any noble deaths.
fn apply_losses<W: World + ?Sized>(
    world: &mut W,
    ctx: &BattleContext<'_>,
    line: &BattleLine,
    killer: Option<UnitId>,
    spoils: bool,
    report: &mut Reconciliation,
) {
    for fighter in line.fighters.iter().filter(|f| !f.summoned) {
        match fighter.kind {
            FighterKind::Fortification => {
                let damage = fighter.original_count.saturating_sub(fighter.current_count);
                if damage > 0 {
                    world.damage_structure(fighter.unit, damage);
                    report.structure_damage += damage;
                }
            }
            FighterKind::Troop(item) => {
                let killed = fighter.killed();
                if killed == 0 && fighter.fled == 0 {
                    continue;
                }
                world.consume_items(fighter.unit, item, killed);
                if spoils && fighter.traits.contains(Traits::ANIMAL) {
                    if let Some(parts) = ctx.config.spoils.animal_parts {
                        let qty = killed.saturating_mul(ctx.config.spoils.parts_per_animal);
                        world.grant_items(fighter.unit, parts, qty);
                    }
                }
                report.casualties.push(Casualty {
                    unit: fighter.unit,
                    item,
                    killed,
                    fled: fighter.fled,
                });
            }
            FighterKind::Noble => {
                let Some(state) = fighter.noble.as_ref() else {
                    continue;
                };
                if state.is_dead() {
                    world.noble_died(fighter.unit, killer);
                    continue;
                }
                if state.survived_fatal {
                    world.set_health(fighter.unit, 1);
                    world.clear_effect(fighter.unit, EffectKind::SurviveFatalWound);
                } else if state.health != state.starting_health {
                    world.set_health(fighter.unit, state.health);
                }
                let delta = state.aura_delta();
                if delta != 0 {
                    world.change_aura(fighter.unit, delta);
                }
            }
            FighterKind::Garrison => {}
        }
    }
}

fn take_prisoners<W: World + ?Sized>(
    world: &mut W,
    ctx: &mut BattleContext<'_>,
    battle: &mut Battle,
    winner: Side,
    report: &mut Reconciliation,
) {
    let Some(captor) = line(battle, winner).lead_unit() else {
        return;
    };
    let chance = prisoner_chance(ctx, line(battle, winner), line(battle, winner.opponent()));
    let loser = line_mut(battle, winner.opponent());

    for fighter in loser.fighters.iter_mut() {
        let standing = fighter
            .noble
            .as_ref()
            .is_some_and(|state| !state.is_dead());
        if !standing || fighter.summoned {
            continue;
        }
        if ctx.rng.rnd(1, 100) > chance {
            continue;
        }
        fighter.prisoner = true;
        world.take_prisoner(captor, fighter.unit);
        report.prisoners.push(fighter.unit);
        ctx.log.push(
            ctx.round,
            BattleEventType::Captured { unit: fighter.unit },
            format!("{} is taken prisoner by {}.", fighter.unit, captor),
        );
    }
}

/// Where a beaten stack falls back to
fn retreat_destination<W: World + ?Sized>(world: &W, battle: &Battle, side: Side) -> Option<UnitId> {
    if side == Side::Defender && battle.structure.is_some() {
        return Some(battle.location);
    }
    world
        .location(battle.location)?
        .neighbors
        .iter()
        .copied()
        .find(|n| {
            world
                .location(*n)
                .is_some_and(|loc| !loc.ocean && loc.terrain != Terrain::Ocean)
        })
}

fn rout<W: World + ?Sized>(
    world: &mut W,
    ctx: &mut BattleContext<'_>,
    battle: &Battle,
    loser: Side,
    report: &mut Reconciliation,
) {
    let Some(to) = retreat_destination(&*world, battle, loser) else {
        tracing::debug!(location = %battle.location, "nowhere to retreat to");
        return;
    };
    for fighter in line(battle, loser).fighters.iter() {
        let standing = fighter
            .noble
            .as_ref()
            .is_some_and(|state| !state.is_dead());
        if !standing || fighter.prisoner || fighter.summoned {
            continue;
        }
        if world.stacked_under(fighter.unit).is_some() {
            continue;
        }
        world.relocate(fighter.unit, to);
        report.routed_to.push((fighter.unit, to));
        ctx.log.push(
            ctx.round,
            BattleEventType::Routed { unit: fighter.unit },
            format!("{} flees to {}.", fighter.unit, to),
        );
    }
}

/// Every standing noble of a beaten line drops its orders and its guard
fn stand_down<W: World + ?Sized>(world: &mut W, loser: &BattleLine) {
    for fighter in loser.fighters.iter().filter(|f| !f.summoned) {
        let standing = match fighter.kind {
            FighterKind::Noble => fighter.noble.as_ref().is_some_and(|s| !s.is_dead()),
            FighterKind::Garrison => true,
            _ => false,
        };
        if standing {
            world.halt_orders(fighter.unit);
            world.clear_guard(fighter.unit);
        }
    }
}

/// Apply the battle's results to the world
pub fn reconcile<W: World + ?Sized>(
    world: &mut W,
    ctx: &mut BattleContext<'_>,
    battle: &mut Battle,
    outcome: BattleOutcome,
) -> Reconciliation {
    let mut report = Reconciliation::default();
    let attacker_lead = battle.attacker.lead_unit();
    let defender_lead = battle.defender.lead_unit();
    let winner = outcome.winner();

    if let Some(winner) = winner {
        stand_down(world, line(battle, winner.opponent()));
    }

    // Deaths are credited to the opposing lead only when someone won
    let (attacker_killer, defender_killer) = if winner.is_some() {
        (defender_lead, attacker_lead)
    } else {
        (None, None)
    };
    let attacker_spoils = winner != Some(Side::Defender);
    let defender_spoils = winner != Some(Side::Attacker);
    apply_losses(world, ctx, &battle.attacker, attacker_killer, attacker_spoils, &mut report);
    apply_losses(world, ctx, &battle.defender, defender_killer, defender_spoils, &mut report);

    if let Some(winner) = winner {
        take_prisoners(world, ctx, battle, winner, &mut report);

        let seize = battle.attacker.fighters.iter().any(|f| f.seize_slot);
        if winner == Side::Attacker && seize {
            if let Some(lead) = attacker_lead {
                world.seize_position(lead, battle.target);
                report.seized = true;
                ctx.log.push(
                    ctx.round,
                    BattleEventType::PositionSeized,
                    format!("{} takes the place of {}.", lead, battle.target),
                );
            }
        }

        rout(world, ctx, battle, winner.opponent(), &mut report);
    }

    for (side, line) in [
        (Side::Attacker, &battle.attacker),
        (Side::Defender, &battle.defender),
    ] {
        for fighter in line.fighters.iter().filter(|f| !f.summoned) {
            if let Some(fate) = fate_of(fighter) {
                report.noble_fates.push(NobleFate {
                    unit: fighter.unit,
                    side,
                    fate,
                });
            }
        }
    }

    tracing::debug!(
        ?outcome,
        casualties = report.casualties.len(),
        prisoners = report.prisoners.len(),
        structure_damage = report.structure_damage,
        "battle reconciled"
    );
    report
}
