//! Round controller
//!
//! INIT -> opening volley -> ROUND(special -> missile -> melee) repeated
//! until a side breaks -> TERMINATED. The verdict is checked after every
//! phase, so a battle can end in the middle of a round.

use serde::{Deserialize, Serialize};

use crate::battle::attrition::resolve_dead;
use crate::battle::conditions::Conditions;
use crate::battle::construction::Battle;
use crate::battle::line::BattleLine;
use crate::battle::log::{BattleEventType, BattleLog};
use crate::battle::special::special_phase;
use crate::battle::targeting::{strike_phase, Phase};
use crate::core::config::CombatConfig;
use crate::core::error::Result;
use crate::core::rng::GameRng;
use crate::core::types::Side;

/// How a battle ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BattleOutcome {
    AttackerVictory,
    DefenderVictory,
    Draw,
    /// Nobody stood to defend the target
    NoCombat,
}

impl BattleOutcome {
    pub fn winner(self) -> Option<Side> {
        match self {
            Self::AttackerVictory => Some(Side::Attacker),
            Self::DefenderVictory => Some(Side::Defender),
            Self::Draw | Self::NoCombat => None,
        }
    }

    pub fn is_decisive(self) -> bool {
        self.winner().is_some()
    }
}

/// Per-battle session state threaded through the round loop
pub struct BattleContext<'a> {
    pub config: &'a CombatConfig,
    pub rng: &'a mut GameRng,
    pub conditions: Conditions,
    /// 0 during the opening volley
    pub round: u32,
    /// Sides that foresaw the enemy's blows this round
    pub foreseen: [bool; 2],
    pub banner_shown: bool,
    pub log: BattleLog,
}

impl<'a> BattleContext<'a> {
    pub fn new(config: &'a CombatConfig, rng: &'a mut GameRng, conditions: Conditions) -> Self {
        Self {
            config,
            rng,
            conditions,
            round: 0,
            foreseen: [false; 2],
            banner_shown: false,
            log: BattleLog::new(),
        }
    }
}

/// Decide the battle from the two lines as they stand
pub fn verdict(attacker: &BattleLine, defender: &BattleLine) -> Option<BattleOutcome> {
    match (attacker.is_broken(), defender.is_broken()) {
        (false, false) => None,
        (true, true) => Some(BattleOutcome::Draw),
        (false, true) if attacker.lead_alive() => Some(BattleOutcome::AttackerVictory),
        (true, false) if defender.lead_alive() => Some(BattleOutcome::DefenderVictory),
        _ => Some(BattleOutcome::Draw),
    }
}

fn show_banner(ctx: &mut BattleContext<'_>, battle: &Battle) {
    if ctx.banner_shown {
        return;
    }
    ctx.banner_shown = true;
    let attacker = battle.attacker.lead_unit().map(|u| u.to_string()).unwrap_or_default();
    let defender = battle.defender.lead_unit().map(|u| u.to_string()).unwrap_or_default();
    tracing::info!(%attacker, %defender, location = %battle.location, "battle begins");
    ctx.log.push(
        ctx.round,
        BattleEventType::BattleStarted,
        format!("{} attacks {} at {}!", attacker, defender, battle.location),
    );
}

/// Apply both sides' pending hits and re-check the lines
fn resolve_phase(ctx: &mut BattleContext<'_>, battle: &mut Battle) -> Result<Option<BattleOutcome>> {
    resolve_dead(ctx, &mut battle.attacker);
    resolve_dead(ctx, &mut battle.defender);
    battle.attacker.check_invariants()?;
    battle.defender.check_invariants()?;
    Ok(verdict(&battle.attacker, &battle.defender))
}

fn join_allies(ctx: &mut BattleContext<'_>, battle: &mut Battle) {
    let mut joined = 0;
    for fragment in battle.allies.drain(..) {
        if let Some(lead) = fragment.lead_unit() {
            ctx.log.push(
                ctx.round,
                BattleEventType::AlliesJoined {
                    count: fragment.len(),
                },
                format!("{} joins the battle on the side of the defenders.", lead),
            );
        }
        joined += battle.defender.append(fragment);
    }
    let sum = battle.defender.original_combat_sum();
    battle.defender.set_threshold(sum);
    if joined > 0 {
        tracing::debug!(joined, threshold = battle.defender.threshold, "allies joined");
    }
}

/// Fight the battle to a verdict
pub fn fight(ctx: &mut BattleContext<'_>, battle: &mut Battle) -> Result<BattleOutcome> {
    show_banner(ctx, battle);

    let attacker_sum = battle.attacker.combat_sum();
    let defender_sum = battle.defender.combat_sum();
    battle.attacker.set_threshold(attacker_sum);
    battle.defender.set_threshold(defender_sum);
    battle.attacker.check_invariants()?;
    battle.defender.check_invariants()?;

    if let Some(outcome) = verdict(&battle.attacker, &battle.defender) {
        return Ok(outcome);
    }

    // The defenders loose one volley before the attackers close
    if !ctx.conditions.fog {
        ctx.round = 0;
        let hits = strike_phase(ctx, &battle.defender, &mut battle.attacker, Phase::Missile)?;
        if hits > 0 {
            ctx.log.push(
                0,
                BattleEventType::Volley,
                format!("The defenders loose a volley: {} hits.", hits),
            );
        }
        if let Some(outcome) = resolve_phase(ctx, battle)? {
            return Ok(outcome);
        }
    }

    for round in 1..=ctx.config.rounds.max_rounds {
        ctx.round = round;
        ctx.foreseen = [false; 2];
        battle.rounds_fought = round;
        ctx.log.push(round, BattleEventType::RoundStarted, format!("Round {}.", round));

        if round == 2 {
            join_allies(ctx, battle);
        }

        if ctx.rng.coin() {
            special_phase(ctx, &mut battle.attacker, &mut battle.defender)?;
            special_phase(ctx, &mut battle.defender, &mut battle.attacker)?;
        } else {
            special_phase(ctx, &mut battle.defender, &mut battle.attacker)?;
            special_phase(ctx, &mut battle.attacker, &mut battle.defender)?;
        }
        if let Some(outcome) = resolve_phase(ctx, battle)? {
            return Ok(outcome);
        }

        for phase in [Phase::Missile, Phase::Melee] {
            strike_phase(ctx, &battle.attacker, &mut battle.defender, phase)?;
            strike_phase(ctx, &battle.defender, &mut battle.attacker, phase)?;
            if let Some(outcome) = resolve_phase(ctx, battle)? {
                return Ok(outcome);
            }
        }
    }

    tracing::warn!(
        rounds = ctx.config.rounds.max_rounds,
        "battle still undecided at the round cap; declaring a draw"
    );
    Ok(BattleOutcome::Draw)
}
