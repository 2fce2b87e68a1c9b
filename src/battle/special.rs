//! Special attacks cast by nobles
//!
//! Each alive noble casts at most one special per special phase: the first
//! one it knows, in table order, that it has the aura to pay for and that
//! has something to act on.

use serde::{Deserialize, Serialize};

use crate::battle::fighter::Fighter;
use crate::battle::line::BattleLine;
use crate::battle::log::BattleEventType;
use crate::battle::rounds::BattleContext;
use crate::battle::targeting::{self, Phase};
use crate::core::error::Result;
use crate::core::types::{Ratings, Traits};
use crate::world::Skill;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpecialAttack {
    LightningBolt,
    Fireball,
    DrainMana,
    RaiseSoldiers,
    ForeseeDefense,
}

impl SpecialAttack {
    /// Preference order when a noble knows several
    pub const ALL: [SpecialAttack; 5] = [
        Self::LightningBolt,
        Self::Fireball,
        Self::DrainMana,
        Self::RaiseSoldiers,
        Self::ForeseeDefense,
    ];

    pub fn skill(self) -> Skill {
        match self {
            Self::LightningBolt => Skill::LightningBolt,
            Self::Fireball => Skill::Fireball,
            Self::DrainMana => Skill::DrainMana,
            Self::RaiseSoldiers => Skill::RaiseSoldiers,
            Self::ForeseeDefense => Skill::ForeseeDefense,
        }
    }

    pub fn aura_cost(self) -> u32 {
        match self {
            Self::LightningBolt => 3,
            Self::Fireball => 5,
            Self::DrainMana => 2,
            Self::RaiseSoldiers => 4,
            Self::ForeseeDefense => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::LightningBolt => "a lightning bolt",
            Self::Fireball => "a fireball",
            Self::DrainMana => "drain mana",
            Self::RaiseSoldiers => "raise soldiers",
            Self::ForeseeDefense => "foresee defense",
        }
    }

    fn has_work(self, enemy: &BattleLine) -> bool {
        match self {
            Self::LightningBolt | Self::Fireball => enemy.any_alive(),
            Self::DrainMana => enemy.fighters.iter().any(drainable),
            Self::RaiseSoldiers | Self::ForeseeDefense => true,
        }
    }

    /// Cast by `own.fighters[striker]` at skill `level`. Returns hits dealt.
    pub fn strike(
        self,
        ctx: &mut BattleContext<'_>,
        striker: usize,
        level: u32,
        own: &mut BattleLine,
        enemy: &mut BattleLine,
    ) -> Result<u32> {
        let config = ctx.config;
        let specials = &config.specials;
        match self {
            Self::LightningBolt => {
                let power = specials.lightning_power.saturating_mul(level);
                volley(ctx, striker, own, enemy, 1, power)
            }
            Self::Fireball => {
                let shots = specials.fireball_shots_per_level.saturating_mul(level);
                let power = specials.fireball_power;
                volley(ctx, striker, own, enemy, shots, power)
            }
            Self::DrainMana => {
                drain(ctx, striker, level, own, enemy);
                Ok(0)
            }
            Self::RaiseSoldiers => {
                raise(ctx, striker, level, own);
                Ok(0)
            }
            Self::ForeseeDefense => {
                ctx.foreseen[own.side.index()] = true;
                ctx.log.push(
                    ctx.round,
                    BattleEventType::SpecialAttack {
                        unit: own.fighters[striker].unit,
                    },
                    format!("The {} foresee where the blows will fall.", own.side),
                );
                Ok(0)
            }
        }
    }
}

fn drainable(fighter: &Fighter) -> bool {
    fighter.is_alive() && fighter.noble.as_ref().is_some_and(|n| n.aura > 0)
}

fn volley(
    ctx: &mut BattleContext<'_>,
    striker: usize,
    own: &BattleLine,
    enemy: &mut BattleLine,
    shots: u32,
    power: u32,
) -> Result<u32> {
    let situation = targeting::situation_against(ctx, enemy, own.siege_towers());
    let caster = &own.fighters[striker];
    let mut hits = 0;
    for _ in 0..shots {
        let available = targeting::count_targets(enemy, Phase::Special);
        if available == 0 {
            break;
        }
        let pick = ctx.rng.rnd(1, available);
        let Some(target) = enemy.nth_body(pick, |f| targeting::is_target(f, Phase::Special)) else {
            break;
        };
        if targeting::deliver_blow(
            ctx,
            caster,
            &own.bonuses,
            power,
            enemy,
            target,
            Phase::Special,
            &situation,
        ) {
            hits += 1;
        }
    }
    Ok(hits)
}

fn drain(
    ctx: &mut BattleContext<'_>,
    striker: usize,
    level: u32,
    own: &mut BattleLine,
    enemy: &mut BattleLine,
) {
    let victims: Vec<usize> = enemy
        .fighters
        .iter()
        .enumerate()
        .filter(|(_, f)| drainable(f))
        .map(|(i, _)| i)
        .collect();
    if victims.is_empty() {
        return;
    }
    let pick = ctx.rng.rnd(1, victims.len() as u32) as usize - 1;
    let victim = victims[pick];
    let most = ctx.config.specials.drain_per_level.saturating_mul(level);
    let roll = ctx.rng.rnd(1, most.max(1));

    let mut drained = 0;
    if let Some(state) = enemy.fighters[victim].noble.as_mut() {
        drained = roll.min(state.aura);
        state.aura -= drained;
    }
    if let Some(state) = own.fighters[striker].noble.as_mut() {
        state.aura += drained;
    }

    ctx.log.push(
        ctx.round,
        BattleEventType::SpecialAttack {
            unit: own.fighters[striker].unit,
        },
        format!(
            "{} drains {} aura from {}.",
            own.fighters[striker].unit, drained, enemy.fighters[victim].unit
        ),
    );
}

fn raise(ctx: &mut BattleContext<'_>, striker: usize, level: u32, own: &mut BattleLine) {
    let config = ctx.config;
    let specials = &config.specials;
    let most = specials.raise_per_level.saturating_mul(level);
    let ratings = Ratings::new(specials.raised_attack, specials.raised_defense, 0);
    let item = specials.raised_item;
    let count = ctx.rng.rnd(1, most.max(1));

    let caster = &own.fighters[striker];
    let unit = caster.unit;
    let mut soldiers = Fighter::troop(unit, item, count, ratings, Traits::UNDEAD);
    soldiers.summoned = true;
    soldiers.is_ally = caster.is_ally;
    soldiers.protects = Some(striker);
    own.push(soldiers);

    ctx.log.push(
        ctx.round,
        BattleEventType::SpecialAttack { unit },
        format!("{} raises {} soldiers from the fallen.", unit, count),
    );
}

/// Every alive noble of `own` casts its first usable special
pub fn special_phase(
    ctx: &mut BattleContext<'_>,
    own: &mut BattleLine,
    enemy: &mut BattleLine,
) -> Result<u32> {
    let mut hits = 0;
    let casters = own.fighters.len();
    for i in 0..casters {
        let chosen = {
            let fighter = &own.fighters[i];
            match &fighter.noble {
                Some(state) if fighter.is_alive() => state
                    .specials
                    .iter()
                    .copied()
                    .find(|(attack, _)| state.aura >= attack.aura_cost() && attack.has_work(enemy)),
                _ => None,
            }
        };
        let Some((attack, level)) = chosen else {
            continue;
        };

        if let Some(state) = own.fighters[i].noble.as_mut() {
            state.aura -= attack.aura_cost();
        }
        tracing::debug!(caster = %own.fighters[i].unit, ?attack, level, "special attack");
        let dealt = attack.strike(ctx, i, level, own, enemy)?;
        if matches!(attack, SpecialAttack::LightningBolt | SpecialAttack::Fireball) {
            ctx.log.push(
                ctx.round,
                BattleEventType::SpecialAttack {
                    unit: own.fighters[i].unit,
                },
                format!(
                    "{} casts {} and strikes {} times.",
                    own.fighters[i].unit,
                    attack.name(),
                    dealt
                ),
            );
        }
        hits += dealt;
    }
    Ok(hits)
}
