//! Applying the hits of a phase
//!
//! Hits pile up on their targets while a phase is fought and are only
//! turned into losses here, once both sides have struck.

use serde::{Deserialize, Serialize};

use crate::battle::fighter::{Fighter, FighterKind};
use crate::battle::line::BattleLine;
use crate::battle::log::BattleEventType;
use crate::battle::ratings::refresh_fortification;
use crate::battle::rounds::BattleContext;
use crate::core::types::{Traits, UnitId};

/// Losses one side suffered in one phase
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseLosses {
    pub killed: u32,
    pub fled: u32,
    pub wall_damage: u32,
    /// Nobles who left the field this phase
    pub nobles_out: Vec<UnitId>,
}

impl PhaseLosses {
    pub fn is_empty(&self) -> bool {
        self.killed == 0 && self.fled == 0 && self.wall_damage == 0 && self.nobles_out.is_empty()
    }
}

/// How a noble's wounds went
enum Wounding {
    Fights,
    Withdraws,
    Slain,
    SavedFromDeath,
}

fn wound_noble(ctx: &mut BattleContext<'_>, fighter: &mut Fighter, hits: u32) -> Wounding {
    let unaccompanied = fighter.protector_count == 0;
    let modifiers = &ctx.config.modifiers;
    let per_level = modifiers.avoid_wounds_pct_per_level;
    let cap = modifiers.avoid_wounds_cap_pct;
    let Some(state) = fighter.noble.as_mut() else {
        return Wounding::Withdraws;
    };

    for _ in 0..hits {
        let mut wound = ctx.rng.rnd(1, 100);
        if unaccompanied && state.avoid_wounds > 0 {
            let pct = state.avoid_wounds.saturating_mul(per_level).min(cap);
            wound -= wound * pct / 100;
        }
        state.health = state.health.saturating_sub(wound);

        if state.health == 0 {
            if state.can_survive_fatal {
                state.survived_fatal = true;
                return Wounding::SavedFromDeath;
            }
            return Wounding::Slain;
        }
        if !state.fights_to_death || state.health <= state.personal_break {
            return Wounding::Withdraws;
        }
    }
    Wounding::Fights
}

/// Turn pending hits into losses for every fighter of `line`
pub fn resolve_dead(ctx: &mut BattleContext<'_>, line: &mut BattleLine) -> PhaseLosses {
    let mut losses = PhaseLosses::default();

    for i in 0..line.fighters.len() {
        let hits = line.fighters[i].hits_this_phase;
        if hits == 0 {
            continue;
        }
        let was_alive = line.fighters[i].is_alive();
        let fighter = &mut line.fighters[i];
        fighter.hits_this_phase = 0;

        match fighter.kind {
            FighterKind::Fortification => {
                let lost = hits.min(fighter.current_count);
                fighter.current_count -= lost;
                refresh_fortification(fighter);
                losses.wall_damage += lost;
                if was_alive && !fighter.is_alive() {
                    ctx.log.push(
                        ctx.round,
                        BattleEventType::WallsBreached,
                        format!("The walls of {} are breached.", fighter.unit),
                    );
                }
            }
            FighterKind::Troop(_) => {
                let killed = hits.min(fighter.current_count);
                fighter.current_count -= killed;
                losses.killed += killed;

                if fighter.traits.contains(Traits::PANIC_PRONE)
                    && killed > 0
                    && fighter.current_count > 0
                {
                    let flee = ctx.rng.rnd(0, killed).min(fighter.current_count);
                    fighter.current_count -= flee;
                    fighter.fled += flee;
                    losses.fled += flee;
                }
            }
            FighterKind::Noble => {
                let unit = fighter.unit;
                let text = match wound_noble(ctx, fighter, hits) {
                    Wounding::Fights => None,
                    Wounding::Withdraws => Some(format!("{} is wounded and leaves the field.", unit)),
                    Wounding::Slain => Some(format!("{} is slain.", unit)),
                    Wounding::SavedFromDeath => {
                        Some(format!("{} is struck down, but clings to life.", unit))
                    }
                };
                if let Some(text) = text {
                    fighter.current_count = 0;
                    losses.nobles_out.push(unit);
                    ctx.log.push(ctx.round, BattleEventType::NobleLeft { unit }, text);
                }
            }
            FighterKind::Garrison => {
                fighter.current_count = 0;
            }
        }

        if was_alive && !line.fighters[i].is_alive() {
            line.fell(i);
        }
    }

    if losses.killed > 0 || losses.fled > 0 {
        let text = if losses.fled > 0 {
            format!(
                "The {} lose {} men; {} more flee.",
                line.side, losses.killed, losses.fled
            )
        } else {
            format!("The {} lose {} men.", line.side, losses.killed)
        };
        ctx.log.push(ctx.round, BattleEventType::Casualties { side: line.side }, text);
    }

    losses
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::conditions::Conditions;
    use crate::battle::fighter::NobleState;
    use crate::core::config::CombatConfig;
    use crate::core::rng::GameRng;
    use crate::core::types::{ItemId, Ratings, Side};

    fn noble_line(state: NobleState, troops: u32) -> BattleLine {
        let mut line = BattleLine::new(Side::Defender);
        let lead = line.push(Fighter::noble(
            UnitId(2),
            Ratings::new(40, 40, 0),
            Traits::empty(),
            state,
        ));
        if troops > 0 {
            let mut men = Fighter::troop(
                UnitId(2),
                ItemId(10),
                troops,
                Ratings::new(5, 5, 0),
                Traits::PANIC_PRONE,
            );
            men.protects = Some(lead);
            line.push(men);
        }
        line
    }

    #[test]
    fn test_troop_losses_release_protection() {
        let config = CombatConfig::default();
        let mut rng = GameRng::new(12);
        let mut ctx = BattleContext::new(&config, &mut rng, Conditions::default());

        let mut line = noble_line(NobleState::new(100, 0), 4);
        line.fighters[1].hits_this_phase = 4;
        let losses = resolve_dead(&mut ctx, &mut line);

        assert_eq!(losses.killed, 4);
        assert_eq!(losses.fled, 0);
        assert_eq!(line.fighters[1].current_count, 0);
        assert_eq!(line.fighters[0].protector_count, 0);
        assert!(line.fighters[0].is_targetable());
    }

    #[test]
    fn test_panic_never_exceeds_survivors() {
        let config = CombatConfig::default();
        for seed in 0..50 {
            let mut rng = GameRng::new(seed);
            let mut ctx = BattleContext::new(&config, &mut rng, Conditions::default());
            let mut line = noble_line(NobleState::new(100, 0), 10);
            line.fighters[1].hits_this_phase = 7;
            let losses = resolve_dead(&mut ctx, &mut line);

            let peasants = &line.fighters[1];
            assert_eq!(losses.killed, 7);
            assert!(peasants.fled <= 3);
            assert_eq!(peasants.current_count + peasants.fled + 7, 10);
        }
    }

    #[test]
    fn test_noble_without_fight_to_death_withdraws() {
        let config = CombatConfig::default();
        let mut rng = GameRng::new(2);
        let mut ctx = BattleContext::new(&config, &mut rng, Conditions::default());

        let mut line = noble_line(NobleState::new(100, 0), 0);
        line.fighters[0].hits_this_phase = 1;
        let losses = resolve_dead(&mut ctx, &mut line);

        assert_eq!(losses.nobles_out, vec![UnitId(2)]);
        let state = line.fighters[0].noble.as_ref().expect("noble state");
        assert!(state.health < 100);
        assert!(!line.fighters[0].is_alive());
    }

    #[test]
    fn test_fatal_wound_survived_with_effect() {
        let config = CombatConfig::default();
        let mut rng = GameRng::new(2);
        let mut ctx = BattleContext::new(&config, &mut rng, Conditions::default());

        let mut state = NobleState::new(1, 0);
        state.can_survive_fatal = true;
        let mut line = noble_line(state, 0);
        line.fighters[0].hits_this_phase = 1;
        resolve_dead(&mut ctx, &mut line);

        let state = line.fighters[0].noble.as_ref().expect("noble state");
        assert_eq!(state.health, 0);
        assert!(state.survived_fatal);
        assert!(!state.is_dead());
    }

    #[test]
    fn test_walls_lose_points_and_defense() {
        let config = CombatConfig::default();
        let mut rng = GameRng::new(2);
        let mut ctx = BattleContext::new(&config, &mut rng, Conditions::default());

        let mut line = BattleLine::new(Side::Defender);
        line.push(Fighter::fortification(UnitId(50), 30));
        line.fighters[0].hits_this_phase = 45;
        let losses = resolve_dead(&mut ctx, &mut line);

        assert_eq!(losses.wall_damage, 30);
        assert_eq!(line.fighters[0].current_count, 0);
        assert_eq!(line.fighters[0].defense, 0);
        assert_eq!(
            ctx.log
                .of_type(|t| matches!(t, BattleEventType::WallsBreached))
                .count(),
            1
        );
    }
}
