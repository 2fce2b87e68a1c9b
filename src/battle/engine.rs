//! Entry point: resolve one attack against the world
//!
//! Construction, the round loop and reconciliation run back to back.
//! Nothing is written to the world until the battle has a verdict.

use serde::{Deserialize, Serialize};

use crate::battle::construction::{build_battle, province_of};
use crate::battle::log::{BattleEventType, BattleLog};
use crate::battle::reconcile::{reconcile, Casualty, NobleFate};
use crate::battle::rounds::{fight, BattleContext, BattleOutcome};
use crate::core::config::CombatConfig;
use crate::core::error::{CombatError, Result};
use crate::core::rng::GameRng;
use crate::core::types::UnitId;
use crate::world::World;

/// An attack as ordered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackRequest {
    pub attacker: UnitId,
    /// A noble, a structure or a province
    pub target: UnitId,
    /// Take the defender's place if the attack wins
    #[serde(default)]
    pub seize_on_win: bool,
}

/// Everything that happened, for whoever tells the players
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleReport {
    pub outcome: BattleOutcome,
    /// Lead of the attacking stack
    pub attacker: UnitId,
    /// Lead of the defending stack; none when nobody defended
    pub defender: Option<UnitId>,
    pub location: UnitId,
    pub rounds_fought: u32,
    pub casualties: Vec<Casualty>,
    pub noble_fates: Vec<NobleFate>,
    pub prisoners: Vec<UnitId>,
    pub routed_to: Vec<(UnitId, UnitId)>,
    pub structure_damage: u32,
    pub seized: bool,
    pub log: BattleLog,
}

impl BattleReport {
    fn empty(outcome: BattleOutcome, attacker: UnitId, location: UnitId) -> Self {
        Self {
            outcome,
            attacker,
            defender: None,
            location,
            rounds_fought: 0,
            casualties: Vec::new(),
            noble_fates: Vec::new(),
            prisoners: Vec::new(),
            routed_to: Vec::new(),
            structure_damage: 0,
            seized: false,
            log: BattleLog::new(),
        }
    }

    /// Troops killed on both sides
    pub fn total_killed(&self) -> u32 {
        self.casualties.iter().map(|c| c.killed).sum()
    }
}

fn unopposed<W: World + ?Sized>(
    world: &mut W,
    request: &AttackRequest,
    target: UnitId,
) -> BattleReport {
    let attacker = world.stack_leader(request.attacker);
    let location = province_of(&*world, target);
    let mut report = BattleReport::empty(BattleOutcome::NoCombat, attacker, location);

    if request.seize_on_win {
        world.seize_position(attacker, target);
        report.seized = true;
        report.log.push(
            0,
            BattleEventType::PositionSeized,
            format!("{} is undefended; {} takes it.", target, attacker),
        );
    } else {
        report.log.push(
            0,
            BattleEventType::BattleEnded,
            format!("No one stands to defend {}.", target),
        );
    }
    tracing::info!(%attacker, %target, seized = report.seized, "attack unopposed");
    report
}

/// Resolve an attack, applying every consequence to `world`
pub fn resolve_attack<W: World + ?Sized>(
    world: &mut W,
    request: &AttackRequest,
    config: &CombatConfig,
    rng: &mut GameRng,
) -> Result<BattleReport> {
    let mut battle = match build_battle(&*world, request, config) {
        Ok(battle) => battle,
        Err(CombatError::NoDefender(target)) => return Ok(unopposed(world, request, target)),
        Err(e) => return Err(e),
    };

    let attacker = battle
        .attacker
        .lead_unit()
        .ok_or(CombatError::UnknownUnit(request.attacker))?;
    let defender = battle.defender.lead_unit();
    let mut ctx = BattleContext::new(config, rng, battle.conditions);

    if let Some(item) = battle.defeat_blocked {
        ctx.log.push(
            0,
            BattleEventType::DefeatBlocked,
            format!(
                "{} cannot be defeated without {}; the attack comes to nothing.",
                request.target, item
            ),
        );
        tracing::info!(%attacker, target = %request.target, %item, "defeat condition unmet");
        let mut report = BattleReport::empty(BattleOutcome::Draw, attacker, battle.location);
        report.defender = defender;
        report.log = ctx.log;
        return Ok(report);
    }

    let outcome = fight(&mut ctx, &mut battle)?;
    let changes = reconcile(world, &mut ctx, &mut battle, outcome);

    let summary = match outcome {
        BattleOutcome::AttackerVictory => "The attackers are victorious.",
        BattleOutcome::DefenderVictory => "The defenders hold.",
        BattleOutcome::Draw | BattleOutcome::NoCombat => "The battle ends with no victor.",
    };
    ctx.log
        .push(ctx.round, BattleEventType::BattleEnded, summary.to_string());
    tracing::info!(
        ?outcome,
        rounds = battle.rounds_fought,
        prisoners = changes.prisoners.len(),
        "battle over"
    );

    Ok(BattleReport {
        outcome,
        attacker,
        defender,
        location: battle.location,
        rounds_fought: battle.rounds_fought,
        casualties: changes.casualties,
        noble_fates: changes.noble_fates,
        prisoners: changes.prisoners,
        routed_to: changes.routed_to,
        structure_damage: changes.structure_damage,
        seized: changes.seized,
        log: ctx.log,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{ItemId, Traits};
    use crate::world::memory::{MemoryWorld, UnitRecord};
    use crate::world::{Character, ItemProfile, Location};

    const SOLDIER: ItemId = ItemId(10);

    fn world() -> MemoryWorld {
        let mut world = MemoryWorld::new();
        world.add_item(SOLDIER, ItemProfile::new("soldier", 5, 5, 0));
        world.add_item(
            ItemId(11),
            ItemProfile::new("peasant", 1, 1, 0).with_traits(Traits::PANIC_PRONE),
        );
        world.add_location(
            UnitId(100),
            Location {
                name: "Plain".into(),
                neighbors: vec![UnitId(101)],
                ..Default::default()
            },
        );
        world.add_location(UnitId(101), Location::default());
        world.add_unit(
            UnitId(1),
            UnitRecord::noble(Character::new("Attacker", 80, 80, 0), UnitId(100)),
        );
        world.give(UnitId(1), SOLDIER, 25);
        world
    }

    fn request(target: u32) -> AttackRequest {
        AttackRequest {
            attacker: UnitId(1),
            target: UnitId(target),
            seize_on_win: false,
        }
    }

    #[test]
    fn test_undefended_province_is_no_combat() {
        let mut world = world();
        let config = CombatConfig::default();
        let mut rng = GameRng::new(4);

        let report = resolve_attack(&mut world, &request(100), &config, &mut rng).expect("report");
        assert_eq!(report.outcome, BattleOutcome::NoCombat);
        assert_eq!(report.defender, None);
        assert_eq!(report.total_killed(), 0);
        assert_eq!(rng.draws(), 0);
    }

    #[test]
    fn test_unopposed_seizure() {
        let mut world = world();
        let config = CombatConfig::default();
        let mut rng = GameRng::new(4);
        let mut req = request(100);
        req.seize_on_win = true;

        let report = resolve_attack(&mut world, &req, &config, &mut rng).expect("report");
        assert!(report.seized);
        assert_eq!(world.seizures, vec![(UnitId(1), UnitId(100))]);
    }

    #[test]
    fn test_unknown_attacker_is_an_error() {
        let mut world = world();
        let config = CombatConfig::default();
        let mut rng = GameRng::new(4);
        let req = AttackRequest {
            attacker: UnitId(42),
            target: UnitId(100),
            seize_on_win: false,
        };
        assert!(matches!(
            resolve_attack(&mut world, &req, &config, &mut rng),
            Err(CombatError::UnknownUnit(UnitId(42)))
        ));
    }

    #[test]
    fn test_strong_attacker_beats_garrison() {
        let mut world = world();
        world.add_unit(UnitId(30), UnitRecord::garrison(UnitId(100)));
        world.give(UnitId(30), ItemId(11), 10);
        if let Some(loc) = world.location_mut(UnitId(100)) {
            loc.garrison = Some(UnitId(30));
        }
        let config = CombatConfig::default();
        let mut rng = GameRng::new(21);

        let report = resolve_attack(&mut world, &request(100), &config, &mut rng).expect("report");
        assert_eq!(report.outcome, BattleOutcome::AttackerVictory);
        assert_eq!(report.defender, Some(UnitId(30)));
        assert!(report.rounds_fought >= 1);
        let last = report.log.events.last().map(|e| e.event_type);
        assert_eq!(last, Some(BattleEventType::BattleEnded));
    }

    #[test]
    fn test_missing_relic_blocks_defeat() {
        let mut world = world();
        world.add_item(ItemId(99), ItemProfile::new("relic", 0, 0, 0));
        let mut record = UnitRecord::noble(Character::new("Lich", 10, 10, 0), UnitId(100));
        record.defeat_requirement = Some(ItemId(99));
        world.add_unit(UnitId(2), record);
        let config = CombatConfig::default();
        let mut rng = GameRng::new(4);

        let report = resolve_attack(&mut world, &request(2), &config, &mut rng).expect("report");
        assert_eq!(report.outcome, BattleOutcome::Draw);
        assert!(report.casualties.is_empty());
        assert_eq!(
            report
                .log
                .of_type(|t| matches!(t, BattleEventType::DefeatBlocked))
                .count(),
            1
        );
    }
}
