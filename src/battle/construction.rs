//! Battle-line construction
//!
//! Resolves who actually defends a target, then walks each side's stack
//! depth-first: every unit contributes its own slot followed by one slot
//! per troop kind it carries, as far as its command limit allows. The order
//! produced here is fixed for the rest of the battle.

use ahash::AHashSet;
use serde::{Deserialize, Serialize};

use crate::battle::conditions::Conditions;
use crate::battle::engine::AttackRequest;
use crate::battle::fighter::{Fighter, FighterBonuses, NobleState};
use crate::battle::line::{BattleLine, FortCover, LineBonuses};
use crate::battle::ratings::rate_fighter;
use crate::battle::special::SpecialAttack;
use crate::core::config::CombatConfig;
use crate::core::error::{CombatError, Result};
use crate::core::types::{ItemId, Side, Traits, UnitId};
use crate::world::{ArtifactKind, Character, EffectKind, Skill, UnitKind, World};

/// Everything needed to fight one battle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Battle {
    pub attacker: BattleLine,
    pub defender: BattleLine,
    /// Stacks that will come to the defenders' aid in round two
    pub allies: Vec<BattleLine>,
    pub conditions: Conditions,
    /// Province the battle is fought in
    pub location: UnitId,
    /// Structure whose walls the defenders hold
    pub structure: Option<UnitId>,
    /// What the attacker asked to attack
    pub target: UnitId,
    /// Item the attacker lacks to defeat the defender
    pub defeat_blocked: Option<ItemId>,
    pub rounds_fought: u32,
}

/// Who defends a target, and where
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefenderInfo {
    pub lead: UnitId,
    pub structure: Option<UnitId>,
    /// Where the defenders stand
    pub place: UnitId,
}

/// Troops a unit may still commit, split into men and beasts.
/// `None` is unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandAllowance {
    pub men: Option<u32>,
    pub beasts: Option<u32>,
}

impl CommandAllowance {
    pub fn unlimited() -> Self {
        Self {
            men: None,
            beasts: None,
        }
    }

    pub fn for_unit<W: World + ?Sized>(
        world: &W,
        unit: UnitId,
        kind: UnitKind,
        config: &CombatConfig,
    ) -> Self {
        if kind == UnitKind::Garrison {
            return Self::unlimited();
        }
        let command = &config.command;
        let men_level = world.skill_level(unit, Skill::ControlMen);
        let beast_level = world.skill_level(unit, Skill::ControlBeasts);
        let mut men = command.min_men.max(men_level.saturating_mul(command.men_per_level));
        let mut beasts = command
            .min_beasts
            .max(beast_level.saturating_mul(command.beasts_per_level));

        if let Some(bonus) = world.effect(unit, EffectKind::CommandBonus) {
            men = men.saturating_mul(100 + bonus) / 100;
            beasts = beasts.saturating_mul(100 + bonus) / 100;
        }

        for artifact in world.artifacts(unit) {
            match artifact.kind {
                ArtifactKind::CommandMen => men = men.saturating_add(artifact.bonus),
                ArtifactKind::CommandBeasts => beasts = beasts.saturating_add(artifact.bonus),
                _ => {}
            }
        }

        Self {
            men: Some(men),
            beasts: Some(beasts),
        }
    }

    /// Commit up to `count` troops of a kind; returns how many go in
    pub fn commit(&mut self, traits: Traits, count: u32) -> u32 {
        let pool = if traits.contains(Traits::ANIMAL) {
            &mut self.beasts
        } else {
            &mut self.men
        };
        match pool {
            None => count,
            Some(left) => {
                let committed = count.min(*left);
                *left -= committed;
                committed
            }
        }
    }
}

fn has_troops<W: World + ?Sized>(world: &W, unit: UnitId) -> bool {
    world
        .holdings(unit)
        .iter()
        .any(|(item, count)| *count > 0 && world.item(*item).is_some_and(|p| p.is_troop()))
}

/// Find the effective defender of a target.
///
/// A noble is defended by its stack leader, a structure by its controlling
/// owner, a province by its ruling garrison. A garrison with no troops left
/// defends nothing.
pub fn resolve_defender<W: World + ?Sized>(world: &W, target: UnitId) -> Result<DefenderInfo> {
    if world.unit_kind(target).is_some() {
        let lead = world.stack_leader(target);
        let place = world.location_of(lead).ok_or(CombatError::UnknownUnit(lead))?;
        return Ok(DefenderInfo {
            lead,
            structure: None,
            place,
        });
    }

    if let Some(structure) = world.structure(target) {
        let owner = structure
            .owner
            .filter(|owner| world.controls_structure(*owner, target))
            .ok_or(CombatError::NoDefender(target))?;
        let lead = world.stack_leader(owner);
        let place = world.location_of(lead).unwrap_or(structure.location);
        return Ok(DefenderInfo {
            lead,
            structure: Some(target),
            place,
        });
    }

    if let Some(location) = world.location(target) {
        let garrison = location.garrison.ok_or(CombatError::NoDefender(target))?;
        if world.unit_kind(garrison).is_none() || !has_troops(world, garrison) {
            return Err(CombatError::NoDefender(target));
        }
        return Ok(DefenderInfo {
            lead: world.stack_leader(garrison),
            structure: location.structure,
            place: target,
        });
    }

    Err(CombatError::UnknownUnit(target))
}

/// Province a place belongs to; structures stand in one
pub fn province_of<W: World + ?Sized>(world: &W, place: UnitId) -> UnitId {
    world.structure(place).map_or(place, |s| s.location)
}

fn noble_state<W: World + ?Sized>(world: &W, unit: UnitId, character: &Character) -> NobleState {
    let mut state = NobleState::new(character.health, character.aura);
    state.personal_break = character.personal_break;
    state.fights_to_death = world.skill_level(unit, Skill::FightToTheDeath) > 0;
    state.avoid_wounds = world.skill_level(unit, Skill::AvoidWounds);
    state.specials = SpecialAttack::ALL
        .iter()
        .filter_map(|attack| {
            let level = world.skill_level(unit, attack.skill());
            (level > 0).then_some((*attack, level))
        })
        .collect();
    state.can_survive_fatal = world.effect(unit, EffectKind::SurviveFatalWound).is_some();
    state
}

/// Bonuses a unit's slot gets; its troops get the same minus the weapon
pub fn unit_bonuses<W: World + ?Sized>(world: &W, unit: UnitId) -> FighterBonuses {
    let mut bonuses = FighterBonuses {
        blessed: world.effect(unit, EffectKind::BlessFollowers).is_some(),
        uncanny: world.skill_level(unit, Skill::UncannyAccuracy) > 0,
        ..Default::default()
    };
    for artifact in world.artifacts(unit) {
        match artifact.kind {
            ArtifactKind::Weapon => bonuses.weapon += artifact.bonus,
            ArtifactKind::Melee => bonuses.melee_pct += artifact.bonus,
            ArtifactKind::Missile => bonuses.missile_pct += artifact.bonus,
            ArtifactKind::Special => bonuses.special_pct += artifact.bonus,
            ArtifactKind::Defense => bonuses.defense_pct += artifact.bonus,
            ArtifactKind::CommandMen | ArtifactKind::CommandBeasts => {}
        }
    }
    bonuses
}

/// Side-wide bonuses granted by the lead
pub fn lead_bonuses<W: World + ?Sized>(world: &W, lead: UnitId, config: &CombatConfig) -> LineBonuses {
    let modifiers = &config.modifiers;
    LineBonuses {
        tactics_pct: world
            .skill_level(lead, Skill::Tactics)
            .saturating_mul(modifiers.tactics_pct_per_level)
            .min(modifiers.tactics_cap_pct),
        defense_tactics_pct: world
            .skill_level(lead, Skill::DefenseTactics)
            .saturating_mul(modifiers.defense_tactics_pct_per_level),
        scry_pct: world.effect(lead, EffectKind::ScryOffense).unwrap_or(0),
    }
}

fn break_point<W: World + ?Sized>(world: &W, lead: UnitId, config: &CombatConfig) -> u32 {
    match world.unit_kind(lead) {
        Some(UnitKind::Garrison) => config.rounds.garrison_break_point,
        _ => world
            .character(lead)
            .and_then(|c| c.break_point)
            .unwrap_or(config.rounds.default_break_point),
    }
}

/// Options shared by every fighter a stack contributes
#[derive(Debug, Clone, Copy)]
struct Muster<'a> {
    config: &'a CombatConfig,
    conditions: &'a Conditions,
    inside: bool,
    is_ally: bool,
}

/// Walk the stack under `lead` into `line`. Returns the lead's slot.
fn muster_stack<W: World + ?Sized>(
    world: &W,
    line: &mut BattleLine,
    lead: UnitId,
    muster: Muster<'_>,
) -> Result<usize> {
    let mut slots: Vec<(UnitId, usize)> = Vec::new();
    let mut lead_slot = None;

    for unit in world.stack_members(lead) {
        let kind = world.unit_kind(unit).ok_or(CombatError::UnknownUnit(unit))?;
        let parent_slot = if unit == lead {
            None
        } else {
            world
                .stacked_under(unit)
                .and_then(|parent| slots.iter().find(|(u, _)| *u == parent))
                .map(|(_, slot)| *slot)
        };

        let bonuses = unit_bonuses(world, unit);
        let (mut fighter, behind) = match kind {
            UnitKind::Noble => {
                let character = world.character(unit).ok_or(CombatError::UnknownUnit(unit))?;
                let state = noble_state(world, unit, character);
                let fighter = Fighter::noble(unit, character.ratings(), character.traits, state);
                (fighter, character.behind)
            }
            UnitKind::Garrison => (Fighter::garrison(unit), 0),
        };
        fighter.rank = behind;
        fighter.protects = parent_slot;
        fighter.inside = muster.inside;
        fighter.is_ally = muster.is_ally;
        fighter.bonuses = bonuses;
        rate_fighter(&mut fighter, muster.conditions, muster.config);

        let slot = line.push(fighter);
        slots.push((unit, slot));
        lead_slot.get_or_insert(slot);

        let mut allowance = CommandAllowance::for_unit(world, unit, kind, muster.config);
        let troop_bonuses = FighterBonuses {
            weapon: 0,
            ..bonuses
        };
        for (item, count) in world.holdings(unit) {
            let Some(profile) = world.item(item) else {
                continue;
            };
            if count == 0 || !profile.is_troop() {
                continue;
            }
            if muster.conditions.naval && profile.traits.contains(Traits::SIEGE_ENGINE) {
                continue;
            }
            let committed = allowance.commit(profile.traits, count);
            if committed == 0 {
                continue;
            }

            let mut troop = Fighter::troop(unit, item, committed, profile.ratings(), profile.traits);
            troop.rank = behind.saturating_add(u8::from(profile.missile > profile.attack));
            troop.protects = Some(slot);
            troop.inside = muster.inside;
            troop.is_ally = muster.is_ally;
            troop.bonuses = troop_bonuses;
            rate_fighter(&mut troop, muster.conditions, muster.config);
            line.push(troop);
        }
    }

    lead_slot.ok_or(CombatError::UnknownUnit(lead))
}

fn holds_item<W: World + ?Sized>(world: &W, members: &[UnitId], item: ItemId) -> bool {
    members.iter().any(|unit| {
        world
            .holdings(*unit)
            .iter()
            .any(|(id, count)| *id == item && *count > 0)
    })
}

/// Build both battle lines (and any waiting allies) for an attack
pub fn build_battle<W: World + ?Sized>(
    world: &W,
    request: &AttackRequest,
    config: &CombatConfig,
) -> Result<Battle> {
    if world.unit_kind(request.attacker).is_none() {
        return Err(CombatError::UnknownUnit(request.attacker));
    }
    let attacker_lead = world.stack_leader(request.attacker);
    let defender = resolve_defender(world, request.target)?;

    if attacker_lead == defender.lead {
        return Err(CombatError::SameStack {
            attacker: request.attacker,
            target: request.target,
        });
    }

    let location = province_of(world, defender.place);
    let conditions = world
        .location(location)
        .map(Conditions::from_location)
        .unwrap_or_default();

    // Defenders: walls first, then the defending stack
    let mut defender_line = BattleLine::new(Side::Defender);
    if let Some(structure_id) = defender.structure {
        if let Some(structure) = world.structure(structure_id) {
            let remaining = structure.remaining();
            if remaining > 0 {
                let mut walls = Fighter::fortification(structure_id, remaining);
                walls.bonuses.fortify = world
                    .effect(structure_id, EffectKind::ImproveFortification)
                    .unwrap_or(0);
                rate_fighter(&mut walls, &conditions, config);
                defender_line.push(walls);
                defender_line.cover = Some(FortCover {
                    structure: structure_id,
                    hit_points: structure.hit_points,
                    coverage: structure.coverage,
                    moat: structure.moat,
                    blessed: world
                        .effect(structure_id, EffectKind::BlessFortification)
                        .is_some(),
                });
            }
        }
    }
    let inside = defender_line.cover.is_some();
    defender_line.lead = muster_stack(
        world,
        &mut defender_line,
        defender.lead,
        Muster {
            config,
            conditions: &conditions,
            inside,
            is_ally: false,
        },
    )?;
    defender_line.bonuses = lead_bonuses(world, defender.lead, config);
    defender_line.break_point = break_point(world, defender.lead, config);

    let mut attacker_line = BattleLine::new(Side::Attacker);
    attacker_line.lead = muster_stack(
        world,
        &mut attacker_line,
        attacker_lead,
        Muster {
            config,
            conditions: &conditions,
            inside: false,
            is_ally: false,
        },
    )?;
    attacker_line.bonuses = lead_bonuses(world, attacker_lead, config);
    attacker_line.break_point = break_point(world, attacker_lead, config);
    if request.seize_on_win {
        attacker_line.fighters[attacker_line.lead].seize_slot = true;
    }

    let attacker_members = world.stack_members(attacker_lead);
    let defender_members = world.stack_members(defender.lead);
    let defeat_blocked = world
        .defeat_requirement(defender.lead)
        .filter(|item| !holds_item(world, &attacker_members, *item));

    // Allies waiting in the wings
    let engaged: AHashSet<UnitId> = attacker_members
        .iter()
        .chain(defender_members.iter())
        .copied()
        .collect();
    let mut allies = Vec::new();
    for leader in world.stack_leaders_at(defender.place) {
        if engaged.contains(&leader) {
            continue;
        }
        if !world.will_defend(leader, defender.lead) || !world.is_hostile(leader, attacker_lead) {
            continue;
        }
        let mut fragment = BattleLine::new(Side::Defender);
        fragment.lead = muster_stack(
            world,
            &mut fragment,
            leader,
            Muster {
                config,
                conditions: &conditions,
                inside: false,
                is_ally: true,
            },
        )?;
        allies.push(fragment);
    }

    tracing::debug!(
        attacker = %attacker_lead,
        defender = %defender.lead,
        attacker_fighters = attacker_line.len(),
        defender_fighters = defender_line.len(),
        allies = allies.len(),
        "battle lines built"
    );

    Ok(Battle {
        attacker: attacker_line,
        defender: defender_line,
        allies,
        conditions,
        location,
        structure: defender.structure,
        target: request.target,
        defeat_blocked,
        rounds_fought: 0,
    })
}
