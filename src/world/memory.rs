//! In-memory world used by the runner and the tests
//!
//! Maps are hashed for lookup, but enumeration always follows insertion
//! order so that stack walks (and therefore random draws) are reproducible.

use ahash::{AHashMap, AHashSet};

use crate::core::types::{ItemId, UnitId};
use crate::world::{
    Artifact, Character, DeathHook, Diplomacy, EffectKind, ItemProfile, Location, Skill,
    StackView, Structure, UnitKind, UnitRecords,
};

/// One unit's state
#[derive(Debug, Clone)]
pub struct UnitRecord {
    pub kind: UnitKind,
    pub character: Option<Character>,
    /// Location of a stack leader; ignored for stacked units
    pub location: UnitId,
    pub stacked_under: Option<UnitId>,
    pub holdings: Vec<(ItemId, u32)>,
    pub skills: Vec<(Skill, u32)>,
    pub effects: Vec<(EffectKind, u32)>,
    pub artifacts: Vec<Artifact>,
    pub guarding: bool,
    pub orders: Vec<String>,
    pub defeat_requirement: Option<ItemId>,
}

impl UnitRecord {
    pub fn noble(character: Character, location: UnitId) -> Self {
        Self {
            kind: UnitKind::Noble,
            character: Some(character),
            location,
            stacked_under: None,
            holdings: Vec::new(),
            skills: Vec::new(),
            effects: Vec::new(),
            artifacts: Vec::new(),
            guarding: false,
            orders: Vec::new(),
            defeat_requirement: None,
        }
    }

    pub fn garrison(location: UnitId) -> Self {
        Self {
            kind: UnitKind::Garrison,
            character: None,
            ..Self::noble(Character::new("", 0, 0, 0), location)
        }
    }

    pub fn count_of(&self, item: ItemId) -> u32 {
        self.holdings
            .iter()
            .filter(|(id, _)| *id == item)
            .map(|(_, n)| *n)
            .sum()
    }
}

/// A complete world held in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryWorld {
    units: AHashMap<UnitId, UnitRecord>,
    unit_order: Vec<UnitId>,
    items: AHashMap<ItemId, ItemProfile>,
    structures: AHashMap<UnitId, Structure>,
    locations: AHashMap<UnitId, Location>,
    hostile: AHashSet<(UnitId, UnitId)>,
    defends: AHashSet<(UnitId, UnitId)>,
    /// Nobles handed to the death hook, with their killer
    pub graveyard: Vec<(UnitId, Option<UnitId>)>,
    /// (captor, prisoner) pairs
    pub prisoners: Vec<(UnitId, UnitId)>,
    /// (winner, loser) pairs
    pub seizures: Vec<(UnitId, UnitId)>,
}

impl MemoryWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_item(&mut self, id: ItemId, profile: ItemProfile) {
        self.items.insert(id, profile);
    }

    pub fn add_location(&mut self, id: UnitId, location: Location) {
        self.locations.insert(id, location);
    }

    pub fn add_structure(&mut self, id: UnitId, structure: Structure) {
        self.structures.insert(id, structure);
    }

    pub fn add_unit(&mut self, id: UnitId, record: UnitRecord) {
        if self.units.insert(id, record).is_none() {
            self.unit_order.push(id);
        }
    }

    pub fn unit(&self, id: UnitId) -> Option<&UnitRecord> {
        self.units.get(&id)
    }

    pub fn unit_mut(&mut self, id: UnitId) -> Option<&mut UnitRecord> {
        self.units.get_mut(&id)
    }

    pub fn location_mut(&mut self, id: UnitId) -> Option<&mut Location> {
        self.locations.get_mut(&id)
    }

    pub fn structure_mut(&mut self, id: UnitId) -> Option<&mut Structure> {
        self.structures.get_mut(&id)
    }

    /// Place `unit` beneath `leader` in the leader's stack
    pub fn stack(&mut self, unit: UnitId, leader: UnitId) {
        if let Some(record) = self.units.get_mut(&unit) {
            record.stacked_under = Some(leader);
        }
    }

    pub fn give(&mut self, unit: UnitId, item: ItemId, qty: u32) {
        self.grant_items(unit, item, qty);
    }

    pub fn set_skill(&mut self, unit: UnitId, skill: Skill, level: u32) {
        if let Some(record) = self.units.get_mut(&unit) {
            record.skills.retain(|(s, _)| *s != skill);
            if level > 0 {
                record.skills.push((skill, level));
            }
        }
    }

    pub fn set_effect(&mut self, unit: UnitId, effect: EffectKind, magnitude: u32) {
        if let Some(record) = self.units.get_mut(&unit) {
            record.effects.retain(|(e, _)| *e != effect);
            record.effects.push((effect, magnitude));
        }
    }

    pub fn add_artifact(&mut self, unit: UnitId, artifact: Artifact) {
        if let Some(record) = self.units.get_mut(&unit) {
            record.artifacts.push(artifact);
        }
    }

    pub fn declare_hostile(&mut self, a: UnitId, b: UnitId) {
        self.hostile.insert((a, b));
        self.hostile.insert((b, a));
    }

    pub fn pledge_defense(&mut self, defender: UnitId, protege: UnitId) {
        self.defends.insert((defender, protege));
    }

    /// Count of an item across every unit in the world
    pub fn total_items(&self, item: ItemId) -> u32 {
        self.units.values().map(|r| r.count_of(item)).sum()
    }

    /// Count of every troop item across every unit in the world
    pub fn total_troops(&self) -> u32 {
        self.units
            .values()
            .flat_map(|r| r.holdings.iter())
            .filter(|(item, _)| self.items.get(item).is_some_and(|p| p.is_troop()))
            .map(|(_, n)| *n)
            .sum()
    }

    fn children_of(&self, unit: UnitId) -> impl Iterator<Item = UnitId> + '_ {
        self.unit_order
            .iter()
            .copied()
            .filter(move |id| self.units.get(id).and_then(|r| r.stacked_under) == Some(unit))
    }

    /// Hand `unit`'s direct followers to whoever `unit` was stacked under,
    /// leaving them standing where they are if nobody
    fn release_followers(&mut self, unit: UnitId) {
        let children: Vec<UnitId> = self.children_of(unit).collect();
        let parent = self.stacked_under(unit);
        let location = self.location_of(unit);
        for child in children {
            if let Some(record) = self.units.get_mut(&child) {
                record.stacked_under = parent;
                if parent.is_none() {
                    if let Some(location) = location {
                        record.location = location;
                    }
                }
            }
        }
    }

    fn push_subtree(&self, unit: UnitId, out: &mut Vec<UnitId>) {
        out.push(unit);
        let children: Vec<UnitId> = self.children_of(unit).collect();
        for child in children {
            self.push_subtree(child, out);
        }
    }
}

impl StackView for MemoryWorld {
    fn stack_leader(&self, unit: UnitId) -> UnitId {
        let mut current = unit;
        let mut hops = 0;
        while let Some(parent) = self.units.get(&current).and_then(|r| r.stacked_under) {
            current = parent;
            hops += 1;
            if hops > self.unit_order.len() {
                break;
            }
        }
        current
    }

    fn stacked_under(&self, unit: UnitId) -> Option<UnitId> {
        self.units.get(&unit).and_then(|r| r.stacked_under)
    }

    fn stack_members(&self, leader: UnitId) -> Vec<UnitId> {
        let mut members = Vec::new();
        if self.units.contains_key(&leader) {
            self.push_subtree(leader, &mut members);
        }
        members
    }

    fn location_of(&self, unit: UnitId) -> Option<UnitId> {
        let leader = self.stack_leader(unit);
        self.units.get(&leader).map(|r| r.location)
    }

    fn stack_leaders_at(&self, location: UnitId) -> Vec<UnitId> {
        self.unit_order
            .iter()
            .copied()
            .filter(|id| {
                self.units
                    .get(id)
                    .is_some_and(|r| r.stacked_under.is_none() && r.location == location)
            })
            .collect()
    }
}

impl Diplomacy for MemoryWorld {
    fn is_hostile(&self, a: UnitId, b: UnitId) -> bool {
        self.hostile.contains(&(a, b))
    }

    fn will_defend(&self, defender: UnitId, protege: UnitId) -> bool {
        self.defends.contains(&(defender, protege))
    }

    fn controls_structure(&self, unit: UnitId, structure: UnitId) -> bool {
        self.structures
            .get(&structure)
            .is_some_and(|s| s.owner == Some(unit))
    }
}

impl UnitRecords for MemoryWorld {
    fn unit_kind(&self, unit: UnitId) -> Option<UnitKind> {
        self.units.get(&unit).map(|r| r.kind)
    }

    fn character(&self, unit: UnitId) -> Option<&Character> {
        self.units.get(&unit).and_then(|r| r.character.as_ref())
    }

    fn holdings(&self, unit: UnitId) -> Vec<(ItemId, u32)> {
        self.units
            .get(&unit)
            .map(|r| r.holdings.clone())
            .unwrap_or_default()
    }

    fn item(&self, item: ItemId) -> Option<&ItemProfile> {
        self.items.get(&item)
    }

    fn skill_level(&self, unit: UnitId, skill: Skill) -> u32 {
        self.units
            .get(&unit)
            .and_then(|r| r.skills.iter().find(|(s, _)| *s == skill))
            .map(|(_, level)| *level)
            .unwrap_or(0)
    }

    fn effect(&self, unit: UnitId, effect: EffectKind) -> Option<u32> {
        if let Some(s) = self.structures.get(&unit) {
            return match effect {
                EffectKind::ImproveFortification if s.fortified > 0 => Some(s.fortified),
                EffectKind::BlessFortification if s.blessed => Some(1),
                _ => None,
            };
        }
        self.units
            .get(&unit)
            .and_then(|r| r.effects.iter().find(|(e, _)| *e == effect))
            .map(|(_, magnitude)| *magnitude)
    }

    fn artifacts(&self, unit: UnitId) -> Vec<Artifact> {
        self.units
            .get(&unit)
            .map(|r| r.artifacts.clone())
            .unwrap_or_default()
    }

    fn structure(&self, id: UnitId) -> Option<&Structure> {
        self.structures.get(&id)
    }

    fn location(&self, id: UnitId) -> Option<&Location> {
        self.locations.get(&id)
    }

    fn defeat_requirement(&self, unit: UnitId) -> Option<ItemId> {
        self.units.get(&unit).and_then(|r| r.defeat_requirement)
    }

    fn consume_items(&mut self, unit: UnitId, item: ItemId, qty: u32) {
        if let Some(record) = self.units.get_mut(&unit) {
            let mut left = qty;
            for holding in record.holdings.iter_mut() {
                if holding.0 == item {
                    let taken = left.min(holding.1);
                    holding.1 -= taken;
                    left -= taken;
                }
            }
            record.holdings.retain(|(_, count)| *count > 0);
        }
    }

    fn grant_items(&mut self, unit: UnitId, item: ItemId, qty: u32) {
        if qty == 0 {
            return;
        }
        if let Some(record) = self.units.get_mut(&unit) {
            match record.holdings.iter_mut().find(|(id, _)| *id == item) {
                Some((_, count)) => *count += qty,
                None => record.holdings.push((item, qty)),
            }
        }
    }

    fn set_health(&mut self, unit: UnitId, health: u32) {
        if let Some(character) = self.units.get_mut(&unit).and_then(|r| r.character.as_mut()) {
            character.health = health.min(100);
        }
    }

    fn change_aura(&mut self, unit: UnitId, delta: i32) {
        if let Some(character) = self.units.get_mut(&unit).and_then(|r| r.character.as_mut()) {
            character.aura = character.aura.saturating_add_signed(delta);
        }
    }

    fn clear_effect(&mut self, unit: UnitId, effect: EffectKind) {
        if let Some(record) = self.units.get_mut(&unit) {
            record.effects.retain(|(e, _)| *e != effect);
        }
    }

    fn damage_structure(&mut self, structure: UnitId, points: u32) {
        if let Some(s) = self.structures.get_mut(&structure) {
            s.damage = (s.damage + points).min(s.hit_points);
        }
    }

    fn halt_orders(&mut self, unit: UnitId) {
        if let Some(record) = self.units.get_mut(&unit) {
            record.orders.clear();
        }
    }

    fn clear_guard(&mut self, unit: UnitId) {
        if let Some(record) = self.units.get_mut(&unit) {
            record.guarding = false;
        }
    }

    fn relocate(&mut self, unit: UnitId, to: UnitId) {
        if let Some(record) = self.units.get_mut(&unit) {
            record.stacked_under = None;
            record.location = to;
        }
    }

    fn take_prisoner(&mut self, captor: UnitId, prisoner: UnitId) {
        self.release_followers(prisoner);
        let location = self.location_of(captor);
        if let Some(record) = self.units.get_mut(&prisoner) {
            record.stacked_under = None;
            record.orders.clear();
            if let Some(location) = location {
                record.location = location;
            }
        }
        self.prisoners.push((captor, prisoner));
    }

    fn seize_position(&mut self, winner: UnitId, loser: UnitId) {
        let target_location = self
            .location_of(loser)
            .or_else(|| self.structures.get(&loser).map(|_| loser))
            .or_else(|| self.locations.get(&loser).map(|_| loser));
        if let (Some(to), Some(record)) = (target_location, self.units.get_mut(&winner)) {
            record.location = to;
        }
        if let Some(pos) = self.unit_order.iter().position(|id| *id == loser) {
            self.unit_order.retain(|id| *id != winner);
            let pos = pos.min(self.unit_order.len());
            self.unit_order.insert(pos, winner);
        }
        self.seizures.push((winner, loser));
    }
}

impl DeathHook for MemoryWorld {
    fn noble_died(&mut self, noble: UnitId, killer: Option<UnitId>) {
        self.release_followers(noble);
        if let Some(record) = self.units.get_mut(&noble) {
            record.stacked_under = None;
            record.orders.clear();
        }
        self.unit_order.retain(|id| *id != noble);
        self.graveyard.push((noble, killer));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world_with_stack() -> MemoryWorld {
        let mut world = MemoryWorld::new();
        world.add_location(UnitId(100), Location::default());
        world.add_unit(UnitId(1), UnitRecord::noble(Character::new("Lead", 10, 10, 0), UnitId(100)));
        world.add_unit(UnitId(2), UnitRecord::noble(Character::new("Second", 10, 10, 0), UnitId(100)));
        world.add_unit(UnitId(3), UnitRecord::noble(Character::new("Third", 10, 10, 0), UnitId(100)));
        world.add_unit(UnitId(4), UnitRecord::noble(Character::new("Loner", 10, 10, 0), UnitId(100)));
        world.stack(UnitId(2), UnitId(1));
        world.stack(UnitId(3), UnitId(2));
        world
    }

    #[test]
    fn test_stack_members_depth_first() {
        let world = world_with_stack();
        assert_eq!(
            world.stack_members(UnitId(1)),
            vec![UnitId(1), UnitId(2), UnitId(3)]
        );
        assert_eq!(world.stack_leader(UnitId(3)), UnitId(1));
        assert_eq!(world.stack_leaders_at(UnitId(100)), vec![UnitId(1), UnitId(4)]);
    }

    #[test]
    fn test_consume_and_grant() {
        let mut world = world_with_stack();
        world.give(UnitId(1), ItemId(10), 12);
        world.consume_items(UnitId(1), ItemId(10), 5);
        assert_eq!(world.unit(UnitId(1)).map(|r| r.count_of(ItemId(10))), Some(7));
        world.consume_items(UnitId(1), ItemId(10), 50);
        assert_eq!(world.unit(UnitId(1)).map(|r| r.holdings.len()), Some(0));
    }

    #[test]
    fn test_death_hook_restacks_children() {
        let mut world = world_with_stack();
        world.noble_died(UnitId(2), Some(UnitId(4)));
        assert_eq!(world.stacked_under(UnitId(3)), Some(UnitId(1)));
        assert_eq!(world.graveyard, vec![(UnitId(2), Some(UnitId(4)))]);
        assert_eq!(world.stack_members(UnitId(1)), vec![UnitId(1), UnitId(3)]);
    }

    #[test]
    fn test_prisoner_leaves_followers_behind() {
        let mut world = world_with_stack();
        world.take_prisoner(UnitId(4), UnitId(1));
        assert_eq!(world.stacked_under(UnitId(2)), None);
        assert_eq!(world.stack_members(UnitId(2)), vec![UnitId(2), UnitId(3)]);
        assert_eq!(world.stack_members(UnitId(1)), vec![UnitId(1)]);
        assert_eq!(world.prisoners, vec![(UnitId(4), UnitId(1))]);
    }

    #[test]
    fn test_structure_damage_capped() {
        let mut world = MemoryWorld::new();
        world.add_structure(
            UnitId(50),
            Structure {
                name: "Tower".into(),
                hit_points: 40,
                damage: 30,
                coverage: 50,
                moat: false,
                fortified: 0,
                blessed: false,
                owner: None,
                location: UnitId(100),
            },
        );
        world.damage_structure(UnitId(50), 25);
        assert_eq!(world.structure(UnitId(50)).map(|s| s.damage), Some(40));
    }
}
