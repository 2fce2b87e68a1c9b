//! Battle narration
//!
//! Every significant decision is written twice: as player-visible text kept
//! in the `BattleLog`, and as a `tracing` audit line. Nothing in the engine
//! ever reads the log back.

use serde::{Deserialize, Serialize};

use crate::core::types::{Side, UnitId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BattleEventType {
    BattleStarted,
    Volley,
    RoundStarted,
    AlliesJoined { count: usize },
    ReserveAdvanced { side: Side, rank: u8 },
    SpecialAttack { unit: UnitId },
    Casualties { side: Side },
    WallsBreached,
    NobleLeft { unit: UnitId },
    DefeatBlocked,
    BattleEnded,
    Captured { unit: UnitId },
    Routed { unit: UnitId },
    PositionSeized,
}

/// One line of narration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleEvent {
    /// Round in which the event happened; 0 is the opening volley
    pub round: u32,
    pub event_type: BattleEventType,
    pub description: String,
}

/// Narration of a whole battle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleLog {
    pub events: Vec<BattleEvent>,
}

impl BattleLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, round: u32, event_type: BattleEventType, description: String) {
        tracing::debug!(round, ?event_type, "{}", description);
        self.events.push(BattleEvent {
            round,
            event_type,
            description,
        });
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Events of one kind, in order
    pub fn of_type<'a>(
        &'a self,
        pred: impl Fn(&BattleEventType) -> bool + 'a,
    ) -> impl Iterator<Item = &'a BattleEvent> + 'a {
        self.events.iter().filter(move |e| pred(&e.event_type))
    }

    /// Player-visible text, one line per event
    pub fn lines(&self) -> Vec<&str> {
        self.events.iter().map(|e| e.description.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_filter() {
        let mut log = BattleLog::new();
        log.push(0, BattleEventType::BattleStarted, "Battle begins".into());
        log.push(
            1,
            BattleEventType::ReserveAdvanced {
                side: Side::Defender,
                rank: 1,
            },
            "The defenders' reserve moves up".into(),
        );

        assert_eq!(log.len(), 2);
        let advances: Vec<_> = log
            .of_type(|t| matches!(t, BattleEventType::ReserveAdvanced { .. }))
            .collect();
        assert_eq!(advances.len(), 1);
        assert_eq!(advances[0].round, 1);
        assert_eq!(log.lines()[0], "Battle begins");
    }
}
