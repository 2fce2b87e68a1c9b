//! Battle system - stack-versus-stack combat resolution
//!
//! A battle is fought between two lines of fighters built from the
//! attacking and defending stacks. Rounds of special, missile and melee
//! exchanges repeat until one side falls below its break point, and the
//! result is then written back into the world.
//!
//! Flow:
//! - `construction` builds the lines (and any allies waiting to join)
//! - `ratings` fills in each fighter's effective stats
//! - `rounds` drives the phases, calling `special` and `targeting`/`hit`
//! - `attrition` turns pending hits into losses after every phase
//! - `reconcile` applies the outcome to the world
//!
//! `engine::resolve_attack` runs the whole pipeline.

pub mod attrition;
pub mod conditions;
pub mod construction;
pub mod engine;
pub mod fighter;
pub mod hit;
pub mod line;
pub mod log;
pub mod ratings;
pub mod reconcile;
pub mod rounds;
pub mod special;
pub mod targeting;

// Re-exports for convenient access
pub use attrition::{resolve_dead, PhaseLosses};
pub use conditions::Conditions;
pub use construction::{build_battle, resolve_defender, Battle, CommandAllowance, DefenderInfo};
pub use engine::{resolve_attack, AttackRequest, BattleReport};
pub use fighter::{Fighter, FighterBonuses, FighterKind, NobleState};
pub use hit::{contest, is_hit, DefenseSituation};
pub use line::{BattleLine, FortCover, LineBonuses};
pub use log::{BattleEvent, BattleEventType, BattleLog};
pub use reconcile::{reconcile, Casualty, Fate, NobleFate, Reconciliation};
pub use rounds::{fight, verdict, BattleContext, BattleOutcome};
pub use special::SpecialAttack;
pub use targeting::Phase;
