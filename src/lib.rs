//! Shieldwall - stack-versus-stack combat resolution for turn-based strategy games

pub mod battle;
pub mod core;
pub mod world;
