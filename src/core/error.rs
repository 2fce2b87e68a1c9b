use thiserror::Error;

use crate::core::types::UnitId;

#[derive(Error, Debug)]
pub enum CombatError {
    #[error("No defender for target {0}")]
    NoDefender(UnitId),

    #[error("Unit not found: {0}")]
    UnknownUnit(UnitId),

    #[error("{attacker} cannot attack {target}: they share a stack")]
    SameStack { attacker: UnitId, target: UnitId },

    #[error("Combat invariant violated: {0}")]
    InvariantViolation(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, CombatError>;
