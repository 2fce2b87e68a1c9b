pub mod config;
pub mod error;
pub mod rng;
pub mod types;

pub use config::CombatConfig;
pub use error::{CombatError, ConfigError, Result};
pub use rng::GameRng;
pub use types::{ItemId, Ratings, Side, Traits, UnitId};
