// Position cache module
pub mod manager;

pub use manager::{PositionManager, DEFAULT_MAX_OPEN_POSITIONS, SYNC_COOLDOWN_MS};
