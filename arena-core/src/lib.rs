//! Petal Arena - Simulation Core
//!
//! Deterministic, single-threaded game logic for one arena instance:
//! - Uniform spatial hash grid for broad-phase and range queries
//! - Lively entities (players, mobs, petals) with health, teams and DoT
//! - Data-driven petal behaviors resolved through a kind-tag table
//! - Zones with density-capped and timed special spawning
//! - Dirty tracking and per-client, visibility-scoped delta snapshots
//! - Content loading (petals, mobs, zones, world layout) from JSON

pub mod config;
pub mod constants;
pub mod content;
pub mod entity;
pub mod error;
pub mod grid;
pub mod leveling;
pub mod logging;
pub mod math;
pub mod pool;
pub mod snapshot;
pub mod world;
pub mod zone;

pub use config::{MobCountMode, WorldConfig};
pub use content::Content;
pub use error::{CoreError, CoreResult};
pub use grid::SpatialGrid;
pub use pool::EntityId;
pub use snapshot::{ClientId, ClientPacket, ServerPacket};
pub use world::{TickOutput, World, WorldEvent};
