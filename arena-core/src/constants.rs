//! Centralized tuning constants for the arena simulation.
//!
//! Per-definition numbers (petal damage, mob health, zone density) live in the
//! content tables; the values here are engine-wide and shared by several
//! modules.

// =====================================================
// Spatial Grid
// =====================================================

/// Edge length of one grid bucket. Sized so the largest common hitbox
/// (a boss mob, radius ~100) spans at most a 2x2 block of cells.
pub const GRID_CELL_SIZE: f32 = 256.0;

// =====================================================
// Spawning
// =====================================================

/// Attempts made by `Zone::random_safe_position` before accepting a
/// colliding point
pub const SAFE_SPAWN_ATTEMPTS: u32 = 50;

/// Extra clearance added to the probe circle when looking for a spawn point
pub const SAFE_SPAWN_PADDING: f32 = 5.0;

/// Divisor applied to zone density: max = density / 15 * w * h / 20 / lag_downer
pub const DENSITY_DIVISOR: f32 = 15.0;

/// Area divisor in the mob cap formula
pub const AREA_DIVISOR: f32 = 20.0;

// =====================================================
// Player & Petals
// =====================================================

/// Player body radius
pub const PLAYER_RADIUS: f32 = 25.0;

/// Player movement speed (units per second) at full input magnitude
pub const PLAYER_SPEED: f32 = 240.0;

/// Body damage a player deals on contact
pub const PLAYER_BODY_DAMAGE: f32 = 25.0;

/// Petal orbit angular speed (radians per second)
pub const PETAL_ORBIT_SPEED: f32 = 2.5;

/// Orbit radius in normal mode
pub const ORBIT_RADIUS_NORMAL: f32 = 70.0;

/// Orbit radius while attacking
pub const ORBIT_RADIUS_ATTACK: f32 = 130.0;

/// Orbit radius while defending
pub const ORBIT_RADIUS_DEFEND: f32 = 45.0;

/// Fraction of the remaining distance a petal closes per 1/25s
pub const PETAL_STEER: f32 = 0.35;

/// Unequipped petals a player can carry
pub const INVENTORY_CAPACITY: usize = 8;

/// Seconds a swapped-in petal waits before its first spawn
pub const SWAP_RELOAD_SECS: f32 = 1.0;

// =====================================================
// Physics
// =====================================================

/// Velocity retained per 1/25s (exponential friction)
pub const FRICTION: f32 = 0.8;

/// Strength of the soft separation impulse between overlapping bodies
pub const SEPARATION_FORCE: f32 = 6.0;

/// Upper bound on a single tick's dt (seconds) to survive runner stalls
pub const MAX_TICK_DT: f32 = 0.25;

/// Reference tick length the per-tick factors above are tuned for
pub const REFERENCE_DT: f32 = 1.0 / 25.0;

// =====================================================
// Loot & Mobs
// =====================================================

/// Seconds a loot drop stays on the ground
pub const LOOT_LIFETIME: f32 = 30.0;

/// Loot pickup hitbox radius
pub const LOOT_RADIUS: f32 = 15.0;

/// Distance multiplier after which a chasing mob gives up its target
pub const AGGRO_LEASH_MULT: f32 = 2.0;

/// Aggro radius for mobs whose definition leaves it at zero
pub const DEFAULT_AGGRO_RADIUS: f32 = 300.0;

/// Wander mobs re-roll heading with this probability per tick
pub const WANDER_TURN_CHANCE: f64 = 0.02;

/// Wander speed as a fraction of the mob's chase speed
pub const WANDER_SPEED_MULT: f32 = 0.3;

// =====================================================
// Protocol limits
// =====================================================

/// Longest accepted player name (characters)
pub const MAX_NAME_LEN: usize = 20;

/// Longest accepted chat message (characters)
pub const MAX_CHAT_LEN: usize = 120;

/// Health is reported to clients quantized to this many steps
pub const HEALTH_REPORT_STEPS: f32 = 255.0;
