//! Experience curve and level-derived stats.

use serde::{Deserialize, Serialize};

use crate::zone::Zone;

/// Hard ceiling on levels, far beyond reachable play
pub const MAX_LEVEL: u32 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelInfo {
    pub level: u32,
    /// Exp accumulated toward the next level
    pub remains_exp: u64,
    /// Exp needed to go from `level` to `level + 1`
    pub next_cost: u64,
}

/// Exp needed to advance from `level` to `level + 1`
pub fn level_exp_cost(level: u32) -> u64 {
    let level_f = level as f64;
    3 + (level_f * 1.06f64.powf(level_f - 1.0)).floor() as u64
}

pub fn level_from_exp(exp: u64) -> LevelInfo {
    let mut level = 0;
    let mut remains = exp;
    loop {
        let cost = level_exp_cost(level);
        if remains < cost || level >= MAX_LEVEL {
            return LevelInfo {
                level,
                remains_exp: remains,
                next_cost: cost,
            };
        }
        remains -= cost;
        level += 1;
    }
}

/// Total exp required to reach `level` from zero
pub fn total_exp_for_level(level: u32) -> u64 {
    (0..level.min(MAX_LEVEL)).map(level_exp_cost).sum()
}

pub fn max_health_for_level(level: u32) -> f32 {
    100.0 + 2.0 * level as f32
}

pub fn slot_count_for_level(level: u32) -> usize {
    (5 + level as usize / 15).min(10)
}

/// Whether a player of `level` may enter `zone`
pub fn zone_unlocked(zone: &Zone, level: u32) -> bool {
    level >= zone.min_level
}
