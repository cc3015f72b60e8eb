//! Per-world tuning knobs.

use serde::{Deserialize, Serialize};

/// What counts toward a zone's mob cap
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MobCountMode {
    /// Only mobs inside the zone
    #[default]
    MobsOnly,
    /// Every entity inside the zone, whatever its kind. Matches older
    /// servers, where players and loot also pushed a zone toward its cap.
    AllEntities,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    pub seed: u64,
    /// Divides every zone's mob cap; raise it to thin out a busy server
    pub lag_downer: f32,
    pub pvp: bool,
    pub mob_count_mode: MobCountMode,
    pub view_width: f32,
    pub view_height: f32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            seed: 0x5eed,
            lag_downer: 1.0,
            pvp: false,
            mob_count_mode: MobCountMode::MobsOnly,
            view_width: 1920.0,
            view_height: 1080.0,
        }
    }
}

impl WorldConfig {
    /// `lag_downer` guarded against zero or negative values
    pub fn effective_lag_downer(&self) -> f32 {
        if self.lag_downer.is_finite() && self.lag_downer > 0.0 {
            self.lag_downer
        } else {
            1.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WorldConfig::default();
        assert_eq!(config.lag_downer, 1.0);
        assert!(!config.pvp);
        assert_eq!(config.mob_count_mode, MobCountMode::MobsOnly);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: WorldConfig = serde_json::from_str(r#"{ "pvp": true }"#).unwrap();
        assert!(config.pvp);
        assert_eq!(config.view_width, 1920.0);
    }

    #[test]
    fn test_bad_lag_downer_falls_back() {
        let config = WorldConfig {
            lag_downer: 0.0,
            ..WorldConfig::default()
        };
        assert_eq!(config.effective_lag_downer(), 1.0);
    }
}
