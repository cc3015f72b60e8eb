//! Static game content: petal, mob, zone and world tables.
//!
//! Content is loaded once from JSON (a directory or the built-in set under
//! `content/`), validated eagerly, and then shared read-only as
//! `Arc<Content>`. Any broken reference or malformed behavior is a
//! [`CoreError`] at load time.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::entity::{MobAiKind, PetalBehavior, PetalItem};
use crate::error::{CoreError, CoreResult};

// ============================================================================
// Rarity
// ============================================================================

/// Item and mob rarity, ordered from most to least common
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rarity {
    Common,
    Unusual,
    Rare,
    Epic,
    Legendary,
    Mythic,
    Ultra,
}

impl Rarity {
    /// Stat multiplier applied to petal damage and health
    pub fn stat_multiplier(&self) -> f32 {
        match self {
            Self::Common => 1.0,
            Self::Unusual => 1.5,
            Self::Rare => 2.25,
            Self::Epic => 3.4,
            Self::Legendary => 5.0,
            Self::Mythic => 7.5,
            Self::Ultra => 11.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Common => "common",
            Self::Unusual => "unusual",
            Self::Rare => "rare",
            Self::Epic => "epic",
            Self::Legendary => "legendary",
            Self::Mythic => "mythic",
            Self::Ultra => "ultra",
        }
    }
}

// ============================================================================
// Definitions
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PetalDef {
    pub id: String,
    pub name: String,
    pub rarity: Rarity,
    pub damage: f32,
    pub health: f32,
    /// Seconds between death and respawn
    pub reload: f32,
    pub radius: f32,
    #[serde(default)]
    pub behavior: Option<String>,
    #[serde(default)]
    pub params: Option<Value>,
}

impl PetalDef {
    pub fn build_behavior(&self) -> CoreResult<PetalBehavior> {
        PetalBehavior::from_parts(&self.id, self.behavior.as_deref(), self.params.as_ref())
    }

    /// Default item for this definition
    pub fn item(&self) -> PetalItem {
        PetalItem::new(self.id.clone(), self.rarity)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MobDrop {
    pub petal: String,
    pub chance: f64,
    /// Overrides the petal's own rarity
    #[serde(default)]
    pub rarity: Option<Rarity>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MobDef {
    pub id: String,
    pub name: String,
    pub rarity: Rarity,
    pub health: f32,
    pub damage: f32,
    pub radius: f32,
    pub speed: f32,
    pub ai: MobAiKind,
    #[serde(default)]
    pub aggro_radius: f32,
    #[serde(default)]
    pub exp: u64,
    #[serde(default)]
    pub drops: Vec<MobDrop>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpawnWeight {
    pub mob: String,
    pub weight: f32,
}

/// Special spawn interval: a fixed number of seconds or a range re-rolled
/// after every trigger
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SpawnInterval {
    Fixed(f32),
    Range { min: f32, max: f32 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpecialSpawnDef {
    pub name: String,
    pub spawns: Vec<SpawnWeight>,
    pub interval: SpawnInterval,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneDef {
    pub name: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub density: f32,
    #[serde(default)]
    pub min_level: u32,
    #[serde(default)]
    pub spawns: Vec<SpawnWeight>,
    #[serde(default)]
    pub specials: Vec<SpecialSpawnDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WallDef {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldDef {
    pub width: f32,
    pub height: f32,
    pub spawn_zone: String,
    pub starting_loadout: Vec<String>,
    #[serde(default)]
    pub walls: Vec<WallDef>,
}

// ============================================================================
// Content set
// ============================================================================

#[derive(Debug, Clone)]
pub struct Content {
    pub petals: BTreeMap<String, PetalDef>,
    pub mobs: BTreeMap<String, MobDef>,
    pub zones: Vec<ZoneDef>,
    pub world: WorldDef,
}

const BUILTIN_PETALS: &str = include_str!("../content/petals.json");
const BUILTIN_MOBS: &str = include_str!("../content/mobs.json");
const BUILTIN_ZONES: &str = include_str!("../content/zones.json");
const BUILTIN_WORLD: &str = include_str!("../content/world.json");

fn parse<T: serde::de::DeserializeOwned>(file: &str, text: &str) -> CoreResult<T> {
    serde_json::from_str(text).map_err(|source| CoreError::Json {
        file: file.to_string(),
        source,
    })
}

fn invalid(msg: String) -> CoreError {
    CoreError::InvalidContent(msg)
}

impl Content {
    /// The content set shipped with the crate
    pub fn builtin() -> CoreResult<Self> {
        Self::from_json(BUILTIN_PETALS, BUILTIN_MOBS, BUILTIN_ZONES, BUILTIN_WORLD)
    }

    /// Load `petals.json`, `mobs.json`, `zones.json` and `world.json` from `dir`
    pub fn load_dir(dir: impl AsRef<Path>) -> CoreResult<Self> {
        let dir = dir.as_ref();
        let petals = std::fs::read_to_string(dir.join("petals.json"))?;
        let mobs = std::fs::read_to_string(dir.join("mobs.json"))?;
        let zones = std::fs::read_to_string(dir.join("zones.json"))?;
        let world = std::fs::read_to_string(dir.join("world.json"))?;
        let content = Self::from_json(&petals, &mobs, &zones, &world)?;
        tracing::info!(
            dir = %dir.display(),
            petals = content.petals.len(),
            mobs = content.mobs.len(),
            zones = content.zones.len(),
            "Loaded content"
        );
        Ok(content)
    }

    pub fn from_json(petals: &str, mobs: &str, zones: &str, world: &str) -> CoreResult<Self> {
        let petal_list: Vec<PetalDef> = parse("petals.json", petals)?;
        let mob_list: Vec<MobDef> = parse("mobs.json", mobs)?;
        let zones: Vec<ZoneDef> = parse("zones.json", zones)?;
        let world: WorldDef = parse("world.json", world)?;

        let mut petals = BTreeMap::new();
        for def in petal_list {
            let id = def.id.clone();
            if petals.insert(id.clone(), def).is_some() {
                return Err(invalid(format!("duplicate petal id `{id}`")));
            }
        }
        let mut mobs = BTreeMap::new();
        for def in mob_list {
            let id = def.id.clone();
            if mobs.insert(id.clone(), def).is_some() {
                return Err(invalid(format!("duplicate mob id `{id}`")));
            }
        }

        let content = Self {
            petals,
            mobs,
            zones,
            world,
        };
        content.validate()?;
        Ok(content)
    }

    pub fn petal(&self, id: &str) -> CoreResult<&PetalDef> {
        self.petals
            .get(id)
            .ok_or_else(|| CoreError::UnknownPetal(id.to_string()))
    }

    pub fn mob(&self, id: &str) -> CoreResult<&MobDef> {
        self.mobs
            .get(id)
            .ok_or_else(|| CoreError::UnknownMob(id.to_string()))
    }

    pub fn zone(&self, name: &str) -> CoreResult<&ZoneDef> {
        self.zones
            .iter()
            .find(|z| z.name == name)
            .ok_or_else(|| CoreError::UnknownZone(name.to_string()))
    }

    /// Items a fresh player starts with
    pub fn starting_loadout(&self) -> CoreResult<Vec<PetalItem>> {
        self.world
            .starting_loadout
            .iter()
            .map(|id| self.petal(id).map(PetalDef::item))
            .collect()
    }

    /// Check every cross reference and numeric range
    pub fn validate(&self) -> CoreResult<()> {
        for def in self.petals.values() {
            if !(def.health > 0.0 && def.radius > 0.0 && def.damage >= 0.0 && def.reload >= 0.0) {
                return Err(invalid(format!("petal `{}` has non-positive stats", def.id)));
            }
            def.build_behavior()?;
        }

        for def in self.mobs.values() {
            if !(def.health > 0.0 && def.radius > 0.0 && def.speed >= 0.0 && def.damage >= 0.0) {
                return Err(invalid(format!("mob `{}` has non-positive stats", def.id)));
            }
            for drop in &def.drops {
                self.petal(&drop.petal)?;
                if !(0.0..=1.0).contains(&drop.chance) {
                    return Err(invalid(format!(
                        "mob `{}` drop `{}` chance must be within [0, 1]",
                        def.id, drop.petal
                    )));
                }
            }
        }

        let mut names = BTreeSet::new();
        for zone in &self.zones {
            if !names.insert(zone.name.as_str()) {
                return Err(invalid(format!("duplicate zone `{}`", zone.name)));
            }
            if !(zone.width > 0.0 && zone.height > 0.0 && zone.density >= 0.0) {
                return Err(invalid(format!("zone `{}` has invalid bounds", zone.name)));
            }
            self.validate_weights(&zone.name, &zone.spawns, true)?;
            for special in &zone.specials {
                self.validate_weights(&special.name, &special.spawns, false)?;
                let ok = match special.interval {
                    SpawnInterval::Fixed(secs) => secs > 0.0,
                    SpawnInterval::Range { min, max } => min > 0.0 && min <= max,
                };
                if !ok {
                    return Err(invalid(format!(
                        "special `{}` in zone `{}` has an invalid interval",
                        special.name, zone.name
                    )));
                }
            }
        }

        if !(self.world.width > 0.0 && self.world.height > 0.0) {
            return Err(invalid("world size must be positive".to_string()));
        }
        self.zone(&self.world.spawn_zone)?;
        for id in &self.world.starting_loadout {
            self.petal(id)?;
        }
        for wall in &self.world.walls {
            if !(wall.width > 0.0 && wall.height > 0.0) {
                return Err(invalid("wall size must be positive".to_string()));
            }
        }
        Ok(())
    }

    fn validate_weights(&self, owner: &str, table: &[SpawnWeight], allow_empty: bool) -> CoreResult<()> {
        if table.is_empty() {
            if allow_empty {
                return Ok(());
            }
            return Err(invalid(format!("`{owner}` has an empty spawn table")));
        }
        for entry in table {
            self.mob(&entry.mob)?;
            if !(entry.weight.is_finite() && entry.weight >= 0.0) {
                return Err(invalid(format!("`{owner}` has a negative spawn weight")));
            }
        }
        if table.iter().map(|e| e.weight).sum::<f32>() <= 0.0 {
            return Err(invalid(format!("`{owner}` spawn weights sum to zero")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PETALS: &str = r#"[
        { "id": "basic", "name": "Basic", "rarity": "common", "damage": 10, "health": 10, "reload": 2, "radius": 10 }
    ]"#;
    const MOBS: &str = r#"[
        { "id": "ladybug", "name": "Ladybug", "rarity": "common", "health": 50, "damage": 10,
          "radius": 20, "speed": 50, "ai": "passive", "drops": [{ "petal": "basic", "chance": 0.5 }] }
    ]"#;
    const ZONES: &str = r#"[
        { "name": "garden", "x": 0, "y": 0, "width": 500, "height": 500, "density": 0.01,
          "spawns": [{ "mob": "ladybug", "weight": 1 }],
          "specials": [{ "name": "swarm", "spawns": [{ "mob": "ladybug", "weight": 1 }],
                         "interval": { "min": 10, "max": 20 } }] }
    ]"#;
    const WORLD: &str = r#"{ "width": 500, "height": 500, "spawn_zone": "garden", "starting_loadout": ["basic"] }"#;

    #[test]
    fn test_builtin_content_valid() {
        let content = Content::builtin().unwrap();
        assert!(!content.petals.is_empty());
        assert!(!content.mobs.is_empty());
        assert!(content.zone(&content.world.spawn_zone).is_ok());
    }

    #[test]
    fn test_from_json() {
        let content = Content::from_json(PETALS, MOBS, ZONES, WORLD).unwrap();
        assert_eq!(content.starting_loadout().unwrap()[0].def, "basic");
        assert_eq!(
            content.zones[0].specials[0].interval,
            SpawnInterval::Range {
                min: 10.0,
                max: 20.0
            }
        );
    }

    #[test]
    fn test_fixed_interval_parses() {
        let zones = ZONES.replace(r#"{ "min": 10, "max": 20 }"#, "30");
        let content = Content::from_json(PETALS, MOBS, &zones, WORLD).unwrap();
        assert_eq!(content.zones[0].specials[0].interval, SpawnInterval::Fixed(30.0));
    }

    #[test]
    fn test_unknown_mob_reference() {
        let zones = ZONES.replacen("\"mob\": \"ladybug\"", "\"mob\": \"dragon\"", 1);
        assert!(matches!(
            Content::from_json(PETALS, MOBS, &zones, WORLD),
            Err(CoreError::UnknownMob(_))
        ));
    }

    #[test]
    fn test_unknown_spawn_zone() {
        let world = WORLD.replace("garden", "desert");
        assert!(matches!(
            Content::from_json(PETALS, MOBS, ZONES, &world),
            Err(CoreError::UnknownZone(_))
        ));
    }

    #[test]
    fn test_behavior_without_params_rejected() {
        let petals = PETALS.replace("\"radius\": 10", "\"radius\": 10, \"behavior\": \"poison\"");
        assert!(matches!(
            Content::from_json(&petals, MOBS, ZONES, WORLD),
            Err(CoreError::MissingBehaviorData { .. })
        ));
    }

    #[test]
    fn test_bad_json_names_file() {
        let err = Content::from_json(PETALS, "not json", ZONES, WORLD).unwrap_err();
        match err {
            CoreError::Json { file, .. } => assert_eq!(file, "mobs.json"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_load_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("petals.json"), PETALS).unwrap();
        std::fs::write(dir.path().join("mobs.json"), MOBS).unwrap();
        std::fs::write(dir.path().join("zones.json"), ZONES).unwrap();
        std::fs::write(dir.path().join("world.json"), WORLD).unwrap();
        let content = Content::load_dir(dir.path()).unwrap();
        assert_eq!(content.mobs.len(), 1);
    }

    #[test]
    fn test_load_dir_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(Content::load_dir(dir.path()), Err(CoreError::Io(_))));
    }

    #[test]
    fn test_rarity_order() {
        assert!(Rarity::Common < Rarity::Unusual);
        assert!(Rarity::Mythic < Rarity::Ultra);
        assert!(Rarity::Ultra.stat_multiplier() > Rarity::Common.stat_multiplier());
    }
}
