//! Zones and the mob spawning scheduler.
//!
//! A zone is a named rectangle with a density-derived mob cap, a weighted
//! spawn table for normal spawning, and any number of special spawn timers
//! that ignore the cap but never fire while their previous mob lives.

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;

use crate::config::MobCountMode;
use crate::constants::{AREA_DIVISOR, DENSITY_DIVISOR, SAFE_SPAWN_ATTEMPTS, SAFE_SPAWN_PADDING};
use crate::content::{SpawnInterval, SpawnWeight, SpecialSpawnDef, ZoneDef};
use crate::entity::EntityKind;
use crate::grid::SpatialGrid;
use crate::math::{Aabb, Hitbox, Vec2};
use crate::pool::EntityId;

// ============================================================================
// Weighted tables
// ============================================================================

/// Mob ids with a prebuilt weighted sampler
#[derive(Debug, Clone)]
pub struct WeightTable {
    mobs: Vec<String>,
    index: Option<WeightedIndex<f32>>,
}

impl WeightTable {
    pub fn new(entries: &[SpawnWeight]) -> Self {
        let index = if entries.is_empty() {
            None
        } else {
            WeightedIndex::new(entries.iter().map(|e| e.weight.max(0.0))).ok()
        };
        Self {
            mobs: entries.iter().map(|e| e.mob.clone()).collect(),
            index,
        }
    }

    /// One weighted draw; `None` for an empty table
    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&str> {
        let index = self.index.as_ref()?;
        self.mobs.get(index.sample(rng)).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_none()
    }
}

// ============================================================================
// Special spawns
// ============================================================================

#[derive(Debug, Clone)]
pub struct SpecialSpawnTimer {
    pub name: String,
    pub interval: SpawnInterval,
    pub elapsed: f32,
    pub next_trigger: f32,
    /// Mob from the last trigger; checked against the pool, never owned
    pub spawned: Option<EntityId>,
    table: WeightTable,
}

impl SpecialSpawnTimer {
    pub fn new<R: Rng + ?Sized>(def: &SpecialSpawnDef, rng: &mut R) -> Self {
        Self {
            name: def.name.clone(),
            interval: def.interval,
            elapsed: 0.0,
            next_trigger: roll_interval(def.interval, rng),
            spawned: None,
            table: WeightTable::new(&def.spawns),
        }
    }
}

/// Fixed intervals are reused; ranges are re-rolled uniformly
pub fn roll_interval<R: Rng + ?Sized>(interval: SpawnInterval, rng: &mut R) -> f32 {
    match interval {
        SpawnInterval::Fixed(secs) => secs,
        SpawnInterval::Range { min, max } if max > min => rng.gen_range(min..=max),
        SpawnInterval::Range { min, .. } => min,
    }
}

/// A special timer that fired this tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecialTrigger {
    pub timer: usize,
    pub name: String,
    pub mob: String,
}

// ============================================================================
// Zone
// ============================================================================

/// Result of a safe-position search
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnPoint {
    pub position: Vec2,
    pub attempts: u32,
    /// False when every attempt collided and the last sample was accepted
    pub clear: bool,
}

#[derive(Debug, Clone)]
pub struct Zone {
    pub name: String,
    pub rect: Aabb,
    pub density: f32,
    pub min_level: u32,
    pub specials: Vec<SpecialSpawnTimer>,
    spawns: WeightTable,
}

impl Zone {
    pub fn from_def<R: Rng + ?Sized>(def: &ZoneDef, rng: &mut R) -> Self {
        Self {
            name: def.name.clone(),
            rect: Aabb::new(
                Vec2::new(def.x, def.y),
                Vec2::new(def.x + def.width, def.y + def.height),
            ),
            density: def.density,
            min_level: def.min_level,
            specials: def.specials.iter().map(|s| SpecialSpawnTimer::new(s, rng)).collect(),
            spawns: WeightTable::new(&def.spawns),
        }
    }

    pub fn hitbox(&self) -> Hitbox {
        Hitbox::rect(self.rect.min, self.rect.max)
    }

    pub fn contains(&self, point: Vec2) -> bool {
        self.rect.contains_point(point)
    }

    pub fn width(&self) -> f32 {
        self.rect.width()
    }

    pub fn height(&self) -> f32 {
        self.rect.height()
    }

    /// `density / 15 * width * height / 20 / lag_downer`
    pub fn max_mob_count(&self, lag_downer: f32) -> f32 {
        // Multiply before dividing; whole caps must stay exact in f32
        (self.density * self.width() * self.height()) / (DENSITY_DIVISOR * AREA_DIVISOR * lag_downer)
    }

    /// Entities counted against the mob cap
    pub fn count_entity(&self, grid: &SpatialGrid, mode: MobCountMode) -> usize {
        match mode {
            MobCountMode::MobsOnly => grid.count_in(&self.hitbox(), EntityKind::Mob),
            MobCountMode::AllEntities => grid.colliding_with(&self.hitbox()).len(),
        }
    }

    pub fn at_capacity(&self, grid: &SpatialGrid, mode: MobCountMode, lag_downer: f32) -> bool {
        self.count_entity(grid, mode) as f32 >= self.max_mob_count(lag_downer)
    }

    /// Draw the mob for this tick's normal spawn
    pub fn pick_spawn<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&str> {
        self.spawns.pick(rng)
    }

    /// Sample up to `SAFE_SPAWN_ATTEMPTS` points and return the first whose
    /// padded probe circle touches nothing. After that the last sample is
    /// accepted as is. Samples stay `radius` away from the edges when the
    /// zone is large enough.
    pub fn random_safe_position<R: Rng + ?Sized>(
        &self,
        radius: f32,
        grid: &SpatialGrid,
        rng: &mut R,
    ) -> SpawnPoint {
        let radius = radius.max(0.0);
        let inset = Vec2::new(
            if self.width() > 2.0 * radius { radius } else { 0.0 },
            if self.height() > 2.0 * radius { radius } else { 0.0 },
        );
        let lo = self.rect.min + inset;
        let hi = self.rect.max - inset;
        let probe_radius = radius + SAFE_SPAWN_PADDING;

        let mut last = self.rect.center();
        for attempt in 1..=SAFE_SPAWN_ATTEMPTS {
            let point = Vec2::new(sample(lo.x, hi.x, rng), sample(lo.y, hi.y, rng));
            last = point;
            if grid.colliding_with(&Hitbox::circle(point, probe_radius)).is_empty() {
                return SpawnPoint {
                    position: point,
                    attempts: attempt,
                    clear: true,
                };
            }
        }
        tracing::trace!(zone = %self.name, radius, "No clear spawn point, using last sample");
        SpawnPoint {
            position: last,
            attempts: SAFE_SPAWN_ATTEMPTS,
            clear: false,
        }
    }

    /// Advance special timers by `dt`. A timer whose mob is still alive keeps
    /// accumulating but does not fire. Fired timers reset and re-roll.
    pub fn tick_specials<R, F>(&mut self, dt: f32, is_alive: F, rng: &mut R) -> Vec<SpecialTrigger>
    where
        R: Rng + ?Sized,
        F: Fn(EntityId) -> bool,
    {
        let mut fired = Vec::new();
        for (index, timer) in self.specials.iter_mut().enumerate() {
            timer.elapsed += dt;
            if let Some(id) = timer.spawned {
                if is_alive(id) {
                    continue;
                }
                timer.spawned = None;
            }
            if timer.elapsed < timer.next_trigger {
                continue;
            }
            let Some(mob) = timer.table.pick(rng) else {
                continue;
            };
            fired.push(SpecialTrigger {
                timer: index,
                name: timer.name.clone(),
                mob: mob.to_string(),
            });
            timer.elapsed = 0.0;
            timer.next_trigger = roll_interval(timer.interval, rng);
        }
        fired
    }

    /// Remember the mob a trigger produced so the timer waits for its death
    pub fn record_special(&mut self, timer: usize, id: EntityId) {
        if let Some(timer) = self.specials.get_mut(timer) {
            timer.spawned = Some(id);
        }
    }
}

fn sample<R: Rng + ?Sized>(lo: f32, hi: f32, rng: &mut R) -> f32 {
    if hi > lo {
        rng.gen_range(lo..hi)
    } else {
        lo
    }
}
