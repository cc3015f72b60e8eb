//! Mob bodies and their steering AI.
//!
//! Passive mobs only wander. Neutral mobs wander until hurt, then chase
//! whoever hurt them. Aggressive mobs also pick up the nearest player inside
//! their aggro radius. Every chase ends when the target dies or gets further
//! than `AGGRO_LEASH_MULT` aggro radii away.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::f32::consts::TAU;

use super::lively::{Lively, Team};
use crate::constants::{AGGRO_LEASH_MULT, DEFAULT_AGGRO_RADIUS, WANDER_SPEED_MULT, WANDER_TURN_CHANCE};
use crate::content::{MobDef, MobDrop, Rarity};
use crate::math::{angle_to_vec, Vec2};
use crate::pool::EntityId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MobAiKind {
    Passive,
    Neutral,
    Aggressive,
}

#[derive(Debug, Clone)]
pub struct Mob {
    pub lively: Lively,
    pub def: String,
    pub rarity: Rarity,
    pub ai: MobAiKind,
    pub speed: f32,
    pub aggro_radius: f32,
    pub target: Option<EntityId>,
    pub wander_heading: f32,
    pub exp_reward: u64,
    pub drops: Vec<MobDrop>,
    /// Player credited with the most recent hit
    pub last_attacker: Option<EntityId>,
}

impl Mob {
    pub fn from_def(def: &MobDef, position: Vec2, wander_heading: f32) -> Self {
        let aggro_radius = if def.aggro_radius > 0.0 {
            def.aggro_radius
        } else {
            DEFAULT_AGGRO_RADIUS
        };
        Self {
            lively: Lively::new(def.health, Team::Mobs, def.damage, position),
            def: def.id.clone(),
            rarity: def.rarity,
            ai: def.ai,
            speed: def.speed,
            aggro_radius,
            target: None,
            wander_heading,
            exp_reward: def.exp,
            drops: def.drops.clone(),
            last_attacker: None,
        }
    }

    pub fn leash_distance(&self) -> f32 {
        self.aggro_radius * AGGRO_LEASH_MULT
    }

    /// Record a hit credited to `attacker`; non-passive mobs retaliate
    pub fn on_damaged(&mut self, attacker: Option<EntityId>) {
        let Some(attacker) = attacker else {
            return;
        };
        self.last_attacker = Some(attacker);
        if self.ai != MobAiKind::Passive && self.target.is_none() {
            self.target = Some(attacker);
        }
    }

    /// Whether the world should look for a nearby player this tick
    pub fn seeks_target(&self) -> bool {
        self.ai == MobAiKind::Aggressive && self.target.is_none()
    }

    /// Pick a steering velocity. `target_position` is where the current
    /// target is (None if it no longer exists); `nearest_player` is offered
    /// to mobs that seek targets.
    pub fn think<R: Rng + ?Sized>(
        &mut self,
        position: Vec2,
        target_position: Option<Vec2>,
        nearest_player: Option<(EntityId, Vec2)>,
        rng: &mut R,
    ) {
        let mut chase = None;
        if self.target.is_some() {
            match target_position {
                Some(at) if at.distance(position) <= self.leash_distance() => chase = Some(at),
                _ => self.target = None,
            }
        }
        if chase.is_none() && self.seeks_target() {
            if let Some((id, at)) = nearest_player {
                if at.distance(position) <= self.aggro_radius {
                    self.target = Some(id);
                    chase = Some(at);
                }
            }
        }

        self.lively.intent = match chase {
            Some(at) => (at - position).normalize_or_zero() * self.speed,
            None => {
                if rng.gen_bool(WANDER_TURN_CHANCE) {
                    self.wander_heading = rng.gen_range(0.0..TAU);
                }
                angle_to_vec(self.wander_heading) * self.speed * WANDER_SPEED_MULT
            }
        };
    }
}
