//! Movement integration for players and mobs.
//!
//! Intent plus knockback moves the body, walls push it back out, the world
//! edge clamps it and locked zones refuse entry per axis. Petals are steered
//! directly by the tick and skip all of this.

use super::World;
use crate::constants::{FRICTION, REFERENCE_DT, SEPARATION_FORCE};
use crate::entity::{Entity, EntityKind};
use crate::leveling::zone_unlocked;
use crate::math::{per_tick_factor, Hitbox, Vec2};
use crate::pool::EntityId;

impl World {
    /// Integrate one body over `dt`. Marks it partially dirty when it moved.
    pub(crate) fn apply_physics(&mut self, id: EntityId, dt: f32) {
        let Some(entity) = self.pool.get(id) else {
            return;
        };
        if !matches!(entity.kind(), EntityKind::Player | EntityKind::Mob) || !entity.is_alive() {
            return;
        }
        let radius = entity.radius();
        let start = entity.position;
        let level = entity.as_player().map(|p| p.level);
        let push = self.separation(entity);

        let Some(lively) = self.pool.get_mut(id).and_then(Entity::lively_mut) else {
            return;
        };
        lively.knockback += push;
        let mut next = start + (lively.intent + lively.knockback) * dt;
        lively.knockback *= per_tick_factor(FRICTION, dt, REFERENCE_DT);
        if lively.knockback.length_squared() < 1e-4 {
            lively.knockback = Vec2::ZERO;
        }

        next = self.resolve_walls(id, next, radius);
        next = self.clamp_to_bounds(next, radius);
        if let Some(level) = level {
            next = self.gate_zones(start, next, level);
        }

        let Some(entity) = self.pool.get_mut(id) else {
            return;
        };
        entity.position = next;
        if let Some(lively) = entity.lively_mut() {
            lively.velocity = if dt > 0.0 {
                (next - lively.prev_position) / dt
            } else {
                Vec2::ZERO
            };
            lively.prev_position = next;
        }
        if next != start {
            entity.dirty.mark_partial();
        }
    }

    /// Push between overlapping players and mobs, from the cached contacts
    fn separation(&self, entity: &Entity) -> Vec2 {
        let Some(lively) = entity.lively() else {
            return Vec2::ZERO;
        };
        let radius = entity.radius();
        lively
            .cached_collisions
            .iter()
            .filter_map(|&other| self.pool.get(other))
            .filter(|other| matches!(other.kind(), EntityKind::Player | EntityKind::Mob))
            .filter_map(|other| {
                let delta = entity.position - other.position;
                let dist = delta.length();
                let overlap = radius + other.radius() - dist;
                if overlap <= 0.0 {
                    return None;
                }
                let dir = if dist > f32::EPSILON { delta / dist } else { Vec2::X };
                Some(dir * overlap * SEPARATION_FORCE)
            })
            .sum()
    }

    fn resolve_walls(&self, id: EntityId, mut next: Vec2, radius: f32) -> Vec2 {
        let walls = self.grid.colliding_with(&Hitbox::circle(next, radius));
        for wall in walls {
            if wall == id || self.grid.kind_of(wall) != Some(EntityKind::Wall) {
                continue;
            }
            if let Some(push) = self
                .grid
                .hitbox_of(wall)
                .and_then(|hitbox| hitbox.push_out_circle(next, radius))
            {
                next += push;
            }
        }
        next
    }

    fn clamp_to_bounds(&self, point: Vec2, radius: f32) -> Vec2 {
        let min = self.bounds.min + Vec2::splat(radius);
        let max = self.bounds.max - Vec2::splat(radius);
        if min.x > max.x || min.y > max.y {
            return self.bounds.center();
        }
        point.clamp(min, max)
    }

    /// Cancel movement into zones the player's level has not unlocked, one
    /// axis at a time so the player can still slide along the border
    fn gate_zones(&self, start: Vec2, next: Vec2, level: u32) -> Vec2 {
        if !self.is_locked(next, level) {
            return next;
        }
        let slide_x = Vec2::new(next.x, start.y);
        if !self.is_locked(slide_x, level) {
            return slide_x;
        }
        let slide_y = Vec2::new(start.x, next.y);
        if !self.is_locked(slide_y, level) {
            return slide_y;
        }
        start
    }

    fn is_locked(&self, point: Vec2, level: u32) -> bool {
        self.zones
            .iter()
            .any(|zone| !zone_unlocked(zone, level) && zone.contains(point))
    }
}
