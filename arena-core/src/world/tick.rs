//! The fixed-order world tick.
//!
//! Ordering:
//! 1. queued client packets are applied
//! 2. the grid is rebuilt from every pooled entity
//! 3. each lively entity caches its exact collisions once
//! 4. entities tick over a snapshot of ids, then physics runs for each
//! 5. dirty flags fold into dirty sets and the state cache is refreshed
//! 6. every client gets a visibility-scoped snapshot
//! 7. flags are cleared, freed ids recycled and the spawners run

use std::collections::BTreeSet;

use super::{World, WorldEvent};
use crate::constants::MAX_TICK_DT;
use crate::entity::{Entity, EntityBody, EntityKind};
use crate::math::{Hitbox, Vec2};
use crate::pool::EntityId;
use crate::snapshot::{ClientId, DirtySets, SelfState, ServerPacket, Snapshot};

/// Everything a tick produced for the runner
#[derive(Debug, Default)]
pub struct TickOutput {
    pub tick: u64,
    /// Outbound packets in send order, per client
    pub packets: Vec<(ClientId, ServerPacket)>,
    /// Dirty sets as they were when snapshots were built
    pub dirty: DirtySets,
    pub events: Vec<WorldEvent>,
    pub spawned: usize,
    pub removed: usize,
    /// Inbound packets refused this tick
    pub dropped: usize,
    pub entities: usize,
}

impl World {
    /// Advance the world by `dt` seconds
    pub fn tick(&mut self, dt: f32) -> TickOutput {
        let inbound: Vec<_> = self.inbound.drain(..).collect();
        for (client, packet) in inbound {
            self.apply_packet(client, packet);
        }

        let dt = if dt.is_finite() {
            dt.clamp(0.0, MAX_TICK_DT)
        } else {
            0.0
        };
        self.uptime += f64::from(dt);

        self.rebuild_grid();
        self.cache_collisions();

        let ids = self.pool.ids();
        for &id in &ids {
            let Some(kind) = self.pool.get(id).map(Entity::kind) else {
                continue;
            };
            match kind {
                EntityKind::Player => self.tick_player(id, dt),
                EntityKind::Petal => self.tick_petal(id, dt),
                EntityKind::Mob => self.tick_mob(id),
                EntityKind::Loot => self.tick_loot(id, dt),
                EntityKind::Wall => {}
            }
            if self.pool.get(id).is_some_and(Entity::is_alive) {
                self.tick_status(id, dt);
                self.resolve_contacts(id);
            }
        }
        for &id in &ids {
            self.apply_physics(id, dt);
        }
        self.rebuild_grid();

        self.dirty = DirtySets::collect(&self.pool);
        self.cache.refresh(&self.pool, &self.dirty);

        let packets = self.build_snapshots();

        let output = TickOutput {
            tick: self.tick_count,
            packets,
            dirty: std::mem::take(&mut self.dirty),
            events: std::mem::take(&mut self.events),
            spawned: std::mem::take(&mut self.spawned_this_tick),
            removed: std::mem::take(&mut self.removed_this_tick),
            dropped: std::mem::take(&mut self.dropped_this_tick),
            entities: self.pool.len(),
        };

        for (_, entity) in self.pool.iter_mut() {
            entity.dirty.clear();
        }
        self.cache.clear();
        self.ids.recycle();
        self.run_spawners(dt);

        self.tick_count += 1;
        output
    }

    // ========================================================================
    // Grid
    // ========================================================================

    fn rebuild_grid(&mut self) {
        let World { pool, grid, .. } = self;
        grid.reset();
        for (id, entity) in pool.iter() {
            grid.update_entity(id, entity.kind(), entity.hitbox());
        }
    }

    fn cache_collisions(&mut self) {
        let World { pool, grid, .. } = self;
        for (id, entity) in pool.iter_mut() {
            let hitbox = entity.hitbox();
            if let Some(lively) = entity.lively_mut() {
                let mut hits = grid.colliding_with(&hitbox);
                hits.remove(&id);
                lively.cached_collisions = hits;
            }
        }
    }

    // ========================================================================
    // Per-kind ticks
    // ========================================================================

    fn tick_player(&mut self, id: EntityId, dt: f32) {
        let ready = {
            let Some(player) = self.pool.get_mut(id).and_then(Entity::as_player_mut) else {
                return;
            };
            player.advance_orbit(dt);
            player.lively.intent = player.desired_velocity();
            player.tick_slots(dt)
        };
        for slot in ready {
            if let Err(e) = self.spawn_petal(id, slot) {
                tracing::warn!(player = id.0, slot, error = %e, "Failed to spawn petal");
            }
        }
        self.pick_up_loot(id);
    }

    fn pick_up_loot(&mut self, id: EntityId) {
        let Some(touching) = self.pool.get(id).and_then(Entity::lively).map(|l| {
            l.cached_collisions
                .iter()
                .copied()
                .filter(|&other| self.grid.kind_of(other) == Some(EntityKind::Loot))
                .collect::<Vec<_>>()
        }) else {
            return;
        };
        for loot in touching {
            let Some(item) = self.pool.get(loot).and_then(Entity::as_loot).map(|l| l.item.clone()) else {
                continue;
            };
            let Some(player) = self.pool.get_mut(id).and_then(Entity::as_player_mut) else {
                return;
            };
            if !player.pick_up(item) {
                return;
            }
            self.destroy(loot);
        }
    }

    fn tick_petal(&mut self, id: EntityId, dt: f32) {
        let Some((owner, slot)) = self
            .pool
            .get(id)
            .and_then(Entity::as_petal)
            .map(|p| (p.owner, p.slot))
        else {
            return;
        };
        let anchor = self.pool.get(owner).and_then(|entity| {
            let player = entity.as_player()?;
            (player.slots.get(slot)?.entity == Some(id))
                .then(|| player.orbit_position(slot, entity.position))
        });
        let Some(target) = anchor else {
            tracing::trace!(petal = id.0, owner = owner.0, "Orphaned petal removed");
            self.destroy(id);
            return;
        };

        let Some(entity) = self.pool.get_mut(id) else {
            return;
        };
        let Entity {
            position,
            dirty,
            body,
            ..
        } = entity;
        let EntityBody::Petal(petal) = body else {
            return;
        };
        petal.orbit_target = target;
        let next = petal.steer(*position, dt);
        petal.lively.velocity = if dt > 0.0 {
            (next - *position) / dt
        } else {
            Vec2::ZERO
        };
        petal.lively.prev_position = *position;
        if next != *position {
            *position = next;
            dirty.mark_partial();
        }
    }

    fn tick_mob(&mut self, id: EntityId) {
        let Some(entity) = self.pool.get(id) else {
            return;
        };
        let Some(mob) = entity.as_mob() else {
            return;
        };
        let position = entity.position;
        let target_position = mob
            .target
            .and_then(|t| self.pool.get(t))
            .filter(|t| t.is_alive())
            .map(|t| t.position);
        let nearest = if mob.seeks_target() {
            self.nearest_player(position, mob.aggro_radius)
        } else {
            None
        };

        let World { pool, rng, .. } = self;
        if let Some(mob) = pool.get_mut(id).and_then(Entity::as_mob_mut) {
            mob.think(position, target_position, nearest, rng);
        }
    }

    /// Closest live player within `radius` of `position`
    fn nearest_player(&self, position: Vec2, radius: f32) -> Option<(EntityId, Vec2)> {
        self.grid
            .colliding_with(&Hitbox::circle(position, radius))
            .into_iter()
            .filter(|&id| self.grid.kind_of(id) == Some(EntityKind::Player))
            .filter_map(|id| self.pool.get(id))
            .filter(|e| e.is_alive())
            .map(|e| (e.id, e.position))
            .min_by(|a, b| {
                a.1.distance_squared(position)
                    .total_cmp(&b.1.distance_squared(position))
            })
    }

    fn tick_loot(&mut self, id: EntityId, dt: f32) {
        let expired = self
            .pool
            .get_mut(id)
            .and_then(Entity::as_loot_mut)
            .is_some_and(|loot| loot.tick(dt));
        if expired {
            self.destroy(id);
        }
    }

    // ========================================================================
    // Snapshots
    // ========================================================================

    fn build_snapshots(&mut self) -> Vec<(ClientId, ServerPacket)> {
        let World {
            clients,
            pool,
            grid,
            cache,
            dirty,
            config,
            tick_count,
            ..
        } = self;
        let half = Vec2::new(config.view_width, config.view_height) / 2.0;
        let mut packets = Vec::new();

        for (&client, state) in clients.iter_mut() {
            packets.extend(state.outbox.drain(..).map(|packet| (client, packet)));
            if !state.joined() {
                continue;
            }

            let player = state.player.and_then(|id| pool.get(id));
            if let Some(player) = player {
                state.camera = player.position;
            }
            let view = Hitbox::rect(state.camera - half, state.camera + half);
            let mut visible: BTreeSet<EntityId> = grid.colliding_with(&view);
            if let Some(player) = player {
                visible.insert(player.id);
            }

            let mut snapshot = Snapshot {
                tick: *tick_count,
                ..Snapshot::default()
            };
            for &id in &visible {
                if !state.known.contains(&id) || dirty.is_full(id) {
                    snapshot.creates.extend(cache.full(id, pool));
                } else if dirty.is_partial(id) {
                    snapshot.updates.extend(cache.partial(id));
                }
            }
            snapshot.removes = state.known.difference(&visible).copied().collect();
            state.known = visible;
            snapshot.self_state = player.and_then(SelfState::of);
            snapshot.messages = std::mem::take(&mut state.messages);
            packets.push((client, ServerPacket::Snapshot(snapshot)));
        }
        packets
    }

    // ========================================================================
    // Spawning
    // ========================================================================

    fn run_spawners(&mut self, dt: f32) {
        let mode = self.config.mob_count_mode;
        let lag_downer = self.config.effective_lag_downer();

        for index in 0..self.zones.len() {
            let pick = {
                let World { zones, grid, rng, .. } = self;
                let zone = &zones[index];
                zone.pick_spawn(rng).map(str::to_string).filter(|mob| {
                    let full = zone.at_capacity(grid, mode, lag_downer);
                    if full {
                        tracing::trace!(zone = %zone.name, mob = %mob, "Zone at capacity, skipping spawn");
                    }
                    !full
                })
            };
            if let Some(mob) = pick {
                if let Err(e) = self.spawn_mob_in_zone(index, &mob) {
                    tracing::warn!(mob = %mob, error = %e, "Failed to spawn mob");
                }
            }

            let triggers = {
                let World { zones, pool, rng, .. } = self;
                zones[index].tick_specials(dt, |id| pool.get(id).is_some_and(Entity::is_alive), rng)
            };
            for trigger in triggers {
                match self.spawn_mob_in_zone(index, &trigger.mob) {
                    Ok(id) => {
                        let zone = &mut self.zones[index];
                        zone.record_special(trigger.timer, id);
                        tracing::info!(
                            zone = %zone.name,
                            special = %trigger.name,
                            mob = %trigger.mob,
                            entity = id.0,
                            "Special spawn"
                        );
                        self.events.push(WorldEvent::SpecialSpawned {
                            zone: zone.name.clone(),
                            special: trigger.name,
                            mob: id,
                        });
                    }
                    Err(e) => {
                        tracing::warn!(special = %trigger.name, error = %e, "Failed to spawn special")
                    }
                }
            }
        }
    }
}
