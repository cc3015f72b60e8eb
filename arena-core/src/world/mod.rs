//! The authoritative world of one game instance.
//!
//! A `World` owns the entity pool, the spatial grid, the zones and the
//! per-client view state. Everything happens inside [`World::tick`]; inbound
//! packets are queued with [`World::queue_packet`] and applied at the start of
//! the next tick.

mod combat;
mod physics;
mod tick;

pub use tick::TickOutput;

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::f32::consts::TAU;
use std::sync::Arc;

use crate::config::WorldConfig;
use crate::constants::{LOOT_RADIUS, MAX_CHAT_LEN, MAX_NAME_LEN, PLAYER_RADIUS};
use crate::content::Content;
use crate::entity::{
    Entity, EntityBody, EntityKind, Loot, Mob, Petal, PetalItem, Player, Team, Wall,
};
use crate::error::{CoreError, CoreResult};
use crate::grid::SpatialGrid;
use crate::math::{angle_to_vec, Aabb, Shape, Vec2};
use crate::pool::{EntityId, EntityPool, IdAllocator};
use crate::snapshot::{ChatMessage, ClientId, ClientPacket, DirtySets, ServerPacket, StateCache};
use crate::zone::Zone;

/// View and session state of one connection
#[derive(Debug, Clone)]
pub struct ClientState {
    pub id: ClientId,
    /// Set by `Join`; gameplay packets before that are dropped
    pub name: Option<String>,
    pub player: Option<EntityId>,
    pub camera: Vec2,
    /// Entities this client currently has a copy of
    pub known: BTreeSet<EntityId>,
    pub messages: Vec<ChatMessage>,
    pub outbox: Vec<ServerPacket>,
}

impl ClientState {
    fn new(id: ClientId, camera: Vec2) -> Self {
        Self {
            id,
            name: None,
            player: None,
            camera,
            known: BTreeSet::new(),
            messages: Vec::new(),
            outbox: Vec::new(),
        }
    }

    pub fn joined(&self) -> bool {
        self.name.is_some()
    }
}

/// Notable things that happened during a tick
#[derive(Debug, Clone, PartialEq)]
pub enum WorldEvent {
    PlayerJoined { client: ClientId, name: String },
    PlayerDied { client: ClientId, killer: Option<String> },
    SpecialSpawned { zone: String, special: String, mob: EntityId },
}

pub struct World {
    config: WorldConfig,
    content: Arc<Content>,
    bounds: Aabb,
    pool: EntityPool<Entity>,
    ids: IdAllocator,
    grid: SpatialGrid,
    zones: Vec<Zone>,
    clients: BTreeMap<ClientId, ClientState>,
    inbound: VecDeque<(ClientId, ClientPacket)>,
    dirty: DirtySets,
    cache: StateCache,
    rng: Xoshiro256PlusPlus,
    events: Vec<WorldEvent>,
    tick_count: u64,
    uptime: f64,
    spawned_this_tick: usize,
    removed_this_tick: usize,
    dropped_this_tick: usize,
}

impl World {
    pub fn new(content: Arc<Content>, config: WorldConfig) -> CoreResult<Self> {
        let grid = SpatialGrid::new(content.world.width, content.world.height)?;
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(config.seed);
        let zones = content.zones.iter().map(|def| Zone::from_def(def, &mut rng)).collect();
        let mut world = Self {
            bounds: grid.bounds(),
            config,
            pool: EntityPool::new(),
            ids: IdAllocator::new(),
            grid,
            zones,
            clients: BTreeMap::new(),
            inbound: VecDeque::new(),
            dirty: DirtySets::default(),
            cache: StateCache::default(),
            rng,
            events: Vec::new(),
            tick_count: 0,
            uptime: 0.0,
            spawned_this_tick: 0,
            removed_this_tick: 0,
            dropped_this_tick: 0,
            content,
        };
        let walls = world.content.world.walls.clone();
        for def in &walls {
            let id = world.ids.allocate();
            world.insert(Wall::entity(id, def));
        }
        tracing::info!(
            zones = world.zones.len(),
            walls = walls.len(),
            width = world.bounds.width(),
            height = world.bounds.height(),
            "World created"
        );
        Ok(world)
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn content(&self) -> &Arc<Content> {
        &self.content
    }

    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    pub fn pool(&self) -> &EntityPool<Entity> {
        &self.pool
    }

    pub fn grid(&self) -> &SpatialGrid {
        &self.grid
    }

    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    pub fn zone(&self, name: &str) -> Option<&Zone> {
        self.zones.iter().find(|z| z.name == name)
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.pool.get(id)
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.pool.get_mut(id)
    }

    pub fn client(&self, id: ClientId) -> Option<&ClientState> {
        self.clients.get(&id)
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn uptime(&self) -> f64 {
        self.uptime
    }

    /// Connected clients that have joined
    pub fn player_count(&self) -> usize {
        self.clients.values().filter(|c| c.joined()).count()
    }

    /// Live ids of one kind, in id order
    pub fn ids_of_kind(&self, kind: EntityKind) -> Vec<EntityId> {
        self.pool
            .iter()
            .filter(|(_, e)| e.kind() == kind)
            .map(|(id, _)| id)
            .collect()
    }

    /// Entities counted against a zone's mob cap right now
    pub fn zone_count(&self, zone: &str) -> Option<usize> {
        self.zone(zone)
            .map(|z| z.count_entity(&self.grid, self.config.mob_count_mode))
    }

    // ========================================================================
    // Clients
    // ========================================================================

    /// Register a connection; its `Welcome` goes out with the next tick
    pub fn connect(&mut self, client: ClientId) {
        let spawn = self
            .zones
            .iter()
            .find(|z| z.name == self.content.world.spawn_zone)
            .map_or(self.bounds.center(), |z| z.rect.center());
        let mut state = ClientState::new(client, spawn);
        state.outbox.push(ServerPacket::Welcome {
            client,
            world_width: self.bounds.width(),
            world_height: self.bounds.height(),
        });
        self.clients.insert(client, state);
    }

    /// Drop a connection and its player. Unknown clients are ignored.
    pub fn disconnect(&mut self, client: ClientId) {
        let Some(state) = self.clients.remove(&client) else {
            return;
        };
        if let Some(player) = state.player {
            self.destroy(player);
        }
        if let Some(name) = state.name {
            tracing::info!(client = client.0, name = %name, "Player left");
        }
    }

    /// Queue a packet for the next tick boundary
    pub fn queue_packet(&mut self, client: ClientId, packet: ClientPacket) {
        self.inbound.push_back((client, packet));
    }

    fn apply_packet(&mut self, client: ClientId, packet: ClientPacket) {
        let Some(state) = self.clients.get(&client) else {
            self.dropped_this_tick += 1;
            return;
        };
        if !state.joined() && !matches!(packet, ClientPacket::Join { .. }) {
            tracing::debug!(client = client.0, "Dropping gameplay packet before join");
            self.dropped_this_tick += 1;
            return;
        }
        let player = state.player;

        match packet {
            ClientPacket::Join { name } => {
                if state.joined() {
                    self.dropped_this_tick += 1;
                    return;
                }
                let name = sanitize_name(&name);
                if let Some(state) = self.clients.get_mut(&client) {
                    state.name = Some(name.clone());
                }
                match self.spawn_player(client) {
                    Ok(id) => {
                        tracing::info!(client = client.0, name = %name, entity = id.0, "Player joined");
                        self.events.push(WorldEvent::PlayerJoined { client, name });
                    }
                    Err(e) => tracing::error!(client = client.0, error = %e, "Failed to spawn player"),
                }
            }
            ClientPacket::Input {
                movement,
                attack,
                defend,
            } => {
                let accepted = player
                    .and_then(|id| self.pool.get_mut(id))
                    .and_then(Entity::as_player_mut)
                    .map(|p| p.set_input(movement, attack, defend));
                if accepted == Some(false) {
                    self.dropped_this_tick += 1;
                }
            }
            ClientPacket::SwapPetal {
                slot,
                inventory_index,
            } => {
                let outcome = player
                    .and_then(|id| self.pool.get_mut(id))
                    .and_then(Entity::as_player_mut)
                    .and_then(|p| p.swap_petal(slot as usize, inventory_index as usize));
                if let Some(despawn) = outcome.and_then(|o| o.despawn) {
                    self.destroy(despawn);
                }
            }
            ClientPacket::Chat { text } => {
                let text: String = text.trim().chars().take(MAX_CHAT_LEN).collect();
                if text.is_empty() {
                    return;
                }
                let from = self.clients.get(&client).and_then(|c| c.name.clone());
                self.broadcast(ChatMessage { from, text });
            }
            ClientPacket::Respawn => {
                if player.is_none() {
                    if let Err(e) = self.spawn_player(client) {
                        tracing::error!(client = client.0, error = %e, "Failed to respawn player");
                    }
                }
            }
        }
    }

    /// Queue a message for every joined client
    pub fn broadcast(&mut self, message: ChatMessage) {
        for state in self.clients.values_mut().filter(|c| c.joined()) {
            state.messages.push(message.clone());
        }
    }

    // ========================================================================
    // Spawning
    // ========================================================================

    fn insert(&mut self, entity: Entity) -> EntityId {
        let id = entity.id;
        self.grid.add_entity(id, entity.kind(), entity.hitbox());
        self.pool.insert(id, entity);
        self.spawned_this_tick += 1;
        id
    }

    /// Spawn (or respawn) the player of a joined client in the spawn zone
    pub fn spawn_player(&mut self, client: ClientId) -> CoreResult<EntityId> {
        let name = self
            .clients
            .get(&client)
            .and_then(|c| c.name.clone())
            .ok_or_else(|| CoreError::InvalidContent(format!("client {} has not joined", client.0)))?;
        let spawn_zone = &self.content.world.spawn_zone;
        let zone = self
            .zones
            .iter()
            .find(|z| &z.name == spawn_zone)
            .ok_or_else(|| CoreError::UnknownZone(spawn_zone.clone()))?;
        let point = zone.random_safe_position(PLAYER_RADIUS, &self.grid, &mut self.rng);
        let loadout = self.content.starting_loadout()?;

        let id = self.ids.allocate();
        let team = if self.config.pvp {
            Team::Player(id)
        } else {
            Team::Players
        };
        let player = Player::new(client, name, loadout, team, point.position);
        self.insert(Entity::new(
            id,
            point.position,
            Shape::Circle {
                radius: PLAYER_RADIUS,
            },
            EntityBody::Player(Box::new(player)),
        ));
        if let Some(state) = self.clients.get_mut(&client) {
            state.player = Some(id);
            state.camera = point.position;
        }
        Ok(id)
    }

    /// Spawn a mob from its definition at `position`
    pub fn spawn_mob(&mut self, mob: &str, position: Vec2) -> CoreResult<EntityId> {
        let def = self.content.mob(mob)?;
        let heading = self.rng.gen_range(0.0..TAU);
        let body = Mob::from_def(def, position, heading);
        let shape = Shape::Circle { radius: def.radius };
        let id = self.ids.allocate();
        Ok(self.insert(Entity::new(id, position, shape, EntityBody::Mob(body))))
    }

    /// Spawn one mob from a zone's table at a safe position. Unless `force`
    /// is set nothing spawns while the zone is at its cap.
    pub fn spawn_in_zone(&mut self, zone: &str, force: bool) -> CoreResult<Option<EntityId>> {
        let index = self
            .zones
            .iter()
            .position(|z| z.name == zone)
            .ok_or_else(|| CoreError::UnknownZone(zone.to_string()))?;
        let Some(mob) = self.zones[index].pick_spawn(&mut self.rng).map(str::to_string) else {
            return Ok(None);
        };
        if !force
            && self.zones[index].at_capacity(
                &self.grid,
                self.config.mob_count_mode,
                self.config.effective_lag_downer(),
            )
        {
            return Ok(None);
        }
        self.spawn_mob_in_zone(index, &mob).map(Some)
    }

    fn spawn_mob_in_zone(&mut self, zone: usize, mob: &str) -> CoreResult<EntityId> {
        let radius = self.content.mob(mob)?.radius;
        let point = self.zones[zone].random_safe_position(radius, &self.grid, &mut self.rng);
        self.spawn_mob(mob, point.position)
    }

    /// Spawn the body for a player's slot
    fn spawn_petal(&mut self, owner: EntityId, slot: usize) -> CoreResult<Option<EntityId>> {
        let Some(owner_entity) = self.pool.get(owner) else {
            return Ok(None);
        };
        let Some(player) = owner_entity.as_player() else {
            return Ok(None);
        };
        let Some(item) = player.slots.get(slot).and_then(|s| s.item.clone()) else {
            return Ok(None);
        };
        let position = player.orbit_position(slot, owner_entity.position);
        let team = player.lively.team;

        let def = self.content.petal(&item.def)?;
        let id = self.ids.allocate();
        let petal = match Petal::from_def(def, item.rarity, owner, slot, team, position) {
            Ok(petal) => petal,
            Err(e) => {
                self.ids.release(id);
                return Err(e);
            }
        };
        let shape = Shape::Circle { radius: def.radius };
        self.insert(Entity::new(id, position, shape, EntityBody::Petal(petal)));
        if let Some(slot) = self
            .pool
            .get_mut(owner)
            .and_then(Entity::as_player_mut)
            .and_then(|p| p.slots.get_mut(slot))
        {
            slot.entity = Some(id);
        }
        Ok(Some(id))
    }

    /// Drop a loot item near `position`
    pub fn spawn_loot(&mut self, item: PetalItem, position: Vec2) -> EntityId {
        let id = self.ids.allocate();
        let position = self.bounds.clamp_point(position);
        self.insert(Entity::new(
            id,
            position,
            Shape::Circle {
                radius: LOOT_RADIUS,
            },
            EntityBody::Loot(Loot::new(item)),
        ))
    }

    // ========================================================================
    // Removal
    // ========================================================================

    /// Remove an entity from the pool and grid. Returns false when it was
    /// already gone. A player takes its petals with it; a petal puts its slot
    /// on reload.
    pub fn destroy(&mut self, id: EntityId) -> bool {
        let Some(entity) = self.pool.remove(id) else {
            return false;
        };
        self.grid.remove_entity(id);
        self.ids.release(id);
        self.removed_this_tick += 1;

        match entity.body {
            EntityBody::Player(player) => {
                for petal in player.all_petal_entities() {
                    self.destroy(petal);
                }
                if let Some(state) = self.clients.get_mut(&player.client) {
                    if state.player == Some(id) {
                        state.player = None;
                    }
                }
            }
            EntityBody::Petal(petal) => {
                if let Some(slot) = self
                    .pool
                    .get_mut(petal.owner)
                    .and_then(Entity::as_player_mut)
                    .and_then(|p| p.slots.get_mut(petal.slot))
                {
                    if slot.entity == Some(id) {
                        slot.entity = None;
                        slot.reload_remaining = petal.reload;
                    }
                }
            }
            _ => {}
        }
        true
    }

    /// Death handling: drops and exp for mobs, notices for players
    fn kill(&mut self, id: EntityId, source: Option<EntityId>) {
        let Some(entity) = self.pool.get(id) else {
            return;
        };
        let position = entity.position;
        let killer_player = source
            .and_then(|s| self.pool.get(s))
            .and_then(Entity::owning_player);

        match &entity.body {
            EntityBody::Mob(mob) => {
                let drops = mob.drops.clone();
                let exp = mob.exp_reward;
                let credited = killer_player.or(mob.last_attacker);
                let radius = entity.radius();
                for drop in drops {
                    if !self.rng.gen_bool(drop.chance) {
                        continue;
                    }
                    let Ok(def) = self.content.petal(&drop.petal) else {
                        continue;
                    };
                    let item = PetalItem::new(def.id.clone(), drop.rarity.unwrap_or(def.rarity));
                    let offset = angle_to_vec(self.rng.gen_range(0.0..TAU)) * self.rng.gen_range(0.0..radius.max(1.0));
                    self.spawn_loot(item, position + offset);
                }
                if let Some(killer) = credited.and_then(|k| self.pool.get_mut(k)) {
                    let Entity { dirty, body, .. } = killer;
                    if let EntityBody::Player(player) = body {
                        if player.gain_exp(exp, dirty) {
                            tracing::debug!(player = %player.name, level = player.level, "Level up");
                        }
                    }
                }
            }
            EntityBody::Player(player) => {
                let client = player.client;
                let name = player.name.clone();
                let killer_name = source.and_then(|s| self.display_name(s, killer_player));
                tracing::info!(
                    client = client.0,
                    name = %name,
                    killer = killer_name.as_deref().unwrap_or("unknown"),
                    "Player died"
                );
                if let Some(state) = self.clients.get_mut(&client) {
                    state.outbox.push(ServerPacket::Died {
                        killer: killer_name.clone(),
                    });
                }
                let text = match &killer_name {
                    Some(killer) => format!("{name} was killed by {killer}"),
                    None => format!("{name} died"),
                };
                self.broadcast(ChatMessage::system(text));
                self.events.push(WorldEvent::PlayerDied {
                    client,
                    killer: killer_name,
                });
            }
            _ => {}
        }
        self.destroy(id);
    }

    /// Name shown for a killer: the owning player's name, else the mob name
    fn display_name(&self, source: EntityId, owner: Option<EntityId>) -> Option<String> {
        if let Some(player) = owner.and_then(|o| self.pool.get(o)).and_then(Entity::as_player) {
            return Some(player.name.clone());
        }
        let mob = self.pool.get(source)?.as_mob()?;
        self.content.mob(&mob.def).ok().map(|def| def.name.clone())
    }
}

fn sanitize_name(name: &str) -> String {
    let name: String = name.trim().chars().take(MAX_NAME_LEN).collect();
    if name.is_empty() {
        "Unnamed Flower".to_string()
    } else {
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world() -> World {
        World::new(Arc::new(Content::builtin().unwrap()), WorldConfig::default()).unwrap()
    }

    #[test]
    fn test_walls_spawned() {
        let world = world();
        assert_eq!(
            world.ids_of_kind(EntityKind::Wall).len(),
            world.content().world.walls.len()
        );
    }

    #[test]
    fn test_destroy_idempotent() {
        let mut world = world();
        let id = world.spawn_mob("ladybug", Vec2::new(100.0, 100.0)).unwrap();
        let before = world.pool().len();
        assert!(world.destroy(id));
        assert!(!world.destroy(id));
        assert_eq!(world.pool().len(), before - 1);
        assert!(!world.grid().contains(id));
    }

    #[test]
    fn test_unknown_mob() {
        let mut world = world();
        assert!(matches!(
            world.spawn_mob("dragon", Vec2::ZERO),
            Err(CoreError::UnknownMob(_))
        ));
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("  rose  "), "rose");
        assert_eq!(sanitize_name(""), "Unnamed Flower");
        assert_eq!(sanitize_name(&"x".repeat(50)).len(), MAX_NAME_LEN);
    }

    #[test]
    fn test_disconnect_unknown_is_noop() {
        let mut world = world();
        world.disconnect(ClientId(77));
        assert_eq!(world.player_count(), 0);
    }
}
