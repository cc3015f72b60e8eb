//! Network-facing state: packets, per-entity state records, dirty sets and
//! the per-tick serialization cache.
//!
//! Each tick the world folds entity dirty flags into [`DirtySets`] (full wins
//! over partial), then [`StateCache`] builds every needed [`FullState`] and
//! [`PartialState`] once so per-client snapshots only copy cached records.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::content::Rarity;
use crate::entity::{Entity, EntityBody, EntityKind, PetalItem, PlayerMode};
use crate::math::{Shape, Vec2};
use crate::pool::{EntityId, EntityPool};

/// Connection identity assigned by the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClientId(pub u32);

// ============================================================================
// Packets
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClientPacket {
    Join { name: String },
    Input { movement: [f32; 2], attack: bool, defend: bool },
    SwapPetal { slot: u8, inventory_index: u8 },
    Chat { text: String },
    Respawn,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ServerPacket {
    Welcome {
        client: ClientId,
        world_width: f32,
        world_height: f32,
    },
    Snapshot(Snapshot),
    Died {
        killer: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// `None` for system messages
    pub from: Option<String>,
    pub text: String,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            from: None,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub tick: u64,
    pub self_state: Option<SelfState>,
    pub creates: Vec<FullState>,
    pub updates: Vec<PartialState>,
    pub removes: Vec<EntityId>,
    pub messages: Vec<ChatMessage>,
}

impl Snapshot {
    pub fn is_empty(&self) -> bool {
        self.self_state.is_none()
            && self.creates.is_empty()
            && self.updates.is_empty()
            && self.removes.is_empty()
            && self.messages.is_empty()
    }
}

// ============================================================================
// Entity state records
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EntityDetail {
    Player { name: String, level: u32 },
    Mob { def: String, rarity: Rarity },
    Petal { def: String, rarity: Rarity, owner: EntityId },
    Wall,
    Loot { def: String, rarity: Rarity },
}

/// Everything a client needs to draw an entity it has not seen before
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FullState {
    pub id: EntityId,
    pub kind: EntityKind,
    pub position: Vec2,
    pub shape: Shape,
    pub health: u8,
    pub detail: EntityDetail,
}

impl FullState {
    pub fn of(entity: &Entity) -> Self {
        let detail = match &entity.body {
            EntityBody::Player(p) => EntityDetail::Player {
                name: p.name.clone(),
                level: p.level,
            },
            EntityBody::Mob(m) => EntityDetail::Mob {
                def: m.def.clone(),
                rarity: m.rarity,
            },
            EntityBody::Petal(p) => EntityDetail::Petal {
                def: p.def.clone(),
                rarity: p.rarity,
                owner: p.owner,
            },
            EntityBody::Wall(_) => EntityDetail::Wall,
            EntityBody::Loot(l) => EntityDetail::Loot {
                def: l.item.def.clone(),
                rarity: l.item.rarity,
            },
        };
        Self {
            id: entity.id,
            kind: entity.kind(),
            position: entity.position,
            shape: entity.shape,
            health: health_byte(entity),
            detail,
        }
    }
}

/// Incremental update for an entity the client already knows
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PartialState {
    pub id: EntityId,
    pub position: Vec2,
    pub health: u8,
}

impl PartialState {
    pub fn of(entity: &Entity) -> Self {
        Self {
            id: entity.id,
            position: entity.position,
            health: health_byte(entity),
        }
    }
}

fn health_byte(entity: &Entity) -> u8 {
    entity.lively().map_or(u8::MAX, |l| l.health_byte())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotState {
    pub item: Option<PetalItem>,
    pub alive: bool,
    pub reload_remaining: f32,
    pub banned_out_time: f32,
}

/// HUD data sent only to the owning client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelfState {
    pub entity: EntityId,
    pub level: u32,
    pub exp: u64,
    pub remains_exp: u64,
    pub next_cost: u64,
    pub health: f32,
    pub max_health: f32,
    pub mode: PlayerMode,
    pub slots: Vec<SlotState>,
    pub inventory: Vec<PetalItem>,
}

impl SelfState {
    pub fn of(entity: &Entity) -> Option<Self> {
        let player = entity.as_player()?;
        let info = player.level_info();
        Some(Self {
            entity: entity.id,
            level: player.level,
            exp: player.exp,
            remains_exp: info.remains_exp,
            next_cost: info.next_cost,
            health: player.lively.health,
            max_health: player.lively.max_health,
            mode: player.mode,
            slots: player
                .slots
                .iter()
                .map(|slot| SlotState {
                    item: slot.item.clone(),
                    alive: slot.entity.is_some(),
                    reload_remaining: slot.reload_remaining.max(0.0),
                    banned_out_time: slot.banned_out_time.max(0.0),
                })
                .collect(),
            inventory: player.inventory.clone(),
        })
    }
}

// ============================================================================
// Dirty sets
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirtySets {
    pub partial: BTreeSet<EntityId>,
    pub full: BTreeSet<EntityId>,
}

impl DirtySets {
    /// Gather flags from every pooled entity. An id flagged both ways ends up
    /// in `full` only.
    pub fn collect(pool: &EntityPool<Entity>) -> Self {
        let mut sets = Self::default();
        for (id, entity) in pool.iter() {
            if entity.dirty.full {
                sets.full.insert(id);
            } else if entity.dirty.partial {
                sets.partial.insert(id);
            }
        }
        sets
    }

    /// Enforce full-over-partial precedence on hand-built sets
    pub fn resolve(&mut self) {
        let full = &self.full;
        self.partial.retain(|id| !full.contains(id));
    }

    pub fn is_full(&self, id: EntityId) -> bool {
        self.full.contains(&id)
    }

    pub fn is_partial(&self, id: EntityId) -> bool {
        self.partial.contains(&id)
    }

    pub fn clear(&mut self) {
        self.partial.clear();
        self.full.clear();
    }
}

// ============================================================================
// Serialization cache
// ============================================================================

/// State records computed at most once per entity per tick
#[derive(Debug, Default)]
pub struct StateCache {
    full: BTreeMap<EntityId, FullState>,
    partial: BTreeMap<EntityId, PartialState>,
}

impl StateCache {
    /// Build records for every dirty entity
    pub fn refresh(&mut self, pool: &EntityPool<Entity>, dirty: &DirtySets) {
        for &id in &dirty.full {
            if let Some(entity) = pool.get(id) {
                self.full.insert(id, FullState::of(entity));
            }
        }
        for &id in &dirty.partial {
            if let Some(entity) = pool.get(id) {
                self.partial.insert(id, PartialState::of(entity));
            }
        }
    }

    /// Cached full state, built on first request for clean entities that a
    /// client is seeing for the first time
    pub fn full(&mut self, id: EntityId, pool: &EntityPool<Entity>) -> Option<FullState> {
        if let Some(state) = self.full.get(&id) {
            return Some(state.clone());
        }
        let state = FullState::of(pool.get(id)?);
        self.full.insert(id, state.clone());
        Some(state)
    }

    pub fn partial(&self, id: EntityId) -> Option<PartialState> {
        self.partial.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.full.len() + self.partial.len()
    }

    pub fn is_empty(&self) -> bool {
        self.full.is_empty() && self.partial.is_empty()
    }

    pub fn clear(&mut self) {
        self.full.clear();
        self.partial.clear();
    }
}
