//! Entities owned by the world pool.
//!
//! Every entity shares an id, a position, a shape and dirty flags. What it is
//! lives in [`EntityBody`], a closed enum; players, mobs and petals embed a
//! [`Lively`] block carrying health, team and per-tick collision state.

pub mod behavior;
pub mod lively;
pub mod loot;
pub mod mob;
pub mod petal;
pub mod player;
pub mod status;
pub mod wall;

pub use behavior::{CombatEffect, DamageModifier, PetalBehavior, RandomEffectKind, WeightedEffect};
pub use lively::{DamageKind, DamageOutcome, DamagePacket, Lively, Team};
pub use loot::Loot;
pub use mob::{Mob, MobAiKind};
pub use petal::Petal;
pub use player::{PetalSlot, Player, PlayerMode};
pub use status::{DotEffect, DotKind, DotTick, StatusEffects};
pub use wall::Wall;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::content::Rarity;
use crate::math::{Hitbox, Shape, Vec2};
use crate::pool::EntityId;

/// Entity type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Player,
    Mob,
    Petal,
    Wall,
    Loot,
}

impl EntityKind {
    pub const COUNT: usize = 5;

    pub fn index(self) -> usize {
        match self {
            EntityKind::Player => 0,
            EntityKind::Mob => 1,
            EntityKind::Petal => 2,
            EntityKind::Wall => 3,
            EntityKind::Loot => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Player => "player",
            EntityKind::Mob => "mob",
            EntityKind::Petal => "petal",
            EntityKind::Wall => "wall",
            EntityKind::Loot => "loot",
        }
    }
}

/// A petal as an inventory item, independent of any spawned body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PetalItem {
    pub def: String,
    pub rarity: Rarity,
}

impl PetalItem {
    pub fn new(def: impl Into<String>, rarity: Rarity) -> Self {
        Self {
            def: def.into(),
            rarity,
        }
    }
}

/// Per-tick resync flags, folded into the world's dirty sets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirtyFlags {
    pub partial: bool,
    pub full: bool,
}

impl DirtyFlags {
    pub fn mark_partial(&mut self) {
        self.partial = true;
    }

    pub fn mark_full(&mut self) {
        self.full = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.partial || self.full
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[derive(Debug, Clone)]
pub enum EntityBody {
    Player(Box<Player>),
    Mob(Mob),
    Petal(Petal),
    Wall(Wall),
    Loot(Loot),
}

#[derive(Debug, Clone)]
pub struct Entity {
    pub id: EntityId,
    pub position: Vec2,
    pub shape: Shape,
    pub dirty: DirtyFlags,
    pub body: EntityBody,
}

impl Entity {
    pub fn new(id: EntityId, position: Vec2, shape: Shape, body: EntityBody) -> Self {
        Self {
            id,
            position,
            shape,
            dirty: DirtyFlags::default(),
            body,
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self.body {
            EntityBody::Player(_) => EntityKind::Player,
            EntityBody::Mob(_) => EntityKind::Mob,
            EntityBody::Petal(_) => EntityKind::Petal,
            EntityBody::Wall(_) => EntityKind::Wall,
            EntityBody::Loot(_) => EntityKind::Loot,
        }
    }

    /// Shape placed at the current position
    pub fn hitbox(&self) -> Hitbox {
        self.shape.at(self.position)
    }

    pub fn radius(&self) -> f32 {
        self.shape.bounding_radius()
    }

    pub fn lively(&self) -> Option<&Lively> {
        match &self.body {
            EntityBody::Player(p) => Some(&p.lively),
            EntityBody::Mob(m) => Some(&m.lively),
            EntityBody::Petal(p) => Some(&p.lively),
            EntityBody::Wall(_) | EntityBody::Loot(_) => None,
        }
    }

    pub fn lively_mut(&mut self) -> Option<&mut Lively> {
        match &mut self.body {
            EntityBody::Player(p) => Some(&mut p.lively),
            EntityBody::Mob(m) => Some(&mut m.lively),
            EntityBody::Petal(p) => Some(&mut p.lively),
            EntityBody::Wall(_) | EntityBody::Loot(_) => None,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.lively().is_some_and(|l| l.alive)
    }

    pub fn team(&self) -> Option<Team> {
        self.lively().map(|l| l.team)
    }

    pub fn as_player(&self) -> Option<&Player> {
        match &self.body {
            EntityBody::Player(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_player_mut(&mut self) -> Option<&mut Player> {
        match &mut self.body {
            EntityBody::Player(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_mob(&self) -> Option<&Mob> {
        match &self.body {
            EntityBody::Mob(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_mob_mut(&mut self) -> Option<&mut Mob> {
        match &mut self.body {
            EntityBody::Mob(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_petal(&self) -> Option<&Petal> {
        match &self.body {
            EntityBody::Petal(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_loot(&self) -> Option<&Loot> {
        match &self.body {
            EntityBody::Loot(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_loot_mut(&mut self) -> Option<&mut Loot> {
        match &mut self.body {
            EntityBody::Loot(l) => Some(l),
            _ => None,
        }
    }

    /// Player that gets credit for this entity's actions: itself for a
    /// player, the owner for a petal
    pub fn owning_player(&self) -> Option<EntityId> {
        match &self.body {
            EntityBody::Player(_) => Some(self.id),
            EntityBody::Petal(p) => Some(p.owner),
            _ => None,
        }
    }

    /// Apply an incoming damage packet through `modifiers`
    pub fn receive_damage<R: Rng + ?Sized>(
        &mut self,
        packet: &DamagePacket,
        modifiers: &[DamageModifier],
        rng: &mut R,
    ) -> DamageOutcome {
        let Entity { dirty, body, .. } = self;
        let lively = match body {
            EntityBody::Player(p) => &mut p.lively,
            EntityBody::Mob(m) => &mut m.lively,
            EntityBody::Petal(p) => &mut p.lively,
            EntityBody::Wall(_) | EntityBody::Loot(_) => return DamageOutcome::default(),
        };
        lively.receive_damage(packet, modifiers, rng, dirty)
    }

    /// Unmodified health loss (status ticks, self damage)
    pub fn take_raw_damage(&mut self, amount: f32) -> DamageOutcome {
        let Entity { dirty, body, .. } = self;
        match body {
            EntityBody::Player(p) => p.lively.take_raw_damage(amount, dirty),
            EntityBody::Mob(m) => m.lively.take_raw_damage(amount, dirty),
            EntityBody::Petal(p) => p.lively.take_raw_damage(amount, dirty),
            EntityBody::Wall(_) | EntityBody::Loot(_) => DamageOutcome::default(),
        }
    }

    pub fn heal(&mut self, amount: f32) {
        let Entity { dirty, body, .. } = self;
        match body {
            EntityBody::Player(p) => p.lively.heal(amount, dirty),
            EntityBody::Mob(m) => m.lively.heal(amount, dirty),
            EntityBody::Petal(p) => p.lively.heal(amount, dirty),
            EntityBody::Wall(_) | EntityBody::Loot(_) => {}
        }
    }

    /// Phase one of a collision: behavior side effects against `target`
    pub fn collision_damage<R: Rng + ?Sized>(
        &mut self,
        target: EntityId,
        rng: &mut R,
    ) -> Vec<CombatEffect> {
        let id = self.id;
        match &mut self.body {
            EntityBody::Petal(p) => p.collision_damage(id, target, rng),
            _ => Vec::new(),
        }
    }

    /// Phase two of a collision: the packet delivered to `target`
    pub fn deal_collision_damage<R: Rng + ?Sized>(
        &mut self,
        target: EntityId,
        rng: &mut R,
    ) -> Option<DamagePacket> {
        let id = self.id;
        match &mut self.body {
            EntityBody::Petal(p) => Some(p.deal_collision_damage(id, target, rng)),
            EntityBody::Player(p) => Some(p.lively.body_damage_packet(id, target)),
            EntityBody::Mob(m) => Some(m.lively.body_damage_packet(id, target)),
            EntityBody::Wall(_) | EntityBody::Loot(_) => None,
        }
    }

    /// Damage modifier contributed by this entity's own behavior
    pub fn own_damage_modifier(&self) -> Option<DamageModifier> {
        self.as_petal().and_then(|p| p.behavior.on_receive_damage())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_index_unique() {
        let kinds = [
            EntityKind::Player,
            EntityKind::Mob,
            EntityKind::Petal,
            EntityKind::Wall,
            EntityKind::Loot,
        ];
        let mut seen = [false; EntityKind::COUNT];
        for kind in kinds {
            assert!(!seen[kind.index()]);
            seen[kind.index()] = true;
        }
    }

    #[test]
    fn test_dirty_flags() {
        let mut flags = DirtyFlags::default();
        assert!(!flags.is_dirty());
        flags.mark_partial();
        flags.mark_full();
        assert!(flags.partial && flags.full);
        flags.clear();
        assert!(!flags.is_dirty());
    }

    #[test]
    fn test_wall_ignores_damage() {
        let mut wall = Entity::new(
            EntityId(1),
            Vec2::ZERO,
            Shape::Rect {
                half_extents: Vec2::splat(10.0),
            },
            EntityBody::Wall(Wall),
        );
        let outcome = wall.take_raw_damage(50.0);
        assert_eq!(outcome.applied, 0.0);
        assert!(!wall.is_alive());
        assert!(!wall.dirty.is_dirty());
    }
}
