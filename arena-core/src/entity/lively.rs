//! Health, team and motion state shared by players, mobs and petals.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::behavior::DamageModifier;
use super::status::StatusEffects;
use super::DirtyFlags;
use crate::constants::HEALTH_REPORT_STEPS;
use crate::math::{remap, Vec2};
use crate::pool::EntityId;

/// Which side an entity fights for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Team {
    Mobs,
    Players,
    /// A single player and its petals (PvP)
    Player(EntityId),
}

impl Team {
    pub fn is_enemy(&self, other: &Team) -> bool {
        self != other
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DamageKind {
    Body,
    Petal,
    Poison,
    Bleed,
    SelfInflicted,
}

/// Damage travelling from `source` to `to`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DamagePacket {
    pub amount: f32,
    pub source: EntityId,
    pub to: EntityId,
    pub kind: DamageKind,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DamageOutcome {
    /// Health actually removed
    pub applied: f32,
    /// This hit took the entity from alive to dead
    pub killed: bool,
}

#[derive(Debug, Clone)]
pub struct Lively {
    pub health: f32,
    pub max_health: f32,
    /// Units per second, measured from the last two positions
    pub velocity: Vec2,
    pub prev_position: Vec2,
    /// Self-propelled velocity requested this tick
    pub intent: Vec2,
    /// Decaying push from separation and knockback
    pub knockback: Vec2,
    pub team: Team,
    pub body_damage: f32,
    pub cached_collisions: BTreeSet<EntityId>,
    pub status: StatusEffects,
    pub alive: bool,
}

impl Lively {
    pub fn new(max_health: f32, team: Team, body_damage: f32, position: Vec2) -> Self {
        let max_health = max_health.max(1.0);
        Self {
            health: max_health,
            max_health,
            velocity: Vec2::ZERO,
            prev_position: position,
            intent: Vec2::ZERO,
            knockback: Vec2::ZERO,
            team,
            body_damage: body_damage.max(0.0),
            cached_collisions: BTreeSet::new(),
            status: StatusEffects::default(),
            alive: true,
        }
    }

    /// Health quantized the way clients see it
    pub fn health_byte(&self) -> u8 {
        remap(self.health, 0.0, self.max_health, 0.0, HEALTH_REPORT_STEPS)
            .round()
            .clamp(0.0, HEALTH_REPORT_STEPS) as u8
    }

    pub fn is_full_health(&self) -> bool {
        self.health >= self.max_health
    }

    /// Run `packet` through `modifiers` in order and subtract the result
    pub fn receive_damage<R: Rng + ?Sized>(
        &mut self,
        packet: &DamagePacket,
        modifiers: &[DamageModifier],
        rng: &mut R,
        dirty: &mut DirtyFlags,
    ) -> DamageOutcome {
        if !self.alive {
            return DamageOutcome::default();
        }
        let mut amount = packet.amount.max(0.0);
        for modifier in modifiers {
            if amount <= 0.0 {
                break;
            }
            amount = modifier.apply(amount, rng);
        }
        self.take_raw_damage(amount, dirty)
    }

    /// Subtract `amount` with no modifiers applied
    pub fn take_raw_damage(&mut self, amount: f32, dirty: &mut DirtyFlags) -> DamageOutcome {
        if !self.alive {
            return DamageOutcome::default();
        }
        let amount = if amount.is_finite() { amount.max(0.0) } else { 0.0 };
        let before = self.health;
        self.set_health(before - amount, dirty);
        let killed = self.health <= 0.0;
        if killed {
            self.alive = false;
        }
        DamageOutcome {
            applied: before - self.health,
            killed,
        }
    }

    pub fn heal(&mut self, amount: f32, dirty: &mut DirtyFlags) {
        if !self.alive || !amount.is_finite() || amount <= 0.0 {
            return;
        }
        self.set_health(self.health + amount, dirty);
    }

    /// Clamp into `[0, max]` and flag the change. Leaving or regaining full
    /// health and reaching zero are full resyncs; other changes that move the
    /// reported byte are partial.
    pub fn set_health(&mut self, health: f32, dirty: &mut DirtyFlags) {
        let was_full = self.is_full_health();
        let was_positive = self.health > 0.0;
        let old_byte = self.health_byte();

        self.health = health.clamp(0.0, self.max_health);

        if was_full != self.is_full_health() || was_positive != (self.health > 0.0) {
            dirty.mark_full();
        } else if old_byte != self.health_byte() {
            dirty.mark_partial();
        }
    }

    /// Change max health keeping the missing amount constant
    pub fn set_max_health(&mut self, max_health: f32, dirty: &mut DirtyFlags) {
        let max_health = max_health.max(1.0);
        let missing = self.max_health - self.health;
        self.max_health = max_health;
        self.health = (max_health - missing).clamp(0.0, max_health);
        dirty.mark_full();
    }

    /// Plain contact damage from this entity's body
    pub fn body_damage_packet(&self, source: EntityId, to: EntityId) -> DamagePacket {
        DamagePacket {
            amount: self.body_damage,
            source,
            to,
            kind: DamageKind::Body,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    fn lively() -> Lively {
        Lively::new(100.0, Team::Mobs, 10.0, Vec2::ZERO)
    }

    fn packet(amount: f32) -> DamagePacket {
        DamagePacket {
            amount,
            source: EntityId(1),
            to: EntityId(2),
            kind: DamageKind::Body,
        }
    }

    #[test]
    fn test_negative_damage_clamped() {
        let mut l = lively();
        let mut dirty = DirtyFlags::default();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);
        let outcome = l.receive_damage(&packet(-50.0), &[], &mut rng, &mut dirty);
        assert_eq!(outcome.applied, 0.0);
        assert_eq!(l.health, 100.0);
        assert!(!dirty.is_dirty());
    }

    #[test]
    fn test_overkill_clamps_to_zero() {
        let mut l = lively();
        let mut dirty = DirtyFlags::default();
        let outcome = l.take_raw_damage(500.0, &mut dirty);
        assert_eq!(l.health, 0.0);
        assert_eq!(outcome.applied, 100.0);
        assert!(outcome.killed);
        assert!(!l.alive);
        assert!(dirty.full);
    }

    #[test]
    fn test_dead_takes_no_more_damage() {
        let mut l = lively();
        let mut dirty = DirtyFlags::default();
        l.take_raw_damage(100.0, &mut dirty);
        let again = l.take_raw_damage(10.0, &mut dirty);
        assert!(!again.killed);
        assert_eq!(again.applied, 0.0);
    }

    #[test]
    fn test_leaving_full_health_is_full_dirty() {
        let mut l = lively();
        let mut dirty = DirtyFlags::default();
        l.take_raw_damage(10.0, &mut dirty);
        assert!(dirty.full);

        let mut dirty = DirtyFlags::default();
        l.take_raw_damage(10.0, &mut dirty);
        assert!(!dirty.full);
        assert!(dirty.partial);
    }

    #[test]
    fn test_tiny_damage_not_reported() {
        let mut l = lively();
        let mut dirty = DirtyFlags::default();
        l.take_raw_damage(20.0, &mut dirty);
        let mut dirty = DirtyFlags::default();
        l.take_raw_damage(0.001, &mut dirty);
        assert!(!dirty.is_dirty());
    }

    #[test]
    fn test_heal_clamps_and_flags_full() {
        let mut l = lively();
        let mut dirty = DirtyFlags::default();
        l.take_raw_damage(30.0, &mut dirty);
        let mut dirty = DirtyFlags::default();
        l.heal(500.0, &mut dirty);
        assert_eq!(l.health, 100.0);
        assert!(dirty.full);
    }

    #[test]
    fn test_modifiers_applied_in_order() {
        let mut l = lively();
        let mut dirty = DirtyFlags::default();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(3);
        let mods = [DamageModifier::Reduce(0.5), DamageModifier::Reduce(0.5)];
        let outcome = l.receive_damage(&packet(40.0), &mods, &mut rng, &mut dirty);
        assert!((outcome.applied - 10.0).abs() < 1e-5);
    }

    #[test]
    fn test_set_max_health_keeps_missing() {
        let mut l = lively();
        let mut dirty = DirtyFlags::default();
        l.take_raw_damage(20.0, &mut dirty);
        l.set_max_health(120.0, &mut dirty);
        assert_eq!(l.health, 100.0);
        assert_eq!(l.max_health, 120.0);
    }

    #[test]
    fn test_team_enemies() {
        assert!(Team::Mobs.is_enemy(&Team::Players));
        assert!(!Team::Players.is_enemy(&Team::Players));
        assert!(Team::Player(EntityId(1)).is_enemy(&Team::Player(EntityId(2))));
    }
}
