//! Collision combat, damage delivery and status ticks.
//!
//! A contact between two enemies runs in two phases on the attacker:
//! `collision_damage` produces side effects, then `deal_collision_damage`
//! builds the packet. Both land on the target through `apply_effect` and
//! `apply_damage`. Each side of a contact attacks from its own tick, so a
//! petal touching a mob both deals and takes damage once per tick.

use super::World;
use crate::entity::{CombatEffect, DamageModifier, DamageOutcome, DamagePacket, Entity};
use crate::pool::EntityId;

impl World {
    /// Receive-side modifiers for `id`: its own behavior first, then for a
    /// player every live, unbanned petal in slot order
    pub(crate) fn damage_modifiers(&self, id: EntityId) -> Vec<DamageModifier> {
        let Some(entity) = self.pool.get(id) else {
            return Vec::new();
        };
        let mut modifiers: Vec<DamageModifier> = entity.own_damage_modifier().into_iter().collect();
        if let Some(player) = entity.as_player() {
            modifiers.extend(
                player
                    .live_petals()
                    .filter_map(|petal| self.pool.get(petal))
                    .filter_map(Entity::own_damage_modifier),
            );
        }
        modifiers
    }

    /// Deliver a damage packet. Missing or dead targets are a no-op.
    pub fn apply_damage(&mut self, packet: DamagePacket) -> DamageOutcome {
        if !self.pool.get(packet.to).is_some_and(Entity::is_alive) {
            return DamageOutcome::default();
        }
        let modifiers = self.damage_modifiers(packet.to);
        let credited = self
            .pool
            .get(packet.source)
            .and_then(Entity::owning_player);

        let outcome = {
            let World { pool, rng, .. } = self;
            let Some(target) = pool.get_mut(packet.to) else {
                return DamageOutcome::default();
            };
            let outcome = target.receive_damage(&packet, &modifiers, rng);
            if let Some(mob) = target.as_mob_mut() {
                mob.on_damaged(credited);
            } else if let Some(player) = target.as_player_mut() {
                player.killer = Some(packet.source);
            }
            outcome
        };

        if outcome.applied > 0.0 {
            let steal = self.pool.get(packet.source).and_then(|source| {
                let petal = source.as_petal()?;
                Some((petal.owner, petal.behavior.lifesteal(outcome.applied)))
            });
            if let Some((owner, heal)) = steal {
                if heal > 0.0 {
                    if let Some(owner) = self.pool.get_mut(owner) {
                        owner.heal(heal);
                    }
                }
            }
        }

        if outcome.killed {
            self.kill(packet.to, Some(packet.source));
        }
        outcome
    }

    /// Apply one phase-one side effect. Effects aimed at missing or dead
    /// entities are dropped.
    pub fn apply_effect(&mut self, effect: CombatEffect) {
        match effect {
            CombatEffect::Inflict {
                target,
                source,
                kind,
                dps,
                duration,
            } => {
                if let Some(lively) = self.pool.get_mut(target).and_then(Entity::lively_mut) {
                    if lively.alive {
                        lively.status.apply(kind, dps, duration, source);
                    }
                }
            }
            CombatEffect::BanPetals {
                target,
                num,
                duration,
            } => {
                let Some(player) = self.pool.get_mut(target).and_then(Entity::as_player_mut) else {
                    return;
                };
                let despawn: Vec<EntityId> = player
                    .ban_candidates(num)
                    .into_iter()
                    .filter_map(|slot| player.ban_slot(slot, duration))
                    .collect();
                for petal in despawn {
                    self.destroy(petal);
                }
            }
            CombatEffect::SelfDamage { entity, amount } => {
                let outcome = self
                    .pool
                    .get_mut(entity)
                    .map(|e| e.take_raw_damage(amount))
                    .unwrap_or_default();
                if outcome.killed {
                    self.kill(entity, None);
                }
            }
        }
    }

    /// Run both collision phases of `attacker` against `target`
    pub(crate) fn resolve_collision(&mut self, attacker: EntityId, target: EntityId) {
        let (effects, packet) = {
            let World { pool, rng, .. } = self;
            let Some(entity) = pool.get_mut(attacker) else {
                return;
            };
            let effects = entity.collision_damage(target, rng);
            let packet = entity.deal_collision_damage(target, rng);
            (effects, packet)
        };
        for effect in effects {
            self.apply_effect(effect);
        }
        if let Some(packet) = packet {
            self.apply_damage(packet);
        }
    }

    /// Attack every enemy in `attacker`'s cached collision set
    pub(crate) fn resolve_contacts(&mut self, attacker: EntityId) {
        let Some((team, targets)) = self.pool.get(attacker).and_then(|e| {
            let lively = e.lively()?;
            lively
                .alive
                .then(|| (lively.team, lively.cached_collisions.iter().copied().collect::<Vec<_>>()))
        }) else {
            return;
        };

        for target in targets {
            if !self.pool.get(attacker).is_some_and(Entity::is_alive) {
                break;
            }
            let hostile = self
                .pool
                .get(target)
                .filter(|t| t.is_alive())
                .and_then(Entity::team)
                .is_some_and(|t| team.is_enemy(&t));
            if hostile {
                self.resolve_collision(attacker, target);
            }
        }
    }

    /// Advance poison and bleed on `id`, crediting kills to the effect source
    pub(crate) fn tick_status(&mut self, id: EntityId, dt: f32) {
        let ticks = match self.pool.get_mut(id).and_then(Entity::lively_mut) {
            Some(lively) if !lively.status.is_empty() => lively.status.tick(dt),
            _ => return,
        };
        for tick in ticks {
            let outcome = self
                .pool
                .get_mut(id)
                .map(|e| e.take_raw_damage(tick.amount))
                .unwrap_or_default();
            if outcome.killed {
                self.kill(id, Some(tick.source));
                return;
            }
        }
    }
}
