//! Petal bodies orbiting their owner.

use rand::Rng;

use super::behavior::{CombatEffect, PetalBehavior, RandomEffectKind};
use super::lively::{DamagePacket, Lively, Team};
use crate::constants::{PETAL_STEER, REFERENCE_DT};
use crate::content::{PetalDef, Rarity};
use crate::error::CoreResult;
use crate::math::{lerp_vec, per_tick_factor, Vec2};
use crate::pool::EntityId;

#[derive(Debug, Clone)]
pub struct Petal {
    pub lively: Lively,
    pub owner: EntityId,
    pub slot: usize,
    pub def: String,
    pub rarity: Rarity,
    pub damage: f32,
    pub reload: f32,
    pub behavior: PetalBehavior,
    /// Random-effect draw carried from phase one to phase two of a collision
    pub pending_effect: Option<RandomEffectKind>,
    pub orbit_target: Vec2,
}

impl Petal {
    /// Build a petal body. Fails when the definition's behavior is broken.
    pub fn from_def(
        def: &PetalDef,
        rarity: Rarity,
        owner: EntityId,
        slot: usize,
        team: Team,
        position: Vec2,
    ) -> CoreResult<Self> {
        let behavior = def.build_behavior()?;
        let scale = rarity.stat_multiplier();
        let damage = def.damage * scale;
        Ok(Self {
            lively: Lively::new(def.health * scale, team, damage, position),
            owner,
            slot,
            def: def.id.clone(),
            rarity,
            damage,
            reload: def.reload,
            behavior,
            pending_effect: None,
            orbit_target: position,
        })
    }

    /// Phase one: run the behavior's side effects and cache any draw
    pub fn collision_damage<R: Rng + ?Sized>(
        &mut self,
        self_id: EntityId,
        target: EntityId,
        rng: &mut R,
    ) -> Vec<CombatEffect> {
        let (effects, drawn) = self.behavior.on_collision(self_id, target, rng);
        self.pending_effect = drawn;
        effects
    }

    /// Phase two: consume the cached draw and build the damage packet
    pub fn deal_collision_damage<R: Rng + ?Sized>(
        &mut self,
        self_id: EntityId,
        target: EntityId,
        rng: &mut R,
    ) -> DamagePacket {
        let drawn = self.pending_effect.take();
        let (amount, kind) = self.behavior.on_deal_damage(self.damage, drawn, rng);
        DamagePacket {
            amount,
            source: self_id,
            to: target,
            kind,
        }
    }

    /// Next position when closing in on the orbit target
    pub fn steer(&self, position: Vec2, dt: f32) -> Vec2 {
        let keep = per_tick_factor(1.0 - PETAL_STEER, dt, REFERENCE_DT);
        lerp_vec(position, self.orbit_target, 1.0 - keep)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::lively::DamageKind;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;
    use serde_json::json;

    fn def(behavior: Option<&str>, params: Option<serde_json::Value>) -> PetalDef {
        PetalDef {
            id: "test".into(),
            name: "Test".into(),
            rarity: Rarity::Common,
            damage: 10.0,
            health: 10.0,
            reload: 2.0,
            radius: 10.0,
            behavior: behavior.map(String::from),
            params,
        }
    }

    #[test]
    fn test_construction_fails_fast() {
        let result = Petal::from_def(
            &def(Some("ban_petals"), None),
            Rarity::Common,
            EntityId(1),
            0,
            Team::Players,
            Vec2::ZERO,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_rarity_scales_stats() {
        let petal = Petal::from_def(&def(None, None), Rarity::Rare, EntityId(1), 0, Team::Players, Vec2::ZERO)
            .unwrap();
        assert!((petal.damage - 22.5).abs() < 1e-4);
        assert!((petal.lively.max_health - 22.5).abs() < 1e-4);
    }

    #[test]
    fn test_random_effect_pairs_phases() {
        let params = json!({ "effects": [
            { "weight": 1.0, "effect": { "type": "damage", "multiplier": 2.0 } },
            { "weight": 1.0, "effect": { "type": "poison", "dps": 3.0, "duration": 1.0 } }
        ]});
        let mut petal = Petal::from_def(
            &def(Some("random_effect"), Some(params)),
            Rarity::Common,
            EntityId(1),
            0,
            Team::Players,
            Vec2::ZERO,
        )
        .unwrap();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(42);
        for _ in 0..100 {
            let effects = petal.collision_damage(EntityId(1), EntityId(2), &mut rng);
            let drawn = petal.pending_effect.expect("draw cached");
            let packet = petal.deal_collision_damage(EntityId(1), EntityId(2), &mut rng);
            assert_eq!(packet.kind, drawn.damage_kind());
            match drawn {
                RandomEffectKind::Damage { .. } => {
                    assert!(effects.is_empty());
                    assert_eq!(packet.amount, 20.0);
                }
                _ => {
                    assert_eq!(effects.len(), 1);
                    assert_eq!(packet.kind, DamageKind::Poison);
                }
            }
            assert!(petal.pending_effect.is_none());
        }
    }

    #[test]
    fn test_steer_approaches_target() {
        let mut petal = Petal::from_def(&def(None, None), Rarity::Common, EntityId(1), 0, Team::Players, Vec2::ZERO)
            .unwrap();
        petal.orbit_target = Vec2::new(100.0, 0.0);
        let next = petal.steer(Vec2::ZERO, REFERENCE_DT);
        assert!((next.x - 35.0).abs() < 1e-3);
    }
}
