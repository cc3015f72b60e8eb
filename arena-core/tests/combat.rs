//! Combat integration tests
//!
//! Damage delivery through carried petals, petal bans, the two-phase
//! random-effect pairing and the weighted draw distribution.

use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use std::sync::Arc;

use arena_core::content::{Content, Rarity};
use arena_core::entity::behavior::draw_effect;
use arena_core::entity::{
    CombatEffect, DamageKind, DamagePacket, DotKind, Petal, PetalBehavior, RandomEffectKind, Team,
};
use arena_core::math::Vec2;
use arena_core::snapshot::{ClientId, ClientPacket};
use arena_core::{EntityId, World, WorldConfig};

// ============================================================
// Helpers
// ============================================================

const MOBS: &str = r#"[
  { "id": "dummy", "name": "Dummy", "rarity": "common", "health": 100, "damage": 10, "radius": 20,
    "speed": 0, "ai": "passive", "exp": 5 }
]"#;

const ZONES: &str = r#"[
  { "name": "pen", "x": 0, "y": 0, "width": 1000, "height": 1000, "density": 0.0 }
]"#;

fn content(petals: &str, loadout: &[&str]) -> Arc<Content> {
    let world = serde_json::json!({
        "width": 1000,
        "height": 1000,
        "spawn_zone": "pen",
        "starting_loadout": loadout,
    })
    .to_string();
    Arc::new(Content::from_json(petals, MOBS, ZONES, &world).unwrap())
}

/// World with one joined player whose petals have spawned
fn world_with_player(content: Arc<Content>) -> (World, EntityId) {
    let mut world = World::new(content, WorldConfig::default()).unwrap();
    world.connect(ClientId(1));
    world.queue_packet(ClientId(1), ClientPacket::Join { name: "rose".into() });
    world.tick(0.04);
    let player = world.client(ClientId(1)).unwrap().player.unwrap();
    (world, player)
}

fn hit(to: EntityId, amount: f32) -> DamagePacket {
    DamagePacket {
        amount,
        source: EntityId(9999),
        to,
        kind: DamageKind::Body,
    }
}

// ============================================================
// Receive-side modifiers
// ============================================================

#[test]
fn full_avoidance_absorbs_every_hit() {
    let petals = r#"[
      { "id": "ward", "name": "Ward", "rarity": "common", "damage": 1, "health": 50, "reload": 1, "radius": 8,
        "behavior": "avoidance", "params": { "chance": 1.0 } }
    ]"#;
    let (mut world, player) = world_with_player(content(petals, &["ward"]));
    let slot = world.entity(player).unwrap().as_player().unwrap().slots[0].clone();
    assert!(slot.entity.is_some(), "ward petal should have spawned");

    let before = world.entity(player).unwrap().lively().unwrap().health;
    for _ in 0..50 {
        let outcome = world.apply_damage(hit(player, 40.0));
        assert_eq!(outcome.applied, 0.0);
        assert!(!outcome.killed);
    }
    assert_eq!(world.entity(player).unwrap().lively().unwrap().health, before);
}

#[test]
fn damage_reduction_scales_hits() {
    let petals = r#"[
      { "id": "leaf", "name": "Leaf", "rarity": "common", "damage": 1, "health": 50, "reload": 1, "radius": 8,
        "behavior": "damage_reduction", "params": { "reduction": 0.5 } }
    ]"#;
    let (mut world, player) = world_with_player(content(petals, &["leaf", "leaf"]));
    let outcome = world.apply_damage(hit(player, 40.0));
    // Two live leaves: 40 * 0.5 * 0.5
    assert!((outcome.applied - 10.0).abs() < 1e-4);
}

#[test]
fn lethal_hit_kills_player_and_notifies_client() {
    let petals = r#"[
      { "id": "basic", "name": "Basic", "rarity": "common", "damage": 10, "health": 10, "reload": 1, "radius": 8 }
    ]"#;
    let (mut world, player) = world_with_player(content(petals, &["basic"]));
    let petal = world.entity(player).unwrap().as_player().unwrap().slots[0].entity.unwrap();

    let outcome = world.apply_damage(hit(player, 10_000.0));
    assert!(outcome.killed);
    assert!(world.entity(player).is_none());
    assert!(world.entity(petal).is_none(), "petals die with their player");
    assert_eq!(world.client(ClientId(1)).unwrap().player, None);

    let output = world.tick(0.04);
    assert!(output
        .packets
        .iter()
        .any(|(c, p)| *c == ClientId(1) && matches!(p, arena_core::ServerPacket::Died { .. })));
}

// ============================================================
// Petal bans
// ============================================================

#[test]
fn ban_hits_the_two_lowest_rarity_slots() {
    let petals = r#"[
      { "id": "a", "name": "A", "rarity": "common",    "damage": 1, "health": 10, "reload": 1, "radius": 8 },
      { "id": "b", "name": "B", "rarity": "unusual",   "damage": 1, "health": 10, "reload": 1, "radius": 8 },
      { "id": "c", "name": "C", "rarity": "rare",      "damage": 1, "health": 10, "reload": 1, "radius": 8 },
      { "id": "d", "name": "D", "rarity": "epic",      "damage": 1, "health": 10, "reload": 1, "radius": 8 },
      { "id": "e", "name": "E", "rarity": "legendary", "damage": 1, "health": 10, "reload": 1, "radius": 8 }
    ]"#;
    let (mut world, player) = world_with_player(content(petals, &["c", "a", "e", "b", "d"]));
    let bodies: Vec<EntityId> = world
        .entity(player)
        .unwrap()
        .as_player()
        .unwrap()
        .slots
        .iter()
        .map(|s| s.entity.unwrap())
        .collect();

    world.apply_effect(CombatEffect::BanPetals {
        target: player,
        num: 2,
        duration: 3.0,
    });

    let slots = &world.entity(player).unwrap().as_player().unwrap().slots;
    let banned: Vec<usize> = (0..slots.len()).filter(|&i| slots[i].is_banned()).collect();
    assert_eq!(banned, vec![1, 3]);
    assert!(world.entity(bodies[1]).is_none());
    assert!(world.entity(bodies[3]).is_none());
    for i in [0, 2, 4] {
        assert!(world.entity(bodies[i]).is_some());
    }

    // Banned slots stay empty until the ban runs out
    world.tick(1.0 / 25.0);
    let slots = &world.entity(player).unwrap().as_player().unwrap().slots;
    assert!(slots[1].entity.is_none());
    assert!(slots[3].entity.is_none());
}

#[test]
fn ban_on_non_player_is_ignored() {
    let petals = r#"[
      { "id": "a", "name": "A", "rarity": "common", "damage": 1, "health": 10, "reload": 1, "radius": 8 }
    ]"#;
    let (mut world, _) = world_with_player(content(petals, &["a"]));
    let mob = world.spawn_mob("dummy", Vec2::new(900.0, 900.0)).unwrap();
    world.apply_effect(CombatEffect::BanPetals {
        target: mob,
        num: 2,
        duration: 3.0,
    });
    assert!(world.entity(mob).is_some());
}

// ============================================================
// Status effects
// ============================================================

#[test]
fn poison_ticks_bypass_avoidance() {
    let petals = r#"[
      { "id": "ward", "name": "Ward", "rarity": "common", "damage": 1, "health": 50, "reload": 1, "radius": 8,
        "behavior": "avoidance", "params": { "chance": 1.0 } }
    ]"#;
    let (mut world, player) = world_with_player(content(petals, &["ward"]));
    let before = world.entity(player).unwrap().lively().unwrap().health;
    world.apply_effect(CombatEffect::Inflict {
        target: player,
        source: EntityId(9999),
        kind: DotKind::Poison,
        dps: 10.0,
        duration: 5.0,
    });
    world.tick(0.2);
    let after = world.entity(player).unwrap().lively().unwrap().health;
    assert!((before - after - 2.0).abs() < 1e-3);
}

// ============================================================
// Random effects
// ============================================================

fn dice_effects() -> Vec<arena_core::entity::WeightedEffect> {
    serde_json::from_value(serde_json::json!([
        { "weight": 2.0, "effect": { "type": "damage", "multiplier": 3.0 } },
        { "weight": 1.0, "effect": { "type": "poison", "dps": 15.0, "duration": 3.0 } },
        { "weight": 1.0, "effect": { "type": "bleed", "dps": 10.0, "duration": 2.0 } }
    ]))
    .unwrap()
}

#[test]
fn random_effect_distribution_follows_weights() {
    let effects = dice_effects();
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(7);
    let draws = 20_000;
    let mut counts = [0usize; 3];
    for _ in 0..draws {
        match draw_effect(&effects, &mut rng).unwrap() {
            RandomEffectKind::Damage { .. } => counts[0] += 1,
            RandomEffectKind::Poison { .. } => counts[1] += 1,
            RandomEffectKind::Bleed { .. } => counts[2] += 1,
        }
    }
    let share = |n: usize| n as f64 / draws as f64;
    assert!((share(counts[0]) - 0.5).abs() < 0.02, "damage share {}", share(counts[0]));
    assert!((share(counts[1]) - 0.25).abs() < 0.02, "poison share {}", share(counts[1]));
    assert!((share(counts[2]) - 0.25).abs() < 0.02, "bleed share {}", share(counts[2]));
}

#[test]
fn random_effect_phases_use_the_same_draw() {
    let def = Content::builtin().unwrap().petal("dice").unwrap().clone();
    let mut petal = Petal::from_def(&def, Rarity::Epic, EntityId(1), 0, Team::Players, Vec2::ZERO).unwrap();
    assert!(matches!(petal.behavior, PetalBehavior::RandomEffect { .. }));
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(11);

    for _ in 0..500 {
        let effects = petal.collision_damage(EntityId(2), EntityId(3), &mut rng);
        let drawn = petal.pending_effect.expect("phase one caches its draw");
        let packet = petal.deal_collision_damage(EntityId(2), EntityId(3), &mut rng);
        assert!(petal.pending_effect.is_none(), "phase two consumes the draw");

        match drawn {
            RandomEffectKind::Damage { multiplier } => {
                assert!(effects.is_empty());
                assert_eq!(packet.kind, DamageKind::Petal);
                assert!((packet.amount - petal.damage * multiplier).abs() < 1e-3);
            }
            RandomEffectKind::Poison { .. } => {
                assert_eq!(packet.kind, DamageKind::Poison);
                assert!(matches!(
                    effects.as_slice(),
                    [CombatEffect::Inflict { kind: DotKind::Poison, .. }]
                ));
            }
            RandomEffectKind::Bleed { .. } => {
                assert_eq!(packet.kind, DamageKind::Bleed);
                assert!(matches!(
                    effects.as_slice(),
                    [CombatEffect::Inflict { kind: DotKind::Bleed, .. }]
                ));
            }
        }
    }
}

#[test]
fn all_zero_weights_draw_nothing() {
    let mut effects = dice_effects();
    for e in &mut effects {
        e.weight = 0.0;
    }
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(3);
    assert!(draw_effect(&effects, &mut rng).is_none());
}
