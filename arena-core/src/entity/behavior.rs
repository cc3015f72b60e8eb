//! Petal behaviors.
//!
//! A behavior is immutable configuration parsed from a petal definition's
//! `behavior` tag and `params` object. It hooks into combat at three points:
//!
//! - `on_collision`: side effects against the collided target (status,
//!   petal bans, self damage), returned as [`CombatEffect`]s for the world to
//!   apply
//! - `on_deal_damage`: the amount and kind of the packet sent to the target
//! - `on_receive_damage`: a [`DamageModifier`] that vetoes or scales damage
//!   aimed at the carrier
//!
//! All hooks are no-ops for `Plain`.

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use super::lively::DamageKind;
use super::status::DotKind;
use crate::error::{CoreError, CoreResult};
use crate::pool::EntityId;

// ============================================================================
// Types
// ============================================================================

/// One outcome of a random-effect petal
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RandomEffectKind {
    Damage { multiplier: f32 },
    Poison { dps: f32, duration: f32 },
    Bleed { dps: f32, duration: f32 },
}

impl RandomEffectKind {
    /// Damage kind carried by the packet when this effect is drawn
    pub fn damage_kind(&self) -> DamageKind {
        match self {
            RandomEffectKind::Damage { .. } => DamageKind::Petal,
            RandomEffectKind::Poison { .. } => DamageKind::Poison,
            RandomEffectKind::Bleed { .. } => DamageKind::Bleed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightedEffect {
    pub weight: f32,
    pub effect: RandomEffectKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PetalBehavior {
    Plain,
    Crit { chance: f32, multiplier: f32 },
    Poison { dps: f32, duration: f32 },
    Bleeding { dps: f32, duration: f32 },
    DamageReduction { reduction: f32 },
    Avoidance { chance: f32 },
    RandomEffect { effects: Vec<WeightedEffect> },
    BanPetals { num: usize, duration: f32 },
    SelfDamage { amount: f32 },
    Lifesteal { fraction: f32 },
}

/// Side effect produced by phase one of a collision
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CombatEffect {
    Inflict {
        target: EntityId,
        source: EntityId,
        kind: DotKind,
        dps: f32,
        duration: f32,
    },
    BanPetals {
        target: EntityId,
        num: usize,
        duration: f32,
    },
    SelfDamage {
        entity: EntityId,
        amount: f32,
    },
}

/// Receive-side modifier extracted from a behavior
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DamageModifier {
    /// Negate the hit entirely when `rng < chance`
    Avoid(f32),
    /// Scale by `1 - reduction`
    Reduce(f32),
}

impl DamageModifier {
    pub fn apply<R: Rng + ?Sized>(&self, amount: f32, rng: &mut R) -> f32 {
        match *self {
            DamageModifier::Avoid(chance) => {
                if rng.gen::<f32>() < chance {
                    0.0
                } else {
                    amount
                }
            }
            DamageModifier::Reduce(reduction) => (amount * (1.0 - reduction)).max(0.0),
        }
    }
}

// ============================================================================
// Construction
// ============================================================================

#[derive(Deserialize)]
struct CritParams {
    chance: f32,
    multiplier: f32,
}

#[derive(Deserialize)]
struct DotParams {
    dps: f32,
    duration: f32,
}

#[derive(Deserialize)]
struct ReductionParams {
    reduction: f32,
}

#[derive(Deserialize)]
struct ChanceParams {
    chance: f32,
}

#[derive(Deserialize)]
struct RandomEffectParams {
    effects: Vec<WeightedEffect>,
}

#[derive(Deserialize)]
struct BanParams {
    num: usize,
    duration: f32,
}

#[derive(Deserialize)]
struct SelfDamageParams {
    amount: f32,
}

#[derive(Deserialize)]
struct LifestealParams {
    fraction: f32,
}

type BehaviorCtor = fn(&str, &str, Option<&Value>) -> CoreResult<PetalBehavior>;

/// Behavior kind tag -> constructor
const BEHAVIOR_TABLE: &[(&str, BehaviorCtor)] = &[
    ("plain", build_plain),
    ("crit", build_crit),
    ("poison", build_poison),
    ("bleeding", build_bleeding),
    ("damage_reduction", build_damage_reduction),
    ("avoidance", build_avoidance),
    ("random_effect", build_random_effect),
    ("ban_petals", build_ban_petals),
    ("self_damage", build_self_damage),
    ("lifesteal", build_lifesteal),
];

/// Known behavior kind tags
pub fn behavior_kinds() -> impl Iterator<Item = &'static str> {
    BEHAVIOR_TABLE.iter().map(|(kind, _)| *kind)
}

fn parse_params<T: DeserializeOwned>(petal: &str, kind: &str, params: Option<&Value>) -> CoreResult<T> {
    let params = params.ok_or_else(|| CoreError::MissingBehaviorData {
        petal: petal.to_string(),
        kind: kind.to_string(),
    })?;
    T::deserialize(params).map_err(|source| CoreError::InvalidBehaviorData {
        petal: petal.to_string(),
        kind: kind.to_string(),
        source,
    })
}

fn check(petal: &str, ok: bool, what: &str) -> CoreResult<()> {
    if ok {
        Ok(())
    } else {
        Err(CoreError::InvalidContent(format!("petal `{petal}`: {what}")))
    }
}

fn is_fraction(v: f32) -> bool {
    (0.0..=1.0).contains(&v)
}

fn build_plain(_: &str, _: &str, _: Option<&Value>) -> CoreResult<PetalBehavior> {
    Ok(PetalBehavior::Plain)
}

fn build_crit(petal: &str, kind: &str, params: Option<&Value>) -> CoreResult<PetalBehavior> {
    let p: CritParams = parse_params(petal, kind, params)?;
    check(petal, is_fraction(p.chance), "crit chance must be within [0, 1]")?;
    check(petal, p.multiplier >= 1.0, "crit multiplier must be at least 1")?;
    Ok(PetalBehavior::Crit {
        chance: p.chance,
        multiplier: p.multiplier,
    })
}

fn build_poison(petal: &str, kind: &str, params: Option<&Value>) -> CoreResult<PetalBehavior> {
    let p: DotParams = parse_params(petal, kind, params)?;
    check(petal, p.dps >= 0.0 && p.duration >= 0.0, "poison must be non-negative")?;
    Ok(PetalBehavior::Poison {
        dps: p.dps,
        duration: p.duration,
    })
}

fn build_bleeding(petal: &str, kind: &str, params: Option<&Value>) -> CoreResult<PetalBehavior> {
    let p: DotParams = parse_params(petal, kind, params)?;
    check(petal, p.dps >= 0.0 && p.duration >= 0.0, "bleeding must be non-negative")?;
    Ok(PetalBehavior::Bleeding {
        dps: p.dps,
        duration: p.duration,
    })
}

fn build_damage_reduction(petal: &str, kind: &str, params: Option<&Value>) -> CoreResult<PetalBehavior> {
    let p: ReductionParams = parse_params(petal, kind, params)?;
    check(petal, is_fraction(p.reduction), "reduction must be within [0, 1]")?;
    Ok(PetalBehavior::DamageReduction {
        reduction: p.reduction,
    })
}

fn build_avoidance(petal: &str, kind: &str, params: Option<&Value>) -> CoreResult<PetalBehavior> {
    let p: ChanceParams = parse_params(petal, kind, params)?;
    check(petal, is_fraction(p.chance), "avoidance chance must be within [0, 1]")?;
    Ok(PetalBehavior::Avoidance { chance: p.chance })
}

fn build_random_effect(petal: &str, kind: &str, params: Option<&Value>) -> CoreResult<PetalBehavior> {
    let p: RandomEffectParams = parse_params(petal, kind, params)?;
    check(petal, !p.effects.is_empty(), "random effect needs at least one effect")?;
    check(
        petal,
        p.effects.iter().all(|e| e.weight.is_finite() && e.weight >= 0.0),
        "random effect weights must be non-negative",
    )?;
    check(
        petal,
        p.effects.iter().map(|e| e.weight).sum::<f32>() > 0.0,
        "random effect weights must not all be zero",
    )?;
    Ok(PetalBehavior::RandomEffect { effects: p.effects })
}

fn build_ban_petals(petal: &str, kind: &str, params: Option<&Value>) -> CoreResult<PetalBehavior> {
    let p: BanParams = parse_params(petal, kind, params)?;
    check(petal, p.duration > 0.0, "ban duration must be positive")?;
    Ok(PetalBehavior::BanPetals {
        num: p.num,
        duration: p.duration,
    })
}

fn build_self_damage(petal: &str, kind: &str, params: Option<&Value>) -> CoreResult<PetalBehavior> {
    let p: SelfDamageParams = parse_params(petal, kind, params)?;
    check(petal, p.amount >= 0.0, "self damage must be non-negative")?;
    Ok(PetalBehavior::SelfDamage { amount: p.amount })
}

fn build_lifesteal(petal: &str, kind: &str, params: Option<&Value>) -> CoreResult<PetalBehavior> {
    let p: LifestealParams = parse_params(petal, kind, params)?;
    check(petal, p.fraction >= 0.0, "lifesteal fraction must be non-negative")?;
    Ok(PetalBehavior::Lifesteal {
        fraction: p.fraction,
    })
}

impl PetalBehavior {
    /// Build from a definition's behavior tag and params. No tag means `Plain`.
    pub fn from_parts(petal: &str, kind: Option<&str>, params: Option<&Value>) -> CoreResult<Self> {
        let Some(kind) = kind else {
            return Ok(PetalBehavior::Plain);
        };
        let (_, ctor) = BEHAVIOR_TABLE
            .iter()
            .find(|(tag, _)| *tag == kind)
            .ok_or_else(|| CoreError::UnknownBehavior {
                petal: petal.to_string(),
                kind: kind.to_string(),
            })?;
        ctor(petal, kind, params)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            PetalBehavior::Plain => "plain",
            PetalBehavior::Crit { .. } => "crit",
            PetalBehavior::Poison { .. } => "poison",
            PetalBehavior::Bleeding { .. } => "bleeding",
            PetalBehavior::DamageReduction { .. } => "damage_reduction",
            PetalBehavior::Avoidance { .. } => "avoidance",
            PetalBehavior::RandomEffect { .. } => "random_effect",
            PetalBehavior::BanPetals { .. } => "ban_petals",
            PetalBehavior::SelfDamage { .. } => "self_damage",
            PetalBehavior::Lifesteal { .. } => "lifesteal",
        }
    }

    // ========================================================================
    // Hooks
    // ========================================================================

    /// Phase one. Returns the side effects and, for random-effect petals, the
    /// draw phase two must use.
    pub fn on_collision<R: Rng + ?Sized>(
        &self,
        source: EntityId,
        target: EntityId,
        rng: &mut R,
    ) -> (Vec<CombatEffect>, Option<RandomEffectKind>) {
        match self {
            PetalBehavior::Poison { dps, duration } => (
                vec![CombatEffect::Inflict {
                    target,
                    source,
                    kind: DotKind::Poison,
                    dps: *dps,
                    duration: *duration,
                }],
                None,
            ),
            PetalBehavior::Bleeding { dps, duration } => (
                vec![CombatEffect::Inflict {
                    target,
                    source,
                    kind: DotKind::Bleed,
                    dps: *dps,
                    duration: *duration,
                }],
                None,
            ),
            PetalBehavior::RandomEffect { effects } => {
                let drawn = draw_effect(effects, rng);
                let side = match drawn {
                    Some(RandomEffectKind::Poison { dps, duration }) => vec![CombatEffect::Inflict {
                        target,
                        source,
                        kind: DotKind::Poison,
                        dps,
                        duration,
                    }],
                    Some(RandomEffectKind::Bleed { dps, duration }) => vec![CombatEffect::Inflict {
                        target,
                        source,
                        kind: DotKind::Bleed,
                        dps,
                        duration,
                    }],
                    _ => Vec::new(),
                };
                (side, drawn)
            }
            PetalBehavior::BanPetals { num, duration } => (
                vec![CombatEffect::BanPetals {
                    target,
                    num: *num,
                    duration: *duration,
                }],
                None,
            ),
            PetalBehavior::SelfDamage { amount } => (
                vec![CombatEffect::SelfDamage {
                    entity: source,
                    amount: *amount,
                }],
                None,
            ),
            _ => (Vec::new(), None),
        }
    }

    /// Phase two. `drawn` is the cached phase-one draw; a random-effect petal
    /// without one draws now.
    pub fn on_deal_damage<R: Rng + ?Sized>(
        &self,
        base: f32,
        drawn: Option<RandomEffectKind>,
        rng: &mut R,
    ) -> (f32, DamageKind) {
        match self {
            PetalBehavior::Crit { chance, multiplier } => {
                if rng.gen::<f32>() < *chance {
                    (base * multiplier, DamageKind::Petal)
                } else {
                    (base, DamageKind::Petal)
                }
            }
            PetalBehavior::RandomEffect { effects } => {
                match drawn.or_else(|| draw_effect(effects, rng)) {
                    Some(effect @ RandomEffectKind::Damage { multiplier }) => {
                        (base * multiplier, effect.damage_kind())
                    }
                    Some(effect) => (base, effect.damage_kind()),
                    None => (base, DamageKind::Petal),
                }
            }
            _ => (base, DamageKind::Petal),
        }
    }

    /// Receive-side hook: how this behavior alters damage aimed at its carrier
    pub fn on_receive_damage(&self) -> Option<DamageModifier> {
        match *self {
            PetalBehavior::Avoidance { chance } => Some(DamageModifier::Avoid(chance)),
            PetalBehavior::DamageReduction { reduction } => Some(DamageModifier::Reduce(reduction)),
            _ => None,
        }
    }

    /// Health returned to the owner after `applied` damage was dealt
    pub fn lifesteal(&self, applied: f32) -> f32 {
        match *self {
            PetalBehavior::Lifesteal { fraction } => applied.max(0.0) * fraction,
            _ => 0.0,
        }
    }
}

/// One weighted draw; `None` only when every weight is zero
pub fn draw_effect<R: Rng + ?Sized>(effects: &[WeightedEffect], rng: &mut R) -> Option<RandomEffectKind> {
    let index = WeightedIndex::new(effects.iter().map(|e| e.weight.max(0.0))).ok()?;
    effects.get(index.sample(rng)).map(|e| e.effect)
}
