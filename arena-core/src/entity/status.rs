//! Damage-over-time status effects.
//!
//! Poison and bleeding are tracked independently. Re-applying an active effect
//! keeps the longer remaining duration and the larger dps, and hands kill
//! credit to the latest source.

use serde::{Deserialize, Serialize};

use crate::pool::EntityId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DotKind {
    Poison,
    Bleed,
}

/// A single active damage-over-time effect
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DotEffect {
    pub dps: f32,
    pub remaining: f32,
    pub source: EntityId,
}

/// Damage produced by one effect during one tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DotTick {
    pub kind: DotKind,
    pub amount: f32,
    pub source: EntityId,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusEffects {
    pub poison: Option<DotEffect>,
    pub bleed: Option<DotEffect>,
}

impl StatusEffects {
    fn slot_mut(&mut self, kind: DotKind) -> &mut Option<DotEffect> {
        match kind {
            DotKind::Poison => &mut self.poison,
            DotKind::Bleed => &mut self.bleed,
        }
    }

    /// Apply or refresh an effect
    pub fn apply(&mut self, kind: DotKind, dps: f32, duration: f32, source: EntityId) {
        if dps <= 0.0 || duration <= 0.0 {
            return;
        }
        let slot = self.slot_mut(kind);
        match slot {
            Some(existing) => {
                existing.remaining = existing.remaining.max(duration);
                existing.dps = existing.dps.max(dps);
                existing.source = source;
            }
            None => {
                *slot = Some(DotEffect {
                    dps,
                    remaining: duration,
                    source,
                });
            }
        }
    }

    pub fn has(&self, kind: DotKind) -> bool {
        match kind {
            DotKind::Poison => self.poison.is_some(),
            DotKind::Bleed => self.bleed.is_some(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.poison.is_none() && self.bleed.is_none()
    }

    /// Total damage per second across active effects
    pub fn total_dps(&self) -> f32 {
        self.poison.map_or(0.0, |e| e.dps) + self.bleed.map_or(0.0, |e| e.dps)
    }

    /// Advance timers by `dt` and return the damage dealt this tick.
    /// An effect with less than `dt` left only deals its remaining share.
    pub fn tick(&mut self, dt: f32) -> Vec<DotTick> {
        let mut out = Vec::new();
        for kind in [DotKind::Poison, DotKind::Bleed] {
            let slot = self.slot_mut(kind);
            let Some(effect) = slot.as_mut() else {
                continue;
            };
            let active = dt.min(effect.remaining);
            if active > 0.0 {
                out.push(DotTick {
                    kind,
                    amount: effect.dps * active,
                    source: effect.source,
                });
            }
            effect.remaining -= dt;
            if effect.remaining <= 0.0 {
                *slot = None;
            }
        }
        out
    }

    pub fn clear(&mut self) {
        self.poison = None;
        self.bleed = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refresh_keeps_longer_and_stronger() {
        let mut status = StatusEffects::default();
        status.apply(DotKind::Poison, 10.0, 2.0, EntityId(1));
        status.apply(DotKind::Poison, 5.0, 6.0, EntityId(2));

        let poison = status.poison.unwrap();
        assert_eq!(poison.dps, 10.0);
        assert_eq!(poison.remaining, 6.0);
        assert_eq!(poison.source, EntityId(2));
    }

    #[test]
    fn test_tick_deals_dps_times_dt() {
        let mut status = StatusEffects::default();
        status.apply(DotKind::Bleed, 4.0, 1.0, EntityId(9));
        let ticks = status.tick(0.25);
        assert_eq!(ticks.len(), 1);
        assert!((ticks[0].amount - 1.0).abs() < 1e-6);
        assert_eq!(ticks[0].kind, DotKind::Bleed);
        assert_eq!(ticks[0].source, EntityId(9));
    }

    #[test]
    fn test_expiry_caps_last_tick() {
        let mut status = StatusEffects::default();
        status.apply(DotKind::Poison, 10.0, 0.1, EntityId(1));
        let ticks = status.tick(0.25);
        assert!((ticks[0].amount - 1.0).abs() < 1e-5);
        assert!(status.is_empty());
        assert!(status.tick(0.25).is_empty());
    }

    #[test]
    fn test_independent_kinds() {
        let mut status = StatusEffects::default();
        status.apply(DotKind::Poison, 3.0, 5.0, EntityId(1));
        status.apply(DotKind::Bleed, 2.0, 5.0, EntityId(1));
        assert!(status.has(DotKind::Poison) && status.has(DotKind::Bleed));
        assert_eq!(status.total_dps(), 5.0);
    }

    #[test]
    fn test_ignores_empty_effect() {
        let mut status = StatusEffects::default();
        status.apply(DotKind::Poison, 0.0, 5.0, EntityId(1));
        status.apply(DotKind::Bleed, 5.0, 0.0, EntityId(1));
        assert!(status.is_empty());
    }
}
