//! Player bodies, petal slots and inventory.

use serde::{Deserialize, Serialize};
use std::f32::consts::TAU;

use super::lively::{Lively, Team};
use super::{DirtyFlags, PetalItem};
use crate::constants::{
    INVENTORY_CAPACITY, ORBIT_RADIUS_ATTACK, ORBIT_RADIUS_DEFEND, ORBIT_RADIUS_NORMAL,
    PETAL_ORBIT_SPEED, PLAYER_BODY_DAMAGE, PLAYER_SPEED, SWAP_RELOAD_SECS,
};
use crate::leveling::{level_from_exp, max_health_for_level, slot_count_for_level, LevelInfo};
use crate::math::{angle_to_vec, ease_out_cubic, lerp, normalize_angle, Vec2};
use crate::pool::EntityId;
use crate::snapshot::ClientId;

/// Orbit stance chosen by the attack/defend inputs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerMode {
    #[default]
    Normal,
    Attack,
    Defend,
}

impl PlayerMode {
    pub fn from_input(attack: bool, defend: bool) -> Self {
        match (attack, defend) {
            (true, _) => PlayerMode::Attack,
            (false, true) => PlayerMode::Defend,
            _ => PlayerMode::Normal,
        }
    }

    pub fn orbit_radius(&self) -> f32 {
        match self {
            PlayerMode::Normal => ORBIT_RADIUS_NORMAL,
            PlayerMode::Attack => ORBIT_RADIUS_ATTACK,
            PlayerMode::Defend => ORBIT_RADIUS_DEFEND,
        }
    }
}

/// One equip position. The slot owns the logical petal; the pool owns the
/// spawned body referenced by `entity`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PetalSlot {
    pub item: Option<PetalItem>,
    pub entity: Option<EntityId>,
    pub reload_remaining: f32,
    pub banned_out_time: f32,
}

impl PetalSlot {
    pub fn with_item(item: PetalItem) -> Self {
        Self {
            item: Some(item),
            ..Self::default()
        }
    }

    pub fn is_banned(&self) -> bool {
        self.banned_out_time > 0.0
    }

    /// Has an item, no body, and nothing holding it back
    pub fn ready_to_spawn(&self) -> bool {
        self.item.is_some() && self.entity.is_none() && !self.is_banned() && self.reload_remaining <= 0.0
    }
}

/// Result of a successful inventory swap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapOutcome {
    /// Body of the petal that left the slot
    pub despawn: Option<EntityId>,
}

#[derive(Debug, Clone)]
pub struct Player {
    pub lively: Lively,
    pub client: ClientId,
    pub name: String,
    pub exp: u64,
    pub level: u32,
    /// Normalized movement input
    pub movement: Vec2,
    pub mode: PlayerMode,
    /// Orbit angle of slot 0
    pub rotation: f32,
    /// Current orbit radius, eased toward the mode's radius
    pub orbit_radius: f32,
    pub slots: Vec<PetalSlot>,
    pub inventory: Vec<PetalItem>,
    /// Last entity that damaged this player
    pub killer: Option<EntityId>,
}

impl Player {
    pub fn new(
        client: ClientId,
        name: String,
        loadout: Vec<PetalItem>,
        team: Team,
        position: Vec2,
    ) -> Self {
        let level = 0;
        let slot_count = slot_count_for_level(level);
        let mut slots: Vec<PetalSlot> = loadout.into_iter().take(slot_count).map(PetalSlot::with_item).collect();
        slots.resize_with(slot_count, PetalSlot::default);
        Self {
            lively: Lively::new(max_health_for_level(level), team, PLAYER_BODY_DAMAGE, position),
            client,
            name,
            exp: 0,
            level,
            movement: Vec2::ZERO,
            mode: PlayerMode::Normal,
            rotation: 0.0,
            orbit_radius: ORBIT_RADIUS_NORMAL,
            slots,
            inventory: Vec::new(),
            killer: None,
        }
    }

    /// Apply client input. Non-finite movement is rejected and leaves the
    /// previous input in place.
    pub fn set_input(&mut self, movement: [f32; 2], attack: bool, defend: bool) -> bool {
        let [x, y] = movement;
        if !x.is_finite() || !y.is_finite() {
            return false;
        }
        self.movement = Vec2::new(x, y).clamp_length_max(1.0);
        self.mode = PlayerMode::from_input(attack, defend);
        true
    }

    /// Requested velocity from the current input
    pub fn desired_velocity(&self) -> Vec2 {
        self.movement * PLAYER_SPEED
    }

    /// Spin the orbit and ease its radius toward the current mode
    pub fn advance_orbit(&mut self, dt: f32) {
        self.rotation = normalize_angle(self.rotation + PETAL_ORBIT_SPEED * dt);
        let t = ease_out_cubic((dt * 10.0).min(1.0));
        self.orbit_radius = lerp(self.orbit_radius, self.mode.orbit_radius(), t);
    }

    /// Where the petal in `slot` should be for a player centred at `center`
    pub fn orbit_position(&self, slot: usize, center: Vec2) -> Vec2 {
        let count = self.slots.len().max(1) as f32;
        let angle = self.rotation + TAU * slot as f32 / count;
        center + angle_to_vec(angle) * self.orbit_radius
    }

    /// Advance reload and ban timers; returns slots ready to spawn a petal
    pub fn tick_slots(&mut self, dt: f32) -> Vec<usize> {
        let mut ready = Vec::new();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.is_banned() {
                slot.banned_out_time -= dt;
                if slot.banned_out_time > 0.0 {
                    continue;
                }
                slot.banned_out_time = 0.0;
            }
            if slot.item.is_none() || slot.entity.is_some() {
                continue;
            }
            if slot.reload_remaining > 0.0 {
                slot.reload_remaining -= dt;
            }
            if slot.ready_to_spawn() {
                ready.push(index);
            }
        }
        ready
    }

    /// Bodies of live petals in unbanned slots, in slot order
    pub fn live_petals(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.slots
            .iter()
            .filter(|slot| !slot.is_banned())
            .filter_map(|slot| slot.entity)
    }

    /// Every spawned petal body regardless of state
    pub fn all_petal_entities(&self) -> Vec<EntityId> {
        self.slots.iter().filter_map(|slot| slot.entity).collect()
    }

    /// Lowest-rarity unbanned slots holding an item, ties broken by slot index
    pub fn ban_candidates(&self, num: usize) -> Vec<usize> {
        let mut candidates: Vec<(usize, &PetalItem)> = self
            .slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| !slot.is_banned())
            .filter_map(|(index, slot)| slot.item.as_ref().map(|item| (index, item)))
            .collect();
        candidates.sort_by(|a, b| a.1.rarity.cmp(&b.1.rarity).then(a.0.cmp(&b.0)));
        candidates.into_iter().take(num).map(|(index, _)| index).collect()
    }

    /// Ban `slot` for `duration` seconds, returning the body to despawn
    pub fn ban_slot(&mut self, slot: usize, duration: f32) -> Option<EntityId> {
        let slot = self.slots.get_mut(slot)?;
        slot.banned_out_time = duration.max(slot.banned_out_time);
        slot.entity.take()
    }

    /// Exchange a slot item with an inventory item. Banned slots and bad
    /// indices are refused.
    pub fn swap_petal(&mut self, slot: usize, inventory_index: usize) -> Option<SwapOutcome> {
        if inventory_index >= self.inventory.len() {
            return None;
        }
        let target = self.slots.get_mut(slot)?;
        if target.is_banned() {
            return None;
        }
        let incoming = self.inventory.remove(inventory_index);
        if let Some(outgoing) = target.item.replace(incoming) {
            self.inventory.insert(inventory_index, outgoing);
        }
        target.reload_remaining = SWAP_RELOAD_SECS;
        Some(SwapOutcome {
            despawn: target.entity.take(),
        })
    }

    /// Stow an item if there is room
    pub fn pick_up(&mut self, item: PetalItem) -> bool {
        if !self.has_inventory_room() {
            return false;
        }
        self.inventory.push(item);
        true
    }

    pub fn has_inventory_room(&self) -> bool {
        self.inventory.len() < INVENTORY_CAPACITY
    }

    pub fn level_info(&self) -> LevelInfo {
        level_from_exp(self.exp)
    }

    /// Add exp and re-derive level, max health and slot count.
    /// Returns true when the level changed.
    pub fn gain_exp(&mut self, amount: u64, dirty: &mut DirtyFlags) -> bool {
        self.exp = self.exp.saturating_add(amount);
        let level = level_from_exp(self.exp).level;
        if level == self.level {
            return false;
        }
        self.level = level;
        self.lively.set_max_health(max_health_for_level(level), dirty);
        let slot_count = slot_count_for_level(level);
        if self.slots.len() < slot_count {
            self.slots.resize_with(slot_count, PetalSlot::default);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::Rarity;

    fn player_with(items: &[(&str, Rarity)]) -> Player {
        let loadout = items.iter().map(|(id, r)| PetalItem::new(*id, *r)).collect();
        Player::new(ClientId(1), "tester".into(), loadout, Team::Players, Vec2::ZERO)
    }

    #[test]
    fn test_new_player_slots() {
        let player = player_with(&[("basic", Rarity::Common)]);
        assert_eq!(player.slots.len(), 5);
        assert!(player.slots[0].ready_to_spawn());
        assert!(player.slots[1].item.is_none());
        assert_eq!(player.lively.max_health, 100.0);
    }

    #[test]
    fn test_rejects_non_finite_input() {
        let mut player = player_with(&[]);
        assert!(player.set_input([0.5, 0.0], false, false));
        assert!(!player.set_input([f32::NAN, 0.0], true, false));
        assert_eq!(player.movement, Vec2::new(0.5, 0.0));
        assert_eq!(player.mode, PlayerMode::Normal);
    }

    #[test]
    fn test_input_clamped_to_unit() {
        let mut player = player_with(&[]);
        player.set_input([30.0, 40.0], false, true);
        assert!((player.movement.length() - 1.0).abs() < 1e-5);
        assert_eq!(player.mode, PlayerMode::Defend);
        assert!((player.desired_velocity().length() - PLAYER_SPEED).abs() < 1e-3);
    }

    #[test]
    fn test_orbit_radius_eases_to_mode() {
        let mut player = player_with(&[]);
        player.set_input([0.0, 0.0], true, false);
        for _ in 0..30 {
            player.advance_orbit(0.04);
        }
        assert!((player.orbit_radius - ORBIT_RADIUS_ATTACK).abs() < 1.0);
    }

    #[test]
    fn test_ban_candidates_lowest_rarity_first() {
        let player = player_with(&[
            ("a", Rarity::Epic),
            ("b", Rarity::Common),
            ("c", Rarity::Legendary),
            ("d", Rarity::Common),
            ("e", Rarity::Rare),
        ]);
        assert_eq!(player.ban_candidates(2), vec![1, 3]);
        assert_eq!(player.ban_candidates(3), vec![1, 3, 4]);
    }

    #[test]
    fn test_banned_slot_waits() {
        let mut player = player_with(&[("basic", Rarity::Common)]);
        player.slots[0].entity = Some(EntityId(9));
        assert_eq!(player.ban_slot(0, 1.0), Some(EntityId(9)));
        assert!(player.tick_slots(0.5).is_empty());
        assert_eq!(player.live_petals().count(), 0);
        assert_eq!(player.tick_slots(0.6), vec![0]);
        assert!(!player.slots[0].is_banned());
    }

    #[test]
    fn test_reload_countdown() {
        let mut player = player_with(&[("basic", Rarity::Common)]);
        player.slots[0].reload_remaining = 1.0;
        assert!(player.tick_slots(0.5).is_empty());
        assert_eq!(player.tick_slots(0.5), vec![0]);
    }

    #[test]
    fn test_swap_petal() {
        let mut player = player_with(&[("basic", Rarity::Common)]);
        player.slots[0].entity = Some(EntityId(4));
        player.inventory.push(PetalItem::new("stinger", Rarity::Unusual));

        let outcome = player.swap_petal(0, 0).unwrap();
        assert_eq!(outcome.despawn, Some(EntityId(4)));
        assert_eq!(player.slots[0].item.as_ref().unwrap().def, "stinger");
        assert_eq!(player.inventory[0].def, "basic");
        assert_eq!(player.slots[0].reload_remaining, SWAP_RELOAD_SECS);

        assert!(player.swap_petal(0, 5).is_none());
        assert!(player.swap_petal(42, 0).is_none());
    }

    #[test]
    fn test_swap_refused_while_banned() {
        let mut player = player_with(&[("basic", Rarity::Common)]);
        player.inventory.push(PetalItem::new("stinger", Rarity::Unusual));
        player.ban_slot(0, 3.0);
        assert!(player.swap_petal(0, 0).is_none());
        assert_eq!(player.inventory.len(), 1);
    }

    #[test]
    fn test_inventory_capacity() {
        let mut player = player_with(&[]);
        for _ in 0..INVENTORY_CAPACITY {
            assert!(player.pick_up(PetalItem::new("basic", Rarity::Common)));
        }
        assert!(!player.pick_up(PetalItem::new("basic", Rarity::Common)));
    }

    #[test]
    fn test_gain_exp_levels_up() {
        let mut player = player_with(&[]);
        let mut dirty = DirtyFlags::default();
        assert!(!player.gain_exp(2, &mut dirty));
        assert!(player.gain_exp(1, &mut dirty));
        assert_eq!(player.level, 1);
        assert_eq!(player.lively.max_health, 102.0);
        assert!(dirty.full);
    }
}
