//! Dropped petals waiting to be picked up.

use super::PetalItem;
use crate::constants::LOOT_LIFETIME;

#[derive(Debug, Clone)]
pub struct Loot {
    pub item: PetalItem,
    pub lifetime_remaining: f32,
}

impl Loot {
    pub fn new(item: PetalItem) -> Self {
        Self {
            item,
            lifetime_remaining: LOOT_LIFETIME,
        }
    }

    /// Count down; true once the drop has expired
    pub fn tick(&mut self, dt: f32) -> bool {
        self.lifetime_remaining -= dt;
        self.lifetime_remaining <= 0.0
    }
}
