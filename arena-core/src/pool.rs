//! Entity identity and the authoritative id-indexed pool.
//!
//! Ids freed during a tick are parked until [`IdAllocator::recycle`] runs at
//! the end of that tick, so a single snapshot never carries both the removal
//! and the creation of the same id.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::fmt;

/// Unique entity identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(pub u32);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ============================================================================
// Id allocation
// ============================================================================

/// Hands out entity ids and reuses freed ones one tick later
#[derive(Debug, Default)]
pub struct IdAllocator {
    next: u32,
    free: VecDeque<u32>,
    pending: Vec<u32>,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reuse the oldest recycled id, or mint a new one
    pub fn allocate(&mut self) -> EntityId {
        if let Some(id) = self.free.pop_front() {
            return EntityId(id);
        }
        let id = self.next;
        self.next += 1;
        EntityId(id)
    }

    /// Park an id until the next `recycle`
    pub fn release(&mut self, id: EntityId) {
        self.pending.push(id.0);
    }

    /// Make ids released since the last call available again
    pub fn recycle(&mut self) {
        self.free.extend(self.pending.drain(..));
    }

    /// Ids released this tick and not yet reusable
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Number of ids ever minted
    pub fn minted(&self) -> u32 {
        self.next
    }
}

// ============================================================================
// Pool
// ============================================================================

/// Id-indexed collection; iteration is in ascending id order
#[derive(Debug)]
pub struct EntityPool<T> {
    items: BTreeMap<EntityId, T>,
}

impl<T> Default for EntityPool<T> {
    fn default() -> Self {
        Self {
            items: BTreeMap::new(),
        }
    }
}

impl<T> EntityPool<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert under `id`, returning any previous value
    pub fn insert(&mut self, id: EntityId, item: T) -> Option<T> {
        self.items.insert(id, item)
    }

    /// Remove `id`; `None` when it was already gone
    pub fn remove(&mut self, id: EntityId) -> Option<T> {
        self.items.remove(&id)
    }

    pub fn get(&self, id: EntityId) -> Option<&T> {
        self.items.get(&id)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut T> {
        self.items.get_mut(&id)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.items.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Copy of the current id list, safe to iterate while mutating the pool
    pub fn ids(&self) -> Vec<EntityId> {
        self.items.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &T)> {
        self.items.iter().map(|(id, item)| (*id, item))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (EntityId, &mut T)> {
        self.items.iter_mut().map(|(id, item)| (*id, item))
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.items.values()
    }
}
