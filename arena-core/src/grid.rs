//! Uniform-cell broad phase.
//!
//! The grid stores ids only and is rebuilt every tick (`reset` followed by
//! `update_entity` for every pooled entity). Queries return a superset of the
//! ids whose hitbox overlaps the query region; `colliding_with` narrows that to
//! exact hits using the hitbox recorded at insert time.

use std::collections::{BTreeMap, BTreeSet};

use crate::constants::GRID_CELL_SIZE;
use crate::entity::EntityKind;
use crate::math::{Aabb, Hitbox, Vec2};
use crate::pool::EntityId;

#[derive(Debug, thiserror::Error)]
pub enum GridError {
    #[error("invalid grid config: {0}")]
    InvalidConfig(String),
}

/// Inclusive cell span covered by a bounding box
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CellSpan {
    col0: usize,
    row0: usize,
    col1: usize,
    row1: usize,
}

#[derive(Debug, Clone)]
struct GridEntry {
    kind: EntityKind,
    hitbox: Hitbox,
    span: CellSpan,
}

#[derive(Debug)]
pub struct SpatialGrid {
    bounds: Aabb,
    cell_size: f32,
    cols: usize,
    rows: usize,
    cells: Vec<Vec<EntityId>>,
    entries: BTreeMap<EntityId, GridEntry>,
    categories: [BTreeSet<EntityId>; EntityKind::COUNT],
}

impl SpatialGrid {
    /// Grid over `[0, width] x [0, height]` with the default cell size
    pub fn new(width: f32, height: f32) -> Result<Self, GridError> {
        Self::with_cell_size(width, height, GRID_CELL_SIZE)
    }

    pub fn with_cell_size(width: f32, height: f32, cell_size: f32) -> Result<Self, GridError> {
        if !(cell_size.is_finite() && cell_size > 0.0) {
            return Err(GridError::InvalidConfig(format!(
                "cell size must be positive, got {cell_size}"
            )));
        }
        if !(width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0) {
            return Err(GridError::InvalidConfig(format!(
                "bounds must be positive, got {width}x{height}"
            )));
        }
        let cols = ((width / cell_size).ceil() as usize).max(1);
        let rows = ((height / cell_size).ceil() as usize).max(1);
        Ok(Self {
            bounds: Aabb::new(Vec2::ZERO, Vec2::new(width, height)),
            cell_size,
            cols,
            rows,
            cells: vec![Vec::new(); cols * rows],
            entries: BTreeMap::new(),
            categories: Default::default(),
        })
    }

    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.cols, self.rows)
    }

    /// Number of ids currently indexed
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Kind recorded for `id`, if indexed
    pub fn kind_of(&self, id: EntityId) -> Option<EntityKind> {
        self.entries.get(&id).map(|e| e.kind)
    }

    /// Hitbox recorded for `id` at its last insert/update
    pub fn hitbox_of(&self, id: EntityId) -> Option<Hitbox> {
        self.entries.get(&id).map(|e| e.hitbox)
    }

    // ========================================================================
    // Mutation
    // ========================================================================

    /// Index `id`. Re-adding an indexed id repositions it.
    pub fn add_entity(&mut self, id: EntityId, kind: EntityKind, hitbox: Hitbox) {
        if self.entries.contains_key(&id) {
            self.update_entity(id, kind, hitbox);
            return;
        }
        let span = self.span_for(&hitbox.bounds());
        self.insert_into_cells(id, span);
        self.categories[kind.index()].insert(id);
        self.entries.insert(id, GridEntry { kind, hitbox, span });
    }

    /// Drop `id` from every cell; unknown ids are ignored
    pub fn remove_entity(&mut self, id: EntityId) {
        let Some(entry) = self.entries.remove(&id) else {
            return;
        };
        self.remove_from_cells(id, entry.span);
        self.categories[entry.kind.index()].remove(&id);
    }

    /// Reposition `id`, adding it when absent
    pub fn update_entity(&mut self, id: EntityId, kind: EntityKind, hitbox: Hitbox) {
        let span = self.span_for(&hitbox.bounds());
        let Some(entry) = self.entries.get(&id).cloned() else {
            self.add_entity(id, kind, hitbox);
            return;
        };
        if entry.span != span {
            self.remove_from_cells(id, entry.span);
            self.insert_into_cells(id, span);
        }
        if entry.kind != kind {
            self.categories[entry.kind.index()].remove(&id);
            self.categories[kind.index()].insert(id);
        }
        self.entries.insert(id, GridEntry { kind, hitbox, span });
    }

    /// Empty every bucket and the category index; cell storage is kept
    pub fn reset(&mut self) {
        for cell in &mut self.cells {
            cell.clear();
        }
        self.entries.clear();
        for set in &mut self.categories {
            set.clear();
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Candidate ids sharing a cell with the hitbox's bounds
    pub fn intersects_hitbox(&self, hitbox: &Hitbox) -> BTreeSet<EntityId> {
        let span = self.span_for(&hitbox.bounds());
        let mut out = BTreeSet::new();
        for row in span.row0..=span.row1 {
            for col in span.col0..=span.col1 {
                out.extend(self.cells[row * self.cols + col].iter().copied());
            }
        }
        out
    }

    /// Ids whose recorded hitbox exactly intersects `hitbox`
    pub fn colliding_with(&self, hitbox: &Hitbox) -> BTreeSet<EntityId> {
        self.intersects_hitbox(hitbox)
            .into_iter()
            .filter(|id| {
                self.entries
                    .get(id)
                    .is_some_and(|e| e.hitbox.intersects(hitbox))
            })
            .collect()
    }

    /// All indexed ids of one kind
    pub fn by_category(&self, kind: EntityKind) -> &BTreeSet<EntityId> {
        &self.categories[kind.index()]
    }

    /// Exact count of `kind` entities overlapping `hitbox`
    pub fn count_in(&self, hitbox: &Hitbox, kind: EntityKind) -> usize {
        self.colliding_with(hitbox)
            .into_iter()
            .filter(|id| self.kind_of(*id) == Some(kind))
            .count()
    }

    // ========================================================================
    // Cell bookkeeping
    // ========================================================================

    fn cell_coord(&self, value: f32, origin: f32, max_index: usize) -> usize {
        let raw = ((value - origin) / self.cell_size).floor();
        if raw.is_nan() || raw <= 0.0 {
            0
        } else {
            (raw as usize).min(max_index)
        }
    }

    fn span_for(&self, aabb: &Aabb) -> CellSpan {
        CellSpan {
            col0: self.cell_coord(aabb.min.x, self.bounds.min.x, self.cols - 1),
            row0: self.cell_coord(aabb.min.y, self.bounds.min.y, self.rows - 1),
            col1: self.cell_coord(aabb.max.x, self.bounds.min.x, self.cols - 1),
            row1: self.cell_coord(aabb.max.y, self.bounds.min.y, self.rows - 1),
        }
    }

    fn insert_into_cells(&mut self, id: EntityId, span: CellSpan) {
        for row in span.row0..=span.row1 {
            for col in span.col0..=span.col1 {
                self.cells[row * self.cols + col].push(id);
            }
        }
    }

    fn remove_from_cells(&mut self, id: EntityId, span: CellSpan) {
        for row in span.row0..=span.row1 {
            for col in span.col0..=span.col1 {
                let cell = &mut self.cells[row * self.cols + col];
                if let Some(pos) = cell.iter().position(|&other| other == id) {
                    cell.swap_remove(pos);
                }
            }
        }
    }
}
