//! Static wall bodies.
//!
//! A wall's geometry is the rect shape of its entity; the body carries no
//! state of its own.

use super::{Entity, EntityBody};
use crate::content::WallDef;
use crate::math::{Shape, Vec2};
use crate::pool::EntityId;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Wall;

impl Wall {
    /// Entity for a wall definition given in top-left/size form
    pub fn entity(id: EntityId, def: &WallDef) -> Entity {
        let half = Vec2::new(def.width, def.height) * 0.5;
        Entity::new(
            id,
            Vec2::new(def.x, def.y) + half,
            Shape::Rect { half_extents: half },
            EntityBody::Wall(Wall),
        )
    }
}
