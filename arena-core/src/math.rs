//! 2D math helpers: scalar interpolation, angles, and hitbox geometry.
//!
//! Vectors are `glam::Vec2`. Hitboxes are either circles or axis-aligned
//! rectangles; every exact collision test in the crate goes through
//! [`Hitbox::intersects`].

pub use glam::Vec2;
use serde::{Deserialize, Serialize};
use std::f32::consts::{PI, TAU};

// ============================================================================
// Scalar helpers
// ============================================================================

/// Linear interpolation between `a` and `b`
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Component-wise vector lerp
pub fn lerp_vec(a: Vec2, b: Vec2, t: f32) -> Vec2 {
    a + (b - a) * t
}

/// Clamp `value` into `[min, max]`. Unlike `f32::clamp` this never panics on
/// an inverted range; it returns `min` instead.
pub fn clamp(value: f32, min: f32, max: f32) -> f32 {
    if max < min {
        return min;
    }
    value.max(min).min(max)
}

/// Map `value` from `[in_min, in_max]` onto `[out_min, out_max]`.
/// A degenerate input range maps everything to `out_min`.
pub fn remap(value: f32, in_min: f32, in_max: f32, out_min: f32, out_max: f32) -> f32 {
    let span = in_max - in_min;
    if span.abs() < f32::EPSILON {
        return out_min;
    }
    out_min + (value - in_min) / span * (out_max - out_min)
}

/// Move `current` toward `target` by at most `max_delta`
pub fn approach(current: f32, target: f32, max_delta: f32) -> f32 {
    if (target - current).abs() <= max_delta {
        target
    } else {
        current + max_delta.copysign(target - current)
    }
}

/// Cubic ease-out on `t` in `[0, 1]`
pub fn ease_out_cubic(t: f32) -> f32 {
    let t = clamp(t, 0.0, 1.0) - 1.0;
    t * t * t + 1.0
}

/// Quadratic ease-in-out on `t` in `[0, 1]`
pub fn ease_in_out_quad(t: f32) -> f32 {
    let t = clamp(t, 0.0, 1.0);
    if t < 0.5 {
        2.0 * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(2) / 2.0
    }
}

/// Scale a per-reference-tick factor (e.g. friction 0.8 per 1/25s) to `dt`
pub fn per_tick_factor(factor: f32, dt: f32, reference_dt: f32) -> f32 {
    factor.powf(dt / reference_dt)
}

// ============================================================================
// Angles
// ============================================================================

pub fn deg_to_rad(deg: f32) -> f32 {
    deg * PI / 180.0
}

pub fn rad_to_deg(rad: f32) -> f32 {
    rad * 180.0 / PI
}

/// Wrap an angle into `[0, TAU)`
pub fn normalize_angle(angle: f32) -> f32 {
    angle.rem_euclid(TAU)
}

/// Unit vector pointing at `angle` (radians, counter-clockwise from +x)
pub fn angle_to_vec(angle: f32) -> Vec2 {
    Vec2::new(angle.cos(), angle.sin())
}

/// Heading of a vector in radians; zero vector maps to 0
pub fn vec_to_angle(v: Vec2) -> f32 {
    if v == Vec2::ZERO {
        0.0
    } else {
        v.y.atan2(v.x)
    }
}

// ============================================================================
// Bounding boxes
// ============================================================================

/// Axis-aligned bounding box (inclusive)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec2,
    pub max: Vec2,
}

impl Aabb {
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self {
            min: min.min(max),
            max: min.max(max),
        }
    }

    pub fn from_center(center: Vec2, half: Vec2) -> Self {
        Self::new(center - half, center + half)
    }

    pub fn width(&self) -> f32 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f32 {
        self.max.y - self.min.y
    }

    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }

    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
    }

    pub fn contains_point(&self, p: Vec2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    /// Clamp a point into the box
    pub fn clamp_point(&self, p: Vec2) -> Vec2 {
        p.clamp(self.min, self.max)
    }
}

// ============================================================================
// Shapes & hitboxes
// ============================================================================

/// Shape of an entity, independent of where it is
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Shape {
    Circle { radius: f32 },
    Rect { half_extents: Vec2 },
}

impl Shape {
    /// Place the shape at `position`
    pub fn at(&self, position: Vec2) -> Hitbox {
        match *self {
            Shape::Circle { radius } => Hitbox::Circle {
                center: position,
                radius,
            },
            Shape::Rect { half_extents } => Hitbox::Rect {
                min: position - half_extents,
                max: position + half_extents,
            },
        }
    }

    /// Radius of the smallest circle enclosing the shape
    pub fn bounding_radius(&self) -> f32 {
        match *self {
            Shape::Circle { radius } => radius,
            Shape::Rect { half_extents } => half_extents.length(),
        }
    }
}

/// A shape placed in the world
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Hitbox {
    Circle { center: Vec2, radius: f32 },
    Rect { min: Vec2, max: Vec2 },
}

impl Hitbox {
    pub fn circle(center: Vec2, radius: f32) -> Self {
        Hitbox::Circle { center, radius }
    }

    pub fn rect(min: Vec2, max: Vec2) -> Self {
        Hitbox::Rect {
            min: min.min(max),
            max: min.max(max),
        }
    }

    pub fn center(&self) -> Vec2 {
        match *self {
            Hitbox::Circle { center, .. } => center,
            Hitbox::Rect { min, max } => (min + max) * 0.5,
        }
    }

    pub fn bounds(&self) -> Aabb {
        match *self {
            Hitbox::Circle { center, radius } => Aabb::from_center(center, Vec2::splat(radius)),
            Hitbox::Rect { min, max } => Aabb::new(min, max),
        }
    }

    /// Exact overlap test (touching edges do not count)
    pub fn intersects(&self, other: &Hitbox) -> bool {
        match (*self, *other) {
            (
                Hitbox::Circle {
                    center: a,
                    radius: ra,
                },
                Hitbox::Circle {
                    center: b,
                    radius: rb,
                },
            ) => a.distance_squared(b) < (ra + rb) * (ra + rb),
            (Hitbox::Circle { center, radius }, Hitbox::Rect { min, max })
            | (Hitbox::Rect { min, max }, Hitbox::Circle { center, radius }) => {
                let closest = center.clamp(min, max);
                closest.distance_squared(center) < radius * radius
            }
            (
                Hitbox::Rect {
                    min: amin,
                    max: amax,
                },
                Hitbox::Rect {
                    min: bmin,
                    max: bmax,
                },
            ) => amin.x < bmax.x && amax.x > bmin.x && amin.y < bmax.y && amax.y > bmin.y,
        }
    }

    pub fn contains_point(&self, p: Vec2) -> bool {
        match *self {
            Hitbox::Circle { center, radius } => center.distance_squared(p) <= radius * radius,
            Hitbox::Rect { min, max } => p.x >= min.x && p.x <= max.x && p.y >= min.y && p.y <= max.y,
        }
    }

    /// Minimum translation that moves a circle out of this hitbox, if they overlap
    pub fn push_out_circle(&self, center: Vec2, radius: f32) -> Option<Vec2> {
        match *self {
            Hitbox::Circle {
                center: other,
                radius: other_radius,
            } => {
                let delta = center - other;
                let dist = delta.length();
                let overlap = radius + other_radius - dist;
                if overlap <= 0.0 {
                    return None;
                }
                let dir = if dist > f32::EPSILON { delta / dist } else { Vec2::X };
                Some(dir * overlap)
            }
            Hitbox::Rect { min, max } => {
                let closest = center.clamp(min, max);
                let delta = center - closest;
                let dist = delta.length();
                if dist > f32::EPSILON {
                    if dist >= radius {
                        return None;
                    }
                    return Some(delta / dist * (radius - dist));
                }
                // Center is inside the rect: leave through the nearest edge
                let exits = [
                    (center.x - min.x, Vec2::new(-(center.x - min.x + radius), 0.0)),
                    (max.x - center.x, Vec2::new(max.x - center.x + radius, 0.0)),
                    (center.y - min.y, Vec2::new(0.0, -(center.y - min.y + radius))),
                    (max.y - center.y, Vec2::new(0.0, max.y - center.y + radius)),
                ];
                exits
                    .iter()
                    .min_by(|a, b| a.0.total_cmp(&b.0))
                    .map(|(_, push)| *push)
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
