//! Narrow-phase overlap tests and push-back corrections on the ground plane.

use crate::spatial::Aabb;
use shared::{ColliderKind, Vec2};

/// Extra separation added to every correction so a resolved pair ends strictly apart
/// and the inclusive overlap test does not report it again.
pub const SKIN: f32 = 1e-3;

/// Per-entity collision strategy, selected from the entity's collider kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collider {
    /// Never collides. Used for purely visual or logical markers.
    Empty,
    /// Axis-aligned rectangle of the full footprint.
    Box,
    /// Circle of radius `max(width, depth) / 2`.
    Capsule,
}

impl Collider {
    pub fn for_kind(kind: ColliderKind) -> Self {
        match kind {
            ColliderKind::None => Collider::Empty,
            ColliderKind::Box | ColliderKind::Gate => Collider::Box,
            ColliderKind::Capsule => Collider::Capsule,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    Circle {
        center: Vec2,
        radius: f32,
    },
    Rect {
        center: Vec2,
        half_width: f32,
        half_depth: f32,
    },
}

/// Collision geometry of one entity at its current position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Body {
    pub center: Vec2,
    pub width: f32,
    pub depth: f32,
    pub collider: Collider,
}

impl Body {
    pub fn shape(&self) -> Option<Shape> {
        match self.collider {
            Collider::Empty => None,
            Collider::Box => Some(Shape::Rect {
                center: self.center,
                half_width: self.width * 0.5,
                half_depth: self.depth * 0.5,
            }),
            Collider::Capsule => Some(Shape::Circle {
                center: self.center,
                radius: self.width.max(self.depth) * 0.5,
            }),
        }
    }

    /// Bounding rectangle used by the broad phase.
    pub fn aabb(&self) -> Aabb {
        match self.collider {
            Collider::Capsule => {
                let r = self.width.max(self.depth) * 0.5;
                Aabb::from_center(self.center, r, r)
            }
            _ => Aabb::from_center(self.center, self.width * 0.5, self.depth * 0.5),
        }
    }

    pub fn overlaps(&self, other: &Body) -> bool {
        self.correction(other).is_some()
    }

    /// Yes/no test against a list of candidates.
    pub fn narrow_phase(&self, candidates: &[Body]) -> bool {
        candidates.iter().any(|candidate| self.overlaps(candidate))
    }

    /// Vector that moves `self` out of `other`, or `None` when they do not overlap.
    pub fn correction(&self, other: &Body) -> Option<Vec2> {
        match (self.shape()?, other.shape()?) {
            (
                Shape::Circle {
                    center: ca,
                    radius: ra,
                },
                Shape::Circle {
                    center: cb,
                    radius: rb,
                },
            ) => circle_vs_circle(ca, ra, cb, rb),
            (
                Shape::Circle { center, radius },
                Shape::Rect {
                    center: rc,
                    half_width,
                    half_depth,
                },
            ) => circle_vs_rect(center, radius, rc, half_width, half_depth),
            (
                Shape::Rect {
                    center: rc,
                    half_width,
                    half_depth,
                },
                Shape::Circle { center, radius },
            ) => circle_vs_rect(center, radius, rc, half_width, half_depth).map(|v| -v),
            (
                Shape::Rect {
                    center: ca,
                    half_width: wa,
                    half_depth: da,
                },
                Shape::Rect {
                    center: cb,
                    half_width: wb,
                    half_depth: db,
                },
            ) => rect_vs_rect(ca, wa, da, cb, wb, db),
        }
    }
}

fn circle_vs_circle(ca: Vec2, ra: f32, cb: Vec2, rb: f32) -> Option<Vec2> {
    let delta = cb - ca;
    let distance = delta.length();
    if distance > ra + rb {
        return None;
    }
    // Coincident centers have no direction; separate along x.
    let normal = if distance > f32::EPSILON {
        delta * (1.0 / distance)
    } else {
        Vec2::new(1.0, 0.0)
    };
    Some(-normal * (ra + rb - distance + SKIN))
}

/// Pushes a circle out of an axis-aligned rectangle.
///
/// Works with signed distances from the circle to the rectangle's four side planes.
/// Inside the corner region (outside two adjacent side planes) the corner point is
/// used instead, which rounds the rectangle's corners by the circle radius.
fn circle_vs_rect(
    center: Vec2,
    radius: f32,
    rect_center: Vec2,
    half_width: f32,
    half_depth: f32,
) -> Option<Vec2> {
    let local = center - rect_center;
    let sides = [
        (Vec2::new(1.0, 0.0), local.x - half_width - radius),
        (Vec2::new(-1.0, 0.0), -local.x - half_width - radius),
        (Vec2::new(0.0, 1.0), local.y - half_depth - radius),
        (Vec2::new(0.0, -1.0), -local.y - half_depth - radius),
    ];
    if sides.iter().any(|(_, distance)| *distance > 0.0) {
        return None;
    }

    if local.x.abs() > half_width && local.y.abs() > half_depth {
        let corner = Vec2::new(
            half_width.copysign(local.x),
            half_depth.copysign(local.y),
        );
        let offset = local - corner;
        let distance = offset.length();
        if distance > radius {
            return None;
        }
        return Some(offset * (1.0 / distance) * (radius - distance + SKIN));
    }

    // Least penetration is the side plane with the largest (closest to zero) distance.
    let (normal, distance) = sides
        .into_iter()
        .fold((Vec2::ZERO, f32::NEG_INFINITY), |best, side| {
            if side.1 > best.1 {
                side
            } else {
                best
            }
        });
    Some(normal * (-distance + SKIN))
}

fn rect_vs_rect(ca: Vec2, wa: f32, da: f32, cb: Vec2, wb: f32, db: f32) -> Option<Vec2> {
    let delta = cb - ca;
    let pen_x = wa + wb - delta.x.abs();
    let pen_y = da + db - delta.y.abs();
    if pen_x < 0.0 || pen_y < 0.0 {
        return None;
    }
    let away = |d: f32| if d > 0.0 { -1.0 } else { 1.0 };
    if pen_x <= pen_y {
        Some(Vec2::new(away(delta.x) * (pen_x + SKIN), 0.0))
    } else {
        Some(Vec2::new(0.0, away(delta.y) * (pen_y + SKIN)))
    }
}

/// Displacements that separate an overlapping pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PushBack {
    pub for_a: Vec2,
    pub for_b: Vec2,
}

/// Splits the correction between two bodies: half each when both can move, the full
/// amount to the movable one otherwise. Two static bodies are never separated.
pub fn push_back(a: &Body, a_static: bool, b: &Body, b_static: bool) -> Option<PushBack> {
    let correction = a.correction(b)?;
    match (a_static, b_static) {
        (false, false) => Some(PushBack {
            for_a: correction * 0.5,
            for_b: -correction * 0.5,
        }),
        (false, true) => Some(PushBack {
            for_a: correction,
            for_b: Vec2::ZERO,
        }),
        (true, false) => Some(PushBack {
            for_a: Vec2::ZERO,
            for_b: -correction,
        }),
        (true, true) => None,
    }
}
