//! Screen-space geometry: points, rectangles, and affine transforms.
//!
//! Everything in this module is pure computation with no access to live UI
//! state.  [`Bounds`] stores `left/top/right/bottom` edges so rectangle
//! algebra (intersection, corner extraction) stays branch-free.

use serde::Serialize;

/// An absolute screen coordinate in logical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// This point shifted by `(dx, dy)`.
    pub fn translated(self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

/// An axis-aligned rectangle stored as `left/top/right/bottom` edges.
///
/// A rectangle with `right <= left` or `bottom <= top` is *degenerate*:
/// it has zero area but still carries a defined position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bounds {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl Bounds {
    pub const fn new(left: f64, top: f64, right: f64, bottom: f64) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Build from a minimum corner plus extent.
    pub fn from_size(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self::new(left, top, left + width, top + height)
    }

    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }

    /// Geometric center.
    pub fn center(&self) -> Point {
        Point::new(
            (self.left + self.right) / 2.0,
            (self.top + self.bottom) / 2.0,
        )
    }

    /// The minimum (top-left) corner.
    pub fn min_corner(&self) -> Point {
        Point::new(self.left, self.top)
    }

    /// Zero or negative extent on either axis.
    pub fn is_degenerate(&self) -> bool {
        self.width() <= 0.0 || self.height() <= 0.0
    }

    /// The point a locator anchors at: the center, or the minimum corner
    /// when the rectangle is degenerate and has no meaningful center.
    pub fn anchor_point(&self) -> Point {
        if self.is_degenerate() {
            self.min_corner()
        } else {
            self.center()
        }
    }

    /// This rectangle shifted by `(dx, dy)`.
    pub fn translated(&self, dx: f64, dy: f64) -> Self {
        Self::new(
            self.left + dx,
            self.top + dy,
            self.right + dx,
            self.bottom + dy,
        )
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.left && p.x < self.right && p.y >= self.top && p.y < self.bottom
    }
}

/// Geometric overlap of two rectangles.
///
/// Commutative.  Disjoint inputs yield a zero-area rectangle positioned at
/// the clamped overlap corner, never an error.
pub fn intersection(a: Bounds, b: Bounds) -> Bounds {
    let left = a.left.max(b.left);
    let top = a.top.max(b.top);
    let right = a.right.min(b.right).max(left);
    let bottom = a.bottom.min(b.bottom).max(top);
    Bounds::new(left, top, right, bottom)
}

/// A scale-then-translate mapping between two coordinate spaces.
///
/// Sufficient to model the local -> parent -> scene -> window -> screen
/// chain of a toolkit that supports nested translation and scaling but no
/// rotation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Transform {
    pub scale_x: f64,
    pub scale_y: f64,
    pub translate_x: f64,
    pub translate_y: f64,
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        scale_x: 1.0,
        scale_y: 1.0,
        translate_x: 0.0,
        translate_y: 0.0,
    };

    /// Pure translation.
    pub const fn translation(dx: f64, dy: f64) -> Self {
        Self {
            scale_x: 1.0,
            scale_y: 1.0,
            translate_x: dx,
            translate_y: dy,
        }
    }

    /// Map a point from this transform's source space to its target space.
    pub fn apply(&self, p: Point) -> Point {
        Point::new(
            p.x * self.scale_x + self.translate_x,
            p.y * self.scale_y + self.translate_y,
        )
    }

    /// Map a rectangle, normalising the corners so negative scales still
    /// produce `left <= right` / `top <= bottom`.
    pub fn apply_bounds(&self, b: Bounds) -> Bounds {
        let a = self.apply(Point::new(b.left, b.top));
        let c = self.apply(Point::new(b.right, b.bottom));
        Bounds::new(a.x.min(c.x), a.y.min(c.y), a.x.max(c.x), a.y.max(c.y))
    }

    /// Composition: apply `self` first, then `outer`.
    pub fn then(&self, outer: &Transform) -> Transform {
        Transform {
            scale_x: self.scale_x * outer.scale_x,
            scale_y: self.scale_y * outer.scale_y,
            translate_x: self.translate_x * outer.scale_x + outer.translate_x,
            translate_y: self.translate_y * outer.scale_y + outer.translate_y,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
