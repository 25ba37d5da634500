//! Axis-aligned bounding boxes.

use glam::{DAffine3, DVec3};

/// Axis-aligned bounding box in some frame.
///
/// An empty box has `min` at +∞ and `max` at −∞ so that adding the first
/// point collapses it onto that point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    /// Minimum corner.
    pub min: DVec3,
    /// Maximum corner.
    pub max: DVec3,
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::empty()
    }
}

impl BoundingBox {
    /// Create a box spanning two corners in any order.
    pub fn new(a: DVec3, b: DVec3) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// A box containing nothing.
    pub fn empty() -> Self {
        Self {
            min: DVec3::splat(f64::INFINITY),
            max: DVec3::splat(f64::NEG_INFINITY),
        }
    }

    /// Smallest box containing all points.
    pub fn from_points<I: IntoIterator<Item = DVec3>>(points: I) -> Self {
        let mut bounds = Self::empty();
        for point in points {
            bounds.add_point(point);
        }
        bounds
    }

    /// Whether the box contains no points at all.
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Grow the box to include a point.
    pub fn add_point(&mut self, point: DVec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    /// Smallest box containing both boxes.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Extent along X.
    pub fn width(&self) -> f64 {
        if self.is_empty() {
            0.0
        } else {
            self.max.x - self.min.x
        }
    }

    /// Extent along Y.
    pub fn depth(&self) -> f64 {
        if self.is_empty() {
            0.0
        } else {
            self.max.y - self.min.y
        }
    }

    /// Extent along Z.
    pub fn height(&self) -> f64 {
        if self.is_empty() {
            0.0
        } else {
            self.max.z - self.min.z
        }
    }

    /// Center point.
    pub fn center(&self) -> DVec3 {
        (self.min + self.max) * 0.5
    }

    /// Whether `point` lies inside the box, allowing `tolerance` slack on
    /// every side.
    pub fn contains(&self, point: DVec3, tolerance: f64) -> bool {
        !self.is_empty()
            && point.cmpge(self.min - DVec3::splat(tolerance)).all()
            && point.cmple(self.max + DVec3::splat(tolerance)).all()
    }

    /// Whether the horizontal footprint of `other` lies within this box's
    /// footprint, allowing `tolerance` slack. Z is ignored.
    pub fn contains_footprint(&self, other: &BoundingBox, tolerance: f64) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        other.min.x >= self.min.x - tolerance
            && other.min.y >= self.min.y - tolerance
            && other.max.x <= self.max.x + tolerance
            && other.max.y <= self.max.y + tolerance
    }

    /// Same footprint, vertical extent replaced by `min_z..=max_z`.
    pub fn with_vertical_extent(&self, min_z: f64, max_z: f64) -> BoundingBox {
        let mut bounds = *self;
        bounds.min.z = min_z.min(max_z);
        bounds.max.z = min_z.max(max_z);
        bounds
    }

    /// The eight corners. Meaningless for an empty box.
    pub fn corners(&self) -> [DVec3; 8] {
        let (a, b) = (self.min, self.max);
        [
            DVec3::new(a.x, a.y, a.z),
            DVec3::new(b.x, a.y, a.z),
            DVec3::new(b.x, b.y, a.z),
            DVec3::new(a.x, b.y, a.z),
            DVec3::new(a.x, a.y, b.z),
            DVec3::new(b.x, a.y, b.z),
            DVec3::new(b.x, b.y, b.z),
            DVec3::new(a.x, b.y, b.z),
        ]
    }

    /// Axis-aligned bounds of this box after transforming it.
    pub fn transformed(&self, transform: &DAffine3) -> BoundingBox {
        if self.is_empty() {
            return *self;
        }
        Self::from_points(
            self.corners()
                .iter()
                .map(|corner| transform.transform_point3(*corner)),
        )
    }
}

impl std::fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return write!(f, "(empty)");
        }
        write!(
            f,
            "[{:.3}, {:.3}, {:.3}] .. [{:.3}, {:.3}, {:.3}]",
            self.min.x, self.min.y, self.min.z, self.max.x, self.max.y, self.max.z
        )
    }
}
