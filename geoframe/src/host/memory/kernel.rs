//! Planar geometry helpers for the in-memory host.
//!
//! Faces are simple planar polygons stored as point loops. Intersection with
//! a convex solid is done by splitting every polygon and segment at every
//! face plane of the solid, so shared edges are split identically on both
//! sides and every resulting piece lies entirely on one side of each plane.

use glam::DVec3;

/// Distance below which a point counts as lying on a plane.
pub(super) const PLANE_EPSILON: f64 = 1e-9;

/// Quantization step for matching shared edge endpoints.
const KEY_SCALE: f64 = 1e6;

/// Hashable identity of a point after quantization.
pub(super) type PointKey = [i64; 3];

/// Direction-independent identity of an edge.
pub(super) type EdgeKey = (PointKey, PointKey);

pub(super) fn point_key(point: DVec3) -> PointKey {
    [
        (point.x * KEY_SCALE).round() as i64,
        (point.y * KEY_SCALE).round() as i64,
        (point.z * KEY_SCALE).round() as i64,
    ]
}

pub(super) fn edge_key(a: DVec3, b: DVec3) -> EdgeKey {
    let (ka, kb) = (point_key(a), point_key(b));
    if ka <= kb {
        (ka, kb)
    } else {
        (kb, ka)
    }
}

/// Area-weighted normal of a polygon (Newell's method). Its length is twice
/// the polygon area.
pub(super) fn newell_normal(points: &[DVec3]) -> DVec3 {
    let mut normal = DVec3::ZERO;
    for (i, a) in points.iter().enumerate() {
        let b = points[(i + 1) % points.len()];
        normal.x += (a.y - b.y) * (a.z + b.z);
        normal.y += (a.z - b.z) * (a.x + b.x);
        normal.z += (a.x - b.x) * (a.y + b.y);
    }
    normal
}

/// Average of the polygon's vertices.
pub(super) fn centroid(points: &[DVec3]) -> DVec3 {
    if points.is_empty() {
        return DVec3::ZERO;
    }
    points.iter().copied().sum::<DVec3>() / points.len() as f64
}

/// Largest distance of any vertex from the polygon's best-fit plane.
pub(super) fn planarity_error(points: &[DVec3]) -> f64 {
    let normal = newell_normal(points).normalize_or_zero();
    let center = centroid(points);
    points
        .iter()
        .map(|p| (*p - center).dot(normal).abs())
        .fold(0.0, f64::max)
}

/// Drop repeated consecutive points; `None` if fewer than three remain or
/// the loop has no area.
pub(super) fn clean_loop(points: Vec<DVec3>) -> Option<Vec<DVec3>> {
    let mut cleaned: Vec<DVec3> = Vec::with_capacity(points.len());
    for point in points {
        if cleaned
            .last()
            .map_or(true, |last| last.distance(point) > PLANE_EPSILON)
        {
            cleaned.push(point);
        }
    }
    while cleaned.len() > 1 && cleaned[0].distance(cleaned[cleaned.len() - 1]) <= PLANE_EPSILON {
        cleaned.pop();
    }

    if cleaned.len() < 3 || newell_normal(&cleaned).length() <= PLANE_EPSILON * PLANE_EPSILON {
        return None;
    }
    Some(cleaned)
}

/// An oriented plane. Points with positive distance are outside.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) struct Plane {
    pub point: DVec3,
    pub normal: DVec3,
}

impl Plane {
    /// Plane through a face loop, facing along its winding normal.
    pub fn from_loop(points: &[DVec3]) -> Option<Self> {
        let normal = newell_normal(points).normalize_or_zero();
        if normal == DVec3::ZERO {
            return None;
        }
        Some(Self {
            point: centroid(points),
            normal,
        })
    }

    pub fn distance(&self, point: DVec3) -> f64 {
        (point - self.point).dot(self.normal)
    }

    /// Whether two planes describe the same oriented half-space.
    pub fn coincides(&self, other: &Plane) -> bool {
        self.normal.dot(other.normal) > 1.0 - 1e-12 && self.distance(other.point).abs() <= PLANE_EPSILON
    }
}

/// Split a polygon into its parts inside and outside `plane`.
///
/// A polygon that only touches the plane stays whole on its side; a
/// polygon lying in the plane counts as inside.
pub(super) fn split_polygon(
    points: &[DVec3],
    plane: &Plane,
) -> (Option<Vec<DVec3>>, Option<Vec<DVec3>>) {
    let distances: Vec<f64> = points.iter().map(|p| plane.distance(*p)).collect();
    let any_outside = distances.iter().any(|d| *d > PLANE_EPSILON);
    let any_inside = distances.iter().any(|d| *d < -PLANE_EPSILON);

    if !any_outside {
        return (Some(points.to_vec()), None);
    }
    if !any_inside {
        return (None, Some(points.to_vec()));
    }

    let mut inside = Vec::with_capacity(points.len() + 2);
    let mut outside = Vec::with_capacity(points.len() + 2);
    for i in 0..points.len() {
        let j = (i + 1) % points.len();
        let (a, b) = (points[i], points[j]);
        let (da, db) = (distances[i], distances[j]);

        if da <= PLANE_EPSILON {
            inside.push(a);
        }
        if da >= -PLANE_EPSILON {
            outside.push(a);
        }
        if (da < -PLANE_EPSILON && db > PLANE_EPSILON) || (da > PLANE_EPSILON && db < -PLANE_EPSILON)
        {
            let crossing = a + (b - a) * (da / (da - db));
            inside.push(crossing);
            outside.push(crossing);
        }
    }

    (clean_loop(inside), clean_loop(outside))
}

/// Split a segment where it crosses `plane`.
pub(super) fn split_segment(a: DVec3, b: DVec3, plane: &Plane) -> Vec<(DVec3, DVec3)> {
    let (da, db) = (plane.distance(a), plane.distance(b));
    if (da < -PLANE_EPSILON && db > PLANE_EPSILON) || (da > PLANE_EPSILON && db < -PLANE_EPSILON) {
        let crossing = a + (b - a) * (da / (da - db));
        vec![(a, crossing), (crossing, b)]
    } else {
        vec![(a, b)]
    }
}

/// Split every polygon at every plane, keeping all pieces.
pub(super) fn split_polygons(polygons: Vec<Vec<DVec3>>, planes: &[Plane]) -> Vec<Vec<DVec3>> {
    planes.iter().fold(polygons, |polygons, plane| {
        polygons
            .iter()
            .flat_map(|polygon| {
                let (inside, outside) = split_polygon(polygon, plane);
                inside.into_iter().chain(outside)
            })
            .collect()
    })
}

/// Split every segment at every plane, keeping all pieces.
pub(super) fn split_segments(
    segments: Vec<(DVec3, DVec3)>,
    planes: &[Plane],
) -> Vec<(DVec3, DVec3)> {
    planes.iter().fold(segments, |segments, plane| {
        segments
            .iter()
            .flat_map(|(a, b)| split_segment(*a, *b, plane))
            .collect()
    })
}
