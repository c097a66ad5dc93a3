//! Geometry helpers shared by the kinematic solver and the scoring layer.

use harvest_types::HarvestError;
use nalgebra::{Matrix4, Point3, Vector3};

/// Vectors shorter than this are treated as having no direction.
pub const DEGENERATE_EPSILON: f64 = 1e-9;

/// Angle between two direction vectors in degrees, in `[0, 180]`.
///
/// Uses the acos of the normalised dot product. Returns
/// [`HarvestError::DegenerateVector`] if either vector is near zero length.
pub fn angle_between_deg(a: &Vector3<f64>, b: &Vector3<f64>) -> Result<f64, HarvestError> {
    let (na, nb) = (a.norm(), b.norm());
    if na < DEGENERATE_EPSILON || nb < DEGENERATE_EPSILON {
        return Err(HarvestError::DegenerateVector);
    }
    // Rounding can push the cosine just outside [-1, 1].
    let cos = (a.dot(b) / (na * nb)).clamp(-1.0, 1.0);
    Ok(cos.acos().to_degrees())
}

/// Rotated Z basis column of a homogeneous transform.
pub fn z_basis(m: &Matrix4<f64>) -> Vector3<f64> {
    Vector3::new(m[(0, 2)], m[(1, 2)], m[(2, 2)])
}

/// Translation part of a homogeneous transform, as a point.
pub fn position(m: &Matrix4<f64>) -> Point3<f64> {
    Point3::new(m[(0, 3)], m[(1, 3)], m[(2, 3)])
}

/// Index and distance of the point in `points` closest to `target`.
///
/// Exact ties resolve to the lowest index. Returns `None` for an empty slice.
pub fn nearest_point(target: &Point3<f64>, points: &[Point3<f64>]) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;
    for (i, p) in points.iter().enumerate() {
        let d = nalgebra::distance(target, p);
        match best {
            Some((_, bd)) if d >= bd => {}
            _ => best = Some((i, d)),
        }
    }
    best
}

/// Distance from `point` to the closest vertex of a mesh.
///
/// This is a nearest-vertex approximation of point-to-surface distance: a
/// linear scan over the vertex set, accurate to the mesh resolution.
pub fn nearest_vertex_distance(point: &Point3<f64>, vertices: &[Point3<f64>]) -> Option<f64> {
    nearest_point(point, vertices).map(|(_, d)| d)
}

/// Shortest distance from `point` to the segment `a`–`b`.
pub fn segment_distance(point: &Point3<f64>, a: &Point3<f64>, b: &Point3<f64>) -> f64 {
    let ab = b - a;
    let len_sq = ab.norm_squared();
    if len_sq < DEGENERATE_EPSILON * DEGENERATE_EPSILON {
        return nalgebra::distance(point, a);
    }
    let t = ((point - a).dot(&ab) / len_sq).clamp(0.0, 1.0);
    nalgebra::distance(point, &(a + ab * t))
}

/// Shortest distance from `point` to any point on an open polyline.
///
/// A single-vertex polyline degrades to a point distance; an empty one
/// returns `None`.
pub fn polyline_distance(point: &Point3<f64>, polyline: &[Point3<f64>]) -> Option<f64> {
    match polyline {
        [] => None,
        [only] => Some(nalgebra::distance(point, only)),
        _ => polyline
            .windows(2)
            .map(|w| segment_distance(point, &w[0], &w[1]))
            .reduce(f64::min),
    }
}
