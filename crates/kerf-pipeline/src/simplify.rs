//! Outline simplification using the Ramer-Douglas-Peucker algorithm.
//!
//! Traced outlines follow the pixel grid, so straight piece edges arrive
//! as long staircases of collinear or near-collinear points. RDP removes
//! points within a tolerance of the chord between their neighbors.
//!
//! Piece outlines are closed rings. A ring is split at the vertex
//! farthest from its first vertex and each half is simplified as an
//! open chain, so no edge of the ring is privileged.

use crate::types::{Point, Polygon};

/// Simplify a closed ring.
///
/// A tolerance of 0.0 preserves all points. Rings with fewer than 4
/// points, and rings that would collapse below 3 points, are returned
/// unchanged.
#[must_use = "returns the simplified ring"]
pub fn simplify_ring(ring: &[Point], tolerance: f64) -> Vec<Point> {
    if ring.len() < 4 || tolerance <= 0.0 {
        return ring.to_vec();
    }

    let first = ring[0];
    let split = ring
        .iter()
        .enumerate()
        .skip(1)
        .max_by(|(_, a), (_, b)| a.distance_squared(first).total_cmp(&b.distance_squared(first)))
        .map_or(ring.len() / 2, |(i, _)| i);

    // Closed loop as an open chain: first .. split .. first.
    let mut chain = ring.to_vec();
    chain.push(first);
    let last = chain.len() - 1;

    let mut kept = vec![false; chain.len()];
    kept[0] = true;
    kept[split] = true;
    rdp_recurse(&chain, 0, split, tolerance, &mut kept);
    rdp_recurse(&chain, split, last, tolerance, &mut kept);

    let simplified: Vec<Point> = chain[..last]
        .iter()
        .zip(&kept)
        .filter(|&(_, k)| *k)
        .map(|(&p, _)| p)
        .collect();

    if simplified.len() < 3 {
        ring.to_vec()
    } else {
        simplified
    }
}

/// Simplify every polygon's ring, keeping ids.
#[must_use = "returns the simplified polygons"]
pub fn simplify_polygons(polygons: &[Polygon], tolerance: f64) -> Vec<Polygon> {
    polygons
        .iter()
        .map(|p| Polygon::new(p.id, simplify_ring(&p.points, tolerance)))
        .collect()
}

/// Recursive step of the Ramer-Douglas-Peucker algorithm.
///
/// Finds the point between `start` and `end` that is farthest from the
/// line segment between them. If that distance exceeds `tolerance`, the
/// point is kept and both sub-segments are processed recursively.
fn rdp_recurse(points: &[Point], start: usize, end: usize, tolerance: f64, kept: &mut [bool]) {
    if end <= start + 1 {
        return;
    }

    let mut max_dist = 0.0;
    let mut max_idx = start;

    for i in (start + 1)..end {
        let d = perpendicular_distance(points[i], points[start], points[end]);
        if d > max_dist {
            max_dist = d;
            max_idx = i;
        }
    }

    if max_dist > tolerance {
        kept[max_idx] = true;
        rdp_recurse(points, start, max_idx, tolerance, kept);
        rdp_recurse(points, max_idx, end, tolerance, kept);
    }
}

/// Perpendicular distance from point `p` to the line through `a` and `b`.
///
/// When `a` and `b` coincide, returns the distance from `p` to `a`.
fn perpendicular_distance(p: Point, a: Point, b: Point) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let length_sq = dx.mul_add(dx, dy * dy);

    if length_sq == 0.0 {
        return p.distance(a);
    }

    let cross = dx.mul_add(a.y - p.y, -(dy * (a.x - p.x)));
    cross.abs() / length_sq.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Axis-aligned square traced one unit at a time, as a pixel tracer would.
    fn staircase_square(side: u32) -> Vec<Point> {
        let s = f64::from(side);
        let mut ring = Vec::new();
        for i in 0..side {
            ring.push(Point::new(f64::from(i), 0.0));
        }
        for i in 0..side {
            ring.push(Point::new(s, f64::from(i)));
        }
        for i in 0..side {
            ring.push(Point::new(s - f64::from(i), s));
        }
        for i in 0..side {
            ring.push(Point::new(0.0, s - f64::from(i)));
        }
        ring
    }

    #[test]
    fn short_ring_unchanged() {
        let tri = vec![
            Point::new(0.0, 0.0),
            Point::new(4.0, 0.0),
            Point::new(0.0, 3.0),
        ];
        assert_eq!(simplify_ring(&tri, 10.0), tri);
    }

    #[test]
    fn zero_tolerance_preserves_all_points() {
        let ring = staircase_square(6);
        assert_eq!(simplify_ring(&ring, 0.0), ring);
    }

    #[test]
    fn collinear_edges_collapse_to_corners() {
        let ring = staircase_square(10);
        let simplified = simplify_ring(&ring, 0.5);
        assert_eq!(simplified.len(), 4);
        for corner in [
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(0.0, 10.0),
        ] {
            assert!(simplified.contains(&corner), "missing corner {corner:?}");
        }
    }

    #[test]
    fn huge_tolerance_keeps_original_ring() {
        let ring = staircase_square(5);
        // Only the first vertex and the split vertex would survive.
        assert_eq!(simplify_ring(&ring, 1000.0), ring);
    }

    #[test]
    fn notch_is_retained() {
        let ring = vec![
            Point::new(0.0, 0.0),
            Point::new(5.0, 0.0),
            Point::new(6.0, 4.0),
            Point::new(7.0, 0.0),
            Point::new(12.0, 0.0),
            Point::new(12.0, 12.0),
            Point::new(0.0, 12.0),
        ];
        let simplified = simplify_ring(&ring, 1.0);
        assert!(simplified.contains(&Point::new(6.0, 4.0)));
    }

    #[test]
    fn polygons_keep_ids() {
        let polygons = vec![
            Polygon::new(3, staircase_square(8)),
            Polygon::new(9, staircase_square(4)),
        ];
        let simplified = simplify_polygons(&polygons, 0.5);
        assert_eq!(simplified[0].id, 3);
        assert_eq!(simplified[1].id, 9);
        assert_eq!(simplified[0].len(), 4);
    }

    #[test]
    fn perpendicular_distance_diagonal_segment() {
        let d = perpendicular_distance(
            Point::new(2.0, -1.0),
            Point::new(0.0, 0.0),
            Point::new(4.0, 2.0),
        );
        let expected = 8.0 / 20.0_f64.sqrt();
        assert!((d - expected).abs() < 1e-10, "got {d}, expected {expected}");
    }

    #[test]
    fn perpendicular_distance_coincident_endpoints() {
        let d = perpendicular_distance(
            Point::new(3.0, 4.0),
            Point::new(0.0, 0.0),
            Point::new(0.0, 0.0),
        );
        assert!((d - 5.0).abs() < 1e-10);
    }
}
