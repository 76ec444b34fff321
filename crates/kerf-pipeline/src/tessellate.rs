//! Tessellation: split the plane into per-spine ownership regions.
//!
//! Every spine is sampled at roughly `spacing` intervals. One exact
//! Voronoi diagram is built over all samples (via the Delaunay
//! triangulation from [`spade`]), and the cells belonging to each spine
//! are merged with a boolean union from [`geo`]. The result is one or
//! more polygons per spine such that any point closer to one of spine
//! A's samples than to any other spine's samples lies in A's region.
//!
//! Cells are clipped to a rectangle covering the mask's bounding box,
//! never to the mask outline itself; the rasterizer clips to the mask.
//!
//! Geometry defects are recovered locally: a sample the triangulation
//! rejects is skipped, a cell with a non-finite vertex is dropped, and a
//! spine whose union fails contributes nothing. None of these abort the
//! call.

use std::panic;

use geo::{Coord, LineString, MultiPolygon};
use serde::{Deserialize, Serialize};
use spade::{DelaunayTriangulation, Point2, Triangulation};
use tracing::{debug, warn};

use crate::types::{Bounds, LineSegment, MaskPolygon, Point, Polygon, SegmentId};

/// Upper bound on sampling intervals per spine.
///
/// Keeps a pathological spacing from exploding the diagram size.
pub const MAX_INTERVALS_PER_SPINE: usize = 4096;

/// Vertices are snapped to this grid before the union so that edges
/// shared by neighboring cells coincide exactly.
const SNAP_GRID: f64 = 1024.0;

/// A point sampled along a spine, tagged with the spine it came from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Sample position.
    pub point: Point,
    /// Spine the sample belongs to.
    pub owner: SegmentId,
}

/// Samples and merged ownership regions from one tessellation.
#[derive(Debug, Clone, Default)]
pub struct Partition {
    /// Every sample fed to the Voronoi diagram, in spine order.
    pub samples: Vec<Sample>,
    /// Ownership regions; each polygon's `id` is its spine's id.
    pub regions: Vec<Polygon>,
}

/// Sample a spine at approximately `spacing` intervals, both endpoints
/// included.
///
/// A zero-length spine still yields two coincident samples. A spine with
/// a non-finite endpoint yields none. A non-positive `spacing` collapses
/// to the two endpoints.
#[must_use = "returns the spine samples"]
pub fn sample_spine(spine: &LineSegment, spacing: f64) -> Vec<Sample> {
    if !spine.start.is_finite() || !spine.end.is_finite() {
        return Vec::new();
    }

    let length = spine.length();
    let intervals = if spacing.is_finite() && spacing > 0.0 {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let n = (length / spacing).ceil() as usize;
        n.clamp(1, MAX_INTERVALS_PER_SPINE)
    } else {
        1
    };

    (0..=intervals)
        .map(|i| {
            #[allow(clippy::cast_precision_loss)]
            let t = i as f64 / intervals as f64;
            Sample {
                point: spine.start.lerp(spine.end, t),
                owner: spine.id,
            }
        })
        .collect()
}

/// Partition the plane among `spines`, returning each spine's unioned
/// ownership region(s).
///
/// Returns an empty list when there are no spines or no usable samples.
#[must_use = "returns the ownership regions"]
pub fn partition(spines: &[LineSegment], mask: &MaskPolygon, spacing: f64) -> Vec<Polygon> {
    tessellate(spines, mask, spacing).regions
}

/// Like [`partition`] but also returns the samples the diagram was
/// built from.
#[must_use = "returns the samples and ownership regions"]
pub fn tessellate(spines: &[LineSegment], mask: &MaskPolygon, spacing: f64) -> Partition {
    let samples: Vec<Sample> = spines
        .iter()
        .flat_map(|spine| sample_spine(spine, spacing))
        .collect();
    if samples.is_empty() {
        return Partition::default();
    }

    let Some(clip) = clip_rect(&samples, mask, spacing) else {
        return Partition {
            samples,
            regions: Vec::new(),
        };
    };

    let cells = voronoi_cells(&samples, clip);
    let regions = merge_regions(spines, &cells, union_cells);

    debug!(
        samples = samples.len(),
        cells = cells.len(),
        regions = regions.len(),
        "tessellated spines"
    );

    Partition { samples, regions }
}

/// Rectangle covering the mask's bounding box and every sample.
fn clip_rect(samples: &[Sample], mask: &MaskPolygon, spacing: f64) -> Option<Bounds> {
    let sample_points: Vec<Point> = samples.iter().map(|s| s.point).collect();
    let mut bounds = Bounds::of(&sample_points)?;
    if let Some(mask_bounds) = mask.bounds() {
        bounds.min.x = bounds.min.x.min(mask_bounds.min.x);
        bounds.min.y = bounds.min.y.min(mask_bounds.min.y);
        bounds.max.x = bounds.max.x.max(mask_bounds.max.x);
        bounds.max.y = bounds.max.y.max(mask_bounds.max.y);
    }
    let margin = if spacing.is_finite() {
        spacing.max(1.0)
    } else {
        1.0
    };
    Some(bounds.expanded(margin))
}

/// Union each spine's cells with `union`, in spine order.
///
/// A spine whose union yields `None` contributes nothing; the others
/// are unaffected.
fn merge_regions(
    spines: &[LineSegment],
    cells: &[(SegmentId, Vec<Point>)],
    union: impl Fn(&[geo::Polygon<f64>]) -> Option<MultiPolygon<f64>>,
) -> Vec<Polygon> {
    let mut regions = Vec::new();
    for spine in spines {
        let own: Vec<geo::Polygon<f64>> = cells
            .iter()
            .filter(|(owner, _)| *owner == spine.id)
            .map(|(_, cell)| to_geo(cell))
            .collect();
        if own.is_empty() {
            continue;
        }
        match union(&own) {
            Some(merged) => regions.extend(polygons_from_multi(spine.id.0, &merged)),
            None => warn!(spine = spine.id.0, "union of ownership cells failed; skipping spine"),
        }
    }
    regions
}

/// Build the clipped Voronoi cell of every distinct sample position.
///
/// A cell is the clip rectangle intersected with the half-planes closer
/// to its site than to each Delaunay neighbor. Coincident samples share
/// one cell, owned by the first spine that placed a sample there.
fn voronoi_cells(samples: &[Sample], clip: Bounds) -> Vec<(SegmentId, Vec<Point>)> {
    let mut triangulation: DelaunayTriangulation<Point2<f64>> = DelaunayTriangulation::new();
    let mut owners: Vec<Option<SegmentId>> = Vec::new();

    for sample in samples {
        match triangulation.insert(Point2::new(sample.point.x, sample.point.y)) {
            Ok(handle) => {
                let index = handle.index();
                if owners.len() <= index {
                    owners.resize(index + 1, None);
                }
                owners[index].get_or_insert(sample.owner);
            }
            Err(e) => warn!(
                x = sample.point.x,
                y = sample.point.y,
                "triangulation rejected sample: {e:?}"
            ),
        }
    }

    let mut cells = Vec::with_capacity(owners.len());
    for vertex in triangulation.vertices() {
        let Some(owner) = owners.get(vertex.fix().index()).copied().flatten() else {
            continue;
        };
        let site = vertex.position();
        let site = Point::new(site.x, site.y);

        let mut cell: Vec<Point> = clip.corners().to_vec();
        for edge in vertex.out_edges() {
            let neighbor = edge.to().position();
            cell = clip_half_plane(&cell, site, Point::new(neighbor.x, neighbor.y));
            if cell.is_empty() {
                break;
            }
        }

        if !is_usable_cell(&cell) {
            debug!(x = site.x, y = site.y, "discarding degenerate Voronoi cell");
            continue;
        }
        cells.push((owner, cell));
    }
    cells
}

/// A cell encloses area and every vertex is finite.
fn is_usable_cell(cell: &[Point]) -> bool {
    cell.len() >= 3 && cell.iter().all(|p| p.is_finite())
}

/// Keep the part of a convex polygon closer to `site` than to `other`
/// (Sutherland-Hodgman against the perpendicular bisector).
fn clip_half_plane(polygon: &[Point], site: Point, other: Point) -> Vec<Point> {
    let normal = Point::new(other.x - site.x, other.y - site.y);
    let mid = site.lerp(other, 0.5);
    // Positive means the point is on `other`'s side of the bisector.
    let side = |p: Point| normal.x.mul_add(p.x - mid.x, normal.y * (p.y - mid.y));

    let mut out = Vec::with_capacity(polygon.len() + 1);
    for (i, &current) in polygon.iter().enumerate() {
        let previous = polygon[(i + polygon.len() - 1) % polygon.len()];
        let (sc, sp) = (side(current), side(previous));
        if sc <= 0.0 {
            if sp > 0.0 {
                out.push(previous.lerp(current, sp / (sp - sc)));
            }
            out.push(current);
        } else if sp <= 0.0 {
            out.push(previous.lerp(current, sp / (sp - sc)));
        }
    }
    out
}

/// Union a spine's cells, treating a panic inside the boolean engine as
/// a failed union.
fn union_cells(cells: &[geo::Polygon<f64>]) -> Option<MultiPolygon<f64>> {
    let merged = panic::catch_unwind(panic::AssertUnwindSafe(|| geo::unary_union(cells.iter())))
        .ok()?;
    let finite = merged
        .iter()
        .flat_map(|p| p.exterior().coords())
        .all(|c| c.x.is_finite() && c.y.is_finite());
    (finite && !merged.0.is_empty()).then_some(merged)
}

fn snap(v: f64) -> f64 {
    (v * SNAP_GRID).round() / SNAP_GRID
}

fn to_geo(ring: &[Point]) -> geo::Polygon<f64> {
    let coords: Vec<Coord<f64>> = ring
        .iter()
        .map(|p| Coord {
            x: snap(p.x),
            y: snap(p.y),
        })
        .collect();
    geo::Polygon::new(LineString::new(coords), Vec::new())
}

/// Normalize a union result into simple polygons.
///
/// This is the only place that sees the multi-polygon shape of the
/// union primitive. Holes are dropped, the closing duplicate vertex is
/// removed and rings with fewer than 3 vertices are discarded.
pub(crate) fn polygons_from_multi(id: u64, multi: &MultiPolygon<f64>) -> Vec<Polygon> {
    multi
        .iter()
        .filter_map(|polygon| {
            let mut points: Vec<Point> = polygon
                .exterior()
                .coords()
                .map(|c| Point::new(c.x, c.y))
                .collect();
            if points.len() > 1 && points.first() == points.last() {
                points.pop();
            }
            (points.len() >= 3).then(|| Polygon::new(id, points))
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn spine(id: u64, x0: f64, y0: f64, x1: f64, y1: f64) -> LineSegment {
        LineSegment::new(id, Point::new(x0, y0), Point::new(x1, y1))
    }

    fn mask() -> MaskPolygon {
        MaskPolygon::rectangle(100.0, 100.0)
    }

    #[test]
    fn forty_unit_spine_at_spacing_twenty_gives_three_samples() {
        let samples = sample_spine(&spine(1, 10.0, 50.0, 50.0, 50.0), 20.0);
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[0].point, Point::new(10.0, 50.0));
        assert_eq!(samples[1].point, Point::new(30.0, 50.0));
        assert_eq!(samples[2].point, Point::new(50.0, 50.0));
        assert!(samples.iter().all(|s| s.owner == SegmentId(1)));
    }

    #[test]
    fn zero_length_spine_gives_two_coincident_samples() {
        let samples = sample_spine(&spine(4, 5.0, 5.0, 5.0, 5.0), 10.0);
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].point, samples[1].point);
    }

    #[test]
    fn non_finite_spine_gives_no_samples() {
        assert!(sample_spine(&spine(1, f64::NAN, 0.0, 1.0, 1.0), 5.0).is_empty());
    }

    #[test]
    fn bad_spacing_collapses_to_endpoints() {
        assert_eq!(sample_spine(&spine(1, 0.0, 0.0, 100.0, 0.0), 0.0).len(), 2);
        assert_eq!(sample_spine(&spine(1, 0.0, 0.0, 100.0, 0.0), -1.0).len(), 2);
    }

    #[test]
    fn no_spines_no_regions() {
        assert!(partition(&[], &mask(), 10.0).is_empty());
    }

    #[test]
    fn single_spine_owns_the_clip_rectangle() {
        let regions = partition(&[spine(9, 30.0, 50.0, 70.0, 50.0)], &mask(), 20.0);
        assert!(!regions.is_empty());
        assert!(regions.iter().all(|r| r.id == 9));
        let area: f64 = regions.iter().map(Polygon::area).sum();
        // Clip rectangle is the mask box grown by the spacing margin.
        assert!((area - 140.0 * 140.0).abs() < 1.0, "area = {area}");
    }

    #[test]
    fn zero_length_spine_still_gets_a_region() {
        let regions = partition(&[spine(2, 50.0, 50.0, 50.0, 50.0)], &mask(), 10.0);
        assert_eq!(regions.len(), 1);
        assert!(regions[0].contains(Point::new(1.0, 1.0)));
    }

    #[test]
    fn two_parallel_spines_split_at_the_midline() {
        let spines = [
            spine(1, 25.0, 10.0, 25.0, 90.0),
            spine(2, 75.0, 10.0, 75.0, 90.0),
        ];
        let regions = partition(&spines, &mask(), 10.0);
        let left: Vec<&Polygon> = regions.iter().filter(|r| r.id == 1).collect();
        let right: Vec<&Polygon> = regions.iter().filter(|r| r.id == 2).collect();
        assert!(!left.is_empty() && !right.is_empty());

        for y in [5.0, 30.0, 50.0, 95.0] {
            assert!(left.iter().any(|r| r.contains(Point::new(40.0, y))));
            assert!(!right.iter().any(|r| r.contains(Point::new(40.0, y))));
            assert!(right.iter().any(|r| r.contains(Point::new(60.0, y))));
            assert!(!left.iter().any(|r| r.contains(Point::new(60.0, y))));
        }
    }

    #[test]
    fn ownership_is_exclusive() {
        let spines = [
            spine(1, 20.0, 20.0, 80.0, 30.0),
            spine(2, 20.0, 80.0, 50.0, 50.0),
            spine(3, 70.0, 60.0, 85.0, 90.0),
        ];
        let part = tessellate(&spines, &mask(), 8.0);

        for gy in 0..20 {
            for gx in 0..20 {
                let p = Point::new(f64::from(gx).mul_add(5.0, 2.5), f64::from(gy).mul_add(5.0, 2.5));
                // Nearest sample per spine.
                let mut best: Vec<(f64, SegmentId)> = spines
                    .iter()
                    .map(|s| {
                        let d = part
                            .samples
                            .iter()
                            .filter(|sample| sample.owner == s.id)
                            .map(|sample| sample.point.distance(p))
                            .fold(f64::INFINITY, f64::min);
                        (d, s.id)
                    })
                    .collect();
                best.sort_by(|a, b| a.0.total_cmp(&b.0));
                if best[1].0 - best[0].0 < 0.05 {
                    continue; // on a boundary
                }
                let owner = best[0].1;
                for region in &part.regions {
                    let inside = region.contains(p);
                    if region.id == owner.0 {
                        continue;
                    }
                    assert!(!inside, "{p:?} owned by {owner:?} but inside region {}", region.id);
                }
                assert!(
                    part.regions
                        .iter()
                        .any(|r| r.id == owner.0 && r.contains(p)),
                    "{p:?} not inside any region of {owner:?}"
                );
            }
        }
    }

    #[test]
    fn half_plane_clip_keeps_near_side() {
        let square = vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(0.0, 10.0),
        ];
        let clipped = clip_half_plane(&square, Point::new(2.0, 5.0), Point::new(8.0, 5.0));
        let poly = Polygon::new(0, clipped);
        assert!((poly.area() - 50.0).abs() < 1e-9);
        assert!(poly.contains(Point::new(1.0, 5.0)));
        assert!(!poly.contains(Point::new(9.0, 5.0)));
    }

    fn unit_square(x: f64, y: f64) -> Vec<Point> {
        vec![
            Point::new(x, y),
            Point::new(x + 1.0, y),
            Point::new(x + 1.0, y + 1.0),
            Point::new(x, y + 1.0),
        ]
    }

    #[test]
    fn non_finite_cells_are_unusable() {
        assert!(is_usable_cell(&unit_square(0.0, 0.0)));
        let mut bad = unit_square(0.0, 0.0);
        bad[2].x = f64::INFINITY;
        assert!(!is_usable_cell(&bad));
        bad[2].x = f64::NAN;
        assert!(!is_usable_cell(&bad));
        assert!(!is_usable_cell(&unit_square(0.0, 0.0)[..2]));
    }

    #[test]
    fn union_of_nothing_fails() {
        assert!(union_cells(&[]).is_none());
    }

    #[test]
    fn union_merges_adjacent_cells() {
        let merged = union_cells(&[to_geo(&unit_square(0.0, 0.0)), to_geo(&unit_square(1.0, 0.0))])
            .unwrap();
        let polys = polygons_from_multi(1, &merged);
        assert_eq!(polys.len(), 1);
        assert!((polys[0].area() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn empty_multi_polygon_normalizes_to_nothing() {
        assert!(polygons_from_multi(1, &MultiPolygon::new(Vec::new())).is_empty());
    }

    #[test]
    fn failed_union_skips_only_that_spine() {
        let spines = [
            spine(1, 10.0, 10.0, 10.0, 20.0),
            spine(2, 50.0, 10.0, 50.0, 20.0),
            spine(3, 90.0, 10.0, 90.0, 20.0),
        ];
        let cells = vec![
            (SegmentId(1), unit_square(10.0, 10.0)),
            (SegmentId(2), unit_square(50.0, 10.0)),
            (SegmentId(3), unit_square(90.0, 10.0)),
        ];
        let failing_on_two = |own: &[geo::Polygon<f64>]| {
            let touches_two = own
                .iter()
                .flat_map(|p| p.exterior().coords())
                .any(|c| (c.x - 50.0).abs() < f64::EPSILON);
            if touches_two { None } else { union_cells(own) }
        };

        let regions = merge_regions(&spines, &cells, failing_on_two);
        let ids: Vec<u64> = regions.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn spine_without_cells_contributes_nothing() {
        let spines = [spine(1, 0.0, 0.0, 0.0, 1.0), spine(2, 5.0, 0.0, 5.0, 1.0)];
        let cells = vec![(SegmentId(2), unit_square(5.0, 0.0))];
        let regions = merge_regions(&spines, &cells, union_cells);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].id, 2);
    }

    #[test]
    fn multi_polygon_normalization_drops_closing_vertex() {
        let square = to_geo(&[
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(1.0, 1.0),
            Point::new(0.0, 1.0),
        ]);
        let polys = polygons_from_multi(3, &MultiPolygon::new(vec![square]));
        assert_eq!(polys.len(), 1);
        assert_eq!(polys[0].len(), 4);
        assert_eq!(polys[0].id, 3);
    }
}
