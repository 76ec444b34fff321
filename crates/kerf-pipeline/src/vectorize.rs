//! Vectorization: turn the kept mask into piece outlines.
//!
//! Point extraction is delegated to a [`ContourTracer`]; this module only
//! normalizes what the tracer returns. Degenerate traces are dropped,
//! coincident traces are emitted once, and a leading full-canvas frame
//! trace is discarded when one shows up.
//!
//! # Strategy pattern
//!
//! The trait/enum pair lets a configuration pick the tracer at runtime
//! while every implementation stays in the sans-IO core.

use std::collections::HashSet;

use image::{GrayImage, Luma};
use imageproc::contours::BorderType;
use serde::{Deserialize, Serialize};

use crate::morphology::is_kept;
use crate::types::{BinaryBitmap, Bounds, Point, Polygon};

/// Area a frame trace may lack against the full canvas rectangle, in
/// square pixels, to absorb corner cuts by the tracer.
const FRAME_AREA_SLACK: f64 = 1.0;

/// Selects which contour tracing algorithm backs the vectorizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ContourTracerKind {
    /// Suzuki-Abe border following via `imageproc::contours::find_contours`.
    ///
    /// Emits one outer border per connected kept region; holes are
    /// ignored since pieces are simple polygons.
    #[default]
    BorderFollowing,
}

/// Trait for contour tracing strategies.
///
/// Input: a binary image (non-zero pixels belong to a piece).
/// Output: one closed point ring per traced outline, in tracer order.
pub trait ContourTracer {
    /// Trace outlines in the given binary image.
    fn trace(&self, pieces: &GrayImage) -> Vec<Vec<Point>>;
}

impl ContourTracer for ContourTracerKind {
    fn trace(&self, pieces: &GrayImage) -> Vec<Vec<Point>> {
        match *self {
            Self::BorderFollowing => trace_border_following(pieces),
        }
    }
}

fn trace_border_following(pieces: &GrayImage) -> Vec<Vec<Point>> {
    imageproc::contours::find_contours::<u32>(pieces)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer)
        .map(|c| {
            c.points
                .into_iter()
                .map(|p| Point::new(f64::from(p.x), f64::from(p.y)))
                .collect()
        })
        .collect()
}

/// Vectorize a kept mask with the default tracer.
#[must_use = "returns the piece outlines"]
pub fn vectorize(mask: &BinaryBitmap) -> Vec<Polygon> {
    vectorize_with(mask, &ContourTracerKind::default())
}

/// Vectorize a kept mask with a specific tracer.
///
/// Output polygons are numbered in emission order starting at 0.
#[must_use = "returns the piece outlines"]
pub fn vectorize_with(mask: &BinaryBitmap, tracer: &impl ContourTracer) -> Vec<Polygon> {
    let (width, height) = mask.dimensions();
    let pieces = GrayImage::from_fn(width, height, |x, y| {
        if is_kept(mask.get_pixel(x, y)) {
            Luma([255])
        } else {
            Luma([0])
        }
    });

    let mut traces = tracer.trace(&pieces);
    traces.retain(|ring| ring.len() >= 3);

    if traces.len() > 1 && is_canvas_frame(&traces[0], width, height) {
        tracing::debug!(
            points = traces[0].len(),
            "discarding leading full-canvas frame trace"
        );
        traces.remove(0);
    } else if !traces.is_empty() {
        tracing::debug!("leading trace is not a canvas frame, keeping it");
    }

    let mut seen = HashSet::new();
    let mut polygons = Vec::with_capacity(traces.len());
    for ring in traces {
        if !seen.insert(signature(&ring)) {
            tracing::debug!(points = ring.len(), "dropping duplicate trace");
            continue;
        }
        let id = polygons.len() as u64;
        polygons.push(Polygon::new(id, ring));
    }

    tracing::debug!(pieces = polygons.len(), width, height, "vectorized kept mask");
    polygons
}

/// Whether a trace is the canvas rectangle itself: it touches all four
/// edges and encloses the full pixel-center area. A piece that merely
/// reaches every edge has a smaller area and is not a frame.
fn is_canvas_frame(ring: &[Point], width: u32, height: u32) -> bool {
    let right = f64::from(width.saturating_sub(1));
    let bottom = f64::from(height.saturating_sub(1));
    let spans = Bounds::of(ring).is_some_and(|b| {
        b.min.x <= 0.0 && b.min.y <= 0.0 && b.max.x >= right && b.max.y >= bottom
    });
    spans && Polygon::new(0, ring.to_vec()).area() >= right.mul_add(bottom, -FRAME_AREA_SLACK)
}

/// Coordinate-rounded identity of a trace.
#[allow(clippy::cast_possible_truncation)]
fn signature(ring: &[Point]) -> Vec<(i64, i64)> {
    ring.iter()
        .map(|p| (p.x.round() as i64, p.y.round() as i64))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::morphology::{CLEARED, KEPT};

    fn mask_with(width: u32, height: u32, kept: impl Fn(u32, u32) -> bool) -> BinaryBitmap {
        BinaryBitmap::from_fn(width, height, |x, y| if kept(x, y) { KEPT } else { CLEARED })
    }

    /// Tracer returning canned rings, for exercising post-processing.
    struct Canned(Vec<Vec<Point>>);

    impl ContourTracer for Canned {
        fn trace(&self, _: &GrayImage) -> Vec<Vec<Point>> {
            self.0.clone()
        }
    }

    fn square(x: f64, y: f64, side: f64) -> Vec<Point> {
        vec![
            Point::new(x, y),
            Point::new(x + side, y),
            Point::new(x + side, y + side),
            Point::new(x, y + side),
        ]
    }

    #[test]
    fn default_is_border_following() {
        assert_eq!(
            ContourTracerKind::default(),
            ContourTracerKind::BorderFollowing
        );
    }

    #[test]
    fn empty_mask_produces_no_pieces() {
        assert!(vectorize(&mask_with(10, 10, |_, _| false)).is_empty());
    }

    #[test]
    fn two_blocks_produce_two_pieces() {
        let mask = mask_with(40, 20, |x, y| {
            (2..10).contains(&y) && ((2..12).contains(&x) || (20..35).contains(&x))
        });
        let pieces = vectorize(&mask);
        assert_eq!(pieces.len(), 2);
        assert_eq!(pieces[0].id, 0);
        assert_eq!(pieces[1].id, 1);
        for piece in &pieces {
            assert!(piece.len() >= 3);
        }
    }

    #[test]
    fn holes_are_not_pieces() {
        let mask = mask_with(30, 30, |x, y| {
            let outer = (3..27).contains(&x) && (3..27).contains(&y);
            let hole = (10..20).contains(&x) && (10..20).contains(&y);
            outer && !hole
        });
        assert_eq!(vectorize(&mask).len(), 1);
    }

    #[test]
    fn lone_full_canvas_piece_is_kept() {
        let pieces = vectorize(&mask_with(16, 12, |_, _| true));
        assert_eq!(pieces.len(), 1);
    }

    #[test]
    fn single_pixel_trace_is_degenerate() {
        let pieces = vectorize(&mask_with(10, 10, |x, y| x == 5 && y == 5));
        assert!(pieces.is_empty());
    }

    #[test]
    fn leading_frame_is_dropped() {
        let tracer = Canned(vec![square(0.0, 0.0, 19.0), square(4.0, 4.0, 5.0)]);
        let pieces = vectorize_with(&mask_with(20, 20, |_, _| false), &tracer);
        assert_eq!(pieces.len(), 1);
        assert_eq!(pieces[0].points, square(4.0, 4.0, 5.0));
    }

    #[test]
    fn leading_non_frame_is_kept() {
        let tracer = Canned(vec![square(1.0, 1.0, 5.0), square(10.0, 10.0, 5.0)]);
        let pieces = vectorize_with(&mask_with(20, 20, |_, _| false), &tracer);
        assert_eq!(pieces.len(), 2);
    }

    #[test]
    fn leading_piece_touching_every_edge_is_kept() {
        // An L-shaped piece reaching all four edges of a 20x20 canvas,
        // followed by a piece in the notch.
        let l_shape = vec![
            Point::new(0.0, 0.0),
            Point::new(19.0, 0.0),
            Point::new(19.0, 12.0),
            Point::new(12.0, 12.0),
            Point::new(12.0, 19.0),
            Point::new(0.0, 19.0),
        ];
        let tracer = Canned(vec![l_shape.clone(), square(15.0, 15.0, 3.0)]);
        let pieces = vectorize_with(&mask_with(20, 20, |_, _| false), &tracer);
        assert_eq!(pieces.len(), 2);
        assert_eq!(pieces[0].points, l_shape);
    }

    #[test]
    fn frame_needs_the_full_canvas_area() {
        assert!(is_canvas_frame(&square(0.0, 0.0, 19.0), 20, 20));
        // Corner pixel cut off by the tracer.
        let clipped = vec![
            Point::new(1.0, 0.0),
            Point::new(19.0, 0.0),
            Point::new(19.0, 19.0),
            Point::new(0.0, 19.0),
            Point::new(0.0, 1.0),
        ];
        assert!(is_canvas_frame(&clipped, 20, 20));
        assert!(!is_canvas_frame(&square(0.0, 0.0, 18.0), 20, 20));
    }

    #[test]
    fn duplicates_and_degenerates_are_removed() {
        let mut jittered = square(4.0, 4.0, 5.0);
        jittered[0].x += 0.2;
        let tracer = Canned(vec![
            square(4.0, 4.0, 5.0),
            vec![Point::new(1.0, 1.0), Point::new(2.0, 2.0)],
            jittered,
            square(12.0, 4.0, 3.0),
        ]);
        let pieces = vectorize_with(&mask_with(20, 20, |_, _| false), &tracer);
        assert_eq!(pieces.len(), 2);
        assert_eq!(pieces[1].points, square(12.0, 4.0, 3.0));
        assert_eq!(pieces[1].id, 1);
    }
}
