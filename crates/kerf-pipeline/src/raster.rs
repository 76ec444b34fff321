//! Rasterization of the mask and the grout lines between regions.
//!
//! Produces the raw partition raster: the mask interior filled white,
//! the mask outline and every ownership region's outline stroked in
//! black so pieces are separated from each other and from the mask edge,
//! everything outside the mask black. Drawing is
//! done with [`tiny_skia`] without anti-aliasing so the result stays
//! strictly binary.

use tiny_skia::{
    Color, FillRule, LineCap, LineJoin, Mask, Paint, Path, PathBuilder, Pixmap, Stroke, Transform,
};
use tracing::debug;

use crate::types::{BinaryBitmap, Dimensions, MaskPolygon, Point, Polygon};

/// Rasterize `polygons` inside `mask` at the given resolution.
///
/// Every pixel starts as background (black). A usable mask (3+ points)
/// is filled foreground (white) and clips all further drawing. The mask
/// outline and each polygon outline are then stroked `stroke_width` wide
/// in background color, carving grout lines along the mask edge and
/// between ownership regions.
///
/// Returns `None` only when no drawing surface can be allocated (for
/// example a zero-sized raster). Empty geometry still yields a valid
/// all-background or mask-filled bitmap.
#[must_use = "returns the raw partition raster"]
pub fn rasterize(
    polygons: &[Polygon],
    mask: &MaskPolygon,
    dimensions: Dimensions,
    stroke_width: f32,
) -> Option<BinaryBitmap> {
    let Dimensions { width, height } = dimensions;
    let mut pixmap = Pixmap::new(width, height)?;
    pixmap.fill(Color::BLACK);

    let mask_outline = if mask.is_usable() {
        ring_path(mask.points())
    } else {
        None
    };

    let clip = if let Some(outline) = &mask_outline {
        pixmap.fill_path(
            outline,
            &solid(255),
            FillRule::EvenOdd,
            Transform::identity(),
            None,
        );
        let mut clip = Mask::new(width, height)?;
        clip.fill_path(outline, FillRule::EvenOdd, false, Transform::identity());
        Some(clip)
    } else {
        None
    };

    if stroke_width > 0.0 {
        let stroke = Stroke {
            width: stroke_width,
            line_cap: LineCap::Round,
            line_join: LineJoin::Round,
            ..Stroke::default()
        };
        let grout = solid(0);
        // Only the inner half of the mask stroke survives the clip.
        if let Some(outline) = &mask_outline {
            pixmap.stroke_path(outline, &grout, &stroke, Transform::identity(), clip.as_ref());
        }
        let mut stroked = 0_usize;
        for polygon in polygons {
            if let Some(path) = ring_path(&polygon.points) {
                pixmap.stroke_path(&path, &grout, &stroke, Transform::identity(), clip.as_ref());
                stroked += 1;
            }
        }
        debug!(stroked, width, height, "carved grout lines");
    }

    BinaryBitmap::from_raw(width, height, pixmap.take())
}

/// Opaque gray paint without anti-aliasing.
fn solid(level: u8) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(level, level, level, 255);
    paint.anti_alias = false;
    paint
}

/// Closed path through a ring, or `None` for fewer than 2 points.
#[allow(clippy::cast_possible_truncation)]
fn ring_path(ring: &[Point]) -> Option<Path> {
    let (first, rest) = ring.split_first()?;
    if rest.is_empty() {
        return None;
    }
    let mut pb = PathBuilder::new();
    pb.move_to(first.x as f32, first.y as f32);
    for p in rest {
        pb.line_to(p.x as f32, p.y as f32);
    }
    pb.close();
    pb.finish()
}
