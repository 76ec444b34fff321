//! Shared types for the kerf shape-generation pipeline.

use serde::{Deserialize, Serialize};

use crate::distance::DistanceField;
use crate::tessellate::Sample;
use crate::vectorize::ContourTracerKind;

/// Re-export `RgbaImage` so downstream crates can reference raster
/// stages without depending on `image` directly.
pub use image::RgbaImage;

/// A monochrome raster carried in a 4-channel buffer.
///
/// Only the luminance of channel 0 and the alpha channel carry meaning:
/// the rasterizer paints opaque black/white, the morphology engine paints
/// opaque white (kept) or fully transparent (not kept).
pub type BinaryBitmap = RgbaImage;

/// A 2D point in canvas coordinates.
///
/// One canvas unit maps to one raster pixel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position (units from left edge).
    pub x: f64,
    /// Vertical position (units from top edge).
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another point.
    ///
    /// Avoids the square root for comparison purposes.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.mul_add(dx, dy * dy)
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        self.distance_squared(other).sqrt()
    }

    /// Both coordinates are finite.
    #[must_use]
    pub const fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Linear interpolation towards `other` at parameter `t`.
    #[must_use]
    pub fn lerp(self, other: Self, t: f64) -> Self {
        Self::new(
            t.mul_add(other.x - self.x, self.x),
            t.mul_add(other.y - self.y, self.y),
        )
    }
}

/// Stable identity of a user-drawn segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SegmentId(pub u64);

/// How a connector behaves in the downstream physics preview.
///
/// The pipeline never interprets this; it is carried through to
/// consumers untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PhysicalMode {
    /// Both ends locked together.
    Fixed,
    /// Free rotation around the shared point.
    Hinge,
    /// Elastic link.
    Spring,
}

/// A user-drawn line segment: either a spine (the centerline of one
/// piece) or a connector between pieces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineSegment {
    /// Stable identity, reused as the id of every region derived from
    /// this segment.
    pub id: SegmentId,
    /// First endpoint.
    pub start: Point,
    /// Second endpoint.
    pub end: Point,
    /// Optional user label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Optional physics behavior (connectors only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<PhysicalMode>,
}

impl LineSegment {
    /// Create an unlabeled segment.
    #[must_use]
    pub const fn new(id: u64, start: Point, end: Point) -> Self {
        Self {
            id: SegmentId(id),
            start,
            end,
            label: None,
            mode: None,
        }
    }

    /// Euclidean length of the segment.
    #[must_use]
    pub fn length(&self) -> f64 {
        self.start.distance(self.end)
    }
}

/// A closed ring of points with an identity.
///
/// The ring has no implicit closing duplicate: the last point connects
/// back to the first. Winding order carries no meaning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    /// Owning spine id for ownership regions, sequence number for
    /// traced pieces.
    pub id: u64,
    /// Ring vertices.
    pub points: Vec<Point>,
}

impl Polygon {
    /// Create a new polygon.
    #[must_use]
    pub const fn new(id: u64, points: Vec<Point>) -> Self {
        Self { id, points }
    }

    /// Returns the number of ring vertices.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.points.len()
    }

    /// Returns `true` if the ring has no vertices.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Signed-area magnitude by the shoelace formula.
    #[must_use]
    pub fn area(&self) -> f64 {
        let n = self.points.len();
        if n < 3 {
            return 0.0;
        }
        let twice: f64 = (0..n)
            .map(|i| {
                let a = self.points[i];
                let b = self.points[(i + 1) % n];
                a.x.mul_add(b.y, -(b.x * a.y))
            })
            .sum();
        twice.abs() / 2.0
    }

    /// Even-odd point-in-ring test.
    #[must_use]
    pub fn contains(&self, p: Point) -> bool {
        ring_contains(&self.points, p)
    }
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    /// Smallest corner.
    pub min: Point,
    /// Largest corner.
    pub max: Point,
}

impl Bounds {
    /// Bounding box of a point set, or `None` when empty or non-finite.
    #[must_use]
    pub fn of(points: &[Point]) -> Option<Self> {
        let first = *points.first()?;
        let mut bounds = Self {
            min: first,
            max: first,
        };
        for p in points {
            if !p.is_finite() {
                return None;
            }
            bounds.min.x = bounds.min.x.min(p.x);
            bounds.min.y = bounds.min.y.min(p.y);
            bounds.max.x = bounds.max.x.max(p.x);
            bounds.max.y = bounds.max.y.max(p.y);
        }
        Some(bounds)
    }

    /// Grow the box by `margin` on every side.
    #[must_use]
    pub fn expanded(self, margin: f64) -> Self {
        Self {
            min: Point::new(self.min.x - margin, self.min.y - margin),
            max: Point::new(self.max.x + margin, self.max.y + margin),
        }
    }

    /// Horizontal extent.
    #[must_use]
    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    /// Vertical extent.
    #[must_use]
    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    /// Corners in counter-clockwise order starting at `min`.
    #[must_use]
    pub const fn corners(&self) -> [Point; 4] {
        [
            self.min,
            Point::new(self.max.x, self.min.y),
            self.max,
            Point::new(self.min.x, self.max.y),
        ]
    }
}

/// The user's traced silhouette, used as a clip boundary.
///
/// Fewer than 3 points means "no mask": the rasterizer then leaves the
/// whole canvas as background.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MaskPolygon(Vec<Point>);

impl MaskPolygon {
    /// Create a mask from its outline.
    #[must_use]
    pub const fn new(points: Vec<Point>) -> Self {
        Self(points)
    }

    /// Axis-aligned rectangle covering `width` x `height` from the origin.
    #[must_use]
    pub fn rectangle(width: f64, height: f64) -> Self {
        Self(vec![
            Point::new(0.0, 0.0),
            Point::new(width, 0.0),
            Point::new(width, height),
            Point::new(0.0, height),
        ])
    }

    /// Returns a slice of the outline points.
    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.0
    }

    /// At least 3 finite points: enough to enclose an area.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        self.0.len() >= 3 && self.0.iter().all(|p| p.is_finite())
    }

    /// Bounding box of the outline.
    #[must_use]
    pub fn bounds(&self) -> Option<Bounds> {
        Bounds::of(&self.0)
    }

    /// Even-odd point-in-mask test.
    #[must_use]
    pub fn contains(&self, p: Point) -> bool {
        self.is_usable() && ring_contains(&self.0, p)
    }
}

/// Even-odd ray casting against an implicitly closed ring.
fn ring_contains(ring: &[Point], p: Point) -> bool {
    let n = ring.len();
    if n < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let a = ring[i];
        let b = ring[j];
        if (a.y > p.y) != (b.y > p.y) {
            let x_cross = (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x;
            if p.x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Raster dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Total pixel count.
    #[must_use]
    pub const fn pixel_count(self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Piece styling parameters.
///
/// Immutable per computation: changing any field invalidates every
/// downstream artifact.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShapeConfig {
    /// Total spacing reserved between adjacent pieces (each side gives up
    /// half).
    pub gap: f64,
    /// Corner-rounding radius applied when regrowing a shrunk piece.
    pub round: f64,
    /// Peak displacement of the organic edge noise; 0 disables noise.
    pub noise_amplitude: f64,
    /// Seed of the deterministic noise field.
    pub noise_seed: u32,
}

impl ShapeConfig {
    /// Reject non-finite or negative parameters.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] naming the first bad field.
    pub fn validate(&self) -> Result<(), PipelineError> {
        for (name, value) in [
            ("gap", self.gap),
            ("round", self.round),
            ("noise_amplitude", self.noise_amplitude),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(PipelineError::InvalidConfig(format!(
                    "{name} must be finite and non-negative, got {value}"
                )));
            }
        }
        Ok(())
    }

    /// Inward distance a pixel needs to survive the shrink step.
    #[must_use]
    pub fn shrink_threshold(&self) -> f64 {
        self.gap.mul_add(0.5, self.round)
    }
}

impl Default for ShapeConfig {
    fn default() -> Self {
        Self {
            gap: 4.0,
            round: 3.0,
            noise_amplitude: 0.0,
            noise_seed: 0,
        }
    }
}

/// Static settings of a pipeline instance: raster resolution, sampling
/// density and tracing options.
///
/// Per-run styling lives in [`ShapeConfig`], which arrives with every
/// request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Raster resolution. Canvas units map 1:1 onto these pixels.
    pub canvas: Dimensions,

    /// Spine sampling interval in canvas units, used when a request
    /// carries no `spacing` of its own.
    pub spacing: f64,

    /// Width of the grout lines stroked between ownership regions.
    pub stroke_width: f32,

    /// Base frequency of the organic noise, in cycles per canvas unit.
    pub noise_frequency: f64,

    /// Ramer-Douglas-Peucker tolerance applied to traced outlines.
    /// 0 keeps every traced vertex.
    pub simplify_tolerance: f64,

    /// Which contour tracer backs the vectorizer.
    pub contour_tracer: ContourTracerKind,
}

impl PipelineConfig {
    /// Default raster width in pixels.
    pub const DEFAULT_WIDTH: u32 = 600;
    /// Default raster height in pixels.
    pub const DEFAULT_HEIGHT: u32 = 800;
    /// Default spine sampling interval.
    pub const DEFAULT_SPACING: f64 = 10.0;
    /// Default grout-line width.
    pub const DEFAULT_STROKE_WIDTH: f32 = 2.0;
    /// Default noise base frequency.
    pub const DEFAULT_NOISE_FREQUENCY: f64 = 0.025;
    /// Default outline simplification tolerance.
    pub const DEFAULT_SIMPLIFY_TOLERANCE: f64 = 0.5;

    /// Reject settings the pipeline cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] describing the problem.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.canvas.width == 0 || self.canvas.height == 0 {
            return Err(PipelineError::InvalidConfig(format!(
                "canvas must be non-empty, got {}x{}",
                self.canvas.width, self.canvas.height
            )));
        }
        validate_spacing(self.spacing)?;
        if !self.stroke_width.is_finite() || self.stroke_width < 0.0 {
            return Err(PipelineError::InvalidConfig(format!(
                "stroke_width must be finite and non-negative, got {}",
                self.stroke_width
            )));
        }
        if !self.noise_frequency.is_finite() || self.noise_frequency <= 0.0 {
            return Err(PipelineError::InvalidConfig(format!(
                "noise_frequency must be positive, got {}",
                self.noise_frequency
            )));
        }
        if !self.simplify_tolerance.is_finite() || self.simplify_tolerance < 0.0 {
            return Err(PipelineError::InvalidConfig(format!(
                "simplify_tolerance must be finite and non-negative, got {}",
                self.simplify_tolerance
            )));
        }
        Ok(())
    }
}

/// Sampling intervals must be positive and finite.
pub(crate) fn validate_spacing(spacing: f64) -> Result<(), PipelineError> {
    if spacing.is_finite() && spacing > 0.0 {
        Ok(())
    } else {
        Err(PipelineError::InvalidConfig(format!(
            "spacing must be positive, got {spacing}"
        )))
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            canvas: Dimensions {
                width: Self::DEFAULT_WIDTH,
                height: Self::DEFAULT_HEIGHT,
            },
            spacing: Self::DEFAULT_SPACING,
            stroke_width: Self::DEFAULT_STROKE_WIDTH,
            noise_frequency: Self::DEFAULT_NOISE_FREQUENCY,
            simplify_tolerance: Self::DEFAULT_SIMPLIFY_TOLERANCE,
            contour_tracer: ContourTracerKind::default(),
        }
    }
}

/// Result of running the pipeline with every intermediate preserved.
///
/// Each field captures the output of one stage so previews can show the
/// partition, the raw raster and the kept mask side by side.
#[derive(Debug, Clone)]
pub struct StagedResult {
    /// Spine samples fed to the Voronoi diagram.
    pub samples: Vec<Sample>,
    /// Per-spine ownership regions.
    pub regions: Vec<Polygon>,
    /// Mask fill with grout lines carved between regions.
    pub raw: BinaryBitmap,
    /// Distance from every pixel of `raw` to the nearest background pixel.
    pub inward: DistanceField,
    /// Kept pixels after shrink, regrow and noise.
    pub final_mask: BinaryBitmap,
    /// Outlines as returned by the vectorizer, before simplification.
    pub traced: Vec<Polygon>,
    /// Final piece outlines.
    pub pieces: Vec<Polygon>,
    /// Raster dimensions.
    pub dimensions: Dimensions,
}

/// Errors that can occur during pipeline processing.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PipelineError {
    /// Pipeline or shape configuration is invalid.
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),

    /// No drawing surface could be allocated for the raster.
    #[error("no drawing surface available for a {width}x{height} raster")]
    SurfaceUnavailable {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
    },

    /// A message crossing the worker boundary was malformed.
    #[error("malformed message: {0}")]
    Protocol(String),
}
