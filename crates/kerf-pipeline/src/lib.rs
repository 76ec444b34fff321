//! kerf-pipeline: Pure shape-generation pipeline (sans-IO).
//!
//! Turns user-drawn spines inside a silhouette into non-overlapping,
//! laser-cuttable piece outlines through:
//! tessellation -> rasterization -> distance transform -> morphology ->
//! vectorization -> simplification.
//!
//! This crate has **no I/O dependencies**: it operates on in-memory
//! geometry and returns structured data. Background execution lives in
//! `kerf-worker`, markup in `kerf-export`.

pub mod diagnostics;
pub mod distance;
pub mod generator;
pub mod morphology;
pub mod organic;
pub mod protocol;
pub mod raster;
pub mod scheduler;
pub mod simplify;
pub mod tessellate;
pub mod types;
pub mod vectorize;

pub use diagnostics::{Clock, PipelineDiagnostics, WebClock};
pub use generator::{Generator, MarkupRenderer};
pub use morphology::MorphologyEngine;
pub use protocol::{GenerateRequest, GenerateResponse, Outcome};
pub use scheduler::{ResponseGate, Scheduler, Submission};
pub use types::{
    BinaryBitmap, Dimensions, LineSegment, MaskPolygon, PipelineConfig, PipelineError, Point,
    Polygon, SegmentId, ShapeConfig, StagedResult,
};
pub use vectorize::{ContourTracer, ContourTracerKind};

use diagnostics::{PipelineSummary, StageDiagnostics, StageMetrics};

/// Run the full pipeline and return the piece outlines.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] for invalid settings and
/// [`PipelineError::SurfaceUnavailable`] when no raster can be allocated.
pub fn process(
    request: &GenerateRequest,
    config: &PipelineConfig,
) -> Result<Vec<Polygon>, PipelineError> {
    process_staged(request, config).map(|staged| staged.pieces)
}

/// Run the full pipeline, preserving every intermediate result.
///
/// # Errors
///
/// Same as [`process`].
pub fn process_staged(
    request: &GenerateRequest,
    config: &PipelineConfig,
) -> Result<StagedResult, PipelineError> {
    process_staged_with_diagnostics(request, config, &WebClock).map(|(staged, _)| staged)
}

/// Run the full pipeline, timing each stage with `clock`.
///
/// # Errors
///
/// Same as [`process`].
pub fn process_staged_with_diagnostics<C: Clock>(
    request: &GenerateRequest,
    config: &PipelineConfig,
    clock: &C,
) -> Result<(StagedResult, PipelineDiagnostics), PipelineError> {
    let mut morphology = MorphologyEngine::new(config.noise_frequency);
    run(request, config, &mut morphology, clock)
}

/// Shared pipeline body.
///
/// # Pipeline steps
///
/// 1. Spine sampling, Voronoi partition, per-spine union
/// 2. Mask fill and grout-line rasterization
/// 3. Inward distance transform, shrink, regrow, noise
/// 4. Contour tracing and trace normalization
/// 5. Outline simplification (Ramer-Douglas-Peucker)
pub(crate) fn run<C: Clock>(
    request: &GenerateRequest,
    config: &PipelineConfig,
    morphology: &mut MorphologyEngine,
    clock: &C,
) -> Result<(StagedResult, PipelineDiagnostics), PipelineError> {
    config.validate()?;
    request.config.validate()?;
    let spacing = request.spacing.unwrap_or(config.spacing);
    types::validate_spacing(spacing)?;

    let started = clock.now();

    // 1. Tessellation.
    let t = clock.now();
    let partition = tessellate::tessellate(&request.spines, &request.mask, spacing);
    let tessellate = StageDiagnostics {
        duration: clock.elapsed(&t),
        metrics: StageMetrics::Tessellate {
            spine_count: request.spines.len(),
            sample_count: partition.samples.len(),
            region_count: partition.regions.len(),
        },
    };

    // 2. Rasterization.
    let t = clock.now();
    let dimensions = config.canvas;
    let raw = raster::rasterize(
        &partition.regions,
        &request.mask,
        dimensions,
        config.stroke_width,
    )
    .ok_or(PipelineError::SurfaceUnavailable {
        width: dimensions.width,
        height: dimensions.height,
    })?;
    let rasterize = StageDiagnostics {
        duration: clock.elapsed(&t),
        metrics: StageMetrics::Rasterize {
            width: dimensions.width,
            height: dimensions.height,
            foreground_pixel_count: diagnostics::count_foreground_pixels(&raw),
        },
    };

    // 3. Morphology.
    let t = clock.now();
    let growth = morphology.grow(&raw, &request.config);
    let morphology = StageDiagnostics {
        duration: clock.elapsed(&t),
        metrics: StageMetrics::Morphology {
            gap: request.config.gap,
            round: request.config.round,
            noise_amplitude: request.config.noise_amplitude,
            max_inward_distance: growth.inward.max_distance(),
            kept_pixel_count: diagnostics::count_kept_pixels(&growth.final_mask),
        },
    };

    // 4. Vectorization.
    let t = clock.now();
    let traced = vectorize::vectorize_with(&growth.final_mask, &config.contour_tracer);
    let stats = diagnostics::piece_stats(&traced);
    let vectorize = StageDiagnostics {
        duration: clock.elapsed(&t),
        metrics: StageMetrics::Vectorize {
            piece_count: traced.len(),
            total_point_count: stats.total,
            min_piece_points: stats.min,
            max_piece_points: stats.max,
            mean_piece_points: stats.mean,
        },
    };

    // 5. Simplification.
    let t = clock.now();
    let pieces = simplify::simplify_polygons(&traced, config.simplify_tolerance);
    let points_after = diagnostics::total_points(&pieces);
    #[allow(clippy::cast_precision_loss)]
    let reduction_ratio = if stats.total > 0 {
        1.0 - points_after as f64 / stats.total as f64
    } else {
        0.0
    };
    let simplify = StageDiagnostics {
        duration: clock.elapsed(&t),
        metrics: StageMetrics::Simplify {
            tolerance: config.simplify_tolerance,
            points_before: stats.total,
            points_after,
            reduction_ratio,
        },
    };

    let diagnostics = PipelineDiagnostics {
        tessellate,
        rasterize,
        morphology,
        vectorize,
        simplify,
        total_duration: clock.elapsed(&started),
        summary: PipelineSummary {
            canvas_width: dimensions.width,
            canvas_height: dimensions.height,
            pixel_count: dimensions.pixel_count(),
            spine_count: request.spines.len(),
            piece_count: pieces.len(),
            final_point_count: points_after,
        },
    };

    tracing::debug!(
        id = request.id,
        spines = request.spines.len(),
        pieces = pieces.len(),
        "pipeline finished"
    );

    let staged = StagedResult {
        samples: partition.samples,
        regions: partition.regions,
        raw,
        inward: growth.inward,
        final_mask: growth.final_mask,
        traced,
        pieces,
        dimensions,
    };
    Ok((staged, diagnostics))
}
