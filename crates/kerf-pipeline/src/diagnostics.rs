//! Pipeline diagnostics: timing, counts, and other metrics for each stage.
//!
//! These diagnostics are permanent instrumentation intended for
//! parameter experimentation. Every call to
//! [`process_staged_with_diagnostics`](crate::process_staged_with_diagnostics)
//! collects them alongside the pipeline results.
//!
//! Timestamps come from a [`Clock`] so the core never touches a platform
//! timer itself. [`WebClock`] uses the `web-time` crate, which maps to
//! `performance.now()` on WASM and `std::time::Instant` on native.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::distance::INTERIOR_THRESHOLD;
use crate::morphology::is_kept;
use crate::types::{BinaryBitmap, Polygon};

/// Source of monotonic timestamps for stage timing.
pub trait Clock {
    /// Opaque timestamp.
    type Instant;

    /// Current timestamp.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// [`Clock`] backed by [`web_time::Instant`].
#[derive(Debug, Clone, Copy, Default)]
pub struct WebClock;

impl Clock for WebClock {
    type Instant = web_time::Instant;

    fn now(&self) -> web_time::Instant {
        web_time::Instant::now()
    }

    fn elapsed(&self, since: &web_time::Instant) -> Duration {
        since.elapsed()
    }
}

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Diagnostics collected from a single pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDiagnostics {
    /// Stage 1: spine sampling, Voronoi and per-spine union.
    pub tessellate: StageDiagnostics,
    /// Stage 2: mask fill and grout lines.
    pub rasterize: StageDiagnostics,
    /// Stage 3: distance fields, shrink, regrow and noise.
    pub morphology: StageDiagnostics,
    /// Stage 4: contour tracing and trace normalization.
    pub vectorize: StageDiagnostics,
    /// Stage 5: RDP outline simplification.
    pub simplify: StageDiagnostics,
    /// Total wall-clock duration of the entire pipeline (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary counts across all stages.
    pub summary: PipelineSummary,
}

/// Diagnostics for a single pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics (counts, sizes, etc.).
    pub metrics: StageMetrics,
}

/// Stage-specific metrics that vary by pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Tessellation metrics.
    Tessellate {
        /// Number of input spines.
        spine_count: usize,
        /// Number of samples fed to the Voronoi diagram.
        sample_count: usize,
        /// Number of ownership regions produced.
        region_count: usize,
    },
    /// Rasterization metrics.
    Rasterize {
        /// Raster width in pixels.
        width: u32,
        /// Raster height in pixels.
        height: u32,
        /// Pixels left interior after grout lines were carved.
        foreground_pixel_count: u64,
    },
    /// Morphology metrics.
    Morphology {
        /// Gap applied.
        gap: f64,
        /// Corner radius applied.
        round: f64,
        /// Noise amplitude applied.
        noise_amplitude: f64,
        /// Largest inward distance of the raw raster.
        max_inward_distance: f64,
        /// Pixels kept in the final mask.
        kept_pixel_count: u64,
    },
    /// Vectorization metrics.
    Vectorize {
        /// Number of pieces traced.
        piece_count: usize,
        /// Total number of points across all pieces.
        total_point_count: usize,
        /// Minimum points in any single piece.
        min_piece_points: usize,
        /// Maximum points in any single piece.
        max_piece_points: usize,
        /// Mean points per piece.
        mean_piece_points: f64,
    },
    /// Outline simplification metrics.
    Simplify {
        /// RDP tolerance in pixels.
        tolerance: f64,
        /// Total points before simplification.
        points_before: usize,
        /// Total points after simplification.
        points_after: usize,
        /// Reduction ratio: `1.0 - (after / before)`.
        reduction_ratio: f64,
    },
}

/// High-level summary counts for the entire pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Canvas width in pixels.
    pub canvas_width: u32,
    /// Canvas height in pixels.
    pub canvas_height: u32,
    /// Total pixel count.
    pub pixel_count: u64,
    /// Number of input spines.
    pub spine_count: usize,
    /// Number of output pieces.
    pub piece_count: usize,
    /// Points across all output pieces.
    pub final_point_count: usize,
}

impl PipelineDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Pipeline Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Canvas: {}x{} ({} pixels)",
            self.summary.canvas_width, self.summary.canvas_height, self.summary.pixel_count,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<24} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);

        for (name, diag) in self.stages() {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<24} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.push(String::new());
        lines.push(format!(
            "Spines: {}  |  Pieces: {}  |  Final points: {}",
            self.summary.spine_count, self.summary.piece_count, self.summary.final_point_count,
        ));

        lines.join("\n")
    }

    /// Stages in execution order with display names.
    #[must_use]
    pub fn stages(&self) -> [(&'static str, &StageDiagnostics); 5] {
        [
            ("Tessellate", &self.tessellate),
            ("Rasterize", &self.rasterize),
            ("Morphology", &self.morphology),
            ("Vectorize", &self.vectorize),
            ("Simplify", &self.simplify),
        ]
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Tessellate {
            spine_count,
            sample_count,
            region_count,
        } => format!("{spine_count} spines, {sample_count} samples -> {region_count} regions"),
        StageMetrics::Rasterize {
            width,
            height,
            foreground_pixel_count,
        } => format!("{width}x{height} fg={foreground_pixel_count}"),
        StageMetrics::Morphology {
            gap,
            round,
            noise_amplitude,
            max_inward_distance,
            kept_pixel_count,
        } => format!(
            "gap={gap:.1} round={round:.1} noise={noise_amplitude:.1} max_in={max_inward_distance:.1} kept={kept_pixel_count}",
        ),
        StageMetrics::Vectorize {
            piece_count,
            total_point_count,
            min_piece_points,
            max_piece_points,
            mean_piece_points,
        } => format!(
            "{piece_count} pieces, {total_point_count} pts (min={min_piece_points} max={max_piece_points} mean={mean_piece_points:.1})",
        ),
        StageMetrics::Simplify {
            tolerance,
            points_before,
            points_after,
            reduction_ratio,
        } => format!(
            "tol={tolerance:.2} {points_before}->{points_after} pts ({:.1}% reduction)",
            reduction_ratio * 100.0,
        ),
    }
}

/// Count interior pixels of a raw partition raster.
pub(crate) fn count_foreground_pixels(raster: &BinaryBitmap) -> u64 {
    raster
        .pixels()
        .map(|p| u64::from(u8::from(p.0[0] > INTERIOR_THRESHOLD)))
        .sum()
}

/// Count kept pixels of a final mask.
pub(crate) fn count_kept_pixels(mask: &BinaryBitmap) -> u64 {
    mask.pixels().map(|p| u64::from(u8::from(is_kept(p)))).sum()
}

/// Statistics for a set of piece outlines.
pub(crate) struct PieceStats {
    /// Total number of points across all pieces.
    pub total: usize,
    /// Minimum number of points in any single piece.
    pub min: usize,
    /// Maximum number of points in any single piece.
    pub max: usize,
    /// Mean number of points per piece.
    pub mean: f64,
}

/// Compute point statistics from a set of outlines.
pub(crate) fn piece_stats(pieces: &[Polygon]) -> PieceStats {
    let total = total_points(pieces);
    let min = pieces.iter().map(Polygon::len).min().unwrap_or(0);
    let max = pieces.iter().map(Polygon::len).max().unwrap_or(0);
    #[allow(clippy::cast_precision_loss)]
    let mean = if pieces.is_empty() {
        0.0
    } else {
        total as f64 / pieces.len() as f64
    };
    PieceStats {
        total,
        min,
        max,
        mean,
    }
}

/// Total points across a slice of outlines.
pub(crate) fn total_points(pieces: &[Polygon]) -> usize {
    pieces.iter().map(Polygon::len).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Point;

    fn stage(ms: u64, metrics: StageMetrics) -> StageDiagnostics {
        StageDiagnostics {
            duration: Duration::from_millis(ms),
            metrics,
        }
    }

    fn sample_diagnostics() -> PipelineDiagnostics {
        PipelineDiagnostics {
            tessellate: stage(
                12,
                StageMetrics::Tessellate {
                    spine_count: 3,
                    sample_count: 60,
                    region_count: 3,
                },
            ),
            rasterize: stage(
                4,
                StageMetrics::Rasterize {
                    width: 600,
                    height: 800,
                    foreground_pixel_count: 200_000,
                },
            ),
            morphology: stage(
                30,
                StageMetrics::Morphology {
                    gap: 4.0,
                    round: 3.0,
                    noise_amplitude: 0.0,
                    max_inward_distance: 80.0,
                    kept_pixel_count: 180_000,
                },
            ),
            vectorize: stage(
                8,
                StageMetrics::Vectorize {
                    piece_count: 3,
                    total_point_count: 900,
                    min_piece_points: 250,
                    max_piece_points: 350,
                    mean_piece_points: 300.0,
                },
            ),
            simplify: stage(
                1,
                StageMetrics::Simplify {
                    tolerance: 0.5,
                    points_before: 900,
                    points_after: 90,
                    reduction_ratio: 0.9,
                },
            ),
            total_duration: Duration::from_millis(55),
            summary: PipelineSummary {
                canvas_width: 600,
                canvas_height: 800,
                pixel_count: 480_000,
                spine_count: 3,
                piece_count: 3,
                final_point_count: 90,
            },
        }
    }

    #[test]
    fn duration_ms_converts_correctly() {
        let ms = duration_ms(Duration::from_millis(1234));
        assert!((ms - 1234.0).abs() < 0.01);
    }

    #[test]
    fn piece_stats_empty() {
        let stats = piece_stats(&[]);
        assert_eq!(stats.total, 0);
        assert_eq!(stats.min, 0);
        assert_eq!(stats.max, 0);
        assert!((stats.mean - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn piece_stats_computes() {
        let ring = |n: u32| -> Vec<Point> {
            (0..n).map(|i| Point::new(f64::from(i), 0.0)).collect()
        };
        let pieces = vec![Polygon::new(0, ring(3)), Polygon::new(1, ring(5))];
        let stats = piece_stats(&pieces);
        assert_eq!(stats.total, 8);
        assert_eq!(stats.min, 3);
        assert_eq!(stats.max, 5);
        assert!((stats.mean - 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn counts_foreground_and_kept() {
        let mut raster = BinaryBitmap::from_pixel(4, 4, image::Rgba([0, 0, 0, 255]));
        raster.put_pixel(1, 1, image::Rgba([255, 255, 255, 255]));
        raster.put_pixel(2, 1, image::Rgba([255, 255, 255, 0]));
        assert_eq!(count_foreground_pixels(&raster), 2);
        assert_eq!(count_kept_pixels(&raster), 1);
    }

    #[test]
    fn report_lists_every_stage() {
        let report = sample_diagnostics().report();
        assert!(report.contains("Pipeline Diagnostics Report"));
        for name in ["Tessellate", "Rasterize", "Morphology", "Vectorize", "Simplify"] {
            assert!(report.contains(name), "missing {name}");
        }
        assert!(report.contains("90.0% reduction"));
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn durations_serialize_as_seconds() {
        let json = serde_json::to_value(sample_diagnostics()).unwrap();
        assert!((json["total_duration"].as_f64().unwrap() - 0.055).abs() < 1e-9);
        let back: PipelineDiagnostics = serde_json::from_value(json).unwrap();
        let drift = back.total_duration.abs_diff(Duration::from_millis(55));
        assert!(drift < Duration::from_micros(1));
    }

    #[test]
    fn web_clock_is_monotonic() {
        let clock = WebClock;
        let start = clock.now();
        assert!(clock.elapsed(&start) < Duration::from_secs(60));
    }
}
