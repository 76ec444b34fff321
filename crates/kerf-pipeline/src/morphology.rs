//! Shrink, regrow and roughen the raw partition raster.
//!
//! Pieces are first shrunk by `round + gap / 2` using the inward distance
//! field, then regrown by `round` using a second distance field measured
//! outward from the shrunk set. Net effect: each piece recedes `gap / 2`
//! from the grout lines and its convex corners are rounded to radius
//! `round`. Optional seeded noise perturbs the outward field so edges
//! come out organic instead of machined.

use image::Rgba;

use crate::distance::{self, DistanceField};
use crate::organic::NoiseCache;
use crate::types::{BinaryBitmap, PipelineConfig, ShapeConfig};

/// Kept pixels: opaque white.
pub const KEPT: Rgba<u8> = Rgba([255, 255, 255, 255]);
/// Discarded pixels: fully transparent.
pub const CLEARED: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Output of [`MorphologyEngine::grow`].
#[derive(Debug, Clone)]
pub struct Growth {
    /// Kept/not-kept raster, ready for vectorization.
    pub final_mask: BinaryBitmap,
    /// Distance of every raw pixel to the nearest background pixel.
    pub inward: DistanceField,
}

/// Morphology stage with a seed-keyed noise generator that survives
/// across runs.
pub struct MorphologyEngine {
    noise_frequency: f64,
    noise: NoiseCache,
}

impl Default for MorphologyEngine {
    fn default() -> Self {
        Self::new(PipelineConfig::DEFAULT_NOISE_FREQUENCY)
    }
}

impl MorphologyEngine {
    /// Engine sampling noise at `noise_frequency` cycles per unit.
    #[must_use]
    pub fn new(noise_frequency: f64) -> Self {
        Self {
            noise_frequency,
            noise: NoiseCache::default(),
        }
    }

    /// Base noise frequency in cycles per unit.
    #[must_use]
    pub const fn noise_frequency(&self) -> f64 {
        self.noise_frequency
    }

    /// Compute the kept mask of `raw` for `cfg`.
    ///
    /// A pixel is kept when it survives the shrink (it is interior and
    /// at least `round + gap / 2` from the background) or lies within
    /// `round` of a surviving pixel, with that outward distance
    /// perturbed by noise when `noise_amplitude > 0`. Deterministic for
    /// identical inputs.
    pub fn grow(&mut self, raw: &BinaryBitmap, cfg: &ShapeConfig) -> Growth {
        let (width, height) = raw.dimensions();
        let inward = distance::transform(raw);

        let threshold = cfg.shrink_threshold();
        let shrunk: Vec<bool> = inward
            .values()
            .iter()
            .map(|&d| d > 0.0 && d >= threshold)
            .collect();

        // Negative of the shrunk set: shrunk pixels become seeds, so the
        // outward field measures distance to the nearest shrunk pixel.
        let negative = BinaryBitmap::from_fn(width, height, |x, y| {
            if shrunk[index(width, x, y)] {
                Rgba([0, 0, 0, 255])
            } else {
                Rgba([255, 255, 255, 255])
            }
        });
        let outward = distance::transform(&negative);

        let noise = if cfg.noise_amplitude > 0.0 {
            Some(self.noise.get(cfg.noise_seed, self.noise_frequency))
        } else {
            None
        };

        let final_mask = BinaryBitmap::from_fn(width, height, |x, y| {
            let i = index(width, x, y);
            let reach = noise.map_or(outward.values()[i], |n| {
                perturbed(
                    outward.values()[i],
                    n.sample(f64::from(x), f64::from(y)),
                    cfg.noise_amplitude,
                )
            });
            if shrunk[i] || reach <= cfg.round {
                KEPT
            } else {
                CLEARED
            }
        });

        tracing::debug!(
            width,
            height,
            gap = cfg.gap,
            round = cfg.round,
            noise_amplitude = cfg.noise_amplitude,
            max_inward = inward.max_distance(),
            "grew kept mask"
        );

        Growth { final_mask, inward }
    }
}

/// Run one growth with a throwaway engine at the default noise frequency.
#[must_use = "returns the kept mask and inward field"]
pub fn grow(raw: &BinaryBitmap, cfg: &ShapeConfig) -> Growth {
    MorphologyEngine::default().grow(raw, cfg)
}

/// Outward distance shifted by scaled noise, never below zero.
fn perturbed(outward: f64, noise: f64, amplitude: f64) -> f64 {
    noise.mul_add(amplitude, outward).max(0.0)
}

const fn index(width: u32, x: u32, y: u32) -> usize {
    y as usize * width as usize + x as usize
}

/// Whether a pixel of a kept mask is kept.
#[must_use]
pub fn is_kept(pixel: &Rgba<u8>) -> bool {
    pixel.0[3] > 127 && pixel.0[0] > distance::INTERIOR_THRESHOLD
}
