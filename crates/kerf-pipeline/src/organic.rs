//! Seeded multi-octave noise for organic piece edges.
//!
//! Wraps an [`OpenSimplex`] generator from the `noise` crate. The field
//! is a pure function of `(seed, x, y)`; [`NoiseCache`] keeps the
//! generator for the last seed so repeated runs with the same seed skip
//! rebuilding its permutation table.

use noise::{NoiseFn, OpenSimplex};

/// Phase offset of the second octave (sampled at twice the base frequency).
const OCTAVE_2_OFFSET: [f64; 2] = [31.7, 47.3];
/// Phase offset of the third octave (sampled at three times the base frequency).
const OCTAVE_3_OFFSET: [f64; 2] = [-113.1, 71.9];

/// Three-octave noise field, roughly in `[-1, 1]`.
pub struct OrganicNoise {
    seed: u32,
    frequency: f64,
    source: OpenSimplex,
}

impl OrganicNoise {
    /// Build the field for `seed` at base `frequency` (cycles per unit).
    #[must_use]
    pub fn new(seed: u32, frequency: f64) -> Self {
        Self {
            seed,
            frequency,
            source: OpenSimplex::new(seed),
        }
    }

    /// Seed the field was built from.
    #[must_use]
    pub const fn seed(&self) -> u32 {
        self.seed
    }

    /// Base frequency in cycles per unit.
    #[must_use]
    pub const fn frequency(&self) -> f64 {
        self.frequency
    }

    /// Combined value `(n1 + 0.5 n2 + 0.25 n3) / 1.75` at `(x, y)`.
    #[must_use]
    pub fn sample(&self, x: f64, y: f64) -> f64 {
        let f = self.frequency;
        let n1 = self.source.get([x * f, y * f]);
        let n2 = self.source.get([
            x.mul_add(2.0 * f, OCTAVE_2_OFFSET[0]),
            y.mul_add(2.0 * f, OCTAVE_2_OFFSET[1]),
        ]);
        let n3 = self.source.get([
            x.mul_add(3.0 * f, OCTAVE_3_OFFSET[0]),
            y.mul_add(3.0 * f, OCTAVE_3_OFFSET[1]),
        ]);
        0.25f64.mul_add(n3, 0.5f64.mul_add(n2, n1)) / 1.75
    }
}

/// Holds the generator for the most recently requested seed.
#[derive(Default)]
pub struct NoiseCache {
    current: Option<OrganicNoise>,
}

impl NoiseCache {
    /// Generator for `seed` and `frequency`, rebuilt only when either changed.
    pub fn get(&mut self, seed: u32, frequency: f64) -> &OrganicNoise {
        if self
            .current
            .as_ref()
            .is_some_and(|n| n.seed != seed || n.frequency.to_bits() != frequency.to_bits())
        {
            self.current = None;
        }
        self.current.get_or_insert_with(|| {
            tracing::debug!(seed, frequency, "building noise generator");
            OrganicNoise::new(seed, frequency)
        })
    }
}
