//! Exact Euclidean distance transform (Felzenszwalb-Huttenlocher).
//!
//! Pixels brighter than [`INTERIOR_THRESHOLD`] are interior; every other
//! pixel is a boundary seed. The transform yields, for every pixel, the
//! Euclidean distance to the nearest seed. It runs a 1-D lower-envelope
//! pass over every column and then over every row of the column result,
//! which is exact and linear in the pixel count.

use crate::types::BinaryBitmap;

/// Channel-0 values strictly above this are interior.
pub const INTERIOR_THRESHOLD: u8 = 127;

/// Squared-distance seed value of interior pixels.
///
/// Large but finite so the envelope arithmetic never meets infinities.
pub const SENTINEL: f64 = 1e20;

/// Per-pixel distance to the nearest boundary seed.
///
/// Read-only once built.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceField {
    width: u32,
    height: u32,
    field: Vec<f64>,
    max_distance: f64,
}

impl DistanceField {
    /// Distance reported for pixels no seed reaches (`SENTINEL.sqrt()`).
    pub const UNREACHED: f64 = 1e10;

    /// Field width in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Field height in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Row-major distances.
    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.field
    }

    /// Distance at pixel `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if the coordinates are out of bounds.
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> f64 {
        self.field[y as usize * self.width as usize + x as usize]
    }

    /// Largest distance reached from a seed; 0 when there are no seeds.
    #[must_use]
    pub const fn max_distance(&self) -> f64 {
        self.max_distance
    }
}

/// Compute the distance field of `bitmap`.
///
/// An all-seed bitmap yields all zeros. An all-interior bitmap yields
/// [`DistanceField::UNREACHED`] everywhere and a `max_distance` of 0.
#[must_use = "returns the distance field"]
pub fn transform(bitmap: &BinaryBitmap) -> DistanceField {
    let (width, height) = bitmap.dimensions();
    let (w, h) = (width as usize, height as usize);

    let mut grid: Vec<f64> = bitmap
        .pixels()
        .map(|p| {
            if p.0[0] > INTERIOR_THRESHOLD {
                SENTINEL
            } else {
                0.0
            }
        })
        .collect();

    let mut envelope = Envelope::with_capacity(w.max(h));
    let mut line = vec![0.0; w.max(h)];

    for x in 0..w {
        for y in 0..h {
            line[y] = grid[y * w + x];
        }
        envelope.transform(&mut line[..h]);
        for y in 0..h {
            grid[y * w + x] = line[y];
        }
    }

    for row in grid.chunks_exact_mut(w.max(1)) {
        envelope.transform(row);
    }

    let mut max_distance = 0.0_f64;
    for value in &mut grid {
        let reached = *value < SENTINEL;
        *value = value.sqrt();
        if reached && value.is_finite() {
            max_distance = max_distance.max(*value);
        }
    }

    DistanceField {
        width,
        height,
        field: grid,
        max_distance,
    }
}

/// Scratch buffers for the 1-D lower-envelope transform, reused across
/// lines.
struct Envelope {
    /// Seed positions owning each envelope segment.
    owners: Vec<usize>,
    /// Segment boundaries; `bounds[k]..bounds[k + 1]` belongs to `owners[k]`.
    bounds: Vec<f64>,
    /// Copy of the input line.
    input: Vec<f64>,
}

impl Envelope {
    fn with_capacity(n: usize) -> Self {
        Self {
            owners: vec![0; n],
            bounds: vec![0.0; n + 1],
            input: vec![0.0; n],
        }
    }

    /// Replace `line[q]` with `min_v (q - v)^2 + line[v]`.
    #[allow(clippy::cast_precision_loss)]
    fn transform(&mut self, line: &mut [f64]) {
        let n = line.len();
        if n == 0 {
            return;
        }
        self.input[..n].copy_from_slice(line);
        let f = &self.input[..n];

        let intersect = |f: &[f64], q: usize, v: usize| {
            let (qf, vf) = (q as f64, v as f64);
            (qf.mul_add(qf, f[q]) - vf.mul_add(vf, f[v])) / (2.0 * qf - 2.0 * vf)
        };

        let mut k = 0;
        self.owners[0] = 0;
        self.bounds[0] = f64::NEG_INFINITY;
        self.bounds[1] = f64::INFINITY;

        for q in 1..n {
            let mut s = intersect(f, q, self.owners[k]);
            while s <= self.bounds[k] {
                k -= 1;
                s = intersect(f, q, self.owners[k]);
            }
            k += 1;
            self.owners[k] = q;
            self.bounds[k] = s;
            self.bounds[k + 1] = f64::INFINITY;
        }

        k = 0;
        for (q, out) in line.iter_mut().enumerate() {
            while self.bounds[k + 1] < q as f64 {
                k += 1;
            }
            let v = self.owners[k];
            let d = q as f64 - v as f64;
            *out = d.mul_add(d, f[v]);
        }
    }
}
