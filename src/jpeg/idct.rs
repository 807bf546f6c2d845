//! 8x8 inverse discrete cosine transform.
//!
//! Separable float implementation: a 1-D pass over rows followed by one
//! over columns, sharing a precomputed cosine table, then the +128 level
//! shift and clamp to [0, 255]. An all-zero coefficient block comes out as
//! exactly 128 everywhere.

use std::f32::consts::PI;

pub struct Idct {
    /// `cos[u][x] = 0.5 * c(u) * cos((2x + 1) * u * PI / 16)` with
    /// `c(0) = 1/sqrt(2)`.
    cos: [[f32; 8]; 8],
}

impl Idct {
    pub fn new() -> Self {
        let mut cos = [[0.0f32; 8]; 8];
        for (u, row) in cos.iter_mut().enumerate() {
            let cu = if u == 0 { 1.0 / 2.0f32.sqrt() } else { 1.0 };
            for (x, value) in row.iter_mut().enumerate() {
                let angle = ((2 * x + 1) * u) as f32 * PI / 16.0;
                *value = 0.5 * cu * angle.cos();
            }
        }
        Self { cos }
    }

    /// Transform one block of dequantized coefficients in natural order
    /// into 8-bit pixels.
    pub fn transform(&self, coef: &[i32; 64], out: &mut [u8; 64]) {
        // Rows: for each vertical frequency v, transform across u -> x.
        let mut rows = [0.0f32; 64];
        for v in 0..8 {
            for x in 0..8 {
                let mut sum = 0.0f32;
                for u in 0..8 {
                    sum += self.cos[u][x] * coef[v * 8 + u] as f32;
                }
                rows[v * 8 + x] = sum;
            }
        }
        // Columns: for each x, transform across v -> y.
        for x in 0..8 {
            for y in 0..8 {
                let mut sum = 0.0f32;
                for v in 0..8 {
                    sum += self.cos[v][y] * rows[v * 8 + x];
                }
                out[y * 8 + x] = (sum + 128.0).round().clamp(0.0, 255.0) as u8;
            }
        }
    }
}

impl Default for Idct {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_zero_block_is_flat_128() {
        let idct = Idct::new();
        let mut out = [0u8; 64];
        idct.transform(&[0; 64], &mut out);
        assert!(out.iter().all(|&p| p == 128));
    }

    #[test]
    fn dc_only_block_is_flat() {
        // DC value V with unit quantization reconstructs to
        // clamp(round(V / 8) + 128) everywhere.
        let idct = Idct::new();
        let mut coef = [0i32; 64];
        let mut out = [0u8; 64];
        for (dc, expected) in [(80, 138u8), (-416, 76), (-2000, 0), (1200, 255)] {
            coef[0] = dc;
            idct.transform(&coef, &mut out);
            assert!(
                out.iter().all(|&p| (i32::from(p) - i32::from(expected)).abs() <= 1),
                "dc {dc}: got {:?}, expected ~{expected}",
                &out[..8]
            );
        }
    }

    #[test]
    fn single_ac_coefficient_matches_reference() {
        // Compare against the direct O(n^4) definition at double
        // precision, within 1 LSB.
        let idct = Idct::new();
        let mut coef = [0i32; 64];
        coef[1] = 100;
        coef[9] = -60;
        let mut out = [0u8; 64];
        idct.transform(&coef, &mut out);

        for y in 0..8 {
            for x in 0..8 {
                let mut sum = 0.0f64;
                for v in 0..8 {
                    for u in 0..8 {
                        let cu = if u == 0 { 1.0 / 2.0f64.sqrt() } else { 1.0 };
                        let cv = if v == 0 { 1.0 / 2.0f64.sqrt() } else { 1.0 };
                        let cx = (((2 * x + 1) * u) as f64 * std::f64::consts::PI / 16.0).cos();
                        let cy = (((2 * y + 1) * v) as f64 * std::f64::consts::PI / 16.0).cos();
                        sum += 0.25 * cu * cv * coef[v * 8 + u] as f64 * cx * cy;
                    }
                }
                let reference = (sum + 128.0).round().clamp(0.0, 255.0) as i32;
                let got = i32::from(out[y * 8 + x]);
                assert!((got - reference).abs() <= 1, "({x},{y}): {got} vs {reference}");
            }
        }
    }
}
