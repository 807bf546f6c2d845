//! Inverse discrete wavelet transform (ISO/IEC 15444-1 Annex F).
//!
//! One level of 2-D synthesis interleaves the LL/HL/LH/HH sub-bands on
//! the resolution grid (low-pass samples at even absolute coordinates),
//! then runs the 1-D synthesis filter over every row and then every
//! column. Boundary handling is whole-sample symmetric extension,
//! realized by index mirroring.

use crate::jpeg2000::codestream::{Rect, WaveletKernel};

const ALPHA: f32 = -1.586_134_3;
const BETA: f32 = -0.052_980_12;
const GAMMA: f32 = 0.882_911_1;
const DELTA: f32 = 0.443_506_85;
const K: f32 = 1.230_174_1;

/// Whole-sample symmetric mirror of `i` into `[0, n)`.
fn mirror(i: i64, n: i64) -> usize {
    debug_assert!(n > 0);
    if n == 1 {
        return 0;
    }
    let period = 2 * (n - 1);
    let mut i = i.rem_euclid(period);
    if i >= n {
        i = period - i;
    }
    i as usize
}

/// 1-D synthesis in place. `parity` is the absolute coordinate parity of
/// `buf[0]`: low-pass samples sit at even absolute positions.
pub fn inverse_1d(buf: &mut [f32], parity: i64, kernel: WaveletKernel) {
    let n = buf.len() as i64;
    if n == 0 {
        return;
    }
    if n == 1 {
        // A single high-pass sample halves; a single low-pass sample is
        // the signal.
        if parity == 1 {
            buf[0] *= 0.5;
        }
        return;
    }

    let neighbors = |buf: &[f32], k: i64| -> (f32, f32) {
        (buf[mirror(k - 1, n)], buf[mirror(k + 1, n)])
    };
    // Positions with even absolute coordinate.
    let even_start = parity & 1;
    let odd_start = 1 - even_start;

    match kernel {
        WaveletKernel::Reversible53 => {
            let mut k = even_start;
            while k < n {
                let (l, r) = neighbors(buf, k);
                buf[k as usize] -= ((l + r + 2.0) / 4.0).floor();
                k += 2;
            }
            let mut k = odd_start;
            while k < n {
                let (l, r) = neighbors(buf, k);
                buf[k as usize] += ((l + r) / 2.0).floor();
                k += 2;
            }
        }
        WaveletKernel::Irreversible97 => {
            let mut k = even_start;
            while k < n {
                buf[k as usize] *= K;
                k += 2;
            }
            let mut k = odd_start;
            while k < n {
                buf[k as usize] *= 1.0 / K;
                k += 2;
            }
            let mut k = even_start;
            while k < n {
                let (l, r) = neighbors(buf, k);
                buf[k as usize] -= DELTA * (l + r);
                k += 2;
            }
            let mut k = odd_start;
            while k < n {
                let (l, r) = neighbors(buf, k);
                buf[k as usize] -= GAMMA * (l + r);
                k += 2;
            }
            let mut k = even_start;
            while k < n {
                let (l, r) = neighbors(buf, k);
                buf[k as usize] -= BETA * (l + r);
                k += 2;
            }
            let mut k = odd_start;
            while k < n {
                let (l, r) = neighbors(buf, k);
                buf[k as usize] -= ALPHA * (l + r);
                k += 2;
            }
        }
    }
}

/// A sub-band's rectangle and coefficients for one synthesis level.
pub struct BandInput<'a> {
    pub rect: Rect,
    pub coeffs: &'a [f32],
}

/// One level of 2-D synthesis: combine the current LL with the HL/LH/HH
/// bands of the next resolution into that resolution's rectangle.
pub fn compose_level(
    ll_rect: Rect,
    ll: &[f32],
    hl: BandInput<'_>,
    lh: BandInput<'_>,
    hh: BandInput<'_>,
    out_rect: Rect,
    kernel: WaveletKernel,
) -> Vec<f32> {
    let w = out_rect.width() as usize;
    let h = out_rect.height() as usize;
    let mut out = vec![0.0f32; w * h];

    let mut place = |rect: &Rect, coeffs: &[f32], dx: i64, dy: i64| {
        for by in rect.y0..rect.y1 {
            for bx in rect.x0..rect.x1 {
                let x = 2 * bx + dx;
                let y = 2 * by + dy;
                debug_assert!(x >= out_rect.x0 && x < out_rect.x1);
                debug_assert!(y >= out_rect.y0 && y < out_rect.y1);
                let src = ((by - rect.y0) * rect.width() as i64 + (bx - rect.x0)) as usize;
                let dst = ((y - out_rect.y0) * w as i64 + (x - out_rect.x0)) as usize;
                out[dst] = coeffs[src];
            }
        }
    };

    place(&ll_rect, ll, 0, 0);
    place(&hl.rect, hl.coeffs, 1, 0);
    place(&lh.rect, lh.coeffs, 0, 1);
    place(&hh.rect, hh.coeffs, 1, 1);

    // Horizontal pass over every row, then vertical over every column.
    let x_parity = out_rect.x0.rem_euclid(2);
    let y_parity = out_rect.y0.rem_euclid(2);
    for row in out.chunks_exact_mut(w) {
        inverse_1d(row, x_parity, kernel);
    }
    let mut column = vec![0.0f32; h];
    for x in 0..w {
        for (y, value) in column.iter_mut().enumerate() {
            *value = out[y * w + x];
        }
        inverse_1d(&mut column, y_parity, kernel);
        for (y, value) in column.iter().enumerate() {
            out[y * w + x] = *value;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Forward 5/3 analysis, test-side only: predict odds, update evens.
    fn forward_53(buf: &mut [f32], parity: i64) {
        let n = buf.len() as i64;
        if n <= 1 {
            if n == 1 && parity == 1 {
                buf[0] *= 2.0;
            }
            return;
        }
        let odd_start = 1 - (parity & 1);
        let even_start = parity & 1;
        let mut k = odd_start;
        while k < n {
            let l = buf[mirror(k - 1, n)];
            let r = buf[mirror(k + 1, n)];
            buf[k as usize] -= ((l + r) / 2.0).floor();
            k += 2;
        }
        let mut k = even_start;
        while k < n {
            let l = buf[mirror(k - 1, n)];
            let r = buf[mirror(k + 1, n)];
            buf[k as usize] += ((l + r + 2.0) / 4.0).floor();
            k += 2;
        }
    }

    #[test]
    fn reversible_roundtrip_all_lengths_and_parities() {
        let signal: Vec<f32> = vec![
            7.0, -3.0, 12.0, 0.0, 5.0, 5.0, -20.0, 31.0, 2.0, -2.0, 9.0, 1.0, 0.0,
        ];
        for len in 1..=signal.len() {
            for parity in [0i64, 1] {
                let original = &signal[..len];
                let mut buf = original.to_vec();
                forward_53(&mut buf, parity);
                inverse_1d(&mut buf, parity, WaveletKernel::Reversible53);
                assert_eq!(&buf, original, "len {len}, parity {parity}");
            }
        }
    }

    #[test]
    fn irreversible_is_a_left_inverse() {
        // Forward 9/7 built as the exact reversal of the inverse steps.
        fn forward_97(buf: &mut [f32], parity: i64) {
            let n = buf.len() as i64;
            if n <= 1 {
                return;
            }
            let even_start = parity & 1;
            let odd_start = 1 - even_start;
            for (start, coef) in [(odd_start, ALPHA), (even_start, BETA), (odd_start, GAMMA), (even_start, DELTA)] {
                let mut k = start;
                while k < n {
                    let l = buf[mirror(k - 1, n)];
                    let r = buf[mirror(k + 1, n)];
                    buf[k as usize] += coef * (l + r);
                    k += 2;
                }
            }
            let mut k = even_start;
            while k < n {
                buf[k as usize] /= K;
                k += 2;
            }
            let mut k = odd_start;
            while k < n {
                buf[k as usize] *= K;
                k += 2;
            }
        }

        let original: Vec<f32> = vec![10.0, 20.0, 15.0, -5.0, 0.0, 60.0, 7.5, 7.5, 1.0];
        let mut buf = original.clone();
        forward_97(&mut buf, 0);
        inverse_1d(&mut buf, 0, WaveletKernel::Irreversible97);
        for (got, want) in buf.iter().zip(original.iter()) {
            assert!((got - want).abs() < 1e-3, "{got} vs {want}");
        }
    }

    #[test]
    fn constant_ll_reconstructs_constant() {
        // An 8x8 output from a 4x4 constant LL and zero detail bands.
        let ll_rect = Rect::new(0, 0, 4, 4);
        let band = Rect::new(0, 0, 4, 4);
        let ll = vec![50.0f32; 16];
        let zeros = vec![0.0f32; 16];
        let out = compose_level(
            ll_rect,
            &ll,
            BandInput { rect: band, coeffs: &zeros },
            BandInput { rect: band, coeffs: &zeros },
            BandInput { rect: band, coeffs: &zeros },
            Rect::new(0, 0, 8, 8),
            WaveletKernel::Reversible53,
        );
        assert!(out.iter().all(|&v| v == 50.0), "{out:?}");
    }

    #[test]
    fn odd_origin_shifts_band_roles() {
        // With x0 odd the first output column is high-pass: a lone HL
        // sample of an 1-wide level halves.
        let out = compose_level(
            Rect::new(1, 0, 1, 1),
            &[],
            BandInput { rect: Rect::new(0, 0, 1, 1), coeffs: &[8.0] },
            BandInput { rect: Rect::new(1, 0, 1, 0), coeffs: &[] },
            BandInput { rect: Rect::new(0, 0, 1, 0), coeffs: &[] },
            Rect::new(1, 0, 2, 1),
            WaveletKernel::Reversible53,
        );
        assert_eq!(out, vec![4.0]);
    }
}
