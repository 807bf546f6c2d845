//! Tier-1 decoding: MQ-coded EBCOT bit-plane decoding of code-blocks
//! (ISO/IEC 15444-1 Annex D).
//!
//! Each code-block is decoded in 4-row stripes, column by column. Per
//! bit-plane the significance-propagation, magnitude-refinement and
//! cleanup passes run in that order, except the first plane which has only
//! a cleanup pass. The 19 contexts (9 zero-coding, 5 sign-coding, 3
//! magnitude-refinement, run-length and uniform) adapt through the shared
//! arithmetic decoder.

use log::warn;

use crate::arith::{ArithmeticDecoder, Context};
use crate::error::{Error, Result};
use crate::jpeg2000::codestream::CodeBlockStyle;
use crate::jpeg2000::tier2::BandKind;

/// Magnitudes keep one bit for the sign, so at most 31 planes.
pub const MAX_BITPLANES: u8 = 31;

const CTX_RUN_LENGTH: usize = 17;
const CTX_UNIFORM: usize = 18;

const SIGNIFICANT: u8 = 0x80;
const REFINED: u8 = 0x40;
const VISITED: u8 = 0x20;
const COUNT_MASK: u8 = 0x1F;

/// Per-sample coding state: significance, has-been-refined, visited in the
/// current plane's significance pass, and the number of magnitude bits
/// accounted for so far (missing leading planes included).
#[derive(Clone, Copy, Default)]
struct SampleState(u8);

impl SampleState {
    #[inline]
    fn significant(self) -> bool {
        self.0 & SIGNIFICANT != 0
    }

    #[inline]
    fn refined(self) -> bool {
        self.0 & REFINED != 0
    }

    #[inline]
    fn visited(self) -> bool {
        self.0 & VISITED != 0
    }

    #[inline]
    fn count(self) -> u8 {
        self.0 & COUNT_MASK
    }
}

/// Sign in the top bit, magnitude below, assembled plane by plane.
#[derive(Clone, Copy, Default)]
struct Sample(u32);

impl Sample {
    #[inline]
    fn push_bit(&mut self, bit: u32) {
        let sign = self.0 & 0x8000_0000;
        self.0 = sign | (((self.0 & 0x7FFF_FFFF) << 1) | bit);
    }

    #[inline]
    fn set_sign(&mut self, sign: u32) {
        self.0 |= sign << 31;
    }

    #[inline]
    fn negative(self) -> bool {
        self.0 & 0x8000_0000 != 0
    }

    #[inline]
    fn magnitude(self) -> u32 {
        self.0 & 0x7FFF_FFFF
    }
}

/// Reusable decoder context for one code-block at a time.
pub struct CodeBlockDecoder {
    width: u32,
    height: u32,
    band: BandKind,
    causal: bool,
    states: Vec<SampleState>,
    samples: Vec<Sample>,
    contexts: [Context; 19],
}

impl Default for CodeBlockDecoder {
    fn default() -> Self {
        Self {
            width: 0,
            height: 0,
            band: BandKind::LowLow,
            causal: false,
            states: Vec::new(),
            samples: Vec::new(),
            contexts: [Context::default(); 19],
        }
    }
}

impl CodeBlockDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a code-block's concatenated codeword segments.
    ///
    /// `passes` is the total number of coding passes signalled by Tier-2,
    /// `missing_planes` the zero-bit-planes count and `num_bitplanes` the
    /// Mb of the sub-band. The decoded samples stay in this context until
    /// the next call; read them with [`Self::sample`].
    #[allow(clippy::too_many_arguments)]
    pub fn decode(
        &mut self,
        data: &[u8],
        width: u32,
        height: u32,
        band: BandKind,
        style: &CodeBlockStyle,
        passes: u32,
        missing_planes: u8,
        num_bitplanes: u8,
    ) -> Result<()> {
        if num_bitplanes > MAX_BITPLANES {
            return Err(Error::ResourceExceeded { reason: "too many bit-planes" });
        }
        if passes > 0
            && u32::from(missing_planes) + 1 + (passes - 1).div_ceil(3) > u32::from(num_bitplanes)
        {
            return Err(Error::malformed(0, "coding pass count exceeds the bit-plane limit"));
        }

        self.width = width;
        self.height = height;
        self.band = band;
        self.causal = style.vertically_causal;
        let n = width as usize * height as usize;
        self.samples.clear();
        self.samples.resize(n, Sample::default());
        self.states.clear();
        self.states.resize(n, SampleState(missing_planes & COUNT_MASK));
        self.reset_contexts();

        if passes == 0 {
            return Ok(());
        }

        let mut decoder = ArithmeticDecoder::new(data);
        for pass in 0..passes {
            // Pass 0 is the first cleanup; afterwards the cycle is
            // SP (1), MR (2), CU (0) per plane.
            match pass % 3 {
                1 => self.significance_pass(&mut decoder),
                2 => self.refinement_pass(&mut decoder),
                _ => {
                    self.cleanup_pass(&mut decoder);
                    if style.segmentation_symbols {
                        let mut v = 0u32;
                        for _ in 0..4 {
                            v = (v << 1) | decoder.decode(&mut self.contexts[CTX_UNIFORM]);
                        }
                        if v != 0b1010 {
                            warn!("invalid segmentation symbol in code-block");
                            return Err(Error::malformed(0, "invalid segmentation symbol"));
                        }
                    }
                    for state in &mut self.states {
                        state.0 &= !VISITED;
                    }
                }
            }
            if style.reset_probabilities {
                self.reset_contexts();
            }
        }
        Ok(())
    }

    /// Signed sample value at plane-0 scale plus the number of undecoded
    /// low planes (zero when the block was fully decoded).
    pub fn sample(&self, index: usize, num_bitplanes: u8) -> (i64, u8) {
        let state = self.states[index];
        let sample = self.samples[index];
        let undecoded = num_bitplanes.saturating_sub(state.count());
        let mut value = i64::from(sample.magnitude()) << undecoded;
        if sample.negative() {
            value = -value;
        }
        (value, undecoded)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Initial states from Table D.7.
    fn reset_contexts(&mut self) {
        self.contexts = [Context::default(); 19];
        self.contexts[0] = Context::with_index(4);
        self.contexts[CTX_RUN_LENGTH] = Context::with_index(3);
        self.contexts[CTX_UNIFORM] = Context::with_index(46);
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> usize {
        (y * self.width + x) as usize
    }

    #[inline]
    fn in_next_stripe(&self, y: u32, neighbor_y: i64) -> bool {
        neighbor_y >= 0 && (neighbor_y as u32 >> 2) > (y >> 2)
    }

    #[inline]
    fn sig(&self, x: i64, y: i64) -> u8 {
        if x < 0 || y < 0 || x >= i64::from(self.width) || y >= i64::from(self.height) {
            0
        } else {
            u8::from(self.states[(y as u32 * self.width + x as u32) as usize].significant())
        }
    }

    /// Signed significance of a neighbour for sign coding: +1 positive
    /// significant, -1 negative significant, 0 otherwise.
    #[inline]
    fn signed_sig(&self, x: i64, y: i64) -> i32 {
        if x < 0 || y < 0 || x >= i64::from(self.width) || y >= i64::from(self.height) {
            return 0;
        }
        let i = (y as u32 * self.width + x as u32) as usize;
        if !self.states[i].significant() {
            0
        } else if self.samples[i].negative() {
            -1
        } else {
            1
        }
    }

    fn horizontal(&self, x: u32, y: u32) -> u8 {
        let (x, y) = (i64::from(x), i64::from(y));
        self.sig(x - 1, y) + self.sig(x + 1, y)
    }

    fn vertical(&self, x: u32, y: u32) -> u8 {
        let (xi, yi) = (i64::from(x), i64::from(y));
        let below = if self.causal && self.in_next_stripe(y, yi + 1) {
            0
        } else {
            self.sig(xi, yi + 1)
        };
        self.sig(xi, yi - 1) + below
    }

    fn diagonal(&self, x: u32, y: u32) -> u8 {
        let (xi, yi) = (i64::from(x), i64::from(y));
        let suppress = self.causal && self.in_next_stripe(y, yi + 1);
        let mut d = self.sig(xi - 1, yi - 1) + self.sig(xi + 1, yi - 1);
        if !suppress {
            d += self.sig(xi - 1, yi + 1) + self.sig(xi + 1, yi + 1);
        }
        d
    }

    fn neighborhood(&self, x: u32, y: u32) -> u8 {
        self.horizontal(x, y) + self.vertical(x, y) + self.diagonal(x, y)
    }

    /// Zero-coding context label (Table D.1).
    fn zero_coding_context(&self, x: u32, y: u32) -> usize {
        let mut h = self.horizontal(x, y);
        let mut v = self.vertical(x, y);
        let d = self.diagonal(x, y);
        match self.band {
            BandKind::HighHigh => {
                let hv = h + v;
                if d >= 3 {
                    8
                } else if d == 2 {
                    if hv >= 1 { 7 } else { 6 }
                } else if d == 1 {
                    if hv >= 2 { 5 } else if hv == 1 { 4 } else { 3 }
                } else if hv >= 2 {
                    2
                } else if hv == 1 {
                    1
                } else {
                    0
                }
            }
            _ => {
                if self.band == BandKind::HighLow {
                    std::mem::swap(&mut h, &mut v);
                }
                if h == 2 {
                    8
                } else if h == 1 {
                    if v >= 1 { 7 } else if d >= 1 { 6 } else { 5 }
                } else if v == 2 {
                    4
                } else if v == 1 {
                    3
                } else if d >= 2 {
                    2
                } else if d == 1 {
                    1
                } else {
                    0
                }
            }
        }
    }

    /// Sign-coding context label and XOR bit (Tables D.2 and D.3).
    fn sign_context(&self, x: u32, y: u32) -> (usize, u32) {
        let (xi, yi) = (i64::from(x), i64::from(y));
        let h = (self.signed_sig(xi - 1, yi) + self.signed_sig(xi + 1, yi)).clamp(-1, 1);
        let below = if self.causal && self.in_next_stripe(y, yi + 1) {
            0
        } else {
            self.signed_sig(xi, yi + 1)
        };
        let v = (self.signed_sig(xi, yi - 1) + below).clamp(-1, 1);
        match (h, v) {
            (1, 1) => (13, 0),
            (1, 0) => (12, 0),
            (1, -1) => (11, 0),
            (0, 1) => (10, 0),
            (0, 0) => (9, 0),
            (0, -1) => (10, 1),
            (-1, 1) => (11, 1),
            (-1, 0) => (12, 1),
            (-1, -1) => (13, 1),
            _ => unreachable!(),
        }
    }

    /// Magnitude-refinement context label (Table D.4).
    fn refinement_context(&self, x: u32, y: u32) -> usize {
        if self.states[self.index(x, y)].refined() {
            16
        } else if self.neighborhood(x, y) >= 1 {
            15
        } else {
            14
        }
    }

    fn push_magnitude(&mut self, x: u32, y: u32, bit: u32) {
        let i = self.index(x, y);
        self.samples[i].push_bit(bit);
        let count = self.states[i].count();
        debug_assert!(count < MAX_BITPLANES);
        self.states[i].0 = (self.states[i].0 & !COUNT_MASK) | ((count + 1) & COUNT_MASK);
    }

    fn decode_sign(&mut self, decoder: &mut ArithmeticDecoder<'_>, x: u32, y: u32) {
        let (label, xor) = self.sign_context(x, y);
        let bit = decoder.decode(&mut self.contexts[label]) ^ xor;
        let i = self.index(x, y);
        self.samples[i].set_sign(bit);
        self.states[i].0 |= SIGNIFICANT;
    }

    /// Significance propagation (D.3.1): insignificant samples with a
    /// non-zero neighbourhood.
    fn significance_pass(&mut self, decoder: &mut ArithmeticDecoder<'_>) {
        for stripe in (0..self.height).step_by(4) {
            for x in 0..self.width {
                for y in stripe..(stripe + 4).min(self.height) {
                    let i = self.index(x, y);
                    if self.states[i].significant() || self.neighborhood(x, y) == 0 {
                        continue;
                    }
                    let label = self.zero_coding_context(x, y);
                    let bit = decoder.decode(&mut self.contexts[label]);
                    self.push_magnitude(x, y, bit);
                    self.states[i].0 |= VISITED;
                    if bit == 1 {
                        self.decode_sign(decoder, x, y);
                    }
                }
            }
        }
    }

    /// Magnitude refinement (D.3.3): significant samples not visited by
    /// the significance pass of this plane.
    fn refinement_pass(&mut self, decoder: &mut ArithmeticDecoder<'_>) {
        for stripe in (0..self.height).step_by(4) {
            for x in 0..self.width {
                for y in stripe..(stripe + 4).min(self.height) {
                    let i = self.index(x, y);
                    if !self.states[i].significant() || self.states[i].visited() {
                        continue;
                    }
                    let label = self.refinement_context(x, y);
                    let bit = decoder.decode(&mut self.contexts[label]);
                    self.push_magnitude(x, y, bit);
                    self.states[i].0 |= REFINED;
                }
            }
        }
    }

    /// Cleanup (D.3.4): everything the other passes skipped, with
    /// run-length coding of all-zero stripe columns.
    fn cleanup_pass(&mut self, decoder: &mut ArithmeticDecoder<'_>) {
        for stripe in (0..self.height).step_by(4) {
            for x in 0..self.width {
                let mut y = stripe;
                let stripe_end = (stripe + 4).min(self.height);
                while y < stripe_end {
                    let i = self.index(x, y);
                    if self.states[i].significant() || self.states[i].visited() {
                        y += 1;
                        continue;
                    }

                    let run_length_eligible = y == stripe
                        && self.height - y >= 4
                        && (0..4).all(|k| self.neighborhood(x, y + k) == 0);

                    let bit = if run_length_eligible {
                        if decoder.decode(&mut self.contexts[CTX_RUN_LENGTH]) == 0 {
                            // All four samples in the column stay zero.
                            for k in 0..4 {
                                self.push_magnitude(x, y + k, 0);
                            }
                            y += 4;
                            continue;
                        }
                        // The uniform-context pair gives the row of the
                        // first significant sample.
                        let mut zeros = decoder.decode(&mut self.contexts[CTX_UNIFORM]);
                        zeros = (zeros << 1) | decoder.decode(&mut self.contexts[CTX_UNIFORM]);
                        for _ in 0..zeros {
                            self.push_magnitude(x, y, 0);
                            y += 1;
                        }
                        1
                    } else {
                        let label = self.zero_coding_context(x, y);
                        decoder.decode(&mut self.contexts[label])
                    };

                    self.push_magnitude(x, y, bit);
                    if bit == 1 {
                        self.decode_sign(decoder, x, y);
                    }
                    y += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_block(
        data: &[u8],
        width: u32,
        height: u32,
        band: BandKind,
        passes: u32,
        missing: u8,
        planes: u8,
    ) -> Vec<i64> {
        let mut ctx = CodeBlockDecoder::new();
        ctx.decode(
            data,
            width,
            height,
            band,
            &CodeBlockStyle::default(),
            passes,
            missing,
            planes,
        )
        .unwrap();
        (0..ctx.len()).map(|i| ctx.sample(i, planes).0).collect()
    }

    // Worked example from ISO/IEC 15444-1 Annex J.10.4: a 1x5 LL
    // code-block, 16 passes over 6 bit-planes.
    #[test]
    fn annex_j_single_column_block() {
        let data = [0x01, 0x8F, 0x0D, 0xC8, 0x75, 0x5D];
        let coeffs = decode_block(&data, 1, 5, BandKind::LowLow, 16, 0, 6);
        assert_eq!(coeffs, vec![-26, -22, -30, -32, -19]);
    }

    // Companion example: a 1x4 LH block, 7 passes over 3 bit-planes.
    #[test]
    fn annex_j_short_column_block() {
        let data = [0x0F, 0xB1, 0x76];
        let coeffs = decode_block(&data, 1, 4, BandKind::LowHigh, 7, 0, 3);
        assert_eq!(coeffs, vec![1, 5, 1, 0]);
    }

    #[test]
    fn zero_passes_yield_zero_block() {
        let coeffs = decode_block(&[], 8, 8, BandKind::HighHigh, 0, 2, 8);
        assert!(coeffs.iter().all(|&c| c == 0));
        assert_eq!(coeffs.len(), 64);
    }

    #[test]
    fn pass_limit_is_validated() {
        // 3 * (Mb - P) - 2 passes fit; one more must fail.
        let mut ctx = CodeBlockDecoder::new();
        let style = CodeBlockStyle::default();
        assert!(ctx.decode(&[0; 4], 4, 4, BandKind::LowLow, &style, 17, 0, 6).is_err());
        assert!(ctx.decode(&[0; 4], 4, 4, BandKind::LowLow, &style, 16, 0, 6).is_ok());
    }

    // A 32x32 HL block with 13 passes over 10 bit-planes, 5 of them
    // missing; exercises refinement and run-length coding against a
    // reference decoding.
    #[test]
    fn dense_block_matches_reference() {
        let data = [
            225u8, 72, 111, 59, 122, 13, 70, 63, 48, 1, 128, 138, 167, 142, 136, 234, 176, 18,
            250, 155, 201, 209, 178, 22, 3, 122, 65, 71, 189, 9, 116, 133, 67, 58, 236, 36, 96,
            180, 149, 176, 210, 225, 171, 223, 90, 253, 30, 222, 151, 102, 39, 30, 60, 157, 116,
            17, 8, 141, 68, 131, 67, 132, 26, 211, 205, 234, 114, 234, 111, 228, 220, 77, 234,
            216, 84, 2, 25, 142, 108, 246, 245, 33, 60, 206, 71, 9, 179, 66, 149, 216, 164, 135,
            42, 146, 104, 78, 63, 79, 112, 108, 108, 114, 239, 235, 88, 168, 87, 191, 194, 236,
            134, 79, 1, 98, 61, 204, 148, 226, 181, 124, 207, 254, 19, 70, 229, 25, 35, 118, 148,
            10, 123, 207, 148, 214, 75, 143, 254, 109, 78, 34, 254, 242, 12, 97, 100, 199, 130,
            49, 4, 67, 50, 32, 3, 98, 70, 155, 104, 103, 90, 193, 89, 59, 68, 148, 110, 7, 3, 141,
            178, 237, 93, 253, 5, 69, 137, 207, 188, 149, 131, 59, 203, 223, 41, 106, 78, 51, 223,
            21, 113, 99, 204, 208, 145, 44, 51, 14, 133, 90, 118, 136, 134, 167, 54, 22, 84, 84,
            47, 206, 125, 89, 39, 60, 52, 175, 97, 228, 217, 133, 171, 135, 129, 201, 164, 82, 3,
            110, 200, 88, 1, 140, 235, 79, 57, 38, 185, 197, 236, 33, 222, 117, 107, 156, 18, 78,
            235, 63, 131, 57, 197, 153, 196, 178, 254, 161, 28, 72, 103, 42, 31, 255, 56, 2, 18,
            126, 95, 98, 19, 30, 233,
        ];

        let coeffs = decode_block(&data, 32, 32, BandKind::HighLow, 13, 5, 10);

        let expected: [i64; 1024] = [
            0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, -1, 0, -2, 0, -1, 0, 1, 1, -1, 0,
            0, 0, -1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, -1, 0, 0, 1, 0, 0, 0,
            0, 2, 0, 0, 0, 1, 3, -2, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1, 0, 1, 0,
            0, 0, 0, 0, -1, 0, -2, -1, -2, -1, -1, 0, 2, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, -1, -1,
            0, 0, -1, 0, -1, 1, 1, 0, 0, 0, 0, 0, 1, 1, -1, -2, 0, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0,
            0, 0, 0, 0, 1, 0, 0, -1, 0, -1, 2, 1, 0, 1, 1, -1, 0, -2, 1, 4, -1, 0, 1, -1, 0, 0,
            0, 0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0, 1, -1, 1, 0, 0, 0, 0, 1, 1, 1, 2, -3, 2, 1, 1,
            -1, -1, 0, 0, 0, 0, 0, 0, 0, 0, -1, -1, 0, 0, 0, 0, -1, 0, 1, -1, -1, 1, 1, 0, 1, 1,
            0, -1, 3, -1, 1, 2, 0, 2, 0, 0, 0, 0, 0, 0, 0, -1, -1, 1, 1, 0, 0, 0, 0, 0, 0, 0, -1,
            1, 2, 0, -2, -1, -1, 1, 1, 0, -2, 0, 0, -1, 0, 0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 1, 0, 0,
            0, 0, 2, 1, 0, 1, 1, 0, 0, -1, 1, -1, 0, 2, 2, 0, 1, 0, 0, 0, 0, 0, 0, 0, 1, 1, 0, 0,
            1, 0, 0, 0, 2, 1, 0, 1, 0, 1, 0, -1, 0, 1, -2, -1, -3, -2, 0, 2, 1, 0, 0, 0, 0, 0, 0,
            0, -1, 0, 0, -1, -1, 0, 0, 0, -1, 0, 0, 0, -2, 2, 1, -3, 0, 0, 0, 1, 0, -2, 0, 0, 0,
            -1, 0, 0, 0, 0, 1, -1, 0, 1, 0, 1, 1, 0, 0, 0, 1, 0, 0, 1, 1, 1, -3, 2, -1, 2, 0, 1,
            1, 1, 0, 0, 2, 0, 0, 0, 0, 0, 1, 0, 0, 0, -1, 0, -1, 0, 1, 1, 0, -1, 0, 1, 1, -3, 1,
            -1, -1, 3, 3, 1, 1, 0, 1, 1, 0, 2, 1, 0, 0, 1, 0, 0, 1, 0, 0, 0, 0, 0, 0, 1, 0, -1,
            0, 0, -2, 0, 1, 0, -2, 0, 1, 1, 3, 2, 0, 1, 1, 1, -1, 0, 0, 0, 0, 1, 0, 1, 1, 0, 0,
            1, 0, 0, 0, 1, 3, 0, 5, 1, 3, 0, -1, 2, 3, -1, -2, 0, 2, 2, 0, 1, 1, -1, -1, 1, 0, 0,
            0, 0, 0, 1, 1, 0, 1, 0, 2, 0, -5, 2, -2, 0, -3, 0, -3, 1, 1, 0, -1, 0, 0, 2, 2, -2,
            -1, -1, 1, -1, 0, 1, -1, 0, 1, 0, 0, 0, 0, 0, -1, 3, 2, 1, 2, 0, -1, 0, -2, 2, 0, -1,
            -1, -1, 0, 0, 0, 2, 0, 0, 1, 0, 1, 0, 0, 1, -1, -1, 1, 0, -1, -3, 3, 1, -1, 0, -1, 0,
            1, 2, 0, 1, 1, 0, 0, 1, 1, -2, -1, 0, -2, 1, 0, -1, -1, 0, 0, 0, 1, 1, 0, 0, -2, -1,
            1, -1, 0, 0, 0, 1, 1, -1, 1, -1, 1, -1, 1, 0, 1, 1, -2, 0, 4, -1, 0, 2, 1, 1, 1, 0,
            0, 0, 0, 0, 3, 0, 0, 0, 0, 0, 0, 1, 0, 1, 1, -1, 0, 0, 0, 3, -1, 2, 0, -3, -1, 0, 1,
            0, 0, -1, -1, 1, 1, 0, -2, 2, 1, 1, 0, 0, 0, 0, 0, 0, 0, 0, -1, 0, 0, 0, -2, 1, 2, 2,
            2, 2, -3, -1, 1, 1, 1, 0, -1, 1, 0, -1, 4, 1, -1, 0, 0, 0, 0, 1, 0, 1, 0, -1, 0, 1,
            0, 1, 1, 2, 2, 1, 2, 2, 10, 0, 0, 0, 0, 1, 0, 1, -1, 1, 0, 0, 0, 0, 0, 0, 1, 1, 0,
            -1, 1, 0, 2, 1, -1, 1, 0, 0, 2, -2, -2, 11, -4, 1, 1, 1, 1, 0, -1, -3, 2, -1, 0, 1,
            1, 0, 1, 0, 0, 1, 0, 0, 1, -1, -1, -1, 0, -1, 1, -2, 1, -2, 8, -8, -1, -1, 0, 1, 0,
            0, -1, 1, 1, 0, 1, 0, 0, 0, 1, 0, 0, 1, -1, 0, -1, 0, 0, 0, -1, 1, 1, 0, 9, 16, -8,
            1, 1, 0, 1, 0, 1, -1, 0, 1, 0, 0, 0, 1, 0, 1, 0, 0, 0, 0, 0, 0, 0, -1, 0, 1, -1, 0,
            0, 6, -7, -3, 0, 0, 0, 1, -1, -1, -1, 2, 2, 0, 1, 0, 1, 0, 1, 1, 1, 0, 0, 0, 0, 0, 0,
            1, 0, 0, 1, 1, 6, -9, 1, 1, -1, 1, 0, 0, 1, 0, 1, 1, 0, 0, -1, 0, 0, 0, 0, 0, -1, 0,
            0, 0, 0, 1, 1, 1, -2, 0, 0, 6, -5, 2, 2, 0, 1, 0, 0, 0, -1, 1, 1, 0, 0, 0, 0, 0, 1,
            0, 0, -1, 0, 1, -1, 0, 1, 0, 1, 1, 1, 1, 9, -9, 1, 1, 0, 1, 2, 1, 1, 1, 1, 1, 0, 0,
            0, 0, 0, -1, 0, 1, 0, 1, 1, 0, 0, 3, 1, 0, 1, -1, -2, 4, -9, 2, 0, 0, -1, 0, -1, 0,
            0, 1, -1, 0, 0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 1, 1, 0, 1, 1, 1, -1, -2, 9, 6, 5, 0, 0,
            -1, 0, 0, 0, 1, 0, 1, 0, 1, 1, 1, 1, -1, 1, -1, 0, 0, -1, 1, 1, 0, 0, -1, 1, 0, -1,
            10, -4, 0, 0, 0, 1, 0, 0, 0, 0, 1, 0,
        ];

        assert_eq!(coeffs.len(), expected.len());
        for (i, (&got, &want)) in coeffs.iter().zip(expected.iter()).enumerate() {
            assert_eq!(got, want, "coefficient {} (x={}, y={})", i, i % 32, i / 32);
        }
    }
}
