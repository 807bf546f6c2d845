//! Pattern dictionaries (ITU-T T.88 6.7) and halftone regions (6.6):
//! fixed-size patterns decoded from one collective bitmap, then a
//! grayscale image decoded plane by plane (gray-coded, Annex C.5) whose
//! values pick the pattern placed at each grid position.

use log::trace;

use crate::arith::{ArithmeticDecoder, Context};
use crate::bits::Reader;
use crate::error::{Error, Result};
use crate::jbig2::bitmap::{Bitmap, CombOp};
use crate::jbig2::generic::{self, AtPixel};
use crate::jbig2::mmr::{self, MmrDecoder};
use crate::jbig2::segment::RegionInfo;
use crate::jbig2::Limits;

#[derive(Debug, Clone)]
pub struct PatternDictionary {
    pub patterns: Vec<Bitmap>,
    pub pattern_width: u8,
    pub pattern_height: u8,
}

/// Decode a pattern dictionary segment (6.7.5).
pub fn decode_pattern_dictionary(data: &[u8], limits: &Limits) -> Result<PatternDictionary> {
    let mut r = Reader::new(data);
    let flags = r.read_u8()?;
    let use_mmr = flags & 0x01 != 0;
    let template = (flags >> 1) & 0x03;
    let pattern_width = r.read_u8()?;
    let pattern_height = r.read_u8()?;
    let gray_max = r.read_u32()?;
    if pattern_width == 0 || pattern_height == 0 {
        return Err(Error::malformed(0, "zero pattern size"));
    }
    if gray_max as u64 + 1 > u64::from(limits.max_symbols) {
        return Err(Error::ResourceExceeded { reason: "too many halftone patterns" });
    }

    // One collective bitmap holds all patterns side by side; the AT
    // pixels of Table 27 tie each pattern to its left neighbour.
    let count = gray_max + 1;
    let collective_width = count * u32::from(pattern_width);
    let collective = if use_mmr {
        mmr::decode(r.tail(), collective_width, u32::from(pattern_height))?
    } else {
        let a1x = (-i16::from(pattern_width)).max(-128) as i8;
        let at = [
            AtPixel { x: a1x, y: 0 },
            AtPixel { x: -3, y: -1 },
            AtPixel { x: 2, y: -2 },
            AtPixel { x: -2, y: -2 },
        ];
        let mut decoder = ArithmeticDecoder::new(r.tail());
        let mut contexts = vec![Context::default(); generic::context_size(template)];
        generic::decode_bitmap(
            &mut decoder,
            &mut contexts,
            collective_width,
            u32::from(pattern_height),
            template,
            &at,
            false,
            None,
        )?
    };

    let mut patterns = Vec::with_capacity(count as usize);
    for i in 0..count {
        let mut pattern = Bitmap::new(u32::from(pattern_width), u32::from(pattern_height));
        let x0 = i * u32::from(pattern_width);
        for y in 0..u32::from(pattern_height) {
            for x in 0..u32::from(pattern_width) {
                if collective.get(x0 + x, y) {
                    pattern.set(x, y, true);
                }
            }
        }
        patterns.push(pattern);
    }
    trace!("pattern dictionary: {} patterns of {}x{}", count, pattern_width, pattern_height);
    Ok(PatternDictionary { patterns, pattern_width, pattern_height })
}

/// Decode a halftone region segment body (6.6.5); the region information
/// field has already been read.
pub fn decode_halftone_region(
    r: &mut Reader<'_>,
    info: &RegionInfo,
    patterns: &PatternDictionary,
    limits: &Limits,
) -> Result<Bitmap> {
    let at = r.pos();
    let flags = r.read_u8()?;
    let use_mmr = flags & 0x01 != 0;
    let template = (flags >> 1) & 0x03;
    let enable_skip = flags & 0x08 != 0;
    let comb_op = CombOp::try_from((flags >> 4) & 0x07)
        .map_err(|_| Error::malformed(at, "bad halftone combination operator"))?;
    let default_pixel = flags & 0x80 != 0;
    if enable_skip {
        return Err(Error::unsupported(at, "halftone skip bitmaps"));
    }

    let grid_width = r.read_u32()?;
    let grid_height = r.read_u32()?;
    let grid_x = r.read_i32()?;
    let grid_y = r.read_i32()?;
    let step_x = r.read_u16()?;
    let step_y = r.read_u16()?;

    let area = u64::from(info.width).div_ceil(8) * u64::from(info.height);
    if area > limits.max_bitmap_bytes as u64 {
        return Err(Error::ResourceExceeded { reason: "halftone region too large" });
    }
    let cells = u64::from(grid_width) * u64::from(grid_height);
    if cells > limits.max_bitmap_bytes as u64 {
        return Err(Error::ResourceExceeded { reason: "halftone grid too large" });
    }

    // Bits per grayscale value, ceil(log2(HNUMPATS)) (6.6.5 step 3).
    let bpp = if patterns.patterns.len() <= 1 {
        0
    } else {
        32 - (patterns.patterns.len() as u32 - 1).leading_zeros()
    };
    let gray = decode_gray_image(r.tail(), grid_width, grid_height, bpp, use_mmr, template)?;

    let mut region = Bitmap::filled(info.width, info.height, default_pixel);
    let max_index = patterns.patterns.len() as u32 - 1;
    for m in 0..grid_height {
        for n in 0..grid_width {
            let value = gray[(m * grid_width + n) as usize].min(max_index);
            let pattern = &patterns.patterns[value as usize];
            // Grid placement vectors (6.6.5.2), 8 fractional bits.
            let x = i64::from(grid_x) + i64::from(m) * i64::from(step_y)
                + i64::from(n) * i64::from(step_x);
            let y = i64::from(grid_y) + i64::from(m) * i64::from(step_x)
                - i64::from(n) * i64::from(step_y);
            region.combine(pattern, x >> 8, y >> 8, comb_op);
        }
    }
    Ok(region)
}

/// Decode a gray-coded multi-plane image (C.5): planes arrive from the
/// most significant down, each XORed with the plane above it.
fn decode_gray_image(
    data: &[u8],
    width: u32,
    height: u32,
    bpp: u32,
    use_mmr: bool,
    template: u8,
) -> Result<Vec<u32>> {
    let mut values = vec![0u32; (width * height) as usize];
    let mut prev_plane: Option<Bitmap> = None;

    // All planes share one decoder: the MMR stream is continuous, the
    // arithmetic contexts adapt across planes.
    let mut mmr_decoder = MmrDecoder::new(data, width);
    let mut arith = ArithmeticDecoder::new(data);
    let mut contexts = vec![Context::default(); generic::context_size(template)];
    let at = [
        AtPixel { x: if template <= 1 { 3 } else { 2 }, y: -1 },
        AtPixel { x: -3, y: -1 },
        AtPixel { x: 2, y: -2 },
        AtPixel { x: -2, y: -2 },
    ];

    for plane_index in (0..bpp).rev() {
        let raw = if use_mmr {
            mmr_decoder.restart(width);
            let mut bitmap = Bitmap::new(width, height);
            for y in 0..height {
                if !mmr_decoder.decode_line(&mut bitmap, y)? {
                    break;
                }
            }
            // Planes in the shared stream are EOFB-terminated.
            mmr_decoder.skip_eofb();
            bitmap
        } else {
            generic::decode_bitmap(
                &mut arith,
                &mut contexts,
                width,
                height,
                template,
                &at,
                false,
                None,
            )?
        };

        // Gray decoding: bit = plane XOR (previous bit), where the
        // previous bit is the next-higher plane's decoded bit.
        let mut plane = Bitmap::new(width, height);
        for y in 0..height {
            for x in 0..width {
                let mut bit = raw.get(x, y);
                if let Some(prev) = &prev_plane {
                    bit ^= prev.get(x, y);
                }
                if bit {
                    plane.set(x, y, true);
                    values[(y * width + x) as usize] |= 1 << plane_index;
                }
            }
        }
        prev_plane = Some(plane);
    }
    Ok(values)
}
