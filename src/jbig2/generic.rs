//! Generic region decoding (ITU-T T.88 6.2): template-based arithmetic
//! coding of a bitmap, one pixel at a time, with optional typical
//! prediction (TPGDON), plus the shared parsing of adaptive-template
//! pixel fields.

use crate::arith::{ArithmeticDecoder, Context};
use crate::bits::Reader;
use crate::error::{Error, Result};
use crate::jbig2::bitmap::Bitmap;

/// Adaptive template pixel offset; signed coordinates relative to the
/// pixel being decoded.
#[derive(Debug, Clone, Copy, Default)]
pub struct AtPixel {
    pub x: i8,
    pub y: i8,
}

/// Context bits used by each GB template.
pub fn context_size(template: u8) -> usize {
    match template {
        0 => 1 << 16,
        1 => 1 << 13,
        _ => 1 << 10,
    }
}

/// Pseudo-pixel context used by the TPGDON row-copy decision.
fn typical_context(template: u8) -> usize {
    match template {
        0 => 0x9B25,
        1 => 0x0795,
        2 => 0x00E5,
        _ => 0x0195,
    }
}

/// Number of AT pixels carried by a template.
pub fn at_pixel_count(template: u8, ext_template: bool) -> usize {
    if template == 0 {
        if ext_template {
            12
        } else {
            4
        }
    } else {
        1
    }
}

/// Parse the AT pixel field of a region or dictionary header (7.4.6.3).
pub fn parse_at_pixels(r: &mut Reader<'_>, template: u8, ext_template: bool) -> Result<Vec<AtPixel>> {
    let count = at_pixel_count(template, ext_template);
    let mut pixels = Vec::with_capacity(count);
    for _ in 0..count {
        let x = r.read_i8()?;
        let y = r.read_i8()?;
        pixels.push(AtPixel { x, y });
    }
    Ok(pixels)
}

#[inline]
fn at(bitmap: &Bitmap, x: i64, y: i64, p: AtPixel) -> u32 {
    bitmap.pixel(x + i64::from(p.x), y + i64::from(p.y))
}

/// The context of one pixel under the given template. Bit positions
/// follow the fixed layout of 6.2.5.7; AT pixels occupy their nominal
/// slots.
#[inline]
fn gather_context(bitmap: &Bitmap, x: i64, y: i64, template: u8, at_pixels: &[AtPixel]) -> usize {
    let b = bitmap;
    let context = match template {
        0 => {
            b.pixel(x - 1, y)
                | b.pixel(x - 2, y) << 1
                | b.pixel(x - 3, y) << 2
                | b.pixel(x - 4, y) << 3
                | at(b, x, y, at_pixels[0]) << 4
                | b.pixel(x + 2, y - 1) << 5
                | b.pixel(x + 1, y - 1) << 6
                | b.pixel(x, y - 1) << 7
                | b.pixel(x - 1, y - 1) << 8
                | b.pixel(x - 2, y - 1) << 9
                | at(b, x, y, at_pixels[1]) << 10
                | at(b, x, y, at_pixels[2]) << 11
                | b.pixel(x + 1, y - 2) << 12
                | b.pixel(x, y - 2) << 13
                | b.pixel(x - 1, y - 2) << 14
                | at(b, x, y, at_pixels[3]) << 15
        }
        1 => {
            b.pixel(x - 1, y)
                | b.pixel(x - 2, y) << 1
                | b.pixel(x - 3, y) << 2
                | at(b, x, y, at_pixels[0]) << 3
                | b.pixel(x + 2, y - 1) << 4
                | b.pixel(x + 1, y - 1) << 5
                | b.pixel(x, y - 1) << 6
                | b.pixel(x - 1, y - 1) << 7
                | b.pixel(x - 2, y - 1) << 8
                | b.pixel(x + 2, y - 2) << 9
                | b.pixel(x + 1, y - 2) << 10
                | b.pixel(x, y - 2) << 11
                | b.pixel(x - 1, y - 2) << 12
        }
        2 => {
            b.pixel(x - 1, y)
                | b.pixel(x - 2, y) << 1
                | at(b, x, y, at_pixels[0]) << 2
                | b.pixel(x + 1, y - 1) << 3
                | b.pixel(x, y - 1) << 4
                | b.pixel(x - 1, y - 1) << 5
                | b.pixel(x - 2, y - 1) << 6
                | b.pixel(x + 1, y - 2) << 7
                | b.pixel(x, y - 2) << 8
                | b.pixel(x - 1, y - 2) << 9
        }
        _ => {
            b.pixel(x - 1, y)
                | b.pixel(x - 2, y) << 1
                | b.pixel(x - 3, y) << 2
                | b.pixel(x - 4, y) << 3
                | at(b, x, y, at_pixels[0]) << 4
                | b.pixel(x + 1, y - 1) << 5
                | b.pixel(x, y - 1) << 6
                | b.pixel(x - 1, y - 1) << 7
                | b.pixel(x - 2, y - 1) << 8
                | b.pixel(x - 3, y - 1) << 9
        }
    };
    context as usize
}

/// Decode a generic region bitmap with the arithmetic coder (6.2.5).
///
/// `skip` masks pixels that decode as 0 without consuming a symbol.
#[allow(clippy::too_many_arguments)]
pub fn decode_bitmap(
    decoder: &mut ArithmeticDecoder<'_>,
    contexts: &mut [Context],
    width: u32,
    height: u32,
    template: u8,
    at_pixels: &[AtPixel],
    tpgdon: bool,
    skip: Option<&Bitmap>,
) -> Result<Bitmap> {
    if template > 3 {
        return Err(Error::malformed(0, "unknown generic template"));
    }
    if at_pixels.len() < at_pixel_count(template, false) {
        return Err(Error::malformed(0, "missing adaptive template pixels"));
    }
    let mut bitmap = Bitmap::new(width, height);
    let mut typical = false;

    for y in 0..height {
        if tpgdon {
            let bit = decoder.decode(&mut contexts[typical_context(template)]);
            if bit == 1 {
                typical = !typical;
            }
            if typical {
                // The row repeats the one above (all zero for row 0).
                bitmap.copy_row(y.wrapping_sub(1), y);
                continue;
            }
        }
        for x in 0..width {
            if let Some(mask) = skip {
                if mask.pixel(i64::from(x), i64::from(y)) != 0 {
                    continue;
                }
            }
            let context = gather_context(&bitmap, i64::from(x), i64::from(y), template, at_pixels);
            let bit = decoder.decode(&mut contexts[context]);
            if bit != 0 {
                bitmap.set(x, y, true);
            }
        }
    }
    Ok(bitmap)
}

/// Decode a full generic region segment body after the region
/// information field (7.4.6): flags, AT pixels, then MMR or arithmetic
/// data running to the end of the segment.
pub fn decode_segment(
    r: &mut Reader<'_>,
    info: &crate::jbig2::segment::RegionInfo,
    limits: &crate::jbig2::Limits,
) -> Result<Bitmap> {
    let at = r.pos();
    let flags = r.read_u8()?;
    let mmr = flags & 0x01 != 0;
    let template = (flags >> 1) & 0x03;
    let tpgdon = flags & 0x08 != 0;
    let ext_template = flags & 0x10 != 0;
    if mmr && template != 0 {
        return Err(Error::malformed(at, "GB template must be 0 with MMR"));
    }
    if ext_template {
        return Err(Error::unsupported(at, "extended reference template"));
    }
    let at_pixels = if mmr { Vec::new() } else { parse_at_pixels(r, template, false)? };

    let area = u64::from(info.width).div_ceil(8) * u64::from(info.height);
    if area > limits.max_bitmap_bytes as u64 {
        return Err(Error::ResourceExceeded { reason: "generic region too large" });
    }

    if mmr {
        crate::jbig2::mmr::decode(r.tail(), info.width, info.height)
    } else {
        let mut decoder = ArithmeticDecoder::new(r.tail());
        let mut contexts = vec![Context::default(); context_size(template)];
        decode_bitmap(
            &mut decoder,
            &mut contexts,
            info.width,
            info.height,
            template,
            &at_pixels,
            tpgdon,
            None,
        )
    }
}

/// Nominal AT pixel positions per template (Figure 7).
pub fn nominal_at_pixels(template: u8) -> Vec<AtPixel> {
    match template {
        0 => vec![
            AtPixel { x: 3, y: -1 },
            AtPixel { x: -3, y: -1 },
            AtPixel { x: 2, y: -2 },
            AtPixel { x: -2, y: -2 },
        ],
        1 => vec![AtPixel { x: 3, y: -1 }],
        2 => vec![AtPixel { x: 2, y: -1 }],
        _ => vec![AtPixel { x: 2, y: -1 }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_context_sizes() {
        assert_eq!(context_size(0), 65536);
        assert_eq!(context_size(1), 8192);
        assert_eq!(context_size(2), 1024);
        assert_eq!(context_size(3), 1024);
    }

    #[test]
    fn context_is_zero_on_blank_bitmap() {
        let bitmap = Bitmap::new(8, 8);
        for template in 0..4u8 {
            let at = nominal_at_pixels(template);
            assert_eq!(gather_context(&bitmap, 4, 4, template, &at), 0);
        }
    }

    #[test]
    fn context_reflects_neighbours() {
        let mut bitmap = Bitmap::new(8, 8);
        // Left neighbour is bit 0 in every template.
        bitmap.set(3, 4, true);
        for template in 0..4u8 {
            let at = nominal_at_pixels(template);
            assert_eq!(gather_context(&bitmap, 4, 4, template, &at) & 1, 1);
        }
    }

    #[test]
    fn decode_handles_degenerate_sizes() {
        let mut decoder = ArithmeticDecoder::new(&[0x00]);
        let mut contexts = vec![Context::default(); context_size(0)];
        let at = nominal_at_pixels(0);
        let bitmap =
            decode_bitmap(&mut decoder, &mut contexts, 0, 0, 0, &at, false, None).unwrap();
        assert_eq!(bitmap.byte_len(), 0);
    }
}
