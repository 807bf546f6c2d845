//! Generic refinement region decoding (ITU-T T.88 6.3): a bitmap decoded
//! relative to a reference bitmap, with templates drawing context from
//! both, and typical prediction (TPGRON) that copies pixels whose 3x3
//! reference neighbourhood is uniform.

use crate::arith::{ArithmeticDecoder, Context};
use crate::bits::Reader;
use crate::error::{Error, Result};
use crate::jbig2::bitmap::Bitmap;
use crate::jbig2::generic::AtPixel;

pub fn context_size(template: u8) -> usize {
    if template == 0 {
        1 << 13
    } else {
        1 << 10
    }
}

/// TPGRON pseudo-pixel context per template.
fn typical_context(template: u8) -> usize {
    if template == 0 {
        0x0100
    } else {
        0x0080
    }
}

/// Refinement AT pixels exist only for template 0 (two of them).
pub fn parse_refinement_at_pixels(r: &mut Reader<'_>) -> Result<Vec<AtPixel>> {
    let mut pixels = Vec::with_capacity(2);
    for _ in 0..2 {
        let x = r.read_i8()?;
        let y = r.read_i8()?;
        pixels.push(AtPixel { x, y });
    }
    Ok(pixels)
}

#[inline]
fn refinement_context(
    bitmap: &Bitmap,
    reference: &Bitmap,
    x: i64,
    y: i64,
    dx: i64,
    dy: i64,
    template: u8,
    at_pixels: &[AtPixel],
) -> usize {
    let (rx, ry) = (x - dx, y - dy);
    let context = if template == 0 {
        let a1 = at_pixels.first().copied().unwrap_or(AtPixel { x: -1, y: -1 });
        let a2 = at_pixels.get(1).copied().unwrap_or(AtPixel { x: -1, y: -1 });
        bitmap.pixel(x - 1, y)
            | bitmap.pixel(x + 1, y - 1) << 1
            | bitmap.pixel(x, y - 1) << 2
            | bitmap.pixel(x + i64::from(a1.x), y + i64::from(a1.y)) << 3
            | reference.pixel(rx + 1, ry + 1) << 4
            | reference.pixel(rx, ry + 1) << 5
            | reference.pixel(rx - 1, ry + 1) << 6
            | reference.pixel(rx + i64::from(a2.x), ry + i64::from(a2.y)) << 7
            | reference.pixel(rx + 1, ry) << 8
            | reference.pixel(rx, ry) << 9
            | reference.pixel(rx - 1, ry) << 10
            | reference.pixel(rx + 1, ry - 1) << 11
            | reference.pixel(rx, ry - 1) << 12
    } else {
        bitmap.pixel(x - 1, y)
            | bitmap.pixel(x + 1, y - 1) << 1
            | bitmap.pixel(x, y - 1) << 2
            | bitmap.pixel(x - 1, y - 1) << 3
            | reference.pixel(rx + 1, ry + 1) << 4
            | reference.pixel(rx, ry + 1) << 5
            | reference.pixel(rx + 1, ry) << 6
            | reference.pixel(rx, ry) << 7
            | reference.pixel(rx - 1, ry) << 8
            | reference.pixel(rx, ry - 1) << 9
    };
    context as usize
}

/// Whether the reference neighbourhood around a pixel is uniform, and its
/// value; used by typical prediction.
#[inline]
fn uniform_reference(reference: &Bitmap, rx: i64, ry: i64) -> Option<bool> {
    let first = reference.pixel(rx - 1, ry - 1);
    for oy in -1..=1 {
        for ox in -1..=1 {
            if reference.pixel(rx + ox, ry + oy) != first {
                return None;
            }
        }
    }
    Some(first != 0)
}

/// Decode a refinement region bitmap (6.3.5.6).
#[allow(clippy::too_many_arguments)]
pub fn decode_bitmap(
    decoder: &mut ArithmeticDecoder<'_>,
    contexts: &mut [Context],
    width: u32,
    height: u32,
    template: u8,
    at_pixels: &[AtPixel],
    reference: &Bitmap,
    dx: i64,
    dy: i64,
    tpgron: bool,
) -> Result<Bitmap> {
    if template > 1 {
        return Err(Error::malformed(0, "unknown refinement template"));
    }
    let mut bitmap = Bitmap::new(width, height);
    let mut typical = false;

    for y in 0..height {
        if tpgron {
            let bit = decoder.decode(&mut contexts[typical_context(template)]);
            if bit == 1 {
                typical = !typical;
            }
        }
        for x in 0..width {
            let (xi, yi) = (i64::from(x), i64::from(y));
            if typical {
                if let Some(value) = uniform_reference(reference, xi - dx, yi - dy) {
                    if value {
                        bitmap.set(x, y, true);
                    }
                    continue;
                }
            }
            let context =
                refinement_context(&bitmap, reference, xi, yi, dx, dy, template, at_pixels);
            let bit = decoder.decode(&mut contexts[context]);
            if bit != 0 {
                bitmap.set(x, y, true);
            }
        }
    }
    Ok(bitmap)
}

/// Decode a full refinement region segment body after the region
/// information field (7.4.7). The reference is the area of `reference`
/// under the region's location.
pub fn decode_segment(
    r: &mut Reader<'_>,
    info: &crate::jbig2::segment::RegionInfo,
    reference: &Bitmap,
    limits: &crate::jbig2::Limits,
) -> Result<Bitmap> {
    let flags = r.read_u8()?;
    let template = flags & 0x01;
    let tpgron = flags & 0x02 != 0;
    let at_pixels = if template == 0 { parse_refinement_at_pixels(r)? } else { Vec::new() };

    let area = u64::from(info.width).div_ceil(8) * u64::from(info.height);
    if area > limits.max_bitmap_bytes as u64 {
        return Err(Error::ResourceExceeded { reason: "refinement region too large" });
    }

    // 7.4.7.5: reference pixels come from under the region's location.
    let window = reference.crop(info.x, info.y, info.width, info.height);

    let mut decoder = ArithmeticDecoder::new(r.tail());
    let mut contexts = vec![Context::default(); context_size(template)];
    decode_bitmap(
        &mut decoder,
        &mut contexts,
        info.width,
        info.height,
        template,
        &at_pixels,
        &window,
        0,
        0,
        tpgron,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_neighbourhood_detection() {
        let mut reference = Bitmap::new(6, 6);
        assert_eq!(uniform_reference(&reference, 3, 3), Some(false));
        reference.set(3, 3, true);
        assert_eq!(uniform_reference(&reference, 3, 3), None);
        // Fully black interior region.
        let black = Bitmap::filled(6, 6, true);
        assert_eq!(uniform_reference(&black, 3, 3), Some(true));
        // At the corner the out-of-bounds zeros break uniformity.
        assert_eq!(uniform_reference(&black, 0, 0), None);
    }

    #[test]
    fn context_separates_reference_and_current() {
        let current = Bitmap::new(4, 4);
        let mut reference = Bitmap::new(4, 4);
        reference.set(1, 1, true);
        let at = [AtPixel { x: -1, y: -1 }, AtPixel { x: -1, y: -1 }];
        // Reference pixel (1,1) aligned under (1,1) contributes bit 9 for
        // template 0.
        let ctx = refinement_context(&current, &reference, 1, 1, 0, 0, 0, &at);
        assert_ne!(ctx & (1 << 9), 0);
        let ctx1 = refinement_context(&current, &reference, 1, 1, 0, 0, 1, &at);
        assert_ne!(ctx1 & (1 << 7), 0);
    }
}
