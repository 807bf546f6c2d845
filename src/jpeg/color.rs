//! Component planes, chroma upsampling and YCbCr to RGB conversion.

use crate::error::{Error, Result};
use crate::image::DecodedImage;
use crate::jpeg::marker::Frame;

/// One decoded component at its natural resolution, padded to whole
/// blocks.
pub struct Plane {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl Plane {
    pub fn new(blocks_x: usize, blocks_y: usize) -> Self {
        let width = blocks_x * 8;
        let height = blocks_y * 8;
        Self { width, height, data: vec![0; width * height] }
    }

    pub fn set_block(&mut self, bx: usize, by: usize, pixels: &[u8; 64]) {
        let x0 = bx * 8;
        let y0 = by * 8;
        for row in 0..8 {
            let dst = (y0 + row) * self.width + x0;
            self.data[dst..dst + 8].copy_from_slice(&pixels[row * 8..row * 8 + 8]);
        }
    }

    #[inline]
    fn sample(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.width + x]
    }
}

#[inline]
fn clamp_u8(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

/// BT.601 inverse colour transform.
#[inline]
pub fn ycbcr_to_rgb(y: u8, cb: u8, cr: u8) -> (u8, u8, u8) {
    let y = f32::from(y);
    let cb = f32::from(cb) - 128.0;
    let cr = f32::from(cr) - 128.0;
    let r = y + 1.402 * cr;
    let g = y - 0.344_136 * cb - 0.714_136 * cr;
    let b = y + 1.772 * cb;
    (clamp_u8(r), clamp_u8(g), clamp_u8(b))
}

/// Upsample the component planes to the frame grid by nearest-neighbour
/// replication and interleave the output pixels. Samples past the frame
/// width/height are discarded.
pub fn assemble(frame: &Frame, planes: &[Plane]) -> Result<DecodedImage> {
    let width = frame.width as usize;
    let height = frame.height as usize;
    match planes.len() {
        1 => {
            let mut pixels = vec![0u8; width * height];
            let plane = &planes[0];
            for y in 0..height {
                for x in 0..width {
                    pixels[y * width + x] = plane.sample(x, y);
                }
            }
            Ok(DecodedImage {
                width: frame.width,
                height: frame.height,
                channels: 1,
                bit_depth: 8,
                pixels,
            })
        }
        3 => {
            let mut pixels = vec![0u8; width * height * 3];
            let h_max = usize::from(frame.h_max);
            let v_max = usize::from(frame.v_max);
            for y in 0..height {
                for x in 0..width {
                    let mut samples = [0u8; 3];
                    for c in 0..3 {
                        let comp = &frame.components[c];
                        let sx = x * usize::from(comp.h) / h_max;
                        let sy = y * usize::from(comp.v) / v_max;
                        samples[c] = planes[c].sample(sx, sy);
                    }
                    let (r, g, b) = ycbcr_to_rgb(samples[0], samples[1], samples[2]);
                    let base = (y * width + x) * 3;
                    pixels[base] = r;
                    pixels[base + 1] = g;
                    pixels[base + 2] = b;
                }
            }
            Ok(DecodedImage {
                width: frame.width,
                height: frame.height,
                channels: 3,
                bit_depth: 8,
                pixels,
            })
        }
        _ => Err(Error::unsupported(0, "component count other than 1 or 3")),
    }
}
