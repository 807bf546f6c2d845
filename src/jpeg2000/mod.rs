//! JPEG 2000 Part 1 decoder (ISO/IEC 15444-1 | ITU-T T.800).
//!
//! Pipeline: JP2 boxes (or a raw codestream), codestream markers, Tier-2
//! packet parsing with tag trees, Tier-1 MQ/EBCOT code-block decoding,
//! scalar dequantization, multi-level inverse DWT, then the inverse
//! component transform, DC level shift and clamp.

pub mod boxes;
pub mod codestream;
pub mod dwt;
pub mod tag_tree;
pub mod tier1;
pub mod tier2;

use log::{trace, warn};

use crate::error::{Error, Result};
use crate::image::DecodedImage;
use codestream::{ceil_div, Header, QuantizationKind, Rect, WaveletKernel};
use dwt::BandInput;
use tier1::CodeBlockDecoder;
use tier2::{Band, TileComponent};

/// Decode a JP2 file or raw codestream (SOC-first) into interleaved
/// samples.
pub fn decode(data: &[u8]) -> Result<DecodedImage> {
    let codestream = if boxes::BoxReader::is_jp2(data) {
        let (_header, cs) = boxes::BoxReader::new(data).find_codestream()?;
        cs
    } else {
        data
    };
    decode_codestream(codestream)
}

/// Decode a raw codestream.
pub fn decode_codestream(data: &[u8]) -> Result<DecodedImage> {
    let (header, tiles) = codestream::parse(data)?;
    let siz = &header.siz;

    // Component planes over the whole image area, on each component's
    // sampling grid.
    let mut planes: Vec<ComponentPlane> = (0..siz.components.len())
        .map(|c| ComponentPlane::new(&header, c))
        .collect();

    let mut cb_decoder = CodeBlockDecoder::new();
    for (tile_index, parts) in tiles.iter().enumerate() {
        let tile = tile_index as u32;
        let mut comps = tier2::build_tile(&header, tile)?;
        // Tile-parts concatenate into the tile's packet stream.
        let tile_data: Vec<u8> = parts.concat();
        tier2::read_tile_packets(&header, tile, &mut comps, &tile_data)?;

        for (c, comp) in comps.iter_mut().enumerate() {
            decode_component_bands(&header, c, comp, &mut cb_decoder)?;
        }

        let mut outputs: Vec<(Rect, Vec<f32>)> = Vec::with_capacity(comps.len());
        for (c, comp) in comps.iter_mut().enumerate() {
            outputs.push(synthesize_component(&header, c, comp));
        }

        apply_mct(&header, &mut outputs);

        for (c, (rect, samples)) in outputs.into_iter().enumerate() {
            planes[c].store_tile(&header, c, &rect, &samples);
        }
    }

    assemble(&header, &planes)
}

/// Decoded samples of one component across the image.
struct ComponentPlane {
    x0: i64,
    y0: i64,
    width: usize,
    height: usize,
    precision: u8,
    data: Vec<u16>,
}

impl ComponentPlane {
    fn new(header: &Header, c: usize) -> Self {
        let siz = &header.siz;
        let comp = &siz.components[c];
        let x0 = ceil_div(i64::from(siz.x_offset), i64::from(comp.dx));
        let y0 = ceil_div(i64::from(siz.y_offset), i64::from(comp.dy));
        let x1 = ceil_div(i64::from(siz.width), i64::from(comp.dx));
        let y1 = ceil_div(i64::from(siz.height), i64::from(comp.dy));
        let width = (x1 - x0).max(0) as usize;
        let height = (y1 - y0).max(0) as usize;
        Self { x0, y0, width, height, precision: comp.precision, data: vec![0; width * height] }
    }

    /// Level-shift, clamp and store a tile-component's samples.
    fn store_tile(&mut self, header: &Header, c: usize, rect: &Rect, samples: &[f32]) {
        let comp = &header.siz.components[c];
        let shift = if comp.signed { 0.0 } else { f32::from(self.precision - 1).exp2() };
        let max = (1i64 << self.precision) - 1;
        let w = rect.width() as usize;
        if w == 0 {
            return;
        }
        for (i, &v) in samples.iter().enumerate() {
            let x = rect.x0 + (i % w) as i64 - self.x0;
            let y = rect.y0 + (i / w) as i64 - self.y0;
            if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
                continue;
            }
            let value = ((v + shift).round() as i64).clamp(0, max);
            self.data[y as usize * self.width + x as usize] = value as u16;
        }
    }
}

/// Tier-1 decode every code-block of a tile-component, dequantize and
/// scatter the coefficients into the sub-band arrays.
fn decode_component_bands(
    header: &Header,
    c: usize,
    comp: &mut TileComponent,
    decoder: &mut CodeBlockDecoder,
) -> Result<()> {
    let params = header.coding_params(c).clone();
    let quant = header.quant(c).clone();
    let precision = header.siz.components[c].precision;

    for res in comp.resolutions.iter_mut() {
        for band in res.bands.iter_mut() {
            let (exponent, mantissa) =
                quant.exponent_mantissa(band.quant_index, band.level, params.decomposition_levels);
            let num_bitplanes = i32::from(quant.guard_bits) + i32::from(exponent) - 1;
            if num_bitplanes < 0 || num_bitplanes > i32::from(tier1::MAX_BITPLANES) {
                return Err(Error::malformed(0, "bit-plane count out of range"));
            }
            let num_bitplanes = num_bitplanes as u8;

            // Reversible data is used as integers; the irreversible path
            // reconstructs at the centre of the quantization bin.
            let delta = if quant.kind == QuantizationKind::None {
                None
            } else {
                let r_b = i32::from(precision) + i32::from(band.kind.log_gain());
                let step = ((r_b - i32::from(exponent)) as f32).exp2()
                    * (1.0 + f32::from(mantissa) / 2048.0);
                Some(step)
            };

            let Band { rect, precincts, coeffs, kind, .. } = band;
            let band_w = rect.width() as i64;
            for precinct in precincts.iter() {
                for cb in &precinct.blocks {
                    if cb.rect.is_empty() || cb.passes == 0 {
                        continue;
                    }
                    let w = cb.rect.width();
                    let h = cb.rect.height();
                    decoder.decode(
                        &cb.data,
                        w,
                        h,
                        *kind,
                        &params.style,
                        cb.passes,
                        cb.zero_bit_planes,
                        num_bitplanes,
                    )?;

                    for y in 0..i64::from(h) {
                        for x in 0..i64::from(w) {
                            let (value, undecoded) =
                                decoder.sample((y * i64::from(w) + x) as usize, num_bitplanes);
                            let out = match delta {
                                None => value as f32,
                                Some(step) => {
                                    if value == 0 {
                                        0.0
                                    } else {
                                        let half_bin = 0.5 * (1u64 << undecoded) as f32;
                                        let magnitude = value.unsigned_abs() as f32 + half_bin;
                                        magnitude * step * if value < 0 { -1.0 } else { 1.0 }
                                    }
                                }
                            };
                            let dst = (cb.rect.y0 - rect.y0 + y) * band_w
                                + (cb.rect.x0 - rect.x0 + x);
                            coeffs[dst as usize] = out;
                        }
                    }
                }
            }
        }
    }
    Ok(())
}

/// Multi-level inverse DWT of one tile-component.
fn synthesize_component(header: &Header, c: usize, comp: &mut TileComponent) -> (Rect, Vec<f32>) {
    let kernel = header.coding_params(c).kernel;
    let mut ll_rect = comp.resolutions[0].bands[0].rect;
    let mut ll = std::mem::take(&mut comp.resolutions[0].bands[0].coeffs);

    for res in comp.resolutions[1..].iter_mut() {
        let out_rect = res.rect;
        let [hl, lh, hh] = &mut res.bands[..] else {
            unreachable!("upper resolutions carry three bands");
        };
        let out = dwt::compose_level(
            ll_rect,
            &ll,
            BandInput { rect: hl.rect, coeffs: &hl.coeffs },
            BandInput { rect: lh.rect, coeffs: &lh.coeffs },
            BandInput { rect: hh.rect, coeffs: &hh.coeffs },
            out_rect,
            kernel,
        );
        ll = out;
        ll_rect = out_rect;
    }
    trace!(
        "component {c}: synthesized {}x{} tile region",
        ll_rect.width(),
        ll_rect.height()
    );
    (ll_rect, ll)
}

/// Inverse multiple-component transform on the first three components.
fn apply_mct(header: &Header, outputs: &mut [(Rect, Vec<f32>)]) {
    if !header.cod.mct {
        return;
    }
    if outputs.len() < 3 {
        warn!("MCT signalled with fewer than 3 components");
        return;
    }
    let (first, rest) = outputs.split_at_mut(1);
    let (second, third) = rest.split_at_mut(1);
    let (r0, y) = &mut first[0];
    let (r1, cb) = &mut second[0];
    let (r2, cr) = &mut third[0];
    if r0 != r1 || r1 != r2 {
        warn!("MCT components have mismatched geometry; skipping transform");
        return;
    }

    match header.coding_params(0).kernel {
        WaveletKernel::Reversible53 => {
            for ((y0, cb0), cr0) in y.iter_mut().zip(cb.iter_mut()).zip(cr.iter_mut()) {
                let g = *y0 - ((*cb0 + *cr0) / 4.0).floor();
                let r = *cr0 + g;
                let b = *cb0 + g;
                *y0 = r;
                *cb0 = g;
                *cr0 = b;
            }
        }
        WaveletKernel::Irreversible97 => {
            for ((y0, cb0), cr0) in y.iter_mut().zip(cb.iter_mut()).zip(cr.iter_mut()) {
                let r = *y0 + 1.402 * *cr0;
                let g = *y0 - 0.344_136 * *cb0 - 0.714_136 * *cr0;
                let b = *y0 + 1.772 * *cb0;
                *y0 = r;
                *cb0 = g;
                *cr0 = b;
            }
        }
    }
}

/// Interleave the component planes into the final image, upsampling
/// subsampled components by replication.
fn assemble(header: &Header, planes: &[ComponentPlane]) -> Result<DecodedImage> {
    let siz = &header.siz;
    let width = (siz.width - siz.x_offset) as usize;
    let height = (siz.height - siz.y_offset) as usize;
    let channels = planes.len();
    if channels == 0 || width == 0 || height == 0 {
        return Err(Error::malformed(0, "empty image"));
    }
    let bit_depth = planes.iter().map(|p| p.precision).max().unwrap();

    let sample_at = |p: &ComponentPlane, c: usize, x: usize, y: usize| -> u16 {
        if p.width == 0 || p.height == 0 {
            return 0;
        }
        let comp = &siz.components[c];
        let rx = i64::from(siz.x_offset) + x as i64;
        let ry = i64::from(siz.y_offset) + y as i64;
        let sx = (rx.div_euclid(i64::from(comp.dx)) - p.x0).clamp(0, p.width as i64 - 1);
        let sy = (ry.div_euclid(i64::from(comp.dy)) - p.y0).clamp(0, p.height as i64 - 1);
        p.data[sy as usize * p.width + sx as usize]
    };

    let mut pixels;
    if bit_depth <= 8 {
        pixels = Vec::with_capacity(width * height * channels);
        for y in 0..height {
            for x in 0..width {
                for (c, plane) in planes.iter().enumerate() {
                    pixels.push(sample_at(plane, c, x, y) as u8);
                }
            }
        }
    } else {
        pixels = Vec::with_capacity(width * height * channels * 2);
        for y in 0..height {
            for x in 0..width {
                for (c, plane) in planes.iter().enumerate() {
                    pixels.extend_from_slice(&sample_at(plane, c, x, y).to_be_bytes());
                }
            }
        }
    }

    Ok(DecodedImage {
        width: width as u32,
        height: height as u32,
        channels: channels as u8,
        bit_depth,
        pixels,
    })
}
