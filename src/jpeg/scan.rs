//! Baseline entropy decoding of a scan: the MCU walk, per-block Huffman
//! decoding of DCT coefficients, dequantization and the inverse zig-zag
//! permutation, with restart-marker handling.

use log::trace;

use crate::error::{Error, Result};
use crate::jpeg::bitreader::JpegBitReader;
use crate::jpeg::color::Plane;
use crate::jpeg::huffman::HuffmanTable;
use crate::jpeg::idct::Idct;
use crate::jpeg::marker::{Frame, QuantTable, Scan};

/// Zig-zag index -> natural (row-major) index.
pub const ZIGZAG: [usize; 64] = [
    0, 1, 8, 16, 9, 2, 3, 10, //
    17, 24, 32, 25, 18, 11, 4, 5, //
    12, 19, 26, 33, 40, 48, 41, 34, //
    27, 20, 13, 6, 7, 14, 21, 28, //
    35, 42, 49, 56, 57, 50, 43, 36, //
    29, 22, 15, 23, 30, 37, 44, 51, //
    58, 59, 52, 45, 38, 31, 39, 46, //
    53, 60, 61, 54, 47, 55, 62, 63,
];

struct BlockTables<'t> {
    dc: &'t HuffmanTable,
    ac: &'t HuffmanTable,
    quant: &'t QuantTable,
}

/// Decode the entropy-coded data of one scan into the component planes.
///
/// `data` starts right after the SOS header. Returns the offset within
/// `data` of the marker that follows the scan.
#[allow(clippy::too_many_arguments)]
pub fn decode_scan(
    frame: &Frame,
    scan: &Scan,
    dc_tables: &[Option<HuffmanTable>; 4],
    ac_tables: &[Option<HuffmanTable>; 4],
    quant_tables: &[Option<QuantTable>; 4],
    restart_interval: u16,
    data: &[u8],
    planes: &mut [Plane],
    idct: &Idct,
) -> Result<usize> {
    let mut tables = Vec::with_capacity(scan.components.len());
    for &(index, td, ta) in &scan.components {
        let comp = &frame.components[index];
        let dc = dc_tables[td as usize]
            .as_ref()
            .ok_or(Error::malformed(0, "missing DC Huffman table"))?;
        let ac = ac_tables[ta as usize]
            .as_ref()
            .ok_or(Error::malformed(0, "missing AC Huffman table"))?;
        let quant = quant_tables[comp.quant_id as usize]
            .as_ref()
            .ok_or(Error::malformed(0, "missing quantization table"))?;
        tables.push(BlockTables { dc, ac, quant });
    }

    let mut bits = JpegBitReader::new(data);
    let mut predictors = vec![0i32; scan.components.len()];
    let interval = restart_interval as usize;
    let mut next_restart = 0u8;

    if scan.components.len() > 1 {
        // Interleaved: iterate MCUs row-major across the frame grid.
        let (mcus_x, mcus_y) = frame.mcu_grid();
        let total = (mcus_x * mcus_y) as usize;
        trace!("interleaved scan, {mcus_x}x{mcus_y} MCUs");
        let mut done = 0usize;
        for mcu_y in 0..mcus_y {
            for mcu_x in 0..mcus_x {
                if interval > 0 && done > 0 && done % interval == 0 && done < total {
                    bits.sync_to_restart(next_restart)?;
                    next_restart = (next_restart + 1) & 7;
                    predictors.iter_mut().for_each(|p| *p = 0);
                }
                for (slot, &(index, ..)) in scan.components.iter().enumerate() {
                    let comp = frame.components[index];
                    let (blocks_per_row, _) = frame.component_blocks(index);
                    for sub_y in 0..u32::from(comp.v) {
                        for sub_x in 0..u32::from(comp.h) {
                            let gx = mcu_x * u32::from(comp.h) + sub_x;
                            let gy = mcu_y * u32::from(comp.v) + sub_y;
                            decode_block_into(
                                &mut bits,
                                &tables[slot],
                                &mut predictors[slot],
                                idct,
                                &mut planes[index],
                                gy as usize * blocks_per_row as usize + gx as usize,
                                blocks_per_row as usize,
                            )?;
                        }
                    }
                }
                done += 1;
            }
        }
    } else {
        // Non-interleaved: one component, its own block grid, one block
        // per "MCU".
        let (index, ..) = scan.components[0];
        let comp = frame.components[index];
        let comp_width = (frame.width * u32::from(comp.h)).div_ceil(u32::from(frame.h_max));
        let comp_height = (frame.height * u32::from(comp.v)).div_ceil(u32::from(frame.v_max));
        let blocks_x = comp_width.div_ceil(8) as usize;
        let blocks_y = comp_height.div_ceil(8) as usize;
        // The plane is padded to the interleaved grid; rows use its pitch.
        let (pitch, _) = frame.component_blocks(index);
        trace!("non-interleaved scan, {blocks_x}x{blocks_y} blocks");
        let total = blocks_x * blocks_y;
        let mut done = 0usize;
        for by in 0..blocks_y {
            for bx in 0..blocks_x {
                if interval > 0 && done > 0 && done % interval == 0 && done < total {
                    bits.sync_to_restart(next_restart)?;
                    next_restart = (next_restart + 1) & 7;
                    predictors[0] = 0;
                }
                decode_block_into(
                    &mut bits,
                    &tables[0],
                    &mut predictors[0],
                    idct,
                    &mut planes[index],
                    by * pitch as usize + bx,
                    pitch as usize,
                )?;
                done += 1;
            }
        }
    }

    bits.next_marker_pos()
}

#[allow(clippy::too_many_arguments)]
fn decode_block_into(
    bits: &mut JpegBitReader<'_>,
    tables: &BlockTables<'_>,
    predictor: &mut i32,
    idct: &Idct,
    plane: &mut Plane,
    block_index: usize,
    blocks_per_row: usize,
) -> Result<()> {
    let mut coef = [0i32; 64];
    decode_block(bits, tables, predictor, &mut coef)?;
    let mut pixels = [0u8; 64];
    idct.transform(&coef, &mut pixels);
    let bx = block_index % blocks_per_row;
    let by = block_index / blocks_per_row;
    plane.set_block(bx, by, &pixels);
    Ok(())
}

/// Decode one 8x8 block: DC difference, AC run-lengths, dequantization and
/// the zig-zag to natural permutation.
fn decode_block(
    bits: &mut JpegBitReader<'_>,
    tables: &BlockTables<'_>,
    predictor: &mut i32,
    out: &mut [i32; 64],
) -> Result<()> {
    let quant = &tables.quant.0;

    let size = tables.dc.decode(bits)?;
    if size > 11 {
        return Err(Error::malformed(bits.offset(), "DC category out of range"));
    }
    let diff = bits.read_signed(size)?;
    *predictor += diff;
    out[0] = *predictor * i32::from(quant[0]);

    let mut k = 1usize;
    while k < 64 {
        let rs = tables.ac.decode(bits)?;
        let run = usize::from(rs >> 4);
        let size = rs & 0x0F;
        if rs == 0x00 {
            // End of block: the rest stays zero.
            break;
        }
        if rs == 0xF0 {
            k += 16;
            continue;
        }
        if size == 0 || size > 10 {
            return Err(Error::malformed(bits.offset(), "AC category out of range"));
        }
        k += run;
        if k > 63 {
            return Err(Error::malformed(bits.offset(), "AC run exceeds block"));
        }
        let value = bits.read_signed(size)?;
        out[ZIGZAG[k]] = value * i32::from(quant[k]);
        k += 1;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zigzag_is_a_bijection() {
        let mut seen = [false; 64];
        for &n in &ZIGZAG {
            assert!(!seen[n]);
            seen[n] = true;
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn zigzag_involution_via_inverse() {
        // Applying the permutation and then its inverse is the identity.
        let mut inverse = [0usize; 64];
        for (zz, &n) in ZIGZAG.iter().enumerate() {
            inverse[n] = zz;
        }
        for k in 0..64 {
            assert_eq!(inverse[ZIGZAG[k]], k);
            assert_eq!(ZIGZAG[inverse[k]], k);
        }
    }

    #[test]
    fn zigzag_corners() {
        assert_eq!(ZIGZAG[0], 0);
        assert_eq!(ZIGZAG[1], 1);
        assert_eq!(ZIGZAG[2], 8);
        assert_eq!(ZIGZAG[63], 63);
    }
}
