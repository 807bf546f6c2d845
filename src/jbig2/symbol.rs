//! Symbol dictionary decoding (ITU-T T.88 7.4.3.1... 6.5): height
//! classes of delta-coded symbol widths, with the bitmaps produced by
//! direct generic coding, by refinement/aggregation against earlier
//! symbols, or (in Huffman mode) by collective height-class bitmaps, and
//! an export run-length pass selecting the surviving symbols.

use log::trace;

use crate::arith::{ArithmeticDecoder, Context};
use crate::bits::{BitReader, Reader};
use crate::error::{Error, Result};
use crate::jbig2::arith_int::{symbol_code_len, IntDecoder};
use crate::jbig2::bitmap::{Bitmap, CombOp};
use crate::jbig2::generic::{self, AtPixel};
use crate::jbig2::huffman::{HuffmanTable, StandardTables};
use crate::jbig2::mmr;
use crate::jbig2::refinement;
use crate::jbig2::text::{self, ArithTextContexts, RefCorner, TextParams};
use crate::jbig2::Limits;

#[derive(Debug, Clone)]
pub struct SymbolDictionary {
    pub symbols: Vec<Bitmap>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TableChoice {
    Standard(usize),
    Custom,
}

struct Flags {
    huffman: bool,
    refagg: bool,
    dh_table: TableChoice,
    dw_table: TableChoice,
    bmsize_table: TableChoice,
    agg_table: TableChoice,
    template: u8,
    r_template: u8,
}

fn parse_flags(word: u16, at: usize) -> Result<Flags> {
    let dh_table = match (word >> 2) & 3 {
        0 => TableChoice::Standard(4),
        1 => TableChoice::Standard(5),
        3 => TableChoice::Custom,
        _ => return Err(Error::malformed(at, "bad DH table selection")),
    };
    let dw_table = match (word >> 4) & 3 {
        0 => TableChoice::Standard(2),
        1 => TableChoice::Standard(3),
        3 => TableChoice::Custom,
        _ => return Err(Error::malformed(at, "bad DW table selection")),
    };
    Ok(Flags {
        huffman: word & 0x0001 != 0,
        refagg: word & 0x0002 != 0,
        dh_table,
        dw_table,
        bmsize_table: if word & 0x0040 != 0 { TableChoice::Custom } else { TableChoice::Standard(1) },
        agg_table: if word & 0x0080 != 0 { TableChoice::Custom } else { TableChoice::Standard(1) },
        template: ((word >> 10) & 3) as u8,
        r_template: ((word >> 12) & 1) as u8,
    })
}

/// Decode a symbol dictionary segment.
pub fn decode(
    data: &[u8],
    input_symbols: &[&Bitmap],
    referred_tables: &[&HuffmanTable],
    std_tables: &StandardTables,
    limits: &Limits,
) -> Result<SymbolDictionary> {
    let mut r = Reader::new(data);
    let flags = parse_flags(r.read_u16()?, 0)?;

    let at_pixels = if !flags.huffman {
        generic::parse_at_pixels(&mut r, flags.template, false)?
    } else {
        Vec::new()
    };
    let r_at_pixels = if flags.refagg && flags.r_template == 0 {
        refinement::parse_refinement_at_pixels(&mut r)?
    } else {
        Vec::new()
    };

    let num_exported = r.read_u32()?;
    let num_new = r.read_u32()?;
    let total = num_new as u64 + input_symbols.len() as u64;
    if total > u64::from(limits.max_symbols) {
        return Err(Error::ResourceExceeded { reason: "too many symbols in dictionary" });
    }
    trace!(
        "symbol dictionary: {} new, {} imported, {} exported, huffman={}",
        num_new,
        input_symbols.len(),
        num_exported,
        flags.huffman
    );

    let new_symbols = if flags.huffman {
        if flags.refagg {
            return Err(Error::unsupported(r.pos(), "Huffman refinement/aggregate symbols"));
        }
        decode_new_symbols_huffman(
            &mut r,
            &flags,
            num_new,
            referred_tables,
            std_tables,
            limits,
        )?
    } else {
        decode_new_symbols_arith(
            r.tail(),
            &flags,
            num_new,
            input_symbols,
            &at_pixels,
            &r_at_pixels,
            limits,
        )?
    };

    // Export pass: the run lengths alternate "not exported"/"exported"
    // over imported + new symbols (6.5.10). In Huffman mode the runs sit
    // in the same bit stream, decoded by the caller path below.
    let exported = match &new_symbols {
        NewSymbols::WithExports { symbols, exported } => {
            select_exported(input_symbols, symbols, exported, num_exported)?
        }
        NewSymbols::Plain(symbols) => {
            // Huffman: the export run lengths follow the last height
            // class, via Table B.1.
            let mut bits = BitReader::new(r.tail());
            let table_a = std_tables.get(1);
            let total = input_symbols.len() + symbols.len();
            let mut flags_vec = vec![false; total];
            let mut index = 0usize;
            let mut current = false;
            while index < total {
                let run = table_a
                    .decode(&mut bits)?
                    .ok_or(Error::malformed(0, "unexpected OOB in export runs"))?;
                let run = usize::try_from(run)
                    .map_err(|_| Error::malformed(0, "bad export run length"))?;
                for f in flags_vec.iter_mut().skip(index).take(run) {
                    *f = current;
                }
                index += run;
                current = !current;
            }
            select_exported(input_symbols, symbols, &flags_vec, num_exported)?
        }
    };

    Ok(SymbolDictionary { symbols: exported })
}

enum NewSymbols {
    /// Arithmetic path: export flags decoded from the same arithmetic
    /// stream.
    WithExports { symbols: Vec<Bitmap>, exported: Vec<bool> },
    /// Huffman path: export runs follow in the outer bit stream.
    Plain(Vec<Bitmap>),
}

fn select_exported(
    input_symbols: &[&Bitmap],
    new_symbols: &[Bitmap],
    flags: &[bool],
    num_exported: u32,
) -> Result<Vec<Bitmap>> {
    let mut exported = Vec::with_capacity(num_exported as usize);
    for (i, &keep) in flags.iter().enumerate() {
        if !keep {
            continue;
        }
        let symbol = if i < input_symbols.len() {
            input_symbols[i].clone()
        } else {
            new_symbols[i - input_symbols.len()].clone()
        };
        exported.push(symbol);
    }
    if exported.len() != num_exported as usize {
        return Err(Error::malformed(0, "exported symbol count mismatch"));
    }
    Ok(exported)
}

#[allow(clippy::too_many_arguments)]
fn decode_new_symbols_arith(
    data: &[u8],
    flags: &Flags,
    num_new: u32,
    input_symbols: &[&Bitmap],
    at_pixels: &[AtPixel],
    r_at_pixels: &[AtPixel],
    limits: &Limits,
) -> Result<NewSymbols> {
    let mut decoder = ArithmeticDecoder::new(data);
    let mut iadh = IntDecoder::new();
    let mut iadw = IntDecoder::new();
    let mut iaex = IntDecoder::new();
    let mut iaai = IntDecoder::new();
    let mut gb_contexts = vec![Context::default(); generic::context_size(flags.template)];
    let mut gr_contexts = vec![Context::default(); refinement::context_size(flags.r_template)];

    let total = input_symbols.len() as u32 + num_new;
    let mut text_ctx = ArithTextContexts::new(symbol_code_len(total));

    let mut new_symbols: Vec<Bitmap> = Vec::with_capacity(num_new as usize);
    let mut height: u64 = 0;

    while (new_symbols.len() as u32) < num_new {
        // b) Height class delta height (6.5.6).
        let dh = iadh
            .decode(&mut decoder)
            .ok_or(Error::malformed(0, "unexpected OOB for delta height"))?;
        height = height
            .checked_add_signed(i64::from(dh))
            .ok_or(Error::malformed(0, "negative symbol height"))?;
        let mut width: u64 = 0;

        // c) Symbols of this height class until OOB.
        while let Some(dw) = iadw.decode(&mut decoder) {
            width = width
                .checked_add_signed(i64::from(dw))
                .ok_or(Error::malformed(0, "negative symbol width"))?;
            if (new_symbols.len() as u32) >= num_new {
                return Err(Error::malformed(0, "height class exceeds declared symbol count"));
            }
            check_symbol_size(width, height, limits)?;

            let symbol = if !flags.refagg {
                // 6.5.8.1, Table 16: direct generic coding, TPGDON off.
                generic::decode_bitmap(
                    &mut decoder,
                    &mut gb_contexts,
                    width as u32,
                    height as u32,
                    flags.template,
                    at_pixels,
                    false,
                    None,
                )?
            } else {
                decode_refagg_symbol(
                    &mut decoder,
                    &mut text_ctx,
                    &mut iaai,
                    &mut gr_contexts,
                    flags,
                    input_symbols,
                    &new_symbols,
                    width as u32,
                    height as u32,
                    r_at_pixels,
                    limits,
                )?
            };
            new_symbols.push(symbol);
        }
    }

    // 6.5.10 with the IAEX decoder.
    let total = input_symbols.len() + new_symbols.len();
    let mut exported = vec![false; total];
    let mut index = 0usize;
    let mut current = false;
    while index < total {
        let run = iaex
            .decode(&mut decoder)
            .ok_or(Error::malformed(0, "unexpected OOB in export runs"))?;
        if run < 0 {
            return Err(Error::malformed(0, "negative export run"));
        }
        for f in exported.iter_mut().skip(index).take(run as usize) {
            *f = current;
        }
        index += run as usize;
        current = !current;
    }

    Ok(NewSymbols::WithExports { symbols: new_symbols, exported })
}

/// One symbol coded by refinement or aggregation (6.5.8.2).
#[allow(clippy::too_many_arguments)]
fn decode_refagg_symbol(
    decoder: &mut ArithmeticDecoder<'_>,
    text_ctx: &mut ArithTextContexts,
    iaai: &mut IntDecoder,
    gr_contexts: &mut [Context],
    flags: &Flags,
    input_symbols: &[&Bitmap],
    new_symbols: &[Bitmap],
    width: u32,
    height: u32,
    r_at_pixels: &[AtPixel],
    limits: &Limits,
) -> Result<Bitmap> {
    let instances = iaai
        .decode(decoder)
        .ok_or(Error::malformed(0, "unexpected OOB for aggregate count"))?;
    if instances <= 0 {
        return Err(Error::malformed(0, "bad aggregate instance count"));
    }
    if instances as u32 > limits.max_refinement_instances {
        return Err(Error::ResourceExceeded { reason: "too many aggregate instances" });
    }

    let mut all: Vec<&Bitmap> = Vec::with_capacity(input_symbols.len() + new_symbols.len());
    all.extend_from_slice(input_symbols);
    all.extend(new_symbols.iter());

    if instances == 1 {
        // 6.5.8.2.2: one refinement of an existing symbol.
        let id = text_ctx.iaid.decode(decoder) as usize;
        let rdx = text_ctx
            .iardx
            .decode(decoder)
            .ok_or(Error::malformed(0, "unexpected OOB for RDX"))?;
        let rdy = text_ctx
            .iardy
            .decode(decoder)
            .ok_or(Error::malformed(0, "unexpected OOB for RDY"))?;
        let reference = *all.get(id).ok_or(Error::malformed(0, "symbol ID out of range"))?;
        refinement::decode_bitmap(
            decoder,
            gr_contexts,
            width,
            height,
            flags.r_template,
            r_at_pixels,
            reference,
            i64::from(rdx),
            i64::from(rdy),
            false,
        )
    } else {
        // 6.5.8.2, Table 17: a one-strip text region over the existing
        // symbols.
        let params = TextParams {
            width,
            height,
            num_instances: instances as u32,
            strips: 1,
            log_strips: 0,
            default_pixel: false,
            comb_op: CombOp::Or,
            transposed: false,
            ref_corner: RefCorner::TopLeft,
            ds_offset: 0,
            refine: true,
            r_template: flags.r_template,
            r_at: r_at_pixels,
        };
        text::decode_with_arith(decoder, text_ctx, gr_contexts, &all, &params)
    }
}

fn check_symbol_size(width: u64, height: u64, limits: &Limits) -> Result<()> {
    if width == 0 || height == 0 {
        // Zero-area symbols are legal placeholders.
        return Ok(());
    }
    let bytes = (width.div_ceil(8)) * height;
    if bytes > limits.max_bitmap_bytes as u64 {
        return Err(Error::ResourceExceeded { reason: "symbol bitmap too large" });
    }
    Ok(())
}

/// Huffman-coded height classes with collective bitmaps (6.5.9).
fn decode_new_symbols_huffman(
    r: &mut Reader<'_>,
    flags: &Flags,
    num_new: u32,
    referred_tables: &[&HuffmanTable],
    std_tables: &StandardTables,
    limits: &Limits,
) -> Result<NewSymbols> {
    fn pick<'t>(
        choice: TableChoice,
        custom_index: &mut usize,
        referred: &[&'t HuffmanTable],
        std_tables: &'t StandardTables,
    ) -> Result<&'t HuffmanTable> {
        match choice {
            TableChoice::Standard(n) => Ok(std_tables.get(n)),
            TableChoice::Custom => {
                let table = referred
                    .get(*custom_index)
                    .copied()
                    .ok_or(Error::malformed(0, "missing custom Huffman table"))?;
                *custom_index += 1;
                Ok(table)
            }
        }
    }
    let mut custom_index = 0usize;
    let dh_table = pick(flags.dh_table, &mut custom_index, referred_tables, std_tables)?;
    let dw_table = pick(flags.dw_table, &mut custom_index, referred_tables, std_tables)?;
    let bmsize_table = pick(flags.bmsize_table, &mut custom_index, referred_tables, std_tables)?;
    let _agg_table = pick(flags.agg_table, &mut custom_index, referred_tables, std_tables)?;

    let data = r.tail();
    let mut bits = BitReader::new(data);
    let mut new_symbols: Vec<Bitmap> = Vec::with_capacity(num_new as usize);
    let mut height: u64 = 0;

    while (new_symbols.len() as u32) < num_new {
        let dh = dh_table
            .decode(&mut bits)?
            .ok_or(Error::malformed(0, "unexpected OOB for delta height"))?;
        height = height
            .checked_add_signed(dh)
            .ok_or(Error::malformed(0, "negative symbol height"))?;
        let mut width: u64 = 0;
        let mut total_width: u64 = 0;
        let mut class_widths: Vec<u32> = Vec::new();

        while let Some(dw) = dw_table.decode(&mut bits)? {
            width = width
                .checked_add_signed(dw)
                .ok_or(Error::malformed(0, "negative symbol width"))?;
            total_width += width;
            check_symbol_size(width, height, limits)?;
            if new_symbols.len() + class_widths.len() >= num_new as usize {
                return Err(Error::malformed(0, "height class exceeds declared symbol count"));
            }
            class_widths.push(width as u32);
        }

        check_symbol_size(total_width, height, limits)?;
        let bmsize = bmsize_table
            .decode(&mut bits)?
            .ok_or(Error::malformed(0, "unexpected OOB for BMSIZE"))?;
        let bmsize =
            usize::try_from(bmsize).map_err(|_| Error::malformed(0, "bad BMSIZE"))?;
        bits.align_to_byte();

        let collective = if bmsize == 0 {
            // Uncompressed rows, ceil(totwidth / 8) bytes each.
            let mut bitmap = Bitmap::new(total_width as u32, height as u32);
            let row_bytes = (total_width as usize).div_ceil(8);
            for y in 0..height as u32 {
                for byte_index in 0..row_bytes {
                    let byte = bits.read_bits(8)? as u8;
                    for bit in 0..8 {
                        let x = (byte_index * 8 + bit) as u32;
                        if u64::from(x) < total_width && byte & (0x80 >> bit) != 0 {
                            bitmap.set(x, y, true);
                        }
                    }
                }
            }
            bitmap
        } else {
            let start = bits.byte_pos();
            let coded = data
                .get(start..start + bmsize)
                .ok_or(Error::Truncated { offset: start })?;
            let bitmap = mmr::decode(coded, total_width as u32, height as u32)?;
            bits.skip_bytes(bmsize)?;
            bitmap
        };

        // Break the collective bitmap into the class's symbols, left to
        // right with no gaps.
        let mut x_offset = 0u32;
        for w in class_widths {
            let mut symbol = Bitmap::new(w, height as u32);
            for y in 0..height as u32 {
                for x in 0..w {
                    if collective.get(x_offset + x, y) {
                        symbol.set(x, y, true);
                    }
                }
            }
            new_symbols.push(symbol);
            x_offset += w;
        }
    }

    // Report back how much of the stream the height classes consumed so
    // the export runs continue from there.
    bits.align_to_byte();
    let consumed = bits.byte_pos();
    r.skip(consumed)?;
    Ok(NewSymbols::Plain(new_symbols))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_select_tables() {
        let flags = parse_flags(0x0001, 0).unwrap();
        assert!(flags.huffman);
        assert!(!flags.refagg);
        assert_eq!(flags.dh_table, TableChoice::Standard(4));
        assert_eq!(flags.dw_table, TableChoice::Standard(2));
        assert_eq!(flags.template, 0);

        let flags = parse_flags((1 << 2) | (1 << 4) | (2 << 10), 0).unwrap();
        assert_eq!(flags.dh_table, TableChoice::Standard(5));
        assert_eq!(flags.dw_table, TableChoice::Standard(3));
        assert_eq!(flags.template, 2);
    }

    #[test]
    fn reserved_table_selection_is_rejected() {
        assert!(parse_flags(2 << 2, 0).is_err());
    }
}
