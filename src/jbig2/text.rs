//! Text region decoding (ITU-T T.88 6.4): placing symbol instance
//! bitmaps on a region bitmap, driven by the STRIPT/FIRSTS/CURS strip
//! state machine, with arithmetic and Huffman coding variants and
//! optional per-instance refinement.

use log::warn;

use crate::arith::{ArithmeticDecoder, Context};
use crate::bits::BitReader;
use crate::error::{Error, Result};
use crate::jbig2::arith_int::{IdDecoder, IntDecoder};
use crate::jbig2::bitmap::{Bitmap, CombOp};
use crate::jbig2::generic::AtPixel;
use crate::jbig2::huffman::HuffmanTable;
use crate::jbig2::refinement;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefCorner {
    BottomLeft = 0,
    TopLeft = 1,
    BottomRight = 2,
    TopRight = 3,
}

impl RefCorner {
    pub fn from_bits(v: u8) -> Self {
        match v & 3 {
            0 => RefCorner::BottomLeft,
            1 => RefCorner::TopLeft,
            2 => RefCorner::BottomRight,
            _ => RefCorner::TopRight,
        }
    }

    fn is_right(self) -> bool {
        matches!(self, RefCorner::TopRight | RefCorner::BottomRight)
    }

    fn is_bottom(self) -> bool {
        matches!(self, RefCorner::BottomLeft | RefCorner::BottomRight)
    }
}

/// Placement and coding parameters of one text region (Table 9 names in
/// the comments).
#[derive(Clone)]
pub struct TextParams<'a> {
    /// SBW, SBH.
    pub width: u32,
    pub height: u32,
    /// SBNUMINSTANCES.
    pub num_instances: u32,
    /// SBSTRIPS and its log2.
    pub strips: u32,
    pub log_strips: u32,
    /// SBDEFPIXEL.
    pub default_pixel: bool,
    /// SBCOMBOP.
    pub comb_op: CombOp,
    pub transposed: bool,
    pub ref_corner: RefCorner,
    /// SBDSOFFSET, signed.
    pub ds_offset: i32,
    /// SBREFINE plus the refinement template and AT pixels.
    pub refine: bool,
    pub r_template: u8,
    pub r_at: &'a [AtPixel],
}

/// The per-instance decoding operations, abstracted over the arithmetic
/// and Huffman variants.
trait TextSource {
    fn delta_t(&mut self) -> Result<i32>;
    fn first_s(&mut self) -> Result<i32>;
    /// None is the OOB result ending a strip.
    fn delta_s(&mut self) -> Result<Option<i32>>;
    fn cur_t(&mut self, log_strips: u32) -> Result<i32>;
    fn symbol_id(&mut self) -> Result<u32>;
    fn refine_flag(&mut self) -> Result<bool>;
    fn refine(&mut self, symbol: &Bitmap, r_template: u8, r_at: &[AtPixel]) -> Result<Bitmap>;
}

/// Integer decoding contexts of a text region in arithmetic mode; shared
/// with the refinement/aggregate path of symbol dictionaries so the
/// adaptive state carries across calls.
pub struct ArithTextContexts {
    pub iadt: IntDecoder,
    pub iafs: IntDecoder,
    pub iads: IntDecoder,
    pub iait: IntDecoder,
    pub iari: IntDecoder,
    pub iardw: IntDecoder,
    pub iardh: IntDecoder,
    pub iardx: IntDecoder,
    pub iardy: IntDecoder,
    pub iaid: IdDecoder,
}

impl ArithTextContexts {
    pub fn new(symbol_code_len: u32) -> Self {
        Self {
            iadt: IntDecoder::new(),
            iafs: IntDecoder::new(),
            iads: IntDecoder::new(),
            iait: IntDecoder::new(),
            iari: IntDecoder::new(),
            iardw: IntDecoder::new(),
            iardh: IntDecoder::new(),
            iardx: IntDecoder::new(),
            iardy: IntDecoder::new(),
            iaid: IdDecoder::new(symbol_code_len),
        }
    }
}

struct ArithSource<'s, 'a> {
    decoder: &'s mut ArithmeticDecoder<'a>,
    ctx: &'s mut ArithTextContexts,
    gr_contexts: &'s mut [Context],
}

impl TextSource for ArithSource<'_, '_> {
    fn delta_t(&mut self) -> Result<i32> {
        self.ctx
            .iadt
            .decode(self.decoder)
            .ok_or(Error::malformed(0, "unexpected OOB for DT"))
    }

    fn first_s(&mut self) -> Result<i32> {
        self.ctx
            .iafs
            .decode(self.decoder)
            .ok_or(Error::malformed(0, "unexpected OOB for FS"))
    }

    fn delta_s(&mut self) -> Result<Option<i32>> {
        Ok(self.ctx.iads.decode(self.decoder))
    }

    fn cur_t(&mut self, log_strips: u32) -> Result<i32> {
        if log_strips == 0 {
            return Ok(0);
        }
        self.ctx
            .iait
            .decode(self.decoder)
            .ok_or(Error::malformed(0, "unexpected OOB for T"))
    }

    fn symbol_id(&mut self) -> Result<u32> {
        Ok(self.ctx.iaid.decode(self.decoder))
    }

    fn refine_flag(&mut self) -> Result<bool> {
        Ok(self
            .ctx
            .iari
            .decode(self.decoder)
            .ok_or(Error::malformed(0, "unexpected OOB for RI"))?
            != 0)
    }

    fn refine(&mut self, symbol: &Bitmap, r_template: u8, r_at: &[AtPixel]) -> Result<Bitmap> {
        let rdw = self
            .ctx
            .iardw
            .decode(self.decoder)
            .ok_or(Error::malformed(0, "unexpected OOB for RDW"))?;
        let rdh = self
            .ctx
            .iardh
            .decode(self.decoder)
            .ok_or(Error::malformed(0, "unexpected OOB for RDH"))?;
        let rdx = self
            .ctx
            .iardx
            .decode(self.decoder)
            .ok_or(Error::malformed(0, "unexpected OOB for RDX"))?;
        let rdy = self
            .ctx
            .iardy
            .decode(self.decoder)
            .ok_or(Error::malformed(0, "unexpected OOB for RDY"))?;
        refine_instance(
            self.decoder,
            self.gr_contexts,
            symbol,
            rdw,
            rdh,
            rdx,
            rdy,
            r_template,
            r_at,
        )
    }
}

/// Huffman table selections of a text region (7.4.3.1.2).
pub struct HuffTextTables<'t> {
    pub fs: &'t HuffmanTable,
    pub ds: &'t HuffmanTable,
    pub dt: &'t HuffmanTable,
    pub rdw: &'t HuffmanTable,
    pub rdh: &'t HuffmanTable,
    pub rdx: &'t HuffmanTable,
    pub rdy: &'t HuffmanTable,
    pub rsize: &'t HuffmanTable,
    pub symbol: HuffmanTable,
}

struct HuffSource<'s, 'a, 't> {
    bits: &'s mut BitReader<'a>,
    tables: &'s HuffTextTables<'t>,
    gr_contexts: &'s mut [Context],
}

impl HuffSource<'_, '_, '_> {
    fn value(&mut self, table: &HuffmanTable, what: &'static str) -> Result<i32> {
        let v = table
            .decode(self.bits)?
            .ok_or(Error::malformed(self.bits.byte_pos(), "unexpected OOB"))?;
        i32::try_from(v).map_err(|_| Error::malformed(self.bits.byte_pos(), what))
    }
}

impl TextSource for HuffSource<'_, '_, '_> {
    fn delta_t(&mut self) -> Result<i32> {
        let table = self.tables.dt;
        self.value(table, "DT out of range")
    }

    fn first_s(&mut self) -> Result<i32> {
        let table = self.tables.fs;
        self.value(table, "FS out of range")
    }

    fn delta_s(&mut self) -> Result<Option<i32>> {
        match self.tables.ds.decode(self.bits)? {
            None => Ok(None),
            Some(v) => Ok(Some(
                i32::try_from(v).map_err(|_| Error::malformed(0, "DS out of range"))?,
            )),
        }
    }

    fn cur_t(&mut self, log_strips: u32) -> Result<i32> {
        if log_strips == 0 {
            return Ok(0);
        }
        Ok(self.bits.read_bits(log_strips as u8)? as i32)
    }

    fn symbol_id(&mut self) -> Result<u32> {
        let v = self
            .tables
            .symbol
            .decode(self.bits)?
            .ok_or(Error::malformed(self.bits.byte_pos(), "unexpected OOB for symbol ID"))?;
        Ok(v as u32)
    }

    fn refine_flag(&mut self) -> Result<bool> {
        Ok(self.bits.read_bit()? != 0)
    }

    fn refine(&mut self, symbol: &Bitmap, r_template: u8, r_at: &[AtPixel]) -> Result<Bitmap> {
        // 6.4.11: in Huffman mode the refinement data is an embedded
        // arithmetic-coded block of BMSIZE bytes, byte aligned.
        let tables = self.tables;
        let rdw = self.value(tables.rdw, "RDW out of range")?;
        let rdh = self.value(tables.rdh, "RDH out of range")?;
        let rdx = self.value(tables.rdx, "RDX out of range")?;
        let rdy = self.value(tables.rdy, "RDY out of range")?;
        let bmsize = self.value(tables.rsize, "BMSIZE out of range")?;
        let bmsize = usize::try_from(bmsize).map_err(|_| Error::malformed(0, "bad BMSIZE"))?;
        self.bits.align_to_byte();
        let start = self.bits.byte_pos();
        let data = self
            .bits
            .data()
            .get(start..start + bmsize)
            .ok_or(Error::Truncated { offset: start })?;
        let mut decoder = ArithmeticDecoder::new(data);
        let out = refine_instance(
            &mut decoder,
            self.gr_contexts,
            symbol,
            rdw,
            rdh,
            rdx,
            rdy,
            r_template,
            r_at,
        )?;
        self.bits.skip_bytes(bmsize)?;
        Ok(out)
    }
}

#[allow(clippy::too_many_arguments)]
fn refine_instance(
    decoder: &mut ArithmeticDecoder<'_>,
    gr_contexts: &mut [Context],
    symbol: &Bitmap,
    rdw: i32,
    rdh: i32,
    rdx: i32,
    rdy: i32,
    r_template: u8,
    r_at: &[AtPixel],
) -> Result<Bitmap> {
    let grw = i64::from(symbol.width) + i64::from(rdw);
    let grh = i64::from(symbol.height) + i64::from(rdh);
    if grw < 0 || grh < 0 || grw > u32::MAX as i64 || grh > u32::MAX as i64 {
        return Err(Error::malformed(0, "bad refinement dimensions"));
    }
    let dx = i64::from(rdw.div_euclid(2) + rdx);
    let dy = i64::from(rdh.div_euclid(2) + rdy);
    refinement::decode_bitmap(
        decoder,
        gr_contexts,
        grw as u32,
        grh as u32,
        r_template,
        r_at,
        symbol,
        dx,
        dy,
        false,
    )
}

/// Shared strip placement loop (6.4.5).
fn decode_region(
    source: &mut impl TextSource,
    symbols: &[&Bitmap],
    params: &TextParams<'_>,
) -> Result<Bitmap> {
    let mut bitmap = Bitmap::filled(params.width, params.height, params.default_pixel);
    let strips = i64::from(params.strips);

    // 3) STRIPT = -DT * SBSTRIPS; FIRSTS = 0; NINSTANCES = 0.
    let mut stript = -i64::from(source.delta_t()?) * strips;
    let mut firsts = 0i64;
    let mut instances = 0u32;

    while instances < params.num_instances {
        // b) Advance to the next strip.
        stript += i64::from(source.delta_t()?) * strips;
        let mut cur_s = 0i64;
        let mut first = true;

        loop {
            if first {
                // c) i: the first symbol of the strip.
                firsts += i64::from(source.first_s()?);
                cur_s = firsts;
                first = false;
            } else {
                // Subsequent symbols until OOB ends the strip.
                match source.delta_s()? {
                    None => break,
                    Some(ids) => cur_s += i64::from(ids) + i64::from(params.ds_offset),
                }
            }
            if instances >= params.num_instances {
                warn!("text region strip continues past declared instance count");
                break;
            }

            let cur_t = stript + i64::from(source.cur_t(params.log_strips)?);
            let id = source.symbol_id()? as usize;
            let symbol = *symbols
                .get(id)
                .ok_or(Error::malformed(0, "symbol ID out of range"))?;

            let refined;
            let instance: &Bitmap = if params.refine && source.refine_flag()? {
                refined = source.refine(symbol, params.r_template, params.r_at)?;
                &refined
            } else {
                symbol
            };

            draw_instance(&mut bitmap, instance, &mut cur_s, cur_t, params);
            instances += 1;
        }
    }
    Ok(bitmap)
}

/// Place one instance per 6.4.5 steps vi through xi, advancing CURS to
/// the trailing edge.
fn draw_instance(
    bitmap: &mut Bitmap,
    instance: &Bitmap,
    cur_s: &mut i64,
    cur_t: i64,
    params: &TextParams<'_>,
) {
    let w = i64::from(instance.width);
    let h = i64::from(instance.height);
    let corner = params.ref_corner;

    // Along the S axis the reference point is the trailing edge for
    // right (untransposed) or bottom (transposed) corners.
    let advance = if params.transposed { h - 1 } else { w - 1 };
    let pre = if params.transposed { corner.is_bottom() } else { corner.is_right() };
    if pre {
        *cur_s += advance;
    }

    let (px, py) = if params.transposed { (cur_t, *cur_s) } else { (*cur_s, cur_t) };
    let x0 = if corner.is_right() { px - (w - 1) } else { px };
    let y0 = if corner.is_bottom() { py - (h - 1) } else { py };
    bitmap.combine(instance, x0, y0, params.comb_op);

    if !pre {
        *cur_s += advance;
    }
}

/// Arithmetic-coded text region body.
pub fn decode_with_arith(
    decoder: &mut ArithmeticDecoder<'_>,
    ctx: &mut ArithTextContexts,
    gr_contexts: &mut [Context],
    symbols: &[&Bitmap],
    params: &TextParams<'_>,
) -> Result<Bitmap> {
    let mut source = ArithSource { decoder, ctx, gr_contexts };
    decode_region(&mut source, symbols, params)
}

/// Huffman-coded text region body.
pub fn decode_with_huffman(
    bits: &mut BitReader<'_>,
    tables: &HuffTextTables<'_>,
    gr_contexts: &mut [Context],
    symbols: &[&Bitmap],
    params: &TextParams<'_>,
) -> Result<Bitmap> {
    let mut source = HuffSource { bits, tables, gr_contexts };
    decode_region(&mut source, symbols, params)
}

/// Read the symbol-ID code lengths of a Huffman text region and build the
/// decoding table (7.4.3.1.7).
pub fn read_symbol_id_table(bits: &mut BitReader<'_>, num_symbols: usize) -> Result<HuffmanTable> {
    let mut runcode_lengths = [0u8; 35];
    for len in runcode_lengths.iter_mut() {
        *len = bits.read_bits(4)? as u8;
    }
    let runcode_table = HuffmanTable::from_code_lengths(&runcode_lengths)?;

    let mut lengths = vec![0u8; num_symbols];
    let mut previous: Option<u8> = None;
    let mut i = 0usize;
    while i < num_symbols {
        let at = bits.byte_pos();
        let code = runcode_table
            .decode(bits)?
            .ok_or(Error::malformed(at, "bad symbol ID run code"))?;
        match code {
            0..=31 => {
                lengths[i] = code as u8;
                previous = Some(code as u8);
                i += 1;
            }
            32 => {
                let n = bits.read_bits(2)? as usize + 3;
                let prev = previous.ok_or(Error::malformed(at, "repeat with no previous length"))?;
                for _ in 0..n.min(num_symbols - i) {
                    lengths[i] = prev;
                    i += 1;
                }
            }
            33 => {
                i += bits.read_bits(3)? as usize + 3;
            }
            34 => {
                i += bits.read_bits(7)? as usize + 11;
            }
            _ => return Err(Error::malformed(at, "bad symbol ID run code")),
        }
    }
    if i > num_symbols {
        return Err(Error::malformed(bits.byte_pos(), "symbol ID lengths overflow"));
    }
    let table = HuffmanTable::from_code_lengths(&lengths)?;
    // 7) Skip over the remaining bits in the last byte read.
    bits.align_to_byte();
    Ok(table)
}

/// Decode a full text region segment body after the region information
/// field (7.4.3).
pub fn decode_segment(
    r: &mut crate::bits::Reader<'_>,
    info: &crate::jbig2::segment::RegionInfo,
    symbols: &[&Bitmap],
    referred_tables: &[&HuffmanTable],
    std_tables: &crate::jbig2::huffman::StandardTables,
    limits: &crate::jbig2::Limits,
) -> Result<Bitmap> {
    let at = r.pos();
    let flags = r.read_u16()?;
    let huffman = flags & 0x0001 != 0;
    let refine = flags & 0x0002 != 0;
    let log_strips = u32::from((flags >> 2) & 0x03);
    let ref_corner = RefCorner::from_bits(((flags >> 4) & 0x03) as u8);
    let transposed = flags & 0x0040 != 0;
    let comb_op = CombOp::try_from(((flags >> 7) & 0x03) as u8)
        .map_err(|_| Error::malformed(at, "bad text combination operator"))?;
    let default_pixel = flags & 0x0200 != 0;
    let ds_offset = {
        // Signed 5-bit field.
        let raw = ((flags >> 10) & 0x1F) as i32;
        if raw > 15 { raw - 32 } else { raw }
    };
    let r_template = ((flags >> 15) & 1) as u8;

    let area = u64::from(info.width).div_ceil(8) * u64::from(info.height);
    if area > limits.max_bitmap_bytes as u64 {
        return Err(Error::ResourceExceeded { reason: "text region too large" });
    }

    // Table selections of 7.4.3.1.2; custom tables are consumed from the
    // referred Tables segments in field order.
    fn select<'t>(
        value: u16,
        standard: &[usize],
        custom_index: &mut usize,
        referred: &[&'t HuffmanTable],
        std_tables: &'t crate::jbig2::huffman::StandardTables,
        at: usize,
    ) -> Result<&'t HuffmanTable> {
        let custom_value = if standard.len() == 1 { 1 } else { 3 };
        if u32::from(value) == custom_value {
            let table = referred
                .get(*custom_index)
                .copied()
                .ok_or(Error::malformed(at, "missing custom Huffman table"))?;
            *custom_index += 1;
            Ok(table)
        } else if let Some(&n) = standard.get(value as usize) {
            Ok(std_tables.get(n))
        } else {
            Err(Error::malformed(at, "bad Huffman table selection"))
        }
    }

    let mut custom_index = 0usize;
    let mut huff_choices = None;
    if huffman {
        let word = r.read_u16()?;
        let mut pick = |value: u16, standard: &[usize]| {
            select(value, standard, &mut custom_index, referred_tables, std_tables, at)
        };
        let fs = pick(word & 3, &[6, 7])?;
        let ds = pick((word >> 2) & 3, &[8, 9, 10])?;
        let dt = pick((word >> 4) & 3, &[11, 12, 13])?;
        let rdw = pick((word >> 6) & 3, &[14, 15])?;
        let rdh = pick((word >> 8) & 3, &[14, 15])?;
        let rdx = pick((word >> 10) & 3, &[14, 15])?;
        let rdy = pick((word >> 12) & 3, &[14, 15])?;
        let rsize = pick((word >> 14) & 1, &[1])?;
        huff_choices = Some((fs, ds, dt, rdw, rdh, rdx, rdy, rsize));
    }

    let r_at = if refine && r_template == 0 {
        refinement::parse_refinement_at_pixels(r)?
    } else {
        Vec::new()
    };

    let num_instances = r.read_u32()?;
    if u64::from(num_instances) > limits.max_bitmap_bytes as u64 {
        return Err(Error::ResourceExceeded { reason: "too many symbol instances" });
    }

    let params = TextParams {
        width: info.width,
        height: info.height,
        num_instances,
        strips: 1 << log_strips,
        log_strips,
        default_pixel,
        comb_op,
        transposed,
        ref_corner,
        ds_offset,
        refine,
        r_template,
        r_at: &r_at,
    };
    let mut gr_contexts =
        vec![Context::default(); crate::jbig2::refinement::context_size(r_template)];

    if huffman {
        let (fs, ds, dt, rdw, rdh, rdx, rdy, rsize) = huff_choices.unwrap();
        let mut bits = BitReader::new(r.tail());
        let symbol_table = read_symbol_id_table(&mut bits, symbols.len().max(1))?;
        let tables = HuffTextTables {
            fs,
            ds,
            dt,
            rdw,
            rdh,
            rdx,
            rdy,
            rsize,
            symbol: symbol_table,
        };
        decode_with_huffman(&mut bits, &tables, &mut gr_contexts, symbols, &params)
    } else {
        // SBSYMCODELEN = ceil(log2(SBNUMSYMS)) (6.4.10).
        let count = symbols.len() as u32;
        let code_len =
            if count <= 1 { 0 } else { 32 - (count - 1).leading_zeros() };
        let mut ctx = ArithTextContexts::new(code_len);
        let mut decoder = ArithmeticDecoder::new(r.tail());
        decode_with_arith(&mut decoder, &mut ctx, &mut gr_contexts, symbols, &params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symbol(w: u32, h: u32) -> Bitmap {
        Bitmap::filled(w, h, true)
    }

    fn params<'a>(corner: RefCorner, transposed: bool) -> TextParams<'a> {
        TextParams {
            width: 8,
            height: 8,
            num_instances: 1,
            strips: 1,
            log_strips: 0,
            default_pixel: false,
            comb_op: CombOp::Or,
            transposed,
            ref_corner: corner,
            ds_offset: 0,
            refine: false,
            r_template: 0,
            r_at: &[],
        }
    }

    #[test]
    fn corners_anchor_placement() {
        let inst = symbol(3, 2);
        // Bottom-left at (2, 3): pixels rows 2..=3, columns 2..=4.
        let mut bitmap = Bitmap::new(8, 8);
        let mut s = 2i64;
        draw_instance(&mut bitmap, &inst, &mut s, 3, &params(RefCorner::BottomLeft, false));
        assert!(bitmap.get(2, 2) && bitmap.get(4, 3));
        assert!(!bitmap.get(2, 4));
        // CURS advanced to the right edge.
        assert_eq!(s, 4);

        // Top-right: pre-advance puts CURS at the right edge first.
        let mut bitmap = Bitmap::new(8, 8);
        let mut s = 2i64;
        draw_instance(&mut bitmap, &inst, &mut s, 3, &params(RefCorner::TopRight, false));
        assert!(bitmap.get(2, 3) && bitmap.get(4, 4));
        assert_eq!(s, 4);
    }

    #[test]
    fn transposed_swaps_axes() {
        let inst = symbol(2, 3);
        let mut bitmap = Bitmap::new(8, 8);
        let mut s = 1i64;
        // Transposed top-left: x = T = 4, y = S = 1.
        draw_instance(&mut bitmap, &inst, &mut s, 4, &params(RefCorner::TopLeft, true));
        assert!(bitmap.get(4, 1) && bitmap.get(5, 3));
        // CURS advances along the vertical axis by height - 1.
        assert_eq!(s, 3);
    }

    #[test]
    fn symbol_id_table_reads_run_codes() {
        // Runcode lengths: runcode 1 -> 1 bit, runcode 2 -> 2 bits, rest
        // 0; then the lengths 1, 2, 2 for three symbols coded as runcode
        // 1, runcode 2, runcode 2 = "0", "10", "10".
        let mut nibbles: Vec<u8> = vec![0; 35];
        nibbles[1] = 1;
        nibbles[2] = 2;
        let mut bits_string = String::new();
        for &n in &nibbles {
            bits_string.push_str(&format!("{n:04b}"));
        }
        bits_string.push_str("0"); // symbol 0: length 1
        bits_string.push_str("10"); // symbol 1: length 2
        bits_string.push_str("10"); // symbol 2: length 2
        let mut bytes = Vec::new();
        let mut acc = 0u8;
        let mut count = 0;
        for c in bits_string.chars() {
            acc = (acc << 1) | (c == '1') as u8;
            count += 1;
            if count == 8 {
                bytes.push(acc);
                acc = 0;
                count = 0;
            }
        }
        if count > 0 {
            bytes.push(acc << (8 - count));
        }

        let mut bits = BitReader::new(&bytes);
        let table = read_symbol_id_table(&mut bits, 3).unwrap();
        // Canonical codes: symbol 0 = '0', symbol 1 = '10', symbol 2 =
        // '11'.
        let mut bits = BitReader::new(&[0b0_10_11_00_0]);
        assert_eq!(table.decode(&mut bits).unwrap(), Some(0));
        assert_eq!(table.decode(&mut bits).unwrap(), Some(1));
        assert_eq!(table.decode(&mut bits).unwrap(), Some(2));
    }
}
