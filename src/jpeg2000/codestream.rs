//! Codestream syntax: main-header markers (SIZ, COD, COC, QCD, QCC, ...)
//! and tile-part collection (ISO/IEC 15444-1 Annex A).

use log::{trace, warn};
use num_enum::TryFromPrimitive;

use crate::bits::Reader;
use crate::error::{Error, Result};

pub mod markers {
    pub const SOC: u16 = 0xFF4F;
    pub const CAP: u16 = 0xFF50;
    pub const SIZ: u16 = 0xFF51;
    pub const COD: u16 = 0xFF52;
    pub const COC: u16 = 0xFF53;
    pub const TLM: u16 = 0xFF55;
    pub const PLM: u16 = 0xFF57;
    pub const PLT: u16 = 0xFF58;
    pub const QCD: u16 = 0xFF5C;
    pub const QCC: u16 = 0xFF5D;
    pub const RGN: u16 = 0xFF5E;
    pub const POC: u16 = 0xFF5F;
    pub const PPM: u16 = 0xFF60;
    pub const PPT: u16 = 0xFF61;
    pub const CRG: u16 = 0xFF63;
    pub const COM: u16 = 0xFF64;
    pub const SOT: u16 = 0xFF90;
    pub const SOP: u16 = 0xFF91;
    pub const EPH: u16 = 0xFF92;
    pub const SOD: u16 = 0xFF93;
    pub const EOC: u16 = 0xFFD9;
}

/// Implementation limits of this decoder (rejected, not silently clamped).
pub const MAX_DECOMPOSITION_LEVELS: u8 = 32;
pub const MAX_CODE_BLOCK_EXP: u8 = 6;

/// A half-open rectangle on one of the canvases (reference grid, tile,
/// resolution or sub-band coordinates).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x0: i64,
    pub y0: i64,
    pub x1: i64,
    pub y1: i64,
}

impl Rect {
    pub fn new(x0: i64, y0: i64, x1: i64, y1: i64) -> Self {
        Self { x0, y0, x1: x1.max(x0), y1: y1.max(y0) }
    }

    pub fn width(&self) -> u32 {
        (self.x1 - self.x0).max(0) as u32
    }

    pub fn height(&self) -> u32 {
        (self.y1 - self.y0).max(0) as u32
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    pub fn area(&self) -> usize {
        self.width() as usize * self.height() as usize
    }

    pub fn intersect(&self, other: &Rect) -> Rect {
        Rect::new(
            self.x0.max(other.x0),
            self.y0.max(other.y0),
            self.x1.min(other.x1),
            self.y1.min(other.y1),
        )
    }
}

pub fn ceil_div(a: i64, b: i64) -> i64 {
    debug_assert!(b > 0);
    (a + b - 1).div_euclid(b)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum ProgressionOrder {
    /// Layer-resolution-component-position.
    Lrcp = 0,
    /// Resolution-layer-component-position.
    Rlcp = 1,
    /// Resolution-position-component-layer.
    Rpcl = 2,
    /// Position-component-resolution-layer.
    Pcrl = 3,
    /// Component-position-resolution-layer.
    Cprl = 4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaveletKernel {
    Irreversible97,
    Reversible53,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CodeBlockStyle {
    pub selective_bypass: bool,
    pub reset_probabilities: bool,
    pub termination_on_each_pass: bool,
    pub vertically_causal: bool,
    pub predictable_termination: bool,
    pub segmentation_symbols: bool,
}

impl CodeBlockStyle {
    fn from_bits(bits: u8) -> Self {
        Self {
            selective_bypass: bits & 0x01 != 0,
            reset_probabilities: bits & 0x02 != 0,
            termination_on_each_pass: bits & 0x04 != 0,
            vertically_causal: bits & 0x08 != 0,
            predictable_termination: bits & 0x10 != 0,
            segmentation_symbols: bits & 0x20 != 0,
        }
    }
}

/// The per-component half of COD/COC (SPcod/SPcoc).
#[derive(Debug, Clone)]
pub struct CodingParams {
    pub decomposition_levels: u8,
    /// log2 of the nominal code-block width, absolute (2..=6 accepted).
    pub cb_width_exp: u8,
    pub cb_height_exp: u8,
    pub style: CodeBlockStyle,
    pub kernel: WaveletKernel,
    /// Precinct exponents per resolution 0..=levels; (15, 15) when the
    /// default maximal precincts are in use.
    pub precinct_exps: Vec<(u8, u8)>,
}

impl CodingParams {
    /// Precinct exponents at resolution `r`, falling back to the last
    /// defined entry as COD prescribes.
    pub fn precinct_exp(&self, r: usize) -> (u8, u8) {
        self.precinct_exps
            .get(r)
            .or_else(|| self.precinct_exps.last())
            .copied()
            .unwrap_or((15, 15))
    }
}

/// SGcod plus the default component parameters from COD.
#[derive(Debug, Clone)]
pub struct CodingStyle {
    pub progression: ProgressionOrder,
    pub layers: u16,
    pub mct: bool,
    pub use_sop: bool,
    pub use_eph: bool,
    pub params: CodingParams,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantizationKind {
    /// Reversible: exponents only.
    None,
    /// One (exponent, mantissa) pair, others derived.
    Derived,
    /// One pair per sub-band.
    Expounded,
}

#[derive(Debug, Clone)]
pub struct QuantStyle {
    pub kind: QuantizationKind,
    pub guard_bits: u8,
    /// (exponent, mantissa) pairs in sub-band order (LL, then HL/LH/HH per
    /// decomposition level, finest last). For `Derived` only one entry.
    pub steps: Vec<(u8, u16)>,
}

impl QuantStyle {
    /// Resolve (exponent, mantissa) for a sub-band.
    ///
    /// `n_b` is the decomposition level count of the band, `index` its
    /// position in sub-band order and `total_levels` the component's
    /// decomposition level count.
    pub fn exponent_mantissa(&self, index: usize, n_b: u8, total_levels: u8) -> (u8, u16) {
        match self.kind {
            QuantizationKind::Derived => {
                let (e0, m0) = self.steps[0];
                // Equation E-5: derived exponents shrink with the level.
                let e = i32::from(e0) - i32::from(total_levels) + i32::from(n_b);
                (e.max(0) as u8, m0)
            }
            _ => self.steps.get(index).copied().unwrap_or((0, 0)),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SizComponent {
    pub precision: u8,
    pub signed: bool,
    pub dx: u8,
    pub dy: u8,
}

#[derive(Debug, Clone)]
pub struct Siz {
    pub width: u32,
    pub height: u32,
    pub x_offset: u32,
    pub y_offset: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    pub tile_x_offset: u32,
    pub tile_y_offset: u32,
    pub components: Vec<SizComponent>,
}

impl Siz {
    pub fn tiles_across(&self) -> u32 {
        let span = self.width as i64 - self.tile_x_offset as i64;
        ceil_div(span, self.tile_width as i64).max(0) as u32
    }

    pub fn tiles_down(&self) -> u32 {
        let span = self.height as i64 - self.tile_y_offset as i64;
        ceil_div(span, self.tile_height as i64).max(0) as u32
    }

    /// Tile rectangle on the reference grid (B-7).
    pub fn tile_rect(&self, index: u32) -> Rect {
        let p = i64::from(index % self.tiles_across());
        let q = i64::from(index / self.tiles_across());
        let x0 = (i64::from(self.tile_x_offset) + p * i64::from(self.tile_width))
            .max(i64::from(self.x_offset));
        let y0 = (i64::from(self.tile_y_offset) + q * i64::from(self.tile_height))
            .max(i64::from(self.y_offset));
        let x1 = (i64::from(self.tile_x_offset) + (p + 1) * i64::from(self.tile_width))
            .min(i64::from(self.width));
        let y1 = (i64::from(self.tile_y_offset) + (q + 1) * i64::from(self.tile_height))
            .min(i64::from(self.height));
        Rect::new(x0, y0, x1, y1)
    }

    /// Tile-component rectangle (B-12).
    pub fn tile_component_rect(&self, tile: u32, c: usize) -> Rect {
        let t = self.tile_rect(tile);
        let comp = &self.components[c];
        Rect::new(
            ceil_div(t.x0, i64::from(comp.dx)),
            ceil_div(t.y0, i64::from(comp.dy)),
            ceil_div(t.x1, i64::from(comp.dx)),
            ceil_div(t.y1, i64::from(comp.dy)),
        )
    }
}

/// Everything collected from the main header.
#[derive(Debug, Clone)]
pub struct Header {
    pub siz: Siz,
    pub cod: CodingStyle,
    pub qcd: QuantStyle,
    /// COC overrides, indexed by component.
    pub comp_coding: Vec<Option<CodingParams>>,
    /// QCC overrides, indexed by component.
    pub comp_quant: Vec<Option<QuantStyle>>,
}

impl Header {
    pub fn coding_params(&self, c: usize) -> &CodingParams {
        self.comp_coding[c].as_ref().unwrap_or(&self.cod.params)
    }

    pub fn quant(&self, c: usize) -> &QuantStyle {
        self.comp_quant[c].as_ref().unwrap_or(&self.qcd)
    }
}

/// Parse the codestream: the main header, then the tile-part sequence up
/// to EOC. Returns the header and, per tile, the tile-part data slices in
/// arrival order.
pub fn parse(data: &[u8]) -> Result<(Header, Vec<Vec<&[u8]>>)> {
    let mut r = Reader::new(data);
    if r.read_u16()? != markers::SOC {
        return Err(Error::BadMagic { offset: 0, reason: "missing SOC marker" });
    }

    let mut siz: Option<Siz> = None;
    let mut cod: Option<CodingStyle> = None;
    let mut qcd: Option<QuantStyle> = None;
    let mut comp_coding: Vec<Option<CodingParams>> = Vec::new();
    let mut comp_quant: Vec<Option<QuantStyle>> = Vec::new();
    let mut tiles: Vec<Vec<&[u8]>> = Vec::new();

    loop {
        let at = r.pos();
        let marker = r.read_u16()?;
        match marker {
            markers::SIZ => {
                let seg = segment(&mut r, at)?;
                let parsed = parse_siz(seg, at)?;
                let tile_count = parsed.tiles_across() as usize * parsed.tiles_down() as usize;
                if tile_count == 0 {
                    return Err(Error::malformed(at, "image area is empty"));
                }
                comp_coding = vec![None; parsed.components.len()];
                comp_quant = vec![None; parsed.components.len()];
                tiles = vec![Vec::new(); tile_count];
                siz = Some(parsed);
            }
            markers::COD => {
                let seg = segment(&mut r, at)?;
                cod = Some(parse_cod(seg, at)?);
            }
            markers::COC => {
                let seg = segment(&mut r, at)?;
                let siz_ref = siz.as_ref().ok_or(Error::malformed(at, "COC before SIZ"))?;
                let (c, params) = parse_coc(seg, at, siz_ref.components.len())?;
                comp_coding[c] = Some(params);
            }
            markers::QCD => {
                let seg = segment(&mut r, at)?;
                qcd = Some(parse_quant(seg, at)?);
            }
            markers::QCC => {
                let seg = segment(&mut r, at)?;
                let siz_ref = siz.as_ref().ok_or(Error::malformed(at, "QCC before SIZ"))?;
                let (c, style) = parse_qcc(seg, at, siz_ref.components.len())?;
                comp_quant[c] = Some(style);
            }
            markers::RGN => {
                return Err(Error::unsupported(at, "region of interest (RGN)"));
            }
            markers::PPM | markers::PPT => {
                return Err(Error::unsupported(at, "packed packet headers"));
            }
            markers::CAP
            | markers::TLM
            | markers::PLM
            | markers::PLT
            | markers::POC
            | markers::CRG
            | markers::COM => {
                let seg = segment(&mut r, at)?;
                trace!("skipping marker {marker:#06X} ({} bytes)", seg.len());
            }
            markers::SOT => {
                let siz_ref = siz.as_ref().ok_or(Error::malformed(at, "SOT before SIZ"))?;
                let tile_count = tiles.len();
                let lsot = r.read_u16()?;
                if lsot != 10 {
                    return Err(Error::malformed(at, "bad SOT length"));
                }
                let isot = r.read_u16()? as usize;
                let psot = r.read_u32()? as usize;
                let _tpsot = r.read_u8()?;
                let _tnsot = r.read_u8()?;
                if isot >= tile_count {
                    return Err(Error::malformed(at, "tile index out of range"));
                }
                // Everything up to Psot from the start of SOT is this
                // tile-part; the bitstream begins after SOD.
                let sod_at = r.pos();
                if r.read_u16()? != markers::SOD {
                    return Err(Error::malformed(sod_at, "expected SOD"));
                }
                let part_end = if psot == 0 {
                    // Open-ended final tile-part: up to EOC.
                    data.len().saturating_sub(2)
                } else {
                    at.checked_add(psot)
                        .filter(|&end| end <= data.len())
                        .ok_or(Error::Truncated { offset: at })?
                };
                if part_end < r.pos() {
                    return Err(Error::malformed(at, "tile-part length too small"));
                }
                let body = &data[r.pos()..part_end];
                trace!(
                    "tile {} ({}x{} grid): tile-part of {} bytes",
                    isot,
                    siz_ref.tiles_across(),
                    siz_ref.tiles_down(),
                    body.len()
                );
                tiles[isot].push(body);
                r.seek(part_end)?;
            }
            markers::EOC => break,
            other => {
                if other & 0xFF00 != 0xFF00 {
                    return Err(Error::malformed(at, "expected marker"));
                }
                warn!("skipping unknown marker {other:#06X}");
                segment(&mut r, at)?;
            }
        }
        if r.is_empty() {
            // Tolerate a missing EOC at the very end.
            warn!("codestream ended without EOC");
            break;
        }
    }

    let siz = siz.ok_or(Error::malformed(0, "missing SIZ"))?;
    let cod = cod.ok_or(Error::malformed(0, "missing COD"))?;
    let qcd = qcd.ok_or(Error::malformed(0, "missing QCD"))?;
    Ok((Header { siz, cod, qcd, comp_coding, comp_quant }, tiles))
}

fn segment<'a>(r: &mut Reader<'a>, at: usize) -> Result<&'a [u8]> {
    let len = r.read_u16()? as usize;
    if len < 2 {
        return Err(Error::malformed(at, "bad marker segment length"));
    }
    r.read_bytes(len - 2)
}

fn parse_siz(seg: &[u8], at: usize) -> Result<Siz> {
    let mut r = Reader::new(seg);
    let _rsiz = r.read_u16()?;
    let width = r.read_u32()?;
    let height = r.read_u32()?;
    let x_offset = r.read_u32()?;
    let y_offset = r.read_u32()?;
    let tile_width = r.read_u32()?;
    let tile_height = r.read_u32()?;
    let tile_x_offset = r.read_u32()?;
    let tile_y_offset = r.read_u32()?;
    let csiz = r.read_u16()? as usize;
    if csiz == 0 || csiz > 16384 {
        return Err(Error::malformed(at, "bad component count"));
    }
    if tile_width == 0 || tile_height == 0 {
        return Err(Error::malformed(at, "zero tile size"));
    }
    if x_offset >= width || y_offset >= height {
        return Err(Error::malformed(at, "image offset beyond image size"));
    }
    let mut components = Vec::with_capacity(csiz);
    for _ in 0..csiz {
        let ssiz = r.read_u8()?;
        let dx = r.read_u8()?;
        let dy = r.read_u8()?;
        if dx == 0 || dy == 0 {
            return Err(Error::malformed(at, "zero component subsampling"));
        }
        let precision = (ssiz & 0x7F) + 1;
        if precision > 16 {
            return Err(Error::unsupported(at, "component deeper than 16 bits"));
        }
        components.push(SizComponent { precision, signed: ssiz & 0x80 != 0, dx, dy });
    }
    trace!("SIZ {width}x{height}, {csiz} components, tiles {tile_width}x{tile_height}");
    Ok(Siz {
        width,
        height,
        x_offset,
        y_offset,
        tile_width,
        tile_height,
        tile_x_offset,
        tile_y_offset,
        components,
    })
}

fn parse_sp_params(r: &mut Reader<'_>, at: usize, has_precincts: bool) -> Result<CodingParams> {
    let levels = r.read_u8()?;
    if levels > MAX_DECOMPOSITION_LEVELS {
        return Err(Error::ResourceExceeded { reason: "too many decomposition levels" });
    }
    let cbw = (r.read_u8()? & 0x0F) + 2;
    let cbh = (r.read_u8()? & 0x0F) + 2;
    if cbw > MAX_CODE_BLOCK_EXP || cbh > MAX_CODE_BLOCK_EXP {
        return Err(Error::ResourceExceeded { reason: "code-block larger than 64x64" });
    }
    let style = CodeBlockStyle::from_bits(r.read_u8()?);
    if style.selective_bypass || style.termination_on_each_pass || style.predictable_termination {
        return Err(Error::unsupported(at, "bypass/termination code-block styles"));
    }
    let kernel = match r.read_u8()? {
        0 => WaveletKernel::Irreversible97,
        1 => WaveletKernel::Reversible53,
        _ => return Err(Error::malformed(at, "unknown wavelet transformation")),
    };
    let mut precinct_exps = Vec::new();
    if has_precincts {
        for _ in 0..=levels {
            let b = r.read_u8()?;
            precinct_exps.push((b & 0x0F, b >> 4));
        }
    } else {
        precinct_exps.push((15, 15));
    }
    Ok(CodingParams { decomposition_levels: levels, cb_width_exp: cbw, cb_height_exp: cbh, style, kernel, precinct_exps })
}

fn parse_cod(seg: &[u8], at: usize) -> Result<CodingStyle> {
    let mut r = Reader::new(seg);
    let scod = r.read_u8()?;
    let progression = ProgressionOrder::try_from(r.read_u8()?)
        .map_err(|_| Error::malformed(at, "unknown progression order"))?;
    let layers = r.read_u16()?;
    if layers == 0 {
        return Err(Error::malformed(at, "zero layers"));
    }
    let mct = r.read_u8()? != 0;
    let params = parse_sp_params(&mut r, at, scod & 0x01 != 0)?;
    trace!(
        "COD: {:?}, {} layers, {} levels, cb {}x{}",
        progression,
        layers,
        params.decomposition_levels,
        1u32 << params.cb_width_exp,
        1u32 << params.cb_height_exp
    );
    Ok(CodingStyle {
        progression,
        layers,
        mct,
        use_sop: scod & 0x02 != 0,
        use_eph: scod & 0x04 != 0,
        params,
    })
}

fn parse_coc(seg: &[u8], at: usize, ncomp: usize) -> Result<(usize, CodingParams)> {
    let mut r = Reader::new(seg);
    let c = if ncomp < 257 {
        r.read_u8()? as usize
    } else {
        r.read_u16()? as usize
    };
    if c >= ncomp {
        return Err(Error::malformed(at, "COC component out of range"));
    }
    let scoc = r.read_u8()?;
    let params = parse_sp_params(&mut r, at, scoc & 0x01 != 0)?;
    Ok((c, params))
}

fn parse_quant_body(r: &mut Reader<'_>, at: usize) -> Result<QuantStyle> {
    let sqcd = r.read_u8()?;
    let guard_bits = sqcd >> 5;
    let kind = match sqcd & 0x1F {
        0 => QuantizationKind::None,
        1 => QuantizationKind::Derived,
        2 => QuantizationKind::Expounded,
        _ => return Err(Error::malformed(at, "unknown quantization style")),
    };
    let mut steps = Vec::new();
    match kind {
        QuantizationKind::None => {
            while !r.is_empty() {
                let b = r.read_u8()?;
                steps.push((b >> 3, 0));
            }
        }
        QuantizationKind::Derived => {
            let v = r.read_u16()?;
            steps.push(((v >> 11) as u8, v & 0x07FF));
        }
        QuantizationKind::Expounded => {
            while !r.is_empty() {
                let v = r.read_u16()?;
                steps.push(((v >> 11) as u8, v & 0x07FF));
            }
        }
    }
    if steps.is_empty() {
        return Err(Error::malformed(at, "empty quantization segment"));
    }
    Ok(QuantStyle { kind, guard_bits, steps })
}

fn parse_quant(seg: &[u8], at: usize) -> Result<QuantStyle> {
    let mut r = Reader::new(seg);
    parse_quant_body(&mut r, at)
}

fn parse_qcc(seg: &[u8], at: usize, ncomp: usize) -> Result<(usize, QuantStyle)> {
    let mut r = Reader::new(seg);
    let c = if ncomp < 257 {
        r.read_u8()? as usize
    } else {
        r.read_u16()? as usize
    };
    if c >= ncomp {
        return Err(Error::malformed(at, "QCC component out of range"));
    }
    let style = parse_quant_body(&mut r, at)?;
    Ok((c, style))
}
