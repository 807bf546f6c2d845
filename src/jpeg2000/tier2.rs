//! Tier-2 decoding: tile geometry (resolutions, sub-bands, precincts,
//! code-blocks), progression-order packet sequencing and packet-header
//! parsing (ISO/IEC 15444-1 Annex B).

use log::{trace, warn};

use crate::error::{Error, Result};
use crate::jpeg2000::codestream::{ceil_div, Header, ProgressionOrder, Rect};
use crate::jpeg2000::tag_tree::TagTree;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BandKind {
    LowLow,
    HighLow,
    LowHigh,
    HighHigh,
}

impl BandKind {
    /// Band origin on the 2x2 decomposition grid.
    fn offsets(self) -> (i64, i64) {
        match self {
            BandKind::LowLow => (0, 0),
            BandKind::HighLow => (1, 0),
            BandKind::LowHigh => (0, 1),
            BandKind::HighHigh => (1, 1),
        }
    }

    /// log2 gain used for the dynamic range R_b of the band.
    pub fn log_gain(self) -> u8 {
        match self {
            BandKind::LowLow => 0,
            BandKind::HighLow | BandKind::LowHigh => 1,
            BandKind::HighHigh => 2,
        }
    }
}

pub struct CodeBlock {
    pub rect: Rect,
    pub x_idx: u32,
    pub y_idx: u32,
    /// Concatenated codeword segment bytes across layers.
    pub data: Vec<u8>,
    pub passes: u32,
    pub zero_bit_planes: u8,
    pub included: bool,
    pub lblock: u32,
}

pub struct Precinct {
    pub blocks: Vec<CodeBlock>,
    inclusion: TagTree,
    zero_planes: TagTree,
}

pub struct Band {
    pub kind: BandKind,
    pub rect: Rect,
    pub precincts: Vec<Precinct>,
    /// Dequantized coefficients, filled by Tier-1.
    pub coeffs: Vec<f32>,
    /// Index of the band in quantization sub-band order.
    pub quant_index: usize,
    /// Decomposition level count n_b of this band.
    pub level: u8,
}

pub struct ResolutionLevel {
    pub rect: Rect,
    pub bands: Vec<Band>,
    pub num_precincts_x: u32,
    pub num_precincts_y: u32,
    /// Precinct exponents in resolution coordinates.
    pub ppx: u8,
    pub ppy: u8,
}

impl ResolutionLevel {
    pub fn num_precincts(&self) -> u32 {
        self.num_precincts_x * self.num_precincts_y
    }
}

pub struct TileComponent {
    pub rect: Rect,
    pub resolutions: Vec<ResolutionLevel>,
}

/// Build the decomposition geometry for one tile.
pub fn build_tile(header: &Header, tile: u32) -> Result<Vec<TileComponent>> {
    let mut comps = Vec::with_capacity(header.siz.components.len());
    for c in 0..header.siz.components.len() {
        let params = header.coding_params(c);
        let levels = params.decomposition_levels;
        let tc = header.siz.tile_component_rect(tile, c);
        let mut resolutions = Vec::with_capacity(usize::from(levels) + 1);

        for r in 0..=levels {
            let levelno = levels - r;
            let denom = 1i64 << levelno;
            let rect = Rect::new(
                ceil_div(tc.x0, denom),
                ceil_div(tc.y0, denom),
                ceil_div(tc.x1, denom),
                ceil_div(tc.y1, denom),
            );
            let (ppx, ppy) = params.precinct_exp(r as usize);
            if r > 0 && (ppx == 0 || ppy == 0) {
                return Err(Error::malformed(0, "zero precinct size above resolution 0"));
            }
            let num_precincts_x = if rect.width() == 0 {
                0
            } else {
                (ceil_div(rect.x1, 1 << ppx) - rect.x0.div_euclid(1 << ppx)) as u32
            };
            let num_precincts_y = if rect.height() == 0 {
                0
            } else {
                (ceil_div(rect.y1, 1 << ppy) - rect.y0.div_euclid(1 << ppy)) as u32
            };

            // In band coordinates the precinct and code-block grids halve
            // above resolution 0.
            let ppx_b = if r == 0 { ppx } else { ppx - 1 };
            let ppy_b = if r == 0 { ppy } else { ppy - 1 };
            let xcb = params.cb_width_exp.min(ppx_b);
            let ycb = params.cb_height_exp.min(ppy_b);

            let kinds: &[BandKind] = if r == 0 {
                &[BandKind::LowLow]
            } else {
                &[BandKind::HighLow, BandKind::LowHigh, BandKind::HighHigh]
            };

            let mut bands = Vec::with_capacity(kinds.len());
            for &kind in kinds {
                let n_b = if r == 0 { levels } else { levels - r + 1 };
                let band_rect = band_rect(&tc, n_b, kind);
                let quant_index = match kind {
                    BandKind::LowLow => 0,
                    _ => {
                        let offset = match kind {
                            BandKind::HighLow => 0,
                            BandKind::LowHigh => 1,
                            _ => 2,
                        };
                        3 * (usize::from(r) - 1) + 1 + offset
                    }
                };

                let mut precincts =
                    Vec::with_capacity((num_precincts_x * num_precincts_y) as usize);
                for py in 0..num_precincts_y {
                    for px in 0..num_precincts_x {
                        let m = rect.x0.div_euclid(1 << ppx) + i64::from(px);
                        let n = rect.y0.div_euclid(1 << ppy) + i64::from(py);
                        let prec_rect = Rect::new(
                            m << ppx_b,
                            n << ppy_b,
                            (m + 1) << ppx_b,
                            (n + 1) << ppy_b,
                        )
                        .intersect(&band_rect);

                        precincts.push(build_precinct(&prec_rect, xcb, ycb));
                    }
                }

                bands.push(Band {
                    kind,
                    rect: band_rect,
                    precincts,
                    coeffs: vec![0.0; band_rect.area()],
                    quant_index,
                    level: n_b,
                });
            }

            resolutions.push(ResolutionLevel {
                rect,
                bands,
                num_precincts_x,
                num_precincts_y,
                ppx,
                ppy,
            });
        }
        comps.push(TileComponent { rect: tc, resolutions });
    }
    Ok(comps)
}

/// Sub-band rectangle (equation B-15). `n_b == 0` means no decomposition:
/// the band is the tile-component itself.
fn band_rect(tc: &Rect, n_b: u8, kind: BandKind) -> Rect {
    if n_b == 0 {
        return *tc;
    }
    let (xo, yo) = kind.offsets();
    let denom = 1i64 << n_b;
    let half = 1i64 << (n_b - 1);
    Rect::new(
        ceil_div(tc.x0 - half * xo, denom),
        ceil_div(tc.y0 - half * yo, denom),
        ceil_div(tc.x1 - half * xo, denom),
        ceil_div(tc.y1 - half * yo, denom),
    )
}

fn build_precinct(prec_rect: &Rect, xcb: u8, ycb: u8) -> Precinct {
    let cbw = 1i64 << xcb;
    let cbh = 1i64 << ycb;
    let (grid_w, grid_h, first_i, first_j) = if prec_rect.is_empty() {
        (0, 0, 0, 0)
    } else {
        let first_i = prec_rect.x0.div_euclid(cbw);
        let first_j = prec_rect.y0.div_euclid(cbh);
        let last_i = ceil_div(prec_rect.x1, cbw);
        let last_j = ceil_div(prec_rect.y1, cbh);
        ((last_i - first_i) as u32, (last_j - first_j) as u32, first_i, first_j)
    };

    let mut blocks = Vec::with_capacity((grid_w * grid_h) as usize);
    for j in 0..grid_h {
        for i in 0..grid_w {
            let x0 = (first_i + i64::from(i)) * cbw;
            let y0 = (first_j + i64::from(j)) * cbh;
            let rect = Rect::new(x0, y0, x0 + cbw, y0 + cbh).intersect(prec_rect);
            blocks.push(CodeBlock {
                rect,
                x_idx: i,
                y_idx: j,
                data: Vec::new(),
                passes: 0,
                zero_bit_planes: 0,
                included: false,
                lblock: 3,
            });
        }
    }

    Precinct {
        blocks,
        inclusion: TagTree::new(grid_w, grid_h),
        zero_planes: TagTree::new(grid_w, grid_h),
    }
}

/// One packet position in the progression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketIndex {
    pub layer: u16,
    pub res: u8,
    pub comp: usize,
    pub precinct: u32,
}

/// Materialize the packet sequence of a tile in progression order
/// (B.12). Positional orders walk reference-grid coordinates.
pub fn packet_sequence(
    header: &Header,
    tile: u32,
    comps: &[TileComponent],
) -> Result<Vec<PacketIndex>> {
    let layers = header.cod.layers;
    let max_res = comps.iter().map(|c| c.resolutions.len()).max().unwrap_or(0);
    let mut seq = Vec::new();

    let precincts = |c: usize, r: usize| -> u32 {
        comps[c]
            .resolutions
            .get(r)
            .map(|res| res.num_precincts())
            .unwrap_or(0)
    };

    match header.cod.progression {
        ProgressionOrder::Lrcp => {
            for layer in 0..layers {
                for r in 0..max_res {
                    for c in 0..comps.len() {
                        for p in 0..precincts(c, r) {
                            seq.push(PacketIndex { layer, res: r as u8, comp: c, precinct: p });
                        }
                    }
                }
            }
        }
        ProgressionOrder::Rlcp => {
            for r in 0..max_res {
                for layer in 0..layers {
                    for c in 0..comps.len() {
                        for p in 0..precincts(c, r) {
                            seq.push(PacketIndex { layer, res: r as u8, comp: c, precinct: p });
                        }
                    }
                }
            }
        }
        ProgressionOrder::Rpcl | ProgressionOrder::Pcrl | ProgressionOrder::Cprl => {
            positional_sequence(header, tile, comps, &mut seq)?;
        }
    }
    trace!("tile {tile}: {} packets in sequence", seq.len());
    Ok(seq)
}

/// Per component and resolution, the values needed by the positional
/// progression walks.
struct PosInfo {
    rect: Rect,
    ppx: u8,
    ppy: u8,
    levelno: u8,
    num_px: u32,
    dx: u32,
    dy: u32,
    /// Precinct span on the reference grid.
    step_x: u64,
    step_y: u64,
    empty: bool,
}

fn positional_sequence(
    header: &Header,
    tile: u32,
    comps: &[TileComponent],
    seq: &mut Vec<PacketIndex>,
) -> Result<()> {
    let layers = header.cod.layers;
    let t = header.siz.tile_rect(tile);
    let max_res = comps.iter().map(|c| c.resolutions.len()).max().unwrap_or(0);

    let mut info: Vec<Vec<PosInfo>> = Vec::with_capacity(comps.len());
    for (c, comp) in comps.iter().enumerate() {
        let params = header.coding_params(c);
        let levels = params.decomposition_levels;
        let siz_comp = &header.siz.components[c];
        let mut per_res = Vec::new();
        for (r, res) in comp.resolutions.iter().enumerate() {
            let levelno = levels - r as u8;
            let step_x = u64::from(siz_comp.dx) << (res.ppx + levelno);
            let step_y = u64::from(siz_comp.dy) << (res.ppy + levelno);
            per_res.push(PosInfo {
                rect: res.rect,
                ppx: res.ppx,
                ppy: res.ppy,
                levelno,
                num_px: res.num_precincts_x,
                dx: u32::from(siz_comp.dx),
                dy: u32::from(siz_comp.dy),
                step_x,
                step_y,
                empty: res.num_precincts() == 0,
            });
        }
        info.push(per_res);
    }

    // Whether a reference-grid coordinate starts a precinct row or column
    // for this component/resolution: either it lies on the precinct grid
    // projected to the reference grid, or it is the tile edge and the
    // resolution origin is not aligned to the precinct grid.
    let hit = |v: i64, t0: i64, i: &PosInfo, horizontal: bool| -> bool {
        let (span, r0, pp) = if horizontal {
            (i.step_x as i64, i.rect.x0, i.ppx)
        } else {
            (i.step_y as i64, i.rect.y0, i.ppy)
        };
        v % span == 0 || (v == t0 && (r0 % (1i64 << pp)) != 0)
    };

    let precinct_at = |x: i64, y: i64, i: &PosInfo| -> u32 {
        let px = ceil_div(x, (i.dx as i64) << i.levelno).div_euclid(1 << i.ppx)
            - i.rect.x0.div_euclid(1 << i.ppx);
        let py = ceil_div(y, (i.dy as i64) << i.levelno).div_euclid(1 << i.ppy)
            - i.rect.y0.div_euclid(1 << i.ppy);
        (py * i64::from(i.num_px) + px) as u32
    };

    // Step sizes for the coordinate walks: the finest precinct span among
    // the participating component/resolution pairs.
    let min_step = |pick: &dyn Fn(&PosInfo) -> u64| -> u64 {
        info.iter()
            .flatten()
            .filter(|i| !i.empty)
            .map(pick)
            .min()
            .unwrap_or(1)
            .max(1)
    };

    let next_on_grid = |v: i64, step: u64| -> i64 {
        let step = step as i64;
        (v.div_euclid(step) + 1) * step
    };

    match header.cod.progression {
        ProgressionOrder::Rpcl => {
            let step_x = min_step(&|i| i.step_x);
            let step_y = min_step(&|i| i.step_y);
            for r in 0..max_res {
                let mut y = t.y0;
                while y < t.y1 {
                    let mut x = t.x0;
                    while x < t.x1 {
                        for (c, per_res) in info.iter().enumerate() {
                            let Some(i) = per_res.get(r) else { continue };
                            if i.empty || !hit(y, t.y0, i, false) || !hit(x, t.x0, i, true) {
                                continue;
                            }
                            let p = precinct_at(x, y, i);
                            for layer in 0..layers {
                                seq.push(PacketIndex { layer, res: r as u8, comp: c, precinct: p });
                            }
                        }
                        x = next_on_grid(x, step_x);
                    }
                    y = next_on_grid(y, step_y);
                }
            }
        }
        ProgressionOrder::Pcrl => {
            let step_x = min_step(&|i| i.step_x);
            let step_y = min_step(&|i| i.step_y);
            let mut y = t.y0;
            while y < t.y1 {
                let mut x = t.x0;
                while x < t.x1 {
                    for (c, per_res) in info.iter().enumerate() {
                        for (r, i) in per_res.iter().enumerate() {
                            if i.empty || !hit(y, t.y0, i, false) || !hit(x, t.x0, i, true) {
                                continue;
                            }
                            let p = precinct_at(x, y, i);
                            for layer in 0..layers {
                                seq.push(PacketIndex { layer, res: r as u8, comp: c, precinct: p });
                            }
                        }
                    }
                    x = next_on_grid(x, step_x);
                }
                y = next_on_grid(y, step_y);
            }
        }
        ProgressionOrder::Cprl => {
            for (c, per_res) in info.iter().enumerate() {
                let step_x = per_res.iter().filter(|i| !i.empty).map(|i| i.step_x).min().unwrap_or(1).max(1);
                let step_y = per_res.iter().filter(|i| !i.empty).map(|i| i.step_y).min().unwrap_or(1).max(1);
                let mut y = t.y0;
                while y < t.y1 {
                    let mut x = t.x0;
                    while x < t.x1 {
                        for (r, i) in per_res.iter().enumerate() {
                            if i.empty || !hit(y, t.y0, i, false) || !hit(x, t.x0, i, true) {
                                continue;
                            }
                            let p = precinct_at(x, y, i);
                            for layer in 0..layers {
                                seq.push(PacketIndex { layer, res: r as u8, comp: c, precinct: p });
                            }
                        }
                        x = next_on_grid(x, step_x);
                    }
                    y = next_on_grid(y, step_y);
                }
            }
        }
        _ => unreachable!(),
    }
    Ok(())
}

/// Bit reader for packet headers: plain MSB-first with a zero bit stuffed
/// into the byte following any 0xFF (B.10.1).
pub struct PacketBits<'a> {
    data: &'a [u8],
    pos: usize,
    cur: u8,
    avail: u8,
    prev_ff: bool,
}

impl<'a> PacketBits<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0, cur: 0, avail: 0, prev_ff: false }
    }

    pub fn read_bit(&mut self) -> Result<u32> {
        if self.avail == 0 {
            let byte = *self
                .data
                .get(self.pos)
                .ok_or(Error::Truncated { offset: self.pos })?;
            self.pos += 1;
            if self.prev_ff {
                if byte & 0x80 != 0 {
                    return Err(Error::malformed(self.pos - 1, "missing stuffing bit after 0xFF"));
                }
                self.cur = byte;
                self.avail = 7;
                self.prev_ff = false;
            } else {
                self.cur = byte;
                self.avail = 8;
                self.prev_ff = byte == 0xFF;
            }
        }
        self.avail -= 1;
        Ok(u32::from((self.cur >> self.avail) & 1))
    }

    pub fn read_bits(&mut self, count: u32) -> Result<u32> {
        let mut v = 0u32;
        for _ in 0..count {
            v = (v << 1) | self.read_bit()?;
        }
        Ok(v)
    }

    /// Align to the byte boundary ending the packet header and return the
    /// offset of the packet body. A final 0xFF header byte is followed by
    /// one stuffed byte that still belongs to the header.
    pub fn finish(self) -> Result<usize> {
        let last_was_ff = if self.avail > 0 { self.cur == 0xFF } else { self.prev_ff };
        let mut pos = self.pos;
        if last_was_ff {
            let byte = *self.data.get(pos).ok_or(Error::Truncated { offset: pos })?;
            if byte & 0x80 != 0 {
                return Err(Error::malformed(pos, "missing stuffing bit after 0xFF"));
            }
            pos += 1;
        }
        Ok(pos)
    }
}

/// Table B.4 codewords for the number of new coding passes.
fn read_pass_count(bits: &mut PacketBits<'_>) -> Result<u32> {
    if bits.read_bit()? == 0 {
        return Ok(1);
    }
    if bits.read_bit()? == 0 {
        return Ok(2);
    }
    let v = bits.read_bits(2)?;
    if v < 3 {
        return Ok(3 + v);
    }
    let v = bits.read_bits(5)?;
    if v < 31 {
        return Ok(6 + v);
    }
    Ok(37 + bits.read_bits(7)?)
}

/// Decode one packet at the front of `data`, appending codeword segments
/// to the code-blocks of the addressed precinct. Returns the number of
/// bytes consumed.
pub fn read_packet(
    comps: &mut [TileComponent],
    header: &Header,
    idx: PacketIndex,
    data: &[u8],
) -> Result<usize> {
    let mut base = 0usize;
    if header.cod.use_sop && data.len() >= 2 && data[0] == 0xFF && data[1] == 0x91 {
        // SOP segment: marker, Lsop = 4, Nsop.
        if data.len() < 6 {
            return Err(Error::Truncated { offset: 0 });
        }
        base = 6;
    }

    let res = &mut comps[idx.comp].resolutions[idx.res as usize];
    if idx.precinct >= res.num_precincts() {
        return Err(Error::malformed(base, "precinct index out of range"));
    }
    let mut bits = PacketBits::new(&data[base..]);
    let non_empty = bits.read_bit()? == 1;

    // Codeword segment length for every code-block of the precinct, in
    // band/raster order; zero when not included in this packet.
    let mut lengths: Vec<u32> = Vec::new();

    if non_empty {
        for band in &mut res.bands {
            if band.rect.is_empty() {
                continue;
            }
            let precinct = &mut band.precincts[idx.precinct as usize];
            let Precinct { blocks, inclusion, zero_planes } = precinct;
            for cb in blocks.iter_mut() {
                if cb.rect.is_empty() {
                    lengths.push(0);
                    continue;
                }
                let included = if cb.included {
                    bits.read_bit()? == 1
                } else {
                    // First inclusion is coded through the tag tree: the
                    // leaf value is the first layer the block appears in.
                    let v = inclusion.read(
                        cb.x_idx,
                        cb.y_idx,
                        u32::from(idx.layer) + 1,
                        &mut || bits.read_bit(),
                    )?;
                    v <= u32::from(idx.layer)
                };
                if !included {
                    lengths.push(0);
                    continue;
                }

                if !cb.included {
                    let zbp = zero_planes.read(cb.x_idx, cb.y_idx, u32::MAX, &mut || {
                        bits.read_bit()
                    })?;
                    cb.zero_bit_planes = zbp.min(255) as u8;
                    cb.included = true;
                }

                let added = read_pass_count(&mut bits)?;
                cb.passes += added;

                let mut k = 0u32;
                while bits.read_bit()? == 1 {
                    k += 1;
                }
                cb.lblock += k;
                let len_bits = cb.lblock + added.ilog2();
                if len_bits > 32 {
                    return Err(Error::malformed(base, "codeword segment length overflow"));
                }
                let len = bits.read_bits(len_bits)?;
                lengths.push(len);
            }
        }
    }

    let mut pos = base + bits.finish()?;

    if header.cod.use_eph {
        if data.len() < pos + 2 || data[pos] != 0xFF || data[pos + 1] != 0x92 {
            return Err(Error::malformed(pos, "missing EPH marker"));
        }
        pos += 2;
    }

    if non_empty {
        let mut next = lengths.into_iter();
        for band in &mut res.bands {
            if band.rect.is_empty() {
                continue;
            }
            let precinct = &mut band.precincts[idx.precinct as usize];
            for cb in precinct.blocks.iter_mut() {
                let len = next
                    .next()
                    .ok_or(Error::malformed(pos, "packet body bookkeeping mismatch"))?
                    as usize;
                if len == 0 {
                    continue;
                }
                let end = pos
                    .checked_add(len)
                    .filter(|&e| e <= data.len())
                    .ok_or(Error::Truncated { offset: pos })?;
                cb.data.extend_from_slice(&data[pos..end]);
                pos = end;
            }
        }
    }

    Ok(pos)
}

/// Parse every packet of a tile, in progression order, from the
/// concatenated tile-part data.
pub fn read_tile_packets(
    header: &Header,
    tile: u32,
    comps: &mut [TileComponent],
    tile_data: &[u8],
) -> Result<()> {
    let seq = packet_sequence(header, tile, comps)?;
    let mut pos = 0usize;
    for (n, idx) in seq.iter().enumerate() {
        if pos >= tile_data.len() {
            warn!("tile {tile}: data exhausted after {n} of {} packets", seq.len());
            break;
        }
        pos += read_packet(comps, header, *idx, &tile_data[pos..])?;
    }
    Ok(())
}
