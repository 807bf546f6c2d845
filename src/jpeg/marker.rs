//! JPEG marker codes and the marker-segment reader (ITU-T T.81 Annex B).

use log::{trace, warn};
use num_enum::TryFromPrimitive;

use crate::bits::Reader;
use crate::error::{Error, Result};
use crate::jpeg::huffman::HuffmanTable;

/// The second byte of a `FF xx` marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum Marker {
    /// SOF0: Baseline DCT frame.
    Sof0 = 0xC0,
    /// SOF1: Extended sequential DCT frame (baseline syntax).
    Sof1 = 0xC1,
    /// SOF2: Progressive DCT frame.
    Sof2 = 0xC2,
    /// SOF3: Lossless sequential frame.
    Sof3 = 0xC3,
    /// DHT: Define Huffman tables.
    Dht = 0xC4,
    Sof5 = 0xC5,
    Sof6 = 0xC6,
    Sof7 = 0xC7,
    /// JPG: reserved.
    Jpg = 0xC8,
    Sof9 = 0xC9,
    Sof10 = 0xCA,
    Sof11 = 0xCB,
    /// DAC: Define arithmetic conditioning.
    Dac = 0xCC,
    Sof13 = 0xCD,
    Sof14 = 0xCE,
    Sof15 = 0xCF,
    Rst0 = 0xD0,
    Rst1 = 0xD1,
    Rst2 = 0xD2,
    Rst3 = 0xD3,
    Rst4 = 0xD4,
    Rst5 = 0xD5,
    Rst6 = 0xD6,
    Rst7 = 0xD7,
    /// SOI: start of image.
    Soi = 0xD8,
    /// EOI: end of image.
    Eoi = 0xD9,
    /// SOS: start of scan.
    Sos = 0xDA,
    /// DQT: define quantization tables.
    Dqt = 0xDB,
    /// DNL: define number of lines.
    Dnl = 0xDC,
    /// DRI: define restart interval.
    Dri = 0xDD,
    Dhp = 0xDE,
    Exp = 0xDF,
    App0 = 0xE0,
    App1 = 0xE1,
    App2 = 0xE2,
    App3 = 0xE3,
    App4 = 0xE4,
    App5 = 0xE5,
    App6 = 0xE6,
    App7 = 0xE7,
    App8 = 0xE8,
    App9 = 0xE9,
    App10 = 0xEA,
    App11 = 0xEB,
    App12 = 0xEC,
    App13 = 0xED,
    App14 = 0xEE,
    App15 = 0xEF,
    /// COM: comment.
    Com = 0xFE,
}

/// One frame component as declared by SOF0.
#[derive(Debug, Clone, Copy)]
pub struct Component {
    pub id: u8,
    /// Horizontal sampling factor, 1..=4.
    pub h: u8,
    /// Vertical sampling factor, 1..=4.
    pub v: u8,
    /// Quantization table slot.
    pub quant_id: u8,
}

/// Frame parameters from SOF0/SOF1.
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub precision: u8,
    pub components: Vec<Component>,
    pub h_max: u8,
    pub v_max: u8,
}

impl Frame {
    /// Number of MCU columns and rows covering the frame.
    pub fn mcu_grid(&self) -> (u32, u32) {
        let mcu_w = u32::from(self.h_max) * 8;
        let mcu_h = u32::from(self.v_max) * 8;
        (self.width.div_ceil(mcu_w), self.height.div_ceil(mcu_h))
    }

    /// Padded block grid of one component, in blocks.
    pub fn component_blocks(&self, c: usize) -> (u32, u32) {
        let (mcus_x, mcus_y) = self.mcu_grid();
        let comp = &self.components[c];
        (mcus_x * u32::from(comp.h), mcus_y * u32::from(comp.v))
    }
}

/// Scan header from SOS: component selectors with their entropy table
/// slots, plus the spectral selection bounds (always 0, 63, 0, 0 for
/// baseline).
#[derive(Debug, Clone)]
pub struct Scan {
    /// `(frame component index, dc table slot, ac table slot)` per scan
    /// component, in scan order.
    pub components: Vec<(usize, u8, u8)>,
}

/// 64 quantization steps in zig-zag position order.
#[derive(Debug, Clone)]
pub struct QuantTable(pub [u16; 64]);

pub enum Event {
    /// A scan header was read; entropy-coded data follows at the reader
    /// position.
    Scan(Scan),
    /// EOI reached.
    End,
}

/// Reads the marker-segment sequence from SOI to EOI, retaining frame
/// parameters, quantization and Huffman tables and the restart interval.
#[derive(Debug)]
pub struct MarkerReader<'a> {
    r: Reader<'a>,
    pub frame: Option<Frame>,
    pub quant: [Option<QuantTable>; 4],
    pub dc: [Option<HuffmanTable>; 4],
    pub ac: [Option<HuffmanTable>; 4],
    pub restart_interval: u16,
}

impl<'a> MarkerReader<'a> {
    pub fn new(data: &'a [u8]) -> Result<Self> {
        let mut r = Reader::new(data);
        if r.peek_u16() != Some(0xFFD8) {
            return Err(Error::BadMagic { offset: 0, reason: "missing SOI marker" });
        }
        r.skip(2)?;
        Ok(Self {
            r,
            frame: None,
            quant: [None, None, None, None],
            dc: [None, None, None, None],
            ac: [None, None, None, None],
            restart_interval: 0,
        })
    }

    pub fn pos(&self) -> usize {
        self.r.pos()
    }

    /// Re-position the reader, used after entropy-coded data has been
    /// consumed by the scan decoder.
    pub fn seek(&mut self, pos: usize) -> Result<()> {
        self.r.seek(pos)
    }

    fn next_marker(&mut self) -> Result<u8> {
        // Any number of 0xFF fill bytes may precede a marker.
        let start = self.r.pos();
        if self.r.read_u8()? != 0xFF {
            return Err(Error::malformed(start, "expected marker"));
        }
        let mut b = self.r.read_u8()?;
        while b == 0xFF {
            b = self.r.read_u8()?;
        }
        Ok(b)
    }

    /// Advance to the next SOS or EOI, processing table segments on the
    /// way.
    pub fn next_event(&mut self) -> Result<Event> {
        loop {
            let at = self.r.pos();
            let byte = self.next_marker()?;
            let marker = Marker::try_from(byte);
            trace!("marker 0xFF{byte:02X} at {at}");
            match marker {
                Ok(Marker::Sof0) | Ok(Marker::Sof1) => self.read_frame(at)?,
                Ok(Marker::Sof2) => {
                    return Err(Error::unsupported(at, "progressive JPEG"));
                }
                Ok(
                    Marker::Sof3
                    | Marker::Sof5
                    | Marker::Sof6
                    | Marker::Sof7
                    | Marker::Sof9
                    | Marker::Sof10
                    | Marker::Sof11
                    | Marker::Sof13
                    | Marker::Sof14
                    | Marker::Sof15,
                ) => {
                    return Err(Error::unsupported(at, "non-baseline SOF"));
                }
                Ok(Marker::Dht) => self.read_dht(at)?,
                Ok(Marker::Dqt) => self.read_dqt(at)?,
                Ok(Marker::Dri) => {
                    let len = self.segment_len(at)?;
                    if len != 2 {
                        return Err(Error::malformed(at, "bad DRI length"));
                    }
                    self.restart_interval = self.r.read_u16()?;
                    trace!("restart interval {}", self.restart_interval);
                }
                Ok(Marker::Sos) => {
                    let scan = self.read_sos(at)?;
                    return Ok(Event::Scan(scan));
                }
                Ok(Marker::Eoi) => return Ok(Event::End),
                Ok(Marker::Soi) => {
                    return Err(Error::malformed(at, "duplicate SOI"));
                }
                Ok(
                    Marker::Rst0
                    | Marker::Rst1
                    | Marker::Rst2
                    | Marker::Rst3
                    | Marker::Rst4
                    | Marker::Rst5
                    | Marker::Rst6
                    | Marker::Rst7,
                ) => {
                    return Err(Error::malformed(at, "restart marker outside scan"));
                }
                Ok(Marker::Jpg) => {
                    return Err(Error::malformed(at, "unexpected marker"));
                }
                Ok(_) => {
                    // APPn, COM, DNL, DAC, DHP, EXP: length-prefixed, skip.
                    self.skip_segment(at)?;
                }
                Err(_) => {
                    if byte == 0x01 {
                        // TEM is a standalone marker with no length.
                        return Err(Error::malformed(at, "unexpected marker"));
                    }
                    warn!("skipping unknown marker 0xFF{byte:02X}");
                    self.skip_segment(at)?;
                }
            }
        }
    }

    fn segment_len(&mut self, at: usize) -> Result<usize> {
        let len = self.r.read_u16()? as usize;
        if len < 2 {
            return Err(Error::malformed(at, "bad segment length"));
        }
        Ok(len - 2)
    }

    fn skip_segment(&mut self, at: usize) -> Result<()> {
        let len = self.segment_len(at)?;
        self.r.skip(len)
    }

    fn read_frame(&mut self, at: usize) -> Result<()> {
        if self.frame.is_some() {
            return Err(Error::malformed(at, "duplicate SOF"));
        }
        let len = self.segment_len(at)?;
        let precision = self.r.read_u8()?;
        let height = u32::from(self.r.read_u16()?);
        let width = u32::from(self.r.read_u16()?);
        let ncomp = self.r.read_u8()? as usize;
        if precision != 8 {
            return Err(Error::unsupported(at, "sample precision other than 8"));
        }
        if width == 0 || height == 0 {
            return Err(Error::malformed(at, "zero frame dimension"));
        }
        if ncomp == 0 || ncomp > 4 {
            return Err(Error::malformed(at, "bad component count"));
        }
        if len != 6 + 3 * ncomp {
            return Err(Error::malformed(at, "bad SOF length"));
        }
        let mut components = Vec::with_capacity(ncomp);
        let mut h_max = 1u8;
        let mut v_max = 1u8;
        for _ in 0..ncomp {
            let id = self.r.read_u8()?;
            let hv = self.r.read_u8()?;
            let quant_id = self.r.read_u8()?;
            let (h, v) = (hv >> 4, hv & 0x0F);
            if !(1..=4).contains(&h) || !(1..=4).contains(&v) {
                return Err(Error::malformed(at, "bad sampling factor"));
            }
            if quant_id > 3 {
                return Err(Error::malformed(at, "bad quantization table slot"));
            }
            h_max = h_max.max(h);
            v_max = v_max.max(v);
            components.push(Component { id, h, v, quant_id });
        }
        trace!("frame {width}x{height}, {ncomp} components");
        self.frame = Some(Frame { width, height, precision, components, h_max, v_max });
        Ok(())
    }

    fn read_dqt(&mut self, at: usize) -> Result<()> {
        let mut len = self.segment_len(at)?;
        while len > 0 {
            let pq_tq = self.r.read_u8()?;
            let (pq, tq) = (pq_tq >> 4, (pq_tq & 0x0F) as usize);
            if tq > 3 || pq > 1 {
                return Err(Error::malformed(at, "bad DQT header"));
            }
            let mut table = [0u16; 64];
            if pq == 0 {
                for q in table.iter_mut() {
                    *q = u16::from(self.r.read_u8()?);
                }
                len = len
                    .checked_sub(65)
                    .ok_or(Error::malformed(at, "bad DQT length"))?;
            } else {
                for q in table.iter_mut() {
                    *q = self.r.read_u16()?;
                }
                len = len
                    .checked_sub(129)
                    .ok_or(Error::malformed(at, "bad DQT length"))?;
            }
            if table.contains(&0) {
                return Err(Error::malformed(at, "zero quantization step"));
            }
            self.quant[tq] = Some(QuantTable(table));
            trace!("quantization table {tq} ({}-bit)", if pq == 0 { 8 } else { 16 });
        }
        Ok(())
    }

    fn read_dht(&mut self, at: usize) -> Result<()> {
        let mut len = self.segment_len(at)?;
        while len > 0 {
            let tc_th = self.r.read_u8()?;
            let (tc, th) = (tc_th >> 4, (tc_th & 0x0F) as usize);
            if tc > 1 || th > 3 {
                return Err(Error::malformed(at, "bad DHT header"));
            }
            let mut counts = [0u8; 16];
            for c in counts.iter_mut() {
                *c = self.r.read_u8()?;
            }
            let total: usize = counts.iter().map(|&c| c as usize).sum();
            if total > 256 {
                return Err(Error::malformed(at, "Huffman symbol count exceeds 256"));
            }
            let symbols = self.r.read_bytes(total)?;
            let table =
                HuffmanTable::build(&counts, symbols).map_err(|reason| Error::malformed(at, reason))?;
            if tc == 0 {
                self.dc[th] = Some(table);
            } else {
                self.ac[th] = Some(table);
            }
            len = len
                .checked_sub(17 + total)
                .ok_or(Error::malformed(at, "bad DHT length"))?;
            trace!("{} Huffman table {th}, {total} symbols", if tc == 0 { "DC" } else { "AC" });
        }
        Ok(())
    }

    fn read_sos(&mut self, at: usize) -> Result<Scan> {
        let len = self.segment_len(at)?;
        let frame = self
            .frame
            .as_ref()
            .ok_or(Error::malformed(at, "SOS before SOF"))?;
        let ns = self.r.read_u8()? as usize;
        if ns == 0 || ns > 4 || len != 4 + 2 * ns {
            return Err(Error::malformed(at, "bad SOS header"));
        }
        let mut components = Vec::with_capacity(ns);
        for _ in 0..ns {
            let cs = self.r.read_u8()?;
            let td_ta = self.r.read_u8()?;
            let (td, ta) = (td_ta >> 4, td_ta & 0x0F);
            if td > 3 || ta > 3 {
                return Err(Error::malformed(at, "bad entropy table slot"));
            }
            let index = frame
                .components
                .iter()
                .position(|c| c.id == cs)
                .ok_or(Error::malformed(at, "unknown scan component id"))?;
            components.push((index, td, ta));
        }
        let ss = self.r.read_u8()?;
        let se = self.r.read_u8()?;
        let ah_al = self.r.read_u8()?;
        if ss != 0 || se != 63 || ah_al != 0 {
            return Err(Error::malformed(at, "non-baseline spectral selection"));
        }
        Ok(Scan { components })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_missing_soi() {
        let err = MarkerReader::new(&[0x00, 0x01]).unwrap_err();
        assert!(matches!(err, Error::BadMagic { .. }));
    }

    #[test]
    fn skips_app_and_com_segments() {
        // SOI, APP0 with 4 payload bytes, COM with 1, EOI.
        let data = [
            0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x06, 1, 2, 3, 4, 0xFF, 0xFE, 0x00, 0x03, 9, 0xFF, 0xD9,
        ];
        let mut m = MarkerReader::new(&data).unwrap();
        assert!(matches!(m.next_event().unwrap(), Event::End));
    }

    #[test]
    fn progressive_frames_are_unsupported() {
        let data = [0xFF, 0xD8, 0xFF, 0xC2, 0x00, 0x0B, 8, 0, 8, 0, 8, 1, 1, 0x11, 0];
        let mut m = MarkerReader::new(&data).unwrap();
        assert!(matches!(m.next_event(), Err(Error::Unsupported { .. })));
    }

    #[test]
    fn dqt_rejects_zero_steps() {
        let mut data = vec![0xFF, 0xD8, 0xFF, 0xDB, 0x00, 0x43, 0x00];
        data.extend(std::iter::repeat(0u8).take(64));
        let mut m = MarkerReader::new(&data).unwrap();
        assert!(matches!(m.next_event(), Err(Error::Malformed { .. })));
    }
}
