//! Adaptive binary arithmetic decoder shared by JPEG 2000 Tier-1 (the MQ
//! coder of ISO/IEC 15444-1 Annex C) and JBIG2 (the coder of ITU-T T.88
//! Annex E). The two differ only in how callers organize their contexts;
//! the 47-entry probability state table and the byte-in conventions are
//! identical, so a single implementation serves both.

/// One row of the probability state table: the LPS probability estimate,
/// the next state after an MPS, the next state after an LPS, and whether
/// an LPS flips the most probable symbol.
#[derive(Clone, Copy)]
struct QeEntry {
    qe: u16,
    nmps: u8,
    nlps: u8,
    switch: u8,
}

macro_rules! qe {
    ($qe:expr, $nmps:expr, $nlps:expr, $switch:expr) => {
        QeEntry { qe: $qe, nmps: $nmps, nlps: $nlps, switch: $switch }
    };
}

/// ISO/IEC 15444-1 Table C-2 / ITU-T T.88 Table E.1.
const QE_TABLE: [QeEntry; 47] = [
    qe!(0x5601, 1, 1, 1),
    qe!(0x3401, 2, 6, 0),
    qe!(0x1801, 3, 9, 0),
    qe!(0x0AC1, 4, 12, 0),
    qe!(0x0521, 5, 29, 0),
    qe!(0x0221, 38, 33, 0),
    qe!(0x5601, 7, 6, 1),
    qe!(0x5401, 8, 14, 0),
    qe!(0x4801, 9, 14, 0),
    qe!(0x3801, 10, 14, 0),
    qe!(0x3001, 11, 17, 0),
    qe!(0x2401, 12, 18, 0),
    qe!(0x1C01, 13, 20, 0),
    qe!(0x1601, 29, 21, 0),
    qe!(0x5601, 15, 14, 1),
    qe!(0x5401, 16, 14, 0),
    qe!(0x5101, 17, 15, 0),
    qe!(0x4801, 18, 16, 0),
    qe!(0x3801, 19, 17, 0),
    qe!(0x3401, 20, 18, 0),
    qe!(0x3001, 21, 19, 0),
    qe!(0x2801, 22, 19, 0),
    qe!(0x2401, 23, 19, 0),
    qe!(0x2201, 24, 19, 0),
    qe!(0x1C01, 25, 20, 0),
    qe!(0x1801, 26, 21, 0),
    qe!(0x1601, 27, 22, 0),
    qe!(0x1401, 28, 23, 0),
    qe!(0x1201, 29, 24, 0),
    qe!(0x1101, 30, 25, 0),
    qe!(0x0AC1, 31, 26, 0),
    qe!(0x09C1, 32, 27, 0),
    qe!(0x08A1, 33, 28, 0),
    qe!(0x0521, 34, 29, 0),
    qe!(0x0441, 35, 30, 0),
    qe!(0x02A1, 36, 31, 0),
    qe!(0x0221, 37, 32, 0),
    qe!(0x0141, 38, 33, 0),
    qe!(0x0111, 39, 34, 0),
    qe!(0x0085, 40, 35, 0),
    qe!(0x0049, 41, 36, 0),
    qe!(0x0025, 42, 37, 0),
    qe!(0x0015, 43, 38, 0),
    qe!(0x0009, 44, 39, 0),
    qe!(0x0005, 45, 40, 0),
    qe!(0x0001, 45, 41, 0),
    qe!(0x5601, 46, 46, 0),
];

/// Per-context adaptive state: an index into the probability table and the
/// current most probable symbol.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct Context {
    pub index: u8,
    pub mps: u8,
}

impl Context {
    pub fn with_index(index: u8) -> Self {
        Self { index, mps: 0 }
    }
}

/// The decoder proper (software conventions of ISO 15444-1 C.3 with the
/// 16+16 bit split of the C register).
///
/// Running off the end of the segment is not an error at this level: the
/// decoder feeds 0xFF bytes, as both standards specify, and the caller
/// bounds the number of symbols it asks for.
pub struct ArithmeticDecoder<'a> {
    data: &'a [u8],
    bp: usize,
    chigh: u32,
    clow: u32,
    ct: i32,
    a: u32,
}

impl<'a> ArithmeticDecoder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        let mut d = Self {
            data,
            bp: 0,
            chigh: 0,
            clow: 0,
            ct: 0,
            a: 0,
        };
        d.chigh = u32::from(d.byte_at(0));
        d.byte_in();
        d.chigh = ((d.chigh << 7) & 0xFFFF) | ((d.clow >> 9) & 0x7F);
        d.clow = (d.clow << 7) & 0xFFFF;
        d.ct -= 7;
        d.a = 0x8000;
        d
    }

    #[inline]
    fn byte_at(&self, index: usize) -> u8 {
        // Past the end both standards behave as if the stream continued
        // with 0xFF bytes.
        self.data.get(index).copied().unwrap_or(0xFF)
    }

    fn byte_in(&mut self) {
        if self.byte_at(self.bp) == 0xFF {
            if self.byte_at(self.bp + 1) > 0x8F {
                // A marker (or the end of the segment): stop consuming and
                // feed 1-bits from now on.
                self.clow += 0xFF00;
                self.ct = 8;
            } else {
                // Stuffed byte: only its low 7 bits carry data.
                self.bp += 1;
                self.clow += u32::from(self.byte_at(self.bp)) << 9;
                self.ct = 7;
            }
        } else {
            self.bp += 1;
            self.clow += if self.bp < self.data.len() {
                u32::from(self.data[self.bp]) << 8
            } else {
                0xFF00
            };
            self.ct = 8;
        }
        if self.clow > 0xFFFF {
            self.chigh += self.clow >> 16;
            self.clow &= 0xFFFF;
        }
    }

    /// Decode one binary symbol in the given context.
    pub fn decode(&mut self, cx: &mut Context) -> u32 {
        let mut index = cx.index as usize;
        let mut mps = cx.mps;
        let entry = QE_TABLE[index];
        let qe = u32::from(entry.qe);

        let mut a = self.a.wrapping_sub(qe);
        let d;
        if self.chigh < qe {
            // LPS exchange path.
            if a < qe {
                a = qe;
                d = u32::from(mps);
                index = entry.nmps as usize;
            } else {
                a = qe;
                d = u32::from(1 - mps);
                if entry.switch == 1 {
                    mps = d as u8;
                }
                index = entry.nlps as usize;
            }
        } else {
            self.chigh -= qe;
            if a & 0x8000 != 0 {
                self.a = a;
                return u32::from(mps);
            }
            // MPS exchange path.
            if a < qe {
                d = u32::from(1 - mps);
                if entry.switch == 1 {
                    mps = d as u8;
                }
                index = entry.nlps as usize;
            } else {
                d = u32::from(mps);
                index = entry.nmps as usize;
            }
        }

        loop {
            if self.ct == 0 {
                self.byte_in();
            }
            a <<= 1;
            self.chigh = ((self.chigh << 1) & 0xFFFF) | ((self.clow >> 15) & 1);
            self.clow = (self.clow << 1) & 0xFFFF;
            self.ct -= 1;
            if a & 0x8000 != 0 {
                break;
            }
        }

        self.a = a;
        cx.index = index as u8;
        cx.mps = mps;
        d
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_defaults_to_state_zero() {
        let cx = Context::default();
        assert_eq!(cx.index, 0);
        assert_eq!(cx.mps, 0);
    }

    #[test]
    fn empty_segment_keeps_producing_symbols() {
        // Degenerate input must not panic; the decoder synthesizes 0xFF
        // bytes forever.
        let mut d = ArithmeticDecoder::new(&[]);
        let mut cx = Context::default();
        for _ in 0..64 {
            let bit = d.decode(&mut cx);
            assert!(bit <= 1);
        }
    }

    #[test]
    fn stuffed_bytes_consume_seven_bits() {
        // 0xFF followed by a byte <= 0x8F is a stuffed pair, > 0x8F a
        // marker. Exercise both paths for coverage; symbol values are
        // checked by the Tier-1 golden vectors.
        for tail in [0x00u8, 0x8F, 0x90] {
            let data = [0xFF, tail, 0x12, 0x34];
            let mut d = ArithmeticDecoder::new(&data);
            let mut cx = Context::default();
            for _ in 0..32 {
                d.decode(&mut cx);
            }
        }
    }
}
