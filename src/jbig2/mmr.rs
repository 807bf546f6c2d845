//! MMR (Modified Modified READ) decoding, i.e. the two-dimensional coding
//! of ITU-T T.6 (Group 4 fax), used by JBIG2 generic regions, collective
//! symbol bitmaps and halftone grayscale planes.
//!
//! Each coded line is described relative to the line above through
//! pass/horizontal/vertical mode codes over the changing elements a0, a1,
//! b1, b2; horizontal mode falls back to the one-dimensional MH run
//! tables (terminating plus make-up codes, white and black).

use log::warn;

use crate::bits::BitReader;
use crate::error::{Error, Result};
use crate::jbig2::bitmap::Bitmap;

/// (run length, code length, code bits), terminating codes first.
type RunCode = (u16, u8, u16);

const WHITE_CODES: &[RunCode] = &[
    // Terminating codes 0..=63.
    (0, 8, 0b0011_0101),
    (1, 6, 0b00_0111),
    (2, 4, 0b0111),
    (3, 4, 0b1000),
    (4, 4, 0b1011),
    (5, 4, 0b1100),
    (6, 4, 0b1110),
    (7, 4, 0b1111),
    (8, 5, 0b1_0011),
    (9, 5, 0b1_0100),
    (10, 5, 0b0_0111),
    (11, 5, 0b0_1000),
    (12, 6, 0b00_1000),
    (13, 6, 0b00_0011),
    (14, 6, 0b11_0100),
    (15, 6, 0b11_0101),
    (16, 6, 0b10_1010),
    (17, 6, 0b10_1011),
    (18, 7, 0b010_0111),
    (19, 7, 0b000_1100),
    (20, 7, 0b000_1000),
    (21, 7, 0b001_0111),
    (22, 7, 0b000_0011),
    (23, 7, 0b000_0100),
    (24, 7, 0b010_1000),
    (25, 7, 0b010_1011),
    (26, 7, 0b001_0011),
    (27, 7, 0b010_0100),
    (28, 7, 0b001_1000),
    (29, 8, 0b0000_0010),
    (30, 8, 0b0000_0011),
    (31, 8, 0b0001_1010),
    (32, 8, 0b0001_1011),
    (33, 8, 0b0001_0010),
    (34, 8, 0b0001_0011),
    (35, 8, 0b0001_0100),
    (36, 8, 0b0001_0101),
    (37, 8, 0b0001_0110),
    (38, 8, 0b0001_0111),
    (39, 8, 0b0010_1000),
    (40, 8, 0b0010_1001),
    (41, 8, 0b0010_1010),
    (42, 8, 0b0010_1011),
    (43, 8, 0b0010_1100),
    (44, 8, 0b0010_1101),
    (45, 8, 0b0000_0100),
    (46, 8, 0b0000_0101),
    (47, 8, 0b0000_1010),
    (48, 8, 0b0000_1011),
    (49, 8, 0b0101_0010),
    (50, 8, 0b0101_0011),
    (51, 8, 0b0101_0100),
    (52, 8, 0b0101_0101),
    (53, 8, 0b0010_0100),
    (54, 8, 0b0010_0101),
    (55, 8, 0b0101_1000),
    (56, 8, 0b0101_1001),
    (57, 8, 0b0101_1010),
    (58, 8, 0b0101_1011),
    (59, 8, 0b0100_1010),
    (60, 8, 0b0100_1011),
    (61, 8, 0b0011_0010),
    (62, 8, 0b0011_0011),
    (63, 8, 0b0011_0100),
    // Make-up codes.
    (64, 5, 0b1_1011),
    (128, 5, 0b1_0010),
    (192, 6, 0b01_0111),
    (256, 7, 0b011_0111),
    (320, 8, 0b0011_0110),
    (384, 8, 0b0011_0111),
    (448, 8, 0b0110_0100),
    (512, 8, 0b0110_0101),
    (576, 8, 0b0110_1000),
    (640, 8, 0b0110_0111),
    (704, 9, 0b0_1100_1100),
    (768, 9, 0b0_1100_1101),
    (832, 9, 0b0_1101_0010),
    (896, 9, 0b0_1101_0011),
    (960, 9, 0b0_1101_0100),
    (1024, 9, 0b0_1101_0101),
    (1088, 9, 0b0_1101_0110),
    (1152, 9, 0b0_1101_0111),
    (1216, 9, 0b0_1101_1000),
    (1280, 9, 0b0_1101_1001),
    (1344, 9, 0b0_1101_1010),
    (1408, 9, 0b0_1101_1011),
    (1472, 9, 0b0_1001_1000),
    (1536, 9, 0b0_1001_1001),
    (1600, 9, 0b0_1001_1010),
    (1664, 6, 0b01_1000),
    (1728, 9, 0b0_1001_1011),
];

const BLACK_CODES: &[RunCode] = &[
    (0, 10, 0b00_0011_0111),
    (1, 3, 0b010),
    (2, 2, 0b11),
    (3, 2, 0b10),
    (4, 3, 0b011),
    (5, 4, 0b0011),
    (6, 4, 0b0010),
    (7, 5, 0b0_0011),
    (8, 6, 0b00_0101),
    (9, 6, 0b00_0100),
    (10, 7, 0b000_0100),
    (11, 7, 0b000_0101),
    (12, 7, 0b000_0111),
    (13, 8, 0b0000_0100),
    (14, 8, 0b0000_0111),
    (15, 9, 0b0_0001_1000),
    (16, 10, 0b00_0001_0111),
    (17, 10, 0b00_0001_1000),
    (18, 10, 0b00_0000_1000),
    (19, 11, 0b000_0110_0111),
    (20, 11, 0b000_0110_1000),
    (21, 11, 0b000_0110_1100),
    (22, 11, 0b000_0011_0111),
    (23, 11, 0b000_0010_1000),
    (24, 11, 0b000_0001_0111),
    (25, 11, 0b000_0001_1000),
    (26, 12, 0b0000_1100_1010),
    (27, 12, 0b0000_1100_1011),
    (28, 12, 0b0000_1100_1100),
    (29, 12, 0b0000_1100_1101),
    (30, 12, 0b0000_0110_1000),
    (31, 12, 0b0000_0110_1001),
    (32, 12, 0b0000_0110_1010),
    (33, 12, 0b0000_0110_1011),
    (34, 12, 0b0000_1101_0010),
    (35, 12, 0b0000_1101_0011),
    (36, 12, 0b0000_1101_0100),
    (37, 12, 0b0000_1101_0101),
    (38, 12, 0b0000_1101_0110),
    (39, 12, 0b0000_1101_0111),
    (40, 12, 0b0000_0110_1100),
    (41, 12, 0b0000_0110_1101),
    (42, 12, 0b0000_1101_1010),
    (43, 12, 0b0000_1101_1011),
    (44, 12, 0b0000_0101_0100),
    (45, 12, 0b0000_0101_0101),
    (46, 12, 0b0000_0101_0110),
    (47, 12, 0b0000_0101_0111),
    (48, 12, 0b0000_0110_0100),
    (49, 12, 0b0000_0110_0101),
    (50, 12, 0b0000_0101_0010),
    (51, 12, 0b0000_0101_0011),
    (52, 12, 0b0000_0010_0100),
    (53, 12, 0b0000_0011_0111),
    (54, 12, 0b0000_0011_1000),
    (55, 12, 0b0000_0010_0111),
    (56, 12, 0b0000_0010_1000),
    (57, 12, 0b0000_0101_1000),
    (58, 12, 0b0000_0101_1001),
    (59, 12, 0b0000_0010_1011),
    (60, 12, 0b0000_0010_1100),
    (61, 12, 0b0000_0101_1010),
    (62, 12, 0b0000_0110_0110),
    (63, 12, 0b0000_0110_0111),
    // Make-up codes.
    (64, 10, 0b00_0000_1111),
    (128, 12, 0b0000_1100_1000),
    (192, 12, 0b0000_1100_1001),
    (256, 12, 0b0000_0101_1011),
    (320, 12, 0b0000_0011_0011),
    (384, 12, 0b0000_0011_0100),
    (448, 12, 0b0000_0011_0101),
    (512, 13, 0b0_0000_0110_1100),
    (576, 13, 0b0_0000_0110_1101),
    (640, 13, 0b0_0000_0100_1010),
    (704, 13, 0b0_0000_0100_1011),
    (768, 13, 0b0_0000_0100_1100),
    (832, 13, 0b0_0000_0100_1101),
    (896, 13, 0b0_0000_0111_0010),
    (960, 13, 0b0_0000_0111_0011),
    (1024, 13, 0b0_0000_0111_0100),
    (1088, 13, 0b0_0000_0111_0101),
    (1152, 13, 0b0_0000_0111_0110),
    (1216, 13, 0b0_0000_0111_0111),
    (1280, 13, 0b0_0000_0101_0010),
    (1344, 13, 0b0_0000_0101_0011),
    (1408, 13, 0b0_0000_0101_0100),
    (1472, 13, 0b0_0000_0101_0101),
    (1536, 13, 0b0_0000_0101_1010),
    (1600, 13, 0b0_0000_0101_1011),
    (1664, 13, 0b0_0000_0110_0100),
    (1728, 13, 0b0_0000_0110_0101),
];

/// Extended make-up codes shared by both colours.
const EXT_CODES: &[RunCode] = &[
    (1792, 11, 0b000_0000_1000),
    (1856, 11, 0b000_0000_1100),
    (1920, 11, 0b000_0000_1101),
    (1984, 12, 0b0000_0001_0010),
    (2048, 12, 0b0000_0001_0011),
    (2112, 12, 0b0000_0001_0100),
    (2176, 12, 0b0000_0001_0101),
    (2240, 12, 0b0000_0001_0110),
    (2304, 12, 0b0000_0001_0111),
    (2368, 12, 0b0000_0001_1100),
    (2432, 12, 0b0000_0001_1101),
    (2496, 12, 0b0000_0001_1110),
    (2560, 12, 0b0000_0001_1111),
];

fn decode_run_code(bits: &mut BitReader<'_>, white: bool) -> Result<u32> {
    let tables: [&[RunCode]; 2] = if white {
        [WHITE_CODES, EXT_CODES]
    } else {
        [BLACK_CODES, EXT_CODES]
    };
    let mut code = 0u16;
    let mut len = 0u8;
    let at = bits.byte_pos();
    while len < 14 {
        code = (code << 1) | bits.read_bit()? as u16;
        len += 1;
        for table in tables {
            for &(run, code_len, code_bits) in table {
                if code_len == len && code_bits == code {
                    return Ok(u32::from(run));
                }
            }
        }
    }
    Err(Error::Huffman { offset: at })
}

/// One full run of a colour: make-up codes accumulate until a terminating
/// code (< 64) ends the run.
fn decode_run(bits: &mut BitReader<'_>, white: bool) -> Result<u32> {
    let mut total = 0u32;
    loop {
        let run = decode_run_code(bits, white)?;
        total += run;
        if run < 64 {
            return Ok(total);
        }
    }
}

enum Mode {
    Pass,
    Horizontal,
    Vertical(i32),
    EndOfData,
}

fn decode_mode(bits: &mut BitReader<'_>) -> Result<Mode> {
    if bits.read_bit()? == 1 {
        return Ok(Mode::Vertical(0));
    }
    if bits.read_bit()? == 1 {
        return Ok(if bits.read_bit()? == 1 { Mode::Vertical(1) } else { Mode::Vertical(-1) });
    }
    if bits.read_bit()? == 1 {
        return Ok(Mode::Horizontal);
    }
    if bits.read_bit()? == 1 {
        return Ok(Mode::Pass);
    }
    if bits.read_bit()? == 1 {
        return Ok(if bits.read_bit()? == 1 { Mode::Vertical(2) } else { Mode::Vertical(-2) });
    }
    if bits.read_bit()? == 1 {
        return Ok(if bits.read_bit()? == 1 { Mode::Vertical(3) } else { Mode::Vertical(-3) });
    }
    // Six zeros so far: the only valid continuation is EOL
    // (000000000001), possibly doubled as EOFB.
    for _ in 0..5 {
        if bits.read_bit()? != 0 {
            return Err(Error::malformed(bits.byte_pos(), "bad two-dimensional mode code"));
        }
    }
    if bits.read_bit()? != 1 {
        return Err(Error::malformed(bits.byte_pos(), "bad EOL code"));
    }
    Ok(Mode::EndOfData)
}

/// Decode an MMR-coded bitmap of the given size.
pub fn decode(data: &[u8], width: u32, height: u32) -> Result<Bitmap> {
    let mut bitmap = Bitmap::new(width, height);
    let mut decoder = MmrDecoder::new(data, width);
    for y in 0..height {
        if !decoder.decode_line(&mut bitmap, y)? {
            break;
        }
    }
    Ok(bitmap)
}

/// Streaming MMR decoder; halftone grayscale planes decode several
/// bitmaps from a single stream without resetting it.
pub struct MmrDecoder<'a> {
    bits: BitReader<'a>,
    width: u32,
    /// Changing-element positions of the reference line, ascending; the
    /// first transition is white to black.
    reference: Vec<u32>,
    finished: bool,
}

impl<'a> MmrDecoder<'a> {
    pub fn new(data: &'a [u8], width: u32) -> Self {
        Self { bits: BitReader::new(data), width, reference: Vec::new(), finished: false }
    }

    /// Start a new bitmap from the same stream (the reference line resets
    /// to all white).
    pub fn restart(&mut self, width: u32) {
        self.width = width;
        self.reference.clear();
        self.finished = false;
    }

    /// Consume an EOFB (two EOL codes) if one sits at the cursor; coded
    /// blocks sharing one stream are terminated this way.
    pub fn skip_eofb(&mut self) {
        for _ in 0..2 {
            let mut probe = self.bits.clone();
            if probe.read_bits(12) == Ok(0b0000_0000_0001) {
                self.bits = probe;
            } else {
                break;
            }
        }
    }

    /// Find (b1, b2): the first changing element on the reference line
    /// right of a0 with the opposite colour of the current run, and its
    /// successor.
    fn b1_b2(&self, a0: i64, color: bool) -> (u32, u32) {
        // Transitions alternate colours starting white->black, so the
        // parity of the index determines the colour changed to.
        let mut i = match self.reference.binary_search_by(|&p| {
            if i64::from(p) <= a0 { std::cmp::Ordering::Less } else { std::cmp::Ordering::Greater }
        }) {
            Ok(i) | Err(i) => i,
        };
        // A white run ends at a white->black transition (even index).
        if (i & 1) != usize::from(color) {
            i += 1;
        }
        let b1 = self.reference.get(i).copied().unwrap_or(self.width);
        let b2 = self.reference.get(i + 1).copied().unwrap_or(self.width);
        (b1, b2)
    }

    /// Decode one line into row `y`. Returns false once EOFB was seen.
    pub fn decode_line(&mut self, bitmap: &mut Bitmap, y: u32) -> Result<bool> {
        if self.finished {
            return Ok(false);
        }
        let width = self.width;
        let mut a0: i64 = -1;
        let mut color = false; // false = white

        while a0 < i64::from(width) {
            let (b1, b2) = self.b1_b2(a0, color);
            match decode_mode(&mut self.bits)? {
                Mode::Pass => {
                    fill_run(bitmap, y, a0.max(0) as u32, b2, color);
                    a0 = i64::from(b2);
                }
                Mode::Horizontal => {
                    let start = a0.max(0) as u32;
                    let run1 = decode_run(&mut self.bits, !color)?;
                    let run2 = decode_run(&mut self.bits, color)?;
                    let mid = (start + run1).min(width);
                    let end = (mid + run2).min(width);
                    fill_run(bitmap, y, start, mid, color);
                    fill_run(bitmap, y, mid, end, !color);
                    if i64::from(end) <= a0 {
                        return Err(Error::malformed(self.bits.byte_pos(), "MMR made no progress"));
                    }
                    a0 = i64::from(end);
                }
                Mode::Vertical(offset) => {
                    let a1 = (i64::from(b1) + i64::from(offset)).clamp(0, i64::from(width));
                    if a1 <= a0 {
                        return Err(Error::malformed(self.bits.byte_pos(), "MMR made no progress"));
                    }
                    fill_run(bitmap, y, a0.max(0) as u32, a1 as u32, color);
                    a0 = a1;
                    color = !color;
                }
                Mode::EndOfData => {
                    // A second EOL confirms EOFB; either way the coded
                    // data is over.
                    self.finished = true;
                    if y + 1 < bitmap.height {
                        warn!("MMR data ended at row {y} of {}", bitmap.height);
                    }
                    return Ok(false);
                }
            }
        }

        // The reference line for the next row is this row's changing
        // elements, read back from the decoded pixels.
        self.reference.clear();
        let mut prev = false;
        for x in 0..width {
            let pixel = bitmap.get(x, y);
            if pixel != prev {
                self.reference.push(x);
                prev = pixel;
            }
        }
        Ok(true)
    }
}

fn fill_run(bitmap: &mut Bitmap, y: u32, from: u32, to: u32, color: bool) {
    if !color {
        return; // rows start white
    }
    for x in from..to.min(bitmap.width) {
        bitmap.set(x, y, true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_white_line_is_one_v0_code() {
        // The imaginary reference line above the first row is all white,
        // so b1 = width and a single V0 code produces a white row.
        let bitmap = decode(&[0b1000_0000], 8, 1).unwrap();
        assert_eq!(bitmap.data, vec![0x00]);
    }

    #[test]
    fn horizontal_mode_places_runs() {
        // H + white run 10 + black run 6 for a 16-wide line, then V0 on
        // the second line copies it.
        // H = 001, white 10 = 00111, black 6 = 0010, V0 = 1.
        let data = [0b0010_0111, 0b0010_1000];
        let bitmap = decode(&data, 16, 2).unwrap();
        assert_eq!(&bitmap.data[0..2], &[0b0000_0000, 0b0011_1111]);
        assert_eq!(&bitmap.data[2..4], &[0b0000_0000, 0b0011_1111]);
    }

    #[test]
    fn makeup_codes_accumulate() {
        // White run of 64 + 0 terminating: makeup 64 (11011) then
        // terminating 0 (00110101), then black run 0 (0000110111).
        let mut data_bits = String::new();
        data_bits.push_str("001"); // horizontal
        data_bits.push_str("11011"); // white make-up 64
        data_bits.push_str("00110101"); // white terminating 0
        data_bits.push_str("0000110111"); // black terminating 0
        let mut bytes = Vec::new();
        let mut acc = 0u8;
        let mut n = 0;
        for c in data_bits.chars() {
            acc = (acc << 1) | (c == '1') as u8;
            n += 1;
            if n == 8 {
                bytes.push(acc);
                acc = 0;
                n = 0;
            }
        }
        if n > 0 {
            bytes.push(acc << (8 - n));
        }
        let bitmap = decode(&bytes, 64, 1).unwrap();
        assert!(bitmap.data.iter().all(|&b| b == 0));
    }

    #[test]
    fn vertical_offsets_track_reference() {
        // Line 1: H white 3 black 5 (8 wide). Line 2: VR1 then V0: the
        // black edge moves right by one.
        let mut bits = String::new();
        bits.push_str("001"); // H
        bits.push_str("1000"); // white 3
        bits.push_str("0011"); // black 5
        bits.push_str("011"); // VR1 (a1 = b1 + 1 = 4)
        bits.push_str("1"); // V0 (a1 = b2 = 8); hmm: second change
        let mut bytes = Vec::new();
        let mut acc = 0u8;
        let mut n = 0;
        for c in bits.chars() {
            acc = (acc << 1) | (c == '1') as u8;
            n += 1;
            if n == 8 {
                bytes.push(acc);
                acc = 0;
                n = 0;
            }
        }
        if n > 0 {
            bytes.push(acc << (8 - n));
        }
        let bitmap = decode(&bytes, 8, 2).unwrap();
        assert_eq!(bitmap.data[0], 0b0001_1111);
        assert_eq!(bitmap.data[1], 0b0000_1111);
    }
}
