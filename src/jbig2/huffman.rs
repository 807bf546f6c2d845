//! JBIG2 Huffman tables (ITU-T T.88 Annex B): the fifteen standard tables
//! plus custom tables carried by Tables segments.
//!
//! A table is a list of lines, each with a prefix length, a range length
//! and a range low value; canonical prefix codes are assigned per B.3
//! (by length, in table order). Three special leaves exist: out-of-band,
//! the 32-bit lower range (value = low - offset) and the 32-bit upper
//! range (value = low + offset).

use crate::bits::{BitReader, Reader};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Leaf {
    /// value = low + next `range_len` bits.
    Value { range_len: u8, low: i64 },
    /// value = low - next 32 bits.
    Lower { low: i64 },
    /// Out-of-band: a distinguished non-numeric result.
    Oob,
}

#[derive(Debug, Clone, Copy)]
struct Line {
    prefix_len: u8,
    leaf: Leaf,
}

#[derive(Debug, Clone)]
pub struct HuffmanTable {
    /// (code length, code, leaf), ascending by length then code.
    codes: Vec<(u8, u32, Leaf)>,
}

impl HuffmanTable {
    fn assign(lines: &[Line]) -> Result<Self> {
        let max_len = lines.iter().map(|l| l.prefix_len).max().unwrap_or(0);
        if max_len > 32 {
            return Err(Error::malformed(0, "Huffman prefix longer than 32 bits"));
        }
        let mut counts = vec![0u32; usize::from(max_len) + 1];
        for line in lines {
            if line.prefix_len > 0 {
                counts[usize::from(line.prefix_len)] += 1;
            }
        }
        // First code of each length (B.3), then hand codes of equal
        // length out in table order.
        let mut cursor = vec![0u64; usize::from(max_len) + 1];
        let mut acc = 0u64;
        for len in 1..=usize::from(max_len) {
            acc = (acc + u64::from(counts[len - 1])) << 1;
            cursor[len] = acc;
        }
        let mut codes = Vec::with_capacity(lines.len());
        for line in lines {
            let len = usize::from(line.prefix_len);
            if len == 0 {
                continue;
            }
            if cursor[len] >= 1u64 << len {
                return Err(Error::malformed(0, "oversubscribed Huffman table"));
            }
            codes.push((line.prefix_len, cursor[len] as u32, line.leaf));
            cursor[len] += 1;
        }
        codes.sort_by_key(|&(len, code, _)| (len, code));
        Ok(Self { codes })
    }

    fn from_spec(spec: &[(u8, u8, i64, u8)]) -> Self {
        let lines: Vec<Line> = spec
            .iter()
            .map(|&(prefix_len, range_len, low, kind)| Line {
                prefix_len,
                leaf: match kind {
                    1 => Leaf::Lower { low },
                    2 => Leaf::Oob,
                    _ => Leaf::Value { range_len, low },
                },
            })
            .collect();
        // Standard table specs are well formed.
        Self::assign(&lines).expect("standard table")
    }

    /// Decode one value; `None` is the out-of-band result.
    pub fn decode(&self, bits: &mut BitReader<'_>) -> Result<Option<i64>> {
        let mut code = 0u32;
        let mut len = 0u8;
        let mut at = 0usize;
        for &(code_len, table_code, leaf) in &self.codes {
            while len < code_len {
                at = bits.byte_pos();
                code = (code << 1) | bits.read_bit()?;
                len += 1;
            }
            if code == table_code {
                return self.leaf_value(leaf, bits);
            }
        }
        Err(Error::Huffman { offset: at })
    }

    fn leaf_value(&self, leaf: Leaf, bits: &mut BitReader<'_>) -> Result<Option<i64>> {
        match leaf {
            Leaf::Oob => Ok(None),
            Leaf::Lower { low } => {
                let offset = i64::from(bits.read_bits(32)?);
                Ok(Some(low - offset))
            }
            Leaf::Value { range_len, low } => {
                let offset = i64::from(bits.read_bits(range_len)?);
                Ok(Some(low + offset))
            }
        }
    }

    /// Parse a custom table from a Tables segment (B.2).
    pub fn from_tables_segment(data: &[u8]) -> Result<Self> {
        let mut r = Reader::new(data);
        let flags = r.read_u8()?;
        let has_oob = flags & 0x01 != 0;
        let prefix_bits = ((flags >> 1) & 0x07) + 1;
        let range_bits = ((flags >> 4) & 0x07) + 1;
        let low = i64::from(r.read_i32()?);
        let high = i64::from(r.read_i32()?);
        if low > high {
            return Err(Error::malformed(0, "custom table range inverted"));
        }

        let mut bits = BitReader::new(r.tail());
        let mut lines = Vec::new();
        let mut current = low;
        while current < high {
            let prefix_len = bits.read_bits(prefix_bits)? as u8;
            let range_len = bits.read_bits(range_bits)? as u8;
            if range_len > 32 {
                return Err(Error::malformed(0, "custom table range too wide"));
            }
            lines.push(Line { prefix_len, leaf: Leaf::Value { range_len, low: current } });
            current = current
                .checked_add(1i64 << range_len)
                .ok_or(Error::malformed(0, "custom table range overflow"))?;
        }
        // Lower and upper range lines, then the optional OOB line.
        let prefix_len = bits.read_bits(prefix_bits)? as u8;
        lines.push(Line { prefix_len, leaf: Leaf::Lower { low: low - 1 } });
        let prefix_len = bits.read_bits(prefix_bits)? as u8;
        lines.push(Line { prefix_len, leaf: Leaf::Value { range_len: 32, low: high } });
        if has_oob {
            let prefix_len = bits.read_bits(prefix_bits)? as u8;
            lines.push(Line { prefix_len, leaf: Leaf::Oob });
        }
        Self::assign(&lines)
    }

    /// Build a table from explicit code lengths for the symbol-ID code
    /// assignment of text regions (7.4.3.1.7); index is the decoded
    /// value.
    pub fn from_code_lengths(lengths: &[u8]) -> Result<Self> {
        let lines: Vec<Line> = lengths
            .iter()
            .enumerate()
            .map(|(i, &len)| Line {
                prefix_len: len,
                leaf: Leaf::Value { range_len: 0, low: i as i64 },
            })
            .collect();
        Self::assign(&lines)
    }
}

type Spec = &'static [(u8, u8, i64, u8)];

// Kind codes: 0 normal, 1 lower range, 2 out-of-band.
const TABLE_B1: Spec = &[(1, 4, 0, 0), (2, 8, 16, 0), (3, 16, 272, 0), (3, 32, 65808, 0)];
const TABLE_B2: Spec = &[
    (1, 0, 0, 0),
    (2, 0, 1, 0),
    (3, 0, 2, 0),
    (4, 3, 3, 0),
    (5, 6, 11, 0),
    (6, 32, 75, 0),
    (6, 0, 0, 2),
];
const TABLE_B3: Spec = &[
    (8, 8, -256, 0),
    (1, 0, 0, 0),
    (2, 0, 1, 0),
    (3, 0, 2, 0),
    (4, 3, 3, 0),
    (5, 6, 11, 0),
    (8, 32, -257, 1),
    (7, 32, 75, 0),
    (6, 0, 0, 2),
];
const TABLE_B4: Spec =
    &[(1, 0, 1, 0), (2, 0, 2, 0), (3, 0, 3, 0), (4, 3, 4, 0), (5, 6, 12, 0), (5, 32, 76, 0)];
const TABLE_B5: Spec = &[
    (7, 8, -255, 0),
    (1, 0, 1, 0),
    (2, 0, 2, 0),
    (3, 0, 3, 0),
    (4, 3, 4, 0),
    (5, 6, 12, 0),
    (7, 32, -256, 1),
    (6, 32, 76, 0),
];
const TABLE_B6: Spec = &[
    (5, 10, -2048, 0),
    (4, 9, -1024, 0),
    (4, 8, -512, 0),
    (4, 7, -256, 0),
    (5, 6, -128, 0),
    (5, 5, -64, 0),
    (4, 5, -32, 0),
    (2, 7, 0, 0),
    (3, 7, 128, 0),
    (3, 8, 256, 0),
    (4, 9, 512, 0),
    (4, 10, 1024, 0),
    (6, 32, -2049, 1),
    (6, 32, 2048, 0),
];
const TABLE_B7: Spec = &[
    (4, 9, -1024, 0),
    (3, 8, -512, 0),
    (4, 7, -256, 0),
    (5, 6, -128, 0),
    (5, 5, -64, 0),
    (4, 5, -32, 0),
    (4, 5, 0, 0),
    (5, 5, 32, 0),
    (5, 6, 64, 0),
    (4, 7, 128, 0),
    (3, 8, 256, 0),
    (3, 9, 512, 0),
    (3, 10, 1024, 0),
    (5, 32, -1025, 1),
    (5, 32, 2048, 0),
];
const TABLE_B8: Spec = &[
    (8, 3, -15, 0),
    (9, 1, -7, 0),
    (8, 1, -5, 0),
    (9, 0, -3, 0),
    (7, 0, -2, 0),
    (4, 0, -1, 0),
    (2, 1, 0, 0),
    (5, 0, 2, 0),
    (6, 0, 3, 0),
    (3, 4, 4, 0),
    (6, 1, 20, 0),
    (4, 4, 22, 0),
    (4, 5, 38, 0),
    (5, 6, 70, 0),
    (5, 7, 134, 0),
    (6, 7, 262, 0),
    (7, 8, 390, 0),
    (6, 10, 646, 0),
    (9, 32, -16, 1),
    (9, 32, 1670, 0),
    (2, 0, 0, 2),
];
const TABLE_B9: Spec = &[
    (8, 4, -31, 0),
    (9, 2, -15, 0),
    (8, 2, -11, 0),
    (9, 1, -7, 0),
    (7, 1, -5, 0),
    (4, 1, -3, 0),
    (3, 1, -1, 0),
    (3, 1, 1, 0),
    (5, 1, 3, 0),
    (6, 1, 5, 0),
    (3, 5, 7, 0),
    (6, 2, 39, 0),
    (4, 5, 43, 0),
    (4, 6, 75, 0),
    (5, 7, 139, 0),
    (5, 8, 267, 0),
    (6, 8, 523, 0),
    (7, 9, 779, 0),
    (6, 11, 1291, 0),
    (9, 32, -32, 1),
    (9, 32, 3339, 0),
    (2, 0, 0, 2),
];
const TABLE_B10: Spec = &[
    (7, 4, -21, 0),
    (8, 0, -5, 0),
    (7, 0, -4, 0),
    (5, 0, -3, 0),
    (2, 2, -2, 0),
    (5, 0, 2, 0),
    (6, 0, 3, 0),
    (7, 0, 4, 0),
    (8, 0, 5, 0),
    (2, 6, 6, 0),
    (5, 5, 70, 0),
    (6, 5, 102, 0),
    (7, 6, 134, 0),
    (8, 7, 198, 0),
    (8, 8, 326, 0),
    (8, 9, 582, 0),
    (8, 10, 1094, 0),
    (7, 11, 2118, 0),
    (8, 32, -22, 1),
    (8, 32, 4166, 0),
    (2, 0, 0, 2),
];
const TABLE_B11: Spec = &[
    (1, 0, 1, 0),
    (2, 1, 2, 0),
    (4, 0, 4, 0),
    (4, 1, 5, 0),
    (5, 1, 7, 0),
    (5, 2, 9, 0),
    (6, 2, 13, 0),
    (7, 2, 17, 0),
    (7, 3, 21, 0),
    (7, 4, 29, 0),
    (7, 5, 45, 0),
    (7, 6, 77, 0),
    (7, 32, 141, 0),
];
const TABLE_B12: Spec = &[
    (1, 0, 1, 0),
    (2, 0, 2, 0),
    (3, 1, 3, 0),
    (5, 0, 5, 0),
    (5, 1, 6, 0),
    (6, 1, 8, 0),
    (7, 0, 10, 0),
    (7, 1, 11, 0),
    (7, 2, 13, 0),
    (7, 3, 17, 0),
    (7, 4, 25, 0),
    (8, 5, 41, 0),
    (8, 32, 73, 0),
];
const TABLE_B13: Spec = &[
    (1, 0, 1, 0),
    (3, 0, 2, 0),
    (4, 0, 3, 0),
    (5, 0, 4, 0),
    (4, 1, 5, 0),
    (3, 3, 7, 0),
    (6, 1, 15, 0),
    (6, 2, 17, 0),
    (6, 3, 21, 0),
    (6, 4, 29, 0),
    (6, 5, 45, 0),
    (7, 6, 77, 0),
    (7, 32, 141, 0),
];
const TABLE_B14: Spec =
    &[(3, 0, -2, 0), (3, 0, -1, 0), (1, 0, 0, 0), (3, 0, 1, 0), (3, 0, 2, 0)];
const TABLE_B15: Spec = &[
    (7, 4, -24, 0),
    (6, 2, -8, 0),
    (5, 1, -4, 0),
    (4, 0, -2, 0),
    (3, 0, -1, 0),
    (1, 0, 0, 0),
    (3, 0, 1, 0),
    (4, 0, 2, 0),
    (5, 1, 3, 0),
    (6, 2, 5, 0),
    (7, 4, 9, 0),
    (7, 32, -25, 1),
    (7, 32, 25, 0),
];

/// The fifteen standard tables, built once per decode.
pub struct StandardTables {
    tables: Vec<HuffmanTable>,
}

impl StandardTables {
    pub fn new() -> Self {
        let specs: [Spec; 15] = [
            TABLE_B1, TABLE_B2, TABLE_B3, TABLE_B4, TABLE_B5, TABLE_B6, TABLE_B7, TABLE_B8,
            TABLE_B9, TABLE_B10, TABLE_B11, TABLE_B12, TABLE_B13, TABLE_B14, TABLE_B15,
        ];
        Self { tables: specs.iter().map(|s| HuffmanTable::from_spec(s)).collect() }
    }

    /// Standard table B.`n` (1-based, as the standard numbers them).
    pub fn get(&self, n: usize) -> &HuffmanTable {
        &self.tables[n - 1]
    }
}

impl Default for StandardTables {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bits_of(data: &[u8]) -> BitReader<'_> {
        BitReader::new(data)
    }

    #[test]
    fn table_b1_decodes_ranges() {
        let std = StandardTables::new();
        let b1 = std.get(1);
        // Code 0 + 4 range bits: value = bits.
        let mut bits = bits_of(&[0b0_0011_000]);
        assert_eq!(b1.decode(&mut bits).unwrap(), Some(3));
        // Code 10 + 8 range bits of 1: value = 16 + 1.
        let mut bits = bits_of(&[0b10_000000, 0b01_000000]);
        assert_eq!(b1.decode(&mut bits).unwrap(), Some(17));
    }

    #[test]
    fn table_b2_has_oob() {
        let std = StandardTables::new();
        let b2 = std.get(2);
        let mut bits = bits_of(&[0b111111_00]);
        assert_eq!(b2.decode(&mut bits).unwrap(), None);
        let mut bits = bits_of(&[0b0_0000000]);
        assert_eq!(b2.decode(&mut bits).unwrap(), Some(0));
        // 1110 + 3 bits of 5 -> 3 + 5.
        let mut bits = bits_of(&[0b1110_101_0]);
        assert_eq!(b2.decode(&mut bits).unwrap(), Some(8));
    }

    #[test]
    fn table_b14_is_centered() {
        let std = StandardTables::new();
        let b14 = std.get(14);
        // Lengths (3,3,1,3,3): canonical codes 100,101,0,110,111.
        let cases = [(0b0_0000000u8, 0i64), (0b100_00000, -2), (0b111_00000, 2)];
        for (byte, expected) in cases {
            let data = [byte];
            let mut bits = bits_of(&data);
            assert_eq!(b14.decode(&mut bits).unwrap(), Some(expected));
        }
    }

    #[test]
    fn lower_range_subtracts() {
        let std = StandardTables::new();
        let b3 = std.get(3);
        // Table B.3 lower-range prefix has length 8; canonical order puts
        // it after the length-8 value line, so its code is 0xFF. A 32-bit
        // offset of 2 gives -257 - 2.
        let mut bits = bits_of(&[0xFF, 0, 0, 0, 2]);
        assert_eq!(b3.decode(&mut bits).unwrap(), Some(-259));
    }

    #[test]
    fn custom_table_roundtrip() {
        // HTOOB=0, HTPS=2, HTRS=2, range [0, 8): two lines covering
        // [0,4) and [4,8), then lower/upper lines.
        let mut seg = vec![(1u8 << 1) | (1 << 4)];
        seg.extend_from_slice(&0i32.to_be_bytes());
        seg.extend_from_slice(&8i32.to_be_bytes());
        // Bit stream: lines (prefix_len=1, range_len=2), (2, 2), lower
        // (3), upper (3). Nibbles: 01 10, 10 10, 11, 11.
        seg.extend_from_slice(&[0b01_10_10_10, 0b11_11_0000]);
        let table = HuffmanTable::from_tables_segment(&seg).unwrap();
        // Code 0 + 2 bits -> values 0..4.
        let mut bits = bits_of(&[0b0_11_00000]);
        assert_eq!(table.decode(&mut bits).unwrap(), Some(3));
        // Code 10 + 2 bits -> values 4..8.
        let mut bits = bits_of(&[0b10_01_0000]);
        assert_eq!(table.decode(&mut bits).unwrap(), Some(5));
    }

    #[test]
    fn code_length_tables_for_symbol_ids() {
        let table = HuffmanTable::from_code_lengths(&[1, 2, 2]).unwrap();
        let mut bits = bits_of(&[0b0_10_11_000]);
        assert_eq!(table.decode(&mut bits).unwrap(), Some(0));
        assert_eq!(table.decode(&mut bits).unwrap(), Some(1));
        assert_eq!(table.decode(&mut bits).unwrap(), Some(2));
    }
}
