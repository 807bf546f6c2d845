//! Canonical Huffman tables for the baseline entropy decoder.
//!
//! Codes are assigned per ITU-T T.81 Annex C: starting from zero at length
//! one, each length's codes are handed out in symbol-list order, then the
//! running code doubles. Decoding uses a flat 256-entry lookup for codes of
//! up to eight bits and the canonical `min_code`/`max_code` walk for the
//! rest.

use crate::error::{Error, Result};
use crate::jpeg::bitreader::JpegBitReader;

#[derive(Clone, Copy, Default, Debug)]
struct LutEntry {
    symbol: u8,
    /// Code length in bits; 0 marks a code longer than 8 bits (or invalid).
    len: u8,
}

#[derive(Clone, Debug)]
pub struct HuffmanTable {
    lut: [LutEntry; 256],
    min_code: [i32; 17],
    max_code: [i32; 17],
    val_ptr: [i32; 17],
    values: Vec<u8>,
}

impl HuffmanTable {
    /// Build a table from the DHT `counts[1..=16]` and flat symbol list.
    pub fn build(counts: &[u8; 16], values: &[u8]) -> std::result::Result<Self, &'static str> {
        let mut table = Self {
            lut: [LutEntry::default(); 256],
            min_code: [0; 17],
            max_code: [-1; 17],
            val_ptr: [0; 17],
            values: values.to_vec(),
        };

        let mut code: i32 = 0;
        let mut k: usize = 0;
        for length in 1..=16usize {
            let n = counts[length - 1] as usize;
            table.min_code[length] = code;
            table.val_ptr[length] = k as i32;
            if n > 0 {
                if k + n > values.len() {
                    return Err("Huffman counts exceed symbol list");
                }
                if code + n as i32 > (1 << length) {
                    return Err("oversubscribed Huffman code lengths");
                }
                for _ in 0..n {
                    if length <= 8 {
                        // Every 8-bit pattern with this code as prefix maps
                        // to the symbol.
                        let first = (code as usize) << (8 - length);
                        let span = 1usize << (8 - length);
                        for slot in &mut table.lut[first..first + span] {
                            *slot = LutEntry { symbol: values[k], len: length as u8 };
                        }
                    }
                    code += 1;
                    k += 1;
                }
                table.max_code[length] = code - 1;
            }
            code <<= 1;
        }
        if k != values.len() {
            return Err("Huffman counts do not match symbol list");
        }
        Ok(table)
    }

    /// Decode the next symbol from the bit stream.
    pub fn decode(&self, bits: &mut JpegBitReader<'_>) -> Result<u8> {
        let peek = bits.peek8();
        let entry = self.lut[peek as usize];
        if entry.len != 0 {
            bits.consume(entry.len)?;
            return Ok(entry.symbol);
        }
        // Longer than 8 bits: consume the peeked byte and extend.
        let mut code = i32::from(peek);
        bits.consume(8)?;
        for length in 9..=16usize {
            code = (code << 1) | bits.read_bit()? as i32;
            if self.max_code[length] >= 0 && code <= self.max_code[length] {
                let index = self.val_ptr[length] + (code - self.min_code[length]);
                return Ok(self.values[index as usize]);
            }
        }
        Err(Error::Huffman { offset: bits.offset() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The standard luminance DC table from T.81 Annex K.
    const DC_COUNTS: [u8; 16] = [0, 1, 5, 1, 1, 1, 1, 1, 1, 0, 0, 0, 0, 0, 0, 0];
    const DC_VALUES: [u8; 12] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11];

    #[test]
    fn canonical_assignment_matches_annex_k() {
        let table = HuffmanTable::build(&DC_COUNTS, &DC_VALUES).unwrap();
        // Symbol 0 gets the single length-2 code 00, symbol 5 the last
        // length-3 code 110, symbol 6 the length-4 code 1110.
        let data = [0b0011_0111, 0b0000_0000];
        let mut bits = JpegBitReader::new(&data);
        assert_eq!(table.decode(&mut bits).unwrap(), 0);
        assert_eq!(table.decode(&mut bits).unwrap(), 5);
        assert_eq!(table.decode(&mut bits).unwrap(), 6);
    }

    #[test]
    fn oversubscribed_lengths_are_rejected() {
        let mut counts = [0u8; 16];
        counts[0] = 3; // three codes of length 1 cannot exist
        let err = HuffmanTable::build(&counts, &[1, 2, 3]).unwrap_err();
        assert!(err.contains("oversubscribed"));
    }

    #[test]
    fn count_symbol_mismatch_is_rejected() {
        let mut counts = [0u8; 16];
        counts[1] = 1;
        assert!(HuffmanTable::build(&counts, &[7, 8]).is_err());
    }

    #[test]
    fn no_match_reports_huffman_error() {
        // Table holding a single 1-bit code for symbol 9; an input of all
        // ones never matches.
        let mut counts = [0u8; 16];
        counts[0] = 1;
        let table = HuffmanTable::build(&counts, &[9]).unwrap();
        let data = [0xFF; 4];
        let mut bits = JpegBitReader::new(&data);
        assert!(matches!(table.decode(&mut bits), Err(Error::Huffman { .. })));
    }
}
