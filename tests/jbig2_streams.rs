//! End-to-end JBIG2 decoding over hand-assembled files: an MMR generic
//! region, and a Huffman-coded symbol dictionary driving a text region.

use rasterdec::jbig2;

/// MSB-first bit accumulator for hand-assembling coded segments.
#[derive(Default)]
struct BitWriter {
    bytes: Vec<u8>,
    acc: u8,
    count: u8,
}

impl BitWriter {
    fn push_bits(&mut self, bits: &str) {
        for c in bits.chars() {
            match c {
                '0' | '1' => {
                    self.acc = (self.acc << 1) | (c == '1') as u8;
                    self.count += 1;
                    if self.count == 8 {
                        self.bytes.push(self.acc);
                        self.acc = 0;
                        self.count = 0;
                    }
                }
                _ => {}
            }
        }
    }

    fn push_value(&mut self, value: u32, width: u8) {
        for i in (0..width).rev() {
            self.push_bits(if value >> i & 1 == 1 { "1" } else { "0" });
        }
    }

    fn align(&mut self) {
        while self.count != 0 {
            self.push_bits("0");
        }
    }

    fn push_byte(&mut self, byte: u8) {
        assert_eq!(self.count, 0);
        self.bytes.push(byte);
    }

    fn finish(mut self) -> Vec<u8> {
        self.align();
        self.bytes
    }
}

/// Segment header with a 1-byte page association.
fn segment_header(number: u32, seg_type: u8, referred: &[u8], page: u8, len: u32) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&number.to_be_bytes());
    out.push(seg_type);
    assert!(referred.len() <= 4);
    out.push((referred.len() as u8) << 5);
    out.extend_from_slice(referred);
    out.push(page);
    out.extend_from_slice(&len.to_be_bytes());
    out
}

fn page_info(width: u32, height: u32) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&width.to_be_bytes());
    out.extend_from_slice(&height.to_be_bytes());
    out.extend_from_slice(&[0; 8]); // resolution
    out.push(0); // flags
    out.extend_from_slice(&[0, 0]); // striping
    out
}

fn file_header() -> Vec<u8> {
    let mut out = vec![0x97, 0x4A, 0x42, 0x32, 0x0D, 0x0A, 0x1A, 0x0A];
    out.push(0x01); // sequential, page count known
    out.extend_from_slice(&1u32.to_be_bytes());
    out
}

fn region_info(width: u32, height: u32, x: u32, y: u32) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&width.to_be_bytes());
    out.extend_from_slice(&height.to_be_bytes());
    out.extend_from_slice(&x.to_be_bytes());
    out.extend_from_slice(&y.to_be_bytes());
    out.push(0); // combine with OR
    out
}

#[test]
fn mmr_generic_region_all_white() {
    // An 8x1 all-white MMR region: one V0 code covers the line.
    let mut file = file_header();

    let info = page_info(8, 1);
    file.extend(segment_header(0, 48, &[], 1, info.len() as u32));
    file.extend(info);

    let mut region = region_info(8, 1, 0, 0);
    region.push(0x01); // generic flags: MMR
    region.push(0x80); // V0
    file.extend(segment_header(1, 38, &[], 1, region.len() as u32));
    file.extend(region);

    file.extend(segment_header(2, 49, &[], 1, 0)); // end of page

    let page = jbig2::decode(&file).unwrap();
    assert_eq!((page.width, page.height), (8, 1));
    assert_eq!(page.data, vec![0x00]);
}

#[test]
fn mmr_generic_region_pattern() {
    // 16x2: row one is 10 white then 6 black via horizontal mode; row
    // two copies it with a single V0 pair.
    let mut file = file_header();

    let info = page_info(16, 2);
    file.extend(segment_header(0, 48, &[], 1, info.len() as u32));
    file.extend(info);

    let mut coded = BitWriter::default();
    coded.push_bits("001"); // horizontal
    coded.push_bits("00111"); // white run 10
    coded.push_bits("0010"); // black run 6
    coded.push_bits("1"); // V0
    coded.push_bits("1"); // V0
    let mut region = region_info(16, 2, 0, 0);
    region.push(0x01);
    region.extend(coded.finish());
    file.extend(segment_header(1, 38, &[], 1, region.len() as u32));
    file.extend(region);

    file.extend(segment_header(2, 49, &[], 1, 0));

    let page = jbig2::decode(&file).unwrap();
    assert_eq!(page.data, vec![0b0000_0000, 0b0011_1111, 0b0000_0000, 0b0011_1111]);
}

/// Builds the Huffman symbol dictionary of three 2x2 solid symbols and a
/// text region placing them side by side.
#[test]
fn huffman_symbols_concatenate_in_text_region() {
    let mut file = file_header();

    let info = page_info(6, 2);
    file.extend(segment_header(0, 48, &[], 1, info.len() as u32));
    file.extend(info);

    // Symbol dictionary: SDHUFF, all standard tables, 3 new symbols of
    // height 2 and widths 2, 2, 2 in one height class, all exported.
    let mut dict = Vec::new();
    dict.extend_from_slice(&0x0001u16.to_be_bytes()); // flags
    dict.extend_from_slice(&3u32.to_be_bytes()); // exported
    dict.extend_from_slice(&3u32.to_be_bytes()); // new
    let mut bits = BitWriter::default();
    bits.push_bits("10"); // delta height = 2 (table B.4)
    bits.push_bits("110"); // delta width = 2 (table B.2)
    bits.push_bits("0"); // delta width = 0
    bits.push_bits("0"); // delta width = 0
    bits.push_bits("111111"); // OOB ends the height class
    bits.push_bits("0 0000"); // BMSIZE = 0 (table B.1): uncompressed
    bits.align();
    bits.push_byte(0xFC); // collective bitmap, 6 set bits per row
    bits.push_byte(0xFC);
    bits.push_bits("0 0000"); // export run 0 (skip none)
    bits.push_bits("0 0011"); // export run 3 (export all)
    dict.extend(bits.finish());
    file.extend(segment_header(1, 0, &[], 1, dict.len() as u32));
    file.extend(dict);

    // Text region referring to the dictionary: 3 instances side by side,
    // reference corner top-left.
    let mut region = region_info(6, 2, 0, 0);
    region.extend_from_slice(&0x0011u16.to_be_bytes()); // SBHUFF, TOPLEFT
    region.extend_from_slice(&0x0000u16.to_be_bytes()); // standard tables
    region.extend_from_slice(&3u32.to_be_bytes()); // instances
    let mut bits = BitWriter::default();
    // Symbol ID code lengths: run codes 1 and 2 get prefix lengths 1 and
    // 2, then the lengths 1, 2, 2 for the three symbols.
    for i in 0..35u32 {
        let len = match i {
            1 => 1u32,
            2 => 2,
            _ => 0,
        };
        bits.push_value(len, 4);
    }
    bits.push_bits("0"); // symbol 0: length 1
    bits.push_bits("10"); // symbol 1: length 2
    bits.push_bits("10"); // symbol 2: length 2
    bits.align(); // symbol ID table ends byte aligned
    bits.push_bits("0"); // initial DT = 1 (table B.11): STRIPT = -1
    bits.push_bits("0"); // strip DT = 1: STRIPT = 0
    bits.push_bits("00 0000000"); // first S = 0 (table B.6)
    bits.push_bits("0"); // symbol 0
    bits.push_bits("00 1"); // IDS = 1 (table B.8)
    bits.push_bits("10"); // symbol 1
    bits.push_bits("00 1"); // IDS = 1
    bits.push_bits("11"); // symbol 2
    bits.push_bits("01"); // OOB: end of strip
    region.extend(bits.finish());
    file.extend(segment_header(2, 6, &[1], 1, region.len() as u32));
    file.extend(region);

    file.extend(segment_header(3, 49, &[], 1, 0));

    let page = jbig2::decode(&file).unwrap();
    assert_eq!((page.width, page.height), (6, 2));
    // Three 2x2 black squares concatenate into a solid 6x2 row pair.
    assert_eq!(page.data, vec![0xFC, 0xFC]);
}

#[test]
fn embedded_stream_with_global_dictionary() {
    // The same dictionary/text split, but the dictionary travels in a
    // globals stream (page 0), as PDF embeds it.
    let mut globals = Vec::new();
    let mut dict = Vec::new();
    dict.extend_from_slice(&0x0001u16.to_be_bytes());
    dict.extend_from_slice(&1u32.to_be_bytes());
    dict.extend_from_slice(&1u32.to_be_bytes());
    let mut bits = BitWriter::default();
    bits.push_bits("10"); // height 2
    bits.push_bits("110"); // width 2
    bits.push_bits("111111"); // OOB
    bits.push_bits("0 0000"); // BMSIZE = 0
    bits.align();
    bits.push_byte(0xC0);
    bits.push_byte(0xC0);
    bits.push_bits("0 0000"); // run 0
    bits.push_bits("0 0001"); // run 1: export the symbol
    dict.extend(bits.finish());
    globals.extend(segment_header(1, 0, &[], 0, dict.len() as u32));
    globals.extend(dict);

    let mut data = Vec::new();
    let info = page_info(2, 2);
    data.extend(segment_header(2, 48, &[], 1, info.len() as u32));
    data.extend(info);

    let mut region = region_info(2, 2, 0, 0);
    region.extend_from_slice(&0x0011u16.to_be_bytes());
    region.extend_from_slice(&0x0000u16.to_be_bytes());
    region.extend_from_slice(&1u32.to_be_bytes());
    let mut bits = BitWriter::default();
    for i in 0..35u32 {
        bits.push_value(u32::from(i == 1), 4);
    }
    bits.push_bits("0"); // single symbol: length 1
    bits.align();
    bits.push_bits("0"); // initial DT = 1
    bits.push_bits("0"); // strip DT = 1
    bits.push_bits("00 0000000"); // FS = 0
    bits.push_bits("0"); // symbol 0
    bits.push_bits("01"); // OOB
    region.extend(bits.finish());
    data.extend(segment_header(3, 6, &[1], 1, region.len() as u32));
    data.extend(region);

    let page =
        jbig2::decode_embedded(&data, Some(&globals), &jbig2::Limits::default()).unwrap();
    assert_eq!((page.width, page.height), (2, 2));
    assert_eq!(page.data, vec![0xC0, 0xC0]);
}
