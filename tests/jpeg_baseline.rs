//! End-to-end baseline JPEG decoding over hand-assembled streams using
//! the standard Annex K tables.

use rasterdec::jpeg;

const DC_COUNTS: [u8; 16] = [0, 1, 5, 1, 1, 1, 1, 1, 1, 0, 0, 0, 0, 0, 0, 0];
const DC_VALUES: [u8; 12] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11];

const AC_COUNTS: [u8; 16] = [0, 2, 1, 3, 3, 2, 4, 3, 5, 5, 4, 4, 0, 0, 1, 125];
const AC_VALUES: [u8; 162] = [
    0x01, 0x02, 0x03, 0x00, 0x04, 0x11, 0x05, 0x12, 0x21, 0x31, 0x41, 0x06, 0x13, 0x51, 0x61,
    0x07, 0x22, 0x71, 0x14, 0x32, 0x81, 0x91, 0xA1, 0x08, 0x23, 0x42, 0xB1, 0xC1, 0x15, 0x52,
    0xD1, 0xF0, 0x24, 0x33, 0x62, 0x72, 0x82, 0x09, 0x0A, 0x16, 0x17, 0x18, 0x19, 0x1A, 0x25,
    0x26, 0x27, 0x28, 0x29, 0x2A, 0x34, 0x35, 0x36, 0x37, 0x38, 0x39, 0x3A, 0x43, 0x44, 0x45,
    0x46, 0x47, 0x48, 0x49, 0x4A, 0x53, 0x54, 0x55, 0x56, 0x57, 0x58, 0x59, 0x5A, 0x63, 0x64,
    0x65, 0x66, 0x67, 0x68, 0x69, 0x6A, 0x73, 0x74, 0x75, 0x76, 0x77, 0x78, 0x79, 0x7A, 0x83,
    0x84, 0x85, 0x86, 0x87, 0x88, 0x89, 0x8A, 0x92, 0x93, 0x94, 0x95, 0x96, 0x97, 0x98, 0x99,
    0x9A, 0xA2, 0xA3, 0xA4, 0xA5, 0xA6, 0xA7, 0xA8, 0xA9, 0xAA, 0xB2, 0xB3, 0xB4, 0xB5, 0xB6,
    0xB7, 0xB8, 0xB9, 0xBA, 0xC2, 0xC3, 0xC4, 0xC5, 0xC6, 0xC7, 0xC8, 0xC9, 0xCA, 0xD2, 0xD3,
    0xD4, 0xD5, 0xD6, 0xD7, 0xD8, 0xD9, 0xDA, 0xE1, 0xE2, 0xE3, 0xE4, 0xE5, 0xE6, 0xE7, 0xE8,
    0xE9, 0xEA, 0xF1, 0xF2, 0xF3, 0xF4, 0xF5, 0xF6, 0xF7, 0xF8, 0xF9, 0xFA,
];

struct JpegBuilder {
    data: Vec<u8>,
}

impl JpegBuilder {
    fn new() -> Self {
        Self { data: vec![0xFF, 0xD8] }
    }

    fn unit_quant_table(mut self) -> Self {
        self.data.extend_from_slice(&[0xFF, 0xDB, 0x00, 0x43, 0x00]);
        self.data.extend(std::iter::repeat(1u8).take(64));
        self
    }

    fn frame(mut self, width: u16, height: u16, components: &[(u8, u8)]) -> Self {
        let len = 2 + 6 + 3 * components.len() as u16;
        self.data.extend_from_slice(&[0xFF, 0xC0]);
        self.data.extend_from_slice(&len.to_be_bytes());
        self.data.push(8);
        self.data.extend_from_slice(&height.to_be_bytes());
        self.data.extend_from_slice(&width.to_be_bytes());
        self.data.push(components.len() as u8);
        for &(id, hv) in components {
            self.data.extend_from_slice(&[id, hv, 0]);
        }
        self
    }

    fn standard_tables(mut self) -> Self {
        self.data.extend_from_slice(&[0xFF, 0xC4, 0x00, 0x1F, 0x00]);
        self.data.extend_from_slice(&DC_COUNTS);
        self.data.extend_from_slice(&DC_VALUES);
        self.data.extend_from_slice(&[0xFF, 0xC4, 0x00, 0xB5, 0x10]);
        self.data.extend_from_slice(&AC_COUNTS);
        self.data.extend_from_slice(&AC_VALUES);
        self
    }

    fn restart_interval(mut self, interval: u16) -> Self {
        self.data.extend_from_slice(&[0xFF, 0xDD, 0x00, 0x04]);
        self.data.extend_from_slice(&interval.to_be_bytes());
        self
    }

    fn scan(mut self, component_ids: &[u8], entropy: &[u8]) -> Self {
        let len = 2 + 1 + 2 * component_ids.len() as u16 + 3;
        self.data.extend_from_slice(&[0xFF, 0xDA]);
        self.data.extend_from_slice(&len.to_be_bytes());
        self.data.push(component_ids.len() as u8);
        for &id in component_ids {
            self.data.extend_from_slice(&[id, 0x00]);
        }
        self.data.extend_from_slice(&[0, 63, 0]);
        self.data.extend_from_slice(entropy);
        self
    }

    fn finish(mut self) -> Vec<u8> {
        self.data.extend_from_slice(&[0xFF, 0xD9]);
        self.data
    }
}

/// An all-zero block: DC category 0 ("00") then end-of-block ("1010"),
/// padded with 1-bits.
const ZERO_BLOCK: u8 = 0b0010_1011;

#[test]
fn solid_gray_8x8() {
    let data = JpegBuilder::new()
        .unit_quant_table()
        .frame(8, 8, &[(1, 0x11)])
        .standard_tables()
        .scan(&[1], &[ZERO_BLOCK])
        .finish();
    let image = jpeg::decode(&data).unwrap();
    assert_eq!((image.width, image.height, image.channels), (8, 8, 1));
    assert_eq!(image.pixels.len(), 64);
    assert!(image.pixels.iter().all(|&p| p == 128), "{:?}", &image.pixels[..8]);
}

#[test]
fn solid_gray_rgb_output() {
    // Three zero blocks (Y, Cb, Cr) interleaved in one 4:4:4 MCU:
    // "001010" three times, padded with 1-bits.
    let entropy = [0b0010_1000, 0b1010_0010, 0b1011_1111];
    let data = JpegBuilder::new()
        .unit_quant_table()
        .frame(8, 8, &[(1, 0x11), (2, 0x11), (3, 0x11)])
        .standard_tables()
        .scan(&[1, 2, 3], &entropy)
        .finish();
    let image = jpeg::decode(&data).unwrap();
    assert_eq!(image.channels, 3);
    assert_eq!(image.pixels.len(), 192);
    assert!(image
        .pixels
        .iter()
        .all(|&p| (i32::from(p) - 128).abs() <= 1));
}

#[test]
fn solid_red_4_4_4() {
    // DC-only blocks: Y = -414, Cb = -344, Cr = 1020 (quantizer 1),
    // which reconstruct pure red after colour conversion.
    // Y: category 9 ("1111110") + 001100001, EOB.
    // Cb: category 9 + 010100111, EOB.
    // Cr: category 10 ("11111110") + 1111111100, EOB.
    let mut bits = String::new();
    bits.push_str("1111110");
    bits.push_str("001100001");
    bits.push_str("1010");
    bits.push_str("1111110");
    bits.push_str("010100111");
    bits.push_str("1010");
    bits.push_str("11111110");
    bits.push_str("1111111100");
    bits.push_str("1010");
    let entropy = pack_bits(&bits);
    let data = JpegBuilder::new()
        .unit_quant_table()
        .frame(8, 8, &[(1, 0x11), (2, 0x11), (3, 0x11)])
        .standard_tables()
        .scan(&[1, 2, 3], &entropy)
        .finish();
    let image = jpeg::decode(&data).unwrap();
    let (r, g, b) = (image.pixels[0], image.pixels[1], image.pixels[2]);
    assert!(r > 200, "r = {r}");
    assert!(g < 80, "g = {g}");
    assert!(b < 80, "b = {b}");
}

#[test]
fn non_aligned_7x7() {
    // The frame is 7x7: one padded block, output cropped to 7x7.
    let data = JpegBuilder::new()
        .unit_quant_table()
        .frame(7, 7, &[(1, 0x11)])
        .standard_tables()
        .scan(&[1], &[ZERO_BLOCK])
        .finish();
    let image = jpeg::decode(&data).unwrap();
    assert_eq!((image.width, image.height), (7, 7));
    assert_eq!(image.pixels.len(), 49);
    assert!(image.pixels.iter().all(|&p| p == 128));
}

#[test]
fn restart_markers_reset_predictors() {
    // 16x16 grayscale, four blocks. With DRI = 2 a RST0 separates the
    // two halves; the output must match the marker-free encoding.
    let half = [0b0010_1000, 0b1010_1111]; // two zero blocks, padded
    let mut entropy = Vec::new();
    entropy.extend_from_slice(&half);
    entropy.extend_from_slice(&[0xFF, 0xD0]);
    entropy.extend_from_slice(&half);

    let with_restarts = JpegBuilder::new()
        .unit_quant_table()
        .frame(16, 16, &[(1, 0x11)])
        .standard_tables()
        .restart_interval(2)
        .scan(&[1], &entropy)
        .finish();

    let no_markers = [0b0010_1000, 0b1010_0010, 0b1000_1010];
    let plain = JpegBuilder::new()
        .unit_quant_table()
        .frame(16, 16, &[(1, 0x11)])
        .standard_tables()
        .scan(&[1], &no_markers)
        .finish();

    let a = jpeg::decode(&with_restarts).unwrap();
    let b = jpeg::decode(&plain).unwrap();
    assert_eq!(a.pixels, b.pixels);
    assert!(a.pixels.iter().all(|&p| p == 128));
}

#[test]
fn byte_stuffing_in_entropy_data() {
    // DC = 511: category 9 ("1111110") with extra bits 111111111 lines
    // the second entropy byte up as 0xFF, so the encoder stuffs a 0x00.
    // Every pixel reconstructs to round(511 / 8) + 128 = 192.
    let entropy = [0xFD, 0xFF, 0x00, 0xAF];
    let data = JpegBuilder::new()
        .unit_quant_table()
        .frame(8, 8, &[(1, 0x11)])
        .standard_tables()
        .scan(&[1], &entropy)
        .finish();
    let image = jpeg::decode(&data).unwrap();
    assert!(image.pixels.iter().all(|&p| p == 192), "{:?}", &image.pixels[..8]);
}

#[test]
fn determinism() {
    let data = JpegBuilder::new()
        .unit_quant_table()
        .frame(8, 8, &[(1, 0x11)])
        .standard_tables()
        .scan(&[1], &[ZERO_BLOCK])
        .finish();
    let a = jpeg::decode(&data).unwrap();
    let b = jpeg::decode(&data).unwrap();
    assert_eq!(a.pixels, b.pixels);
}

/// Pack an entropy bit string the way an encoder would: pad the final
/// byte with 1-bits and stuff a 0x00 after any 0xFF.
fn pack_bits(bits: &str) -> Vec<u8> {
    let mut out = Vec::new();
    let mut push = |byte: u8, out: &mut Vec<u8>| {
        out.push(byte);
        if byte == 0xFF {
            out.push(0x00);
        }
    };
    let mut acc = 0u8;
    let mut count = 0;
    for c in bits.chars() {
        acc = (acc << 1) | (c == '1') as u8;
        count += 1;
        if count == 8 {
            push(acc, &mut out);
            acc = 0;
            count = 0;
        }
    }
    if count > 0 {
        push((acc << (8 - count)) | ((1 << (8 - count)) - 1), &mut out);
    }
    out
}
