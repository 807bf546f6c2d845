//! End-to-end JPEG 2000 decoding over hand-assembled codestreams,
//! including a packet whose code-block payload is the worked example of
//! ISO/IEC 15444-1 Annex J.10.4.

use rasterdec::jpeg2000;

struct CodestreamBuilder {
    data: Vec<u8>,
}

impl CodestreamBuilder {
    fn new() -> Self {
        Self { data: vec![0xFF, 0x4F] }
    }

    /// Single tile covering the whole image, one 8-bit unsigned
    /// component.
    fn siz(mut self, width: u32, height: u32) -> Self {
        self.data.extend_from_slice(&[0xFF, 0x51, 0x00, 0x29, 0x00, 0x00]);
        for value in [width, height, 0, 0, width, height, 0, 0] {
            self.data.extend_from_slice(&value.to_be_bytes());
        }
        self.data.extend_from_slice(&[0x00, 0x01, 0x07, 0x01, 0x01]);
        self
    }

    /// LRCP, one layer, no MCT, 5/3 kernel, 64x64 code-blocks.
    fn cod(mut self, levels: u8) -> Self {
        self.data.extend_from_slice(&[
            0xFF, 0x52, 0x00, 0x0C, 0x00, 0x00, 0x00, 0x01, 0x00, levels, 0x04, 0x04, 0x00, 0x01,
        ]);
        self
    }

    /// Reversible quantization: guard bits and one exponent per
    /// sub-band.
    fn qcd(mut self, guard: u8, exponents: &[u8]) -> Self {
        let len = 3 + exponents.len() as u16;
        self.data.extend_from_slice(&[0xFF, 0x5C]);
        self.data.extend_from_slice(&len.to_be_bytes());
        self.data.push(guard << 5);
        for &e in exponents {
            self.data.push(e << 3);
        }
        self
    }

    fn tile(mut self, body: &[u8]) -> Self {
        let psot = 12 + 2 + body.len() as u32;
        self.data.extend_from_slice(&[0xFF, 0x90, 0x00, 0x0A, 0x00, 0x00]);
        self.data.extend_from_slice(&psot.to_be_bytes());
        self.data.extend_from_slice(&[0x00, 0x01, 0xFF, 0x93]);
        self.data.extend_from_slice(body);
        self
    }

    fn finish(mut self) -> Vec<u8> {
        self.data.extend_from_slice(&[0xFF, 0xD9]);
        self.data
    }
}

#[test]
fn empty_packet_decodes_to_midgray() {
    // No code-block contributes anything: every coefficient is zero and
    // the DC level shift leaves a flat 128 image.
    let data = CodestreamBuilder::new()
        .siz(8, 8)
        .cod(0)
        .qcd(2, &[8])
        .tile(&[0x00])
        .finish();
    let image = jpeg2000::decode(&data).unwrap();
    assert_eq!((image.width, image.height, image.channels), (8, 8, 1));
    assert_eq!(image.pixels.len(), 64);
    assert!(image.pixels.iter().all(|&p| p == 128));
}

#[test]
fn empty_packets_with_decomposition_levels() {
    // Two decomposition levels mean three packets (one per resolution),
    // all empty.
    let data = CodestreamBuilder::new()
        .siz(16, 16)
        .cod(2)
        .qcd(2, &[8, 8, 8, 8, 8, 8, 8])
        .tile(&[0x00, 0x00, 0x00])
        .finish();
    let image = jpeg2000::decode(&data).unwrap();
    assert_eq!(image.pixels.len(), 256);
    assert!(image.pixels.iter().all(|&p| p == 128));
}

#[test]
fn annex_j_code_block_end_to_end() {
    // A 1x5 image whose single LL code-block carries the Annex J.10.4
    // example: coefficients -26, -22, -30, -32, -19; with the 128 level
    // shift the samples are 102, 106, 98, 96, 109.
    //
    // Packet header: non-empty (1), inclusion (1), zero bit-planes (1),
    // 16 passes (1111 01010), Lblock unchanged (0), 7 length bits
    // 0000110; aligned that is FE A0 60.
    let mut body = vec![0xFE, 0xA0, 0x60];
    body.extend_from_slice(&[0x01, 0x8F, 0x0D, 0xC8, 0x75, 0x5D]);
    let data = CodestreamBuilder::new()
        .siz(1, 5)
        .cod(0)
        .qcd(2, &[5])
        .tile(&body)
        .finish();
    let image = jpeg2000::decode(&data).unwrap();
    assert_eq!((image.width, image.height), (1, 5));
    assert_eq!(image.pixels, vec![102, 106, 98, 96, 109]);
}

#[test]
fn jp2_container_roundtrip() {
    fn jp2_box(kind: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        let mut v = Vec::new();
        v.extend_from_slice(&((payload.len() as u32) + 8).to_be_bytes());
        v.extend_from_slice(kind);
        v.extend_from_slice(payload);
        v
    }

    let codestream = CodestreamBuilder::new()
        .siz(8, 8)
        .cod(0)
        .qcd(2, &[8])
        .tile(&[0x00])
        .finish();

    let mut file = b"\x00\x00\x00\x0CjP  \r\n\x87\n".to_vec();
    file.extend(jp2_box(b"ftyp", b"jp2 \x00\x00\x00\x00jp2 "));
    let mut ihdr = Vec::new();
    ihdr.extend_from_slice(&8u32.to_be_bytes());
    ihdr.extend_from_slice(&8u32.to_be_bytes());
    ihdr.extend_from_slice(&1u16.to_be_bytes());
    ihdr.extend_from_slice(&[7, 7, 0, 0]);
    let mut jp2h = jp2_box(b"ihdr", &ihdr);
    let mut colr = vec![1u8, 0, 0];
    colr.extend_from_slice(&17u32.to_be_bytes());
    jp2h.extend(jp2_box(b"colr", &colr));
    file.extend(jp2_box(b"jp2h", &jp2h));
    file.extend(jp2_box(b"jp2c", &codestream));

    let image = jpeg2000::decode(&file).unwrap();
    assert_eq!((image.width, image.height), (8, 8));
    assert!(image.pixels.iter().all(|&p| p == 128));
}

#[test]
fn determinism() {
    let mut body = vec![0xFE, 0xA0, 0x60];
    body.extend_from_slice(&[0x01, 0x8F, 0x0D, 0xC8, 0x75, 0x5D]);
    let data = CodestreamBuilder::new()
        .siz(1, 5)
        .cod(0)
        .qcd(2, &[5])
        .tile(&body)
        .finish();
    let a = jpeg2000::decode(&data).unwrap();
    let b = jpeg2000::decode(&data).unwrap();
    assert_eq!(a.pixels, b.pixels);
}
