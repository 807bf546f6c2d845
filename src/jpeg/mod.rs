//! Baseline JPEG decoder (ISO/IEC 10918-1 | ITU-T T.81).
//!
//! Pipeline: marker parsing, Huffman table construction, bit-stream
//! entropy decoding of quantized DCT coefficients, dequantization, inverse
//! 8x8 DCT, then chroma upsampling and YCbCr to RGB conversion.

pub mod bitreader;
pub mod color;
pub mod huffman;
pub mod idct;
pub mod marker;
pub mod scan;

use log::trace;

use crate::error::{Error, Result};
use crate::image::DecodedImage;
use color::Plane;
use idct::Idct;
use marker::{Event, MarkerReader};

/// Decode a baseline JFIF/JPEG byte stream into 8-bit grayscale or
/// interleaved RGB pixels.
pub fn decode(data: &[u8]) -> Result<DecodedImage> {
    let mut reader = MarkerReader::new(data)?;
    let idct = Idct::new();
    let mut planes: Vec<Plane> = Vec::new();
    let mut any_scan = false;

    loop {
        match reader.next_event()? {
            Event::Scan(scan) => {
                let frame = reader
                    .frame
                    .clone()
                    .ok_or(Error::malformed(reader.pos(), "scan before frame header"))?;
                if planes.is_empty() {
                    planes = (0..frame.components.len())
                        .map(|c| {
                            let (bx, by) = frame.component_blocks(c);
                            Plane::new(bx as usize, by as usize)
                        })
                        .collect();
                }
                let start = reader.pos();
                let consumed = scan::decode_scan(
                    &frame,
                    &scan,
                    &reader.dc,
                    &reader.ac,
                    &reader.quant,
                    reader.restart_interval,
                    &data[start..],
                    &mut planes,
                    &idct,
                )?;
                trace!("scan consumed {consumed} bytes of entropy data");
                reader.seek(start + consumed)?;
                any_scan = true;
            }
            Event::End => break,
        }
    }

    if !any_scan {
        return Err(Error::malformed(reader.pos(), "no scan in image"));
    }
    let frame = reader
        .frame
        .as_ref()
        .ok_or(Error::malformed(reader.pos(), "no frame header"))?;
    color::assemble(frame, &planes)
}
