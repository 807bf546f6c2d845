/*!
# rasterdec

`rasterdec` is a pure-Rust library implementing the core decoders for three
compressed raster formats that commonly travel together in document
workflows:

## Supported formats

### Baseline JPEG (ISO/IEC 10918-1 | ITU-T T.81)
- Marker parsing, Huffman entropy decoding, dequantization, inverse DCT,
  chroma upsampling and YCbCr to RGB conversion.
- **Modules**: `jpeg`

### JPEG 2000 Part 1 (ISO/IEC 15444-1 | ITU-T T.800)
- JP2 boxes and raw codestreams, tag-tree packet headers (Tier-2),
  MQ-coded EBCOT code-block decoding (Tier-1), scalar dequantization,
  multi-level inverse 5/3 and 9/7 wavelet transforms, RCT/ICT.
- **Modules**: `jpeg2000`

### JBIG2 (ISO/IEC 14492 | ITU-T T.88)
- Segment parsing, arithmetic and Huffman entropy coding, MMR, generic /
  refinement / text / halftone regions, symbol and pattern dictionaries,
  page composition.
- **Modules**: `jbig2`

Encoding is out of scope for all three formats.

## Safety
This library is written in pure Rust with `#![forbid(unsafe_code)]`,
ensuring memory safety without sacrificing performance.
*/

#![forbid(unsafe_code)]

pub mod arith;
pub mod bits;
pub mod error;
pub mod image;

pub mod jbig2;
pub mod jpeg;
pub mod jpeg2000;

pub use error::{Error, Result};
pub use image::DecodedImage;
