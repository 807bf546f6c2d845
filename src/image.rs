//! Decoded image container.

/// A decoded raster image owning its pixel buffer.
///
/// Samples are interleaved in row-major order. When `bytes_per_sample` is 1
/// each sample is one byte; when it is 2 samples are big-endian `u16`
/// (JPEG 2000 components deeper than 8 bits). The buffer length is always
/// `width * height * channels * bytes_per_sample`.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    pub bit_depth: u8,
    pub pixels: Vec<u8>,
}

impl DecodedImage {
    pub fn bytes_per_sample(&self) -> usize {
        if self.bit_depth > 8 {
            2
        } else {
            1
        }
    }

    pub fn expected_len(&self) -> usize {
        self.width as usize
            * self.height as usize
            * self.channels as usize
            * self.bytes_per_sample()
    }
}
