//! JP2 box structure (ISO/IEC 15444-1 Annex I).
//!
//! Only enough of the container is read to reach the contiguous
//! codestream: the signature box, the file type box and the JP2 header box
//! (image header and colour specification, used for validation).

use log::{trace, warn};

use crate::error::{Error, Result};

pub const JP2_SIGNATURE: &[u8; 12] = b"\x00\x00\x00\x0CjP  \r\n\x87\n";

pub struct Jp2Box<'a> {
    pub box_type: [u8; 4],
    pub data: &'a [u8],
}

pub struct BoxReader<'a> {
    data: &'a [u8],
    position: usize,
}

/// Colour information from the `colr` box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColourSpec {
    Srgb,
    Greyscale,
    Sycc,
    IccProfile,
    Unknown(u32),
}

/// The `ihdr` sub-box of the JP2 header box.
#[derive(Debug, Clone, Copy)]
pub struct ImageHeader {
    pub width: u32,
    pub height: u32,
    pub components: u16,
    pub bits_per_component: u8,
}

impl<'a> BoxReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    /// Whether the input carries the JP2 signature box.
    pub fn is_jp2(data: &[u8]) -> bool {
        data.len() >= 12 && &data[0..12] == JP2_SIGNATURE
    }

    pub fn read_box(&mut self) -> Result<Option<Jp2Box<'a>>> {
        if self.position + 8 > self.data.len() {
            return Ok(None);
        }
        let start = self.position;
        let mut length = u64::from(u32::from_be_bytes(
            self.data[start..start + 4].try_into().unwrap(),
        ));
        let box_type = [
            self.data[start + 4],
            self.data[start + 5],
            self.data[start + 6],
            self.data[start + 7],
        ];
        self.position += 8;
        let mut header_size = 8usize;

        if length == 1 {
            // XLBox: 64-bit length follows.
            if self.position + 8 > self.data.len() {
                return Err(Error::Truncated { offset: self.position });
            }
            length = u64::from_be_bytes(
                self.data[self.position..self.position + 8].try_into().unwrap(),
            );
            self.position += 8;
            header_size += 8;
        } else if length == 0 {
            // Box extends to the end of the file.
            length = (self.data.len() - start) as u64;
        }

        if length < header_size as u64 {
            return Err(Error::malformed(start, "box length smaller than header"));
        }
        let data_end = start
            .checked_add(length as usize)
            .filter(|&end| end <= self.data.len())
            .ok_or(Error::Truncated { offset: start })?;
        let data = &self.data[start + header_size..data_end];
        self.position = data_end;
        Ok(Some(Jp2Box { box_type, data }))
    }

    /// Walk the box structure and return the embedded codestream, along
    /// with the image header when one was present.
    pub fn find_codestream(&mut self) -> Result<(Option<ImageHeader>, &'a [u8])> {
        if !Self::is_jp2(self.data) {
            return Err(Error::BadMagic { offset: 0, reason: "missing JP2 signature box" });
        }
        self.position = 12;

        let mut header = None;
        while let Some(b) = self.read_box()? {
            match &b.box_type {
                b"ftyp" => {
                    let has_brand = b.data.len() >= 4
                        && (&b.data[0..4] == b"jp2 "
                            || b.data.len() > 8
                                && b.data[8..].chunks_exact(4).any(|c| c == b"jp2 "));
                    if !has_brand {
                        warn!("file type box without jp2 brand");
                    }
                }
                b"jp2h" => {
                    header = parse_header_box(b.data)?;
                }
                b"jp2c" => {
                    trace!("contiguous codestream box, {} bytes", b.data.len());
                    return Ok((header, b.data));
                }
                other => {
                    trace!("skipping box {:?}", String::from_utf8_lossy(other));
                }
            }
        }
        Err(Error::malformed(self.data.len(), "no contiguous codestream box"))
    }
}

fn parse_header_box(data: &[u8]) -> Result<Option<ImageHeader>> {
    let mut inner = BoxReader::new(data);
    let mut header = None;
    while let Some(b) = inner.read_box()? {
        match &b.box_type {
            b"ihdr" => {
                if b.data.len() < 14 {
                    return Err(Error::malformed(0, "short image header box"));
                }
                let height = u32::from_be_bytes(b.data[0..4].try_into().unwrap());
                let width = u32::from_be_bytes(b.data[4..8].try_into().unwrap());
                let components = u16::from_be_bytes(b.data[8..10].try_into().unwrap());
                let bpc = b.data[10];
                header = Some(ImageHeader {
                    width,
                    height,
                    components,
                    bits_per_component: bpc.wrapping_add(1) & 0x7F,
                });
            }
            b"colr" => {
                if b.data.len() >= 3 {
                    let spec = match b.data[0] {
                        1 if b.data.len() >= 7 => {
                            let ecs = u32::from_be_bytes(b.data[3..7].try_into().unwrap());
                            match ecs {
                                16 => ColourSpec::Srgb,
                                17 => ColourSpec::Greyscale,
                                18 => ColourSpec::Sycc,
                                other => ColourSpec::Unknown(other),
                            }
                        }
                        2 => ColourSpec::IccProfile,
                        _ => ColourSpec::Unknown(0),
                    };
                    trace!("colour specification: {spec:?}");
                }
            }
            _ => {}
        }
    }
    Ok(header)
}
