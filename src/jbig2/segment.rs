//! Segment headers and file organizations (ITU-T T.88 clause 7.2 and
//! Annex D).

use log::{trace, warn};
use num_enum::TryFromPrimitive;

use crate::bits::Reader;
use crate::error::{Error, Result};

/// File identification string of stand-alone JBIG2 files (D.4.1).
pub const FILE_ID: [u8; 8] = [0x97, 0x4A, 0x42, 0x32, 0x0D, 0x0A, 0x1A, 0x0A];

#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum SegmentKind {
    SymbolDictionary = 0,
    IntermediateTextRegion = 4,
    ImmediateTextRegion = 6,
    ImmediateLosslessTextRegion = 7,
    PatternDictionary = 16,
    IntermediateHalftoneRegion = 20,
    ImmediateHalftoneRegion = 22,
    ImmediateLosslessHalftoneRegion = 23,
    IntermediateGenericRegion = 36,
    ImmediateGenericRegion = 38,
    ImmediateLosslessGenericRegion = 39,
    IntermediateGenericRefinementRegion = 40,
    ImmediateGenericRefinementRegion = 42,
    ImmediateLosslessGenericRefinementRegion = 43,
    PageInformation = 48,
    EndOfPage = 49,
    EndOfStripe = 50,
    EndOfFile = 51,
    Profiles = 52,
    Tables = 53,
    Extension = 62,
}

impl SegmentKind {
    pub fn is_region(self) -> bool {
        matches!(
            self,
            SegmentKind::IntermediateTextRegion
                | SegmentKind::ImmediateTextRegion
                | SegmentKind::ImmediateLosslessTextRegion
                | SegmentKind::IntermediateHalftoneRegion
                | SegmentKind::ImmediateHalftoneRegion
                | SegmentKind::ImmediateLosslessHalftoneRegion
                | SegmentKind::IntermediateGenericRegion
                | SegmentKind::ImmediateGenericRegion
                | SegmentKind::ImmediateLosslessGenericRegion
                | SegmentKind::IntermediateGenericRefinementRegion
                | SegmentKind::ImmediateGenericRefinementRegion
                | SegmentKind::ImmediateLosslessGenericRefinementRegion
        )
    }

    pub fn is_immediate(self) -> bool {
        matches!(
            self,
            SegmentKind::ImmediateTextRegion
                | SegmentKind::ImmediateLosslessTextRegion
                | SegmentKind::ImmediateHalftoneRegion
                | SegmentKind::ImmediateLosslessHalftoneRegion
                | SegmentKind::ImmediateGenericRegion
                | SegmentKind::ImmediateLosslessGenericRegion
                | SegmentKind::ImmediateGenericRefinementRegion
                | SegmentKind::ImmediateLosslessGenericRefinementRegion
        )
    }
}

#[derive(Debug, Clone)]
pub struct SegmentHeader {
    pub number: u32,
    /// Raw type value; unknown values are skipped, not rejected.
    pub type_value: u8,
    pub referred: Vec<u32>,
    pub page: u32,
    /// None encodes the 0xFFFFFFFF "unknown length" case.
    pub data_length: Option<u32>,
}

impl SegmentHeader {
    pub fn kind(&self) -> Option<SegmentKind> {
        SegmentKind::try_from(self.type_value).ok()
    }
}

#[derive(Debug, Clone)]
pub struct Segment<'a> {
    pub header: SegmentHeader,
    pub data: &'a [u8],
}

/// Parse one segment header (7.2.2 through 7.2.7).
pub fn parse_header(r: &mut Reader<'_>) -> Result<SegmentHeader> {
    let at = r.pos();
    let number = r.read_u32()?;
    let flags = r.read_u8()?;
    let type_value = flags & 0x3F;
    let page_assoc_4 = flags & 0x40 != 0;

    // Referred-to segment count and retain flags (7.2.4).
    let first = r.read_u8()?;
    let count = if first >> 5 == 7 {
        r.seek(r.pos() - 1)?;
        let count = r.read_u32()? & 0x1FFF_FFFF;
        // One retain bit per referred segment plus one, padded to bytes.
        let retain_bytes = (count as usize + 8) / 8;
        r.skip(retain_bytes)?;
        count
    } else {
        u32::from(first >> 5)
    };

    // Referred segment numbers are sized by this segment's own number.
    let mut referred = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let value = if number <= 256 {
            u32::from(r.read_u8()?)
        } else if number <= 65536 {
            u32::from(r.read_u16()?)
        } else {
            r.read_u32()?
        };
        if value >= number {
            return Err(Error::malformed(at, "segment refers forward"));
        }
        referred.push(value);
    }

    let page = if page_assoc_4 { r.read_u32()? } else { u32::from(r.read_u8()?) };
    let length = r.read_u32()?;
    let data_length = if length == 0xFFFF_FFFF { None } else { Some(length) };

    trace!(
        "segment {number} type {type_value} page {page} refers {referred:?} length {data_length:?}"
    );
    Ok(SegmentHeader { number, type_value, referred, page, data_length })
}

/// Parse sequentially organized segments (headers and data interleaved).
pub fn parse_sequential<'a>(r: &mut Reader<'a>, out: &mut Vec<Segment<'a>>) -> Result<()> {
    while !r.is_empty() {
        let header = parse_header(r)?;
        let data = match header.data_length {
            Some(len) => r.read_bytes(len as usize)?,
            None => {
                // Unknown length (7.2.7): permitted only for immediate
                // generic regions; the segment runs to the end of the
                // stream.
                if header.kind() != Some(SegmentKind::ImmediateGenericRegion)
                    && header.kind() != Some(SegmentKind::ImmediateLosslessGenericRegion)
                {
                    return Err(Error::malformed(r.pos(), "unknown length on non-generic segment"));
                }
                r.tail()
            }
        };
        let stop = header.kind() == Some(SegmentKind::EndOfFile);
        let unknown = header.data_length.is_none();
        out.push(Segment { header, data });
        if stop || unknown {
            break;
        }
    }
    Ok(())
}

/// Parse the random-access organization: all headers first, then the data
/// parts in the same order (D.2).
fn parse_random_access<'a>(r: &mut Reader<'a>, out: &mut Vec<Segment<'a>>) -> Result<()> {
    let mut headers = Vec::new();
    loop {
        let header = parse_header(r)?;
        let done = header.kind() == Some(SegmentKind::EndOfFile);
        headers.push(header);
        if done {
            break;
        }
    }
    for header in headers {
        let data = match header.data_length {
            Some(len) => r.read_bytes(len as usize)?,
            None => {
                return Err(Error::malformed(r.pos(), "unknown length in random-access file"));
            }
        };
        out.push(Segment { header, data });
    }
    Ok(())
}

/// A parsed stand-alone file: its segments, in segment order.
pub struct File<'a> {
    pub segments: Vec<Segment<'a>>,
}

/// Parse a stand-alone JBIG2 file (with the 8-byte identification).
pub fn parse_file(data: &[u8]) -> Result<File<'_>> {
    if data.len() < 9 || data[0..8] != FILE_ID {
        return Err(Error::BadMagic { offset: 0, reason: "missing JBIG2 file identification" });
    }
    let mut r = Reader::new(&data[8..]);
    let flags = r.read_u8()?;
    let sequential = flags & 0x01 != 0;
    if flags & 0x02 == 0 {
        let pages = r.read_u32()?;
        trace!("file declares {pages} pages");
    }

    let mut segments = Vec::new();
    if sequential {
        parse_sequential(&mut r, &mut segments)?;
    } else {
        parse_random_access(&mut r, &mut segments)?;
    }
    if segments.is_empty() {
        warn!("file contains no segments");
    }
    Ok(File { segments })
}

/// Region segment information field common to all region segments
/// (7.4.1).
#[derive(Debug, Clone, Copy)]
pub struct RegionInfo {
    pub width: u32,
    pub height: u32,
    pub x: u32,
    pub y: u32,
    pub comb_op: crate::jbig2::bitmap::CombOp,
}

pub fn parse_region_info(r: &mut Reader<'_>) -> Result<RegionInfo> {
    let at = r.pos();
    let width = r.read_u32()?;
    let height = r.read_u32()?;
    let x = r.read_u32()?;
    let y = r.read_u32()?;
    let flags = r.read_u8()?;
    let comb_op = crate::jbig2::bitmap::CombOp::try_from(flags & 0x07)
        .map_err(|_| Error::malformed(at, "bad region combination operator"))?;
    Ok(RegionInfo { width, height, x, y, comb_op })
}
