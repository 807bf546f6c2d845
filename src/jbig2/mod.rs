//! JBIG2 decoder (ISO/IEC 14492 | ITU-T T.88).
//!
//! Pipeline: segment parsing, then per segment one of the entropy paths
//! (arithmetic coding, Huffman tables, MMR) feeding the region decoders
//! (generic, refinement, text, halftone) and the dictionaries, with every
//! immediate region composed onto the page bitmap.

pub mod arith_int;
pub mod bitmap;
pub mod generic;
pub mod halftone;
pub mod huffman;
pub mod mmr;
pub mod refinement;
pub mod segment;
pub mod symbol;
pub mod text;

use log::{trace, warn};

use crate::bits::Reader;
use crate::error::{Error, Result};
use crate::image::DecodedImage;
use bitmap::Bitmap;
use halftone::PatternDictionary;
use huffman::{HuffmanTable, StandardTables};
use segment::{Segment, SegmentKind};
use symbol::SymbolDictionary;

/// Resource bounds enforced while decoding. Exceeding any of them fails
/// with [`Error::ResourceExceeded`].
#[derive(Debug, Clone)]
pub struct Limits {
    /// Total symbols a dictionary may hold (imported plus new).
    pub max_symbols: u32,
    /// Width or height of the page bitmap.
    pub max_page_dimension: u32,
    /// Bytes of any single decoded bitmap.
    pub max_bitmap_bytes: usize,
    /// Instances aggregated into one refined symbol.
    pub max_refinement_instances: u32,
    /// Segments per file.
    pub max_segments: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_symbols: 65536,
            max_page_dimension: 1 << 20,
            max_bitmap_bytes: 1 << 28,
            max_refinement_instances: 16384,
            max_segments: 1 << 20,
        }
    }
}

/// Decode a stand-alone JBIG2 file into its first page bitmap.
pub fn decode(data: &[u8]) -> Result<Bitmap> {
    decode_with_limits(data, &Limits::default())
}

pub fn decode_with_limits(data: &[u8], limits: &Limits) -> Result<Bitmap> {
    let file = segment::parse_file(data)?;
    decode_segments(&file.segments, limits)
}

/// Decode an embedded (PDF-style) JBIG2 stream with optional global
/// segments; both streams use the sequential organization without the
/// file header.
pub fn decode_embedded(data: &[u8], globals: Option<&[u8]>, limits: &Limits) -> Result<Bitmap> {
    let mut segments = Vec::new();
    if let Some(globals) = globals {
        let mut r = Reader::new(globals);
        segment::parse_sequential(&mut r, &mut segments)?;
    }
    let mut r = Reader::new(data);
    segment::parse_sequential(&mut r, &mut segments)?;
    segments.sort_by_key(|s| s.header.number);
    decode_segments(&segments, limits)
}

/// Convert a decoded page to an 8-bit grayscale image (1 decodes to
/// black).
pub fn to_gray_image(bitmap: &Bitmap) -> DecodedImage {
    let mut pixels = Vec::with_capacity(bitmap.width as usize * bitmap.height as usize);
    for y in 0..bitmap.height {
        for x in 0..bitmap.width {
            pixels.push(if bitmap.get(x, y) { 0x00 } else { 0xFF });
        }
    }
    DecodedImage {
        width: bitmap.width,
        height: bitmap.height,
        channels: 1,
        bit_depth: 8,
        pixels,
    }
}

struct PageInfo {
    width: u32,
    height: u32,
    default_pixel: bool,
}

fn parse_page_info(data: &[u8]) -> Result<PageInfo> {
    let mut r = Reader::new(data);
    let width = r.read_u32()?;
    let height = r.read_u32()?;
    let _xres = r.read_u32()?;
    let _yres = r.read_u32()?;
    let flags = r.read_u8()?;
    // The striping field follows; nothing in it changes decoding here.
    Ok(PageInfo { width, height, default_pixel: flags & 0x04 != 0 })
}

/// Everything decoded so far that later segments may refer to, keyed by
/// segment number.
struct DecodeState {
    page: Bitmap,
    regions: Vec<(u32, Bitmap)>,
    symbol_dicts: Vec<(u32, SymbolDictionary)>,
    pattern_dicts: Vec<(u32, PatternDictionary)>,
    tables: Vec<(u32, HuffmanTable)>,
}

impl DecodeState {
    fn region(&self, number: u32) -> Option<&Bitmap> {
        self.regions
            .binary_search_by_key(&number, |(n, _)| *n)
            .ok()
            .map(|i| &self.regions[i].1)
    }

    fn referred_symbols<'s>(&'s self, referred: &[u32]) -> Vec<&'s Bitmap> {
        referred
            .iter()
            .filter_map(|&n| {
                self.symbol_dicts.binary_search_by_key(&n, |(num, _)| *num).ok().map(|i| {
                    &self.symbol_dicts[i].1
                })
            })
            .flat_map(|dict| dict.symbols.iter())
            .collect()
    }

    fn referred_tables<'s>(&'s self, referred: &[u32]) -> Vec<&'s HuffmanTable> {
        referred
            .iter()
            .filter_map(|&n| {
                self.tables.binary_search_by_key(&n, |(num, _)| *num).ok().map(|i| &self.tables[i].1)
            })
            .collect()
    }

    fn pattern_dict(&self, referred: &[u32]) -> Option<&PatternDictionary> {
        referred.iter().find_map(|&n| {
            self.pattern_dicts
                .binary_search_by_key(&n, |(num, _)| *num)
                .ok()
                .map(|i| &self.pattern_dicts[i].1)
        })
    }
}

fn decode_segments(segments: &[Segment<'_>], limits: &Limits) -> Result<Bitmap> {
    if segments.len() > limits.max_segments {
        return Err(Error::ResourceExceeded { reason: "too many segments" });
    }
    let std_tables = StandardTables::new();

    // Striped pages with unknown height learn it from the end-of-stripe
    // segments, which carry the Y coordinate of their last row.
    let height_from_stripes = segments
        .iter()
        .filter(|s| s.header.kind() == Some(SegmentKind::EndOfStripe))
        .filter_map(|s| s.data.get(0..4))
        .filter_map(|b| u32::from_be_bytes(b.try_into().ok()?).checked_add(1))
        .max();

    let page_info = segments
        .iter()
        .find(|s| s.header.kind() == Some(SegmentKind::PageInformation))
        .ok_or(Error::malformed(0, "missing page information segment"))?;
    let info = parse_page_info(page_info.data)?;
    let height = if info.height == 0xFFFF_FFFF {
        height_from_stripes.ok_or(Error::malformed(0, "page height unknown"))?
    } else {
        info.height
    };
    if info.width > limits.max_page_dimension || height > limits.max_page_dimension {
        return Err(Error::ResourceExceeded { reason: "page too large" });
    }
    if (info.width as usize).div_ceil(8) * height as usize > limits.max_bitmap_bytes {
        return Err(Error::ResourceExceeded { reason: "page bitmap too large" });
    }

    let mut state = DecodeState {
        page: Bitmap::filled(info.width, height, info.default_pixel),
        regions: Vec::new(),
        symbol_dicts: Vec::new(),
        pattern_dicts: Vec::new(),
        tables: Vec::new(),
    };

    for seg in segments {
        let Some(kind) = seg.header.kind() else {
            warn!("skipping unknown segment type {}", seg.header.type_value);
            continue;
        };
        let mut r = Reader::new(seg.data);
        trace!("decoding segment {} ({kind:?})", seg.header.number);
        match kind {
            SegmentKind::PageInformation | SegmentKind::EndOfStripe => {}
            SegmentKind::EndOfPage | SegmentKind::EndOfFile => break,
            SegmentKind::SymbolDictionary => {
                let input = state.referred_symbols(&seg.header.referred);
                let tables = state.referred_tables(&seg.header.referred);
                let dict = symbol::decode(seg.data, &input, &tables, &std_tables, limits)?;
                state.symbol_dicts.push((seg.header.number, dict));
            }
            SegmentKind::Tables => {
                let table = HuffmanTable::from_tables_segment(seg.data)?;
                state.tables.push((seg.header.number, table));
            }
            SegmentKind::PatternDictionary => {
                let dict = halftone::decode_pattern_dictionary(seg.data, limits)?;
                state.pattern_dicts.push((seg.header.number, dict));
            }
            SegmentKind::ImmediateGenericRegion
            | SegmentKind::ImmediateLosslessGenericRegion
            | SegmentKind::IntermediateGenericRegion => {
                let info = segment::parse_region_info(&mut r)?;
                let region = generic::decode_segment(&mut r, &info, limits)?;
                finish_region(&mut state, seg, kind, info, region);
            }
            SegmentKind::ImmediateTextRegion
            | SegmentKind::ImmediateLosslessTextRegion
            | SegmentKind::IntermediateTextRegion => {
                let info = segment::parse_region_info(&mut r)?;
                let symbols = state.referred_symbols(&seg.header.referred);
                let tables = state.referred_tables(&seg.header.referred);
                let region =
                    text::decode_segment(&mut r, &info, &symbols, &tables, &std_tables, limits)?;
                finish_region(&mut state, seg, kind, info, region);
            }
            SegmentKind::ImmediateHalftoneRegion
            | SegmentKind::ImmediateLosslessHalftoneRegion
            | SegmentKind::IntermediateHalftoneRegion => {
                let info = segment::parse_region_info(&mut r)?;
                let patterns = state
                    .pattern_dict(&seg.header.referred)
                    .ok_or(Error::malformed(0, "halftone region without pattern dictionary"))?;
                let region = halftone::decode_halftone_region(&mut r, &info, patterns, limits)?;
                finish_region(&mut state, seg, kind, info, region);
            }
            SegmentKind::ImmediateGenericRefinementRegion
            | SegmentKind::ImmediateLosslessGenericRefinementRegion
            | SegmentKind::IntermediateGenericRefinementRegion => {
                let info = segment::parse_region_info(&mut r)?;
                // The reference is the first referred intermediate
                // region, or the page itself (7.4.7.5).
                let reference = seg
                    .header
                    .referred
                    .iter()
                    .find_map(|&n| state.region(n))
                    .unwrap_or(&state.page);
                let region = refinement::decode_segment(&mut r, &info, reference, limits)?;
                finish_region(&mut state, seg, kind, info, region);
            }
            SegmentKind::Profiles | SegmentKind::Extension => {
                trace!("skipping segment type {kind:?}");
            }
        }
    }

    Ok(state.page)
}

/// Compose an immediate region onto the page, or store an intermediate
/// one for later reference.
fn finish_region(
    state: &mut DecodeState,
    seg: &Segment<'_>,
    kind: SegmentKind,
    info: segment::RegionInfo,
    region: Bitmap,
) {
    if kind.is_immediate() {
        state
            .page
            .combine(&region, i64::from(info.x), i64::from(info.y), info.comb_op);
    } else {
        state.regions.push((seg.header.number, region));
    }
}
