use log::debug;

use crate::error::*;
use crate::parse::FontReader;

/// Corresponds to the `cmap` table.
/// <https://learn.microsoft.com/en-us/typography/opentype/spec/cmap>
///
/// Only format 4 and format 12 subtables are retained; other formats are
/// skipped with a diagnostic. Range arrays are kept as-is and resolved by
/// binary search rather than expanded into a full map.
#[derive(Debug, Clone)]
pub struct CmapTable {
    pub version: u16,
    pub encoding_records: Vec<EncodingRecord>,
}

impl CmapTable {
    pub fn try_parse(bytes: &[u8]) -> Result<Self, OvtError> {
        let mut reader = FontReader::new(bytes, OvtErrorSource::CmapTable);
        let version = reader.read_u16()?;
        let num_tables = reader.read_u16()? as usize;
        let mut subtable_offsets = Vec::with_capacity(num_tables);

        for _ in 0..num_tables {
            let platform_id = reader.read_u16()?;
            let encoding_id = reader.read_u16()?;
            let subtable_offset = reader.read_u32()? as usize;
            subtable_offsets.push((platform_id, encoding_id, subtable_offset));
        }

        let mut encoding_records = Vec::new();

        for (platform_id, encoding_id, subtable_offset) in subtable_offsets {
            match CmapSubtable::try_parse(bytes, subtable_offset)? {
                Some(subtable) => {
                    encoding_records.push(EncodingRecord {
                        platform_id,
                        encoding_id,
                        subtable,
                    });
                },
                None => (),
            }
        }

        if encoding_records.is_empty() {
            return Err(OvtError {
                kind: OvtErrorKind::FormatNotSupported,
                source: OvtErrorSource::CmapTable,
            });
        }

        Ok(Self {
            version,
            encoding_records,
        })
    }

    /// Index of the preferred subtable: the first format 12 if any exists,
    /// otherwise the first format 4.
    pub fn preferred_index(&self) -> usize {
        self.encoding_records
            .iter()
            .position(|record| matches!(record.subtable, CmapSubtable::Format12(_)))
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone)]
pub struct EncodingRecord {
    pub platform_id: u16,
    pub encoding_id: u16,
    pub subtable: CmapSubtable,
}

#[derive(Debug, Clone)]
pub enum CmapSubtable {
    Format4(Cmap4),
    Format12(Cmap12),
}

impl CmapSubtable {
    fn try_parse(bytes: &[u8], subtable_offset: usize) -> Result<Option<Self>, OvtError> {
        let mut reader = FontReader::new(bytes, OvtErrorSource::CmapSubtable);
        reader.seek(subtable_offset);

        match reader.read_u16()? {
            4 => Cmap4::try_parse(&mut reader, subtable_offset).map(|t| Some(Self::Format4(t))),
            12 => Cmap12::try_parse(&mut reader).map(|t| Some(Self::Format12(t))),
            format => {
                debug!("skipping cmap subtable format {}", format);
                Ok(None)
            },
        }
    }

    /// Glyph id for a codepoint; 0 ("notdef") when unmapped.
    pub fn glyph_id(&self, codepoint: u32) -> u16 {
        match self {
            Self::Format4(table) => table.glyph_id(codepoint),
            Self::Format12(table) => table.glyph_id(codepoint),
        }
    }
}

/// Format 4: segmented ranges with per-segment deltas and an optional
/// indirection into a trailing glyph-id array.
#[derive(Debug, Clone)]
pub struct Cmap4 {
    pub language: u16,
    segments: Vec<Cmap4Segment>,
    glyph_id_array: Vec<u16>,
}

#[derive(Debug, Clone, Copy)]
struct Cmap4Segment {
    start_code: u16,
    end_code: u16,
    id_delta: i16,
    id_range_offset: u16,
}

impl Cmap4 {
    fn try_parse(reader: &mut FontReader, subtable_offset: usize) -> Result<Self, OvtError> {
        let length = reader.read_u16()? as usize;
        let language = reader.read_u16()?;
        let seg_count = (reader.read_u16()? / 2) as usize;
        // searchRange, entrySelector, rangeShift
        reader.skip(6);

        if seg_count == 0 {
            return Err(OvtError {
                kind: OvtErrorKind::Malformed,
                source: OvtErrorSource::CmapSubtable,
            });
        }

        let mut end_codes = Vec::with_capacity(seg_count);

        for _ in 0..seg_count {
            end_codes.push(reader.read_u16()?);
        }

        // reserved pad
        reader.skip(2);
        let mut start_codes = Vec::with_capacity(seg_count);

        for _ in 0..seg_count {
            start_codes.push(reader.read_u16()?);
        }

        let mut id_deltas = Vec::with_capacity(seg_count);

        for _ in 0..seg_count {
            id_deltas.push(reader.read_i16()?);
        }

        let mut id_range_offsets = Vec::with_capacity(seg_count);

        for _ in 0..seg_count {
            id_range_offsets.push(reader.read_u16()?);
        }

        // The glyph-id array fills whatever remains of the subtable's
        // declared length.
        let consumed = reader.pos() - subtable_offset;
        let glyph_id_count = length.saturating_sub(consumed) / 2;
        let mut glyph_id_array = Vec::with_capacity(glyph_id_count);

        for _ in 0..glyph_id_count {
            glyph_id_array.push(reader.read_u16()?);
        }

        let mut segments = Vec::with_capacity(seg_count);

        for i in 0..seg_count {
            if start_codes[i] > end_codes[i] {
                return Err(OvtError {
                    kind: OvtErrorKind::Malformed,
                    source: OvtErrorSource::CmapSubtable,
                });
            }

            segments.push(Cmap4Segment {
                start_code: start_codes[i],
                end_code: end_codes[i],
                id_delta: id_deltas[i],
                id_range_offset: id_range_offsets[i],
            });
        }

        Ok(Self {
            language,
            segments,
            glyph_id_array,
        })
    }

    pub fn glyph_id(&self, codepoint: u32) -> u16 {
        if codepoint > 0xFFFF {
            return 0;
        }

        let code = codepoint as u16;
        let index = self.segments.partition_point(|seg| seg.end_code < code);

        if index == self.segments.len() {
            return 0;
        }

        let segment = self.segments[index];

        if code < segment.start_code {
            return 0;
        }

        if segment.id_range_offset == 0 {
            return ((code as i32 + segment.id_delta as i32) & 0xFFFF) as u16;
        }

        // The range offset is defined relative to its own position within
        // the id-range-offset array, which lands in the glyph-id array that
        // directly follows it.
        let array_index = index as isize - self.segments.len() as isize
            + (segment.id_range_offset / 2) as isize
            + (code - segment.start_code) as isize;

        if array_index < 0 || array_index as usize >= self.glyph_id_array.len() {
            return 0;
        }

        match self.glyph_id_array[array_index as usize] {
            0 => 0,
            glyph_id => ((glyph_id as i32 + segment.id_delta as i32) & 0xFFFF) as u16,
        }
    }
}

/// Format 12: sorted disjoint ranges mapping directly to starting glyph ids.
#[derive(Debug, Clone)]
pub struct Cmap12 {
    pub language: u32,
    groups: Vec<Cmap12Group>,
}

#[derive(Debug, Clone, Copy)]
struct Cmap12Group {
    start_char: u32,
    end_char: u32,
    start_glyph: u32,
}

impl Cmap12 {
    fn try_parse(reader: &mut FontReader) -> Result<Self, OvtError> {
        // reserved u16, length u32
        reader.skip(6);
        let language = reader.read_u32()?;
        let num_groups = reader.read_u32()? as usize;
        let mut groups = Vec::with_capacity(num_groups);

        for _ in 0..num_groups {
            let start_char = reader.read_u32()?;
            let end_char = reader.read_u32()?;
            let start_glyph = reader.read_u32()?;

            if start_char > end_char {
                return Err(OvtError {
                    kind: OvtErrorKind::Malformed,
                    source: OvtErrorSource::CmapSubtable,
                });
            }

            groups.push(Cmap12Group {
                start_char,
                end_char,
                start_glyph,
            });
        }

        Ok(Self {
            language,
            groups,
        })
    }

    pub fn glyph_id(&self, codepoint: u32) -> u16 {
        let index = self.groups.partition_point(|group| group.end_char < codepoint);

        if index == self.groups.len() {
            return 0;
        }

        let group = self.groups[index];

        if codepoint < group.start_char {
            return 0;
        }

        (group.start_glyph + (codepoint - group.start_char)) as u16
    }
}
