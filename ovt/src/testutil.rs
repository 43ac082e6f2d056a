//! Byte-level builders for synthesizing table data in tests.

/// Big-endian byte assembler with chainable writes.
pub struct ByteWriter {
    bytes: Vec<u8>,
}

impl ByteWriter {
    pub fn new() -> Self {
        Self {
            bytes: Vec::new(),
        }
    }

    pub fn u8(mut self, val: u8) -> Self {
        self.bytes.push(val);
        self
    }

    pub fn i8(self, val: i8) -> Self {
        self.u8(val as u8)
    }

    pub fn u16(mut self, val: u16) -> Self {
        self.bytes.extend_from_slice(&val.to_be_bytes());
        self
    }

    pub fn i16(self, val: i16) -> Self {
        self.u16(val as u16)
    }

    pub fn u32(mut self, val: u32) -> Self {
        self.bytes.extend_from_slice(&val.to_be_bytes());
        self
    }

    pub fn i32(self, val: i32) -> Self {
        self.u32(val as u32)
    }

    pub fn i64(mut self, val: i64) -> Self {
        self.bytes.extend_from_slice(&val.to_be_bytes());
        self
    }

    pub fn bytes(mut self, val: &[u8]) -> Self {
        self.bytes.extend_from_slice(val);
        self
    }

    pub fn zeros(mut self, count: usize) -> Self {
        self.bytes.resize(self.bytes.len() + count, 0);
        self
    }

    pub fn take(self) -> Vec<u8> {
        self.bytes
    }
}

pub fn head_bytes(units_per_em: u16, index_to_loc_format: i16) -> Vec<u8> {
    ByteWriter::new()
        .u16(1)
        .u16(0)
        .u32(0x00010000) // fontRevision 1.0
        .u32(0) // checksumAdjustment
        .u32(0x5f0f3cf5)
        .u16(0) // flags
        .u16(units_per_em)
        .i64(0) // created
        .i64(0) // modified
        .i16(-100)
        .i16(-200)
        .i16(800)
        .i16(900)
        .u16(0) // macStyle
        .u16(8) // lowestRecPPEM
        .i16(2) // fontDirectionHint
        .i16(index_to_loc_format)
        .i16(0) // glyphDataFormat
        .take()
}

pub fn hhea_bytes(
    ascender: i16,
    descender: i16,
    advance_width_max: u16,
    number_of_h_metrics: u16,
) -> Vec<u8> {
    ByteWriter::new()
        .u16(1)
        .u16(0)
        .i16(ascender)
        .i16(descender)
        .i16(0) // lineGap
        .u16(advance_width_max)
        .i16(0) // minLeftSideBearing
        .i16(0) // minRightSideBearing
        .i16(0) // xMaxExtent
        .i16(1) // caretSlopeRise
        .i16(0) // caretSlopeRun
        .i16(0) // caretOffset
        .zeros(8) // reserved
        .i16(0) // metricDataFormat
        .u16(number_of_h_metrics)
        .take()
}

pub fn maxp_bytes(version: u32, num_glyphs: u16) -> Vec<u8> {
    let writer = ByteWriter::new().u32(version).u16(num_glyphs);

    if version == 0x00010000 {
        writer
            .u16(0) // maxPoints
            .u16(0) // maxContours
            .u16(0) // maxCompositePoints
            .u16(0) // maxCompositeContours
            .zeros(16) // maxZones..maxSizeOfInstructions
            .u16(0) // maxComponentElements
            .u16(0) // maxComponentDepth
            .take()
    } else {
        writer.take()
    }
}

pub fn hmtx_bytes(hor_metrics: &[(u16, i16)], left_side_bearings: &[i16]) -> Vec<u8> {
    let mut writer = ByteWriter::new();

    for &(advance_width, lsb) in hor_metrics {
        writer = writer.u16(advance_width).i16(lsb);
    }

    for &lsb in left_side_bearings {
        writer = writer.i16(lsb);
    }

    writer.take()
}

pub fn loca_bytes_short(half_offsets: &[u16]) -> Vec<u8> {
    let mut writer = ByteWriter::new();

    for &half_offset in half_offsets {
        writer = writer.u16(half_offset);
    }

    writer.take()
}

/// A format 4 `cmap` subtable. Each segment is
/// `(start_code, end_code, id_delta, id_range_offset)`.
pub fn cmap4_subtable(segments: &[(u16, u16, i16, u16)], glyph_id_array: &[u16]) -> Vec<u8> {
    let length = 16 + 8 * segments.len() + 2 * glyph_id_array.len();
    let mut writer = ByteWriter::new()
        .u16(4)
        .u16(length as u16)
        .u16(0) // language
        .u16(segments.len() as u16 * 2)
        .zeros(6); // searchRange, entrySelector, rangeShift

    for &(_, end_code, _, _) in segments {
        writer = writer.u16(end_code);
    }

    writer = writer.u16(0); // reservedPad

    for &(start_code, _, _, _) in segments {
        writer = writer.u16(start_code);
    }

    for &(_, _, id_delta, _) in segments {
        writer = writer.i16(id_delta);
    }

    for &(_, _, _, id_range_offset) in segments {
        writer = writer.u16(id_range_offset);
    }

    for &glyph_id in glyph_id_array {
        writer = writer.u16(glyph_id);
    }

    writer.take()
}

/// A format 12 `cmap` subtable. Each group is
/// `(start_char, end_char, start_glyph)`.
pub fn cmap12_subtable(groups: &[(u32, u32, u32)]) -> Vec<u8> {
    let length = 16 + 12 * groups.len();
    let mut writer = ByteWriter::new()
        .u16(12)
        .u16(0) // reserved
        .u32(length as u32)
        .u32(0) // language
        .u32(groups.len() as u32);

    for &(start_char, end_char, start_glyph) in groups {
        writer = writer.u32(start_char).u32(end_char).u32(start_glyph);
    }

    writer.take()
}

/// A simple `glyf` entry: one square contour with corners (0,0), (100,0),
/// (100,100), (0,100), all points on-curve, long coordinate deltas.
pub fn glyf_square_bytes() -> Vec<u8> {
    ByteWriter::new()
        .i16(1) // numberOfContours
        .i16(0)
        .i16(0)
        .i16(100)
        .i16(100)
        .u16(3) // endPtsOfContours
        .u16(0) // instructionLength
        .u8(0x01)
        .u8(0x01)
        .u8(0x01)
        .u8(0x01)
        .i16(0)
        .i16(100)
        .i16(0)
        .i16(-100)
        .i16(0)
        .i16(0)
        .i16(100)
        .i16(0)
        .take()
}

/// A compound `glyf` entry with a single identity-transform component
/// offset by `(e, f)`.
pub fn glyf_compound_bytes(component_id: u16, e: i16, f: i16) -> Vec<u8> {
    ByteWriter::new()
        .i16(-1)
        .i16(0)
        .i16(0)
        .i16(0)
        .i16(0)
        .u16(0x0003) // ARG_1_AND_2_ARE_WORDS | ARGS_ARE_XY_VALUES
        .u16(component_id)
        .i16(e)
        .i16(f)
        .take()
}

fn cff_index(entries: &[&[u8]]) -> Vec<u8> {
    if entries.is_empty() {
        return vec![0, 0];
    }

    let mut writer = ByteWriter::new().u16(entries.len() as u16).u8(1);
    let mut offset = 1u8;
    writer = writer.u8(offset);

    for entry in entries {
        offset += entry.len() as u8;
        writer = writer.u8(offset);
    }

    for entry in entries {
        writer = writer.bytes(entry);
    }

    writer.take()
}

fn cff_dict_int(writer: ByteWriter, val: i32) -> ByteWriter {
    writer.u8(29).i32(val)
}

/// A minimal `CFF ` table holding the given charstrings, subroutine
/// indexes and private-dict width defaults.
pub fn cff_bytes(
    charstrings: &[&[u8]],
    global_subrs: &[&[u8]],
    local_subrs: &[&[u8]],
    default_width_x: i32,
    nominal_width_x: i32,
) -> Vec<u8> {
    let name_index = cff_index(&[b"ovt"]);
    let string_index = cff_index(&[]);
    let global_subr_index = cff_index(global_subrs);
    let charstring_index = cff_index(charstrings);
    let local_subr_index = cff_index(local_subrs);

    let mut private_dict = cff_dict_int(ByteWriter::new(), default_width_x).u8(20);
    private_dict = cff_dict_int(private_dict, nominal_width_x).u8(21);
    let mut private_size = 12;

    if !local_subrs.is_empty() {
        // Subrs offset is relative to the private dict itself.
        private_size += 6;
        private_dict = cff_dict_int(private_dict, private_size).u8(19);
    }

    // Top dict operands use the fixed 5-byte int encoding so its size is
    // known before the downstream offsets are computed.
    let top_dict_len = 17;
    let charstrings_offset =
        4 + name_index.len() + (5 + top_dict_len) + string_index.len() + global_subr_index.len();
    let private_offset = charstrings_offset + charstring_index.len();

    let mut top_dict = cff_dict_int(ByteWriter::new(), charstrings_offset as i32).u8(17);
    top_dict = cff_dict_int(top_dict, private_size);
    top_dict = cff_dict_int(top_dict, private_offset as i32).u8(18);
    let top_dict = top_dict.take();
    assert_eq!(top_dict.len(), top_dict_len);

    let top_dict_index = ByteWriter::new()
        .u16(1)
        .u8(1)
        .u8(1)
        .u8(1 + top_dict.len() as u8)
        .bytes(&top_dict)
        .take();

    let mut bytes = ByteWriter::new()
        .u8(1)
        .u8(0)
        .u8(4) // header size
        .u8(4) // absolute-offset size
        .bytes(&name_index)
        .bytes(&top_dict_index)
        .bytes(&string_index)
        .bytes(&global_subr_index)
        .bytes(&charstring_index)
        .bytes(&private_dict.take())
        .take();

    if !local_subrs.is_empty() {
        bytes.extend_from_slice(&local_subr_index);
    }

    bytes
}

/// A version 0 `name` table. Each record is
/// `(platform_id, encoding_id, language_id, name_id, name)`; strings are
/// stored UTF-16BE.
pub fn name_table_bytes(records: &[(u16, u16, u16, u16, &str)]) -> Vec<u8> {
    let storage_offset = 6 + 12 * records.len();
    let mut storage = Vec::new();
    let mut writer = ByteWriter::new()
        .u16(0)
        .u16(records.len() as u16)
        .u16(storage_offset as u16);

    for &(platform_id, encoding_id, language_id, name_id, name) in records {
        let string_offset = storage.len();

        for unit in name.encode_utf16() {
            storage.extend_from_slice(&unit.to_be_bytes());
        }

        writer = writer
            .u16(platform_id)
            .u16(encoding_id)
            .u16(language_id)
            .u16(name_id)
            .u16((storage.len() - string_offset) as u16)
            .u16(string_offset as u16);
    }

    writer.bytes(&storage).take()
}

fn table_checksum(bytes: &[u8]) -> u32 {
    let mut sum = 0u32;

    for chunk in bytes.chunks(4) {
        let mut word = [0u8; 4];
        word[..chunk.len()].copy_from_slice(chunk);
        sum = sum.wrapping_add(u32::from_be_bytes(word));
    }

    sum
}

/// Assembles a whole sfnt file from `(tag, table)` pairs with a valid
/// directory and stored checksums.
pub fn sfnt_bytes(sfnt_version: u32, tables: &[(&[u8; 4], Vec<u8>)]) -> Vec<u8> {
    let mut writer = ByteWriter::new()
        .u32(sfnt_version)
        .u16(tables.len() as u16)
        .zeros(6); // searchRange, entrySelector, rangeShift

    let mut offset = 12 + 16 * tables.len();

    for (tag, table) in tables {
        writer = writer
            .bytes(*tag)
            .u32(table_checksum(table))
            .u32(offset as u32)
            .u32(table.len() as u32);
        offset += (table.len() + 3) & !3;
    }

    for (_, table) in tables {
        let padding = ((table.len() + 3) & !3) - table.len();
        writer = writer.bytes(table).zeros(padding);
    }

    writer.take()
}

/// A whole `cmap` table from `(platform_id, encoding_id, subtable)` entries.
pub fn cmap_table_bytes(records: &[(u16, u16, &[u8])]) -> Vec<u8> {
    let mut writer = ByteWriter::new().u16(0).u16(records.len() as u16);
    let mut subtable_offset = 4 + 8 * records.len();

    for &(platform_id, encoding_id, subtable) in records {
        writer = writer
            .u16(platform_id)
            .u16(encoding_id)
            .u32(subtable_offset as u32);
        subtable_offset += subtable.len();
    }

    for &(_, _, subtable) in records {
        writer = writer.bytes(subtable);
    }

    writer.take()
}
