use crate::error::*;
use crate::parse::FontReader;

/// Corresponds to the `head` table.
/// <https://learn.microsoft.com/en-us/typography/opentype/spec/head>
#[derive(Debug, Clone)]
pub struct HeadTable {
    pub major_version: u16,
    pub minor_version: u16,
    pub font_revision: f32,
    pub checksum_adjustment: u32,
    pub flags: u16,
    pub units_per_em: u16,
    /// Seconds since the 1904 font epoch.
    pub created: i64,
    pub modified: i64,
    pub x_min: i16,
    pub y_min: i16,
    pub x_max: i16,
    pub y_max: i16,
    pub mac_style: u16,
    pub lowest_rec_ppem: u16,
    pub font_direction_hint: i16,
    pub index_to_loc_format: i16,
    pub glyph_data_format: i16,
}

impl HeadTable {
    pub fn try_parse(bytes: &[u8]) -> Result<Self, OvtError> {
        let mut reader = FontReader::new(bytes, OvtErrorSource::HeadTable);

        let major_version = reader.read_u16()?;
        let minor_version = reader.read_u16()?;

        if major_version != 1 || minor_version != 0 {
            return Err(OvtError {
                kind: OvtErrorKind::UnexpectedVersion,
                source: OvtErrorSource::HeadTable,
            });
        }

        let font_revision = reader.read_fixed()?;
        let checksum_adjustment = reader.read_u32()?;
        let magic_number = reader.read_u32()?;

        if magic_number != 0x5f0f3cf5 {
            return Err(OvtError {
                kind: OvtErrorKind::Malformed,
                source: OvtErrorSource::HeadTable,
            });
        }

        Ok(Self {
            major_version,
            minor_version,
            font_revision,
            checksum_adjustment,
            flags: reader.read_u16()?,
            units_per_em: reader.read_u16()?,
            created: reader.read_i64()?,
            modified: reader.read_i64()?,
            x_min: reader.read_i16()?,
            y_min: reader.read_i16()?,
            x_max: reader.read_i16()?,
            y_max: reader.read_i16()?,
            mac_style: reader.read_u16()?,
            lowest_rec_ppem: reader.read_u16()?,
            font_direction_hint: reader.read_i16()?,
            index_to_loc_format: reader.read_i16()?,
            glyph_data_format: reader.read_i16()?,
        })
    }
}
