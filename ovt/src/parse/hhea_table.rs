use crate::error::*;
use crate::parse::FontReader;

/// Corresponds to the `hhea` table.
/// <https://learn.microsoft.com/en-us/typography/opentype/spec/hhea>
#[derive(Debug, Clone)]
pub struct HheaTable {
    pub major_version: u16,
    pub minor_version: u16,
    pub ascender: i16,
    pub descender: i16,
    pub line_gap: i16,
    pub advance_width_max: u16,
    pub min_left_side_bearing: i16,
    pub min_right_side_bearing: i16,
    pub x_max_extent: i16,
    pub caret_slope_rise: i16,
    pub caret_slope_run: i16,
    pub caret_offset: i16,
    pub metric_data_format: i16,
    pub number_of_h_metrics: u16,
}

impl HheaTable {
    pub fn try_parse(bytes: &[u8]) -> Result<Self, OvtError> {
        let mut reader = FontReader::new(bytes, OvtErrorSource::HheaTable);

        let major_version = reader.read_u16()?;
        let minor_version = reader.read_u16()?;

        if major_version != 1 || minor_version != 0 {
            return Err(OvtError {
                kind: OvtErrorKind::UnexpectedVersion,
                source: OvtErrorSource::HheaTable,
            });
        }

        let ascender = reader.read_i16()?;
        let descender = reader.read_i16()?;
        let line_gap = reader.read_i16()?;
        let advance_width_max = reader.read_u16()?;
        let min_left_side_bearing = reader.read_i16()?;
        let min_right_side_bearing = reader.read_i16()?;
        let x_max_extent = reader.read_i16()?;
        let caret_slope_rise = reader.read_i16()?;
        let caret_slope_run = reader.read_i16()?;
        let caret_offset = reader.read_i16()?;
        // Four reserved i16 fields.
        reader.skip(8);
        let metric_data_format = reader.read_i16()?;
        let number_of_h_metrics = reader.read_u16()?;

        Ok(Self {
            major_version,
            minor_version,
            ascender,
            descender,
            line_gap,
            advance_width_max,
            min_left_side_bearing,
            min_right_side_bearing,
            x_max_extent,
            caret_slope_rise,
            caret_slope_run,
            caret_offset,
            metric_data_format,
            number_of_h_metrics,
        })
    }
}
