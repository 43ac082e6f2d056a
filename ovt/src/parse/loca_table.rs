use crate::error::*;
use crate::parse::{FontReader, HeadTable, MaxpTable};

/// Corresponds to the `loca` table.
/// <https://learn.microsoft.com/en-us/typography/opentype/spec/loca>
///
/// Offsets are normalized to bytes from the start of `glyf` regardless of
/// the short/long storage format.
#[derive(Debug, Clone)]
pub struct LocaTable {
    pub offsets: Vec<u32>,
}

impl LocaTable {
    pub fn try_parse(
        bytes: &[u8],
        head_table: &HeadTable,
        maxp_table: &MaxpTable,
    ) -> Result<Self, OvtError> {
        let mut reader = FontReader::new(bytes, OvtErrorSource::LocaTable);
        let num_glyphs = maxp_table.num_glyphs as usize;
        let mut offsets = Vec::with_capacity(num_glyphs + 1);

        match head_table.index_to_loc_format {
            0 => {
                for _ in 0..=num_glyphs {
                    offsets.push(reader.read_u16()? as u32 * 2);
                }
            },
            1 => {
                for _ in 0..=num_glyphs {
                    offsets.push(reader.read_u32()?);
                }
            },
            _ => {
                return Err(OvtError {
                    kind: OvtErrorKind::FormatNotSupported,
                    source: OvtErrorSource::LocaTable,
                })
            },
        }

        Ok(Self {
            offsets,
        })
    }

    /// Byte offset of a glyph within `glyf`, or `None` for an empty glyph
    /// (equal consecutive offsets, e.g. a space).
    pub fn offset(&self, glyph_id: u16) -> Option<u32> {
        let glyph_id = glyph_id as usize;

        if glyph_id + 1 >= self.offsets.len() {
            return None;
        }

        if self.offsets[glyph_id] == self.offsets[glyph_id + 1] {
            None
        } else {
            Some(self.offsets[glyph_id])
        }
    }
}
