use crate::error::*;
use crate::parse::{FontReader, HheaTable, MaxpTable};

/// Corresponds to the `hmtx` table.
/// <https://learn.microsoft.com/en-us/typography/opentype/spec/hmtx>
#[derive(Debug, Clone)]
pub struct HmtxTable {
    pub hor_metrics: Vec<HorMetric>,
    pub left_side_bearings: Vec<i16>,
    advance_width_max: u16,
}

#[derive(Debug, Clone)]
pub struct HorMetric {
    pub advance_width: u16,
    pub lsb: i16,
}

impl HmtxTable {
    pub fn try_parse(
        bytes: &[u8],
        maxp_table: &MaxpTable,
        hhea_table: &HheaTable,
    ) -> Result<Self, OvtError> {
        if maxp_table.num_glyphs < hhea_table.number_of_h_metrics {
            return Err(OvtError {
                kind: OvtErrorKind::Malformed,
                source: OvtErrorSource::HmtxTable,
            });
        }

        let mut reader = FontReader::new(bytes, OvtErrorSource::HmtxTable);
        let hor_metrics_len = hhea_table.number_of_h_metrics as usize;
        let left_side_bearings_len = maxp_table.num_glyphs as usize - hor_metrics_len;
        let mut hor_metrics = Vec::with_capacity(hor_metrics_len);

        for _ in 0..hor_metrics_len {
            hor_metrics.push(HorMetric {
                advance_width: reader.read_u16()?,
                lsb: reader.read_i16()?,
            });
        }

        let mut left_side_bearings = Vec::with_capacity(left_side_bearings_len);

        for _ in 0..left_side_bearings_len {
            left_side_bearings.push(reader.read_i16()?);
        }

        Ok(Self {
            hor_metrics,
            left_side_bearings,
            advance_width_max: hhea_table.advance_width_max,
        })
    }

    /// Advance width for a glyph id. Glyphs beyond the long-metric array
    /// share the last metric's advance; ids beyond the table entirely fall
    /// back to `hhea`'s advance-width-max.
    pub fn advance_width(&self, glyph_id: u16) -> u16 {
        let glyph_id = glyph_id as usize;

        if glyph_id < self.hor_metrics.len() {
            self.hor_metrics[glyph_id].advance_width
        } else if glyph_id < self.hor_metrics.len() + self.left_side_bearings.len() {
            match self.hor_metrics.last() {
                Some(metric) => metric.advance_width,
                None => self.advance_width_max,
            }
        } else {
            self.advance_width_max
        }
    }

    pub fn left_side_bearing(&self, glyph_id: u16) -> i16 {
        let glyph_id = glyph_id as usize;

        if glyph_id < self.hor_metrics.len() {
            self.hor_metrics[glyph_id].lsb
        } else {
            self.left_side_bearings
                .get(glyph_id - self.hor_metrics.len())
                .copied()
                .unwrap_or(0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{hhea_bytes, hmtx_bytes, maxp_bytes};

    fn table(advances: &[(u16, i16)], num_glyphs: u16, advance_width_max: u16) -> HmtxTable {
        let maxp = MaxpTable::try_parse(&maxp_bytes(0x00010000, num_glyphs)).unwrap();
        let hhea = HheaTable::try_parse(&hhea_bytes(
            800,
            -200,
            advance_width_max,
            advances.len() as u16,
        ))
        .unwrap();
        let lsb_count = num_glyphs as usize - advances.len();
        HmtxTable::try_parse(&hmtx_bytes(advances, &vec![0; lsb_count]), &maxp, &hhea).unwrap()
    }

    #[test]
    fn advance_within_metrics() {
        let hmtx = table(&[(500, 10), (600, 20)], 2, 1000);
        assert_eq!(hmtx.advance_width(0), 500);
        assert_eq!(hmtx.advance_width(1), 600);
        assert_eq!(hmtx.left_side_bearing(1), 20);
    }

    #[test]
    fn tail_glyphs_share_last_advance() {
        let hmtx = table(&[(500, 10), (600, 20)], 4, 1000);
        assert_eq!(hmtx.advance_width(2), 600);
        assert_eq!(hmtx.advance_width(3), 600);
    }

    #[test]
    fn out_of_range_falls_back_to_max() {
        let hmtx = table(&[(500, 10)], 1, 1234);
        assert_eq!(hmtx.advance_width(9), 1234);
    }
}
