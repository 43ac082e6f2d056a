use crate::error::*;
use crate::parse::FontReader;

/// Corresponds to the `maxp` table.
/// <https://learn.microsoft.com/en-us/typography/opentype/spec/maxp>
///
/// Version 0.5 (CFF outlines) carries only `num_glyphs`; the remaining
/// fields are zero in that case.
#[derive(Debug, Clone)]
pub struct MaxpTable {
    pub version: u32,
    pub num_glyphs: u16,
    pub max_points: u16,
    pub max_contours: u16,
    pub max_composite_points: u16,
    pub max_composite_contours: u16,
    pub max_component_elements: u16,
    pub max_component_depth: u16,
}

impl MaxpTable {
    pub fn try_parse(bytes: &[u8]) -> Result<Self, OvtError> {
        let mut reader = FontReader::new(bytes, OvtErrorSource::MaxpTable);

        let version = reader.read_u32()?;
        let num_glyphs = reader.read_u16()?;

        match version {
            0x00005000 => {
                Ok(Self {
                    version,
                    num_glyphs,
                    max_points: 0,
                    max_contours: 0,
                    max_composite_points: 0,
                    max_composite_contours: 0,
                    max_component_elements: 0,
                    max_component_depth: 0,
                })
            },
            0x00010000 => {
                let max_points = reader.read_u16()?;
                let max_contours = reader.read_u16()?;
                let max_composite_points = reader.read_u16()?;
                let max_composite_contours = reader.read_u16()?;
                // maxZones through maxSizeOfInstructions
                reader.skip(16);
                let max_component_elements = reader.read_u16()?;
                let max_component_depth = reader.read_u16()?;

                Ok(Self {
                    version,
                    num_glyphs,
                    max_points,
                    max_contours,
                    max_composite_points,
                    max_composite_contours,
                    max_component_elements,
                    max_component_depth,
                })
            },
            _ => {
                Err(OvtError {
                    kind: OvtErrorKind::UnexpectedVersion,
                    source: OvtErrorSource::MaxpTable,
                })
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::maxp_bytes;

    #[test]
    fn parses_version_0_5() {
        let maxp = MaxpTable::try_parse(&maxp_bytes(0x00005000, 17)).unwrap();
        assert_eq!(maxp.num_glyphs, 17);
        assert_eq!(maxp.max_points, 0);
    }

    #[test]
    fn parses_version_1_0() {
        let maxp = MaxpTable::try_parse(&maxp_bytes(0x00010000, 42)).unwrap();
        assert_eq!(maxp.num_glyphs, 42);
    }

    #[test]
    fn rejects_unknown_version() {
        let err = MaxpTable::try_parse(&maxp_bytes(0x00020000, 1)).unwrap_err();
        assert_eq!(err.kind, OvtErrorKind::UnexpectedVersion);
    }
}
