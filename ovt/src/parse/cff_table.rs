use crate::error::*;
use crate::parse::FontReader;

mod dict_op {
    pub const CHARSTRINGS: u16 = 17;
    pub const PRIVATE: u16 = 18;
    pub const SUBRS: u16 = 19;
    pub const DEFAULT_WIDTH_X: u16 = 20;
    pub const NOMINAL_WIDTH_X: u16 = 21;
    pub const CHARSTRING_TYPE: u16 = 0x0c06;
    pub const ROS: u16 = 0x0c1e;
}

/// Corresponds to the `CFF ` table.
/// <https://learn.microsoft.com/en-us/typography/opentype/spec/cff>
///
/// Only the pieces needed to run Type 2 charstrings are kept: the
/// charstring index, both subroutine indexes and the width defaults from
/// the private dict. CID-keyed fonts (a `ROS` entry in the top dict) are
/// not supported.
#[derive(Debug, Clone)]
pub struct CffTable {
    pub charstrings: Vec<Vec<u8>>,
    pub global_subrs: Vec<Vec<u8>>,
    pub local_subrs: Vec<Vec<u8>>,
    pub default_width_x: f32,
    pub nominal_width_x: f32,
}

impl CffTable {
    pub fn try_parse(bytes: &[u8]) -> Result<Self, OvtError> {
        let mut reader = FontReader::new(bytes, OvtErrorSource::CffTable);
        let major_version = reader.read_u8()?;
        // minor version, ignored
        reader.skip(1);
        let header_size = reader.read_u8()? as usize;
        // absolute-offset size, unused outside the header
        reader.skip(1);

        if major_version != 1 {
            return Err(OvtError {
                kind: OvtErrorKind::UnexpectedVersion,
                source: OvtErrorSource::CffTable,
            });
        }

        reader.seek(header_size);
        // name index
        read_index(&mut reader)?;
        let top_dicts = read_index(&mut reader)?;
        // string index
        read_index(&mut reader)?;
        let global_subrs = read_index(&mut reader)?;

        let top_dict = match top_dicts.first() {
            Some(data) => parse_dict(data)?,
            None => {
                return Err(OvtError {
                    kind: OvtErrorKind::Malformed,
                    source: OvtErrorSource::CffTable,
                })
            },
        };

        if dict_entry(&top_dict, dict_op::ROS).is_some() {
            return Err(OvtError {
                kind: OvtErrorKind::FormatNotSupported,
                source: OvtErrorSource::CffTable,
            });
        }

        if let Some(operands) = dict_entry(&top_dict, dict_op::CHARSTRING_TYPE) {
            if operands.first().copied() != Some(2.0) {
                return Err(OvtError {
                    kind: OvtErrorKind::FormatNotSupported,
                    source: OvtErrorSource::CffTable,
                });
            }
        }

        let charstrings_offset = match dict_entry(&top_dict, dict_op::CHARSTRINGS) {
            Some(&[offset]) if offset >= 0.0 => offset as usize,
            _ => {
                return Err(OvtError {
                    kind: OvtErrorKind::Malformed,
                    source: OvtErrorSource::CffTable,
                })
            },
        };

        reader.seek(charstrings_offset);
        let charstrings = read_index(&mut reader)?;

        let mut default_width_x = 0.0;
        let mut nominal_width_x = 0.0;
        let mut local_subrs = Vec::new();

        if let Some(&[size, offset]) = dict_entry(&top_dict, dict_op::PRIVATE) {
            if size < 0.0 || offset < 0.0 {
                return Err(OvtError {
                    kind: OvtErrorKind::Malformed,
                    source: OvtErrorSource::CffTable,
                });
            }

            let private_offset = offset as usize;
            let private_end = private_offset + size as usize;

            if private_end > bytes.len() {
                return Err(OvtError {
                    kind: OvtErrorKind::Truncated,
                    source: OvtErrorSource::CffTable,
                });
            }

            let private_dict = parse_dict(&bytes[private_offset..private_end])?;

            if let Some(&[width]) = dict_entry(&private_dict, dict_op::DEFAULT_WIDTH_X) {
                default_width_x = width as f32;
            }

            if let Some(&[width]) = dict_entry(&private_dict, dict_op::NOMINAL_WIDTH_X) {
                nominal_width_x = width as f32;
            }

            // The subrs offset is relative to the private dict.
            if let Some(&[subrs_offset]) = dict_entry(&private_dict, dict_op::SUBRS) {
                if subrs_offset < 0.0 {
                    return Err(OvtError {
                        kind: OvtErrorKind::Malformed,
                        source: OvtErrorSource::CffTable,
                    });
                }

                reader.seek(private_offset + subrs_offset as usize);
                local_subrs = read_index(&mut reader)?;
            }
        }

        Ok(Self {
            charstrings,
            global_subrs,
            local_subrs,
            default_width_x,
            nominal_width_x,
        })
    }

    pub fn num_glyphs(&self) -> u16 {
        self.charstrings.len() as u16
    }
}

/// Reads an INDEX at the reader's position, leaving the reader at its end.
fn read_index(reader: &mut FontReader) -> Result<Vec<Vec<u8>>, OvtError> {
    let count = reader.read_u16()? as usize;

    if count == 0 {
        return Ok(Vec::new());
    }

    let offset_size = reader.read_u8()?;
    let mut offsets = Vec::with_capacity(count + 1);

    for _ in 0..=count {
        let offset = match offset_size {
            1 => reader.read_u8()? as u32,
            2 => reader.read_u16()? as u32,
            3 => reader.read_u24()?,
            4 => reader.read_u32()?,
            _ => {
                return Err(OvtError {
                    kind: OvtErrorKind::Malformed,
                    source: OvtErrorSource::CffTable,
                })
            },
        };

        // Offsets are 1-based from the byte before the data block.
        if offset == 0 {
            return Err(OvtError {
                kind: OvtErrorKind::Malformed,
                source: OvtErrorSource::CffTable,
            });
        }

        offsets.push(offset - 1);
    }

    let mut entries = Vec::with_capacity(count);

    for pair in offsets.windows(2) {
        if pair[1] < pair[0] {
            return Err(OvtError {
                kind: OvtErrorKind::Malformed,
                source: OvtErrorSource::CffTable,
            });
        }

        entries.push(reader.read_bytes((pair[1] - pair[0]) as usize)?.to_vec());
    }

    Ok(entries)
}

/// Parses DICT data into `(operator, operands)` entries. Real-number
/// operands (byte 30) are rejected.
fn parse_dict(data: &[u8]) -> Result<Vec<(u16, Vec<f64>)>, OvtError> {
    let mut reader = FontReader::new(data, OvtErrorSource::CffTable);
    let mut entries = Vec::new();
    let mut operands = Vec::new();

    while reader.pos() < data.len() {
        let b0 = reader.read_u8()?;

        match b0 {
            0..=11 | 13..=21 => {
                entries.push((b0 as u16, std::mem::take(&mut operands)));
            },
            12 => {
                let b1 = reader.read_u8()?;
                entries.push((0x0c00 | b1 as u16, std::mem::take(&mut operands)));
            },
            28 => operands.push(reader.read_i16()? as f64),
            29 => operands.push(reader.read_i32()? as f64),
            30 => {
                return Err(OvtError {
                    kind: OvtErrorKind::FormatNotSupported,
                    source: OvtErrorSource::CffTable,
                });
            },
            32..=246 => operands.push(b0 as f64 - 139.0),
            247..=250 => {
                let b1 = reader.read_u8()?;
                operands.push((b0 as f64 - 247.0) * 256.0 + b1 as f64 + 108.0);
            },
            251..=254 => {
                let b1 = reader.read_u8()?;
                operands.push(-(b0 as f64 - 251.0) * 256.0 - b1 as f64 - 108.0);
            },
            _ => {
                return Err(OvtError {
                    kind: OvtErrorKind::Malformed,
                    source: OvtErrorSource::CffTable,
                });
            },
        }
    }

    Ok(entries)
}

fn dict_entry(entries: &[(u16, Vec<f64>)], op: u16) -> Option<&[f64]> {
    entries
        .iter()
        .find(|(entry_op, _)| *entry_op == op)
        .map(|(_, operands)| operands.as_slice())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::cff_bytes;

    #[test]
    fn parses_charstrings_and_widths() {
        let bytes = cff_bytes(&[&[14], &[100, 22, 14]], &[], &[], 250, 400);
        let cff = CffTable::try_parse(&bytes).unwrap();
        assert_eq!(cff.num_glyphs(), 2);
        assert_eq!(cff.charstrings[0], vec![14]);
        assert_eq!(cff.charstrings[1], vec![100, 22, 14]);
        assert_eq!(cff.default_width_x, 250.0);
        assert_eq!(cff.nominal_width_x, 400.0);
        assert!(cff.local_subrs.is_empty());
    }

    #[test]
    fn parses_subr_indexes() {
        let bytes = cff_bytes(&[&[14]], &[&[11]], &[&[22, 11]], 0, 0);
        let cff = CffTable::try_parse(&bytes).unwrap();
        assert_eq!(cff.global_subrs, vec![vec![11]]);
        assert_eq!(cff.local_subrs, vec![vec![22, 11]]);
    }

    #[test]
    fn rejects_real_operands() {
        let mut bytes = cff_bytes(&[&[14]], &[], &[], 0, 0);
        // Corrupt the first operand of the top dict into a real number.
        // The top dict index data starts after the header (4), the name
        // index (8) and the top dict index prelude (5).
        bytes[17] = 30;
        let err = CffTable::try_parse(&bytes).unwrap_err();
        assert_eq!(err.kind, OvtErrorKind::FormatNotSupported);
        assert_eq!(err.source, OvtErrorSource::CffTable);
    }

    #[test]
    fn dict_operand_encodings() {
        let entries = parse_dict(&[0x8b, 17]).unwrap();
        assert_eq!(entries, vec![(17, vec![0.0])]);
        let entries = parse_dict(&[28, 0xFF, 0x38, 17]).unwrap();
        assert_eq!(entries, vec![(17, vec![-200.0])]);
        let entries = parse_dict(&[247, 0, 17]).unwrap();
        assert_eq!(entries, vec![(17, vec![108.0])]);
        let entries = parse_dict(&[251, 0, 17]).unwrap();
        assert_eq!(entries, vec![(17, vec![-108.0])]);
        let entries = parse_dict(&[29, 0, 1, 0, 0, 12, 6]).unwrap();
        assert_eq!(entries, vec![(0x0c06, vec![65536.0])]);
    }
}
