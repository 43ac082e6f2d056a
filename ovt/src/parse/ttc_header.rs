use crate::error::*;
use crate::parse::{tag, FontReader};

/// Corresponds to the *"TTC Header"*
/// <https://learn.microsoft.com/en-us/typography/opentype/spec/otff>
///
/// Collections are detected so they can be rejected up front; only the
/// directory offsets are retained.
#[derive(Debug, Clone)]
pub struct TTCHeader {
    pub major_version: u16,
    pub minor_version: u16,
    pub table_directory_offsets: Vec<u32>,
}

impl TTCHeader {
    pub fn try_parse(bytes: &[u8]) -> Result<Self, OvtError> {
        let mut reader = FontReader::new(bytes, OvtErrorSource::TTCHeader);

        if reader.read_tag()? != tag(b"ttcf") {
            return Err(OvtError {
                kind: OvtErrorKind::UnexpectedTag,
                source: OvtErrorSource::TTCHeader,
            });
        }

        let major_version = reader.read_u16()?;
        let minor_version = reader.read_u16()?;
        let num_fonts = reader.read_u32()? as usize;

        if 12 + num_fonts * 4 > bytes.len() {
            return Err(OvtError {
                kind: OvtErrorKind::Truncated,
                source: OvtErrorSource::TTCHeader,
            });
        }

        let mut table_directory_offsets = Vec::with_capacity(num_fonts);

        for _ in 0..num_fonts {
            table_directory_offsets.push(reader.read_u32()?);
        }

        Ok(Self {
            major_version,
            minor_version,
            table_directory_offsets,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::ByteWriter;

    #[test]
    fn parses_directory_offsets() {
        let bytes = ByteWriter::new()
            .bytes(b"ttcf")
            .u16(1)
            .u16(0)
            .u32(2)
            .u32(20)
            .u32(0x0200)
            .take();
        let header = TTCHeader::try_parse(&bytes).unwrap();
        assert_eq!(header.major_version, 1);
        assert_eq!(header.table_directory_offsets, vec![20, 0x0200]);
    }

    #[test]
    fn rejects_non_collection() {
        let bytes = ByteWriter::new().u32(0x00010000).u16(4).take();
        let err = TTCHeader::try_parse(&bytes).unwrap_err();
        assert_eq!(err.kind, OvtErrorKind::UnexpectedTag);
        assert_eq!(err.source, OvtErrorSource::TTCHeader);
    }

    #[test]
    fn rejects_font_count_past_the_buffer() {
        let bytes = ByteWriter::new()
            .bytes(b"ttcf")
            .u16(1)
            .u16(0)
            .u32(0x10000000)
            .take();
        let err = TTCHeader::try_parse(&bytes).unwrap_err();
        assert_eq!(err.kind, OvtErrorKind::Truncated);
    }
}
