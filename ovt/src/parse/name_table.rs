use log::debug;

use crate::error::*;
use crate::parse::{read_utf16be, FontReader};

/// Well-known name ids.
pub mod name_id {
    pub const FAMILY: u16 = 1;
    pub const SUBFAMILY: u16 = 2;
    pub const UNIQUE_ID: u16 = 3;
    pub const FULL_NAME: u16 = 4;
    pub const VERSION: u16 = 5;
    pub const POSTSCRIPT_NAME: u16 = 6;
}

/// Corresponds to the `name` table.
/// <https://learn.microsoft.com/en-us/typography/opentype/spec/name>
///
/// Only records in UTF-16BE encodings (platform 0, or platform 3 with
/// encoding 1 or 10) are retained.
#[derive(Debug, Clone)]
pub struct NameTable {
    pub version: u16,
    pub name_records: Vec<NameRecord>,
    pub lang_tag_records: Vec<LangTagRecord>,
}

impl NameTable {
    pub fn try_parse(bytes: &[u8]) -> Result<Self, OvtError> {
        let mut reader = FontReader::new(bytes, OvtErrorSource::NameTable);
        let version = reader.read_u16()?;

        if version != 0 && version != 1 {
            return Err(OvtError {
                kind: OvtErrorKind::UnexpectedVersion,
                source: OvtErrorSource::NameTable,
            });
        }

        let name_count = reader.read_u16()? as usize;
        let storage_offset = reader.read_u16()? as usize;
        let mut name_records = Vec::with_capacity(name_count);

        for _ in 0..name_count {
            match NameRecord::try_parse(&mut reader, bytes, storage_offset)? {
                Some(record) => name_records.push(record),
                None => (),
            }
        }

        let lang_tag_records = if version == 1 {
            let lang_tag_count = reader.read_u16()? as usize;
            let mut lang_tag_records = Vec::with_capacity(lang_tag_count);

            for _ in 0..lang_tag_count {
                lang_tag_records.push(LangTagRecord::try_parse(
                    &mut reader,
                    bytes,
                    storage_offset,
                )?);
            }

            lang_tag_records
        } else {
            Vec::new()
        };

        Ok(Self {
            version,
            name_records,
            lang_tag_records,
        })
    }

    /// First record with the given name id, preferring English
    /// (language id 0 or 0x409) when several languages are present.
    pub fn name(&self, name_id: u16) -> Option<&str> {
        self.name_records
            .iter()
            .filter(|record| record.name_id == name_id)
            .max_by_key(|record| {
                match record.language_id {
                    0x409 => 2,
                    0 => 1,
                    _ => 0,
                }
            })
            .map(|record| record.name.as_str())
    }

    pub fn family(&self) -> Option<&str> {
        self.name(name_id::FAMILY)
    }

    pub fn subfamily(&self) -> Option<&str> {
        self.name(name_id::SUBFAMILY)
    }

    pub fn full_name(&self) -> Option<&str> {
        self.name(name_id::FULL_NAME)
    }

    pub fn postscript_name(&self) -> Option<&str> {
        self.name(name_id::POSTSCRIPT_NAME)
    }
}

#[derive(Debug, Clone)]
pub struct NameRecord {
    pub platform_id: u16,
    pub encoding_id: u16,
    pub language_id: u16,
    pub name_id: u16,
    pub name: String,
}

impl NameRecord {
    fn try_parse(
        reader: &mut FontReader,
        bytes: &[u8],
        storage_offset: usize,
    ) -> Result<Option<Self>, OvtError> {
        let platform_id = reader.read_u16()?;
        let encoding_id = reader.read_u16()?;
        let language_id = reader.read_u16()?;
        let name_id = reader.read_u16()?;
        let length = reader.read_u16()? as usize;
        let string_offset = reader.read_u16()? as usize + storage_offset;

        let utf16be = match (platform_id, encoding_id) {
            (0, _) | (3, 1) | (3, 10) => true,
            _ => false,
        };

        if !utf16be {
            debug!(
                "skipping name record (platform {}, encoding {})",
                platform_id, encoding_id
            );

            return Ok(None);
        }

        let name = read_utf16be(bytes, string_offset, length, OvtErrorSource::NameRecord)?;

        Ok(Some(Self {
            platform_id,
            encoding_id,
            language_id,
            name_id,
            name,
        }))
    }
}

#[derive(Debug, Clone)]
pub struct LangTagRecord(pub String);

impl LangTagRecord {
    fn try_parse(
        reader: &mut FontReader,
        bytes: &[u8],
        storage_offset: usize,
    ) -> Result<Self, OvtError> {
        let length = reader.read_u16()? as usize;
        let lang_tag_offset = reader.read_u16()? as usize + storage_offset;

        Ok(Self(read_utf16be(
            bytes,
            lang_tag_offset,
            length,
            OvtErrorSource::NameTagRecord,
        )?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::name_table_bytes;

    #[test]
    fn resolves_names_preferring_english() {
        let bytes = name_table_bytes(&[
            (3, 1, 0x407, name_id::FAMILY, "Beispiel"),
            (3, 1, 0x409, name_id::FAMILY, "Example"),
            (3, 1, 0x409, name_id::POSTSCRIPT_NAME, "Example-Regular"),
        ]);
        let name = NameTable::try_parse(&bytes).unwrap();
        assert_eq!(name.family(), Some("Example"));
        assert_eq!(name.postscript_name(), Some("Example-Regular"));
        assert_eq!(name.subfamily(), None);
    }

    #[test]
    fn skips_non_utf16_platforms() {
        let bytes = name_table_bytes(&[(1, 0, 0, name_id::FAMILY, "Mac")]);
        let name = NameTable::try_parse(&bytes).unwrap();
        assert!(name.name_records.is_empty());
    }
}
