use crate::error::*;
use crate::parse::{tag, table_tag, FontReader};

/// Corresponds to the *"Table Directory"*
/// <https://learn.microsoft.com/en-us/typography/opentype/spec/otff>
#[derive(Debug, Clone)]
pub struct TableDirectory {
    pub sfnt_version: u32,
    pub table_records: Vec<TableRecord>,
}

/// A stored/computed checksum pair for a table that failed verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChecksumMismatch {
    pub table_tag: u32,
    pub stored: u32,
    pub computed: u32,
}

impl TableDirectory {
    pub fn try_parse(bytes: &[u8], base_offset: usize) -> Result<Self, OvtError> {
        let mut reader = FontReader::new(bytes, OvtErrorSource::TableDirectory);
        reader.seek(base_offset);

        let sfnt_version = reader.read_u32()?;

        // 0x00010000 is TrueType outlines, OTTO is CFF outlines.
        if sfnt_version != 0x00010000 && sfnt_version != tag(b"OTTO") {
            return Err(OvtError {
                kind: OvtErrorKind::InvalidSfntVersion,
                source: OvtErrorSource::TableDirectory,
            });
        }

        let num_tables = reader.read_u16()?;
        // searchRange, entrySelector, rangeShift
        reader.skip(6);

        let mut table_records = Vec::with_capacity(num_tables as usize);

        for _ in 0..num_tables {
            table_records.push(TableRecord::try_parse(&mut reader)?);
        }

        Ok(Self {
            sfnt_version,
            table_records,
        })
    }

    pub fn record(&self, table_tag: u32) -> Option<&TableRecord> {
        self.table_records
            .iter()
            .find(|record| record.table_tag == table_tag)
    }

    /// Bytes of `table_tag` within `bytes`, or a `MissingTable` error
    /// attributed to `source`.
    pub fn table_bytes<'a>(
        &self,
        bytes: &'a [u8],
        table_tag: u32,
        source: OvtErrorSource,
    ) -> Result<&'a [u8], OvtError> {
        let record = self.record(table_tag).ok_or(OvtError {
            kind: OvtErrorKind::MissingTable,
            source,
        })?;

        let start = record.offset as usize;
        let end = start + record.length as usize;

        if end > bytes.len() {
            return Err(OvtError {
                kind: OvtErrorKind::Truncated,
                source,
            });
        }

        Ok(&bytes[start..end])
    }

    /// Re-sum every table and report the ones whose stored checksum does not
    /// match. Mismatches are reported, never fatal; callers may proceed at
    /// their own risk. The `head` table is skipped since its
    /// checksum-adjustment field makes the stored value unverifiable in
    /// place.
    pub fn verify_checksums(&self, bytes: &[u8]) -> Vec<ChecksumMismatch> {
        let mut mismatches = Vec::new();

        for record in self.table_records.iter() {
            if record.table_tag == table_tag::HEAD {
                continue;
            }

            let start = record.offset as usize;
            let end = start + record.length as usize;

            if end > bytes.len() {
                continue;
            }

            let computed = table_checksum(&bytes[start..end]);

            if computed != record.checksum {
                mismatches.push(ChecksumMismatch {
                    table_tag: record.table_tag,
                    stored: record.checksum,
                    computed,
                });
            }
        }

        mismatches
    }
}

/// Wrapping sum of big-endian u32 words; a partial trailing word is
/// zero-padded.
fn table_checksum(bytes: &[u8]) -> u32 {
    let mut sum = 0u32;

    for chunk in bytes.chunks(4) {
        let mut word = [0u8; 4];
        word[..chunk.len()].copy_from_slice(chunk);
        sum = sum.wrapping_add(u32::from_be_bytes(word));
    }

    sum
}

/// Corresponds to the *"Table Record"*
/// <https://learn.microsoft.com/en-us/typography/opentype/spec/otff>
#[derive(Debug, Clone)]
pub struct TableRecord {
    pub table_tag: u32,
    pub checksum: u32,
    pub offset: u32,
    pub length: u32,
}

impl TableRecord {
    fn try_parse(reader: &mut FontReader) -> Result<Self, OvtError> {
        Ok(Self {
            table_tag: reader.read_tag()?,
            checksum: reader.read_u32()?,
            offset: reader.read_u32()?,
            length: reader.read_u32()?,
        })
    }
}
