//! This `mod` contains the raw parsed data of a font file.

use crate::error::*;

pub mod cff_table;
pub mod cmap_table;
pub mod font;
pub mod head_table;
pub mod hhea_table;
pub mod hmtx_table;
pub mod loca_table;
pub mod maxp_table;
pub mod name_table;
pub mod reader;
pub mod table_directory;
pub mod ttc_header;

pub use cff_table::CffTable;
pub use cmap_table::{CmapSubtable, CmapTable, EncodingRecord};
pub use font::{Font, FontMetrics};
pub use head_table::HeadTable;
pub use hhea_table::HheaTable;
pub use hmtx_table::HmtxTable;
pub use loca_table::LocaTable;
pub use maxp_table::MaxpTable;
pub use name_table::{name_id, LangTagRecord, NameRecord, NameTable};
pub use reader::FontReader;
pub use table_directory::{ChecksumMismatch, TableDirectory, TableRecord};
pub use ttc_header::TTCHeader;

fn read_utf16be(
    bytes: &[u8],
    offset: usize,
    length: usize,
    source: OvtErrorSource,
) -> Result<String, OvtError> {
    if length % 2 != 0 {
        return Err(OvtError {
            kind: OvtErrorKind::Malformed,
            source,
        });
    }

    if offset + length > bytes.len() {
        return Err(OvtError {
            kind: OvtErrorKind::Truncated,
            source,
        });
    }

    let utf16 = bytes[offset..(offset + length)]
        .chunks_exact(2)
        .map(|chunk| u16::from_be_bytes(chunk.try_into().unwrap()))
        .collect::<Vec<u16>>();

    String::from_utf16(&utf16).map_err(|_| {
        OvtError {
            kind: OvtErrorKind::Malformed,
            source,
        }
    })
}

pub const fn tag(bytes: &[u8; 4]) -> u32 {
    u32::from_be_bytes(*bytes)
}

pub mod table_tag {
    use super::tag;
    pub const CMAP: u32 = tag(b"cmap");
    pub const HEAD: u32 = tag(b"head");
    pub const HHEA: u32 = tag(b"hhea");
    pub const HMTX: u32 = tag(b"hmtx");
    pub const MAXP: u32 = tag(b"maxp");
    pub const LOCA: u32 = tag(b"loca");
    pub const GLYF: u32 = tag(b"glyf");
    pub const CFF: u32 = tag(b"CFF ");
    pub const NAME: u32 = tag(b"name");
    pub const GPOS: u32 = tag(b"GPOS");
    pub const GSUB: u32 = tag(b"GSUB");
}
