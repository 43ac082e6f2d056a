use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::*;
use crate::layout::{FontFeatures, GposTable, GsubTable, LayoutContext};
use crate::outline::{CharstringDecoder, GlyfTable, GlyphOutline};
use crate::parse::{
    table_tag, CffTable, ChecksumMismatch, CmapTable, HeadTable, HheaTable, HmtxTable,
    LocaTable, MaxpTable, NameTable, TTCHeader, TableDirectory,
};

/// Vertical and horizontal extents of a font, in design units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FontMetrics {
    pub units_per_em: u16,
    pub ascender: i16,
    pub descender: i16,
    pub line_gap: i16,
    pub x_min: i16,
    pub y_min: i16,
    pub x_max: i16,
    pub y_max: i16,
    pub advance_width_max: u16,
}

#[derive(Debug)]
enum OutlineSource {
    Glyf {
        glyf_table: GlyfTable,
        loca_table: LocaTable,
    },
    Cff(CffTable),
}

/// A parsed font file. Construction parses every table eagerly except
/// glyph data, which is decoded on demand and cached.
#[derive(Debug)]
pub struct Font {
    bytes: Vec<u8>,
    table_directory: TableDirectory,
    head_table: HeadTable,
    hhea_table: HheaTable,
    maxp_table: MaxpTable,
    hmtx_table: HmtxTable,
    cmap_table: CmapTable,
    active_cmap: usize,
    name_table: Option<NameTable>,
    gpos_table: Option<GposTable>,
    gsub_table: Option<GsubTable>,
    outlines: OutlineSource,
    outline_cache: Mutex<HashMap<u16, Arc<GlyphOutline>>>,
    glyph_index_cache: Mutex<HashMap<char, u16>>,
}

impl Font {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, OvtError> {
        match TTCHeader::try_parse(bytes) {
            Err(OvtError {
                kind: OvtErrorKind::UnexpectedTag,
                ..
            }) => (),
            _ => {
                return Err(OvtError {
                    kind: OvtErrorKind::CollectionNotSupported,
                    source: OvtErrorSource::TTCHeader,
                })
            },
        }

        let table_directory = TableDirectory::try_parse(bytes, 0)?;
        let head_table = HeadTable::try_parse(table_directory.table_bytes(
            bytes,
            table_tag::HEAD,
            OvtErrorSource::HeadTable,
        )?)?;
        let hhea_table = HheaTable::try_parse(table_directory.table_bytes(
            bytes,
            table_tag::HHEA,
            OvtErrorSource::HheaTable,
        )?)?;
        let maxp_table = MaxpTable::try_parse(table_directory.table_bytes(
            bytes,
            table_tag::MAXP,
            OvtErrorSource::MaxpTable,
        )?)?;
        let hmtx_table = HmtxTable::try_parse(
            table_directory.table_bytes(bytes, table_tag::HMTX, OvtErrorSource::HmtxTable)?,
            &maxp_table,
            &hhea_table,
        )?;
        let cmap_table = CmapTable::try_parse(table_directory.table_bytes(
            bytes,
            table_tag::CMAP,
            OvtErrorSource::CmapTable,
        )?)?;
        let active_cmap = cmap_table.preferred_index();

        let outlines = if table_directory.record(table_tag::GLYF).is_some()
            && table_directory.record(table_tag::LOCA).is_some()
        {
            let loca_table = LocaTable::try_parse(
                table_directory.table_bytes(
                    bytes,
                    table_tag::LOCA,
                    OvtErrorSource::LocaTable,
                )?,
                &head_table,
                &maxp_table,
            )?;
            let glyf_bytes = table_directory.table_bytes(
                bytes,
                table_tag::GLYF,
                OvtErrorSource::GlyfTable,
            )?;

            OutlineSource::Glyf {
                glyf_table: GlyfTable::new(glyf_bytes.to_vec()),
                loca_table,
            }
        } else if table_directory.record(table_tag::CFF).is_some() {
            OutlineSource::Cff(CffTable::try_parse(table_directory.table_bytes(
                bytes,
                table_tag::CFF,
                OvtErrorSource::CffTable,
            )?)?)
        } else {
            return Err(OvtError {
                kind: OvtErrorKind::NoOutlineTable,
                source: OvtErrorSource::FontData,
            });
        };

        let name_table = match table_directory.record(table_tag::NAME) {
            Some(_) => {
                Some(NameTable::try_parse(table_directory.table_bytes(
                    bytes,
                    table_tag::NAME,
                    OvtErrorSource::NameTable,
                )?)?)
            },
            None => None,
        };

        let gpos_table = match table_directory.record(table_tag::GPOS) {
            Some(_) => {
                Some(GposTable::try_parse(table_directory.table_bytes(
                    bytes,
                    table_tag::GPOS,
                    OvtErrorSource::GposTable,
                )?)?)
            },
            None => None,
        };

        let gsub_table = match table_directory.record(table_tag::GSUB) {
            Some(_) => {
                Some(GsubTable::try_parse(table_directory.table_bytes(
                    bytes,
                    table_tag::GSUB,
                    OvtErrorSource::GsubTable,
                )?)?)
            },
            None => None,
        };

        Ok(Self {
            bytes: bytes.to_vec(),
            table_directory,
            head_table,
            hhea_table,
            maxp_table,
            hmtx_table,
            cmap_table,
            active_cmap,
            name_table,
            gpos_table,
            gsub_table,
            outlines,
            outline_cache: Mutex::new(HashMap::new()),
            glyph_index_cache: Mutex::new(HashMap::new()),
        })
    }

    pub fn head_table(&self) -> &HeadTable {
        &self.head_table
    }

    pub fn hhea_table(&self) -> &HheaTable {
        &self.hhea_table
    }

    pub fn name_table(&self) -> Option<&NameTable> {
        self.name_table.as_ref()
    }

    pub fn num_glyphs(&self) -> u16 {
        self.maxp_table.num_glyphs
    }

    pub fn units_per_em(&self) -> u16 {
        self.head_table.units_per_em
    }

    pub fn metrics(&self) -> FontMetrics {
        FontMetrics {
            units_per_em: self.head_table.units_per_em,
            ascender: self.hhea_table.ascender,
            descender: self.hhea_table.descender,
            line_gap: self.hhea_table.line_gap,
            x_min: self.head_table.x_min,
            y_min: self.head_table.y_min,
            x_max: self.head_table.x_max,
            y_max: self.head_table.y_max,
            advance_width_max: self.hhea_table.advance_width_max,
        }
    }

    pub fn family(&self) -> Option<&str> {
        self.name_table.as_ref().and_then(|name| name.family())
    }

    pub fn subfamily(&self) -> Option<&str> {
        self.name_table.as_ref().and_then(|name| name.subfamily())
    }

    pub fn full_name(&self) -> Option<&str> {
        self.name_table.as_ref().and_then(|name| name.full_name())
    }

    pub fn postscript_name(&self) -> Option<&str> {
        self.name_table
            .as_ref()
            .and_then(|name| name.postscript_name())
    }

    pub fn cmap_count(&self) -> usize {
        self.cmap_table.encoding_records.len()
    }

    /// Selects the character map used by `glyph_index`. Cached character
    /// lookups are discarded since the mapping changes.
    pub fn use_cmap(&mut self, index: usize) -> Result<(), OvtError> {
        if index >= self.cmap_table.encoding_records.len() {
            return Err(OvtError {
                kind: OvtErrorKind::Malformed,
                source: OvtErrorSource::EncodingRecord,
            });
        }

        self.active_cmap = index;
        self.glyph_index_cache.lock().clear();
        Ok(())
    }

    /// Glyph id for a character via the active character map; 0
    /// ("notdef") when unmapped.
    pub fn glyph_index(&self, c: char) -> u16 {
        let mut cache = self.glyph_index_cache.lock();

        match cache.get(&c) {
            Some(&glyph_id) => glyph_id,
            None => {
                let glyph_id = self.cmap_table.encoding_records[self.active_cmap]
                    .subtable
                    .glyph_id(c as u32);
                cache.insert(c, glyph_id);
                glyph_id
            },
        }
    }

    /// Decoded outline for a glyph. Outlines are cached and shared; two
    /// calls for the same glyph return the same allocation.
    pub fn glyph(&self, glyph_id: u16) -> Result<Arc<GlyphOutline>, OvtError> {
        let mut cache = self.outline_cache.lock();

        if let Some(outline) = cache.get(&glyph_id) {
            return Ok(outline.clone());
        }

        let mut outline = match &self.outlines {
            OutlineSource::Glyf {
                glyf_table,
                loca_table,
            } => glyf_table.outline(glyph_id, loca_table)?,
            OutlineSource::Cff(cff_table) => {
                CharstringDecoder::new(cff_table).outline(glyph_id)?
            },
        };

        if outline.advance_width.is_none() {
            outline.advance_width = Some(self.hmtx_table.advance_width(glyph_id) as f32);
        }

        let outline = Arc::new(outline);
        cache.insert(glyph_id, outline.clone());
        Ok(outline)
    }

    pub fn glyph_for_char(&self, c: char) -> Result<Arc<GlyphOutline>, OvtError> {
        self.glyph(self.glyph_index(c))
    }

    pub fn advance_width(&self, glyph_id: u16) -> u16 {
        self.hmtx_table.advance_width(glyph_id)
    }

    pub fn left_side_bearing(&self, glyph_id: u16) -> i16 {
        self.hmtx_table.left_side_bearing(glyph_id)
    }

    /// Horizontal advance of `glyph_id`, with the pair kerning against the
    /// following glyph folded in when the `kern` feature is enabled.
    pub fn advance(
        &self,
        glyph_id: u16,
        next: Option<u16>,
        ctx: &LayoutContext,
        features: &FontFeatures,
    ) -> Result<i32, OvtError> {
        let mut advance = self.hmtx_table.advance_width(glyph_id) as i32;

        if features.kern {
            if let Some(next) = next {
                let (x_advance, _) = self.kerning(glyph_id, next, ctx)?;
                advance += x_advance as i32;
            }
        }

        Ok(advance)
    }

    /// Kerning adjustment for an adjacent glyph pair; `(0, 0)` when the
    /// font has no `GPOS` table.
    pub fn kerning(
        &self,
        glyph1: u16,
        glyph2: u16,
        ctx: &LayoutContext,
    ) -> Result<(i16, i16), OvtError> {
        match &self.gpos_table {
            Some(gpos_table) => gpos_table.kerning(glyph1, glyph2, ctx),
            None => Ok((0, 0)),
        }
    }

    /// Mark attachment offset for a mark glyph relative to a base glyph;
    /// `None` when the font has no `GPOS` table or defines no attachment.
    pub fn mark_placement(
        &self,
        base: u16,
        mark: u16,
        ctx: &LayoutContext,
    ) -> Result<Option<(i16, i16, bool)>, OvtError> {
        match &self.gpos_table {
            Some(gpos_table) => gpos_table.mark_placement(base, mark, ctx),
            None => Ok(None),
        }
    }

    /// Applies `GSUB` substitutions to a glyph sequence; the input is
    /// returned unchanged when the font has no `GSUB` table.
    pub fn substitute(
        &self,
        glyph_ids: &[u16],
        ctx: &LayoutContext,
        features: &FontFeatures,
    ) -> Result<Vec<u16>, OvtError> {
        match &self.gsub_table {
            Some(gsub_table) => gsub_table.apply(glyph_ids, ctx, features),
            None => Ok(glyph_ids.to_vec()),
        }
    }

    /// Re-sums every table against its stored directory checksum.
    pub fn verify_checksums(&self) -> Vec<ChecksumMismatch> {
        self.table_directory.verify_checksums(&self.bytes)
    }
}
