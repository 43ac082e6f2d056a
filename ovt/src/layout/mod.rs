//! This `mod` contains the OpenType layout engine: shared script, feature
//! and lookup structures plus the GPOS and GSUB tables built on them.

pub mod gpos;
pub mod gsub;

pub use gpos::GposTable;
pub use gsub::GsubTable;

use crate::error::*;
use crate::parse::{tag, FontReader};

pub mod feature_tag {
    use crate::parse::tag;
    pub const CCMP: u32 = tag(b"ccmp");
    pub const LOCL: u32 = tag(b"locl");
    pub const RLIG: u32 = tag(b"rlig");
    pub const KERN: u32 = tag(b"kern");
    pub const LIGA: u32 = tag(b"liga");
    pub const DLIG: u32 = tag(b"dlig");
    pub const HLIG: u32 = tag(b"hlig");
    pub const CLIG: u32 = tag(b"clig");
    pub const CALT: u32 = tag(b"calt");
    pub const SALT: u32 = tag(b"salt");
    pub const C2SC: u32 = tag(b"c2sc");
    pub const FRAC: u32 = tag(b"frac");
    pub const ZERO: u32 = tag(b"zero");
    pub const SSTY: u32 = tag(b"ssty");
    pub const MARK: u32 = tag(b"mark");
    pub const MKMK: u32 = tag(b"mkmk");
}

pub const DFLT: u32 = tag(b"DFLT");

/// Script and language selection for a layout query. Passed into every
/// query rather than held as engine state, so concurrent callers can use
/// different selections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutContext {
    pub script: u32,
    /// `None` selects the script's default language system, as does an
    /// explicit `DFLT`.
    pub language: Option<u32>,
}

impl LayoutContext {
    pub fn new(script: &[u8; 4]) -> Self {
        Self {
            script: tag(script),
            language: None,
        }
    }

    pub fn with_language(script: &[u8; 4], language: &[u8; 4]) -> Self {
        Self {
            script: tag(script),
            language: Some(tag(language)),
        }
    }
}

impl Default for LayoutContext {
    fn default() -> Self {
        Self::new(b"latn")
    }
}

/// Feature toggles consumed by the layout queries. Always-on features
/// (`ccmp`, `locl`, `rlig`) are not represented here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FontFeatures {
    pub kern: bool,
    pub liga: bool,
    pub dlig: bool,
    pub hlig: bool,
    pub clig: bool,
    pub calt: bool,
    pub salt: bool,
    pub c2sc: bool,
    pub frac: bool,
    pub zero: bool,
    pub ssty: bool,
}

impl Default for FontFeatures {
    fn default() -> Self {
        Self {
            kern: true,
            liga: true,
            dlig: false,
            hlig: false,
            clig: true,
            calt: true,
            salt: false,
            c2sc: false,
            frac: false,
            zero: false,
            ssty: false,
        }
    }
}

/// Coverage table: sorted mapping from glyph id to coverage index.
/// <https://learn.microsoft.com/en-us/typography/opentype/spec/chapter2#coverage-table>
#[derive(Debug, Clone)]
pub enum Coverage {
    Glyphs(Vec<u16>),
    Ranges(Vec<CoverageRange>),
}

#[derive(Debug, Clone, Copy)]
pub struct CoverageRange {
    pub start_glyph: u16,
    pub end_glyph: u16,
    pub coverage_index: u16,
}

impl Coverage {
    pub fn try_parse(
        bytes: &[u8],
        offset: usize,
        source: OvtErrorSource,
    ) -> Result<Self, OvtError> {
        let mut reader = FontReader::new(bytes, OvtErrorSource::Coverage);
        reader.seek(offset);

        match reader.read_u16()? {
            1 => {
                let glyph_count = reader.read_u16()? as usize;
                let mut glyphs = Vec::with_capacity(glyph_count);

                for _ in 0..glyph_count {
                    glyphs.push(reader.read_u16()?);
                }

                Ok(Self::Glyphs(glyphs))
            },
            2 => {
                let range_count = reader.read_u16()? as usize;
                let mut ranges = Vec::with_capacity(range_count);

                for _ in 0..range_count {
                    ranges.push(CoverageRange {
                        start_glyph: reader.read_u16()?,
                        end_glyph: reader.read_u16()?,
                        coverage_index: reader.read_u16()?,
                    });
                }

                Ok(Self::Ranges(ranges))
            },
            _ => {
                Err(OvtError {
                    kind: OvtErrorKind::Malformed,
                    source,
                })
            },
        }
    }

    /// Coverage index for a glyph, or `None` when not covered.
    pub fn index(&self, glyph_id: u16) -> Option<u16> {
        match self {
            Self::Glyphs(glyphs) => {
                glyphs.binary_search(&glyph_id).ok().map(|i| i as u16)
            },
            Self::Ranges(ranges) => {
                let i = ranges.partition_point(|range| range.end_glyph < glyph_id);

                if i == ranges.len() || glyph_id < ranges[i].start_glyph {
                    return None;
                }

                Some(ranges[i].coverage_index + (glyph_id - ranges[i].start_glyph))
            },
        }
    }

    pub fn contains(&self, glyph_id: u16) -> bool {
        self.index(glyph_id).is_some()
    }
}

/// Class definition table; glyphs not listed belong to class 0.
#[derive(Debug, Clone)]
pub enum ClassDef {
    Array {
        start_glyph: u16,
        classes: Vec<u16>,
    },
    Ranges(Vec<ClassRange>),
}

#[derive(Debug, Clone, Copy)]
pub struct ClassRange {
    pub start_glyph: u16,
    pub end_glyph: u16,
    pub class: u16,
}

impl ClassDef {
    pub fn try_parse(
        bytes: &[u8],
        offset: usize,
        source: OvtErrorSource,
    ) -> Result<Self, OvtError> {
        let mut reader = FontReader::new(bytes, OvtErrorSource::ClassDef);
        reader.seek(offset);

        match reader.read_u16()? {
            1 => {
                let start_glyph = reader.read_u16()?;
                let glyph_count = reader.read_u16()? as usize;
                let mut classes = Vec::with_capacity(glyph_count);

                for _ in 0..glyph_count {
                    classes.push(reader.read_u16()?);
                }

                Ok(Self::Array {
                    start_glyph,
                    classes,
                })
            },
            2 => {
                let range_count = reader.read_u16()? as usize;
                let mut ranges = Vec::with_capacity(range_count);

                for _ in 0..range_count {
                    ranges.push(ClassRange {
                        start_glyph: reader.read_u16()?,
                        end_glyph: reader.read_u16()?,
                        class: reader.read_u16()?,
                    });
                }

                Ok(Self::Ranges(ranges))
            },
            _ => {
                Err(OvtError {
                    kind: OvtErrorKind::Malformed,
                    source,
                })
            },
        }
    }

    pub fn class_of(&self, glyph_id: u16) -> u16 {
        match self {
            Self::Array {
                start_glyph,
                classes,
            } => {
                if glyph_id < *start_glyph {
                    return 0;
                }

                classes
                    .get((glyph_id - start_glyph) as usize)
                    .copied()
                    .unwrap_or(0)
            },
            Self::Ranges(ranges) => {
                let i = ranges.partition_point(|range| range.end_glyph < glyph_id);

                if i == ranges.len() || glyph_id < ranges[i].start_glyph {
                    return 0;
                }

                ranges[i].class
            },
        }
    }
}

/// One script's language systems.
#[derive(Debug, Clone)]
pub struct ScriptRecord {
    pub tag: u32,
    pub default_lang_sys: Option<LangSys>,
    pub lang_sys: Vec<(u32, LangSys)>,
}

#[derive(Debug, Clone)]
pub struct LangSys {
    pub required_feature_index: u16,
    pub feature_indices: Vec<u16>,
}

#[derive(Debug, Clone)]
pub struct FeatureRecord {
    pub tag: u32,
    pub lookup_indices: Vec<u16>,
}

/// Lookup header with absolute subtable offsets; the GPOS/GSUB parsers
/// interpret the subtables themselves.
#[derive(Debug, Clone)]
pub struct LookupHeader {
    pub lookup_type: u16,
    pub flag: u16,
    pub subtable_offsets: Vec<usize>,
}

const USE_MARK_FILTERING_SET: u16 = 0x0010;

/// Parses the header shared by GPOS and GSUB: the script list, feature
/// list and lookup list.
pub(crate) fn parse_layout_header(
    bytes: &[u8],
    source: OvtErrorSource,
) -> Result<(Vec<ScriptRecord>, Vec<FeatureRecord>, Vec<LookupHeader>), OvtError> {
    let mut reader = FontReader::new(bytes, source);
    let major_version = reader.read_u16()?;
    // minor version; 1.1 adds a feature variations offset we don't read
    reader.skip(2);

    if major_version != 1 {
        return Err(OvtError {
            kind: OvtErrorKind::UnexpectedVersion,
            source,
        });
    }

    let script_list_offset = reader.read_u16()? as usize;
    let feature_list_offset = reader.read_u16()? as usize;
    let lookup_list_offset = reader.read_u16()? as usize;

    let scripts = parse_script_list(bytes, script_list_offset)?;
    let features = parse_feature_list(bytes, feature_list_offset)?;
    let lookups = parse_lookup_list(bytes, lookup_list_offset)?;

    Ok((scripts, features, lookups))
}

fn parse_script_list(bytes: &[u8], offset: usize) -> Result<Vec<ScriptRecord>, OvtError> {
    let mut reader = FontReader::new(bytes, OvtErrorSource::ScriptList);
    reader.seek(offset);
    let script_count = reader.read_u16()? as usize;
    let mut script_offsets = Vec::with_capacity(script_count);

    for _ in 0..script_count {
        let tag = reader.read_tag()?;
        script_offsets.push((tag, offset + reader.read_u16()? as usize));
    }

    let mut scripts = Vec::with_capacity(script_count);

    for (tag, script_offset) in script_offsets {
        reader.seek(script_offset);
        let default_lang_sys_offset = reader.read_u16()? as usize;
        let lang_sys_count = reader.read_u16()? as usize;
        let mut lang_sys_offsets = Vec::with_capacity(lang_sys_count);

        for _ in 0..lang_sys_count {
            let lang_tag = reader.read_tag()?;
            lang_sys_offsets.push((lang_tag, script_offset + reader.read_u16()? as usize));
        }

        let default_lang_sys = if default_lang_sys_offset != 0 {
            Some(parse_lang_sys(
                bytes,
                script_offset + default_lang_sys_offset,
            )?)
        } else {
            None
        };

        let mut lang_sys = Vec::with_capacity(lang_sys_count);

        for (lang_tag, lang_sys_offset) in lang_sys_offsets {
            lang_sys.push((lang_tag, parse_lang_sys(bytes, lang_sys_offset)?));
        }

        scripts.push(ScriptRecord {
            tag,
            default_lang_sys,
            lang_sys,
        });
    }

    Ok(scripts)
}

fn parse_lang_sys(bytes: &[u8], offset: usize) -> Result<LangSys, OvtError> {
    let mut reader = FontReader::new(bytes, OvtErrorSource::ScriptList);
    reader.seek(offset);
    // lookupOrderOffset, reserved
    reader.skip(2);
    let required_feature_index = reader.read_u16()?;
    let feature_count = reader.read_u16()? as usize;
    let mut feature_indices = Vec::with_capacity(feature_count);

    for _ in 0..feature_count {
        feature_indices.push(reader.read_u16()?);
    }

    Ok(LangSys {
        required_feature_index,
        feature_indices,
    })
}

fn parse_feature_list(bytes: &[u8], offset: usize) -> Result<Vec<FeatureRecord>, OvtError> {
    let mut reader = FontReader::new(bytes, OvtErrorSource::FeatureList);
    reader.seek(offset);
    let feature_count = reader.read_u16()? as usize;
    let mut feature_offsets = Vec::with_capacity(feature_count);

    for _ in 0..feature_count {
        let tag = reader.read_tag()?;
        feature_offsets.push((tag, offset + reader.read_u16()? as usize));
    }

    let mut features = Vec::with_capacity(feature_count);

    for (tag, feature_offset) in feature_offsets {
        reader.seek(feature_offset);
        // featureParamsOffset
        reader.skip(2);
        let lookup_count = reader.read_u16()? as usize;
        let mut lookup_indices = Vec::with_capacity(lookup_count);

        for _ in 0..lookup_count {
            lookup_indices.push(reader.read_u16()?);
        }

        features.push(FeatureRecord {
            tag,
            lookup_indices,
        });
    }

    Ok(features)
}

fn parse_lookup_list(bytes: &[u8], offset: usize) -> Result<Vec<LookupHeader>, OvtError> {
    let mut reader = FontReader::new(bytes, OvtErrorSource::LookupList);
    reader.seek(offset);
    let lookup_count = reader.read_u16()? as usize;
    let mut lookup_offsets = Vec::with_capacity(lookup_count);

    for _ in 0..lookup_count {
        lookup_offsets.push(offset + reader.read_u16()? as usize);
    }

    let mut lookups = Vec::with_capacity(lookup_count);

    for lookup_offset in lookup_offsets {
        reader.seek(lookup_offset);
        let lookup_type = reader.read_u16()?;
        let flag = reader.read_u16()?;
        let subtable_count = reader.read_u16()? as usize;
        let mut subtable_offsets = Vec::with_capacity(subtable_count);

        for _ in 0..subtable_count {
            subtable_offsets.push(lookup_offset + reader.read_u16()? as usize);
        }

        if flag & USE_MARK_FILTERING_SET != 0 {
            reader.skip(2);
        }

        lookups.push(LookupHeader {
            lookup_type,
            flag,
            subtable_offsets,
        });
    }

    Ok(lookups)
}

/// Resolves a context to a language system. Unknown script and unknown
/// explicit language are caller-correctable configuration errors;
/// `None`/`DFLT` select the script's default language system, which may
/// be absent (`Ok(None)`).
pub(crate) fn resolve_lang_sys<'a>(
    scripts: &'a [ScriptRecord],
    ctx: &LayoutContext,
    source: OvtErrorSource,
) -> Result<Option<&'a LangSys>, OvtError> {
    let script = scripts
        .iter()
        .find(|script| script.tag == ctx.script)
        .ok_or(OvtError {
            kind: OvtErrorKind::UnknownScript,
            source,
        })?;

    match ctx.language {
        None => Ok(script.default_lang_sys.as_ref()),
        Some(tag) if tag == DFLT => Ok(script.default_lang_sys.as_ref()),
        Some(tag) => {
            script
                .lang_sys
                .iter()
                .find(|(lang_tag, _)| *lang_tag == tag)
                .map(|(_, lang_sys)| Some(lang_sys))
                .ok_or(OvtError {
                    kind: OvtErrorKind::UnknownLanguage,
                    source,
                })
        },
    }
}

/// First feature with the given tag among a language system's features.
pub(crate) fn find_feature<'a>(
    features: &'a [FeatureRecord],
    lang_sys: &LangSys,
    tag: u32,
) -> Option<&'a FeatureRecord> {
    lang_sys
        .feature_indices
        .iter()
        .filter_map(|&i| features.get(i as usize))
        .find(|feature| feature.tag == tag)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coverage_glyph_list() {
        let coverage = Coverage::Glyphs(vec![3, 7, 12]);
        assert_eq!(coverage.index(3), Some(0));
        assert_eq!(coverage.index(7), Some(1));
        assert_eq!(coverage.index(12), Some(2));
        assert_eq!(coverage.index(5), None);
    }

    #[test]
    fn coverage_ranges() {
        let coverage = Coverage::Ranges(vec![
            CoverageRange {
                start_glyph: 10,
                end_glyph: 12,
                coverage_index: 0,
            },
            CoverageRange {
                start_glyph: 20,
                end_glyph: 20,
                coverage_index: 3,
            },
        ]);
        assert_eq!(coverage.index(11), Some(1));
        assert_eq!(coverage.index(20), Some(3));
        assert_eq!(coverage.index(13), None);
        assert_eq!(coverage.index(9), None);
    }

    #[test]
    fn class_def_defaults_to_zero() {
        let class_def = ClassDef::Ranges(vec![ClassRange {
            start_glyph: 5,
            end_glyph: 9,
            class: 2,
        }]);
        assert_eq!(class_def.class_of(7), 2);
        assert_eq!(class_def.class_of(4), 0);
        assert_eq!(class_def.class_of(10), 0);
    }

    fn scripts() -> Vec<ScriptRecord> {
        vec![ScriptRecord {
            tag: tag(b"latn"),
            default_lang_sys: Some(LangSys {
                required_feature_index: 0xFFFF,
                feature_indices: vec![0],
            }),
            lang_sys: vec![(
                tag(b"DEU "),
                LangSys {
                    required_feature_index: 0xFFFF,
                    feature_indices: vec![1],
                },
            )],
        }]
    }

    #[test]
    fn unknown_script_is_a_config_error() {
        let ctx = LayoutContext::new(b"arab");
        let err =
            resolve_lang_sys(&scripts(), &ctx, OvtErrorSource::GsubTable).unwrap_err();
        assert_eq!(err.kind, OvtErrorKind::UnknownScript);
    }

    #[test]
    fn unknown_language_is_a_config_error() {
        let ctx = LayoutContext::with_language(b"latn", b"FRA ");
        let err =
            resolve_lang_sys(&scripts(), &ctx, OvtErrorSource::GsubTable).unwrap_err();
        assert_eq!(err.kind, OvtErrorKind::UnknownLanguage);
    }

    #[test]
    fn dflt_language_selects_default_lang_sys() {
        let scripts = scripts();
        let ctx = LayoutContext::with_language(b"latn", b"DFLT");
        let lang_sys = resolve_lang_sys(&scripts, &ctx, OvtErrorSource::GsubTable)
            .unwrap()
            .unwrap();
        assert_eq!(lang_sys.feature_indices, vec![0]);

        let ctx = LayoutContext::new(b"latn");
        let lang_sys = resolve_lang_sys(&scripts, &ctx, OvtErrorSource::GsubTable)
            .unwrap()
            .unwrap();
        assert_eq!(lang_sys.feature_indices, vec![0]);
    }

    #[test]
    fn explicit_language_selects_its_lang_sys() {
        let scripts = scripts();
        let ctx = LayoutContext::with_language(b"latn", b"DEU ");
        let lang_sys = resolve_lang_sys(&scripts, &ctx, OvtErrorSource::GsubTable)
            .unwrap()
            .unwrap();
        assert_eq!(lang_sys.feature_indices, vec![1]);
    }
}
