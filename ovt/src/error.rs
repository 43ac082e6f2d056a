use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OvtError {
    pub kind: OvtErrorKind,
    pub source: OvtErrorSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OvtErrorKind {
    UnexpectedTag,
    Truncated,
    InvalidSfntVersion,
    FormatNotSupported,
    Malformed,
    UnexpectedVersion,
    CollectionNotSupported,
    MissingTable,
    /// Neither a `glyf`/`loca` pair nor a `CFF ` table is present.
    NoOutlineTable,
    /// Compound glyph component positioned by point matching.
    MatchPointsNotSupported,
    /// A charstring operator outside the implemented set. Carries the
    /// operator value (two-byte operators are `0x0c00 | b`).
    UnsupportedOperator(u16),
    RecursionLimit,
    /// Requested script tag is not in the font's layout registry.
    UnknownScript,
    /// Requested language tag is not defined for the requested script.
    UnknownLanguage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OvtErrorSource {
    TTCHeader,
    TableDirectory,
    TableRecord,
    HeadTable,
    CmapTable,
    EncodingRecord,
    CmapSubtable,
    HheaTable,
    MaxpTable,
    HmtxTable,
    LocaTable,
    GlyfTable,
    CffTable,
    Charstring,
    NameTable,
    NameRecord,
    NameTagRecord,
    GposTable,
    GsubTable,
    Coverage,
    ClassDef,
    ScriptList,
    FeatureList,
    LookupList,
    FontData,
}

impl fmt::Display for OvtError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            OvtErrorKind::UnsupportedOperator(op) => {
                write!(f, "unsupported operator {:#06x} in {:?}", op, self.source)
            },
            kind => write!(f, "{:?} in {:?}", kind, self.source),
        }
    }
}

impl std::error::Error for OvtError {}
