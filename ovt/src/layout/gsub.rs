//! Glyph substitution (`GSUB`): single, ligature and chained contextual
//! substitution applied feature by feature.

use crate::error::*;
use crate::layout::{
    feature_tag, find_feature, parse_layout_header, resolve_lang_sys, ClassDef, Coverage,
    FeatureRecord, FontFeatures, LangSys, LayoutContext, ScriptRecord,
};
use crate::parse::FontReader;

// cap on nested lookup application from chained contextual rules
const MAX_NESTED_DEPTH: usize = 4;

#[derive(Debug, Clone, Copy)]
struct SequenceLookupRecord {
    sequence_index: u16,
    lookup_index: u16,
}

#[derive(Debug, Clone)]
struct Ligature {
    glyph: u16,
    /// Components after the first; the first is implied by the set's
    /// coverage index.
    components: Vec<u16>,
}

/// A chained rule's windows. For the glyph-keyed and class-keyed forms
/// `input` omits the first element, which the subtable's coverage or
/// class selection already matched.
#[derive(Debug, Clone)]
struct ChainedRule {
    backtrack: Vec<u16>,
    input: Vec<u16>,
    lookahead: Vec<u16>,
    records: Vec<SequenceLookupRecord>,
}

impl ChainedRule {
    /// Matches the rule's windows around position `i` using `eq` to
    /// compare a glyph against an expected value. Backtrack entries run
    /// backwards from the glyph before `i`.
    fn matches(&self, glyph_ids: &[u16], i: usize, eq: impl Fn(u16, u16) -> bool) -> bool {
        if i < self.backtrack.len()
            || i + 1 + self.input.len() + self.lookahead.len() > glyph_ids.len()
        {
            return false;
        }

        for (k, &expect) in self.backtrack.iter().enumerate() {
            if !eq(glyph_ids[i - 1 - k], expect) {
                return false;
            }
        }

        for (k, &expect) in self.input.iter().enumerate() {
            if !eq(glyph_ids[i + 1 + k], expect) {
                return false;
            }
        }

        for (k, &expect) in self.lookahead.iter().enumerate() {
            if !eq(glyph_ids[i + 1 + self.input.len() + k], expect) {
                return false;
            }
        }

        true
    }
}

#[derive(Debug, Clone)]
enum GsubSubtable {
    SingleDelta {
        coverage: Coverage,
        delta: i16,
    },
    SingleList {
        coverage: Coverage,
        substitutes: Vec<u16>,
    },
    Ligature {
        coverage: Coverage,
        ligature_sets: Vec<Vec<Ligature>>,
    },
    ChainedGlyphs {
        coverage: Coverage,
        rule_sets: Vec<Vec<ChainedRule>>,
    },
    ChainedClasses {
        coverage: Coverage,
        backtrack_classes: ClassDef,
        input_classes: ClassDef,
        lookahead_classes: ClassDef,
        rule_sets: Vec<Vec<ChainedRule>>,
    },
    ChainedCoverage {
        backtrack: Vec<Coverage>,
        input: Vec<Coverage>,
        lookahead: Vec<Coverage>,
        records: Vec<SequenceLookupRecord>,
    },
    Unsupported,
}

impl GsubSubtable {
    fn apply(&self, glyph_ids: Vec<u16>, lookups: &[GsubLookup], depth: usize) -> Vec<u16> {
        match self {
            Self::SingleDelta {
                coverage,
                delta,
            } => {
                glyph_ids
                    .into_iter()
                    .map(|glyph_id| {
                        if coverage.contains(glyph_id) {
                            glyph_id.wrapping_add(*delta as u16)
                        } else {
                            glyph_id
                        }
                    })
                    .collect()
            },
            Self::SingleList {
                coverage,
                substitutes,
            } => {
                glyph_ids
                    .into_iter()
                    .map(|glyph_id| {
                        match coverage.index(glyph_id) {
                            Some(index) => {
                                substitutes.get(index as usize).copied().unwrap_or(glyph_id)
                            },
                            None => glyph_id,
                        }
                    })
                    .collect()
            },
            Self::Ligature {
                coverage,
                ligature_sets,
            } => {
                let mut out = glyph_ids;
                let mut i = 0;

                while i < out.len() {
                    if let Some(set) = coverage
                        .index(out[i])
                        .and_then(|index| ligature_sets.get(index as usize))
                    {
                        // first matching ligature wins
                        let found = set.iter().find(|ligature| {
                            out[i + 1..]
                                .starts_with(&ligature.components)
                        });

                        if let Some(ligature) = found {
                            let consumed = 1 + ligature.components.len();
                            out.splice(i..i + consumed, [ligature.glyph]);
                        }
                    }

                    i += 1;
                }

                out
            },
            Self::ChainedGlyphs {
                coverage,
                rule_sets,
            } => {
                apply_contextual(glyph_ids, lookups, depth, |out, i| {
                    let set = coverage
                        .index(out[i])
                        .and_then(|index| rule_sets.get(index as usize))?;

                    set.iter()
                        .find(|rule| rule.matches(out, i, |glyph, expect| glyph == expect))
                        .map(|rule| (1 + rule.input.len(), rule.records.clone()))
                })
            },
            Self::ChainedClasses {
                coverage,
                backtrack_classes,
                input_classes,
                lookahead_classes,
                rule_sets,
            } => {
                apply_contextual(glyph_ids, lookups, depth, |out, i| {
                    if !coverage.contains(out[i]) {
                        return None;
                    }

                    let class = input_classes.class_of(out[i]);
                    let set = rule_sets.get(class as usize)?;

                    set.iter()
                        .find(|rule| {
                            // bounds first, then each window against its
                            // own class def
                            rule.matches(out, i, |_, _| true)
                                && rule.backtrack.iter().enumerate().all(
                                    |(k, &expect)| {
                                        backtrack_classes.class_of(out[i - 1 - k])
                                            == expect
                                    },
                                )
                                && rule.input.iter().enumerate().all(|(k, &expect)| {
                                    input_classes.class_of(out[i + 1 + k]) == expect
                                })
                                && rule.lookahead.iter().enumerate().all(
                                    |(k, &expect)| {
                                        lookahead_classes
                                            .class_of(out[i + 1 + rule.input.len() + k])
                                            == expect
                                    },
                                )
                        })
                        .map(|rule| (1 + rule.input.len(), rule.records.clone()))
                })
            },
            Self::ChainedCoverage {
                backtrack,
                input,
                lookahead,
                records,
            } => {
                apply_contextual(glyph_ids, lookups, depth, |out, i| {
                    if input.is_empty()
                        || i < backtrack.len()
                        || i + input.len() + lookahead.len() > out.len()
                    {
                        return None;
                    }

                    let input_matches = input
                        .iter()
                        .enumerate()
                        .all(|(k, coverage)| coverage.contains(out[i + k]));
                    let backtrack_matches = backtrack
                        .iter()
                        .enumerate()
                        .all(|(k, coverage)| coverage.contains(out[i - 1 - k]));
                    let lookahead_matches = lookahead
                        .iter()
                        .enumerate()
                        .all(|(k, coverage)| coverage.contains(out[i + input.len() + k]));

                    if input_matches && backtrack_matches && lookahead_matches {
                        Some((input.len(), records.clone()))
                    } else {
                        None
                    }
                })
            },
            Self::Unsupported => glyph_ids,
        }
    }
}

/// Shared driver for the chained contextual formats. `match_at` reports
/// the input span length and the nested lookup records when the glyph at
/// a position starts a match. On a match the nested lookups are applied
/// inside the input window and the cursor advances past it; otherwise it
/// advances one glyph.
fn apply_contextual(
    glyph_ids: Vec<u16>,
    lookups: &[GsubLookup],
    depth: usize,
    match_at: impl Fn(&[u16], usize) -> Option<(usize, Vec<SequenceLookupRecord>)>,
) -> Vec<u16> {
    let mut out = glyph_ids;
    let mut i = 0;

    while i < out.len() {
        let Some((span, records)) = match_at(&out, i) else {
            i += 1;
            continue;
        };

        let mut window: Vec<u16> = out[i..i + span].to_vec();

        for record in &records {
            let sequence_index = record.sequence_index as usize;

            if sequence_index > window.len() {
                continue;
            }

            let tail = window.split_off(sequence_index);
            let substituted =
                apply_lookup(lookups, record.lookup_index as usize, tail, depth + 1);
            window.extend(substituted);
        }

        let advance = window.len().max(1);
        out.splice(i..i + span, window);
        i += advance;
    }

    out
}

fn apply_lookup(
    lookups: &[GsubLookup],
    index: usize,
    mut glyph_ids: Vec<u16>,
    depth: usize,
) -> Vec<u16> {
    if depth > MAX_NESTED_DEPTH {
        log::debug!("gsub: nested lookup depth limit reached, leaving glyphs unchanged");
        return glyph_ids;
    }

    let Some(lookup) = lookups.get(index) else {
        return glyph_ids;
    };

    for subtable in &lookup.subtables {
        glyph_ids = subtable.apply(glyph_ids, lookups, depth);
    }

    glyph_ids
}

#[derive(Debug, Clone)]
struct GsubLookup {
    subtables: Vec<GsubSubtable>,
}

/// Parsed `GSUB` table.
#[derive(Debug, Clone)]
pub struct GsubTable {
    scripts: Vec<ScriptRecord>,
    features: Vec<FeatureRecord>,
    lookups: Vec<GsubLookup>,
}

impl GsubTable {
    pub fn try_parse(bytes: &[u8]) -> Result<Self, OvtError> {
        let (scripts, features, headers) =
            parse_layout_header(bytes, OvtErrorSource::GsubTable)?;
        let mut lookups = Vec::with_capacity(headers.len());

        for header in headers {
            let mut subtables = Vec::with_capacity(header.subtable_offsets.len());

            for offset in header.subtable_offsets {
                subtables.push(parse_subtable(bytes, offset, header.lookup_type)?);
            }

            lookups.push(GsubLookup {
                subtables,
            });
        }

        Ok(Self {
            scripts,
            features,
            lookups,
        })
    }

    /// Substitutes a glyph sequence. `ccmp`, `locl` and `rlig` are always
    /// applied; the remaining features run in a fixed order gated by
    /// `features`.
    pub fn apply(
        &self,
        glyph_ids: &[u16],
        ctx: &LayoutContext,
        features: &FontFeatures,
    ) -> Result<Vec<u16>, OvtError> {
        let Some(lang_sys) =
            resolve_lang_sys(&self.scripts, ctx, OvtErrorSource::GsubTable)?
        else {
            return Ok(glyph_ids.to_vec());
        };

        let mut out = glyph_ids.to_vec();

        for tag in [feature_tag::CCMP, feature_tag::LOCL, feature_tag::RLIG] {
            out = self.apply_feature(out, lang_sys, tag);
        }

        let gated = [
            (feature_tag::LIGA, features.liga),
            (feature_tag::DLIG, features.dlig),
            (feature_tag::HLIG, features.hlig),
            (feature_tag::CLIG, features.clig),
            (feature_tag::CALT, features.calt),
            (feature_tag::SALT, features.salt),
            (feature_tag::C2SC, features.c2sc),
            (feature_tag::FRAC, features.frac),
            (feature_tag::ZERO, features.zero),
            (feature_tag::SSTY, features.ssty),
        ];

        for (tag, enabled) in gated {
            if enabled {
                out = self.apply_feature(out, lang_sys, tag);
            }
        }

        Ok(out)
    }

    fn apply_feature(&self, mut glyph_ids: Vec<u16>, lang_sys: &LangSys, tag: u32) -> Vec<u16> {
        let Some(feature) = find_feature(&self.features, lang_sys, tag) else {
            return glyph_ids;
        };

        for &lookup_index in &feature.lookup_indices {
            glyph_ids = apply_lookup(&self.lookups, lookup_index as usize, glyph_ids, 0);
        }

        glyph_ids
    }
}

fn parse_subtable(
    bytes: &[u8],
    offset: usize,
    lookup_type: u16,
) -> Result<GsubSubtable, OvtError> {
    match lookup_type {
        1 => parse_single(bytes, offset),
        4 => parse_ligature(bytes, offset),
        6 => parse_chained(bytes, offset),
        7 => {
            let mut reader = FontReader::new(bytes, OvtErrorSource::GsubTable);
            reader.seek(offset);

            if reader.read_u16()? != 1 {
                return Err(OvtError {
                    kind: OvtErrorKind::Malformed,
                    source: OvtErrorSource::GsubTable,
                });
            }

            let ext_lookup_type = reader.read_u16()?;
            let ext_offset = reader.read_u32()? as usize;

            if ext_lookup_type == 7 {
                return Err(OvtError {
                    kind: OvtErrorKind::Malformed,
                    source: OvtErrorSource::GsubTable,
                });
            }

            parse_subtable(bytes, offset + ext_offset, ext_lookup_type)
        },
        other => {
            log::debug!("gsub: skipping unsupported lookup type {}", other);
            Ok(GsubSubtable::Unsupported)
        },
    }
}

fn parse_single(bytes: &[u8], offset: usize) -> Result<GsubSubtable, OvtError> {
    let mut reader = FontReader::new(bytes, OvtErrorSource::GsubTable);
    reader.seek(offset);

    match reader.read_u16()? {
        1 => {
            let coverage_offset = reader.read_u16()? as usize;
            let delta = reader.read_i16()?;

            Ok(GsubSubtable::SingleDelta {
                coverage: Coverage::try_parse(
                    bytes,
                    offset + coverage_offset,
                    OvtErrorSource::GsubTable,
                )?,
                delta,
            })
        },
        2 => {
            let coverage_offset = reader.read_u16()? as usize;
            let glyph_count = reader.read_u16()? as usize;
            let mut substitutes = Vec::with_capacity(glyph_count);

            for _ in 0..glyph_count {
                substitutes.push(reader.read_u16()?);
            }

            Ok(GsubSubtable::SingleList {
                coverage: Coverage::try_parse(
                    bytes,
                    offset + coverage_offset,
                    OvtErrorSource::GsubTable,
                )?,
                substitutes,
            })
        },
        _ => {
            Err(OvtError {
                kind: OvtErrorKind::Malformed,
                source: OvtErrorSource::GsubTable,
            })
        },
    }
}

fn parse_ligature(bytes: &[u8], offset: usize) -> Result<GsubSubtable, OvtError> {
    let mut reader = FontReader::new(bytes, OvtErrorSource::GsubTable);
    reader.seek(offset);

    if reader.read_u16()? != 1 {
        return Err(OvtError {
            kind: OvtErrorKind::Malformed,
            source: OvtErrorSource::GsubTable,
        });
    }

    let coverage_offset = reader.read_u16()? as usize;
    let set_count = reader.read_u16()? as usize;
    let mut set_offsets = Vec::with_capacity(set_count);

    for _ in 0..set_count {
        set_offsets.push(offset + reader.read_u16()? as usize);
    }

    let mut ligature_sets = Vec::with_capacity(set_count);

    for set_offset in set_offsets {
        reader.seek(set_offset);
        let ligature_count = reader.read_u16()? as usize;
        let mut ligature_offsets = Vec::with_capacity(ligature_count);

        for _ in 0..ligature_count {
            ligature_offsets.push(set_offset + reader.read_u16()? as usize);
        }

        let mut ligatures = Vec::with_capacity(ligature_count);

        for ligature_offset in ligature_offsets {
            reader.seek(ligature_offset);
            let glyph = reader.read_u16()?;
            let component_count = reader.read_u16()? as usize;

            if component_count == 0 {
                return Err(OvtError {
                    kind: OvtErrorKind::Malformed,
                    source: OvtErrorSource::GsubTable,
                });
            }

            let mut components = Vec::with_capacity(component_count - 1);

            for _ in 0..component_count - 1 {
                components.push(reader.read_u16()?);
            }

            ligatures.push(Ligature {
                glyph,
                components,
            });
        }

        ligature_sets.push(ligatures);
    }

    Ok(GsubSubtable::Ligature {
        coverage: Coverage::try_parse(
            bytes,
            offset + coverage_offset,
            OvtErrorSource::GsubTable,
        )?,
        ligature_sets,
    })
}

fn parse_chained(bytes: &[u8], offset: usize) -> Result<GsubSubtable, OvtError> {
    let mut reader = FontReader::new(bytes, OvtErrorSource::GsubTable);
    reader.seek(offset);

    match reader.read_u16()? {
        1 => {
            let coverage_offset = reader.read_u16()? as usize;
            let rule_sets = parse_rule_sets(bytes, &mut reader, offset)?;

            Ok(GsubSubtable::ChainedGlyphs {
                coverage: Coverage::try_parse(
                    bytes,
                    offset + coverage_offset,
                    OvtErrorSource::GsubTable,
                )?,
                rule_sets,
            })
        },
        2 => {
            let coverage_offset = reader.read_u16()? as usize;
            let backtrack_class_offset = reader.read_u16()? as usize;
            let input_class_offset = reader.read_u16()? as usize;
            let lookahead_class_offset = reader.read_u16()? as usize;
            let rule_sets = parse_rule_sets(bytes, &mut reader, offset)?;

            Ok(GsubSubtable::ChainedClasses {
                coverage: Coverage::try_parse(
                    bytes,
                    offset + coverage_offset,
                    OvtErrorSource::GsubTable,
                )?,
                backtrack_classes: ClassDef::try_parse(
                    bytes,
                    offset + backtrack_class_offset,
                    OvtErrorSource::GsubTable,
                )?,
                input_classes: ClassDef::try_parse(
                    bytes,
                    offset + input_class_offset,
                    OvtErrorSource::GsubTable,
                )?,
                lookahead_classes: ClassDef::try_parse(
                    bytes,
                    offset + lookahead_class_offset,
                    OvtErrorSource::GsubTable,
                )?,
                rule_sets,
            })
        },
        3 => {
            let backtrack = parse_coverage_list(bytes, &mut reader, offset)?;
            let input = parse_coverage_list(bytes, &mut reader, offset)?;
            let lookahead = parse_coverage_list(bytes, &mut reader, offset)?;
            let records = parse_sequence_lookups(&mut reader)?;

            Ok(GsubSubtable::ChainedCoverage {
                backtrack,
                input,
                lookahead,
                records,
            })
        },
        _ => {
            Err(OvtError {
                kind: OvtErrorKind::Malformed,
                source: OvtErrorSource::GsubTable,
            })
        },
    }
}

fn parse_rule_sets(
    bytes: &[u8],
    reader: &mut FontReader,
    offset: usize,
) -> Result<Vec<Vec<ChainedRule>>, OvtError> {
    let set_count = reader.read_u16()? as usize;
    let mut set_offsets = Vec::with_capacity(set_count);

    for _ in 0..set_count {
        set_offsets.push(reader.read_u16()? as usize);
    }

    let mut rule_sets = Vec::with_capacity(set_count);

    for set_offset in set_offsets {
        // a zero offset marks an empty rule set
        if set_offset == 0 {
            rule_sets.push(Vec::new());
            continue;
        }

        let set_offset = offset + set_offset;
        let mut set_reader = FontReader::new(bytes, OvtErrorSource::GsubTable);
        set_reader.seek(set_offset);
        let rule_count = set_reader.read_u16()? as usize;
        let mut rule_offsets = Vec::with_capacity(rule_count);

        for _ in 0..rule_count {
            rule_offsets.push(set_offset + set_reader.read_u16()? as usize);
        }

        let mut rules = Vec::with_capacity(rule_count);

        for rule_offset in rule_offsets {
            set_reader.seek(rule_offset);
            let backtrack = read_u16_list(&mut set_reader)?;
            let input_count = set_reader.read_u16()? as usize;

            if input_count == 0 {
                return Err(OvtError {
                    kind: OvtErrorKind::Malformed,
                    source: OvtErrorSource::GsubTable,
                });
            }

            let mut input = Vec::with_capacity(input_count - 1);

            for _ in 0..input_count - 1 {
                input.push(set_reader.read_u16()?);
            }

            let lookahead = read_u16_list(&mut set_reader)?;
            let records = parse_sequence_lookups(&mut set_reader)?;

            rules.push(ChainedRule {
                backtrack,
                input,
                lookahead,
                records,
            });
        }

        rule_sets.push(rules);
    }

    Ok(rule_sets)
}

fn read_u16_list(reader: &mut FontReader) -> Result<Vec<u16>, OvtError> {
    let count = reader.read_u16()? as usize;
    let mut values = Vec::with_capacity(count);

    for _ in 0..count {
        values.push(reader.read_u16()?);
    }

    Ok(values)
}

fn parse_coverage_list(
    bytes: &[u8],
    reader: &mut FontReader,
    offset: usize,
) -> Result<Vec<Coverage>, OvtError> {
    let offsets = read_u16_list(reader)?;
    let mut coverages = Vec::with_capacity(offsets.len());

    for coverage_offset in offsets {
        coverages.push(Coverage::try_parse(
            bytes,
            offset + coverage_offset as usize,
            OvtErrorSource::GsubTable,
        )?);
    }

    Ok(coverages)
}

fn parse_sequence_lookups(
    reader: &mut FontReader,
) -> Result<Vec<SequenceLookupRecord>, OvtError> {
    let count = reader.read_u16()? as usize;
    let mut records = Vec::with_capacity(count);

    for _ in 0..count {
        records.push(SequenceLookupRecord {
            sequence_index: reader.read_u16()?,
            lookup_index: reader.read_u16()?,
        });
    }

    Ok(records)
}
