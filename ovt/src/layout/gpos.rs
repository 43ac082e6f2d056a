//! Glyph positioning (`GPOS`): pair kerning and mark attachment.

use crate::error::*;
use crate::layout::{
    feature_tag, find_feature, parse_layout_header, resolve_lang_sys, ClassDef, Coverage,
    FeatureRecord, LayoutContext, ScriptRecord,
};
use crate::parse::FontReader;

/// A positioned pair adjustment for one glyph of a pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValueRecord {
    pub x_placement: i16,
    pub y_placement: i16,
    pub x_advance: i16,
    pub y_advance: i16,
}

impl ValueRecord {
    fn try_parse(reader: &mut FontReader, format: u16) -> Result<Self, OvtError> {
        let mut record = Self::default();

        if format & 0x0001 != 0 {
            record.x_placement = reader.read_i16()?;
        }

        if format & 0x0002 != 0 {
            record.y_placement = reader.read_i16()?;
        }

        if format & 0x0004 != 0 {
            record.x_advance = reader.read_i16()?;
        }

        if format & 0x0008 != 0 {
            record.y_advance = reader.read_i16()?;
        }

        // device table offsets; hinting deltas are not applied
        for bit in [0x0010, 0x0020, 0x0040, 0x0080] {
            if format & bit != 0 {
                reader.skip(2);
            }
        }

        Ok(record)
    }
}

/// Anchor point in font units. Formats 2 and 3 carry extra hinting data
/// past the coordinates which is not needed here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Anchor {
    pub x: i16,
    pub y: i16,
}

impl Anchor {
    fn try_parse(bytes: &[u8], offset: usize) -> Result<Self, OvtError> {
        let mut reader = FontReader::new(bytes, OvtErrorSource::GposTable);
        reader.seek(offset);
        reader.skip(2);

        Ok(Self {
            x: reader.read_i16()?,
            y: reader.read_i16()?,
        })
    }
}

#[derive(Debug, Clone, Copy)]
struct PairValue {
    second_glyph: u16,
    value1: ValueRecord,
    value2: ValueRecord,
}

/// Mark-to-base and mark-to-mark share this shape: marks carry a class
/// and an anchor, attachment targets carry one anchor slot per class.
#[derive(Debug, Clone)]
pub struct MarkAttachment {
    mark_coverage: Coverage,
    target_coverage: Coverage,
    marks: Vec<(u16, Anchor)>,
    target_anchors: Vec<Vec<Option<Anchor>>>,
}

impl MarkAttachment {
    /// Offset of the mark anchor from the target anchor, in font units.
    fn attach(&self, target: u16, mark: u16) -> Option<(i16, i16)> {
        let mark_index = self.mark_coverage.index(mark)? as usize;
        let target_index = self.target_coverage.index(target)? as usize;
        let (class, mark_anchor) = *self.marks.get(mark_index)?;
        let target_anchor =
            (*self.target_anchors.get(target_index)?.get(class as usize)?)?;

        Some((
            target_anchor.x - mark_anchor.x,
            target_anchor.y - mark_anchor.y,
        ))
    }
}

#[derive(Debug, Clone)]
enum GposSubtable {
    PairGlyphs {
        coverage: Coverage,
        pair_sets: Vec<Vec<PairValue>>,
    },
    PairClasses {
        coverage: Coverage,
        class_def1: ClassDef,
        class_def2: ClassDef,
        class2_count: u16,
        records: Vec<(ValueRecord, ValueRecord)>,
    },
    MarkToBase(MarkAttachment),
    MarkToMark(MarkAttachment),
    Unsupported,
}

impl GposSubtable {
    /// Value records for an adjacent glyph pair, when this subtable
    /// covers the first glyph and defines the pair.
    fn pair_adjust(&self, glyph1: u16, glyph2: u16) -> Option<(ValueRecord, ValueRecord)> {
        match self {
            Self::PairGlyphs {
                coverage,
                pair_sets,
            } => {
                let pair_set = pair_sets.get(coverage.index(glyph1)? as usize)?;

                pair_set
                    .iter()
                    .find(|pair| pair.second_glyph == glyph2)
                    .map(|pair| (pair.value1, pair.value2))
            },
            Self::PairClasses {
                coverage,
                class_def1,
                class_def2,
                class2_count,
                records,
            } => {
                coverage.index(glyph1)?;
                let class1 = class_def1.class_of(glyph1);
                let class2 = class_def2.class_of(glyph2);
                records
                    .get(class1 as usize * *class2_count as usize + class2 as usize)
                    .copied()
            },
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
struct GposLookup {
    subtables: Vec<GposSubtable>,
}

/// Parsed `GPOS` table.
#[derive(Debug, Clone)]
pub struct GposTable {
    scripts: Vec<ScriptRecord>,
    features: Vec<FeatureRecord>,
    lookups: Vec<GposLookup>,
}

impl GposTable {
    pub fn try_parse(bytes: &[u8]) -> Result<Self, OvtError> {
        let (scripts, features, headers) =
            parse_layout_header(bytes, OvtErrorSource::GposTable)?;
        let mut lookups = Vec::with_capacity(headers.len());

        for header in headers {
            let mut subtables = Vec::with_capacity(header.subtable_offsets.len());

            for offset in header.subtable_offsets {
                subtables.push(parse_subtable(bytes, offset, header.lookup_type)?);
            }

            lookups.push(GposLookup {
                subtables,
            });
        }

        Ok(Self {
            scripts,
            features,
            lookups,
        })
    }

    /// Kerning adjustment for an adjacent glyph pair, as an advance delta
    /// for the first glyph. The first subtable holding a nonzero record
    /// for the pair wins.
    pub fn kerning(
        &self,
        glyph1: u16,
        glyph2: u16,
        ctx: &LayoutContext,
    ) -> Result<(i16, i16), OvtError> {
        let Some(lang_sys) =
            resolve_lang_sys(&self.scripts, ctx, OvtErrorSource::GposTable)?
        else {
            return Ok((0, 0));
        };

        let Some(feature) = find_feature(&self.features, lang_sys, feature_tag::KERN)
        else {
            return Ok((0, 0));
        };

        for &lookup_index in &feature.lookup_indices {
            let Some(lookup) = self.lookups.get(lookup_index as usize) else {
                continue;
            };

            for subtable in &lookup.subtables {
                // a pair whose records are all zero is no match; a later
                // subtable may still carry the adjustment
                match subtable.pair_adjust(glyph1, glyph2) {
                    Some((value1, value2))
                        if value1 != ValueRecord::default()
                            || value2 != ValueRecord::default() =>
                    {
                        return Ok((value1.x_advance, value1.y_advance));
                    },
                    _ => (),
                }
            }
        }

        Ok((0, 0))
    }

    /// Placement of a mark glyph relative to a base glyph, as the offset
    /// of the mark anchor from the base anchor. The `mark` feature is
    /// queried first, then `mkmk`; the returned flag is `true` for a
    /// mark-to-mark attachment.
    pub fn mark_placement(
        &self,
        base: u16,
        mark: u16,
        ctx: &LayoutContext,
    ) -> Result<Option<(i16, i16, bool)>, OvtError> {
        let Some(lang_sys) =
            resolve_lang_sys(&self.scripts, ctx, OvtErrorSource::GposTable)?
        else {
            return Ok(None);
        };

        for (tag, mark_to_mark) in
            [(feature_tag::MARK, false), (feature_tag::MKMK, true)]
        {
            let Some(feature) = find_feature(&self.features, lang_sys, tag) else {
                continue;
            };

            for &lookup_index in &feature.lookup_indices {
                let Some(lookup) = self.lookups.get(lookup_index as usize) else {
                    continue;
                };

                for subtable in &lookup.subtables {
                    let attachment = match (subtable, mark_to_mark) {
                        (GposSubtable::MarkToBase(attachment), false) => attachment,
                        (GposSubtable::MarkToMark(attachment), true) => attachment,
                        _ => continue,
                    };

                    if let Some((dx, dy)) = attachment.attach(base, mark) {
                        return Ok(Some((dx, dy, mark_to_mark)));
                    }
                }
            }
        }

        Ok(None)
    }
}

fn parse_subtable(
    bytes: &[u8],
    offset: usize,
    lookup_type: u16,
) -> Result<GposSubtable, OvtError> {
    match lookup_type {
        2 => parse_pair(bytes, offset),
        4 => Ok(GposSubtable::MarkToBase(parse_mark_attachment(bytes, offset)?)),
        6 => Ok(GposSubtable::MarkToMark(parse_mark_attachment(bytes, offset)?)),
        9 => {
            let mut reader = FontReader::new(bytes, OvtErrorSource::GposTable);
            reader.seek(offset);

            if reader.read_u16()? != 1 {
                return Err(OvtError {
                    kind: OvtErrorKind::Malformed,
                    source: OvtErrorSource::GposTable,
                });
            }

            let ext_lookup_type = reader.read_u16()?;
            let ext_offset = reader.read_u32()? as usize;

            if ext_lookup_type == 9 {
                return Err(OvtError {
                    kind: OvtErrorKind::Malformed,
                    source: OvtErrorSource::GposTable,
                });
            }

            parse_subtable(bytes, offset + ext_offset, ext_lookup_type)
        },
        other => {
            log::debug!("gpos: skipping unsupported lookup type {}", other);
            Ok(GposSubtable::Unsupported)
        },
    }
}

fn parse_pair(bytes: &[u8], offset: usize) -> Result<GposSubtable, OvtError> {
    let mut reader = FontReader::new(bytes, OvtErrorSource::GposTable);
    reader.seek(offset);

    match reader.read_u16()? {
        1 => {
            let coverage_offset = reader.read_u16()? as usize;
            let value_format1 = reader.read_u16()?;
            let value_format2 = reader.read_u16()?;
            let pair_set_count = reader.read_u16()? as usize;
            let mut pair_set_offsets = Vec::with_capacity(pair_set_count);

            for _ in 0..pair_set_count {
                pair_set_offsets.push(offset + reader.read_u16()? as usize);
            }

            let mut pair_sets = Vec::with_capacity(pair_set_count);

            for pair_set_offset in pair_set_offsets {
                reader.seek(pair_set_offset);
                let pair_count = reader.read_u16()? as usize;
                let mut pairs = Vec::with_capacity(pair_count);

                for _ in 0..pair_count {
                    pairs.push(PairValue {
                        second_glyph: reader.read_u16()?,
                        value1: ValueRecord::try_parse(&mut reader, value_format1)?,
                        value2: ValueRecord::try_parse(&mut reader, value_format2)?,
                    });
                }

                pair_sets.push(pairs);
            }

            Ok(GposSubtable::PairGlyphs {
                coverage: Coverage::try_parse(
                    bytes,
                    offset + coverage_offset,
                    OvtErrorSource::GposTable,
                )?,
                pair_sets,
            })
        },
        2 => {
            let coverage_offset = reader.read_u16()? as usize;
            let value_format1 = reader.read_u16()?;
            let value_format2 = reader.read_u16()?;
            let class_def1_offset = reader.read_u16()? as usize;
            let class_def2_offset = reader.read_u16()? as usize;
            let class1_count = reader.read_u16()? as usize;
            let class2_count = reader.read_u16()?;
            let mut records = Vec::with_capacity(class1_count * class2_count as usize);

            for _ in 0..class1_count * class2_count as usize {
                records.push((
                    ValueRecord::try_parse(&mut reader, value_format1)?,
                    ValueRecord::try_parse(&mut reader, value_format2)?,
                ));
            }

            Ok(GposSubtable::PairClasses {
                coverage: Coverage::try_parse(
                    bytes,
                    offset + coverage_offset,
                    OvtErrorSource::GposTable,
                )?,
                class_def1: ClassDef::try_parse(
                    bytes,
                    offset + class_def1_offset,
                    OvtErrorSource::GposTable,
                )?,
                class_def2: ClassDef::try_parse(
                    bytes,
                    offset + class_def2_offset,
                    OvtErrorSource::GposTable,
                )?,
                class2_count,
                records,
            })
        },
        _ => {
            Err(OvtError {
                kind: OvtErrorKind::Malformed,
                source: OvtErrorSource::GposTable,
            })
        },
    }
}

fn parse_mark_attachment(bytes: &[u8], offset: usize) -> Result<MarkAttachment, OvtError> {
    let mut reader = FontReader::new(bytes, OvtErrorSource::GposTable);
    reader.seek(offset);

    if reader.read_u16()? != 1 {
        return Err(OvtError {
            kind: OvtErrorKind::Malformed,
            source: OvtErrorSource::GposTable,
        });
    }

    let mark_coverage_offset = reader.read_u16()? as usize;
    let target_coverage_offset = reader.read_u16()? as usize;
    let mark_class_count = reader.read_u16()? as usize;
    let mark_array_offset = offset + reader.read_u16()? as usize;
    let target_array_offset = offset + reader.read_u16()? as usize;

    reader.seek(mark_array_offset);
    let mark_count = reader.read_u16()? as usize;
    let mut mark_records = Vec::with_capacity(mark_count);

    for _ in 0..mark_count {
        let class = reader.read_u16()?;
        mark_records.push((class, mark_array_offset + reader.read_u16()? as usize));
    }

    let mut marks = Vec::with_capacity(mark_count);

    for (class, anchor_offset) in mark_records {
        marks.push((class, Anchor::try_parse(bytes, anchor_offset)?));
    }

    reader.seek(target_array_offset);
    let target_count = reader.read_u16()? as usize;
    let mut anchor_offsets = Vec::with_capacity(target_count);

    for _ in 0..target_count {
        let mut row = Vec::with_capacity(mark_class_count);

        for _ in 0..mark_class_count {
            row.push(reader.read_u16()? as usize);
        }

        anchor_offsets.push(row);
    }

    let mut target_anchors = Vec::with_capacity(target_count);

    for row in anchor_offsets {
        let mut anchors = Vec::with_capacity(mark_class_count);

        for anchor_offset in row {
            // a zero offset marks an absent anchor for that class
            if anchor_offset == 0 {
                anchors.push(None);
            } else {
                anchors.push(Some(Anchor::try_parse(
                    bytes,
                    target_array_offset + anchor_offset,
                )?));
            }
        }

        target_anchors.push(anchors);
    }

    Ok(MarkAttachment {
        mark_coverage: Coverage::try_parse(
            bytes,
            offset + mark_coverage_offset,
            OvtErrorSource::GposTable,
        )?,
        target_coverage: Coverage::try_parse(
            bytes,
            offset + target_coverage_offset,
            OvtErrorSource::GposTable,
        )?,
        marks,
        target_anchors,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::CoverageRange;
    use crate::testutil::ByteWriter;

    // One 'kern' feature over a single class-based pair adjustment
    // subtable: glyphs 4 and 5 are covered, class pair (1, 1) kerns by
    // -50 and every other pair by 0.
    fn gpos_bytes() -> Vec<u8> {
        ByteWriter::new()
            // header
            .u16(1)
            .u16(0)
            .u16(10) // script list
            .u16(30) // feature list
            .u16(44) // lookup list
            // script list at 10
            .u16(1)
            .bytes(b"latn")
            .u16(8)
            // script table at 18
            .u16(4) // default lang sys
            .u16(0)
            // default lang sys at 22
            .u16(0)
            .u16(0xFFFF)
            .u16(1)
            .u16(0)
            // feature list at 30
            .u16(1)
            .bytes(b"kern")
            .u16(8)
            // feature table at 38
            .u16(0)
            .u16(1)
            .u16(0)
            // lookup list at 44
            .u16(1)
            .u16(4)
            // lookup table at 48
            .u16(2)
            .u16(0)
            .u16(1)
            .u16(8)
            // pair adjustment format 2 at 56
            .u16(2)
            .u16(24) // coverage
            .u16(0x0004) // value format 1: x advance
            .u16(0)
            .u16(32) // class def 1
            .u16(40) // class def 2
            .u16(2)
            .u16(2)
            .i16(0)
            .i16(0)
            .i16(0)
            .i16(-50)
            // coverage at 80
            .u16(1)
            .u16(2)
            .u16(4)
            .u16(5)
            // class def 1 at 88
            .u16(1)
            .u16(4)
            .u16(1)
            .u16(1)
            // class def 2 at 96
            .u16(1)
            .u16(5)
            .u16(1)
            .u16(1)
            .take()
    }

    // Same pair data as gpos_bytes, but the lookup's first subtable
    // defines every class pair with empty value records; only the second
    // subtable carries the -40 adjustment.
    fn gpos_zero_first_subtable_bytes() -> Vec<u8> {
        ByteWriter::new()
            // header
            .u16(1)
            .u16(0)
            .u16(10) // script list
            .u16(30) // feature list
            .u16(44) // lookup list
            // script list at 10
            .u16(1)
            .bytes(b"latn")
            .u16(8)
            // script table at 18
            .u16(4)
            .u16(0)
            // default lang sys at 22
            .u16(0)
            .u16(0xFFFF)
            .u16(1)
            .u16(0)
            // feature list at 30
            .u16(1)
            .bytes(b"kern")
            .u16(8)
            // feature table at 38
            .u16(0)
            .u16(1)
            .u16(0)
            // lookup list at 44
            .u16(1)
            .u16(4)
            // lookup table at 48, two subtables
            .u16(2)
            .u16(0)
            .u16(2)
            .u16(10)
            .u16(26)
            // pair adjustment format 2 at 58, value formats 0/0
            .u16(2)
            .u16(40) // coverage
            .u16(0)
            .u16(0)
            .u16(48) // class def 1
            .u16(56) // class def 2
            .u16(2)
            .u16(2)
            // pair adjustment format 2 at 74
            .u16(2)
            .u16(24) // coverage
            .u16(0x0004) // value format 1: x advance
            .u16(0)
            .u16(32) // class def 1
            .u16(40) // class def 2
            .u16(2)
            .u16(2)
            .i16(0)
            .i16(0)
            .i16(0)
            .i16(-40)
            // coverage at 98
            .u16(1)
            .u16(2)
            .u16(4)
            .u16(5)
            // class def 1 at 106
            .u16(1)
            .u16(4)
            .u16(1)
            .u16(1)
            // class def 2 at 114
            .u16(1)
            .u16(5)
            .u16(1)
            .u16(1)
            .take()
    }

    // A 'mark' mark-to-base lookup and a 'mkmk' mark-to-mark lookup over
    // mark glyph 30: base coverage holds glyph 10, mark-to-mark target
    // coverage holds glyph 11.
    fn gpos_mark_bytes() -> Vec<u8> {
        ByteWriter::new()
            // header
            .u16(1)
            .u16(0)
            .u16(10) // script list
            .u16(32) // feature list
            .u16(58) // lookup list
            // script list at 10
            .u16(1)
            .bytes(b"latn")
            .u16(8)
            // script table at 18
            .u16(4)
            .u16(0)
            // default lang sys at 22
            .u16(0)
            .u16(0xFFFF)
            .u16(2)
            .u16(0)
            .u16(1)
            // feature list at 32
            .u16(2)
            .bytes(b"mark")
            .u16(14)
            .bytes(b"mkmk")
            .u16(20)
            // 'mark' feature table at 46
            .u16(0)
            .u16(1)
            .u16(0)
            // 'mkmk' feature table at 52
            .u16(0)
            .u16(1)
            .u16(1)
            // lookup list at 58
            .u16(2)
            .u16(6)
            .u16(14)
            // mark-to-base lookup at 64
            .u16(4)
            .u16(0)
            .u16(1)
            .u16(16)
            // mark-to-mark lookup at 72
            .u16(6)
            .u16(0)
            .u16(1)
            .u16(54)
            // mark-to-base subtable at 80
            .u16(1)
            .u16(34) // mark coverage
            .u16(40) // base coverage
            .u16(1)
            .u16(12) // mark array
            .u16(24) // base array
            // mark array at 92
            .u16(1)
            .u16(0)
            .u16(6)
            // mark anchor at 98
            .u16(1)
            .i16(20)
            .i16(700)
            // base array at 104
            .u16(1)
            .u16(4)
            // base anchor at 108
            .u16(1)
            .i16(250)
            .i16(650)
            // mark coverage at 114
            .u16(1)
            .u16(1)
            .u16(30)
            // base coverage at 120
            .u16(1)
            .u16(1)
            .u16(10)
            // mark-to-mark subtable at 126
            .u16(1)
            .u16(34) // mark coverage
            .u16(40) // target coverage
            .u16(1)
            .u16(12) // mark array
            .u16(24) // target array
            // mark array at 138
            .u16(1)
            .u16(0)
            .u16(6)
            // mark anchor at 144
            .u16(1)
            .i16(0)
            .i16(800)
            // target array at 150
            .u16(1)
            .u16(4)
            // target anchor at 154
            .u16(1)
            .i16(5)
            .i16(900)
            // mark coverage at 160
            .u16(1)
            .u16(1)
            .u16(30)
            // target coverage at 166
            .u16(1)
            .u16(1)
            .u16(11)
            .take()
    }

    #[test]
    fn class_pair_kerning() {
        let gpos = GposTable::try_parse(&gpos_bytes()).unwrap();
        let ctx = LayoutContext::default();
        assert_eq!(gpos.kerning(4, 5, &ctx).unwrap(), (-50, 0));
        assert_eq!(gpos.kerning(4, 4, &ctx).unwrap(), (0, 0));
        assert_eq!(gpos.kerning(9, 5, &ctx).unwrap(), (0, 0));
    }

    #[test]
    fn empty_pair_records_do_not_shadow_later_subtables() {
        let gpos = GposTable::try_parse(&gpos_zero_first_subtable_bytes()).unwrap();
        let ctx = LayoutContext::default();
        assert_eq!(gpos.kerning(4, 5, &ctx).unwrap(), (-40, 0));
        assert_eq!(gpos.kerning(4, 4, &ctx).unwrap(), (0, 0));
    }

    #[test]
    fn mark_feature_wins_over_mkmk() {
        let gpos = GposTable::try_parse(&gpos_mark_bytes()).unwrap();
        let ctx = LayoutContext::default();

        // Base glyph 10 is covered by the mark-to-base lookup, so the
        // mark-to-mark anchors never come into play for it.
        assert_eq!(
            gpos.mark_placement(10, 30, &ctx).unwrap(),
            Some((230, -50, false))
        );

        // Glyph 11 only appears in the mark-to-mark target coverage.
        assert_eq!(
            gpos.mark_placement(11, 30, &ctx).unwrap(),
            Some((5, 100, true))
        );

        assert_eq!(gpos.mark_placement(12, 30, &ctx).unwrap(), None);
    }

    #[test]
    fn kerning_rejects_unknown_script() {
        let gpos = GposTable::try_parse(&gpos_bytes()).unwrap();
        let ctx = LayoutContext::new(b"arab");
        let err = gpos.kerning(4, 5, &ctx).unwrap_err();
        assert_eq!(err.kind, OvtErrorKind::UnknownScript);
    }

    fn mark_attachment() -> MarkAttachment {
        MarkAttachment {
            mark_coverage: Coverage::Glyphs(vec![30]),
            target_coverage: Coverage::Ranges(vec![CoverageRange {
                start_glyph: 10,
                end_glyph: 10,
                coverage_index: 0,
            }]),
            marks: vec![(0, Anchor { x: 20, y: 700 })],
            target_anchors: vec![vec![Some(Anchor { x: 250, y: 650 })]],
        }
    }

    #[test]
    fn mark_anchor_delta() {
        assert_eq!(mark_attachment().attach(10, 30), Some((230, -50)));
        assert_eq!(mark_attachment().attach(11, 30), None);
        assert_eq!(mark_attachment().attach(10, 31), None);
    }

    #[test]
    fn absent_anchor_slot_yields_no_attachment() {
        let mut attachment = mark_attachment();
        attachment.target_anchors[0][0] = None;
        assert_eq!(attachment.attach(10, 30), None);
    }
}
