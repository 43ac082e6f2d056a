use crate::error::*;
use crate::outline::{BBox, GlyphOutline, PathOp, Point, Xform};
use crate::parse::{FontReader, LocaTable};

/// Component graphs are acyclic in well-formed fonts; the cap only guards
/// against corrupt self-referencing data.
const MAX_COMPONENT_DEPTH: usize = 8;

#[derive(Clone, Copy)]
struct SimpleFlags(u8);

impl SimpleFlags {
    fn on_curve_point(&self) -> bool {
        self.0 & 0x01 != 0
    }

    fn x_short_vector(&self) -> bool {
        self.0 & 0x02 != 0
    }

    fn y_short_vector(&self) -> bool {
        self.0 & 0x04 != 0
    }

    fn repeat_flag(&self) -> bool {
        self.0 & 0x08 != 0
    }

    fn x_is_same_or_positive_x_short_vector(&self) -> bool {
        self.0 & 0x10 != 0
    }

    fn y_is_same_or_positive_y_short_vector(&self) -> bool {
        self.0 & 0x20 != 0
    }
}

#[derive(Clone, Copy)]
struct ComponentFlags(u16);

impl ComponentFlags {
    fn arg_1_and_2_are_words(&self) -> bool {
        self.0 & 0x0001 != 0
    }

    fn args_are_xy_values(&self) -> bool {
        self.0 & 0x0002 != 0
    }

    fn we_have_a_scale(&self) -> bool {
        self.0 & 0x0008 != 0
    }

    fn more_components(&self) -> bool {
        self.0 & 0x0020 != 0
    }

    fn we_have_an_x_and_y_scale(&self) -> bool {
        self.0 & 0x0040 != 0
    }

    fn we_have_a_two_by_two(&self) -> bool {
        self.0 & 0x0080 != 0
    }
}

/// Corresponds to the `glyf` table.
/// <https://learn.microsoft.com/en-us/typography/opentype/spec/glyf>
///
/// Glyphs are decoded one at a time on demand rather than up front; the
/// table just holds the raw bytes.
#[derive(Debug, Clone)]
pub struct GlyfTable {
    bytes: Vec<u8>,
}

impl GlyfTable {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
        }
    }

    pub fn outline(
        &self,
        glyph_id: u16,
        loca_table: &LocaTable,
    ) -> Result<GlyphOutline, OvtError> {
        self.outline_at_depth(glyph_id, loca_table, 0)
    }

    fn outline_at_depth(
        &self,
        glyph_id: u16,
        loca_table: &LocaTable,
        depth: usize,
    ) -> Result<GlyphOutline, OvtError> {
        if depth > MAX_COMPONENT_DEPTH {
            return Err(OvtError {
                kind: OvtErrorKind::RecursionLimit,
                source: OvtErrorSource::GlyfTable,
            });
        }

        let glyph_offset = match loca_table.offset(glyph_id) {
            Some(offset) => offset as usize,
            None => return Ok(GlyphOutline::empty(glyph_id)),
        };

        let mut reader = FontReader::new(&self.bytes, OvtErrorSource::GlyfTable);
        reader.seek(glyph_offset);

        let number_of_contours = reader.read_i16()?;
        let x_min = reader.read_i16()?;
        let y_min = reader.read_i16()?;
        let x_max = reader.read_i16()?;
        let y_max = reader.read_i16()?;

        let bbox = BBox {
            x_min: x_min as f32,
            x_max: x_max as f32,
            y_min: y_min as f32,
            y_max: y_max as f32,
        };

        let ops = if number_of_contours < 0 {
            self.compound_ops(&mut reader, loca_table, depth)?
        } else {
            simple_ops(&mut reader, number_of_contours as usize)?
        };

        Ok(GlyphOutline {
            glyph_id,
            ops,
            bbox,
            advance_width: None,
        })
    }

    fn compound_ops(
        &self,
        reader: &mut FontReader,
        loca_table: &LocaTable,
        depth: usize,
    ) -> Result<Vec<PathOp>, OvtError> {
        let mut components = Vec::new();
        let mut more_components = true;

        while more_components {
            let flags = ComponentFlags(reader.read_u16()?);
            more_components = flags.more_components();
            let component_id = reader.read_u16()?;

            // Point-matching arguments (anchor alignment instead of an
            // offset) are a hard decode error.
            if !flags.args_are_xy_values() {
                return Err(OvtError {
                    kind: OvtErrorKind::MatchPointsNotSupported,
                    source: OvtErrorSource::GlyfTable,
                });
            }

            let (e, f) = if flags.arg_1_and_2_are_words() {
                (reader.read_i16()? as f32, reader.read_i16()? as f32)
            } else {
                (reader.read_i8()? as f32, reader.read_i8()? as f32)
            };

            let (a, b, c, d) = if flags.we_have_a_scale() {
                let scale = reader.read_f2dot14()?;
                (scale, 0.0, 0.0, scale)
            } else if flags.we_have_an_x_and_y_scale() {
                let x_scale = reader.read_f2dot14()?;
                let y_scale = reader.read_f2dot14()?;
                (x_scale, 0.0, 0.0, y_scale)
            } else if flags.we_have_a_two_by_two() {
                (
                    reader.read_f2dot14()?,
                    reader.read_f2dot14()?,
                    reader.read_f2dot14()?,
                    reader.read_f2dot14()?,
                )
            } else {
                (1.0, 0.0, 0.0, 1.0)
            };

            components.push((
                component_id,
                Xform {
                    a,
                    b,
                    c,
                    d,
                    e,
                    f,
                },
            ));
        }

        let mut ops = Vec::new();

        for (component_id, xform) in components {
            let component = self.outline_at_depth(component_id, loca_table, depth + 1)?;
            ops.extend(xform.apply_ops(&component.ops));
        }

        Ok(ops)
    }
}

fn simple_ops(
    reader: &mut FontReader,
    number_of_contours: usize,
) -> Result<Vec<PathOp>, OvtError> {
    let mut end_pts_of_contours = Vec::with_capacity(number_of_contours);

    for _ in 0..number_of_contours {
        end_pts_of_contours.push(reader.read_u16()? as usize);
    }

    let number_of_points = match end_pts_of_contours.last() {
        Some(last) => last + 1,
        None => return Ok(Vec::new()),
    };

    let instruction_length = reader.read_u16()? as usize;
    reader.skip(instruction_length);

    let mut flags = Vec::with_capacity(number_of_points);

    while flags.len() < number_of_points {
        let flag = SimpleFlags(reader.read_u8()?);

        let flag_count = if flag.repeat_flag() {
            reader.read_u8()? as usize + 1
        } else {
            1
        };

        for _ in 0..flag_count {
            flags.push(flag);
        }
    }

    flags.truncate(number_of_points);

    // Coordinates are deltas; sum as we go.
    let mut x_coordinates = Vec::with_capacity(number_of_points);
    let mut previous_x = 0i16;

    for flag in flags.iter() {
        if flag.x_short_vector() {
            let dx = reader.read_u8()? as i16;

            if flag.x_is_same_or_positive_x_short_vector() {
                previous_x = previous_x.wrapping_add(dx);
            } else {
                previous_x = previous_x.wrapping_sub(dx);
            }
        } else if !flag.x_is_same_or_positive_x_short_vector() {
            previous_x = previous_x.wrapping_add(reader.read_i16()?);
        }

        x_coordinates.push(previous_x);
    }

    let mut y_coordinates = Vec::with_capacity(number_of_points);
    let mut previous_y = 0i16;

    for flag in flags.iter() {
        if flag.y_short_vector() {
            let dy = reader.read_u8()? as i16;

            if flag.y_is_same_or_positive_y_short_vector() {
                previous_y = previous_y.wrapping_add(dy);
            } else {
                previous_y = previous_y.wrapping_sub(dy);
            }
        } else if !flag.y_is_same_or_positive_y_short_vector() {
            previous_y = previous_y.wrapping_add(reader.read_i16()?);
        }

        y_coordinates.push(previous_y);
    }

    let mut ops = Vec::new();
    let mut range_start = 0;

    for &end in end_pts_of_contours.iter() {
        let range_end = end + 1;

        if range_start >= range_end || range_end > number_of_points {
            return Err(OvtError {
                kind: OvtErrorKind::Malformed,
                source: OvtErrorSource::GlyfTable,
            });
        }

        let points = x_coordinates[range_start..range_end]
            .iter()
            .zip(y_coordinates[range_start..range_end].iter())
            .map(|(&x, &y)| Point::new(x as f32, y as f32))
            .collect::<Vec<_>>();

        let on_curve = flags[range_start..range_end]
            .iter()
            .map(|flag| flag.on_curve_point())
            .collect::<Vec<_>>();

        contour_ops(&points, &on_curve, &mut ops);
        range_start = range_end;
    }

    Ok(ops)
}

/// Emits the path operations for one contour. Consecutive off-curve
/// points imply an on-curve midpoint between them; a contour starting
/// with an off-curve point wraps around to start from the last point.
fn contour_ops(points: &[Point], on_curve: &[bool], ops: &mut Vec<PathOp>) {
    let count = points.len();

    if count == 0 {
        return;
    }

    if count == 1 {
        ops.push(PathOp::MoveTo(points[0]));
        return;
    }

    let mut i = if on_curve[0] {
        ops.push(PathOp::MoveTo(points[0]));
        1
    } else {
        ops.push(PathOp::MoveTo(points[count - 1]));
        0
    };

    while i < count {
        if on_curve[i] {
            ops.push(PathOp::LineTo(points[i]));
            i += 1;
        } else if i == count - 1 {
            // Last point is off-curve; the segment wraps to the start.
            ops.push(PathOp::QuadTo(points[i], points[0]));
            i += 1;
        } else if on_curve[i + 1] {
            ops.push(PathOp::QuadTo(points[i], points[i + 1]));
            i += 2;
        } else {
            ops.push(PathOp::QuadTo(points[i], points[i].midpoint(points[i + 1])));
            i += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outline::BBox;
    use crate::parse::LocaTable;
    use crate::testutil::{glyf_compound_bytes, glyf_square_bytes};

    fn loca(offsets: Vec<u32>) -> LocaTable {
        LocaTable {
            offsets,
        }
    }

    #[test]
    fn square_contour() {
        let bytes = glyf_square_bytes();
        let len = bytes.len() as u32;
        let glyf = GlyfTable::new(bytes);
        let outline = glyf.outline(0, &loca(vec![0, len])).unwrap();

        assert_eq!(
            outline.ops,
            vec![
                PathOp::MoveTo(Point::new(0.0, 0.0)),
                PathOp::LineTo(Point::new(100.0, 0.0)),
                PathOp::LineTo(Point::new(100.0, 100.0)),
                PathOp::LineTo(Point::new(0.0, 100.0)),
            ]
        );

        // Declared bbox matches the one derived from the ops.
        assert_eq!(outline.bbox, BBox::of_ops(&outline.ops));
    }

    #[test]
    fn empty_glyph_has_no_ops() {
        let glyf = GlyfTable::new(Vec::new());
        let outline = glyf.outline(0, &loca(vec![0, 0])).unwrap();
        assert!(outline.ops.is_empty());
    }

    #[test]
    fn implied_midpoint_between_off_curve_points() {
        // Triangle-ish contour: on (0,0), off (50,100), off (150, 100).
        let points = vec![
            Point::new(0.0, 0.0),
            Point::new(50.0, 100.0),
            Point::new(150.0, 100.0),
        ];
        let mut ops = Vec::new();
        contour_ops(&points, &[true, false, false], &mut ops);

        assert_eq!(
            ops,
            vec![
                PathOp::MoveTo(Point::new(0.0, 0.0)),
                PathOp::QuadTo(Point::new(50.0, 100.0), Point::new(100.0, 100.0)),
                PathOp::QuadTo(Point::new(150.0, 100.0), Point::new(0.0, 0.0)),
            ]
        );
    }

    #[test]
    fn contour_starting_off_curve_wraps() {
        let points = vec![
            Point::new(50.0, 100.0),
            Point::new(0.0, 0.0),
            Point::new(100.0, 0.0),
        ];
        let mut ops = Vec::new();
        contour_ops(&points, &[false, true, true], &mut ops);

        assert_eq!(
            ops,
            vec![
                PathOp::MoveTo(Point::new(100.0, 0.0)),
                PathOp::QuadTo(Point::new(50.0, 100.0), Point::new(0.0, 0.0)),
                PathOp::LineTo(Point::new(100.0, 0.0)),
            ]
        );
    }

    #[test]
    fn compound_identity_translates_component() {
        let square = glyf_square_bytes();
        let square_len = square.len() as u32;
        let compound = glyf_compound_bytes(0, 30, -10);
        let mut bytes = square;
        bytes.extend_from_slice(&compound);
        let total_len = bytes.len() as u32;

        let glyf = GlyfTable::new(bytes);
        let loca = loca(vec![0, square_len, total_len]);
        let base = glyf.outline(0, &loca).unwrap();
        let composed = glyf.outline(1, &loca).unwrap();

        let expected = base
            .ops
            .iter()
            .map(|op| {
                match *op {
                    PathOp::MoveTo(p) => PathOp::MoveTo(Point::new(p.x + 30.0, p.y - 10.0)),
                    PathOp::LineTo(p) => PathOp::LineTo(Point::new(p.x + 30.0, p.y - 10.0)),
                    other => other,
                }
            })
            .collect::<Vec<_>>();

        assert_eq!(composed.ops, expected);
    }

    #[test]
    fn match_points_are_rejected() {
        let square = glyf_square_bytes();
        let square_len = square.len() as u32;
        // ARG_1_AND_2_ARE_WORDS without ARGS_ARE_XY_VALUES.
        let compound = crate::testutil::ByteWriter::new()
            .i16(-1)
            .i16(0)
            .i16(0)
            .i16(0)
            .i16(0)
            .u16(0x0001)
            .u16(0)
            .u16(1)
            .u16(2)
            .take();
        let mut bytes = square;
        bytes.extend_from_slice(&compound);
        let total_len = bytes.len() as u32;

        let glyf = GlyfTable::new(bytes);
        let loca = loca(vec![0, square_len, total_len]);
        let err = glyf.outline(1, &loca).unwrap_err();
        assert_eq!(err.kind, OvtErrorKind::MatchPointsNotSupported);
    }

    #[test]
    fn self_referencing_component_hits_depth_cap() {
        let compound = glyf_compound_bytes(0, 0, 0);
        let len = compound.len() as u32;
        let glyf = GlyfTable::new(compound);
        let err = glyf.outline(0, &loca(vec![0, len])).unwrap_err();
        assert_eq!(err.kind, OvtErrorKind::RecursionLimit);
    }
}
