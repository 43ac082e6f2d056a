use log::warn;

use crate::error::*;
use crate::outline::{BBox, GlyphOutline, PathOp, Point};
use crate::parse::{CffTable, FontReader};

/// Subroutines may call subroutines; well-formed fonts stay shallow.
const MAX_SUBR_DEPTH: usize = 10;

/// Type 2 charstring operators.
/// <https://adobe-type-tools.github.io/font-tech-notes/pdfs/5177.Type2.pdf>
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    /// Synthesized from the optional leading width operand; not part of
    /// the encoding.
    Width,
    HStem,
    VStem,
    VMoveTo,
    RLineTo,
    HLineTo,
    VLineTo,
    RRCurveTo,
    CallSubr,
    Return,
    EndChar,
    HStemHm,
    HintMask,
    CntrMask,
    RMoveTo,
    HMoveTo,
    VStemHm,
    RCurveLine,
    RLineCurve,
    VVCurveTo,
    HHCurveTo,
    CallGSubr,
    VHCurveTo,
    HVCurveTo,
    Flex,
    HFlex,
    HFlex1,
    Flex1,
}

impl Op {
    fn from_code(code: u16) -> Result<Self, OvtError> {
        let op = match code {
            1 => Self::HStem,
            3 => Self::VStem,
            4 => Self::VMoveTo,
            5 => Self::RLineTo,
            6 => Self::HLineTo,
            7 => Self::VLineTo,
            8 => Self::RRCurveTo,
            10 => Self::CallSubr,
            11 => Self::Return,
            14 => Self::EndChar,
            18 => Self::HStemHm,
            19 => Self::HintMask,
            20 => Self::CntrMask,
            21 => Self::RMoveTo,
            22 => Self::HMoveTo,
            23 => Self::VStemHm,
            24 => Self::RCurveLine,
            25 => Self::RLineCurve,
            26 => Self::VVCurveTo,
            27 => Self::HHCurveTo,
            29 => Self::CallGSubr,
            30 => Self::VHCurveTo,
            31 => Self::HVCurveTo,
            0x0c22 => Self::HFlex,
            0x0c23 => Self::Flex,
            0x0c24 => Self::HFlex1,
            0x0c25 => Self::Flex1,
            _ => {
                return Err(OvtError {
                    kind: OvtErrorKind::UnsupportedOperator(code),
                    source: OvtErrorSource::Charstring,
                })
            },
        };

        Ok(op)
    }
}

/// Decodes glyph outlines from the charstrings of a parsed `CFF ` table.
pub struct CharstringDecoder<'a> {
    cff: &'a CffTable,
}

impl<'a> CharstringDecoder<'a> {
    pub fn new(cff: &'a CffTable) -> Self {
        Self {
            cff,
        }
    }

    pub fn outline(&self, glyph_id: u16) -> Result<GlyphOutline, OvtError> {
        let charstring = match self.cff.charstrings.get(glyph_id as usize) {
            Some(charstring) => charstring,
            None => {
                return Err(OvtError {
                    kind: OvtErrorKind::Malformed,
                    source: OvtErrorSource::Charstring,
                })
            },
        };

        let mut program = Program {
            ops: Vec::new(),
            stack: Vec::new(),
            num_hints: 0,
        };

        program.read(self.cff, charstring, 0)?;
        let (ops, width) = self.run(&program, glyph_id)?;

        Ok(GlyphOutline {
            glyph_id,
            bbox: BBox::of_ops(&ops),
            ops,
            advance_width: Some(width),
        })
    }

    /// Second pass: turn the flattened operator list into geometry. All
    /// coordinates are relative; the current point accumulates them.
    fn run(&self, program: &Program, glyph_id: u16) -> Result<(Vec<PathOp>, f32), OvtError> {
        let mut ops = Vec::new();
        let mut width = self.cff.default_width_x;
        let mut p = Point::new(0.0, 0.0);
        let mut last_op = None;

        for (op, operands) in program.ops.iter() {
            let v = operands.as_slice();
            last_op = Some(*op);

            match op {
                Op::Width => {
                    let &[operand, ..] = v else {
                        return Err(malformed());
                    };

                    width = self.cff.nominal_width_x + operand;
                },
                Op::RMoveTo => {
                    let &[dx, dy, ..] = v else {
                        return Err(malformed());
                    };

                    p.x += dx;
                    p.y += dy;
                    ops.push(PathOp::MoveTo(p));
                },
                Op::HMoveTo => {
                    let &[dx, ..] = v else {
                        return Err(malformed());
                    };

                    p.x += dx;
                    ops.push(PathOp::MoveTo(p));
                },
                Op::VMoveTo => {
                    let &[dy, ..] = v else {
                        return Err(malformed());
                    };

                    p.y += dy;
                    ops.push(PathOp::MoveTo(p));
                },
                Op::HLineTo => {
                    for (i, &d) in v.iter().enumerate() {
                        // Alternate horizontal and vertical segments.
                        if i % 2 == 0 {
                            p.x += d;
                        } else {
                            p.y += d;
                        }

                        ops.push(PathOp::LineTo(p));
                    }
                },
                Op::VLineTo => {
                    for (i, &d) in v.iter().enumerate() {
                        if i % 2 == 0 {
                            p.y += d;
                        } else {
                            p.x += d;
                        }

                        ops.push(PathOp::LineTo(p));
                    }
                },
                Op::RLineTo => {
                    for pair in v.chunks_exact(2) {
                        p.x += pair[0];
                        p.y += pair[1];
                        ops.push(PathOp::LineTo(p));
                    }
                },
                Op::RRCurveTo | Op::RCurveLine => {
                    let mut rest = v;

                    while rest.len() > 2 {
                        let &[dxa, dya, dxb, dyb, dxc, dyc, ..] = rest else {
                            return Err(malformed());
                        };

                        p = push_cubic(&mut ops, p, dxa, dya, dxb, dyb, dxc, dyc);
                        rest = &rest[6..];
                    }

                    if *op == Op::RCurveLine {
                        let &[dx, dy, ..] = rest else {
                            return Err(malformed());
                        };

                        p.x += dx;
                        p.y += dy;
                        ops.push(PathOp::LineTo(p));
                    }
                },
                Op::RLineCurve => {
                    let mut rest = v;

                    while rest.len() > 6 {
                        p.x += rest[0];
                        p.y += rest[1];
                        ops.push(PathOp::LineTo(p));
                        rest = &rest[2..];
                    }

                    let &[dxa, dya, dxb, dyb, dxc, dyc, ..] = rest else {
                        return Err(malformed());
                    };

                    p = push_cubic(&mut ops, p, dxa, dya, dxb, dyb, dxc, dyc);
                },
                Op::HHCurveTo => {
                    let mut rest = v;

                    // An odd leading operand is an initial dy.
                    let mut dya = if rest.len() % 4 >= 1 {
                        let dya = rest[0];
                        rest = &rest[1..];
                        dya
                    } else {
                        0.0
                    };

                    while rest.len() >= 4 {
                        let &[dxa, dxb, dyb, dxc, ..] = rest else {
                            return Err(malformed());
                        };

                        p = push_cubic(&mut ops, p, dxa, dya, dxb, dyb, dxc, 0.0);
                        dya = 0.0;
                        rest = &rest[4..];
                    }
                },
                Op::VVCurveTo => {
                    let mut rest = v;

                    let mut dxa = if rest.len() % 4 >= 1 {
                        let dxa = rest[0];
                        rest = &rest[1..];
                        dxa
                    } else {
                        0.0
                    };

                    while rest.len() >= 4 {
                        let &[dya, dxb, dyb, dyc, ..] = rest else {
                            return Err(malformed());
                        };

                        p = push_cubic(&mut ops, p, dxa, dya, dxb, dyb, 0.0, dyc);
                        dxa = 0.0;
                        rest = &rest[4..];
                    }
                },
                Op::HVCurveTo => {
                    p = hv_curve_to(&mut ops, p, v, true)?;
                },
                Op::VHCurveTo => {
                    p = hv_curve_to(&mut ops, p, v, false)?;
                },
                Op::Flex => {
                    let &[dx1, dy1, dx2, dy2, dx3, dy3, dx4, dy4, dx5, dy5, dx6, dy6, ..] = v
                    else {
                        return Err(malformed());
                    };

                    p = push_cubic(&mut ops, p, dx1, dy1, dx2, dy2, dx3, dy3);
                    p = push_cubic(&mut ops, p, dx4, dy4, dx5, dy5, dx6, dy6);
                },
                Op::Flex1 => {
                    let &[dx1, dy1, dx2, dy2, dx3, dy3, dx4, dy4, dx5, dy5, d6, ..] = v else {
                        return Err(malformed());
                    };

                    let dx = dx1 + dx2 + dx3 + dx4 + dx5;
                    let dy = dy1 + dy2 + dy3 + dy4 + dy5;
                    p = push_cubic(&mut ops, p, dx1, dy1, dx2, dy2, dx3, dy3);

                    // The final point moves along the dominant axis only.
                    let (dx6, dy6) = if dx.abs() > dy.abs() {
                        (d6, 0.0)
                    } else {
                        (0.0, d6)
                    };

                    p = push_cubic(&mut ops, p, dx4, dy4, dx5, dy5, dx6, dy6);
                },
                Op::HFlex => {
                    let &[dx1, dx2, dy2, dx3, dx4, dx5, dx6, ..] = v else {
                        return Err(malformed());
                    };

                    p = push_cubic(&mut ops, p, dx1, 0.0, dx2, dy2, dx3, 0.0);
                    p = push_cubic(&mut ops, p, dx4, 0.0, dx5, 0.0, dx6, 0.0);
                },
                Op::HFlex1 => {
                    let &[dx1, dy1, dx2, dy2, dx3, dx4, dx5, dy5, dx6, ..] = v else {
                        return Err(malformed());
                    };

                    p = push_cubic(&mut ops, p, dx1, dy1, dx2, dy2, dx3, 0.0);
                    p = push_cubic(&mut ops, p, dx4, 0.0, dx5, dy5, dx6, 0.0);
                },
                // Hints carry no geometry.
                Op::HStem | Op::VStem | Op::HStemHm | Op::VStemHm => (),
                Op::HintMask | Op::CntrMask | Op::EndChar => (),
                // Consumed during the read pass.
                Op::CallSubr | Op::CallGSubr | Op::Return => (),
            }
        }

        if last_op != Some(Op::EndChar) {
            warn!("glyph {} charstring has no endchar", glyph_id);
        }

        Ok((ops, width))
    }
}

fn malformed() -> OvtError {
    OvtError {
        kind: OvtErrorKind::Malformed,
        source: OvtErrorSource::Charstring,
    }
}

#[allow(clippy::too_many_arguments)]
fn push_cubic(
    ops: &mut Vec<PathOp>,
    p: Point,
    dxa: f32,
    dya: f32,
    dxb: f32,
    dyb: f32,
    dxc: f32,
    dyc: f32,
) -> Point {
    let p1 = Point::new(p.x + dxa, p.y + dya);
    let p2 = Point::new(p1.x + dxb, p1.y + dyb);
    let p3 = Point::new(p2.x + dxc, p2.y + dyc);
    ops.push(PathOp::CurveTo(p1, p2, p3));
    p3
}

/// `hvcurveto`/`vhcurveto`: curves whose tangents alternate between
/// horizontal and vertical. `start_horizontal` selects which comes first;
/// an operand count satisfying `len % 8 >= 4` selects the four-operand
/// leading form, and a trailing ninth/fifth operand bends the last end
/// point off-axis.
fn hv_curve_to(
    ops: &mut Vec<PathOp>,
    start: Point,
    v: &[f32],
    start_horizontal: bool,
) -> Result<Point, OvtError> {
    let mut p = start;
    let mut rest = v;
    let mut horizontal = start_horizontal;

    if v.len() % 8 >= 4 {
        let &[d1, d2a, d2b, d3, ..] = rest else {
            return Err(malformed());
        };

        let p1 = if horizontal {
            Point::new(p.x + d1, p.y)
        } else {
            Point::new(p.x, p.y + d1)
        };

        let p2 = Point::new(p1.x + d2a, p1.y + d2b);

        let mut p3 = if horizontal {
            Point::new(p2.x, p2.y + d3)
        } else {
            Point::new(p2.x + d3, p2.y)
        };

        if rest.len() == 5 {
            if horizontal {
                p3.x += rest[4];
            } else {
                p3.y += rest[4];
            }
        }

        ops.push(PathOp::CurveTo(p1, p2, p3));
        p = p3;
        rest = &rest[4..];
        horizontal = !horizontal;
    }

    while rest.len() >= 8 {
        let &[da, dba, dbb, dc, dd, dea, deb, df, ..] = rest else {
            return Err(malformed());
        };

        let extra = if rest.len() == 9 { rest[8] } else { 0.0 };

        let p1 = if horizontal {
            Point::new(p.x + da, p.y)
        } else {
            Point::new(p.x, p.y + da)
        };

        let p2 = Point::new(p1.x + dba, p1.y + dbb);

        let p3 = if horizontal {
            Point::new(p2.x, p2.y + dc)
        } else {
            Point::new(p2.x + dc, p2.y)
        };

        ops.push(PathOp::CurveTo(p1, p2, p3));

        let p4 = if horizontal {
            Point::new(p3.x, p3.y + dd)
        } else {
            Point::new(p3.x + dd, p3.y)
        };

        let p5 = Point::new(p4.x + dea, p4.y + deb);

        let p6 = if horizontal {
            Point::new(p5.x + df, p5.y + extra)
        } else {
            Point::new(p5.x + extra, p5.y + df)
        };

        ops.push(PathOp::CurveTo(p4, p5, p6));
        p = p6;
        rest = &rest[8..];
    }

    Ok(p)
}

/// First pass over charstring bytes: flattens subroutine calls, detects
/// the optional leading width operand and collects `(operator, operands)`
/// pairs for the geometry pass.
struct Program {
    ops: Vec<(Op, Vec<f32>)>,
    stack: Vec<f32>,
    num_hints: usize,
}

impl Program {
    fn read(&mut self, cff: &CffTable, bytes: &[u8], depth: usize) -> Result<(), OvtError> {
        if depth > MAX_SUBR_DEPTH {
            return Err(OvtError {
                kind: OvtErrorKind::RecursionLimit,
                source: OvtErrorSource::Charstring,
            });
        }

        let mut reader = FontReader::new(bytes, OvtErrorSource::Charstring);

        while reader.pos() < bytes.len() {
            let b0 = reader.read_u8()?;

            match b0 {
                0..=11 | 13..=27 | 29..=31 => {
                    let op = Op::from_code(b0 as u16)?;
                    self.operator(cff, op, &mut reader, depth)?;

                    // Both terminate the current byte stream.
                    if op == Op::Return || op == Op::EndChar {
                        break;
                    }
                },
                12 => {
                    let code = 0x0c00 | reader.read_u8()? as u16;
                    self.operator(cff, Op::from_code(code)?, &mut reader, depth)?;
                },
                28 => self.stack.push(reader.read_i16()? as f32),
                32..=246 => self.stack.push(b0 as f32 - 139.0),
                247..=250 => {
                    let b1 = reader.read_u8()?;
                    self.stack
                        .push((b0 as f32 - 247.0) * 256.0 + b1 as f32 + 108.0);
                },
                251..=254 => {
                    let b1 = reader.read_u8()?;
                    self.stack
                        .push(-(b0 as f32 - 251.0) * 256.0 - b1 as f32 - 108.0);
                },
                255 => self.stack.push(reader.read_fixed()?),
            }
        }

        Ok(())
    }

    fn operator(
        &mut self,
        cff: &CffTable,
        op: Op,
        reader: &mut FontReader,
        depth: usize,
    ) -> Result<(), OvtError> {
        // The first stack-clearing operator may carry a leading width
        // operand; its presence is deduced from the operator's arity.
        if self.ops.is_empty() {
            let has_width = match op {
                Op::CntrMask | Op::EndChar => self.stack.len() == 1,
                Op::HMoveTo | Op::VMoveTo => self.stack.len() > 1,
                Op::RMoveTo => self.stack.len() > 2,
                Op::HStem | Op::HStemHm | Op::VStem | Op::VStemHm | Op::HintMask => {
                    self.stack.len() % 2 != 0
                },
                _ => false,
            };

            if has_width {
                let width = self.stack.remove(0);
                self.ops.push((Op::Width, vec![width]));
            }
        }

        match op {
            Op::CallSubr | Op::CallGSubr => {
                let subrs = if op == Op::CallSubr {
                    &cff.local_subrs
                } else {
                    &cff.global_subrs
                };

                let index = match self.stack.pop() {
                    Some(operand) => operand as i32 + subr_bias(subrs.len()),
                    None => return Err(malformed()),
                };

                let subr = match usize::try_from(index).ok().and_then(|i| subrs.get(i)) {
                    Some(subr) => subr.clone(),
                    None => return Err(malformed()),
                };

                self.read(cff, &subr, depth + 1)?;
            },
            Op::Return => (),
            Op::HintMask | Op::CntrMask => {
                // Operands still on the stack at a mask imply a vstem.
                let implied_vstem = match self.ops.last() {
                    Some((Op::HStemHm, _)) => !self.stack.is_empty(),
                    Some((Op::Width, _)) => self.ops.len() == 1,
                    None => true,
                    _ => false,
                };

                if implied_vstem {
                    self.num_hints += self.stack.len() / 2;
                    self.append(Op::VStemHm);
                }

                let mask_len = (self.num_hints + 7) / 8;
                let mask = reader.read_bytes(mask_len)?;
                self.stack = mask.iter().map(|&b| b as f32).collect();
                self.append(op);
            },
            Op::HStem | Op::HStemHm | Op::VStem | Op::VStemHm => {
                self.num_hints += self.stack.len() / 2;
                self.append(op);
            },
            _ => self.append(op),
        }

        Ok(())
    }

    fn append(&mut self, op: Op) {
        let operands = std::mem::take(&mut self.stack);
        self.ops.push((op, operands));
    }
}

/// Subroutine indexes are biased by a count-dependent constant.
fn subr_bias(count: usize) -> i32 {
    if count < 1240 {
        107
    } else if count < 33900 {
        1131
    } else {
        32768
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cff(charstrings: Vec<Vec<u8>>, local_subrs: Vec<Vec<u8>>) -> CffTable {
        CffTable {
            charstrings,
            global_subrs: Vec::new(),
            local_subrs,
            default_width_x: 123.0,
            nominal_width_x: 400.0,
        }
    }

    #[test]
    fn hmoveto_hlineto_endchar() {
        // hmoveto 100, hlineto 50, endchar. Even operand counts, so the
        // width rule must not fire.
        let cff = cff(vec![vec![239, 22, 189, 6, 14]], Vec::new());
        let outline = CharstringDecoder::new(&cff).outline(0).unwrap();

        assert_eq!(
            outline.ops,
            vec![
                PathOp::MoveTo(Point::new(100.0, 0.0)),
                PathOp::LineTo(Point::new(150.0, 0.0)),
            ]
        );

        assert_eq!(outline.advance_width, Some(123.0));
    }

    #[test]
    fn leading_width_operand() {
        // Two operands before hmoveto: the first is the width.
        let cff = cff(vec![vec![239, 149, 22, 14]], Vec::new());
        let outline = CharstringDecoder::new(&cff).outline(0).unwrap();
        assert_eq!(outline.ops, vec![PathOp::MoveTo(Point::new(10.0, 0.0))]);
        assert_eq!(outline.advance_width, Some(500.0));
    }

    #[test]
    fn odd_stem_count_implies_width() {
        // hstem with 3 operands: first is the width.
        let cff = cff(vec![vec![189, 139, 159, 1, 14]], Vec::new());
        let outline = CharstringDecoder::new(&cff).outline(0).unwrap();
        assert_eq!(outline.advance_width, Some(450.0));
    }

    #[test]
    fn rrcurveto_accumulates_relative_controls() {
        // rmoveto 0 0, rrcurveto 10 20 30 40 50 60.
        let cff = cff(
            vec![vec![139, 139, 21, 149, 159, 169, 179, 189, 199, 8, 14]],
            Vec::new(),
        );
        let outline = CharstringDecoder::new(&cff).outline(0).unwrap();

        assert_eq!(
            outline.ops,
            vec![
                PathOp::MoveTo(Point::new(0.0, 0.0)),
                PathOp::CurveTo(
                    Point::new(10.0, 20.0),
                    Point::new(40.0, 60.0),
                    Point::new(90.0, 120.0),
                ),
            ]
        );
    }

    #[test]
    fn local_subr_call_uses_bias() {
        // One local subr, so bias is 107; pushing -107 calls subr 0,
        // which performs rmoveto 10 20.
        let subr = vec![149, 159, 21, 11];
        let cff = cff(vec![vec![32, 10, 14]], vec![subr]);
        let outline = CharstringDecoder::new(&cff).outline(0).unwrap();
        assert_eq!(outline.ops, vec![PathOp::MoveTo(Point::new(10.0, 20.0))]);
    }

    #[test]
    fn hintmask_consumes_mask_bytes() {
        // hstemhm 0 20, then hintmask with pending vstem operands 5 25,
        // two hints total so one mask byte follows.
        let charstring = vec![139, 159, 18, 144, 159, 19, 0xC0, 14];
        let cff = cff(vec![charstring], Vec::new());
        let outline = CharstringDecoder::new(&cff).outline(0).unwrap();
        assert!(outline.ops.is_empty());
    }

    #[test]
    fn unknown_operator_is_named() {
        let cff = cff(vec![vec![139, 2, 14]], Vec::new());
        let err = CharstringDecoder::new(&cff).outline(0).unwrap_err();
        assert_eq!(err.kind, OvtErrorKind::UnsupportedOperator(2));
    }

    #[test]
    fn missing_endchar_is_not_fatal() {
        let cff = cff(vec![vec![239, 22]], Vec::new());
        let outline = CharstringDecoder::new(&cff).outline(0).unwrap();
        assert_eq!(outline.ops.len(), 1);
    }

    #[test]
    fn sixteen_bit_and_fixed_operands() {
        // 28 pushes a signed 16-bit value; 255 pushes 16.16 fixed.
        let charstring = vec![28, 0x01, 0x2C, 255, 0, 100, 0, 0, 21, 14];
        let cff = cff(vec![charstring], Vec::new());
        let outline = CharstringDecoder::new(&cff).outline(0).unwrap();
        assert_eq!(outline.ops, vec![PathOp::MoveTo(Point::new(300.0, 100.0))]);
    }
}
