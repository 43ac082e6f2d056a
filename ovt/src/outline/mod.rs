//! This `mod` turns raw glyph data into normalized outlines: an ordered
//! list of path operations plus a bounding box, in font design units.

pub mod charstring;
pub mod glyf;

pub use charstring::CharstringDecoder;
pub use glyf::GlyfTable;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
        }
    }

    pub fn midpoint(self, other: Self) -> Self {
        Self {
            x: (self.x + other.x) / 2.0,
            y: (self.y + other.y) / 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BBox {
    pub x_min: f32,
    pub x_max: f32,
    pub y_min: f32,
    pub y_max: f32,
}

impl BBox {
    /// Tight bound over every coordinate in `ops`, control points
    /// included. Zero for an empty op list.
    pub fn of_ops(ops: &[PathOp]) -> Self {
        let mut bbox = Self {
            x_min: f32::MAX,
            x_max: f32::MIN,
            y_min: f32::MAX,
            y_max: f32::MIN,
        };

        let mut any = false;

        for op in ops {
            for point in op.points() {
                bbox.x_min = bbox.x_min.min(point.x);
                bbox.x_max = bbox.x_max.max(point.x);
                bbox.y_min = bbox.y_min.min(point.y);
                bbox.y_max = bbox.y_max.max(point.y);
                any = true;
            }
        }

        if !any {
            return Self {
                x_min: 0.0,
                x_max: 0.0,
                y_min: 0.0,
                y_max: 0.0,
            };
        }

        bbox
    }
}

/// One path operation with absolute coordinates. Quadratic segments come
/// from glyf outlines, cubic segments from charstrings; a new `MoveTo`
/// implicitly closes the previous contour.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathOp {
    MoveTo(Point),
    LineTo(Point),
    /// Control point, then end point.
    QuadTo(Point, Point),
    /// Two control points, then the end point.
    CurveTo(Point, Point, Point),
}

impl PathOp {
    fn points(&self) -> impl Iterator<Item = Point> {
        let points = match *self {
            Self::MoveTo(p) => [Some(p), None, None],
            Self::LineTo(p) => [Some(p), None, None],
            Self::QuadTo(p1, p2) => [Some(p1), Some(p2), None],
            Self::CurveTo(p1, p2, p3) => [Some(p1), Some(p2), Some(p3)],
        };

        points.into_iter().flatten()
    }

    pub fn end(&self) -> Point {
        match *self {
            Self::MoveTo(p) => p,
            Self::LineTo(p) => p,
            Self::QuadTo(_, p) => p,
            Self::CurveTo(_, _, p) => p,
        }
    }

    fn transformed(&self, xform: &Xform) -> Self {
        match *self {
            Self::MoveTo(p) => Self::MoveTo(xform.apply(p)),
            Self::LineTo(p) => Self::LineTo(xform.apply(p)),
            Self::QuadTo(p1, p2) => Self::QuadTo(xform.apply(p1), xform.apply(p2)),
            Self::CurveTo(p1, p2, p3) => {
                Self::CurveTo(xform.apply(p1), xform.apply(p2), xform.apply(p3))
            },
        }
    }
}

/// A decoded glyph outline in design units.
#[derive(Debug, Clone)]
pub struct GlyphOutline {
    pub glyph_id: u16,
    pub ops: Vec<PathOp>,
    pub bbox: BBox,
    /// Advance width carried by the glyph data itself (charstring width
    /// operand); `None` for glyf outlines, where `hmtx` is authoritative.
    pub advance_width: Option<f32>,
}

impl GlyphOutline {
    pub fn empty(glyph_id: u16) -> Self {
        Self {
            glyph_id,
            ops: Vec::new(),
            bbox: BBox {
                x_min: 0.0,
                x_max: 0.0,
                y_min: 0.0,
                y_max: 0.0,
            },
            advance_width: None,
        }
    }
}

/// Component transform of a compound glyph.
///
/// Application folds in the scale-overflow compensation from the format:
/// when the absolute diagonal and off-diagonal terms are within 33/65536
/// of each other, the corresponding divisor is doubled.
#[derive(Debug, Clone, Copy)]
pub struct Xform {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub e: f32,
    pub f: f32,
}

impl Xform {
    pub fn apply(&self, point: Point) -> Point {
        let m0 = self.a.abs().max(self.b.abs());
        let n0 = self.c.abs().max(self.d.abs());

        let m = if (self.a.abs() - self.c.abs()).abs() <= 33.0 / 65536.0 {
            2.0 * m0
        } else {
            m0
        };

        let n = if (self.b.abs() - self.d.abs()).abs() <= 33.0 / 65536.0 {
            2.0 * n0
        } else {
            n0
        };

        Point {
            x: self.a * point.x + (self.c / m) * point.y + self.e,
            y: self.b * point.x + (self.d / n) * point.y + self.f,
        }
    }

    pub fn apply_ops(&self, ops: &[PathOp]) -> Vec<PathOp> {
        ops.iter().map(|op| op.transformed(self)).collect()
    }
}
