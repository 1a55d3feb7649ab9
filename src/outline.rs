//! # Outline Decomposer
//!
//! Turns a glyph outline in font design units into device-space segments for
//! the outline view.
//!
//! ## Pipeline
//! 1. **Collect**: the font engine walks the outline through
//!    [`ttf_parser::OutlineBuilder`] callbacks; [`OutlineCollector`] records
//!    them as [`OutlineCommand`]s
//! 2. **Fit**: the design-space bounding box of every outline point (on- and
//!    off-curve) is scaled so its larger side equals the target size and its
//!    center lands on the target center
//! 3. **Transform**: every point goes through `(x*s + ox, -y*s + oy)`; font Y
//!    grows upward, device Y grows downward
//!
//! Curves are kept as curves here. Flattening into line runs happens in
//! [`flatten_conic`] / [`flatten_cubic`], with fixed step counts so the
//! number of strokes per curve is predictable.

use kurbo::{Affine, CubicBez, ParamCurve, Point, QuadBez, Rect};

/// Line runs used to approximate a quadratic curve.
pub const CONIC_STEPS: usize = 10;
/// Line runs used to approximate a cubic curve.
pub const CUBIC_STEPS: usize = 15;

/// One outline-walk callback, in design units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum OutlineCommand {
    MoveTo(Point),
    LineTo(Point),
    /// Control point, end point
    QuadTo(Point, Point),
    /// First control, second control, end point
    CurveTo(Point, Point, Point),
}

impl OutlineCommand {
    fn points(&self) -> impl Iterator<Item = Point> {
        let (a, b, c) = match *self {
            OutlineCommand::MoveTo(p) | OutlineCommand::LineTo(p) => (Some(p), None, None),
            OutlineCommand::QuadTo(c, p) => (Some(c), Some(p), None),
            OutlineCommand::CurveTo(c1, c2, p) => (Some(c1), Some(c2), Some(p)),
        };
        a.into_iter().chain(b).chain(c)
    }
}

/// A glyph outline as recorded from the font engine.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GlyphOutline {
    pub commands: Vec<OutlineCommand>,
}

impl GlyphOutline {
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Bounding box over every outline point, control points included.
    pub fn bounds(&self) -> Option<Rect> {
        let mut points = self.commands.iter().flat_map(|c| c.points());
        let first = points.next()?;
        Some(points.fold(Rect::from_points(first, first), |rect, p| rect.union_pt(p)))
    }
}

/// Records outline-walk callbacks into a [`GlyphOutline`].
///
/// `close` becomes an explicit line back to the contour start when the
/// contour does not already end there, so every drawn edge is a segment.
#[derive(Debug, Default)]
pub struct OutlineCollector {
    outline: GlyphOutline,
    contour_start: Option<Point>,
    current: Option<Point>,
}

impl OutlineCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn finish(self) -> GlyphOutline {
        self.outline
    }

    fn push(&mut self, command: OutlineCommand, end: Point) {
        self.outline.commands.push(command);
        self.current = Some(end);
    }
}

impl ttf_parser::OutlineBuilder for OutlineCollector {
    fn move_to(&mut self, x: f32, y: f32) {
        let p = Point::new(x.into(), y.into());
        self.contour_start = Some(p);
        self.push(OutlineCommand::MoveTo(p), p);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let p = Point::new(x.into(), y.into());
        self.push(OutlineCommand::LineTo(p), p);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let c = Point::new(x1.into(), y1.into());
        let p = Point::new(x.into(), y.into());
        self.push(OutlineCommand::QuadTo(c, p), p);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let c1 = Point::new(x1.into(), y1.into());
        let c2 = Point::new(x2.into(), y2.into());
        let p = Point::new(x.into(), y.into());
        self.push(OutlineCommand::CurveTo(c1, c2, p), p);
    }

    fn close(&mut self) {
        if let (Some(start), Some(current)) = (self.contour_start, self.current) {
            if start != current {
                self.push(OutlineCommand::LineTo(start), start);
            }
        }
        self.contour_start = None;
    }
}

/// Kind of a device-space segment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SegmentKind {
    /// Starts a new contour; draws nothing
    Move,
    Line,
    /// Quadratic Bézier
    Conic,
    Cubic,
}

/// One outline segment in device pixel coordinates.
///
/// Line, Conic and Cubic segments start at the previous segment's end point.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OutlineSegment {
    pub kind: SegmentKind,
    pub end: Point,
    pub control1: Option<Point>,
    pub control2: Option<Point>,
}

impl OutlineSegment {
    fn transformed(command: &OutlineCommand, transform: Affine) -> Self {
        let t = |p: Point| transform * p;
        match *command {
            OutlineCommand::MoveTo(p) => Self {
                kind: SegmentKind::Move,
                end: t(p),
                control1: None,
                control2: None,
            },
            OutlineCommand::LineTo(p) => Self {
                kind: SegmentKind::Line,
                end: t(p),
                control1: None,
                control2: None,
            },
            OutlineCommand::QuadTo(c, p) => Self {
                kind: SegmentKind::Conic,
                end: t(p),
                control1: Some(t(c)),
                control2: None,
            },
            OutlineCommand::CurveTo(c1, c2, p) => Self {
                kind: SegmentKind::Cubic,
                end: t(p),
                control1: Some(t(c1)),
                control2: Some(t(c2)),
            },
        }
    }
}

/// Design-to-device transform fitting `bounds` into a `target_size` square
/// centered on `target_center`, with the Y axis flipped.
///
/// Returns `None` for a degenerate (zero-sized) box.
pub fn fit_transform(bounds: Rect, target_size: f64, target_center: Point) -> Option<Affine> {
    let extent = bounds.width().max(bounds.height());
    if extent <= 0.0 || !extent.is_finite() {
        return None;
    }
    let scale = target_size / extent;
    let center = bounds.center();
    let offset_x = target_center.x - scale * center.x;
    let offset_y = target_center.y + scale * center.y;
    Some(Affine::new([scale, 0.0, 0.0, -scale, offset_x, offset_y]))
}

/// Decompose an outline into device-space segments.
///
/// Segment order follows the outline walk, so contour boundaries are kept: a
/// [`SegmentKind::Move`] always starts a new contour.
pub fn decompose(outline: &GlyphOutline, target_size: f64, target_center: Point) -> Vec<OutlineSegment> {
    let Some(transform) = outline
        .bounds()
        .and_then(|bounds| fit_transform(bounds, target_size, target_center))
    else {
        return Vec::new();
    };
    outline
        .commands
        .iter()
        .map(|command| OutlineSegment::transformed(command, transform))
        .collect()
}

/// Polyline approximation of a quadratic Bézier: `CONIC_STEPS + 1` points.
pub fn flatten_conic(p0: Point, p1: Point, p2: Point) -> Vec<Point> {
    let curve = QuadBez::new(p0, p1, p2);
    (0..=CONIC_STEPS)
        .map(|i| curve.eval(i as f64 / CONIC_STEPS as f64))
        .collect()
}

/// Polyline approximation of a cubic Bézier: `CUBIC_STEPS + 1` points.
pub fn flatten_cubic(p0: Point, p1: Point, p2: Point, p3: Point) -> Vec<Point> {
    let curve = CubicBez::new(p0, p1, p2, p3);
    (0..=CUBIC_STEPS)
        .map(|i| curve.eval(i as f64 / CUBIC_STEPS as f64))
        .collect()
}
