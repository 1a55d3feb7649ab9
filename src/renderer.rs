//! # Specimen Renderer
//!
//! Draws one specimen frame onto the [`Canvas`]: the glyph in the middle, the
//! font name at the top and the codepoint at the bottom.
//!
//! ## View modes
//! - **Bitmap**: the glyph is rasterized at a pixel size chosen so its larger
//!   design dimension spans the target size, then the 8-bit coverage is mapped
//!   onto 16 gray levels and blitted centered
//! - **Outline**: the outline is decomposed into device-space segments and
//!   drawn as strokes, with dashed construction lines to the control points
//!   and markers on every point
//!
//! ## Labels
//! Labels use the built-in ISO-8859-1 mono font, a drawing path that never
//! touches the glyph raster caches. The text style is rebuilt for every label
//! so nothing set up for the glyph carries over.

use crate::canvas::Canvas;
use crate::font_engine::{FaceLoader, FontEngine, FontError, FontFace, RasterGlyph, RenderSpec};
use crate::outline::{decompose, flatten_conic, flatten_cubic, OutlineSegment, SegmentKind};
use crate::resolver::GlyphSource;
use crate::ViewMode;
use embedded_graphics::{
    mono_font::{
        iso_8859_1::{FONT_10X20, FONT_6X10},
        MonoFont, MonoTextStyle,
    },
    pixelcolor::Gray4,
    prelude::*,
    primitives::{Circle, Line, PrimitiveStyle, PrimitiveStyleBuilder, Rectangle, StrokeAlignment},
    text::{Alignment, Baseline, Text, TextStyleBuilder},
};
use log::debug;

/// Bitmap pixel sizes are clamped to this range.
pub const MIN_BITMAP_PIXEL_SIZE: u32 = 16;
pub const MAX_BITMAP_PIXEL_SIZE: u32 = 2048;

/// Glyphs kept in the raster cache created for the target size.
pub const GLYPH_CACHE_CAPACITY: usize = 12;

/// Top edge of the font name label.
pub const NAME_LABEL_TOP: i32 = 30;
/// Distance from the canvas bottom to the codepoint label's bottom edge.
pub const CODEPOINT_LABEL_MARGIN: i32 = 30;
/// Horizontal space kept free on each side of a label.
pub const LABEL_SIDE_MARGIN: u32 = 20;

/// Construction line dash pattern, in pixels.
pub const DASH_ON: f64 = 10.0;
pub const DASH_OFF: f64 = 5.0;

const STROKE_WIDTH: u32 = 2;
const ANCHOR_DIAMETER: u32 = 9;
const CONTROL_DIAMETER: u32 = 11;
const CONSTRUCTION_LUMA: u8 = 9;

const ELLIPSIS: &str = "...";

/// Extra information shown under the codepoint label in debug mode.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DebugOverlay {
    pub battery_percent: f32,
    pub uptime_ms: u64,
    pub partial_count: u8,
}

impl DebugOverlay {
    pub fn line(&self) -> String {
        format!(
            "BAT {:.0}%  UP {}  PARTIAL {}",
            self.battery_percent,
            format_uptime(self.uptime_ms),
            self.partial_count
        )
    }
}

/// `1h02m` above an hour, `3m05s` below.
pub fn format_uptime(ms: u64) -> String {
    let seconds = ms / 1000;
    let (h, m, s) = (seconds / 3600, (seconds / 60) % 60, seconds % 60);
    if h > 0 {
        format!("{}h{:02}m", h, m)
    } else {
        format!("{}m{:02}s", m, s)
    }
}

/// What to draw for one frame.
#[derive(Clone, Copy, Debug)]
pub struct Frame<'a> {
    pub font_name: &'a str,
    pub codepoint: u32,
    pub view_mode: ViewMode,
    pub overlay: Option<DebugOverlay>,
}

/// One primitive of the outline view.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DrawOp {
    /// Solid outline edge
    Stroke { from: kurbo::Point, to: kurbo::Point },
    /// Construction line between a curve point and a control point
    Dashed { from: kurbo::Point, to: kurbo::Point },
    /// On-curve anchor
    Disc(kurbo::Point),
    /// Off-curve control point
    Ring(kurbo::Point),
}

/// Lay out the outline view: the strokes first, then construction lines and
/// point markers on top of them.
///
/// Each segment draws from the end of the previous one. A drawing segment with
/// no previous end point (an outline that does not open with a move) only
/// places its markers.
pub fn plan_outline(segments: &[OutlineSegment]) -> Vec<DrawOp> {
    let mut construction = Vec::new();
    let mut strokes = Vec::new();
    let mut markers = Vec::new();
    let mut cursor: Option<kurbo::Point> = None;

    for segment in segments {
        let end = segment.end;
        match (segment.kind, cursor) {
            (SegmentKind::Move, _) => {}
            (SegmentKind::Line, Some(start)) => {
                strokes.push(DrawOp::Stroke { from: start, to: end });
            }
            (SegmentKind::Conic, Some(start)) => {
                if let Some(c) = segment.control1 {
                    push_polyline(&flatten_conic(start, c, end), &mut strokes);
                    construction.push(DrawOp::Dashed { from: start, to: c });
                    construction.push(DrawOp::Dashed { from: c, to: end });
                }
            }
            (SegmentKind::Cubic, Some(start)) => {
                if let (Some(c1), Some(c2)) = (segment.control1, segment.control2) {
                    push_polyline(&flatten_cubic(start, c1, c2, end), &mut strokes);
                    construction.push(DrawOp::Dashed { from: start, to: c1 });
                    construction.push(DrawOp::Dashed { from: c1, to: c2 });
                    construction.push(DrawOp::Dashed { from: c2, to: end });
                }
            }
            (_, None) => {}
        }
        markers.extend(segment.control1.map(DrawOp::Ring));
        markers.extend(segment.control2.map(DrawOp::Ring));
        markers.push(DrawOp::Disc(end));
        cursor = Some(end);
    }

    strokes.extend(construction);
    strokes.extend(markers);
    strokes
}

fn push_polyline(points: &[kurbo::Point], strokes: &mut Vec<DrawOp>) {
    strokes.extend(
        points
            .windows(2)
            .map(|pair| DrawOp::Stroke { from: pair[0], to: pair[1] }),
    );
}

/// Split a line into `DASH_ON` / `DASH_OFF` dashes, starting with a dash.
pub fn dash_pattern(from: kurbo::Point, to: kurbo::Point) -> Vec<(kurbo::Point, kurbo::Point)> {
    let length = from.distance(to);
    let mut dashes = Vec::new();
    let mut start = 0.0;
    while start < length {
        let end = (start + DASH_ON).min(length);
        dashes.push((from.lerp(to, start / length), from.lerp(to, end / length)));
        start += DASH_ON + DASH_OFF;
    }
    dashes
}

/// Pixel size that makes the glyph's larger design dimension span `target`.
pub fn bitmap_pixel_size(target: u32, units_per_em: u16, bounds: kurbo::Rect) -> u32 {
    let extent = bounds.width().max(bounds.height());
    if extent <= 0.0 {
        return target.clamp(MIN_BITMAP_PIXEL_SIZE, MAX_BITMAP_PIXEL_SIZE);
    }
    let size = (f64::from(target) * f64::from(units_per_em) / extent).round();
    (size as u32).clamp(MIN_BITMAP_PIXEL_SIZE, MAX_BITMAP_PIXEL_SIZE)
}

/// Map an 8-bit coverage sample onto the panel's 16 ink levels (rounded).
pub fn ink_level(coverage: u8) -> u8 {
    ((u16::from(coverage) * 15 + 127) / 255) as u8
}

/// Shorten `text` to fit `max_width` by keeping equally long head and tail
/// parts around an ellipsis. The longest fitting split is found by binary
/// search.
pub fn shorten_label(text: &str, max_width: u32, width: impl Fn(&str) -> u32) -> String {
    if width(text) <= max_width {
        return text.to_string();
    }
    let chars: Vec<char> = text.chars().collect();
    let candidate = |keep: usize| -> String {
        let head: String = chars[..keep].iter().collect();
        let tail: String = chars[chars.len() - keep..].iter().collect();
        format!("{head}{ELLIPSIS}{tail}")
    };

    let (mut low, mut high) = (0, chars.len() / 2);
    while low < high {
        let mid = (low + high).div_ceil(2);
        if width(&candidate(mid)) <= max_width {
            low = mid;
        } else {
            high = mid - 1;
        }
    }
    candidate(low)
}

fn text_width(font: &MonoFont<'_>, text: &str) -> u32 {
    let advance = font.character_size.width + font.character_spacing;
    text.chars().count() as u32 * advance
}

fn pixel(p: kurbo::Point) -> Point {
    Point::new(p.x.round() as i32, p.y.round() as i32)
}

/// Draws specimen frames and full-screen notices.
#[derive(Debug, Clone)]
pub struct Renderer {
    width: u32,
    height: u32,
    glyph_size: u32,
}

impl Renderer {
    pub fn new(width: u32, height: u32, glyph_size: u32) -> Self {
        Self {
            width,
            height,
            glyph_size,
        }
    }

    /// Raster caches to create whenever a font is loaded. Bitmap glyphs are
    /// fitted to the target size, so they all live in the target-size cache.
    pub fn render_plan(&self) -> Vec<RenderSpec> {
        vec![RenderSpec {
            pixel_size: self.glyph_size,
            capacity: GLYPH_CACHE_CAPACITY,
        }]
    }

    fn center(&self) -> Point {
        Point::new((self.width / 2) as i32, (self.height / 2) as i32)
    }

    fn max_label_width(&self) -> u32 {
        self.width.saturating_sub(2 * LABEL_SIDE_MARGIN)
    }

    /// Draw a complete frame with the active font.
    pub fn render<L: FaceLoader>(
        &self,
        canvas: &mut Canvas,
        fonts: &mut FontEngine<L>,
        frame: &Frame<'_>,
    ) -> Result<(), FontError> {
        canvas.clear();
        match frame.view_mode {
            ViewMode::Bitmap => self.draw_bitmap(canvas, fonts, frame.codepoint)?,
            ViewMode::Outline => self.draw_outline(canvas, fonts, frame.codepoint)?,
        }
        self.draw_labels(canvas, frame);
        debug!(
            "Rendered U+{:04X} ({:?}) with {}",
            frame.codepoint, frame.view_mode, frame.font_name
        );
        Ok(())
    }

    fn draw_bitmap<L: FaceLoader>(
        &self,
        canvas: &mut Canvas,
        fonts: &mut FontEngine<L>,
        codepoint: u32,
    ) -> Result<(), FontError> {
        let face = fonts.active_face().ok_or(FontError::NotLoaded)?;
        let glyph = face.glyph_index(codepoint);
        if glyph == 0 {
            debug!("U+{:04X} has no glyph, nothing to draw", codepoint);
            return Ok(());
        }
        let Some(bounds) = face.glyph_bounds(glyph) else {
            debug!("U+{:04X} is blank", codepoint);
            return Ok(());
        };
        let pixel_size = bitmap_pixel_size(self.glyph_size, face.units_per_em(), bounds);
        let raster = fonts.rasterize_for(self.glyph_size, glyph, pixel_size)?;
        debug!(
            "Bitmap {}px: {}x{} coverage",
            pixel_size, raster.width, raster.height
        );
        blit_centered(canvas, raster, self.center());
        Ok(())
    }

    fn draw_outline<L: FaceLoader>(
        &self,
        canvas: &mut Canvas,
        fonts: &FontEngine<L>,
        codepoint: u32,
    ) -> Result<(), FontError> {
        let face = fonts.active_face().ok_or(FontError::NotLoaded)?;
        let glyph = face.glyph_index(codepoint);
        let Some(outline) = (glyph != 0).then(|| face.outline(glyph)).flatten() else {
            debug!("U+{:04X} has no outline, nothing to draw", codepoint);
            return Ok(());
        };
        let center = self.center();
        let segments = decompose(
            &outline,
            f64::from(self.glyph_size),
            kurbo::Point::new(center.x.into(), center.y.into()),
        );
        let plan = plan_outline(&segments);
        debug!("Outline: {} segments, {} draw ops", segments.len(), plan.len());
        for op in &plan {
            draw_op(canvas, op);
        }
        Ok(())
    }

    fn draw_labels(&self, canvas: &mut Canvas, frame: &Frame<'_>) {
        let label_font = &FONT_10X20;
        let center_x = (self.width / 2) as i32;

        let name = shorten_label(frame.font_name, self.max_label_width(), |s| {
            text_width(label_font, s)
        });
        draw_text(
            canvas,
            &name,
            label_font,
            Point::new(center_x, NAME_LABEL_TOP),
            Baseline::Top,
        );

        let codepoint_bottom = self.height as i32 - CODEPOINT_LABEL_MARGIN;
        draw_text(
            canvas,
            &format!("U+{:04X}", frame.codepoint),
            label_font,
            Point::new(center_x, codepoint_bottom),
            Baseline::Bottom,
        );

        if let Some(overlay) = frame.overlay {
            draw_text(
                canvas,
                &overlay.line(),
                &FONT_6X10,
                Point::new(center_x, codepoint_bottom + 6),
                Baseline::Top,
            );
        }
    }

    /// Full-screen notice: a title with explanatory lines underneath.
    pub fn draw_notice(&self, canvas: &mut Canvas, title: &str, lines: &[&str]) {
        canvas.clear();
        let center = self.center();
        draw_text(
            canvas,
            title,
            &FONT_10X20,
            Point::new(center.x, center.y - 80),
            Baseline::Middle,
        );
        for (i, line) in lines.iter().enumerate() {
            draw_text(
                canvas,
                line,
                &FONT_10X20,
                Point::new(center.x, center.y + 20 + 40 * i as i32),
                Baseline::Middle,
            );
        }
    }

    /// Empty battery icon with a sliver of charge, plus a charge reminder.
    pub fn draw_low_battery(&self, canvas: &mut Canvas) {
        canvas.clear();
        let center = self.center();
        let body = Rectangle::new(Point::new(center.x - 60, center.y - 30), Size::new(120, 60));
        body.into_styled(
            PrimitiveStyleBuilder::new()
                .stroke_color(Gray4::BLACK)
                .stroke_width(3)
                .stroke_alignment(StrokeAlignment::Inside)
                .build(),
        )
        .draw(canvas)
        .ok();
        Rectangle::new(Point::new(center.x + 60, center.y - 10), Size::new(10, 20))
            .into_styled(PrimitiveStyle::with_fill(Gray4::BLACK))
            .draw(canvas)
            .ok();
        Rectangle::new(Point::new(center.x - 54, center.y - 24), Size::new(6, 48))
            .into_styled(PrimitiveStyle::with_fill(Gray4::new(3)))
            .draw(canvas)
            .ok();

        draw_text(
            canvas,
            "LOW BATTERY",
            &FONT_10X20,
            Point::new(center.x, center.y - 100),
            Baseline::Top,
        );
        draw_text(
            canvas,
            "Please charge device",
            &FONT_10X20,
            Point::new(center.x, center.y + 60),
            Baseline::Top,
        );
    }
}

fn draw_text(canvas: &mut Canvas, text: &str, font: &MonoFont<'_>, at: Point, baseline: Baseline) {
    let character_style = MonoTextStyle::new(font, Gray4::BLACK);
    let text_style = TextStyleBuilder::new()
        .alignment(Alignment::Center)
        .baseline(baseline)
        .build();
    Text::with_text_style(text, at, character_style, text_style)
        .draw(canvas)
        .ok();
}

fn blit_centered(canvas: &mut Canvas, raster: &RasterGlyph, center: Point) {
    if raster.width == 0 {
        return;
    }
    let left = center.x - (raster.width / 2) as i32;
    let top = center.y - (raster.height / 2) as i32;
    for (row, samples) in raster.coverage.chunks(raster.width).enumerate() {
        for (col, &sample) in samples.iter().enumerate() {
            let ink = ink_level(sample);
            if ink > 0 {
                canvas.darken(left + col as i32, top + row as i32, ink);
            }
        }
    }
}

fn draw_op(canvas: &mut Canvas, op: &DrawOp) {
    match *op {
        DrawOp::Stroke { from, to } => {
            Line::new(pixel(from), pixel(to))
                .into_styled(PrimitiveStyle::with_stroke(Gray4::BLACK, STROKE_WIDTH))
                .draw(canvas)
                .ok();
        }
        DrawOp::Dashed { from, to } => {
            let style = PrimitiveStyle::with_stroke(Gray4::new(CONSTRUCTION_LUMA), 1);
            for (a, b) in dash_pattern(from, to) {
                Line::new(pixel(a), pixel(b)).into_styled(style).draw(canvas).ok();
            }
        }
        DrawOp::Disc(p) => {
            Circle::with_center(pixel(p), ANCHOR_DIAMETER)
                .into_styled(PrimitiveStyle::with_fill(Gray4::BLACK))
                .draw(canvas)
                .ok();
        }
        DrawOp::Ring(p) => {
            Circle::with_center(pixel(p), CONTROL_DIAMETER)
                .into_styled(
                    PrimitiveStyleBuilder::new()
                        .stroke_color(Gray4::BLACK)
                        .stroke_width(2)
                        .fill_color(Gray4::WHITE)
                        .build(),
                )
                .draw(canvas)
                .ok();
        }
    }
}
