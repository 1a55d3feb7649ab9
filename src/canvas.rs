//! 4-bit grayscale canvas
//!
//! Packed framebuffer matching the panel's 16 gray levels. Each row has
//! `(width+1)/2` bytes and each byte holds two horizontal pixels, the left
//! one in the high nibble. Values follow [`Gray4`] luma: 15 is paper white,
//! 0 is full ink.

use embedded_graphics::{pixelcolor::Gray4, prelude::*};

/// Paper white, as a luma value.
pub const WHITE: u8 = 15;

/// Full-screen drawing surface.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Canvas {
    width: u32,
    height: u32,
    buffer: Vec<u8>,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Self {
        let bytes_per_row = width.div_ceil(2);
        let buffer_size = (bytes_per_row * height) as usize;
        Self {
            width,
            height,
            buffer: vec![0xFF; buffer_size], // White by default
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Fill the whole canvas with paper white.
    pub fn clear(&mut self) {
        self.buffer.fill(0xFF);
    }

    /// Raw packed pixel data, as pushed to the panel.
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    fn locate(&self, x: i32, y: i32) -> Option<(usize, u32)> {
        if x < 0 || y < 0 || x as u32 >= self.width || y as u32 >= self.height {
            return None;
        }
        let (x, y) = (x as u32, y as u32);
        let bytes_per_row = self.width.div_ceil(2);
        let byte_index = (y * bytes_per_row + x / 2) as usize;
        let shift = if x % 2 == 0 { 4 } else { 0 };
        Some((byte_index, shift))
    }

    /// Luma at a pixel; `None` outside the canvas.
    pub fn luma(&self, x: i32, y: i32) -> Option<u8> {
        let (index, shift) = self.locate(x, y)?;
        Some((self.buffer[index] >> shift) & 0x0F)
    }

    /// Set a pixel's luma. Out-of-bounds writes are clipped.
    pub fn set_luma(&mut self, x: i32, y: i32, luma: u8) {
        if let Some((index, shift)) = self.locate(x, y) {
            let mask = 0x0F << shift;
            self.buffer[index] = (self.buffer[index] & !mask) | ((luma & 0x0F) << shift);
        }
    }

    /// Lay `ink` levels (0 = none, 15 = black) over a pixel, keeping whichever
    /// is darker.
    pub fn darken(&mut self, x: i32, y: i32, ink: u8) {
        if let Some(current) = self.luma(x, y) {
            let luma = WHITE - ink.min(WHITE);
            if luma < current {
                self.set_luma(x, y, luma);
            }
        }
    }

    /// Number of pixels that are not paper white.
    pub fn inked_pixels(&self) -> usize {
        self.buffer
            .iter()
            .map(|&b| usize::from(b >> 4 != WHITE) + usize::from(b & 0x0F != WHITE))
            .sum()
    }

    /// Downsampled character rendering for terminals.
    ///
    /// Each cell covers a block of pixels and shows its darkest value.
    pub fn to_ascii(&self, columns: u32) -> String {
        const RAMP: [char; 4] = [' ', '.', '+', '#'];
        let columns = columns.clamp(1, self.width.max(1));
        let cell_w = self.width.div_ceil(columns).max(1);
        // Terminal cells are about twice as tall as they are wide
        let cell_h = cell_w * 2;
        let mut out = String::new();
        for cy in (0..self.height).step_by(cell_h as usize) {
            for cx in (0..self.width).step_by(cell_w as usize) {
                let mut darkest = WHITE;
                for y in cy..(cy + cell_h).min(self.height) {
                    for x in cx..(cx + cell_w).min(self.width) {
                        if let Some(l) = self.luma(x as i32, y as i32) {
                            darkest = darkest.min(l);
                        }
                    }
                }
                let ink = usize::from(WHITE - darkest);
                out.push(RAMP[(ink * (RAMP.len() - 1)).div_ceil(usize::from(WHITE))]);
            }
            out.push('\n');
        }
        out
    }
}

impl OriginDimensions for Canvas {
    fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

impl DrawTarget for Canvas {
    type Color = Gray4;
    type Error = core::convert::Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            self.set_luma(point.x, point.y, color.luma());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_graphics::primitives::{Line, PrimitiveStyle};

    #[test]
    fn new_canvas_is_white() {
        let canvas = Canvas::new(5, 3);
        assert_eq!(canvas.buffer().len(), 9);
        assert_eq!(canvas.inked_pixels(), 0);
        assert_eq!(canvas.luma(4, 2), Some(WHITE));
    }

    #[test]
    fn nibbles_are_independent() {
        let mut canvas = Canvas::new(4, 1);
        canvas.set_luma(0, 0, 0);
        canvas.set_luma(1, 0, 7);
        assert_eq!(canvas.buffer()[0], 0x07);
        assert_eq!(canvas.luma(0, 0), Some(0));
        assert_eq!(canvas.luma(1, 0), Some(7));
        assert_eq!(canvas.luma(2, 0), Some(WHITE));
    }

    #[test]
    fn writes_outside_are_clipped() {
        let mut canvas = Canvas::new(4, 4);
        canvas.set_luma(-1, 0, 0);
        canvas.set_luma(4, 0, 0);
        canvas.darken(0, 10, 15);
        assert_eq!(canvas.inked_pixels(), 0);
        assert_eq!(canvas.luma(-1, 0), None);
    }

    #[test]
    fn darken_never_lightens() {
        let mut canvas = Canvas::new(2, 1);
        canvas.darken(0, 0, 10);
        canvas.darken(0, 0, 3);
        assert_eq!(canvas.luma(0, 0), Some(5));
    }

    #[test]
    fn draws_embedded_graphics_primitives() {
        let mut canvas = Canvas::new(10, 10);
        Line::new(Point::new(0, 0), Point::new(9, 0))
            .into_styled(PrimitiveStyle::with_stroke(Gray4::BLACK, 1))
            .draw(&mut canvas)
            .ok();
        assert_eq!(canvas.inked_pixels(), 10);
        canvas.clear();
        assert_eq!(canvas.inked_pixels(), 0);
    }

    #[test]
    fn ascii_marks_ink() {
        let mut canvas = Canvas::new(8, 8);
        canvas.set_luma(0, 0, 0);
        let art = canvas.to_ascii(4);
        assert!(art.starts_with('#'));
        assert_eq!(art.lines().count(), 2);
    }
}
