use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::Color;
use ratatui::widgets::Widget;

use crate::render::Surface;

/// Upper half block: the foreground paints the top pixel, the background
/// the bottom one.
const HALF_BLOCK: &str = "▀";

/// Presents a [`Surface`] as truecolor half blocks, two pixel rows per
/// terminal row.
pub struct SurfaceWidget<'a> {
    surface: &'a Surface,
}

impl<'a> SurfaceWidget<'a> {
    pub fn new(surface: &'a Surface) -> Self {
        Self { surface }
    }
}

/// Pixel dimensions of a surface that fills `area`.
pub fn surface_size(area: Rect) -> (u32, u32) {
    (area.width as u32, area.height as u32 * 2)
}

fn rgb([r, g, b]: [u8; 3]) -> Color {
    Color::Rgb(r, g, b)
}

impl Widget for SurfaceWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        for row in 0..area.height {
            for col in 0..area.width {
                let x = col as u32;
                let y = row as u32 * 2;
                let top = self.surface.pixel(x, y);
                let bottom = self.surface.pixel(x, y + 1);
                if let Some(cell) = buf.cell_mut((area.x + col, area.y + row)) {
                    cell.set_symbol(HALF_BLOCK).set_fg(rgb(top)).set_bg(rgb(bottom));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{MediaSource, Renderer, Visual};
    use image::{Rgb, RgbImage};
    use std::time::Instant;

    #[test]
    fn each_cell_carries_two_pixel_rows() {
        let mut image = RgbImage::new(2, 4);
        for (_, y, px) in image.enumerate_pixels_mut() {
            *px = if y % 2 == 0 { Rgb([255, 0, 0]) } else { Rgb([0, 0, 255]) };
        }
        let area = Rect::new(0, 0, 2, 2);
        let (w, h) = surface_size(area);
        assert_eq!((w, h), (2, 4));

        let mut renderer = Renderer::new(w, h, 1.0);
        let now = Instant::now();
        renderer.request_transition(Visual::Media(MediaSource::still("stripes", image)), now);
        let surface = renderer.draw_frame(now);

        let mut buf = Buffer::empty(area);
        SurfaceWidget::new(surface).render(area, &mut buf);
        let cell = &buf[(1, 1)];
        assert_eq!(cell.symbol(), HALF_BLOCK);
        assert_eq!(cell.fg, Color::Rgb(255, 0, 0));
        assert_eq!(cell.bg, Color::Rgb(0, 0, 255));
    }

    #[test]
    fn empty_surface_renders_black() {
        let area = Rect::new(0, 0, 3, 1);
        let surface = Surface::new(0, 0);
        let mut buf = Buffer::empty(area);
        SurfaceWidget::new(&surface).render(area, &mut buf);
        assert_eq!(buf[(2, 0)].bg, Color::Rgb(0, 0, 0));
    }
}
