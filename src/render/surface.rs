//! RGB framebuffer and the pixel operations the compositor needs.

use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};

/// Source-space rectangle that survives cover projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Crop of a `src_w x src_h` image that, scaled uniformly, exactly fills a
/// `dst_w x dst_h` surface. The longer axis is cropped, centred.
pub fn cover_crop(src_w: u32, src_h: u32, dst_w: u32, dst_h: u32) -> CropRect {
    if src_w == 0 || src_h == 0 || dst_w == 0 || dst_h == 0 {
        return CropRect {
            x: 0,
            y: 0,
            width: src_w,
            height: src_h,
        };
    }
    let scale = f64::max(dst_w as f64 / src_w as f64, dst_h as f64 / src_h as f64);
    let width = ((dst_w as f64 / scale).round() as u32).clamp(1, src_w);
    let height = ((dst_h as f64 / scale).round() as u32).clamp(1, src_h);
    CropRect {
        x: (src_w - width) / 2,
        y: (src_h - height) / 2,
        width,
        height,
    }
}

/// Scale `src` to cover a `width x height` surface without distortion.
pub fn project_cover(src: &RgbImage, width: u32, height: u32) -> RgbImage {
    if width == 0 || height == 0 || src.width() == 0 || src.height() == 0 {
        return RgbImage::new(width, height);
    }
    let crop = cover_crop(src.width(), src.height(), width, height);
    let cropped = imageops::crop_imm(src, crop.x, crop.y, crop.width, crop.height).to_image();
    imageops::resize(&cropped, width, height, FilterType::Triangle)
}

#[derive(Debug, Clone)]
pub struct Surface {
    pixels: RgbImage,
}

impl Surface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            pixels: RgbImage::new(width, height),
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// Returns `true` when the dimensions actually changed.
    pub fn resize(&mut self, width: u32, height: u32) -> bool {
        if width == self.width() && height == self.height() {
            return false;
        }
        self.pixels = RgbImage::new(width, height);
        true
    }

    pub fn clear(&mut self) {
        for px in self.pixels.pixels_mut() {
            *px = Rgb([0, 0, 0]);
        }
    }

    /// Pixel at `(x, y)`; black outside the surface.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        self.pixels.get_pixel_checked(x, y).map(|p| p.0).unwrap_or([0, 0, 0])
    }

    /// Source-over blend of a same-sized layer at `opacity`.
    pub fn blend(&mut self, layer: &RgbImage, opacity: f32) {
        let alpha = opacity.clamp(0.0, 1.0);
        if alpha <= 0.0 || layer.dimensions() != self.pixels.dimensions() {
            return;
        }
        if alpha >= 1.0 {
            self.pixels.copy_from_slice(layer.as_raw());
            return;
        }
        for (dst, src) in self.pixels.iter_mut().zip(layer.as_raw().iter()) {
            *dst = mix(*dst, *src, alpha);
        }
    }

    /// Blend solid black over the surface at `opacity`.
    pub fn darken(&mut self, opacity: f32) {
        let alpha = opacity.clamp(0.0, 1.0);
        for channel in self.pixels.iter_mut() {
            *channel = mix(*channel, 0, alpha);
        }
    }
}

fn mix(dst: u8, src: u8, alpha: f32) -> u8 {
    (dst as f32 * (1.0 - alpha) + src as f32 * alpha).round() as u8
}

/// Gaussian blur; radii below a tenth of a pixel are a no-op.
pub fn blurred(image: &RgbImage, sigma: f32) -> RgbImage {
    if sigma < 0.1 {
        return image.clone();
    }
    imageops::blur(image, sigma)
}
