// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Letterbox preprocessing for the layout detector: aspect-preserving resize
// into a square input whose side is a multiple of the model stride, with
// symmetric grey padding, plus the inverse mapping for detected boxes.

use image::DynamicImage;
use image::imageops::FilterType;

use satzwerk_core::types::BBox;

/// Model stride; the input side is rounded up to a multiple of this.
pub const STRIDE: u32 = 32;

/// Padding value (114 / 255) used by YOLO-family detectors.
pub const PAD_VALUE: f32 = 114.0 / 255.0;

/// Geometry of one letterbox transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    /// Square model input side.
    pub target: u32,
    pub scale: f64,
    pub new_width: u32,
    pub new_height: u32,
    pub pad_x: u32,
    pub pad_y: u32,
    pub source_width: u32,
    pub source_height: u32,
}

impl Letterbox {
    pub fn compute(source_width: u32, source_height: u32, input_size: u32) -> Self {
        let target = input_size.max(1).div_ceil(STRIDE) * STRIDE;
        let (w, h) = (source_width.max(1), source_height.max(1));
        let scale = (f64::from(target) / f64::from(h)).min(f64::from(target) / f64::from(w));
        let new_width = ((f64::from(w) * scale).round() as u32).clamp(1, target);
        let new_height = ((f64::from(h) * scale).round() as u32).clamp(1, target);
        Self {
            target,
            scale,
            new_width,
            new_height,
            pad_x: (target - new_width) / 2,
            pad_y: (target - new_height) / 2,
            source_width: w,
            source_height: h,
        }
    }

    /// Resize and pad `image` into CHW `f32` RGB data in `[0, 1]`,
    /// `3 * target * target` values.
    pub fn apply(&self, image: &DynamicImage) -> Vec<f32> {
        let resized = image
            .resize_exact(self.new_width, self.new_height, FilterType::Triangle)
            .to_rgb8();
        let side = self.target as usize;
        let plane = side * side;
        let mut data = vec![PAD_VALUE; 3 * plane];

        for (x, y, pixel) in resized.enumerate_pixels() {
            let dst = (y + self.pad_y) as usize * side + (x + self.pad_x) as usize;
            for channel in 0..3 {
                data[channel * plane + dst] = f32::from(pixel[channel]) / 255.0;
            }
        }
        data
    }

    /// Map a box from model input coordinates back to source pixels,
    /// clamped to the source image.
    pub fn unmap(&self, x0: f32, y0: f32, x1: f32, y1: f32) -> BBox {
        let (w, h) = (f64::from(self.source_width), f64::from(self.source_height));
        let fx = |v: f32| ((f64::from(v) - f64::from(self.pad_x)) / self.scale).clamp(0.0, w);
        let fy = |v: f32| ((f64::from(v) - f64::from(self.pad_y)) / self.scale).clamp(0.0, h);
        BBox::new(fx(x0), fy(y0), fx(x1), fy(y1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn target_rounds_up_to_stride() {
        assert_eq!(Letterbox::compute(100, 100, 1024).target, 1024);
        assert_eq!(Letterbox::compute(100, 100, 1000).target, 1024);
        assert_eq!(Letterbox::compute(100, 100, 33).target, 64);
    }

    #[test]
    fn portrait_page_is_padded_horizontally() {
        let lb = Letterbox::compute(612, 792, 1024);
        assert_eq!(lb.new_height, 1024);
        assert_eq!(lb.new_width, 791);
        assert_eq!(lb.pad_y, 0);
        assert_eq!(lb.pad_x, (1024 - 791) / 2);
    }

    #[test]
    fn apply_fills_padding_and_image() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(64, 32, Rgb([255, 0, 0])));
        let lb = Letterbox::compute(64, 32, 64);
        let data = lb.apply(&img);
        assert_eq!(data.len(), 3 * 64 * 64);
        // Top-left corner is padding, the centre is the red image.
        assert_eq!(data[0], PAD_VALUE);
        let centre = 32 * 64 + 32;
        assert_eq!(data[centre], 1.0);
        assert_eq!(data[64 * 64 + centre], 0.0);
    }

    #[test]
    fn unmap_inverts_scale_and_padding() {
        let lb = Letterbox::compute(200, 100, 64);
        // scale 0.32, new 64x32, pad_y 16
        let b = lb.unmap(0.0, 16.0, 32.0, 48.0);
        assert!((b.x0 - 0.0).abs() < 1e-6);
        assert!((b.y0 - 0.0).abs() < 1e-6);
        assert!((b.x1 - 100.0).abs() < 1e-6);
        assert!((b.y1 - 100.0).abs() < 1e-6);
        // Boxes reaching into the padding are clamped.
        let clamped = lb.unmap(-10.0, 0.0, 70.0, 64.0);
        assert_eq!(clamped, BBox::new(0.0, 0.0, 200.0, 100.0));
    }
}
