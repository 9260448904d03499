// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Layout detection: the `LayoutModel` seam, a fixed stub, and the mapping
// from rendered-image pixels to PDF user space.
//
// The production model lives behind the `layout-model` feature (rten), and
// the page rasterizer behind `pdfium`.

#[cfg(feature = "layout-model")]
pub mod doclayout;
pub mod letterbox;
pub mod raster;

use image::DynamicImage;

use satzwerk_core::error::Result;
use satzwerk_core::types::{BBox, LayoutRegion, RegionCategory};

use crate::layout::letterbox::Letterbox;

#[cfg(feature = "layout-model")]
pub use doclayout::DocLayoutModel;
pub use raster::PageRasterizer;
#[cfg(feature = "pdfium")]
pub use raster::PdfiumRasterizer;

/// Default square model input side.
pub const DEFAULT_INPUT_SIZE: u32 = 1024;

/// Detections below this confidence are dropped.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.25;

/// DocStructBench class labels, indexed by class id.
pub const DOCSTRUCTBENCH_LABELS: [&str; 10] = [
    "title",
    "plain text",
    "abandon",
    "figure",
    "figure_caption",
    "table",
    "table_caption",
    "table_footnote",
    "isolate_formula",
    "formula_caption",
];

/// Region category for a DocStructBench class id.
pub fn category_for_class(class_id: usize) -> RegionCategory {
    match DOCSTRUCTBENCH_LABELS.get(class_id).copied() {
        Some("title") => RegionCategory::Title,
        Some("plain text" | "figure_caption" | "table_caption" | "table_footnote") => {
            RegionCategory::Text
        }
        Some("figure") => RegionCategory::Image,
        Some("table") => RegionCategory::Table,
        Some("isolate_formula" | "formula_caption") => RegionCategory::Formula,
        _ => RegionCategory::Other,
    }
}

/// Turn raw detector rows `[x0, y0, x1, y1, confidence, class]` (model
/// input coordinates) into source-pixel regions, dropping rows below
/// `threshold`, highest confidence first.
pub fn decode_detections(rows: &[[f32; 6]], letterbox: &Letterbox, threshold: f32) -> Vec<LayoutRegion> {
    let mut regions: Vec<LayoutRegion> = rows
        .iter()
        .filter(|row| row[4] >= threshold)
        .map(|&[x0, y0, x1, y1, confidence, class]| {
            LayoutRegion::new(
                letterbox.unmap(x0, y0, x1, y1),
                category_for_class(class.max(0.0) as usize),
                confidence,
            )
        })
        .collect();
    sort_by_confidence(&mut regions);
    regions
}

/// A page layout detector.
pub trait LayoutModel: Send + Sync {
    /// Detect regions in a rendered page. Boxes are in image pixels (origin
    /// top-left), ordered by descending confidence.
    fn predict(&self, image: &DynamicImage, input_size: u32) -> Result<Vec<LayoutRegion>>;
}

/// Returns the same regions for every page.
#[derive(Debug, Clone, Default)]
pub struct FixedLayoutModel {
    regions: Vec<LayoutRegion>,
}

impl FixedLayoutModel {
    pub fn new(mut regions: Vec<LayoutRegion>) -> Self {
        sort_by_confidence(&mut regions);
        Self { regions }
    }
}

impl LayoutModel for FixedLayoutModel {
    fn predict(&self, _image: &DynamicImage, _input_size: u32) -> Result<Vec<LayoutRegion>> {
        Ok(self.regions.clone())
    }
}

/// Stable sort, highest confidence first.
pub fn sort_by_confidence(regions: &mut [LayoutRegion]) {
    regions.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
}

/// Convert pixel-space regions of a `width` x `height` rendering of
/// `media_box` into PDF user space.
pub fn to_page_space(
    regions: Vec<LayoutRegion>,
    width: u32,
    height: u32,
    media_box: BBox,
) -> Vec<LayoutRegion> {
    let sx = f64::from(width.max(1)) / media_box.width().max(f64::EPSILON);
    let sy = f64::from(height.max(1)) / media_box.height().max(f64::EPSILON);
    regions
        .into_iter()
        .map(|region| {
            let b = region.bbox;
            LayoutRegion {
                bbox: BBox::new(
                    media_box.x0 + b.x0 / sx,
                    media_box.y1 - b.y0 / sy,
                    media_box.x0 + b.x1 / sx,
                    media_box.y1 - b.y1 / sy,
                ),
                ..region
            }
        })
        .collect()
}

/// The single Text region used when detection is unavailable or failed.
pub fn whole_page_region(media_box: BBox) -> LayoutRegion {
    LayoutRegion::new(media_box, RegionCategory::Text, 1.0)
}

/// Rendering size for a page so its longer side equals `input_size` pixels.
pub fn render_size(media_box: BBox, input_size: u32) -> (u32, u32) {
    let longest = media_box.width().max(media_box.height()).max(1.0);
    let scale = f64::from(input_size) / longest;
    (
        ((media_box.width() * scale).round() as u32).max(1),
        ((media_box.height() * scale).round() as u32).max(1),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_model_sorts_by_confidence_stably() {
        let a = LayoutRegion::new(BBox::new(0.0, 0.0, 1.0, 1.0), RegionCategory::Text, 0.5);
        let b = LayoutRegion::new(BBox::new(0.0, 0.0, 2.0, 2.0), RegionCategory::Table, 0.9);
        let c = LayoutRegion::new(BBox::new(0.0, 0.0, 3.0, 3.0), RegionCategory::Image, 0.5);
        let model = FixedLayoutModel::new(vec![a.clone(), b.clone(), c.clone()]);
        let out = model.predict(&DynamicImage::new_rgb8(1, 1), 1024).unwrap();
        assert_eq!(out, vec![b, a, c]);
    }

    #[test]
    fn pixels_map_to_flipped_user_space() {
        let media = BBox::new(0.0, 0.0, 612.0, 792.0);
        let px = LayoutRegion::new(BBox::new(61.2, 79.2, 306.0, 396.0), RegionCategory::Text, 0.8);
        // Rendered at 2 px per point.
        let out = to_page_space(vec![px], 1224, 1584, media);
        let b = out[0].bbox;
        assert!((b.x0 - 30.6).abs() < 1e-9);
        assert!((b.x1 - 153.0).abs() < 1e-9);
        assert!((b.y1 - (792.0 - 39.6)).abs() < 1e-9);
        assert!((b.y0 - (792.0 - 198.0)).abs() < 1e-9);
        assert_eq!(out[0].category, RegionCategory::Text);
    }

    #[test]
    fn offset_media_box_is_respected() {
        let media = BBox::new(100.0, 100.0, 200.0, 300.0);
        let px = LayoutRegion::new(BBox::new(0.0, 0.0, 100.0, 200.0), RegionCategory::Text, 1.0);
        let out = to_page_space(vec![px], 100, 200, media);
        assert_eq!(out[0].bbox, media);
    }

    #[test]
    fn class_ids_map_to_categories() {
        assert_eq!(category_for_class(0), RegionCategory::Title);
        assert_eq!(category_for_class(1), RegionCategory::Text);
        assert_eq!(category_for_class(2), RegionCategory::Other);
        assert_eq!(category_for_class(3), RegionCategory::Image);
        assert_eq!(category_for_class(6), RegionCategory::Text);
        assert_eq!(category_for_class(5), RegionCategory::Table);
        assert_eq!(category_for_class(8), RegionCategory::Formula);
        assert_eq!(category_for_class(42), RegionCategory::Other);
    }

    #[test]
    fn detections_are_filtered_mapped_and_ranked() {
        let lb = Letterbox::compute(64, 64, 64);
        let rows = [
            [0.0, 0.0, 10.0, 10.0, 0.2, 1.0],
            [0.0, 0.0, 32.0, 32.0, 0.6, 5.0],
            [8.0, 8.0, 16.0, 16.0, 0.9, 1.0],
        ];
        let regions = decode_detections(&rows, &lb, DEFAULT_CONFIDENCE_THRESHOLD);
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].category, RegionCategory::Text);
        assert_eq!(regions[0].bbox, BBox::new(8.0, 8.0, 16.0, 16.0));
        assert_eq!(regions[1].category, RegionCategory::Table);
    }

    #[test]
    fn render_size_keeps_aspect() {
        assert_eq!(render_size(BBox::new(0.0, 0.0, 612.0, 792.0), 1024), (791, 1024));
        assert_eq!(render_size(BBox::new(0.0, 0.0, 500.0, 500.0), 1024), (1024, 1024));
    }
}
