// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// DocLayout-YOLO layout detector executed with `rten`.
//
// Expects a `.rten` export whose single output holds post-NMS detections of
// shape `[1, N, 6]`, each row `[x0, y0, x1, y1, confidence, class]` in model
// input pixels. Class ids follow the DocStructBench label set.
//
// # Feature Gate
//
// Only available with the `layout-model` feature enabled.

use std::path::Path;

use image::DynamicImage;
use rten::Model;
use rten_tensor::NdTensor;
use rten_tensor::prelude::*;
use tracing::{debug, info, instrument};

use satzwerk_core::error::{Result, SatzwerkError};
use satzwerk_core::types::LayoutRegion;

use crate::layout::letterbox::Letterbox;
use crate::layout::{LayoutModel, decode_detections};

pub struct DocLayoutModel {
    model: Model,
    confidence_threshold: f32,
}

impl std::fmt::Debug for DocLayoutModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocLayoutModel")
            .field("confidence_threshold", &self.confidence_threshold)
            .finish_non_exhaustive()
    }
}

impl DocLayoutModel {
    /// Load the model file. This is the expensive step; keep the model for
    /// the whole run.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>, confidence_threshold: f32) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SatzwerkError::LayoutAnalysis(format!(
                "layout model not found at {}",
                path.display()
            )));
        }

        info!("Loading layout model");
        let model = Model::load_file(path).map_err(|err| {
            SatzwerkError::LayoutAnalysis(format!(
                "failed to load layout model from {}: {}",
                path.display(),
                err
            ))
        })?;

        Ok(Self {
            model,
            confidence_threshold,
        })
    }
}

impl LayoutModel for DocLayoutModel {
    #[instrument(skip_all, fields(width = image.width(), height = image.height(), input_size))]
    fn predict(&self, image: &DynamicImage, input_size: u32) -> Result<Vec<LayoutRegion>> {
        let letterbox = Letterbox::compute(image.width(), image.height(), input_size);
        let side = letterbox.target as usize;
        let input = NdTensor::from_data([1, 3, side, side], letterbox.apply(image));

        let output = self
            .model
            .run_one(input.view().into(), None)
            .map_err(|err| SatzwerkError::LayoutAnalysis(format!("inference failed: {err}")))?;
        let output: NdTensor<f32, 3> = output
            .try_into()
            .map_err(|err| SatzwerkError::LayoutAnalysis(format!("unexpected model output: {err}")))?;

        let [_, count, width] = output.shape();
        if width < 6 {
            return Err(SatzwerkError::LayoutAnalysis(format!(
                "expected 6 values per detection, got {width}"
            )));
        }
        let rows: Vec<[f32; 6]> = (0..count)
            .map(|i| std::array::from_fn(|k| output[[0, i, k]]))
            .collect();

        let regions = decode_detections(&rows, &letterbox, self.confidence_threshold);
        debug!(detections = count, kept = regions.len(), "Layout predicted");
        Ok(regions)
    }
}
