// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page rasterization for layout detection.

use std::path::Path;

use image::DynamicImage;

use satzwerk_core::error::Result;

/// Renders a page of a PDF file to an image.
pub trait PageRasterizer: Send + Sync {
    /// Render page `page_index` (0-based) of `source` at exactly
    /// `width` x `height` pixels.
    fn render(&self, source: &Path, page_index: u32, width: u32, height: u32) -> Result<DynamicImage>;
}

#[cfg(feature = "pdfium")]
pub use pdfium::PdfiumRasterizer;

#[cfg(feature = "pdfium")]
mod pdfium {
    use std::path::{Path, PathBuf};

    use image::DynamicImage;
    use pdfium_render::prelude::*;
    use tracing::{debug, instrument};

    use satzwerk_core::error::{Result, SatzwerkError};

    use super::PageRasterizer;

    /// Rasterizer backed by the pdfium library, loaded from `library_dir`
    /// (default `./`) or else from the system.
    #[derive(Debug, Clone, Default)]
    pub struct PdfiumRasterizer {
        library_dir: Option<PathBuf>,
    }

    impl PdfiumRasterizer {
        pub fn new(library_dir: Option<PathBuf>) -> Self {
            Self { library_dir }
        }

        fn bind(&self) -> Result<Pdfium> {
            let dir = self
                .library_dir
                .as_deref()
                .map_or_else(|| "./".to_string(), |d| d.display().to_string());
            let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(&dir))
                .or_else(|_| Pdfium::bind_to_system_library())
                .map_err(|e| SatzwerkError::Image(format!("failed to bind pdfium: {e}")))?;
            Ok(Pdfium::new(bindings))
        }
    }

    impl PageRasterizer for PdfiumRasterizer {
        #[instrument(skip(self, source), fields(path = %source.display()))]
        fn render(&self, source: &Path, page_index: u32, width: u32, height: u32) -> Result<DynamicImage> {
            let pdfium = self.bind()?;
            let document = pdfium
                .load_pdf_from_file(source, None)
                .map_err(|e| SatzwerkError::Image(format!("pdfium cannot open {}: {e}", source.display())))?;
            let index = u16::try_from(page_index)
                .map_err(|_| SatzwerkError::Image(format!("page index {page_index} out of range")))?;
            let page = document
                .pages()
                .get(index)
                .map_err(|e| SatzwerkError::Image(format!("pdfium cannot load page {page_index}: {e}")))?;

            let bitmap = page
                .render_with_config(
                    &PdfRenderConfig::new()
                        .set_target_width(width as i32)
                        .set_target_height(height as i32),
                )
                .map_err(|e| SatzwerkError::Image(format!("pdfium render failed: {e}")))?;

            debug!(width, height, "Page rendered");
            Ok(bitmap.as_image())
        }
    }
}
