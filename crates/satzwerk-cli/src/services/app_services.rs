// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Builds the translator, cache and document processor for one CLI run.
//
// Optional pieces (persistent cache, CJK font, layout model) degrade with a
// warning instead of aborting the run.

use std::path::Path;
use std::sync::Arc;

use satzwerk_core::config::AppConfig;
use satzwerk_core::error::Result;
use satzwerk_core::report::DocumentReport;
use satzwerk_core::types::TranslationTask;
use satzwerk_document::{EmbeddedFont, PdfProcessor};
use satzwerk_translate::{
    MemoryCache, SqliteCache, TranslationCache, Translator, TranslatorOptions, build_backend,
};
use tracing::{info, warn};

use crate::args::Cli;

/// Everything a run needs, built once and shared by every input file.
pub struct AppServices {
    processor: PdfProcessor,
    task: TranslationTask,
}

impl AppServices {
    /// Initialise all services for `task`.
    ///
    /// Backend construction and language checks are fatal; the cache falls
    /// back to memory and a broken CJK font or layout model is skipped.
    pub fn init(cli: &Cli, config: &AppConfig, task: TranslationTask) -> Result<Self> {
        info!(service = %task.service, lang_in = %task.source_lang, lang_out = %task.target_lang, "initialising services");

        let backend = build_backend(task.service, &config.services, task.prompt.clone())?;
        let cache = open_cache(&config.cache_path());
        let options = TranslatorOptions::from_task(&task, &config.retry);
        let translator = Arc::new(Translator::new(backend, cache, options)?);

        let mut processor = PdfProcessor::new(translator, cli.output.clone());

        if let Some(path) = &config.fonts.cjk_font_path {
            match EmbeddedFont::load(path) {
                Ok(font) => processor = processor.with_cjk_font(Arc::new(font)),
                Err(e) => warn!(path = %path.display(), "CJK font unavailable, using Adobe fallback: {e}"),
            }
        }

        let model_path = cli.layout_model.as_ref().or(config.layout.model_path.as_ref());
        if let Some(path) = model_path {
            processor = attach_layout(processor, path, config);
        }

        info!(output = %processor.output_dir().display(), "services initialised");
        Ok(Self { processor, task })
    }

    /// Translate one file with the shared task settings.
    pub async fn translate(&self, document: &Path) -> Result<DocumentReport> {
        let task = self.task.for_document(document);
        self.processor.translate_document(&task).await
    }
}

fn open_cache(path: &Path) -> Arc<dyn TranslationCache> {
    match SqliteCache::open(path) {
        Ok(cache) => {
            match cache.count() {
                Ok(entries) => info!(path = %path.display(), entries, "using translation cache"),
                Err(e) => warn!(path = %path.display(), "translation cache not countable: {e}"),
            }
            Arc::new(cache)
        }
        Err(e) => {
            warn!(path = %path.display(), "translation cache unavailable, using memory only: {e}");
            Arc::new(MemoryCache::new())
        }
    }
}

#[cfg(feature = "layout")]
fn attach_layout(processor: PdfProcessor, path: &Path, config: &AppConfig) -> PdfProcessor {
    use satzwerk_document::{DocLayoutModel, LayoutStage, PdfiumRasterizer};

    match DocLayoutModel::load(path, config.layout.confidence_threshold) {
        Ok(model) => {
            let stage = LayoutStage::new(
                Arc::new(PdfiumRasterizer::new(None)),
                Arc::new(model),
                config.layout.input_size,
            );
            processor.with_layout(stage)
        }
        Err(e) => {
            warn!(path = %path.display(), "layout model unavailable, pages are treated as plain text: {e}");
            processor
        }
    }
}

#[cfg(not(feature = "layout"))]
fn attach_layout(processor: PdfProcessor, path: &Path, _config: &AppConfig) -> PdfProcessor {
    warn!(
        path = %path.display(),
        "built without the `layout` feature, ignoring layout model"
    );
    processor
}
