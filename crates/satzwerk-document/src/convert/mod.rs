// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page conversion: group glyphs into runs, translate them in one batch,
// refit the translations into the original geometry, and rewrite the
// content stream.
//
// Glyphs outside Text regions, or matching the protection patterns, are
// never touched: their operators reach the output byte for byte.

pub mod emit;
pub mod protect;
pub mod reflow;
pub mod runs;

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use satzwerk_core::report::RunFailure;
use satzwerk_core::types::LayoutRegion;
use satzwerk_translate::Translator;

use crate::fonts::{FontRegistry, FontUsage};
use crate::pdf::interpreter::DecodedPage;

pub use protect::ProtectionRules;
pub use reflow::{PlacedText, fit_font_size};
pub use runs::{RegionRef, TextRun, assemble_runs};

/// The rewritten content of one page.
#[derive(Debug, Clone, Default)]
pub struct PagePatch {
    pub content: Vec<u8>,
    /// Characters drawn in each output font.
    pub fonts_used: FontUsage,
    /// Runs that contained letters and were sent for translation.
    pub runs_total: usize,
    pub runs_translated: usize,
    pub failures: Vec<RunFailure>,
}

impl PagePatch {
    /// Whether the content differs from the source.
    pub fn changed(&self) -> bool {
        self.runs_translated > 0
    }
}

pub struct TranslateConverter {
    translator: Arc<Translator>,
    rules: ProtectionRules,
    source_lang: String,
    target_lang: String,
}

impl TranslateConverter {
    pub fn new(
        translator: Arc<Translator>,
        rules: ProtectionRules,
        source_lang: impl Into<String>,
        target_lang: impl Into<String>,
    ) -> Self {
        Self {
            translator,
            rules,
            source_lang: source_lang.into(),
            target_lang: target_lang.into(),
        }
    }

    pub fn rules(&self) -> &ProtectionRules {
        &self.rules
    }

    /// Translate the runs of `page` that fall inside Text regions
    /// (page-space `regions`; glyphs outside every region count as Text).
    /// Per-run failures leave the run as it was and are reported in the
    /// patch; they never fail the page.
    #[instrument(skip_all, fields(glyphs = page.glyphs.len(), regions = regions.len()))]
    pub async fn transform(
        &self,
        page: &DecodedPage,
        regions: &[LayoutRegion],
        fonts: &FontRegistry,
    ) -> PagePatch {
        let runs = assemble_runs(page, regions, &self.rules);
        let candidates: Vec<usize> = (0..runs.len()).filter(|&i| runs[i].has_alphabetic()).collect();
        let texts: Vec<String> = candidates.iter().map(|&i| runs[i].origin_text.clone()).collect();
        debug!(runs = runs.len(), candidates = candidates.len(), "Runs assembled");

        let results = if texts.is_empty() {
            Vec::new()
        } else {
            self.translator
                .batch_translate(&texts, &self.source_lang, &self.target_lang)
                .await
        };

        let mut failures = Vec::new();
        let mut placements = Vec::with_capacity(candidates.len());
        for (&index, result) in candidates.iter().zip(results) {
            let run = &runs[index];
            match result {
                Ok(translated) => {
                    let text = reflow::normalize_whitespace(&translated);
                    if text.is_empty() {
                        failures.push(RunFailure::new(index, &run.origin_text, "empty translation"));
                        continue;
                    }
                    let key = fonts.choose(&run.font_name, &text);
                    match PlacedText::for_run(run, key, text, |t, size| fonts.measure(key, t, size)) {
                        Some(placed) => placements.push((index, placed)),
                        None => {
                            warn!(run = index, "Run has no width, left untranslated");
                            failures.push(RunFailure::new(index, &run.origin_text, "run has no width"));
                        }
                    }
                }
                Err(err) => {
                    warn!(run = index, error = %err, "Run left untranslated");
                    failures.push(RunFailure::new(index, &run.origin_text, err));
                }
            }
        }

        let emitted = emit::emit_page(page, &runs, &placements, fonts);
        for (index, reason) in &emitted.rejected {
            warn!(run = index, %reason, "Run left untranslated");
            failures.push(RunFailure::new(*index, &runs[*index].origin_text, reason));
        }
        failures.sort_by_key(|f| f.run_index);

        let mut fonts_used = FontUsage::new();
        let mut runs_translated = 0;
        for (index, placed) in &placements {
            if emitted.rejected.iter().any(|(r, _)| r == index) {
                continue;
            }
            fonts_used
                .entry(placed.font)
                .or_default()
                .extend(fonts.drawn_chars(placed.font, &placed.text));
            runs_translated += 1;
        }

        PagePatch {
            content: emitted.content,
            fonts_used,
            runs_total: candidates.len(),
            runs_translated,
            failures,
        }
    }
}
