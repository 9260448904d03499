// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document pipeline: for each selected page, detect layout, decode the
// content stream, translate and rewrite it, then assemble the requested
// output variants.
//
// Page-level problems never abort the document. A layout failure degrades
// the page to a single Text region; a content stream that cannot be decoded
// leaves the page unchanged.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, instrument, warn};

use satzwerk_core::error::{Result, SatzwerkError};
use satzwerk_core::pages::select_pages;
use satzwerk_core::report::{DocumentReport, PageReport, PageStatus};
use satzwerk_core::types::{BBox, LayoutRegion, TranslationTask};
use satzwerk_translate::Translator;

use crate::convert::{ProtectionRules, TranslateConverter};
use crate::fonts::{EmbeddedFont, FontRegistry, FontUsage, merge_usage};
use crate::layout::{LayoutModel, PageRasterizer, render_size, to_page_space, whole_page_region};
use crate::pdf::{ContentStreamInterpreter, OutputAssembler, PagePatches, PdfReader, save_document};

/// Rasterizer and model used for layout detection.
pub struct LayoutStage {
    rasterizer: Arc<dyn PageRasterizer>,
    model: Arc<dyn LayoutModel>,
    input_size: u32,
}

impl LayoutStage {
    pub fn new(rasterizer: Arc<dyn PageRasterizer>, model: Arc<dyn LayoutModel>, input_size: u32) -> Self {
        Self {
            rasterizer,
            model,
            input_size,
        }
    }

    /// Page-space regions for page `number` of `source`.
    fn detect(&self, source: &Path, number: u32, media_box: BBox) -> Result<Vec<LayoutRegion>> {
        let (width, height) = render_size(media_box, self.input_size);
        let image = self.rasterizer.render(source, number - 1, width, height)?;
        let regions = self.model.predict(&image, self.input_size)?;
        Ok(to_page_space(regions, width, height, media_box))
    }
}

/// Translates whole documents.
pub struct PdfProcessor {
    translator: Arc<Translator>,
    output_dir: PathBuf,
    layout: Option<LayoutStage>,
    cjk_font: Option<Arc<EmbeddedFont>>,
}

impl PdfProcessor {
    /// Without a layout stage every page is one Text region.
    pub fn new(translator: Arc<Translator>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            translator,
            output_dir: output_dir.into(),
            layout: None,
            cjk_font: None,
        }
    }

    pub fn with_layout(mut self, layout: LayoutStage) -> Self {
        self.layout = Some(layout);
        self
    }

    /// Font embedded for CJK (and other non-WinAnsi) output text.
    pub fn with_cjk_font(mut self, font: Arc<EmbeddedFont>) -> Self {
        self.cjk_font = Some(font);
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Translate `task.document` and write the requested outputs.
    ///
    /// Errors are document-level: invalid protection patterns, an unreadable
    /// file, a page selection outside the document, or a failed write.
    #[instrument(skip_all, fields(document = %task.document.display(), service = %task.service))]
    pub async fn translate_document(&self, task: &TranslationTask) -> Result<DocumentReport> {
        let rules = ProtectionRules::new(&task.protected_font_pattern, &task.protected_char_pattern)?;
        let reader = PdfReader::open(&task.document)?;
        let page_count = reader.page_count();
        let selected = select_pages(task.page_selector.as_ref(), page_count)?;

        let fonts = FontRegistry::new(&task.target_lang, self.cjk_font.clone());
        let converter = TranslateConverter::new(
            Arc::clone(&self.translator),
            rules,
            task.source_lang.as_str(),
            task.target_lang.as_str(),
        );

        let mut report = DocumentReport::new(&task.document);
        let mut patches = PagePatches::new();
        let mut usage = FontUsage::new();

        for number in 1..=page_count {
            if !selected.contains(&number) {
                report.pages.push(PageReport::untouched(number));
                continue;
            }
            let page = self
                .translate_page(&reader, number, &converter, &fonts, &mut patches, &mut usage)
                .await;
            info!(
                page = number,
                runs = page.runs_total,
                translated = page.runs_translated,
                "Page processed"
            );
            report.pages.push(page);
        }

        let stem = task.document_stem();
        let assembler = OutputAssembler::new(&reader, &fonts, !task.skip_subset_fonts);
        if task.output_mode.wants_mono() {
            let path = self.output_dir.join(format!("{stem}-mono.pdf"));
            save_document(assembler.build_mono(&patches, &usage)?, &path)?;
            report.mono_output = Some(path);
        }
        if task.output_mode.wants_bilingual() {
            let path = self.output_dir.join(format!("{stem}-dual.pdf"));
            save_document(assembler.build_bilingual(&patches, &usage)?, &path)?;
            report.bilingual_output = Some(path);
        }

        report.finish();
        info!(
            pages = page_count,
            runs = report.runs_total(),
            translated = report.runs_translated(),
            failed = report.failed_runs(),
            "Document translated"
        );
        Ok(report)
    }

    async fn translate_page(
        &self,
        reader: &PdfReader,
        number: u32,
        converter: &TranslateConverter,
        fonts: &FontRegistry,
        patches: &mut PagePatches,
        usage: &mut FontUsage,
    ) -> PageReport {
        let decoded = reader.media_box(number).and_then(|media_box| {
            let content = reader.page_content(number)?;
            let table = reader.font_table(number)?;
            let page = ContentStreamInterpreter::new(&table).decode(&content)?;
            Ok((media_box, page))
        });
        let (media_box, page) = match decoded {
            Ok(decoded) => decoded,
            Err(err) => {
                warn!(page = number, error = %err, "Page copied unchanged");
                return PageReport::skipped(number, err.to_string());
            }
        };

        let (regions, status) = self.regions(reader, number, media_box);
        let patch = converter.transform(&page, &regions, fonts).await;

        let report = PageReport {
            page: number,
            status,
            runs_total: patch.runs_total,
            runs_translated: patch.runs_translated,
            failures: patch.failures,
        };
        if patch.runs_translated > 0 {
            patches.insert(number, patch.content);
            merge_usage(usage, patch.fonts_used);
        }
        report
    }

    fn regions(&self, reader: &PdfReader, number: u32, media_box: BBox) -> (Vec<LayoutRegion>, PageStatus) {
        let Some(layout) = &self.layout else {
            return (vec![whole_page_region(media_box)], PageStatus::Translated);
        };
        let detected = match reader.source_path() {
            Some(source) => layout.detect(Path::new(source), number, media_box),
            None => Err(SatzwerkError::LayoutAnalysis(
                "document has no source file to render".into(),
            )),
        };
        match detected {
            Ok(regions) => (regions, PageStatus::Translated),
            Err(err) => {
                warn!(page = number, error = %err, "Layout detection failed, treating page as text");
                (
                    vec![whole_page_region(media_box)],
                    PageStatus::Degraded {
                        reason: err.to_string(),
                    },
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use image::DynamicImage;
    use lopdf::{Document, Object, Stream, dictionary};

    use satzwerk_core::types::{OutputMode, RegionCategory};
    use satzwerk_core::PageSelector;
    use satzwerk_translate::{MemoryCache, RetryPolicy, TranslationBackend, TranslatorOptions};

    use super::*;
    use crate::layout::FixedLayoutModel;

    const BODY: &[u8] = b"BT /F1 12 Tf 100 900 Td (Hello world) Tj ET";
    const FORMULA: &[u8] = b"BT /F1 12 Tf 100 500 Td (x plus y) Tj ET";
    const DRAWING: &[u8] = b"0 0 1 rg 10 10 100 50 re f";

    struct UpperBackend;

    #[async_trait]
    impl TranslationBackend for UpperBackend {
        fn service_id(&self) -> &str {
            "upper"
        }

        fn supported_languages(&self) -> &[&str] {
            &[]
        }

        async fn do_translate(&self, text: &str, _src: &str, _tgt: &str) -> Result<String> {
            Ok(text.to_uppercase())
        }
    }

    struct BlankRasterizer;

    impl PageRasterizer for BlankRasterizer {
        fn render(&self, _source: &Path, _page: u32, width: u32, height: u32) -> Result<DynamicImage> {
            Ok(DynamicImage::new_rgb8(width, height))
        }
    }

    struct BrokenRasterizer;

    impl PageRasterizer for BrokenRasterizer {
        fn render(&self, _source: &Path, _page: u32, _width: u32, _height: u32) -> Result<DynamicImage> {
            Err(SatzwerkError::Image("renderer unavailable".into()))
        }
    }

    fn translator() -> Arc<Translator> {
        let options = TranslatorOptions {
            source_lang: "en".into(),
            target_lang: "de".into(),
            retry: RetryPolicy {
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(1),
                ..Default::default()
            },
            ..Default::default()
        };
        Arc::new(Translator::new(Arc::new(UpperBackend), Arc::new(MemoryCache::new()), options).unwrap())
    }

    /// One 1024 x 1024 pt page per content stream, written to `dir`.
    fn write_pdf(dir: &Path, pages: &[Vec<u8>]) -> PathBuf {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let mut kids: Vec<Object> = Vec::new();
        for content in pages {
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.clone()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }
        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "MediaBox" => vec![0.into(), 0.into(), 1024.into(), 1024.into()],
                "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
            }),
        );
        let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
        doc.trailer.set("Root", catalog_id);

        let path = dir.join("paper.pdf");
        doc.save(&path).unwrap();
        path
    }

    fn page(parts: &[&[u8]]) -> Vec<u8> {
        parts.join(&b'\n')
    }

    fn task(path: &Path) -> TranslationTask {
        TranslationTask {
            source_lang: "en".into(),
            target_lang: "de".into(),
            ..TranslationTask::new(path)
        }
    }

    /// A formula box around the second line, in pixels (1 px per pt).
    fn formula_layout() -> LayoutStage {
        let formula = LayoutRegion::new(
            BBox::new(50.0, 480.0, 600.0, 540.0),
            RegionCategory::Formula,
            0.9,
        );
        LayoutStage::new(
            Arc::new(BlankRasterizer),
            Arc::new(FixedLayoutModel::new(vec![formula])),
            1024,
        )
    }

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle)
    }

    #[tokio::test]
    async fn protected_region_bytes_survive_translation() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_pdf(dir.path(), &[page(&[BODY, FORMULA, DRAWING])]);
        let processor = PdfProcessor::new(translator(), dir.path().join("out")).with_layout(formula_layout());

        let report = processor.translate_document(&task(&path)).await.unwrap();
        assert_eq!(report.pages[0].status, PageStatus::Translated);
        assert_eq!(report.runs_total(), 1);
        assert_eq!(report.runs_translated(), 1);

        let mono = PdfReader::open(report.mono_output.as_ref().unwrap()).unwrap();
        let content = mono.page_content(1).unwrap();
        assert!(contains(&content, FORMULA));
        assert!(contains(&content, DRAWING));
        assert!(!contains(&content, b"(Hello world) Tj"));

        let table = mono.font_table(1).unwrap();
        let decoded = ContentStreamInterpreter::new(&table).decode(&content).unwrap();
        let text: String = decoded.glyphs.iter().map(|g| g.text.as_str()).collect();
        assert!(text.contains("HELLO WORLD"));
        assert!(text.contains("x plus y"));

        let dual = PdfReader::open(report.bilingual_output.as_ref().unwrap()).unwrap();
        assert_eq!(dual.page_count(), 2);
        assert!(contains(&dual.page_content(1).unwrap(), BODY));
    }

    #[tokio::test]
    async fn failed_layout_degrades_to_whole_page() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_pdf(dir.path(), &[page(&[BODY, FORMULA])]);
        let layout = LayoutStage::new(
            Arc::new(BrokenRasterizer),
            Arc::new(FixedLayoutModel::default()),
            1024,
        );
        let processor = PdfProcessor::new(translator(), dir.path()).with_layout(layout);

        let report = processor.translate_document(&task(&path)).await.unwrap();
        assert!(matches!(report.pages[0].status, PageStatus::Degraded { .. }));
        assert_eq!(report.runs_translated(), 2);
        assert_eq!(report.problem_pages().count(), 1);
    }

    #[tokio::test]
    async fn undecodable_page_is_copied_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let broken = b"BT 12 /F1 Tf (oops) Tj ET".to_vec();
        let path = write_pdf(dir.path(), &[broken.clone(), BODY.to_vec()]);
        let processor = PdfProcessor::new(translator(), dir.path());

        let mut task = task(&path);
        task.output_mode = OutputMode::Mono;
        let report = processor.translate_document(&task).await.unwrap();
        assert!(matches!(report.pages[0].status, PageStatus::Skipped { .. }));
        assert_eq!(report.pages[1].status, PageStatus::Translated);
        assert!(report.bilingual_output.is_none());

        let mono = PdfReader::open(dir.path().join("paper-mono.pdf")).unwrap();
        assert_eq!(mono.page_content(1).unwrap(), broken);
    }

    #[tokio::test]
    async fn page_selection_limits_work() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_pdf(dir.path(), &[BODY.to_vec(), BODY.to_vec()]);
        let processor = PdfProcessor::new(translator(), dir.path());

        let mut selected = task(&path);
        selected.page_selector = Some(PageSelector::parse("2").unwrap());
        let report = processor.translate_document(&selected).await.unwrap();
        assert_eq!(report.pages[0].status, PageStatus::Untouched);
        assert_eq!(report.pages[1].runs_translated, 1);

        selected.page_selector = Some(PageSelector::parse("1-5").unwrap());
        let err = processor.translate_document(&selected).await.unwrap_err();
        assert!(matches!(err, SatzwerkError::Configuration { .. }));
    }

    #[tokio::test]
    async fn bad_pattern_fails_before_opening() {
        let processor = PdfProcessor::new(translator(), "unused");
        let mut bad = task(Path::new("/nonexistent/file.pdf"));
        bad.protected_char_pattern = "[".into();
        let err = processor.translate_document(&bad).await.unwrap_err();
        assert!(matches!(err, SatzwerkError::Configuration { ref key, .. } if key == "vchar"));
    }
}
