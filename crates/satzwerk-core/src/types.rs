// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Satzwerk translation pipeline.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::pages::PageSelector;

// -- Geometry -----------------------------------------------------------------

/// A point in PDF user space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle `(x0, y0)`-`(x1, y1)` with `x0 <= x1`, `y0 <= y1`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BBox {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl BBox {
    /// Build a box from two corners in any order.
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self {
            x0: x0.min(x1),
            y0: y0.min(y1),
            x1: x0.max(x1),
            y1: y0.max(y1),
        }
    }

    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }

    /// Inclusive containment test.
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x0 && point.x <= self.x1 && point.y >= self.y0 && point.y <= self.y1
    }

    /// Smallest box covering both.
    pub fn union(&self, other: &BBox) -> BBox {
        BBox {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }
}

/// PDF transformation matrix `[a b c d e f]`, applied to row vectors.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Matrix {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Default for Matrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Matrix {
    pub const IDENTITY: Matrix = Matrix {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    pub fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Self { a, b, c, d, e, f }
    }

    pub fn translate(tx: f64, ty: f64) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    /// `self × other`: apply `self` first, then `other`.
    pub fn concat(&self, other: &Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    pub fn apply(&self, point: Point) -> Point {
        Point {
            x: point.x * self.a + point.y * self.c + self.e,
            y: point.x * self.b + point.y * self.d + self.f,
        }
    }

    /// Length of the unit x vector after transformation (linear part only).
    pub fn x_scale(&self) -> f64 {
        (self.a * self.a + self.b * self.b).sqrt()
    }

    /// Length of the unit y vector after transformation (linear part only).
    pub fn y_scale(&self) -> f64 {
        (self.c * self.c + self.d * self.d).sqrt()
    }

    /// Inverse matrix, or `None` when singular.
    pub fn invert(&self) -> Option<Matrix> {
        let det = self.a * self.d - self.b * self.c;
        if det.abs() < 1e-12 {
            return None;
        }
        let a = self.d / det;
        let b = -self.b / det;
        let c = -self.c / det;
        let d = self.a / det;
        Some(Matrix {
            a,
            b,
            c,
            d,
            e: -(self.e * a + self.f * c),
            f: -(self.e * b + self.f * d),
        })
    }

    pub fn as_array(&self) -> [f64; 6] {
        [self.a, self.b, self.c, self.d, self.e, self.f]
    }
}

/// Non-stroking colour as tracked by the content-stream interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Color {
    Gray(f64),
    Rgb(f64, f64, f64),
    Cmyk(f64, f64, f64, f64),
    /// Pattern, separation, ICC or other spaces the emitter leaves untouched.
    Other,
}

impl Default for Color {
    fn default() -> Self {
        Self::Gray(0.0)
    }
}

// -- Layout -------------------------------------------------------------------

/// Semantic class of a detected layout region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegionCategory {
    Text,
    Image,
    Table,
    Formula,
    Title,
    Other,
}

impl RegionCategory {
    /// Only plain text regions are translated.
    pub fn is_translatable(&self) -> bool {
        matches!(self, Self::Text)
    }
}

/// A detected rectangular area of a page, in PDF user space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutRegion {
    pub bbox: BBox,
    pub category: RegionCategory,
    pub confidence: f32,
}

impl LayoutRegion {
    pub fn new(bbox: BBox, category: RegionCategory, confidence: f32) -> Self {
        Self {
            bbox,
            category,
            confidence,
        }
    }
}

// -- Translation --------------------------------------------------------------

/// Classification of errors for retry logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorClass {
    /// Network blip, timeout, rate limit: safe to retry automatically.
    Transient,
    /// The user must fix something (API key, page selection, language pair).
    UserAction,
    /// Permanent failure: malformed input, rejected request.
    Permanent,
}

/// Supported translation services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKind {
    Google,
    OpenAi,
    DeepL,
}

impl ServiceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::OpenAi => "openai",
            Self::DeepL => "deepl",
        }
    }
}

impl std::str::FromStr for ServiceKind {
    type Err = crate::error::SatzwerkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "google" => Ok(Self::Google),
            "openai" => Ok(Self::OpenAi),
            "deepl" => Ok(Self::DeepL),
            other => Err(crate::error::SatzwerkError::config(
                "service",
                format!("unknown translation service '{other}'"),
            )),
        }
    }
}

impl std::fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which output documents to write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Translated pages only.
    Mono,
    /// Each original page followed by its translated copy.
    Bilingual,
    #[default]
    Both,
}

impl OutputMode {
    pub fn wants_mono(&self) -> bool {
        matches!(self, Self::Mono | Self::Both)
    }

    pub fn wants_bilingual(&self) -> bool {
        matches!(self, Self::Bilingual | Self::Both)
    }
}

/// A custom prompt for LLM-backed services.
///
/// `$text` / `${text}` is replaced by the source text, `$lang_in` and
/// `$lang_out` by the language codes. Unknown placeholders are left alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptTemplate(pub String);

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self(template.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn render(&self, text: &str, source_lang: &str, target_lang: &str) -> String {
        // Longer placeholders first so `$text` never eats the prefix of another.
        self.0
            .replace("${lang_out}", target_lang)
            .replace("$lang_out", target_lang)
            .replace("${lang_in}", source_lang)
            .replace("$lang_in", source_lang)
            .replace("${text}", text)
            .replace("$text", text)
    }
}

/// The immutable configuration for translating one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationTask {
    pub document: PathBuf,
    /// `None` selects every page.
    pub page_selector: Option<PageSelector>,
    pub source_lang: String,
    pub target_lang: String,
    pub service: ServiceKind,
    /// Maximum concurrent translation requests.
    pub thread_count: usize,
    /// Regex over font base names; matching glyphs are never translated.
    pub protected_font_pattern: String,
    /// Regex over characters; matching glyphs are never translated.
    pub protected_char_pattern: String,
    pub ignore_cache: bool,
    pub skip_subset_fonts: bool,
    pub prompt: Option<PromptTemplate>,
    pub output_mode: OutputMode,
}

impl TranslationTask {
    /// Task with the default English to Simplified Chinese settings.
    pub fn new(document: impl Into<PathBuf>) -> Self {
        Self {
            document: document.into(),
            page_selector: None,
            source_lang: "en".into(),
            target_lang: "zh-CN".into(),
            service: ServiceKind::Google,
            thread_count: 4,
            protected_font_pattern: String::new(),
            protected_char_pattern: String::new(),
            ignore_cache: false,
            skip_subset_fonts: false,
            prompt: None,
            output_mode: OutputMode::Both,
        }
    }

    /// Same settings, different input file.
    pub fn for_document(&self, document: impl AsRef<Path>) -> Self {
        Self {
            document: document.as_ref().to_path_buf(),
            ..self.clone()
        }
    }

    /// File stem used to name output documents.
    pub fn document_stem(&self) -> String {
        self.document
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".into())
    }

    /// Whether the target language needs a CJK-capable font.
    pub fn needs_cjk_font(&self) -> bool {
        is_cjk_language(&self.target_lang)
    }
}

/// `zh`, `ja`, `ko` and their regional variants.
pub fn is_cjk_language(code: &str) -> bool {
    let primary = code
        .split(['-', '_'])
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    matches!(primary.as_str(), "zh" | "ja" | "ko")
}
