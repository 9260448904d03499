// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// satzwerk-document: layout-preserving translation of PDF pages.
//
// Pages are rendered and segmented by a layout model, their content streams
// interpreted into positioned glyphs, text runs inside Text regions
// translated and refitted, and the streams rewritten so that everything else
// (formulas, figures, tables, vector art) keeps its original bytes.

pub mod convert;
pub mod fonts;
pub mod layout;
pub mod pdf;
pub mod processor;

// Re-export the primary structs so callers can use `satzwerk_document::PdfProcessor` etc.
pub use convert::{PagePatch, ProtectionRules, TranslateConverter};
pub use fonts::{EmbeddedFont, FontRegistry};
pub use layout::{FixedLayoutModel, LayoutModel, PageRasterizer};
pub use pdf::{ContentStreamInterpreter, OutputAssembler, PdfReader};
pub use processor::{LayoutStage, PdfProcessor};

#[cfg(feature = "layout-model")]
pub use layout::DocLayoutModel;
#[cfg(feature = "pdfium")]
pub use layout::PdfiumRasterizer;
