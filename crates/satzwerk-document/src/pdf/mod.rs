// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF module: reading source pages, tokenizing and interpreting content
// streams, decoding source fonts, and assembling output documents.

pub mod font;
pub mod interpreter;
pub mod lexer;
pub mod reader;
pub mod writer;

pub use font::{FontTable, SourceFont};
pub use interpreter::{ContentStreamInterpreter, DecodedPage, PositionedGlyph};
pub use reader::PdfReader;
pub use writer::{OutputAssembler, PagePatches, save_document};
