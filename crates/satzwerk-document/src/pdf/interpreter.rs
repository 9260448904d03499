// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Content-stream interpreter.
//
// Walks a page's operators in order, tracking the graphics state (CTM, fill
// colour) and the text state (font, size, spacing, text matrices). Every
// glyph painted by `Tj`, `TJ`, `'` or `"` becomes a `PositionedGlyph` with
// its page-space position; every other operator is passed through with its
// original bytes. No translation decisions are made here.

use std::ops::Range;
use std::sync::Arc;

use lopdf::Object;
use tracing::{debug, instrument, warn};

use satzwerk_core::error::{Result, SatzwerkError};
use satzwerk_core::types::{Color, Matrix, Point};

use crate::pdf::font::{FontTable, SourceFont};
use crate::pdf::lexer::{RawOp, as_number, tokenize};

/// Text state parameters (`Tc Tw Tz TL Tf Tr Ts`).
#[derive(Debug, Clone)]
pub struct TextState {
    pub font: Option<Arc<SourceFont>>,
    pub font_resource: Vec<u8>,
    pub font_size: f64,
    pub char_spacing: f64,
    pub word_spacing: f64,
    /// `Tz / 100`.
    pub horizontal_scaling: f64,
    pub leading: f64,
    pub rise: f64,
    pub render_mode: i64,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            font: None,
            font_resource: Vec::new(),
            font_size: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scaling: 1.0,
            leading: 0.0,
            rise: 0.0,
            render_mode: 0,
        }
    }
}

/// The part of the graphics state saved by `q` and restored by `Q`.
#[derive(Debug, Clone, Default)]
pub struct GraphicsState {
    pub ctm: Matrix,
    pub fill: Color,
    pub text: TextState,
}

/// One glyph painted by a text-showing operator.
#[derive(Debug, Clone)]
pub struct PositionedGlyph {
    /// Unicode text of the glyph (may be several chars for ligatures, empty
    /// when the font gives no mapping).
    pub text: String,
    /// Raw character code bytes.
    pub code: Vec<u8>,
    /// Resource name of the font (`/F1`).
    pub font_id: Vec<u8>,
    /// Base font name without subset tag.
    pub font_name: String,
    pub font_size: f64,
    /// Text rendering matrix: text space of this glyph to page space.
    pub transform: Matrix,
    /// Page-space origin of the glyph (on the baseline).
    pub position: Point,
    /// Page-space horizontal advance.
    pub advance: f64,
    pub color: Color,
    pub render_mode: i64,
    /// Index of the operator that painted this glyph.
    pub op_index: usize,
}

impl PositionedGlyph {
    /// Effective em size on the page.
    pub fn em(&self) -> f64 {
        self.transform.y_scale()
    }

    /// Whether the glyph is drawn rotated or skewed.
    pub fn is_rotated(&self) -> bool {
        self.transform.b.abs() > 1e-6 || self.transform.c.abs() > 1e-6
    }
}

/// What an operator means for the rewriter.
#[derive(Debug, Clone, PartialEq)]
pub enum OpRole {
    PassThrough,
    /// A glyph paint; `glyphs` indexes into [`DecodedPage::glyphs`].
    ShowText {
        glyphs: Range<usize>,
        /// Total text-space advance of the operator (kerning included).
        advance: f64,
        font_size: f64,
        horizontal_scaling: f64,
    },
    /// `ET`, with the CTM in effect when the text object closed.
    EndText { ctm: Matrix },
}

#[derive(Debug, Clone)]
pub struct DecodedOp {
    pub raw: RawOp,
    pub role: OpRole,
}

/// A decoded item, in page order.
#[cfg(test)]
#[derive(Debug, Clone, Copy)]
pub enum PageItem<'a> {
    Glyph(&'a PositionedGlyph),
    PassThrough(&'a RawOp),
}

/// Result of interpreting one page.
#[derive(Debug, Clone)]
pub struct DecodedPage {
    /// The decoded content stream the spans refer to.
    pub source: Vec<u8>,
    pub ops: Vec<DecodedOp>,
    pub glyphs: Vec<PositionedGlyph>,
    pub final_state: GraphicsState,
    /// The stream ended inside `BT` without a closing `ET`.
    pub unterminated_text: bool,
}

impl DecodedPage {
    /// Glyphs and pass-through operators, interleaved in page order.
    #[cfg(test)]
    pub fn items(&self) -> Vec<PageItem<'_>> {
        let mut items = Vec::with_capacity(self.ops.len() + self.glyphs.len());
        for op in &self.ops {
            match &op.role {
                OpRole::ShowText { glyphs, .. } => {
                    items.extend(self.glyphs[glyphs.clone()].iter().map(PageItem::Glyph))
                }
                _ => items.push(PageItem::PassThrough(&op.raw)),
            }
        }
        items
    }

    /// Original bytes of operator `index`.
    pub fn op_bytes(&self, index: usize) -> &[u8] {
        &self.source[self.ops[index].raw.span.clone()]
    }
}

/// Decodes content streams against a page's font table.
pub struct ContentStreamInterpreter<'a> {
    fonts: &'a FontTable,
}

impl<'a> ContentStreamInterpreter<'a> {
    pub fn new(fonts: &'a FontTable) -> Self {
        Self { fonts }
    }

    /// Interpret one content stream. Malformed syntax or operands raise
    /// `ContentExtraction`.
    #[instrument(skip_all, fields(bytes = content.len()))]
    pub fn decode(&self, content: &[u8]) -> Result<DecodedPage> {
        let raw_ops = tokenize(content)?;
        let mut walk = Walk {
            fonts: self.fonts,
            state: GraphicsState::default(),
            stack: Vec::new(),
            tm: Matrix::IDENTITY,
            tlm: Matrix::IDENTITY,
            in_text: false,
            glyphs: Vec::new(),
        };

        let mut ops = Vec::with_capacity(raw_ops.len());
        for (index, raw) in raw_ops.into_iter().enumerate() {
            let role = walk.step(index, &raw).map_err(|err| match err {
                SatzwerkError::ContentExtraction(msg) => SatzwerkError::ContentExtraction(format!(
                    "operator #{index} '{}': {msg}",
                    raw.operator
                )),
                other => other,
            })?;
            ops.push(DecodedOp { raw, role });
        }

        if !walk.stack.is_empty() {
            debug!(depth = walk.stack.len(), "Stream ends with unbalanced q");
        }
        debug!(ops = ops.len(), glyphs = walk.glyphs.len(), "Content stream decoded");

        Ok(DecodedPage {
            source: content.to_vec(),
            ops,
            glyphs: walk.glyphs,
            final_state: walk.state,
            unterminated_text: walk.in_text,
        })
    }
}

struct Walk<'a> {
    fonts: &'a FontTable,
    state: GraphicsState,
    stack: Vec<GraphicsState>,
    tm: Matrix,
    tlm: Matrix,
    in_text: bool,
    glyphs: Vec<PositionedGlyph>,
}

fn operand_error(what: &str) -> SatzwerkError {
    SatzwerkError::ContentExtraction(format!("bad operands: expected {what}"))
}

fn numbers<const N: usize>(op: &RawOp) -> Result<[f64; N]> {
    let mut out = [0.0; N];
    if op.operands.len() < N {
        return Err(operand_error(&format!("{N} numbers")));
    }
    // Use the last N operands; extra leading operands are ignored.
    let skip = op.operands.len() - N;
    for (slot, obj) in out.iter_mut().zip(&op.operands[skip..]) {
        *slot = as_number(obj).ok_or_else(|| operand_error(&format!("{N} numbers")))?;
    }
    Ok(out)
}

impl Walk<'_> {
    fn step(&mut self, index: usize, op: &RawOp) -> Result<OpRole> {
        match op.operator.as_str() {
            // -- Graphics state -------------------------------------------------
            "q" => {
                self.stack.push(self.state.clone());
            }
            "Q" => match self.stack.pop() {
                Some(saved) => self.state = saved,
                None => warn!("Ignoring Q without matching q"),
            },
            "cm" => {
                let [a, b, c, d, e, f] = numbers::<6>(op)?;
                self.state.ctm = Matrix::new(a, b, c, d, e, f).concat(&self.state.ctm);
            }

            // -- Colour ---------------------------------------------------------
            "g" => {
                let [gray] = numbers::<1>(op)?;
                self.state.fill = Color::Gray(gray);
            }
            "rg" => {
                let [r, g, b] = numbers::<3>(op)?;
                self.state.fill = Color::Rgb(r, g, b);
            }
            "k" => {
                let [c, m, y, k] = numbers::<4>(op)?;
                self.state.fill = Color::Cmyk(c, m, y, k);
            }
            "cs" => {
                self.state.fill = match op.operands.first() {
                    Some(Object::Name(name)) if name == b"DeviceGray" => Color::Gray(0.0),
                    Some(Object::Name(name)) if name == b"DeviceRGB" => Color::Rgb(0.0, 0.0, 0.0),
                    Some(Object::Name(name)) if name == b"DeviceCMYK" => {
                        Color::Cmyk(0.0, 0.0, 0.0, 1.0)
                    }
                    Some(Object::Name(_)) => Color::Other,
                    _ => return Err(operand_error("a colour space name")),
                };
            }
            "sc" | "scn" => {
                let comps: Vec<f64> = op.operands.iter().filter_map(as_number).collect();
                let named = op.operands.iter().any(|o| matches!(o, Object::Name(_)));
                self.state.fill = match (self.state.fill, comps.as_slice(), named) {
                    (Color::Gray(_), [g], false) => Color::Gray(*g),
                    (Color::Rgb(..), [r, g, b], false) => Color::Rgb(*r, *g, *b),
                    (Color::Cmyk(..), [c, m, y, k], false) => Color::Cmyk(*c, *m, *y, *k),
                    _ => Color::Other,
                };
            }

            // -- Text objects ---------------------------------------------------
            "BT" => {
                self.in_text = true;
                self.tm = Matrix::IDENTITY;
                self.tlm = Matrix::IDENTITY;
            }
            "ET" => {
                self.in_text = false;
                return Ok(OpRole::EndText {
                    ctm: self.state.ctm,
                });
            }

            // -- Text state -----------------------------------------------------
            "Tf" => {
                let (Some(Object::Name(name)), Some(size)) =
                    (op.operands.first(), op.number(1))
                else {
                    return Err(operand_error("a font name and size"));
                };
                self.state.text.font = Some(self.fonts.get(name));
                self.state.text.font_resource = name.clone();
                self.state.text.font_size = size;
            }
            "Tc" => self.state.text.char_spacing = numbers::<1>(op)?[0],
            "Tw" => self.state.text.word_spacing = numbers::<1>(op)?[0],
            "Tz" => self.state.text.horizontal_scaling = numbers::<1>(op)?[0] / 100.0,
            "TL" => self.state.text.leading = numbers::<1>(op)?[0],
            "Ts" => self.state.text.rise = numbers::<1>(op)?[0],
            "Tr" => self.state.text.render_mode = numbers::<1>(op)?[0] as i64,

            // -- Text positioning -----------------------------------------------
            "Td" => {
                let [tx, ty] = numbers::<2>(op)?;
                self.move_line(tx, ty);
            }
            "TD" => {
                let [tx, ty] = numbers::<2>(op)?;
                self.state.text.leading = -ty;
                self.move_line(tx, ty);
            }
            "Tm" => {
                let [a, b, c, d, e, f] = numbers::<6>(op)?;
                self.tm = Matrix::new(a, b, c, d, e, f);
                self.tlm = self.tm;
            }
            "T*" => self.next_line(),

            // -- Text showing ---------------------------------------------------
            "Tj" => {
                let Some(shown @ Object::String(..)) = op.operands.last() else {
                    return Err(operand_error("a string"));
                };
                return Ok(self.show(index, std::slice::from_ref(shown)));
            }
            "TJ" => {
                let Some(Object::Array(items)) = op.operands.last() else {
                    return Err(operand_error("an array"));
                };
                return Ok(self.show(index, items));
            }
            "'" => {
                let Some(shown @ Object::String(..)) = op.operands.last() else {
                    return Err(operand_error("a string"));
                };
                self.next_line();
                return Ok(self.show(index, std::slice::from_ref(shown)));
            }
            "\"" => {
                let (Some(aw), Some(ac), Some(shown @ Object::String(..))) =
                    (op.number(0), op.number(1), op.operands.get(2))
                else {
                    return Err(operand_error("two numbers and a string"));
                };
                self.state.text.word_spacing = aw;
                self.state.text.char_spacing = ac;
                self.next_line();
                return Ok(self.show(index, std::slice::from_ref(shown)));
            }

            // Everything else (paths, images, XObjects, marked content,
            // stroke colours, ...) does not affect glyph placement.
            _ => {}
        }
        Ok(OpRole::PassThrough)
    }

    fn move_line(&mut self, tx: f64, ty: f64) {
        self.tlm = Matrix::translate(tx, ty).concat(&self.tlm);
        self.tm = self.tlm;
    }

    fn next_line(&mut self) {
        let leading = self.state.text.leading;
        self.move_line(0.0, -leading);
    }

    /// Paint the strings of a `TJ`-style element list.
    fn show(&mut self, op_index: usize, items: &[Object]) -> OpRole {
        let start = self.glyphs.len();
        let text = &self.state.text;
        let font = match &text.font {
            Some(font) => Arc::clone(font),
            None => {
                warn!(op_index, "Text shown with no font selected");
                Arc::new(SourceFont::fallback(b""))
            }
        };
        let fs = text.font_size;
        let th = text.horizontal_scaling;
        let mut total = 0.0;

        for item in items {
            match item {
                Object::String(bytes, _) => {
                    for ch in font.decode(bytes) {
                        let text = &self.state.text;
                        let trm = Matrix::new(fs * th, 0.0, 0.0, fs, 0.0, text.rise)
                            .concat(&self.tm)
                            .concat(&self.state.ctm);
                        let spacing = text.char_spacing
                            + if ch.is_space { text.word_spacing } else { 0.0 };
                        let tx = (ch.width * fs + spacing) * th;
                        let page_scale = self.tm.concat(&self.state.ctm).x_scale();

                        self.glyphs.push(PositionedGlyph {
                            text: ch.text,
                            code: ch.bytes,
                            font_id: text.font_resource.clone(),
                            font_name: font.base_name().to_string(),
                            font_size: fs,
                            transform: trm,
                            position: trm.apply(Point::new(0.0, 0.0)),
                            advance: tx * page_scale,
                            color: self.state.fill,
                            render_mode: text.render_mode,
                            op_index,
                        });
                        self.tm = Matrix::translate(tx, 0.0).concat(&self.tm);
                        total += tx;
                    }
                }
                other => {
                    if let Some(adjust) = as_number(other) {
                        let tx = -adjust / 1000.0 * fs * th;
                        self.tm = Matrix::translate(tx, 0.0).concat(&self.tm);
                        total += tx;
                    }
                }
            }
        }

        OpRole::ShowText {
            glyphs: start..self.glyphs.len(),
            advance: total,
            font_size: fs,
            horizontal_scaling: th,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::font::SourceFont;
    use lopdf::{Document, dictionary};

    fn table() -> FontTable {
        let doc = Document::with_version("1.5");
        let mut fonts = FontTable::default();
        let courier = dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        };
        fonts.insert(SourceFont::from_dict(&doc, b"F1", &courier).unwrap());
        fonts
    }

    fn decode(src: &[u8]) -> DecodedPage {
        let fonts = table();
        ContentStreamInterpreter::new(&fonts).decode(src).unwrap()
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn glyph_positions_follow_td_and_widths() {
        let page = decode(b"BT /F1 10 Tf 72 700 Td (ab) Tj ET");
        assert_eq!(page.glyphs.len(), 2);
        let a = &page.glyphs[0];
        let b = &page.glyphs[1];
        assert_eq!(a.text, "a");
        assert!(close(a.position.x, 72.0) && close(a.position.y, 700.0));
        // Courier: 600/1000 * 10pt.
        assert!(close(a.advance, 6.0));
        assert!(close(b.position.x, 78.0));
        assert_eq!(a.font_name, "Courier");
        assert_eq!(a.font_id, b"F1");
        assert!(close(a.em(), 10.0));
    }

    #[test]
    fn ctm_and_text_matrix_compose() {
        let page = decode(b"q 2 0 0 2 10 20 cm BT /F1 5 Tf 1 0 0 1 3 4 Tm (x) Tj ET Q");
        let g = &page.glyphs[0];
        assert!(close(g.position.x, 16.0));
        assert!(close(g.position.y, 28.0));
        assert!(close(g.em(), 10.0));
        assert!(close(g.advance, 6.0));
        // The CTM is restored by Q.
        assert_eq!(page.final_state.ctm, Matrix::IDENTITY);
    }

    #[test]
    fn tj_kerning_spacing_and_scaling() {
        let page = decode(b"BT /F1 10 Tf 2 Tc 3 Tw 50 Tz [(a) -1000 ( b)] TJ ET");
        let xs: Vec<f64> = page.glyphs.iter().map(|g| g.position.x).collect();
        // a: (6 + 2) * 0.5 = 4, kern +10 * 0.5 = 5, space: (6 + 2 + 3) * 0.5 = 5.5
        assert!(close(xs[0], 0.0));
        assert!(close(xs[1], 9.0));
        assert!(close(xs[2], 14.5));
        let OpRole::ShowText { advance, glyphs, .. } = &page.ops[5].role else {
            panic!("TJ should be a text show");
        };
        assert_eq!(glyphs.clone(), 0..3);
        assert!(close(*advance, 4.0 + 5.0 + 5.5 + 4.0));
    }

    #[test]
    fn quote_operators_move_to_next_line() {
        let page = decode(b"BT /F1 10 Tf 12 TL 0 100 Td (a) Tj (b) ' 1 2 (c) \" ET");
        assert!(close(page.glyphs[1].position.y, 88.0));
        assert!(close(page.glyphs[1].position.x, 0.0));
        assert!(close(page.glyphs[2].position.y, 76.0));
        assert_eq!(page.final_state.text.word_spacing, 1.0);
        assert_eq!(page.final_state.text.char_spacing, 2.0);
    }

    #[test]
    fn td_upper_sets_leading() {
        let page = decode(b"BT /F1 10 Tf 0 50 Td 0 -14 TD (a) Tj T* (b) Tj ET");
        assert!(close(page.glyphs[0].position.y, 36.0));
        assert!(close(page.glyphs[1].position.y, 22.0));
    }

    #[test]
    fn colours_and_render_mode_are_tracked() {
        let page = decode(b"BT /F1 10 Tf 1 0 0 rg 2 Tr (a) Tj /DeviceCMYK cs 0 0 0 1 sc (b) Tj /P0 scn (c) Tj ET");
        assert_eq!(page.glyphs[0].color, Color::Rgb(1.0, 0.0, 0.0));
        assert_eq!(page.glyphs[0].render_mode, 2);
        assert_eq!(page.glyphs[1].color, Color::Cmyk(0.0, 0.0, 0.0, 1.0));
        assert_eq!(page.glyphs[2].color, Color::Other);
    }

    #[test]
    fn items_interleave_glyphs_and_pass_through() {
        let page = decode(b"0 0 m 10 10 l S BT /F1 10 Tf (ab) Tj ET");
        let kinds: Vec<&str> = page
            .items()
            .iter()
            .map(|item| match item {
                PageItem::Glyph(_) => "glyph",
                PageItem::PassThrough(op) => op.operator.as_str(),
            })
            .collect();
        assert_eq!(kinds, ["m", "l", "S", "BT", "Tf", "glyph", "glyph", "ET"]);
        assert_eq!(page.op_bytes(1), b"10 10 l");
    }

    #[test]
    fn end_text_records_ctm() {
        let page = decode(b"1 0 0 1 5 5 cm BT ET");
        assert_eq!(
            page.ops[2].role,
            OpRole::EndText {
                ctm: Matrix::translate(5.0, 5.0)
            }
        );
        assert!(!page.unterminated_text);
        assert!(decode(b"BT /F1 1 Tf (a) Tj").unterminated_text);
    }

    #[test]
    fn extra_restore_is_ignored() {
        let page = decode(b"Q Q q 1 0 0 1 1 1 cm");
        assert_eq!(page.final_state.ctm, Matrix::translate(1.0, 1.0));
    }

    #[test]
    fn bad_operands_are_extraction_errors() {
        let fonts = table();
        let interp = ContentStreamInterpreter::new(&fonts);
        assert!(matches!(
            interp.decode(b"BT (x) Tf ET"),
            Err(SatzwerkError::ContentExtraction(_))
        ));
        assert!(matches!(
            interp.decode(b"1 0 0 cm"),
            Err(SatzwerkError::ContentExtraction(_))
        ));
        assert!(matches!(
            interp.decode(b"BT 5 Tj ET"),
            Err(SatzwerkError::ContentExtraction(_))
        ));
    }
}
