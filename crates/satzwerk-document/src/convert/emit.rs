// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Content stream rewriting. Bytes that carry no translated glyph are copied
// verbatim. A text-showing operator whose glyphs were translated becomes a
// shim that keeps the text cursor where the original left it, and the new
// text is drawn in page space right after the `ET` that closes the text
// object.

use std::collections::{BTreeMap, HashSet};

use satzwerk_core::types::{Color, Matrix};

use crate::convert::reflow::PlacedText;
use crate::convert::runs::TextRun;
use crate::fonts::FontRegistry;
use crate::pdf::interpreter::{DecodedPage, OpRole, PositionedGlyph};
use crate::pdf::lexer::{fmt_num, hex_operand, name_operand};

/// Rewritten page content plus the runs that could not be placed.
#[derive(Debug, Clone, Default)]
pub struct EmitResult {
    pub content: Vec<u8>,
    /// `(run index, reason)` for runs left in their original form.
    pub rejected: Vec<(usize, String)>,
}

/// Something drawn in an anchor block.
enum Piece<'a> {
    Run(&'a PlacedText),
    Leftover(&'a PositionedGlyph),
}

/// Index of the `ET` closing the text object that contains op `index`, for
/// every op. `None` when the stream ends first.
fn anchors(page: &DecodedPage) -> Vec<Option<usize>> {
    let mut next = None;
    let mut out = vec![None; page.ops.len()];
    for (index, op) in page.ops.iter().enumerate().rev() {
        if matches!(op.role, OpRole::EndText { .. }) {
            next = Some(index);
        }
        out[index] = next;
    }
    out
}

fn anchor_ctm(page: &DecodedPage, anchor: Option<usize>) -> Matrix {
    match anchor.map(|i| &page.ops[i].role) {
        Some(OpRole::EndText { ctm }) => *ctm,
        _ => page.final_state.ctm,
    }
}

/// Rewrite `page` so each `(run index, placement)` replaces its run.
pub fn emit_page(
    page: &DecodedPage,
    runs: &[TextRun],
    placements: &[(usize, PlacedText)],
    fonts: &FontRegistry,
) -> EmitResult {
    let anchor_of = anchors(page);
    let mut rejected = Vec::new();
    let mut blocks: BTreeMap<Option<usize>, Vec<Piece<'_>>> = BTreeMap::new();
    let mut consumed_glyphs = HashSet::new();

    for (run_index, placed) in placements {
        let run = &runs[*run_index];
        let Some(&last) = run.glyphs.last() else {
            continue;
        };
        let anchor = anchor_of[page.glyphs[last].op_index];
        if anchor_ctm(page, anchor).invert().is_none() {
            rejected.push((*run_index, "singular transformation matrix".to_string()));
            continue;
        }
        consumed_glyphs.extend(run.glyphs.iter().copied());
        blocks.entry(anchor).or_default().push(Piece::Run(placed));
    }

    let consumed_ops: HashSet<usize> = consumed_glyphs
        .iter()
        .map(|&g| page.glyphs[g].op_index)
        .collect();

    // Untranslated glyphs sharing an operator with translated ones are
    // redrawn individually, in page order.
    for (index, glyph) in page.glyphs.iter().enumerate() {
        if consumed_ops.contains(&glyph.op_index) && !consumed_glyphs.contains(&index) {
            blocks
                .entry(anchor_of[glyph.op_index])
                .or_default()
                .push(Piece::Leftover(glyph));
        }
    }

    let mut content = Vec::with_capacity(page.source.len() + 256 * blocks.len());
    let mut cursor = 0;
    for (index, op) in page.ops.iter().enumerate() {
        let span = op.raw.span.clone();
        content.extend_from_slice(&page.source[cursor..span.start]);
        if consumed_ops.contains(&index) {
            content.extend_from_slice(shim(page, index).as_bytes());
        } else {
            content.extend_from_slice(&page.source[span.clone()]);
        }
        cursor = span.end;

        if let Some(pieces) = blocks.get(&Some(index)) {
            write_block(&mut content, anchor_ctm(page, Some(index)), pieces, fonts);
        }
    }
    content.extend_from_slice(&page.source[cursor..]);

    if let Some(pieces) = blocks.get(&None) {
        if page.unterminated_text {
            content.extend_from_slice(b"\nET");
        }
        write_block(&mut content, page.final_state.ctm, pieces, fonts);
    }

    EmitResult { content, rejected }
}

/// Replacement for a consumed text-showing operator: same cursor movement,
/// no painting.
fn shim(page: &DecodedPage, index: usize) -> String {
    let op = &page.ops[index];
    let OpRole::ShowText {
        glyphs,
        advance,
        font_size,
        horizontal_scaling,
    } = &op.role
    else {
        return String::from_utf8_lossy(page.op_bytes(index)).into_owned();
    };

    let scale = font_size * horizontal_scaling;
    if scale.abs() < 1e-9 {
        // The operator moves nothing, so hide it instead.
        let mode = page.glyphs.get(glyphs.start).map_or(0, |g| g.render_mode);
        return format!(
            "3 Tr {} {mode} Tr",
            String::from_utf8_lossy(page.op_bytes(index))
        );
    }

    let shift = format!("[{}] TJ", fmt_num(-advance * 1000.0 / scale));
    match op.raw.operator.as_str() {
        "'" => format!("T* {shift}"),
        "\"" => format!(
            "{} Tw {} Tc T* {shift}",
            fmt_num(op.raw.number(0).unwrap_or(0.0)),
            fmt_num(op.raw.number(1).unwrap_or(0.0)),
        ),
        _ => shift,
    }
}

fn color_op(color: Color) -> String {
    match color {
        Color::Gray(g) => format!("{} g", fmt_num(g)),
        Color::Rgb(r, g, b) => format!("{} {} {} rg", fmt_num(r), fmt_num(g), fmt_num(b)),
        Color::Cmyk(c, m, y, k) => {
            format!("{} {} {} {} k", fmt_num(c), fmt_num(m), fmt_num(y), fmt_num(k))
        }
        Color::Other => "0 g".to_string(),
    }
}

fn matrix_operands(m: &Matrix) -> String {
    m.as_array().iter().map(|v| fmt_num(*v)).collect::<Vec<_>>().join(" ")
}

/// Append `q <inverse ctm> cm ... Q` so the pieces are drawn in page space.
fn write_block(out: &mut Vec<u8>, ctm: Matrix, pieces: &[Piece<'_>], fonts: &FontRegistry) {
    let Some(inverse) = ctm.invert() else {
        return;
    };
    out.extend_from_slice(format!("\nq {} cm\n", matrix_operands(&inverse)).as_bytes());
    for piece in pieces {
        let line = match piece {
            Piece::Run(placed) => format!(
                "BT {} {} Tf 0 Tc 0 Tw 100 Tz 0 Ts {} Tr {} 1 0 0 1 {} {} Tm {} Tj ET\n",
                name_operand(placed.font.resource_name()),
                fmt_num(placed.size),
                placed.render_mode,
                color_op(placed.color),
                fmt_num(placed.x),
                fmt_num(placed.baseline_y),
                hex_operand(&fonts.encode(placed.font, &placed.text)),
            ),
            Piece::Leftover(glyph) => format!(
                "BT {} 1 Tf 0 Tc 0 Tw 100 Tz 0 Ts {} Tr {} {} Tm {} Tj ET\n",
                name_operand(&glyph.font_id),
                glyph.render_mode,
                color_op(glyph.color),
                matrix_operands(&glyph.transform),
                hex_operand(&glyph.code),
            ),
        };
        out.extend_from_slice(line.as_bytes());
    }
    out.extend_from_slice(b"Q\n");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::protect::ProtectionRules;
    use crate::convert::runs::assemble_runs;
    use crate::fonts::FontKey;
    use crate::pdf::font::FontTable;
    use crate::pdf::interpreter::ContentStreamInterpreter;

    fn decode(src: &[u8]) -> DecodedPage {
        let fonts = FontTable::default();
        ContentStreamInterpreter::new(&fonts).decode(src).unwrap()
    }

    fn place(run: &TextRun, text: &str) -> PlacedText {
        PlacedText {
            font: FontKey::Helvetica,
            text: text.to_string(),
            size: run.em,
            x: run.x,
            baseline_y: run.baseline_y,
            color: run.color,
            render_mode: run.render_mode,
        }
    }

    fn registry() -> FontRegistry {
        FontRegistry::new("de", None)
    }

    #[test]
    fn untouched_bytes_are_preserved_and_cursor_kept() {
        let src = b"q 1 0 0 1 10 10 cm BT /F1 10 Tf 0 0 Td (Hello) Tj ET Q 0 0 m 10 10 l S";
        let page = decode(src);
        let runs = assemble_runs(&page, &[], &ProtectionRules::default());
        let out = emit_page(&page, &runs, &[(0, place(&runs[0], "Hallo"))], &registry());
        assert!(out.rejected.is_empty());

        let text = String::from_utf8(out.content.clone()).unwrap();
        assert!(text.starts_with("q 1 0 0 1 10 10 cm BT /F1 10 Tf 0 0 Td [-2278] TJ ET"));
        assert!(text.ends_with("Q\n Q 0 0 m 10 10 l S"));
        assert!(text.contains("\nq 1 0 0 1 -10 -10 cm\nBT /SzHelv 10 Tf"));
        assert!(text.contains("1 0 0 1 10 10 Tm <48616C6C6F> Tj ET"));

        // The replacement draws exactly the translation, where the
        // original started.
        let again = decode(&out.content);
        let drawn: String = again.glyphs.iter().map(|g| g.text.as_str()).collect();
        assert_eq!(drawn, "Hallo");
        assert!((again.glyphs[0].position.x - 10.0).abs() < 1e-9);
        assert!((again.glyphs[0].position.y - 10.0).abs() < 1e-9);
    }

    #[test]
    fn leftover_glyphs_are_redrawn_in_place() {
        let page = decode(b"BT /F1 10 Tf 0 0 Td (ab) Tj ET");
        let rules = ProtectionRules::new("", "b").unwrap();
        let runs = assemble_runs(&page, &[], &rules);
        assert_eq!(runs.len(), 1);
        let out = emit_page(&page, &runs, &[(0, place(&runs[0], "x"))], &registry());

        let again = decode(&out.content);
        let b = again.glyphs.iter().find(|g| g.text == "b").unwrap();
        assert!((b.position.x - 5.56).abs() < 1e-6);
        assert!(b.position.y.abs() < 1e-9);
        assert!((b.em() - 10.0).abs() < 1e-9);
        assert!(again.glyphs.iter().all(|g| g.text != "a"));
    }

    #[test]
    fn singular_ctm_leaves_page_unchanged() {
        let src = b"q 0 0 0 0 0 0 cm BT /F1 10 Tf (ab) Tj ET Q";
        let page = decode(src);
        let runs = assemble_runs(&page, &[], &ProtectionRules::default());
        let placed: Vec<_> = runs.iter().enumerate().map(|(i, r)| (i, place(r, "x"))).collect();
        let out = emit_page(&page, &runs, &placed, &registry());
        assert_eq!(out.content, src);
        assert_eq!(out.rejected.len(), runs.len());
        assert!(out.rejected.iter().all(|(_, why)| why.contains("singular")));
    }

    #[test]
    fn unterminated_text_object_is_closed() {
        let page = decode(b"BT /F1 10 Tf 5 5 Td (Hi) Tj");
        let runs = assemble_runs(&page, &[], &ProtectionRules::default());
        let out = emit_page(&page, &runs, &[(0, place(&runs[0], "Yo"))], &registry());
        let text = String::from_utf8(out.content).unwrap();
        assert!(text.starts_with("BT /F1 10 Tf 5 5 Td [-944] TJ\nET\nq 1 0 0 1 0 0 cm\n"));
        assert!(text.ends_with("Q\n"));
    }

    #[test]
    fn quote_operators_keep_line_movement() {
        let page = decode(b"BT /F1 10 Tf 12 TL 0 100 Td (ab) ' 1 2 (cd) \" ET");
        let runs = assemble_runs(&page, &[], &ProtectionRules::default());
        let placed: Vec<_> = runs.iter().enumerate().map(|(i, r)| (i, place(r, "z"))).collect();
        let out = emit_page(&page, &runs, &placed, &registry());
        let text = String::from_utf8(out.content).unwrap();
        assert!(text.contains("T* [-1112] TJ"));
        assert!(text.contains("1 Tw 2 Tc T* ["));
    }
}
