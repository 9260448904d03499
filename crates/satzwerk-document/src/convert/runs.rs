// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Region assignment, the protection filter, and text-run assembly.

use satzwerk_core::types::{BBox, Color, LayoutRegion, Point, RegionCategory};

use crate::convert::protect::ProtectionRules;
use crate::pdf::interpreter::{DecodedPage, PositionedGlyph};

/// Baselines further apart than this (in em) start a new run.
const BASELINE_TOLERANCE_EM: f64 = 0.5;
/// Horizontal gaps of at least this many em start a new run.
const MAX_GAP_EM: f64 = 3.0;
/// Gaps wider than this many em read as a word break.
const SPACE_GAP_EM: f64 = 0.25;
/// A glyph starting this far (in em) left of the previous glyph's end is a
/// backward jump.
const BACKWARD_SLACK_EM: f64 = 0.5;
/// The bounding point sits this far above the baseline.
const BOUNDING_POINT_RISE_EM: f64 = 0.3;

/// The region a glyph belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionRef {
    /// Index into the page's detected regions.
    Detected(usize),
    /// No detected region contains the glyph: the implicit whole-page Text
    /// region.
    Page,
}

/// Per-glyph outcome of region assignment and the protection filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlyphClass {
    pub region: RegionRef,
    pub protected: bool,
}

/// Point used for region lookup: horizontal middle, slightly above the
/// baseline.
pub fn bounding_point(glyph: &PositionedGlyph) -> Point {
    Point::new(
        glyph.position.x + glyph.advance / 2.0,
        glyph.position.y + BOUNDING_POINT_RISE_EM * glyph.em(),
    )
}

/// Region containing `point`. Any non-Text region outranks every Text
/// region; within the same rank the highest confidence wins and the earlier
/// region wins a tie.
pub fn assign_region(point: Point, regions: &[LayoutRegion]) -> RegionRef {
    let mut best: Option<(usize, bool, f32)> = None;
    for (index, region) in regions.iter().enumerate() {
        if !region.bbox.contains(point) {
            continue;
        }
        let shields = region.category != RegionCategory::Text;
        let better = best.is_none_or(|(_, best_shields, conf)| {
            (shields && !best_shields) || (shields == best_shields && region.confidence > conf)
        });
        if better {
            best = Some((index, shields, region.confidence));
        }
    }
    best.map_or(RegionRef::Page, |(index, _, _)| RegionRef::Detected(index))
}

fn category(region: RegionRef, regions: &[LayoutRegion]) -> RegionCategory {
    match region {
        RegionRef::Detected(index) => regions[index].category,
        RegionRef::Page => RegionCategory::Text,
    }
}

/// Assign every glyph a region and decide whether it is protected: outside
/// a Text region, matching a protection pattern, without known text, or
/// drawn rotated.
pub fn classify(page: &DecodedPage, regions: &[LayoutRegion], rules: &ProtectionRules) -> Vec<GlyphClass> {
    page.glyphs
        .iter()
        .map(|glyph| {
            let region = assign_region(bounding_point(glyph), regions);
            let protected = !category(region, regions).is_translatable()
                || rules.font_protected(&glyph.font_name)
                || glyph.text.is_empty()
                || rules.char_protected(&glyph.text)
                || glyph.is_rotated();
            GlyphClass { region, protected }
        })
        .collect()
}

/// Consecutive translatable glyphs sharing a region and a line.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    /// Indices into [`DecodedPage::glyphs`], in page order.
    pub glyphs: Vec<usize>,
    pub region: RegionRef,
    pub origin_text: String,
    pub bbox: BBox,
    pub baseline_y: f64,
    /// Left edge of the first glyph.
    pub x: f64,
    /// Em size of the first glyph.
    pub em: f64,
    pub font_name: String,
    pub color: Color,
    pub render_mode: i64,
}

impl TextRun {
    fn start(index: usize, glyph: &PositionedGlyph, region: RegionRef) -> Self {
        Self {
            glyphs: vec![index],
            region,
            origin_text: glyph.text.clone(),
            bbox: glyph_box(glyph),
            baseline_y: glyph.position.y,
            x: glyph.position.x,
            em: glyph.em(),
            font_name: glyph.font_name.clone(),
            color: glyph.color,
            render_mode: glyph.render_mode,
        }
    }

    /// Original width available to the translation.
    pub fn width(&self) -> f64 {
        self.bbox.width()
    }

    /// Whether the run has anything worth translating.
    pub fn has_alphabetic(&self) -> bool {
        self.origin_text.chars().any(char::is_alphabetic)
    }
}

fn glyph_box(glyph: &PositionedGlyph) -> BBox {
    let em = glyph.em();
    BBox::new(
        glyph.position.x,
        glyph.position.y - 0.2 * em,
        glyph.position.x + glyph.advance,
        glyph.position.y + 0.8 * em,
    )
}

enum AssemblerState {
    Idle,
    Scanning { run: TextRun, last: usize },
    Done,
}

/// Builds runs from glyphs fed in page order. `Scanning` accumulates the
/// current run; a break or the end of input flushes it back to `Idle`.
pub struct RunAssembler<'a> {
    glyphs: &'a [PositionedGlyph],
    state: AssemblerState,
    runs: Vec<TextRun>,
}

impl<'a> RunAssembler<'a> {
    pub fn new(glyphs: &'a [PositionedGlyph]) -> Self {
        Self {
            glyphs,
            state: AssemblerState::Idle,
            runs: Vec::new(),
        }
    }

    /// Feed glyph `index`; protected glyphs end the current run.
    pub fn push(&mut self, index: usize, class: GlyphClass) {
        if class.protected {
            self.flush();
            return;
        }
        let glyphs = self.glyphs;
        let glyph = &glyphs[index];
        match std::mem::replace(&mut self.state, AssemblerState::Idle) {
            AssemblerState::Scanning { mut run, last } if run.region == class.region => {
                match continuation(&glyphs[last], glyph) {
                    Some(word_break) => {
                        if word_break
                            && !run.origin_text.ends_with(char::is_whitespace)
                            && !glyph.text.starts_with(char::is_whitespace)
                        {
                            run.origin_text.push(' ');
                        }
                        run.origin_text.push_str(&glyph.text);
                        run.bbox = run.bbox.union(&glyph_box(glyph));
                        run.glyphs.push(index);
                        self.state = AssemblerState::Scanning { run, last: index };
                    }
                    None => {
                        self.state = AssemblerState::Scanning { run, last };
                        self.flush();
                        self.begin(index, class.region);
                    }
                }
            }
            AssemblerState::Scanning { run, last } => {
                self.state = AssemblerState::Scanning { run, last };
                self.flush();
                self.begin(index, class.region);
            }
            AssemblerState::Idle => self.begin(index, class.region),
            AssemblerState::Done => self.state = AssemblerState::Done,
        }
    }

    fn begin(&mut self, index: usize, region: RegionRef) {
        let glyphs = self.glyphs;
        let glyph = &glyphs[index];
        // Whitespace never starts a run.
        if glyph.text.trim().is_empty() {
            return;
        }
        self.state = AssemblerState::Scanning {
            run: TextRun::start(index, glyph, region),
            last: index,
        };
    }

    /// Close the current run, if any.
    pub fn flush(&mut self) {
        if let AssemblerState::Scanning { mut run, .. } =
            std::mem::replace(&mut self.state, AssemblerState::Idle)
        {
            // Trailing whitespace glyphs stay with the original content.
            let glyphs = self.glyphs;
            while let Some(&last) = run.glyphs.last() {
                if !glyphs[last].text.trim().is_empty() {
                    break;
                }
                run.glyphs.pop();
            }
            run.origin_text = run.origin_text.trim_end().to_string();
            if let (Some(&first), Some(&last)) = (run.glyphs.first(), run.glyphs.last()) {
                let (a, b) = (&glyphs[first], &glyphs[last]);
                run.bbox.x0 = a.position.x;
                run.bbox.x1 = run.bbox.x1.min(b.position.x + b.advance).max(a.position.x);
                self.runs.push(run);
            }
        }
    }

    pub fn finish(mut self) -> Vec<TextRun> {
        self.flush();
        self.state = AssemblerState::Done;
        self.runs
    }
}

/// Whether `next` continues the line of `prev`: `Some(word_break)` if so.
fn continuation(prev: &PositionedGlyph, next: &PositionedGlyph) -> Option<bool> {
    let em = prev.em().max(next.em()).max(f64::EPSILON);
    if (next.position.y - prev.position.y).abs() > BASELINE_TOLERANCE_EM * em {
        return None;
    }
    let prev_end = prev.position.x + prev.advance;
    let gap = next.position.x - prev_end;
    if gap >= MAX_GAP_EM * em || next.position.x + BACKWARD_SLACK_EM * em < prev_end {
        return None;
    }
    Some(gap > SPACE_GAP_EM * em)
}

/// Classify every glyph and assemble the page's runs.
pub fn assemble_runs(page: &DecodedPage, regions: &[LayoutRegion], rules: &ProtectionRules) -> Vec<TextRun> {
    let classes = classify(page, regions, rules);
    let mut assembler = RunAssembler::new(&page.glyphs);
    for (index, class) in classes.into_iter().enumerate() {
        assembler.push(index, class);
    }
    assembler.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::font::FontTable;
    use crate::pdf::interpreter::ContentStreamInterpreter;

    fn decode(src: &[u8]) -> DecodedPage {
        // No font resources: every font falls back to Helvetica metrics.
        let fonts = FontTable::default();
        ContentStreamInterpreter::new(&fonts).decode(src).unwrap()
    }

    fn region(x0: f64, y0: f64, x1: f64, y1: f64, category: RegionCategory, conf: f32) -> LayoutRegion {
        LayoutRegion::new(BBox::new(x0, y0, x1, y1), category, conf)
    }

    fn none() -> ProtectionRules {
        ProtectionRules::default()
    }

    #[test]
    fn overlap_prefers_confidence_then_order() {
        let p = Point::new(5.0, 5.0);
        let regions = vec![
            region(0.0, 0.0, 10.0, 10.0, RegionCategory::Text, 0.5),
            region(0.0, 0.0, 10.0, 10.0, RegionCategory::Table, 0.9),
            region(0.0, 0.0, 10.0, 10.0, RegionCategory::Image, 0.9),
        ];
        assert_eq!(assign_region(p, &regions), RegionRef::Detected(1));
        assert_eq!(assign_region(Point::new(50.0, 50.0), &regions), RegionRef::Page);
    }

    #[test]
    fn slight_overlap_stays_in_one_run() {
        let page = decode(b"BT /F1 10 Tf 72 700 Td (Hello) Tj 20 0 Td (world) Tj ET");
        let runs = assemble_runs(&page, &[], &none());
        assert_eq!(runs.len(), 1);
        // "Hello" is 22.78pt wide in Helvetica 10; "world" starts 2.78pt
        // before that, within half an em.
        assert_eq!(runs[0].glyphs.len(), 10);
        assert_eq!(runs[0].origin_text, "Helloworld");
        assert!((runs[0].x - 72.0).abs() < 1e-9);
        assert!((runs[0].baseline_y - 700.0).abs() < 1e-9);
        assert_eq!(runs[0].region, RegionRef::Page);
    }

    #[test]
    fn word_gap_inserts_a_space() {
        let page = decode(b"BT /F1 10 Tf 0 0 Td (ab) Tj 15 0 Td (cd) Tj ET");
        let runs = assemble_runs(&page, &[], &none());
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].origin_text, "ab cd");
    }

    #[test]
    fn new_line_and_large_gap_break_runs() {
        let page = decode(b"BT /F1 10 Tf 0 100 Td (ab) Tj 0 -20 Td (cd) Tj 100 0 Td (ef) Tj ET");
        let runs = assemble_runs(&page, &[], &none());
        let texts: Vec<&str> = runs.iter().map(|r| r.origin_text.as_str()).collect();
        assert_eq!(texts, ["ab", "cd", "ef"]);
    }

    #[test]
    fn backward_jump_breaks_run() {
        let page = decode(b"BT /F1 10 Tf 100 0 Td (ab) Tj -50 0 Td (cd) Tj ET");
        let runs = assemble_runs(&page, &[], &none());
        assert_eq!(runs.len(), 2);
    }

    #[test]
    fn protected_regions_and_patterns_are_excluded() {
        let page = decode(b"BT /F1 10 Tf 0 0 Td (ab) Tj 0 100 Td (cd) Tj ET");
        // The second line sits inside a formula region.
        let regions = vec![region(-5.0, 90.0, 100.0, 120.0, RegionCategory::Formula, 0.9)];
        let runs = assemble_runs(&page, &regions, &none());
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].origin_text, "ab");

        let classes = classify(&page, &regions, &none());
        assert!(classes[2].protected && classes[3].protected);

        let rules = ProtectionRules::new("", "b").unwrap();
        let runs = assemble_runs(&page, &[], &rules);
        let texts: Vec<&str> = runs.iter().map(|r| r.origin_text.as_str()).collect();
        assert_eq!(texts, ["a", "cd"]);

        let rules = ProtectionRules::new("Helv", "").unwrap();
        assert!(assemble_runs(&page, &[], &rules).is_empty());
    }

    #[test]
    fn nested_formula_outranks_enclosing_text() {
        let regions = vec![
            region(0.0, 0.0, 500.0, 500.0, RegionCategory::Text, 0.95),
            region(90.0, 90.0, 120.0, 120.0, RegionCategory::Formula, 0.6),
        ];
        assert_eq!(assign_region(Point::new(100.0, 100.0), &regions), RegionRef::Detected(1));
        assert_eq!(assign_region(Point::new(300.0, 300.0), &regions), RegionRef::Detected(0));

        // Only the line outside the formula box is translatable.
        let page = decode(b"BT /F1 10 Tf 10 10 Td (ab) Tj 85 90 Td (cd) Tj ET");
        let runs = assemble_runs(&page, &regions, &none());
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].origin_text, "ab");
        assert_eq!(runs[0].region, RegionRef::Detected(0));
    }

    #[test]
    fn title_regions_are_protected() {
        let page = decode(b"BT /F1 18 Tf 10 700 Td (Intro) Tj ET");
        let regions = vec![region(0.0, 690.0, 300.0, 730.0, RegionCategory::Title, 0.9)];
        assert!(classify(&page, &regions, &none()).iter().all(|c| c.protected));
        assert!(assemble_runs(&page, &regions, &none()).is_empty());
    }

    #[test]
    fn region_change_breaks_run() {
        let page = decode(b"BT /F1 10 Tf 0 0 Td (abcd) Tj ET");
        // Split the line between two text regions at x = 11.
        let regions = vec![
            region(-1.0, -5.0, 11.0, 20.0, RegionCategory::Text, 0.8),
            region(11.0, -5.0, 100.0, 20.0, RegionCategory::Text, 0.7),
        ];
        let runs = assemble_runs(&page, &regions, &none());
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].region, RegionRef::Detected(0));
        assert_eq!(runs[1].region, RegionRef::Detected(1));
    }

    #[test]
    fn rotated_glyphs_are_protected() {
        let page = decode(b"BT /F1 10 Tf 0 1 -1 0 100 100 Tm (ab) Tj ET");
        assert!(classify(&page, &[], &none()).iter().all(|c| c.protected));
    }

    #[test]
    fn whitespace_is_trimmed_from_run_edges() {
        let page = decode(b"BT /F1 10 Tf 0 0 Td ( ab ) Tj ET");
        let runs = assemble_runs(&page, &[], &none());
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].origin_text, "ab");
        assert_eq!(runs[0].glyphs, vec![1, 2]);
        // Helvetica a + b at 10pt.
        assert!((runs[0].width() - 11.12).abs() < 1e-6);
    }

    #[test]
    fn runs_without_letters_are_flagged() {
        let page = decode(b"BT /F1 10 Tf 0 0 Td (12.5) Tj ET");
        let runs = assemble_runs(&page, &[], &none());
        assert!(!runs[0].has_alphabetic());
    }
}
