// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Fitting translated text into the space of the run it replaces.

use satzwerk_core::types::Color;

use crate::convert::runs::TextRun;
use crate::fonts::FontKey;

/// Font size at which text measuring `measured` points (at `size`) fits in
/// `available` points. Never larger than `size`; `None` when there is no
/// room at all.
pub fn fit_font_size(measured: f64, size: f64, available: f64) -> Option<f64> {
    if available <= 0.0 || !available.is_finite() {
        return None;
    }
    if measured <= 0.0 || !measured.is_finite() {
        return Some(size);
    }
    let scale = (available / measured).min(1.0);
    Some(size * scale)
}

/// Where and how a translated run is drawn.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedText {
    pub font: FontKey,
    pub text: String,
    pub size: f64,
    pub x: f64,
    pub baseline_y: f64,
    pub color: Color,
    pub render_mode: i64,
}

impl PlacedText {
    /// Place `text` on the run's baseline at its left edge, shrunk so that
    /// `measure(text, size)` fits the run's width. `None` for a run with no
    /// width to fill.
    pub fn for_run(
        run: &TextRun,
        font: FontKey,
        text: String,
        measure: impl Fn(&str, f64) -> f64,
    ) -> Option<Self> {
        let size = fit_font_size(measure(&text, run.em), run.em, run.width())?;
        Some(Self {
            font,
            text,
            size,
            x: run.x,
            baseline_y: run.baseline_y,
            color: run.color,
            render_mode: run.render_mode,
        })
    }
}

/// Collapse runs of whitespace to single spaces and trim the ends.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shrinks_only_when_needed() {
        assert_eq!(fit_font_size(50.0, 10.0, 100.0), Some(10.0));
        assert_eq!(fit_font_size(200.0, 10.0, 100.0), Some(5.0));
        assert_eq!(fit_font_size(0.0, 10.0, 100.0), Some(10.0));
    }

    #[test]
    fn no_room_means_no_size() {
        assert_eq!(fit_font_size(50.0, 10.0, 0.0), None);
        assert_eq!(fit_font_size(50.0, 10.0, -3.0), None);
        assert_eq!(fit_font_size(50.0, 10.0, f64::NAN), None);
    }

    #[test]
    fn fitted_text_never_exceeds_available_width() {
        for (measured, available) in [(120.0, 100.0), (1000.0, 3.0), (99.9, 100.0)] {
            let size = fit_font_size(measured, 12.0, available).unwrap();
            // Width scales linearly with size.
            assert!(measured * size / 12.0 <= available + 1e-9);
        }
    }

    #[test]
    fn whitespace_is_collapsed() {
        assert_eq!(normalize_whitespace("  Hallo \n\t Welt  "), "Hallo Welt");
        assert_eq!(normalize_whitespace("   "), "");
    }
}
