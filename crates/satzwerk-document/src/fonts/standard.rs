// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Standard (Base-14) fonts: metrics and WinAnsiEncoding.
//
// Widths are the AFM advance widths in 1/1000 em for printable ASCII.
// Characters outside that range use the family's average lower-case width.

use serde::{Deserialize, Serialize};

/// Helvetica, chars 32..=126.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // 32-47
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // 48-63
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // 64-79
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // 80-95
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // 96-111
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // 112-126
];

/// Times-Roman, chars 32..=126.
const TIMES_WIDTHS: [u16; 95] = [
    250, 333, 408, 500, 500, 833, 778, 180, 333, 333, 500, 564, 250, 333, 250, 278, // 32-47
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 278, 278, 564, 564, 564, 444, // 48-63
    921, 722, 667, 667, 722, 611, 556, 722, 722, 333, 389, 722, 611, 889, 722, 722, // 64-79
    556, 722, 667, 556, 611, 722, 722, 944, 722, 722, 611, 333, 278, 333, 469, 500, // 80-95
    333, 444, 500, 444, 500, 444, 333, 500, 500, 278, 278, 500, 278, 778, 500, 500, // 96-111
    500, 500, 333, 389, 278, 500, 500, 722, 500, 500, 444, 480, 200, 480, 541, // 112-126
];

const COURIER_WIDTH: u16 = 600;

/// WinAnsiEncoding codes 0x80..=0x9F (`None` = undefined).
const WINANSI_HIGH: [Option<char>; 32] = [
    Some('€'), None, Some('‚'), Some('ƒ'), Some('„'), Some('…'), Some('†'), Some('‡'),
    Some('ˆ'), Some('‰'), Some('Š'), Some('‹'), Some('Œ'), None, Some('Ž'), None,
    None, Some('‘'), Some('’'), Some('“'), Some('”'), Some('•'), Some('–'), Some('—'),
    Some('˜'), Some('™'), Some('š'), Some('›'), Some('œ'), None, Some('ž'), Some('Ÿ'),
];

/// The three non-embedded Latin families used for output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StandardFont {
    Helvetica,
    Times,
    Courier,
}

impl StandardFont {
    /// PDF `/BaseFont` name.
    pub fn base_font(&self) -> &'static str {
        match self {
            Self::Helvetica => "Helvetica",
            Self::Times => "Times-Roman",
            Self::Courier => "Courier",
        }
    }

    /// Closest family for a source font name.
    pub fn for_source_name(name: &str) -> Self {
        let lower = name.to_ascii_lowercase();
        if ["courier", "mono", "code", "consol", "cmtt"]
            .iter()
            .any(|k| lower.contains(k))
        {
            Self::Courier
        } else if lower.contains("sans") || lower.contains("helvet") || lower.contains("arial") {
            Self::Helvetica
        } else if [
            "times", "serif", "roman", "georgia", "garamond", "minion", "cmr", "palatino", "book",
        ]
        .iter()
        .any(|k| lower.contains(k))
        {
            Self::Times
        } else {
            Self::Helvetica
        }
    }

    /// Built-in metrics for a Base-14 font name, if it is one (or a common
    /// metric-compatible alias).
    pub fn from_base_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        if lower.starts_with("helvetica") || lower.starts_with("arial") {
            Some(Self::Helvetica)
        } else if lower.starts_with("times") {
            Some(Self::Times)
        } else if lower.starts_with("courier") {
            Some(Self::Courier)
        } else {
            None
        }
    }

    /// Advance width in 1/1000 em.
    pub fn width(&self, ch: char) -> u16 {
        let code = ch as u32;
        match self {
            Self::Courier => COURIER_WIDTH,
            Self::Helvetica => ascii_width(&HELVETICA_WIDTHS, code).unwrap_or(556),
            Self::Times => ascii_width(&TIMES_WIDTHS, code).unwrap_or(500),
        }
    }

    /// Width of `text` in text-space units at `size`.
    pub fn measure(&self, text: &str, size: f64) -> f64 {
        text.chars().map(|ch| f64::from(self.width(ch))).sum::<f64>() * size / 1000.0
    }
}

fn ascii_width(table: &[u16; 95], code: u32) -> Option<u16> {
    if (32..=126).contains(&code) {
        Some(table[(code - 32) as usize])
    } else {
        None
    }
}

/// Decode one WinAnsiEncoding byte.
pub fn winansi_to_char(code: u8) -> Option<char> {
    match code {
        0x20..=0x7e | 0xa0..=0xff => Some(code as char),
        0x80..=0x9f => WINANSI_HIGH[(code - 0x80) as usize],
        b'\t' | b'\n' | b'\r' => Some(code as char),
        _ => None,
    }
}

/// Encode one character in WinAnsiEncoding.
pub fn char_to_winansi(ch: char) -> Option<u8> {
    let code = ch as u32;
    match code {
        0x20..=0x7e | 0xa0..=0xff => Some(code as u8),
        _ => WINANSI_HIGH
            .iter()
            .position(|&c| c == Some(ch))
            .map(|i| 0x80 + i as u8),
    }
}

/// Whether every character of `text` has a WinAnsi code.
pub fn winansi_encodable(text: &str) -> bool {
    text.chars().all(|ch| char_to_winansi(ch).is_some())
}
