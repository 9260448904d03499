// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unicode-capable output fonts: an embedded TrueType file measured with
// `fontdue`, or one of the Adobe CJK fonts every conforming viewer provides.

use std::fmt;
use std::path::Path;

use fontdue::{Font, FontSettings};
use tracing::{info, instrument};

use satzwerk_core::error::{Result, SatzwerkError};

/// A TrueType font to embed as `FontFile2`.
pub struct EmbeddedFont {
    name: String,
    data: Vec<u8>,
    font: Font,
}

impl fmt::Debug for EmbeddedFont {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbeddedFont")
            .field("name", &self.name)
            .field("bytes", &self.data.len())
            .finish_non_exhaustive()
    }
}

impl EmbeddedFont {
    /// Load a `.ttf` file. Collections and CFF-flavoured OpenType cannot go
    /// into `FontFile2` and are rejected.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading CJK font: {}", path.display());
        let data = std::fs::read(path)
            .map_err(|e| SatzwerkError::Font(format!("cannot read {}: {e}", path.display())))?;
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::from_bytes(&stem, data)
    }

    pub fn from_bytes(name: &str, data: Vec<u8>) -> Result<Self> {
        match data.get(..4) {
            Some([0x00, 0x01, 0x00, 0x00]) | Some(b"true") => {}
            Some(b"ttcf") => {
                return Err(SatzwerkError::Font(
                    "TrueType collections (.ttc) cannot be embedded; extract one face first".into(),
                ));
            }
            Some(b"OTTO") => {
                return Err(SatzwerkError::Font(
                    "CFF-based OpenType fonts cannot be embedded as TrueType".into(),
                ));
            }
            _ => return Err(SatzwerkError::Font("not a TrueType font file".into())),
        }

        let font = Font::from_bytes(data.as_slice(), FontSettings::default())
            .map_err(|e| SatzwerkError::Font(format!("cannot parse font: {e}")))?;

        Ok(Self {
            name: pdf_font_name(name),
            data,
            font,
        })
    }

    /// Name for `/BaseFont`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raw font program.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Advance width in 1/1000 em.
    pub fn width(&self, ch: char) -> u16 {
        self.font.metrics(ch, 1000.0).advance_width.round().max(0.0) as u16
    }

    pub fn glyph_index(&self, ch: char) -> u16 {
        self.font.lookup_glyph_index(ch)
    }

    pub fn has_glyph(&self, ch: char) -> bool {
        self.glyph_index(ch) != 0
    }
}

/// Keep only characters that are safe in a PDF name.
fn pdf_font_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
            out.push(ch);
        } else if ch.is_whitespace() {
            out.push('-');
        }
    }
    if out.is_empty() { "CJKFont".to_string() } else { out }
}

/// Non-embedded CJK fonts with predefined UCS-2 CMaps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdobeCjkFont {
    SimplifiedChinese,
    TraditionalChinese,
    Japanese,
    Korean,
}

impl AdobeCjkFont {
    /// Font for a target language; languages that are not CJK get the
    /// Simplified Chinese font, which also covers Latin, Greek and Cyrillic.
    pub fn for_language(lang: &str) -> Self {
        let lower = lang.to_ascii_lowercase();
        if lower.starts_with("ja") {
            Self::Japanese
        } else if lower.starts_with("ko") {
            Self::Korean
        } else if lower.starts_with("zh")
            && (lower.contains("tw") || lower.contains("hk") || lower.contains("hant"))
        {
            Self::TraditionalChinese
        } else {
            Self::SimplifiedChinese
        }
    }

    pub fn base_font(&self) -> &'static str {
        match self {
            Self::SimplifiedChinese => "STSong-Light",
            Self::TraditionalChinese => "MSung-Light",
            Self::Japanese => "KozMinPr6N-Regular",
            Self::Korean => "HYSMyeongJo-Medium",
        }
    }

    /// Predefined CMap mapping UCS-2 codes to CIDs.
    pub fn encoding(&self) -> &'static str {
        match self {
            Self::SimplifiedChinese => "UniGB-UCS2-H",
            Self::TraditionalChinese => "UniCNS-UCS2-H",
            Self::Japanese => "UniJIS-UCS2-H",
            Self::Korean => "UniKS-UCS2-H",
        }
    }

    /// `(Ordering, Supplement)` of the character collection.
    pub fn collection(&self) -> (&'static str, i64) {
        match self {
            Self::SimplifiedChinese => ("GB1", 4),
            Self::TraditionalChinese => ("CNS1", 3),
            Self::Japanese => ("Japan1", 6),
            Self::Korean => ("Korea1", 2),
        }
    }

    /// Half-width for printable ASCII (CIDs 1..=95 in every collection), full
    /// width otherwise.
    pub fn width(&self, ch: char) -> u16 {
        if (' '..='~').contains(&ch) { 500 } else { 1000 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adobe_font_by_language() {
        assert_eq!(AdobeCjkFont::for_language("zh-CN").base_font(), "STSong-Light");
        assert_eq!(AdobeCjkFont::for_language("zh-TW"), AdobeCjkFont::TraditionalChinese);
        assert_eq!(AdobeCjkFont::for_language("ja").encoding(), "UniJIS-UCS2-H");
        assert_eq!(AdobeCjkFont::for_language("ko").collection().0, "Korea1");
        assert_eq!(AdobeCjkFont::for_language("ru"), AdobeCjkFont::SimplifiedChinese);
    }

    #[test]
    fn adobe_widths() {
        let font = AdobeCjkFont::SimplifiedChinese;
        assert_eq!(font.width('a'), 500);
        assert_eq!(font.width('中'), 1000);
    }

    #[test]
    fn rejects_non_truetype_data() {
        assert!(matches!(
            EmbeddedFont::from_bytes("x", b"ttcf\0\0\0\0".to_vec()),
            Err(SatzwerkError::Font(_))
        ));
        assert!(matches!(
            EmbeddedFont::from_bytes("x", b"OTTO".to_vec()),
            Err(SatzwerkError::Font(_))
        ));
        assert!(EmbeddedFont::from_bytes("x", Vec::new()).is_err());
    }

    #[test]
    fn missing_file_is_a_font_error() {
        assert!(matches!(
            EmbeddedFont::load("/nonexistent/font.ttf"),
            Err(SatzwerkError::Font(_))
        ));
    }

    #[test]
    fn font_names_are_sanitised() {
        assert_eq!(pdf_font_name("Noto Sans CJK"), "Noto-Sans-CJK");
        assert_eq!(pdf_font_name("(☃)"), "CJKFont");
    }
}
