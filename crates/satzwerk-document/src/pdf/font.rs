// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Source fonts: turning the bytes of a text-showing operand into characters
// with their Unicode text and advance widths.
//
// Simple fonts use 1-byte codes with /Widths and /Encoding (plus
// /Differences); Type0 fonts use 2-byte codes with /W and /DW. A /ToUnicode
// CMap, when present, wins over everything else for the text.

use std::collections::HashMap;
use std::sync::Arc;

use lopdf::{Dictionary, Document, Object};
use tracing::{debug, warn};

use satzwerk_core::error::{Result, SatzwerkError};

use crate::fonts::standard::{StandardFont, winansi_to_char};
use crate::pdf::lexer::{as_number, tokenize};
use crate::pdf::reader::{resolve, stream_bytes};

/// One character code from a shown string.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedChar {
    pub code: u32,
    /// The raw code bytes as they appeared in the string.
    pub bytes: Vec<u8>,
    /// Unicode text; empty when the font gives no way to recover it.
    pub text: String,
    /// Horizontal advance in text space per unit of font size.
    pub width: f64,
    /// Single-byte code 32, which word spacing (`Tw`) applies to.
    pub is_space: bool,
}

#[derive(Debug, Clone)]
enum Widths {
    Simple {
        first_char: u32,
        widths: Vec<f64>,
        missing: f64,
    },
    Cid {
        widths: HashMap<u32, f64>,
        default: f64,
    },
    Standard(StandardFont),
}

/// A font resource of the page being decoded.
#[derive(Debug, Clone)]
pub struct SourceFont {
    resource_name: Vec<u8>,
    base_name: String,
    two_byte: bool,
    ucs2_codes: bool,
    symbolic: bool,
    widths: Widths,
    /// Glyph space to text space (0.001 except for Type3).
    glyph_scale: f64,
    encoding: Vec<Option<String>>,
    to_unicode: HashMap<u32, String>,
}

impl SourceFont {
    /// Font used when a resource is missing or unreadable: Helvetica metrics,
    /// WinAnsi text.
    pub fn fallback(resource_name: &[u8]) -> Self {
        Self {
            resource_name: resource_name.to_vec(),
            base_name: "Helvetica".into(),
            two_byte: false,
            ucs2_codes: false,
            symbolic: false,
            widths: Widths::Standard(StandardFont::Helvetica),
            glyph_scale: 0.001,
            encoding: winansi_table(),
            to_unicode: HashMap::new(),
        }
    }

    /// Build from a font dictionary.
    pub fn from_dict(doc: &Document, resource_name: &[u8], dict: &Dictionary) -> Result<Self> {
        let subtype = name_of(doc, dict, b"Subtype").unwrap_or_default();
        let raw_base = name_of(doc, dict, b"BaseFont").unwrap_or_default();
        let base_name = strip_subset_prefix(&raw_base).to_string();

        let to_unicode = match dict.get(b"ToUnicode").ok().and_then(|o| resolve(doc, o)) {
            Some(Object::Stream(stream)) => match stream_bytes(stream).and_then(|data| parse_to_unicode(&data)) {
                Ok(map) => map,
                Err(err) => {
                    warn!(font = %base_name, "Ignoring unreadable ToUnicode CMap: {err}");
                    HashMap::new()
                }
            },
            _ => HashMap::new(),
        };

        if subtype == "Type0" {
            return Self::type0(doc, resource_name, dict, base_name, to_unicode);
        }

        let glyph_scale = if subtype == "Type3" {
            dict.get(b"FontMatrix")
                .ok()
                .and_then(|o| resolve(doc, o))
                .and_then(|o| o.as_array().ok())
                .and_then(|arr| arr.first())
                .and_then(as_number)
                .unwrap_or(0.001)
        } else {
            0.001
        };

        let lower = base_name.to_ascii_lowercase();
        let symbolic = lower.contains("symbol") || lower.contains("dingbats");
        let standard = StandardFont::from_base_name(&base_name);

        let widths = match number_array(doc, dict, b"Widths") {
            Some(widths) if !widths.is_empty() => {
                let first_char = dict
                    .get(b"FirstChar")
                    .ok()
                    .and_then(|o| resolve(doc, o))
                    .and_then(as_number)
                    .unwrap_or(0.0) as u32;
                Widths::Simple {
                    first_char,
                    widths,
                    missing: missing_width(doc, dict),
                }
            }
            _ => Widths::Standard(standard.unwrap_or(StandardFont::Helvetica)),
        };

        let encoding = if symbolic {
            vec![None; 256]
        } else {
            simple_encoding(doc, dict)
        };

        debug!(font = %base_name, %subtype, "Loaded simple font");
        Ok(Self {
            resource_name: resource_name.to_vec(),
            base_name,
            two_byte: false,
            ucs2_codes: false,
            symbolic,
            widths,
            glyph_scale,
            encoding,
            to_unicode,
        })
    }

    fn type0(
        doc: &Document,
        resource_name: &[u8],
        dict: &Dictionary,
        base_name: String,
        to_unicode: HashMap<u32, String>,
    ) -> Result<Self> {
        let encoding_name = name_of(doc, dict, b"Encoding").unwrap_or_default();
        let descendant = dict
            .get(b"DescendantFonts")
            .ok()
            .and_then(|o| resolve(doc, o))
            .and_then(|o| o.as_array().ok())
            .and_then(|arr| arr.first())
            .and_then(|o| resolve(doc, o))
            .and_then(|o| o.as_dict().ok())
            .ok_or_else(|| SatzwerkError::Font(format!("Type0 font {base_name} has no descendant font")))?;

        let default = descendant
            .get(b"DW")
            .ok()
            .and_then(|o| resolve(doc, o))
            .and_then(as_number)
            .unwrap_or(1000.0);
        let widths = match descendant.get(b"W").ok().and_then(|o| resolve(doc, o)) {
            Some(Object::Array(items)) => parse_cid_widths(doc, items),
            _ => HashMap::new(),
        };

        debug!(font = %base_name, encoding = %encoding_name, "Loaded Type0 font");
        Ok(Self {
            resource_name: resource_name.to_vec(),
            base_name,
            two_byte: true,
            ucs2_codes: encoding_name.contains("UCS2") || encoding_name.contains("UTF16"),
            symbolic: false,
            widths: Widths::Cid { widths, default },
            glyph_scale: 0.001,
            encoding: Vec::new(),
            to_unicode,
        })
    }

    pub fn resource_name(&self) -> &[u8] {
        &self.resource_name
    }

    /// `/BaseFont` without a subset tag (`ABCDEF+`).
    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    pub fn is_two_byte(&self) -> bool {
        self.two_byte
    }

    /// Split shown-string bytes into characters.
    pub fn decode(&self, bytes: &[u8]) -> Vec<DecodedChar> {
        let step = if self.two_byte { 2 } else { 1 };
        bytes
            .chunks(step)
            .map(|chunk| {
                let code = chunk.iter().fold(0u32, |acc, &b| (acc << 8) | u32::from(b));
                let text = self.text_for(code);
                let width = self.width_for(code, &text) * self.glyph_scale;
                DecodedChar {
                    code,
                    bytes: chunk.to_vec(),
                    text,
                    width,
                    is_space: !self.two_byte && code == 32,
                }
            })
            .collect()
    }

    fn text_for(&self, code: u32) -> String {
        if let Some(text) = self.to_unicode.get(&code) {
            return text.clone();
        }
        if self.two_byte {
            if self.ucs2_codes
                && let Some(ch) = char::from_u32(code)
            {
                return ch.to_string();
            }
            return String::new();
        }
        if self.symbolic {
            return String::new();
        }
        self.encoding
            .get(code as usize)
            .cloned()
            .flatten()
            .unwrap_or_default()
    }

    /// Width in glyph space units.
    fn width_for(&self, code: u32, text: &str) -> f64 {
        match &self.widths {
            Widths::Simple {
                first_char,
                widths,
                missing,
            } => code
                .checked_sub(*first_char)
                .and_then(|i| widths.get(i as usize))
                .copied()
                .unwrap_or(*missing),
            Widths::Cid { widths, default } => widths.get(&code).copied().unwrap_or(*default),
            Widths::Standard(font) => {
                let ch = text.chars().next().unwrap_or(' ');
                f64::from(font.width(ch))
            }
        }
    }
}

/// The fonts of one page, keyed by resource name.
#[derive(Debug, Clone, Default)]
pub struct FontTable {
    fonts: HashMap<Vec<u8>, Arc<SourceFont>>,
}

impl FontTable {
    /// Load every entry of a resource dictionary's `/Font` subdictionary.
    /// Broken entries fall back to Helvetica metrics.
    pub fn from_resources(doc: &Document, resources: &Dictionary) -> Self {
        let mut fonts = HashMap::new();
        let Some(font_dict) = resources
            .get(b"Font")
            .ok()
            .and_then(|o| resolve(doc, o))
            .and_then(|o| o.as_dict().ok())
        else {
            return Self { fonts };
        };

        for (name, obj) in font_dict.iter() {
            let font = match resolve(doc, obj).and_then(|o| o.as_dict().ok()) {
                Some(dict) => SourceFont::from_dict(doc, name, dict).unwrap_or_else(|err| {
                    warn!(resource = %String::from_utf8_lossy(name), "Using fallback metrics: {err}");
                    SourceFont::fallback(name)
                }),
                None => {
                    warn!(resource = %String::from_utf8_lossy(name), "Font resource is not a dictionary");
                    SourceFont::fallback(name)
                }
            };
            fonts.insert(name.clone(), Arc::new(font));
        }
        Self { fonts }
    }

    pub fn insert(&mut self, font: SourceFont) {
        self.fonts.insert(font.resource_name.clone(), Arc::new(font));
    }

    /// The font for a resource name, or a fallback if the page lacks it.
    pub fn get(&self, name: &[u8]) -> Arc<SourceFont> {
        match self.fonts.get(name) {
            Some(font) => Arc::clone(font),
            None => {
                warn!(resource = %String::from_utf8_lossy(name), "Font not found in page resources");
                Arc::new(SourceFont::fallback(name))
            }
        }
    }

    pub fn len(&self) -> usize {
        self.fonts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }
}

// -- Dictionary helpers -------------------------------------------------------

fn name_of(doc: &Document, dict: &Dictionary, key: &[u8]) -> Option<String> {
    dict.get(key)
        .ok()
        .and_then(|o| resolve(doc, o))
        .and_then(|o| o.as_name().ok())
        .map(|n| String::from_utf8_lossy(n).into_owned())
}

fn number_array(doc: &Document, dict: &Dictionary, key: &[u8]) -> Option<Vec<f64>> {
    let arr = dict.get(key).ok().and_then(|o| resolve(doc, o))?.as_array().ok()?;
    Some(
        arr.iter()
            .map(|o| resolve(doc, o).and_then(as_number).unwrap_or(0.0))
            .collect(),
    )
}

fn missing_width(doc: &Document, dict: &Dictionary) -> f64 {
    dict.get(b"FontDescriptor")
        .ok()
        .and_then(|o| resolve(doc, o))
        .and_then(|o| o.as_dict().ok())
        .and_then(|fd| fd.get(b"MissingWidth").ok())
        .and_then(|o| resolve(doc, o))
        .and_then(as_number)
        .unwrap_or(0.0)
}

fn strip_subset_prefix(name: &str) -> &str {
    match name.split_once('+') {
        Some((tag, rest)) if tag.len() == 6 && tag.bytes().all(|b| b.is_ascii_uppercase()) => rest,
        _ => name,
    }
}

/// `/W` array: `c [w1 w2 ...]` and `cfirst clast w` entries.
fn parse_cid_widths(doc: &Document, items: &[Object]) -> HashMap<u32, f64> {
    let mut widths = HashMap::new();
    let values: Vec<&Object> = items.iter().filter_map(|o| resolve(doc, o)).collect();
    let mut i = 0;
    while i < values.len() {
        let Some(first) = as_number(values[i]) else { break };
        let first = first as u32;
        match values.get(i + 1) {
            Some(Object::Array(list)) => {
                for (offset, w) in list.iter().enumerate() {
                    if let Some(w) = resolve(doc, w).and_then(as_number) {
                        widths.insert(first + offset as u32, w);
                    }
                }
                i += 2;
            }
            Some(last) => {
                let (Some(last), Some(w)) = (as_number(last), values.get(i + 2).and_then(|o| as_number(o))) else {
                    break;
                };
                for cid in first..=(last as u32) {
                    widths.insert(cid, w);
                }
                i += 3;
            }
            None => break,
        }
    }
    widths
}

// -- Encodings ----------------------------------------------------------------

fn winansi_table() -> Vec<Option<String>> {
    (0u16..256)
        .map(|code| winansi_to_char(code as u8).map(String::from))
        .collect()
}

/// `/Encoding` of a simple font: a base encoding name, or a dictionary with
/// `/BaseEncoding` and `/Differences`. Anything else is read as WinAnsi.
fn simple_encoding(doc: &Document, dict: &Dictionary) -> Vec<Option<String>> {
    let mut table = winansi_table();
    let Some(Object::Dictionary(enc)) = dict.get(b"Encoding").ok().and_then(|o| resolve(doc, o)) else {
        return table;
    };
    let Some(diffs) = enc
        .get(b"Differences")
        .ok()
        .and_then(|o| resolve(doc, o))
        .and_then(|o| o.as_array().ok())
    else {
        return table;
    };

    let mut code = 0usize;
    for item in diffs {
        match resolve(doc, item) {
            Some(Object::Integer(start)) => code = (*start).clamp(0, 255) as usize,
            Some(Object::Name(glyph)) => {
                if code < table.len() {
                    table[code] = glyph_name_to_text(&String::from_utf8_lossy(glyph));
                }
                code += 1;
            }
            _ => {}
        }
    }
    table
}

const GLYPH_NAMES: &[(&str, &str)] = &[
    ("space", " "), ("exclam", "!"), ("quotedbl", "\""), ("numbersign", "#"),
    ("dollar", "$"), ("percent", "%"), ("ampersand", "&"), ("quotesingle", "'"),
    ("quoteright", "\u{2019}"), ("quoteleft", "\u{2018}"), ("parenleft", "("),
    ("parenright", ")"), ("asterisk", "*"), ("plus", "+"), ("comma", ","),
    ("hyphen", "-"), ("minus", "\u{2212}"), ("period", "."), ("slash", "/"),
    ("zero", "0"), ("one", "1"), ("two", "2"), ("three", "3"), ("four", "4"),
    ("five", "5"), ("six", "6"), ("seven", "7"), ("eight", "8"), ("nine", "9"),
    ("colon", ":"), ("semicolon", ";"), ("less", "<"), ("equal", "="),
    ("greater", ">"), ("question", "?"), ("at", "@"), ("bracketleft", "["),
    ("backslash", "\\"), ("bracketright", "]"), ("asciicircum", "^"),
    ("underscore", "_"), ("grave", "`"), ("braceleft", "{"), ("bar", "|"),
    ("braceright", "}"), ("asciitilde", "~"), ("bullet", "\u{2022}"),
    ("endash", "\u{2013}"), ("emdash", "\u{2014}"), ("quotedblleft", "\u{201c}"),
    ("quotedblright", "\u{201d}"), ("ellipsis", "\u{2026}"), ("fi", "fi"),
    ("fl", "fl"), ("ff", "ff"), ("ffi", "ffi"), ("ffl", "ffl"),
    ("dotlessi", "\u{131}"), ("germandbls", "\u{df}"), ("eacute", "\u{e9}"),
    ("egrave", "\u{e8}"), ("aacute", "\u{e1}"), ("agrave", "\u{e0}"),
    ("udieresis", "\u{fc}"), ("odieresis", "\u{f6}"), ("adieresis", "\u{e4}"),
    ("ccedilla", "\u{e7}"), ("nbspace", "\u{a0}"),
];

/// Unicode text for an Adobe glyph name: single letters, a small table of
/// common names, and the `uniXXXX` / `uXXXX[XX]` forms.
fn glyph_name_to_text(name: &str) -> Option<String> {
    let base = name.split('.').next().unwrap_or(name);
    if base.len() == 1 && base.bytes().all(|b| b.is_ascii_alphabetic()) {
        return Some(base.to_string());
    }
    if let Some((_, text)) = GLYPH_NAMES.iter().find(|(n, _)| *n == base) {
        return Some((*text).to_string());
    }
    if let Some(hex) = base.strip_prefix("uni")
        && hex.len() % 4 == 0
        && !hex.is_empty()
    {
        let units: Option<Vec<u16>> = hex
            .as_bytes()
            .chunks(4)
            .map(|c| u16::from_str_radix(std::str::from_utf8(c).ok()?, 16).ok())
            .collect();
        return units.map(|u| String::from_utf16_lossy(&u));
    }
    if let Some(hex) = base.strip_prefix('u')
        && (4..=6).contains(&hex.len())
    {
        return u32::from_str_radix(hex, 16)
            .ok()
            .and_then(char::from_u32)
            .map(String::from);
    }
    None
}

// -- ToUnicode ----------------------------------------------------------------

fn code_of(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0u32, |acc, &b| (acc << 8) | u32::from(b))
}

fn utf16be(bytes: &[u8]) -> String {
    if bytes.len() % 2 == 1 {
        return bytes.iter().map(|&b| b as char).collect();
    }
    let units: Vec<u16> = bytes
        .chunks(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect();
    String::from_utf16_lossy(&units)
}

/// Increment the last UTF-16 unit of a `bfrange` destination.
fn offset_utf16(bytes: &[u8], offset: u32) -> String {
    let mut data = bytes.to_vec();
    if data.len() >= 2 {
        let n = data.len();
        let last = u16::from_be_bytes([data[n - 2], data[n - 1]]).wrapping_add(offset as u16);
        data[n - 2..].copy_from_slice(&last.to_be_bytes());
    } else if let Some(last) = data.last_mut() {
        *last = last.wrapping_add(offset as u8);
    }
    utf16be(&data)
}

/// Parse the `bfchar` and `bfrange` sections of a ToUnicode CMap.
pub fn parse_to_unicode(data: &[u8]) -> Result<HashMap<u32, String>> {
    let mut map = HashMap::new();
    for op in tokenize(data)? {
        match op.operator.as_str() {
            "endbfchar" => {
                for pair in op.operands.chunks(2) {
                    if let [Object::String(src, _), Object::String(dst, _)] = pair {
                        map.insert(code_of(src), utf16be(dst));
                    }
                }
            }
            "endbfrange" => {
                for triple in op.operands.chunks(3) {
                    let [Object::String(lo, _), Object::String(hi, _), dst] = triple else {
                        continue;
                    };
                    let (lo, hi) = (code_of(lo), code_of(hi));
                    if hi < lo || hi - lo > 0xffff {
                        continue;
                    }
                    match dst {
                        Object::String(base, _) => {
                            for code in lo..=hi {
                                map.insert(code, offset_utf16(base, code - lo));
                            }
                        }
                        Object::Array(items) => {
                            for (code, item) in (lo..=hi).zip(items) {
                                if let Object::String(s, _) = item {
                                    map.insert(code, utf16be(s));
                                }
                            }
                        }
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{Stream, dictionary};

    #[test]
    fn to_unicode_char_and_range() {
        let cmap = b"/CIDInit /ProcSet findresource begin 12 dict begin begincmap
            1 begincodespacerange <0000> <FFFF> endcodespacerange
            2 beginbfchar <0003> <0020> <0024> <00660069> endbfchar
            2 beginbfrange <0010> <0012> <0041> <0020> <0021> [<4E2D> <6587>] endbfrange
            endcmap CMapName currentdict /CMap defineresource pop end end";
        let map = parse_to_unicode(cmap).unwrap();
        assert_eq!(map[&0x03], " ");
        assert_eq!(map[&0x24], "fi");
        assert_eq!(map[&0x10], "A");
        assert_eq!(map[&0x12], "C");
        assert_eq!(map[&0x20], "中");
        assert_eq!(map[&0x21], "文");
    }

    #[test]
    fn glyph_names() {
        assert_eq!(glyph_name_to_text("a").as_deref(), Some("a"));
        assert_eq!(glyph_name_to_text("fi").as_deref(), Some("fi"));
        assert_eq!(glyph_name_to_text("uni00E9").as_deref(), Some("é"));
        assert_eq!(glyph_name_to_text("u1F600").as_deref(), Some("😀"));
        assert_eq!(glyph_name_to_text("A.sc").as_deref(), Some("A"));
        assert_eq!(glyph_name_to_text("g123"), None);
    }

    #[test]
    fn subset_prefix_is_stripped() {
        assert_eq!(strip_subset_prefix("ABCDEF+Times-Roman"), "Times-Roman");
        assert_eq!(strip_subset_prefix("Foo+Bar"), "Foo+Bar");
    }

    #[test]
    fn simple_font_with_widths_and_differences() {
        let doc = Document::with_version("1.5");
        let dict = dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "XYZABC+CMR10",
            "FirstChar" => 65,
            "LastChar" => 66,
            "Widths" => vec![Object::Integer(750), Object::Integer(700)],
            "Encoding" => dictionary! {
                "Differences" => vec![Object::Integer(66), Object::Name(b"fi".to_vec())],
            },
        };
        let font = SourceFont::from_dict(&doc, b"F1", &dict).unwrap();
        assert_eq!(font.base_name(), "CMR10");

        let chars = font.decode(b"AB ");
        assert_eq!(chars.len(), 3);
        assert_eq!(chars[0].text, "A");
        assert!((chars[0].width - 0.75).abs() < 1e-9);
        assert_eq!(chars[1].text, "fi");
        // Outside FirstChar..LastChar with no MissingWidth.
        assert_eq!(chars[2].width, 0.0);
        assert!(chars[2].is_space);
    }

    #[test]
    fn standard_font_without_widths_uses_builtin_metrics() {
        let doc = Document::with_version("1.5");
        let dict = dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Times-Roman",
        };
        let font = SourceFont::from_dict(&doc, b"F2", &dict).unwrap();
        let chars = font.decode(b"m");
        assert!((chars[0].width - 0.778).abs() < 1e-9);
    }

    #[test]
    fn type0_font_with_w_array_and_to_unicode() {
        let mut doc = Document::with_version("1.5");
        let cmap = b"1 beginbfchar <0005> <0048> endbfchar".to_vec();
        let cmap_id = doc.add_object(Stream::new(dictionary! {}, cmap));
        let descendant = dictionary! {
            "Type" => "Font",
            "Subtype" => "CIDFontType2",
            "BaseFont" => "Noto",
            "DW" => 900,
            "W" => vec![
                Object::Integer(5),
                Object::Array(vec![Object::Integer(600), Object::Integer(610)]),
                Object::Integer(10), Object::Integer(12), Object::Integer(400),
            ],
        };
        let dict = dictionary! {
            "Type" => "Font",
            "Subtype" => "Type0",
            "BaseFont" => "Noto",
            "Encoding" => "Identity-H",
            "DescendantFonts" => vec![Object::Dictionary(descendant)],
            "ToUnicode" => cmap_id,
        };
        let font = SourceFont::from_dict(&doc, b"F3", &dict).unwrap();
        assert!(font.is_two_byte());

        let chars = font.decode(&[0x00, 0x05, 0x00, 0x06, 0x00, 0x0b, 0x00, 0x20]);
        assert_eq!(chars[0].text, "H");
        assert!((chars[0].width - 0.6).abs() < 1e-9);
        assert!((chars[1].width - 0.61).abs() < 1e-9);
        assert!((chars[2].width - 0.4).abs() < 1e-9);
        assert!((chars[3].width - 0.9).abs() < 1e-9);
        assert_eq!(chars[1].text, "");
        assert!(!chars[3].is_space);
    }

    #[test]
    fn missing_resource_falls_back() {
        let table = FontTable::default();
        let font = table.get(b"Nope");
        assert_eq!(font.base_name(), "Helvetica");
        assert_eq!(font.decode(b"a")[0].text, "a");
    }
}
