// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Target-font registry: picks the output font for a translated run, measures
// and encodes text in it, records which characters were used, and finally
// writes the font dictionaries into the output document.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use tracing::{debug, instrument};

use satzwerk_core::error::Result;
use satzwerk_core::types::is_cjk_language;

use crate::fonts::cjk::{AdobeCjkFont, EmbeddedFont};
use crate::fonts::standard::{StandardFont, char_to_winansi, winansi_encodable};

/// Characters per `beginbfchar` block (the CMap format limit).
const BFCHAR_BLOCK: usize = 100;

/// Output fonts, in resource order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FontKey {
    Helvetica,
    Times,
    Courier,
    Cjk,
}

impl FontKey {
    /// Resource name used in page `/Font` dictionaries.
    pub fn resource_name(&self) -> &'static [u8] {
        match self {
            Self::Helvetica => b"SzHelv",
            Self::Times => b"SzTimes",
            Self::Courier => b"SzCour",
            Self::Cjk => b"SzCJK",
        }
    }

    fn standard(&self) -> Option<StandardFont> {
        match self {
            Self::Helvetica => Some(StandardFont::Helvetica),
            Self::Times => Some(StandardFont::Times),
            Self::Courier => Some(StandardFont::Courier),
            Self::Cjk => None,
        }
    }
}

impl From<StandardFont> for FontKey {
    fn from(font: StandardFont) -> Self {
        match font {
            StandardFont::Helvetica => Self::Helvetica,
            StandardFont::Times => Self::Times,
            StandardFont::Courier => Self::Courier,
        }
    }
}

/// Characters drawn per output font.
pub type FontUsage = BTreeMap<FontKey, BTreeSet<char>>;

/// Fold one page's usage into the document total.
pub fn merge_usage(into: &mut FontUsage, from: FontUsage) {
    for (key, chars) in from {
        into.entry(key).or_default().extend(chars);
    }
}

#[derive(Debug, Clone)]
enum CjkFont {
    Embedded(Arc<EmbeddedFont>),
    Adobe(AdobeCjkFont),
}

/// Output fonts for one target language.
#[derive(Debug, Clone)]
pub struct FontRegistry {
    cjk_target: bool,
    cjk: CjkFont,
}

impl FontRegistry {
    pub fn new(target_lang: &str, embedded: Option<Arc<EmbeddedFont>>) -> Self {
        let cjk = match embedded {
            Some(font) => CjkFont::Embedded(font),
            None => CjkFont::Adobe(AdobeCjkFont::for_language(target_lang)),
        };
        Self {
            cjk_target: is_cjk_language(target_lang),
            cjk,
        }
    }

    /// Font for translated `text` whose source run used `source_font`.
    pub fn choose(&self, source_font: &str, text: &str) -> FontKey {
        if self.cjk_target || !winansi_encodable(text) {
            FontKey::Cjk
        } else {
            StandardFont::for_source_name(source_font).into()
        }
    }

    fn char_width(&self, key: FontKey, ch: char) -> u16 {
        match (key.standard(), &self.cjk) {
            (Some(font), _) => font.width(ch),
            (None, CjkFont::Embedded(font)) => font.width(ch),
            (None, CjkFont::Adobe(font)) => font.width(ch),
        }
    }

    /// Width of `text` at `size`, in text space.
    pub fn measure(&self, key: FontKey, text: &str, size: f64) -> f64 {
        text.chars()
            .map(|ch| f64::from(self.char_width(key, ch)))
            .sum::<f64>()
            * size
            / 1000.0
    }

    /// String operand bytes: WinAnsi for the Latin fonts, UCS-2BE for the
    /// CJK font. Unencodable characters become `?`.
    pub fn encode(&self, key: FontKey, text: &str) -> Vec<u8> {
        if key == FontKey::Cjk {
            text.chars()
                .flat_map(|ch| {
                    let unit = u16::try_from(u32::from(ch)).unwrap_or(u16::from(b'?'));
                    unit.to_be_bytes()
                })
                .collect()
        } else {
            text.chars()
                .map(|ch| char_to_winansi(ch).unwrap_or(b'?'))
                .collect()
        }
    }

    /// Characters of `text` as they will actually be drawn.
    pub fn drawn_chars(&self, key: FontKey, text: &str) -> BTreeSet<char> {
        text.chars()
            .map(|ch| match key {
                FontKey::Cjk if u32::from(ch) > 0xffff => '?',
                FontKey::Cjk => ch,
                _ if char_to_winansi(ch).is_none() => '?',
                _ => ch,
            })
            .collect()
    }

    /// Add one font object per used key. Returns the object ids by key.
    #[instrument(skip_all, fields(fonts = usage.len(), subset))]
    pub fn write_fonts(
        &self,
        doc: &mut Document,
        usage: &FontUsage,
        subset: bool,
    ) -> Result<BTreeMap<FontKey, ObjectId>> {
        let mut ids = BTreeMap::new();
        for (key, chars) in usage {
            let id = match (key.standard(), &self.cjk) {
                (Some(font), _) => doc.add_object(standard_font_dict(font)),
                (None, CjkFont::Embedded(font)) => add_embedded_font(doc, font, chars, subset),
                (None, CjkFont::Adobe(font)) => add_adobe_font(doc, *font),
            };
            debug!(font = ?key, chars = chars.len(), "Font written");
            ids.insert(*key, id);
        }
        Ok(ids)
    }
}

// -- Font dictionaries --------------------------------------------------------

fn standard_font_dict(font: StandardFont) -> Dictionary {
    let mut dict = Dictionary::new();
    dict.set("Type", Object::Name(b"Font".to_vec()));
    dict.set("Subtype", Object::Name(b"Type1".to_vec()));
    dict.set("BaseFont", Object::Name(font.base_font().as_bytes().to_vec()));
    dict.set("Encoding", Object::Name(b"WinAnsiEncoding".to_vec()));
    dict
}

fn cid_system_info(ordering: &str, supplement: i64) -> Object {
    let mut d = Dictionary::new();
    d.set("Registry", Object::string_literal("Adobe"));
    d.set("Ordering", Object::string_literal(ordering));
    d.set("Supplement", Object::Integer(supplement));
    Object::Dictionary(d)
}

fn type0_dict(base_font: &str, encoding: &str, descendant: ObjectId) -> Dictionary {
    let mut type0 = Dictionary::new();
    type0.set("Type", Object::Name(b"Font".to_vec()));
    type0.set("Subtype", Object::Name(b"Type0".to_vec()));
    type0.set("BaseFont", Object::Name(base_font.as_bytes().to_vec()));
    type0.set("Encoding", Object::Name(encoding.as_bytes().to_vec()));
    type0.set("DescendantFonts", Object::Array(vec![Object::Reference(descendant)]));
    type0
}

fn add_adobe_font(doc: &mut Document, font: AdobeCjkFont) -> ObjectId {
    let (ordering, supplement) = font.collection();

    let mut descriptor = Dictionary::new();
    descriptor.set("Type", Object::Name(b"FontDescriptor".to_vec()));
    descriptor.set("FontName", Object::Name(font.base_font().as_bytes().to_vec()));
    descriptor.set("Flags", Object::Integer(6));
    descriptor.set(
        "FontBBox",
        Object::Array(vec![
            Object::Integer(-25),
            Object::Integer(-254),
            Object::Integer(1000),
            Object::Integer(880),
        ]),
    );
    descriptor.set("ItalicAngle", Object::Integer(0));
    descriptor.set("Ascent", Object::Integer(880));
    descriptor.set("Descent", Object::Integer(-120));
    descriptor.set("CapHeight", Object::Integer(880));
    descriptor.set("StemV", Object::Integer(93));
    let descriptor_id = doc.add_object(Object::Dictionary(descriptor));

    let mut cidfont = Dictionary::new();
    cidfont.set("Type", Object::Name(b"Font".to_vec()));
    cidfont.set("Subtype", Object::Name(b"CIDFontType0".to_vec()));
    cidfont.set("BaseFont", Object::Name(font.base_font().as_bytes().to_vec()));
    cidfont.set("CIDSystemInfo", cid_system_info(ordering, supplement));
    cidfont.set("FontDescriptor", Object::Reference(descriptor_id));
    cidfont.set("DW", Object::Integer(1000));
    cidfont.set(
        "W",
        Object::Array(vec![Object::Integer(1), Object::Integer(95), Object::Integer(500)]),
    );
    let cidfont_id = doc.add_object(Object::Dictionary(cidfont));

    doc.add_object(type0_dict(font.base_font(), font.encoding(), cidfont_id))
}

fn add_embedded_font(
    doc: &mut Document,
    font: &EmbeddedFont,
    used: &BTreeSet<char>,
    subset: bool,
) -> ObjectId {
    let mut stream_dict = Dictionary::new();
    stream_dict.set("Length1", Object::Integer(font.data().len() as i64));
    let font_file_id = doc.add_object(Stream::new(stream_dict, font.data().to_vec()));

    let mut descriptor = Dictionary::new();
    descriptor.set("Type", Object::Name(b"FontDescriptor".to_vec()));
    descriptor.set("FontName", Object::Name(font.name().as_bytes().to_vec()));
    descriptor.set("Flags", Object::Integer(4));
    descriptor.set(
        "FontBBox",
        Object::Array(vec![
            Object::Integer(0),
            Object::Integer(-300),
            Object::Integer(1000),
            Object::Integer(1000),
        ]),
    );
    descriptor.set("ItalicAngle", Object::Integer(0));
    descriptor.set("Ascent", Object::Integer(880));
    descriptor.set("Descent", Object::Integer(-120));
    descriptor.set("CapHeight", Object::Integer(700));
    descriptor.set("StemV", Object::Integer(80));
    descriptor.set("FontFile2", Object::Reference(font_file_id));
    let descriptor_id = doc.add_object(Object::Dictionary(descriptor));

    // CID = BMP code point under Identity-H.
    let cids: Vec<u16> = if subset {
        used.iter().filter_map(|&ch| u16::try_from(u32::from(ch)).ok()).collect()
    } else {
        (0u16..=0xffff)
            .filter(|&cid| char::from_u32(u32::from(cid)).is_some_and(|ch| font.has_glyph(ch)))
            .collect()
    };

    let cid_to_gid_id = doc.add_object(cid_to_gid_map(font, &cids));
    let to_unicode_id = doc.add_object(if subset {
        subset_to_unicode(&cids)
    } else {
        identity_to_unicode()
    });

    let mut cidfont = Dictionary::new();
    cidfont.set("Type", Object::Name(b"Font".to_vec()));
    cidfont.set("Subtype", Object::Name(b"CIDFontType2".to_vec()));
    cidfont.set("BaseFont", Object::Name(font.name().as_bytes().to_vec()));
    cidfont.set("CIDSystemInfo", cid_system_info("Identity", 0));
    cidfont.set("FontDescriptor", Object::Reference(descriptor_id));
    cidfont.set("DW", Object::Integer(1000));
    cidfont.set("W", Object::Array(width_array(&cids, |cid| {
        char::from_u32(u32::from(cid)).map_or(1000, |ch| font.width(ch))
    })));
    cidfont.set("CIDToGIDMap", Object::Reference(cid_to_gid_id));
    let cidfont_id = doc.add_object(Object::Dictionary(cidfont));

    let mut type0 = type0_dict(font.name(), "Identity-H", cidfont_id);
    type0.set("ToUnicode", Object::Reference(to_unicode_id));
    doc.add_object(type0)
}

/// `/W` entries for sorted CIDs: runs of consecutive CIDs with one width use
/// the `first last w` form, other consecutive runs the `first [w ...]` form.
fn width_array(cids: &[u16], width: impl Fn(u16) -> u16) -> Vec<Object> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < cids.len() {
        let mut j = i + 1;
        while j < cids.len() && cids[j] == cids[j - 1] + 1 {
            j += 1;
        }
        let run = &cids[i..j];
        let widths: Vec<u16> = run.iter().map(|&cid| width(cid)).collect();
        if widths.len() > 1 && widths.iter().all(|&w| w == widths[0]) {
            out.push(Object::Integer(i64::from(run[0])));
            out.push(Object::Integer(i64::from(run[run.len() - 1])));
            out.push(Object::Integer(i64::from(widths[0])));
        } else {
            out.push(Object::Integer(i64::from(run[0])));
            out.push(Object::Array(
                widths.into_iter().map(|w| Object::Integer(i64::from(w))).collect(),
            ));
        }
        i = j;
    }
    out
}

/// Two bytes per CID up to the highest used one; unused CIDs map to 0.
fn cid_to_gid_map(font: &EmbeddedFont, cids: &[u16]) -> Stream {
    let max = cids.iter().copied().max().map_or(0, usize::from);
    let mut map = vec![0u8; (max + 1) * 2];
    for &cid in cids {
        if let Some(ch) = char::from_u32(u32::from(cid)) {
            let gid = font.glyph_index(ch);
            let offset = usize::from(cid) * 2;
            map[offset..offset + 2].copy_from_slice(&gid.to_be_bytes());
        }
    }
    Stream::new(Dictionary::new(), map)
}

const CMAP_HEADER: &str = "/CIDInit /ProcSet findresource begin
12 dict begin
begincmap
/CIDSystemInfo
<< /Registry (Adobe)
/Ordering (UCS)
/Supplement 0
>> def
/CMapName /Adobe-Identity-UCS def
/CMapType 2 def
1 begincodespacerange
<0000> <FFFF>
endcodespacerange
";

const CMAP_FOOTER: &str = "endcmap
CMapName currentdict /CMap defineresource pop
end
end";

fn identity_to_unicode() -> Stream {
    let cmap = format!("{CMAP_HEADER}1 beginbfrange\n<0000> <FFFF> <0000>\nendbfrange\n{CMAP_FOOTER}");
    Stream::new(Dictionary::new(), cmap.into_bytes())
}

fn subset_to_unicode(cids: &[u16]) -> Stream {
    let mut cmap = String::from(CMAP_HEADER);
    for block in cids.chunks(BFCHAR_BLOCK) {
        cmap.push_str(&format!("{} beginbfchar\n", block.len()));
        for cid in block {
            cmap.push_str(&format!("<{cid:04X}> <{cid:04X}>\n"));
        }
        cmap.push_str("endbfchar\n");
    }
    cmap.push_str(CMAP_FOOTER);
    Stream::new(Dictionary::new(), cmap.into_bytes())
}
