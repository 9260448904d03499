// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Output assembly: apply page patches to a copy of the source document and
// write the translated-only (mono) and interleaved (bilingual) variants.

use std::collections::BTreeMap;
use std::path::Path;

use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use tracing::{debug, info, instrument};

use satzwerk_core::error::{Result, SatzwerkError};

use crate::fonts::{FontKey, FontRegistry, FontUsage};
use crate::pdf::reader::PdfReader;

/// Rewritten content streams, by 1-indexed page number.
pub type PagePatches = BTreeMap<u32, Vec<u8>>;

fn pdf_error(context: &'static str) -> impl Fn(lopdf::Error) -> SatzwerkError {
    move |err| SatzwerkError::Pdf(format!("{context}: {err}"))
}

/// Builds output documents from a source document and its page patches.
pub struct OutputAssembler<'a> {
    reader: &'a PdfReader,
    fonts: &'a FontRegistry,
    subset: bool,
}

impl<'a> OutputAssembler<'a> {
    /// `subset` restricts embedded font tables to the characters used.
    pub fn new(reader: &'a PdfReader, fonts: &'a FontRegistry, subset: bool) -> Self {
        Self {
            reader,
            fonts,
            subset,
        }
    }

    /// The source document with every patched page replaced by its
    /// translation.
    #[instrument(skip_all, fields(patched = patches.len()))]
    pub fn build_mono(&self, patches: &PagePatches, usage: &FontUsage) -> Result<Document> {
        let mut doc = self.reader.document().clone();
        let font_ids = self.fonts.write_fonts(&mut doc, usage, self.subset)?;

        for (&number, content) in patches {
            let page_id = self.reader.page_id(number)?;
            let dict = self.patched_page(&mut doc, number, content, &font_ids)?;
            let page = doc
                .get_dictionary_mut(page_id)
                .map_err(pdf_error("page dictionary"))?;
            for (key, value) in dict.iter() {
                page.set(key.clone(), value.clone());
            }
        }
        Ok(doc)
    }

    /// Every source page followed by its translated copy. Pages without a
    /// patch are duplicated unchanged.
    #[instrument(skip_all, fields(patched = patches.len()))]
    pub fn build_bilingual(&self, patches: &PagePatches, usage: &FontUsage) -> Result<Document> {
        let mut doc = self.reader.document().clone();
        let font_ids = self.fonts.write_fonts(&mut doc, usage, self.subset)?;

        for number in 1..=self.reader.page_count() {
            let page_id = self.reader.page_id(number)?;
            let mut copy = doc
                .get_dictionary(page_id)
                .map_err(pdf_error("page dictionary"))?
                .clone();
            // Link annotations point back at their own page.
            copy.remove(b"Annots");
            if let Some(content) = patches.get(&number) {
                let patched = self.patched_page(&mut doc, number, content, &font_ids)?;
                for (key, value) in patched.iter() {
                    copy.set(key.clone(), value.clone());
                }
            }

            let parent_id = copy
                .get(b"Parent")
                .and_then(Object::as_reference)
                .map_err(pdf_error("page parent"))?;
            let copy_id = doc.add_object(copy);
            insert_after(&mut doc, parent_id, page_id, copy_id)?;
        }
        debug!(pages = self.reader.page_count() * 2, "Bilingual page tree built");
        Ok(doc)
    }

    /// `Contents` and `Resources` entries for a patched page.
    fn patched_page(
        &self,
        doc: &mut Document,
        number: u32,
        content: &[u8],
        font_ids: &BTreeMap<FontKey, ObjectId>,
    ) -> Result<Dictionary> {
        let mut resources = self.reader.resources(number)?;
        let mut fonts = match resources.get(b"Font") {
            Ok(Object::Dictionary(fonts)) => fonts.clone(),
            _ => Dictionary::new(),
        };
        for (key, id) in font_ids {
            fonts.set(key.resource_name(), Object::Reference(*id));
        }
        resources.set("Font", Object::Dictionary(fonts));

        let stream_id = doc.add_object(Stream::new(Dictionary::new(), content.to_vec()));
        let mut dict = Dictionary::new();
        dict.set("Contents", Object::Reference(stream_id));
        dict.set("Resources", Object::Dictionary(resources));
        Ok(dict)
    }
}

/// Insert `new_id` into the `Kids` of `parent_id` right after `after_id`
/// and bump `Count` on every ancestor.
fn insert_after(doc: &mut Document, parent_id: ObjectId, after_id: ObjectId, new_id: ObjectId) -> Result<()> {
    let kids = doc
        .get_dictionary_mut(parent_id)
        .and_then(|parent| parent.get_mut(b"Kids"))
        .and_then(Object::as_array_mut)
        .map_err(pdf_error("page tree kids"))?;
    let position = kids
        .iter()
        .position(|kid| kid.as_reference().ok() == Some(after_id))
        .map_or(kids.len(), |i| i + 1);
    kids.insert(position, Object::Reference(new_id));

    let mut node = Some(parent_id);
    while let Some(id) = node {
        let dict = doc.get_dictionary_mut(id).map_err(pdf_error("page tree node"))?;
        let count = dict.get(b"Count").and_then(Object::as_i64).unwrap_or(0);
        dict.set("Count", count + 1);
        node = dict.get(b"Parent").and_then(Object::as_reference).ok();
    }
    Ok(())
}

/// Compress streams and write `doc` to `path`, creating the directory.
#[instrument(skip(doc), fields(path = %path.display()))]
pub fn save_document(mut doc: Document, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    doc.compress();
    doc.save(path)
        .map_err(|err| SatzwerkError::Pdf(format!("failed to write {}: {err}", path.display())))?;
    info!(pages = doc.get_pages().len(), "Document written");
    Ok(())
}
