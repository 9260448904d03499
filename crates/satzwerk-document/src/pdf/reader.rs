// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF reader: open a source document and pull out, per page, the decoded
// content stream, the (inherited) resource dictionary, the media box, and
// the page's font table, using the `lopdf` crate.

use std::path::Path;

use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use tracing::{debug, info, instrument};

use satzwerk_core::error::{Result, SatzwerkError};
use satzwerk_core::types::BBox;

use crate::pdf::font::FontTable;
use crate::pdf::lexer::as_number;

/// US Letter, used when a page tree carries no `/MediaBox` at all.
const DEFAULT_MEDIA_BOX: BBox = BBox {
    x0: 0.0,
    y0: 0.0,
    x1: 612.0,
    y1: 792.0,
};

/// Reference chains longer than this are treated as broken.
const MAX_REFERENCE_DEPTH: usize = 32;

/// Read access to one source PDF.
pub struct PdfReader {
    /// The underlying lopdf document.
    document: Document,
    /// Source path, if opened from a file (useful for diagnostics).
    source_path: Option<String>,
}

impl PdfReader {
    // -- Construction ---------------------------------------------------------

    /// Open a PDF from the filesystem.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path_ref = path.as_ref();
        info!("Opening PDF: {}", path_ref.display());

        let document = Document::load(path_ref).map_err(|err| {
            SatzwerkError::Pdf(format!("failed to open {}: {}", path_ref.display(), err))
        })?;

        debug!(pages = document.get_pages().len(), "PDF loaded");

        Ok(Self {
            document,
            source_path: Some(path_ref.display().to_string()),
        })
    }

    /// Create a reader from raw PDF bytes already in memory.
    #[instrument(skip_all, fields(bytes_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let document = Document::load_mem(data)
            .map_err(|err| SatzwerkError::Pdf(format!("failed to load PDF from memory: {}", err)))?;

        debug!(pages = document.get_pages().len(), "PDF loaded from bytes");

        Ok(Self {
            document,
            source_path: None,
        })
    }

    /// Wrap a document that is already loaded.
    pub fn from_document(document: Document) -> Self {
        Self {
            document,
            source_path: None,
        }
    }

    // -- Inspection -----------------------------------------------------------

    /// Number of pages in the document.
    pub fn page_count(&self) -> u32 {
        self.document.get_pages().len() as u32
    }

    /// Return the source path if the reader was created via [`PdfReader::open`].
    pub fn source_path(&self) -> Option<&str> {
        self.source_path.as_deref()
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Object id of page `number` (1-indexed).
    pub fn page_id(&self, number: u32) -> Result<ObjectId> {
        let pages = self.document.get_pages();
        pages.get(&number).copied().ok_or_else(|| {
            SatzwerkError::Pdf(format!(
                "page {} not found (document has {} pages)",
                number,
                pages.len()
            ))
        })
    }

    // -- Page data ------------------------------------------------------------

    /// Decoded content of page `number`. Multiple content streams are joined
    /// with a single space.
    pub fn page_content(&self, number: u32) -> Result<Vec<u8>> {
        let page = self.page_dict(number)?;
        let Some(contents) = page.get(b"Contents").ok() else {
            return Ok(Vec::new());
        };

        let streams: Vec<&Object> = match resolve(&self.document, contents) {
            Some(Object::Array(items)) => items.iter().collect(),
            Some(other) => vec![other],
            None => Vec::new(),
        };

        let mut out = Vec::new();
        for item in streams {
            let Some(Object::Stream(stream)) = resolve(&self.document, item) else {
                return Err(SatzwerkError::ContentExtraction(format!(
                    "page {number}: /Contents entry is not a stream"
                )));
            };
            if !out.is_empty() {
                out.push(b' ');
            }
            out.extend_from_slice(&stream_bytes(stream)?);
        }
        Ok(out)
    }

    /// Resource dictionary of page `number`, inherited through `/Parent` when
    /// the page has none. The `/Font` entry is made direct.
    pub fn resources(&self, number: u32) -> Result<Dictionary> {
        let page_id = self.page_id(number)?;
        let mut resources = inherited(&self.document, page_id, b"Resources")
            .and_then(|o| o.as_dict().ok())
            .cloned()
            .unwrap_or_default();

        if let Some(fonts) = resources
            .get(b"Font")
            .ok()
            .and_then(|o| resolve(&self.document, o))
            .and_then(|o| o.as_dict().ok())
            .cloned()
        {
            resources.set("Font", Object::Dictionary(fonts));
        }
        Ok(resources)
    }

    /// Media box of page `number`, inherited from the page tree if needed.
    pub fn media_box(&self, number: u32) -> Result<BBox> {
        let page_id = self.page_id(number)?;
        let Some(values) = inherited(&self.document, page_id, b"MediaBox")
            .and_then(|o| o.as_array().ok())
            .map(|arr| {
                arr.iter()
                    .filter_map(|o| resolve(&self.document, o).and_then(as_number))
                    .collect::<Vec<f64>>()
            })
        else {
            return Ok(DEFAULT_MEDIA_BOX);
        };

        match values.as_slice() {
            [x0, y0, x1, y1] => Ok(BBox::new(*x0, *y0, *x1, *y1)),
            _ => Err(SatzwerkError::Pdf(format!("page {number}: malformed /MediaBox"))),
        }
    }

    /// Fonts referenced by the resources of page `number`.
    pub fn font_table(&self, number: u32) -> Result<FontTable> {
        let resources = self.resources(number)?;
        Ok(FontTable::from_resources(&self.document, &resources))
    }

    fn page_dict(&self, number: u32) -> Result<&Dictionary> {
        let page_id = self.page_id(number)?;
        self.document
            .get_dictionary(page_id)
            .map_err(|err| SatzwerkError::Pdf(format!("page {number} is not a dictionary: {err}")))
    }
}

// -- Object helpers -----------------------------------------------------------

/// Follow references until a direct object is reached.
pub(crate) fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    let mut current = obj;
    for _ in 0..MAX_REFERENCE_DEPTH {
        match current {
            Object::Reference(id) => current = doc.get_object(*id).ok()?,
            _ => return Some(current),
        }
    }
    None
}

/// Stream data with filters applied.
pub(crate) fn stream_bytes(stream: &Stream) -> Result<Vec<u8>> {
    if stream.dict.get(b"Filter").is_ok() {
        stream
            .decompressed_content()
            .map_err(|err| SatzwerkError::ContentExtraction(format!("cannot decode stream: {err}")))
    } else {
        Ok(stream.content.clone())
    }
}

/// Look up an inheritable page attribute, walking `/Parent` links.
pub(crate) fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_REFERENCE_DEPTH {
        if let Ok(value) = node.get(key) {
            return resolve(doc, value);
        }
        let parent = node.get(b"Parent").ok().and_then(|o| resolve(doc, o))?;
        node = parent.as_dict().ok()?;
    }
    None
}
