//! Output document assembly.
//!
//! [`DocumentAssembler`] builds the merged PDF incrementally: source
//! documents are renumbered into a shared id space and their pages appended
//! in strict order, generated pages (placeholders, ads, the table of
//! contents) are synthesized in place, and `finalize` rebuilds a fresh
//! catalog and page tree over the collected pages.
//!
//! Source pages may inherit MediaBox, Resources or Rotate from their
//! original page tree; those attributes are materialized onto each page
//! before the page is re-parented, otherwise they would be lost with the
//! discarded source tree.

use lopdf::{Dictionary, Document, Object, ObjectId};

use crate::error::MergeError;
use crate::merge::pagegen::{self, TextLine};

/// Page-tree attributes that may be inherited from a parent node.
const INHERITABLE_KEYS: [&[u8]; 3] = [b"MediaBox", b"Resources", b"Rotate"];

/// Maximum parent-chain depth walked when materializing inherited
/// attributes, bounding malformed documents.
const MAX_PARENT_DEPTH: usize = 10;

/// Incremental builder for the merged output document.
pub struct DocumentAssembler {
    doc: Document,
    page_ids: Vec<ObjectId>,
    resources_id: ObjectId,
}

impl DocumentAssembler {
    /// Create an empty assembler with the shared text-page resources.
    pub fn new() -> Self {
        let mut doc = Document::with_version("1.5");

        let font_id = doc.add_object(lopdf::dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources_id = doc.add_object(lopdf::dictionary! {
            "Font" => lopdf::dictionary! { "F1" => font_id },
        });

        Self {
            doc,
            page_ids: Vec::new(),
            resources_id,
        }
    }

    /// Number of pages collected so far.
    pub fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    /// Append every page of a source document, in its own page order.
    ///
    /// Returns the number of pages appended.
    ///
    /// # Errors
    ///
    /// Returns [`MergeError::Assembly`] if the source document has no pages
    /// after renumbering (it was validated upstream, so this indicates a
    /// mangled page tree).
    pub fn append_document(&mut self, source: Document) -> Result<usize, MergeError> {
        let mut source = source;

        source.renumber_objects_with(self.doc.max_id + 1);
        self.doc.max_id = source.max_id;

        let source_pages: Vec<ObjectId> = source.get_pages().into_values().collect();
        if source_pages.is_empty() {
            return Err(MergeError::assembly("source document has no pages"));
        }

        for &page_id in &source_pages {
            materialize_inherited(&mut source, page_id);
        }

        // Move everything except the source's own document structure; the
        // final catalog and page tree are rebuilt in `finalize`.
        for (object_id, object) in source.objects {
            if is_structure_node(&object) {
                continue;
            }
            self.doc.objects.insert(object_id, object);
        }

        self.page_ids.extend_from_slice(&source_pages);
        Ok(source_pages.len())
    }

    /// Synthesize a text page and append it.
    ///
    /// # Errors
    ///
    /// Returns [`MergeError::Assembly`] if the content stream cannot be
    /// encoded.
    pub fn append_text_page(&mut self, lines: &[TextLine]) -> Result<(), MergeError> {
        let page_id = self.build_text_page(lines)?;
        self.page_ids.push(page_id);
        Ok(())
    }

    /// Synthesize a text page and insert it at the very front of the
    /// document. Used for the table of contents.
    ///
    /// # Errors
    ///
    /// Returns [`MergeError::Assembly`] if the content stream cannot be
    /// encoded.
    pub fn prepend_text_page(&mut self, lines: &[TextLine]) -> Result<(), MergeError> {
        let page_id = self.build_text_page(lines)?;
        self.page_ids.insert(0, page_id);
        Ok(())
    }

    fn build_text_page(&mut self, lines: &[TextLine]) -> Result<ObjectId, MergeError> {
        let content = pagegen::render_lines(lines);
        let encoded = content
            .encode()
            .map_err(|err| MergeError::assembly(format!("failed to encode page content: {err}")))?;

        let content_id = self
            .doc
            .add_object(lopdf::Stream::new(Dictionary::new(), encoded));

        let page_id = self.doc.add_object(lopdf::dictionary! {
            "Type" => "Page",
            "MediaBox" => vec![
                0.into(),
                0.into(),
                pagegen::PAGE_WIDTH.into(),
                pagegen::PAGE_HEIGHT.into(),
            ],
            "Resources" => self.resources_id,
            "Contents" => content_id,
        });

        Ok(page_id)
    }

    /// Build the final catalog and page tree and return the document.
    ///
    /// # Errors
    ///
    /// Returns [`MergeError::Assembly`] if no pages were collected.
    pub fn finalize(mut self) -> Result<Document, MergeError> {
        if self.page_ids.is_empty() {
            return Err(MergeError::assembly("no pages to assemble"));
        }

        let pages_id = self.doc.new_object_id();

        for &page_id in &self.page_ids {
            if let Ok(Object::Dictionary(dict)) = self.doc.get_object_mut(page_id) {
                dict.set("Parent", Object::Reference(pages_id));
            }
        }

        let kids: Vec<Object> = self
            .page_ids
            .iter()
            .map(|&id| Object::Reference(id))
            .collect();

        let pages_dict = lopdf::dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => self.page_ids.len() as i64,
        };
        self.doc.objects.insert(pages_id, pages_dict.into());

        let catalog_id = self.doc.add_object(lopdf::dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);

        self.doc.renumber_objects();
        self.doc.compress();

        Ok(self.doc)
    }
}

impl Default for DocumentAssembler {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether an object is a document-structure node that must not be carried
/// into the output (the output grows its own).
fn is_structure_node(object: &Object) -> bool {
    let Ok(dict) = object.as_dict() else {
        return false;
    };
    matches!(
        dict.get(b"Type"),
        Ok(Object::Name(name))
            if matches!(name.as_slice(), b"Catalog" | b"Pages" | b"Outlines")
    )
}

/// Copy inherited page-tree attributes onto the page dictionary itself.
fn materialize_inherited(doc: &mut Document, page_id: ObjectId) {
    for key in INHERITABLE_KEYS {
        let already_present = doc
            .get_object(page_id)
            .ok()
            .and_then(|obj| obj.as_dict().ok())
            .is_some_and(|dict| dict.has(key));
        if already_present {
            continue;
        }

        if let Some(value) = inherited_attribute(doc, page_id, key)
            && let Ok(Object::Dictionary(dict)) = doc.get_object_mut(page_id)
        {
            dict.set(key, value);
        }
    }
}

/// Walk the parent chain looking for an inheritable attribute.
fn inherited_attribute(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut current = page_id;
    for _ in 0..MAX_PARENT_DEPTH {
        let dict = doc.get_object(current).ok()?.as_dict().ok()?;
        if let Ok(value) = dict.get(key) {
            return Some(value.clone());
        }
        current = dict.get(b"Parent").ok()?.as_reference().ok()?;
    }
    None
}
