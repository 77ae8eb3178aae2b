//! Test helpers and fixtures.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, StringFormat, dictionary};
use overtype_core::{
    DocumentWriter, DrawRejected, Error, FontHandle, GlyphParser, GlyphRecord, PageSize,
    ParsedDocument, Point, Rect, Result, Rgb, Settings, Transform, WritableDocument,
};

pub const LETTER: PageSize = PageSize {
    width: 612.0,
    height: 792.0,
};

pub fn make_settings(placeholder: &str) -> Settings {
    Settings {
        placeholder_text: placeholder.to_string(),
        ..Settings::default()
    }
}

/// Horizontal glyph record of `size` at `(x, y)`.
pub fn glyph(text: &str, x: f64, y: f64, size: f64) -> GlyphRecord {
    GlyphRecord {
        text: text.to_string(),
        transform: Transform::new(size, 0.0, 0.0, size, x, y),
        advance_width: None,
    }
}

/// Temp directory unique to this process and `name`, removed on drop so a
/// failing test cleans up too.
#[derive(Debug)]
pub struct ScratchDir(PathBuf);

impl ScratchDir {
    pub fn new(name: &str) -> Self {
        let dir = std::env::temp_dir().join(format!("overtype-{name}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        Self(dir)
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}

/// Parser keyed by the exact input bytes. Pages listed in `broken_pages`
/// fail to decode; `delays` stall `open` to stage races.
#[derive(Debug, Default, Clone)]
pub struct FakeParser {
    docs: HashMap<Vec<u8>, Vec<Vec<GlyphRecord>>>,
    broken_pages: HashMap<Vec<u8>, Vec<u32>>,
    delays: HashMap<Vec<u8>, Duration>,
}

impl FakeParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_doc(mut self, key: &[u8], pages: Vec<Vec<GlyphRecord>>) -> Self {
        self.docs.insert(key.to_vec(), pages);
        self
    }

    pub fn with_broken_page(mut self, key: &[u8], page_index: u32) -> Self {
        self.broken_pages
            .entry(key.to_vec())
            .or_default()
            .push(page_index);
        self
    }

    pub fn with_delay(mut self, key: &[u8], delay: Duration) -> Self {
        self.delays.insert(key.to_vec(), delay);
        self
    }
}

#[derive(Debug, Clone)]
pub struct FakeDocument {
    pages: Vec<Vec<GlyphRecord>>,
    broken: Vec<u32>,
}

impl GlyphParser for FakeParser {
    type Document = FakeDocument;

    fn open(&self, bytes: &[u8]) -> Result<FakeDocument> {
        if let Some(delay) = self.delays.get(bytes) {
            std::thread::sleep(*delay);
        }
        let pages = self
            .docs
            .get(bytes)
            .cloned()
            .ok_or_else(|| Error::parse("unrecognized fixture bytes"))?;
        Ok(FakeDocument {
            pages,
            broken: self.broken_pages.get(bytes).cloned().unwrap_or_default(),
        })
    }
}

impl ParsedDocument for FakeDocument {
    fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    fn page_size(&self, _page_index: u32) -> Result<PageSize> {
        Ok(LETTER)
    }

    fn page_glyphs(&self, page_index: u32) -> Result<Vec<GlyphRecord>> {
        if self.broken.contains(&page_index) {
            return Err(Error::PageDecodeFailed {
                page: page_index,
                reason: "corrupt content stream".to_string(),
            });
        }
        self.pages
            .get(page_index as usize - 1)
            .cloned()
            .ok_or_else(|| Error::PageDecodeFailed {
                page: page_index,
                reason: "no such page".to_string(),
            })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WriterCall {
    Fill {
        page: u32,
        rect: Rect,
        color: Rgb,
    },
    Text {
        page: u32,
        text: String,
        origin: Point,
        size: f64,
        color: Rgb,
    },
}

/// Writer that records every accepted call into a shared log and rejects
/// text containing any of `reject`.
#[derive(Debug, Clone)]
pub struct RecordingWriter {
    pages: u32,
    reject: Vec<String>,
    log: Arc<Mutex<Vec<WriterCall>>>,
}

impl RecordingWriter {
    pub fn new(pages: u32) -> Self {
        Self {
            pages,
            reject: Vec::new(),
            log: Arc::default(),
        }
    }

    pub fn rejecting(mut self, fragment: &str) -> Self {
        self.reject.push(fragment.to_string());
        self
    }

    pub fn calls(&self) -> Vec<WriterCall> {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                WriterCall::Text { text, .. } => Some(text),
                WriterCall::Fill { .. } => None,
            })
            .collect()
    }
}

#[derive(Debug)]
pub struct RecordingDocument {
    pages: u32,
    reject: Vec<String>,
    calls: Vec<WriterCall>,
    log: Arc<Mutex<Vec<WriterCall>>>,
}

impl DocumentWriter for RecordingWriter {
    type Document = RecordingDocument;

    fn open(&self, bytes: &[u8]) -> Result<RecordingDocument> {
        if bytes.is_empty() {
            return Err(Error::parse("empty document"));
        }
        Ok(RecordingDocument {
            pages: self.pages,
            reject: self.reject.clone(),
            calls: Vec::new(),
            log: Arc::clone(&self.log),
        })
    }
}

impl WritableDocument for RecordingDocument {
    fn page_sizes(&self) -> Vec<PageSize> {
        vec![LETTER; self.pages as usize]
    }

    fn embed_font(&mut self) -> Result<FontHandle> {
        Ok(FontHandle(0))
    }

    fn fill_rect(&mut self, page_index: u32, rect: Rect, color: Rgb) -> Result<()> {
        self.calls.push(WriterCall::Fill {
            page: page_index,
            rect,
            color,
        });
        Ok(())
    }

    fn draw_text(
        &mut self,
        page_index: u32,
        text: &str,
        origin: Point,
        size: f64,
        _font: FontHandle,
        color: Rgb,
    ) -> std::result::Result<(), DrawRejected> {
        if let Some(fragment) = self.reject.iter().find(|f| text.contains(f.as_str())) {
            return Err(DrawRejected(format!("cannot encode {fragment:?}")));
        }
        self.calls.push(WriterCall::Text {
            page: page_index,
            text: text.to_string(),
            origin,
            size,
            color,
        });
        Ok(())
    }

    fn save(self) -> Result<Vec<u8>> {
        let mut log = self.log.lock().unwrap_or_else(PoisonError::into_inner);
        *log = self.calls;
        Ok(b"%PDF-recorded".to_vec())
    }
}

/// A line of text to place on a generated page.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedText {
    pub text: String,
    pub x: f64,
    pub y: f64,
    pub size: f64,
}

pub fn placed(text: &str, x: f64, y: f64, size: f64) -> PlacedText {
    PlacedText {
        text: text.to_string(),
        x,
        y,
        size,
    }
}

/// Builds a letter-size PDF with one Helvetica `Tj` per placed text.
pub fn text_pdf(pages: &[Vec<PlacedText>]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let media_box = || Object::Array(vec![0.into(), 0.into(), 612.into(), 792.into()]);

    let mut kids: Vec<Object> = Vec::new();
    for texts in pages {
        let mut operations = Vec::new();
        for item in texts {
            operations.extend([
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), Object::Real(item.size as f32)]),
                Operation::new(
                    "Td",
                    vec![Object::Real(item.x as f32), Object::Real(item.y as f32)],
                ),
                Operation::new(
                    "Tj",
                    vec![Object::String(latin1(&item.text), StringFormat::Literal)],
                ),
                Operation::new("ET", vec![]),
            ]);
        }
        let content = Content { operations }
            .encode()
            .unwrap_or_default();
        let content_id = doc.add_object(Stream::new(dictionary! {}, content));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => media_box(),
            "Contents" => content_id,
            "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
        });
        kids.push(page_id.into());
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages.len() as i64,
            "MediaBox" => media_box(),
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out)
        .unwrap_or_else(|err| panic!("fixture pdf did not serialize: {err}"));
    out
}

/// One page whose only text sits inside a form XObject: the page moves by
/// `(100, 50)`, the form matrix by `(10, 20)`, and the form shows
/// `Inside` at `(5, 5)` in 10pt Helvetica.
pub fn form_pdf() -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let form_content = Content {
        operations: vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 10.into()]),
            Operation::new("Td", vec![5.into(), 5.into()]),
            Operation::new("Tj", vec![Object::string_literal("Inside")]),
            Operation::new("ET", vec![]),
        ],
    }
    .encode()
    .unwrap_or_default();
    let form_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Form",
            "BBox" => Object::Array(vec![0.into(), 0.into(), 200.into(), 100.into()]),
            "Matrix" => Object::Array(
                [1_i64, 0, 0, 1, 10, 20].into_iter().map(Object::from).collect()
            ),
            "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
        },
        form_content,
    ));
    let page_content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![1.into(), 0.into(), 0.into(), 1.into(), 100.into(), 50.into()],
            ),
            Operation::new("Do", vec!["Fm1".into()]),
            Operation::new("Q", vec![]),
        ],
    }
    .encode()
    .unwrap_or_default();
    let content_id = doc.add_object(Stream::new(dictionary! {}, page_content));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => Object::Array(vec![0.into(), 0.into(), 612.into(), 792.into()]),
        "Contents" => content_id,
        "Resources" => dictionary! { "XObject" => dictionary! { "Fm1" => form_id } },
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out)
        .unwrap_or_else(|err| panic!("fixture pdf did not serialize: {err}"));
    out
}

/// Rewrites the root `/Count` of the page tree, leaving the kids alone.
pub fn with_declared_page_count(bytes: &[u8], count: i64) -> Vec<u8> {
    let mut doc = Document::load_mem(bytes)
        .unwrap_or_else(|err| panic!("fixture is not a readable pdf: {err}"));
    let pages_id = doc
        .catalog()
        .and_then(|catalog| catalog.get(b"Pages"))
        .and_then(Object::as_reference)
        .unwrap_or_else(|err| panic!("fixture has no page tree: {err}"));
    doc.get_dictionary_mut(pages_id)
        .unwrap_or_else(|err| panic!("page tree is not a dictionary: {err}"))
        .set("Count", count);

    let mut out = Vec::new();
    doc.save_to(&mut out)
        .unwrap_or_else(|err| panic!("fixture pdf did not serialize: {err}"));
    out
}

fn latin1(text: &str) -> Vec<u8> {
    text.chars()
        .map(|ch| u8::try_from(u32::from(ch)).unwrap_or(b'?'))
        .collect()
}

/// Content-stream operations of `page` (1-based) in a serialized PDF.
pub fn page_operations(bytes: &[u8], page: u32) -> Vec<Operation> {
    let doc = Document::load_mem(bytes)
        .unwrap_or_else(|err| panic!("output is not a readable pdf: {err}"));
    let page_id = doc
        .get_pages()
        .get(&page)
        .copied()
        .unwrap_or_else(|| panic!("page {page} missing"));
    let content = doc
        .get_page_content(page_id)
        .unwrap_or_else(|err| panic!("page {page} content unreadable: {err}"));
    Content::decode(&content)
        .unwrap_or_else(|err| panic!("page {page} content undecodable: {err}"))
        .operations
}

/// Numeric operands of an operation, integers included.
pub fn numbers(op: &Operation) -> Vec<f64> {
    op.operands
        .iter()
        .filter_map(|obj| match obj {
            Object::Integer(v) => Some(*v as f64),
            Object::Real(v) => Some(f64::from(*v)),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fake_parser_serves_registered_docs() {
        let parser = FakeParser::new()
            .with_doc(b"a", vec![vec![glyph("hi", 1.0, 2.0, 10.0)]])
            .with_broken_page(b"a", 2);
        let doc = parser.open(b"a").unwrap();
        assert_eq!(doc.page_count(), 1);
        assert_eq!(doc.page_glyphs(1).unwrap()[0].text, "hi");
        assert!(parser.open(b"b").is_err());
    }

    #[test]
    fn generated_pdf_has_one_show_per_text() {
        let bytes = text_pdf(&[vec![placed("one", 10.0, 20.0, 9.0), placed("two", 10.0, 40.0, 9.0)]]);
        let shows = page_operations(&bytes, 1)
            .into_iter()
            .filter(|op| op.operator == "Tj")
            .count();
        assert_eq!(shows, 2);
    }

    #[test]
    fn scratch_dir_is_removed_on_drop() {
        let scratch = ScratchDir::new("self-check");
        std::fs::create_dir_all(scratch.path()).unwrap();
        std::fs::write(scratch.path().join("file"), b"x").unwrap();
        let path = scratch.path().to_path_buf();
        drop(scratch);
        assert!(!path.exists());
    }

    #[test]
    fn recording_writer_publishes_on_save() {
        let writer = RecordingWriter::new(1).rejecting("bad");
        let mut doc = writer.open(b"x").unwrap();
        let font = doc.embed_font().unwrap();
        doc.draw_text(1, "good", Point { x: 0.0, y: 0.0 }, 10.0, font, Rgb::BLACK)
            .unwrap();
        assert!(doc.draw_text(1, "bad", Point { x: 0.0, y: 0.0 }, 10.0, font, Rgb::BLACK).is_err());
        assert!(writer.calls().is_empty());
        doc.save().unwrap();
        assert_eq!(writer.texts(), vec!["good"]);
    }
}
