//! Overlay writer: appends occlusion rectangles and replacement text to the
//! pages of an existing PDF.

use std::collections::BTreeMap;

use anyhow::Context as _;
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat, dictionary};
use overtype_core::{
    DocumentWriter, DrawRejected, Error, FontHandle, PageSize, Point, Rect, Rgb, WritableDocument,
};
use tracing::debug;

use crate::winansi;

/// Fallback when a page has no usable MediaBox (US Letter).
const DEFAULT_PAGE_SIZE: PageSize = PageSize {
    width: 612.0,
    height: 792.0,
};

/// Parent links followed when resolving inherited page attributes.
const MAX_INHERIT_DEPTH: usize = 32;

#[derive(Debug, Clone, Copy, Default)]
pub struct PdfWriter;

impl PdfWriter {
    pub fn new() -> Self {
        Self
    }
}

impl DocumentWriter for PdfWriter {
    type Document = OverlayDocument;

    fn open(&self, bytes: &[u8]) -> overtype_core::Result<OverlayDocument> {
        let doc = Document::load_mem(bytes)
            .context("load pdf for writing")
            .map_err(|err| Error::parse(format!("{err:#}")))?;
        let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();
        debug!(pages = pages.len(), "opened pdf for writing");
        Ok(OverlayDocument {
            doc,
            pages,
            font: None,
            pending: BTreeMap::new(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Mark {
    Fill {
        rect: Rect,
        color: Rgb,
    },
    Text {
        encoded: Vec<u8>,
        origin: Point,
        size: f64,
        color: Rgb,
    },
}

/// A loaded document plus the marks queued per page. Nothing touches the
/// underlying objects until [`WritableDocument::save`].
#[derive(Debug)]
pub struct OverlayDocument {
    doc: Document,
    pages: Vec<ObjectId>,
    font: Option<ObjectId>,
    pending: BTreeMap<u32, Vec<Mark>>,
}

impl WritableDocument for OverlayDocument {
    fn page_sizes(&self) -> Vec<PageSize> {
        self.pages
            .iter()
            .map(|&id| media_box_size(&self.doc, id).unwrap_or(DEFAULT_PAGE_SIZE))
            .collect()
    }

    fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    fn embed_font(&mut self) -> overtype_core::Result<FontHandle> {
        if self.font.is_none() {
            let id = self.doc.add_object(dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => "Helvetica",
                "Encoding" => "WinAnsiEncoding",
            });
            self.font = Some(id);
        }
        Ok(FontHandle(0))
    }

    fn fill_rect(&mut self, page_index: u32, rect: Rect, color: Rgb) -> overtype_core::Result<()> {
        self.check_page(page_index).map_err(Error::reconstruct)?;
        self.pending
            .entry(page_index)
            .or_default()
            .push(Mark::Fill { rect, color });
        Ok(())
    }

    fn draw_text(
        &mut self,
        page_index: u32,
        text: &str,
        origin: Point,
        size: f64,
        font: FontHandle,
        color: Rgb,
    ) -> Result<(), DrawRejected> {
        self.check_page(page_index).map_err(DrawRejected)?;
        if self.font.is_none() || font != FontHandle(0) {
            return Err(DrawRejected(format!("font {} is not embedded", font.0)));
        }
        if !origin.x.is_finite() || !origin.y.is_finite() || !size.is_finite() {
            return Err(DrawRejected("non-finite text position".to_string()));
        }
        let encoded = winansi::encode(text)
            .map_err(|ch| DrawRejected(format!("{ch:?} has no WinAnsi code")))?;
        self.pending.entry(page_index).or_default().push(Mark::Text {
            encoded,
            origin,
            size,
            color,
        });
        Ok(())
    }

    fn save(mut self) -> overtype_core::Result<Vec<u8>> {
        let pending = std::mem::take(&mut self.pending);
        for (page_index, marks) in pending {
            let page_id = self.pages[page_index as usize - 1];
            self.apply_marks(page_id, &marks)
                .with_context(|| format!("write overlay on page {page_index}"))
                .map_err(|err| Error::reconstruct(format!("{err:#}")))?;
        }

        let mut out = Vec::new();
        self.doc
            .save_to(&mut out)
            .context("serialize pdf")
            .map_err(|err| Error::reconstruct(format!("{err:#}")))?;
        Ok(out)
    }
}

impl OverlayDocument {
    fn check_page(&self, page_index: u32) -> Result<(), String> {
        if page_index == 0 || page_index as usize > self.pages.len() {
            return Err(format!(
                "page {page_index} outside document of {} pages",
                self.pages.len()
            ));
        }
        Ok(())
    }

    /// Wraps the existing content in `q`/`Q` and appends one overlay stream.
    fn apply_marks(&mut self, page_id: ObjectId, marks: &[Mark]) -> anyhow::Result<()> {
        let font_name = match self.font {
            Some(font_id) => Some(self.install_font(page_id, font_id)?),
            None => None,
        };

        let mut operations = vec![Operation::new("Q", vec![])];
        for mark in marks {
            operations.extend(mark_operations(mark, font_name.as_deref()));
        }
        // Streams of a Contents array are read as one; keep ours delimited.
        let mut overlay = vec![b'\n'];
        overlay.extend(
            Content { operations }
                .encode()
                .context("encode overlay content")?,
        );
        overlay.push(b'\n');
        let mut prefix = Content {
            operations: vec![Operation::new("q", vec![])],
        }
        .encode()
        .context("encode content prefix")?;
        prefix.push(b'\n');

        let mut contents = vec![Object::Reference(
            self.doc.add_object(Stream::new(Dictionary::new(), prefix)),
        )];
        contents.extend(existing_contents(&self.doc, page_id)?);
        contents.push(Object::Reference(
            self.doc.add_object(Stream::new(Dictionary::new(), overlay)),
        ));

        self.doc
            .get_dictionary_mut(page_id)
            .context("page dictionary")?
            .set("Contents", Object::Array(contents));
        Ok(())
    }

    /// Gives the page its own copy of its resources with the overlay font
    /// added under a name the page does not already use.
    fn install_font(&mut self, page_id: ObjectId, font_id: ObjectId) -> anyhow::Result<String> {
        let mut resources = match inherited(&self.doc, page_id, b"Resources")
            .map(|obj| resolve(&self.doc, obj))
        {
            Some(Object::Dictionary(dict)) => dict.clone(),
            _ => Dictionary::new(),
        };
        let mut fonts = match resources.get(b"Font").ok().map(|obj| resolve(&self.doc, obj)) {
            Some(Object::Dictionary(dict)) => dict.clone(),
            _ => Dictionary::new(),
        };

        let mut suffix = 0usize;
        let name = loop {
            let candidate = format!("OvF{suffix}");
            match fonts.get(candidate.as_bytes()) {
                Ok(Object::Reference(existing)) if *existing == font_id => break candidate,
                Ok(_) => suffix += 1,
                Err(_) => break candidate,
            }
        };
        fonts.set(name.clone(), Object::Reference(font_id));
        resources.set("Font", Object::Dictionary(fonts));

        self.doc
            .get_dictionary_mut(page_id)
            .context("page dictionary")?
            .set("Resources", Object::Dictionary(resources));
        Ok(name)
    }
}

fn mark_operations(mark: &Mark, font_name: Option<&str>) -> Vec<Operation> {
    match mark {
        Mark::Fill { rect, color } => vec![
            Operation::new("q", vec![]),
            Operation::new("rg", color_operands(*color)),
            Operation::new(
                "re",
                vec![real(rect.x), real(rect.y), real(rect.width), real(rect.height)],
            ),
            Operation::new("f", vec![]),
            Operation::new("Q", vec![]),
        ],
        Mark::Text {
            encoded,
            origin,
            size,
            color,
        } => {
            let Some(font_name) = font_name else {
                return Vec::new();
            };
            vec![
                Operation::new("q", vec![]),
                Operation::new("rg", color_operands(*color)),
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec![Object::Name(font_name.as_bytes().to_vec()), real(*size)]),
                Operation::new("Td", vec![real(origin.x), real(origin.y)]),
                Operation::new(
                    "Tj",
                    vec![Object::String(encoded.clone(), StringFormat::Literal)],
                ),
                Operation::new("ET", vec![]),
                Operation::new("Q", vec![]),
            ]
        }
    }
}

fn color_operands(color: Rgb) -> Vec<Object> {
    vec![real(color.r), real(color.g), real(color.b)]
}

fn real(value: f64) -> Object {
    Object::Real(value as f32)
}

fn existing_contents(doc: &Document, page_id: ObjectId) -> anyhow::Result<Vec<Object>> {
    let page = doc.get_dictionary(page_id).context("page dictionary")?;
    let contents = match page.get(b"Contents") {
        Ok(Object::Reference(id)) => match doc.get_object(*id) {
            Ok(Object::Array(items)) => items.clone(),
            _ => vec![Object::Reference(*id)],
        },
        Ok(Object::Array(items)) => items.clone(),
        _ => Vec::new(),
    };
    Ok(contents)
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        other => other,
    }
}

/// Looks `key` up on the page, then on its `Parent` chain.
fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_INHERIT_DEPTH {
        if let Ok(value) = node.get(key) {
            return Some(value);
        }
        let parent = node.get(b"Parent").ok()?.as_reference().ok()?;
        node = doc.get_dictionary(parent).ok()?;
    }
    None
}

fn number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(v) => Some(*v as f64),
        Object::Real(v) => Some(f64::from(*v)),
        _ => None,
    }
}

fn media_box_size(doc: &Document, page_id: ObjectId) -> Option<PageSize> {
    let media_box = resolve(doc, inherited(doc, page_id, b"MediaBox")?);
    let values: Vec<f64> = media_box
        .as_array()
        .ok()?
        .iter()
        .map(|obj| number(resolve(doc, obj)))
        .collect::<Option<_>>()?;
    let [x0, y0, x1, y1] = values.as_slice() else {
        return None;
    };
    Some(PageSize {
        width: (x1 - x0).abs(),
        height: (y1 - y0).abs(),
    })
}
