//! Glyph-run extraction from PDF content streams.

use std::collections::HashMap;

use anyhow::Context as _;
use overtype_core::{Error, GlyphParser, GlyphRecord, PageSize, ParsedDocument, Transform};
use pdf::content::{FormXObject, Matrix, Op, TextDrawAdjusted};
use pdf::file::{CachedFile, FileOptions};
use pdf::font::{Font, ToUnicodeMap, Widths};
use pdf::object::{Object as _, PageTree, PagesNode, Resolve, Resources, XObject};
use pdf::primitive::Name;
use tracing::debug;

use crate::winansi;

/// `TJ` offsets at or below this (thousandths of an em) read as a word gap.
const TJ_INSERT_SPACE_THRESHOLD: f32 = -200.0;

/// Same bound the pdf crate applies when looking pages up.
const MAX_PAGE_TREE_DEPTH: usize = 16;

/// Nested form XObjects followed before giving up.
const MAX_FORM_DEPTH: usize = 8;

/// Helvetica advances (per mille) for codes 32..=126, used when a font
/// declares no widths of its own.
const HELVETICA_ASCII_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // space../
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // 0..?
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // @..O
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // P.._
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // `..o
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // p..~
];
const HELVETICA_OTHER_WIDTH: f64 = 556.0;
const COURIER_WIDTH: f64 = 600.0;
const CID_DEFAULT_WIDTH: f64 = 1000.0;

#[derive(Debug, Clone, Copy, Default)]
pub struct PdfParser;

impl PdfParser {
    pub fn new() -> Self {
        Self
    }
}

pub struct PdfDocument {
    file: CachedFile<Vec<u8>>,
    page_count: u32,
}

impl std::fmt::Debug for PdfDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfDocument")
            .field("pages", &self.page_count)
            .finish()
    }
}

impl GlyphParser for PdfParser {
    type Document = PdfDocument;

    fn open(&self, bytes: &[u8]) -> overtype_core::Result<PdfDocument> {
        let file = FileOptions::cached()
            .load(bytes.to_vec())
            .context("open pdf")
            .map_err(|err| Error::parse(format!("{err:#}")))?;

        let declared = file.num_pages();
        let mut page_count = 0;
        count_leaves(
            &file.get_root().pages,
            &file.resolver(),
            MAX_PAGE_TREE_DEPTH,
            declared,
            &mut page_count,
        );
        if page_count != declared {
            debug!(declared, found = page_count, "page tree count disagrees with its leaves");
        }
        debug!(pages = page_count, "opened pdf");
        Ok(PdfDocument { file, page_count })
    }
}

/// Counts leaves reachable from `tree`, stopping at `limit`. The `/Count`
/// entries are not trusted.
fn count_leaves(
    tree: &PageTree,
    resolver: &impl Resolve,
    depth: usize,
    limit: u32,
    count: &mut u32,
) {
    if depth == 0 {
        return;
    }
    for &kid in &tree.kids {
        if *count >= limit {
            return;
        }
        let node = match resolver.get(kid) {
            Ok(node) => node,
            Err(err) => {
                debug!(error = %err, "unreadable page tree node");
                continue;
            }
        };
        match *node {
            PagesNode::Tree(ref subtree) => {
                count_leaves(subtree, resolver, depth - 1, limit, count);
            }
            PagesNode::Leaf(_) => *count += 1,
        }
    }
}

impl ParsedDocument for PdfDocument {
    fn page_count(&self) -> u32 {
        self.page_count
    }

    fn page_size(&self, page_index: u32) -> overtype_core::Result<PageSize> {
        self.crop_box_size(page_index)
            .map_err(|err| page_error(page_index, err))
    }

    fn page_glyphs(&self, page_index: u32) -> overtype_core::Result<Vec<GlyphRecord>> {
        self.glyphs(page_index)
            .map_err(|err| page_error(page_index, err))
    }
}

impl PdfDocument {
    fn crop_box_size(&self, page_index: u32) -> anyhow::Result<PageSize> {
        let page = self
            .file
            .get_page(self.zero_based(page_index)?)
            .with_context(|| format!("get pdf page {page_index} for page size"))?;
        let rect = page
            .crop_box()
            .map_err(|err| anyhow::anyhow!(err))
            .context("get page crop box")?;
        Ok(PageSize {
            width: f64::from((rect.right - rect.left).abs().max(1.0)),
            height: f64::from((rect.top - rect.bottom).abs().max(1.0)),
        })
    }

    fn glyphs(&self, page_index: u32) -> anyhow::Result<Vec<GlyphRecord>> {
        let resolver = self.file.resolver();
        let page = self
            .file
            .get_page(self.zero_based(page_index)?)
            .with_context(|| format!("get pdf page {page_index}"))?;
        let Some(content) = &page.contents else {
            return Ok(Vec::new());
        };
        let resources = page.resources().context("page resources")?;
        let ops = content
            .operations(&resolver)
            .context("decode content stream")?;
        Ok(ops_to_glyphs(&ops, &resolver, resources))
    }

    fn zero_based(&self, page_index: u32) -> anyhow::Result<u32> {
        if page_index == 0 || page_index > self.page_count {
            anyhow::bail!("page {page_index} outside document of {} pages", self.page_count);
        }
        Ok(page_index - 1)
    }
}

fn page_error(page: u32, err: anyhow::Error) -> Error {
    Error::PageDecodeFailed {
        page,
        reason: format!("{err:#}"),
    }
}

/// Graphics state entries that matter for text placement.
#[derive(Debug, Clone)]
struct TextGraphicsState {
    ctm: Transform,
    font: Option<Name>,
    font_size: f64,
    leading: f64,
    horizontal_scale: f64,
    rise: f64,
    char_spacing: f64,
    word_spacing: f64,
}

impl Default for TextGraphicsState {
    fn default() -> Self {
        Self {
            ctm: Transform::IDENTITY,
            font: None,
            font_size: 0.0,
            leading: 0.0,
            horizontal_scale: 1.0,
            rise: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
        }
    }
}

impl TextGraphicsState {
    /// Text rendering matrix for a run starting at `text_matrix`.
    fn rendering_matrix(&self, text_matrix: &Transform) -> Transform {
        let size = Transform::new(
            self.font_size * self.horizontal_scale,
            0.0,
            0.0,
            self.font_size,
            0.0,
            self.rise,
        );
        size.then(text_matrix).then(&self.ctm)
    }
}

fn matrix(m: &Matrix) -> Transform {
    Transform::new(
        f64::from(m.a),
        f64::from(m.b),
        f64::from(m.c),
        f64::from(m.d),
        f64::from(m.e),
        f64::from(m.f),
    )
}

/// What a font contributes to decoding and measuring shown strings.
#[derive(Default)]
struct FontMetrics {
    to_unicode: Option<ToUnicodeMap>,
    widths: Option<Widths>,
    two_byte: bool,
    monospace: bool,
}

impl FontMetrics {
    fn load(font: &Font, resolver: &impl Resolve) -> Self {
        let base_font = font.name.as_deref().unwrap_or_default();
        Self {
            to_unicode: font.to_unicode(resolver).and_then(Result::ok),
            widths: font.widths(resolver).ok().flatten(),
            two_byte: font.is_cid(),
            monospace: base_font.contains("Courier"),
        }
    }

    fn lookup(name: Option<&Name>, resources: &Resources, resolver: &impl Resolve) -> Self {
        let Some(name) = name else {
            return Self::default();
        };
        match resources.fonts.get(name).map(|lazy| lazy.load(resolver)) {
            Some(Ok(font)) => Self::load(&font, resolver),
            Some(Err(err)) => {
                debug!(
                    font = %name.as_str(),
                    error = %err,
                    "font unreadable, using fallback metrics"
                );
                Self::default()
            }
            None => Self::default(),
        }
    }

    /// Character codes of a shown string; a trailing odd byte of a
    /// two-byte string is its own code.
    fn codes(&self, bytes: &[u8]) -> impl Iterator<Item = u32> {
        let width = if self.two_byte { 2 } else { 1 };
        bytes
            .chunks(width)
            .map(|chunk| chunk.iter().fold(0u32, |code, &b| (code << 8) | u32::from(b)))
    }

    fn push_text(&self, code: u32, out: &mut String) {
        let mapped = self
            .to_unicode
            .as_ref()
            .zip(u16::try_from(code).ok())
            .and_then(|(map, code)| map.get(code));
        if let Some(mapped) = mapped {
            out.push_str(mapped);
        } else if !self.two_byte
            && let Some(ch) = u8::try_from(code).ok().and_then(winansi::decode_byte)
        {
            out.push(ch);
        }
    }

    /// Glyph-space advance of `code` in thousandths of an em.
    fn width(&self, code: u32) -> f64 {
        if let Some(widths) = &self.widths {
            return f64::from(widths.get(code as usize));
        }
        if self.two_byte {
            return CID_DEFAULT_WIDTH;
        }
        if self.monospace {
            return COURIER_WIDTH;
        }
        code.checked_sub(32)
            .and_then(|i| HELVETICA_ASCII_WIDTHS.get(i as usize))
            .map_or(HELVETICA_OTHER_WIDTH, |&w| f64::from(w))
    }
}

/// Text and horizontal displacement accumulated by one show operator.
#[derive(Debug, Default)]
struct ShownRun {
    text: String,
    /// Text-space displacement, horizontal scaling applied.
    advance: f64,
    pending_space: bool,
}

impl ShownRun {
    fn show(&mut self, bytes: &[u8], metrics: &FontMetrics, state: &TextGraphicsState) {
        let mut piece = String::new();
        for code in metrics.codes(bytes) {
            metrics.push_text(code, &mut piece);
            let word_spacing = if !metrics.two_byte && code == 32 {
                state.word_spacing
            } else {
                0.0
            };
            self.advance += (metrics.width(code) / 1000.0 * state.font_size
                + state.char_spacing
                + word_spacing)
                * state.horizontal_scale;
        }
        self.append(&piece);
    }

    fn adjust(&mut self, offset: f32, state: &TextGraphicsState) {
        self.advance -= f64::from(offset) / 1000.0 * state.font_size * state.horizontal_scale;
        if offset <= TJ_INSERT_SPACE_THRESHOLD {
            self.pending_space = true;
        }
    }

    fn append(&mut self, piece: &str) {
        let piece = sanitize_extracted_text(piece);
        if piece.is_empty() {
            return;
        }
        if std::mem::take(&mut self.pending_space)
            && !self.text.is_empty()
            && !self.text.ends_with(' ')
            && !piece.starts_with(char::is_whitespace)
        {
            self.text.push(' ');
        }
        self.text.push_str(&piece);
    }
}

/// One record per text-showing operator, positioned by the text state at
/// the start of the run and measured by the font's advances. Form XObjects
/// are followed with their own resources.
fn ops_to_glyphs(ops: &[Op], resolver: &impl Resolve, resources: &Resources) -> Vec<GlyphRecord> {
    let mut walker = ContentWalker {
        resolver,
        out: Vec::new(),
    };
    walker.walk(ops, resources, TextGraphicsState::default(), 0);
    walker.out
}

struct ContentWalker<'r, R> {
    resolver: &'r R,
    out: Vec<GlyphRecord>,
}

impl<R: Resolve> ContentWalker<'_, R> {
    fn walk(&mut self, ops: &[Op], resources: &Resources, mut state: TextGraphicsState, depth: usize) {
        let mut fonts: HashMap<Option<Name>, FontMetrics> = HashMap::new();
        let mut stack: Vec<TextGraphicsState> = Vec::new();
        let mut text_matrix = Transform::IDENTITY;
        let mut line_matrix = Transform::IDENTITY;

        for op in ops {
            match op {
                Op::Save => stack.push(state.clone()),
                Op::Restore => {
                    if let Some(saved) = stack.pop() {
                        state = saved;
                    }
                }
                Op::Transform { matrix: m } => {
                    state.ctm = matrix(m).then(&state.ctm);
                }
                Op::BeginText => {
                    text_matrix = Transform::IDENTITY;
                    line_matrix = Transform::IDENTITY;
                }
                Op::TextFont { name, size } => {
                    state.font = Some(name.clone());
                    state.font_size = f64::from(*size);
                }
                Op::Leading { leading } => state.leading = f64::from(*leading),
                Op::TextScaling { horiz_scale } => {
                    state.horizontal_scale = f64::from(*horiz_scale) / 100.0;
                }
                Op::TextRise { rise } => state.rise = f64::from(*rise),
                Op::CharSpacing { char_space } => state.char_spacing = f64::from(*char_space),
                Op::WordSpacing { word_space } => state.word_spacing = f64::from(*word_space),
                Op::MoveTextPosition { translation } => {
                    line_matrix =
                        Transform::translate(f64::from(translation.x), f64::from(translation.y))
                            .then(&line_matrix);
                    text_matrix = line_matrix;
                }
                Op::SetTextMatrix { matrix: m } => {
                    line_matrix = matrix(m);
                    text_matrix = line_matrix;
                }
                Op::TextNewline => {
                    line_matrix = Transform::translate(0.0, -state.leading).then(&line_matrix);
                    text_matrix = line_matrix;
                }
                Op::TextDraw { text } => {
                    let metrics = fonts.entry(state.font.clone()).or_insert_with(|| {
                        FontMetrics::lookup(state.font.as_ref(), resources, self.resolver)
                    });
                    let mut run = ShownRun::default();
                    run.show(text.as_bytes(), metrics, &state);
                    self.emit(run, &state, &mut text_matrix);
                }
                Op::TextDrawAdjusted { array } => {
                    let metrics = fonts.entry(state.font.clone()).or_insert_with(|| {
                        FontMetrics::lookup(state.font.as_ref(), resources, self.resolver)
                    });
                    let mut run = ShownRun::default();
                    for item in array {
                        match item {
                            TextDrawAdjusted::Text(text) => {
                                run.show(text.as_bytes(), metrics, &state);
                            }
                            TextDrawAdjusted::Spacing(offset) => run.adjust(*offset, &state),
                        }
                    }
                    self.emit(run, &state, &mut text_matrix);
                }
                Op::XObject { name } => {
                    if depth >= MAX_FORM_DEPTH {
                        debug!(xobject = %name.as_str(), "form nesting too deep, skipped");
                        continue;
                    }
                    if let Err(err) = self.enter_xobject(name, resources, &state, depth) {
                        let reason = format!("{err:#}");
                        debug!(xobject = %name.as_str(), error = %reason, "form skipped");
                    }
                }
                _ => {}
            }
        }
    }

    fn enter_xobject(
        &mut self,
        name: &Name,
        resources: &Resources,
        state: &TextGraphicsState,
        depth: usize,
    ) -> anyhow::Result<()> {
        let Some(&xobject_ref) = resources.xobjects.get(name) else {
            return Ok(());
        };
        let xobject = self.resolver.get(xobject_ref).context("resolve xobject")?;
        if let XObject::Form(form) = &*xobject {
            self.walk_form(form, resources, state, depth)?;
        }
        Ok(())
    }

    fn walk_form(
        &mut self,
        form: &FormXObject,
        parent_resources: &Resources,
        state: &TextGraphicsState,
        depth: usize,
    ) -> anyhow::Result<()> {
        let dict = form.dict();
        let mut inner = state.clone();
        if let Some(primitive) = &dict.matrix {
            let form_matrix =
                Matrix::from_primitive(primitive.clone(), self.resolver).context("form matrix")?;
            inner.ctm = matrix(&form_matrix).then(&state.ctm);
        }
        let resources = dict.resources.as_deref().unwrap_or(parent_resources);
        let ops = form
            .operations(self.resolver)
            .context("decode form content")?;
        self.walk(&ops, resources, inner, depth + 1);
        Ok(())
    }

    /// Records the run and moves the text matrix past it.
    fn emit(&mut self, run: ShownRun, state: &TextGraphicsState, text_matrix: &mut Transform) {
        let to_device = text_matrix.then(&state.ctm);
        self.out.push(GlyphRecord {
            text: run.text,
            transform: state.rendering_matrix(text_matrix),
            advance_width: Some(run.advance * to_device.a.hypot(to_device.b)),
        });
        *text_matrix = Transform::translate(run.advance, 0.0).then(text_matrix);
    }
}

/// Drops replacement, control, private-use and noncharacter code points.
fn sanitize_extracted_text(s: &str) -> String {
    s.chars().filter(|&ch| is_visible(ch)).collect()
}

fn is_visible(ch: char) -> bool {
    let hidden = ch == char::REPLACEMENT_CHARACTER
        || ch.is_control()
        // private use, BMP and planes 15-16
        || matches!(ch, '\u{E000}'..='\u{F8FF}' | '\u{F0000}'..='\u{10FFFF}')
        // noncharacters
        || matches!(ch, '\u{FDD0}'..='\u{FDEF}')
        || (u32::from(ch) & 0xFFFE) == 0xFFFE;
    !hidden
}
