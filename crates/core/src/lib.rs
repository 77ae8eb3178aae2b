//! Core domain types for Overtype.

use serde::{Deserialize, Serialize};

pub mod collab;
pub mod decode;
pub mod error;
pub mod normalize;
pub mod viewport;

pub use collab::{
    DocumentWriter, DrawRejected, FontHandle, GlyphParser, ParsedDocument, WritableDocument,
};
pub use error::{Error, Result};
pub use viewport::{ViewportPoint, ViewportRect, Zoom};

/// Stable run identifier, rendered as `<page>-<sequence>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub String);

impl RunId {
    pub fn new(page_index: u32, sequence: usize) -> Self {
        Self(format!("{page_index}-{sequence}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RunId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// One editable piece of positioned text.
///
/// Geometry is in document space (origin bottom-left, unscaled). Only `text`
/// changes after extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRun {
    pub id: RunId,
    pub text: String,
    pub origin_x: f64,
    pub origin_y: f64,
    pub width: f64,
    pub height: f64,
    pub font_size: f64,
    /// 1-based.
    pub page_index: u32,
}

/// A glyph run as reported by the parser collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct GlyphRecord {
    pub text: String,
    pub transform: Transform,
    pub advance_width: Option<f64>,
}

/// 2D affine matrix `[a b c d e f]` in PDF row-vector convention.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    pub fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Self { a, b, c, d, e, f }
    }

    pub fn translate(x: f64, y: f64) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, x, y)
    }

    /// `self × other`: apply `self` first, then `other`.
    pub fn then(&self, other: &Transform) -> Transform {
        Transform {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    pub fn is_finite(&self) -> bool {
        [self.a, self.b, self.c, self.d, self.e, self.f]
            .iter()
            .all(|v| v.is_finite())
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl From<[f64; 6]> for Transform {
    fn from(m: [f64; 6]) -> Self {
        Self::new(m[0], m[1], m[2], m[3], m[4], m[5])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// Axis-aligned rectangle anchored at its bottom-left corner in document space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb {
        r: 0.0,
        g: 0.0,
        b: 0.0,
    };
    pub const WHITE: Rgb = Rgb {
        r: 1.0,
        g: 1.0,
        b: 1.0,
    };
    pub const RED: Rgb = Rgb {
        r: 1.0,
        g: 0.0,
        b: 0.0,
    };
}

/// Tunable layout policy used by extraction and reconstruction.
///
/// These are approximations (no font metrics are consulted), not exact
/// typography.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConstants {
    /// Run height as a multiple of font size.
    pub line_height: f64,
    /// Width used when the parser reports no advance width.
    pub default_run_width: f64,
    /// Occlusion starts this far left of the run origin.
    pub occlusion_pad_left: f64,
    /// Occlusion is this much wider than the run.
    pub occlusion_pad_width: f64,
    /// Occlusion starts `font_size * occlusion_descent` below the baseline.
    pub occlusion_descent: f64,
    /// Occlusion height as a multiple of font size.
    pub occlusion_height: f64,
}

impl Default for LayoutConstants {
    fn default() -> Self {
        Self {
            line_height: 1.2,
            default_run_width: 100.0,
            occlusion_pad_left: 2.0,
            occlusion_pad_width: 10.0,
            occlusion_descent: 0.2,
            occlusion_height: 1.4,
        }
    }
}

impl LayoutConstants {
    /// Footprint painted white before a run is redrawn.
    pub fn occlusion_rect(&self, run: &TextRun) -> Rect {
        Rect {
            x: run.origin_x - self.occlusion_pad_left,
            y: run.origin_y - run.font_size * self.occlusion_descent,
            width: run.width + self.occlusion_pad_width,
            height: run.font_size * self.occlusion_height,
        }
    }

    fn normalize(&mut self) {
        let defaults = Self::default();
        let fix = |value: &mut f64, fallback: f64| {
            if !value.is_finite() || *value < 0.0 {
                *value = fallback;
            }
        };
        fix(&mut self.line_height, defaults.line_height);
        fix(&mut self.default_run_width, defaults.default_run_width);
        fix(&mut self.occlusion_pad_left, defaults.occlusion_pad_left);
        fix(&mut self.occlusion_pad_width, defaults.occlusion_pad_width);
        fix(&mut self.occlusion_descent, defaults.occlusion_descent);
        fix(&mut self.occlusion_height, defaults.occlusion_height);
        if self.line_height == 0.0 {
            self.line_height = defaults.line_height;
        }
    }
}

pub const DEFAULT_MAX_DOCUMENT_BYTES: u64 = 10 * 1024 * 1024;
pub const DEFAULT_PLACEHOLDER_TEXT: &str = "[TEXT ERROR]";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub default_zoom: f64,
    pub max_document_bytes: u64,
    pub placeholder_text: String,
    pub layout: LayoutConstants,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_zoom: Zoom::DEFAULT,
            max_document_bytes: DEFAULT_MAX_DOCUMENT_BYTES,
            placeholder_text: DEFAULT_PLACEHOLDER_TEXT.to_string(),
            layout: LayoutConstants::default(),
        }
    }
}

impl Settings {
    pub fn normalize(&mut self) {
        self.default_zoom = Zoom::new(self.default_zoom).value();
        if self.max_document_bytes == 0 {
            self.max_document_bytes = DEFAULT_MAX_DOCUMENT_BYTES;
        }
        let placeholder = normalize::normalize(self.placeholder_text.trim());
        self.placeholder_text = if placeholder.is_empty() {
            DEFAULT_PLACEHOLDER_TEXT.to_string()
        } else {
            placeholder
        };
        self.layout.normalize();
    }

    pub fn zoom(&self) -> Zoom {
        Zoom::new(self.default_zoom)
    }
}

/// 1-based page navigation, clamped to the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCursor {
    pub current: u32,
    pub total: u32,
}

impl PageCursor {
    pub fn new(total: u32) -> Self {
        Self {
            current: if total == 0 { 0 } else { 1 },
            total,
        }
    }

    pub fn next(&mut self) {
        self.current = self.current.saturating_add(1).min(self.total);
    }

    pub fn prev(&mut self) {
        self.current = self.current.saturating_sub(1).max(self.total.min(1));
    }

    /// Jumps to `page`, clamped to the document.
    pub fn seek(&mut self, page: u32) {
        self.current = page.clamp(self.total.min(1), self.total);
    }

    pub fn has_next(&self) -> bool {
        self.current < self.total
    }

    pub fn has_prev(&self) -> bool {
        self.current > 1
    }
}
