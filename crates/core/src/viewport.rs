//! Document space <-> viewport space.
//!
//! Document space has its origin at the bottom-left of the page; viewport
//! space has its origin at the top-left and is scaled by [`Zoom`]. Every
//! function here is pure, so concurrent render passes can share them.

use serde::{Deserialize, Serialize};

use crate::{Point, Rect, TextRun};

/// Minimum on-screen width of the editor widget placed over a run.
pub const OVERLAY_MIN_WIDTH: f64 = 80.0;
/// Editor widget height relative to the mapped run height.
pub const OVERLAY_HEIGHT_FACTOR: f64 = 1.5;
/// Font size of the editor widget before zoom.
pub const OVERLAY_FONT_SIZE: f64 = 12.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Zoom(f64);

impl Zoom {
    pub const MIN: f64 = 0.5;
    pub const MAX: f64 = 2.0;
    pub const DEFAULT: f64 = 1.0;
    pub const STEP: f64 = 0.2;

    /// Clamps into `[MIN, MAX]`; non-finite input gives the default.
    pub fn new(value: f64) -> Self {
        if value.is_finite() {
            Self(value.clamp(Self::MIN, Self::MAX))
        } else {
            Self(Self::DEFAULT)
        }
    }

    pub fn value(self) -> f64 {
        self.0
    }

    pub fn zoom_in(self) -> Self {
        Self::new(self.0 + Self::STEP)
    }

    pub fn zoom_out(self) -> Self {
        Self::new(self.0 - Self::STEP)
    }

    pub fn reset(self) -> Self {
        Self::default()
    }

    pub fn percent(self) -> u32 {
        (self.0 * 100.0).round() as u32
    }
}

impl Default for Zoom {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}

/// Top-left anchored rectangle in viewport pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewportRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl ViewportRect {
    pub fn contains(&self, point: ViewportPoint) -> bool {
        point.x >= self.x
            && point.x <= self.x + self.width
            && point.y >= self.y
            && point.y <= self.y + self.height
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewportPoint {
    pub x: f64,
    pub y: f64,
}

/// Placement of the on-screen editor over a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverlayBox {
    pub rect: ViewportRect,
    pub font_size: f64,
}

/// `rect.y` is the baseline origin; the mapped box is anchored at its top.
pub fn doc_rect_to_viewport(rect: Rect, zoom: Zoom, page_height: f64) -> ViewportRect {
    let z = zoom.value();
    ViewportRect {
        x: rect.x * z,
        y: (page_height - rect.y - rect.height) * z,
        width: rect.width * z,
        height: rect.height * z,
    }
}

pub fn viewport_rect_to_doc(rect: ViewportRect, zoom: Zoom, page_height: f64) -> Rect {
    let z = zoom.value();
    let height = rect.height / z;
    Rect {
        x: rect.x / z,
        y: page_height - rect.y / z - height,
        width: rect.width / z,
        height,
    }
}

pub fn map_doc_to_viewport(run: &TextRun, zoom: Zoom, page_height: f64) -> ViewportRect {
    doc_rect_to_viewport(run_rect(run), zoom, page_height)
}

pub fn map_viewport_to_doc(rect: ViewportRect, zoom: Zoom, page_height: f64) -> Rect {
    viewport_rect_to_doc(rect, zoom, page_height)
}

/// A pointer position has no height, so only the vertical flip applies.
pub fn map_point_to_doc(point: ViewportPoint, zoom: Zoom, page_height: f64) -> Point {
    let z = zoom.value();
    Point {
        x: point.x / z,
        y: page_height - point.y / z,
    }
}

pub fn map_point_to_viewport(point: Point, zoom: Zoom, page_height: f64) -> ViewportPoint {
    let z = zoom.value();
    ViewportPoint {
        x: point.x * z,
        y: (page_height - point.y) * z,
    }
}

pub fn overlay_box(run: &TextRun, zoom: Zoom, page_height: f64) -> OverlayBox {
    let mapped = map_doc_to_viewport(run, zoom, page_height);
    OverlayBox {
        rect: ViewportRect {
            width: mapped.width.max(OVERLAY_MIN_WIDTH),
            height: mapped.height * OVERLAY_HEIGHT_FACTOR,
            ..mapped
        },
        font_size: OVERLAY_FONT_SIZE * zoom.value(),
    }
}

pub fn run_rect(run: &TextRun) -> Rect {
    Rect {
        x: run.origin_x,
        y: run.origin_y,
        width: run.width,
        height: run.height,
    }
}
