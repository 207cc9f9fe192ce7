//! Text placement: overlap avoidance against already-placed boxes.
//!
//! Rasterization lives outside this crate, so a text box is estimated
//! from glyph count and font size. The search walks the candidate down
//! the page in fixed steps, wraps to the top-left when it would run off
//! the bottom, and gives up after a bounded number of attempts by
//! falling back to "immediately below the last-placed text".

#[cfg(test)]
#[path = "layout_test.rs"]
mod layout_test;

use wire::StrokePoint;

/// Average glyph advance as a fraction of font size; close enough for
/// slot-finding without a font engine.
const GLYPH_ADVANCE: f64 = 0.6;

/// Line height as a fraction of font size.
const LINE_HEIGHT: f64 = 1.4;

/// Where a wrapped candidate restarts.
const WRAP_MARGIN: f64 = 8.0;

/// Vertical gap used by the fallback placement.
const FALLBACK_GAP: f64 = 4.0;

/// An axis-aligned box in page coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    /// Whether two boxes overlap (shared edges do not count).
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.x < other.x + other.width
            && other.x < self.x + self.width
            && self.y < other.y + other.height
            && other.y < self.y + self.height
    }

    /// Top-left corner as a stroke anchor.
    #[must_use]
    pub fn anchor(&self) -> StrokePoint {
        StrokePoint { x: self.x, y: self.y }
    }
}

/// Estimate the box a piece of text will occupy when placed at `at`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn estimate_text_box(text: &str, font_size: f64, at: StrokePoint) -> BoundingBox {
    let glyphs = text.chars().count().max(1);
    BoundingBox {
        x: at.x,
        y: at.y,
        width: glyphs as f64 * font_size * GLYPH_ADVANCE,
        height: font_size * LINE_HEIGHT,
    }
}

/// Find a non-overlapping slot for `candidate` among `taken` boxes.
///
/// Shifts down by `step` per attempt, wraps to the top-left margin when
/// the next slot would exceed `page_height`, and after `max_attempts`
/// falls back to the position immediately below `last_placed` (or the
/// original candidate when nothing was placed before).
#[must_use]
pub fn find_slot(
    candidate: BoundingBox,
    taken: &[BoundingBox],
    page_height: f64,
    step: f64,
    max_attempts: usize,
    last_placed: Option<BoundingBox>,
) -> BoundingBox {
    let mut slot = candidate;
    for _ in 0..max_attempts {
        if !taken.iter().any(|b| b.overlaps(&slot)) {
            return slot;
        }
        slot.y += step;
        if slot.y + slot.height > page_height {
            slot.x = WRAP_MARGIN;
            slot.y = WRAP_MARGIN;
        }
    }

    match last_placed {
        Some(last) => BoundingBox { x: last.x, y: last.y + last.height + FALLBACK_GAP, ..candidate },
        None => candidate,
    }
}
