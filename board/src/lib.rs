//! Document model and interaction state for the shared whiteboard.
//!
//! This crate owns what is *on* the board and how a local gesture becomes a
//! committed stroke: the page collection with its current-page pointer, the
//! per-page stroke stores, the composing-stroke state machine, text
//! placement, and the ephemeral overlays (typing previews, remote cursors).
//!
//! Rendering is someone else's job: everything here is pure state that a
//! presentation layer reads back. Data flows in from the engine (remote
//! mutations) and from local input (gestures).

mod compose;
mod layout;
mod overlay;
mod page;

pub use compose::{Composer, StrokeStyle};
pub use layout::{BoundingBox, estimate_text_box, find_slot};
pub use overlay::{CursorMark, OverlaySet, TypingPreview};
pub use page::{Page, PageSet};
