//! Ephemeral overlays: typing previews and remote cursors.
//!
//! Overlays are keyed by sender identity and carry the timestamp of
//! their last update; `cleanup_stale` expires each sender independently.
//! Nothing here is persisted or broadcast — the engine feeds remote
//! updates in and the presentation layer reads the survivors back.

use std::collections::HashMap;

use wire::ParticipantRef;

/// In-progress text from one remote sender.
#[derive(Clone, Debug, PartialEq)]
pub struct TypingPreview {
    pub text: String,
    pub x: f64,
    pub y: f64,
    pub color: String,
    pub size: f64,
    pub updated_at: i64,
}

/// Last known cursor position of one remote sender.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CursorMark {
    pub x: f64,
    pub y: f64,
    pub updated_at: i64,
}

/// All live overlays, keyed by sender.
#[derive(Clone, Debug, Default)]
pub struct OverlaySet {
    typing: HashMap<ParticipantRef, TypingPreview>,
    cursors: HashMap<ParticipantRef, CursorMark>,
}

impl OverlaySet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert_typing(&mut self, from: ParticipantRef, preview: TypingPreview) {
        self.typing.insert(from, preview);
    }

    /// Drop one sender's preview (they committed or cancelled).
    pub fn remove_typing(&mut self, from: ParticipantRef) {
        self.typing.remove(&from);
    }

    pub fn upsert_cursor(&mut self, from: ParticipantRef, x: f64, y: f64, now_ms: i64) {
        self.cursors.insert(from, CursorMark { x, y, updated_at: now_ms });
    }

    pub fn remove_participant(&mut self, who: ParticipantRef) {
        self.typing.remove(&who);
        self.cursors.remove(&who);
    }

    /// Expire overlays whose last update is older than the given horizons.
    pub fn cleanup_stale(&mut self, now_ms: i64, typing_expiry_ms: i64, cursor_expiry_ms: i64) {
        self.typing.retain(|_, p| now_ms - p.updated_at < typing_expiry_ms);
        self.cursors.retain(|_, c| now_ms - c.updated_at < cursor_expiry_ms);
    }

    #[must_use]
    pub fn typing(&self) -> &HashMap<ParticipantRef, TypingPreview> {
        &self.typing
    }

    #[must_use]
    pub fn cursors(&self) -> &HashMap<ParticipantRef, CursorMark> {
        &self.cursors
    }
}
