//! Stroke synchronization: local-first capture, at-most-one-writer
//! enforcement, and idempotent replay of remote strokes.
//!
//! DESIGN
//! ======
//! A gesture composes locally and hits three things only on commit: the
//! page's stroke list, the durable store (fire and forget), and the
//! broadcast. Capability checks run before anything is constructed, so a
//! permission violation never reaches the wire. Typing previews ride a
//! separate ephemeral payload, throttled here and expired by receivers.
//!
//! Undo broadcasts an instruction, not content. The payload carries the
//! expected resulting list length; a receiver that lands on a different
//! length flags the page diverged rather than drifting silently.

#[cfg(test)]
#[path = "strokes_test.rs"]
mod strokes_test;

use std::sync::Arc;

use board::{Composer, OverlaySet, PageSet, StrokeStyle, estimate_text_box, find_slot};
use tracing::warn;
use uuid::Uuid;
use wire::{ParticipantRef, Payload, StrokeData, StrokeKind, StrokePoint};

use crate::config::EngineConfig;
use crate::error::{Capability, EngineError};
use crate::permissions::Permissions;
use crate::store::{SessionStore, persist_fire_and_forget};

fn required_capability(kind: StrokeKind) -> Capability {
    match kind {
        StrokeKind::Erase => Capability::Erase,
        StrokeKind::Text => Capability::Write,
        _ => Capability::Draw,
    }
}

fn has_capability(perms: &Permissions, cap: Capability) -> bool {
    match cap {
        Capability::Draw => perms.can_draw(),
        Capability::Write => perms.can_write(),
        Capability::Erase => perms.can_erase(),
    }
}

pub struct StrokeSync {
    style: StrokeStyle,
    composer: Composer,
    last_typing_ms: Option<i64>,
}

impl StrokeSync {
    #[must_use]
    pub fn new() -> Self {
        Self {
            style: StrokeStyle { color: "#1F1A17".into(), width: 2.0 },
            composer: Composer::new(),
            last_typing_ms: None,
        }
    }

    pub fn set_color(&mut self, color: impl Into<String>) {
        self.style.color = color.into();
    }

    pub fn set_width(&mut self, width: f64) {
        self.style.width = width;
    }

    #[must_use]
    pub fn style(&self) -> &StrokeStyle {
        &self.style
    }

    /// The in-progress draft, for local real-time rendering.
    #[must_use]
    pub fn draft(&self) -> Option<&StrokeData> {
        self.composer.draft()
    }

    // -------------------------------------------------------------------
    // Local gesture
    // -------------------------------------------------------------------

    /// Pointer-down. Rejected locally when the capability is missing.
    pub fn begin_stroke(
        &mut self,
        kind: StrokeKind,
        at: StrokePoint,
        perms: &Permissions,
    ) -> Result<(), EngineError> {
        let cap = required_capability(kind);
        if !has_capability(perms, cap) {
            return Err(EngineError::NotPermitted(cap));
        }
        self.composer.begin(kind, &self.style, at);
        Ok(())
    }

    pub fn extend_stroke(&mut self, point: StrokePoint) {
        self.composer.extend(point);
    }

    /// Discard the in-progress gesture. Committed state is untouched.
    pub fn cancel_stroke(&mut self) {
        self.composer.cancel();
    }

    /// Pointer-up: append to the current page, persist fire-and-forget,
    /// and hand back the broadcast payload unless suppressed.
    pub fn commit_stroke(
        &mut self,
        pages: &mut PageSet,
        store: &Arc<dyn SessionStore>,
        suppress_broadcast: bool,
    ) -> Result<Option<Payload>, EngineError> {
        let Some(stroke) = self.composer.finish() else {
            return Err(EngineError::NotComposing);
        };
        let page_id = pages.current_id();
        pages.append_stroke(page_id, stroke.clone());
        persist_fire_and_forget(Arc::clone(store), page_id, stroke.clone());

        if suppress_broadcast {
            return Ok(None);
        }
        Ok(Some(Payload::Stroke { page_id, stroke }))
    }

    // -------------------------------------------------------------------
    // Text
    // -------------------------------------------------------------------

    /// Send the current in-progress text as an ephemeral preview,
    /// throttled to the configured rate.
    pub fn typing_preview(
        &mut self,
        text: &str,
        x: f64,
        y: f64,
        size: f64,
        perms: &Permissions,
        config: &EngineConfig,
        now_ms: i64,
    ) -> Result<Option<Payload>, EngineError> {
        if !perms.can_write() {
            return Err(EngineError::NotPermitted(Capability::Write));
        }
        if let Some(last) = self.last_typing_ms {
            if now_ms - last < config.typing_min_interval_ms {
                return Ok(None);
            }
        }
        self.last_typing_ms = Some(now_ms);
        Ok(Some(Payload::TextTyping {
            text: text.to_owned(),
            x,
            y,
            color: self.style.color.clone(),
            size,
        }))
    }

    /// Abandon the in-progress text (Escape). Receivers expire the
    /// preview on their own; nothing else to do locally.
    pub fn cancel_typing(&mut self) {
        self.last_typing_ms = None;
    }

    /// Commit placed text, shifting the box away from previously placed
    /// text on the page before it lands.
    pub fn place_text(
        &mut self,
        text: &str,
        at: StrokePoint,
        font_size: f64,
        pages: &mut PageSet,
        store: &Arc<dyn SessionStore>,
        perms: &Permissions,
        config: &EngineConfig,
        suppress_broadcast: bool,
    ) -> Result<(StrokeData, Option<Payload>), EngineError> {
        if !perms.can_write() {
            return Err(EngineError::NotPermitted(Capability::Write));
        }

        let page_id = pages.current_id();
        let taken: Vec<_> = pages
            .current()
            .strokes
            .iter()
            .filter(|s| s.kind == StrokeKind::Text)
            .filter_map(|s| {
                let anchor = s.anchor()?;
                Some(estimate_text_box(s.text.as_deref().unwrap_or_default(), s.font_size.unwrap_or(font_size), anchor))
            })
            .collect();
        let last_placed = taken.last().copied();

        let candidate = estimate_text_box(text, font_size, at);
        let slot = find_slot(
            candidate,
            &taken,
            config.page_height,
            config.text_shift_step,
            config.text_place_attempts,
            last_placed,
        );

        let stroke = StrokeData {
            id: Uuid::new_v4(),
            kind: StrokeKind::Text,
            color: self.style.color.clone(),
            width: self.style.width,
            points: vec![slot.anchor()],
            text: Some(text.to_owned()),
            font_size: Some(font_size),
        };

        pages.append_stroke(page_id, stroke.clone());
        persist_fire_and_forget(Arc::clone(store), page_id, stroke.clone());
        self.last_typing_ms = None;

        let payload =
            (!suppress_broadcast).then(|| Payload::Stroke { page_id, stroke: stroke.clone() });
        Ok((stroke, payload))
    }

    // -------------------------------------------------------------------
    // Undo / clear
    // -------------------------------------------------------------------

    /// Pop the last committed stroke on the current page. Host or erase
    /// permission required. Returns the notification payload, or `None`
    /// when the page was already empty.
    pub fn undo(&mut self, pages: &mut PageSet, perms: &Permissions) -> Result<Option<Payload>, EngineError> {
        if !(perms.is_host() || perms.can_erase()) {
            return Err(EngineError::NotPermitted(Capability::Erase));
        }
        let page_id = pages.current_id();
        if pages.pop_last(page_id).is_none() {
            return Ok(None);
        }
        let strokes_after = u32::try_from(pages.current().stroke_count()).unwrap_or(u32::MAX);
        Ok(Some(Payload::Undo { page_id, strokes_after }))
    }

    /// Wipe the current page's stroke list. Host or erase permission
    /// required.
    pub fn clear(&mut self, pages: &mut PageSet, perms: &Permissions) -> Result<Payload, EngineError> {
        if !(perms.is_host() || perms.can_erase()) {
            return Err(EngineError::NotPermitted(Capability::Erase));
        }
        let page_id = pages.current_id();
        pages.clear_page(page_id);
        Ok(Payload::Clear { page_id })
    }

    // -------------------------------------------------------------------
    // Remote application
    // -------------------------------------------------------------------

    /// Append a remote stroke. The sender's typing preview, if any, is
    /// superseded by the commit.
    pub fn apply_remote_stroke(
        &mut self,
        from: ParticipantRef,
        page_id: Uuid,
        stroke: StrokeData,
        pages: &mut PageSet,
        overlays: &mut OverlaySet,
    ) {
        if !pages.append_stroke(page_id, stroke) {
            warn!(%from, %page_id, "stroke for unknown page dropped");
            return;
        }
        overlays.remove_typing(from);
    }

    /// Apply a remote undo and verify the resulting length against the
    /// sender's. A mismatch flags the page diverged.
    pub fn apply_remote_undo(&mut self, from: ParticipantRef, page_id: Uuid, strokes_after: u32, pages: &mut PageSet) {
        pages.pop_last(page_id);
        let Some(page) = pages.page(page_id) else {
            warn!(%from, %page_id, "undo for unknown page dropped");
            return;
        };
        let local = u32::try_from(page.stroke_count()).unwrap_or(u32::MAX);
        if local != strokes_after {
            warn!(%from, %page_id, local, expected = strokes_after, "stroke lists diverged after undo");
            pages.mark_diverged(page_id);
        }
    }

    pub fn apply_remote_clear(&mut self, from: ParticipantRef, page_id: Uuid, pages: &mut PageSet) {
        if pages.page(page_id).is_none() {
            warn!(%from, %page_id, "clear for unknown page dropped");
            return;
        }
        pages.clear_page(page_id);
    }
}

impl Default for StrokeSync {
    fn default() -> Self {
        Self::new()
    }
}
