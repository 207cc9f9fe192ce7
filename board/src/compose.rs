//! The composing-stroke state machine.
//!
//! A gesture runs `Idle → Composing → Idle`: pointer-down begins a draft,
//! movement accumulates points locally, pointer-up either commits the
//! draft (the caller appends/broadcasts it) or discards it. The draft
//! never touches the page's stroke list until commit, so a remote undo
//! arriving mid-gesture can only ever pop already-committed strokes.

use uuid::Uuid;
use wire::{StrokeData, StrokeKind, StrokePoint};

/// Pen attributes captured at gesture start.
#[derive(Clone, Debug)]
pub struct StrokeStyle {
    pub color: String,
    pub width: f64,
}

enum ComposeState {
    Idle,
    Composing { draft: StrokeData },
}

/// Tracks at most one in-progress stroke gesture.
pub struct Composer {
    state: ComposeState,
}

impl Composer {
    #[must_use]
    pub fn new() -> Self {
        Self { state: ComposeState::Idle }
    }

    #[must_use]
    pub fn is_composing(&self) -> bool {
        matches!(self.state, ComposeState::Composing { .. })
    }

    /// Begin a draft at the given anchor. Returns false (and leaves the
    /// existing draft untouched) if a gesture is already in progress.
    pub fn begin(&mut self, kind: StrokeKind, style: &StrokeStyle, at: StrokePoint) -> bool {
        if self.is_composing() {
            return false;
        }
        self.state = ComposeState::Composing {
            draft: StrokeData {
                id: Uuid::new_v4(),
                kind,
                color: style.color.clone(),
                width: style.width,
                points: vec![at],
                text: None,
                font_size: None,
            },
        };
        true
    }

    /// Extend the draft with a new pointer position. Freehand and erase
    /// paths accumulate every point; shapes keep only the two anchors, so
    /// movement replaces the second one.
    pub fn extend(&mut self, point: StrokePoint) {
        let ComposeState::Composing { draft } = &mut self.state else {
            return;
        };
        if draft.kind.is_shape() && draft.points.len() == 2 {
            draft.points[1] = point;
        } else {
            draft.points.push(point);
        }
    }

    /// Finish the gesture and hand the draft to the caller for commit.
    pub fn finish(&mut self) -> Option<StrokeData> {
        match std::mem::replace(&mut self.state, ComposeState::Idle) {
            ComposeState::Composing { draft } => Some(draft),
            ComposeState::Idle => None,
        }
    }

    /// Discard the draft without committing (Escape, permission revoked).
    pub fn cancel(&mut self) {
        self.state = ComposeState::Idle;
    }

    /// The in-progress draft, for local real-time rendering.
    #[must_use]
    pub fn draft(&self) -> Option<&StrokeData> {
        match &self.state {
            ComposeState::Composing { draft } => Some(draft),
            ComposeState::Idle => None,
        }
    }
}

impl Default for Composer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn style() -> StrokeStyle {
        StrokeStyle { color: "#1F1A17".into(), width: 2.0 }
    }

    fn pt(x: f64, y: f64) -> StrokePoint {
        StrokePoint { x, y }
    }

    #[test]
    fn begin_extend_finish_yields_full_path() {
        let mut composer = Composer::new();
        assert!(composer.begin(StrokeKind::Freehand, &style(), pt(0.0, 0.0)));
        composer.extend(pt(1.0, 1.0));
        composer.extend(pt(2.0, 2.0));

        let stroke = composer.finish().unwrap();
        assert_eq!(stroke.kind, StrokeKind::Freehand);
        assert_eq!(stroke.points.len(), 3);
        assert!(!composer.is_composing());
    }

    #[test]
    fn second_begin_while_composing_is_refused() {
        let mut composer = Composer::new();
        assert!(composer.begin(StrokeKind::Freehand, &style(), pt(0.0, 0.0)));
        assert!(!composer.begin(StrokeKind::Line, &style(), pt(5.0, 5.0)));
        assert_eq!(composer.draft().unwrap().kind, StrokeKind::Freehand);
    }

    #[test]
    fn shapes_keep_two_anchors() {
        let mut composer = Composer::new();
        composer.begin(StrokeKind::Rectangle, &style(), pt(0.0, 0.0));
        composer.extend(pt(10.0, 10.0));
        composer.extend(pt(20.0, 15.0));
        composer.extend(pt(30.0, 20.0));

        let stroke = composer.finish().unwrap();
        assert_eq!(stroke.points.len(), 2);
        assert!((stroke.points[1].x - 30.0).abs() < f64::EPSILON);
    }

    #[test]
    fn cancel_discards_draft() {
        let mut composer = Composer::new();
        composer.begin(StrokeKind::Erase, &style(), pt(0.0, 0.0));
        composer.cancel();
        assert!(!composer.is_composing());
        assert!(composer.finish().is_none());
    }

    #[test]
    fn finish_when_idle_is_none() {
        let mut composer = Composer::new();
        assert!(composer.finish().is_none());
    }

    #[test]
    fn extend_when_idle_is_ignored() {
        let mut composer = Composer::new();
        composer.extend(pt(1.0, 1.0));
        assert!(!composer.is_composing());
    }
}
