use std::sync::Arc;

use board::{OverlaySet, PageSet};
use uuid::Uuid;
use wire::{PageInfo, ParticipantRef, Payload, ProfileKind, StrokeKind, StrokePoint};

use super::*;
use crate::store::InMemoryStore;

const HOST: ParticipantRef = ParticipantRef { profile_id: 1, kind: ProfileKind::Tutor };
const GUEST: ParticipantRef = ParticipantRef { profile_id: 2, kind: ProfileKind::Student };

fn pages() -> PageSet {
    PageSet::new(PageInfo { id: Uuid::new_v4(), page_number: 1, background_color: "#FFF".into() })
}

fn store() -> Arc<dyn SessionStore> {
    Arc::new(InMemoryStore::new())
}

fn host_perms() -> Permissions {
    let mut perms = Permissions::new(HOST);
    perms.begin_session(HOST);
    perms
}

fn guest_perms() -> Permissions {
    let mut perms = Permissions::new(GUEST);
    perms.begin_session(HOST);
    perms
}

fn pt(x: f64, y: f64) -> StrokePoint {
    StrokePoint { x, y }
}

// =============================================================
// Gesture gating
// =============================================================

#[test]
fn begin_without_draw_permission_is_rejected_locally() {
    let mut sync = StrokeSync::new();
    let err = sync.begin_stroke(StrokeKind::Freehand, pt(0.0, 0.0), &guest_perms());
    assert!(matches!(err, Err(EngineError::NotPermitted(Capability::Draw))));
    assert!(sync.draft().is_none());
}

#[test]
fn erase_requires_erase_capability() {
    let mut sync = StrokeSync::new();
    let mut perms = guest_perms();
    perms.apply_granted(wire::Capabilities { can_draw: true, can_write: true, can_erase: false });
    assert!(matches!(
        sync.begin_stroke(StrokeKind::Erase, pt(0.0, 0.0), &perms),
        Err(EngineError::NotPermitted(Capability::Erase))
    ));
}

#[tokio::test]
async fn grant_then_draw_commits_and_broadcasts() {
    let mut sync = StrokeSync::new();
    let mut pages = pages();
    let store = store();
    let mut perms = guest_perms();

    // Freshly granted participant draws immediately.
    perms.apply_granted(wire::Capabilities::all());
    sync.begin_stroke(StrokeKind::Freehand, pt(0.0, 0.0), &perms).unwrap();
    sync.extend_stroke(pt(5.0, 5.0));
    let payload = sync.commit_stroke(&mut pages, &store, false).unwrap();

    assert!(matches!(payload, Some(Payload::Stroke { .. })));
    // The grant cleared nothing and the commit landed.
    assert_eq!(pages.current().stroke_count(), 1);
}

#[tokio::test]
async fn commit_without_gesture_is_an_error() {
    let mut sync = StrokeSync::new();
    let mut pages = pages();
    let store = store();
    assert!(matches!(sync.commit_stroke(&mut pages, &store, false), Err(EngineError::NotComposing)));
}

#[tokio::test]
async fn suppressed_commit_appends_without_payload() {
    let mut sync = StrokeSync::new();
    let mut pages = pages();
    let store = store();
    let perms = host_perms();

    sync.begin_stroke(StrokeKind::Line, pt(0.0, 0.0), &perms).unwrap();
    sync.extend_stroke(pt(10.0, 10.0));
    let payload = sync.commit_stroke(&mut pages, &store, true).unwrap();
    assert!(payload.is_none());
    assert_eq!(pages.current().stroke_count(), 1);
}

#[test]
fn cancel_leaves_committed_state_untouched() {
    let mut sync = StrokeSync::new();
    let mut pages = pages();
    let perms = host_perms();
    let page_id = pages.current_id();
    pages.append_stroke(
        page_id,
        wire::StrokeData {
            id: Uuid::new_v4(),
            kind: StrokeKind::Freehand,
            color: "#000".into(),
            width: 1.0,
            points: vec![pt(0.0, 0.0)],
            text: None,
            font_size: None,
        },
    );

    sync.begin_stroke(StrokeKind::Freehand, pt(1.0, 1.0), &perms).unwrap();
    sync.cancel_stroke();
    assert!(sync.draft().is_none());
    assert_eq!(pages.current().stroke_count(), 1);
}

// =============================================================
// Typing preview
// =============================================================

#[test]
fn typing_preview_is_throttled() {
    let mut sync = StrokeSync::new();
    let perms = host_perms();
    let config = EngineConfig::default();

    let first = sync.typing_preview("h", 10.0, 10.0, 14.0, &perms, &config, 1_000).unwrap();
    assert!(first.is_some());

    // 50ms later: inside the minimum interval, dropped.
    let second = sync.typing_preview("he", 10.0, 10.0, 14.0, &perms, &config, 1_050).unwrap();
    assert!(second.is_none());

    // 150ms later: allowed again.
    let third = sync.typing_preview("hel", 10.0, 10.0, 14.0, &perms, &config, 1_150).unwrap();
    assert!(third.is_some());
}

#[test]
fn typing_preview_requires_write() {
    let mut sync = StrokeSync::new();
    let config = EngineConfig::default();
    assert!(matches!(
        sync.typing_preview("h", 0.0, 0.0, 14.0, &guest_perms(), &config, 0),
        Err(EngineError::NotPermitted(Capability::Write))
    ));
}

// =============================================================
// Text placement
// =============================================================

#[tokio::test]
async fn second_text_at_same_spot_shifts_away() {
    let mut sync = StrokeSync::new();
    let mut pages = pages();
    let store = store();
    let perms = host_perms();
    let config = EngineConfig::default();

    let (first, _) = sync
        .place_text("alpha", pt(100.0, 100.0), 16.0, &mut pages, &store, &perms, &config, false)
        .unwrap();
    let (second, payload) = sync
        .place_text("beta", pt(100.0, 100.0), 16.0, &mut pages, &store, &perms, &config, false)
        .unwrap();

    let a = first.anchor().unwrap();
    let b = second.anchor().unwrap();
    assert!((a.x - b.x).abs() > f64::EPSILON || (a.y - b.y).abs() > f64::EPSILON);
    assert!(matches!(payload, Some(Payload::Stroke { .. })));
    assert_eq!(pages.current().stroke_count(), 2);
}

#[tokio::test]
async fn crowded_page_still_places_without_panic() {
    let mut sync = StrokeSync::new();
    let mut pages = pages();
    let store = store();
    let perms = host_perms();
    let config = EngineConfig { page_height: 60.0, text_place_attempts: 4, ..EngineConfig::default() };

    for n in 0..12 {
        let (stroke, _) = sync
            .place_text("block", pt(8.0, 8.0), 16.0, &mut pages, &store, &perms, &config, false)
            .unwrap();
        assert!(stroke.anchor().is_some(), "placement {n} lost its anchor");
    }
    assert_eq!(pages.current().stroke_count(), 12);
}

// =============================================================
// Undo / clear
// =============================================================

#[tokio::test]
async fn undo_pops_exactly_the_newest() {
    let mut sync = StrokeSync::new();
    let mut pages = pages();
    let store = store();
    let perms = host_perms();

    sync.begin_stroke(StrokeKind::Freehand, pt(0.0, 0.0), &perms).unwrap();
    let _ = sync.commit_stroke(&mut pages, &store, false).unwrap();
    sync.begin_stroke(StrokeKind::Freehand, pt(1.0, 1.0), &perms).unwrap();
    let _ = sync.commit_stroke(&mut pages, &store, false).unwrap();

    let payload = sync.undo(&mut pages, &perms).unwrap();
    assert!(matches!(payload, Some(Payload::Undo { strokes_after: 1, .. })));
    assert_eq!(pages.current().stroke_count(), 1);
}

#[test]
fn undo_on_empty_page_broadcasts_nothing() {
    let mut sync = StrokeSync::new();
    let mut pages = pages();
    let perms = host_perms();
    assert!(sync.undo(&mut pages, &perms).unwrap().is_none());
}

#[test]
fn undo_requires_host_or_erase() {
    let mut sync = StrokeSync::new();
    let mut pages = pages();
    assert!(matches!(
        sync.undo(&mut pages, &guest_perms()),
        Err(EngineError::NotPermitted(Capability::Erase))
    ));
}

#[test]
fn undo_mid_gesture_cannot_touch_the_draft() {
    let mut sync = StrokeSync::new();
    let mut pages = pages();
    let perms = host_perms();
    let page_id = pages.current_id();

    sync.begin_stroke(StrokeKind::Freehand, pt(0.0, 0.0), &perms).unwrap();
    sync.extend_stroke(pt(1.0, 1.0));

    // A remote undo lands while the local gesture is still composing.
    sync.apply_remote_undo(GUEST, page_id, 0, &mut pages);

    // The draft survives and can still commit.
    assert!(sync.draft().is_some());
}

#[test]
fn clear_wipes_current_page() {
    let mut sync = StrokeSync::new();
    let mut pages = pages();
    let perms = host_perms();
    let page_id = pages.current_id();
    pages.append_stroke(
        page_id,
        wire::StrokeData {
            id: Uuid::new_v4(),
            kind: StrokeKind::Freehand,
            color: "#000".into(),
            width: 1.0,
            points: Vec::new(),
            text: None,
            font_size: None,
        },
    );

    let payload = sync.clear(&mut pages, &perms).unwrap();
    assert!(matches!(payload, Payload::Clear { .. }));
    assert_eq!(pages.current().stroke_count(), 0);
}

// =============================================================
// Remote application
// =============================================================

#[test]
fn remote_stroke_appends_and_clears_senders_preview() {
    let mut sync = StrokeSync::new();
    let mut pages = pages();
    let mut overlays = OverlaySet::new();
    let page_id = pages.current_id();
    overlays.upsert_typing(
        GUEST,
        board::TypingPreview { text: "dra".into(), x: 0.0, y: 0.0, color: "#000".into(), size: 14.0, updated_at: 0 },
    );

    let stroke = wire::StrokeData {
        id: Uuid::new_v4(),
        kind: StrokeKind::Freehand,
        color: "#000".into(),
        width: 1.0,
        points: Vec::new(),
        text: None,
        font_size: None,
    };
    sync.apply_remote_stroke(GUEST, page_id, stroke, &mut pages, &mut overlays);

    assert_eq!(pages.current().stroke_count(), 1);
    assert!(overlays.typing().is_empty());
}

#[test]
fn remote_undo_length_mismatch_flags_divergence() {
    let mut sync = StrokeSync::new();
    let mut pages = pages();
    let page_id = pages.current_id();
    for _ in 0..3 {
        pages.append_stroke(
            page_id,
            wire::StrokeData {
                id: Uuid::new_v4(),
                kind: StrokeKind::Freehand,
                color: "#000".into(),
                width: 1.0,
                points: Vec::new(),
                text: None,
                font_size: None,
            },
        );
    }

    // Sender expected 1 stroke to remain; we have 2. Diverged.
    sync.apply_remote_undo(GUEST, page_id, 1, &mut pages);
    assert_eq!(pages.current().stroke_count(), 2);
    assert!(pages.is_diverged(page_id));
}

#[test]
fn remote_undo_matching_length_is_clean() {
    let mut sync = StrokeSync::new();
    let mut pages = pages();
    let page_id = pages.current_id();
    pages.append_stroke(
        page_id,
        wire::StrokeData {
            id: Uuid::new_v4(),
            kind: StrokeKind::Freehand,
            color: "#000".into(),
            width: 1.0,
            points: Vec::new(),
            text: None,
            font_size: None,
        },
    );

    sync.apply_remote_undo(GUEST, page_id, 0, &mut pages);
    assert_eq!(pages.current().stroke_count(), 0);
    assert!(!pages.is_diverged(page_id));
}
