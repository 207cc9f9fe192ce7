//! Stroke and page data carried inside payloads.
//!
//! A stroke is immutable once committed: receivers append it verbatim and
//! the only removal operations are pop-last (undo) and clear.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The kind of a committed stroke.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrokeKind {
    /// Freehand pen path.
    Freehand,
    /// Eraser path, rendered in the page background color.
    Erase,
    /// Placed text. Payload lives in `text`/`font_size`.
    Text,
    Line,
    Rectangle,
    Circle,
    Triangle,
    Arrow,
}

impl StrokeKind {
    /// Shape kinds are defined by two anchor points.
    #[must_use]
    pub fn is_shape(self) -> bool {
        matches!(self, Self::Line | Self::Rectangle | Self::Circle | Self::Triangle | Self::Arrow)
    }
}

/// One point on a stroke path, in page coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct StrokePoint {
    pub x: f64,
    pub y: f64,
}

/// A committed stroke as stored per page and broadcast on the wire.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StrokeData {
    pub id: Uuid,
    pub kind: StrokeKind,
    /// CSS color string, e.g. `"#1F1A17"`.
    pub color: String,
    /// Pen width in page units.
    pub width: f64,
    /// Path points for freehand/erase; the two anchors for shapes; the
    /// single placement anchor for text.
    pub points: Vec<StrokePoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
}

impl StrokeData {
    /// Placement anchor (first point), if the stroke has one.
    #[must_use]
    pub fn anchor(&self) -> Option<StrokePoint> {
        self.points.first().copied()
    }
}

/// Page metadata shared across participants.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PageInfo {
    pub id: Uuid,
    /// 1-based position in the page collection.
    pub page_number: u32,
    /// CSS background color string.
    pub background_color: String,
}

/// What a `page_change` broadcast asks receivers to do.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageAction {
    Add,
    Navigate,
    Delete,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_kinds() {
        assert!(StrokeKind::Line.is_shape());
        assert!(StrokeKind::Arrow.is_shape());
        assert!(!StrokeKind::Freehand.is_shape());
        assert!(!StrokeKind::Text.is_shape());
        assert!(!StrokeKind::Erase.is_shape());
    }

    #[test]
    fn stroke_serde_omits_absent_text() {
        let stroke = StrokeData {
            id: Uuid::new_v4(),
            kind: StrokeKind::Freehand,
            color: "#000000".into(),
            width: 2.0,
            points: vec![StrokePoint { x: 1.0, y: 2.0 }],
            text: None,
            font_size: None,
        };
        let json = serde_json::to_string(&stroke).unwrap();
        assert!(!json.contains("\"text\""));
        assert!(!json.contains("\"font_size\""));
    }

    #[test]
    fn page_action_serde() {
        assert_eq!(serde_json::to_string(&PageAction::Navigate).unwrap(), "\"navigate\"");
        let back: PageAction = serde_json::from_str("\"delete\"").unwrap();
        assert_eq!(back, PageAction::Delete);
    }

    #[test]
    fn anchor_is_first_point() {
        let stroke = StrokeData {
            id: Uuid::new_v4(),
            kind: StrokeKind::Text,
            color: "#333333".into(),
            width: 1.0,
            points: vec![StrokePoint { x: 40.0, y: 60.0 }, StrokePoint { x: 99.0, y: 99.0 }],
            text: Some("hi".into()),
            font_size: Some(16.0),
        };
        let anchor = stroke.anchor().unwrap();
        assert!((anchor.x - 40.0).abs() < f64::EPSILON);
        assert!((anchor.y - 60.0).abs() < f64::EPSILON);
    }
}
