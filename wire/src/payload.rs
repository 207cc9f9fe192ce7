//! The typed message catalogue.
//!
//! Every message on the session channel is one of these payloads, wrapped
//! in an [`Envelope`](crate::Envelope) that carries sender and recipients.
//! The enum is internally tagged so the JSON form keeps the familiar
//! `"type"` discriminator older peers dispatch on.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::identity::{Capabilities, ParticipantRef};
use crate::model::{PageAction, PageInfo, StrokeData};

/// An ICE candidate blob plus the mid/index pair the media layer needs to
/// pair it with the right transceiver.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sdp_mline_index: Option<u32>,
}

/// Type-specific payload for one channel message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Payload {
    /// Surfaces incoming-call UI at the recipient. `participants` is the
    /// full roster at invite time so an acceptor can form its side of the
    /// mesh without a relay.
    CallInvitation {
        caller_name: String,
        multi_party: bool,
        participant_count: u32,
        #[serde(default)]
        participants: Vec<ParticipantRef>,
    },
    /// SDP offer for one peer link.
    CallOffer { sdp: String },
    /// SDP answer, returned to the identity that sent the offer.
    CallAnswer { sdp: String },
    IceCandidate { candidate: IceCandidate },
    /// Recipient declined before connecting.
    CallDeclined,
    /// Caller withdrew the invitation before anyone answered.
    CallCancelled,
    /// Mandatory full teardown for every recipient.
    CallEnded { ender_name: String },
    /// One participant left; the call continues for the rest.
    CallParticipantLeft { leaver_name: String },
    /// A recent leaver asking to be let back in.
    CallReconnectRequest,

    /// A committed stroke. Receivers append and render, skipping self-echo.
    Stroke { page_id: Uuid, stroke: StrokeData },
    /// Ephemeral typing preview; self-expires at the receiver.
    TextTyping {
        text: String,
        x: f64,
        y: f64,
        color: String,
        size: f64,
    },

    PermissionRequest {
        requester: ParticipantRef,
        requester_name: String,
    },
    PermissionGranted {
        target: ParticipantRef,
        caps: Capabilities,
    },
    PermissionDenied { target: ParticipantRef },
    PermissionRevoked {
        target: ParticipantRef,
        caps: Capabilities,
    },

    PageChange { action: PageAction, page: PageInfo },

    /// Transient remote-cursor indicator.
    Cursor { x: f64, y: f64 },
    /// Wipe the stroke list of one page.
    Clear { page_id: Uuid },
    /// Pop the most recent stroke. `strokes_after` is the expected list
    /// length once applied, so receivers can detect divergence.
    Undo { page_id: Uuid, strokes_after: u32 },

    /// Cosmetic sync only.
    ColorChange { color: String },
    /// Cosmetic sync only.
    ToolChange { tool: String },

    UserOnline { who: ParticipantRef },
    UserOffline { who: ParticipantRef },

    Ping,
    Pong,
}

impl Payload {
    /// Kind tag as it appears on the wire, for dispatch and logging.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CallInvitation { .. } => "call_invitation",
            Self::CallOffer { .. } => "call_offer",
            Self::CallAnswer { .. } => "call_answer",
            Self::IceCandidate { .. } => "ice_candidate",
            Self::CallDeclined => "call_declined",
            Self::CallCancelled => "call_cancelled",
            Self::CallEnded { .. } => "call_ended",
            Self::CallParticipantLeft { .. } => "call_participant_left",
            Self::CallReconnectRequest => "call_reconnect_request",
            Self::Stroke { .. } => "stroke",
            Self::TextTyping { .. } => "text_typing",
            Self::PermissionRequest { .. } => "permission_request",
            Self::PermissionGranted { .. } => "permission_granted",
            Self::PermissionDenied { .. } => "permission_denied",
            Self::PermissionRevoked { .. } => "permission_revoked",
            Self::PageChange { .. } => "page_change",
            Self::Cursor { .. } => "cursor",
            Self::Clear { .. } => "clear",
            Self::Undo { .. } => "undo",
            Self::ColorChange { .. } => "color_change",
            Self::ToolChange { .. } => "tool_change",
            Self::UserOnline { .. } => "user_online",
            Self::UserOffline { .. } => "user_offline",
            Self::Ping => "ping",
            Self::Pong => "pong",
        }
    }

    /// Keepalive and presence messages are consumed by the relay itself
    /// and ride with an empty recipient list.
    #[must_use]
    pub fn is_channel_scoped(&self) -> bool {
        matches!(
            self,
            Self::Ping | Self::Pong | Self::UserOnline { .. } | Self::UserOffline { .. }
        )
    }

    /// Payloads that mirror the sender's own action back to the mesh;
    /// receivers must drop their own echo.
    #[must_use]
    pub fn is_echo_prone(&self) -> bool {
        matches!(
            self,
            Self::Stroke { .. }
                | Self::TextTyping { .. }
                | Self::Cursor { .. }
                | Self::Clear { .. }
                | Self::Undo { .. }
                | Self::PageChange { .. }
                | Self::ColorChange { .. }
                | Self::ToolChange { .. }
        )
    }
}

#[cfg(test)]
#[path = "payload_test.rs"]
mod tests;
