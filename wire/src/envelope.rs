//! The addressed message envelope.
//!
//! Every message carries its sender identity and zero or more recipient
//! identities. Channel-scoped payloads (keepalive, presence) are the only
//! ones allowed to ride with an empty recipient list; the router drops
//! anything else that fails to resolve a recipient.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::identity::ParticipantRef;
use crate::payload::Payload;

/// Current time as milliseconds since Unix epoch.
#[must_use]
pub(crate) fn now_ms() -> i64 {
    let Ok(dur) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(dur.as_millis()).unwrap_or(0)
}

/// A single message on the session channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub id: Uuid,
    /// Milliseconds since the Unix epoch when the envelope was created.
    pub ts: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub from: ParticipantRef,
    pub to: Vec<ParticipantRef>,
    pub payload: Payload,
}

impl Envelope {
    /// Create an envelope addressed to specific participants.
    #[must_use]
    pub fn addressed(from: ParticipantRef, to: Vec<ParticipantRef>, payload: Payload) -> Self {
        Self { id: Uuid::new_v4(), ts: now_ms(), session_id: None, from, to, payload }
    }

    /// Create a channel-scoped envelope (keepalive/presence); consumed by
    /// the relay, so it carries no recipients.
    #[must_use]
    pub fn channel(from: ParticipantRef, payload: Payload) -> Self {
        Self::addressed(from, Vec::new(), payload)
    }

    #[must_use]
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Whether this envelope was sent by `who`.
    #[must_use]
    pub fn is_from(&self, who: ParticipantRef) -> bool {
        self.from == who
    }
}
