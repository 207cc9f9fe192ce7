//! Outbound half of the message router.
//!
//! DESIGN
//! ======
//! Components never send: they return [`Outbound`] values and the
//! dispatch layer pushes them through here. The router stamps every
//! envelope with the local sender identity and the session id, and it
//! refuses silently — log and drop, never raise — when a message has no
//! resolvable recipient, since that most often means a stale or departed
//! participant.

use tokio::sync::mpsc;
use tracing::{debug, warn};
use wire::{Envelope, ParticipantRef, Payload};

/// A payload plus where it should go, produced by a component.
#[derive(Clone, Debug)]
pub struct Outbound {
    pub to: Vec<ParticipantRef>,
    pub payload: Payload,
}

impl Outbound {
    #[must_use]
    pub fn to_one(to: ParticipantRef, payload: Payload) -> Self {
        Self { to: vec![to], payload }
    }

    #[must_use]
    pub fn to_many(to: Vec<ParticipantRef>, payload: Payload) -> Self {
        Self { to, payload }
    }

    /// Keepalive/presence messages consumed by the relay itself.
    #[must_use]
    pub fn channel(payload: Payload) -> Self {
        Self { to: Vec::new(), payload }
    }
}

/// Stamps and enqueues outgoing envelopes onto the channel task.
pub struct Router {
    local: ParticipantRef,
    session_id: Option<String>,
    outbox: mpsc::UnboundedSender<Envelope>,
}

impl Router {
    #[must_use]
    pub fn new(local: ParticipantRef, outbox: mpsc::UnboundedSender<Envelope>) -> Self {
        Self { local, session_id: None, outbox }
    }

    pub fn set_session(&mut self, session_id: Option<String>) {
        self.session_id = session_id;
    }

    #[must_use]
    pub fn local(&self) -> ParticipantRef {
        self.local
    }

    /// Stamp and enqueue one message. Unaddressable messages are dropped
    /// with a log line; so are sends after the channel task is gone.
    pub fn send(&self, out: Outbound) {
        if out.to.is_empty() && !out.payload.is_channel_scoped() {
            warn!(kind = out.payload.kind(), "no recipient resolved, dropping message");
            return;
        }

        let mut env = Envelope::addressed(self.local, out.to, out.payload);
        if let Some(session_id) = &self.session_id {
            env = env.with_session(session_id.clone());
        }

        if self.outbox.send(env).is_err() {
            debug!("channel task gone, dropping outbound message");
        }
    }

    pub fn send_all(&self, outs: Vec<Outbound>) {
        for out in outs {
            self.send(out);
        }
    }
}
