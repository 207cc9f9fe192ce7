//! Per-peer link bookkeeping for the mesh call.
//!
//! One `PeerLink` exists per remote participant in an active call. It
//! carries the negotiation ordering state the media layer cannot enforce
//! for us: an ICE candidate must not be applied before the remote
//! description it pairs with, so early candidates are buffered here and
//! drained the moment the description lands.

use wire::{IceCandidate, ParticipantRef};

/// Connection lifecycle of one peer link.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkState {
    /// Created, nothing sent yet.
    New,
    /// Negotiation in flight.
    Pending,
    Connected,
    /// Transient loss; surfaced as a warning, not torn down.
    Disconnected,
    Failed,
}

/// One direct media connection between the local participant and one
/// remote participant.
#[derive(Clone, Debug)]
pub struct PeerLink {
    pub participant: ParticipantRef,
    pub state: LinkState,
    /// We created and sent an offer on this link; an inbound answer is
    /// only valid when this is set.
    pub has_local_offer: bool,
    remote_description_set: bool,
    pending_candidates: Vec<IceCandidate>,
}

impl PeerLink {
    #[must_use]
    pub fn new(participant: ParticipantRef) -> Self {
        Self {
            participant,
            state: LinkState::New,
            has_local_offer: false,
            remote_description_set: false,
            pending_candidates: Vec::new(),
        }
    }

    pub fn note_local_offer(&mut self) {
        self.has_local_offer = true;
        self.state = LinkState::Pending;
    }

    #[must_use]
    pub fn remote_description_set(&self) -> bool {
        self.remote_description_set
    }

    /// Record that the remote description is in place and drain the
    /// candidates that arrived early, in arrival order.
    pub fn mark_remote_description(&mut self) -> Vec<IceCandidate> {
        self.remote_description_set = true;
        std::mem::take(&mut self.pending_candidates)
    }

    /// Either hand back a candidate that can be applied now, or buffer it
    /// until [`mark_remote_description`](Self::mark_remote_description).
    pub fn admit_candidate(&mut self, candidate: IceCandidate) -> Option<IceCandidate> {
        if self.remote_description_set {
            Some(candidate)
        } else {
            self.pending_candidates.push(candidate);
            None
        }
    }

    /// Reset negotiation state for a fresh offer/answer round
    /// (renegotiation or glare fallback).
    pub fn reset_negotiation(&mut self) {
        self.has_local_offer = false;
        self.remote_description_set = false;
        self.pending_candidates.clear();
        self.state = LinkState::New;
    }
}
