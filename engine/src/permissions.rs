//! Permission state for one session.
//!
//! DESIGN
//! ======
//! The host arbitrates who may draw, write, and erase. Host status is
//! fixed for the lifetime of one call (whoever initiated it) and the
//! host never consults the flag table for itself. Non-host capability
//! flags start all-false and change only through explicit grant/revoke
//! transitions, each of which produces an addressed notification so the
//! affected participant converges without polling.
//!
//! Active grants are tracked separately from the flag table: the flags
//! gate tools, the grant list drives bulk "stop all" operations and the
//! host-visible interaction toggle.
//!
//! With no session open (solo board), every check passes — there is
//! nobody to arbitrate against.

#[cfg(test)]
#[path = "permissions_test.rs"]
mod permissions_test;

use std::collections::HashMap;

use wire::{Capabilities, ParticipantRef, Payload};

use crate::router::Outbound;

/// A grant request waiting for the host to resolve it.
#[derive(Clone, Debug)]
pub struct PendingRequest {
    pub requester: ParticipantRef,
    pub requester_name: String,
    pub requested_at: i64,
}

/// A participant currently holding a live grant.
#[derive(Clone, Debug)]
pub struct ActiveGrant {
    pub participant: ParticipantRef,
    pub display_name: String,
}

pub struct Permissions {
    me: ParticipantRef,
    host: Option<ParticipantRef>,
    flags: HashMap<ParticipantRef, Capabilities>,
    pending: Vec<PendingRequest>,
    active: Vec<ActiveGrant>,
    my_request_outstanding: bool,
}

impl Permissions {
    #[must_use]
    pub fn new(me: ParticipantRef) -> Self {
        Self {
            me,
            host: None,
            flags: HashMap::new(),
            pending: Vec::new(),
            active: Vec::new(),
            my_request_outstanding: false,
        }
    }

    /// Open a session with the given host (the call initiator). Clears
    /// any state left from a previous session.
    pub fn begin_session(&mut self, host: ParticipantRef) {
        self.host = Some(host);
        self.flags.clear();
        self.pending.clear();
        self.active.clear();
        self.my_request_outstanding = false;
    }

    pub fn end_session(&mut self) {
        self.host = None;
        self.flags.clear();
        self.pending.clear();
        self.active.clear();
        self.my_request_outstanding = false;
    }

    #[must_use]
    pub fn in_session(&self) -> bool {
        self.host.is_some()
    }

    #[must_use]
    pub fn host(&self) -> Option<ParticipantRef> {
        self.host
    }

    #[must_use]
    pub fn is_host(&self) -> bool {
        self.host == Some(self.me)
    }

    fn my_flags(&self) -> Capabilities {
        self.flags.get(&self.me).copied().unwrap_or_default()
    }

    #[must_use]
    pub fn can_draw(&self) -> bool {
        self.is_host() || !self.in_session() || self.my_flags().can_draw
    }

    #[must_use]
    pub fn can_write(&self) -> bool {
        self.is_host() || !self.in_session() || self.my_flags().can_write
    }

    #[must_use]
    pub fn can_erase(&self) -> bool {
        self.is_host() || !self.in_session() || self.my_flags().can_erase
    }

    /// Color affects both pen and text.
    #[must_use]
    pub fn can_change_color(&self) -> bool {
        self.can_draw() || self.can_write()
    }

    /// The host-visible toggle: on while anyone holds a live grant.
    #[must_use]
    pub fn interaction_enabled(&self) -> bool {
        !self.active.is_empty()
    }

    #[must_use]
    pub fn pending(&self) -> &[PendingRequest] {
        &self.pending
    }

    #[must_use]
    pub fn active(&self) -> &[ActiveGrant] {
        &self.active
    }

    // -------------------------------------------------------------------
    // Requester side
    // -------------------------------------------------------------------

    /// Ask the host for a grant. Idempotent: a second request while one
    /// is outstanding produces nothing.
    pub fn request_grant(&mut self, display_name: &str) -> Option<Outbound> {
        let host = self.host?;
        if self.is_host() || self.my_request_outstanding {
            return None;
        }
        self.my_request_outstanding = true;
        Some(Outbound::to_one(
            host,
            Payload::PermissionRequest { requester: self.me, requester_name: display_name.to_owned() },
        ))
    }

    /// Apply a grant addressed to the local participant.
    pub fn apply_granted(&mut self, caps: Capabilities) {
        self.flags.insert(self.me, caps);
        self.my_request_outstanding = false;
    }

    pub fn apply_denied(&mut self) {
        self.my_request_outstanding = false;
    }

    pub fn apply_revoked(&mut self) {
        self.flags.insert(self.me, Capabilities::none());
        self.my_request_outstanding = false;
    }

    // -------------------------------------------------------------------
    // Host side
    // -------------------------------------------------------------------

    /// Queue an inbound grant request, deduplicated by requester.
    pub fn handle_request(&mut self, requester: ParticipantRef, requester_name: &str, now_ms: i64) {
        if self.pending.iter().any(|p| p.requester == requester) {
            return;
        }
        self.pending.push(PendingRequest {
            requester,
            requester_name: requester_name.to_owned(),
            requested_at: now_ms,
        });
    }

    /// Grant a pending request. Granting an already-granted participant
    /// leaves the state unchanged. Canvas content is untouched either
    /// way; a grant never clears anything.
    pub fn grant(&mut self, requester: ParticipantRef) -> Option<Outbound> {
        let name = self.take_pending(requester);

        if self.active.iter().any(|g| g.participant == requester) {
            return None;
        }

        let caps = Capabilities::all();
        self.flags.insert(requester, caps);
        self.active.push(ActiveGrant {
            participant: requester,
            display_name: name.unwrap_or_default(),
        });
        Some(Outbound::to_one(requester, Payload::PermissionGranted { target: requester, caps }))
    }

    /// Grant every pending request.
    pub fn grant_all(&mut self) -> Vec<Outbound> {
        let requesters: Vec<ParticipantRef> = self.pending.iter().map(|p| p.requester).collect();
        requesters.into_iter().filter_map(|r| self.grant(r)).collect()
    }

    /// Deny a pending request.
    pub fn deny(&mut self, requester: ParticipantRef) -> Option<Outbound> {
        self.take_pending(requester)?;
        Some(Outbound::to_one(requester, Payload::PermissionDenied { target: requester }))
    }

    pub fn deny_all(&mut self) -> Vec<Outbound> {
        let requesters: Vec<ParticipantRef> = self.pending.iter().map(|p| p.requester).collect();
        requesters.into_iter().filter_map(|r| self.deny(r)).collect()
    }

    /// Revoke a live grant. Revoking an already-revoked participant
    /// leaves the state unchanged.
    pub fn revoke(&mut self, participant: ParticipantRef) -> Option<Outbound> {
        let before = self.active.len();
        self.active.retain(|g| g.participant != participant);
        if self.active.len() == before {
            return None;
        }
        self.flags.insert(participant, Capabilities::none());
        Some(Outbound::to_one(
            participant,
            Payload::PermissionRevoked { target: participant, caps: Capabilities::none() },
        ))
    }

    /// The bulk "stop all" action.
    pub fn revoke_all(&mut self) -> Vec<Outbound> {
        let holders: Vec<ParticipantRef> = self.active.iter().map(|g| g.participant).collect();
        holders.into_iter().filter_map(|p| self.revoke(p)).collect()
    }

    fn take_pending(&mut self, requester: ParticipantRef) -> Option<String> {
        let idx = self.pending.iter().position(|p| p.requester == requester)?;
        Some(self.pending.remove(idx).requester_name)
    }
}
