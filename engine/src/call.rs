//! Call signaling and the multi-party peer mesh.
//!
//! ARCHITECTURE
//! ============
//! Every call participant keeps one direct [`PeerLink`] to every other
//! participant; there is no media relay. All negotiation state is keyed
//! by participant identity — never an ambient "the peer" — so offer,
//! answer, and candidate handling interleave safely across links.
//!
//! The mesh forms without a server: the invitation carries the roster,
//! an acceptor answers every buffered offer per-sender and proactively
//! offers the roster members it has no link with yet. When two sides
//! offer each other at once, the higher-ranked identity's offer stands
//! and the other side answers it.
//!
//! LIFECYCLE
//! =========
//! `idle → outgoing-pending → connected → ended`, entered at
//! `incoming-pending` on an invitation. Cancel is not end: a cancelled
//! invite tears down silently, while `call_ended` is mandatory teardown
//! for every recipient. A two-party call (or the host leaving) always
//! ends for everyone; a bigger call shrinks by one link per leaver.

#[cfg(test)]
#[path = "call_test.rs"]
mod call_test;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, info, warn};
use wire::{IceCandidate, ParticipantRef, Payload};

use crate::error::EngineError;
use crate::media::{MediaError, MediaLayer};
use crate::peer::{LinkState, PeerLink};
use crate::presence::{CallDirection, CallHistory, CallOutcome, Presence};
use crate::router::Outbound;

/// Call-level state (distinct from per-link state).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallState {
    Idle,
    OutgoingPending,
    IncomingPending,
    Connected,
    Ended,
}

/// Incoming-call details for the shell to surface.
#[derive(Clone, Debug)]
pub struct RingInfo {
    pub from: ParticipantRef,
    pub caller_name: String,
    pub multi_party: bool,
    pub participant_count: u32,
}

/// What the dispatch layer should do with an invitation.
#[derive(Clone, Debug)]
pub enum InviteOutcome {
    /// Surface incoming-call UI.
    Ring(RingInfo),
    /// Our own reconnect request coming back around; accept silently.
    AutoAccept,
    /// Already in a call; a decline went back to the inviter.
    Busy,
}

#[derive(Clone, Debug, Default)]
struct IncomingInvite {
    caller_name: String,
    multi_party: bool,
    participants: Vec<ParticipantRef>,
    offer: Option<String>,
}

/// Total order on identities used to resolve offer glare.
fn outranks(a: ParticipantRef, b: ParticipantRef) -> bool {
    (a.kind as u8, a.profile_id) > (b.kind as u8, b.profile_id)
}

pub struct CallEngine {
    me: ParticipantRef,
    my_name: String,
    media: Arc<dyn MediaLayer>,
    state: CallState,
    is_host: bool,
    direction: Option<CallDirection>,
    links: HashMap<ParticipantRef, PeerLink>,
    /// Outgoing invitations not yet answered.
    invited: HashSet<ParticipantRef>,
    /// Buffered inbound invites/offers, keyed per sender.
    incoming: HashMap<ParticipantRef, IncomingInvite>,
    /// Participants who voluntarily left, for reconnect auto-accept.
    recent_leavers: HashMap<ParticipantRef, i64>,
    /// Who we asked to rejoin; their next invitation auto-accepts.
    reconnect_target: Option<ParticipantRef>,
    /// The call's host (its initiator), for rejoin after leaving.
    call_host: Option<ParticipantRef>,
    /// Local capture is live (set between acquire and release).
    media_held: bool,
}

impl CallEngine {
    #[must_use]
    pub fn new(me: ParticipantRef, my_name: impl Into<String>, media: Arc<dyn MediaLayer>) -> Self {
        Self {
            me,
            my_name: my_name.into(),
            media,
            state: CallState::Idle,
            is_host: false,
            direction: None,
            links: HashMap::new(),
            invited: HashSet::new(),
            incoming: HashMap::new(),
            recent_leavers: HashMap::new(),
            reconnect_target: None,
            call_host: None,
            media_held: false,
        }
    }

    #[must_use]
    pub fn state(&self) -> CallState {
        self.state
    }

    #[must_use]
    pub fn is_host(&self) -> bool {
        self.is_host
    }

    /// Whether a call attempt holds local media right now.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.media_held
    }

    /// The call's initiator, once known.
    #[must_use]
    pub fn host(&self) -> Option<ParticipantRef> {
        self.call_host
    }

    #[must_use]
    pub fn link_state(&self, peer: ParticipantRef) -> Option<LinkState> {
        self.links.get(&peer).map(|l| l.state)
    }

    #[must_use]
    pub fn peers(&self) -> Vec<ParticipantRef> {
        self.links.keys().copied().collect()
    }

    #[must_use]
    pub fn connected_peers(&self) -> Vec<ParticipantRef> {
        self.links
            .iter()
            .filter(|(_, l)| l.state == LinkState::Connected)
            .map(|(p, _)| *p)
            .collect()
    }

    /// Everyone in the call, local participant included.
    #[must_use]
    pub fn participant_total(&self) -> usize {
        self.links.len() + 1
    }

    fn roster_with(&self, extra: &[ParticipantRef]) -> Vec<ParticipantRef> {
        let mut roster = vec![self.me];
        roster.extend(self.links.keys().copied());
        for peer in extra {
            if !roster.contains(peer) {
                roster.push(*peer);
            }
        }
        roster
    }

    async fn release_media(&mut self) {
        if self.media_held {
            self.media.release_local().await;
            self.media_held = false;
        }
    }

    async fn close_all_links(&mut self) {
        let media = Arc::clone(&self.media);
        for peer in self.links.keys().copied().collect::<Vec<_>>() {
            media.close_peer(peer).await;
        }
        self.links.clear();
        self.invited.clear();
    }

    // -------------------------------------------------------------------
    // Outgoing
    // -------------------------------------------------------------------

    /// Start a call: acquire media, pre-compute one offer per reachable
    /// recipient, and produce an invitation + offer pair for each.
    ///
    /// Offline recipients are discarded individually; if nobody is
    /// reachable the attempt is recorded per recipient as an offline
    /// call and the state stays idle.
    pub async fn initiate(
        &mut self,
        recipients: &[ParticipantRef],
        presence: &Presence,
        history: &mut CallHistory,
        now_ms: i64,
    ) -> Result<Vec<Outbound>, EngineError> {
        if !matches!(self.state, CallState::Idle | CallState::Ended) {
            return Err(EngineError::CallAlreadyActive);
        }

        let (online, offline): (Vec<_>, Vec<_>) =
            recipients.iter().copied().partition(|r| presence.is_online(*r));
        for peer in &offline {
            warn!(%peer, "invitee offline, discarding");
        }

        if online.is_empty() {
            for peer in offline {
                history.record(peer, CallDirection::Outgoing, CallOutcome::Offline, now_ms);
            }
            self.state = CallState::Idle;
            return Ok(Vec::new());
        }

        self.media.acquire_local(true, true).await?;
        self.media_held = true;
        self.is_host = true;
        self.direction = Some(CallDirection::Outgoing);
        self.call_host = Some(self.me);
        self.state = CallState::OutgoingPending;

        let roster = self.roster_with(&online);
        let participant_count = u32::try_from(roster.len()).unwrap_or(u32::MAX);
        let multi_party = online.len() > 1;
        let media = Arc::clone(&self.media);

        let mut outs = Vec::new();
        for peer in online {
            match media.create_offer(peer).await {
                Ok(sdp) => {
                    let mut link = PeerLink::new(peer);
                    link.note_local_offer();
                    self.links.insert(peer, link);
                    self.invited.insert(peer);
                    outs.push(Outbound::to_one(
                        peer,
                        Payload::CallInvitation {
                            caller_name: self.my_name.clone(),
                            multi_party,
                            participant_count,
                            participants: roster.clone(),
                        },
                    ));
                    outs.push(Outbound::to_one(peer, Payload::CallOffer { sdp }));
                }
                Err(e) => {
                    warn!(%peer, error = %e, "offer failed, discarding recipient");
                    media.close_peer(peer).await;
                }
            }
        }

        if self.links.is_empty() {
            self.release_media().await;
            self.is_host = false;
            self.state = CallState::Idle;
            return Err(EngineError::Media(MediaError::Negotiation("no recipient reachable".into())));
        }

        info!(recipients = self.links.len(), multi_party, "call initiated");
        Ok(outs)
    }

    /// Withdraw an outgoing call before anyone answered. Cancel is not
    /// end: recipients get `call_cancelled` and nothing else.
    pub async fn cancel_outgoing(
        &mut self,
        history: &mut CallHistory,
        now_ms: i64,
    ) -> Result<Vec<Outbound>, EngineError> {
        if self.state != CallState::OutgoingPending {
            return Err(EngineError::NoActiveCall);
        }

        let outs: Vec<Outbound> = self
            .invited
            .iter()
            .map(|peer| Outbound::to_one(*peer, Payload::CallCancelled))
            .collect();
        for peer in self.invited.iter().copied().collect::<Vec<_>>() {
            history.record(peer, CallDirection::Outgoing, CallOutcome::Cancelled, now_ms);
        }

        self.close_all_links().await;
        self.release_media().await;
        self.is_host = false;
        self.state = CallState::Idle;
        Ok(outs)
    }

    /// Host-only: bring one more participant into a connected call by
    /// repeating the single-recipient initiate flow. Existing links are
    /// untouched.
    pub async fn add_participant(
        &mut self,
        peer: ParticipantRef,
        presence: &Presence,
    ) -> Result<Vec<Outbound>, EngineError> {
        if !self.is_host {
            return Err(EngineError::HostOnly);
        }
        if self.state != CallState::Connected {
            return Err(EngineError::NoActiveCall);
        }
        if self.links.contains_key(&peer) {
            debug!(%peer, "already in the call");
            return Ok(Vec::new());
        }
        if !presence.is_online(peer) {
            warn!(%peer, "invitee offline, discarding");
            return Ok(Vec::new());
        }

        let roster = self.roster_with(&[peer]);
        let participant_count = u32::try_from(roster.len()).unwrap_or(u32::MAX);
        let sdp = match self.media.create_offer(peer).await {
            Ok(sdp) => sdp,
            Err(e) => {
                warn!(%peer, error = %e, "offer failed, discarding recipient");
                return Ok(Vec::new());
            }
        };

        let mut link = PeerLink::new(peer);
        link.note_local_offer();
        self.links.insert(peer, link);
        self.invited.insert(peer);

        Ok(vec![
            Outbound::to_one(
                peer,
                Payload::CallInvitation {
                    caller_name: self.my_name.clone(),
                    multi_party: true,
                    participant_count,
                    participants: roster,
                },
            ),
            Outbound::to_one(peer, Payload::CallOffer { sdp }),
        ])
    }

    // -------------------------------------------------------------------
    // Incoming
    // -------------------------------------------------------------------

    pub fn handle_invitation(
        &mut self,
        from: ParticipantRef,
        caller_name: String,
        multi_party: bool,
        participant_count: u32,
        participants: Vec<ParticipantRef>,
    ) -> (InviteOutcome, Vec<Outbound>) {
        if self.media_held {
            // Already in a call attempt; refuse politely.
            return (InviteOutcome::Busy, vec![Outbound::to_one(from, Payload::CallDeclined)]);
        }

        let entry = self.incoming.entry(from).or_default();
        entry.caller_name = caller_name.clone();
        entry.multi_party = multi_party;
        entry.participants = participants;
        self.state = CallState::IncomingPending;
        // The inviter is this call's host.
        self.call_host = Some(from);

        if self.reconnect_target == Some(from) {
            return (InviteOutcome::AutoAccept, Vec::new());
        }
        (
            InviteOutcome::Ring(RingInfo { from, caller_name, multi_party, participant_count }),
            Vec::new(),
        )
    }

    /// Take delivery of an SDP offer. Before accept it is buffered per
    /// sender; during a call it is a mesh join (or glare) and gets an
    /// immediate answer.
    pub async fn handle_offer(&mut self, from: ParticipantRef, sdp: String) -> Vec<Outbound> {
        if !self.media_held {
            self.incoming.entry(from).or_default().offer = Some(sdp);
            return Vec::new();
        }

        if let Some(link) = self.links.get_mut(&from) {
            if link.has_local_offer && !link.remote_description_set() {
                if outranks(self.me, from) {
                    debug!(%from, "offer glare: ours stands");
                    return Vec::new();
                }
                debug!(%from, "offer glare: yielding to higher-ranked peer");
                link.reset_negotiation();
            }
        }

        let media = Arc::clone(&self.media);
        let answer = match media.create_answer(from, &sdp).await {
            Ok(answer) => answer,
            Err(e) => {
                warn!(%from, error = %e, "answer creation failed");
                return Vec::new();
            }
        };

        let link = self.links.entry(from).or_insert_with(|| PeerLink::new(from));
        let buffered = link.mark_remote_description();
        link.state = LinkState::Pending;
        for cand in buffered {
            if let Err(e) = media.add_candidate(from, &cand).await {
                warn!(%from, error = %e, "buffered candidate rejected");
            }
        }

        vec![Outbound::to_one(from, Payload::CallAnswer { sdp: answer })]
    }

    /// Accept the ringing call: acquire media, answer every buffered
    /// offer back to its own sender, and offer the rest of the roster to
    /// finish the mesh.
    pub async fn accept(&mut self) -> Result<Vec<Outbound>, EngineError> {
        if self.state != CallState::IncomingPending {
            return Err(EngineError::NoActiveCall);
        }

        if let Err(e) = self.media.acquire_local(true, true).await {
            // Fatal to this attempt only.
            self.incoming.clear();
            self.state = CallState::Idle;
            return Err(EngineError::Media(e));
        }
        self.media_held = true;
        self.is_host = false;
        self.direction = Some(CallDirection::Incoming);
        self.reconnect_target = None;

        let media = Arc::clone(&self.media);
        let incoming = std::mem::take(&mut self.incoming);
        let mut roster: Vec<ParticipantRef> = Vec::new();
        let mut outs = Vec::new();

        for (peer, invite) in incoming {
            for p in invite.participants {
                if p != self.me && !roster.contains(&p) {
                    roster.push(p);
                }
            }
            let Some(offer) = invite.offer else {
                warn!(%peer, "invitation without buffered offer");
                continue;
            };
            match media.create_answer(peer, &offer).await {
                Ok(answer) => {
                    let mut link = PeerLink::new(peer);
                    link.mark_remote_description();
                    link.state = LinkState::Pending;
                    self.links.insert(peer, link);
                    // Per-sender: the answer goes back to whoever sent
                    // this offer, not to a generic "host".
                    outs.push(Outbound::to_one(peer, Payload::CallAnswer { sdp: answer }));
                }
                Err(e) => warn!(%peer, error = %e, "answer creation failed"),
            }
        }

        // Mesh completion: offer every roster member we have no link with.
        for peer in roster {
            if self.links.contains_key(&peer) {
                continue;
            }
            match media.create_offer(peer).await {
                Ok(sdp) => {
                    let mut link = PeerLink::new(peer);
                    link.note_local_offer();
                    self.links.insert(peer, link);
                    outs.push(Outbound::to_one(peer, Payload::CallOffer { sdp }));
                }
                Err(e) => warn!(%peer, error = %e, "mesh offer failed"),
            }
        }

        Ok(outs)
    }

    /// Refuse the ringing call. No local media was ever held.
    pub fn decline(&mut self, history: &mut CallHistory, now_ms: i64) -> Vec<Outbound> {
        let outs: Vec<Outbound> = self
            .incoming
            .keys()
            .map(|peer| Outbound::to_one(*peer, Payload::CallDeclined))
            .collect();
        for peer in self.incoming.keys().copied().collect::<Vec<_>>() {
            history.record(peer, CallDirection::Incoming, CallOutcome::Declined, now_ms);
        }
        self.incoming.clear();
        if self.state == CallState::IncomingPending {
            self.state = CallState::Idle;
        }
        outs
    }

    // -------------------------------------------------------------------
    // Negotiation
    // -------------------------------------------------------------------

    /// Apply a remote answer. Only valid on a link we offered; anything
    /// else is logged and ignored.
    pub async fn handle_answer(&mut self, from: ParticipantRef, sdp: String) {
        let media = Arc::clone(&self.media);
        {
            let Some(link) = self.links.get(&from) else {
                warn!(%from, "answer from unknown peer dropped");
                return;
            };
            if !link.has_local_offer {
                warn!(%from, "answer without a local offer dropped");
                return;
            }
            if link.remote_description_set() {
                debug!(%from, "duplicate answer ignored");
                return;
            }
        }

        if let Err(e) = media.apply_answer(from, &sdp).await {
            warn!(%from, error = %e, "applying answer failed");
            return;
        }

        let buffered = self
            .links
            .get_mut(&from)
            .map(PeerLink::mark_remote_description)
            .unwrap_or_default();
        for cand in buffered {
            if let Err(e) = media.add_candidate(from, &cand).await {
                warn!(%from, error = %e, "buffered candidate rejected");
            }
        }
        self.invited.remove(&from);
    }

    /// Apply or buffer a remote ICE candidate, depending on whether the
    /// link's remote description is in place yet.
    pub async fn handle_candidate(&mut self, from: ParticipantRef, candidate: IceCandidate) {
        let media = Arc::clone(&self.media);
        let Some(link) = self.links.get_mut(&from) else {
            warn!(%from, "candidate for unknown peer dropped");
            return;
        };
        match link.admit_candidate(candidate) {
            Some(ready) => {
                if let Err(e) = media.add_candidate(from, &ready).await {
                    warn!(%from, error = %e, "candidate rejected");
                }
            }
            None => debug!(%from, "candidate buffered until description"),
        }
    }

    // -------------------------------------------------------------------
    // Leaving and ending
    // -------------------------------------------------------------------

    /// Leave the call. Two-party calls and host departures end the call
    /// for everyone; otherwise the rest carry on without us and a rejoin
    /// affordance stays available.
    pub async fn leave(&mut self, history: &mut CallHistory, now_ms: i64) -> Result<Vec<Outbound>, EngineError> {
        if self.state != CallState::Connected {
            return Err(EngineError::NoActiveCall);
        }
        let peers: Vec<ParticipantRef> = self.links.keys().copied().collect();
        let ends_for_all = self.is_host || self.participant_total() <= 2;
        let direction = self.direction.unwrap_or(CallDirection::Outgoing);

        let outs: Vec<Outbound> = if ends_for_all {
            peers
                .iter()
                .map(|p| Outbound::to_one(*p, Payload::CallEnded { ender_name: self.my_name.clone() }))
                .collect()
        } else {
            peers
                .iter()
                .map(|p| Outbound::to_one(*p, Payload::CallParticipantLeft { leaver_name: self.my_name.clone() }))
                .collect()
        };

        for peer in &peers {
            history.record(*peer, direction, CallOutcome::Completed, now_ms);
        }

        self.close_all_links().await;
        self.release_media().await;
        self.is_host = false;
        self.state = CallState::Ended;
        Ok(outs)
    }

    /// Ask to rejoin the call we voluntarily left. The request goes to
    /// the call's host, whose side auto-accepts recent leavers.
    pub fn request_rejoin(&mut self) -> Option<Outbound> {
        let target = self.call_host.filter(|host| *host != self.me)?;
        self.reconnect_target = Some(target);
        Some(Outbound::to_one(target, Payload::CallReconnectRequest))
    }

    /// Mandatory teardown: a `call_ended` is never just "partner left".
    pub async fn handle_ended(&mut self, from: ParticipantRef, history: &mut CallHistory, now_ms: i64) {
        info!(%from, "call ended by peer");
        if self.media_held {
            let direction = self.direction.unwrap_or(CallDirection::Incoming);
            history.record(from, direction, CallOutcome::Completed, now_ms);
        }
        self.close_all_links().await;
        self.release_media().await;
        self.incoming.clear();
        self.is_host = false;
        self.state = CallState::Ended;
    }

    /// One participant left a bigger call; drop their link and carry on.
    pub async fn handle_participant_left(&mut self, from: ParticipantRef, now_ms: i64) {
        if self.links.remove(&from).is_some() {
            self.media.close_peer(from).await;
            self.recent_leavers.insert(from, now_ms);
        }
        self.invited.remove(&from);
        if self.links.is_empty() && self.media_held {
            self.release_media().await;
            self.is_host = false;
            self.state = CallState::Ended;
        }
    }

    /// The inviter withdrew before we answered.
    pub fn handle_cancelled(&mut self, from: ParticipantRef, history: &mut CallHistory, now_ms: i64) {
        if self.incoming.remove(&from).is_some() {
            history.record(from, CallDirection::Incoming, CallOutcome::Missed, now_ms);
        }
        if self.incoming.is_empty() && self.state == CallState::IncomingPending {
            self.state = CallState::Idle;
        }
    }

    /// An invitee refused. Their link goes; a single-recipient attempt
    /// winds down entirely.
    pub async fn handle_declined(&mut self, from: ParticipantRef, history: &mut CallHistory, now_ms: i64) {
        if self.links.remove(&from).is_some() {
            self.media.close_peer(from).await;
            history.record(from, CallDirection::Outgoing, CallOutcome::Declined, now_ms);
        }
        self.invited.remove(&from);
        if self.links.is_empty() && self.state == CallState::OutgoingPending {
            self.release_media().await;
            self.is_host = false;
            self.state = CallState::Idle;
        }
    }

    /// A reconnect request from a recent leaver is auto-accepted with a
    /// fresh single-recipient invite flow; anyone else rings as a new
    /// incoming call.
    pub async fn handle_reconnect_request(
        &mut self,
        from: ParticipantRef,
        now_ms: i64,
        recent_leaver_ms: i64,
    ) -> (InviteOutcome, Vec<Outbound>) {
        let recent = self
            .recent_leavers
            .get(&from)
            .is_some_and(|left_at| now_ms - left_at <= recent_leaver_ms);

        if recent && self.media_held {
            self.recent_leavers.remove(&from);
            let roster = self.roster_with(&[from]);
            let participant_count = u32::try_from(roster.len()).unwrap_or(u32::MAX);
            match self.media.create_offer(from).await {
                Ok(sdp) => {
                    let mut link = PeerLink::new(from);
                    link.note_local_offer();
                    self.links.insert(from, link);
                    self.invited.insert(from);
                    info!(%from, "reconnect auto-accepted");
                    return (
                        InviteOutcome::AutoAccept,
                        vec![
                            Outbound::to_one(
                                from,
                                Payload::CallInvitation {
                                    caller_name: self.my_name.clone(),
                                    multi_party: true,
                                    participant_count,
                                    participants: roster,
                                },
                            ),
                            Outbound::to_one(from, Payload::CallOffer { sdp }),
                        ],
                    );
                }
                Err(e) => {
                    warn!(%from, error = %e, "reconnect offer failed");
                    return (InviteOutcome::Busy, Vec::new());
                }
            }
        }

        // Unknown or stale identity: a fresh incoming invitation.
        self.handle_invitation(from, String::new(), false, 2, vec![self.me, from])
    }

    // -------------------------------------------------------------------
    // Connection-state callbacks from the media layer
    // -------------------------------------------------------------------

    pub async fn on_link_state(&mut self, peer: ParticipantRef, new_state: LinkState) {
        match new_state {
            LinkState::Connected => {
                if let Some(link) = self.links.get_mut(&peer) {
                    link.state = LinkState::Connected;
                }
                self.invited.remove(&peer);
                if matches!(self.state, CallState::OutgoingPending | CallState::IncomingPending) {
                    info!(%peer, "first link up, call connected");
                    self.state = CallState::Connected;
                }
            }
            LinkState::Failed => {
                warn!(%peer, "link failed, removing");
                if self.links.remove(&peer).is_some() {
                    self.media.close_peer(peer).await;
                }
                self.invited.remove(&peer);
                if self.links.is_empty() && self.media_held {
                    self.release_media().await;
                    self.is_host = false;
                    self.state = CallState::Ended;
                }
            }
            LinkState::Disconnected => {
                // Transient blips are expected; warn, don't tear down.
                warn!(%peer, "link disconnected");
                if let Some(link) = self.links.get_mut(&peer) {
                    link.state = LinkState::Disconnected;
                }
            }
            LinkState::New | LinkState::Pending => {
                if let Some(link) = self.links.get_mut(&peer) {
                    link.state = new_state;
                }
            }
        }
    }
}
