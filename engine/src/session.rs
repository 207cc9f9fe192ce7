//! The session context: one object owning every component of the local
//! participant's view of a shared session.
//!
//! DESIGN
//! ======
//! There is no global manager. The shell constructs one `SessionContext`
//! per session and drives it from a single event loop: local UI actions
//! call the methods below, inbound envelopes go through
//! [`handle_inbound`](SessionContext::handle_inbound), and both paths
//! funnel outbound traffic through the router. Handlers never send
//! directly and never let an error escape the dispatch loop.
//!
//! Timestamps are passed in, not sampled ambiently, so tests control
//! every clock-sensitive path (throttles, expiry, leaver horizons).

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;

use std::collections::HashSet;
use std::sync::Arc;

use board::{OverlaySet, PageSet, TypingPreview};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;
use wire::{Envelope, PageInfo, ParticipantRef, Payload, StrokeData, StrokeKind, StrokePoint};

use crate::call::{CallEngine, CallState, InviteOutcome, RingInfo};
use crate::config::EngineConfig;
use crate::error::{Capability, EngineError};
use crate::identity::LocalProfile;
use crate::media::MediaLayer;
use crate::pages;
use crate::permissions::Permissions;
use crate::presence::{CallHistory, Presence};
use crate::router::{Outbound, Router};
use crate::store::{SessionSnapshot, SessionStore};
use crate::strokes::StrokeSync;

pub struct SessionContext {
    profile: LocalProfile,
    config: EngineConfig,
    router: Router,
    pub permissions: Permissions,
    pub pages: PageSet,
    pub overlays: OverlaySet,
    pub presence: Presence,
    pub history: CallHistory,
    pub call: CallEngine,
    strokes: StrokeSync,
    store: Arc<dyn SessionStore>,
    roster: HashSet<ParticipantRef>,
    /// Incoming-call details awaiting an accept/decline decision.
    pub incoming_ring: Option<RingInfo>,
}

impl SessionContext {
    #[must_use]
    pub fn new(
        profile: LocalProfile,
        config: EngineConfig,
        store: Arc<dyn SessionStore>,
        media: Arc<dyn MediaLayer>,
        outbox: mpsc::UnboundedSender<Envelope>,
    ) -> Self {
        let first_page = PageInfo { id: Uuid::new_v4(), page_number: 1, background_color: "#FFFFFF".into() };
        Self {
            router: Router::new(profile.me, outbox),
            permissions: Permissions::new(profile.me),
            pages: PageSet::new(first_page),
            overlays: OverlaySet::new(),
            presence: Presence::new(),
            history: CallHistory::new(),
            call: CallEngine::new(profile.me, profile.display_name.clone(), media),
            strokes: StrokeSync::new(),
            store,
            roster: HashSet::new(),
            incoming_ring: None,
            config,
            profile,
        }
    }

    #[must_use]
    pub fn me(&self) -> ParticipantRef {
        self.profile.me
    }

    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.profile.display_name
    }

    /// The composing draft, for local real-time rendering.
    #[must_use]
    pub fn draft(&self) -> Option<&StrokeData> {
        self.strokes.draft()
    }

    /// Load a session from the durable store and start addressing
    /// envelopes with its id.
    pub async fn join_session(&mut self, session_id: &str) -> Result<(), EngineError> {
        let SessionSnapshot { pages, permissions, participants } =
            self.store.load_session(session_id).await?;
        self.pages.load(pages);
        self.roster = participants.into_iter().filter(|p| *p != self.profile.me).collect();
        if let Some(caps) = permissions.get(&self.profile.me) {
            self.permissions.apply_granted(*caps);
        }
        self.router.set_session(Some(session_id.to_owned()));
        Ok(())
    }

    /// Everyone else we currently address broadcasts to.
    fn others(&self) -> Vec<ParticipantRef> {
        self.roster.iter().copied().collect()
    }

    fn broadcast(&self, payload: Payload) {
        self.router.send(Outbound::to_many(self.others(), payload));
    }

    /// Periodic housekeeping; the channel client calls this on its
    /// heartbeat cadence.
    pub fn tick(&mut self, now_ms: i64) {
        self.overlays
            .cleanup_stale(now_ms, self.config.typing_expiry_ms, self.config.cursor_expiry_ms);
    }

    // -------------------------------------------------------------------
    // Drawing
    // -------------------------------------------------------------------

    pub fn begin_stroke(&mut self, kind: StrokeKind, at: StrokePoint) -> Result<(), EngineError> {
        self.strokes.begin_stroke(kind, at, &self.permissions)
    }

    pub fn extend_stroke(&mut self, point: StrokePoint) {
        self.strokes.extend_stroke(point);
    }

    pub fn cancel_stroke(&mut self) {
        self.strokes.cancel_stroke();
    }

    pub fn commit_stroke(&mut self, suppress_broadcast: bool) -> Result<(), EngineError> {
        let payload = self.strokes.commit_stroke(&mut self.pages, &self.store, suppress_broadcast)?;
        if let Some(payload) = payload {
            self.broadcast(payload);
        }
        Ok(())
    }

    pub fn typing_preview(&mut self, text: &str, x: f64, y: f64, size: f64, now_ms: i64) -> Result<(), EngineError> {
        let payload = self
            .strokes
            .typing_preview(text, x, y, size, &self.permissions, &self.config, now_ms)?;
        if let Some(payload) = payload {
            self.broadcast(payload);
        }
        Ok(())
    }

    pub fn cancel_typing(&mut self) {
        self.strokes.cancel_typing();
    }

    pub fn place_text(
        &mut self,
        text: &str,
        at: StrokePoint,
        font_size: f64,
        suppress_broadcast: bool,
    ) -> Result<StrokeData, EngineError> {
        let (stroke, payload) = self.strokes.place_text(
            text,
            at,
            font_size,
            &mut self.pages,
            &self.store,
            &self.permissions,
            &self.config,
            suppress_broadcast,
        )?;
        if let Some(payload) = payload {
            self.broadcast(payload);
        }
        Ok(stroke)
    }

    pub fn undo(&mut self) -> Result<(), EngineError> {
        if let Some(payload) = self.strokes.undo(&mut self.pages, &self.permissions)? {
            self.broadcast(payload);
        }
        Ok(())
    }

    pub fn clear_page(&mut self) -> Result<(), EngineError> {
        let payload = self.strokes.clear(&mut self.pages, &self.permissions)?;
        self.broadcast(payload);
        Ok(())
    }

    pub fn set_color(&mut self, color: &str) -> Result<(), EngineError> {
        if !self.permissions.can_change_color() {
            return Err(EngineError::NotPermitted(Capability::Draw));
        }
        self.strokes.set_color(color);
        self.broadcast(Payload::ColorChange { color: color.to_owned() });
        Ok(())
    }

    pub fn set_tool(&mut self, tool: &str) {
        self.broadcast(Payload::ToolChange { tool: tool.to_owned() });
    }

    pub fn cursor_moved(&self, x: f64, y: f64) {
        self.broadcast(Payload::Cursor { x, y });
    }

    // -------------------------------------------------------------------
    // Pages
    // -------------------------------------------------------------------

    pub fn add_page(&mut self, background_color: &str) -> Result<(), EngineError> {
        let call_active = self.call.is_active();
        let payload = pages::add_page(&mut self.pages, &self.permissions, call_active, background_color)?;
        self.broadcast(payload);
        Ok(())
    }

    pub fn navigate_page(&mut self, page_id: Uuid) -> Result<(), EngineError> {
        let call_active = self.call.is_active();
        let payload = pages::navigate(&mut self.pages, &self.permissions, call_active, page_id)?;
        self.broadcast(payload);
        Ok(())
    }

    pub fn delete_page(&mut self, page_id: Uuid) -> Result<(), EngineError> {
        let call_active = self.call.is_active();
        let payload = pages::delete_page(&mut self.pages, &self.permissions, call_active, page_id)?;
        self.broadcast(payload);
        Ok(())
    }

    // -------------------------------------------------------------------
    // Permissions
    // -------------------------------------------------------------------

    pub fn request_permission(&mut self) {
        let name = self.profile.display_name.clone();
        if let Some(out) = self.permissions.request_grant(&name) {
            self.router.send(out);
        }
    }

    pub fn grant_permission(&mut self, requester: ParticipantRef) {
        if let Some(out) = self.permissions.grant(requester) {
            self.router.send(out);
        }
    }

    pub fn grant_all_permissions(&mut self) {
        let outs = self.permissions.grant_all();
        self.router.send_all(outs);
    }

    pub fn deny_permission(&mut self, requester: ParticipantRef) {
        if let Some(out) = self.permissions.deny(requester) {
            self.router.send(out);
        }
    }

    pub fn deny_all_permissions(&mut self) {
        let outs = self.permissions.deny_all();
        self.router.send_all(outs);
    }

    pub fn revoke_permission(&mut self, participant: ParticipantRef) {
        if let Some(out) = self.permissions.revoke(participant) {
            self.router.send(out);
        }
    }

    pub fn revoke_all_permissions(&mut self) {
        let outs = self.permissions.revoke_all();
        self.router.send_all(outs);
    }

    // -------------------------------------------------------------------
    // Calls
    // -------------------------------------------------------------------

    pub async fn start_call(&mut self, recipients: &[ParticipantRef], now_ms: i64) -> Result<(), EngineError> {
        let outs = self
            .call
            .initiate(recipients, &self.presence, &mut self.history, now_ms)
            .await?;
        if self.call.state() == CallState::OutgoingPending {
            self.permissions.begin_session(self.profile.me);
            self.roster.extend(self.call.peers());
        }
        self.router.send_all(outs);
        Ok(())
    }

    pub async fn accept_call(&mut self) -> Result<(), EngineError> {
        let outs = self.call.accept().await?;
        self.incoming_ring = None;
        if let Some(host) = self.call.host() {
            self.permissions.begin_session(host);
        }
        self.roster.extend(self.call.peers());
        self.router.send_all(outs);
        Ok(())
    }

    pub fn decline_call(&mut self, now_ms: i64) {
        let outs = self.call.decline(&mut self.history, now_ms);
        self.incoming_ring = None;
        self.router.send_all(outs);
    }

    pub async fn cancel_call(&mut self, now_ms: i64) -> Result<(), EngineError> {
        let outs = self.call.cancel_outgoing(&mut self.history, now_ms).await?;
        self.permissions.end_session();
        self.router.send_all(outs);
        Ok(())
    }

    pub async fn leave_call(&mut self, now_ms: i64) -> Result<(), EngineError> {
        let outs = self.call.leave(&mut self.history, now_ms).await?;
        self.permissions.end_session();
        self.strokes.cancel_stroke();
        self.strokes.cancel_typing();
        self.router.send_all(outs);
        Ok(())
    }

    pub fn rejoin_call(&mut self) {
        if let Some(out) = self.call.request_rejoin() {
            self.router.send(out);
        }
    }

    pub async fn add_call_participant(&mut self, peer: ParticipantRef, _now_ms: i64) -> Result<(), EngineError> {
        let outs = self.call.add_participant(peer, &self.presence).await?;
        self.roster.insert(peer);
        self.router.send_all(outs);
        Ok(())
    }

    /// Connection-state callback from the media layer.
    pub async fn on_media_link_state(&mut self, peer: ParticipantRef, state: crate::peer::LinkState) {
        self.call.on_link_state(peer, state).await;
        if self.call.state() == CallState::Ended {
            self.permissions.end_session();
        }
    }

    // -------------------------------------------------------------------
    // Inbound dispatch
    // -------------------------------------------------------------------

    /// The single dispatch point for everything arriving on the channel.
    /// Handlers mutate state and queue outbound traffic; no failure in
    /// here may abort the processing loop.
    pub async fn handle_inbound(&mut self, env: Envelope, now_ms: i64) {
        if env.is_from(self.profile.me) && env.payload.is_echo_prone() {
            debug!(kind = env.payload.kind(), "self-echo skipped");
            return;
        }
        if !env.payload.is_channel_scoped() && !env.is_from(self.profile.me) {
            self.roster.insert(env.from);
        }

        let from = env.from;
        match env.payload {
            Payload::Ping => self.router.send(Outbound::channel(Payload::Pong)),
            Payload::Pong => {}

            Payload::UserOnline { who } => {
                self.presence.apply_online(who, now_ms);
            }
            Payload::UserOffline { who } => {
                self.presence.apply_offline(who);
                self.overlays.remove_participant(who);
                self.roster.remove(&who);
            }

            Payload::Cursor { x, y } => self.overlays.upsert_cursor(from, x, y, now_ms),
            Payload::TextTyping { text, x, y, color, size } => {
                self.overlays
                    .upsert_typing(from, TypingPreview { text, x, y, color, size, updated_at: now_ms });
            }

            Payload::Stroke { page_id, stroke } => {
                self.strokes
                    .apply_remote_stroke(from, page_id, stroke, &mut self.pages, &mut self.overlays);
            }
            Payload::Undo { page_id, strokes_after } => {
                self.strokes.apply_remote_undo(from, page_id, strokes_after, &mut self.pages);
            }
            Payload::Clear { page_id } => {
                self.strokes.apply_remote_clear(from, page_id, &mut self.pages);
            }

            Payload::PageChange { action, page } => pages::apply_remote(&mut self.pages, action, page),

            Payload::ColorChange { .. } | Payload::ToolChange { .. } => {
                // Cosmetic sync; nothing to converge locally.
            }

            Payload::PermissionRequest { requester, requester_name } => {
                if self.permissions.is_host() {
                    self.permissions.handle_request(requester, &requester_name, now_ms);
                } else {
                    warn!(%requester, "permission request reached a non-host");
                }
            }
            Payload::PermissionGranted { target, caps } => {
                if target == self.profile.me {
                    self.permissions.apply_granted(caps);
                }
            }
            Payload::PermissionDenied { target } => {
                if target == self.profile.me {
                    self.permissions.apply_denied();
                }
            }
            Payload::PermissionRevoked { target, .. } => {
                if target == self.profile.me {
                    self.permissions.apply_revoked();
                    // A revoke cancels in-flight work but never touches
                    // committed strokes.
                    self.strokes.cancel_stroke();
                    self.strokes.cancel_typing();
                }
            }

            Payload::CallInvitation { caller_name, multi_party, participant_count, participants } => {
                let (outcome, outs) = self.call.handle_invitation(
                    from,
                    caller_name,
                    multi_party,
                    participant_count,
                    participants,
                );
                self.router.send_all(outs);
                match outcome {
                    InviteOutcome::Ring(info) => self.incoming_ring = Some(info),
                    InviteOutcome::AutoAccept => {
                        if let Err(e) = self.accept_call().await {
                            warn!(error = %e, "reconnect auto-accept failed");
                        }
                    }
                    InviteOutcome::Busy => {}
                }
            }
            Payload::CallOffer { sdp } => {
                let outs = self.call.handle_offer(from, sdp).await;
                self.router.send_all(outs);
            }
            Payload::CallAnswer { sdp } => self.call.handle_answer(from, sdp).await,
            Payload::IceCandidate { candidate } => self.call.handle_candidate(from, candidate).await,
            Payload::CallDeclined => {
                self.call.handle_declined(from, &mut self.history, now_ms).await;
                if self.call.state() == CallState::Idle {
                    self.permissions.end_session();
                }
            }
            Payload::CallCancelled => {
                self.call.handle_cancelled(from, &mut self.history, now_ms);
                self.incoming_ring = None;
            }
            Payload::CallEnded { .. } => {
                self.call.handle_ended(from, &mut self.history, now_ms).await;
                self.permissions.end_session();
                self.strokes.cancel_stroke();
                self.strokes.cancel_typing();
            }
            Payload::CallParticipantLeft { .. } => {
                self.call.handle_participant_left(from, now_ms).await;
                self.overlays.remove_participant(from);
            }
            Payload::CallReconnectRequest => {
                let horizon = self.config.recent_leaver_ms;
                let (outcome, outs) = self.call.handle_reconnect_request(from, now_ms, horizon).await;
                self.router.send_all(outs);
                if let InviteOutcome::Ring(info) = outcome {
                    self.incoming_ring = Some(info);
                }
            }
        }
    }
}
