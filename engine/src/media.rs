//! Boundary to the media stack (capture devices + RTC negotiation).
//!
//! The engine owns *bookkeeping* — which peer is in which negotiation
//! state — while the actual capture and transport work happens behind
//! this trait. Failure categories matter to the caller: device errors
//! are fatal to the current call attempt only and each gets its own
//! user-facing message.

use async_trait::async_trait;
use wire::{IceCandidate, ParticipantRef};

#[derive(Clone, Debug, thiserror::Error, PartialEq, Eq)]
pub enum MediaError {
    #[error("camera or microphone access was denied")]
    AccessDenied,
    #[error("capture device is busy")]
    DeviceBusy,
    #[error("no capture device was found")]
    DeviceNotFound,
    #[error("negotiation failed: {0}")]
    Negotiation(String),
}

/// The media stack, keyed by participant identity like every other piece
/// of per-peer state — there is no ambient "the peer".
#[async_trait]
pub trait MediaLayer: Send + Sync {
    /// Acquire local capture (camera/microphone) for a call attempt.
    async fn acquire_local(&self, audio: bool, video: bool) -> Result<(), MediaError>;

    /// Release local capture after the call ends or is abandoned.
    async fn release_local(&self);

    /// Create an SDP offer for one peer connection.
    async fn create_offer(&self, peer: ParticipantRef) -> Result<String, MediaError>;

    /// Apply a remote offer and produce the answer for it.
    async fn create_answer(&self, peer: ParticipantRef, remote_offer: &str) -> Result<String, MediaError>;

    /// Apply the remote answer to a connection we offered.
    async fn apply_answer(&self, peer: ParticipantRef, answer: &str) -> Result<(), MediaError>;

    /// Add a remote ICE candidate. The engine only calls this once the
    /// matching remote description is set; earlier candidates are
    /// buffered upstream.
    async fn add_candidate(&self, peer: ParticipantRef, candidate: &IceCandidate) -> Result<(), MediaError>;

    /// Tear down one peer connection.
    async fn close_peer(&self, peer: ParticipantRef);
}

/// A media layer that negotiates nothing: every operation succeeds and
/// SDP blobs are labeled placeholders. Used by tests and by headless
/// clients that only exercise the signaling plane.
#[derive(Debug, Default)]
pub struct NoopMedia;

impl NoopMedia {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MediaLayer for NoopMedia {
    async fn acquire_local(&self, _audio: bool, _video: bool) -> Result<(), MediaError> {
        Ok(())
    }

    async fn release_local(&self) {}

    async fn create_offer(&self, peer: ParticipantRef) -> Result<String, MediaError> {
        Ok(format!("v=0 offer->{peer}"))
    }

    async fn create_answer(&self, peer: ParticipantRef, _remote_offer: &str) -> Result<String, MediaError> {
        Ok(format!("v=0 answer->{peer}"))
    }

    async fn apply_answer(&self, _peer: ParticipantRef, _answer: &str) -> Result<(), MediaError> {
        Ok(())
    }

    async fn add_candidate(&self, _peer: ParticipantRef, _candidate: &IceCandidate) -> Result<(), MediaError> {
        Ok(())
    }

    async fn close_peer(&self, _peer: ParticipantRef) {}
}
