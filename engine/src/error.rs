//! Engine error taxonomy.
//!
//! Every failure is handled at the component boundary where it occurs:
//! local capability violations are rejected before any message is built,
//! media failures kill only the current call attempt, and nothing here
//! ever crosses the wire or escapes an inbound-message handler.

use uuid::Uuid;
use wire::ParticipantRef;

use crate::media::MediaError;
use crate::store::StoreError;

/// A capability a local action may require.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Capability {
    Draw,
    Write,
    Erase,
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Draw => write!(f, "draw"),
            Self::Write => write!(f, "write"),
            Self::Erase => write!(f, "erase"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The local participant lacks the capability; surfaced to the user,
    /// never sent over the wire.
    #[error("you do not have {0} permission")]
    NotPermitted(Capability),
    #[error(transparent)]
    Media(#[from] MediaError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("no call is active")]
    NoActiveCall,
    #[error("a call is already active")]
    CallAlreadyActive,
    #[error("unknown peer: {0}")]
    UnknownPeer(ParticipantRef),
    #[error("unknown page: {0}")]
    UnknownPage(Uuid),
    #[error("cannot delete the only page")]
    LastPage,
    #[error("only the host can do this")]
    HostOnly,
    #[error("no stroke gesture is in progress")]
    NotComposing,
}
