//! The collaboration engine for a shared whiteboard session.
//!
//! ARCHITECTURE
//! ============
//! One session channel multiplexes every message kind; the [`Router`]
//! stamps outgoing envelopes with sender identity and drops anything it
//! cannot address, and [`SessionContext::handle_inbound`] is the single
//! dispatch point for everything that arrives. Components (permissions,
//! stroke sync, page coordination, the call mesh, presence) mutate their
//! own state and *return* what should be sent; the dispatch layer owns
//! all outbound traffic.
//!
//! External collaborators stay behind traits: the durable store
//! ([`SessionStore`]) and the media stack ([`MediaLayer`]). Everything in
//! between — the permission state machine, the at-most-one-writer stroke
//! protocol, and the per-participant peer-link bookkeeping — lives here.

mod call;
mod config;
mod error;
mod identity;
mod media;
mod net;
mod pages;
mod peer;
mod permissions;
mod presence;
mod router;
mod session;
mod store;
mod strokes;

pub use call::{CallEngine, CallState, InviteOutcome, RingInfo};
pub use config::EngineConfig;
pub use error::{Capability, EngineError};
pub use identity::{LocalProfile, initials};
pub use media::{MediaError, MediaLayer, NoopMedia};
pub use net::{ChannelClient, NetError};
pub use pages::{add_page, can_manage_pages, can_navigate, delete_page, navigate};
pub use peer::{LinkState, PeerLink};
pub use permissions::{ActiveGrant, PendingRequest, Permissions};
pub use presence::{CallDirection, CallHistory, CallOutcome, CallRecord, Presence};
pub use router::{Outbound, Router};
pub use session::SessionContext;
pub use store::{InMemoryStore, SessionSnapshot, SessionStore, StoreError};
pub use strokes::StrokeSync;
