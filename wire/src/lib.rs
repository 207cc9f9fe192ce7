//! Shared wire model and binary codec for the realtime session channel.
//!
//! This crate owns the representation every peer agrees on: participant
//! identity, the addressed message envelope, the typed payload catalogue,
//! and the stroke/page data that rides inside payloads. Encoding is
//! protobuf for compact binary transport, with the payload kept flexible
//! as a JSON value on the wire so peers can evolve independently.
//!
//! Core logic never sees the legacy dual-field addressing form
//! (`to_student_profile_id` / `to_tutor_profile_id`); the codec normalizes
//! it into the canonical recipient list at the serialization boundary.

mod codec;
mod envelope;
mod identity;
mod model;
mod payload;

pub use codec::{CodecError, decode_envelope, encode_envelope};
pub use envelope::Envelope;
pub use identity::{Capabilities, ParticipantRef, ProfileKind};
pub use model::{PageAction, PageInfo, StrokeData, StrokeKind, StrokePoint};
pub use payload::{IceCandidate, Payload};
