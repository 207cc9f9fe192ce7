//! Protobuf codec for the session channel.
//!
//! The envelope header (identity, addressing, timestamps) is strongly
//! typed on the wire; the payload crosses as a JSON value mapped onto
//! `prost_types::Value` so peers on different versions can still parse
//! the header and drop payloads they do not understand.
//!
//! Older peers address messages with two nullable per-kind fields instead
//! of a recipient list. Both forms are written on encode and accepted on
//! decode; everything past this module sees only the canonical
//! `Vec<ParticipantRef>`.

use prost::Message;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::envelope::Envelope;
use crate::identity::{ParticipantRef, ProfileKind};
use crate::payload::Payload;

/// Error returned by [`decode_envelope`].
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The raw bytes could not be decoded as a protobuf envelope.
    #[error("failed to decode protobuf envelope: {0}")]
    Decode(#[from] prost::DecodeError),
    /// The profile kind integer on the wire maps to no known kind.
    #[error("invalid profile kind: {0}")]
    InvalidKind(i32),
    /// The envelope id is not a UUID.
    #[error("invalid envelope id: {0}")]
    InvalidId(#[from] uuid::Error),
    /// The payload JSON does not match any catalogued message type.
    #[error("unusable payload: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Encode an envelope into protobuf bytes.
///
/// # Panics
///
/// Never panics in practice; writing to `Vec<u8>` is infallible.
#[must_use]
pub fn encode_envelope(env: &Envelope) -> Vec<u8> {
    let wire = envelope_to_wire(env);

    let mut out = Vec::with_capacity(wire.encoded_len());
    // Encoding into a growable Vec cannot hit BufferTooSmall.
    wire.encode(&mut out).unwrap_or_default();
    out
}

/// Decode protobuf bytes into an envelope.
///
/// # Errors
///
/// Returns [`CodecError::Decode`] for malformed bytes,
/// [`CodecError::InvalidKind`] / [`CodecError::InvalidId`] for bad header
/// fields, and [`CodecError::Payload`] when the payload JSON matches no
/// catalogued message type.
pub fn decode_envelope(bytes: &[u8]) -> Result<Envelope, CodecError> {
    let wire = WireEnvelope::decode(bytes)?;
    wire_to_envelope(wire)
}

fn kind_to_wire(kind: ProfileKind) -> i32 {
    match kind {
        ProfileKind::Student => WireProfileKind::Student as i32,
        ProfileKind::Tutor => WireProfileKind::Tutor as i32,
    }
}

fn kind_from_wire(value: i32) -> Result<ProfileKind, CodecError> {
    match WireProfileKind::try_from(value) {
        Ok(WireProfileKind::Student) => Ok(ProfileKind::Student),
        Ok(WireProfileKind::Tutor) => Ok(ProfileKind::Tutor),
        Err(_) => Err(CodecError::InvalidKind(value)),
    }
}

fn envelope_to_wire(env: &Envelope) -> WireEnvelope {
    // Legacy dual-field addressing: mirror the first recipient of each
    // kind so pre-recipient-list peers still route the message.
    let legacy_student = env
        .to
        .iter()
        .find(|r| r.kind == ProfileKind::Student)
        .map(|r| r.profile_id);
    let legacy_tutor = env
        .to
        .iter()
        .find(|r| r.kind == ProfileKind::Tutor)
        .map(|r| r.profile_id);

    let payload = serde_json::to_value(&env.payload).unwrap_or(Value::Null);

    WireEnvelope {
        id: env.id.to_string(),
        ts: env.ts,
        session_id: env.session_id.clone(),
        from_profile_id: env.from.profile_id,
        from_kind: kind_to_wire(env.from.kind),
        recipients: env
            .to
            .iter()
            .map(|r| WireRecipient { profile_id: r.profile_id, kind: kind_to_wire(r.kind) })
            .collect(),
        to_student_profile_id: legacy_student,
        to_tutor_profile_id: legacy_tutor,
        payload: Some(json_value_to_proto(&payload)),
    }
}

fn wire_to_envelope(wire: WireEnvelope) -> Result<Envelope, CodecError> {
    let mut to = Vec::with_capacity(wire.recipients.len());
    for r in &wire.recipients {
        to.push(ParticipantRef::new(r.profile_id, kind_from_wire(r.kind)?));
    }

    // Envelope from an older peer: only the dual legacy fields are set.
    if to.is_empty() {
        if let Some(id) = wire.to_student_profile_id {
            to.push(ParticipantRef::student(id));
        }
        if let Some(id) = wire.to_tutor_profile_id {
            to.push(ParticipantRef::tutor(id));
        }
    }

    let payload_value = wire
        .payload
        .map_or(Value::Object(Map::new()), |v| proto_value_to_json(&v));
    let payload: Payload = serde_json::from_value(payload_value)?;

    Ok(Envelope {
        id: Uuid::parse_str(&wire.id)?,
        ts: wire.ts,
        session_id: wire.session_id,
        from: ParticipantRef::new(wire.from_profile_id, kind_from_wire(wire.from_kind)?),
        to,
        payload,
    })
}

fn json_value_to_proto(value: &Value) -> prost_types::Value {
    let kind = match value {
        Value::Null => {
            prost_types::value::Kind::NullValue(prost_types::NullValue::NullValue as i32)
        }
        Value::Bool(v) => prost_types::value::Kind::BoolValue(*v),
        Value::Number(v) => prost_types::value::Kind::NumberValue(v.as_f64().unwrap_or(0.0)),
        Value::String(v) => prost_types::value::Kind::StringValue(v.clone()),
        Value::Array(v) => prost_types::value::Kind::ListValue(prost_types::ListValue {
            values: v.iter().map(json_value_to_proto).collect(),
        }),
        Value::Object(v) => prost_types::value::Kind::StructValue(prost_types::Struct {
            fields: v
                .iter()
                .map(|(k, v)| (k.clone(), json_value_to_proto(v)))
                .collect(),
        }),
    };

    prost_types::Value { kind: Some(kind) }
}

fn proto_value_to_json(value: &prost_types::Value) -> Value {
    let Some(kind) = &value.kind else {
        return Value::Null;
    };

    match kind {
        prost_types::value::Kind::NullValue(_) => Value::Null,
        prost_types::value::Kind::NumberValue(v) => json_number(*v),
        prost_types::value::Kind::StringValue(v) => Value::String(v.clone()),
        prost_types::value::Kind::BoolValue(v) => Value::Bool(*v),
        prost_types::value::Kind::StructValue(v) => Value::Object(
            v.fields
                .iter()
                .map(|(k, v)| (k.clone(), proto_value_to_json(v)))
                .collect(),
        ),
        prost_types::value::Kind::ListValue(v) => {
            Value::Array(v.values.iter().map(proto_value_to_json).collect())
        }
    }
}

/// Protobuf's `NumberValue` is always a double. Restore integer typing
/// when the value is exact so integer-typed payload fields (profile ids,
/// counts) deserialize; fractional values stay floats.
#[allow(clippy::cast_possible_truncation)]
fn json_number(v: f64) -> Value {
    const EXACT: f64 = 9_007_199_254_740_992.0; // 2^53
    if v.fract() == 0.0 && v.abs() < EXACT {
        Value::Number(serde_json::Number::from(v as i64))
    } else {
        serde_json::Number::from_f64(v).map_or(Value::Null, Value::Number)
    }
}

#[derive(Clone, PartialEq, Message)]
struct WireEnvelope {
    #[prost(string, tag = "1")]
    id: String,
    #[prost(int64, tag = "2")]
    ts: i64,
    #[prost(string, optional, tag = "3")]
    session_id: Option<String>,
    #[prost(int64, tag = "4")]
    from_profile_id: i64,
    #[prost(enumeration = "WireProfileKind", tag = "5")]
    from_kind: i32,
    #[prost(message, repeated, tag = "6")]
    recipients: Vec<WireRecipient>,
    #[prost(int64, optional, tag = "7")]
    to_student_profile_id: Option<i64>,
    #[prost(int64, optional, tag = "8")]
    to_tutor_profile_id: Option<i64>,
    #[prost(message, optional, tag = "9")]
    payload: Option<prost_types::Value>,
}

#[derive(Clone, PartialEq, Message)]
struct WireRecipient {
    #[prost(int64, tag = "1")]
    profile_id: i64,
    #[prost(enumeration = "WireProfileKind", tag = "2")]
    kind: i32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, prost::Enumeration)]
#[repr(i32)]
enum WireProfileKind {
    Student = 0,
    Tutor = 1,
}

#[cfg(test)]
#[path = "codec_test.rs"]
mod tests;
