use prost::Message;
use uuid::Uuid;

use super::*;
use crate::identity::Capabilities;
use crate::model::{StrokeData, StrokeKind, StrokePoint};

fn sample_envelope() -> Envelope {
    let stroke = StrokeData {
        id: Uuid::new_v4(),
        kind: StrokeKind::Rectangle,
        color: "#1F1A17".into(),
        width: 3.0,
        points: vec![StrokePoint { x: 10.0, y: 10.0 }, StrokePoint { x: 50.0, y: 30.0 }],
        text: None,
        font_size: None,
    };
    Envelope::addressed(
        ParticipantRef::tutor(11),
        vec![ParticipantRef::student(22), ParticipantRef::student(33)],
        Payload::Stroke { page_id: Uuid::new_v4(), stroke },
    )
    .with_session("session-9")
}

#[test]
fn round_trip_preserves_envelope() {
    let original = sample_envelope();
    let bytes = encode_envelope(&original);
    let restored = decode_envelope(&bytes).expect("decode");
    assert_eq!(restored, original);
}

#[test]
fn round_trip_channel_scoped_ping() {
    let original = Envelope::channel(ParticipantRef::student(5), Payload::Ping);
    let restored = decode_envelope(&encode_envelope(&original)).expect("decode");
    assert_eq!(restored.payload, Payload::Ping);
    assert!(restored.to.is_empty());
}

#[test]
fn legacy_fields_mirror_first_recipient_per_kind() {
    let env = Envelope::addressed(
        ParticipantRef::student(1),
        vec![ParticipantRef::tutor(42), ParticipantRef::student(7), ParticipantRef::tutor(43)],
        Payload::CallDeclined,
    );
    let bytes = encode_envelope(&env);

    // Re-read the raw wire form to inspect the legacy fields directly.
    let raw = super::WireEnvelope::decode(bytes.as_slice()).expect("raw decode");
    assert_eq!(raw.to_student_profile_id, Some(7));
    assert_eq!(raw.to_tutor_profile_id, Some(42));
}

#[test]
fn decode_normalizes_legacy_only_addressing() {
    // An envelope from an older peer: no recipient list, only dual fields.
    let raw = super::WireEnvelope {
        id: Uuid::new_v4().to_string(),
        ts: 1_700_000_000_000,
        session_id: None,
        from_profile_id: 9,
        from_kind: 1,
        recipients: Vec::new(),
        to_student_profile_id: Some(12),
        to_tutor_profile_id: None,
        payload: Some(super::json_value_to_proto(&serde_json::json!({ "type": "call_declined" }))),
    };
    let mut bytes = Vec::new();
    raw.encode(&mut bytes).unwrap();

    let env = decode_envelope(&bytes).expect("decode");
    assert_eq!(env.from, ParticipantRef::tutor(9));
    assert_eq!(env.to, vec![ParticipantRef::student(12)]);
    assert_eq!(env.payload, Payload::CallDeclined);
}

#[test]
fn generic_recipients_win_over_legacy_fields() {
    let raw = super::WireEnvelope {
        id: Uuid::new_v4().to_string(),
        ts: 1,
        session_id: None,
        from_profile_id: 1,
        from_kind: 0,
        recipients: vec![super::WireRecipient { profile_id: 3, kind: 1 }],
        // Stale legacy fields must be ignored when the generic list is set.
        to_student_profile_id: Some(99),
        to_tutor_profile_id: None,
        payload: Some(super::json_value_to_proto(&serde_json::json!({ "type": "pong" }))),
    };
    let mut bytes = Vec::new();
    raw.encode(&mut bytes).unwrap();

    let env = decode_envelope(&bytes).expect("decode");
    assert_eq!(env.to, vec![ParticipantRef::tutor(3)]);
}

#[test]
fn malformed_bytes_reject() {
    let result = decode_envelope(&[0xFF, 0xFF, 0xFF, 0xFF]);
    assert!(matches!(result, Err(CodecError::Decode(_))));
}

#[test]
fn unknown_payload_type_rejects() {
    let raw = super::WireEnvelope {
        id: Uuid::new_v4().to_string(),
        ts: 1,
        session_id: None,
        from_profile_id: 1,
        from_kind: 0,
        recipients: Vec::new(),
        to_student_profile_id: None,
        to_tutor_profile_id: None,
        payload: Some(super::json_value_to_proto(&serde_json::json!({ "type": "warp_drive" }))),
    };
    let mut bytes = Vec::new();
    raw.encode(&mut bytes).unwrap();

    assert!(matches!(decode_envelope(&bytes), Err(CodecError::Payload(_))));
}

#[test]
fn invalid_profile_kind_rejects() {
    let raw = super::WireEnvelope {
        id: Uuid::new_v4().to_string(),
        ts: 1,
        session_id: None,
        from_profile_id: 1,
        from_kind: 7,
        recipients: Vec::new(),
        to_student_profile_id: None,
        to_tutor_profile_id: None,
        payload: Some(super::json_value_to_proto(&serde_json::json!({ "type": "ping" }))),
    };
    let mut bytes = Vec::new();
    raw.encode(&mut bytes).unwrap();

    assert!(matches!(decode_envelope(&bytes), Err(CodecError::InvalidKind(7))));
}

#[test]
fn permission_payload_round_trip() {
    let env = Envelope::addressed(
        ParticipantRef::tutor(2),
        vec![ParticipantRef::student(6)],
        Payload::PermissionGranted { target: ParticipantRef::student(6), caps: Capabilities::all() },
    );
    let restored = decode_envelope(&encode_envelope(&env)).expect("decode");
    assert_eq!(restored, env);
}
