//! Participant identity and capability flags.
//!
//! A profile id is unique only within its kind, so every piece of routing
//! or bookkeeping state is keyed by the full `(profile_id, kind)` pair.

use serde::{Deserialize, Serialize};

/// Which side of the session a profile belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileKind {
    Student,
    Tutor,
}

/// The addressing key for one participant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParticipantRef {
    pub profile_id: i64,
    pub kind: ProfileKind,
}

impl ParticipantRef {
    #[must_use]
    pub fn new(profile_id: i64, kind: ProfileKind) -> Self {
        Self { profile_id, kind }
    }

    #[must_use]
    pub fn student(profile_id: i64) -> Self {
        Self::new(profile_id, ProfileKind::Student)
    }

    #[must_use]
    pub fn tutor(profile_id: i64) -> Self {
        Self::new(profile_id, ProfileKind::Tutor)
    }
}

impl std::fmt::Display for ParticipantRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            ProfileKind::Student => write!(f, "student/{}", self.profile_id),
            ProfileKind::Tutor => write!(f, "tutor/{}", self.profile_id),
        }
    }
}

/// Capability flags carried by permission messages.
///
/// The host never consults these for itself; they describe what a non-host
/// participant may currently do.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub can_draw: bool,
    pub can_write: bool,
    pub can_erase: bool,
}

impl Capabilities {
    /// All three capabilities granted.
    #[must_use]
    pub fn all() -> Self {
        Self { can_draw: true, can_write: true, can_erase: true }
    }

    /// No capability granted.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }
}
