//! Local participant identity.
//!
//! The backend hands the client a verified profile; everything in the
//! engine addresses and keys state by the resulting
//! `(profile_id, kind)` pair.

use wire::ParticipantRef;

/// The resolved local participant.
#[derive(Clone, Debug)]
pub struct LocalProfile {
    pub me: ParticipantRef,
    pub display_name: String,
}

impl LocalProfile {
    #[must_use]
    pub fn new(me: ParticipantRef, display_name: impl Into<String>) -> Self {
        Self { me, display_name: display_name.into() }
    }
}

/// Initials for an avatar fallback, consumed by the presentation layer.
///
/// Takes the first letter of the first two words, uppercased; a blank
/// name yields `"?"`.
#[must_use]
pub fn initials(name: &str) -> String {
    let letters: String = name
        .split_whitespace()
        .take(2)
        .filter_map(|word| word.chars().next())
        .flat_map(char::to_uppercase)
        .collect();
    if letters.is_empty() { "?".to_owned() } else { letters }
}
