//! Presence tracking and call history.
//!
//! Presence is a plain online set keyed by profile identity, mutated by
//! `user_online`/`user_offline` messages. History records terminal call
//! outcomes, which is where missed/offline-call bookkeeping lands.

use std::collections::HashMap;

use wire::ParticipantRef;

/// Who is currently reachable, by full profile identity.
#[derive(Clone, Debug, Default)]
pub struct Presence {
    online: HashMap<ParticipantRef, i64>,
}

impl Presence {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply_online(&mut self, who: ParticipantRef, now_ms: i64) {
        self.online.insert(who, now_ms);
    }

    pub fn apply_offline(&mut self, who: ParticipantRef) {
        self.online.remove(&who);
    }

    #[must_use]
    pub fn is_online(&self, who: ParticipantRef) -> bool {
        self.online.contains_key(&who)
    }

    #[must_use]
    pub fn online_count(&self) -> usize {
        self.online.len()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallDirection {
    Outgoing,
    Incoming,
}

/// How a call (or call attempt) ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallOutcome {
    /// The call connected and ran to an ordinary end.
    Completed,
    /// An incoming call was never answered.
    Missed,
    Declined,
    /// The recipient was offline at invite time.
    Offline,
    /// The caller withdrew before anyone answered.
    Cancelled,
}

#[derive(Clone, Copy, Debug)]
pub struct CallRecord {
    pub peer: ParticipantRef,
    pub direction: CallDirection,
    pub outcome: CallOutcome,
    pub at_ms: i64,
}

/// Terminal call outcomes, newest last.
#[derive(Clone, Debug, Default)]
pub struct CallHistory {
    records: Vec<CallRecord>,
}

impl CallHistory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, peer: ParticipantRef, direction: CallDirection, outcome: CallOutcome, at_ms: i64) {
        self.records.push(CallRecord { peer, direction, outcome, at_ms });
    }

    #[must_use]
    pub fn records(&self) -> &[CallRecord] {
        &self.records
    }

    /// Calls that never reached the local user, for the badge counter.
    #[must_use]
    pub fn missed_count(&self) -> usize {
        self.records
            .iter()
            .filter(|r| matches!(r.outcome, CallOutcome::Missed | CallOutcome::Offline))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn online_set_tracks_full_identity() {
        let mut presence = Presence::new();
        presence.apply_online(ParticipantRef::student(1), 100);
        assert!(presence.is_online(ParticipantRef::student(1)));
        // Same id, other kind: a different participant.
        assert!(!presence.is_online(ParticipantRef::tutor(1)));

        presence.apply_offline(ParticipantRef::student(1));
        assert!(!presence.is_online(ParticipantRef::student(1)));
    }

    #[test]
    fn reappearing_refreshes_without_duplicating() {
        let mut presence = Presence::new();
        presence.apply_online(ParticipantRef::student(1), 100);
        presence.apply_online(ParticipantRef::student(1), 200);
        assert_eq!(presence.online_count(), 1);
    }

    #[test]
    fn missed_count_covers_missed_and_offline() {
        let mut history = CallHistory::new();
        let peer = ParticipantRef::tutor(2);
        history.record(peer, CallDirection::Incoming, CallOutcome::Missed, 1);
        history.record(peer, CallDirection::Outgoing, CallOutcome::Offline, 2);
        history.record(peer, CallDirection::Outgoing, CallOutcome::Completed, 3);
        history.record(peer, CallDirection::Incoming, CallOutcome::Declined, 4);
        assert_eq!(history.missed_count(), 2);
        assert_eq!(history.records().len(), 4);
    }
}
