//! Identifier types for voters and votes.
//!
//! [`VoterId`] wraps the opaque identity string handed to the engine by the
//! transport layer (in production a verified wallet address). The engine
//! never inspects its content; it only compares and stores it.
//!
//! [`VoteId`] is an app-side UUID v7 (time-ordered) assigned when a vote is
//! recorded, so persisted votes sort in cast order.

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

/// Opaque identifier for a voter.
///
/// Supplied by the identity collaborator; unique per participant. Two votes
/// with the same `VoterId` in the same round are a duplicate.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct VoterId(pub String);

impl VoterId {
    /// Create a voter identifier from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Return the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the wrapper and return the inner string.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl core::fmt::Display for VoterId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for VoterId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for VoterId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

/// Unique identifier for a recorded vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct VoteId(pub Uuid);

impl VoteId {
    /// Create a new identifier using UUID v7 (time-ordered).
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Return the inner [`Uuid`] value.
    pub const fn into_inner(self) -> Uuid {
        self.0
    }
}

impl Default for VoteId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for VoteId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for VoteId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl From<VoteId> for Uuid {
    fn from(id: VoteId) -> Self {
        id.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn voter_id_round_trips_through_serde() {
        let id = VoterId::new("wallet-abc123");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"wallet-abc123\"");
        let back: VoterId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn voter_id_equality_is_exact() {
        assert_eq!(VoterId::from("a"), VoterId::new("a"));
        assert_ne!(VoterId::from("a"), VoterId::from("A"));
    }

    #[test]
    fn vote_ids_are_unique_and_time_ordered() {
        let first = VoteId::new();
        let second = VoteId::new();
        assert_ne!(first, second);
        // UUID v7 embeds a timestamp prefix, so later IDs sort later.
        assert!(first < second);
    }
}
