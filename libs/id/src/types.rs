//! Typed ID definitions for search resources.
//!
//! Each ID type has a unique prefix that identifies what it names.

use crate::define_id;

define_id!(
    /// Identity of one candidate pipeline. Two candidates are the same
    /// candidate exactly when their IDs are equal.
    CandidateId,
    "cand"
);

define_id!(
    /// Identity of one submitted evaluation job.
    JobId,
    "job"
);

define_id!(
    /// Identity of one search run.
    SearchId,
    "srch"
);

// =============================================================================
// Event Sequence
// =============================================================================

/// Monotonic sequence number of an event within a single search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct EventSeq(u64);

impl EventSeq {
    /// The first sequence number of a search.
    pub const FIRST: Self = Self(1);

    /// Creates a new EventSeq from a u64.
    #[must_use]
    pub const fn new(seq: u64) -> Self {
        Self(seq)
    }

    /// Returns the underlying value.
    #[must_use]
    pub const fn value(&self) -> u64 {
        self.0
    }

    /// Returns the next sequence number.
    #[must_use]
    pub const fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl std::fmt::Display for EventSeq {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl serde::Serialize for EventSeq {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u64(self.0)
    }
}

impl<'de> serde::Deserialize<'de> for EventSeq {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Self)
    }
}
