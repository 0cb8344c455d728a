//! Event envelope - the common wrapper for all search events.

use chrono::{DateTime, Utc};
use halving_id::{EventSeq, SearchId};
use serde::{Deserialize, Serialize};

use crate::{EventError, SearchEvent};

/// Common metadata around a [`SearchEvent`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// The search run this event belongs to.
    pub search_id: SearchId,

    /// Monotonic sequence within the search.
    pub seq: EventSeq,

    /// When the event occurred.
    pub occurred_at: DateTime<Utc>,

    /// The event itself, serialized as `event_type` + `payload`.
    pub event: SearchEvent,
}

impl EventEnvelope {
    /// Wraps an event stamped with the current time.
    pub fn new(search_id: SearchId, seq: EventSeq, event: SearchEvent) -> Self {
        Self {
            search_id,
            seq,
            occurred_at: Utc::now(),
            event,
        }
    }

    /// The event type name.
    pub fn event_type(&self) -> &'static str {
        self.event.event_type()
    }

    /// Serializes the envelope as a single JSON line (no trailing newline).
    pub fn to_json_line(&self) -> Result<String, EventError> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CandidatePromotedPayload, SearchEvent};
    use halving_id::CandidateId;

    #[test]
    fn test_envelope_json_line() {
        let envelope = EventEnvelope::new(
            SearchId::from_u128(5),
            EventSeq::FIRST,
            SearchEvent::CandidatePromoted(CandidatePromotedPayload {
                candidate_id: CandidateId::from_u128(1),
                from_rung: 1,
                to_rung: 2,
                loss: 0.5,
            }),
        );

        let line = envelope.to_json_line().unwrap();
        assert!(!line.contains('\n'));

        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["event"]["event_type"], "candidate.promoted");
        assert_eq!(value["seq"], 1);
        assert_eq!(value["search_id"], SearchId::from_u128(5).to_string());

        let parsed: EventEnvelope = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed, envelope);
    }
}
