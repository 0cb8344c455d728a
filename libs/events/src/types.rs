//! Event type definitions for search events.
//!
//! Each event carries a payload struct with the event-specific data.
//! Rungs are plain `u32` indices here so this crate stays independent of the
//! rung table.

use halving_id::{CandidateId, JobId};
use serde::{Deserialize, Serialize};

// =============================================================================
// Event Type Constants
// =============================================================================

/// All event type names as constants.
pub mod event_types {
    pub const SEARCH_STARTED: &str = "search.started";
    pub const SEARCH_FINISHED: &str = "search.finished";

    pub const EVALUATION_RECORDED: &str = "evaluation.recorded";
    pub const EVALUATION_FAILED: &str = "evaluation.failed";

    pub const CANDIDATE_PROMOTED: &str = "candidate.promoted";
}

// =============================================================================
// Enums
// =============================================================================

/// How a finished search relates to its designed termination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStatus {
    /// `max_full_evaluations` entries were recorded at the top rung.
    Complete,
    /// The deadline fired after the top rung had at least one entry.
    Partial,
    /// The deadline fired before the top rung was ever reached.
    Incomplete,
}

impl SearchStatus {
    /// Returns true when the run should be reported as a soft failure.
    pub fn is_incomplete(&self) -> bool {
        matches!(self, Self::Incomplete)
    }
}

impl std::fmt::Display for SearchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SearchStatus::Complete => "complete",
            SearchStatus::Partial => "partial",
            SearchStatus::Incomplete => "incomplete",
        };
        write!(f, "{}", s)
    }
}

/// Why the scheduler loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    /// The configured number of full-budget evaluations was reached.
    FullEvaluationsReached,
    /// The global deadline elapsed.
    Deadline,
    /// The job pool ran dry (every in-flight job vanished without a
    /// replacement being possible).
    PoolExhausted,
    /// The caller asked the search to stop.
    Interrupted,
}

impl std::fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TerminationReason::FullEvaluationsReached => "full_evaluations_reached",
            TerminationReason::Deadline => "deadline",
            TerminationReason::PoolExhausted => "pool_exhausted",
            TerminationReason::Interrupted => "interrupted",
        };
        write!(f, "{}", s)
    }
}

/// Reason an evaluation produced no result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationFailureKind {
    Timeout,
    Error,
    Panicked,
}

// =============================================================================
// Event Payloads
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchStartedPayload {
    pub reduction_factor: u64,
    pub minimum_resource: u64,
    pub maximum_resource: u64,
    pub minimum_early_stopping_rate: u32,
    pub max_rung: u32,
    pub window_size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_full_evaluations: Option<usize>,
    pub seed_candidates: usize,
}

/// One completed evaluation, as written to the search log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecordedPayload {
    pub job_id: JobId,
    pub candidate_id: CandidateId,
    pub rung: u32,
    pub budget: u64,
    pub loss: f64,
    /// Metric values reported by the evaluator, in evaluator order.
    pub values: Vec<f64>,
    /// Wall-clock duration of the evaluation in seconds.
    pub wallclock_secs: f64,
    /// Human-readable pipeline description.
    pub pipeline: String,
    /// Whether the evaluation ran at the top rung.
    pub full_evaluation: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationFailedPayload {
    pub job_id: JobId,
    pub candidate_id: CandidateId,
    pub rung: u32,
    pub kind: EvaluationFailureKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidatePromotedPayload {
    pub candidate_id: CandidateId,
    pub from_rung: u32,
    pub to_rung: u32,
    pub loss: f64,
}

/// Entry and promotion counts of one rung at the end of a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RungCount {
    pub rung: u32,
    pub entries: usize,
    pub promoted: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchFinishedPayload {
    pub status: SearchStatus,
    pub reason: TerminationReason,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_rung: Option<u32>,
    pub result_size: usize,
    pub rungs: Vec<RungCount>,
}

// =============================================================================
// Search Event
// =============================================================================

/// Every event a search can emit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", content = "payload")]
pub enum SearchEvent {
    #[serde(rename = "search.started")]
    SearchStarted(SearchStartedPayload),
    #[serde(rename = "evaluation.recorded")]
    EvaluationRecorded(EvaluationRecordedPayload),
    #[serde(rename = "evaluation.failed")]
    EvaluationFailed(EvaluationFailedPayload),
    #[serde(rename = "candidate.promoted")]
    CandidatePromoted(CandidatePromotedPayload),
    #[serde(rename = "search.finished")]
    SearchFinished(SearchFinishedPayload),
}

impl SearchEvent {
    /// The event type name, matching the serialized tag.
    pub fn event_type(&self) -> &'static str {
        match self {
            SearchEvent::SearchStarted(_) => event_types::SEARCH_STARTED,
            SearchEvent::EvaluationRecorded(_) => event_types::EVALUATION_RECORDED,
            SearchEvent::EvaluationFailed(_) => event_types::EVALUATION_FAILED,
            SearchEvent::CandidatePromoted(_) => event_types::CANDIDATE_PROMOTED,
            SearchEvent::SearchFinished(_) => event_types::SEARCH_FINISHED,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serialization() {
        assert_eq!(
            serde_json::to_string(&SearchStatus::Incomplete).unwrap(),
            "\"incomplete\""
        );
        assert_eq!(
            serde_json::to_string(&TerminationReason::FullEvaluationsReached).unwrap(),
            "\"full_evaluations_reached\""
        );
        assert_eq!(
            serde_json::to_string(&TerminationReason::Interrupted).unwrap(),
            format!("\"{}\"", TerminationReason::Interrupted)
        );
        assert!(SearchStatus::Incomplete.is_incomplete());
        assert!(!SearchStatus::Partial.is_incomplete());
    }

    #[test]
    fn test_event_tag_matches_event_type() {
        let event = SearchEvent::CandidatePromoted(CandidatePromotedPayload {
            candidate_id: CandidateId::from_u128(1),
            from_rung: 0,
            to_rung: 1,
            loss: 0.25,
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event_type"], event.event_type());
        assert_eq!(json["payload"]["to_rung"], 1);
    }

    #[test]
    fn test_evaluation_recorded_payload() {
        let payload = EvaluationRecordedPayload {
            job_id: JobId::from_u128(3),
            candidate_id: CandidateId::from_u128(9),
            rung: 2,
            budget: 900,
            loss: 0.125,
            values: vec![-0.125, 12.0],
            wallclock_secs: 1.5,
            pipeline: "GaussianNB(data)".to_string(),
            full_evaluation: true,
        };
        let json = serde_json::to_string(&SearchEvent::EvaluationRecorded(payload.clone())).unwrap();
        let parsed: SearchEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, SearchEvent::EvaluationRecorded(payload));
    }

    #[test]
    fn test_finished_payload_omits_missing_rung() {
        let payload = SearchFinishedPayload {
            status: SearchStatus::Incomplete,
            reason: TerminationReason::Deadline,
            result_rung: None,
            result_size: 0,
            rungs: vec![],
        };
        let json = serde_json::to_string(&payload).unwrap();
        assert!(!json.contains("result_rung"));
        assert!(json.contains("\"deadline\""));
    }
}
