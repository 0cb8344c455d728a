//! What a search hands back.

use std::time::Duration;

use halving_events::{RungCount, SearchStatus, TerminationReason};
use halving_id::{CandidateId, SearchId};
use halving_rungs::{Rung, RungSummary};
use serde::Serialize;

use crate::candidate::Candidate;

/// Counters collected over one search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SearchStats {
    /// Jobs handed to the pool.
    pub submitted: usize,
    /// Jobs that produced a loss.
    pub completed: usize,
    /// Jobs that timed out, failed or panicked.
    pub failed: usize,
    /// Jobs planned as promotions.
    pub promotions: usize,
    /// Jobs planned from seeds or the factory.
    pub fresh: usize,
    /// Jobs still running when the search stopped.
    pub aborted: usize,
    /// Distinct candidate fingerprints handed out as fresh jobs.
    pub distinct_candidates: usize,
    /// Fewest jobs in flight after any refill while running.
    pub in_flight_min: Option<usize>,
    /// Most jobs in flight after any refill while running.
    pub in_flight_max: Option<usize>,
    #[serde(rename = "elapsed_secs", serialize_with = "serialize_secs")]
    pub elapsed: Duration,
}

impl SearchStats {
    pub(crate) fn observe_in_flight(&mut self, in_flight: usize) {
        self.in_flight_min = Some(self.in_flight_min.map_or(in_flight, |m| m.min(in_flight)));
        self.in_flight_max = Some(self.in_flight_max.map_or(in_flight, |m| m.max(in_flight)));
    }
}

fn serialize_secs<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

/// Result of a finished search.
#[derive(Debug, Clone)]
pub struct SearchOutcome<C> {
    pub search_id: SearchId,
    /// Candidates evaluated at `result_rung`, in the order they finished.
    pub candidates: Vec<C>,
    /// Highest rung with at least one entry.
    pub result_rung: Option<Rung>,
    /// The top rung of the ladder.
    pub max_rung: Rung,
    pub status: SearchStatus,
    pub reason: TerminationReason,
    /// Entry and promotion counts, highest rung first.
    pub rungs: Vec<RungSummary>,
    pub stats: SearchStats,
}

impl<C> SearchOutcome<C> {
    /// Returns true if the top rung was never reached.
    pub fn is_incomplete(&self) -> bool {
        self.status.is_incomplete()
    }
}

impl<C: Candidate> SearchOutcome<C> {
    /// Serializable summary of the outcome.
    pub fn report(&self) -> SearchReport {
        SearchReport {
            search_id: self.search_id,
            status: self.status,
            reason: self.reason,
            result_rung: self.result_rung.map(|r| r.index()),
            max_rung: self.max_rung.index(),
            candidates: self
                .candidates
                .iter()
                .map(|c| CandidateReport {
                    id: c.id(),
                    pipeline: c.describe(),
                })
                .collect(),
            rungs: rung_counts(&self.rungs),
            stats: self.stats.clone(),
        }
    }
}

/// One returned candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateReport {
    pub id: CandidateId,
    pub pipeline: String,
}

/// JSON-friendly view of a [`SearchOutcome`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchReport {
    pub search_id: SearchId,
    pub status: SearchStatus,
    pub reason: TerminationReason,
    pub result_rung: Option<u32>,
    pub max_rung: u32,
    pub candidates: Vec<CandidateReport>,
    pub rungs: Vec<RungCount>,
    pub stats: SearchStats,
}

pub(crate) fn rung_counts(summaries: &[RungSummary]) -> Vec<RungCount> {
    summaries
        .iter()
        .map(|s| RungCount {
            rung: s.rung.index(),
            entries: s.entries,
            promoted: s.promoted,
        })
        .collect()
}
