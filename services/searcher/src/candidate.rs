//! Candidates and where they come from.
//!
//! The scheduler treats candidates as opaque: it only needs their identity,
//! a human-readable description for logs, and a fingerprint to spot
//! duplicates among freshly generated ones.

use halving_id::CandidateId;
use halving_rungs::{Fingerprint, SeenFingerprints};
use tracing::debug;

/// A unit of work the search evaluates at increasing budgets.
pub trait Candidate: Clone + Send + Sync + 'static {
    /// Identity of the candidate.
    fn id(&self) -> CandidateId;

    /// Human-readable pipeline description.
    fn describe(&self) -> String;

    /// Content fingerprint. Candidates with equal descriptions share one.
    fn fingerprint(&self) -> Fingerprint {
        Fingerprint::of(&self.describe())
    }
}

/// Produces new candidates once the seeds are used up.
pub trait CandidateFactory<C>: Send {
    fn new_candidate(&mut self) -> C;
}

impl<C, F> CandidateFactory<C> for F
where
    F: FnMut() -> C + Send,
{
    fn new_candidate(&mut self) -> C {
        self()
    }
}

/// Where a fresh candidate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreshOrigin {
    Seed,
    Generated,
}

/// Seeds first, then the factory, skipping duplicates of anything already
/// handed out.
pub struct CandidateSource<C> {
    seeds: Vec<C>,
    factory: Box<dyn CandidateFactory<C>>,
    seen: SeenFingerprints,
    max_retries: usize,
}

impl<C: Candidate> CandidateSource<C> {
    /// Create a source. `max_retries` bounds how many duplicates are
    /// regenerated before one is accepted anyway.
    pub fn new(
        seeds: impl IntoIterator<Item = C>,
        factory: Box<dyn CandidateFactory<C>>,
        max_retries: usize,
    ) -> Self {
        Self {
            seeds: seeds.into_iter().collect(),
            factory,
            seen: SeenFingerprints::new(),
            max_retries,
        }
    }

    /// Number of distinct fingerprints handed out so far.
    pub fn distinct_seen(&self) -> usize {
        self.seen.len()
    }

    /// Next fresh candidate.
    ///
    /// Seeds are popped from the back of the list, so the last seed comes
    /// out first. Seeds are never deduplicated. Generated
    /// candidates are regenerated while their fingerprint was already seen,
    /// up to `max_retries` times.
    pub fn next_fresh(&mut self) -> (C, FreshOrigin) {
        if let Some(seed) = self.seeds.pop() {
            self.seen.insert(seed.fingerprint());
            return (seed, FreshOrigin::Seed);
        }

        let mut candidate = self.factory.new_candidate();
        let mut retries = 0;
        while self.seen.contains(&candidate.fingerprint()) {
            if retries >= self.max_retries {
                debug!(
                    candidate_id = %candidate.id(),
                    retries,
                    "Accepting duplicate candidate after retry limit"
                );
                break;
            }
            retries += 1;
            candidate = self.factory.new_candidate();
        }

        self.seen.insert(candidate.fingerprint());
        (candidate, FreshOrigin::Generated)
    }
}

impl<C> std::fmt::Debug for CandidateSource<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CandidateSource")
            .field("remaining_seeds", &self.seeds.len())
            .field("seen", &self.seen.len())
            .field("max_retries", &self.max_retries)
            .finish()
    }
}
