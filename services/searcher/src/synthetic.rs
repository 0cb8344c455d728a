//! Synthetic candidates and evaluator.
//!
//! Used by the `asha-search` binary and by tests. Each candidate has a
//! hidden quality; its loss approaches that quality as the budget grows,
//! with deterministic noise per (candidate, budget).

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use halving_id::CandidateId;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::candidate::{Candidate, CandidateFactory};
use crate::evaluator::{Evaluation, EvaluationError, EvaluationRequest, Evaluator};

/// A candidate whose converged loss is `quality`.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticCandidate {
    id: CandidateId,
    quality: f64,
}

impl SyntheticCandidate {
    pub fn new(quality: f64) -> Self {
        Self {
            id: CandidateId::new(),
            quality,
        }
    }

    pub fn quality(&self) -> f64 {
        self.quality
    }
}

impl Candidate for SyntheticCandidate {
    fn id(&self) -> CandidateId {
        self.id
    }

    fn describe(&self) -> String {
        format!("SyntheticPipeline(quality={:.6})", self.quality)
    }
}

/// Draws candidate qualities uniformly from `[0, 1)`.
#[derive(Debug)]
pub struct SyntheticFactory {
    rng: StdRng,
}

impl SyntheticFactory {
    /// Create a factory with a fixed seed.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Create a factory seeded from the OS.
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }
}

impl CandidateFactory<SyntheticCandidate> for SyntheticFactory {
    fn new_candidate(&mut self) -> SyntheticCandidate {
        SyntheticCandidate::new(self.rng.random_range(0.0..1.0))
    }
}

/// Evaluator that sleeps in proportion to the budget and returns a loss
/// derived from the candidate's quality.
#[derive(Debug, Clone)]
pub struct SyntheticEvaluator {
    /// Simulated seconds spent per unit of budget.
    seconds_per_unit: f64,
    /// Amplitude of the budget-dependent noise.
    noise: f64,
    /// Fail every evaluation. For testing failure handling.
    fail_all: bool,
}

impl SyntheticEvaluator {
    pub fn new(seconds_per_unit: f64, noise: f64) -> Self {
        Self {
            seconds_per_unit: seconds_per_unit.max(0.0),
            noise: noise.max(0.0),
            fail_all: false,
        }
    }

    /// An evaluator whose every evaluation fails.
    pub fn failing() -> Self {
        Self {
            fail_all: true,
            ..Self::default()
        }
    }

    /// Loss of `candidate` at `budget`.
    pub fn loss(&self, candidate: &SyntheticCandidate, budget: u64) -> f64 {
        let seed = (candidate.id.ulid().0 as u64) ^ budget;
        let jitter: f64 = StdRng::seed_from_u64(seed).random_range(-1.0..1.0);
        let spread = self.noise / (budget.max(1) as f64).sqrt();
        candidate.quality + spread * (1.0 + jitter)
    }
}

impl Default for SyntheticEvaluator {
    fn default() -> Self {
        Self::new(0.0001, 1.0)
    }
}

#[async_trait]
impl Evaluator<SyntheticCandidate> for SyntheticEvaluator {
    async fn evaluate(
        &self,
        request: EvaluationRequest<SyntheticCandidate>,
    ) -> Result<Evaluation<SyntheticCandidate>, EvaluationError> {
        let started_at = Utc::now();
        let start = tokio::time::Instant::now();

        let work = Duration::from_secs_f64(request.budget as f64 * self.seconds_per_unit);
        tokio::time::sleep(work).await;

        if self.fail_all {
            return Err(EvaluationError::Failed(
                "synthetic evaluator configured to fail".to_string(),
            ));
        }

        let loss = self.loss(&request.candidate, request.budget);
        debug!(
            candidate_id = %request.candidate.id(),
            budget = request.budget,
            loss,
            "Synthetic evaluation finished"
        );

        Ok(Evaluation {
            values: vec![1.0 - loss],
            loss,
            candidate: request.candidate,
            started_at,
            wallclock: start.elapsed(),
        })
    }
}
