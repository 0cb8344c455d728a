//! Asynchronous successive halving search.
//!
//! Evaluates candidates at increasing resource budgets, keeping a fixed
//! number of evaluations in flight and promoting the best `1 / reduction_factor`
//! of each rung as soon as enough results exist to justify it.
//!
//! ## Architecture
//!
//! - **Config**: layered `SearchConfig` resolved into a validated ladder
//! - **Candidate source**: seeds first, then a factory, skipping duplicates
//! - **Job planner**: promotion if one is due, else a fresh candidate
//! - **Job pool**: in-flight evaluations with per-job timeouts
//! - **Scheduler**: the single-owner loop tying everything together
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use halving_searcher::synthetic::{SyntheticCandidate, SyntheticEvaluator, SyntheticFactory};
//! use halving_searcher::{ProblemShape, SearchConfig};
//!
//! # async fn demo() -> Result<(), halving_searcher::SearchError> {
//! let outcome = halving_searcher::run::<SyntheticCandidate>(
//!     Vec::new(),
//!     &SearchConfig::default(),
//!     &ProblemShape::with_samples(10_000),
//!     Duration::from_secs(60),
//!     Arc::new(SyntheticEvaluator::default()),
//!     Box::new(SyntheticFactory::seeded(42)),
//! )
//! .await?;
//! println!("{} candidates at the top", outcome.candidates.len());
//! # Ok(())
//! # }
//! ```

pub mod candidate;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod outcome;
pub mod planner;
pub mod pool;
pub mod scheduler;
pub mod synthetic;

use std::sync::Arc;
use std::time::Duration;

pub use candidate::{Candidate, CandidateFactory, CandidateSource};
pub use config::{ConfigError, ProblemShape, ResolvedConfig, SearchConfig};
pub use error::SearchError;
pub use evaluator::{Evaluation, EvaluationError, EvaluationRequest, Evaluator};
pub use outcome::{SearchOutcome, SearchReport, SearchStats};
pub use pool::{CompletedJob, JobPool};
pub use scheduler::{AshaScheduler, SchedulerPhase};

/// Run a search with the default event sink.
///
/// Shorthand for [`AshaScheduler::from_config`] followed by
/// [`AshaScheduler::run`].
pub async fn run<C: Candidate>(
    seeds: Vec<C>,
    config: &SearchConfig,
    shape: &ProblemShape,
    time_budget: Duration,
    evaluator: Arc<dyn Evaluator<C>>,
    factory: Box<dyn CandidateFactory<C>>,
) -> Result<SearchOutcome<C>, SearchError> {
    AshaScheduler::from_config(config, shape, evaluator, factory)?
        .run(seeds, time_budget)
        .await
}
