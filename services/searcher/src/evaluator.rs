//! Evaluator abstraction.
//!
//! An evaluator trains and scores one candidate at a given budget. The
//! search never looks inside; it only consumes the loss.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use halving_events::EvaluationFailureKind;
use halving_id::JobId;
use halving_rungs::Rung;
use thiserror::Error;

/// Everything an evaluator needs for one job.
#[derive(Debug, Clone)]
pub struct EvaluationRequest<C> {
    pub job_id: JobId,
    pub candidate: C,
    pub rung: Rung,
    /// Resource budget of the rung, e.g. number of training samples.
    pub budget: u64,
    /// True when the job runs at the top rung. Evaluators may persist only
    /// such results.
    pub report: bool,
    /// Time the job pool allows before cancelling the evaluation.
    pub timeout: Duration,
}

/// Result of a successful evaluation.
#[derive(Debug, Clone)]
pub struct Evaluation<C> {
    pub candidate: C,
    /// Lower is better.
    pub loss: f64,
    /// Metric values in evaluator order.
    pub values: Vec<f64>,
    pub started_at: DateTime<Utc>,
    pub wallclock: Duration,
}

/// Evaluation produced no result.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvaluationError {
    #[error("evaluation timed out after {0:?}")]
    Timeout(Duration),

    #[error("evaluation failed: {0}")]
    Failed(String),

    #[error("evaluation panicked: {0}")]
    Panicked(String),

    #[error("evaluation cancelled")]
    Cancelled,
}

impl EvaluationError {
    /// Failure kind as reported in events.
    pub fn kind(&self) -> EvaluationFailureKind {
        match self {
            EvaluationError::Timeout(_) => EvaluationFailureKind::Timeout,
            EvaluationError::Panicked(_) => EvaluationFailureKind::Panicked,
            EvaluationError::Failed(_) | EvaluationError::Cancelled => {
                EvaluationFailureKind::Error
            }
        }
    }
}

/// Trains and scores candidates.
#[async_trait]
pub trait Evaluator<C: Send + 'static>: Send + Sync {
    /// Evaluate one candidate at the requested budget.
    async fn evaluate(
        &self,
        request: EvaluationRequest<C>,
    ) -> Result<Evaluation<C>, EvaluationError>;
}
