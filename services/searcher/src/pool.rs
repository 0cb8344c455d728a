//! The job pool: in-flight evaluations and the wait primitive.
//!
//! Every submitted job runs as its own task in a [`JoinSet`], wrapped in the
//! per-job timeout. [`JobPool::wait_next`] hands back exactly one finished
//! job per call, in completion order. A job that panics or is cancelled is
//! reported as a failed job; it never takes the caller down with it.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use halving_id::JobId;
use halving_rungs::Rung;
use tokio::task::{self, JoinSet};
use tracing::{debug, warn};

use crate::candidate::Candidate;
use crate::evaluator::{Evaluation, EvaluationError, EvaluationRequest, Evaluator};

type JobResult<C> = Result<Evaluation<C>, EvaluationError>;

/// What the pool remembers about a job while it runs.
#[derive(Debug, Clone)]
struct JobInfo<C> {
    job_id: JobId,
    candidate: C,
    rung: Rung,
    budget: u64,
    report: bool,
}

/// A harvested job.
#[derive(Debug)]
pub struct CompletedJob<C> {
    pub job_id: JobId,
    /// The candidate as submitted.
    pub candidate: C,
    pub rung: Rung,
    pub budget: u64,
    pub report: bool,
    pub outcome: JobResult<C>,
}

/// Fixed set of in-flight evaluation jobs.
pub struct JobPool<C: Candidate> {
    evaluator: Arc<dyn Evaluator<C>>,
    tasks: JoinSet<JobResult<C>>,
    jobs: HashMap<task::Id, JobInfo<C>>,
}

impl<C: Candidate> JobPool<C> {
    /// Create an empty pool backed by `evaluator`.
    pub fn new(evaluator: Arc<dyn Evaluator<C>>) -> Self {
        Self {
            evaluator,
            tasks: JoinSet::new(),
            jobs: HashMap::new(),
        }
    }

    /// Number of jobs submitted and not yet harvested.
    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Start evaluating a request. The evaluation is cancelled once
    /// `request.timeout` elapses.
    pub fn submit(&mut self, request: EvaluationRequest<C>) -> JobId {
        let info = JobInfo {
            job_id: request.job_id,
            candidate: request.candidate.clone(),
            rung: request.rung,
            budget: request.budget,
            report: request.report,
        };
        let job_id = info.job_id;
        let limit = request.timeout;
        let evaluator = Arc::clone(&self.evaluator);

        let handle = self.tasks.spawn(async move {
            match tokio::time::timeout(limit, evaluator.evaluate(request)).await {
                Ok(result) => result,
                Err(_) => Err(EvaluationError::Timeout(limit)),
            }
        });

        debug!(
            job_id = %job_id,
            rung = %info.rung,
            budget = info.budget,
            timeout_secs = limit.as_secs_f64(),
            "Job submitted"
        );
        self.jobs.insert(handle.id(), info);
        job_id
    }

    /// Wait for the next job to finish.
    ///
    /// Returns `None` once the pool is empty.
    pub async fn wait_next(&mut self) -> Option<CompletedJob<C>> {
        loop {
            let (id, outcome) = match self.tasks.join_next_with_id().await? {
                Ok((id, result)) => (id, result),
                Err(err) => {
                    let id = err.id();
                    let outcome = if err.is_panic() {
                        Err(EvaluationError::Panicked(panic_message(err.into_panic())))
                    } else {
                        Err(EvaluationError::Cancelled)
                    };
                    (id, outcome)
                }
            };

            let Some(info) = self.jobs.remove(&id) else {
                warn!(task_id = %id, "Finished task has no job record");
                continue;
            };

            return Some(CompletedJob {
                job_id: info.job_id,
                candidate: info.candidate,
                rung: info.rung,
                budget: info.budget,
                report: info.report,
                outcome,
            });
        }
    }

    /// Abort every in-flight job without waiting for it. Returns the number
    /// of jobs aborted.
    pub fn drain(&mut self) -> usize {
        let aborted = self.tasks.len();
        self.tasks.abort_all();
        self.tasks.detach_all();
        self.jobs.clear();
        aborted
    }
}

impl<C: Candidate> std::fmt::Debug for JobPool<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobPool")
            .field("in_flight", &self.tasks.len())
            .finish()
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::Utc;

    use super::*;
    use crate::synthetic::SyntheticCandidate;

    /// Sleeps for `budget` milliseconds, then reports `loss = 1 / budget`.
    /// Budget 0 panics, budget 1 fails.
    struct SleepyEvaluator;

    #[async_trait]
    impl Evaluator<SyntheticCandidate> for SleepyEvaluator {
        async fn evaluate(
            &self,
            request: EvaluationRequest<SyntheticCandidate>,
        ) -> Result<Evaluation<SyntheticCandidate>, EvaluationError> {
            match request.budget {
                0 => panic!("budget zero"),
                1 => return Err(EvaluationError::Failed("budget one".to_string())),
                _ => {}
            }
            let started_at = Utc::now();
            let wallclock = Duration::from_millis(request.budget);
            tokio::time::sleep(wallclock).await;
            Ok(Evaluation {
                loss: 1.0 / request.budget as f64,
                candidate: request.candidate,
                values: vec![],
                started_at,
                wallclock,
            })
        }
    }

    fn request(budget: u64, timeout: Duration) -> EvaluationRequest<SyntheticCandidate> {
        EvaluationRequest {
            job_id: JobId::new(),
            candidate: SyntheticCandidate::new(0.5),
            rung: Rung::new(0),
            budget,
            report: false,
            timeout,
        }
    }

    fn pool() -> JobPool<SyntheticCandidate> {
        JobPool::<SyntheticCandidate>::new(Arc::new(SleepyEvaluator))
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_next_returns_in_completion_order() {
        let mut pool = pool();
        let slow = pool.submit(request(300, Duration::from_secs(10)));
        let fast = pool.submit(request(100, Duration::from_secs(10)));
        assert_eq!(pool.in_flight(), 2);

        let first = pool.wait_next().await.unwrap();
        assert_eq!(first.job_id, fast);
        assert!(first.outcome.is_ok());

        let second = pool.wait_next().await.unwrap();
        assert_eq!(second.job_id, slow);

        assert!(pool.is_empty());
        assert!(pool.wait_next().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_becomes_failed_job() {
        let mut pool = pool();
        pool.submit(request(5_000, Duration::from_secs(1)));

        let done = pool.wait_next().await.unwrap();
        assert_eq!(
            done.outcome.unwrap_err(),
            EvaluationError::Timeout(Duration::from_secs(1))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_panic_and_error_become_failed_jobs() {
        let mut pool = pool();
        let panicking = pool.submit(request(0, Duration::from_secs(1)));
        pool.submit(request(1, Duration::from_secs(1)));

        let mut failures = Vec::new();
        while let Some(done) = pool.wait_next().await {
            failures.push((done.job_id, done.outcome.unwrap_err()));
        }

        assert_eq!(failures.len(), 2);
        for (job_id, error) in failures {
            if job_id == panicking {
                assert_eq!(error, EvaluationError::Panicked("budget zero".to_string()));
            } else {
                assert_eq!(error, EvaluationError::Failed("budget one".to_string()));
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_aborts_everything() {
        let mut pool = pool();
        for _ in 0..4 {
            pool.submit(request(10_000, Duration::from_secs(60)));
        }

        assert_eq!(pool.drain(), 4);
        assert_eq!(pool.in_flight(), 0);
        assert!(pool.wait_next().await.is_none());
    }
}
