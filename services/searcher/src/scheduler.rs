//! The asynchronous successive halving loop.
//!
//! ## Lifecycle
//!
//! ```text
//! Warmup ──► Running ──► Draining ──► Done
//! ```
//!
//! - **Warmup**: fill the window with `window_size` jobs.
//! - **Running**: wait for one job to finish, record its loss, submit one
//!   replacement. Repeat until enough top-rung evaluations exist or the
//!   deadline passes.
//! - **Draining**: abort whatever is still running. Stragglers are not
//!   awaited.
//! - **Done**: the candidates of the highest rung reached are returned.
//!
//! The rung table is owned by the loop; the only suspension point is the
//! pool's wait, raced against the deadline.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use halving_events::{
    CandidatePromotedPayload, EvaluationFailedPayload, EvaluationRecordedPayload, EventRecorder,
    EventSink, NullSink, SearchEvent, SearchFinishedPayload, SearchStartedPayload, SearchStatus,
    TerminationReason,
};
use halving_id::{JobId, SearchId};
use halving_rungs::{Rung, RungTable};
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::candidate::{Candidate, CandidateFactory, CandidateSource};
use crate::config::{validate_time_budget, ProblemShape, ResolvedConfig, SearchConfig};
use crate::error::SearchError;
use crate::evaluator::{EvaluationRequest, Evaluator};
use crate::outcome::{rung_counts, SearchOutcome, SearchStats};
use crate::planner::{JobOrigin, JobPlanner};
use crate::pool::{CompletedJob, JobPool};

/// Where the scheduler loop is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerPhase {
    Warmup,
    Running,
    Draining,
    Done,
}

/// Runs one search.
pub struct AshaScheduler<C: Candidate> {
    search_id: SearchId,
    config: ResolvedConfig,
    evaluator: Arc<dyn Evaluator<C>>,
    factory: Box<dyn CandidateFactory<C>>,
    sink: Arc<dyn EventSink>,
}

impl<C: Candidate> AshaScheduler<C> {
    /// Create a scheduler from an already resolved configuration.
    pub fn new(
        config: ResolvedConfig,
        evaluator: Arc<dyn Evaluator<C>>,
        factory: Box<dyn CandidateFactory<C>>,
    ) -> Self {
        Self {
            search_id: SearchId::new(),
            config,
            evaluator,
            factory,
            sink: Arc::new(NullSink),
        }
    }

    /// Resolve `config` against the problem and create a scheduler.
    pub fn from_config(
        config: &SearchConfig,
        shape: &ProblemShape,
        evaluator: Arc<dyn Evaluator<C>>,
        factory: Box<dyn CandidateFactory<C>>,
    ) -> Result<Self, SearchError> {
        let resolved = config.resolve(shape)?;
        Ok(Self::new(resolved, evaluator, factory))
    }

    /// Forward search events to `sink`.
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Use a caller-chosen search ID.
    pub fn with_search_id(mut self, search_id: SearchId) -> Self {
        self.search_id = search_id;
        self
    }

    pub fn search_id(&self) -> SearchId {
        self.search_id
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    /// Run the search until `max_full_evaluations` top-rung results exist
    /// or `time_budget` elapses.
    ///
    /// Seeds are evaluated before any generated candidate, last seed first.
    /// Only an invalid time budget or an internal bookkeeping error produce
    /// `Err`; running out of time is reported through the outcome's status.
    pub async fn run(
        self,
        seeds: Vec<C>,
        time_budget: Duration,
    ) -> Result<SearchOutcome<C>, SearchError> {
        self.run_with_shutdown(seeds, time_budget, std::future::pending())
            .await
    }

    /// Like [`run`](Self::run), but also stops when `shutdown` completes.
    ///
    /// An interrupted search drains like one that hit its deadline and
    /// still returns an outcome, with reason
    /// [`TerminationReason::Interrupted`].
    #[instrument(skip_all, fields(search_id = %self.search_id))]
    pub async fn run_with_shutdown<F>(
        self,
        seeds: Vec<C>,
        time_budget: Duration,
        shutdown: F,
    ) -> Result<SearchOutcome<C>, SearchError>
    where
        F: Future<Output = ()> + Send,
    {
        validate_time_budget(time_budget)?;
        let started = Instant::now();
        let deadline = started + time_budget;

        let AshaScheduler {
            search_id,
            config,
            evaluator,
            factory,
            sink,
        } = self;
        let seed_count = seeds.len();
        let source = CandidateSource::new(seeds, factory, config.max_fresh_retries);

        let mut search = SearchLoop {
            phase: SchedulerPhase::Warmup,
            table: RungTable::new(config.ladder.clone()),
            planner: JobPlanner::new(source),
            pool: JobPool::new(evaluator),
            events: EventRecorder::new(search_id, sink),
            stats: SearchStats::default(),
            config,
            started,
        };

        search.announce(seed_count, time_budget);
        search.warm_up()?;
        let reason = search.run_until(deadline, shutdown).await?;
        Ok(search.finish(reason))
    }
}

impl<C: Candidate> std::fmt::Debug for AshaScheduler<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AshaScheduler")
            .field("search_id", &self.search_id)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Search Loop
// =============================================================================

/// State of one running search. Single owner of the rung table.
struct SearchLoop<C: Candidate> {
    phase: SchedulerPhase,
    config: ResolvedConfig,
    table: RungTable<C>,
    planner: JobPlanner<C>,
    pool: JobPool<C>,
    events: EventRecorder,
    stats: SearchStats,
    started: Instant,
}

impl<C: Candidate> SearchLoop<C> {
    fn enter(&mut self, phase: SchedulerPhase) {
        debug!(from = ?self.phase, to = ?phase, "Scheduler phase change");
        self.phase = phase;
    }

    fn announce(&mut self, seed_candidates: usize, time_budget: Duration) {
        let ladder = self.table.ladder();
        info!(
            reduction_factor = ladder.reduction_factor(),
            minimum_resource = ladder.minimum_resource(),
            maximum_resource = ladder.maximum_resource(),
            lowest_rung = %ladder.lowest_rung(),
            max_rung = %ladder.max_rung(),
            window_size = self.config.window_size,
            max_full_evaluations = ?self.config.max_full_evaluations,
            seed_candidates,
            time_budget_secs = time_budget.as_secs_f64(),
            "Starting search"
        );

        let payload = SearchStartedPayload {
            reduction_factor: ladder.reduction_factor(),
            minimum_resource: ladder.minimum_resource(),
            maximum_resource: ladder.maximum_resource(),
            minimum_early_stopping_rate: ladder.minimum_early_stopping_rate(),
            max_rung: ladder.max_rung().index(),
            window_size: self.config.window_size,
            max_full_evaluations: self.config.max_full_evaluations,
            seed_candidates,
        };
        self.events.emit(SearchEvent::SearchStarted(payload));
    }

    fn warm_up(&mut self) -> Result<(), SearchError> {
        while self.pool.in_flight() < self.config.window_size {
            self.submit_next()?;
        }
        Ok(())
    }

    async fn run_until<F>(
        &mut self,
        deadline: Instant,
        shutdown: F,
    ) -> Result<TerminationReason, SearchError>
    where
        F: Future<Output = ()>,
    {
        self.enter(SchedulerPhase::Running);

        let expired = tokio::time::sleep_until(deadline);
        tokio::pin!(expired);
        tokio::pin!(shutdown);

        loop {
            if self.full_evaluations_reached() {
                info!(
                    full_evaluations = self.table.len(self.table.ladder().max_rung()),
                    "Full evaluation target reached"
                );
                return Ok(TerminationReason::FullEvaluationsReached);
            }

            tokio::select! {
                biased;

                _ = &mut expired => {
                    info!(in_flight = self.pool.in_flight(), "Search deadline reached");
                    return Ok(TerminationReason::Deadline);
                }

                _ = &mut shutdown => {
                    info!(in_flight = self.pool.in_flight(), "Search interrupted");
                    return Ok(TerminationReason::Interrupted);
                }

                completed = self.pool.wait_next() => {
                    let Some(job) = completed else {
                        warn!("Job pool ran dry");
                        return Ok(TerminationReason::PoolExhausted);
                    };
                    self.harvest(job)?;
                    self.submit_next()?;
                    self.stats.observe_in_flight(self.pool.in_flight());
                }
            }
        }
    }

    fn full_evaluations_reached(&self) -> bool {
        let top = self.table.ladder().max_rung();
        self.config
            .max_full_evaluations
            .is_some_and(|target| self.table.len(top) >= target)
    }

    /// Plan one job and hand it to the pool.
    fn submit_next(&mut self) -> Result<(), SearchError> {
        let job = self.planner.next_job(&mut self.table)?;

        match job.origin {
            JobOrigin::Promoted { from, loss } => {
                self.stats.promotions += 1;
                self.events
                    .emit(SearchEvent::CandidatePromoted(CandidatePromotedPayload {
                        candidate_id: job.candidate.id(),
                        from_rung: from.index(),
                        to_rung: job.rung.index(),
                        loss,
                    }));
            }
            JobOrigin::Seed | JobOrigin::Generated => self.stats.fresh += 1,
        }

        let ladder = self.table.ladder();
        let request = EvaluationRequest {
            job_id: JobId::new(),
            budget: ladder.resource(job.rung),
            report: ladder.is_top(job.rung),
            timeout: ladder.timeout(job.rung),
            rung: job.rung,
            candidate: job.candidate,
        };
        self.pool.submit(request);
        self.stats.submitted += 1;
        Ok(())
    }

    /// Record a finished job. Failed jobs leave the table untouched.
    fn harvest(&mut self, job: CompletedJob<C>) -> Result<(), SearchError> {
        let CompletedJob {
            job_id,
            candidate,
            rung,
            budget,
            report,
            outcome,
        } = job;

        let evaluation = match outcome {
            Ok(evaluation) => evaluation,
            Err(e) => {
                self.stats.failed += 1;
                warn!(
                    job_id = %job_id,
                    candidate_id = %candidate.id(),
                    rung = %rung,
                    error = %e,
                    "Evaluation produced no result"
                );
                self.events
                    .emit(SearchEvent::EvaluationFailed(EvaluationFailedPayload {
                        job_id,
                        candidate_id: candidate.id(),
                        rung: rung.index(),
                        kind: e.kind(),
                        message: e.to_string(),
                    }));
                return Ok(());
            }
        };

        let pipeline = evaluation.candidate.describe();
        let candidate_id = evaluation.candidate.id();
        info!(
            token = "ASHA",
            job_id = %job_id,
            rung = %rung,
            budget,
            loss = evaluation.loss,
            wallclock_secs = evaluation.wallclock.as_secs_f64(),
            values = ?evaluation.values,
            candidate_id = %candidate_id,
            pipeline = %pipeline,
            "Evaluation recorded"
        );

        self.table.record(rung, evaluation.loss, evaluation.candidate)?;
        self.stats.completed += 1;

        self.events
            .emit(SearchEvent::EvaluationRecorded(EvaluationRecordedPayload {
                job_id,
                candidate_id,
                rung: rung.index(),
                budget,
                loss: evaluation.loss,
                values: evaluation.values,
                wallclock_secs: evaluation.wallclock.as_secs_f64(),
                pipeline,
                full_evaluation: report,
            }));
        Ok(())
    }

    fn finish(mut self, reason: TerminationReason) -> SearchOutcome<C> {
        self.enter(SchedulerPhase::Draining);
        self.stats.aborted = self.pool.drain();
        self.stats.distinct_candidates = self.planner.source().distinct_seen();
        self.stats.elapsed = self.started.elapsed();

        let max_rung = self.table.ladder().max_rung();
        let result_rung = self.table.highest_reached();
        let status = classify(reason, result_rung, max_rung);
        let rungs = self.table.summary();

        for summary in &rungs {
            info!(
                rung = %summary.rung,
                budget = self.table.ladder().resource(summary.rung),
                entries = summary.entries,
                promoted = summary.promoted,
                "Rung summary"
            );
        }

        if status.is_incomplete() {
            warn!(
                result_rung = ?result_rung.map(|r| r.index()),
                max_rung = %max_rung,
                "Search stopped before any candidate reached the top rung"
            );
        }

        self.enter(SchedulerPhase::Done);
        let candidates = match result_rung {
            Some(rung) => self.table.into_candidates_at(rung),
            None => Vec::new(),
        };

        self.events
            .emit(SearchEvent::SearchFinished(SearchFinishedPayload {
                status,
                reason,
                result_rung: result_rung.map(|r| r.index()),
                result_size: candidates.len(),
                rungs: rung_counts(&rungs),
            }));

        info!(
            status = %status,
            reason = %reason,
            result_size = candidates.len(),
            submitted = self.stats.submitted,
            completed = self.stats.completed,
            failed = self.stats.failed,
            aborted = self.stats.aborted,
            elapsed_secs = self.stats.elapsed.as_secs_f64(),
            "Search finished"
        );

        SearchOutcome {
            search_id: self.events.search_id(),
            candidates,
            result_rung,
            max_rung,
            status,
            reason,
            rungs,
            stats: self.stats,
        }
    }
}

/// Status of a search that stopped for `reason` with `result_rung` as its
/// highest populated rung.
fn classify(reason: TerminationReason, result_rung: Option<Rung>, max_rung: Rung) -> SearchStatus {
    match reason {
        TerminationReason::FullEvaluationsReached => SearchStatus::Complete,
        _ if result_rung == Some(max_rung) => SearchStatus::Partial,
        _ => SearchStatus::Incomplete,
    }
}
