//! Picks the next job: a promotion when one is due, otherwise a fresh
//! candidate at the lowest active rung.

use halving_rungs::{PromotionPolicy, Rung, RungError, RungTable};
use tracing::debug;

use crate::candidate::{Candidate, CandidateSource, FreshOrigin};

/// Why a job was planned.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JobOrigin {
    /// Promoted from the rung below.
    Promoted { from: Rung, loss: f64 },
    /// Taken from the seed list.
    Seed,
    /// Drawn from the candidate factory.
    Generated,
}

/// A candidate and the rung to evaluate it at.
#[derive(Debug, Clone)]
pub struct PlannedJob<C> {
    pub candidate: C,
    pub rung: Rung,
    pub origin: JobOrigin,
}

/// Decides what runs next.
#[derive(Debug)]
pub struct JobPlanner<C> {
    policy: PromotionPolicy,
    source: CandidateSource<C>,
}

impl<C: Candidate> JobPlanner<C> {
    pub fn new(source: CandidateSource<C>) -> Self {
        Self {
            policy: PromotionPolicy::new(),
            source,
        }
    }

    /// The candidate source, for statistics.
    pub fn source(&self) -> &CandidateSource<C> {
        &self.source
    }

    /// Plan the next job, committing a promotion to `table` if one is due.
    pub fn next_job(&mut self, table: &mut RungTable<C>) -> Result<PlannedJob<C>, RungError> {
        if let Some(promotion) = self.policy.propose(table) {
            let (candidate, rung) = table.commit(promotion)?;
            debug!(
                candidate_id = %candidate.id(),
                from_rung = %promotion.from,
                to_rung = %rung,
                loss = promotion.loss,
                "Promoting candidate"
            );
            return Ok(PlannedJob {
                candidate,
                rung,
                origin: JobOrigin::Promoted {
                    from: promotion.from,
                    loss: promotion.loss,
                },
            });
        }

        let (candidate, origin) = self.source.next_fresh();
        let origin = match origin {
            FreshOrigin::Seed => JobOrigin::Seed,
            FreshOrigin::Generated => JobOrigin::Generated,
        };
        Ok(PlannedJob {
            candidate,
            rung: table.ladder().lowest_rung(),
            origin,
        })
    }
}

#[cfg(test)]
mod tests {
    use halving_rungs::ResourceLadder;

    use super::*;
    use crate::candidate::CandidateFactory;
    use crate::synthetic::SyntheticCandidate;

    fn planner(seeds: Vec<SyntheticCandidate>) -> JobPlanner<SyntheticCandidate> {
        let mut quality = 0.0;
        let factory: Box<dyn CandidateFactory<SyntheticCandidate>> = Box::new(move || {
            quality += 0.01;
            SyntheticCandidate::new(quality)
        });
        JobPlanner::new(CandidateSource::new(seeds, factory, 10))
    }

    #[test]
    fn test_seeds_then_generated_at_lowest_rung() {
        let ladder = ResourceLadder::new(3, 100, 900, 1).unwrap();
        let mut table = RungTable::new(ladder);
        let a = SyntheticCandidate::new(0.9);
        let b = SyntheticCandidate::new(0.8);
        let mut planner = planner(vec![a.clone(), b.clone()]);

        let first = planner.next_job(&mut table).unwrap();
        assert_eq!(first.candidate.id(), b.id());
        assert_eq!(first.rung, Rung::new(1));
        assert_eq!(first.origin, JobOrigin::Seed);

        let second = planner.next_job(&mut table).unwrap();
        assert_eq!(second.candidate.id(), a.id());
        assert_eq!(second.origin, JobOrigin::Seed);

        let third = planner.next_job(&mut table).unwrap();
        assert_eq!(third.origin, JobOrigin::Generated);
        assert_eq!(third.rung, Rung::new(1));
    }

    #[test]
    fn test_promotions_before_fresh_candidates() {
        let ladder = ResourceLadder::new(3, 100, 900, 0).unwrap();
        let mut table = RungTable::new(ladder);
        let mut planner = planner(Vec::new());

        let candidates: Vec<_> = (1..=9)
            .map(|i| SyntheticCandidate::new(i as f64 / 10.0))
            .collect();
        for (i, c) in candidates.iter().enumerate().rev() {
            table.record(Rung::new(0), (i + 1) as f64 / 10.0, c.clone()).unwrap();
        }

        for expected in &candidates[..3] {
            let job = planner.next_job(&mut table).unwrap();
            assert_eq!(job.candidate.id(), expected.id());
            assert_eq!(job.rung, Rung::new(1));
            assert!(matches!(job.origin, JobOrigin::Promoted { from, .. } if from == Rung::new(0)));
        }

        let fresh = planner.next_job(&mut table).unwrap();
        assert_eq!(fresh.origin, JobOrigin::Generated);
        assert_eq!(fresh.rung, Rung::new(0));
    }

    #[test]
    fn test_higher_rungs_promote_first() {
        let ladder = ResourceLadder::new(3, 100, 2_700, 0).unwrap();
        let mut table = RungTable::new(ladder);
        let mut planner = planner(Vec::new());

        for i in 0..3 {
            table
                .record(Rung::new(0), i as f64, SyntheticCandidate::new(0.5))
                .unwrap();
        }
        let star = SyntheticCandidate::new(0.1);
        table.record(Rung::new(1), 0.7, star.clone()).unwrap();
        table.record(Rung::new(1), 0.8, SyntheticCandidate::new(0.2)).unwrap();
        table.record(Rung::new(1), 0.9, SyntheticCandidate::new(0.3)).unwrap();

        let job = planner.next_job(&mut table).unwrap();
        assert_eq!(job.candidate.id(), star.id());
        assert_eq!(job.rung, Rung::new(2));
    }
}
