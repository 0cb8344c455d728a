//! Rung indices and the resource budget attached to each rung.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::LadderError;

/// Default reduction factor between rungs.
pub const DEFAULT_REDUCTION_FACTOR: u64 = 3;

/// Default budget of rung 0.
pub const DEFAULT_MINIMUM_RESOURCE: u64 = 100;

/// Default budget of the top rung when the problem size is unknown.
pub const DEFAULT_MAXIMUM_RESOURCE: u64 = 100_000;

/// Default number of low rungs skipped.
pub const DEFAULT_MINIMUM_EARLY_STOPPING_RATE: u32 = 1;

/// Timeout granted to every job regardless of budget.
pub const BASE_JOB_TIMEOUT: Duration = Duration::from_secs(10);

/// Extra timeout granted to a job at the top rung.
pub const JOB_TIMEOUT_SCALE: Duration = Duration::from_secs(600);

/// Index of a resource tier.
///
/// Rungs are numbered over all possible tiers `0..=max_rung`; the lowest
/// `minimum_early_stopping_rate` of them are never used.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Rung(u32);

impl Rung {
    /// Creates a rung from its index.
    #[must_use]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Returns the rung index.
    #[must_use]
    pub const fn index(&self) -> u32 {
        self.0
    }

    /// The rung above this one.
    #[must_use]
    pub const fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl std::fmt::Display for Rung {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for Rung {
    fn from(index: u32) -> Self {
        Self(index)
    }
}

/// The validated set of active rungs and their budgets.
///
/// # Invariants
///
/// - `reduction_factor > 1`, `0 < minimum_resource <= maximum_resource`
/// - `max_rung` is the smallest `k` with
///   `minimum_resource * reduction_factor^k >= maximum_resource`, which is
///   `ceil(log_reduction_factor(maximum_resource / minimum_resource))`
///   computed without floating point error
/// - `minimum_early_stopping_rate <= max_rung`, so at least one rung is active
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceLadder {
    reduction_factor: u64,
    minimum_resource: u64,
    maximum_resource: u64,
    minimum_early_stopping_rate: u32,
    max_rung: u32,
}

impl ResourceLadder {
    /// Validate the hyperparameters and build the ladder.
    pub fn new(
        reduction_factor: u64,
        minimum_resource: u64,
        maximum_resource: u64,
        minimum_early_stopping_rate: u32,
    ) -> Result<Self, LadderError> {
        if reduction_factor <= 1 {
            return Err(LadderError::InvalidReductionFactor(reduction_factor));
        }
        if minimum_resource == 0 {
            return Err(LadderError::InvalidMinimumResource(minimum_resource));
        }
        if maximum_resource < minimum_resource {
            return Err(LadderError::MaximumBelowMinimum {
                minimum: minimum_resource,
                maximum: maximum_resource,
            });
        }

        let max_rung = ceil_log(maximum_resource, minimum_resource, reduction_factor);
        if minimum_early_stopping_rate > max_rung {
            return Err(LadderError::EarlyStoppingRateTooHigh {
                rate: minimum_early_stopping_rate,
                max_rung,
            });
        }

        Ok(Self {
            reduction_factor,
            minimum_resource,
            maximum_resource,
            minimum_early_stopping_rate,
            max_rung,
        })
    }

    pub fn reduction_factor(&self) -> u64 {
        self.reduction_factor
    }

    pub fn minimum_resource(&self) -> u64 {
        self.minimum_resource
    }

    pub fn maximum_resource(&self) -> u64 {
        self.maximum_resource
    }

    pub fn minimum_early_stopping_rate(&self) -> u32 {
        self.minimum_early_stopping_rate
    }

    /// The top rung, evaluated with the full budget.
    pub fn max_rung(&self) -> Rung {
        Rung(self.max_rung)
    }

    /// The rung fresh candidates enter at.
    pub fn lowest_rung(&self) -> Rung {
        Rung(self.minimum_early_stopping_rate)
    }

    /// Active rungs, lowest first.
    pub fn rungs(&self) -> impl DoubleEndedIterator<Item = Rung> + ExactSizeIterator {
        (self.minimum_early_stopping_rate..self.max_rung + 1).map(Rung)
    }

    /// Returns true if the rung is within the active range.
    pub fn contains(&self, rung: Rung) -> bool {
        (self.minimum_early_stopping_rate..=self.max_rung).contains(&rung.0)
    }

    /// Returns true for the top rung.
    pub fn is_top(&self, rung: Rung) -> bool {
        rung.0 == self.max_rung
    }

    /// Budget of a rung: `min(minimum_resource * reduction_factor^rung,
    /// maximum_resource)`.
    pub fn resource(&self, rung: Rung) -> u64 {
        self.reduction_factor
            .checked_pow(rung.0)
            .and_then(|scale| scale.checked_mul(self.minimum_resource))
            .map_or(self.maximum_resource, |r| r.min(self.maximum_resource))
    }

    /// Wall-clock allowance for one job at this rung:
    /// `10s + resource(rung) / resource(max_rung) * 600s`.
    pub fn timeout(&self, rung: Rung) -> Duration {
        let share = self.resource(rung) as f64 / self.resource(self.max_rung()) as f64;
        BASE_JOB_TIMEOUT + JOB_TIMEOUT_SCALE.mul_f64(share)
    }
}

impl Default for ResourceLadder {
    fn default() -> Self {
        let max_rung = ceil_log(
            DEFAULT_MAXIMUM_RESOURCE,
            DEFAULT_MINIMUM_RESOURCE,
            DEFAULT_REDUCTION_FACTOR,
        );
        Self {
            reduction_factor: DEFAULT_REDUCTION_FACTOR,
            minimum_resource: DEFAULT_MINIMUM_RESOURCE,
            maximum_resource: DEFAULT_MAXIMUM_RESOURCE,
            minimum_early_stopping_rate: DEFAULT_MINIMUM_EARLY_STOPPING_RATE,
            max_rung,
        }
    }
}

/// Smallest `k` such that `minimum * base^k >= maximum`.
fn ceil_log(maximum: u64, minimum: u64, base: u64) -> u32 {
    let mut k = 0;
    let mut reached = minimum;
    while reached < maximum {
        reached = reached.saturating_mul(base);
        k += 1;
    }
    k
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_three_rung_ladder() {
        let ladder = ResourceLadder::new(3, 100, 900, 0).unwrap();

        assert_eq!(ladder.max_rung(), Rung::new(2));
        assert_eq!(ladder.lowest_rung(), Rung::new(0));
        let budgets: Vec<_> = ladder.rungs().map(|r| (r.index(), ladder.resource(r))).collect();
        assert_eq!(budgets, vec![(0, 100), (1, 300), (2, 900)]);
    }

    #[test]
    fn test_max_rung_rounds_up() {
        // log3(1000 / 100) = 2.09..., so a third rung clamps to the maximum.
        let ladder = ResourceLadder::new(3, 100, 1000, 0).unwrap();
        assert_eq!(ladder.max_rung(), Rung::new(3));
        assert_eq!(ladder.resource(Rung::new(2)), 900);
        assert_eq!(ladder.resource(Rung::new(3)), 1000);
    }

    #[test]
    fn test_default_ladder_matches_defaults() {
        let built = ResourceLadder::new(
            DEFAULT_REDUCTION_FACTOR,
            DEFAULT_MINIMUM_RESOURCE,
            DEFAULT_MAXIMUM_RESOURCE,
            DEFAULT_MINIMUM_EARLY_STOPPING_RATE,
        )
        .unwrap();
        assert_eq!(ResourceLadder::default(), built);
        // 100 * 3^7 = 218_700 is the first budget past 100_000.
        assert_eq!(built.max_rung(), Rung::new(7));
    }

    #[test]
    fn test_single_rung_ladder() {
        let ladder = ResourceLadder::new(2, 500, 500, 0).unwrap();
        assert_eq!(ladder.max_rung(), Rung::new(0));
        assert_eq!(ladder.rungs().len(), 1);
        assert!(ladder.is_top(ladder.lowest_rung()));
    }

    #[test]
    fn test_early_stopping_rate_skips_low_rungs() {
        let ladder = ResourceLadder::new(3, 100, 900, 1).unwrap();
        let rungs: Vec<_> = ladder.rungs().collect();
        assert_eq!(rungs, vec![Rung::new(1), Rung::new(2)]);
        assert!(!ladder.contains(Rung::new(0)));
        assert!(ladder.contains(Rung::new(2)));
        assert!(!ladder.contains(Rung::new(3)));
    }

    #[test]
    fn test_invalid_hyperparameters() {
        assert_eq!(
            ResourceLadder::new(1, 100, 900, 0),
            Err(LadderError::InvalidReductionFactor(1))
        );
        assert_eq!(
            ResourceLadder::new(3, 0, 900, 0),
            Err(LadderError::InvalidMinimumResource(0))
        );
        assert_eq!(
            ResourceLadder::new(3, 100, 50, 0),
            Err(LadderError::MaximumBelowMinimum {
                minimum: 100,
                maximum: 50
            })
        );
        assert_eq!(
            ResourceLadder::new(3, 100, 900, 3),
            Err(LadderError::EarlyStoppingRateTooHigh { rate: 3, max_rung: 2 })
        );
    }

    #[test]
    fn test_timeouts_scale_with_budget() {
        let ladder = ResourceLadder::new(3, 100, 900, 0).unwrap();

        assert_eq!(ladder.timeout(Rung::new(2)), Duration::from_secs(610));
        let mid = ladder.timeout(Rung::new(1)).as_secs_f64();
        assert!((mid - 210.0).abs() < 1e-6);
        // 10 + 100/900 * 600 = 76.66...
        let low = ladder.timeout(Rung::new(0)).as_secs_f64();
        assert!((low - 76.666).abs() < 0.01);
    }

    #[test]
    fn test_resource_saturates_instead_of_overflowing() {
        let ladder = ResourceLadder::new(u64::MAX, 1, u64::MAX, 0).unwrap();
        assert_eq!(ladder.max_rung(), Rung::new(1));
        assert_eq!(ladder.resource(Rung::new(40)), u64::MAX);
    }
}
