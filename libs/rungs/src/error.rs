//! Error types for the resource ladder and rung table.

use thiserror::Error;

use crate::Rung;

/// Invalid ladder hyperparameters.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LadderError {
    /// The reduction factor must be greater than one.
    #[error("reduction_factor must be greater than 1, got {0}")]
    InvalidReductionFactor(u64),

    /// The minimum resource must be positive.
    #[error("minimum_resource must be greater than 0, got {0}")]
    InvalidMinimumResource(u64),

    /// The maximum resource is below the minimum resource.
    #[error("maximum_resource ({maximum}) must not be less than minimum_resource ({minimum})")]
    MaximumBelowMinimum { minimum: u64, maximum: u64 },

    /// Skipping this many rungs would leave no rung to evaluate on.
    #[error(
        "minimum_early_stopping_rate ({rate}) exceeds the highest rung ({max_rung})"
    )]
    EarlyStoppingRateTooHigh { rate: u32, max_rung: u32 },
}

/// Rung table operations that would break a table invariant.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RungError {
    /// The rung is outside the ladder's active range.
    #[error("rung {0} is not an active rung")]
    UnknownRung(Rung),

    /// The entry position does not exist at this rung.
    #[error("rung {rung} has no entry at position {position}")]
    UnknownEntry { rung: Rung, position: usize },

    /// The entry was already promoted.
    #[error("entry {position} of rung {rung} was already promoted")]
    AlreadyPromoted { rung: Rung, position: usize },

    /// Promoting would exceed `floor(entries / reduction_factor)`.
    #[error("rung {rung} may promote at most {allowed} of its entries")]
    OverPromotion { rung: Rung, allowed: usize },

    /// The top rung has nothing to promote into.
    #[error("rung {0} is the top rung and cannot promote")]
    TopRung(Rung),
}
