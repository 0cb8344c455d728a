//! Search error types.

use halving_rungs::RungError;
use thiserror::Error;

use crate::config::ConfigError;

/// A search that could not run to a result.
///
/// Deadlines and failed evaluations are not errors; they show up in the
/// outcome's status instead.
#[derive(Debug, Error)]
pub enum SearchError {
    /// Rejected before any job was submitted.
    #[error("invalid search configuration: {0}")]
    Config(#[from] ConfigError),

    /// The rung table refused a promotion the planner proposed.
    #[error("rung table rejected promotion: {0}")]
    Rung(#[from] RungError),
}

impl SearchError {
    /// Returns true if the error is a configuration problem.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}
