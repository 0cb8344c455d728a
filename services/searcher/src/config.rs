//! Configuration for a search run.
//!
//! Configuration is resolved in two phases:
//!
//! 1. [`SearchConfig`] holds optional overrides, loaded from a TOML file,
//!    environment variables and command line flags (later layers win).
//! 2. [`SearchConfig::resolve`] fills in defaults once the problem size is
//!    known and validates everything, producing a [`ResolvedConfig`].
//!
//! Validation happens before any job is submitted.

use std::fs;
use std::path::Path;
use std::time::Duration;

use halving_rungs::{
    LadderError, ResourceLadder, DEFAULT_MAXIMUM_RESOURCE, DEFAULT_MINIMUM_EARLY_STOPPING_RATE,
    DEFAULT_MINIMUM_RESOURCE, DEFAULT_REDUCTION_FACTOR,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default number of jobs kept in flight.
pub const DEFAULT_WINDOW_SIZE: usize = 8;

/// Default number of attempts at generating an unseen candidate.
pub const DEFAULT_MAX_FRESH_RETRIES: usize = 50;

/// Longest accepted search time budget.
pub const MAX_TIME_BUDGET: Duration = Duration::from_secs(3_000_000);

/// Environment variable names.
pub mod env_vars {
    pub const REDUCTION_FACTOR: &str = "HALVING_REDUCTION_FACTOR";
    pub const MINIMUM_RESOURCE: &str = "HALVING_MINIMUM_RESOURCE";
    pub const MAXIMUM_RESOURCE: &str = "HALVING_MAXIMUM_RESOURCE";
    pub const MIN_EARLY_STOPPING_RATE: &str = "HALVING_MIN_EARLY_STOPPING_RATE";
    pub const MAX_FULL_EVALUATIONS: &str = "HALVING_MAX_FULL_EVALUATIONS";
    pub const WINDOW_SIZE: &str = "HALVING_WINDOW_SIZE";
    pub const MAX_FRESH_RETRIES: &str = "HALVING_MAX_FRESH_RETRIES";
}

/// Invalid or unreadable configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Invalid rung hyperparameters.
    #[error(transparent)]
    Ladder(#[from] LadderError),

    #[error("window_size must be greater than 0")]
    InvalidWindowSize,

    #[error("max_full_evaluations must be greater than 0 when set")]
    InvalidMaxFullEvaluations,

    #[error("time budget must be greater than 0 and at most {max:?}, got {actual:?}")]
    InvalidTimeBudget { actual: Duration, max: Duration },

    #[error("invalid value {value:?} for {var}")]
    InvalidEnv { var: &'static str, value: String },

    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(String),
}

/// Search hyperparameters with optional overrides.
///
/// Every field left as `None` takes its default during [`resolve`].
///
/// [`resolve`]: SearchConfig::resolve
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SearchConfig {
    /// Ratio by which the candidate pool shrinks between rungs (default 3).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reduction_factor: Option<u64>,

    /// Budget of rung 0 (default 100).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum_resource: Option<u64>,

    /// Budget of the top rung (default: number of samples, else 100_000).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum_resource: Option<u64>,

    /// Number of lowest rungs to skip (default 1).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum_early_stopping_rate: Option<u32>,

    /// Stop after this many top-rung evaluations. `None` runs until the
    /// deadline.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_full_evaluations: Option<usize>,

    /// Number of jobs kept in flight (default 8).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window_size: Option<usize>,

    /// Attempts at generating a candidate not seen before (default 50).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_fresh_retries: Option<usize>,
}

/// Problem-size inputs used to derive defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProblemShape {
    /// Number of training samples, if known.
    pub n_samples: Option<u64>,
}

impl ProblemShape {
    /// Shape of a dataset with `n_samples` training rows.
    pub fn with_samples(n_samples: u64) -> Self {
        Self {
            n_samples: Some(n_samples),
        }
    }
}

/// Fully resolved and validated search configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedConfig {
    pub ladder: ResourceLadder,
    pub max_full_evaluations: Option<usize>,
    pub window_size: usize,
    pub max_fresh_retries: usize,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            ladder: ResourceLadder::default(),
            max_full_evaluations: None,
            window_size: DEFAULT_WINDOW_SIZE,
            max_fresh_retries: DEFAULT_MAX_FRESH_RETRIES,
        }
    }
}

impl SearchConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load a TOML config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Load overrides from `HALVING_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load overrides through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        Ok(Self {
            reduction_factor: parse_var(&lookup, env_vars::REDUCTION_FACTOR)?,
            minimum_resource: parse_var(&lookup, env_vars::MINIMUM_RESOURCE)?,
            maximum_resource: parse_var(&lookup, env_vars::MAXIMUM_RESOURCE)?,
            minimum_early_stopping_rate: parse_var(&lookup, env_vars::MIN_EARLY_STOPPING_RATE)?,
            max_full_evaluations: parse_var(&lookup, env_vars::MAX_FULL_EVALUATIONS)?,
            window_size: parse_var(&lookup, env_vars::WINDOW_SIZE)?,
            max_fresh_retries: parse_var(&lookup, env_vars::MAX_FRESH_RETRIES)?,
        })
    }

    /// Layer `overrides` on top of `self`; fields set in `overrides` win.
    #[must_use]
    pub fn merge(self, overrides: SearchConfig) -> Self {
        Self {
            reduction_factor: overrides.reduction_factor.or(self.reduction_factor),
            minimum_resource: overrides.minimum_resource.or(self.minimum_resource),
            maximum_resource: overrides.maximum_resource.or(self.maximum_resource),
            minimum_early_stopping_rate: overrides
                .minimum_early_stopping_rate
                .or(self.minimum_early_stopping_rate),
            max_full_evaluations: overrides.max_full_evaluations.or(self.max_full_evaluations),
            window_size: overrides.window_size.or(self.window_size),
            max_fresh_retries: overrides.max_fresh_retries.or(self.max_fresh_retries),
        }
    }

    /// Fill in defaults for the given problem and validate.
    pub fn resolve(&self, shape: &ProblemShape) -> Result<ResolvedConfig, ConfigError> {
        let maximum_resource = self
            .maximum_resource
            .or(shape.n_samples)
            .unwrap_or(DEFAULT_MAXIMUM_RESOURCE);

        let ladder = ResourceLadder::new(
            self.reduction_factor.unwrap_or(DEFAULT_REDUCTION_FACTOR),
            self.minimum_resource.unwrap_or(DEFAULT_MINIMUM_RESOURCE),
            maximum_resource,
            self.minimum_early_stopping_rate
                .unwrap_or(DEFAULT_MINIMUM_EARLY_STOPPING_RATE),
        )?;

        let window_size = self.window_size.unwrap_or(DEFAULT_WINDOW_SIZE);
        if window_size == 0 {
            return Err(ConfigError::InvalidWindowSize);
        }
        if self.max_full_evaluations == Some(0) {
            return Err(ConfigError::InvalidMaxFullEvaluations);
        }

        Ok(ResolvedConfig {
            ladder,
            max_full_evaluations: self.max_full_evaluations,
            window_size,
            max_fresh_retries: self.max_fresh_retries.unwrap_or(DEFAULT_MAX_FRESH_RETRIES),
        })
    }
}

/// Check a search time budget.
pub fn validate_time_budget(budget: Duration) -> Result<(), ConfigError> {
    if budget.is_zero() || budget > MAX_TIME_BUDGET {
        return Err(ConfigError::InvalidTimeBudget {
            actual: budget,
            max: MAX_TIME_BUDGET,
        });
    }
    Ok(())
}

fn parse_var<F, T>(lookup: &F, var: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&'static str) -> Option<String>,
    T: std::str::FromStr,
{
    let Some(value) = lookup(var) else {
        return Ok(None);
    };
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse()
        .map(Some)
        .map_err(|_| ConfigError::InvalidEnv { var, value })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use halving_rungs::Rung;
    use rstest::rstest;

    use super::*;

    fn lookup(pairs: &[(&'static str, &str)]) -> impl Fn(&'static str) -> Option<String> {
        let map: HashMap<&'static str, String> =
            pairs.iter().map(|(k, v)| (*k, v.to_string())).collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn test_defaults() {
        let resolved = SearchConfig::default()
            .resolve(&ProblemShape::default())
            .unwrap();

        assert_eq!(resolved, ResolvedConfig::default());
        assert_eq!(resolved.ladder.reduction_factor(), 3);
        assert_eq!(resolved.ladder.minimum_resource(), 100);
        assert_eq!(resolved.ladder.maximum_resource(), 100_000);
        assert_eq!(resolved.ladder.lowest_rung(), Rung::new(1));
        assert_eq!(resolved.window_size, 8);
        assert_eq!(resolved.max_full_evaluations, None);
    }

    #[test]
    fn test_maximum_resource_defaults_to_sample_count() {
        let resolved = SearchConfig::default()
            .resolve(&ProblemShape::with_samples(2_700))
            .unwrap();
        assert_eq!(resolved.ladder.maximum_resource(), 2_700);
        assert_eq!(resolved.ladder.max_rung(), Rung::new(3));

        let explicit = SearchConfig {
            maximum_resource: Some(900),
            ..Default::default()
        };
        let resolved = explicit.resolve(&ProblemShape::with_samples(2_700)).unwrap();
        assert_eq!(resolved.ladder.maximum_resource(), 900);
    }

    #[rstest]
    #[case::reduction_factor_one(SearchConfig { reduction_factor: Some(1), ..Default::default() })]
    #[case::zero_minimum_resource(SearchConfig { minimum_resource: Some(0), ..Default::default() })]
    #[case::maximum_below_minimum(SearchConfig { maximum_resource: Some(10), ..Default::default() })]
    #[case::too_many_skipped_rungs(SearchConfig { maximum_resource: Some(300), minimum_early_stopping_rate: Some(2), ..Default::default() })]
    #[case::empty_window(SearchConfig { window_size: Some(0), ..Default::default() })]
    #[case::zero_full_evaluations(SearchConfig { max_full_evaluations: Some(0), ..Default::default() })]
    fn test_invalid_configs_fail(#[case] config: SearchConfig) {
        assert!(config.resolve(&ProblemShape::default()).is_err());
    }

    #[test]
    fn test_ladder_errors_are_wrapped() {
        let config = SearchConfig {
            reduction_factor: Some(1),
            ..Default::default()
        };
        let err = config.resolve(&ProblemShape::default()).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Ladder(LadderError::InvalidReductionFactor(1))
        ));
    }

    #[test]
    fn test_from_toml() {
        let config = SearchConfig::from_toml_str(
            r#"
            reduction_factor = 4
            minimum_resource = 50
            max_full_evaluations = 10
            "#,
        )
        .unwrap();

        assert_eq!(config.reduction_factor, Some(4));
        assert_eq!(config.minimum_resource, Some(50));
        assert_eq!(config.max_full_evaluations, Some(10));
        assert_eq!(config.window_size, None);
    }

    #[test]
    fn test_from_toml_rejects_unknown_and_negative() {
        assert!(matches!(
            SearchConfig::from_toml_str("reduction_fator = 3"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            SearchConfig::from_toml_str("minimum_early_stopping_rate = -1"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "window_size = 4").unwrap();

        let config = SearchConfig::from_file(file.path()).unwrap();
        assert_eq!(config.window_size, Some(4));

        let missing = SearchConfig::from_file("/nonexistent/halving.toml");
        assert!(matches!(missing, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_from_lookup() {
        let config = SearchConfig::from_lookup(lookup(&[
            (env_vars::REDUCTION_FACTOR, "2"),
            (env_vars::MAX_FULL_EVALUATIONS, " 5 "),
            (env_vars::WINDOW_SIZE, ""),
        ]))
        .unwrap();

        assert_eq!(config.reduction_factor, Some(2));
        assert_eq!(config.max_full_evaluations, Some(5));
        assert_eq!(config.window_size, None);
    }

    #[test]
    fn test_from_lookup_rejects_garbage() {
        let err = SearchConfig::from_lookup(lookup(&[(env_vars::MINIMUM_RESOURCE, "lots")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidEnv {
                var: env_vars::MINIMUM_RESOURCE,
                ..
            }
        ));
    }

    #[test]
    fn test_merge_prefers_overrides() {
        let file = SearchConfig {
            reduction_factor: Some(4),
            window_size: Some(16),
            ..Default::default()
        };
        let flags = SearchConfig {
            window_size: Some(2),
            ..Default::default()
        };

        let merged = file.merge(flags);
        assert_eq!(merged.reduction_factor, Some(4));
        assert_eq!(merged.window_size, Some(2));
    }

    #[rstest]
    #[case(Duration::ZERO, false)]
    #[case(Duration::from_secs(1), true)]
    #[case(MAX_TIME_BUDGET, true)]
    #[case(MAX_TIME_BUDGET + Duration::from_secs(1), false)]
    fn test_time_budget_bounds(#[case] budget: Duration, #[case] valid: bool) {
        assert_eq!(validate_time_budget(budget).is_ok(), valid);
    }
}
