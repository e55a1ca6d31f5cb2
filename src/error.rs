//! Error types for the regularize and aggregate transformations.

use chrono::NaiveDateTime;
use thiserror::Error;

/// Problems with the step or interval-type declaration of a series, or with
/// the parameters a transformation was called with.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// Neither the series nor the caller declared a time step.
    #[error("the source time series does not specify a time step")]
    MissingStep,

    /// The step text could not be parsed.
    #[error("malformed time step {0:?}")]
    MalformedStep(String),

    /// The step has a month component or is not a positive number of minutes.
    #[error(
        "unsupported time step ({minutes} minutes, {months} months); only positive time steps \
         specified in minutes are supported"
    )]
    UnsupportedStep {
        /// Minute component as declared.
        minutes: i64,
        /// Month component as declared.
        months: i64,
    },

    /// The step is too long to lay a grid over the dates of the series.
    #[error("time step of {minutes} minutes is too large to build a grid")]
    StepOutOfRange {
        /// Minute component as declared.
        minutes: i64,
    },

    /// The interval type name is not one we know.
    #[error("unknown interval type {0:?}")]
    UnknownIntervalType(String),

    /// The reduction method name is not one of sum, mean, max, min.
    #[error("unknown aggregation method {0:?}; expected one of sum, mean, max, min")]
    UnknownMethod(String),
}

/// Failures of [`aggregate`](crate::transform::aggregate::aggregate).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AggregateError {
    /// The source step could not be inferred from a non-empty series.
    #[error("can't infer time series step; maybe it's not regularized")]
    CannotInferStep,

    /// The target step is not usable.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

/// Violations of the [`TimeSeries`](crate::timeseries::TimeSeries) ordering invariant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SeriesError {
    #[error("timestamps must be strictly increasing: {next} follows {previous}")]
    UnorderedTimestamps {
        previous: NaiveDateTime,
        next: NaiveDateTime,
    },
}
