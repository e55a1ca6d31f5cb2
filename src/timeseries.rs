//! The in-memory time series shared by the regularizer and the aggregator.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::error::{ConfigurationError, SeriesError};

/// Space-separated quality flags attached to a record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Flags(Vec<String>);

impl Flags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, token: &str) -> bool {
        self.0.iter().any(|f| f == token)
    }

    /// Returns these flags with `token` appended after the existing ones.
    pub fn with(mut self, token: &str) -> Self {
        self.0.push(token.to_string());
        self
    }

    /// A flag set holding the single `token`.
    pub fn single(token: &str) -> Self {
        Self(vec![token.to_string()])
    }
}

impl FromStr for Flags {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.split_whitespace().map(str::to_string).collect()))
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(" "))
    }
}

/// One `(timestamp, value, flags)` row.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub timestamp: NaiveDateTime,
    pub value: Option<f64>,
    pub flags: Flags,
}

impl Record {
    pub fn new(timestamp: NaiveDateTime, value: Option<f64>, flags: Flags) -> Self {
        Self {
            timestamp,
            value,
            flags,
        }
    }

    /// A record with no value and no flags.
    pub fn missing(timestamp: NaiveDateTime) -> Self {
        Self::new(timestamp, None, Flags::new())
    }
}

/// A nominal step as declared in series metadata: `minutes,months`.
///
/// Only pure-minute steps can be used for grid arithmetic; the month part is
/// kept so that monthly series can be recognised and rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeStep {
    pub minutes: i64,
    pub months: i64,
}

impl TimeStep {
    pub const fn minutes(minutes: i64) -> Self {
        Self { minutes, months: 0 }
    }

    /// The step as a positive number of minutes.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::UnsupportedStep`] for monthly steps and for
    /// steps that are zero or negative.
    pub fn fixed_minutes(&self) -> Result<i64, ConfigurationError> {
        if self.months != 0 || self.minutes <= 0 {
            return Err(ConfigurationError::UnsupportedStep {
                minutes: self.minutes,
                months: self.months,
            });
        }
        Ok(self.minutes)
    }

    /// The step length in seconds.
    ///
    /// # Errors
    ///
    /// Same as [`TimeStep::fixed_minutes`], plus
    /// [`ConfigurationError::StepOutOfRange`] if the seconds overflow.
    pub fn fixed_seconds(&self) -> Result<i64, ConfigurationError> {
        self.fixed_minutes()?
            .checked_mul(60)
            .ok_or(ConfigurationError::StepOutOfRange {
                minutes: self.minutes,
            })
    }
}

/// Accepts the header form `"10,0"` as well as the shorthand used on the
/// command line:
///
/// | Text            | Step            |
/// |-----------------|-----------------|
/// | `10`, `10min`, `10T` | 10 minutes |
/// | `H`, `3h`       | 60, 180 minutes |
/// | `D`, `2D`       | 1440, 2880 minutes |
/// | `M`, `1M`       | 1 month         |
impl FromStr for TimeStep {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        let malformed = || ConfigurationError::MalformedStep(s.to_string());

        if let Some((minutes, months)) = text.split_once(',') {
            let minutes = minutes.trim().parse().map_err(|_| malformed())?;
            let months = months.trim().parse().map_err(|_| malformed())?;
            return Ok(Self { minutes, months });
        }

        let split = text
            .find(|c: char| !(c.is_ascii_digit() || c == '-'))
            .unwrap_or(text.len());
        let (count, unit) = text.split_at(split);
        let count: i64 = if count.is_empty() {
            if unit.is_empty() {
                return Err(malformed());
            }
            1
        } else {
            count.parse().map_err(|_| malformed())?
        };

        let scaled = |factor: i64| {
            count
                .checked_mul(factor)
                .map(Self::minutes)
                .ok_or_else(malformed)
        };
        match unit {
            "" | "min" | "T" => Ok(Self::minutes(count)),
            "h" | "H" => scaled(60),
            "d" | "D" => scaled(1440),
            "M" => Ok(Self {
                minutes: 0,
                months: count,
            }),
            _ => Err(malformed()),
        }
    }
}

impl fmt::Display for TimeStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.minutes, self.months)
    }
}

/// What a value represents over its step. A series without an interval type
/// holds instantaneous values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IntervalType {
    Sum,
    Average,
    Minimum,
    Maximum,
    VectorAverage,
}

impl IntervalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntervalType::Sum => "sum",
            IntervalType::Average => "average",
            IntervalType::Minimum => "minimum",
            IntervalType::Maximum => "maximum",
            IntervalType::VectorAverage => "vector_average",
        }
    }
}

impl FromStr for IntervalType {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sum" => Ok(IntervalType::Sum),
            "average" => Ok(IntervalType::Average),
            "minimum" => Ok(IntervalType::Minimum),
            "maximum" => Ok(IntervalType::Maximum),
            "vector_average" => Ok(IntervalType::VectorAverage),
            _ => Err(ConfigurationError::UnknownIntervalType(s.to_string())),
        }
    }
}

impl fmt::Display for IntervalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Descriptive attributes of a series. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Metadata {
    pub unit: Option<String>,
    pub time_zone: Option<String>,
    pub time_step: Option<TimeStep>,
    pub interval_type: Option<IntervalType>,
    pub variable: Option<String>,
    pub precision: Option<u32>,
    pub location: Option<String>,
    pub title: Option<String>,
    pub comment: Option<String>,
    pub timestamp_rounding: Option<TimeStep>,
    pub timestamp_offset: Option<TimeStep>,
}

impl Metadata {
    /// Copies the attributes that describe the measured quantity and its
    /// place; step-related attributes, title and comment are left unset for
    /// the caller to fill in.
    pub fn carry_over(&self) -> Metadata {
        Metadata {
            unit: self.unit.clone(),
            time_zone: self.time_zone.clone(),
            variable: self.variable.clone(),
            precision: self.precision,
            location: self.location.clone(),
            ..Metadata::default()
        }
    }
}

/// An ordered sequence of records plus metadata.
///
/// Timestamps are unique and strictly increasing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeSeries {
    metadata: Metadata,
    records: Vec<Record>,
}

impl TimeSeries {
    /// Builds a series, checking that timestamps strictly increase.
    ///
    /// # Errors
    ///
    /// Returns [`SeriesError::UnorderedTimestamps`] at the first pair of records
    /// that is out of order or duplicated.
    pub fn new(metadata: Metadata, records: Vec<Record>) -> Result<Self, SeriesError> {
        if let Some(pair) = records
            .windows(2)
            .find(|w| w[0].timestamp >= w[1].timestamp)
        {
            return Err(SeriesError::UnorderedTimestamps {
                previous: pair[0].timestamp,
                next: pair[1].timestamp,
            });
        }
        Ok(Self { metadata, records })
    }

    pub fn empty(metadata: Metadata) -> Self {
        Self {
            metadata,
            records: Vec::new(),
        }
    }

    /// Used by the transformations, whose output is ordered by construction.
    pub(crate) fn from_ordered(metadata: Metadata, records: Vec<Record>) -> Self {
        debug_assert!(
            records
                .windows(2)
                .all(|w| w[0].timestamp < w[1].timestamp)
        );
        Self { metadata, records }
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The record stamped exactly `timestamp`, if any.
    pub fn get(&self, timestamp: NaiveDateTime) -> Option<&Record> {
        self.records
            .binary_search_by_key(&timestamp, |r| r.timestamp)
            .ok()
            .map(|i| &self.records[i])
    }
}
