//! Resampling a regular series to a coarser step.

use chrono::{NaiveDateTime, TimeDelta};
use tracing::debug;

use crate::error::{AggregateError, ConfigurationError};
use crate::timeseries::{Flags, Metadata, Record, TimeSeries, TimeStep};
use crate::transform::grid::{ceil_to_step, epoch_seconds, infer_step_seconds};
use crate::transform::method::Method;

/// Flag given to aggregated values computed with some source values missing.
pub const DEFAULT_MISSING_FLAG: &str = "MISS";

/// Aggregates `series` into buckets of `target_step`.
///
/// Buckets are right-closed and labelled by their right edge, so a record
/// stamped 11:00 counts towards the 11:00 hourly bucket covering
/// (10:00, 11:00]. A bucket gets a value only if at least `min_count` of its
/// source records have one; a valued bucket that also covers missing source
/// records is flagged with `missing_flag`. Every bucket between the first and
/// the last one is emitted, even one that holds no source record. Leading and
/// trailing buckets without a value are dropped.
///
/// # Errors
///
/// Returns [`AggregateError::CannotInferStep`] for a non-empty series whose
/// step cannot be inferred, and [`AggregateError::Configuration`] if
/// `target_step` is not a positive number of minutes or puts bucket labels
/// outside the representable dates.
#[tracing::instrument(
    skip(series),
    fields(records = series.len(), target_step = %target_step, method = %method)
)]
pub fn aggregate(
    series: &TimeSeries,
    target_step: TimeStep,
    method: Method,
    min_count: usize,
    missing_flag: &str,
) -> Result<TimeSeries, AggregateError> {
    let target = target_step.fixed_seconds()?;
    let metadata = aggregated_metadata(series.metadata(), target_step, method);

    let records = series.records();
    if records.is_empty() {
        return Ok(TimeSeries::empty(metadata));
    }
    let step = infer_step_seconds(records).ok_or(AggregateError::CannotInferStep)?;

    let out_of_range = || ConfigurationError::StepOutOfRange {
        minutes: target_step.minutes,
    };
    let (first, last) = (records[0].timestamp, records[records.len() - 1].timestamp);
    let first_label = ceil_to_step(first, target).ok_or_else(out_of_range)?;
    let last_label = ceil_to_step(last, target).ok_or_else(out_of_range)?;
    let count = (last_label - first_label).num_seconds() / target + 1;

    let origin = epoch_seconds(first);
    let mut remaining = records;
    let buckets: Vec<Record> = (0..count)
        .map(|i| first_label + TimeDelta::seconds(i * target))
        .map(|label| {
            let split = remaining.partition_point(|r| r.timestamp <= label);
            let (members, rest) = remaining.split_at(split);
            remaining = rest;
            let expected = source_points_in_bucket(epoch_seconds(label) - origin, step, target);
            reduce_bucket(label, members, expected, method, min_count, missing_flag)
        })
        .collect();

    let Some(start) = buckets.iter().position(|r| r.value.is_some()) else {
        debug!(buckets = buckets.len(), "no bucket has a value");
        return Ok(TimeSeries::empty(metadata));
    };
    let end = buckets
        .iter()
        .rposition(|r| r.value.is_some())
        .map_or(buckets.len(), |i| i + 1);

    debug!(
        source_step = step,
        buckets = buckets.len(),
        kept = end - start,
        "aggregated"
    );

    Ok(TimeSeries::from_ordered(
        metadata,
        buckets[start..end].to_vec(),
    ))
}

/// Number of points of the source grid inside the bucket `(label - target, label]`.
///
/// `since_first` is the distance in seconds from the first source record to the
/// label. The source grid runs through the first record in both directions, so
/// points before the first record count as missing.
fn source_points_in_bucket(since_first: i64, step: i64, target: i64) -> usize {
    let points = since_first.div_euclid(step) - (since_first - target).div_euclid(step);
    usize::try_from(points).unwrap_or(0)
}

fn reduce_bucket(
    label: NaiveDateTime,
    members: &[Record],
    expected: usize,
    method: Method,
    min_count: usize,
    missing_flag: &str,
) -> Record {
    let present: Vec<f64> = members.iter().filter_map(|r| r.value).collect();

    let value = if present.len() < min_count {
        None
    } else {
        method.apply(&present)
    };
    let flags = if value.is_some() && present.len() < expected {
        Flags::single(missing_flag)
    } else {
        Flags::new()
    };
    Record::new(label, value, flags)
}

fn aggregated_metadata(source: &Metadata, target_step: TimeStep, method: Method) -> Metadata {
    Metadata {
        time_step: Some(target_step),
        interval_type: Some(method.interval_type()),
        title: source.title.as_ref().map(|t| format!("Aggregated {t}")),
        comment: source.comment.as_ref().map(|c| {
            format!(
                "Created by aggregating ({method}) the step of timeseries that had this comment:\n\n{c}"
            )
        }),
        ..source.carry_over()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2008, 2, 7)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn series(values: &[(NaiveDateTime, Option<f64>)]) -> TimeSeries {
        let records = values
            .iter()
            .map(|&(t, v)| Record::new(t, v, Flags::new()))
            .collect();
        TimeSeries::new(Metadata::default(), records).unwrap()
    }

    const HOURLY: TimeStep = TimeStep::minutes(60);

    #[test]
    fn test_empty_series_gives_empty_result() {
        let result = aggregate(
            &TimeSeries::default(),
            HOURLY,
            Method::Sum,
            3,
            DEFAULT_MISSING_FLAG,
        )
        .unwrap();
        assert!(result.is_empty());
        assert_eq!(result.metadata().time_step, Some(HOURLY));
    }

    #[test]
    fn test_single_record_cannot_infer_step() {
        let source = series(&[(ts(10, 0), Some(1.0))]);
        assert_eq!(
            aggregate(&source, HOURLY, Method::Sum, 1, DEFAULT_MISSING_FLAG),
            Err(AggregateError::CannotInferStep)
        );
    }

    #[test]
    fn test_irregular_series_cannot_infer_step() {
        let source = series(&[
            (ts(10, 0), Some(1.0)),
            (ts(10, 10), Some(1.0)),
            (ts(10, 25), Some(1.0)),
        ]);
        assert_eq!(
            aggregate(&source, HOURLY, Method::Sum, 1, DEFAULT_MISSING_FLAG),
            Err(AggregateError::CannotInferStep)
        );
    }

    #[test]
    fn test_monthly_target_is_rejected() {
        let source = series(&[(ts(10, 0), Some(1.0)), (ts(10, 10), Some(1.0))]);
        let monthly = TimeStep {
            minutes: 0,
            months: 1,
        };
        assert!(matches!(
            aggregate(&source, monthly, Method::Sum, 1, DEFAULT_MISSING_FLAG),
            Err(AggregateError::Configuration(_))
        ));
    }

    #[test]
    fn test_record_on_edge_belongs_to_closing_bucket() {
        let source = series(&[
            (ts(10, 10), Some(1.0)),
            (ts(10, 20), Some(1.0)),
            (ts(10, 30), Some(1.0)),
            (ts(10, 40), Some(1.0)),
            (ts(10, 50), Some(1.0)),
            (ts(11, 0), Some(1.0)),
            (ts(11, 10), Some(100.0)),
        ]);
        let result = aggregate(&source, HOURLY, Method::Sum, 1, DEFAULT_MISSING_FLAG).unwrap();
        let r = result.records();
        assert_eq!(r.len(), 2);
        assert_eq!(r[0], Record::new(ts(11, 0), Some(6.0), Flags::new()));
        assert_eq!(r[1].timestamp, ts(12, 0));
        assert_eq!(r[1].value, Some(100.0));
        assert_eq!(r[1].flags.to_string(), "MISS");
    }

    #[test]
    fn test_internal_gap_is_kept_and_gaps_are_padded() {
        // 11:00 bucket has no source at all; 12:00 has only 11:50 and 12:00
        let source = series(&[
            (ts(9, 10), Some(1.0)),
            (ts(9, 20), Some(1.0)),
            (ts(9, 30), Some(1.0)),
            (ts(9, 40), Some(1.0)),
            (ts(9, 50), Some(1.0)),
            (ts(10, 0), Some(1.0)),
            (ts(11, 50), Some(2.0)),
            (ts(12, 0), Some(2.0)),
        ]);
        let result = aggregate(&source, HOURLY, Method::Max, 1, "GAP").unwrap();
        let r = result.records();
        assert_eq!(r.len(), 3);
        assert_eq!(r[0], Record::new(ts(10, 0), Some(1.0), Flags::new()));
        assert_eq!(r[1], Record::missing(ts(11, 0)));
        assert_eq!(r[2], Record::new(ts(12, 0), Some(2.0), Flags::single("GAP")));
    }

    #[test]
    fn test_below_min_count_is_missing_without_flag() {
        let source = series(&[
            (ts(10, 10), Some(1.0)),
            (ts(10, 20), None),
            (ts(10, 30), None),
            (ts(10, 40), None),
            (ts(10, 50), None),
            (ts(11, 0), Some(1.0)),
            (ts(11, 10), Some(1.0)),
            (ts(11, 20), Some(1.0)),
            (ts(11, 30), Some(1.0)),
            (ts(11, 40), Some(1.0)),
            (ts(11, 50), Some(1.0)),
            (ts(12, 0), Some(1.0)),
            (ts(12, 10), Some(1.0)),
            (ts(12, 20), Some(1.0)),
            (ts(12, 30), Some(1.0)),
            (ts(12, 40), Some(1.0)),
            (ts(12, 50), Some(1.0)),
            (ts(13, 0), Some(1.0)),
            (ts(13, 10), Some(1.0)),
            (ts(13, 20), None),
            (ts(13, 30), None),
            (ts(13, 40), None),
            (ts(13, 50), None),
            (ts(14, 0), Some(1.0)),
        ]);
        let result = aggregate(&source, HOURLY, Method::Mean, 3, DEFAULT_MISSING_FLAG).unwrap();
        let r = result.records();
        // 11:00 (2 of 6) is dropped as a leading gap; 14:00 (2 of 6) as trailing
        assert_eq!(r.len(), 2);
        assert_eq!(r[0], Record::new(ts(12, 0), Some(1.0), Flags::new()));
        assert_eq!(r[1], Record::new(ts(13, 0), Some(1.0), Flags::new()));
    }

    #[test]
    fn test_flags_of_source_do_not_propagate() {
        let records = vec![
            Record::new(ts(10, 30), Some(1.0), Flags::single("RANGE")),
            Record::new(ts(11, 0), Some(2.0), Flags::new()),
        ];
        let source = TimeSeries::new(Metadata::default(), records).unwrap();
        let result = aggregate(&source, HOURLY, Method::Sum, 1, DEFAULT_MISSING_FLAG).unwrap();
        assert_eq!(result.records(), &[Record::new(ts(11, 0), Some(3.0), Flags::new())]);
    }

    #[test]
    fn test_metadata_describes_result() {
        let metadata = Metadata {
            unit: Some("mm".into()),
            title: Some("Rain".into()),
            comment: Some("Tipping bucket".into()),
            time_step: Some(TimeStep::minutes(10)),
            ..Metadata::default()
        };
        let source = TimeSeries::new(
            metadata,
            vec![
                Record::new(ts(10, 50), Some(1.0), Flags::new()),
                Record::new(ts(11, 0), Some(2.0), Flags::new()),
            ],
        )
        .unwrap();
        let result = aggregate(&source, HOURLY, Method::Sum, 1, DEFAULT_MISSING_FLAG).unwrap();
        let meta = result.metadata();
        assert_eq!(meta.unit.as_deref(), Some("mm"));
        assert_eq!(meta.title.as_deref(), Some("Aggregated Rain"));
        assert!(meta.comment.as_deref().unwrap().ends_with("Tipping bucket"));
        assert_eq!(meta.time_step, Some(HOURLY));
        assert_eq!(meta.interval_type, Some(crate::timeseries::IntervalType::Sum));
    }

    #[test]
    fn test_finer_target_keeps_empty_interior_buckets() {
        let source = series(&[(ts(10, 0), Some(1.0)), (ts(11, 0), Some(2.0))]);
        let half_hourly = TimeStep::minutes(30);
        let result = aggregate(&source, half_hourly, Method::Sum, 1, "MISS").unwrap();
        assert_eq!(
            result.records(),
            &[
                Record::new(ts(10, 0), Some(1.0), Flags::new()),
                Record::missing(ts(10, 30)),
                Record::new(ts(11, 0), Some(2.0), Flags::new()),
            ]
        );
    }

    #[test]
    fn test_target_beyond_calendar_range_is_an_error() {
        let source = series(&[(ts(10, 0), Some(1.0)), (ts(10, 10), Some(2.0))]);
        let huge = TimeStep::minutes(1_000_000_000_000);
        assert_eq!(
            aggregate(&source, huge, Method::Sum, 1, DEFAULT_MISSING_FLAG),
            Err(AggregateError::Configuration(
                ConfigurationError::StepOutOfRange {
                    minutes: 1_000_000_000_000
                }
            ))
        );
    }

    #[test]
    fn test_overflowing_target_is_an_error() {
        let source = series(&[(ts(10, 0), Some(1.0)), (ts(10, 10), Some(2.0))]);
        assert!(matches!(
            aggregate(&source, TimeStep::minutes(i64::MAX), Method::Sum, 1, "MISS"),
            Err(AggregateError::Configuration(
                ConfigurationError::StepOutOfRange { .. }
            ))
        ));
    }
}
