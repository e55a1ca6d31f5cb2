//! Snapping an irregular series onto the fixed-step grid implied by its
//! declared time step.

use chrono::{NaiveDateTime, TimeDelta};
use tracing::debug;

use crate::error::ConfigurationError;
use crate::timeseries::{IntervalType, Metadata, Record, TimeSeries, TimeStep};
use crate::transform::grid::{epoch_seconds, round_to_step};

/// Flag given to records that did not exist verbatim in the source.
pub const DEFAULT_INSERTED_FLAG: &str = "DATEINSERT";

/// How a grid point missing from the source gets its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GapFill {
    /// Linear interpolation/extrapolation from the two bracketing records.
    Interpolate,
    /// Copy of the only source record within half a step.
    Nearest,
}

impl GapFill {
    fn for_interval_type(interval_type: Option<IntervalType>) -> Self {
        match interval_type {
            Some(IntervalType::Average) => GapFill::Interpolate,
            _ => GapFill::Nearest,
        }
    }
}

/// Produces a new series whose timestamps lie exactly on the step grid.
///
/// `step` overrides the step declared in the series metadata. Records that
/// already sit on the grid are copied unchanged; other grid points are filled
/// according to the interval type (interpolation for `average`, nearest single
/// record otherwise) and flagged with `inserted_flag`. Points that cannot be
/// filled have no value and no flags.
///
/// # Errors
///
/// Returns a [`ConfigurationError`] if there is no step, or if the step is not
/// a positive number of minutes.
#[tracing::instrument(skip(series), fields(records = series.len()))]
pub fn regularize(
    series: &TimeSeries,
    step: Option<TimeStep>,
    inserted_flag: &str,
) -> Result<TimeSeries, ConfigurationError> {
    let source = series.metadata();
    let step = step
        .or(source.time_step)
        .ok_or(ConfigurationError::MissingStep)?;
    let step_seconds = step.fixed_seconds()?;
    let metadata = regularized_metadata(source, step);

    let records = series.records();
    let (Some(first), Some(last)) = (records.first(), records.last()) else {
        debug!("empty source, nothing to regularize");
        return Ok(TimeSeries::empty(metadata));
    };

    let out_of_range = || ConfigurationError::StepOutOfRange {
        minutes: step.minutes,
    };
    let first_grid_point =
        round_to_step(first.timestamp, step_seconds).ok_or_else(out_of_range)?;
    let last_grid_point = round_to_step(last.timestamp, step_seconds).ok_or_else(out_of_range)?;
    let count = (last_grid_point - first_grid_point).num_seconds() / step_seconds + 1;
    let fill = GapFill::for_interval_type(source.interval_type);

    debug!(
        first = %first_grid_point,
        last = %last_grid_point,
        count,
        ?fill,
        "regularizing onto grid"
    );

    let regularized: Vec<Record> = (0..count)
        .map(|i| first_grid_point + TimeDelta::seconds(i * step_seconds))
        .map(|t| grid_record(records, t, step_seconds, fill, inserted_flag))
        .collect();

    Ok(TimeSeries::from_ordered(metadata, regularized))
}

fn regularized_metadata(source: &Metadata, step: TimeStep) -> Metadata {
    Metadata {
        time_step: Some(step),
        interval_type: source.interval_type,
        timestamp_rounding: Some(TimeStep::minutes(0)),
        timestamp_offset: Some(TimeStep::minutes(0)),
        title: source.title.as_ref().map(|t| format!("Regularized {t}")),
        comment: source.comment.as_ref().map(|c| {
            format!("Created by regularizing step of timeseries that had this comment:\n\n{c}")
        }),
        ..source.carry_over()
    }
}

fn grid_record(
    records: &[Record],
    t: NaiveDateTime,
    step: i64,
    fill: GapFill,
    inserted_flag: &str,
) -> Record {
    let pos = records.partition_point(|r| r.timestamp < t);
    if let Some(existing) = records.get(pos).filter(|r| r.timestamp == t) {
        return existing.clone();
    }
    match fill {
        GapFill::Interpolate => interpolated(records, pos, t, step, inserted_flag),
        GapFill::Nearest => nearest(records, t, step, inserted_flag),
    }
}

/// `pos` is the index of the first record after `t`.
fn interpolated(
    records: &[Record],
    pos: usize,
    t: NaiveDateTime,
    step: i64,
    inserted_flag: &str,
) -> Record {
    let n = records.len();
    if n < 2 {
        return Record::missing(t);
    }
    let (before, after) = match pos {
        0 => (&records[0], &records[1]),
        p if p == n => (&records[n - 2], &records[n - 1]),
        p => (&records[p - 1], &records[p]),
    };
    let (Some(value_before), Some(value_after)) = (before.value, after.value) else {
        return Record::missing(t);
    };

    // Either difference is negative when extrapolating past an end.
    let diff_before = (t - before.timestamp).num_seconds() as f64;
    let diff_after = (after.timestamp - t).num_seconds() as f64;
    let near = diff_before.abs().min(diff_after.abs());
    let far = diff_before.abs().max(diff_after.abs());
    let step = step as f64;
    if near > 0.5 * step || far > 1.5 * step {
        return Record::missing(t);
    }

    let span = diff_before + diff_after;
    let value = value_after * diff_before / span + value_before * diff_after / span;
    let nearer = if diff_before.abs() <= diff_after.abs() {
        before
    } else {
        after
    };
    Record::new(t, Some(value), nearer.flags.clone().with(inserted_flag))
}

fn nearest(
    records: &[Record],
    grid_point: NaiveDateTime,
    step: i64,
    inserted_flag: &str,
) -> Record {
    let half = step / 2;
    let t = epoch_seconds(grid_point);
    let (low, high) = (t.saturating_sub(half), t.saturating_add(half));
    let start = records.partition_point(|r| epoch_seconds(r.timestamp) < low);
    let end = records.partition_point(|r| epoch_seconds(r.timestamp) < high);
    match &records[start..end] {
        [only] => Record::new(
            grid_point,
            only.value,
            only.flags.clone().with(inserted_flag),
        ),
        _ => Record::missing(grid_point),
    }
}
