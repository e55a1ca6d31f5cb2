//! Epoch-aligned grid arithmetic on timestamps.
//!
//! All steps are in seconds and grid points are whole multiples of the step
//! counted from 1970-01-01T00:00:00.

use chrono::{DateTime, NaiveDateTime};

use crate::timeseries::Record;

/// Whole seconds since the epoch; sub-second parts are dropped.
pub fn epoch_seconds(t: NaiveDateTime) -> i64 {
    t.and_utc().timestamp()
}

fn from_epoch_seconds(seconds: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp(seconds, 0).map(|dt| dt.naive_utc())
}

/// The grid point at or before `t`, or `None` if it is out of chrono's range.
pub fn floor_to_step(t: NaiveDateTime, step: i64) -> Option<NaiveDateTime> {
    let seconds = epoch_seconds(t);
    from_epoch_seconds(seconds - seconds.rem_euclid(step))
}

/// The grid point at or after `t`, or `None` if it is out of chrono's range.
pub fn ceil_to_step(t: NaiveDateTime, step: i64) -> Option<NaiveDateTime> {
    let floor = floor_to_step(t, step)?;
    if floor == t {
        return Some(floor);
    }
    from_epoch_seconds(epoch_seconds(floor).checked_add(step)?)
}

/// The nearest grid point; exact halves round up.
pub fn round_to_step(t: NaiveDateTime, step: i64) -> Option<NaiveDateTime> {
    let seconds = epoch_seconds(t);
    let offset = seconds.rem_euclid(step);
    let floor = seconds - offset;
    if offset >= step - offset {
        from_epoch_seconds(floor.checked_add(step)?)
    } else {
        from_epoch_seconds(floor)
    }
}

/// Infers the sampling step (in seconds) of an ordered series.
///
/// The step is the smallest gap between consecutive records, and every gap
/// must be a whole multiple of it. Returns `None` for fewer than two records
/// or for spacing that does not fit a single step.
pub fn infer_step_seconds(records: &[Record]) -> Option<i64> {
    if records.len() < 2 {
        return None;
    }
    let deltas: Vec<i64> = records
        .windows(2)
        .map(|w| (w[1].timestamp - w[0].timestamp).num_seconds())
        .collect();
    let step = deltas.iter().copied().min()?;
    if step <= 0 {
        return None;
    }
    deltas.iter().all(|d| d % step == 0).then_some(step)
}
