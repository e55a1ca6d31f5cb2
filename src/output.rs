//! Writing time series back to the textual file format, and summarising them.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use csv::{Terminator, WriterBuilder};
use flate2::Compression;
use flate2::write::GzEncoder;
use serde::Serialize;
use tracing::debug;

use crate::timeseries::{Metadata, Record, TimeSeries};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Writes `series` to `path`, gzip-compressing it if the name ends in `.gz`.
pub fn write_file(path: impl AsRef<Path>, series: &TimeSeries) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let is_gzip = path.extension().and_then(|e| e.to_str()) == Some("gz");
    debug!(path = %path.display(), is_gzip, records = series.len(), "Writing time series");

    if is_gzip {
        let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
        write_series(&mut encoder, series)?;
        encoder.finish()?.flush()?;
    } else {
        let mut writer = BufWriter::new(file);
        write_series(&mut writer, series)?;
        writer.flush()?;
    }
    Ok(())
}

/// Writes the header block followed by the CSV rows, with CRLF line endings.
pub fn write_series<W: Write>(mut writer: W, series: &TimeSeries) -> Result<()> {
    write_header(&mut writer, series.metadata(), series.len())?;

    let precision = series.metadata().precision;
    let mut csv = WriterBuilder::new()
        .has_headers(false)
        .terminator(Terminator::CRLF)
        .from_writer(&mut writer);
    for record in series.records() {
        csv.write_record([
            record.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            format_value(record.value, precision),
            record.flags.to_string(),
        ])?;
    }
    csv.flush()?;
    Ok(())
}

fn write_header<W: Write>(writer: &mut W, meta: &Metadata, count: usize) -> Result<()> {
    let mut line = |key: &str, value: &dyn std::fmt::Display| -> std::io::Result<()> {
        write!(writer, "{key}={value}\r\n")
    };

    line("Count", &count)?;
    if let Some(unit) = &meta.unit {
        line("Unit", unit)?;
    }
    if let Some(title) = &meta.title {
        line("Title", title)?;
    }
    if let Some(comment) = &meta.comment {
        for comment_line in comment.lines() {
            line("Comment", &comment_line)?;
        }
    }
    if let Some(time_zone) = &meta.time_zone {
        line("Timezone", time_zone)?;
    }
    if let Some(step) = &meta.time_step {
        line("Time_step", step)?;
    }
    if let Some(rounding) = &meta.timestamp_rounding {
        line("Timestamp_rounding", rounding)?;
    }
    if let Some(offset) = &meta.timestamp_offset {
        line("Timestamp_offset", offset)?;
    }
    if let Some(interval_type) = &meta.interval_type {
        line("Interval_type", interval_type)?;
    }
    if let Some(variable) = &meta.variable {
        line("Variable", variable)?;
    }
    if let Some(precision) = &meta.precision {
        line("Precision", precision)?;
    }
    if let Some(location) = &meta.location {
        line("Location", location)?;
    }
    writer.write_all(b"\r\n")?;
    Ok(())
}

fn format_value(value: Option<f64>, precision: Option<u32>) -> String {
    match (value, precision) {
        (None, _) => String::new(),
        (Some(v), Some(p)) => format!("{:.*}", p as usize, v),
        (Some(v), None) => v.to_string(),
    }
}

/// Overview of a series, printed by the `describe` command.
#[derive(Debug, Serialize)]
pub struct SeriesSummary<'a> {
    pub metadata: &'a Metadata,
    pub count: usize,
    pub missing: usize,
    pub flagged: usize,
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
}

impl<'a> SeriesSummary<'a> {
    pub fn of(series: &'a TimeSeries) -> Self {
        let records = series.records();
        SeriesSummary {
            metadata: series.metadata(),
            count: records.len(),
            missing: records.iter().filter(|r| r.value.is_none()).count(),
            flagged: records.iter().filter(|r| !r.flags.is_empty()).count(),
            start: records.first().map(|r: &Record| r.timestamp),
            end: records.last().map(|r| r.timestamp),
        }
    }
}

/// Renders a series summary as pretty-printed JSON.
pub fn summary_json(series: &TimeSeries) -> Result<String> {
    Ok(serde_json::to_string_pretty(&SeriesSummary::of(series))?)
}
