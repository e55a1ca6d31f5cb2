//! Reader for the textual time-series file format.
//!
//! A file is an optional block of `Key=Value` header lines, a blank line, and
//! CSV rows of `timestamp,value,flags`. A file without a header is plain CSV.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::NaiveDateTime;
use flate2::read::GzDecoder;
use tracing::debug;

use crate::timeseries::{Flags, Metadata, Record, TimeSeries};

const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%dT%H:%M:%S",
];

/// Reads a series from `path`, decompressing it first if the name ends in `.gz`.
pub fn read_file(path: impl AsRef<Path>) -> Result<TimeSeries> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let is_gzip = path.extension().and_then(|e| e.to_str()) == Some("gz");
    debug!(path = %path.display(), is_gzip, "Reading time series");

    let series = if is_gzip {
        read_series(GzDecoder::new(BufReader::new(file)))
    } else {
        read_series(BufReader::new(file))
    };
    series.with_context(|| format!("reading {}", path.display()))
}

/// Reads a series from any reader.
pub fn read_series<R: Read>(mut reader: R) -> Result<TimeSeries> {
    let mut text = String::new();
    reader.read_to_string(&mut text)?;
    parse_series(&text)
}

/// Parses the full text of a time-series file.
///
/// # Errors
///
/// Returns an error for malformed header values, unparseable rows, or rows
/// whose timestamps are not strictly increasing.
pub fn parse_series(text: &str) -> Result<TimeSeries> {
    let (header, data) = split_header(text);
    let metadata = match header {
        Some(header) => parse_header(header)?,
        None => Metadata::default(),
    };
    let header_lines = header.map_or(0, |h| h.lines().count() + 1);
    let records = parse_rows(data, header_lines)?;
    Ok(TimeSeries::new(metadata, records)?)
}

fn split_header(text: &str) -> (Option<&str>, &str) {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let has_header = text
        .lines()
        .next()
        .is_some_and(|line| line.contains('='));
    if !has_header {
        return (None, text);
    }

    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        if line.trim().is_empty() {
            return (Some(&text[..offset]), &text[offset + line.len()..]);
        }
        offset += line.len();
    }
    (Some(text), "")
}

fn parse_header(header: &str) -> Result<Metadata> {
    let mut meta = Metadata::default();
    let mut comment: Vec<&str> = Vec::new();

    for (i, line) in header.lines().enumerate() {
        let Some((key, value)) = line.split_once('=') else {
            bail!("header line {}: expected Key=Value, got {line:?}", i + 1);
        };
        let value = value.trim();
        let context = || format!("header line {}: {}", i + 1, key.trim());

        match key.trim().to_ascii_lowercase().as_str() {
            "unit" => meta.unit = Some(value.to_string()),
            "timezone" => meta.time_zone = Some(value.to_string()),
            "time_step" => meta.time_step = Some(value.parse().with_context(context)?),
            "interval_type" if value.is_empty() => meta.interval_type = None,
            "interval_type" => meta.interval_type = Some(value.parse().with_context(context)?),
            "variable" => meta.variable = Some(value.to_string()),
            "precision" => meta.precision = Some(value.parse().with_context(context)?),
            "location" => meta.location = Some(value.to_string()),
            "title" => meta.title = Some(value.to_string()),
            "comment" => comment.push(value),
            "timestamp_rounding" => {
                meta.timestamp_rounding = Some(value.parse().with_context(context)?)
            }
            "timestamp_offset" => {
                meta.timestamp_offset = Some(value.parse().with_context(context)?)
            }
            other => debug!(key = other, "Ignoring header line"),
        }
    }

    if !comment.is_empty() {
        meta.comment = Some(comment.join("\n"));
    }
    Ok(meta)
}

fn parse_rows(data: &str, line_offset: usize) -> Result<Vec<Record>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(data.as_bytes());

    let mut records = Vec::new();
    for row in rdr.records() {
        let row = row?;
        let line = line_offset + row.position().map_or(0, |p| p.line() as usize);
        records.push(parse_row(&row).with_context(|| format!("line {line}"))?);
    }
    Ok(records)
}

fn parse_row(row: &csv::StringRecord) -> Result<Record> {
    let timestamp = parse_timestamp(row.get(0).unwrap_or_default())?;
    let value = match row.get(1).unwrap_or_default() {
        "" => None,
        text => {
            let v: f64 = text
                .parse()
                .with_context(|| format!("invalid value {text:?}"))?;
            (!v.is_nan()).then_some(v)
        }
    };
    let flags: Flags = row.get(2).unwrap_or_default().parse()?;
    Ok(Record::new(timestamp, value, flags))
}

fn parse_timestamp(text: &str) -> Result<NaiveDateTime> {
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .with_context(|| format!("invalid timestamp {text:?}"))
}
