//! Sensor tables on disk
//!
//! Files start with four header lines (device name, signal name, raw or
//! calibrated, units) followed by `timestamp, ax, ay, az, gx, gy, gz` rows.
//! Headers are carried through every derived file verbatim, line endings
//! included.

use csv::{ReaderBuilder, Trim, WriterBuilder};
use gait_core::{AxisMap, GaitError, GaitResult, ImuSample, SensorStream};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Header lines before the first data row
pub const HEADER_LINES: usize = 4;

/// Timestamp plus six channels
const ROW_FIELDS: usize = 7;

fn read_text(path: &Path) -> GaitResult<String> {
    fs::read_to_string(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => GaitError::MissingInputFile {
            path: path.display().to_string(),
        },
        _ => GaitError::io(path.display().to_string(), e),
    })
}

/// Read a sensor table, keeping its header lines
pub fn read_stream(path: &Path) -> GaitResult<SensorStream> {
    let text = read_text(path)?;
    let mut lines = text.split_inclusive('\n');

    // A CRLF header keeps its '\r' so it is written back unchanged
    let header: Vec<String> = lines
        .by_ref()
        .take(HEADER_LINES)
        .map(|line| line.strip_suffix('\n').unwrap_or(line).to_string())
        .collect();
    if header.len() < HEADER_LINES {
        return Err(GaitError::parse(
            path.display().to_string(),
            format!("expected {} header lines, found {}", HEADER_LINES, header.len()),
        ));
    }

    let body: String = lines.collect();
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(body.as_bytes());

    let mut samples = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let row = idx + HEADER_LINES + 1;
        let context = || format!("{} row {}", path.display(), row);
        let record = result.map_err(|e| GaitError::parse(context(), e))?;

        if record.iter().all(|field| field.is_empty()) {
            continue;
        }
        // Empty trailing fields come from a trailing separator
        let columns = record.len() - record.iter().rev().take_while(|field| field.is_empty()).count();
        if columns != ROW_FIELDS {
            return Err(GaitError::parse(
                context(),
                format!("expected {} columns, found {}", ROW_FIELDS, columns),
            ));
        }

        let mut values = [0.0; ROW_FIELDS];
        for (value, field) in values.iter_mut().zip(record.iter()) {
            *value = field
                .parse()
                .map_err(|e| GaitError::parse(context(), format!("'{}': {}", field, e)))?;
        }
        samples.push(ImuSample::new(
            values[0],
            [values[1], values[2], values[3]],
            [values[4], values[5], values[6]],
        ));
    }

    SensorStream::new(samples, header).map_err(|e| match e {
        GaitError::InvalidStream { reason } => GaitError::InvalidStream {
            reason: format!("{}: {}", path.display(), reason),
        },
        other => other,
    })
}

/// Write a sensor table: the stream's header lines, then one row per sample
pub fn write_stream(path: &Path, stream: &SensorStream) -> GaitResult<()> {
    let ctx = || path.display().to_string();
    let file = File::create(path).map_err(|e| GaitError::io(ctx(), e))?;
    let mut out = BufWriter::new(file);

    for line in stream.header() {
        writeln!(out, "{}", line).map_err(|e| GaitError::io(ctx(), e))?;
    }

    let mut writer = WriterBuilder::new().has_headers(false).from_writer(out);
    for sample in stream.samples() {
        let mut row = Vec::with_capacity(ROW_FIELDS);
        row.push(sample.timestamp.to_string());
        row.extend(sample.values().iter().map(|v| v.to_string()));
        writer.write_record(&row).map_err(|e| GaitError::io(ctx(), e))?;
    }
    writer.flush().map_err(|e| GaitError::io(ctx(), e))
}

/// Read an axis map table with rows `axis, orig_axis_label, sign_modifier`.
///
/// A leading row whose first field is `axis` is taken as a column header.
pub fn read_axis_map(path: &Path) -> GaitResult<AxisMap> {
    let text = read_text(path)?;
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(text.as_bytes());

    let mut rows: Vec<[String; 3]> = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let record = result.map_err(|e| GaitError::parse(format!("{} row {}", path.display(), idx + 1), e))?;
        if record.iter().all(|field| field.is_empty()) {
            continue;
        }
        if idx == 0 && record[0].eq_ignore_ascii_case("axis") {
            continue;
        }
        if record.len() < 3 {
            return Err(GaitError::InvalidAxisMap {
                reason: format!("{} row {}: expected 3 columns", path.display(), idx + 1),
            });
        }
        rows.push([record[0].to_string(), record[1].to_string(), record[2].to_string()]);
    }

    AxisMap::from_text_rows(rows.iter().map(|[a, b, c]| [a.as_str(), b.as_str(), c.as_str()]))
}

/// Write an axis map table with a column header row
pub fn write_axis_map(path: &Path, map: &AxisMap) -> GaitResult<()> {
    let ctx = || path.display().to_string();
    let mut writer = WriterBuilder::new()
        .from_path(path)
        .map_err(|e| GaitError::io(ctx(), e))?;

    writer
        .write_record(["axis", "orig_axis_label", "sign_modifier"])
        .map_err(|e| GaitError::io(ctx(), e))?;
    for entry in map.entries() {
        writer
            .write_record([
                entry.target.label().to_string(),
                entry.source.label().to_string(),
                format!("{:+}", entry.sign as i32),
            ])
            .map_err(|e| GaitError::io(ctx(), e))?;
    }
    writer.flush().map_err(|e| GaitError::io(ctx(), e))
}

/// Write text notes, one entry per line
pub fn write_notes(path: &Path, lines: &[String]) -> GaitResult<()> {
    let mut text = lines.join("\n");
    text.push('\n');
    fs::write(path, text).map_err(|e| GaitError::io(path.display().to_string(), e))
}
