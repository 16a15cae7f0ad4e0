//! Result set exports.
//!
//! JSON is the lossless format: a [`ResultSet`] written with
//! [`export_json`] reads back with [`import_json`] unchanged. CSV flattens
//! every record to one row of `processor,offset,type,value`, where vector
//! components are joined with `;` and segments are written as
//! `duration;label`.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use cadence_core::{ResultSet, ResultValue};

use crate::Result;

/// CSV header row.
pub const CSV_HEADER: &str = "processor,offset,type,value";

/// Writes `results` as pretty-printed JSON.
pub fn write_json<W: Write>(results: &ResultSet, writer: W) -> Result<()> {
    serde_json::to_writer_pretty(writer, results)?;
    Ok(())
}

/// Writes `results` as JSON to `path`.
pub fn export_json<P: AsRef<Path>>(results: &ResultSet, path: P) -> Result<()> {
    let path = path.as_ref();
    let mut writer = BufWriter::new(File::create(path)?);
    write_json(results, &mut writer)?;
    writer.flush()?;
    tracing::debug!(path = %path.display(), containers = results.len(), "exported json");
    Ok(())
}

/// Reads a result set previously written by [`export_json`].
pub fn import_json<P: AsRef<Path>>(path: P) -> Result<ResultSet> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

/// Writes `results` as CSV, one row per record.
pub fn write_csv<W: Write>(results: &ResultSet, mut writer: W) -> Result<()> {
    writeln!(writer, "{CSV_HEADER}")?;
    for (processor, record) in results.records() {
        let (kind, value) = match &record.value {
            ResultValue::Scalar(v) => ("scalar", v.to_string()),
            ResultValue::Vector(values) => (
                "vector",
                values
                    .iter()
                    .map(f64::to_string)
                    .collect::<Vec<_>>()
                    .join(";"),
            ),
            ResultValue::Segment { duration, label } => ("segment", format!("{duration};{label}")),
        };
        writeln!(
            writer,
            "{},{},{kind},{}",
            csv_field(processor.as_str()),
            record.offset,
            csv_field(&value)
        )?;
    }
    Ok(())
}

/// Writes `results` as CSV to `path`.
pub fn export_csv<P: AsRef<Path>>(results: &ResultSet, path: P) -> Result<()> {
    let path = path.as_ref();
    let mut writer = BufWriter::new(File::create(path)?);
    write_csv(results, &mut writer)?;
    writer.flush()?;
    tracing::debug!(path = %path.display(), containers = results.len(), "exported csv");
    Ok(())
}

/// Quotes a field containing separators or quotes.
fn csv_field(field: &str) -> String {
    if field.contains([',', '"', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
