//! Record sink: CSV and JSON files
//!
//! Columns follow the schema order. The sentinel is an empty CSV cell and a
//! JSON `null`; list fields are JSON array text in CSV and arrays in JSON.

#![allow(clippy::uninlined_format_args)]

use std::fmt;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tracing::info;
use url::Url;

use crate::domain::{Record, Schema};

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("I/O error writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown output format '{0}' (expected csv or json)")]
    UnknownFormat(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Csv,
    Json,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            other => Err(ExportError::UnknownFormat(other.to_string())),
        }
    }
}

/// Header row in schema order, then one row per record
pub fn write_csv<W: Write>(writer: W, schema: &Schema, records: &[Record]) -> Result<(), ExportError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(schema.fields())?;
    for record in records {
        csv_writer.write_record(record.to_row())?;
    }
    csv_writer.flush().map_err(csv::Error::from)?;
    Ok(())
}

/// A JSON array of objects keyed in schema order
pub fn write_json<W: Write>(writer: W, records: &[Record]) -> Result<(), ExportError> {
    serde_json::to_writer_pretty(writer, records)?;
    Ok(())
}

/// Write `records` to `{directory}/{stem}.{ext}`, creating the directory
pub fn export(
    directory: &Path,
    stem: &str,
    format: OutputFormat,
    schema: &Schema,
    records: &[Record],
) -> Result<PathBuf, ExportError> {
    fs::create_dir_all(directory).map_err(|source| ExportError::Io {
        path: directory.to_path_buf(),
        source,
    })?;

    let path = directory.join(format!("{}.{}", stem, format.extension()));
    let file = File::create(&path).map_err(|source| ExportError::Io {
        path: path.clone(),
        source,
    })?;
    let mut writer = BufWriter::new(file);

    match format {
        OutputFormat::Csv => write_csv(&mut writer, schema, records)?,
        OutputFormat::Json => write_json(&mut writer, records)?,
    }
    writer.flush().map_err(|source| ExportError::Io {
        path: path.clone(),
        source,
    })?;

    info!("💾 Wrote {} records to {}", records.len(), path.display());
    Ok(path)
}

/// File stem for a collection URL: its path segments joined by `_`
pub fn collection_stem(collection_url: &str) -> String {
    let stem = Url::parse(collection_url)
        .ok()
        .and_then(|url| {
            let segments: Vec<String> = url
                .path_segments()?
                .filter(|segment| !segment.is_empty())
                .map(sanitize)
                .collect();
            (!segments.is_empty()).then(|| segments.join("_"))
        })
        .unwrap_or_else(|| sanitize(collection_url));

    if stem.is_empty() { "collection".to_string() } else { stem }
}

fn sanitize(segment: &str) -> String {
    segment
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect::<String>()
        .trim_matches('_')
        .to_string()
}
