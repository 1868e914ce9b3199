//! Loaders for recorded rangefinder measurement streams.
//!
//! A recording is a CSV file with a header row. Column names are matched
//! case-insensitively:
//! - `angle_deg` (or `angle`), required
//! - `distance_mm` (or `distance`), required
//! - `quality`, optional
//! - `new_scan`, optional (`true`/`false` or `1`/`0`)

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord};
use thiserror::Error;

use super::types::Measurement;

/// Errors that can occur during recording loading.
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Empty recording: {0}")]
    EmptyFile(PathBuf),

    #[error("Missing required columns: {0}")]
    MissingColumns(String),

    #[error("Parse error on row {row}: {message}")]
    ParseError { row: usize, message: String },
}

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, LoaderError>;

struct Columns {
    angle: usize,
    distance: usize,
    quality: Option<usize>,
    new_scan: Option<usize>,
}

impl Columns {
    fn from_headers(headers: &StringRecord) -> Result<Self> {
        let col_map: HashMap<String, usize> = headers
            .iter()
            .enumerate()
            .map(|(i, name)| (name.trim().to_lowercase(), i))
            .collect();

        let find = |names: &[&str]| names.iter().find_map(|n| col_map.get(*n).copied());

        let angle = find(&["angle_deg", "angle"]);
        let distance = find(&["distance_mm", "distance"]);

        match (angle, distance) {
            (Some(angle), Some(distance)) => Ok(Self {
                angle,
                distance,
                quality: find(&["quality"]),
                new_scan: find(&["new_scan"]),
            }),
            (None, _) => Err(LoaderError::MissingColumns("angle_deg".to_string())),
            (_, None) => Err(LoaderError::MissingColumns("distance_mm".to_string())),
        }
    }
}

fn parse_field<T: std::str::FromStr>(record: &StringRecord, idx: usize, row: usize, name: &str) -> Result<T> {
    let raw = record.get(idx).map(str::trim).unwrap_or("");
    raw.parse().map_err(|_| LoaderError::ParseError {
        row,
        message: format!("invalid {} '{}'", name, raw),
    })
}

fn parse_flag(record: &StringRecord, idx: usize, row: usize) -> Result<bool> {
    match record.get(idx).map(|s| s.trim().to_lowercase()).as_deref() {
        None | Some("") | Some("0") | Some("false") => Ok(false),
        Some("1") | Some("true") => Ok(true),
        Some(other) => Err(LoaderError::ParseError {
            row,
            message: format!("invalid new_scan '{}'", other),
        }),
    }
}

/// Load a recorded measurement stream from CSV.
///
/// # Errors
///
/// Returns an error if the file cannot be read, lacks the angle or distance
/// column, contains an unparsable value, or has no data rows.
pub fn load_recording<P: AsRef<Path>>(path: P) -> Result<Vec<Measurement>> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(BufReader::new(file));

    let columns = Columns::from_headers(reader.headers()?)?;
    let mut measurements = Vec::with_capacity(4096);

    for (i, result) in reader.records().enumerate() {
        let record = result?;
        let row = i + 1;

        let quality = match columns.quality {
            Some(idx) => parse_field::<u8>(&record, idx, row, "quality")?,
            None => 0,
        };
        let new_scan = match columns.new_scan {
            Some(idx) => parse_flag(&record, idx, row)?,
            None => false,
        };

        measurements.push(Measurement {
            new_scan,
            quality,
            angle_deg: parse_field(&record, columns.angle, row, "angle")?,
            distance_mm: parse_field(&record, columns.distance, row, "distance")?,
        });
    }

    if measurements.is_empty() {
        return Err(LoaderError::EmptyFile(path.to_path_buf()));
    }

    Ok(measurements)
}

/// List `.csv` recordings in a directory, sorted by path.
pub fn find_recordings(directory: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(directory)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .map(|ext| ext.eq_ignore_ascii_case("csv"))
                .unwrap_or(false)
        })
        .collect();

    files.sort();
    Ok(files)
}
