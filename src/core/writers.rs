//! CSV writers for recordings and per-object analysis results.

use std::fs;
use std::path::Path;

use serde::Serialize;
use thiserror::Error;

use super::types::{Measurement, SizeClass};
use crate::processors::classify::ClassifiedObject;

/// Errors that can occur during write operations.
#[derive(Error, Debug)]
pub enum WriteError {
    /// Failed to create parent directories.
    #[error("failed to create parent directories for '{path}': {source}")]
    CreateDirectory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// CSV writing error.
    #[error("CSV write error for '{path}': {source}")]
    CsvError {
        path: String,
        #[source]
        source: csv::Error,
    },

    /// Failed to flush data to file.
    #[error("failed to write to file '{path}': {source}")]
    WriteFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for write operations.
pub type Result<T> = std::result::Result<T, WriteError>;

/// One classified object, flattened for CSV output.
#[derive(Debug, Clone, Serialize)]
pub struct ObjectRecord {
    pub source: String,
    pub sweep: usize,
    pub object: usize,
    pub points: usize,
    pub span_deg: f64,
    pub center_angle_deg: f64,
    pub avg_distance_mm: f64,
    pub closest_mm: f64,
    pub width_mm: f64,
    pub size_class: SizeClass,
    pub direction: String,
    pub qualifies: bool,
}

impl ObjectRecord {
    pub fn new(source: &str, sweep: usize, object: usize, classified: &ClassifiedObject, qualifies: bool) -> Self {
        let shape = &classified.shape;
        Self {
            source: source.to_string(),
            sweep,
            object,
            points: shape.point_count,
            span_deg: shape.span_deg,
            center_angle_deg: shape.center_angle_deg,
            avg_distance_mm: shape.avg_distance_mm,
            closest_mm: shape.closest_mm,
            width_mm: shape.width_mm,
            size_class: classified.size_class,
            direction: classified.direction.to_string(),
            qualifies,
        }
    }
}

/// Creates parent directories for a file path if they don't exist.
fn ensure_parent_dirs(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| WriteError::CreateDirectory {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
    }
    Ok(())
}

fn write_rows<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    ensure_parent_dirs(path)?;
    let path_str = path.display().to_string();

    let mut writer = csv::Writer::from_path(path).map_err(|e| WriteError::CsvError {
        path: path_str.clone(),
        source: e,
    })?;

    for row in rows {
        writer.serialize(row).map_err(|e| WriteError::CsvError {
            path: path_str.clone(),
            source: e,
        })?;
    }

    writer.flush().map_err(|e| WriteError::WriteFile {
        path: path_str,
        source: e,
    })?;

    Ok(())
}

/// Write measurements in the format read by
/// [`load_recording`](super::loaders::load_recording).
pub fn write_recording(path: &Path, measurements: &[Measurement]) -> Result<()> {
    write_rows(path, measurements)
}

/// Write per-object analysis rows.
pub fn write_objects_csv(path: &Path, records: &[ObjectRecord]) -> Result<()> {
    write_rows(path, records)
}
