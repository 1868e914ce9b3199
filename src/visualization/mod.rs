//! Visualization of a single sweep.
//!
//! Renders the field-of-view points as a 2D scatter plot (x vs y, millimetres)
//! using the plotters library, with each merged cluster in its own color.

use std::path::Path;

use plotters::prelude::*;
use plotters_bitmap::BitMapBackend;
use thiserror::Error;

use crate::config::DetectionConfig;
use crate::core::types::RawSample;
use crate::processors::analysis::merged_clusters;
use crate::processors::cartesian::map_points;
use crate::processors::filtering::filter_field_of_view;

/// Errors that can occur during visualization.
#[derive(Error, Debug)]
pub enum VisualizationError {
    #[error("Plotting error: {0}")]
    PlottingError(String),

    #[error("No samples in the field of view")]
    EmptySweep,
}

/// Result type for visualization operations.
pub type Result<T> = std::result::Result<T, VisualizationError>;

/// Default plot width in pixels.
const DEFAULT_WIDTH: u32 = 1024;

/// Default plot height in pixels.
const DEFAULT_HEIGHT: u32 = 768;

/// Color palette for cluster visualization.
const CLUSTER_COLORS: &[(u8, u8, u8)] = &[
    (228, 26, 28),   // Red
    (55, 126, 184),  // Blue
    (77, 175, 74),   // Green
    (152, 78, 163),  // Purple
    (255, 127, 0),   // Orange
    (166, 86, 40),   // Brown
    (247, 129, 191), // Pink
    (0, 206, 209),   // Turquoise
];

/// Color for in-view points that ended up in no cluster.
const NOISE_COLOR: (u8, u8, u8) = (160, 160, 160);

/// Plot one sweep's field-of-view points, colored by merged cluster.
///
/// The sensor sits at the origin and is drawn as a black cross.
pub fn plot_sweep(output_path: &Path, samples: &[RawSample], config: &DetectionConfig) -> Result<()> {
    let fov = filter_field_of_view(samples);
    if fov.is_empty() {
        return Err(VisualizationError::EmptySweep);
    }

    let noise: Vec<(f64, f64)> = map_points(&fov).iter().map(|p| (p.x, p.y)).collect();
    let clusters: Vec<Vec<(f64, f64)>> = merged_clusters(samples, config)
        .iter()
        .map(|c| c.points().iter().map(|p| (p.x, p.y)).collect())
        .collect();

    let (x_min, x_max, y_min, y_max) = compute_bounds(&noise);
    let x_padding = (x_max - x_min) * 0.05;
    let y_padding = (y_max - y_min) * 0.05;

    let plot_err = |e: &dyn std::fmt::Display| VisualizationError::PlottingError(e.to_string());

    let root = BitMapBackend::new(output_path, (DEFAULT_WIDTH, DEFAULT_HEIGHT)).into_drawing_area();
    root.fill(&WHITE).map_err(|e| plot_err(&e))?;

    let mut chart = ChartBuilder::on(&root)
        .margin(10)
        .build_cartesian_2d(
            (x_min - x_padding)..(x_max + x_padding),
            (y_min - y_padding)..(y_max + y_padding),
        )
        .map_err(|e| plot_err(&e))?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .disable_y_mesh()
        .draw()
        .map_err(|e| plot_err(&e))?;

    let noise_color = RGBColor(NOISE_COLOR.0, NOISE_COLOR.1, NOISE_COLOR.2);
    chart
        .draw_series(noise.iter().map(|&(x, y)| Circle::new((x, y), 2, noise_color.filled())))
        .map_err(|e| plot_err(&e))?;

    for (idx, points) in clusters.iter().enumerate() {
        let c = CLUSTER_COLORS[idx % CLUSTER_COLORS.len()];
        let color = RGBColor(c.0, c.1, c.2);
        chart
            .draw_series(points.iter().map(|&(x, y)| Circle::new((x, y), 4, color.filled())))
            .map_err(|e| plot_err(&e))?;
    }

    chart
        .draw_series(std::iter::once(Cross::new((0.0, 0.0), 6, BLACK.stroke_width(2))))
        .map_err(|e| plot_err(&e))?;

    root.present().map_err(|e| plot_err(&e))?;

    Ok(())
}

/// Bounds of the points plus the origin.
fn compute_bounds(points: &[(f64, f64)]) -> (f64, f64, f64, f64) {
    let mut x_min = 0.0_f64;
    let mut x_max = 0.0_f64;
    let mut y_min = 0.0_f64;
    let mut y_max = 0.0_f64;

    for &(x, y) in points {
        x_min = x_min.min(x);
        x_max = x_max.max(x);
        y_min = y_min.min(y);
        y_max = y_max.max(y);
    }

    if (x_max - x_min).abs() < f64::EPSILON {
        x_min -= 1.0;
        x_max += 1.0;
    }
    if (y_max - y_min).abs() < f64::EPSILON {
        y_min -= 1.0;
        y_max += 1.0;
    }

    (x_min, x_max, y_min, y_max)
}
