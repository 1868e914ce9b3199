//! Sample, point and detection types shared across the pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One record pulled from the rangefinder stream.
///
/// `quality` is carried for recordings but ignored by detection. `new_scan` is
/// the device's own start-of-rotation flag, used only by
/// [`StartFlagBoundary`](crate::processors::ingest::StartFlagBoundary).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    #[serde(default)]
    pub new_scan: bool,
    #[serde(default)]
    pub quality: u8,
    pub angle_deg: f64,
    pub distance_mm: f64,
}

impl Measurement {
    /// Creates a measurement with no quality and no scan-start flag.
    pub fn new(angle_deg: f64, distance_mm: f64) -> Self {
        Self {
            new_scan: false,
            quality: 0,
            angle_deg,
            distance_mm,
        }
    }
}

/// An accepted sample with its angle normalized to [0, 360).
///
/// After the field-of-view filter the same type doubles as the filtered point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawSample {
    pub angle_deg: f64,
    pub distance_mm: f64,
}

impl RawSample {
    pub fn new(angle_deg: f64, distance_mm: f64) -> Self {
        Self {
            angle_deg,
            distance_mm,
        }
    }
}

/// A filtered sample together with its Cartesian position in millimetres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CartesianPoint {
    pub angle_deg: f64,
    pub distance_mm: f64,
    pub x: f64,
    pub y: f64,
}

impl CartesianPoint {
    /// Euclidean distance to another point.
    #[inline]
    pub fn distance_to(&self, other: &CartesianPoint) -> f64 {
        euclidean_distance((self.x, self.y), (other.x, other.y))
    }
}

/// Euclidean distance between two planar positions.
#[inline]
pub fn euclidean_distance(a: (f64, f64), b: (f64, f64)) -> f64 {
    let dx = a.0 - b.0;
    let dy = a.1 - b.1;
    (dx * dx + dy * dy).sqrt()
}

/// Size class assigned from the estimated physical width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeClass {
    Small,
    Big,
}

impl fmt::Display for SizeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SizeClass::Small => write!(f, "small"),
            SizeClass::Big => write!(f, "big"),
        }
    }
}

/// Bearing of an object relative to straight ahead, in whole degrees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Left(u32),
    Right(u32),
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Left(deg) => write!(f, "{} degrees left", deg),
            Direction::Right(deg) => write!(f, "{} degrees right", deg),
        }
    }
}

/// A small, near object reported to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub width_mm: i64,
    pub distance_mm: i64,
    /// Center bearing rounded to 0.1 degree
    pub angle_center_deg: f64,
    pub size_class: SizeClass,
}

impl fmt::Display for Detection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} object, {} mm wide at {} mm, center {:.1} deg",
            self.size_class, self.width_mm, self.distance_mm, self.angle_center_deg
        )
    }
}
