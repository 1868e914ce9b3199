//! Concrete rangefinder sources.

pub mod replay;
pub mod synthetic;

pub use replay::ReplayDevice;
pub use synthetic::{SimulatedObject, SyntheticRangefinder};
