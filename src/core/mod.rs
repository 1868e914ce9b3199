//! Core data types, the device boundary and recording I/O.

pub mod device;
pub mod loaders;
pub mod types;
pub mod writers;

pub use device::{DeviceError, DeviceSession, RangefinderDevice};
pub use loaders::{find_recordings, load_recording, LoaderError};
pub use types::{CartesianPoint, Detection, Direction, Measurement, RawSample, SizeClass};
pub use writers::{write_objects_csv, write_recording, ObjectRecord, WriteError};
