//! Camera abstraction consumed by the sweep.
//!
//! - `capabilities`: async capability traits (`ExposureControl`, `SequenceAcquisition`, `Camera`)
//! - `frame`: raw single-channel frames
//! - `mock`: simulated camera for development and tests

pub mod capabilities;
pub mod frame;
pub mod mock;

pub use capabilities::{Camera, ExposureControl, SequenceAcquisition};
pub use frame::{Frame, FrameMetadata};
