//! Photon transfer curve sampling.
//!
//! - `schedule`: log-spaced exposure schedule
//! - `stats`: scalar statistics over per-frame spatial means
//! - `reduction`: bursts and their per-pixel temporal mean / standard deviation
//! - `acquisition`: burst capture with a bounded wait per frame
//! - `results`: results table, image stack and report
//! - `sweep`: the dark pass plus exposure sweep state machine

pub mod acquisition;
pub mod reduction;
pub mod results;
pub mod schedule;
pub mod stats;
pub mod sweep;

pub use acquisition::{acquire_burst, BurstRequest};
pub use reduction::{reduce, Burst, FloatImage, ReducedPair};
pub use results::{ImageStack, SweepOutcome, SweepRecord, SweepReport, SweepResult};
pub use schedule::ExposureSchedule;
pub use stats::ScalarStats;
pub use sweep::{Pass, PassResult, SweepDriver, SweepEvent, SweepState};
