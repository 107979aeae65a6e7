//! # PTC Tools
//!
//! Samples the photon transfer curve of a camera: a dark pass followed by a
//! log-spaced sweep of exposures, each reduced to per-pixel temporal mean and
//! standard deviation images plus one row of scalar statistics.
//!
//! ## Crate Structure
//!
//! - **`config`**: sweep, camera, logging and output settings loaded with `figment`.
//! - **`error`**: the `PtcError` enum shared by every module.
//! - **`hardware`**: capability traits for cameras, the `Frame` type and a mock camera.
//! - **`logging`**: `tracing` subscriber setup.
//! - **`operator`**: confirmation gates (terminal prompt, auto-confirm, scripted).
//! - **`presentation`**: sinks receiving sweep events (console, CSV, channel).
//! - **`ptc`**: schedule, statistics, reduction, acquisition and the sweep driver.

pub mod config;
pub mod error;
pub mod hardware;
pub mod logging;
pub mod operator;
pub mod presentation;
pub mod ptc;

pub use error::{PtcError, PtcResult};
