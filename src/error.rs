//! Custom error types for the application.
//!
//! This module defines the primary error type, `PtcError`. Using the `thiserror`
//! crate, it provides a centralized and consistent way to handle the failures a
//! photon transfer sweep can run into.
//!
//! ## Error Hierarchy
//!
//! - **`InvalidConfiguration`**: bad exposure bounds, counts or frame numbers. Always
//!   reported before any acquisition starts.
//! - **`Acquisition`**: the camera refused an exposure, failed to start or stalled
//!   mid-burst. Aborts the remaining sweep; see [`AcquisitionFailure`].
//! - **`Reduction`**: a burst could not be reduced (empty, mismatched frames,
//!   malformed buffers). Aborts the current pass.
//! - **`Config`**: wraps errors from `figment` while loading configuration files.
//! - **`Io`**, **`Csv`**, **`Json`**, **`Presentation`**: output errors from the
//!   presentation sinks. A failing sink fails the sweep.
//!
//! None of these is retried automatically. By using `#[from]`, `PtcError` can be
//! created from underlying error types with the `?` operator.

use std::time::Duration;
use thiserror::Error;

/// Convenience alias for results using the application error type.
pub type PtcResult<T> = std::result::Result<T, PtcError>;

#[derive(Error, Debug)]
pub enum PtcError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Acquisition failure: {0}")]
    Acquisition(#[from] AcquisitionFailure),

    #[error("Reduction failure: {0}")]
    Reduction(String),

    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "storage_csv")]
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Presentation error: {0}")]
    Presentation(String),

    #[error("Feature '{0}' is not enabled. Please build with --features {0}")]
    FeatureNotEnabled(String),
}

impl From<figment::Error> for PtcError {
    fn from(value: figment::Error) -> Self {
        PtcError::Config(Box::new(value))
    }
}

/// Why a burst could not be acquired.
#[derive(Error, Debug)]
pub enum AcquisitionFailure {
    #[error("camera rejected exposure {exposure}s: {reason}")]
    ExposureRejected { exposure: f64, reason: String },

    #[error("camera hardware error: {0}")]
    Hardware(String),

    #[error("timed out after {waited:?} waiting for frame {received} of {expected}")]
    Timeout {
        waited: Duration,
        received: usize,
        expected: usize,
    },

    #[error("sequence ended after {received} of {expected} frames")]
    ShortSequence { received: usize, expected: usize },
}

impl PtcError {
    /// Short label for the error class, used in logs and reports.
    pub fn kind(&self) -> &'static str {
        match self {
            PtcError::InvalidConfiguration(_) | PtcError::Config(_) => "InvalidConfiguration",
            PtcError::Acquisition(_) => "AcquisitionFailure",
            PtcError::Reduction(_) => "ReductionFailure",
            _ => "OutputFailure",
        }
    }
}
