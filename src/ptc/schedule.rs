//! Log-spaced exposure schedule.

use serde::Serialize;

use crate::error::{PtcError, PtcResult};

/// Exposures of a sweep, geometrically spaced between two bounds inclusive.
///
/// Always strictly increasing with at least two entries; the first entry is
/// exactly the minimum and the last exactly the maximum.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExposureSchedule {
    exposures: Vec<f64>,
}

impl ExposureSchedule {
    /// `exposures[i] = exp(ln(min) + i * (ln(max) - ln(min)) / (count - 1))`
    ///
    /// # Errors
    /// `InvalidConfiguration` if `min <= 0`, `max <= min`, `count < 2` or either
    /// bound is not finite.
    pub fn log_spaced(min: f64, max: f64, count: usize) -> PtcResult<Self> {
        if !min.is_finite() || !max.is_finite() {
            return Err(PtcError::InvalidConfiguration(format!(
                "exposure bounds must be finite, got [{min}, {max}]"
            )));
        }
        if min <= 0.0 {
            return Err(PtcError::InvalidConfiguration(format!(
                "minimum exposure must be positive, got {min}"
            )));
        }
        if max <= min {
            return Err(PtcError::InvalidConfiguration(format!(
                "maximum exposure {max} must exceed minimum exposure {min}"
            )));
        }
        if count < 2 {
            return Err(PtcError::InvalidConfiguration(format!(
                "need at least 2 exposures, got {count}"
            )));
        }

        let min_log = min.ln();
        let step = (max.ln() - min_log) / (count - 1) as f64;
        let mut exposures: Vec<f64> = (0..count)
            .map(|i| (min_log + i as f64 * step).exp())
            .collect();
        // exp(ln(x)) is not always x
        exposures[0] = min;
        exposures[count - 1] = max;

        Ok(Self { exposures })
    }

    /// Number of exposures.
    pub fn len(&self) -> usize {
        self.exposures.len()
    }

    /// Never true for a constructed schedule.
    pub fn is_empty(&self) -> bool {
        self.exposures.is_empty()
    }

    /// Exposures in sweep order.
    pub fn as_slice(&self) -> &[f64] {
        &self.exposures
    }

    /// Iterate over exposures in sweep order.
    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.exposures.iter().copied()
    }

    /// Shortest exposure.
    pub fn first(&self) -> f64 {
        self.exposures[0]
    }

    /// Longest exposure.
    pub fn last(&self) -> f64 {
        self.exposures[self.exposures.len() - 1]
    }
}
