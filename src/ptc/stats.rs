//! Scalar statistics over per-frame spatial means.

use serde::{Deserialize, Serialize};

use crate::hardware::Frame;

/// Arithmetic mean. Callers guarantee at least one value.
pub fn avg(values: &[f64]) -> f64 {
    let sum: f64 = values.iter().sum();
    sum / values.len() as f64
}

/// Sample standard deviation around `avg` (divisor `n - 1`).
///
/// Defined as exactly 0 when fewer than two values are given.
pub fn std_dev(values: &[f64], avg: f64) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let sum_sq: f64 = values.iter().map(|v| (v - avg) * (v - avg)).sum();
    (sum_sq / (values.len() - 1) as f64).sqrt()
}

/// Mean of all pixels in a frame.
pub fn spatial_mean(frame: &Frame) -> f64 {
    frame.mean()
}

/// Mean and spread of a set of scalar samples.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScalarStats {
    /// Arithmetic mean
    pub mean: f64,
    /// Sample standard deviation, 0 for a single sample
    pub std_dev: f64,
}

impl ScalarStats {
    /// Statistics of `values`; `values` must not be empty.
    pub fn from_values(values: &[f64]) -> Self {
        let mean = avg(values);
        Self {
            mean,
            std_dev: std_dev(values, mean),
        }
    }

    /// Statistics of the per-frame spatial means.
    ///
    /// The spread reflects frame-to-frame intensity changes, i.e. light source
    /// stability, not pixel noise.
    pub fn of_frames(frames: &[Frame]) -> Self {
        let means: Vec<f64> = frames.iter().map(spatial_mean).collect();
        Self::from_values(&means)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_value_has_zero_spread() {
        for x in [0.0, -3.5, 1.0e12] {
            assert_eq!(std_dev(&[x], x), 0.0);
            let stats = ScalarStats::from_values(&[x]);
            assert_eq!(stats.mean, x);
            assert_eq!(stats.std_dev, 0.0);
        }
    }

    #[test]
    fn known_values() {
        let values = [2.0, 4.0, 6.0];
        assert_eq!(avg(&values), 4.0);
        assert_eq!(std_dev(&values, 4.0), 2.0);
    }

    #[test]
    fn repeated_evaluation_is_identical() {
        let values = [1.5, 9.25, 3.0, 3.0, 7.75];
        let first = ScalarStats::from_values(&values);
        let second = ScalarStats::from_values(&values);
        assert_eq!(first, second);
        assert_eq!(values, [1.5, 9.25, 3.0, 3.0, 7.75]);
    }

    #[test]
    fn frame_statistics_use_spatial_means() {
        let frames = vec![
            Frame::from_u16(2, 1, &[1, 3]),
            Frame::from_u16(2, 1, &[3, 5]),
            Frame::from_u16(2, 1, &[5, 7]),
        ];
        let stats = ScalarStats::of_frames(&frames);
        assert_eq!(stats.mean, 4.0);
        assert_eq!(stats.std_dev, 2.0);
    }
}
