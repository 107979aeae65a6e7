//! Temporal reduction of a burst into per-pixel mean and standard deviation images.

use serde::Serialize;

use crate::error::{PtcError, PtcResult};
use crate::hardware::Frame;
use crate::ptc::stats::ScalarStats;

/// Frames captured at one exposure, in acquisition order.
///
/// Construction checks that the burst is non-empty and that every frame is
/// well formed and shares width, height and bit depth with the first one. The
/// frames cannot be modified afterwards.
#[derive(Debug, Clone)]
pub struct Burst {
    exposure_s: f64,
    frames: Vec<Frame>,
}

impl Burst {
    /// Build a burst from frames captured at `exposure_s`.
    pub fn new(exposure_s: f64, frames: Vec<Frame>) -> PtcResult<Self> {
        let first = frames
            .first()
            .ok_or_else(|| PtcError::Reduction("burst contains no frames".into()))?;

        for (index, frame) in frames.iter().enumerate() {
            if !frame.is_well_formed() {
                return Err(PtcError::Reduction(format!(
                    "frame {index} is malformed ({}x{} @ {} bit, {} bytes)",
                    frame.width,
                    frame.height,
                    frame.bit_depth,
                    frame.data.len()
                )));
            }
            if !frame.same_shape(first) {
                return Err(PtcError::Reduction(format!(
                    "frame {index} is {}x{} @ {} bit, burst is {}x{} @ {} bit",
                    frame.width,
                    frame.height,
                    frame.bit_depth,
                    first.width,
                    first.height,
                    first.bit_depth
                )));
            }
        }

        Ok(Self { exposure_s, frames })
    }

    /// Exposure the burst was captured at, seconds.
    pub fn exposure_s(&self) -> f64 {
        self.exposure_s
    }

    /// Frames in acquisition order; the index is the temporal index.
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Number of frames.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Never true for a constructed burst.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Frame width in pixels.
    pub fn width(&self) -> u32 {
        self.frames[0].width
    }

    /// Frame height in pixels.
    pub fn height(&self) -> u32 {
        self.frames[0].height
    }

    /// Bit depth shared by all frames.
    pub fn bit_depth(&self) -> u32 {
        self.frames[0].bit_depth
    }

    /// Mean and spread of the per-frame spatial means.
    pub fn frame_statistics(&self) -> ScalarStats {
        ScalarStats::of_frames(&self.frames)
    }
}

/// Single-precision image, row-major.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FloatImage {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Pixel values, `width * height` entries
    pub data: Vec<f32>,
}

impl FloatImage {
    /// Pixel at (x, y).
    pub fn get(&self, x: u32, y: u32) -> Option<f32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.data.get((y * self.width + x) as usize).copied()
    }

    /// Mean over all pixels.
    pub fn mean(&self) -> f64 {
        if self.data.is_empty() {
            return 0.0;
        }
        self.data.iter().map(|&v| v as f64).sum::<f64>() / self.data.len() as f64
    }

    /// Smallest and largest pixel value.
    pub fn min_max(&self) -> Option<(f32, f32)> {
        self.data.iter().fold(None, |acc, &v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
    }
}

/// Per-pixel temporal mean and standard deviation of a burst.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReducedPair {
    /// Temporal mean per pixel
    pub mean: FloatImage,
    /// Temporal sample standard deviation per pixel (0 for single-frame bursts)
    pub std_dev: FloatImage,
}

/// Reduce a burst pixel-wise over time.
///
/// The mean divides by `n`, the standard deviation by `n - 1`; a single-frame
/// burst has a standard deviation image of zeros. Accumulates in `f64`.
#[tracing::instrument(skip(burst), fields(frames = burst.len(), exposure = burst.exposure_s()))]
pub fn reduce(burst: &Burst) -> PtcResult<ReducedPair> {
    let (width, height) = (burst.width(), burst.height());
    let pixel_count = width as usize * height as usize;
    let n = burst.len();

    let mut sum = vec![0.0f64; pixel_count];
    for frame in burst.frames() {
        for (acc, value) in sum.iter_mut().zip(frame.pixels()) {
            *acc += value as f64;
        }
    }
    let mean: Vec<f64> = sum.iter().map(|s| s / n as f64).collect();

    let std_dev: Vec<f64> = if n < 2 {
        vec![0.0; pixel_count]
    } else {
        let mut sum_sq = vec![0.0f64; pixel_count];
        for frame in burst.frames() {
            for ((acc, value), m) in sum_sq.iter_mut().zip(frame.pixels()).zip(&mean) {
                let d = value as f64 - m;
                *acc += d * d;
            }
        }
        sum_sq
            .iter()
            .map(|s| (s / (n - 1) as f64).sqrt())
            .collect()
    };

    tracing::debug!(pixels = pixel_count, "burst reduced");

    Ok(ReducedPair {
        mean: FloatImage {
            width,
            height,
            data: mean.into_iter().map(|v| v as f32).collect(),
        },
        std_dev: FloatImage {
            width,
            height,
            data: std_dev.into_iter().map(|v| v as f32).collect(),
        },
    })
}
