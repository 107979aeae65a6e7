//! Burst acquisition with a bounded wait per frame.
//!
//! The camera hands frames over through a channel; each receive is bounded by
//! the exposure plus a configurable slack, so a stalled camera turns into an
//! `AcquisitionFailure::Timeout` instead of a hung sweep.

use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::error::{AcquisitionFailure, PtcResult};
use crate::hardware::Camera;
use crate::ptc::reduction::Burst;

/// What to capture for one pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BurstRequest {
    /// Frames in the burst
    pub frames: usize,
    /// Requested exposure, seconds
    pub exposure_s: f64,
    /// Requested spacing between frames, milliseconds
    pub interval_ms: f64,
    /// Slack allowed on top of exposure and interval while waiting for a frame
    pub frame_timeout: Duration,
}

impl BurstRequest {
    /// Longest wait for a single frame at the given applied exposure.
    ///
    /// # Errors
    /// `AcquisitionFailure::Hardware` when the sum is not representable, e.g.
    /// a camera reporting a non-finite exposure.
    pub fn frame_deadline(&self, applied_exposure_s: f64) -> PtcResult<Duration> {
        let exposure = Duration::try_from_secs_f64(applied_exposure_s.max(0.0)).map_err(|e| {
            AcquisitionFailure::Hardware(format!(
                "camera reported unusable exposure {applied_exposure_s}: {e}"
            ))
        })?;
        let interval = Duration::try_from_secs_f64(self.interval_ms.max(0.0) / 1000.0)
            .map_err(|e| {
                AcquisitionFailure::Hardware(format!("unusable interval {} ms: {e}", self.interval_ms))
            })?;
        exposure
            .checked_add(interval)
            .and_then(|d| d.checked_add(self.frame_timeout))
            .ok_or_else(|| AcquisitionFailure::Hardware("frame deadline overflows".into()).into())
    }
}

/// Set the exposure, run a sequence of `request.frames` frames and collect them.
///
/// The returned burst carries the exposure the camera reports after setting it,
/// which may differ from the requested value. The camera's exposure setting is
/// left at that value.
#[tracing::instrument(skip(camera), fields(frames = request.frames, exposure = request.exposure_s))]
pub async fn acquire_burst(camera: &dyn Camera, request: &BurstRequest) -> PtcResult<Burst> {
    camera
        .set_exposure(request.exposure_s)
        .await
        .map_err(|e| AcquisitionFailure::ExposureRejected {
            exposure: request.exposure_s,
            reason: e.to_string(),
        })?;
    let applied = camera
        .get_exposure()
        .await
        .map_err(|e| AcquisitionFailure::Hardware(e.to_string()))?;
    if (applied - request.exposure_s).abs() > f64::EPSILON * request.exposure_s.abs() {
        debug!(requested = request.exposure_s, applied, "camera adjusted exposure");
    }

    let deadline = request.frame_deadline(applied)?;
    let mut rx = camera
        .start_sequence(request.frames, request.interval_ms, true)
        .await
        .map_err(|e| AcquisitionFailure::Hardware(e.to_string()))?;

    let mut frames = Vec::with_capacity(request.frames);

    while frames.len() < request.frames {
        match timeout(deadline, rx.recv()).await {
            Ok(Some(frame)) => {
                if let Some(meta) = &frame.metadata {
                    if meta.frame_number != frames.len() as u64 {
                        warn!(
                            expected = frames.len(),
                            got = meta.frame_number,
                            "frame counter discontinuity"
                        );
                    }
                }
                frames.push(frame);
            }
            Ok(None) => {
                stop_quietly(camera).await;
                return Err(AcquisitionFailure::ShortSequence {
                    received: frames.len(),
                    expected: request.frames,
                }
                .into());
            }
            Err(_) => {
                warn!(
                    received = frames.len(),
                    expected = request.frames,
                    waited = ?deadline,
                    "camera stopped delivering frames"
                );
                stop_quietly(camera).await;
                return Err(AcquisitionFailure::Timeout {
                    waited: deadline,
                    received: frames.len(),
                    expected: request.frames,
                }
                .into());
            }
        }
    }

    camera
        .stop_sequence()
        .await
        .map_err(|e| AcquisitionFailure::Hardware(e.to_string()))?;
    debug!(frames = frames.len(), applied, "burst acquired");

    Burst::new(applied, frames)
}

async fn stop_quietly(camera: &dyn Camera) {
    if let Err(e) = camera.stop_sequence().await {
        warn!(error = %e, "failed to stop sequence after acquisition error");
    }
}
