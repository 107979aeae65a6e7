//! Mock camera implementation with sequence acquisition support.
//!
//! `MockCamera` simulates a scientific CMOS/CCD camera well enough to run a
//! photon transfer sweep end to end without hardware:
//!
//! - Configurable resolution and sensor model (bias, gain, read noise, dark current)
//! - A light path switch so dark frames really are dark
//! - Exposure range checks and optional exposure quantization
//! - Instant or hardware-like timing
//! - Fault injection (refused sequence starts, stalled sequences)

pub mod rng;
pub mod sensor;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::time::{sleep, Duration};

use crate::hardware::capabilities::{ExposureControl, SequenceAcquisition};
use crate::hardware::{Frame, FrameMetadata};
use rng::MockRng;
pub use sensor::SensorModel;

/// Operational modes for mock devices
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MockMode {
    /// Zero delays, deterministic - for unit tests
    #[default]
    Instant,
    /// Frames take exposure + readout time to arrive
    Realistic,
}

/// Injected failure for resilience testing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFault {
    /// The `nth` call to `start_sequence` (1-based) is refused
    FailSequence {
        /// Which sequence start fails
        nth: u64,
    },
    /// The `nth` sequence delivers `after_frames` frames and then hangs until stopped
    StallSequence {
        /// Which sequence stalls
        nth: u64,
        /// Frames delivered before the stall
        after_frames: usize,
    },
    /// The `nth` sequence delivers `after_frames` frames and then closes its channel
    ShortSequence {
        /// Which sequence ends early
        nth: u64,
        /// Frames delivered before the channel closes
        after_frames: usize,
    },
    /// Frame `at` of the `nth` sequence is one column wider than the sensor
    MismatchedFrame {
        /// Which sequence carries the odd frame
        nth: u64,
        /// Index of the odd frame within the sequence
        at: usize,
    },
}

impl MockFault {
    fn sequence(&self) -> u64 {
        match *self {
            MockFault::FailSequence { nth }
            | MockFault::StallSequence { nth, .. }
            | MockFault::ShortSequence { nth, .. }
            | MockFault::MismatchedFrame { nth, .. } => nth,
        }
    }
}

/// Configuration for MockCamera
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MockCameraConfig {
    /// Frame width in pixels (default: 64)
    pub width: u32,
    /// Frame height in pixels (default: 64)
    pub height: u32,
    /// Initial exposure in seconds (default: 0.033)
    pub exposure_s: f64,
    /// Shortest accepted exposure in seconds
    pub min_exposure_s: f64,
    /// Longest accepted exposure in seconds
    pub max_exposure_s: f64,
    /// Exposure resolution in seconds; 0 disables rounding
    pub exposure_step_s: f64,
    /// Sensor readout time per frame (realistic mode only)
    pub readout_ms: u64,
    /// Frames the camera can buffer before overflowing
    pub buffer_frames: usize,
    /// Timing behaviour
    pub mode: MockMode,
    /// RNG seed; unset draws from OS entropy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Sensor response
    pub sensor: SensorModel,
}

impl Default for MockCameraConfig {
    fn default() -> Self {
        Self {
            width: 64,
            height: 64,
            exposure_s: 0.033,
            min_exposure_s: 1.0e-5,
            max_exposure_s: 3600.0,
            exposure_step_s: 0.0,
            readout_ms: 10,
            buffer_frames: 256,
            mode: MockMode::Instant,
            seed: None,
            sensor: SensorModel::default(),
        }
    }
}

impl MockCameraConfig {
    /// Reject configurations the simulator cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            anyhow::bail!("Camera resolution must be non-zero");
        }
        if self.exposure_s <= 0.0 {
            anyhow::bail!("Exposure must be positive");
        }
        if self.min_exposure_s <= 0.0 || self.max_exposure_s < self.min_exposure_s {
            anyhow::bail!(
                "Invalid exposure range [{}, {}]",
                self.min_exposure_s,
                self.max_exposure_s
            );
        }
        if self.sensor.gain_e_per_adu <= 0.0 {
            anyhow::bail!("Conversion gain must be positive");
        }
        if self.buffer_frames == 0 {
            anyhow::bail!("Camera buffer must hold at least one frame");
        }
        Ok(())
    }
}

// =============================================================================
// MockCameraBuilder
// =============================================================================

/// Builder for MockCamera with advanced configuration
pub struct MockCameraBuilder {
    config: MockCameraConfig,
    faults: Vec<MockFault>,
}

impl MockCameraBuilder {
    fn new(width: u32, height: u32) -> Self {
        Self {
            config: MockCameraConfig {
                width,
                height,
                ..Default::default()
            },
            faults: Vec::new(),
        }
    }

    /// Timing behaviour.
    pub fn mode(mut self, mode: MockMode) -> Self {
        self.config.mode = mode;
        self
    }

    /// Seed the noise generator.
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    /// Replace the sensor response model.
    pub fn sensor(mut self, sensor: SensorModel) -> Self {
        self.config.sensor = sensor;
        self
    }

    /// Round exposures to multiples of `step_s`.
    pub fn exposure_step(mut self, step_s: f64) -> Self {
        self.config.exposure_step_s = step_s.max(0.0);
        self
    }

    /// Inject a failure.
    pub fn fault(mut self, fault: MockFault) -> Self {
        self.faults.push(fault);
        self
    }

    /// Build the camera.
    pub fn build(self) -> MockCamera {
        MockCamera::from_parts(self.config, self.faults)
    }
}

// =============================================================================
// MockCamera
// =============================================================================

/// Mock camera producing synthetic sensor frames.
///
/// # Example
///
/// ```rust,ignore
/// let camera = MockCamera::builder(32, 32).seed(1).build();
/// camera.set_exposure(0.5).await?;
/// let mut frames = camera.start_sequence(10, 0.0, true).await?;
/// while let Some(frame) = frames.recv().await { /* ... */ }
/// ```
pub struct MockCamera {
    config: MockCameraConfig,
    faults: Vec<MockFault>,
    exposure_s: Arc<RwLock<f64>>,
    illuminated: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    sequences_started: AtomicU64,
    frames_delivered: Arc<AtomicU64>,
    sequence_task: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl MockCamera {
    /// Create new mock camera with specified resolution.
    ///
    /// Instant mode, default sensor, light path open, no faults.
    pub fn new(width: u32, height: u32) -> Self {
        Self::builder(width, height).build()
    }

    /// Create builder for advanced configuration
    pub fn builder(width: u32, height: u32) -> MockCameraBuilder {
        MockCameraBuilder::new(width, height)
    }

    /// Create a camera from its configuration section.
    pub fn with_config(config: MockCameraConfig) -> Self {
        Self::from_parts(config, Vec::new())
    }

    fn from_parts(config: MockCameraConfig, faults: Vec<MockFault>) -> Self {
        Self {
            exposure_s: Arc::new(RwLock::new(config.exposure_s)),
            config,
            faults,
            illuminated: Arc::new(AtomicBool::new(true)),
            running: Arc::new(AtomicBool::new(false)),
            sequences_started: AtomicU64::new(0),
            frames_delivered: Arc::new(AtomicU64::new(0)),
            sequence_task: Mutex::new(None),
        }
    }

    /// Open or close the light path to the sensor.
    pub fn set_illumination(&self, on: bool) {
        tracing::info!(illuminated = on, "MockCamera: light path switched");
        self.illuminated.store(on, Ordering::SeqCst);
    }

    /// Whether light currently reaches the sensor.
    pub fn is_illuminated(&self) -> bool {
        self.illuminated.load(Ordering::SeqCst)
    }

    /// Number of `start_sequence` calls so far, including refused ones.
    pub fn sequences_started(&self) -> u64 {
        self.sequences_started.load(Ordering::SeqCst)
    }

    /// Total frames handed to consumers.
    pub fn frames_delivered(&self) -> u64 {
        self.frames_delivered.load(Ordering::SeqCst)
    }

    /// The sensor model frames are drawn from.
    pub fn sensor(&self) -> &SensorModel {
        &self.config.sensor
    }

    fn quantize(&self, seconds: f64) -> f64 {
        let step = self.config.exposure_step_s;
        if step > 0.0 {
            ((seconds / step).round() * step).max(step)
        } else {
            seconds
        }
    }

    fn faults_for(&self, sequence: u64) -> Vec<MockFault> {
        self.faults
            .iter()
            .copied()
            .filter(|fault| fault.sequence() == sequence)
            .collect()
    }
}

impl Default for MockCamera {
    fn default() -> Self {
        Self::with_config(MockCameraConfig::default())
    }
}

#[async_trait]
impl ExposureControl for MockCamera {
    async fn set_exposure(&self, seconds: f64) -> Result<()> {
        if !seconds.is_finite() || seconds <= 0.0 {
            return Err(anyhow!("MockCamera: Exposure must be positive"));
        }
        if seconds < self.config.min_exposure_s || seconds > self.config.max_exposure_s {
            return Err(anyhow!(
                "MockCamera: Exposure {seconds}s outside [{}, {}]s",
                self.config.min_exposure_s,
                self.config.max_exposure_s
            ));
        }
        *self.exposure_s.write().await = self.quantize(seconds);
        Ok(())
    }

    async fn get_exposure(&self) -> Result<f64> {
        Ok(*self.exposure_s.read().await)
    }
}

#[async_trait]
impl SequenceAcquisition for MockCamera {
    async fn start_sequence(
        &self,
        count: usize,
        interval_ms: f64,
        stop_on_overflow: bool,
    ) -> Result<mpsc::Receiver<Frame>> {
        let sequence = self.sequences_started.fetch_add(1, Ordering::SeqCst) + 1;

        let faults = self.faults_for(sequence);
        if faults
            .iter()
            .any(|fault| matches!(fault, MockFault::FailSequence { .. }))
        {
            anyhow::bail!("MockCamera: hardware fault starting sequence #{sequence}");
        }
        if self.running.swap(true, Ordering::SeqCst) {
            anyhow::bail!("MockCamera: Sequence already running");
        }

        let (tx, rx) = mpsc::channel(self.config.buffer_frames);
        let exposure_s = *self.exposure_s.read().await;
        let (width, height) = (self.config.width, self.config.height);
        let sensor = self.config.sensor;
        let mode = self.config.mode;
        let frame_period = Duration::from_secs_f64(exposure_s)
            + Duration::from_millis(self.config.readout_ms)
                .max(Duration::from_secs_f64(interval_ms.max(0.0) / 1000.0));
        let stall_after = faults.iter().find_map(|fault| match *fault {
            MockFault::StallSequence { after_frames, .. } => Some(after_frames),
            _ => None,
        });
        let close_after = faults.iter().find_map(|fault| match *fault {
            MockFault::ShortSequence { after_frames, .. } => Some(after_frames),
            _ => None,
        });
        let odd_frame = faults.iter().find_map(|fault| match *fault {
            MockFault::MismatchedFrame { at, .. } => Some(at),
            _ => None,
        });
        let seed = self.config.seed.map(|s| s.wrapping_add(sequence));
        let running = Arc::clone(&self.running);
        let illuminated = Arc::clone(&self.illuminated);
        let delivered = Arc::clone(&self.frames_delivered);

        tracing::debug!(sequence, count, exposure_s, "MockCamera: sequence started");

        let handle = tokio::spawn(async move {
            let mut rng = MockRng::new(seed);
            for frame_number in 0..count {
                if !running.load(Ordering::SeqCst) {
                    break;
                }
                if stall_after == Some(frame_number) {
                    tracing::warn!(sequence, frame_number, "MockCamera: sequence stalled");
                    while running.load(Ordering::SeqCst) {
                        sleep(Duration::from_millis(5)).await;
                    }
                    break;
                }
                if close_after == Some(frame_number) {
                    tracing::warn!(sequence, frame_number, "MockCamera: sequence ended early");
                    break;
                }
                if mode == MockMode::Realistic {
                    sleep(frame_period).await;
                }

                let frame_width = if odd_frame == Some(frame_number) {
                    width + 1
                } else {
                    width
                };
                let pixels = sensor.expose(
                    &mut rng,
                    frame_width as usize * height as usize,
                    exposure_s,
                    illuminated.load(Ordering::SeqCst),
                );
                let frame = Frame::from_u16(frame_width, height, &pixels).with_metadata(FrameMetadata {
                    frame_number: frame_number as u64,
                    exposure_s,
                    timestamp: Utc::now(),
                });

                let sent = if stop_on_overflow {
                    match tx.try_send(frame) {
                        Ok(()) => true,
                        Err(mpsc::error::TrySendError::Full(_)) => {
                            tracing::warn!(sequence, frame_number, "MockCamera: buffer overflow, stopping");
                            false
                        }
                        Err(mpsc::error::TrySendError::Closed(_)) => false,
                    }
                } else {
                    tx.send(frame).await.is_ok()
                };
                if !sent {
                    break;
                }
                delivered.fetch_add(1, Ordering::SeqCst);
            }
            running.store(false, Ordering::SeqCst);
        });

        *self.sequence_task.lock().await = Some(handle);
        Ok(rx)
    }

    async fn stop_sequence(&self) -> Result<()> {
        let was_running = self.running.swap(false, Ordering::SeqCst);
        if let Some(handle) = self.sequence_task.lock().await.take() {
            handle
                .await
                .map_err(|e| anyhow!("MockCamera: sequence task failed: {e}"))?;
        }
        if was_running {
            tracing::debug!("MockCamera: sequence stopped");
        }
        Ok(())
    }

    async fn is_sequence_running(&self) -> Result<bool> {
        Ok(self.running.load(Ordering::SeqCst))
    }

    fn resolution(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }
}
