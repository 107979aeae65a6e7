//! Atomic Hardware Capabilities
//!
//! Fine-grained capability traits that camera drivers implement. The sweep only
//! needs two things from a camera:
//!
//! - `ExposureControl`: set and read back the integration time
//! - `SequenceAcquisition`: capture a fixed-length free-running sequence
//!
//! # Design Philosophy
//!
//! Each capability trait:
//! - Is async (uses #[async_trait])
//! - Is thread-safe (requires Send + Sync)
//! - Uses anyhow::Result for errors
//! - Focuses on ONE thing
//!
//! # Example
//!
//! ```rust,ignore
//! async fn grab<C>(camera: &C) -> Result<Frame>
//! where
//!     C: ExposureControl + SequenceAcquisition,
//! {
//!     camera.set_exposure(0.1).await?;
//!     let mut frames = camera.start_sequence(1, 0.0, true).await?;
//!     frames.recv().await.ok_or_else(|| anyhow!("no frame"))
//! }
//! ```

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::hardware::Frame;

/// Capability: Exposure Time Control
///
/// Devices with configurable integration time (cameras, spectrometers, photodetectors).
///
/// # Contract
/// - Exposure is in seconds (not milliseconds)
/// - Setting exposure does not start acquisition
/// - Exposure applies to next acquisition
/// - The device may round the requested value; `get_exposure` returns what was applied
#[async_trait]
pub trait ExposureControl: Send + Sync {
    /// Set exposure/integration time
    ///
    /// # Arguments
    /// * `seconds` - Exposure time in seconds
    ///
    /// # Returns
    /// - Ok(()) if exposure set successfully
    /// - Err if value is out of hardware range
    async fn set_exposure(&self, seconds: f64) -> Result<()>;

    /// Get current exposure setting
    ///
    /// # Returns
    /// Current exposure time in seconds
    async fn get_exposure(&self) -> Result<f64>;
}

/// Capability: Fixed-length sequence capture
///
/// Devices that can free-run for a known number of frames and hand them over
/// in acquisition order.
///
/// # Contract
/// - `start_sequence()` returns the receiving end of the frame queue; frames
///   arrive in acquisition order
/// - The sender is dropped once the sequence has produced `count` frames or was
///   stopped, so a closed channel means "no more frames"
/// - With `stop_on_overflow`, the device stops the sequence instead of dropping
///   frames when the consumer falls behind
/// - `resolution()` is immutable for the lifetime of the device
#[async_trait]
pub trait SequenceAcquisition: Send + Sync {
    /// Start capturing `count` frames spaced `interval_ms` apart.
    ///
    /// # Returns
    /// - Ok(receiver) once the sequence is running
    /// - Err if a sequence is already running or the hardware refuses to start
    async fn start_sequence(
        &self,
        count: usize,
        interval_ms: f64,
        stop_on_overflow: bool,
    ) -> Result<mpsc::Receiver<Frame>>;

    /// Stop a running sequence. Stopping an idle device is not an error.
    async fn stop_sequence(&self) -> Result<()>;

    /// Check if a sequence is currently running
    async fn is_sequence_running(&self) -> Result<bool>;

    /// Get frame resolution (width, height)
    fn resolution(&self) -> (u32, u32);
}

/// Combined trait for cameras used by the sweep
///
/// This trait exists solely to enable trait objects. Implement the individual
/// traits (ExposureControl, SequenceAcquisition) and get this automatically via
/// blanket impl.
pub trait Camera: ExposureControl + SequenceAcquisition {}

/// Blanket implementation - any type implementing both traits gets Camera for free
impl<T: ExposureControl + SequenceAcquisition> Camera for T {}
