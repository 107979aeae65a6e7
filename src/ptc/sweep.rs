//! SweepDriver - State machine for the photon transfer sweep
//!
//! # State Machine
//!
//! ```text
//! ┌───────────────────────┐ confirmed ┌──────────┐      ┌────────────────────────┐
//! │ AwaitDarkConfirmation │──────────▶│ DarkPass │─────▶│ AwaitLightConfirmation │
//! └───────────┬───────────┘           └────┬─────┘      └───────────┬────────────┘
//!             │ declined                   │ error                  │ confirmed
//!             ▼                            ▼                        ▼
//!        ┌─────────┐                  ┌────────┐  error   ┌─────────────────────┐
//!        │ Aborted │◀── declined ─────│ Failed │◀─────────│ ExposureLoop(0..n)  │
//!        └─────────┘                  └────────┘          └──────────┬──────────┘
//!                                                                    ▼
//!                                                               ┌──────────┐
//!                                                               │ Complete │
//!                                                               └──────────┘
//! ```
//!
//! Every pass acquires a burst, reduces it on the blocking pool, appends one row
//! to the results table and two slices to the image stack, then hands an
//! `IterationCompleted` event to the presentation sink. The dark pass is only
//! appended once the light gate is confirmed, so cancelling at either gate
//! leaves the table and stack empty. Rows and slices of passes completed
//! before a failure are kept; the report is marked `Failed`.
//!
//! # Usage
//!
//! ```rust,ignore
//! let driver = SweepDriver::new(camera, gate, Box::new(ConsoleSink::new(4)), settings);
//! let report = driver.spawn().await??;
//! println!("{}", report.results.render(4));
//! ```

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, Instrument};

use crate::config::SweepSettings;
use crate::error::{PtcError, PtcResult};
use crate::hardware::Camera;
use crate::operator::{Gate, OperatorGate};
use crate::presentation::PresentationSink;
use crate::ptc::acquisition::{acquire_burst, BurstRequest};
use crate::ptc::reduction::{reduce, FloatImage, ReducedPair};
use crate::ptc::results::{ImageStack, SweepOutcome, SweepRecord, SweepReport, SweepResult};
use crate::ptc::schedule::ExposureSchedule;

/// Driver state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SweepState {
    /// Waiting for the operator to block the light
    AwaitDarkConfirmation,
    /// Acquiring and reducing the dark burst
    DarkPass,
    /// Waiting for the operator to switch the light on
    AwaitLightConfirmation,
    /// Acquiring and reducing exposure `index` of the schedule
    ExposureLoop {
        /// Position in the exposure schedule
        index: usize,
    },
    /// All passes done
    Complete,
    /// Operator declined a gate
    Aborted,
    /// A pass failed
    Failed,
}

impl std::fmt::Display for SweepState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SweepState::AwaitDarkConfirmation => write!(f, "awaiting dark confirmation"),
            SweepState::DarkPass => write!(f, "dark pass"),
            SweepState::AwaitLightConfirmation => write!(f, "awaiting light confirmation"),
            SweepState::ExposureLoop { index } => write!(f, "exposure {index}"),
            SweepState::Complete => write!(f, "complete"),
            SweepState::Aborted => write!(f, "aborted"),
            SweepState::Failed => write!(f, "failed"),
        }
    }
}

/// Which pass a result belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Pass {
    /// Zero-light calibration pass
    Dark,
    /// Pass `index` of the exposure schedule
    Exposure {
        /// Position in the exposure schedule
        index: usize,
    },
}

/// Output of one completed pass.
#[derive(Debug, Clone)]
pub struct PassResult {
    /// Which pass
    pub pass: Pass,
    /// Row appended to the results table
    pub record: SweepRecord,
    /// Temporal mean image (shared with the stack)
    pub mean: Arc<FloatImage>,
    /// Temporal standard deviation image (shared with the stack)
    pub std_dev: Arc<FloatImage>,
}

/// Notifications handed to the presentation sink, by value.
#[derive(Debug, Clone)]
pub enum SweepEvent {
    /// The driver entered a new state
    StateChanged(SweepState),
    /// An exposure pass is starting
    Progress {
        /// Position in the exposure schedule
        index: usize,
        /// Schedule length
        total: usize,
        /// Requested exposure, seconds
        exposure: f64,
    },
    /// A pass finished and its row and slices were appended
    IterationCompleted(PassResult),
    /// The sweep ended
    Finished(SweepOutcome),
}

/// A reduced pass not yet appended to the results.
struct MeasuredPass {
    pass: Pass,
    record: SweepRecord,
    pair: ReducedPair,
}

/// Orchestrates the dark pass and the exposure sweep.
pub struct SweepDriver {
    camera: Arc<dyn Camera>,
    gate: Arc<dyn OperatorGate>,
    sink: Box<dyn PresentationSink>,
    settings: SweepSettings,
    state: SweepState,
    results: SweepResult,
    stack: ImageStack,
    run_id: uuid::Uuid,
}

impl SweepDriver {
    /// Create a driver; nothing touches the hardware until `run`.
    pub fn new(
        camera: Arc<dyn Camera>,
        gate: Arc<dyn OperatorGate>,
        sink: Box<dyn PresentationSink>,
        settings: SweepSettings,
    ) -> Self {
        Self {
            camera,
            gate,
            sink,
            settings,
            state: SweepState::AwaitDarkConfirmation,
            results: SweepResult::new(),
            stack: ImageStack::new(),
            run_id: uuid::Uuid::new_v4(),
        }
    }

    /// Identifier used in logs and the report.
    pub fn run_id(&self) -> uuid::Uuid {
        self.run_id
    }

    /// Current state.
    pub fn state(&self) -> SweepState {
        self.state
    }

    /// Run the sweep on its own task.
    pub fn spawn(self) -> JoinHandle<PtcResult<SweepReport>> {
        let span = tracing::info_span!("sweep", run_id = %self.run_id);
        tokio::spawn(self.run().instrument(span))
    }

    /// Run the sweep to completion.
    ///
    /// # Errors
    /// Only `InvalidConfiguration`, before any acquisition. Failures during the
    /// sweep end it with `SweepOutcome::Failed` in the returned report.
    pub async fn run(mut self) -> PtcResult<SweepReport> {
        self.settings.validate()?;
        let schedule = self.settings.schedule()?;
        let started_at = Utc::now();
        info!(
            frames = self.settings.nr_frames,
            exposures = schedule.len(),
            min = schedule.first(),
            max = schedule.last(),
            "starting photon transfer sweep"
        );

        let outcome = match self.execute(&schedule).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(kind = e.kind(), error = %e, passes = self.results.len(), "sweep failed");
                self.state = SweepState::Failed;
                if let Err(e) = self.emit(SweepEvent::StateChanged(SweepState::Failed)) {
                    error!(error = %e, "presentation sink failed on state change");
                }
                SweepOutcome::Failed {
                    kind: e.kind().to_string(),
                    message: e.to_string(),
                }
            }
        };

        if let Err(e) = self.emit(SweepEvent::Finished(outcome.clone())) {
            error!(error = %e, "presentation sink failed on finish");
        }
        info!(outcome = ?outcome, rows = self.results.len(), slices = self.stack.len(), "sweep finished");

        Ok(SweepReport {
            run_id: self.run_id,
            outcome,
            results: self.results,
            stack: self.stack,
            started_at,
            finished_at: Utc::now(),
        })
    }

    async fn execute(&mut self, schedule: &ExposureSchedule) -> PtcResult<SweepOutcome> {
        self.transition(SweepState::AwaitDarkConfirmation)?;
        if !self.gate.confirm(Gate::Dark).await {
            return self.abort(Gate::Dark);
        }

        self.transition(SweepState::DarkPass)?;
        // Held back until the light gate is confirmed; a cancelled sweep publishes nothing.
        let dark = self.measure(Pass::Dark, schedule.first()).await?;

        self.transition(SweepState::AwaitLightConfirmation)?;
        if !self.gate.confirm(Gate::Light).await {
            debug!("discarding dark pass");
            return self.abort(Gate::Light);
        }
        self.commit(dark)?;

        let total = schedule.len();
        for (index, exposure) in schedule.iter().enumerate() {
            self.transition(SweepState::ExposureLoop { index })?;
            self.emit(SweepEvent::Progress {
                index,
                total,
                exposure,
            })?;
            let measured = self.measure(Pass::Exposure { index }, exposure).await?;
            self.commit(measured)?;
        }

        self.transition(SweepState::Complete)?;
        Ok(SweepOutcome::Complete)
    }

    fn abort(&mut self, gate: Gate) -> PtcResult<SweepOutcome> {
        info!(%gate, "operator cancelled sweep");
        self.transition(SweepState::Aborted)?;
        Ok(SweepOutcome::Aborted {
            gate: gate.name().to_string(),
        })
    }

    /// Acquire and reduce one burst without publishing anything.
    #[tracing::instrument(skip(self))]
    async fn measure(&mut self, pass: Pass, exposure_s: f64) -> PtcResult<MeasuredPass> {
        let request = BurstRequest {
            frames: self.settings.nr_frames,
            exposure_s,
            interval_ms: self.settings.interval_ms,
            frame_timeout: self.settings.frame_timeout,
        };
        let burst = acquire_burst(self.camera.as_ref(), &request).await?;
        let applied = burst.exposure_s();

        let (stats, pair) = tokio::task::spawn_blocking(move || {
            let stats = burst.frame_statistics();
            reduce(&burst).map(|pair| (stats, pair))
        })
        .await
        .map_err(|e| PtcError::Reduction(format!("reduction task failed: {e}")))??;

        let record = SweepRecord {
            exposure: match pass {
                Pass::Dark => 0.0,
                Pass::Exposure { .. } => applied,
            },
            mean: stats.mean,
            std_dev: stats.std_dev,
        };
        info!(
            exposure = record.exposure,
            mean = record.mean,
            std_dev = record.std_dev,
            "pass measured"
        );

        Ok(MeasuredPass { pass, record, pair })
    }

    /// Append a measured pass to the table and stack, then publish it.
    fn commit(&mut self, measured: MeasuredPass) -> PtcResult<()> {
        let MeasuredPass { pass, record, pair } = measured;
        self.results.push(record);
        let (mean, std_dev) = self.stack.push_pair(pair);

        self.emit(SweepEvent::IterationCompleted(PassResult {
            pass,
            record,
            mean,
            std_dev,
        }))
    }

    fn transition(&mut self, next: SweepState) -> PtcResult<()> {
        debug!(from = %self.state, to = %next, "state transition");
        self.state = next;
        self.emit(SweepEvent::StateChanged(next))
    }

    fn emit(&mut self, event: SweepEvent) -> PtcResult<()> {
        self.sink.handle(event)
    }
}
