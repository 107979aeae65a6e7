//! Sweep results: the results table, the image stack and the final report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;

use crate::error::PtcResult;
use crate::ptc::reduction::{FloatImage, ReducedPair};

/// Column headers of the results table.
pub const COLUMNS: [&str; 3] = ["Exposure", "Mean", "Std.Dev"];

/// One row of the results table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SweepRecord {
    /// Exposure in seconds; 0 for the dark pass
    #[serde(rename = "Exposure")]
    pub exposure: f64,
    /// Mean of the per-frame spatial means
    #[serde(rename = "Mean")]
    pub mean: f64,
    /// Standard deviation of the per-frame spatial means
    #[serde(rename = "Std.Dev")]
    pub std_dev: f64,
}

/// Append-only results table, rows in acquisition order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SweepResult {
    records: Vec<SweepRecord>,
}

impl SweepResult {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a row.
    pub fn push(&mut self, record: SweepRecord) {
        self.records.push(record);
    }

    /// Rows in acquisition order.
    pub fn records(&self) -> &[SweepRecord] {
        &self.records
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True before the first pass completed.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Render as an aligned text table with `precision` decimals.
    pub fn render(&self, precision: usize) -> String {
        let mut cells: Vec<[String; 4]> = vec![[
            String::new(),
            COLUMNS[0].to_string(),
            COLUMNS[1].to_string(),
            COLUMNS[2].to_string(),
        ]];
        for (i, r) in self.records.iter().enumerate() {
            cells.push([
                (i + 1).to_string(),
                format!("{:.*}", precision, r.exposure),
                format!("{:.*}", precision, r.mean),
                format!("{:.*}", precision, r.std_dev),
            ]);
        }

        let mut widths = [0usize; 4];
        for row in &cells {
            for (w, cell) in widths.iter_mut().zip(row) {
                *w = (*w).max(cell.len());
            }
        }

        let mut out = String::new();
        for row in &cells {
            let line = row
                .iter()
                .zip(widths)
                .map(|(cell, w)| format!("{cell:>w$}"))
                .collect::<Vec<_>>()
                .join("  ");
            let _ = writeln!(out, "{line}");
        }
        out
    }

    /// Write the table as CSV with the standard column headers.
    #[cfg(feature = "storage_csv")]
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> PtcResult<()> {
        let mut writer = csv::Writer::from_path(path)?;
        for record in &self.records {
            writer.serialize(record)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Write the table as CSV with the standard column headers.
    #[cfg(not(feature = "storage_csv"))]
    pub fn write_csv<P: AsRef<Path>>(&self, _path: P) -> PtcResult<()> {
        Err(crate::error::PtcError::FeatureNotEnabled("storage_csv".to_string()))
    }
}

/// Accumulated result images, interleaved as (mean, stdDev) per pass.
///
/// Slices are shared immutably; once appended they never change, so handing
/// them to a viewer is safe while the sweep keeps appending.
#[derive(Debug, Clone, Default)]
pub struct ImageStack {
    slices: Vec<Arc<FloatImage>>,
}

impl ImageStack {
    /// Number of interleaved channels (mean and standard deviation).
    pub const CHANNELS: usize = 2;

    /// Empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the two slices of one pass.
    pub fn push_pair(&mut self, pair: ReducedPair) -> (Arc<FloatImage>, Arc<FloatImage>) {
        let mean = Arc::new(pair.mean);
        let std_dev = Arc::new(pair.std_dev);
        self.slices.push(Arc::clone(&mean));
        self.slices.push(Arc::clone(&std_dev));
        (mean, std_dev)
    }

    /// All slices in order.
    pub fn slices(&self) -> &[Arc<FloatImage>] {
        &self.slices
    }

    /// Total number of slices.
    pub fn len(&self) -> usize {
        self.slices.len()
    }

    /// True before the first pass completed.
    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }

    /// Channels of the composite view.
    pub fn channels(&self) -> usize {
        Self::CHANNELS
    }

    /// Time points of the composite view (one per pass).
    pub fn frames(&self) -> usize {
        self.slices.len() / Self::CHANNELS
    }

    /// Mean image of pass `index`.
    pub fn mean_slice(&self, index: usize) -> Option<&Arc<FloatImage>> {
        self.slices.get(index * Self::CHANNELS)
    }

    /// Standard deviation image of pass `index`.
    pub fn std_dev_slice(&self, index: usize) -> Option<&Arc<FloatImage>> {
        self.slices.get(index * Self::CHANNELS + 1)
    }

    /// Shape of the slices, if any.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.slices.first().map(|s| (s.width, s.height))
    }
}

/// How a sweep ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SweepOutcome {
    /// Dark pass and every exposure completed
    Complete,
    /// The operator declined a confirmation gate
    Aborted {
        /// Gate that was declined
        gate: String,
    },
    /// A pass failed; rows and slices of earlier passes are kept
    Failed {
        /// Error class (`AcquisitionFailure`, `ReductionFailure`, ...)
        kind: String,
        /// Human-readable message
        message: String,
    },
}

impl SweepOutcome {
    /// True only for `Complete`.
    pub fn is_complete(&self) -> bool {
        matches!(self, SweepOutcome::Complete)
    }
}

/// Everything a sweep produced.
#[derive(Debug, Clone)]
pub struct SweepReport {
    /// Identifier of this sweep
    pub run_id: uuid::Uuid,
    /// How the sweep ended
    pub outcome: SweepOutcome,
    /// Results table
    pub results: SweepResult,
    /// Interleaved mean/stdDev images
    pub stack: ImageStack,
    /// Sweep start
    pub started_at: DateTime<Utc>,
    /// Sweep end
    pub finished_at: DateTime<Utc>,
}

/// Serializable digest of a report (no pixel data).
#[derive(Debug, Serialize)]
pub struct SweepSummary<'a> {
    run_id: uuid::Uuid,
    outcome: &'a SweepOutcome,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    passes: usize,
    stack_slices: usize,
    stack_channels: usize,
    stack_dimensions: Option<(u32, u32)>,
    results: &'a [SweepRecord],
}

impl SweepReport {
    /// Digest for JSON output.
    pub fn summary(&self) -> SweepSummary<'_> {
        SweepSummary {
            run_id: self.run_id,
            outcome: &self.outcome,
            started_at: self.started_at,
            finished_at: self.finished_at,
            passes: self.results.len(),
            stack_slices: self.stack.len(),
            stack_channels: self.stack.channels(),
            stack_dimensions: self.stack.dimensions(),
            results: self.results.records(),
        }
    }

    /// Write the summary as pretty JSON.
    pub fn write_summary_json<P: AsRef<Path>>(&self, path: P) -> PtcResult<()> {
        let json = serde_json::to_string_pretty(&self.summary())?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
