//! Presentation sinks for sweep events.
//!
//! The driver hands every event to a single [`PresentationSink`] by value. Sinks
//! run on the sweep task, so anything slow (a viewer, a network client) should
//! sit behind a [`ChannelSink`] and consume on its own task.

use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use crate::error::{PtcError, PtcResult};
use crate::ptc::results::{SweepOutcome, SweepResult};
use crate::ptc::sweep::{Pass, SweepEvent};

#[cfg(feature = "storage_csv")]
use crate::ptc::results::SweepRecord;
#[cfg(feature = "storage_csv")]
use std::path::PathBuf;
#[cfg(feature = "storage_csv")]
use tracing::{debug, info};

/// Receives sweep events in order.
pub trait PresentationSink: Send {
    /// Handle one event. An error fails the sweep.
    fn handle(&mut self, event: SweepEvent) -> PtcResult<()>;
}

/// Prints progress lines and the final table to a writer (stdout by default).
pub struct ConsoleSink<W: Write + Send = std::io::Stdout> {
    out: W,
    precision: usize,
    table: SweepResult,
}

impl ConsoleSink {
    /// Console sink on stdout.
    pub fn new(precision: usize) -> Self {
        Self::with_writer(std::io::stdout(), precision)
    }
}

impl<W: Write + Send> ConsoleSink<W> {
    /// Console sink on any writer.
    pub fn with_writer(out: W, precision: usize) -> Self {
        Self {
            out,
            precision,
            table: SweepResult::new(),
        }
    }

    /// Consume the sink, returning the writer.
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> PresentationSink for ConsoleSink<W> {
    fn handle(&mut self, event: SweepEvent) -> PtcResult<()> {
        match event {
            SweepEvent::StateChanged(_) => {}
            SweepEvent::Progress {
                index,
                total,
                exposure,
            } => {
                writeln!(
                    self.out,
                    "Exposure {}/{}: {:.*} s",
                    index + 1,
                    total,
                    self.precision,
                    exposure
                )?;
            }
            SweepEvent::IterationCompleted(result) => {
                let label = match result.pass {
                    Pass::Dark => "dark".to_string(),
                    Pass::Exposure { index } => format!("#{}", index + 1),
                };
                writeln!(
                    self.out,
                    "  {label}: mean {:.*}  std.dev {:.*}",
                    self.precision, result.record.mean, self.precision, result.record.std_dev
                )?;
                self.table.push(result.record);
            }
            SweepEvent::Finished(outcome) => {
                match &outcome {
                    SweepOutcome::Complete => writeln!(self.out, "Sweep complete")?,
                    SweepOutcome::Aborted { gate } => {
                        writeln!(self.out, "Sweep cancelled at the {gate} gate")?
                    }
                    SweepOutcome::Failed { kind, message } => {
                        writeln!(self.out, "Sweep failed ({kind}): {message}")?
                    }
                }
                if !self.table.is_empty() {
                    write!(self.out, "{}", self.table.render(self.precision))?;
                }
                self.out.flush()?;
            }
        }
        Ok(())
    }
}

/// Writes each row to a CSV file as soon as its pass completes.
///
/// The file and its header appear with the first row, so a sweep cancelled
/// before any pass was committed leaves no file behind. Every row is flushed,
/// so an interrupted sweep still leaves a readable file.
#[cfg(feature = "storage_csv")]
pub struct CsvSink {
    path: PathBuf,
    writer: Option<csv::Writer<std::fs::File>>,
    rows: usize,
}

#[cfg(feature = "storage_csv")]
impl CsvSink {
    /// Sink writing to `path`; nothing is created until the first row.
    pub fn create<P: AsRef<Path>>(path: P) -> PtcResult<Self> {
        Ok(Self {
            path: path.as_ref().to_path_buf(),
            writer: None,
            rows: 0,
        })
    }

    /// Output file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rows written so far.
    pub fn rows(&self) -> usize {
        self.rows
    }

    fn open(&mut self) -> PtcResult<&mut csv::Writer<std::fs::File>> {
        if self.writer.is_none() {
            if let Some(parent) = self.path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            let mut writer = csv::WriterBuilder::new()
                .has_headers(false)
                .from_path(&self.path)?;
            writer.write_record(crate::ptc::results::COLUMNS)?;
            info!(path = %self.path.display(), "writing results");
            self.writer = Some(writer);
        }
        self.writer
            .as_mut()
            .ok_or_else(|| PtcError::Presentation("csv writer unavailable".to_string()))
    }

    fn write_row(&mut self, record: &SweepRecord) -> PtcResult<()> {
        let writer = self.open()?;
        writer.serialize(record)?;
        writer.flush()?;
        self.rows += 1;
        Ok(())
    }
}

#[cfg(feature = "storage_csv")]
impl PresentationSink for CsvSink {
    fn handle(&mut self, event: SweepEvent) -> PtcResult<()> {
        match event {
            SweepEvent::IterationCompleted(result) => self.write_row(&result.record),
            SweepEvent::Finished(_) => match self.writer.as_mut() {
                Some(writer) => {
                    debug!(rows = self.rows, path = %self.path.display(), "results file closed");
                    Ok(writer.flush()?)
                }
                None => {
                    debug!(path = %self.path.display(), "no rows, results file not created");
                    Ok(())
                }
            },
            _ => Ok(()),
        }
    }
}

/// Placeholder when CSV support is compiled out.
#[cfg(not(feature = "storage_csv"))]
pub struct CsvSink;

#[cfg(not(feature = "storage_csv"))]
impl CsvSink {
    /// Always fails without the `storage_csv` feature.
    pub fn create<P: AsRef<Path>>(_path: P) -> PtcResult<Self> {
        Err(PtcError::FeatureNotEnabled("storage_csv".to_string()))
    }
}

#[cfg(not(feature = "storage_csv"))]
impl PresentationSink for CsvSink {
    fn handle(&mut self, _event: SweepEvent) -> PtcResult<()> {
        Ok(())
    }
}

/// Forwards events to another task.
///
/// Fails the sweep once the receiving side is gone.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<SweepEvent>,
}

impl ChannelSink {
    /// Sink plus the receiver to consume from.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SweepEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl PresentationSink for ChannelSink {
    fn handle(&mut self, event: SweepEvent) -> PtcResult<()> {
        self.tx
            .send(event)
            .map_err(|_| PtcError::Presentation("event receiver dropped".to_string()))
    }
}

/// Keeps every event in memory.
#[derive(Default, Clone)]
pub struct CollectingSink {
    events: Arc<Mutex<Vec<SweepEvent>>>,
}

impl CollectingSink {
    /// Empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared handle to the collected events.
    pub fn events(&self) -> Arc<Mutex<Vec<SweepEvent>>> {
        Arc::clone(&self.events)
    }
}

impl PresentationSink for CollectingSink {
    fn handle(&mut self, event: SweepEvent) -> PtcResult<()> {
        self.events
            .lock()
            .map_err(|_| PtcError::Presentation("event buffer poisoned".to_string()))?
            .push(event);
        Ok(())
    }
}

/// Hands every event to several sinks in order; the first error wins.
#[derive(Default)]
pub struct FanOutSink {
    sinks: Vec<Box<dyn PresentationSink>>,
}

impl FanOutSink {
    /// No sinks yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sink.
    pub fn with(mut self, sink: Box<dyn PresentationSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Number of sinks.
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    /// True when no sink is attached.
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl PresentationSink for FanOutSink {
    fn handle(&mut self, event: SweepEvent) -> PtcResult<()> {
        if let Some((last, rest)) = self.sinks.split_last_mut() {
            for sink in rest {
                sink.handle(event.clone())?;
            }
            last.handle(event)?;
        }
        Ok(())
    }
}
