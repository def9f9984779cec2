//! Feature Sink Port - where assembled rows go
//!
//! - `MemorySink`: keeps everything, for tests and in-process consumers
//! - `ChannelSink`: bounded mpsc towards an external consumer
//! - `LogSink`: tracing output

use parking_lot::Mutex;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum SinkError {
    /// The consumer is gone; nothing further can be delivered
    #[error("Sink closed")]
    Closed,
    /// The consumer is lagging; this row was dropped
    #[error("Sink full, row dropped")]
    Full,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SinkError {
    pub fn is_fatal(&self) -> bool {
        !matches!(self, SinkError::Full)
    }
}

/// One exported feature vector
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub timestamp_ms: i64,
    pub values: Vec<f64>,
}

impl FeatureRow {
    /// Text cells: the timestamp followed by each value in shortest form
    pub fn to_fields(&self) -> Vec<String> {
        std::iter::once(self.timestamp_ms.to_string())
            .chain(self.values.iter().map(f64::to_string))
            .collect()
    }
}

/// Header cells: `timestamp` followed by the feature keys
pub fn header_fields(keys: &[String]) -> Vec<String> {
    std::iter::once("timestamp".to_string())
        .chain(keys.iter().cloned())
        .collect()
}

/// Port for feature export
pub trait FeatureSink: Send {
    /// True when nothing has been written yet, so a header is due
    fn is_empty(&self) -> bool;

    fn write_header(&mut self, keys: &[String]) -> Result<(), SinkError>;

    fn write_row(&mut self, row: &FeatureRow) -> Result<(), SinkError>;

    fn flush(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    header: Option<Vec<String>>,
    rows: Vec<FeatureRow>,
}

/// In-memory sink; clones share the same storage
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    state: Arc<Mutex<MemoryState>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(&self) -> Option<Vec<String>> {
        self.state.lock().header.clone()
    }

    pub fn rows(&self) -> Vec<FeatureRow> {
        self.state.lock().rows.clone()
    }

    pub fn row_count(&self) -> usize {
        self.state.lock().rows.len()
    }
}

impl FeatureSink for MemorySink {
    fn is_empty(&self) -> bool {
        let state = self.state.lock();
        state.header.is_none() && state.rows.is_empty()
    }

    fn write_header(&mut self, keys: &[String]) -> Result<(), SinkError> {
        self.state.lock().header = Some(header_fields(keys));
        Ok(())
    }

    fn write_row(&mut self, row: &FeatureRow) -> Result<(), SinkError> {
        self.state.lock().rows.push(row.clone());
        Ok(())
    }
}

/// Item delivered by [`ChannelSink`]
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureExport {
    Header(Vec<String>),
    Row(FeatureRow),
}

/// Sink backed by a bounded channel
///
/// Never blocks the assembler: a full channel drops the row.
pub struct ChannelSink {
    sender: mpsc::Sender<FeatureExport>,
    sent: usize,
}

impl ChannelSink {
    pub fn new(sender: mpsc::Sender<FeatureExport>) -> Self {
        Self { sender, sent: 0 }
    }

    /// Create a sink and its receiving end
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<FeatureExport>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }

    fn send(&mut self, item: FeatureExport) -> Result<(), SinkError> {
        self.sender.try_send(item).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SinkError::Full,
            mpsc::error::TrySendError::Closed(_) => SinkError::Closed,
        })?;
        self.sent += 1;
        Ok(())
    }
}

impl FeatureSink for ChannelSink {
    fn is_empty(&self) -> bool {
        self.sent == 0
    }

    fn write_header(&mut self, keys: &[String]) -> Result<(), SinkError> {
        self.send(FeatureExport::Header(header_fields(keys)))
    }

    fn write_row(&mut self, row: &FeatureRow) -> Result<(), SinkError> {
        self.send(FeatureExport::Row(row.clone()))
    }
}

/// Sink that reports rows through `tracing`
#[derive(Debug, Default)]
pub struct LogSink {
    columns: usize,
    rows: u64,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FeatureSink for LogSink {
    fn is_empty(&self) -> bool {
        self.columns == 0 && self.rows == 0
    }

    fn write_header(&mut self, keys: &[String]) -> Result<(), SinkError> {
        self.columns = keys.len();
        info!(columns = keys.len(), "feature layout");
        debug!(keys = ?keys, "feature keys");
        Ok(())
    }

    fn write_row(&mut self, row: &FeatureRow) -> Result<(), SinkError> {
        self.rows += 1;
        let filled = row.values.iter().filter(|v| !v.is_nan()).count();
        info!(
            row = self.rows,
            timestamp_ms = row.timestamp_ms,
            filled,
            columns = row.values.len(),
            "feature row"
        );
        Ok(())
    }
}
