use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::sink::{FeatureRow, FeatureSink, SinkError};
use crate::table::SharedTable;

/// Periodic exporter of the feature vector
///
/// Every `cadence` it takes one consistent read of the table and hands the
/// row to the sink. The header goes out once, and only if the sink is
/// empty when the assembler starts.
pub struct FeatureAssembler<S: FeatureSink> {
    table: SharedTable,
    sink: S,
    cadence: Duration,
    cancel: CancellationToken,
}

impl<S: FeatureSink> FeatureAssembler<S> {
    pub fn new(table: SharedTable, sink: S, cadence: Duration, cancel: CancellationToken) -> Self {
        Self {
            table,
            sink,
            cadence: cadence.max(Duration::from_millis(1)),
            cancel,
        }
    }

    /// Column names of the rows this assembler produces
    pub fn keys(&self) -> Vec<String> {
        self.table.read().keys().to_vec()
    }

    /// Build the row for `at`
    pub fn assemble(&self, at: DateTime<Utc>) -> FeatureRow {
        self.table.write().expire();
        let table = self.table.read();
        FeatureRow {
            timestamp_ms: at.timestamp_millis(),
            values: table.values(),
        }
    }

    /// Tick until cancelled. Returns the number of rows written and the
    /// sink, or the first fatal sink error.
    pub async fn run(mut self) -> Result<(u64, S), SinkError> {
        if self.sink.is_empty() {
            let keys = self.keys();
            self.sink.write_header(&keys)?;
            info!(columns = keys.len(), "wrote feature header");
        }

        let mut ticker = interval_at(Instant::now() + self.cadence, self.cadence);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut written = 0u64;
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let row = self.assemble(Utc::now());
            match self.sink.write_row(&row) {
                Ok(()) => written += 1,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => warn!(error = %e, timestamp_ms = row.timestamp_ms, "feature row not written"),
            }
        }

        self.sink.flush()?;
        info!(rows = written, "assembler stopped");
        Ok((written, self.sink))
    }
}
