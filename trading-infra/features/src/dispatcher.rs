use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use trading_core::ExchangeMessage;

use crate::table::SharedTable;

/// Drains the message queue into the statistics table
pub struct Dispatcher {
    table: SharedTable,
    cancel: CancellationToken,
}

impl Dispatcher {
    pub fn new(table: SharedTable, cancel: CancellationToken) -> Self {
        Self { table, cancel }
    }

    /// Run until cancelled or until every sender is gone. Returns the
    /// number of messages applied.
    pub async fn run(self, mut messages: mpsc::Receiver<ExchangeMessage>) -> u64 {
        let mut applied = 0u64;
        loop {
            let message = tokio::select! {
                _ = self.cancel.cancelled() => break,
                message = messages.recv() => match message {
                    Some(message) => message,
                    None => {
                        debug!("message queue closed");
                        break;
                    }
                },
            };
            self.dispatch(&message);
            applied += 1;
        }
        info!(applied, "dispatcher stopped");
        applied
    }

    /// Apply one message under the exclusive lock
    pub fn dispatch(&self, message: &ExchangeMessage) -> usize {
        self.table.write().observe(message)
    }
}
