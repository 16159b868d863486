use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use bytes::Bytes;
use dump_error::{LogLevel, StackError};
use thiserror::Error;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{error, warn};

use crate::output::SharedSink;

/// Capacity of the error channel. Workers wait when the collector lags.
const ERROR_CHANNEL_CAPACITY: usize = 64;

/// Failure to dump one key. Binary keys are shown lossily.
#[derive(Debug, Clone, Error)]
#[error("failed to dump key '{}': {error}", String::from_utf8_lossy(.key))]
pub struct KeyDumpError {
    pub key: Bytes,
    #[source]
    pub error: StackError,
}

/// Collects per-key errors from all workers.
///
/// A single task drains the channel, writes `Error: ...` to the diagnostics
/// sink and bumps a counter the dispatcher polls between batches.
pub struct ErrorAggregator {
    tx: mpsc::Sender<KeyDumpError>,
    count: Arc<AtomicUsize>,
    collector: JoinHandle<()>,
}

impl ErrorAggregator {
    pub fn spawn(diagnostics: SharedSink) -> Self {
        let (tx, mut rx) = mpsc::channel::<KeyDumpError>(ERROR_CHANNEL_CAPACITY);
        let count = Arc::new(AtomicUsize::new(0));

        let collector = {
            let count = Arc::clone(&count);
            tokio::spawn(async move {
                while let Some(err) = rx.recv().await {
                    log_key_error(&err);
                    diagnostics.write_line(format!("Error: {err}").as_bytes());
                    count.fetch_add(1, Ordering::SeqCst);
                }
                diagnostics.flush();
            })
        };

        Self {
            tx,
            count,
            collector,
        }
    }

    /// Sender for workers.
    pub fn sender(&self) -> mpsc::Sender<KeyDumpError> {
        self.tx.clone()
    }

    /// Errors collected so far.
    pub fn error_count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    /// Waits until every error sent so far is written and returns the total.
    ///
    /// All senders handed out by [`ErrorAggregator::sender`] must be dropped
    /// first, otherwise this never returns.
    pub async fn finish(self) -> usize {
        let Self {
            tx,
            count,
            collector,
        } = self;
        drop(tx);
        if let Err(e) = collector.await {
            warn!("error collector ended abnormally: {e}");
        }
        count.load(Ordering::SeqCst)
    }
}

/// Logs at the level the status code asks for, with the error's tags.
fn log_key_error(err: &KeyDumpError) {
    let key = String::from_utf8_lossy(&err.key);
    let tags = render_tags(&err.error.metrics_tags());
    match err.error.log_level() {
        LogLevel::Error => error!(%key, %tags, "{}", err.error),
        LogLevel::Warn => warn!(%key, %tags, "{}", err.error),
    }
}

fn render_tags(tags: &[(&'static str, String)]) -> String {
    tags.iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join(" ")
}
