use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::debug;

use super::{aggregator::ErrorAggregator, Batch, ProgressNotification, ProgressSender};

/// Splits keys into contiguous batches of at most `batch_size`, in order.
pub fn split_batches(
    keys: &[Bytes],
    batch_size: usize,
) -> impl Iterator<Item = Batch> + '_ {
    keys.chunks(batch_size.max(1)).map(<[Bytes]>::to_vec)
}

/// Feeds batches to the workers.
///
/// The work channel holds one batch, so a send returns once the batch is
/// queued, not when a worker takes it. Progress is reported per queued
/// batch. Submission stops at the first collected key error; batches
/// already queued still run, so one more batch may run after the error.
/// Returns the number of batches queued.
pub async fn dispatch(
    keys: &[Bytes],
    batch_size: usize,
    work: &mpsc::Sender<Batch>,
    errors: &ErrorAggregator,
    progress: Option<&ProgressSender>,
) -> usize {
    let total = keys.len();
    let mut submitted = 0;
    let mut done = 0;

    for batch in split_batches(keys, batch_size) {
        if errors.error_count() > 0 {
            debug!(submitted, "key errors reported, no further batches");
            break;
        }

        done += batch.len();
        if work.send(batch).await.is_err() {
            debug!("all workers are gone");
            break;
        }
        submitted += 1;

        if let Some(progress) = progress {
            // A dropped receiver only means nobody is watching.
            let _ = progress.send(ProgressNotification { done, total }).await;
        }
    }

    submitted
}
