use std::sync::Arc;

use bytes::Bytes;
use tokio::{
    sync::{mpsc, Mutex},
    task::JoinSet,
};
use tracing::{debug, trace};

use super::{aggregator::KeyDumpError, fetcher::ValueFetcher, Batch};
use crate::store::{ConnectionPool, StoreConnector};

/// Receiving end of the work channel, shared by all workers.
pub type SharedReceiver = Arc<Mutex<mpsc::Receiver<Batch>>>;

/// Starts `count` workers pulling batches from `batches` until the channel
/// is closed and drained.
pub fn spawn_workers<C: StoreConnector>(
    count: usize,
    batches: SharedReceiver,
    pool: Arc<ConnectionPool<C>>,
    fetcher: ValueFetcher,
    errors: mpsc::Sender<KeyDumpError>,
) -> JoinSet<()> {
    let mut workers = JoinSet::new();
    for id in 0..count {
        workers.spawn(run_worker(
            id,
            Arc::clone(&batches),
            Arc::clone(&pool),
            fetcher.clone(),
            errors.clone(),
        ));
    }
    workers
}

async fn run_worker<C: StoreConnector>(
    id: usize,
    batches: SharedReceiver,
    pool: Arc<ConnectionPool<C>>,
    fetcher: ValueFetcher,
    errors: mpsc::Sender<KeyDumpError>,
) {
    loop {
        // The lock is only held while waiting for the next batch.
        let next = batches.lock().await.recv().await;
        let Some(batch) = next else {
            break;
        };

        trace!(worker = id, keys = batch.len(), "batch received");
        for key in batch {
            if let Err(error) = dump_one(&pool, &fetcher, &key).await {
                let report = KeyDumpError { key, error };
                if errors.send(report).await.is_err() {
                    debug!(worker = id, "error collector is gone");
                }
            }
        }
    }

    debug!(worker = id, "worker finished");
}

async fn dump_one<C: StoreConnector>(
    pool: &Arc<ConnectionPool<C>>,
    fetcher: &ValueFetcher,
    key: &Bytes,
) -> dump_error::DumpResult<()> {
    let mut conn = pool.get().await?;
    match fetcher.dump_key(&mut *conn, key).await {
        Ok(()) => Ok(()),
        Err(e) => {
            // The connection state is unknown after a transport failure.
            if e.is_transport_failure() {
                conn.discard();
            }
            Err(e)
        }
    }
}
