//! The concurrent dump pipeline.
//!
//! Per database: select it, write `SELECT <db>`, list the keys, split them
//! into batches and let a pool of workers turn every key into reconstruction
//! commands. Per-key failures are reported through the diagnostics sink and
//! stop the submission of new batches; structural failures (connect, select,
//! key listing, keyspace parsing) abort the dump and are returned.

pub mod aggregator;
pub mod dispatcher;
pub mod fetcher;
pub mod keyspace;
pub mod worker;

use std::sync::Arc;

use bytes::Bytes;
use dump_error::{DumpError, DumpResult, ResultExt};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

pub use aggregator::{ErrorAggregator, KeyDumpError};
pub use dispatcher::split_batches;
pub use fetcher::ValueFetcher;
pub use keyspace::{parse_keyspace_info, DEFAULT_MAX_DB_INDEX};

use crate::{
    client::{ClientConfig, RespConnector},
    command,
    output::{ConsoleSink, SharedSink},
    serializer::Serializer,
    store::{ConnectionPool, DbIndex, KeyspaceStore, StoreConnector},
};

/// Ordered keys taken by one worker.
pub type Batch = Vec<Bytes>;

/// Where progress notifications go.
pub type ProgressSender = mpsc::Sender<ProgressNotification>;

/// Keys queued for the workers so far in the current database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressNotification {
    pub done: usize,
    pub total: usize,
}

/// Tuning of a dump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpOptions {
    /// Concurrent workers, also the connection pool size
    pub workers: usize,
    /// Keys per batch
    pub batch_size: usize,
    /// Emit `EXPIREAT` for keys with a TTL
    pub with_ttl: bool,
    /// Highest database index accepted from the keyspace report
    pub max_db_index: u32,
    /// Glob for the key listing
    pub key_pattern: String,
}

impl Default for DumpOptions {
    fn default() -> Self {
        Self {
            workers: 10,
            batch_size: 100,
            with_ttl: true,
            max_db_index: DEFAULT_MAX_DB_INDEX,
            key_pattern: "*".to_string(),
        }
    }
}

impl DumpOptions {
    pub fn with_workers(
        mut self,
        workers: usize,
    ) -> Self {
        self.workers = workers;
        self
    }

    pub fn validate(&self) -> DumpResult<()> {
        let invalid = |reason: &str| DumpError::InvalidOptions {
            reason: reason.to_string(),
        };
        if self.workers == 0 {
            return Err(invalid("workers must be at least 1").into());
        }
        if self.batch_size == 0 {
            return Err(invalid("batch size must be at least 1").into());
        }
        if self.key_pattern.is_empty() {
            return Err(invalid("key pattern must not be empty").into());
        }
        Ok(())
    }
}

/// Dumps databases reachable through a [`StoreConnector`].
pub struct Dumper<C: StoreConnector> {
    connector: Arc<C>,
    options: DumpOptions,
    serializer: Serializer,
    sink: SharedSink,
    diagnostics: SharedSink,
}

impl<C: StoreConnector> Dumper<C> {
    /// Default options, RESP output, diagnostics on stderr.
    pub fn new(
        connector: C,
        sink: SharedSink,
    ) -> Self {
        Self {
            connector: Arc::new(connector),
            options: DumpOptions::default(),
            serializer: Serializer::default(),
            sink,
            diagnostics: Arc::new(ConsoleSink::stderr()),
        }
    }

    pub fn with_options(
        mut self,
        options: DumpOptions,
    ) -> Self {
        self.options = options;
        self
    }

    pub fn with_serializer(
        mut self,
        serializer: Serializer,
    ) -> Self {
        self.serializer = serializer;
        self
    }

    pub fn with_diagnostics(
        mut self,
        diagnostics: SharedSink,
    ) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn options(&self) -> &DumpOptions {
        &self.options
    }

    /// Dumps every non-empty database, one after another.
    pub async fn dump_server(
        &self,
        progress: Option<&ProgressSender>,
    ) -> DumpResult<()> {
        self.options.validate()?;

        let dbs = self.database_indices().await?;
        info!(databases = ?dbs, "dumping server {}", self.connector.endpoint());

        for db in dbs {
            self.dump_db(db, progress)
                .await
                .with_context(|| format!("dump of database {db}"))?;
        }

        self.sink.flush();
        Ok(())
    }

    /// Indices of the non-empty databases, from one `INFO keyspace` query.
    pub async fn database_indices(&self) -> DumpResult<Vec<DbIndex>> {
        let mut conn = self
            .connector
            .connect()
            .await
            .with_context(|| format!("connect to {}", self.connector.endpoint()))?;
        let info = conn.keyspace_info().await.context("INFO keyspace")?;
        parse_keyspace_info(&info, self.options.max_db_index)
    }

    /// Dumps one database.
    ///
    /// Key errors do not make this fail; they are reported through the
    /// diagnostics sink.
    pub async fn dump_db(
        &self,
        db: DbIndex,
        progress: Option<&ProgressSender>,
    ) -> DumpResult<()> {
        self.options.validate()?;
        let opts = &self.options;

        let errors = ErrorAggregator::spawn(Arc::clone(&self.diagnostics));

        let pool = ConnectionPool::new(Arc::clone(&self.connector), opts.workers, Some(db))
            .await
            .context("connection pool setup")?;

        let keys = {
            let mut conn = pool.get().await?;
            conn.select(db)
                .await
                .with_context(|| format!("SELECT {db}"))?;
            self.sink
                .write_line(&self.serializer.serialize(&command::select(db)));

            conn.keys(&opts.key_pattern)
                .await
                .with_context(|| format!("KEYS {}", opts.key_pattern))?
        };
        info!(db, keys = keys.len(), workers = opts.workers, "dumping database");

        let (work_tx, work_rx) = mpsc::channel::<Batch>(1);
        let fetcher = ValueFetcher::new(self.serializer, Arc::clone(&self.sink), opts.with_ttl);
        let mut workers = worker::spawn_workers(
            opts.workers,
            Arc::new(Mutex::new(work_rx)),
            Arc::clone(&pool),
            fetcher,
            errors.sender(),
        );

        let submitted =
            dispatcher::dispatch(&keys, opts.batch_size, &work_tx, &errors, progress).await;
        drop(work_tx);
        debug!(db, submitted, "all batches submitted");

        let mut failure = None;
        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                warn!(db, "worker task failed: {e}");
                failure.get_or_insert_with(|| DumpError::WorkerFailed {
                    reason: e.to_string(),
                });
            }
        }

        let error_count = errors.finish().await;
        self.sink.flush();

        if error_count > 0 {
            warn!(db, errors = error_count, "database dumped with key errors");
        } else {
            info!(db, "database dumped");
        }

        match failure {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }
}

/// Dumps database `db` of the server at `addr` (`host:port`).
pub async fn dump_db(
    addr: &str,
    db: DbIndex,
    workers: usize,
    sink: SharedSink,
    serializer: Serializer,
    progress: Option<ProgressSender>,
) -> DumpResult<()> {
    Dumper::new(RespConnector::new(addr, ClientConfig::default()), sink)
        .with_options(DumpOptions::default().with_workers(workers))
        .with_serializer(serializer)
        .dump_db(db, progress.as_ref())
        .await
}

/// Dumps every non-empty database of the server at `addr` (`host:port`).
pub async fn dump_server(
    addr: &str,
    workers: usize,
    sink: SharedSink,
    serializer: Serializer,
    progress: Option<ProgressSender>,
) -> DumpResult<()> {
    Dumper::new(RespConnector::new(addr, ClientConfig::default()), sink)
        .with_options(DumpOptions::default().with_workers(workers))
        .with_serializer(serializer)
        .dump_server(progress.as_ref())
        .await
}
