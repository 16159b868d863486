use std::{
    ops::{Deref, DerefMut},
    sync::Arc,
};

use dump_error::{ensure, DumpResult, GenericError, ResultExt, StatusCode};
use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

use super::{DbIndex, KeyspaceStore, StoreConnector};

/// Пул соединений с хранилищем фиксированного размера.
///
/// Все соединения открываются сразу, так что ошибка настройки видна до
/// начала работы. Если задана база, каждое открытое пулом соединение (и
/// замена тоже) сначала переключается на неё.
pub struct ConnectionPool<C: StoreConnector> {
    connector: Arc<C>,
    db: Option<DbIndex>,
    idle: Mutex<Vec<C::Connection>>,
    permits: Arc<Semaphore>,
    size: usize,
}

impl<C: StoreConnector> ConnectionPool<C> {
    pub async fn new(
        connector: Arc<C>,
        size: usize,
        db: Option<DbIndex>,
    ) -> DumpResult<Arc<Self>> {
        ensure!(
            size > 0,
            StatusCode::InvalidArgs,
            "connection pool size must be positive"
        );

        let mut idle = Vec::with_capacity(size);
        for _ in 0..size {
            idle.push(Self::open(&connector, db).await?);
        }
        debug!(size, ?db, endpoint = %connector.endpoint(), "connection pool ready");

        Ok(Arc::new(Self {
            connector,
            db,
            idle: Mutex::new(idle),
            permits: Arc::new(Semaphore::new(size)),
            size,
        }))
    }

    async fn open(
        connector: &C,
        db: Option<DbIndex>,
    ) -> DumpResult<C::Connection> {
        let mut conn = connector
            .connect()
            .await
            .with_context(|| format!("connect to {}", connector.endpoint()))?;
        if let Some(db) = db {
            conn.select(db)
                .await
                .with_context(|| format!("SELECT {db}"))?;
        }
        Ok(conn)
    }

    /// Выдаёт соединение; ждёт, пока все заняты.
    pub async fn get(self: &Arc<Self>) -> DumpResult<PooledConnection<C>> {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| GenericError::new(StatusCode::Internal, "connection pool closed"))?;

        let reused = self.idle.lock().pop();
        let conn = match reused {
            Some(conn) => conn,
            None => {
                debug!(db = ?self.db, "opening replacement connection");
                Self::open(&self.connector, self.db).await?
            }
        };

        Ok(PooledConnection {
            conn: Some(conn),
            pool: Arc::clone(self),
            _permit: permit,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn idle_count(&self) -> usize {
        self.idle.lock().len()
    }
}

/// Выданное соединение. При drop возвращается в пул, если не был вызван
/// [`PooledConnection::discard`].
pub struct PooledConnection<C: StoreConnector> {
    conn: Option<C::Connection>,
    pool: Arc<ConnectionPool<C>>,
    // Освобождается после того, как `Drop::drop` вернул соединение.
    _permit: OwnedSemaphorePermit,
}

impl<C: StoreConnector> PooledConnection<C> {
    /// Закрывает соединение вместо возврата; пул откроет новое при
    /// следующей выдаче.
    pub fn discard(mut self) {
        self.conn.take();
    }
}

impl<C: StoreConnector> Deref for PooledConnection<C> {
    type Target = C::Connection;

    fn deref(&self) -> &Self::Target {
        self.conn
            .as_ref()
            .expect("pooled connection is present until drop")
    }
}

impl<C: StoreConnector> DerefMut for PooledConnection<C> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.conn
            .as_mut()
            .expect("pooled connection is present until drop")
    }
}

impl<C: StoreConnector> Drop for PooledConnection<C> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.idle.lock().push(conn);
        }
    }
}
