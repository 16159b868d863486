//! Per-key value retrieval.

use chrono::Utc;
use dump_error::{DumpError, DumpResult, ResultExt};
use tracing::trace;

use crate::{
    command::{self, Command},
    output::SharedSink,
    serializer::Serializer,
    store::{KeyType, KeyspaceStore},
};

/// Reads one key and writes the commands that rebuild it.
#[derive(Clone)]
pub struct ValueFetcher {
    serializer: Serializer,
    sink: SharedSink,
    with_ttl: bool,
}

impl ValueFetcher {
    pub fn new(
        serializer: Serializer,
        sink: SharedSink,
        with_ttl: bool,
    ) -> Self {
        Self {
            serializer,
            sink,
            with_ttl,
        }
    }

    /// Dumps `key`: the value command first, then `EXPIREAT` when the key
    /// has a positive TTL.
    ///
    /// A key that no longer exists writes nothing. Any failed query aborts
    /// the key; output already written for it stays written.
    pub async fn dump_key<S>(
        &self,
        store: &mut S,
        key: &[u8],
    ) -> DumpResult<()>
    where
        S: KeyspaceStore + ?Sized,
    {
        let Some(cmd) = fetch_value(store, key).await? else {
            trace!(key = %String::from_utf8_lossy(key), "key vanished, skipped");
            return Ok(());
        };
        self.emit(&cmd);

        if self.with_ttl {
            let ttl = store.ttl(key).await.context("TTL")?;
            if let Some(cmd) = expiry_command(key, ttl, Utc::now().timestamp()) {
                self.emit(&cmd);
            }
        }

        Ok(())
    }

    fn emit(
        &self,
        cmd: &Command,
    ) {
        self.sink.write_line(&self.serializer.serialize(cmd));
    }
}

/// Reads a key according to its type.
///
/// `None` when the key is gone: type `none`, a nil string value, or a
/// collection that came back empty because the key was deleted between
/// `TYPE` and the read. An empty collection cannot exist in the store, and
/// `RPUSH key` with no items would not replay.
pub async fn fetch_value<S>(
    store: &mut S,
    key: &[u8],
) -> DumpResult<Option<Command>>
where
    S: KeyspaceStore + ?Sized,
{
    let key_type = store.key_type(key).await.context("TYPE")?;

    let cmd = match key_type {
        KeyType::String => store
            .get(key)
            .await
            .context("GET")?
            .map(|value| command::set(key, value)),
        KeyType::List => {
            let items = store.lrange_all(key).await.context("LRANGE")?;
            non_empty(items).map(|items| command::rpush(key, items))
        }
        KeyType::Set => {
            let members = store.smembers(key).await.context("SMEMBERS")?;
            non_empty(members).map(|members| command::sadd(key, members))
        }
        KeyType::Hash => {
            let pairs = store.hgetall(key).await.context("HGETALL")?;
            non_empty(pairs).map(|pairs| command::hset(key, pairs))
        }
        KeyType::SortedSet => {
            let flat = store
                .zrange_with_scores(key)
                .await
                .context("ZRANGEBYSCORE")?;
            non_empty(flat).map(|flat| command::zadd(key, flat))
        }
        KeyType::None => None,
        KeyType::Unrecognized(type_name) => {
            return Err(DumpError::UnrecognizedType {
                key: String::from_utf8_lossy(key).into_owned(),
                type_name,
            }
            .into())
        }
    };

    Ok(cmd)
}

fn non_empty<T>(items: Vec<T>) -> Option<Vec<T>> {
    (!items.is_empty()).then_some(items)
}

/// `EXPIREAT key now+ttl` for a positive TTL.
pub fn expiry_command(
    key: &[u8],
    ttl: i64,
    now_unix: i64,
) -> Option<Command> {
    (ttl > 0).then(|| command::expire_at(key, now_unix + ttl))
}
