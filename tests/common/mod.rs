//! In-memory store double shared by the integration tests.

#![allow(dead_code)]

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use bytes::Bytes;
use dump_error::{ClientError, DumpResult, StackError};
use parking_lot::Mutex;
use zumic_dump::{DbIndex, KeyType, KeyspaceStore, StoreConnector};

#[derive(Debug, Clone)]
pub enum Value {
    Str(Bytes),
    List(Vec<Bytes>),
    Set(Vec<Bytes>),
    Hash(Vec<(Bytes, Bytes)>),
    /// `(member, score)` in score order
    ZSet(Vec<(Bytes, Bytes)>),
    /// A type the dumper does not know
    Other(String),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    ttl: i64,
}

#[derive(Default)]
struct State {
    dbs: HashMap<DbIndex, BTreeMap<Bytes, Entry>>,
    /// Keys whose `TYPE` query fails
    failing: HashSet<Bytes>,
    /// Keys whose `TTL` query fails
    failing_ttl: HashSet<Bytes>,
    /// Keys deleted right after their `TYPE` was reported
    vanishing: HashSet<Bytes>,
    /// Overrides the generated `INFO keyspace` text
    keyspace_info: Option<String>,
}

/// Shared dataset plus query counters.
#[derive(Clone, Default)]
pub struct MemoryServer {
    state: Arc<Mutex<State>>,
    type_queries: Arc<AtomicUsize>,
    ttl_queries: Arc<AtomicUsize>,
    connections: Arc<AtomicUsize>,
}

impl MemoryServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &self,
        db: DbIndex,
        key: impl AsRef<[u8]>,
        value: Value,
    ) -> &Self {
        self.insert_with_ttl(db, key, value, -1)
    }

    pub fn insert_with_ttl(
        &self,
        db: DbIndex,
        key: impl AsRef<[u8]>,
        value: Value,
        ttl: i64,
    ) -> &Self {
        self.state
            .lock()
            .dbs
            .entry(db)
            .or_default()
            .insert(raw(key), Entry { value, ttl });
        self
    }

    pub fn fail_key(
        &self,
        key: impl AsRef<[u8]>,
    ) -> &Self {
        self.state.lock().failing.insert(raw(key));
        self
    }

    pub fn fail_ttl(
        &self,
        key: impl AsRef<[u8]>,
    ) -> &Self {
        self.state.lock().failing_ttl.insert(raw(key));
        self
    }

    /// Deletes `key` once its type has been reported, like a concurrent
    /// `DEL` landing between `TYPE` and the read.
    pub fn vanish_after_type(
        &self,
        key: impl AsRef<[u8]>,
    ) -> &Self {
        self.state.lock().vanishing.insert(raw(key));
        self
    }

    pub fn set_keyspace_info(
        &self,
        info: &str,
    ) -> &Self {
        self.state.lock().keyspace_info = Some(info.to_string());
        self
    }

    pub fn type_queries(&self) -> usize {
        self.type_queries.load(Ordering::SeqCst)
    }

    pub fn ttl_queries(&self) -> usize {
        self.ttl_queries.load(Ordering::SeqCst)
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    pub fn connector(&self) -> MemoryConnector {
        MemoryConnector {
            server: self.clone(),
            refuse: false,
        }
    }

    /// A connector whose every connection attempt fails.
    pub fn refusing_connector(&self) -> MemoryConnector {
        MemoryConnector {
            server: self.clone(),
            refuse: true,
        }
    }
}

pub struct MemoryConnector {
    server: MemoryServer,
    refuse: bool,
}

#[async_trait]
impl StoreConnector for MemoryConnector {
    type Connection = MemoryStore;

    async fn connect(&self) -> DumpResult<MemoryStore> {
        if self.refuse {
            return Err(ClientError::ConnectionFailed {
                address: self.endpoint(),
                reason: "connection refused".to_string(),
            }
            .into());
        }
        self.server.connections.fetch_add(1, Ordering::SeqCst);
        Ok(MemoryStore {
            server: self.server.clone(),
            db: 0,
        })
    }

    fn endpoint(&self) -> String {
        "memory".to_string()
    }
}

/// One connection to a [`MemoryServer`].
pub struct MemoryStore {
    server: MemoryServer,
    db: DbIndex,
}

impl MemoryStore {
    fn with_entry<T>(
        &self,
        key: &[u8],
        f: impl FnOnce(Option<&Entry>) -> T,
    ) -> T {
        let state = self.server.state.lock();
        f(state.dbs.get(&self.db).and_then(|db| db.get(key)))
    }

    fn wrong_type(command: &str) -> StackError {
        ClientError::ServerError {
            message: format!("WRONGTYPE {command}"),
        }
        .into()
    }
}

#[async_trait]
impl KeyspaceStore for MemoryStore {
    async fn key_type(
        &mut self,
        key: &[u8],
    ) -> DumpResult<KeyType> {
        self.server.type_queries.fetch_add(1, Ordering::SeqCst);
        if self.server.state.lock().failing.contains(key) {
            return Err(ClientError::ReadTimeout.into());
        }
        let key_type = self.with_entry(key, |entry| match entry.map(|e| &e.value) {
            None => KeyType::None,
            Some(Value::Str(_)) => KeyType::String,
            Some(Value::List(_)) => KeyType::List,
            Some(Value::Set(_)) => KeyType::Set,
            Some(Value::Hash(_)) => KeyType::Hash,
            Some(Value::ZSet(_)) => KeyType::SortedSet,
            Some(Value::Other(name)) => KeyType::Unrecognized(name.clone()),
        });

        let mut state = self.server.state.lock();
        if state.vanishing.contains(key) {
            if let Some(db) = state.dbs.get_mut(&self.db) {
                db.remove(key);
            }
        }
        Ok(key_type)
    }

    async fn get(
        &mut self,
        key: &[u8],
    ) -> DumpResult<Option<Bytes>> {
        self.with_entry(key, |entry| match entry.map(|e| &e.value) {
            None => Ok(None),
            Some(Value::Str(s)) => Ok(Some(s.clone())),
            Some(_) => Err(Self::wrong_type("GET")),
        })
    }

    async fn lrange_all(
        &mut self,
        key: &[u8],
    ) -> DumpResult<Vec<Bytes>> {
        self.with_entry(key, |entry| match entry.map(|e| &e.value) {
            None => Ok(vec![]),
            Some(Value::List(items)) => Ok(items.clone()),
            Some(_) => Err(Self::wrong_type("LRANGE")),
        })
    }

    async fn smembers(
        &mut self,
        key: &[u8],
    ) -> DumpResult<Vec<Bytes>> {
        self.with_entry(key, |entry| match entry.map(|e| &e.value) {
            None => Ok(vec![]),
            Some(Value::Set(items)) => Ok(items.clone()),
            Some(_) => Err(Self::wrong_type("SMEMBERS")),
        })
    }

    async fn hgetall(
        &mut self,
        key: &[u8],
    ) -> DumpResult<Vec<(Bytes, Bytes)>> {
        self.with_entry(key, |entry| match entry.map(|e| &e.value) {
            None => Ok(vec![]),
            Some(Value::Hash(pairs)) => Ok(pairs.clone()),
            Some(_) => Err(Self::wrong_type("HGETALL")),
        })
    }

    async fn zrange_with_scores(
        &mut self,
        key: &[u8],
    ) -> DumpResult<Vec<Bytes>> {
        self.with_entry(key, |entry| match entry.map(|e| &e.value) {
            None => Ok(vec![]),
            Some(Value::ZSet(pairs)) => Ok(pairs
                .iter()
                .flat_map(|(member, score)| [member.clone(), score.clone()])
                .collect()),
            Some(_) => Err(Self::wrong_type("ZRANGEBYSCORE")),
        })
    }

    async fn ttl(
        &mut self,
        key: &[u8],
    ) -> DumpResult<i64> {
        self.server.ttl_queries.fetch_add(1, Ordering::SeqCst);
        if self.server.state.lock().failing_ttl.contains(key) {
            return Err(ClientError::ConnectionClosed.into());
        }
        Ok(self.with_entry(key, |entry| entry.map_or(-2, |e| e.ttl)))
    }

    async fn keys(
        &mut self,
        pattern: &str,
    ) -> DumpResult<Vec<Bytes>> {
        let state = self.server.state.lock();
        let Some(db) = state.dbs.get(&self.db) else {
            return Ok(vec![]);
        };
        let prefix = pattern.strip_suffix('*');
        Ok(db
            .keys()
            .filter(|k| match prefix {
                Some(prefix) => k.starts_with(prefix.as_bytes()),
                None => k.as_ref() == pattern.as_bytes(),
            })
            .cloned()
            .collect())
    }

    async fn keyspace_info(&mut self) -> DumpResult<String> {
        let state = self.server.state.lock();
        if let Some(info) = &state.keyspace_info {
            return Ok(info.clone());
        }

        let mut dbs: Vec<_> = state
            .dbs
            .iter()
            .filter(|(_, keys)| !keys.is_empty())
            .collect();
        dbs.sort_by_key(|(db, _)| **db);

        let mut info = String::from("# Keyspace\r\n");
        for (db, keys) in dbs {
            info.push_str(&format!("db{db}:keys={},expires=0,avg_ttl=0\r\n", keys.len()));
        }
        Ok(info)
    }

    async fn select(
        &mut self,
        db: DbIndex,
    ) -> DumpResult<()> {
        self.db = db;
        Ok(())
    }
}

pub fn raw(v: impl AsRef<[u8]>) -> Bytes {
    Bytes::copy_from_slice(v.as_ref())
}

pub fn s(v: impl AsRef<[u8]>) -> Value {
    Value::Str(raw(v))
}

pub fn strings(items: &[&str]) -> Vec<Bytes> {
    items.iter().map(raw).collect()
}

pub fn pairs(items: &[(&str, &str)]) -> Vec<(Bytes, Bytes)> {
    items.iter().map(|(a, b)| (raw(a), raw(b))).collect()
}
