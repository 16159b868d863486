//! Store query interface consumed by the dump pipeline.
//!
//! The pipeline only talks to [`KeyspaceStore`]; the RESP client in
//! [`crate::client`] is one implementation, the in-memory doubles of the test
//! suite are another.

pub mod pool;

use std::{fmt, str::FromStr};

use async_trait::async_trait;
use bytes::Bytes;
use dump_error::DumpResult;

pub use pool::{ConnectionPool, PooledConnection};

/// Logical database index.
pub type DbIndex = u32;

/// Type of a key as reported by the store's `TYPE` query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyType {
    String,
    List,
    Set,
    Hash,
    SortedSet,
    /// The key does not exist (or expired after enumeration).
    None,
    /// Any other type name, kept verbatim for error reporting.
    Unrecognized(String),
}

impl KeyType {
    /// Type name as spelled by the store.
    pub fn as_str(&self) -> &str {
        match self {
            Self::String => "string",
            Self::List => "list",
            Self::Set => "set",
            Self::Hash => "hash",
            Self::SortedSet => "zset",
            Self::None => "none",
            Self::Unrecognized(other) => other,
        }
    }
}

impl From<&str> for KeyType {
    fn from(s: &str) -> Self {
        match s {
            "string" => Self::String,
            "list" => Self::List,
            "set" => Self::Set,
            "hash" => Self::Hash,
            "zset" => Self::SortedSet,
            "none" => Self::None,
            other => Self::Unrecognized(other.to_string()),
        }
    }
}

impl FromStr for KeyType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}

impl fmt::Display for KeyType {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Blocking request/response queries against one store connection.
///
/// Every call is a single round trip; failures are transport, protocol or
/// server errors and are never retried. Keys and values are binary safe.
#[async_trait]
pub trait KeyspaceStore: Send {
    /// `TYPE key`
    async fn key_type(
        &mut self,
        key: &[u8],
    ) -> DumpResult<KeyType>;

    /// `GET key`; `None` when the key no longer exists.
    async fn get(
        &mut self,
        key: &[u8],
    ) -> DumpResult<Option<Bytes>>;

    /// `LRANGE key 0 -1`
    async fn lrange_all(
        &mut self,
        key: &[u8],
    ) -> DumpResult<Vec<Bytes>>;

    /// `SMEMBERS key`
    async fn smembers(
        &mut self,
        key: &[u8],
    ) -> DumpResult<Vec<Bytes>>;

    /// `HGETALL key` as field/value pairs in reply order.
    async fn hgetall(
        &mut self,
        key: &[u8],
    ) -> DumpResult<Vec<(Bytes, Bytes)>>;

    /// `ZRANGEBYSCORE key -inf +inf WITHSCORES`: flat
    /// `[member, score, member, score, ...]`.
    async fn zrange_with_scores(
        &mut self,
        key: &[u8],
    ) -> DumpResult<Vec<Bytes>>;

    /// `TTL key` in seconds (`-1` no expiry, `-2` missing key).
    async fn ttl(
        &mut self,
        key: &[u8],
    ) -> DumpResult<i64>;

    /// `KEYS pattern`
    async fn keys(
        &mut self,
        pattern: &str,
    ) -> DumpResult<Vec<Bytes>>;

    /// `INFO keyspace`
    async fn keyspace_info(&mut self) -> DumpResult<String>;

    /// `SELECT db`
    async fn select(
        &mut self,
        db: DbIndex,
    ) -> DumpResult<()>;
}

/// Opens new store connections.
#[async_trait]
pub trait StoreConnector: Send + Sync + 'static {
    type Connection: KeyspaceStore + 'static;

    async fn connect(&self) -> DumpResult<Self::Connection>;

    /// Human readable endpoint, for logs.
    fn endpoint(&self) -> String;
}
