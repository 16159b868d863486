/// RESP client: TCP connection and typed store queries.
pub mod client;
/// Reconstruction command builders (SET, RPUSH, SADD, HSET, ZADD, ...).
pub mod command;
/// Layered settings loading.
pub mod config;
/// The concurrent dump pipeline.
pub mod dump;
/// Crate-local error types.
pub mod error;
/// `tracing` subscriber setup.
pub mod logging;
/// Dump and diagnostics sinks.
pub mod output;
/// RESP2 frames, decoder and encoder.
pub mod protocol;
/// Output formats for commands.
pub mod serializer;
/// Store query interface and connection pool.
pub mod store;

// -----------------------------------------------------------------------------
//  Frequently used public types
// -----------------------------------------------------------------------------

pub use client::{ClientConfig, RespConnection, RespConnector, StoreClient};
pub use command::Command;
pub use config::DumpSettings;
pub use dump::{
    dump_db, dump_server, DumpOptions, Dumper, KeyDumpError, ProgressNotification,
    ProgressSender,
};
pub use dump_error::{DumpResult, StackError, StatusCode};
pub use error::SettingsError;
pub use output::{ConsoleSink, FileSink, MemorySink, OutputSink, SharedSink};
pub use protocol::{RespDecoder, RespEncoder, RespFrame};
pub use serializer::Serializer;
pub use store::{ConnectionPool, DbIndex, KeyType, KeyspaceStore, StoreConnector};
