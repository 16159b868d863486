mod common;

use std::{collections::BTreeSet, sync::Arc};

use bytes::Bytes;
use chrono::Utc;
use common::{pairs, raw, s, strings, MemoryConnector, MemoryServer, Value};
use dump_error::StatusCode;
use tokio::sync::mpsc;
use zumic_dump::{
    dump::{fetcher, ValueFetcher},
    DumpOptions, Dumper, MemorySink, ProgressNotification, RespDecoder, Serializer,
    StoreConnector,
};

struct Harness {
    dumper: Dumper<MemoryConnector>,
    out: Arc<MemorySink>,
    diagnostics: Arc<MemorySink>,
}

fn harness(
    server: &MemoryServer,
    options: DumpOptions,
    serializer: Serializer,
) -> Harness {
    let out = Arc::new(MemorySink::new());
    let diagnostics = Arc::new(MemorySink::new());
    let dumper = Dumper::new(server.connector(), out.clone())
        .with_options(options)
        .with_serializer(serializer)
        .with_diagnostics(diagnostics.clone());
    Harness {
        dumper,
        out,
        diagnostics,
    }
}

fn single_worker() -> DumpOptions {
    DumpOptions::default().with_workers(1)
}

fn numbered_keys(
    server: &MemoryServer,
    db: u32,
    n: usize,
) {
    for i in 0..n {
        server.insert(db, &format!("k{i:03}"), s(&i.to_string()));
    }
}

#[tokio::test]
async fn test_single_string_key_as_text() {
    let server = MemoryServer::new();
    server.insert(0, "greeting", s("hi"));

    let h = harness(&server, single_worker(), Serializer::Text);
    h.dumper.dump_db(0, None).await.unwrap();

    assert_eq!(h.out.lines(), vec!["SELECT 0", "SET greeting hi"]);
    assert!(h.diagnostics.is_empty());
}

#[tokio::test]
async fn test_every_type_with_ttl() {
    let server = MemoryServer::new();
    server
        .insert(
            0,
            "h",
            Value::Hash(pairs(&[("f1", "v1"), ("f2", "v2")])),
        )
        .insert(0, "l", Value::List(strings(&["c", "a", "b"])))
        .insert(0, "s", Value::Set(strings(&["x", "y"])))
        .insert_with_ttl(0, "str", s("v"), 120)
        .insert(
            0,
            "z",
            Value::ZSet(pairs(&[("a", "1"), ("b", "2")])),
        );

    let h = harness(&server, single_worker(), Serializer::Text);
    let before = Utc::now().timestamp();
    h.dumper.dump_db(0, None).await.unwrap();
    let after = Utc::now().timestamp();

    let lines = h.out.lines();
    assert_eq!(
        lines[..5],
        [
            "SELECT 0",
            "HSET h f1 v1 f2 v2",
            "RPUSH l c a b",
            "SADD s x y",
            "SET str v",
        ]
    );
    assert_eq!(lines[6], "ZADD z 1 a 2 b");
    assert_eq!(lines.len(), 7);

    let expire_at: i64 = lines[5]
        .strip_prefix("EXPIREAT str ")
        .expect("EXPIREAT follows the value command")
        .parse()
        .unwrap();
    assert!((before + 120..=after + 120).contains(&expire_at));
}

#[tokio::test]
async fn test_no_expireat_without_positive_ttl() {
    let server = MemoryServer::new();
    server
        .insert_with_ttl(0, "persistent", s("1"), -1)
        .insert_with_ttl(0, "zero", s("2"), 0);

    let h = harness(&server, single_worker(), Serializer::Text);
    h.dumper.dump_db(0, None).await.unwrap();

    assert_eq!(
        h.out.lines(),
        vec!["SELECT 0", "SET persistent 1", "SET zero 2"]
    );
    assert_eq!(server.ttl_queries(), 2);
}

#[tokio::test]
async fn test_ttl_capture_can_be_disabled() {
    let server = MemoryServer::new();
    server.insert_with_ttl(0, "session", s("abc"), 300);

    let options = DumpOptions {
        with_ttl: false,
        ..single_worker()
    };
    let h = harness(&server, options, Serializer::Text);
    h.dumper.dump_db(0, None).await.unwrap();

    assert_eq!(h.out.lines(), vec!["SELECT 0", "SET session abc"]);
    assert_eq!(server.ttl_queries(), 0);
}

#[tokio::test]
async fn test_unrecognized_type_is_reported_not_fatal() {
    let server = MemoryServer::new();
    server
        .insert(0, "events", Value::Other("stream".to_string()))
        .insert(0, "ok", s("1"));

    let h = harness(&server, single_worker(), Serializer::Text);
    h.dumper.dump_db(0, None).await.unwrap();

    assert_eq!(h.out.lines(), vec!["SELECT 0", "SET ok 1"]);
    assert_eq!(
        h.diagnostics.lines(),
        vec!["Error: failed to dump key 'events': Key events is of unrecognized type stream"]
    );
}

#[tokio::test]
async fn test_missing_key_writes_nothing() {
    let server = MemoryServer::new();
    let mut store = server.connector().connect().await.unwrap();

    assert!(fetcher::fetch_value(&mut store, b"gone")
        .await
        .unwrap()
        .is_none());

    let out = Arc::new(MemorySink::new());
    let value_fetcher = ValueFetcher::new(Serializer::Text, out.clone(), true);
    value_fetcher.dump_key(&mut store, b"gone").await.unwrap();

    assert!(out.is_empty());
    assert_eq!(server.ttl_queries(), 0);
}

#[tokio::test]
async fn test_ttl_failure_keeps_value_command() {
    let server = MemoryServer::new();
    server.insert(0, "a", s("1")).insert(0, "b", s("2")).fail_ttl("a");

    let h = harness(&server, single_worker(), Serializer::Text);
    h.dumper.dump_db(0, None).await.unwrap();

    assert_eq!(h.out.lines(), vec!["SELECT 0", "SET a 1", "SET b 2"]);
    assert_eq!(h.diagnostics.len(), 1);
    assert!(h.diagnostics.lines()[0].starts_with("Error: failed to dump key 'a': TTL"));
    // The failed connection was dropped and replaced for key `b`.
    assert_eq!(server.connections(), 2);
}

#[tokio::test]
async fn test_progress_is_monotonic_and_complete() {
    let server = MemoryServer::new();
    numbered_keys(&server, 0, 250);

    let (tx, mut rx) = mpsc::channel(16);
    let h = harness(
        &server,
        DumpOptions::default().with_workers(3),
        Serializer::Text,
    );
    h.dumper.dump_db(0, Some(&tx)).await.unwrap();
    drop(tx);

    let mut seen = Vec::new();
    while let Some(ProgressNotification { done, total }) = rx.recv().await {
        seen.push((done, total));
    }
    assert_eq!(seen, vec![(100, 250), (200, 250), (250, 250)]);
    // SELECT plus one line per key.
    assert_eq!(h.out.len(), 251);
}

#[tokio::test]
async fn test_submission_stops_after_first_error() {
    let server = MemoryServer::new();
    numbered_keys(&server, 0, 100);
    server.fail_key("k000");

    let options = DumpOptions {
        batch_size: 1,
        ..single_worker()
    };
    let h = harness(&server, options, Serializer::Text);
    h.dumper.dump_db(0, None).await.unwrap();

    let diagnostics = h.diagnostics.lines();
    assert_eq!(diagnostics.len(), 1);
    assert!(diagnostics[0].contains("'k000'"));

    // The first batch was attempted, the tail of the keyspace never was.
    let attempted = server.type_queries();
    assert!(attempted >= 1);
    assert!(attempted < 100, "all {attempted} batches were submitted");
    assert_eq!(h.out.len(), attempted);
}

#[tokio::test]
async fn test_resp_stream_decodes_back() {
    let server = MemoryServer::new();
    numbered_keys(&server, 0, 20);

    let h = harness(
        &server,
        DumpOptions::default().with_workers(4),
        Serializer::Resp,
    );
    h.dumper.dump_db(0, None).await.unwrap();

    let stream = h.out.bytes();
    let mut buf = stream.as_slice();
    let mut commands = Vec::new();
    while !buf.is_empty() {
        let (args, consumed) = RespDecoder::decode_request(buf).unwrap().unwrap();
        commands.push(args);
        buf = &buf[consumed..];
        // Each serialized command ends in CRLF and the sink adds nothing.
        assert!(!buf.starts_with(b"\n"));
    }

    assert_eq!(commands[0], vec!["SELECT", "0"]);
    let sets: BTreeSet<Vec<Bytes>> = commands[1..].iter().cloned().collect();
    let expected: BTreeSet<Vec<Bytes>> = (0..20)
        .map(|i| strings(&["SET", &format!("k{i:03}"), &i.to_string()]))
        .collect();
    assert_eq!(sets, expected);
}

#[tokio::test]
async fn test_dump_server_walks_databases_in_order() {
    let server = MemoryServer::new();
    server.insert(0, "a", s("1")).insert(5, "b", s("2"));

    let h = harness(
        &server,
        DumpOptions::default().with_workers(2),
        Serializer::Text,
    );
    assert_eq!(h.dumper.database_indices().await.unwrap(), vec![0, 5]);
    h.dumper.dump_server(None).await.unwrap();

    assert_eq!(
        h.out.lines(),
        vec!["SELECT 0", "SET a 1", "SELECT 5", "SET b 2"]
    );
}

#[tokio::test]
async fn test_dump_server_rejects_bad_keyspace() {
    for (info, code) in [
        ("db17:keys=1,expires=0", StatusCode::OutOfRange),
        ("dbx:keys=1,expires=0", StatusCode::ParseError),
    ] {
        let server = MemoryServer::new();
        server.set_keyspace_info(info);

        let h = harness(&server, single_worker(), Serializer::Text);
        let err = h.dumper.dump_server(None).await.unwrap_err();
        assert_eq!(err.status_code(), code, "{info}");
        assert!(h.out.is_empty());
    }
}

#[tokio::test]
async fn test_database_16_is_dumped_by_default() {
    let server = MemoryServer::new();
    server.insert(0, "a", s("1")).insert(16, "k", s("v"));

    let h = harness(&server, single_worker(), Serializer::Text);
    assert_eq!(h.dumper.database_indices().await.unwrap(), vec![0, 16]);
    h.dumper.dump_server(None).await.unwrap();

    assert_eq!(
        h.out.lines(),
        vec!["SELECT 0", "SET a 1", "SELECT 16", "SET k v"]
    );
}

#[tokio::test]
async fn test_max_db_index_moves_the_boundary() {
    let server = MemoryServer::new();
    server
        .insert(16, "k", s("v"))
        .set_keyspace_info("db16:keys=1,expires=0");

    let options = DumpOptions {
        max_db_index: 15,
        ..single_worker()
    };
    let h = harness(&server, options, Serializer::Text);
    let err = h.dumper.dump_server(None).await.unwrap_err();

    assert_eq!(err.status_code(), StatusCode::OutOfRange);
    assert!(h.out.is_empty());
}

#[tokio::test]
async fn test_binary_keys_and_values_survive_resp() {
    let server = MemoryServer::new();
    server
        .insert(0, b"\xff\xfe", s(b"\x00\xc3\x28"))
        .insert(0, b"list\x80", Value::List(vec![raw(b"\xe2\x28\xa1"), raw("ok")]))
        .insert(0, "good", s("value"));

    let h = harness(&server, single_worker(), Serializer::Resp);
    h.dumper.dump_db(0, None).await.unwrap();
    assert!(h.diagnostics.is_empty());

    let stream = h.out.bytes();
    let mut buf = stream.as_slice();
    let mut commands = Vec::new();
    while !buf.is_empty() {
        let (args, consumed) = RespDecoder::decode_request(buf).unwrap().unwrap();
        commands.push(args);
        buf = &buf[consumed..];
    }

    assert_eq!(
        commands,
        vec![
            vec![raw("SELECT"), raw("0")],
            vec![raw("SET"), raw("good"), raw("value")],
            vec![
                raw("RPUSH"),
                raw(b"list\x80"),
                raw(b"\xe2\x28\xa1"),
                raw("ok"),
            ],
            vec![raw("SET"), raw(b"\xff\xfe"), raw(b"\x00\xc3\x28")],
        ]
    );
}

#[tokio::test]
async fn test_binary_key_renders_lossily_as_text() {
    let server = MemoryServer::new();
    server.insert(0, b"k\xff", s("v"));

    let h = harness(&server, single_worker(), Serializer::Text);
    h.dumper.dump_db(0, None).await.unwrap();

    assert_eq!(h.out.lines(), vec!["SELECT 0", "SET k\u{fffd} v"]);
    assert_eq!(h.out.bytes(), b"SELECT 0\nSET k\xef\xbf\xbd v\n");
}

#[tokio::test]
async fn test_collections_deleted_after_type_write_nothing() {
    let server = MemoryServer::new();
    server
        .insert(0, "h", Value::Hash(pairs(&[("f", "v")])))
        .insert(0, "l", Value::List(strings(&["a"])))
        .insert(0, "s", Value::Set(strings(&["x"])))
        .insert(0, "z", Value::ZSet(pairs(&[("m", "1")])))
        .insert(0, "kept", s("1"));
    for key in ["h", "l", "s", "z"] {
        server.vanish_after_type(key);
    }

    let h = harness(&server, single_worker(), Serializer::Text);
    h.dumper.dump_db(0, None).await.unwrap();

    assert_eq!(h.out.lines(), vec!["SELECT 0", "SET kept 1"]);
    assert!(h.diagnostics.is_empty());
    // Vanished keys are skipped before their TTL is read.
    assert_eq!(server.ttl_queries(), 1);
}

#[tokio::test]
async fn test_setup_failure_aborts() {
    let server = MemoryServer::new();
    server.insert(0, "a", s("1"));

    let out = Arc::new(MemorySink::new());
    let diagnostics = Arc::new(MemorySink::new());
    let dumper = Dumper::new(server.refusing_connector(), out.clone())
        .with_diagnostics(diagnostics.clone());

    let err = dumper.dump_db(0, None).await.unwrap_err();
    assert_eq!(err.status_code(), StatusCode::ConnectionFailed);
    assert!(out.is_empty());
    assert!(diagnostics.is_empty());
}

#[tokio::test]
async fn test_invalid_options_are_rejected() {
    let server = MemoryServer::new();
    let h = harness(
        &server,
        DumpOptions::default().with_workers(0),
        Serializer::Text,
    );

    let err = h.dumper.dump_db(0, None).await.unwrap_err();
    assert_eq!(err.status_code(), StatusCode::InvalidArgs);
    assert_eq!(server.connections(), 0);
}

#[tokio::test]
async fn test_key_pattern_limits_the_dump() {
    let server = MemoryServer::new();
    server
        .insert(0, "user:1", s("ann"))
        .insert(0, "user:2", s("bob"))
        .insert(0, "order:1", s("x"));

    let options = DumpOptions {
        key_pattern: "user:*".to_string(),
        ..single_worker()
    };
    let h = harness(&server, options, Serializer::Text);
    h.dumper.dump_db(0, None).await.unwrap();

    assert_eq!(
        h.out.lines(),
        vec!["SELECT 0", "SET user:1 ann", "SET user:2 bob"]
    );
}
