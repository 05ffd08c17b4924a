/// Integration tests: a real relay sink on a loopback listener, backed by the
/// in-memory store.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use postbox_db::MemoryStore;
use postbox_sink::{RelaySink, SinkConfig, bind_listener};
use postbox_types::{Message, decode_form, write_frame};

struct Harness {
    addr: SocketAddr,
    store: Arc<MemoryStore>,
    started_at: DateTime<Utc>,
}

fn start_sink(config: SinkConfig) -> Harness {
    start_sink_with(Arc::new(MemoryStore::new()), config)
}

fn start_sink_with(store: Arc<MemoryStore>, config: SinkConfig) -> Harness {
    let listener = bind_listener("127.0.0.1:0".parse().unwrap(), config.backlog).unwrap();
    let addr = listener.local_addr().unwrap();

    let sink = RelaySink::new(store.clone(), &config);
    let started_at = sink.clock().started_at();
    tokio::spawn(sink.run(listener));

    Harness {
        addr,
        store,
        started_at,
    }
}

async fn send(addr: SocketAddr, msg: &Message) {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    write_frame(&mut stream, msg).await.unwrap();
    let _ = stream.shutdown().await;
}

/// Poll until the store holds `count` documents or fail after 5 s.
async fn wait_for(store: &MemoryStore, count: usize) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while store.len() < count {
        assert!(
            tokio::time::Instant::now() < deadline,
            "expected {} documents, have {}",
            count,
            store.len()
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn submission_is_persisted_with_server_stamp() {
    let h = start_sink(SinkConfig::default());

    let before_connect = Utc::now();
    send(h.addr, &Message::new("alice", "hello")).await;
    wait_for(&h.store, 1).await;

    let docs = h.store.documents();
    assert_eq!(docs[0].username, "alice");
    assert_eq!(docs[0].message, "hello");
    assert!(docs[0].date > h.started_at);
    assert!(docs[0].date >= before_connect);
    assert!(docs[0].date <= Utc::now());
}

#[tokio::test]
async fn anonymous_submission_is_persisted() {
    let h = start_sink(SinkConfig::default());

    let msg = decode_form(b"message=hi").unwrap();
    send(h.addr, &msg).await;
    wait_for(&h.store, 1).await;

    let docs = h.store.documents();
    assert_eq!(docs[0].username, "anonymous");
    assert_eq!(docs[0].message, "hi");
}

#[tokio::test]
async fn empty_message_persists_as_empty_string() {
    let h = start_sink(SinkConfig::default());

    send(h.addr, &decode_form(b"username=bob&message=").unwrap()).await;
    wait_for(&h.store, 1).await;

    assert_eq!(h.store.documents()[0].message, "");
}

#[tokio::test]
async fn storage_outage_does_not_stop_listener() {
    let h = start_sink(SinkConfig::default());

    h.store.set_available(false);
    send(h.addr, &Message::new("alice", "lost")).await;

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while h.store.failed_inserts() == 0 {
        assert!(tokio::time::Instant::now() < deadline, "insert was never attempted");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(h.store.is_empty());

    h.store.set_available(true);
    send(h.addr, &Message::new("alice", "kept")).await;
    wait_for(&h.store, 1).await;

    assert_eq!(h.store.documents()[0].message, "kept");
}

#[tokio::test]
async fn concurrent_submissions_are_both_persisted() {
    let h = start_sink(SinkConfig::default());

    let first = Message::new("alice", "one");
    let second = Message::new("bob", "two");
    tokio::join!(send(h.addr, &first), send(h.addr, &second));
    wait_for(&h.store, 2).await;

    let mut bodies: Vec<String> = h.store.documents().into_iter().map(|d| d.message).collect();
    bodies.sort();
    assert_eq!(bodies, vec!["one", "two"]);
}

#[tokio::test]
async fn identical_submissions_are_not_deduplicated() {
    let h = start_sink(SinkConfig::default());

    let msg = Message::new("alice", "same");
    send(h.addr, &msg).await;
    send(h.addr, &msg).await;
    wait_for(&h.store, 2).await;

    let docs = h.store.documents();
    assert_eq!(docs[0].message, docs[1].message);
    assert_ne!(docs[0].date, docs[1].date);
}

#[tokio::test]
async fn empty_connection_persists_nothing() {
    let h = start_sink(SinkConfig::default());

    let stream = TcpStream::connect(h.addr).await.unwrap();
    drop(stream);

    // A later message still goes through and is the only document
    send(h.addr, &Message::new("alice", "after")).await;
    wait_for(&h.store, 1).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let docs = h.store.documents();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].message, "after");
}

#[tokio::test]
async fn malformed_and_oversized_frames_are_dropped() {
    let h = start_sink(SinkConfig {
        max_frame_size: 128,
        ..SinkConfig::default()
    });

    // Not JSON
    let mut stream = TcpStream::connect(h.addr).await.unwrap();
    stream.write_all(&[0, 0, 0, 4, b'n', b'o', b'p', b'e']).await.unwrap();
    let _ = stream.shutdown().await;

    // Over the frame limit
    let mut stream = TcpStream::connect(h.addr).await.unwrap();
    write_frame(&mut stream, &Message::new("big", "z".repeat(1024))).await.ok();
    drop(stream);

    send(h.addr, &Message::new("alice", "fits")).await;
    wait_for(&h.store, 1).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let docs = h.store.documents();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].message, "fits");
}

#[tokio::test]
async fn stamps_do_not_decrease_for_sequential_messages() {
    let h = start_sink(SinkConfig::default());

    for i in 0..10 {
        send(h.addr, &Message::new("alice", format!("m{}", i))).await;
        wait_for(&h.store, i + 1).await;
    }

    let docs = h.store.documents();
    for pair in docs.windows(2) {
        assert!(pair[1].date >= pair[0].date);
    }
}

#[tokio::test]
async fn single_worker_still_serves_every_connection() {
    let h = start_sink(SinkConfig {
        max_workers: 1,
        ..SinkConfig::default()
    });

    for i in 0..5 {
        send(h.addr, &Message::new("alice", format!("m{}", i))).await;
    }
    wait_for(&h.store, 5).await;
}

#[tokio::test]
async fn slow_store_keeps_worker_slot_until_insert_returns() {
    let store = Arc::new(MemoryStore::new());
    store.set_insert_delay(Duration::from_millis(200));
    let h = start_sink_with(
        store,
        SinkConfig {
            max_workers: 1,
            persist_timeout: Duration::from_millis(50),
            ..SinkConfig::default()
        },
    );

    for i in 0..4 {
        send(h.addr, &Message::new("alice", format!("m{}", i))).await;
    }
    wait_for(&h.store, 4).await;

    // Every cycle gave up on its insert, yet inserts never overlapped
    assert_eq!(h.store.peak_in_flight(), 1);
}

#[tokio::test]
async fn persist_timeout_leaves_listener_accepting() {
    let store = Arc::new(MemoryStore::new());
    store.set_insert_delay(Duration::from_millis(100));
    let h = start_sink_with(
        store,
        SinkConfig {
            persist_timeout: Duration::from_millis(20),
            ..SinkConfig::default()
        },
    );

    send(h.addr, &Message::new("alice", "slow")).await;
    wait_for(&h.store, 1).await;

    h.store.set_insert_delay(Duration::ZERO);
    send(h.addr, &Message::new("alice", "fast")).await;
    wait_for(&h.store, 2).await;

    let bodies: Vec<String> = h.store.documents().into_iter().map(|d| d.message).collect();
    assert_eq!(bodies, vec!["slow", "fast"]);
}

#[tokio::test]
async fn shutdown_waits_for_in_flight_workers() {
    let store = Arc::new(MemoryStore::new());
    store.set_insert_delay(Duration::from_millis(300));

    let config = SinkConfig::default();
    let listener = bind_listener("127.0.0.1:0".parse().unwrap(), config.backlog).unwrap();
    let addr = listener.local_addr().unwrap();
    let sink = RelaySink::new(store.clone(), &config);

    let (stop, stopped) = tokio::sync::oneshot::channel::<()>();
    let running = tokio::spawn(sink.run_until_shutdown(listener, async {
        let _ = stopped.await;
    }));

    send(addr, &Message::new("alice", "in flight")).await;
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while store.in_flight() == 0 {
        assert!(tokio::time::Instant::now() < deadline, "insert never started");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    stop.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(5), running)
        .await
        .expect("sink did not stop")
        .unwrap();

    assert_eq!(store.len(), 1);
    assert_eq!(store.in_flight(), 0);
}
