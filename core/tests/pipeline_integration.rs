//! Integration tests for the watch → dispatch → broadcast pipeline.
//!
//! These run against the real filesystem notifier and real TCP sockets.

use std::sync::Arc;
use std::time::Duration;

use fswatch_core::format::GO_JSON;
use fswatch_core::server::{REFUSAL_MESSAGE, bind};
use fswatch_core::{BroadcastServer, Dispatcher, EventFilter, RecursiveWatcher, WatchConfig};
use pretty_assertions::assert_eq;
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

/// Start a server on an ephemeral port and return its address.
async fn spawn_server(max: usize) -> (Arc<BroadcastServer>, String) {
    let listener = bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let server = Arc::new(BroadcastServer::new(max));
    tokio::spawn(Arc::clone(&server).serve(listener));
    (server, addr)
}

async fn wait_for_clients(server: &BroadcastServer, count: usize) {
    timeout(WAIT, async {
        while server.len().await < count {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("clients registered in time");
}

async fn next_line(reader: &mut BufReader<TcpStream>) -> String {
    let mut line = String::new();
    timeout(WAIT, reader.read_line(&mut line))
        .await
        .expect("line arrived in time")
        .unwrap();
    line
}

#[tokio::test]
async fn test_capacity_over_tcp() {
    let (server, addr) = spawn_server(2).await;

    let first = TcpStream::connect(&addr).await.unwrap();
    let second = TcpStream::connect(&addr).await.unwrap();
    wait_for_clients(&server, 2).await;

    let mut third = TcpStream::connect(&addr).await.unwrap();
    let mut refused = Vec::new();
    timeout(WAIT, third.read_to_end(&mut refused))
        .await
        .expect("refused client closed in time")
        .unwrap();
    assert_eq!(refused, REFUSAL_MESSAGE);
    assert_eq!(server.len().await, 2);

    assert_eq!(server.send_message(b"still here").await, 2);
    for conn in [first, second] {
        let mut reader = BufReader::new(conn);
        assert_eq!(next_line(&mut reader).await, "still here\n");
    }
}

#[tokio::test]
async fn test_end_to_end_filtered_create_is_broadcast() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::create_dir(temp_dir.path().join("node_modules")).unwrap();
    std::fs::create_dir(temp_dir.path().join("src")).unwrap();

    let config = WatchConfig::new(temp_dir.path())
        .with_server("127.0.0.1:0")
        .with_exclude("node_modules")
        .with_format(GO_JSON);

    let (server, addr) = spawn_server(config.server_max_connection).await;
    let clients = [
        TcpStream::connect(&addr).await.unwrap(),
        TcpStream::connect(&addr).await.unwrap(),
    ];
    wait_for_clients(&server, 2).await;

    let filter: EventFilter = config.filter().unwrap();
    let mut watcher = RecursiveWatcher::start(&config.path, filter).unwrap();
    let dispatcher = Dispatcher::from_config(&config, Arc::clone(&server));

    std::fs::write(temp_dir.path().join("node_modules/x"), "ignored").unwrap();
    std::fs::write(temp_dir.path().join("src/a.go"), "package main").unwrap();

    let created = timeout(WAIT, async {
        loop {
            let op = watcher.next().await.expect("watcher open");
            assert!(
                !op.path.to_string_lossy().contains("node_modules"),
                "excluded path forwarded: {}",
                op.path.display()
            );
            dispatcher.dispatch(&op).await;
            if op.path.ends_with("src/a.go") {
                return op;
            }
        }
    })
    .await
    .expect("create event observed in time");

    assert_eq!(created.kind().as_str(), "CREATE");
    assert_eq!(created.broadcast_kind().as_str(), "added");

    for conn in clients {
        let mut reader = BufReader::new(conn);
        let line = next_line(&mut reader).await;
        let value: serde_json::Value = serde_json::from_str(line.trim_end()).unwrap();

        assert_eq!(value["filename"], "a.go");
        assert_eq!(value["operation"], "CREATE");
        assert_eq!(value["type"], "file");
    }

    watcher.close();
    assert!(watcher.next().await.is_none());
}
