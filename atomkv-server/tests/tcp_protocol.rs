//! Black-box tests over the real TCP accept loop and line protocol,
//! mirroring the end-to-end scenarios a client of this store would exercise.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use atomkv_engine::{Engine, MemoryEngine};
use atomkv_server::accept_loop;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;

/// Starts an in-process server over a fresh engine and returns the socket
/// address clients should connect to.
async fn spawn_server(capacity: usize) -> std::net::SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let engine: Arc<dyn Engine> = MemoryEngine::new(capacity);
    let connections = Arc::new(Mutex::new(JoinSet::new()));
    tokio::spawn(accept_loop(listener, engine, connections));
    addr
}

async fn connect(addr: std::net::SocketAddr) -> TcpStream {
    let mut stream = TcpStream::connect(addr).await.expect("connect");
    let mut greeting = [0u8; 10];
    stream.read_exact(&mut greeting).await.expect("greeting");
    assert_eq!(&greeting, b"OK AtomKV\n");
    stream
}

async fn send_line(stream: &mut TcpStream, line: &str) -> String {
    stream.write_all(line.as_bytes()).await.expect("write");
    stream.write_all(b"\n").await.expect("write newline");
    read_reply_line(stream).await
}

async fn read_reply_line(stream: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        stream.read_exact(&mut byte).await.expect("read");
        if byte[0] == b'\n' {
            break;
        }
        buf.push(byte[0]);
    }
    String::from_utf8(buf).expect("utf8 reply")
}

#[tokio::test]
async fn basic_round_trip() {
    let addr = spawn_server(100).await;
    let mut client = connect(addr).await;

    assert_eq!(send_line(&mut client, "SET foo bar").await, "+OK");
    assert_eq!(send_line(&mut client, "GET foo").await, "+bar");
    assert_eq!(send_line(&mut client, "DEL foo").await, ":1");
    assert_eq!(send_line(&mut client, "GET foo").await, "$-1");
}

#[tokio::test]
async fn ttl_expiry_round_trip() {
    let addr = spawn_server(100).await;
    let mut client = connect(addr).await;

    assert_eq!(send_line(&mut client, "SET t v PX 200").await, "+OK");
    let ttl_reply = send_line(&mut client, "TTL t").await;
    let ttl: i64 = ttl_reply.trim_start_matches(':').parse().expect("integer reply");
    assert!(ttl > 0 && ttl <= 200, "unexpected TTL reply: {ttl_reply}");

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(send_line(&mut client, "GET t").await, "$-1");
    assert_eq!(send_line(&mut client, "TTL t").await, ":-2");
}

#[tokio::test]
async fn persist_clears_ttl() {
    let addr = spawn_server(100).await;
    let mut client = connect(addr).await;

    assert_eq!(send_line(&mut client, "SET t v PX 500").await, "+OK");
    assert_eq!(send_line(&mut client, "PERSIST t").await, ":1");
    assert_eq!(send_line(&mut client, "TTL t").await, ":-1");
}

#[tokio::test]
async fn lru_eviction_over_the_wire() {
    let addr = spawn_server(3).await;
    let mut client = connect(addr).await;

    assert_eq!(send_line(&mut client, "SET k1 v").await, "+OK");
    assert_eq!(send_line(&mut client, "SET k2 v").await, "+OK");
    assert_eq!(send_line(&mut client, "SET k3 v").await, "+OK");
    send_line(&mut client, "GET k1").await;
    assert_eq!(send_line(&mut client, "SET k4 v").await, "+OK");

    assert_eq!(send_line(&mut client, "EXISTS k2").await, ":0");
    assert_eq!(send_line(&mut client, "EXISTS k1").await, ":1");
    assert_eq!(send_line(&mut client, "EXISTS k3").await, ":1");
    assert_eq!(send_line(&mut client, "EXISTS k4").await, ":1");
}

#[tokio::test]
async fn keys_pattern_matching() {
    let addr = spawn_server(100).await;
    let mut client = connect(addr).await;

    send_line(&mut client, "SET foo1 v").await;
    send_line(&mut client, "SET foo2 v").await;
    send_line(&mut client, "SET bar v").await;

    assert_eq!(send_line(&mut client, "KEYS foo*").await, ":2");
    let mut matched = vec![read_reply_line(&mut client).await, read_reply_line(&mut client).await];
    matched.sort();
    assert_eq!(matched, vec!["+foo1", "+foo2"]);
}

#[tokio::test]
async fn incr_semantics_and_errors() {
    let addr = spawn_server(100).await;
    let mut client = connect(addr).await;

    assert_eq!(send_line(&mut client, "SET n 41").await, "+OK");
    assert_eq!(send_line(&mut client, "INCR n").await, ":42");
    assert_eq!(send_line(&mut client, "SET n abc").await, "+OK");
    assert!(send_line(&mut client, "INCR n").await.starts_with("-ERR"));
}

#[tokio::test]
async fn quit_closes_the_connection() {
    let addr = spawn_server(100).await;
    let mut client = connect(addr).await;

    assert_eq!(send_line(&mut client, "QUIT").await, "+BYE");
    let mut buf = [0u8; 1];
    assert_eq!(client.read(&mut buf).await.expect("read after quit"), 0);
}
