//! # atomkv-server
//!
//! Transport adapters over [`atomkv_engine`]: the TCP line protocol, the HTTP
//! metrics/insights endpoints, startup configuration, and the process entry
//! point. Exposed as a library (in addition to the `atomkv-server` binary)
//! so integration tests can drive the real TCP accept loop in-process.

pub mod config;
pub mod metrics;
pub mod protocol;
pub mod server;

use std::sync::{Arc, Mutex};

use anyhow::Context;
use atomkv_engine::{Engine, MemoryEngine};
use tokio::net::TcpListener;
use tokio::task::JoinSet;

use config::Config;

/// Connection-handling tasks spawned by `accept_loop`, tracked so shutdown
/// can close every open client socket instead of only stopping the accept
/// loop that spawned them.
pub type Connections = Arc<Mutex<JoinSet<()>>>;

/// Runs the server until `Ctrl-C` is received, then shuts down in order:
/// stop accepting connections, close already-open client sockets, stop the
/// sweeper, drop the engine (which drains and closes the durable log
/// writer).
pub async fn run(config: Config) -> anyhow::Result<()> {
    tracing::info!(aof_path = %config.aof_path.display(), "loading durable command log");
    let engine = MemoryEngine::with_dcl(config.capacity, &config.aof_path)
        .context("failed to initialize storage engine")?;

    let sweeper = engine.clone().start_sweeper();

    let tcp_listener = TcpListener::bind(("0.0.0.0", config.tcp_port))
        .await
        .with_context(|| format!("failed to bind TCP port {}", config.tcp_port))?;
    tracing::info!(port = config.tcp_port, "TCP listener ready");

    let http_listener = TcpListener::bind(("0.0.0.0", config.http_port))
        .await
        .with_context(|| format!("failed to bind HTTP port {}", config.http_port))?;
    tracing::info!(port = config.http_port, "HTTP listener ready");

    let connections: Connections = Arc::new(Mutex::new(JoinSet::new()));
    let accept_engine: Arc<dyn Engine> = engine.clone();
    let accept_task = tokio::spawn(accept_loop(tcp_listener, accept_engine, connections.clone()));

    let http_app = metrics::router(engine.clone());
    let http_task = tokio::spawn(async move {
        if let Err(error) = axum::serve(http_listener, http_app).await {
            tracing::error!(%error, "HTTP server exited with an error");
        }
    });

    tokio::signal::ctrl_c().await.context("failed to listen for ctrl-c")?;
    tracing::info!("shutdown requested");

    accept_task.abort();
    http_task.abort();
    close_client_sockets(&connections).await;
    sweeper.stop();

    drop(engine);
    tracing::info!("shutdown complete");
    Ok(())
}

/// Aborts every still-running per-connection task and waits for them to
/// finish, so no client socket (and no reference to the engine it holds)
/// outlives shutdown.
async fn close_client_sockets(connections: &Connections) {
    let mut set = {
        let mut guard = connections.lock().expect("connections set poisoned");
        guard.abort_all();
        std::mem::take(&mut *guard)
    };
    while set.join_next().await.is_some() {}
}

/// Accepts connections on `listener` until the task is aborted. Each
/// connection is handled on its own task tracked in `connections`; a panic
/// or error in one never affects another.
pub async fn accept_loop(listener: TcpListener, engine: Arc<dyn Engine>, connections: Connections) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                let engine = engine.clone();
                connections.lock().expect("connections set poisoned").spawn(async move {
                    if let Err(error) = server::handle_connection(stream, engine).await {
                        tracing::warn!(%peer, %error, "connection ended with an error");
                    }
                });
            }
            Err(error) => {
                tracing::error!(%error, "failed to accept connection");
            }
        }
    }
}
