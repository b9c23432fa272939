//! # AtomKV Server
//!
//! Process entry point. No CLI flags: every setting comes from
//! [`atomkv_server::config::Config::default`]. Startup order is: load the
//! durable command log (replaying it into the engine), start the
//! active-expiration sweeper, then bring up the TCP and HTTP listeners
//! concurrently. `Ctrl-C` triggers an orderly shutdown in the reverse order.

use atomkv_server::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    atomkv_server::run(Config::default()).await
}
