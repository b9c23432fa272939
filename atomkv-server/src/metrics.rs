//! # HTTP Metrics & Insights
//!
//! A small `axum` router exposing two read-only views over the engine:
//! `/metrics` for counters, `/insights` for a full key/value snapshot.
//! Neither endpoint mutates engine state.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use atomkv_engine::Engine;

#[derive(Serialize)]
struct MetricsResponse {
    keys: usize,
    hits: u64,
    misses: u64,
}

async fn metrics_handler(State(engine): State<Arc<dyn Engine>>) -> Json<MetricsResponse> {
    let (hits, misses) = engine.stats();
    Json(MetricsResponse {
        keys: engine.key_count(),
        hits,
        misses,
    })
}

async fn insights_handler(State(engine): State<Arc<dyn Engine>>) -> Json<HashMap<String, String>> {
    let snapshot = engine
        .snapshot()
        .into_iter()
        .map(|(key, value)| {
            (
                String::from_utf8_lossy(&key).into_owned(),
                String::from_utf8_lossy(&value).into_owned(),
            )
        })
        .collect();
    Json(snapshot)
}

/// Builds the `/metrics` + `/insights` router over a shared engine handle.
pub fn router(engine: Arc<dyn Engine>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/insights", get(insights_handler))
        .with_state(engine)
}
