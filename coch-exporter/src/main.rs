// COCH Exporter - Prometheus exporter for configuration conformance metrics
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! # COCH Exporter
//!
//! Prometheus exporter for configuration conformance metrics.
//!
//! Polls a search endpoint for nested bucket aggregations, extracts
//! per-config-file conformance records, and exposes them as gauges.
//!
//! ## Usage
//!
//! ```bash
//! # Poll a local search endpoint every 10 seconds
//! coch-exporter --source-url http://localhost:9200
//!
//! # Custom indices, components and listen port
//! coch-exporter --index-list "logs-a-*,logs-b-*" \
//!     --component-list "component-1,component-2" --port 9090
//! ```

mod client;
mod metrics;
mod poller;

use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::get,
    Json, Router,
};
use clap::Parser;
use client::SearchClient;
use coch::PipelineConfig;
use metrics::ExporterMetrics;
use poller::{Poller, PollerState};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

/// COCH Prometheus Exporter
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port to listen on for HTTP requests
    #[arg(short, long, default_value = "8090")]
    port: u16,

    /// Search endpoint base URL
    #[arg(long, default_value = "http://localhost:9200")]
    source_url: String,

    /// Comma-separated indices to query
    #[arg(long, default_value = "index-1-*,index-2-*")]
    index_list: String,

    /// Comma-separated components to query
    #[arg(long, default_value = "component-1,component-2,component-3")]
    component_list: String,

    /// Config file id delimiter
    #[arg(long, default_value = "__")]
    delimiter: String,

    /// Poll interval in seconds
    #[arg(short, long, default_value = "10")]
    interval: u64,

    /// Comma-separated label names exported on the conformance gauges;
    /// their count fixes the identity arity
    #[arg(long, default_value = "label_1,label_2,label_3,label_4,label_5,label_6")]
    labels: String,

    /// Identity slot inspected for the optimal role marker
    #[arg(long, default_value = "1")]
    role_slot: usize,

    /// Identity slot carrying the hostname or the optimal sentinel
    #[arg(long, default_value = "3")]
    target_slot: usize,

    /// Per-request timeout in seconds
    #[arg(long, default_value = "10")]
    request_timeout: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// Application state shared across handlers.
struct AppState {
    metrics: Arc<ExporterMetrics>,
    poller_state: Arc<PollerState>,
    start_time: std::time::Instant,
}

/// Split a comma-separated flag value, dropping surrounding whitespace.
fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = match args.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        };
        EnvFilter::from_default_env().add_directive(level.into())
    });

    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("COCH Exporter v{}", env!("CARGO_PKG_VERSION"));

    let pipeline = match PipelineConfig::new(
        args.delimiter.clone(),
        split_list(&args.labels),
        args.role_slot,
        args.target_slot,
    ) {
        Ok(pipeline) => pipeline,
        Err(err) => {
            tracing::error!("invalid configuration: {err}");
            std::process::exit(2);
        }
    };

    let metrics = match ExporterMetrics::new(&pipeline.labels) {
        Ok(metrics) => Arc::new(metrics),
        Err(err) => {
            tracing::error!("failed to register collectors: {err}");
            std::process::exit(2);
        }
    };

    let search_client = match SearchClient::new(
        args.source_url.clone(),
        Duration::from_secs(args.request_timeout),
    ) {
        Ok(client) => client,
        Err(err) => {
            tracing::error!("failed to build HTTP client: {err}");
            std::process::exit(2);
        }
    };

    let poller = Poller::new(
        search_client,
        pipeline,
        split_list(&args.index_list),
        split_list(&args.component_list),
        Duration::from_secs(args.interval),
        Arc::clone(&metrics),
    );
    let poller_state = poller.state();

    info!(
        "polling {} every {}s",
        args.source_url, args.interval
    );

    // Start collection in background
    tokio::spawn(async move {
        poller.run().await;
    });

    // Create app state
    let state = Arc::new(AppState {
        metrics,
        poller_state,
        start_time: std::time::Instant::now(),
    });

    // Build router
    let app = Router::new()
        .route("/", get(root_handler))
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/status", get(status_handler))
        .with_state(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    info!("Starting server on http://{}", addr);
    info!("Metrics endpoint: http://{}/metrics", addr);

    let listener = TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}

/// Root handler - shows a simple HTML page.
async fn root_handler() -> Html<&'static str> {
    Html(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>COCH Exporter</title>
    <style>
        body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; max-width: 800px; margin: 50px auto; padding: 20px; }
        h1 { color: #2c3e50; }
        a { color: #3498db; text-decoration: none; }
        a:hover { text-decoration: underline; }
        .endpoints { background: #f8f9fa; padding: 20px; border-radius: 8px; margin: 20px 0; }
        .endpoint { margin: 10px 0; }
        code { background: #e9ecef; padding: 2px 6px; border-radius: 4px; }
    </style>
</head>
<body>
    <h1>COCH Exporter</h1>
    <p>Prometheus exporter for configuration conformance metrics.</p>

    <div class="endpoints">
        <h2>Endpoints</h2>
        <div class="endpoint"><a href="/metrics">/metrics</a> - Prometheus metrics</div>
        <div class="endpoint"><a href="/health">/health</a> - Health check</div>
        <div class="endpoint"><a href="/ready">/ready</a> - Readiness check</div>
        <div class="endpoint"><a href="/status">/status</a> - Status information (JSON)</div>
    </div>

    <h2>Metrics</h2>
    <ul>
        <li><code>conformance_checker_gauge</code> - Per-file conformance average</li>
        <li><code>conformance_checker_optimal_gauge</code> - Merged baseline score</li>
        <li><code>conformance_checker_buckets_gauge</code> - Buckets per (index, component)</li>
        <li><code>conformance_checker_invalid_config_file_id_gauge</code> - Invalid id count</li>
    </ul>
</body>
</html>"#,
    )
}

/// Metrics handler - returns Prometheus text format.
async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [("Content-Type", "text/plain; charset=utf-8")],
        state.metrics.encode(),
    )
}

/// Health check handler.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Readiness check handler.
async fn ready_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if state.poller_state.running.load(Ordering::SeqCst) {
        (StatusCode::OK, "Ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "Starting")
    }
}

/// Status information response.
#[derive(Serialize)]
struct StatusResponse {
    version: String,
    uptime_secs: u64,
    polling: bool,
    cycles: u64,
    last_diff_records: usize,
    last_optimal_records: usize,
    last_invalid_ids: u64,
    last_failed_tasks: u64,
    last_cycle_ms: u64,
}

/// Status handler - returns JSON status information.
async fn status_handler(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let poller = &state.poller_state;
    Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        polling: poller.running.load(Ordering::SeqCst),
        cycles: poller.cycles.load(Ordering::SeqCst),
        last_diff_records: poller.last_diffs.load(Ordering::SeqCst),
        last_optimal_records: poller.last_optimals.load(Ordering::SeqCst),
        last_invalid_ids: poller.last_invalid.load(Ordering::SeqCst),
        last_failed_tasks: poller.last_failed_tasks.load(Ordering::SeqCst),
        last_cycle_ms: poller.last_cycle_ms.load(Ordering::SeqCst),
    })
}
