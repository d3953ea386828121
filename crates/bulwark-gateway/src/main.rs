mod args;
mod proxy;
mod state;
mod tracking;

use std::sync::Arc;
use std::time::Duration;

use axum::{middleware, routing::get, Router};
use clap::Parser;

use bulwark_common::http_metrics::track_requests;
use bulwark_common::ingress::capture_request_context;

use crate::args::Args;
use crate::proxy::{forward, healthz, metrics_handler, RouteTable};
use crate::state::AppState;
use crate::tracking::ensure_correlation_id;

pub(crate) fn build_router(st: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics_handler))
        .fallback(forward)
        .layer(middleware::from_fn(capture_request_context))
        .layer(middleware::from_fn(ensure_correlation_id))
        .layer(middleware::from_fn_with_state(st.clone(), track_requests::<AppState>))
        .with_state(st)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let _otel_guard = bulwark_common::telemetry::init_tracing(
        "bulwark-gateway",
        args.otlp_url.as_deref(),
        args.otlp_token.as_deref(),
    );

    let routes = RouteTable::new()
        .with_route("/api/organization", &args.organization_url)
        .with_route("/api/licensing", &args.licensing_url);
    for r in routes.routes() {
        tracing::info!(prefix=%r.prefix, upstream=%r.upstream, "route registered");
    }

    let http = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(3))
        .timeout(Duration::from_secs(args.upstream_timeout_secs))
        .build()?;

    let st = AppState {
        routes: Arc::new(routes),
        http,
        max_body_bytes: args.max_body_bytes,
        metrics: Arc::default(),
    };

    let listener = tokio::net::TcpListener::bind(&args.listen_addr).await?;
    tracing::info!(addr=%args.listen_addr, "gateway listening");
    axum::serve(listener, build_router(st)).await?;
    Ok(())
}
