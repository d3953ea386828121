mod args;
mod handlers;
mod state;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use clap::Parser;

use bulwark_common::http_metrics::track_requests;
use bulwark_common::ingress::capture_request_context;
use bulwark_meta::{MemoryMetaStore, RecordStore};

use crate::args::Args;
use crate::handlers::{
    create_organization, delete_organization, get_organization, healthz, metrics_handler,
    update_organization,
};
use crate::state::AppState;

pub(crate) fn build_router(st: AppState) -> Router {
    let api = Router::new()
        .route("/v1/organizations", post(create_organization))
        .route(
            "/v1/organizations/:organization_id",
            get(get_organization)
                .put(update_organization)
                .delete(delete_organization),
        )
        .layer(middleware::from_fn(capture_request_context));

    let public = Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics_handler));

    public
        .merge(api)
        .layer(middleware::from_fn_with_state(st.clone(), track_requests::<AppState>))
        .with_state(st)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let _otel_guard = bulwark_common::telemetry::init_tracing(
        "bulwark-organization",
        args.otlp_url.as_deref(),
        args.otlp_token.as_deref(),
    );

    let store = Arc::new(MemoryMetaStore::new());
    let st = AppState {
        organizations: RecordStore::new(store, "organizations"),
        metrics: Arc::default(),
    };

    let listener = tokio::net::TcpListener::bind(&args.listen_addr).await?;
    tracing::info!(addr=%args.listen_addr, "organization service listening");
    axum::serve(listener, build_router(st)).await?;
    Ok(())
}
