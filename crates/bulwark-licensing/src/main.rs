mod args;
mod clients;
mod handlers;
mod service;
mod state;

use std::sync::Arc;
use std::time::Duration;

use axum::{middleware, routing::get, Router};
use clap::Parser;

use bulwark_common::http_metrics::track_requests;
use bulwark_common::ingress::capture_request_context;
use bulwark_meta::{MemoryMetaStore, RecordStore};
use bulwark_resilience::{DependencyConfig, DependencyRegistry, ResilientExecutor};

use crate::args::Args;
use crate::clients::{
    DiscoveryOrganizationClient, GatewayOrganizationClient, OrganizationClients, ServiceDirectory,
};
use crate::handlers::{
    create_license, delete_license, get_license, get_license_with_client, healthz, list_licenses,
    metrics_handler, update_license,
};
use crate::service::{LicenseService, LICENSES_BY_ORG, ORGANIZATION_SERVICE};
use crate::state::AppState;

pub(crate) fn build_router(st: AppState) -> Router {
    let api = Router::new()
        .route(
            "/v1/organizations/:organization_id/licenses",
            get(list_licenses).post(create_license),
        )
        .route(
            "/v1/organizations/:organization_id/licenses/",
            get(list_licenses).post(create_license),
        )
        .route(
            "/v1/organizations/:organization_id/licenses/:license_id",
            get(get_license).put(update_license).delete(delete_license),
        )
        .route(
            "/v1/organizations/:organization_id/licenses/:license_id/:client_type",
            get(get_license_with_client),
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
        "bulwark-licensing",
        args.otlp_url.as_deref(),
        args.otlp_token.as_deref(),
    );

    let registry = Arc::new(DependencyRegistry::new(DependencyConfig::default()));
    registry.register_from_env(ORGANIZATION_SERVICE)?;
    registry.register_from_env(LICENSES_BY_ORG)?;

    // Per-request deadlines come from the executor; this only bounds connects.
    let http = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(3))
        .build()?;

    let directory = Arc::new(ServiceDirectory::new(args.organization_instances));
    tracing::info!(instances = directory.instances().len(), "organization directory loaded");
    let clients = OrganizationClients {
        rest: Arc::new(GatewayOrganizationClient::new(http.clone(), &args.gateway_url)),
        discovery: Arc::new(DiscoveryOrganizationClient::new(http, directory)),
    };

    let service = LicenseService::new(
        RecordStore::new(Arc::new(MemoryMetaStore::new()), "licenses"),
        ResilientExecutor::new(registry),
        clients,
        args.license_comment,
    );

    let st = AppState {
        service: Arc::new(service),
        metrics: Arc::default(),
    };

    let listener = tokio::net::TcpListener::bind(&args.listen_addr).await?;
    tracing::info!(addr=%args.listen_addr, "licensing service listening");
    axum::serve(listener, build_router(st)).await?;
    Ok(())
}
