use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use bulwark_common::error_response::error_response;
use bulwark_common::{ContextStore, License};
use bulwark_resilience::metrics::render_dependency_metrics;

use crate::clients::ClientKind;
use crate::service::LicenseError;
use crate::state::AppState;

const METRICS_PREFIX: &str = "bulwark_licensing";

fn license_error(e: LicenseError) -> Response {
    match e {
        LicenseError::NotFound(_) => error_response(StatusCode::NOT_FOUND, "not_found", &e.to_string()),
        LicenseError::Resilience(e) => {
            tracing::error!(error=%e, "license request failed despite fallback");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.kind(), &e.to_string())
        }
        LicenseError::Store(e) => {
            tracing::error!(error=%e, "license store failed");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "store_error",
                &format!("store error: {e}"),
            )
        }
    }
}

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

pub async fn metrics_handler(State(st): State<AppState>) -> impl IntoResponse {
    let mut body = st.metrics.render(METRICS_PREFIX);
    body.push_str(&render_dependency_metrics(
        st.service.executor().registry(),
        METRICS_PREFIX,
    ));
    (StatusCode::OK, body)
}

pub async fn list_licenses(
    State(st): State<AppState>,
    Path(organization_id): Path<String>,
) -> Response {
    tracing::debug!(
        correlation_id=%ContextStore::current().correlation_id(),
        "license list requested"
    );
    match st.service.licenses_by_org(&organization_id).await {
        Ok(licenses) => (StatusCode::OK, Json(licenses)).into_response(),
        Err(e) => license_error(e),
    }
}

pub async fn get_license(
    State(st): State<AppState>,
    Path((organization_id, license_id)): Path<(String, String)>,
) -> Response {
    lookup(&st, &organization_id, &license_id, ClientKind::Rest).await
}

pub async fn get_license_with_client(
    State(st): State<AppState>,
    Path((organization_id, license_id, client_type)): Path<(String, String, String)>,
) -> Response {
    lookup(&st, &organization_id, &license_id, ClientKind::parse(&client_type)).await
}

async fn lookup(st: &AppState, organization_id: &str, license_id: &str, client: ClientKind) -> Response {
    match st.service.get_license(organization_id, license_id, client).await {
        Ok(license) => (StatusCode::OK, Json(license)).into_response(),
        Err(e) => license_error(e),
    }
}

pub async fn create_license(
    State(st): State<AppState>,
    Path(organization_id): Path<String>,
    Json(license): Json<License>,
) -> Response {
    match st.service.save_license(&organization_id, license).await {
        Ok(license) => (StatusCode::CREATED, Json(license)).into_response(),
        Err(e) => license_error(e),
    }
}

pub async fn update_license(
    State(st): State<AppState>,
    Path((organization_id, license_id)): Path<(String, String)>,
    Json(license): Json<License>,
) -> Response {
    match st.service.update_license(&organization_id, &license_id, license).await {
        Ok(license) => (StatusCode::OK, Json(license)).into_response(),
        Err(e) => license_error(e),
    }
}

pub async fn delete_license(
    State(st): State<AppState>,
    Path((organization_id, license_id)): Path<(String, String)>,
) -> Response {
    match st.service.delete_license(&organization_id, &license_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => license_error(e),
    }
}
