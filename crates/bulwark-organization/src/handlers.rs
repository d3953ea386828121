use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use bulwark_common::error_response::error_response;
use bulwark_common::{ContextStore, Organization};

use crate::state::AppState;

const METRICS_PREFIX: &str = "bulwark_organization";

fn store_error(e: anyhow::Error) -> Response {
    tracing::error!(error=%e, "organization store failed");
    error_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        "store_error",
        &format!("store error: {e}"),
    )
}

fn not_found(id: &str) -> Response {
    error_response(
        StatusCode::NOT_FOUND,
        "not_found",
        &format!("organization '{id}' not found"),
    )
}

fn validate(org: &Organization) -> Option<Response> {
    if org.name.trim().is_empty() {
        return Some(error_response(
            StatusCode::BAD_REQUEST,
            "invalid_organization",
            "organization name must not be empty",
        ));
    }
    None
}

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

pub async fn metrics_handler(State(st): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, st.metrics.render(METRICS_PREFIX))
}

pub async fn get_organization(
    State(st): State<AppState>,
    Path(organization_id): Path<String>,
) -> Response {
    tracing::debug!(
        organization_id=%organization_id,
        correlation_id=%ContextStore::current().correlation_id(),
        "looking up organization"
    );
    match st.organizations.find(&organization_id).await {
        Ok(Some(org)) => (StatusCode::OK, Json(org)).into_response(),
        Ok(None) => not_found(&organization_id),
        Err(e) => store_error(e),
    }
}

pub async fn create_organization(
    State(st): State<AppState>,
    Json(mut org): Json<Organization>,
) -> Response {
    if let Some(resp) = validate(&org) {
        return resp;
    }
    org.id = uuid::Uuid::new_v4().to_string();
    match st.organizations.save(&org.id, &org).await {
        Ok(_) => {
            tracing::info!(organization_id=%org.id, "organization created");
            (StatusCode::CREATED, Json(org)).into_response()
        }
        Err(e) => store_error(e),
    }
}

pub async fn update_organization(
    State(st): State<AppState>,
    Path(organization_id): Path<String>,
    Json(mut org): Json<Organization>,
) -> Response {
    if let Some(resp) = validate(&org) {
        return resp;
    }
    match st.organizations.find(&organization_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return not_found(&organization_id),
        Err(e) => return store_error(e),
    }
    org.id = organization_id;
    match st.organizations.save(&org.id, &org).await {
        Ok(_) => {
            tracing::info!(organization_id=%org.id, "organization updated");
            (StatusCode::OK, Json(org)).into_response()
        }
        Err(e) => store_error(e),
    }
}

pub async fn delete_organization(
    State(st): State<AppState>,
    Path(organization_id): Path<String>,
) -> Response {
    match st.organizations.delete(&organization_id).await {
        Ok(true) => {
            tracing::info!(organization_id=%organization_id, "organization deleted");
            StatusCode::NO_CONTENT.into_response()
        }
        Ok(false) => not_found(&organization_id),
        Err(e) => store_error(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::{body::Body, http::Request, Router};
    use bulwark_common::request_context::CORRELATION_ID;
    use bulwark_meta::{MemoryMetaStore, RecordStore};
    use tower::ServiceExt;

    fn app() -> Router {
        crate::build_router(AppState {
            organizations: RecordStore::new(Arc::new(MemoryMetaStore::new()), "organizations"),
            metrics: Arc::default(),
        })
    }

    fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .header(CORRELATION_ID, "abc-123")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn empty_request(method: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(CORRELATION_ID, "abc-123")
            .body(Body::empty())
            .unwrap()
    }

    async fn json_body(resp: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_crud_lifecycle() {
        let app = app();

        let resp = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/v1/organizations",
                serde_json::json!({"name": "Acme", "contact_name": "Wile", "contact_email": "wile@acme.test"}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        let created = json_body(resp).await;
        let id = created["id"].as_str().unwrap().to_string();
        assert!(uuid::Uuid::parse_str(&id).is_ok());

        let uri = format!("/v1/organizations/{id}");
        let resp = app.clone().oneshot(empty_request("GET", &uri)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(json_body(resp).await["name"], "Acme");

        let resp = app
            .clone()
            .oneshot(json_request("PUT", &uri, serde_json::json!({"id": "ignored", "name": "Acme Corp"})))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let updated = json_body(resp).await;
        assert_eq!(updated["id"], id.as_str());
        assert_eq!(updated["name"], "Acme Corp");

        let resp = app.clone().oneshot(empty_request("DELETE", &uri)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);

        let resp = app.oneshot(empty_request("GET", &uri)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body = json_body(resp).await;
        assert_eq!(body["error"]["code"], "not_found");
        assert_eq!(body["error"]["correlation_id"], "abc-123");
    }

    #[tokio::test]
    async fn test_update_missing_is_404() {
        let resp = app()
            .oneshot(json_request("PUT", "/v1/organizations/nope", serde_json::json!({"name": "X"})))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_blank_name_rejected() {
        let resp = app()
            .oneshot(json_request("POST", "/v1/organizations", serde_json::json!({"name": " "})))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(resp).await["error"]["code"], "invalid_organization");
    }

    #[tokio::test]
    async fn test_metrics_count_requests() {
        let app = app();
        let _ = app.clone().oneshot(empty_request("GET", "/v1/organizations/x")).await.unwrap();
        let resp = app.oneshot(empty_request("GET", "/metrics")).await.unwrap();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("bulwark_organization_responses_4xx 1\n"));
    }
}
