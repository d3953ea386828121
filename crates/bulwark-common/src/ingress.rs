use axum::{
    body::Body,
    http::{HeaderMap, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use tracing::Instrument;

use crate::context_store::ContextStore;
use crate::error_response::error_response;
use crate::request_context::{RequestContext, AUTH_TOKEN, CORRELATION_ID, ORG_ID, USER_ID};

fn header_or_empty(headers: &HeaderMap, name: &str) -> String {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_default()
}

/// Builds the request context from ingress headers. A missing correlation id is
/// relayed as empty; generating one is the gateway's job.
pub fn context_from_headers(headers: &HeaderMap) -> RequestContext {
    RequestContext::empty()
        .with_correlation_id(header_or_empty(headers, CORRELATION_ID))
        .with_user_id(header_or_empty(headers, USER_ID))
        .with_auth_token(header_or_empty(headers, AUTH_TOKEN))
        .with_tenant_id(header_or_empty(headers, ORG_ID))
}

/// Middleware that installs the inbound request's context before any handler runs.
///
/// Usage: `.layer(middleware::from_fn(capture_request_context))`
pub async fn capture_request_context(req: Request<Body>, next: Next) -> Response {
    let ctx = context_from_headers(req.headers());
    let span = tracing::info_span!(
        "request",
        correlation_id = %ctx.correlation_id(),
        user_id = %ctx.user_id(),
        tenant_id = %ctx.tenant_id(),
    );

    ContextStore::scope(None, async move {
        if let Err(e) = ContextStore::set(ctx) {
            tracing::warn!(error=%e, "rejecting request with unusable context headers");
            return error_response(StatusCode::BAD_REQUEST, "invalid_context", &e.to_string());
        }
        tracing::debug!(path=%req.uri().path(), "request context captured");
        next.run(req).await
    })
    .instrument(span)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{middleware, routing::get, Json, Router};
    use tower::ServiceExt;

    async fn echo_context() -> Json<RequestContext> {
        Json(ContextStore::current())
    }

    #[test]
    fn test_context_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(CORRELATION_ID, "abc-123".parse().unwrap());
        headers.insert(AUTH_TOKEN, "tok1".parse().unwrap());
        headers.insert(ORG_ID, "org-42".parse().unwrap());

        let ctx = context_from_headers(&headers);
        assert_eq!(ctx.correlation_id(), "abc-123");
        assert_eq!(ctx.user_id(), "");
        assert_eq!(ctx.auth_token(), "tok1");
        assert_eq!(ctx.tenant_id(), "org-42");
    }

    #[test]
    fn test_missing_correlation_id_is_not_invented() {
        let ctx = context_from_headers(&HeaderMap::new());
        assert!(ctx.is_empty());
    }

    #[tokio::test]
    async fn test_handler_sees_captured_context() {
        let app = Router::new()
            .route("/ctx", get(echo_context))
            .layer(middleware::from_fn(capture_request_context));

        let req = Request::builder()
            .uri("/ctx")
            .header(CORRELATION_ID, "abc-123")
            .header(USER_ID, "user-7")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let ctx: RequestContext = serde_json::from_slice(&body).unwrap();
        assert_eq!(ctx.correlation_id(), "abc-123");
        assert_eq!(ctx.user_id(), "user-7");
        assert_eq!(ctx.auth_token(), "");
    }
}
