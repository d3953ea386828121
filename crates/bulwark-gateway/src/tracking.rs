use axum::{
    body::Body,
    http::{HeaderValue, Request},
    middleware::Next,
    response::Response,
};

use bulwark_common::request_context::CORRELATION_ID;

fn existing_correlation_id(req: &Request<Body>) -> Option<String> {
    req.headers()
        .get(CORRELATION_ID)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.trim().is_empty())
        .map(|v| v.to_string())
}

/// Makes sure every request leaving the gateway carries a `correlation-id`,
/// generating a UUID v4 when the caller sent none, and echoes it back on the
/// response.
pub async fn ensure_correlation_id(mut req: Request<Body>, next: Next) -> Response {
    let correlation_id = match existing_correlation_id(&req) {
        Some(id) => {
            tracing::debug!(correlation_id=%id, "correlation id found in tracking filter");
            id
        }
        None => {
            let id = uuid::Uuid::new_v4().to_string();
            if let Ok(v) = HeaderValue::from_str(&id) {
                req.headers_mut().insert(CORRELATION_ID, v);
            }
            tracing::debug!(correlation_id=%id, "correlation id generated in tracking filter");
            id
        }
    };

    let mut resp = next.run(req).await;
    if let Ok(v) = HeaderValue::from_str(&correlation_id) {
        resp.headers_mut().insert(CORRELATION_ID, v);
    }
    resp
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::HeaderMap, middleware, routing::get, Router};
    use tower::ServiceExt;

    async fn seen_by_upstream(headers: HeaderMap) -> String {
        headers
            .get(CORRELATION_ID)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string()
    }

    fn app() -> Router {
        Router::new()
            .route("/", get(seen_by_upstream))
            .layer(middleware::from_fn(ensure_correlation_id))
    }

    async fn body_string(resp: Response) -> String {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_generates_id_when_missing() {
        let resp = app()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let echoed = resp.headers().get(CORRELATION_ID).unwrap().to_str().unwrap().to_string();
        assert!(uuid::Uuid::parse_str(&echoed).is_ok());
        assert_eq!(body_string(resp).await, echoed);
    }

    #[tokio::test]
    async fn test_keeps_existing_id() {
        let req = Request::builder()
            .uri("/")
            .header(CORRELATION_ID, "abc-123")
            .body(Body::empty())
            .unwrap();
        let resp = app().oneshot(req).await.unwrap();

        assert_eq!(resp.headers().get(CORRELATION_ID).unwrap(), "abc-123");
        assert_eq!(body_string(resp).await, "abc-123");
    }

    #[tokio::test]
    async fn test_blank_id_is_replaced() {
        let req = Request::builder()
            .uri("/")
            .header(CORRELATION_ID, "  ")
            .body(Body::empty())
            .unwrap();
        let resp = app().oneshot(req).await.unwrap();
        let echoed = resp.headers().get(CORRELATION_ID).unwrap().to_str().unwrap();
        assert!(uuid::Uuid::parse_str(echoed).is_ok());
    }
}
