use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::context_store::ContextStore;

#[derive(Debug, Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
    correlation_id: String,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

/// JSON error body tagged with the current request's correlation id.
pub fn error_response(status: StatusCode, code: &str, message: &str) -> Response {
    let body = ErrorResponse {
        error: ErrorDetail {
            code: code.to_string(),
            message: message.to_string(),
            correlation_id: ContextStore::current().correlation_id().to_string(),
        },
    };
    (status, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RequestContext;

    #[tokio::test]
    async fn test_error_body_carries_correlation_id() {
        let ctx = RequestContext::empty().with_correlation_id("abc-123");
        let resp = ContextStore::scope(Some(ctx), async {
            error_response(StatusCode::NOT_FOUND, "not_found", "organization 42 not found")
        })
        .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let v: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(v["error"]["code"], "not_found");
        assert_eq!(v["error"]["message"], "organization 42 not found");
        assert_eq!(v["error"]["correlation_id"], "abc-123");
    }
}
