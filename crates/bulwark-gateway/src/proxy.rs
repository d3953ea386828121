use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request, StatusCode},
    response::{IntoResponse, Response},
};

use bulwark_common::error_response::error_response;
use bulwark_common::PropagateContext;

use crate::state::AppState;

const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

fn classify_reqwest_error(error: &reqwest::Error) -> &'static str {
    if error.is_timeout() {
        return "timeout";
    }
    if error.is_connect() {
        return "connect";
    }
    "other"
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub prefix: String,
    pub upstream: String,
}

/// Static prefix → upstream table. The matched prefix is stripped before
/// forwarding.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_route(mut self, prefix: &str, upstream: &str) -> Self {
        self.routes.push(Route {
            prefix: prefix.trim_end_matches('/').to_string(),
            upstream: upstream.trim_end_matches('/').to_string(),
        });
        self
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Returns the upstream base URL and the path to request on it.
    pub fn resolve<'a>(&'a self, path: &'a str) -> Option<(&'a str, &'a str)> {
        self.routes.iter().find_map(|r| {
            let rest = path.strip_prefix(r.prefix.as_str())?;
            if rest.is_empty() {
                Some((r.upstream.as_str(), "/"))
            } else if rest.starts_with('/') {
                Some((r.upstream.as_str(), rest))
            } else {
                None
            }
        })
    }
}

fn forwardable_headers(headers: &HeaderMap) -> HeaderMap {
    let mut out = HeaderMap::new();
    for (k, v) in headers.iter() {
        let name = k.as_str();
        if name.eq_ignore_ascii_case("host")
            || name.eq_ignore_ascii_case("content-length")
            || HOP_BY_HOP.iter().any(|h| name.eq_ignore_ascii_case(h))
        {
            continue;
        }
        out.append(k.clone(), v.clone());
    }
    out
}

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

pub async fn metrics_handler(State(st): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, st.metrics.render("bulwark_gateway"))
}

/// Forwards any request under a known prefix to its upstream service.
pub async fn forward(State(st): State<AppState>, req: Request<Body>) -> Response {
    let path = req.uri().path().to_string();
    let Some((upstream, rest)) = st.routes.resolve(&path) else {
        tracing::debug!(path=%path, "no route for path");
        return error_response(StatusCode::NOT_FOUND, "route_not_found", &format!("no route for {path}"));
    };
    let query = req.uri().query().map(|q| format!("?{q}")).unwrap_or_default();
    let url = format!("{upstream}{rest}{query}");

    let method = req.method().clone();
    let headers = forwardable_headers(req.headers());
    let body = match axum::body::to_bytes(req.into_body(), st.max_body_bytes).await {
        Ok(b) => b,
        Err(_) => {
            return error_response(StatusCode::PAYLOAD_TOO_LARGE, "body_too_large", "request body too large");
        }
    };

    tracing::debug!(method=%method, url=%url, "forwarding request");
    let resp = match st
        .http
        .request(method, &url)
        .headers(headers)
        .with_request_context()
        .body(body)
        .send()
        .await
    {
        Ok(resp) => resp,
        Err(e) => {
            let kind = classify_reqwest_error(&e);
            tracing::error!(error=%e, kind, url=%url, "gateway upstream request failed");
            return error_response(StatusCode::BAD_GATEWAY, "upstream_unavailable", "upstream request failed");
        }
    };

    let status = resp.status();
    let resp_headers = forwardable_headers(resp.headers());
    let bytes = match resp.bytes().await {
        Ok(b) => b,
        Err(e) => {
            tracing::error!(error=%e, url=%url, "failed to read upstream body");
            return error_response(StatusCode::BAD_GATEWAY, "upstream_unavailable", "upstream body unreadable");
        }
    };

    let mut out = Response::new(Body::from(bytes));
    *out.status_mut() = status;
    *out.headers_mut() = resp_headers;
    out
}
