use http::{HeaderMap, HeaderName, HeaderValue};

use crate::context_store::ContextStore;
use crate::request_context::{RequestContext, AUTH_TOKEN, CORRELATION_ID};

fn insert_if_present(headers: &mut HeaderMap, name: &'static str, value: &str) {
    if value.is_empty() {
        return;
    }
    match HeaderValue::from_str(value) {
        Ok(v) => {
            headers.insert(HeaderName::from_static(name), v);
        }
        Err(_) => {
            tracing::warn!(header = name, "skipping context header with invalid value");
        }
    }
}

/// Writes the egress subset of `ctx` (correlation id and auth token) into `headers`.
pub fn inject_headers(ctx: &RequestContext, headers: &mut HeaderMap) {
    insert_if_present(headers, CORRELATION_ID, ctx.correlation_id());
    insert_if_present(headers, AUTH_TOKEN, ctx.auth_token());
}

/// Same as [`inject_headers`] using the calling unit's current context.
pub fn inject_context_headers(headers: &mut HeaderMap) {
    inject_headers(&ContextStore::current(), headers);
}

/// Egress interceptor for `reqwest` requests.
pub trait PropagateContext {
    fn with_request_context(self) -> Self;
}

impl PropagateContext for reqwest::RequestBuilder {
    fn with_request_context(self) -> Self {
        let mut headers = HeaderMap::new();
        inject_context_headers(&mut headers);
        self.headers(headers)
    }
}
