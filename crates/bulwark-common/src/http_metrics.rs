use std::sync::atomic::{AtomicU64, Ordering};

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};

#[derive(Debug, Default)]
pub struct HttpMetrics {
    pub requests_total: AtomicU64,
    pub requests_inflight: AtomicU64,
    pub status_2xx: AtomicU64,
    pub status_4xx: AtomicU64,
    pub status_5xx: AtomicU64,
}

impl HttpMetrics {
    pub fn record_status(&self, status: u16) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        if status >= 500 {
            self.status_5xx.fetch_add(1, Ordering::Relaxed);
        } else if status >= 400 {
            self.status_4xx.fetch_add(1, Ordering::Relaxed);
        } else if status >= 200 {
            self.status_2xx.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Prometheus text exposition, every series prefixed with `prefix`
    /// (e.g. "bulwark_gateway").
    pub fn render(&self, prefix: &str) -> String {
        let mut body = String::new();
        let series = [
            ("requests_total", "counter", "Total requests handled.", &self.requests_total),
            ("requests_inflight", "gauge", "Currently in-flight requests.", &self.requests_inflight),
            ("responses_2xx", "counter", "Total 2xx responses.", &self.status_2xx),
            ("responses_4xx", "counter", "Total 4xx responses.", &self.status_4xx),
            ("responses_5xx", "counter", "Total 5xx responses.", &self.status_5xx),
        ];
        for (name, kind, help, value) in series {
            body.push_str(&format!(
                "# HELP {prefix}_{name} {help}\n\
                 # TYPE {prefix}_{name} {kind}\n\
                 {prefix}_{name} {}\n",
                value.load(Ordering::Relaxed),
            ));
        }
        body
    }
}

// Generic over any state type S that implements AsRef<HttpMetrics>.
// Usage: `middleware::from_fn_with_state(app_state, track_requests::<MyAppState>)`
pub async fn track_requests<S>(
    State(state): State<S>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, std::convert::Infallible>
where
    S: AsRef<HttpMetrics> + Clone + Send + Sync + 'static,
{
    let metrics = state.as_ref();
    metrics.requests_inflight.fetch_add(1, Ordering::Relaxed);
    let resp = next.run(req).await;
    metrics.requests_inflight.fetch_sub(1, Ordering::Relaxed);
    metrics.record_status(resp.status().as_u16());
    Ok(resp)
}
