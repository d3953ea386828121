use std::sync::Arc;

use bulwark_common::HttpMetrics;

use crate::proxy::RouteTable;

#[derive(Clone)]
pub struct AppState {
    pub routes: Arc<RouteTable>,
    pub http: reqwest::Client,
    pub max_body_bytes: usize,
    pub metrics: Arc<HttpMetrics>,
}

impl AsRef<HttpMetrics> for AppState {
    fn as_ref(&self) -> &HttpMetrics {
        &self.metrics
    }
}
