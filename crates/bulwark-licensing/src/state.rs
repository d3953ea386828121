use std::sync::Arc;

use bulwark_common::HttpMetrics;

use crate::service::LicenseService;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<LicenseService>,
    pub metrics: Arc<HttpMetrics>,
}

impl AsRef<HttpMetrics> for AppState {
    fn as_ref(&self) -> &HttpMetrics {
        &self.metrics
    }
}
