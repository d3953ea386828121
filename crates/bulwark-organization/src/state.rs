use std::sync::Arc;

use bulwark_common::{HttpMetrics, Organization};
use bulwark_meta::RecordStore;

#[derive(Clone)]
pub struct AppState {
    pub organizations: RecordStore<Organization>,
    pub metrics: Arc<HttpMetrics>,
}

impl AsRef<HttpMetrics> for AppState {
    fn as_ref(&self) -> &HttpMetrics {
        &self.metrics
    }
}
