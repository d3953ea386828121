pub mod carrying_task;
pub mod context_store;
pub mod error_response;
pub mod http_metrics;
pub mod ingress;
pub mod license;
pub mod organization;
pub mod outbound;
pub mod request_context;

pub use carrying_task::ContextCarryingTask;
pub use context_store::ContextStore;
pub use http_metrics::HttpMetrics;
pub use license::License;
pub use organization::Organization;
pub use outbound::PropagateContext;
pub use request_context::{ContextError, RequestContext};

pub mod telemetry;
