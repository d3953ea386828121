pub mod bulkhead;
pub mod circuit_breaker;
pub mod config;
pub mod error;
pub mod executor;
pub mod metrics;
pub mod registry;
pub mod rolling;

pub use bulkhead::{Bulkhead, BulkheadHandle, TaskAbandoned};
pub use circuit_breaker::{Admission, BreakerHealth, CircuitBreaker, CircuitState};
pub use config::{BulkheadConfig, CircuitBreakerConfig, ConfigError, DependencyConfig};
pub use error::ResilienceError;
pub use executor::ResilientExecutor;
pub use registry::{Dependency, DependencyRegistry, DependencySnapshot};
pub use rolling::Outcome;
