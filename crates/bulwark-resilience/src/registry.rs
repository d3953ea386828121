use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use crate::bulkhead::Bulkhead;
use crate::circuit_breaker::{BreakerHealth, CircuitBreaker};
use crate::config::{ConfigError, DependencyConfig};

/// Lifetime counters of one dependency, independent of the rolling window.
#[derive(Debug, Default)]
pub struct DependencyCounters {
    pub successes: AtomicU64,
    pub failures: AtomicU64,
    pub timeouts: AtomicU64,
    pub rejections: AtomicU64,
    pub short_circuits: AtomicU64,
    pub fallbacks: AtomicU64,
    pub fallback_failures: AtomicU64,
}

impl DependencyCounters {
    pub(crate) fn inc(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Breaker, bulkhead and settings owned by one named downstream dependency.
#[derive(Debug)]
pub struct Dependency {
    name: String,
    config: DependencyConfig,
    pub(crate) breaker: CircuitBreaker,
    pub(crate) bulkhead: Bulkhead,
    pub(crate) counters: DependencyCounters,
}

impl Dependency {
    fn new(name: &str, config: DependencyConfig) -> Self {
        Self {
            name: name.to_string(),
            breaker: CircuitBreaker::new(name, config.breaker.clone()),
            bulkhead: Bulkhead::new(name, config.bulkhead.clone()),
            counters: DependencyCounters::default(),
            config,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &DependencyConfig {
        &self.config
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn bulkhead(&self) -> &Bulkhead {
        &self.bulkhead
    }

    pub fn counters(&self) -> &DependencyCounters {
        &self.counters
    }

    pub fn snapshot(&self) -> DependencySnapshot {
        let c = &self.counters;
        DependencySnapshot {
            name: self.name.clone(),
            breaker: self.breaker.health(),
            in_flight: self.bulkhead.in_flight(),
            queued: self.bulkhead.queued(),
            successes: c.successes.load(Ordering::Relaxed),
            failures: c.failures.load(Ordering::Relaxed),
            timeouts: c.timeouts.load(Ordering::Relaxed),
            rejections: c.rejections.load(Ordering::Relaxed),
            short_circuits: c.short_circuits.load(Ordering::Relaxed),
            fallbacks: c.fallbacks.load(Ordering::Relaxed),
            fallback_failures: c.fallback_failures.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencySnapshot {
    pub name: String,
    pub breaker: BreakerHealth,
    pub in_flight: usize,
    pub queued: usize,
    pub successes: u64,
    pub failures: u64,
    pub timeouts: u64,
    pub rejections: u64,
    pub short_circuits: u64,
    pub fallbacks: u64,
    pub fallback_failures: u64,
}

/// Name → [`Dependency`] map. Build one per process (or per test) and hand it
/// to the executor; there is no global instance.
#[derive(Debug)]
pub struct DependencyRegistry {
    defaults: DependencyConfig,
    dependencies: DashMap<String, Arc<Dependency>>,
}

impl Default for DependencyRegistry {
    fn default() -> Self {
        Self::new(DependencyConfig::default())
    }
}

impl DependencyRegistry {
    pub fn new(defaults: DependencyConfig) -> Self {
        Self {
            defaults,
            dependencies: DashMap::new(),
        }
    }

    pub fn defaults(&self) -> &DependencyConfig {
        &self.defaults
    }

    /// Registers `name` with `config`. An existing registration is kept as is,
    /// since callers may already hold its breaker state.
    pub fn register(&self, name: &str, config: DependencyConfig) -> Result<Arc<Dependency>, ConfigError> {
        config.validate(name)?;
        let dep = self
            .dependencies
            .entry(name.to_string())
            .or_insert_with(|| {
                tracing::info!(
                    dependency = name,
                    timeout_ms = config.timeout.as_millis() as u64,
                    workers = config.bulkhead.workers,
                    queue = config.bulkhead.queue_capacity,
                    "dependency registered"
                );
                Arc::new(Dependency::new(name, config))
            })
            .value()
            .clone();
        Ok(dep)
    }

    /// Registers `name` using `BULWARK_DEP_<NAME>_*` overrides over the defaults.
    pub fn register_from_env(&self, name: &str) -> Result<Arc<Dependency>, ConfigError> {
        self.register(name, DependencyConfig::from_env(name, &self.defaults))
    }

    pub fn get(&self, name: &str) -> Option<Arc<Dependency>> {
        self.dependencies.get(name).map(|d| d.value().clone())
    }

    /// Looks up `name`, registering it with the registry defaults on first use.
    pub fn get_or_register(&self, name: &str) -> Arc<Dependency> {
        if let Some(dep) = self.get(name) {
            return dep;
        }
        tracing::debug!(dependency = name, "registering unknown dependency with defaults");
        self.dependencies
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Dependency::new(name, self.defaults.clone())))
            .value()
            .clone()
    }

    /// Snapshots of all dependencies, sorted by name.
    pub fn snapshots(&self) -> Vec<DependencySnapshot> {
        let mut out: Vec<DependencySnapshot> =
            self.dependencies.iter().map(|d| d.value().snapshot()).collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_register_is_idempotent() {
        let reg = DependencyRegistry::default();
        let mut cfg = DependencyConfig::default();
        cfg.timeout = Duration::from_millis(500);

        let a = reg.register("org-svc", cfg).unwrap();
        let b = reg.register("org-svc", DependencyConfig::default()).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(b.config().timeout, Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_register_rejects_invalid_config() {
        let reg = DependencyRegistry::default();
        let mut cfg = DependencyConfig::default();
        cfg.breaker.buckets = 0;
        assert!(reg.register("bad", cfg).is_err());
        assert!(reg.get("bad").is_none());
    }

    #[tokio::test]
    async fn test_unknown_dependency_gets_defaults_and_snapshots_sort() {
        let reg = DependencyRegistry::default();
        let dep = reg.get_or_register("zeta");
        assert_eq!(dep.config(), reg.defaults());
        reg.get_or_register("alpha");

        let names: Vec<String> = reg.snapshots().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["alpha".to_string(), "zeta".to_string()]);
    }
}
