use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Span of the rolling statistics window.
    pub rolling_window: Duration,
    /// Number of buckets the window is split into.
    pub buckets: u32,
    /// Calls required in the window before the breaker may open.
    pub request_volume_threshold: u64,
    /// Percentage of failed or timed-out calls (0..=100) that trips the breaker.
    pub error_threshold_percent: u8,
    /// Time spent OPEN before a single trial call is let through.
    pub sleep_window: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            rolling_window: Duration::from_millis(15_000),
            buckets: 5,
            request_volume_threshold: 10,
            error_threshold_percent: 75,
            sleep_window: Duration::from_millis(7_000),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkheadConfig {
    pub workers: usize,
    pub queue_capacity: usize,
}

impl Default for BulkheadConfig {
    fn default() -> Self {
        Self {
            workers: 30,
            queue_capacity: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyConfig {
    pub timeout: Duration,
    pub breaker: CircuitBreakerConfig,
    pub bulkhead: BulkheadConfig,
}

impl Default for DependencyConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(2_000),
            breaker: CircuitBreakerConfig::default(),
            bulkhead: BulkheadConfig::default(),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("invalid config for dependency '{dependency}': {reason}")]
pub struct ConfigError {
    pub dependency: String,
    pub reason: &'static str,
}

/// `organization-service` → `BULWARK_DEP_ORGANIZATION_SERVICE_`
pub fn env_prefix(dependency: &str) -> String {
    let name: String = dependency
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect();
    format!("BULWARK_DEP_{name}_")
}

impl DependencyConfig {
    /// Reads `BULWARK_DEP_<NAME>_*` overrides on top of `base`.
    pub fn from_env(dependency: &str, base: &DependencyConfig) -> Self {
        Self::from_lookup(dependency, base, |key| std::env::var(key).ok())
    }

    pub fn from_lookup(
        dependency: &str,
        base: &DependencyConfig,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let prefix = env_prefix(dependency);
        let u64_var = |suffix: &str| {
            let key = format!("{prefix}{suffix}");
            let raw = lookup(&key)?;
            match raw.trim().parse::<u64>() {
                Ok(v) => Some(v),
                Err(_) => {
                    tracing::warn!(key=%key, value=%raw, "ignoring unparsable dependency setting");
                    None
                }
            }
        };

        let mut cfg = base.clone();
        if let Some(ms) = u64_var("TIMEOUT_MS") {
            cfg.timeout = Duration::from_millis(ms);
        }
        if let Some(v) = u64_var("WORKERS") {
            cfg.bulkhead.workers = v as usize;
        }
        if let Some(v) = u64_var("QUEUE") {
            cfg.bulkhead.queue_capacity = v as usize;
        }
        if let Some(v) = u64_var("VOLUME_THRESHOLD") {
            cfg.breaker.request_volume_threshold = v;
        }
        if let Some(v) = u64_var("ERROR_PERCENT") {
            cfg.breaker.error_threshold_percent = v.min(u64::from(u8::MAX)) as u8;
        }
        if let Some(ms) = u64_var("SLEEP_WINDOW_MS") {
            cfg.breaker.sleep_window = Duration::from_millis(ms);
        }
        if let Some(ms) = u64_var("WINDOW_MS") {
            cfg.breaker.rolling_window = Duration::from_millis(ms);
        }
        if let Some(v) = u64_var("BUCKETS") {
            cfg.breaker.buckets = v.min(u64::from(u32::MAX)) as u32;
        }
        cfg
    }

    pub fn validate(&self, dependency: &str) -> Result<(), ConfigError> {
        let fail = |reason| {
            Err(ConfigError {
                dependency: dependency.to_string(),
                reason,
            })
        };
        if self.bulkhead.workers == 0 {
            return fail("bulkhead needs at least one worker");
        }
        if self.breaker.buckets == 0 {
            return fail("rolling window needs at least one bucket");
        }
        if self.breaker.rolling_window.is_zero() {
            return fail("rolling window must be non-zero");
        }
        if self.breaker.error_threshold_percent > 100 {
            return fail("error threshold must be a percentage");
        }
        if self.timeout.is_zero() {
            return fail("timeout must be non-zero");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_env_prefix() {
        assert_eq!(env_prefix("organization-service"), "BULWARK_DEP_ORGANIZATION_SERVICE_");
        assert_eq!(env_prefix("licenses.by.org"), "BULWARK_DEP_LICENSES_BY_ORG_");
    }

    #[test]
    fn test_from_lookup_overrides_and_ignores_garbage() {
        let vars: HashMap<&str, &str> = [
            ("BULWARK_DEP_ORG_SVC_TIMEOUT_MS", "500"),
            ("BULWARK_DEP_ORG_SVC_WORKERS", "4"),
            ("BULWARK_DEP_ORG_SVC_ERROR_PERCENT", "50"),
            ("BULWARK_DEP_ORG_SVC_QUEUE", "lots"),
        ]
        .into_iter()
        .collect();

        let cfg = DependencyConfig::from_lookup("org-svc", &DependencyConfig::default(), |k| {
            vars.get(k).map(|v| v.to_string())
        });

        assert_eq!(cfg.timeout, Duration::from_millis(500));
        assert_eq!(cfg.bulkhead.workers, 4);
        assert_eq!(cfg.bulkhead.queue_capacity, 10);
        assert_eq!(cfg.breaker.error_threshold_percent, 50);
        assert_eq!(cfg.breaker.sleep_window, Duration::from_millis(7_000));
    }

    #[test]
    fn test_validate() {
        assert!(DependencyConfig::default().validate("x").is_ok());

        let mut cfg = DependencyConfig::default();
        cfg.bulkhead.workers = 0;
        assert_eq!(
            cfg.validate("x").unwrap_err().reason,
            "bulkhead needs at least one worker"
        );

        let mut cfg = DependencyConfig::default();
        cfg.breaker.error_threshold_percent = 101;
        assert!(cfg.validate("x").is_err());
    }
}
