use std::fmt::Write;

use crate::registry::{DependencyRegistry, DependencySnapshot};

const SERIES_COUNT: usize = 13;

type Sample = (&'static str, &'static str, &'static str, u64);

fn samples(s: &DependencySnapshot) -> [Sample; SERIES_COUNT] {
    [
        (
            "circuit_state",
            "gauge",
            "Breaker state (0 closed, 1 open, 2 half-open).",
            u64::from(s.breaker.state.as_gauge()),
        ),
        ("circuit_opened_total", "counter", "Times the breaker has opened.", s.breaker.times_opened),
        ("window_requests", "gauge", "Calls in the rolling window.", s.breaker.window.total()),
        (
            "window_error_percent",
            "gauge",
            "Error percentage in the rolling window.",
            s.breaker.window.error_percent(),
        ),
        ("bulkhead_in_flight", "gauge", "Calls running on bulkhead workers.", s.in_flight as u64),
        ("bulkhead_queued", "gauge", "Calls waiting in the bulkhead queue.", s.queued as u64),
        ("successes_total", "counter", "Successful calls.", s.successes),
        ("failures_total", "counter", "Calls that failed.", s.failures),
        ("timeouts_total", "counter", "Calls that timed out.", s.timeouts),
        ("rejections_total", "counter", "Calls rejected by a full bulkhead.", s.rejections),
        ("short_circuits_total", "counter", "Calls skipped by an open breaker.", s.short_circuits),
        ("fallbacks_total", "counter", "Fallback invocations.", s.fallbacks),
        ("fallback_failures_total", "counter", "Fallbacks that failed.", s.fallback_failures),
    ]
}

/// Prometheus text for every registered dependency, one labelled sample per
/// dependency under series named `{prefix}_dependency_*`.
pub fn render_dependency_metrics(registry: &DependencyRegistry, prefix: &str) -> String {
    let snapshots = registry.snapshots();
    let mut body = String::new();
    if snapshots.is_empty() {
        return body;
    }
    let rows: Vec<(&str, [Sample; SERIES_COUNT])> =
        snapshots.iter().map(|s| (s.name.as_str(), samples(s))).collect();
    for i in 0..SERIES_COUNT {
        let (name, kind, help, _) = rows[0].1[i];
        let _ = writeln!(body, "# HELP {prefix}_dependency_{name} {help}");
        let _ = writeln!(body, "# TYPE {prefix}_dependency_{name} {kind}");
        for (dependency, row) in &rows {
            let _ = writeln!(
                body,
                "{prefix}_dependency_{name}{{dependency=\"{}\"}} {}",
                escape_label(dependency),
                row[i].3
            );
        }
    }
    body
}

fn escape_label(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rolling::Outcome;

    #[test]
    fn test_empty_registry_renders_nothing() {
        assert_eq!(render_dependency_metrics(&DependencyRegistry::default(), "bulwark"), "");
    }

    #[tokio::test]
    async fn test_renders_labelled_series() {
        let registry = DependencyRegistry::default();
        let dep = registry.get_or_register("organization-service");
        for _ in 0..10 {
            dep.breaker().record_outcome(Outcome::Failure);
        }
        registry.get_or_register("licenses-by-org");

        let text = render_dependency_metrics(&registry, "bulwark_licensing");
        assert!(text.contains("# TYPE bulwark_licensing_dependency_circuit_state gauge\n"));
        assert!(text.contains("bulwark_licensing_dependency_circuit_state{dependency=\"organization-service\"} 1\n"));
        assert!(text.contains("bulwark_licensing_dependency_circuit_state{dependency=\"licenses-by-org\"} 0\n"));
        assert!(text.contains("bulwark_licensing_dependency_window_error_percent{dependency=\"organization-service\"} 100\n"));
        assert!(text.contains("bulwark_licensing_dependency_circuit_opened_total{dependency=\"organization-service\"} 1\n"));
    }

    #[test]
    fn test_escape_label() {
        assert_eq!(escape_label("a\"b\\c"), "a\\\"b\\\\c");
    }
}
