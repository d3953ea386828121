use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bulwark_common::{ContextCarryingTask, ContextStore};

use crate::circuit_breaker::{Admission, CircuitBreaker};
use crate::error::ResilienceError;
use crate::registry::{Dependency, DependencyCounters, DependencyRegistry};
use crate::rolling::Outcome;

/// Runs calls to named dependencies behind their breaker, bulkhead and
/// timeout, substituting the caller's fallback whenever the primary path
/// is skipped or fails.
#[derive(Debug, Clone)]
pub struct ResilientExecutor {
    registry: Arc<DependencyRegistry>,
}

/// Records exactly one outcome for an admitted call. A trial slot that is
/// dropped without an outcome (caller went away) is handed back.
struct AdmittedCall<'a> {
    breaker: &'a CircuitBreaker,
    probe: bool,
    recorded: bool,
}

impl<'a> AdmittedCall<'a> {
    fn new(breaker: &'a CircuitBreaker, admission: Admission) -> Self {
        Self {
            breaker,
            probe: admission == Admission::Probe,
            recorded: false,
        }
    }

    fn record(mut self, outcome: Outcome) {
        self.recorded = true;
        if self.probe {
            self.breaker.record_probe_outcome(outcome);
        } else {
            self.breaker.record_outcome(outcome);
        }
    }
}

impl Drop for AdmittedCall<'_> {
    fn drop(&mut self) {
        if self.probe && !self.recorded {
            tracing::debug!(dependency = self.breaker.name(), "trial call abandoned, releasing probe");
            self.breaker.release_probe();
        }
    }
}

impl ResilientExecutor {
    pub fn new(registry: Arc<DependencyRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<DependencyRegistry> {
        &self.registry
    }

    /// [`ResilientExecutor::execute`] with the dependency's configured timeout.
    pub async fn call<T, W, FB>(&self, dependency: &str, work: W, fallback: FB) -> Result<T, ResilienceError>
    where
        T: Send + 'static,
        W: Future<Output = anyhow::Result<T>> + Send + 'static,
        FB: FnOnce(&ResilienceError) -> anyhow::Result<T>,
    {
        let dep = self.registry.get_or_register(dependency);
        let timeout = dep.config().timeout;
        run(&dep, work, fallback, timeout).await
    }

    /// Runs `work` for `dependency` on its bulkhead under the current request
    /// context, waiting at most `timeout`.
    ///
    /// Returns the work's value, or the fallback's value when the circuit is
    /// open, the bulkhead is full, the call times out or the work fails. Only
    /// a failing fallback ([`ResilienceError::FallbackFailed`]) or an
    /// uncarriable request context ([`ResilienceError::Context`]) reach the
    /// caller as errors.
    pub async fn execute<T, W, FB>(
        &self,
        dependency: &str,
        work: W,
        fallback: FB,
        timeout: Duration,
    ) -> Result<T, ResilienceError>
    where
        T: Send + 'static,
        W: Future<Output = anyhow::Result<T>> + Send + 'static,
        FB: FnOnce(&ResilienceError) -> anyhow::Result<T>,
    {
        let dep = self.registry.get_or_register(dependency);
        run(&dep, work, fallback, timeout).await
    }
}

async fn run<T, W, FB>(dep: &Dependency, work: W, fallback: FB, timeout: Duration) -> Result<T, ResilienceError>
where
    T: Send + 'static,
    W: Future<Output = anyhow::Result<T>> + Send + 'static,
    FB: FnOnce(&ResilienceError) -> anyhow::Result<T>,
{
    let admission = dep.breaker.admit();
    if admission == Admission::Denied {
        DependencyCounters::inc(&dep.counters.short_circuits);
        let err = ResilienceError::CircuitOpen {
            dependency: dep.name().to_string(),
        };
        tracing::debug!(dependency = dep.name(), "circuit open, skipping call");
        return fall_back(dep, err, fallback);
    }
    let admitted = AdmittedCall::new(&dep.breaker, admission);

    let task = ContextCarryingTask::new(work);
    task.context().validate()?;

    match attempt(dep, task, timeout).await {
        Ok(value) => {
            admitted.record(Outcome::Success);
            DependencyCounters::inc(&dep.counters.successes);
            Ok(value)
        }
        Err(err) => {
            let (outcome, counter) = match &err {
                ResilienceError::CallTimeout { .. } => (Outcome::Timeout, &dep.counters.timeouts),
                ResilienceError::BulkheadRejected { .. } => (Outcome::Failure, &dep.counters.rejections),
                _ => (Outcome::Failure, &dep.counters.failures),
            };
            admitted.record(outcome);
            DependencyCounters::inc(counter);
            tracing::warn!(
                dependency = dep.name(),
                kind = err.kind(),
                correlation_id = %ContextStore::current().correlation_id(),
                error = %err,
                "dependency call failed, using fallback"
            );
            fall_back(dep, err, fallback)
        }
    }
}

async fn attempt<T, W>(dep: &Dependency, task: ContextCarryingTask<W>, timeout: Duration) -> Result<T, ResilienceError>
where
    T: Send + 'static,
    W: Future<Output = anyhow::Result<T>> + Send + 'static,
{
    let handle = dep.bulkhead.submit(task)?;
    let cancel = handle.cancel_token();

    match tokio::time::timeout(timeout, handle.join()).await {
        Ok(Ok(Ok(value))) => Ok(value),
        Ok(Ok(Err(e))) => Err(ResilienceError::DependencyFailure {
            dependency: dep.name().to_string(),
            message: format!("{e:#}"),
        }),
        Ok(Err(abandoned)) => Err(ResilienceError::DependencyFailure {
            dependency: dep.name().to_string(),
            message: abandoned.to_string(),
        }),
        Err(_) => {
            // The work may still finish on its worker; its result is discarded.
            cancel.cancel();
            Err(ResilienceError::CallTimeout {
                dependency: dep.name().to_string(),
                timeout,
            })
        }
    }
}

fn fall_back<T, FB>(dep: &Dependency, cause: ResilienceError, fallback: FB) -> Result<T, ResilienceError>
where
    FB: FnOnce(&ResilienceError) -> anyhow::Result<T>,
{
    DependencyCounters::inc(&dep.counters.fallbacks);
    fallback(&cause).map_err(|e| {
        DependencyCounters::inc(&dep.counters.fallback_failures);
        tracing::error!(dependency = dep.name(), cause = %cause, error = %e, "fallback failed");
        ResilienceError::FallbackFailed {
            dependency: dep.name().to_string(),
            cause: Box::new(cause),
            message: format!("{e:#}"),
        }
    })
}
