use std::future::Future;

use tracing::Instrument;

use crate::context_store::ContextStore;
use crate::request_context::RequestContext;

/// A unit of work bound to the request context of whoever created it.
///
/// The snapshot is taken in [`ContextCarryingTask::new`]; [`run`](Self::run)
/// installs it for the duration of the work on whichever task ends up polling
/// it, and drops it afterward whether the work completes, fails, panics or is
/// cancelled.
pub struct ContextCarryingTask<F> {
    context: RequestContext,
    span: tracing::Span,
    work: F,
}

impl<F> ContextCarryingTask<F>
where
    F: Future,
{
    pub fn new(work: F) -> Self {
        Self::with_context(ContextStore::current(), work)
    }

    pub fn with_context(context: RequestContext, work: F) -> Self {
        Self {
            context,
            span: tracing::Span::current(),
            work,
        }
    }

    pub fn context(&self) -> &RequestContext {
        &self.context
    }

    pub async fn run(self) -> F::Output {
        let Self {
            context,
            span,
            work,
        } = self;
        ContextStore::scope(Some(context), work.instrument(span)).await
    }
}

impl<F> std::fmt::Debug for ContextCarryingTask<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextCarryingTask")
            .field("correlation_id", &self.context.correlation_id())
            .finish()
    }
}
