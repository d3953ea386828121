//! Per-execution-unit storage for the current [`RequestContext`].
//!
//! An execution unit is a future run through [`ContextStore::scope`] (in
//! practice one Tokio task per inbound request, or one bulkhead job). Code
//! running outside any scope falls back to a thread-local slot, so
//! synchronous callers still get per-thread isolation.
//!
//! Async code must run inside a scope: on a multi-thread runtime the
//! thread-local slot is shared by every unscoped task that happens to run on
//! the same worker thread. [`ContextStore::set`] logs a warning when it is
//! called that way.

use std::cell::RefCell;
use std::future::Future;

use crate::request_context::{ContextError, RequestContext};

tokio::task_local! {
    static TASK_SLOT: RefCell<Option<RequestContext>>;
}

thread_local! {
    static THREAD_SLOT: RefCell<Option<RequestContext>> = const { RefCell::new(None) };
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ContextStore;

impl ContextStore {
    /// Returns the current unit's context, creating an empty one on first access.
    pub fn current() -> RequestContext {
        with_slot(|slot| slot.get_or_insert_with(RequestContext::empty).clone())
    }

    pub fn set(ctx: RequestContext) -> Result<(), ContextError> {
        ctx.validate()?;
        if unscoped_in_runtime() {
            tracing::warn!(
                correlation_id = ctx.correlation_id(),
                "request context set outside a scope on a runtime thread; it is shared with other unscoped tasks"
            );
        }
        with_slot(|slot| *slot = Some(ctx));
        Ok(())
    }

    pub fn clear() {
        with_slot(|slot| *slot = None);
    }

    /// Runs `fut` as its own execution unit. The slot starts as `initial` and is
    /// discarded when the future completes or is dropped; the enclosing unit's
    /// slot is untouched.
    pub async fn scope<F>(initial: Option<RequestContext>, fut: F) -> F::Output
    where
        F: Future,
    {
        TASK_SLOT.scope(RefCell::new(initial), fut).await
    }

    pub fn in_scope() -> bool {
        TASK_SLOT.try_with(|_| ()).is_ok()
    }
}

fn unscoped_in_runtime() -> bool {
    !ContextStore::in_scope() && tokio::runtime::Handle::try_current().is_ok()
}

fn with_slot<R>(f: impl FnOnce(&mut Option<RequestContext>) -> R) -> R {
    if ContextStore::in_scope() {
        TASK_SLOT.with(|cell| f(&mut cell.borrow_mut()))
    } else {
        THREAD_SLOT.with(|cell| f(&mut cell.borrow_mut()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_defaults_to_empty_and_is_stable() {
        std::thread::spawn(|| {
            let first = ContextStore::current();
            let second = ContextStore::current();
            assert!(first.is_empty());
            assert_eq!(first, second);
        })
        .join()
        .unwrap();
    }

    #[test]
    fn test_threads_do_not_share_context() {
        std::thread::spawn(|| {
            ContextStore::set(RequestContext::empty().with_correlation_id("thread-a")).unwrap();
            let other = std::thread::spawn(ContextStore::current).join().unwrap();
            assert!(other.is_empty());
            assert_eq!(ContextStore::current().correlation_id(), "thread-a");
        })
        .join()
        .unwrap();
    }

    #[test]
    fn test_set_rejects_invalid_context() {
        std::thread::spawn(|| {
            let err = ContextStore::set(RequestContext::empty().with_auth_token("bad\r\ntoken"))
                .unwrap_err();
            assert!(matches!(err, ContextError::InvalidContext { .. }));
            assert!(ContextStore::current().is_empty());
        })
        .join()
        .unwrap();
    }

    #[tokio::test]
    async fn test_scope_isolates_tasks() {
        let a = tokio::spawn(ContextStore::scope(None, async {
            ContextStore::set(RequestContext::empty().with_correlation_id("req-a")).unwrap();
            tokio::task::yield_now().await;
            ContextStore::current().correlation_id().to_string()
        }));
        let b = tokio::spawn(ContextStore::scope(None, async {
            ContextStore::set(RequestContext::empty().with_correlation_id("req-b")).unwrap();
            tokio::task::yield_now().await;
            ContextStore::current().correlation_id().to_string()
        }));

        assert_eq!(a.await.unwrap(), "req-a");
        assert_eq!(b.await.unwrap(), "req-b");
    }

    #[tokio::test]
    async fn test_nested_scope_restores_outer_context() {
        let outer = RequestContext::empty().with_correlation_id("outer");
        ContextStore::scope(Some(outer.clone()), async {
            ContextStore::scope(None, async {
                ContextStore::set(RequestContext::empty().with_correlation_id("inner")).unwrap();
            })
            .await;
            assert_eq!(ContextStore::current(), outer);

            ContextStore::clear();
            assert!(ContextStore::current().is_empty());
        })
        .await;
    }

    #[tokio::test]
    async fn test_unscoped_runtime_code_is_detected() {
        assert!(unscoped_in_runtime());
        ContextStore::scope(None, async {
            assert!(!unscoped_in_runtime());
        })
        .await;
        let off_runtime = std::thread::spawn(unscoped_in_runtime).join().unwrap();
        assert!(!off_runtime);
    }
}
