//! Cooperative cancellation.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll, Waker};

const DEFAULT_REASON: &str = "request cancelled";

/// A cloneable cancellation signal for in-flight fetches.
///
/// Pass a clone via [`FetchInit::signal`](crate::FetchInit); keep the
/// original and call [`cancel`](Self::cancel) (or
/// [`cancel_with`](Self::cancel_with)) to abort the fetch.  All clones
/// share the same state, and the first cancellation wins: later calls
/// cannot change the recorded reason.
#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    state: Mutex<State>,
    next_key: AtomicU64,
}

#[derive(Default)]
struct State {
    reason: Option<String>,
    // Keyed per waiter so dropped waiters can deregister themselves.
    wakers: Vec<(u64, Waker)>,
}

impl CancelToken {
    /// Creates a token in the not-cancelled state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels with the default reason.
    pub fn cancel(&self) {
        self.cancel_with(DEFAULT_REASON);
    }

    /// Cancels with a caller-supplied reason.
    ///
    /// The reason is carried verbatim into the resulting
    /// [`Error`](crate::Error) (see
    /// [`Error::reason`](crate::Error::reason)).  If the token is already
    /// cancelled this is a no-op.
    pub fn cancel_with(&self, reason: impl Into<String>) {
        let wakers = {
            let mut state = self
                .inner
                .state
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if state.reason.is_some() {
                return;
            }
            state.reason = Some(reason.into());
            std::mem::take(&mut state.wakers)
        };
        // Wake outside the lock so woken tasks can re-poll immediately.
        for (_, waker) in wakers {
            waker.wake();
        }
    }

    /// Returns `true` if this token has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.reason().is_some()
    }

    /// Returns the cancellation reason, if cancelled.
    pub fn reason(&self) -> Option<String> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .reason
            .clone()
    }

    /// Returns a future that resolves with the reason once the token is
    /// cancelled.  Resolves immediately if it already is.
    pub(crate) fn cancelled(&self) -> Cancelled {
        Cancelled {
            key: self.inner.next_key.fetch_add(1, Ordering::Relaxed),
            inner: Arc::clone(&self.inner),
        }
    }
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Future returned by [`CancelToken::cancelled`].
pub(crate) struct Cancelled {
    inner: Arc<Inner>,
    key: u64,
}

impl Future for Cancelled {
    type Output = String;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut state = self
            .inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(reason) = &state.reason {
            return Poll::Ready(reason.clone());
        }
        // One slot per waiter; a re-poll replaces the stored waker.
        match state.wakers.iter_mut().find(|(key, _)| *key == self.key) {
            Some((_, waker)) => waker.clone_from(cx.waker()),
            None => state.wakers.push((self.key, cx.waker().clone())),
        }
        Poll::Pending
    }
}

impl Drop for Cancelled {
    fn drop(&mut self) {
        let mut state = self
            .inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        state.wakers.retain(|(key, _)| *key != self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn starts_not_cancelled() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        assert_eq!(token.reason(), None);
    }

    #[test]
    fn cancel_uses_default_reason() {
        let token = CancelToken::new();
        token.cancel();
        assert!(token.is_cancelled());
        assert_eq!(token.reason().as_deref(), Some("request cancelled"));
    }

    #[test]
    fn cancel_with_carries_reason_verbatim() {
        let token = CancelToken::new();
        token.cancel_with("user navigated away");
        assert_eq!(token.reason().as_deref(), Some("user navigated away"));
    }

    #[test]
    fn first_cancellation_wins() {
        let token = CancelToken::new();
        token.cancel_with("first");
        token.cancel_with("second");
        token.cancel();
        assert_eq!(token.reason().as_deref(), Some("first"));
    }

    #[test]
    fn clones_share_state() {
        let token = CancelToken::new();
        let clone = token.clone();
        token.cancel_with("shared");
        assert!(clone.is_cancelled());
        assert_eq!(clone.reason().as_deref(), Some("shared"));
    }

    #[test]
    fn dropped_waiters_release_their_waker_slots() {
        use futures_util::task::{waker, ArcWake};
        use std::task::Context;

        struct Inert;
        impl ArcWake for Inert {
            fn wake_by_ref(_: &Arc<Self>) {}
        }

        let token = CancelToken::new();
        // Each iteration is a distinct task with its own waker, like a
        // long-lived token reused across many fetches.
        for _ in 0..16 {
            let task_waker = waker(Arc::new(Inert));
            let mut cx = Context::from_waker(&task_waker);
            let mut waiter = token.cancelled();
            assert!(Pin::new(&mut waiter).poll(&mut cx).is_pending());
            drop(waiter);
        }

        let state = token.inner.state.lock().unwrap();
        assert!(state.wakers.is_empty(), "no stale wakers may linger");
    }

    #[test]
    fn repolling_one_waiter_keeps_a_single_slot() {
        use futures_util::task::{waker, ArcWake};
        use std::task::Context;

        struct Inert;
        impl ArcWake for Inert {
            fn wake_by_ref(_: &Arc<Self>) {}
        }

        let token = CancelToken::new();
        let mut waiter = token.cancelled();
        for _ in 0..4 {
            let task_waker = waker(Arc::new(Inert));
            let mut cx = Context::from_waker(&task_waker);
            assert!(Pin::new(&mut waiter).poll(&mut cx).is_pending());
        }

        let state = token.inner.state.lock().unwrap();
        assert_eq!(state.wakers.len(), 1);
    }

    #[tokio::test]
    async fn cancelled_future_resolves_immediately_when_already_cancelled() {
        let token = CancelToken::new();
        token.cancel_with("early");
        assert_eq!(token.cancelled().await, "early");
    }

    #[tokio::test]
    async fn cancelled_future_wakes_on_cancel() {
        let token = CancelToken::new();
        let waiter = token.cancelled();

        let trigger = token.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel_with("from task");
        });

        let reason = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("cancelled() should resolve after cancel");
        assert_eq!(reason, "from task");
        handle.await.unwrap();
    }
}
