//! Cooperative cancellation signal.

use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

type Callback = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct Inner {
    cancelled: AtomicBool,
    callbacks: Mutex<Vec<Callback>>,
    children: Mutex<Vec<Weak<Inner>>>,
}

/// Shared cancellation flag with callbacks and derived child tokens.
///
/// Cancellation is advisory: nothing is interrupted, holders poll
/// [`is_cancelled`](Self::is_cancelled) or register a callback.
///
/// Cancelling a token cancels every child derived from it. Cancelling a
/// child leaves the parent untouched.
///
/// # Example
///
/// ```
/// use portal_runtime::context::CancellationToken;
///
/// let caller = CancellationToken::new();
/// let local = caller.child();
///
/// local.cancel();
/// assert!(local.is_cancelled());
/// assert!(!caller.is_cancelled());
///
/// let other = caller.child();
/// caller.cancel();
/// assert!(other.is_cancelled());
/// ```
#[derive(Clone, Default)]
pub struct CancellationToken {
    inner: Arc<Inner>,
}

impl CancellationToken {
    /// Creates an uncancelled token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` once [`cancel`](Self::cancel) has been called on
    /// this token or an ancestor.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Cancels the token. Callbacks run once, on the cancelling thread.
    pub fn cancel(&self) {
        if self.inner.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }
        let callbacks = std::mem::take(&mut *self.inner.callbacks.lock());
        for callback in callbacks {
            callback();
        }
        let children = std::mem::take(&mut *self.inner.children.lock());
        for inner in children.iter().filter_map(Weak::upgrade) {
            Self { inner }.cancel();
        }
    }

    /// Registers `callback` to run on cancellation. Runs immediately if
    /// the token is already cancelled.
    pub fn on_cancel<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        {
            let mut callbacks = self.inner.callbacks.lock();
            if !self.is_cancelled() {
                callbacks.push(Box::new(callback));
                return;
            }
        }
        callback();
    }

    /// Derives a token that is cancelled with this one.
    ///
    /// The parent only holds a weak link, so a child dropped before the
    /// parent is cancelled is forgotten on the next derivation.
    #[must_use]
    pub fn child(&self) -> Self {
        let child = Self::new();
        {
            let mut children = self.inner.children.lock();
            if !self.is_cancelled() {
                children.retain(|weak| weak.strong_count() > 0);
                children.push(Arc::downgrade(&child.inner));
                return child;
            }
        }
        child.cancel();
        child
    }
}

impl fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn callbacks_run_once() {
        let token = CancellationToken::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        token.on_cancel(move || {
            h.fetch_add(1, Ordering::SeqCst);
        });

        token.cancel();
        token.cancel();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn late_callback_runs_immediately() {
        let token = CancellationToken::new();
        token.cancel();

        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        token.on_cancel(move || {
            h.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn child_of_cancelled_parent_is_cancelled() {
        let parent = CancellationToken::new();
        parent.cancel();
        assert!(parent.child().is_cancelled());
    }

    #[test]
    fn dropped_children_are_not_retained() {
        let caller = CancellationToken::new();
        for _ in 0..10_000 {
            let local = caller.child();
            drop(local);
        }
        let kept = caller.child();
        assert_eq!(caller.inner.children.lock().len(), 1);

        caller.cancel();
        assert!(kept.is_cancelled());
        assert!(caller.inner.children.lock().is_empty());
    }

    #[test]
    fn live_child_is_cancelled_with_parent() {
        let caller = CancellationToken::new();
        let first = caller.child();
        let second = caller.child();
        drop(first);

        caller.cancel();
        assert!(second.is_cancelled());
    }

    #[test]
    fn clones_share_state() {
        let token = CancellationToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn cancel_from_another_thread() {
        let token = CancellationToken::new();
        let remote = token.clone();
        std::thread::spawn(move || remote.cancel())
            .join()
            .expect("thread joins");
        assert!(token.is_cancelled());
    }
}
