//! Caller identity frames.

use parking_lot::Mutex;
use portal_auth::PackageVerifier;
use portal_types::{CallIdentity, ErrorCode, PackageName, Uid};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use thiserror::Error;
use tracing::{trace, warn};

/// Errors from reading or restoring call frames.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    /// A frame was popped out of order.
    #[error("unbalanced pop: token {token} is not the innermost frame (depth {depth})")]
    UnbalancedPop {
        /// Id of the offending token.
        token: u64,
        /// Depth at the time of the pop.
        depth: usize,
    },

    /// The asserted package does not belong to the frame's uid.
    #[error("package '{package}' does not belong to uid {uid}")]
    IdentityMismatch {
        /// Claimed package.
        package: PackageName,
        /// Frame uid.
        uid: Uid,
    },
}

impl ErrorCode for ContextError {
    fn code(&self) -> &'static str {
        match self {
            Self::UnbalancedPop { .. } => "CONTEXT_UNBALANCED_POP",
            Self::IdentityMismatch { .. } => "CONTEXT_IDENTITY_MISMATCH",
        }
    }

    fn is_recoverable(&self) -> bool {
        false
    }
}

/// Opaque handle to one pushed frame. Restores the previous frame when
/// passed back to [`CallContext::pop`].
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a pushed frame must be popped"]
pub struct CallToken {
    id: u64,
}

#[derive(Debug)]
struct Frame {
    id: u64,
    identity: CallIdentity,
    thread: ThreadId,
}

/// Identity frames of one execution context.
///
/// # Threads
///
/// A context belongs to one thread while any frame is pushed. Frames of
/// two threads sharing a context would interleave, so handing a context
/// to another thread is only valid once its depth is back to zero. Debug
/// builds assert this on every push and pop.
///
/// # Example
///
/// ```
/// use portal_runtime::context::CallContext;
/// use portal_runtime::auth::StaticPolicyOracle;
/// use portal_types::{CallIdentity, PackageName, Pid, Uid};
/// use std::sync::Arc;
///
/// let pkg = PackageName::try_from("com.example.reader").unwrap();
/// let oracle = StaticPolicyOracle::builder()
///     .own_package(pkg.clone(), Uid::new(10_050))
///     .build();
/// let cx = CallContext::new(Arc::new(oracle));
///
/// {
///     let _scope = cx.enter(CallIdentity::new(Uid::new(10_050), Pid::new(1)).with_package(pkg.clone()));
///     assert_eq!(cx.current_package().unwrap(), Some(pkg));
/// }
/// assert_eq!(cx.depth(), 0);
/// ```
#[derive(Debug)]
pub struct CallContext {
    verifier: Arc<dyn PackageVerifier>,
    frames: Mutex<Vec<Frame>>,
    next_id: AtomicU64,
}

impl CallContext {
    /// Creates an empty context verifying packages with `verifier`.
    #[must_use]
    pub fn new(verifier: Arc<dyn PackageVerifier>) -> Self {
        Self {
            verifier,
            frames: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Pushes `identity` as the innermost frame.
    pub fn push(&self, identity: CallIdentity) -> CallToken {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let thread = thread::current().id();
        let mut frames = self.frames.lock();
        debug_assert!(
            frames.last().map_or(true, |top| top.thread == thread),
            "call context pushed from a second thread while a call is in flight"
        );
        trace!(token = id, depth = frames.len() + 1, caller = %identity, "push call frame");
        frames.push(Frame { id, identity, thread });
        CallToken { id }
    }

    /// Pops the innermost frame, restoring the one before it.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::UnbalancedPop`] if `token` is not the
    /// innermost frame; the frames are left untouched.
    pub fn pop(&self, token: CallToken) -> Result<(), ContextError> {
        let mut frames = self.frames.lock();
        debug_assert!(
            frames.last().map_or(true, |top| top.thread == thread::current().id()),
            "call context popped from a second thread while a call is in flight"
        );
        match frames.last() {
            Some(top) if top.id == token.id => {
                frames.pop();
                trace!(token = token.id, depth = frames.len(), "pop call frame");
                Ok(())
            }
            _ => Err(ContextError::UnbalancedPop {
                token: token.id,
                depth: frames.len(),
            }),
        }
    }

    /// Pushes `identity` and returns a guard that pops it on drop.
    pub fn enter(&self, identity: CallIdentity) -> CallScope<'_> {
        let token = self.push(identity);
        CallScope {
            cx: self,
            token: Some(token),
        }
    }

    /// The verified package of the innermost frame.
    ///
    /// Returns `Ok(None)` outside any call or when the caller asserted no
    /// package.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::IdentityMismatch`] if the package does not
    /// belong to the frame's uid.
    pub fn current_package(&self) -> Result<Option<PackageName>, ContextError> {
        let Some(identity) = self.current_identity() else {
            return Ok(None);
        };
        let Some(package) = identity.package else {
            return Ok(None);
        };
        if self.verifier.package_belongs_to(&package, identity.uid) {
            Ok(Some(package))
        } else {
            warn!(
                package = %package,
                uid = %identity.uid,
                "asserted package does not match caller uid"
            );
            Err(ContextError::IdentityMismatch {
                package,
                uid: identity.uid,
            })
        }
    }

    /// The innermost frame's identity, unverified.
    #[must_use]
    pub fn current_identity(&self) -> Option<CallIdentity> {
        self.frames.lock().last().map(|f| f.identity.clone())
    }

    /// Number of pushed frames.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.frames.lock().len()
    }
}

/// Guard returned by [`CallContext::enter`].
#[derive(Debug)]
pub struct CallScope<'a> {
    cx: &'a CallContext,
    token: Option<CallToken>,
}

impl Drop for CallScope<'_> {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            if let Err(e) = self.cx.pop(token) {
                tracing::error!("call scope: {e}");
            }
        }
    }
}
