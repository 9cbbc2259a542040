//! Per-call identity propagation and cancellation.
//!
//! # Identity Frames
//!
//! ```text
//! CallContext (one per execution context)
//! │
//! ├── frame 0   com.example.reader (uid 10050)   ← pushed by Gateway::query
//! │   └── frame 1   com.example.notes (uid 10001) ← pushed for an internal query
//! │
//! └── current_package() reads the innermost frame and re-verifies it
//! ```
//!
//! Frames are pushed immediately before the store is called and popped
//! when the [`CallScope`] guard drops, whatever way the call exits.
//!
//! # Cancellation
//!
//! [`CancellationToken`] is the transport's cancellation signal. The
//! gateway derives a child token per call so that cancelling a call does
//! not cancel the caller's token.

mod call;
mod cancel;

pub use call::{CallContext, CallScope, CallToken, ContextError};
pub use cancel::CancellationToken;
