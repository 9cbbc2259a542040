//! Ordered batch mutations with back-references.
//!
//! A batch is a list of [`BatchOperation`]s applied in order against one
//! store. Later operations may take values from earlier results:
//!
//! ```text
//! #0 Insert content://notes/items              → Locator(.../items/19)
//! #1 Insert content://notes/tags  {item ← #0}  → values.item = 19
//! #2 Assert content://notes/tags  count = 1    → Count(1)
//! ```
//!
//! A back-reference to a [`BatchResult::Locator`] resolves to the
//! locator's trailing id; to a [`BatchResult::Count`] it resolves to the
//! count.
//!
//! # Failure Isolation
//!
//! An operation built with `failure_allowed` records
//! [`BatchResult::Failure`] and the batch continues. Any other failure
//! aborts the batch with [`BatchError::Aborted`], carrying the results
//! completed so far. Nothing is rolled back.

mod engine;
mod error;
mod operation;
mod result;

pub use engine::{back_ref_to_value, BatchEngine};
pub use error::{BatchError, OperationError};
pub use operation::{BatchOperation, BatchOperationBuilder, OperationKind};
pub use result::BatchResult;
