//! Unified error interface for Portal.
//!
//! Every Portal error enum implements [`ErrorCode`] so that callers on
//! the far side of the gateway can branch on a stable, machine-readable
//! code instead of matching on concrete error types.
//!
//! # Example
//!
//! ```
//! use portal_types::ErrorCode;
//!
//! #[derive(Debug)]
//! enum StoreError {
//!     EndpointLost,
//!     Rejected,
//! }
//!
//! impl ErrorCode for StoreError {
//!     fn code(&self) -> &'static str {
//!         match self {
//!             Self::EndpointLost => "STORE_ENDPOINT_LOST",
//!             Self::Rejected => "STORE_REJECTED",
//!         }
//!     }
//!
//!     fn is_recoverable(&self) -> bool {
//!         matches!(self, Self::EndpointLost)
//!     }
//! }
//!
//! let err = StoreError::EndpointLost;
//! assert_eq!(err.code(), "STORE_ENDPOINT_LOST");
//! assert!(err.is_recoverable());
//! ```

/// Unified error code interface for Portal errors.
///
/// # Code Format
///
/// - **UPPER_SNAKE_CASE**: e.g. `"GATEWAY_ACCESS_DENIED"`
/// - **Module-prefixed**: `ADDRESS_`, `CONTEXT_`, `BATCH_`, `STORE_`, `GATEWAY_`, `CONFIG_`
/// - **Stable**: codes are part of the wire contract with callers
///
/// # Recoverability
///
/// An error is recoverable when a retry (possibly after reconnecting)
/// may succeed. Access denials, malformed operations and cancellations
/// are never recoverable.
pub trait ErrorCode {
    /// Returns a machine-readable error code.
    fn code(&self) -> &'static str;

    /// Returns whether the error is recoverable.
    fn is_recoverable(&self) -> bool;
}

/// Validates that an error code follows Portal conventions.
///
/// # Panics
///
/// Panics if the code is empty, lacks `expected_prefix`, or is not
/// UPPER_SNAKE_CASE.
pub fn assert_error_code<E: ErrorCode>(err: &E, expected_prefix: &str) {
    let code = err.code();

    assert!(!code.is_empty(), "Error code must not be empty");
    assert!(
        code.starts_with(expected_prefix),
        "Error code '{}' must start with prefix '{}'",
        code,
        expected_prefix
    );
    assert!(
        is_upper_snake_case(code),
        "Error code '{}' must be UPPER_SNAKE_CASE",
        code
    );
}

/// Validates every variant in `errors` with [`assert_error_code`].
pub fn assert_error_codes<E: ErrorCode>(errors: &[E], expected_prefix: &str) {
    for err in errors {
        assert_error_code(err, expected_prefix);
    }
}

fn is_upper_snake_case(s: &str) -> bool {
    if s.is_empty() || s.starts_with('_') || s.ends_with('_') || s.contains("__") {
        return false;
    }

    s.chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}
