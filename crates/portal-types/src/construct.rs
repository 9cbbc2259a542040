//! Fallible construction trait.
//!
//! | Pattern | Use When |
//! |---------|----------|
//! | `new()` | Construction always succeeds |
//! | [`TryNew`] | Construction validates its input |
//! | `FromStr` / `TryFrom<T>` | Parsing or converting from another type |
//! | Builder | Multi-field values with cross-field invariants (e.g. batch operations) |

/// Trait for fallible construction with validation.
///
/// Types implementing `TryNew` do not also expose a plain `new()` that
/// skips the validation; the `try_` prefix keeps fallibility visible at
/// the call site.
///
/// # Example
///
/// ```
/// use portal_types::{PackageName, TryNew};
///
/// assert!(PackageName::try_new("com.example.notes".to_string()).is_ok());
/// assert!(PackageName::try_new(String::new()).is_err());
/// ```
pub trait TryNew {
    /// The error type returned when validation fails.
    type Error;

    /// Arguments required for construction (a tuple for several).
    type Args;

    /// Attempts to create a new instance.
    ///
    /// # Errors
    ///
    /// Returns `Self::Error` if validation fails.
    fn try_new(args: Self::Args) -> Result<Self, Self::Error>
    where
        Self: Sized;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Segment(String);

    #[derive(Debug, PartialEq)]
    struct SlashInSegment;

    impl TryNew for Segment {
        type Error = SlashInSegment;
        type Args = String;

        fn try_new(value: String) -> Result<Self, Self::Error> {
            if value.contains('/') {
                return Err(SlashInSegment);
            }
            Ok(Segment(value))
        }
    }

    #[test]
    fn try_new_valid() {
        let seg = Segment::try_new("items".to_string()).expect("plain segment is valid");
        assert_eq!(seg.0, "items");
    }

    #[test]
    fn try_new_invalid() {
        assert_eq!(
            Segment::try_new("a/b".to_string()).unwrap_err(),
            SlashInSegment
        );
    }
}
