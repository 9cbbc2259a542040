//! Resource locators.
//!
//! A [`Locator`] addresses a resource behind a gateway:
//!
//! ```text
//! content://10@com.example.notes/items/7?limit=1
//! ───┬───   ─┬ ───────┬─────── ───┬──── ───┬───
//!  scheme  tenant  authority      path    query
//! ```
//!
//! The tenant prefix is optional. Everything before the *last* `@` in
//! the authority is treated as the prefix; this type only splits the
//! text, tenant policy lives in the runtime's address codec.

use crate::TenantId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The scheme of gateway-fronted resources. Only locators with this
/// scheme carry tenant prefixes.
pub const CONTENT_SCHEME: &str = "content";

/// Errors from parsing a [`Locator`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocatorError {
    /// No `://` separator.
    #[error("locator '{0}' has no scheme separator")]
    MissingScheme(String),

    /// Scheme contains characters outside `[A-Za-z0-9+.-]`.
    #[error("invalid scheme '{0}'")]
    InvalidScheme(String),

    /// Authority is empty (after any tenant prefix).
    #[error("locator '{0}' has no authority")]
    MissingAuthority(String),
}

/// Opaque resource address: scheme, authority (with optional tenant
/// prefix), path and query.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Locator {
    scheme: String,
    authority: String,
    path: String,
    query: Option<String>,
}

impl Locator {
    /// Builds a locator from already-split parts.
    ///
    /// `path` is stored as given; callers pass either `""` or a value
    /// starting with `/`.
    ///
    /// # Errors
    ///
    /// Returns [`LocatorError`] on an invalid scheme or empty authority.
    pub fn from_parts(
        scheme: impl Into<String>,
        authority: impl Into<String>,
        path: impl Into<String>,
        query: Option<String>,
    ) -> Result<Self, LocatorError> {
        let scheme = scheme.into();
        let authority = authority.into();
        if scheme.is_empty()
            || !scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '.' | '-'))
        {
            return Err(LocatorError::InvalidScheme(scheme));
        }
        let bare = authority.rsplit('@').next().unwrap_or_default();
        if bare.is_empty() {
            return Err(LocatorError::MissingAuthority(authority));
        }
        Ok(Self {
            scheme,
            authority,
            path: path.into(),
            query,
        })
    }

    /// Shorthand for a `content://` locator.
    ///
    /// # Errors
    ///
    /// Returns [`LocatorError::MissingAuthority`] for an empty authority.
    pub fn content(
        authority: impl Into<String>,
        path: impl Into<String>,
    ) -> Result<Self, LocatorError> {
        Self::from_parts(CONTENT_SCHEME, authority, path, None)
    }

    /// Returns the scheme.
    #[must_use]
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Returns `true` for `content://` locators.
    #[must_use]
    pub fn is_content(&self) -> bool {
        self.scheme == CONTENT_SCHEME
    }

    /// Returns the raw authority, including any tenant prefix.
    #[must_use]
    pub fn authority(&self) -> &str {
        &self.authority
    }

    /// Returns the text before the last `@`, if any.
    #[must_use]
    pub fn tenant_prefix(&self) -> Option<&str> {
        self.authority
            .rfind('@')
            .map(|end| &self.authority[..end])
    }

    /// Returns `true` if the authority carries a tenant prefix.
    #[must_use]
    pub fn has_tenant(&self) -> bool {
        self.tenant_prefix().is_some()
    }

    /// Returns the authority with any tenant prefix removed.
    #[must_use]
    pub fn bare_authority(&self) -> &str {
        match self.authority.rfind('@') {
            Some(end) => &self.authority[end + 1..],
            None => &self.authority,
        }
    }

    /// Returns the encoded tenant, or [`TenantId::CURRENT`] when the
    /// prefix is absent or not a number.
    #[must_use]
    pub fn tenant(&self) -> TenantId {
        self.tenant_prefix()
            .and_then(|prefix| prefix.parse::<u32>().ok())
            .filter(|id| *id != u32::MAX)
            .map_or(TenantId::CURRENT, TenantId::new)
    }

    /// Returns the path (`""` or starting with `/`).
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the query, without the leading `?`.
    #[must_use]
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// Returns the non-empty path segments.
    pub fn path_segments(&self) -> impl Iterator<Item = &str> {
        self.path.split('/').filter(|s| !s.is_empty())
    }

    /// Returns the last path segment parsed as an id.
    #[must_use]
    pub fn trailing_id(&self) -> Option<i64> {
        self.path_segments().last().and_then(|s| s.parse().ok())
    }

    /// Returns a copy with a different raw authority.
    #[must_use]
    pub fn with_authority(&self, authority: impl Into<String>) -> Self {
        Self {
            authority: authority.into(),
            ..self.clone()
        }
    }

    /// Returns a copy with a different path.
    #[must_use]
    pub fn with_path(&self, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..self.clone()
        }
    }

    /// Returns a copy with `segment` appended to the path.
    #[must_use]
    pub fn append_segment(&self, segment: impl fmt::Display) -> Self {
        let mut path = self.path.clone();
        if !path.ends_with('/') {
            path.push('/');
        }
        path.push_str(&segment.to_string());
        self.with_path(path)
    }
}

impl FromStr for Locator {
    type Err = LocatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (scheme, rest) = s
            .split_once("://")
            .ok_or_else(|| LocatorError::MissingScheme(s.to_string()))?;

        let (before_query, query) = match rest.split_once('?') {
            Some((head, q)) => (head, Some(q.to_string())),
            None => (rest, None),
        };

        let (authority, path) = match before_query.find('/') {
            Some(idx) => before_query.split_at(idx),
            None => (before_query, ""),
        };

        Self::from_parts(scheme, authority, path, query)
    }
}

impl TryFrom<String> for Locator {
    type Error = LocatorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Locator> for String {
    fn from(value: Locator) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}{}", self.scheme, self.authority, self.path)?;
        if let Some(q) = &self.query {
            write!(f, "?{q}")?;
        }
        Ok(())
    }
}
