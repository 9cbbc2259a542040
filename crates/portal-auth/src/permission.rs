//! Permission declarations of a fronted resource.
//!
//! A resource declares which permissions guard it at two levels:
//!
//! ```text
//! PermissionDeclaration
//! ├── read_permission   (component level, optional)
//! ├── write_permission  (component level, optional)
//! └── path_rules[]      (evaluated in declaration order)
//!     ├── /private/*     read: notes.PRIVATE_READ
//!     └── /shared        read: notes.SHARED_READ  write: notes.SHARED_WRITE
//! ```
//!
//! When neither level declares a permission for a mode, that mode is
//! open to any exported, same-tenant caller.

use glob::Pattern;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of an access check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessKind {
    /// Query, type lookup, assert.
    Read,
    /// Insert, update, delete.
    Write,
}

impl AccessKind {
    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
        }
    }
}

impl fmt::Display for AccessKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named permission, e.g. `com.example.notes.READ`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(String);

impl Permission {
    /// Creates a permission name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Permission {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// How a [`PathRule`] matches a locator path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathPattern {
    /// Exact path equality.
    Literal(String),
    /// Path starts with the given text.
    Prefix(String),
    /// Shell-style glob (`*`, `?`, `[..]`).
    Glob(Pattern),
}

impl PathPattern {
    /// Exact-match pattern.
    #[must_use]
    pub fn literal(path: impl Into<String>) -> Self {
        Self::Literal(path.into())
    }

    /// Prefix pattern.
    #[must_use]
    pub fn prefix(path: impl Into<String>) -> Self {
        Self::Prefix(path.into())
    }

    /// Glob pattern.
    ///
    /// # Errors
    ///
    /// Returns [`glob::PatternError`] for a malformed pattern.
    pub fn glob(pattern: &str) -> Result<Self, glob::PatternError> {
        Pattern::new(pattern).map(Self::Glob)
    }

    /// Returns `true` if `path` matches.
    ///
    /// # Example
    ///
    /// ```
    /// use portal_auth::PathPattern;
    ///
    /// let p = PathPattern::glob("/private/*").unwrap();
    /// assert!(p.matches("/private/42"));
    /// assert!(!p.matches("/public/1"));
    /// ```
    #[must_use]
    pub fn matches(&self, path: &str) -> bool {
        match self {
            Self::Literal(lit) => path == lit,
            Self::Prefix(prefix) => path.starts_with(prefix.as_str()),
            Self::Glob(pattern) => pattern.matches(path),
        }
    }

    /// Pattern text as written.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Literal(s) | Self::Prefix(s) => s,
            Self::Glob(p) => p.as_str(),
        }
    }
}

/// A permission guard for paths matching [`pattern`](Self::pattern).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathRule {
    /// Which paths the rule covers.
    pub pattern: PathPattern,
    /// Permission required to read matching paths.
    pub read_permission: Option<Permission>,
    /// Permission required to write matching paths.
    pub write_permission: Option<Permission>,
}

impl PathRule {
    /// Creates a rule with no permissions attached.
    #[must_use]
    pub fn new(pattern: PathPattern) -> Self {
        Self {
            pattern,
            read_permission: None,
            write_permission: None,
        }
    }

    /// Sets the read permission.
    #[must_use]
    pub fn read(mut self, permission: impl Into<Permission>) -> Self {
        self.read_permission = Some(permission.into());
        self
    }

    /// Sets the write permission.
    #[must_use]
    pub fn write(mut self, permission: impl Into<Permission>) -> Self {
        self.write_permission = Some(permission.into());
        self
    }

    /// The permission this rule requires for `kind`, if any.
    #[must_use]
    pub fn permission_for(&self, kind: AccessKind) -> Option<&Permission> {
        match kind {
            AccessKind::Read => self.read_permission.as_ref(),
            AccessKind::Write => self.write_permission.as_ref(),
        }
    }
}

/// Everything a resource declares about who may access it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionDeclaration {
    /// Component-level read permission.
    pub read_permission: Option<Permission>,
    /// Component-level write permission.
    pub write_permission: Option<Permission>,
    /// Path rules in declaration order.
    pub path_rules: Vec<PathRule>,
}

impl PermissionDeclaration {
    /// A declaration with no permissions at all.
    #[must_use]
    pub fn open() -> Self {
        Self::default()
    }

    /// Sets the component-level read permission.
    #[must_use]
    pub fn with_read(mut self, permission: impl Into<Permission>) -> Self {
        self.read_permission = Some(permission.into());
        self
    }

    /// Sets the component-level write permission.
    #[must_use]
    pub fn with_write(mut self, permission: impl Into<Permission>) -> Self {
        self.write_permission = Some(permission.into());
        self
    }

    /// Appends a path rule.
    #[must_use]
    pub fn with_rule(mut self, rule: PathRule) -> Self {
        self.path_rules.push(rule);
        self
    }

    /// The component-level permission for `kind`.
    #[must_use]
    pub fn component_permission(&self, kind: AccessKind) -> Option<&Permission> {
        match kind {
            AccessKind::Read => self.read_permission.as_ref(),
            AccessKind::Write => self.write_permission.as_ref(),
        }
    }

    /// Rules matching `path` that declare a permission for `kind`, in
    /// declaration order.
    pub fn matching_rules<'a>(
        &'a self,
        path: &'a str,
        kind: AccessKind,
    ) -> impl Iterator<Item = (&'a PathRule, &'a Permission)> + 'a {
        self.path_rules.iter().filter_map(move |rule| {
            if !rule.pattern.matches(path) {
                return None;
            }
            rule.permission_for(kind).map(|perm| (rule, perm))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_kinds() {
        assert!(PathPattern::literal("/items").matches("/items"));
        assert!(!PathPattern::literal("/items").matches("/items/1"));
        assert!(PathPattern::prefix("/items").matches("/items/1"));
        assert!(!PathPattern::prefix("/items").matches("/other"));

        let glob = PathPattern::glob("/private/*").expect("valid glob");
        assert!(glob.matches("/private/42"));
        assert!(!glob.matches("/public/1"));
        assert_eq!(glob.as_str(), "/private/*");
    }

    #[test]
    fn invalid_glob_rejected() {
        assert!(PathPattern::glob("/a/[").is_err());
    }

    #[test]
    fn matching_rules_skips_rules_without_mode_permission() {
        let decl = PermissionDeclaration::open()
            .with_rule(PathRule::new(PathPattern::prefix("/p")).write("W"))
            .with_rule(PathRule::new(PathPattern::prefix("/p")).read("R1"))
            .with_rule(PathRule::new(PathPattern::literal("/q")).read("R2"));

        let reads: Vec<_> = decl
            .matching_rules("/p/1", AccessKind::Read)
            .map(|(_, p)| p.as_str())
            .collect();
        assert_eq!(reads, vec!["R1"]);

        let writes: Vec<_> = decl
            .matching_rules("/p/1", AccessKind::Write)
            .map(|(_, p)| p.as_str())
            .collect();
        assert_eq!(writes, vec!["W"]);
    }

    #[test]
    fn component_permission_per_kind() {
        let decl = PermissionDeclaration::open().with_read("R");
        assert_eq!(
            decl.component_permission(AccessKind::Read),
            Some(&Permission::new("R"))
        );
        assert_eq!(decl.component_permission(AccessKind::Write), None);
    }
}
