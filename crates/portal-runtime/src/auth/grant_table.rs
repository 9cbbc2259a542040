//! Default implementation of [`GrantTable`].
//!
//! Provides [`DefaultGrantTable`], a thread-safe, in-memory table of
//! explicit per-locator grants.
//!
//! # Grant Matching
//!
//! A check matches a grant only on the **exact** locator (tenant prefix
//! included) and uid, and only if the grant covers every requested
//! direction. One-time grants are consumed by the first check they
//! satisfy.

use portal_auth::{GrantError, GrantKind, GrantMode, GrantTable, LocatorGrant};
use portal_types::{Locator, Uid};
use std::collections::HashMap;
use std::sync::RwLock;

type GrantKey = (Locator, Uid);

/// Thread-safe, in-memory grant table.
///
/// # Grant Types
///
/// | Type | Behavior |
/// |------|----------|
/// | Persistent | Valid until revoked or cleared |
/// | OneTime | Consumed on first successful check |
///
/// # Example
///
/// ```
/// use portal_auth::{GrantMode, GrantTable, LocatorGrant};
/// use portal_runtime::auth::DefaultGrantTable;
/// use portal_types::{Locator, Uid};
///
/// let table = DefaultGrantTable::new();
/// let item: Locator = "content://com.example.notes/items/7".parse().unwrap();
/// let uid = Uid::new(10_050);
///
/// table.grant(LocatorGrant::one_time(item.clone(), uid, GrantMode::READ)).unwrap();
/// assert!(table.has_grant(&item, uid, GrantMode::READ).unwrap());  // consumed
/// assert!(!table.has_grant(&item, uid, GrantMode::READ).unwrap());
/// ```
#[derive(Debug, Default)]
pub struct DefaultGrantTable {
    /// Persistent grants (survive until revoked).
    persistent: RwLock<HashMap<GrantKey, GrantMode>>,
    /// One-time grants (consumed on first match).
    one_time: RwLock<HashMap<GrantKey, GrantMode>>,
}

impl DefaultGrantTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restores grants from a previously saved list.
    ///
    /// Existing grants are preserved (additive merge).
    ///
    /// # Errors
    ///
    /// Returns [`GrantError`] if internal state is inaccessible.
    pub fn restore_grants(&self, grants: &[LocatorGrant]) -> Result<(), GrantError> {
        for grant in grants {
            self.grant(grant.clone())?;
        }
        Ok(())
    }
}

fn poisoned(context: &str) -> GrantError {
    tracing::error!("grant_table: {context} lock poisoned");
    GrantError::LockPoisoned {
        context: context.to_string(),
    }
}

impl GrantTable for DefaultGrantTable {
    fn grant(&self, grant: LocatorGrant) -> Result<(), GrantError> {
        let (lock, context) = match grant.kind {
            GrantKind::Persistent => (&self.persistent, "persistent"),
            GrantKind::OneTime => (&self.one_time, "one_time"),
        };
        let mut map = lock.write().map_err(|_| poisoned(context))?;
        *map.entry((grant.locator, grant.uid)).or_insert(GrantMode::empty()) |= grant.mode;
        Ok(())
    }

    fn revoke(&self, locator: &Locator, uid: Uid, mode: GrantMode) -> Result<(), GrantError> {
        let key = (locator.clone(), uid);
        for (lock, context) in [(&self.persistent, "persistent"), (&self.one_time, "one_time")] {
            let mut map = lock.write().map_err(|_| poisoned(context))?;
            if let Some(granted) = map.get_mut(&key) {
                granted.remove(mode);
                if granted.is_empty() {
                    map.remove(&key);
                }
            }
        }
        Ok(())
    }

    fn has_grant(&self, locator: &Locator, uid: Uid, mode: GrantMode) -> Result<bool, GrantError> {
        let key = (locator.clone(), uid);

        // Persistent grants first (read lock, concurrent)
        {
            let map = self.persistent.read().map_err(|_| poisoned("persistent"))?;
            if map.get(&key).is_some_and(|granted| granted.contains(mode)) {
                return Ok(true);
            }
        }

        // One-time grants (write lock, consume on match)
        let mut map = self.one_time.write().map_err(|_| poisoned("one_time"))?;
        if map.get(&key).is_some_and(|granted| granted.contains(mode)) {
            map.remove(&key);
            return Ok(true);
        }
        Ok(false)
    }

    fn clear(&self) -> Result<(), GrantError> {
        self.persistent
            .write()
            .map_err(|_| poisoned("persistent"))?
            .clear();
        self.one_time
            .write()
            .map_err(|_| poisoned("one_time"))?
            .clear();
        Ok(())
    }

    fn grant_count(&self) -> usize {
        let persistent = self.persistent.read().map(|m| m.len()).unwrap_or(0);
        let one_time = self.one_time.read().map(|m| m.len()).unwrap_or(0);
        persistent.saturating_add(one_time)
    }

    fn list_grants(&self) -> Vec<LocatorGrant> {
        let mut grants = Vec::new();

        match self.persistent.read() {
            Ok(map) => grants.extend(
                map.iter()
                    .map(|((l, u), m)| LocatorGrant::persistent(l.clone(), *u, *m)),
            ),
            Err(_) => tracing::error!("grant_table: persistent lock poisoned on list_grants"),
        }

        match self.one_time.read() {
            Ok(map) => grants.extend(
                map.iter()
                    .map(|((l, u), m)| LocatorGrant::one_time(l.clone(), *u, *m)),
            ),
            Err(_) => tracing::error!("grant_table: one_time lock poisoned on list_grants"),
        }

        grants
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(s: &str) -> Locator {
        s.parse().expect("test locator should parse")
    }

    const UID: Uid = Uid::new(10_050);

    #[test]
    fn persistent_grant_survives_checks() {
        let table = DefaultGrantTable::new();
        let item = loc("content://notes/items/1");
        table
            .grant(LocatorGrant::persistent(item.clone(), UID, GrantMode::READ))
            .expect("grant");

        assert!(table.has_grant(&item, UID, GrantMode::READ).expect("check"));
        assert!(table.has_grant(&item, UID, GrantMode::READ).expect("check"));
        assert!(!table.has_grant(&item, UID, GrantMode::WRITE).expect("check"));
    }

    #[test]
    fn exact_locator_and_uid_only() {
        let table = DefaultGrantTable::new();
        let item = loc("content://notes/items/1");
        table
            .grant(LocatorGrant::persistent(item.clone(), UID, GrantMode::all()))
            .expect("grant");

        assert!(!table
            .has_grant(&loc("content://notes/items/2"), UID, GrantMode::READ)
            .expect("check"));
        assert!(!table
            .has_grant(&loc("content://10@notes/items/1"), UID, GrantMode::READ)
            .expect("check"));
        assert!(!table
            .has_grant(&item, Uid::new(10_051), GrantMode::READ)
            .expect("check"));
    }

    #[test]
    fn grants_accumulate_modes() {
        let table = DefaultGrantTable::new();
        let item = loc("content://notes/items/1");
        table
            .grant(LocatorGrant::persistent(item.clone(), UID, GrantMode::READ))
            .expect("grant");
        table
            .grant(LocatorGrant::persistent(item.clone(), UID, GrantMode::WRITE))
            .expect("grant");

        assert_eq!(table.grant_count(), 1);
        assert!(table
            .has_grant(&item, UID, GrantMode::READ | GrantMode::WRITE)
            .expect("check"));
    }

    #[test]
    fn revoke_removes_only_requested_mode() {
        let table = DefaultGrantTable::new();
        let item = loc("content://notes/items/1");
        table
            .grant(LocatorGrant::persistent(item.clone(), UID, GrantMode::all()))
            .expect("grant");

        table.revoke(&item, UID, GrantMode::WRITE).expect("revoke");
        assert!(table.has_grant(&item, UID, GrantMode::READ).expect("check"));
        assert!(!table.has_grant(&item, UID, GrantMode::WRITE).expect("check"));

        table.revoke(&item, UID, GrantMode::READ).expect("revoke");
        assert_eq!(table.grant_count(), 0);
    }

    #[test]
    fn clear_and_restore() {
        let table = DefaultGrantTable::new();
        table
            .grant(LocatorGrant::persistent(loc("content://notes/a"), UID, GrantMode::READ))
            .expect("grant");
        table
            .grant(LocatorGrant::one_time(loc("content://notes/b"), UID, GrantMode::WRITE))
            .expect("grant");

        let saved = table.list_grants();
        assert_eq!(saved.len(), 2);

        table.clear().expect("clear");
        assert_eq!(table.grant_count(), 0);

        let restored = DefaultGrantTable::new();
        restored.restore_grants(&saved).expect("restore");
        assert_eq!(restored.grant_count(), 2);
        assert!(restored
            .has_grant(&loc("content://notes/b"), UID, GrantMode::WRITE)
            .expect("check"));
        assert_eq!(restored.grant_count(), 1);
    }

    #[test]
    fn concurrent_checks() {
        use std::sync::Arc;

        let table = Arc::new(DefaultGrantTable::new());
        let item = loc("content://notes/items/1");
        table
            .grant(LocatorGrant::persistent(item.clone(), UID, GrantMode::READ))
            .expect("grant");

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let table = Arc::clone(&table);
                let item = item.clone();
                std::thread::spawn(move || {
                    table
                        .has_grant(&item, UID, GrantMode::READ)
                        .expect("check")
                })
            })
            .collect();

        for handle in handles {
            assert!(handle.join().expect("thread joins"));
        }
    }
}
