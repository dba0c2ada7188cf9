//! Simple in-memory locksystem.
//!
//! This implementation has state - if you create a
//! new instance in a handler(), it will be empty every time.
//!
//! This means you have to create the instance once, using `MemLs::new`, store
//! it in your handler struct, and clone() it every time you pass
//! it to the DavHandler. As a MemLs struct is just a handle, cloning is cheap.
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use parking_lot::Mutex;
use uuid::Uuid;

use crate::davpath::DavPath;
use crate::ls::*;

/// Ephemeral in-memory LockSystem.
#[derive(Debug, Clone)]
pub struct MemLs(Arc<Mutex<HashMap<String, DavLock>>>);

impl MemLs {
    /// Create a new "memls" locksystem.
    pub fn new() -> Arc<MemLs> {
        Arc::new(MemLs(Arc::new(Mutex::new(HashMap::new()))))
    }
}

// drop stale locks.
fn prune(locks: &mut HashMap<String, DavLock>) {
    let now = SystemTime::now();
    locks.retain(|token, lock| {
        let keep = !lock.is_expired(now);
        if !keep {
            debug!("MemLs: lock {token} on {:?} expired", lock.path);
        }
        keep
    });
}

// would a new lock on `path` overlap `other`.
fn overlaps(other: &DavLock, path: &DavPath, depth: LockDepth) -> bool {
    other.covers(path) || (depth == LockDepth::Infinity && path.is_ancestor_of(&other.path))
}

impl DavLockManager for MemLs {
    fn lock(
        &self,
        path: &DavPath,
        principal: Option<&str>,
        owner: Option<&str>,
        timeout: Option<Duration>,
        scope: LockScope,
        depth: LockDepth,
    ) -> Result<DavLock, DavLock> {
        let locks = &mut *self.0.lock();
        prune(locks);

        let conflict = locks.values().find(|l| {
            overlaps(l, path, depth)
                && (scope == LockScope::Exclusive || l.scope == LockScope::Exclusive)
        });
        if let Some(conflict) = conflict {
            trace!("MemLs: lock {path:?} conflicts with {}", conflict.token);
            return Err(conflict.clone());
        }

        let timeout_at = timeout.map(|d| SystemTime::now() + d);
        let lock = DavLock {
            token: format!("opaquelocktoken:{}", Uuid::new_v4()),
            path: path.clone(),
            principal: principal.map(|s| s.to_string()),
            owner: owner.map(|s| s.to_string()),
            timeout_at,
            timeout,
            scope,
            depth,
        };
        trace!("MemLs: lock {path:?} -> {}", lock.token);
        locks.insert(lock.token.clone(), lock.clone());
        Ok(lock)
    }

    fn unlock(&self, path: &DavPath, token: &str) -> Result<(), ()> {
        let locks = &mut *self.0.lock();
        prune(locks);
        match locks.get(token) {
            Some(lock) if lock.covers(path) => {
                trace!("MemLs: unlock {path:?} {token}");
                locks.remove(token);
                Ok(())
            }
            _ => Err(()),
        }
    }

    fn refresh(
        &self,
        path: &DavPath,
        token: &str,
        timeout: Option<Duration>,
    ) -> Result<DavLock, ()> {
        let locks = &mut *self.0.lock();
        prune(locks);
        match locks.get_mut(token) {
            Some(lock) if lock.covers(path) => {
                lock.timeout = timeout;
                lock.timeout_at = timeout.map(|d| SystemTime::now() + d);
                Ok(lock.clone())
            }
            _ => Err(()),
        }
    }

    fn check_locked(&self, path: &DavPath) -> HashMap<String, DavLock> {
        let locks = &mut *self.0.lock();
        prune(locks);
        locks
            .iter()
            .filter(|(_, l)| l.covers(path))
            .map(|(t, l)| (t.clone(), l.clone()))
            .collect()
    }

    fn delete(&self, path: &DavPath) -> Result<(), ()> {
        let locks = &mut *self.0.lock();
        locks.retain(|_, l| !(l.path.same_resource(path) || path.is_ancestor_of(&l.path)));
        Ok(())
    }
}
