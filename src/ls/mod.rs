//! Contains the structs and traits that define a `locksystem` backend.
//!
//! Note that the [`DavLock`] struct contains all the information about a lock.
//!
//! Currently there is one implementation, [`MemLs`](memls::MemLs), an
//! ephemeral in-memory lock manager.
//!
use std::collections::HashMap;
use std::fmt::Debug;
use std::time::{Duration, SystemTime};

use crate::davpath::DavPath;

pub mod memls;

/// Exclusive or shared lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockScope {
    Exclusive,
    Shared,
}

/// Does the lock apply to the resource only, or to all its descendants too.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockDepth {
    Zero,
    Infinity,
}

/// Type of the locks returned by DavLockManager methods.
#[derive(Debug, Clone)]
pub struct DavLock {
    /// Token.
    pub token: String,
    /// Path the lock was created against.
    pub path: DavPath,
    /// Principal.
    pub principal: Option<String>,
    /// Owner, as given by the client.
    pub owner: Option<String>,
    /// When the lock turns stale (absolute).
    pub timeout_at: Option<SystemTime>,
    /// When the lock turns stale (relative).
    pub timeout: Option<Duration>,
    pub scope: LockScope,
    pub depth: LockDepth,
}

impl DavLock {
    /// Does this lock apply to `path`: it was created on `path` itself,
    /// or it is an infinite-depth lock on one of its ancestors.
    pub fn covers(&self, path: &DavPath) -> bool {
        self.path.same_resource(path)
            || (self.depth == LockDepth::Infinity && self.path.is_ancestor_of(path))
    }

    pub(crate) fn is_expired(&self, now: SystemTime) -> bool {
        self.timeout_at.map(|t| t <= now).unwrap_or(false)
    }
}

/// The trait that defines a locksystem.
pub trait DavLockManager: Debug + Send + Sync {
    /// Lock a node. Returns `Ok(new_lock)` if succeeded,
    /// or `Err(conflicting_lock)` if failed.
    fn lock(
        &self,
        path: &DavPath,
        principal: Option<&str>,
        owner: Option<&str>,
        timeout: Option<Duration>,
        scope: LockScope,
        depth: LockDepth,
    ) -> Result<DavLock, DavLock>;

    /// Unlock a node. Returns `Ok(())` if succeeded, `Err(())` if failed
    /// (because lock doesn't exist, or does not apply to `path`).
    fn unlock(&self, path: &DavPath, token: &str) -> Result<(), ()>;

    /// Refresh lock. Returns updated lock if succeeded.
    fn refresh(
        &self,
        path: &DavPath,
        token: &str,
        timeout: Option<Duration>,
    ) -> Result<DavLock, ()>;

    /// All active locks whose scope includes `path`, keyed by token.
    /// Empty if nothing is locked.
    fn check_locked(&self, path: &DavPath) -> HashMap<String, DavLock>;

    /// Find and return all locks that cover a given path.
    fn discover(&self, path: &DavPath) -> Vec<DavLock> {
        self.check_locked(path).into_values().collect()
    }

    /// Delete all locks at this path and below (after DELETE).
    fn delete(&self, path: &DavPath) -> Result<(), ()>;
}
