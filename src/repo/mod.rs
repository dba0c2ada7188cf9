//! Contains the structs and traits that define a repository backend.
//!
//! You only need this if you are going to implement your own
//! repository backend. Otherwise, just use `Repository::Mem`.
//!
use std::error::Error;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;

use crate::davpath::DavPath;
use crate::ls::DavLockManager;

pub(crate) mod memrepo;
mod resource;

pub use memrepo::MemRepository;
pub use resource::{Collection, FileResource, Resource};

/// Errors generated by a repository implementation.
///
/// The message is passed on to the client in the response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoError {
    /// No resource at that path.
    NotFound(String),
    /// Structurally invalid operation (parent is not a collection, root violation).
    NotAllowed(String),
    /// Missing intermediate collection, or a type mismatch blocking a write.
    Conflict(String),
    /// Target already exists in a way that forbids the operation.
    ResourceExists(String),
    /// Target is locked.
    Locked(String),
    /// The backend does not implement this operation.
    NotImplemented,
    /// Any other failure in the backend.
    GeneralFailure(String),
}

impl Error for RepoError {}

impl fmt::Display for RepoError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RepoError::NotFound(m)
            | RepoError::NotAllowed(m)
            | RepoError::Conflict(m)
            | RepoError::ResourceExists(m)
            | RepoError::Locked(m)
            | RepoError::GeneralFailure(m) => f.write_str(m),
            RepoError::NotImplemented => f.write_str("not implemented"),
        }
    }
}

pub type RepoResult<T> = Result<T, RepoError>;

/// Future returned by almost all of the `DavRepository` methods.
pub type RepoFuture<'a, T> = Pin<Box<dyn Future<Output = RepoResult<T>> + Send + 'a>>;

/// The trait that defines a repository.
///
/// Every operation takes a resource reference; the root collection is
/// always `/`. Implementations must serialize structural mutations, but
/// must not hold any lock beyond the duration of a single call.
pub trait DavRepository: Send + Sync {
    /// Resolve a reference to a resource.
    fn locate<'a>(&'a self, path: &'a DavPath) -> RepoFuture<'a, Resource>;

    /// Create an empty collection. Returns the existing one if there
    /// already is a collection at `path`.
    fn create_collection<'a>(
        &'a self,
        path: &'a DavPath,
        principal: Option<&'a str>,
    ) -> RepoFuture<'a, Arc<Collection>>;

    /// Create a plain resource, or overwrite the content of the existing one.
    fn create_resource<'a>(
        &'a self,
        path: &'a DavPath,
        data: Bytes,
        principal: Option<&'a str>,
    ) -> RepoFuture<'a, Resource>;

    /// Remove a resource, and its subtree if it is a collection.
    fn remove<'a>(&'a self, path: &'a DavPath) -> RepoFuture<'a, ()>;

    /// Does this repository support locking.
    fn supports_locks(&self) -> bool {
        self.lock_manager().is_some()
    }

    /// The lock manager, if locking is supported.
    fn lock_manager(&self) -> Option<&dyn DavLockManager> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_passes_message() {
        assert_eq!(
            RepoError::Conflict("no parent found".into()).to_string(),
            "no parent found"
        );
        assert_eq!(RepoError::NotImplemented.to_string(), "not implemented");
    }
}
