//! Simple in-memory repository.
//!
//! This implementation has state, so if you create a
//! new instance in a handler(), it will be empty every time.
//!
//! This means you have to create the instance once, using `MemRepository::new`,
//! store it in your handler struct, and clone() it every time you pass
//! it to the DavHandler. As a MemRepository struct is just a handle, cloning is cheap.
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::{future, FutureExt};
use parking_lot::RwLock;

use crate::davpath::DavPath;
use crate::ls::DavLockManager;
use crate::repo::*;

/// Ephemeral in-memory repository.
#[derive(Clone)]
pub struct MemRepository {
    root: Arc<RwLock<Arc<Collection>>>,
    ls: Option<Arc<dyn DavLockManager>>,
}

impl fmt::Debug for MemRepository {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("MemRepository")
            .field("locking", &self.ls.is_some())
            .finish()
    }
}

impl Default for MemRepository {
    fn default() -> Self {
        MemRepository::new()
    }
}

// Walk down from `cur` along `segs`, copying shared nodes on the way.
// Every segment must be an existing collection.
fn walk_mut<'a>(
    mut cur: &'a mut Collection,
    segs: &[&str],
    missing: fn(&str) -> RepoError,
    not_collection: fn(&str) -> RepoError,
) -> RepoResult<&'a mut Collection> {
    for seg in segs {
        cur = match cur.child_mut(seg) {
            Some(Resource::Collection(c)) => Arc::make_mut(c),
            Some(Resource::File(_)) => return Err(not_collection(seg)),
            None => return Err(missing(seg)),
        };
    }
    Ok(cur)
}

fn no_parent(_: &str) -> RepoError {
    RepoError::Conflict("no parent found".to_string())
}

fn parent_no_collection(_: &str) -> RepoError {
    RepoError::NotAllowed("parent is no collection".to_string())
}

fn not_found(seg: &str) -> RepoError {
    RepoError::NotFound(format!("{seg} not found"))
}

impl MemRepository {
    /// Create a new repository without lock support.
    pub fn new() -> MemRepository {
        MemRepository {
            root: Arc::new(RwLock::new(Arc::new(Collection::new("", None)))),
            ls: None,
        }
    }

    /// Create a new repository that uses `ls` for locking.
    pub fn with_locks(ls: Arc<dyn DavLockManager>) -> MemRepository {
        MemRepository {
            ls: Some(ls),
            ..MemRepository::new()
        }
    }

    // reader side: clone the root handle and drop the lock right away.
    fn snapshot(&self) -> Arc<Collection> {
        self.root.read().clone()
    }

    fn do_locate(&self, path: &DavPath) -> RepoResult<Resource> {
        let root = self.snapshot();
        let segs: Vec<&str> = path.segments().collect();
        let Some((last, parents)) = segs.split_last() else {
            return Ok(Resource::Collection(root));
        };
        let mut cur = &root;
        for seg in parents {
            cur = match cur.get_child(seg) {
                Some(Resource::Collection(c)) => c,
                _ => return Err(not_found(seg)),
            };
        }
        cur.get_child(last).cloned().ok_or_else(|| not_found(last))
    }

    fn do_create_collection(
        &self,
        path: &DavPath,
        principal: Option<&str>,
    ) -> RepoResult<Arc<Collection>> {
        let segs: Vec<&str> = path.segments().collect();
        let Some((last, parents)) = segs.split_last() else {
            return Err(RepoError::ResourceExists("resource exists".to_string()));
        };

        let mut root = self.root.write();
        let parent = walk_mut(Arc::make_mut(&mut *root), parents, no_parent, parent_no_collection)?;
        match parent.get_child(last) {
            Some(Resource::Collection(c)) => return Ok(c.clone()),
            Some(Resource::File(_)) => {
                return Err(RepoError::Conflict("exists as file".to_string()));
            }
            None => {}
        }
        let coll = Arc::new(Collection::new(*last, principal));
        parent.add_child(Resource::Collection(coll.clone()));
        trace!("MemRepository: added collection {path}");
        Ok(coll)
    }

    fn do_create_resource(
        &self,
        path: &DavPath,
        data: Bytes,
        principal: Option<&str>,
    ) -> RepoResult<Resource> {
        let segs: Vec<&str> = path.segments().collect();
        let Some((last, parents)) = segs.split_last() else {
            return Err(RepoError::Conflict(
                "cannot write to root resource".to_string(),
            ));
        };

        let mut root = self.root.write();
        let parent = walk_mut(Arc::make_mut(&mut *root), parents, no_parent, parent_no_collection)?;
        match parent.child_mut(last) {
            Some(Resource::Collection(_)) => Err(RepoError::NotAllowed(
                "cannot write to a collection".to_string(),
            )),
            Some(Resource::File(f)) => {
                Arc::make_mut(f).set_content(data);
                trace!("MemRepository: updated {path}");
                Ok(Resource::File(f.clone()))
            }
            None => {
                let file = Resource::File(Arc::new(FileResource::new(*last, data, principal)));
                parent.add_child(file.clone());
                trace!("MemRepository: added {path}");
                Ok(file)
            }
        }
    }

    fn do_remove(&self, path: &DavPath) -> RepoResult<()> {
        let segs: Vec<&str> = path.segments().collect();
        let Some((last, parents)) = segs.split_last() else {
            return Err(RepoError::NotAllowed("root cannot be removed".to_string()));
        };

        let mut root = self.root.write();
        let parent = walk_mut(Arc::make_mut(&mut *root), parents, not_found, not_found)?;
        match parent.remove_child(last) {
            Some(_) => {
                trace!("MemRepository: removed {path}");
                Ok(())
            }
            None => Err(not_found(last)),
        }
    }
}

impl DavRepository for MemRepository {
    fn locate<'a>(&'a self, path: &'a DavPath) -> RepoFuture<'a, Resource> {
        trace!("MemRepository: locate {path:?}");
        future::ready(self.do_locate(path)).boxed()
    }

    fn create_collection<'a>(
        &'a self,
        path: &'a DavPath,
        principal: Option<&'a str>,
    ) -> RepoFuture<'a, Arc<Collection>> {
        trace!("MemRepository: create_collection {path:?}");
        future::ready(self.do_create_collection(path, principal)).boxed()
    }

    fn create_resource<'a>(
        &'a self,
        path: &'a DavPath,
        data: Bytes,
        principal: Option<&'a str>,
    ) -> RepoFuture<'a, Resource> {
        trace!("MemRepository: create_resource {path:?} ({} bytes)", data.len());
        future::ready(self.do_create_resource(path, data, principal)).boxed()
    }

    fn remove<'a>(&'a self, path: &'a DavPath) -> RepoFuture<'a, ()> {
        trace!("MemRepository: remove {path:?}");
        future::ready(self.do_remove(path)).boxed()
    }

    fn lock_manager(&self) -> Option<&dyn DavLockManager> {
        self.ls.as_deref()
    }
}
