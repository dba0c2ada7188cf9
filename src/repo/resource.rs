//! The resource tree: plain resources and collections.
//!
//! Nodes are reference counted and immutable once shared. A repository
//! mutates a tree by copying the nodes on the path to the change
//! (`Arc::make_mut`), so every `Resource` handed out is a consistent
//! snapshot that later writes do not disturb.

use std::sync::Arc;
use std::time::SystemTime;

use bytes::Bytes;
use sha2::{Digest, Sha256};

/// A node in the tree.
#[derive(Debug, Clone)]
pub enum Resource {
    File(Arc<FileResource>),
    Collection(Arc<Collection>),
}

/// A plain resource with content.
#[derive(Debug, Clone)]
pub struct FileResource {
    name: String,
    content: Bytes,
    owner: Option<String>,
    modified: SystemTime,
}

/// A resource that owns a set of uniquely named children.
///
/// Children are kept in insertion order, which is also the order
/// in which their entity tags are folded into the collection's.
#[derive(Debug, Clone)]
pub struct Collection {
    name: String,
    children: Vec<Resource>,
    owner: Option<String>,
    modified: SystemTime,
}

fn digest(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

impl Resource {
    pub fn name(&self) -> &str {
        match self {
            Resource::File(f) => f.name(),
            Resource::Collection(c) => c.name(),
        }
    }

    /// Content fingerprint. See [`FileResource::etag`] and [`Collection::etag`].
    pub fn etag(&self) -> String {
        match self {
            Resource::File(f) => f.etag(),
            Resource::Collection(c) => c.etag(),
        }
    }

    pub fn content_length(&self) -> u64 {
        match self {
            Resource::File(f) => f.content_length(),
            Resource::Collection(_) => 0,
        }
    }

    /// Content of a plain resource. Collections have none.
    pub fn content(&self) -> Option<Bytes> {
        match self {
            Resource::File(f) => Some(f.content()),
            Resource::Collection(_) => None,
        }
    }

    pub fn owner(&self) -> Option<&str> {
        match self {
            Resource::File(f) => f.owner.as_deref(),
            Resource::Collection(c) => c.owner.as_deref(),
        }
    }

    pub fn modified(&self) -> SystemTime {
        match self {
            Resource::File(f) => f.modified,
            Resource::Collection(c) => c.modified,
        }
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, Resource::Collection(_))
    }

    pub fn as_collection(&self) -> Option<&Arc<Collection>> {
        match self {
            Resource::Collection(c) => Some(c),
            Resource::File(_) => None,
        }
    }

    pub fn as_file(&self) -> Option<&Arc<FileResource>> {
        match self {
            Resource::File(f) => Some(f),
            Resource::Collection(_) => None,
        }
    }
}

impl FileResource {
    pub(crate) fn new(name: impl Into<String>, content: Bytes, owner: Option<&str>) -> FileResource {
        FileResource {
            name: name.into(),
            content,
            owner: owner.map(str::to_string),
            modified: SystemTime::now(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Hash of the content.
    pub fn etag(&self) -> String {
        digest(&self.content)
    }

    pub fn content_length(&self) -> u64 {
        self.content.len() as u64
    }

    pub fn content(&self) -> Bytes {
        self.content.clone()
    }

    // overwrite in place; the name stays.
    pub(crate) fn set_content(&mut self, content: Bytes) {
        self.content = content;
        self.modified = SystemTime::now();
    }
}

impl Collection {
    pub(crate) fn new(name: impl Into<String>, owner: Option<&str>) -> Collection {
        Collection {
            name: name.into(),
            children: Vec::new(),
            owner: owner.map(str::to_string),
            modified: SystemTime::now(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get_child(&self, name: &str) -> Option<&Resource> {
        self.children.iter().find(|c| c.name() == name)
    }

    /// Iterate over the children as they were when this snapshot was taken.
    pub fn children(&self) -> impl Iterator<Item = &Resource> {
        self.children.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Hash of the concatenated child entity tags.
    ///
    /// Not cached: it is recomputed over the whole subtree on every call.
    pub fn etag(&self) -> String {
        let mut buf = String::new();
        for child in self.children() {
            buf.push_str(&child.etag());
        }
        digest(buf.as_bytes())
    }

    pub(crate) fn child_mut(&mut self, name: &str) -> Option<&mut Resource> {
        self.children.iter_mut().find(|c| c.name() == name)
    }

    // caller makes sure the name is not taken.
    pub(crate) fn add_child(&mut self, child: Resource) {
        self.children.push(child);
        self.modified = SystemTime::now();
    }

    pub(crate) fn remove_child(&mut self, name: &str) -> Option<Resource> {
        let idx = self.children.iter().position(|c| c.name() == name)?;
        self.modified = SystemTime::now();
        Some(self.children.remove(idx))
    }
}
